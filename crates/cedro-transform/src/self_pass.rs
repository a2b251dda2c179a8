//! The `self` pass (spec.md §4.5 "Self"), enabled only by
//! `Options::pass_self_to_member_functions` (the `self` pragma feature
//! word, spec.md §6).
//!
//! Ported from `examples/original_source/src/macros/self.h`'s
//! `macro_self`. Per the Open Question resolution recorded in
//! `SPEC_FULL.md`/`DESIGN.md`, this follows the source's actual emission
//! order rather than spec.md §4.5's simplified prose: `.` inserts
//! `&(void*)OBJ` and `->` inserts `(void*)OBJ`.

use cedro_syntax::{Buffer, Marker, MarkerArray, TokenKind};

use crate::error::TransformError;
use crate::util::{marker_line_number, skip_space_forward};

pub fn run(markers: &mut MarkerArray, buffer: &mut Buffer) -> Result<(), TransformError> {
    let comma = Marker::from_text(buffer, ",", TokenKind::Comma);
    let space = Marker::from_text(buffer, " ", TokenKind::Space);
    let address_of = Marker::from_text(buffer, "&", TokenKind::Op2);
    let void_cast = Marker::from_text(buffer, "(void*)", TokenKind::Op1);

    let mut cursor = 1usize;
    while cursor < markers.len() {
        let marker = *markers.get(cursor);
        if marker.kind != TokenKind::Op1 {
            cursor += 1;
            continue;
        }
        let text = marker.text(buffer);
        let value_member = text == ".";
        let pointer_member = text == "->";
        if !(value_member || pointer_member) || cursor + 1 >= markers.len() {
            cursor += 1;
            continue;
        }

        let m = skip_space_forward(markers, cursor + 1);
        if m >= markers.len() || markers.get(m).kind != TokenKind::Identifier {
            cursor += 1;
            continue;
        }
        let after_ident = skip_space_forward(markers, m + 1);
        if after_ident >= markers.len() || markers.get(after_ident).kind != TokenKind::TupleStart {
            cursor += 1;
            continue;
        }
        let call_open = after_ident;

        let object_end = {
            let mut e = cursor;
            while e > 0 && markers.get(e - 1).kind.is_trivia() {
                e -= 1;
            }
            e
        };
        let object_start = find_object_start(markers, object_end);

        let mut object: Vec<Marker> = markers.as_slice()[object_start..object_end].to_vec();
        if let Some(last) = object.last() {
            if last.kind == TokenKind::TupleEnd {
                object.pop();
            }
        }
        let first_non_trivia = object.iter().position(|m| !m.kind.is_trivia()).unwrap_or(0);
        object.drain(..first_non_trivia);

        let mut replacement = Vec::with_capacity(object.len() + 4);
        if value_member {
            replacement.push(address_of);
        }
        replacement.push(void_cast);
        replacement.extend_from_slice(&object);
        let arg_start = skip_space_forward(markers, call_open + 1);
        if arg_start >= markers.len() || markers.get(arg_start).kind != TokenKind::TupleEnd {
            replacement.push(comma);
            replacement.push(space);
        }

        tracing::trace!(
            line = marker_line_number(markers, buffer, cursor),
            value_member,
            "inserting self argument before member call"
        );
        let insert_at = call_open + 1;
        let replacement_len = replacement.len();
        markers.splice(insert_at, 0, None, &replacement);
        cursor = insert_at + replacement_len;
    }
    Ok(())
}

/// Walk backward from `end` (exclusive) over the object expression that
/// precedes a `.`/`->`, honoring fence nesting, exactly as
/// `macro_self`'s `found_expression_start` loop does.
fn find_object_start(markers: &MarkerArray, end: usize) -> usize {
    let mut i = end;
    let mut nesting: i64 = 0;
    while i > 0 {
        let kind = markers.get(i - 1).kind;
        match kind {
            TokenKind::Space | TokenKind::Op1 | TokenKind::Op2 | TokenKind::Identifier
            | TokenKind::Number => {}
            TokenKind::IndexEnd => nesting += 1,
            TokenKind::IndexStart => nesting -= 1,
            TokenKind::TupleEnd => {
                if nesting == 0 && i != end {
                    break;
                }
                nesting += 1;
            }
            TokenKind::TupleStart => {
                nesting -= 1;
                if nesting == 0 {
                    i -= 1;
                    break;
                }
            }
            _ => {
                if nesting == 0 {
                    break;
                }
            }
        }
        i -= 1;
    }
    skip_space_forward(markers, i)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cedro_syntax::lex;

    fn unparse(markers: &MarkerArray, buffer: &Buffer) -> String {
        markers.iter().map(|m| m.text(buffer).to_string()).collect()
    }

    #[test]
    fn pointer_member_call() {
        let mut buffer = Buffer::from_bytes(b"#pragma Cedro 1.0 self\nobj->fn(a);\n");
        let mut markers = lex(&buffer, false).unwrap();
        run(&mut markers, &mut buffer).unwrap();
        let out = unparse(&markers, &buffer);
        assert!(out.contains("obj->fn((void*)obj, a);"));
    }

    #[test]
    fn value_member_call() {
        let mut buffer = Buffer::from_bytes(b"#pragma Cedro 1.0 self\nobj.fn(b);\n");
        let mut markers = lex(&buffer, false).unwrap();
        run(&mut markers, &mut buffer).unwrap();
        let out = unparse(&markers, &buffer);
        assert!(out.contains("obj.fn(&(void*)obj, b);"));
    }

    #[test]
    fn no_arguments_no_leading_comma() {
        let mut buffer = Buffer::from_bytes(b"#pragma Cedro 1.0 self\nobj.fn();\n");
        let mut markers = lex(&buffer, false).unwrap();
        run(&mut markers, &mut buffer).unwrap();
        let out = unparse(&markers, &buffer);
        assert!(out.contains("obj.fn(&(void*)obj);"));
    }
}
