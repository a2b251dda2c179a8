//! The slice pass (spec.md §4.5 "Slice").
//!
//! `x[a..b]` becomes `&x[a], &x[b]`; `x[a..+b]` becomes `&x[a], &x[a+b]`
//! (the left index is re-used in the second expression). Grounded on
//! spec.md §4.5 and the concrete scenario in spec.md §8.3, since
//! `examples/original_source/template/tools/cedro/macros/slice.h` was used
//! only to confirm the synthetic-token shape (`&`, `[`, `]`), not
//! transcribed wholesale (see `DESIGN.md`).

use cedro_syntax::{Buffer, Marker, MarkerArray, TokenKind};

use crate::error::TransformError;
use crate::util::{marker_line_number, skip_space_back, skip_space_forward};

pub fn run(markers: &mut MarkerArray, buffer: &mut Buffer) -> Result<(), TransformError> {
    let amp = Marker::from_text(buffer, "&", TokenKind::Op2);
    let comma = Marker::from_text(buffer, ",", TokenKind::Comma);
    let space = Marker::from_text(buffer, " ", TokenKind::Space);
    let index_start = Marker::from_text(buffer, "[", TokenKind::IndexStart);
    let index_end = Marker::from_text(buffer, "]", TokenKind::IndexEnd);
    let plus = Marker::from_text(buffer, "+", TokenKind::Op4);
    let lparen = Marker::from_text(buffer, "(", TokenKind::TupleStart);
    let rparen = Marker::from_text(buffer, ")", TokenKind::TupleEnd);

    let mut cursor = 0usize;
    while cursor < markers.len() {
        if markers.get(cursor).kind != TokenKind::IndexStart {
            cursor += 1;
            continue;
        }
        let bracket_open = cursor;
        let bracket_close = match find_index_end(markers, bracket_open) {
            Some(i) => i,
            None => {
                cursor += 1;
                continue;
            }
        };

        let ellipsis = (bracket_open + 1..bracket_close)
            .find(|&i| markers.get(i).kind == TokenKind::Ellipsis);
        let Some(ellipsis) = ellipsis else {
            cursor = bracket_close + 1;
            continue;
        };

        for i in bracket_open + 1..bracket_close {
            if markers.get(i).kind == TokenKind::Op14 {
                let line = marker_line_number(markers, buffer, i);
                tracing::warn!(line, "assignment inside a slice expression");
                return Err(TransformError::AssignmentInSlice { line });
            }
        }

        let line = marker_line_number(markers, buffer, bracket_open);
        tracing::trace!(line, bracket_open, bracket_close, "expanding slice expression");
        let x_end = skip_space_back(markers, bracket_open);
        let x_start = find_operand_start(markers, x_end);
        let x: Vec<Marker> = markers.as_slice()[x_start..x_end].to_vec();
        let x_is_compound = x.iter().filter(|m| !m.kind.is_trivia()).count() > 1;

        let a_start = skip_space_forward(markers, bracket_open + 1);
        let a_end = skip_space_back(markers, ellipsis);
        let a: Vec<Marker> = markers.as_slice()[a_start..a_end].to_vec();

        let plus_form = markers.get(ellipsis + 1).kind == TokenKind::Op4
            && ellipsis + 1 < bracket_close;
        let b_start = skip_space_forward(markers, ellipsis + if plus_form { 2 } else { 1 });
        let b_end = skip_space_back(markers, bracket_close);
        let b: Vec<Marker> = markers.as_slice()[b_start..b_end].to_vec();

        let wrap = |out: &mut Vec<Marker>, tokens: &[Marker]| {
            if x_is_compound {
                out.push(lparen);
                out.extend_from_slice(tokens);
                out.push(rparen);
            } else {
                out.extend_from_slice(tokens);
            }
        };

        let mut replacement = Vec::with_capacity(2 * (bracket_close - x_start) + 8);
        replacement.push(amp);
        wrap(&mut replacement, &x);
        replacement.push(index_start);
        replacement.extend_from_slice(&a);
        replacement.push(index_end);
        replacement.push(comma);
        replacement.push(space);
        replacement.push(amp);
        wrap(&mut replacement, &x);
        replacement.push(index_start);
        if plus_form {
            replacement.extend_from_slice(&a);
            replacement.push(plus);
            replacement.extend_from_slice(&b);
        } else {
            replacement.extend_from_slice(&b);
        }
        replacement.push(index_end);

        let replacement_len = replacement.len();
        markers.splice(x_start, bracket_close + 1 - x_start, None, &replacement);
        cursor = x_start + replacement_len;
    }
    Ok(())
}

fn find_index_end(markers: &MarkerArray, bracket_open: usize) -> Option<usize> {
    let mut nesting = 0i64;
    let mut i = bracket_open;
    loop {
        match markers.get(i).kind {
            TokenKind::IndexStart => nesting += 1,
            TokenKind::IndexEnd => {
                nesting -= 1;
                if nesting == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
        if i >= markers.len() {
            return None;
        }
    }
}

/// Scan backward from `end` (exclusive) for the start of the operand
/// expression immediately preceding an opening `[`, honoring nested
/// fences and stopping at a statement boundary.
fn find_operand_start(markers: &MarkerArray, end: usize) -> usize {
    let mut i = end;
    let mut nesting: i64 = 0;
    while i > 0 {
        let prev = markers.get(i - 1).kind;
        match prev {
            TokenKind::Identifier
            | TokenKind::Op1
            | TokenKind::TupleEnd
            | TokenKind::IndexEnd
            | TokenKind::Space => {}
            _ if nesting > 0 => {}
            _ => break,
        }
        match prev {
            TokenKind::TupleEnd | TokenKind::IndexEnd => nesting += 1,
            TokenKind::TupleStart | TokenKind::IndexStart => {
                if nesting == 0 {
                    break;
                }
                nesting -= 1;
            }
            _ => {}
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
    fn plus_form_reuses_left_operand() {
        let mut buffer = Buffer::from_bytes(b"#pragma Cedro 1.0\nfn(a[10..+5]);\n");
        let mut markers = lex(&buffer, false).unwrap();
        run(&mut markers, &mut buffer).unwrap();
        let out = unparse(&markers, &buffer);
        assert!(out.contains("fn(&a[10], &a[10+5]);"));
    }

    #[test]
    fn plain_range() {
        let mut buffer = Buffer::from_bytes(b"#pragma Cedro 1.0\nfn(a[1..2]);\n");
        let mut markers = lex(&buffer, false).unwrap();
        run(&mut markers, &mut buffer).unwrap();
        let out = unparse(&markers, &buffer);
        assert!(out.contains("fn(&a[1], &a[2]);"));
    }
}
