//! The backstitch pass (spec.md §4.3).
//!
//! Ported from `examples/original_source/src/macros/backstitch.h`'s
//! `macro_backstitch`: rewrites `OBJECT @ SEG1, SEG2, ...;` into
//! `SEG1', SEG2', ...;`, threading `OBJECT` into each segment at a
//! segment-specific insertion point.

use cedro_syntax::{Buffer, Marker, MarkerArray, TokenKind};

use crate::error::TransformError;
use crate::util::{find_line_end, find_line_start, indentation, marker_line_number, skip_space_back, skip_space_forward};

/// Run the backstitch pass over `markers`, interning synthetic tokens into
/// `buffer` as needed. Errors are non-fatal per occurrence: spec.md §4.3's
/// "Error conditions" leave the surrounding pass free to continue scanning
/// (matching the source's `eprintln`-and-`return`/`continue` shape), so this
/// returns the first error encountered while still attempting to apply
/// every backstitch site before it.
pub fn run(markers: &mut MarkerArray, buffer: &mut Buffer) -> Result<(), TransformError> {
    let comma = Marker::from_text(buffer, ",", TokenKind::Comma);
    let semicolon = Marker::from_text(buffer, ";", TokenKind::Semicolon);
    let space = Marker::from_text(buffer, " ", TokenKind::Space);
    let newline = Marker::from_text(buffer, "\n", TokenKind::Space);

    let mut cursor = 0usize;
    while cursor < markers.len() {
        if markers.get(cursor).kind != TokenKind::Backstitch {
            cursor += 1;
            continue;
        }
        match apply_one(markers, buffer, cursor, comma, semicolon, space, newline)? {
            Some(next_cursor) => cursor = next_cursor,
            None => cursor += 1,
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn apply_one(
    markers: &mut MarkerArray,
    buffer: &mut Buffer,
    at_sign: usize,
    comma: Marker,
    semicolon: Marker,
    space: Marker,
    newline: Marker,
) -> Result<Option<usize>, TransformError> {
    let end = markers.len();
    let line = marker_line_number(markers, buffer, at_sign);
    tracing::trace!(line, at_sign, "applying backstitch");
    let mut first_segment_start = skip_space_forward(markers, at_sign + 1);
    if first_segment_start == end {
        tracing::warn!(line, "unterminated backstitch line");
        return Err(TransformError::UnfinishedBackstitch { line });
    }

    let mut prefix: Option<Marker> = None;
    let mut suffix: Option<Marker> = None;
    if markers.get(first_segment_start).kind == TokenKind::Ellipsis {
        first_segment_start = skip_space_forward(markers, first_segment_start + 1);
        if first_segment_start == end {
            tracing::warn!(line, "unfinished affix declarator after `..`");
            return Err(TransformError::UnfinishedAffixDeclarator { line });
        }
        if markers.get(first_segment_start).kind != TokenKind::Identifier {
            let bad_line = marker_line_number(markers, buffer, first_segment_start);
            tracing::warn!(line = bad_line, "prefix declarator is not an identifier");
            return Err(TransformError::InvalidPrefixDeclarator { line: bad_line });
        }
        suffix = Some(*markers.get(first_segment_start));
        first_segment_start += 1;
        first_segment_start = skip_space_forward(markers, first_segment_start);
    } else if markers.get(first_segment_start).kind == TokenKind::Identifier {
        let m = skip_space_forward(markers, first_segment_start + 1);
        if m < end && markers.get(m).kind == TokenKind::Ellipsis {
            prefix = Some(*markers.get(first_segment_start));
            first_segment_start = skip_space_forward(markers, m + 1);
        }
    }

    let start_of_line = find_line_start(markers, at_sign, 0, line)?;
    let mut object_indentation = indentation(markers, buffer, start_of_line, true, line)?
        .unwrap_or(newline);
    if object_indentation.kind != TokenKind::Space {
        object_indentation = newline;
    }

    // Trim space before object.
    let object_lower_bound = skip_space_forward(markers, start_of_line).min(at_sign);
    // Boost precedence to 13.5: stop the object scan at OP_14/COMMA.
    let mut object_start = at_sign;
    while object_start != object_lower_bound {
        object_start -= 1;
        let k = markers.get(object_start).kind;
        if k == TokenKind::Op14 || k == TokenKind::Comma {
            object_start += 1;
            object_start = skip_space_forward(markers, object_start);
            break;
        }
    }
    // Trim space after object, between it and the backstitch operator.
    let object_end = skip_space_back(markers, at_sign);
    let object_start = object_start.min(object_end);

    let end_of_line_raw = find_line_end(markers, first_segment_start, end, line)?;
    let end_of_line = skip_space_back(markers, end_of_line_raw);
    let ends_with_semicolon =
        end_of_line_raw < end && markers.get(end_of_line_raw).kind == TokenKind::Semicolon;

    let object_slice: Vec<Marker> = markers.as_slice()[object_start..object_end].to_vec();

    let mut replacement: Vec<Marker> = Vec::with_capacity(2 * (end_of_line - object_start));
    let mut segment_start = first_segment_start;
    let mut segment_end = segment_start;
    let mut nesting: i64 = 0;
    while segment_end < end_of_line {
        while segment_end < end_of_line {
            let kind = markers.get(segment_end).kind;
            if nesting == 0 && kind == TokenKind::Comma {
                break;
            }
            match kind {
                k if k.is_fence_start() => nesting += 1,
                k if k.is_fence_end() => nesting -= 1,
                TokenKind::Ellipsis => {
                    let bad_line = marker_line_number(markers, buffer, segment_end);
                    tracing::warn!(line = bad_line, "`..` inside a backstitch segment");
                    return Err(TransformError::InvalidPrefixDeclarator { line: bad_line });
                }
                _ => {}
            }
            segment_end += 1;
        }
        if nesting != 0 {
            let bad_line = marker_line_number(markers, buffer, segment_start);
            tracing::warn!(line = bad_line, "unclosed group in backstitch segment");
            return Err(TransformError::UnclosedGroup { line: bad_line });
        }
        segment_end = skip_space_back(markers, segment_end);
        if segment_end == segment_start {
            // Empty segment: skip one token and continue (spec.md §4.3
            // "empty backstitch segment" warning; tolerated, not fatal).
            tracing::trace!(segment_start, "empty backstitch segment, skipping");
            segment_start += 1;
            segment_end = segment_start;
            if segment_start < end_of_line {
                continue;
            } else {
                break;
            }
        }

        emit_segment(
            markers,
            &object_slice,
            prefix,
            suffix,
            segment_start,
            segment_end,
            &mut replacement,
            comma,
            space,
        );

        if segment_end < end_of_line {
            if ends_with_semicolon {
                replacement.push(semicolon);
                replacement.push(object_indentation);
            } else {
                replacement.push(comma);
                replacement.push(space);
            }
            segment_start = skip_space_forward(markers, segment_end + 1);
            segment_end = segment_start;
        }
    }

    let replacement_len = replacement.len();
    markers.splice(object_start, end_of_line - object_start, None, &replacement);
    Ok(Some(object_start + replacement_len))
}

#[allow(clippy::too_many_arguments)]
fn emit_segment(
    markers: &MarkerArray,
    object: &[Marker],
    prefix: Option<Marker>,
    suffix: Option<Marker>,
    segment_start: usize,
    segment_end: usize,
    out: &mut Vec<Marker>,
    comma: Marker,
    space: Marker,
) {
    let starts_method_like = matches!(
        markers.get(segment_start).kind,
        TokenKind::IndexStart | TokenKind::Op1 | TokenKind::Op14
    ) || object.is_empty();

    let mut insertion_point = segment_start;
    let mut inside_parenthesis = false;
    if !starts_method_like {
        let mut is_function_call = true;
        while insertion_point < segment_end {
            let t = markers.get(insertion_point).kind;
            if t == TokenKind::Identifier {
                is_function_call = true;
            } else if t.is_keyword() {
                is_function_call = false;
            } else if t == TokenKind::TupleStart {
                if insertion_point != segment_start && is_function_call {
                    inside_parenthesis = true;
                }
            } else if t == TokenKind::BlockStart || t == TokenKind::Op13 {
                break;
            }
            insertion_point += 1;
            if inside_parenthesis {
                break;
            }
        }
        if insertion_point == segment_end {
            insertion_point = segment_start;
        }
    }
    tracing::trace!(
        segment_start,
        segment_end,
        insertion_point,
        starts_method_like,
        inside_parenthesis,
        "computed backstitch segment insertion point"
    );

    if insertion_point == segment_start {
        if !object.is_empty() {
            out.extend_from_slice(object);
            if segment_start + 1 < segment_end && markers.get(segment_start + 1).kind == TokenKind::Space {
                out.push(space);
            }
        }
        if let Some(p) = prefix {
            out.push(p);
        }
        if let Some(s) = suffix {
            out.push(*markers.get(insertion_point));
            insertion_point += 1;
            out.push(s);
        }
        out.extend_from_slice(&markers.as_slice()[insertion_point..segment_end]);
        return;
    }

    let mut slice_start = segment_start;
    let slice_end;
    if prefix.is_some() || suffix.is_some() {
        let mut e = insertion_point;
        while e != segment_start {
            e -= 1;
            if markers.get(e).kind == TokenKind::Identifier {
                break;
            }
        }
        out.extend_from_slice(&markers.as_slice()[slice_start..e]);
        if let Some(p) = prefix {
            out.push(p);
        } else {
            out.push(*markers.get(e));
            if let Some(s) = suffix {
                out.push(s);
            }
        }
        slice_start = e + 1;
        slice_end = insertion_point;
    } else {
        slice_end = insertion_point;
    }
    out.extend_from_slice(&markers.as_slice()[slice_start..slice_end]);

    if !object.is_empty() {
        out.extend_from_slice(object);
        if inside_parenthesis {
            if insertion_point < markers.len() && markers.get(insertion_point).kind != TokenKind::TupleEnd {
                out.push(comma);
                out.push(space);
            }
        } else {
            out.push(space);
        }
    }
    out.extend_from_slice(&markers.as_slice()[insertion_point..segment_end]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use cedro_syntax::lex;

    fn unparse(markers: &MarkerArray, buffer: &Buffer) -> String {
        markers
            .iter()
            .map(|m| m.text(buffer).to_string())
            .collect()
    }

    fn run_case(source: &str) -> String {
        let mut buffer = Buffer::from_bytes(source.as_bytes());
        let mut markers = lex(&buffer, false).unwrap();
        run(&mut markers, &mut buffer).unwrap();
        unparse(&markers, &buffer)
    }

    #[test]
    fn prefix_calls_both_segments() {
        let out = run_case(
            "#pragma Cedro 1.0\nvg @ nvgBeginPath(), nvgFill();\n",
        );
        assert!(out.contains("nvgBeginPath(vg), nvgFill(vg);"));
    }

    #[test]
    fn method_like_chaining() {
        let out = run_case("#pragma Cedro 1.0\nv @ .push_back(x);\n");
        assert!(out.contains("v.push_back(x);"));
    }

    #[test]
    fn empty_object_call_template_unchanged() {
        let out = run_case("#pragma Cedro 1.0\n@ f(a), g(b);\n");
        assert!(out.contains("f(a), g(b);"));
    }
}
