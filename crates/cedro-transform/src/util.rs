//! Cursor-scanning utilities shared by every pass (spec.md §2.1, §4.7).
//!
//! Ported from `examples/original_source/src/cedro.c`'s
//! `skip_space_forward`/`skip_space_back`/`find_matching_fence`/
//! `find_line_start`/`find_line_end`/`indentation`/`line_number`, adapted
//! from raw-pointer arithmetic over a `Marker_p` to index arithmetic over a
//! [`MarkerArray`] (spec.md §3 "Ownership": passes must recompute indices
//! around any splice, never hold a pointer across one).

use cedro_syntax::{Buffer, Marker, MarkerArray, TokenKind};

use crate::error::TransformError;

/// Index of the first non-trivia marker at or after `index`.
pub fn skip_space_forward(markers: &MarkerArray, index: usize) -> usize {
    let mut i = index;
    while i < markers.len() && markers.get(i).kind.is_trivia() {
        i += 1;
    }
    i
}

/// Index one past the last non-trivia marker before `index`, i.e. trims
/// trailing trivia from `[start, index)`.
pub fn skip_space_back(markers: &MarkerArray, index: usize) -> usize {
    let mut i = index;
    while i > 0 && markers.get(i - 1).kind.is_trivia() {
        i -= 1;
    }
    i
}

/// Advance from an opening fence at `index` to one past its matching
/// closing fence.
pub fn find_matching_fence(
    markers: &MarkerArray,
    index: usize,
    end: usize,
    line: usize,
) -> Result<usize, TransformError> {
    let mut cursor = index;
    let mut nesting: i64 = 0;
    loop {
        let kind = markers.get(cursor).kind;
        if kind.is_fence_start() {
            nesting += 1;
        } else if kind.is_fence_end() {
            nesting -= 1;
        }
        cursor += 1;
        if cursor >= end || nesting == 0 {
            break;
        }
    }
    if nesting != 0 || cursor >= end {
        return Err(TransformError::UnclosedGroup { line });
    }
    Ok(cursor)
}

/// Index of the start of the statement containing `cursor`, not looking
/// back before `start`.
pub fn find_line_start(
    markers: &MarkerArray,
    cursor: usize,
    start: usize,
    line: usize,
) -> Result<usize, TransformError> {
    let mut i = cursor + 1;
    let mut nesting: i64 = 0;
    let mut found = None;
    while i != start {
        i -= 1;
        match markers.get(i).kind {
            TokenKind::Semicolon | TokenKind::LabelColon | TokenKind::BlockStart
            | TokenKind::BlockEnd | TokenKind::Preprocessor => {
                if nesting == 0 && i != cursor {
                    found = Some(i + 1);
                    break;
                }
            }
            TokenKind::TupleStart | TokenKind::IndexStart => {
                if nesting == 0 {
                    found = Some(i + 1);
                    break;
                } else {
                    nesting -= 1;
                }
            }
            TokenKind::TupleEnd | TokenKind::IndexEnd => {
                nesting += 1;
            }
            _ => {}
        }
    }
    let start_of_line = found.unwrap_or(start);
    if nesting != 0 || start_of_line < start {
        return Err(TransformError::ExcessGroupClosings { line });
    }
    Ok(start_of_line)
}

/// Index of the end of the statement containing `cursor` (the terminating
/// `;`/label colon/backstitch or unmatched closing fence), not looking
/// past `end`.
pub fn find_line_end(
    markers: &MarkerArray,
    cursor: usize,
    end: usize,
    line: usize,
) -> Result<usize, TransformError> {
    let mut i = cursor;
    let mut nesting: i64 = 0;
    while i != end {
        match markers.get(i).kind {
            TokenKind::Semicolon | TokenKind::LabelColon | TokenKind::Backstitch => {
                if nesting == 0 {
                    return Ok(i);
                }
            }
            TokenKind::BlockStart | TokenKind::TupleStart | TokenKind::IndexStart => {
                nesting += 1;
            }
            TokenKind::BlockEnd | TokenKind::TupleEnd | TokenKind::IndexEnd => {
                if nesting == 0 {
                    return Ok(i);
                }
                nesting -= 1;
            }
            _ => {}
        }
        i += 1;
    }
    Err(TransformError::UnclosedGroup { line })
}

/// The indentation (leading whitespace of the line) covering `cursor`.
/// If `already_at_line_start` is false, `cursor` is first resolved to its
/// containing line's start. Returns `None` if there is no indentation
/// (e.g. the first line of the file).
pub fn indentation(
    markers: &MarkerArray,
    buffer: &Buffer,
    cursor: usize,
    already_at_line_start: bool,
    line: usize,
) -> Result<Option<Marker>, TransformError> {
    let mut i = if already_at_line_start {
        cursor
    } else {
        find_line_start(markers, cursor, 0, line)?
    };
    if markers.get(i).kind != TokenKind::Space {
        return Ok(None);
    }
    let mut best = *markers.get(i);
    let end = markers.len();
    loop {
        i += 1;
        if i == end {
            break;
        }
        let kind = markers.get(i).kind;
        if kind == TokenKind::Space {
            let m = markers.get(i);
            if m.text(buffer).contains('\n') {
                best = *m;
            }
        } else if kind != TokenKind::Comment {
            break;
        }
    }
    // Trim to the text after the last '\n', dropping any blank lines.
    let text = best.text(buffer);
    if let Some(pos) = text.rfind('\n') {
        let new_start = best.start + pos + 1;
        let new_len = best.len - (pos + 1);
        best = Marker::new(new_start, new_len, TokenKind::Space);
    }
    Ok(Some(best))
}

/// 1-based line number of `position` within `buffer`.
pub fn line_number(buffer: &Buffer, position: usize) -> usize {
    1 + buffer.as_slice()[..position.min(buffer.len())]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
}

/// 1-based line number of the marker at `index`.
pub fn marker_line_number(markers: &MarkerArray, buffer: &Buffer, index: usize) -> usize {
    let position = if index < markers.len() {
        markers.get(index).start
    } else {
        buffer.len()
    };
    line_number(buffer, position)
}
