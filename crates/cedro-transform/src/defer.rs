//! The defer pass (spec.md §4.4).
//!
//! Ported from `examples/original_source/src/macros/defer.h`'s
//! `macro_defer`: a block-nesting stack paired with a stack of pending
//! deferred actions, each tagged with the block depth it was registered
//! at. Every control-flow exit edge (a `}` with pending actions below it,
//! or a `break`/`continue`/`goto`/`return`) gets the relevant actions
//! spliced in, most-recently-registered first.

use cedro_syntax::{Buffer, Marker, MarkerArray, TokenKind};

use crate::error::TransformError;
use crate::util::{
    find_line_end, find_line_start, find_matching_fence, indentation, marker_line_number,
    skip_space_forward,
};

struct PendingAction {
    level: usize,
    action: Vec<Marker>,
}

fn are_there_pending(pending: &[PendingAction], level: usize) -> bool {
    pending.last().is_some_and(|a| a.level >= level)
}

fn exit_level(pending: &mut Vec<PendingAction>, level: usize) {
    let mut cut = pending.len();
    while cut > 0 && pending[cut - 1].level >= level {
        cut -= 1;
    }
    pending.truncate(cut);
}

/// Append the pending actions at or above `level`, most-recent first,
/// each separated from the previous by `indent`/`extra_indent`.
fn push_actions(
    out: &mut Vec<Marker>,
    pending: &[PendingAction],
    level: usize,
    indent: Marker,
    extra_indent: Option<Marker>,
) {
    let mut first = true;
    for action in pending.iter().rev() {
        if action.level < level {
            break;
        }
        if !first {
            out.push(indent);
            if let Some(extra) = extra_indent {
                out.push(extra);
            }
        }
        out.extend_from_slice(&action.action);
        first = false;
    }
}

pub fn run(markers: &mut MarkerArray, buffer: &mut Buffer) -> Result<(), TransformError> {
    let space = Marker::from_text(buffer, " ", TokenKind::Space);
    let block_start_tok = Marker::from_text(buffer, "{", TokenKind::BlockStart);
    let block_end_tok = Marker::from_text(buffer, "}", TokenKind::BlockEnd);

    let mut block_stack: Vec<TokenKind> = Vec::new();
    let mut pending: Vec<PendingAction> = Vec::new();
    let mut indent_one_level: Option<Marker> = None;

    let mut cursor = 0usize;
    while cursor < markers.len() {
        let kind = markers.get(cursor).kind;
        match kind {
            TokenKind::BlockStart => {
                let governing = governing_kind(markers, cursor);
                block_stack.push(governing);
                cursor += 1;
                if indent_one_level.is_none()
                    && cursor < markers.len()
                    && markers.get(cursor).kind == TokenKind::Space
                {
                    let m = *markers.get(cursor);
                    let text = m.text(buffer);
                    if let Some(pos) = text.rfind('\n') {
                        indent_one_level =
                            Some(Marker::new(m.start + pos + 1, m.len - (pos + 1), TokenKind::Space));
                    }
                }
            }
            TokenKind::BlockEnd => {
                let block_level = block_stack.len();
                if !are_there_pending(&pending, block_level) {
                    block_stack.pop();
                    cursor += 1;
                    continue;
                }

                if previous_statement_diverts(markers, cursor) {
                    exit_level(&mut pending, block_stack.len());
                    block_stack.pop();
                    cursor += 1;
                    continue;
                }

                let line = marker_line_number(markers, buffer, cursor);
                let between = indentation(markers, buffer, cursor, false, line)?.unwrap_or(space);
                let insertion_point =
                    if cursor > 0 && markers.get(cursor - 1).kind == TokenKind::Space {
                        cursor - 1
                    } else {
                        cursor
                    };

                let mut ins = Vec::new();
                if markers.get(insertion_point).kind == TokenKind::Space {
                    ins.push(*markers.get(insertion_point));
                    if let Some(iol) = indent_one_level {
                        ins.push(iol);
                    }
                }
                push_actions(&mut ins, &pending, block_level, between, indent_one_level);
                tracing::trace!(
                    line,
                    block_level,
                    pending = pending.len(),
                    "splicing deferred actions at block exit"
                );

                let shift = ins.len();
                markers.splice(insertion_point, 0, None, &ins);
                exit_level(&mut pending, block_stack.len());
                block_stack.pop();
                cursor = cursor + shift + 1;
            }
            TokenKind::ControlFlowBreak
            | TokenKind::ControlFlowContinue
            | TokenKind::ControlFlowGoto
            | TokenKind::ControlFlowReturn => {
                let line = marker_line_number(markers, buffer, cursor);
                let block_level = match kind {
                    TokenKind::ControlFlowReturn => 0,
                    TokenKind::ControlFlowBreak => exit_target(&block_stack, line, true)
                        .map_err(|_| {
                            tracing::warn!(line, "break outside loop or switch");
                            TransformError::BreakOutsideLoop { line }
                        })?,
                    TokenKind::ControlFlowContinue => exit_target(&block_stack, line, false)
                        .map_err(|_| {
                            tracing::warn!(line, "continue outside loop");
                            TransformError::ContinueOutsideLoop { line }
                        })?,
                    TokenKind::ControlFlowGoto => {
                        resolve_goto_level(markers, buffer, cursor, &block_stack)?
                    }
                    _ => unreachable!(),
                };

                if !are_there_pending(&pending, block_level) {
                    cursor += 1;
                    continue;
                }

                let mut line_start = find_line_start(markers, cursor, 0, line)?;
                let mut line_end = find_line_end(markers, cursor, markers.len(), line)?;
                if line_end < markers.len() && markers.get(line_end).kind == TokenKind::Semicolon {
                    line_end += 1;
                }
                let first_sig = skip_space_forward(markers, line_start);
                let needs_wrap = line_start != 0
                    && matches!(
                        markers.get(first_sig).kind,
                        TokenKind::ControlFlowIf | TokenKind::ControlFlowLoop
                    );
                let between =
                    indentation(markers, buffer, line_start, true, line)?.unwrap_or(space);
                // `indent_one_level` only makes sense stacked after a
                // newline-carrying `between`; on a same-line wrap (the
                // common case for a single-line `if`/loop body) `between`
                // is just a flat space and the extra indent is dropped.
                let between_carries_newline = between.text(buffer).contains('\n');
                let wrap_indent = if between_carries_newline {
                    indent_one_level
                } else {
                    None
                };

                // `cursor`'s own position determines the insertion point,
                // not `line_start`: when wrapping, only the exiting
                // statement itself (e.g. "return -1;") moves inside the new
                // `{ }`, leaving a governing "if (cond) "/"for (...) " intact.
                let statement_insertion_point =
                    if cursor > 0 && markers.get(cursor - 1).kind == TokenKind::Space {
                        cursor - 1
                    } else {
                        cursor
                    };

                let (insertion_point, delete_count, ins) = if needs_wrap {
                    let insertion_point = skip_space_forward(markers, statement_insertion_point);
                    let original: Vec<Marker> =
                        markers.as_slice()[insertion_point..line_end].to_vec();
                    let mut ins = Vec::new();
                    ins.push(block_start_tok);
                    ins.push(between);
                    if let Some(iol) = wrap_indent {
                        ins.push(iol);
                    }
                    push_actions(&mut ins, &pending, block_level, between, wrap_indent);
                    ins.push(between);
                    if let Some(iol) = wrap_indent {
                        ins.push(iol);
                    }
                    ins.extend_from_slice(&original);
                    ins.push(between);
                    ins.push(block_end_tok);
                    (insertion_point, line_end - insertion_point, ins)
                } else {
                    let mut between2 = between;
                    if markers.get(line_start).kind == TokenKind::Space
                        && !markers.get(line_start).text(buffer).contains('\n')
                    {
                        between2 = space;
                    }
                    let insertion_point = statement_insertion_point;
                    let mut ins = Vec::new();
                    if markers.get(insertion_point).kind == TokenKind::Space {
                        ins.push(*markers.get(insertion_point));
                    }
                    push_actions(&mut ins, &pending, block_level, between2, None);
                    (insertion_point, 0, ins)
                };

                let shift = ins.len() as isize - delete_count as isize;
                markers.splice(insertion_point, delete_count, None, &ins);
                cursor = (cursor as isize + shift) as usize + 1;
            }
            TokenKind::TypeQualifierAuto | TokenKind::ControlFlowDefer => {
                let line = marker_line_number(markers, buffer, cursor);
                let action_start = skip_space_forward(markers, cursor + 1);
                let action_end = defer_action_end(markers, action_start, line)?;
                if action_end == action_start {
                    tracing::warn!(line, "empty defer statement");
                    return Err(TransformError::EmptyDeferStatement { line });
                }
                let line_start = find_line_start(markers, cursor, 0, line)?;
                let action_tokens: Vec<Marker> =
                    markers.as_slice()[action_start..action_end].to_vec();
                markers.splice(line_start, action_end - line_start, None, &[]);
                tracing::trace!(
                    line,
                    level = block_stack.len(),
                    "registering deferred action"
                );
                pending.push(PendingAction {
                    level: block_stack.len(),
                    action: action_tokens,
                });
                cursor = line_start;
            }
            _ => cursor += 1,
        }
    }
    Ok(())
}

fn governing_kind(markers: &MarkerArray, block_start: usize) -> TokenKind {
    let mut statement = block_start;
    let mut nesting: i64 = 0;
    while statement != 0 {
        statement -= 1;
        let k = markers.get(statement).kind;
        match k {
            TokenKind::TupleEnd => nesting += 1,
            TokenKind::TupleStart => {
                if nesting > 0 {
                    nesting -= 1;
                }
            }
            _ if nesting == 0 && !k.is_trivia() => {
                if !matches!(
                    k,
                    TokenKind::Identifier
                        | TokenKind::ControlFlowIf
                        | TokenKind::ControlFlowLoop
                        | TokenKind::ControlFlowSwitch
                ) {
                    statement = block_start;
                }
                break;
            }
            _ => {}
        }
    }
    markers.get(statement).kind
}

/// Whether the statement immediately preceding `block_end` already diverts
/// control flow (and so already emitted the pending actions itself).
fn previous_statement_diverts(markers: &MarkerArray, block_end: usize) -> bool {
    if block_end == 0 {
        return false;
    }
    let mut previous = block_end;
    while previous > 0 && markers.get(previous - 1).kind.is_trivia() {
        previous -= 1;
    }
    if previous == 0 {
        return false;
    }
    let line_start = match find_line_start(markers, previous - 1, 0, 0) {
        Ok(i) => i,
        Err(_) => return false,
    };
    let first = skip_space_forward(markers, line_start);
    first < markers.len()
        && matches!(
            markers.get(first).kind,
            TokenKind::ControlFlowBreak
                | TokenKind::ControlFlowContinue
                | TokenKind::ControlFlowGoto
                | TokenKind::ControlFlowReturn
        )
}

/// `break`'s target level is the nearest enclosing loop or switch;
/// `continue`'s is the nearest enclosing loop.
fn exit_target(block_stack: &[TokenKind], _line: usize, is_break: bool) -> Result<usize, ()> {
    if block_stack.is_empty() {
        return Err(());
    }
    let mut level = block_stack.len();
    while level > 0 {
        level -= 1;
        let matches_target = if is_break {
            matches!(
                block_stack[level],
                TokenKind::ControlFlowLoop | TokenKind::ControlFlowSwitch
            )
        } else {
            block_stack[level] == TokenKind::ControlFlowLoop
        };
        if matches_target {
            level += 1;
            return Ok(level);
        }
    }
    Ok(0)
}

/// Resolve `goto`'s target block level by locating its label, searching
/// forward then backward within the enclosing function, and taking the
/// minimum block level traversed. An unresolved label conservatively
/// leaves the level at the current block depth (spec.md §4.4 "Failure
/// semantics").
fn resolve_goto_level(
    markers: &MarkerArray,
    buffer: &Buffer,
    cursor: usize,
    block_stack: &[TokenKind],
) -> Result<usize, TransformError> {
    let line = marker_line_number(markers, buffer, cursor);
    if block_stack.is_empty() {
        tracing::warn!(line, "goto outside function");
        return Err(TransformError::GotoOutsideFunction { line });
    }
    let mut function_level = block_stack.len();
    {
        let mut level = block_stack.len();
        while level > 0 {
            level -= 1;
            if block_stack[level] == TokenKind::Identifier {
                function_level = level + 1;
                break;
            }
        }
    }

    let label_pos = skip_space_forward(markers, cursor + 1);
    if label_pos >= markers.len() || markers.get(label_pos).kind != TokenKind::Identifier {
        tracing::warn!(line, "goto without a label");
        return Err(TransformError::GotoWithoutLabel { line });
    }
    let label_text = markers.get(label_pos).text(buffer).to_string();
    tracing::trace!(line, label = %label_text, "resolving goto target level");

    let base_level = block_stack.len();
    let mut best: Option<usize> = None;

    let mut nesting = base_level as i64;
    let mut i = cursor + 1;
    while i < markers.len() && nesting >= function_level as i64 {
        match markers.get(i).kind {
            TokenKind::BlockStart => nesting += 1,
            TokenKind::BlockEnd => {
                nesting -= 1;
                if nesting < best.unwrap_or(i64::MAX) {
                    best = Some(nesting.max(0) as usize);
                }
            }
            TokenKind::ControlFlowLabel if markers.get(i).text(buffer) == label_text => {
                best = Some(nesting.max(0) as usize);
                return Ok(best.unwrap() + 1);
            }
            _ => {}
        }
        i += 1;
    }

    nesting = base_level as i64;
    let mut j = cursor;
    while j > 0 && nesting >= function_level as i64 {
        j -= 1;
        match markers.get(j).kind {
            TokenKind::BlockEnd => nesting += 1,
            TokenKind::BlockStart => {
                nesting -= 1;
                if nesting < best.unwrap_or(i64::MAX) {
                    best = Some(nesting.max(0) as usize);
                }
            }
            TokenKind::ControlFlowLabel if markers.get(j).text(buffer) == label_text => {
                return Ok(nesting.max(0) as usize + 1);
            }
            _ => {}
        }
    }

    Ok(block_stack.len())
}

fn defer_action_end(
    markers: &MarkerArray,
    action_start: usize,
    line: usize,
) -> Result<usize, TransformError> {
    let end = markers.len();
    if matches!(
        markers.get(action_start).kind,
        TokenKind::ControlFlowIf | TokenKind::ControlFlowLoop
    ) {
        let mut e = skip_space_forward(markers, action_start + 1);
        let mut nesting: i64 = 0;
        while e < end {
            match markers.get(e).kind {
                TokenKind::TupleStart => nesting += 1,
                TokenKind::TupleEnd => {
                    nesting -= 1;
                    if nesting == 0 {
                        e += 1;
                        break;
                    }
                }
                _ => {}
            }
            e += 1;
        }
        e = skip_space_forward(markers, e);
        if e < end && markers.get(e).kind == TokenKind::BlockStart {
            find_matching_fence(markers, e, end, line)
        } else {
            let mut le = find_line_end(markers, e, end, line)?;
            if le < end {
                le += 1;
            }
            Ok(le)
        }
    } else {
        let mut le = find_line_end(markers, action_start, end, line)?;
        if le < end {
            le += 1;
        }
        Ok(le)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cedro_syntax::lex;

    fn unparse(markers: &MarkerArray, buffer: &Buffer) -> String {
        markers.iter().map(|m| m.text(buffer).to_string()).collect()
    }

    #[test]
    fn early_return_gets_deferred_free() {
        let mut buffer = Buffer::from_bytes(
            b"#pragma Cedro 1.0\nint f(int n) {\n  char* p = malloc(n); auto free(p); if (!p) return -1; return 0;\n}\n",
        );
        let mut markers = lex(&buffer, false).unwrap();
        run(&mut markers, &mut buffer).unwrap();
        let out = unparse(&markers, &buffer);
        assert_eq!(out.matches("free(p);").count(), 2);
        assert!(out.contains("if (!p) { free(p); return -1; }"));
        assert!(out.contains("free(p); return 0;"));
    }

    #[test]
    fn break_outside_loop_is_error() {
        let mut buffer = Buffer::from_bytes(b"#pragma Cedro 1.0\nvoid f() { break; }\n");
        let mut markers = lex(&buffer, false).unwrap();
        assert!(run(&mut markers, &mut buffer).is_err());
    }
}
