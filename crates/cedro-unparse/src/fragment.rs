//! The marker-to-bytes emitter and directive-family expansion
//! (spec.md §2 item 6, §4.6).
//!
//! Ported from `examples/original_source/src/cedro.c`'s
//! `unparse`/`unparse_fragment`/`unparse_foreach`/`write_pending_space`:
//! a single left-to-right sweep over the marker array with a one-token
//! lookahead for pending whitespace (so a `#line` directive can be
//! slotted in at the next newline instead of splitting a token run), and
//! inline dispatch on `PREPROCESSOR` markers for the four block-directive
//! forms. The recursive structure (a nested `#foreach` re-enters this same
//! sweep on its body range) mirrors the original's own recursion through
//! `unparse_fragment`/`unparse_foreach`.

use std::path::Path;

use cedro_syntax::{Buffer, Marker, MarkerArray, TokenKind};

use crate::error::UnparseError;
use crate::include::{IncludeOutcome, IncludeResolver};
use crate::options::Options;
use crate::replacement::{self, Replacement};
use crate::ucn::escape_identifier;

const RIGHT_MARGIN: usize = 78;

pub(crate) struct Emitter<'a> {
    pub buffer: &'a Buffer,
    pub src_file_name: &'a str,
    pub source_dir: &'a Path,
    pub options: Options,
    pub include: &'a mut dyn IncludeResolver,
}

/// Byte-offset-to-1-based-line-number lookup (spec.md §4.7), duplicated
/// here rather than imported from `cedro-transform`: both crates are leaf
/// consumers of `cedro-syntax` and neither otherwise depends on the other.
fn line_number(buffer: &Buffer, position: usize) -> usize {
    1 + buffer.as_slice()[..position.min(buffer.len())]
        .iter()
        .filter(|&&b| b == b'\n')
        .count()
}

fn skip_trivia_forward(markers: &MarkerArray, mut i: usize, end: usize) -> usize {
    while i < end && markers.get(i).kind.is_trivia() {
        i += 1;
    }
    i
}

fn trim_trivia(v: &[Marker]) -> (usize, usize) {
    let mut s = 0;
    let mut e = v.len();
    while s < e && v[s].kind == TokenKind::Space {
        s += 1;
    }
    while e > s && v[e - 1].kind == TokenKind::Space {
        e -= 1;
    }
    (s, e)
}

fn find_matching_close(markers: &MarkerArray, start: usize, end: usize) -> Option<usize> {
    let mut nesting: i64 = 0;
    let mut i = start;
    while i < end {
        match markers.get(i).kind {
            k if k.is_fence_start() => nesting += 1,
            k if k.is_fence_end() => {
                nesting -= 1;
                if nesting == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Split a flat token slice on its top-level commas (spec.md §4.6
/// `#foreach` value-list / tuple-row splitting). Shared between the
/// top-level `{a, b, c}` value list and a per-row `{T, N}` tuple.
fn split_top_level(markers: &[Marker]) -> Result<Vec<Vec<Marker>>, UnparseError> {
    let mut parts = Vec::new();
    let mut seg_start = 0usize;
    let mut nesting: i64 = 0;
    for (i, marker) in markers.iter().enumerate() {
        match marker.kind {
            k if k.is_fence_start() => nesting += 1,
            k if k.is_fence_end() => {
                if nesting == 0 {
                    return Err(UnparseError::UnbalancedGroupInForeachValue);
                }
                nesting -= 1;
            }
            TokenKind::Comma if nesting == 0 => {
                parts.push(markers[seg_start..i].to_vec());
                seg_start = i + 1;
            }
            _ => {}
        }
    }
    if nesting != 0 {
        return Err(UnparseError::UnbalancedGroupInForeachValue);
    }
    parts.push(markers[seg_start..].to_vec());
    Ok(parts)
}

fn write_token(m: &Marker, em: &Emitter, out: &mut String) {
    let text = m.text(em.buffer);
    if em.options.escape_ucn && m.kind == TokenKind::Identifier {
        out.push_str(&escape_identifier(text));
    } else {
        out.push_str(text);
    }
}

fn write_directive_error(err: UnparseError, m: &Marker, em: &Emitter, out: &mut String) {
    tracing::warn!(position = m.start, "{err}");
    let line = line_number(em.buffer, m.start);
    out.push_str(&format!(
        "\n#line {line} \"{}\"\n#error {err}\n",
        em.src_file_name
    ));
}

/// Flush a pending space marker, inserting a queued `#line` directive at
/// its last newline if one was pending (spec.md §4.6 "Line-directive
/// bookkeeping").
fn flush_pending_space(
    pending_space: &mut Option<usize>,
    line_directive_pending: &mut bool,
    markers: &MarkerArray,
    end: usize,
    em: &Emitter,
    out: &mut String,
) {
    let Some(idx) = pending_space.take() else {
        return;
    };
    let m = *markers.get(idx);
    if *line_directive_pending {
        let text = m.text(em.buffer);
        if let Some(nl_pos) = text.rfind('\n') {
            out.push_str(&text[..=nl_pos]);
            let reported_line = next_original_line(markers, idx, end, em.buffer);
            if reported_line != 0 {
                out.push_str(&format!(
                    "#line {reported_line} \"{}\"\n",
                    em.src_file_name
                ));
            }
            *line_directive_pending = false;
            out.push_str(&text[nl_pos + 1..]);
            return;
        }
    }
    write_token(&m, em, out);
}

/// Flush a pending space marker up to (and including) its last newline
/// only, discarding the rest without touching `#line` bookkeeping — used
/// right before a `#foreach {`/`#foreach }` directive line, which always
/// starts its own line (spec.md §4.6).
fn flush_pending_space_to_newline(
    pending_space: &mut Option<usize>,
    markers: &MarkerArray,
    em: &Emitter,
    out: &mut String,
) {
    let Some(idx) = pending_space.take() else {
        return;
    };
    let text = markers.get(idx).text(em.buffer);
    if let Some(nl_pos) = text.rfind('\n') {
        out.push_str(&text[..=nl_pos]);
    }
}

fn next_original_line(markers: &MarkerArray, idx: usize, end: usize, buffer: &Buffer) -> usize {
    if idx + 1 >= end {
        let m = markers.get(idx);
        return line_number(buffer, m.start + m.len);
    }
    let mut next = idx + 1;
    while next < end {
        let nm = markers.get(next);
        if !nm.synthetic && nm.kind == TokenKind::Space && !nm.text(buffer).contains('\n') {
            next += 1;
            continue;
        }
        break;
    }
    if next >= end || markers.get(next).synthetic {
        0
    } else {
        line_number(buffer, markers.get(next).start)
    }
}

/// Emit markers `[start, end)` to `out`, interpreting the directive family
/// at emission time. `replacements`/`in_foreach` carry the active
/// `#foreach` variable bindings (empty/`false` at the top level);
/// `is_last` marks the final row of an enclosing `#foreach`, controlling
/// whether trailing `#,`-style conditional tokens are emitted. Returns the
/// index just past the last marker consumed (matches the original's
/// cursor-returning `unparse_fragment`).
#[allow(clippy::too_many_arguments)]
pub(crate) fn emit_fragment(
    markers: &MarkerArray,
    start: usize,
    end: usize,
    mut previous_marker_end: usize,
    replacements: &[Replacement],
    in_foreach: bool,
    is_last: bool,
    em: &mut Emitter,
    out: &mut String,
) -> usize {
    let mut cursor = start;
    let mut eol_pending = false;
    let mut line_directive_pending = false;
    let mut pending_space: Option<usize> = None;

    while cursor < end {
        let m = *markers.get(cursor);

        if em.options.insert_line_directives {
            line_directive_pending |= m.start != previous_marker_end;
            if !m.synthetic {
                previous_marker_end = m.start + m.len;
            }
        }

        if em.options.discard_comments && m.kind == TokenKind::Comment {
            cursor += 1;
            continue;
        }

        let text = m.text(em.buffer);

        if em.options.discard_space {
            if m.kind == TokenKind::Space {
                if eol_pending {
                    if text.contains('\n') {
                        out.push('\n');
                        eol_pending = false;
                    }
                    cursor += 1;
                    continue;
                }
                out.push(' ');
                pending_space = None;
                cursor += 1;
                continue;
            } else if m.kind == TokenKind::Preprocessor {
                eol_pending = true;
            } else if m.kind == TokenKind::Comment {
                eol_pending = eol_pending || (text.len() > 1 && text.as_bytes()[1] == b'/');
            }
        }

        if m.kind == TokenKind::Preprocessor && em.options.apply_macros {
            if text.len() >= 9 && &text[..9] == "#define {" {
                flush_pending_space(&mut pending_space, &mut line_directive_pending, markers, end, em, out);
                match emit_define_block(markers, cursor, end, em, out) {
                    Ok(next) => {
                        cursor = next;
                        continue;
                    }
                    Err(()) => return end,
                }
            }
            if text.len() >= 9 && &text[..9] == "#define }" {
                write_directive_error(UnparseError::UnmatchedBlockClose, &m, em, out);
                return end;
            }
            if text.len() >= 10 && &text[..10] == "#include {" {
                flush_pending_space(&mut pending_space, &mut line_directive_pending, markers, end, em, out);
                match emit_include_embed(markers, cursor, end, em, out) {
                    Ok(next) => {
                        cursor = next;
                        continue;
                    }
                    Err(()) => return end,
                }
            }
            if text.len() >= 10 && &text[..10] == "#foreach {" {
                flush_pending_space_to_newline(&mut pending_space, markers, em, out);
                let (next, new_prev_end) = emit_foreach(markers, cursor, end, previous_marker_end, replacements, em, out);
                previous_marker_end = new_prev_end;
                cursor = next;
                line_directive_pending = em.options.insert_line_directives;
                continue;
            }
            if text.len() >= 10 && &text[..10] == "#foreach }" {
                if !text[10..].trim().is_empty() {
                    write_directive_error(UnparseError::InvalidContentAfterForeachClose, &m, em, out);
                    return end;
                }
                flush_pending_space_to_newline(&mut pending_space, markers, em, out);
                return cursor + 1;
            }

            if text.len() >= 8 && &text[..8] == "#include" {
                match em.include.resolve(text) {
                    IncludeOutcome::NotCedro => {}
                    IncludeOutcome::Expanded(expanded) => {
                        flush_pending_space(&mut pending_space, &mut line_directive_pending, markers, end, em, out);
                        out.push_str(&expanded);
                        cursor += 1;
                        continue;
                    }
                    IncludeOutcome::Error(message) => {
                        tracing::warn!("#include error: {message}");
                        let line = line_number(em.buffer, m.start);
                        out.push_str(&format!("\n#line {line} \"{}\"\n#error {message}\n", em.src_file_name));
                        return end;
                    }
                }
            } else if text.len() == 2 && text.as_bytes()[1] == b'#' {
                // Token concatenation: drop the `##` and surrounding space,
                // letting the neighboring tokens' bytes abut directly.
                pending_space = None;
                cursor = skip_trivia_forward(markers, cursor + 1, end);
                continue;
            } else if text.len() == 1 && in_foreach {
                cursor += 1;
                if cursor >= end {
                    break;
                }
                let next = *markers.get(cursor);
                if next.kind.is_operator() {
                    if !is_last {
                        flush_pending_space(&mut pending_space, &mut line_directive_pending, markers, end, em, out);
                        write_token(&next, em, out);
                    }
                    cursor += 1;
                    continue;
                }
                if next.kind != TokenKind::Identifier {
                    write_directive_error(UnparseError::MissingIdentifierAfterHash, &next, em, out);
                    return end;
                }
                let name = next.text(em.buffer).to_string();
                let Some(value) = replacement::lookup(replacements, &name) else {
                    write_directive_error(
                        UnparseError::MissingValueForVariable { name },
                        &next,
                        em,
                        out,
                    );
                    return end;
                };
                flush_pending_space(&mut pending_space, &mut line_directive_pending, markers, end, em, out);
                out.push('"');
                for vm in value {
                    if vm.kind == TokenKind::String {
                        for c in vm.text(em.buffer).chars() {
                            if c == '"' || c == '\\' {
                                out.push('\\');
                            }
                            out.push(c);
                        }
                    } else {
                        write_token(vm, em, out);
                    }
                }
                out.push('"');
                cursor += 1;
                continue;
            } else if in_foreach {
                write_directive_error(UnparseError::DirectiveInsideForeach, &m, em, out);
                return end;
            }
            // Otherwise: an ordinary directive line (`#pragma`, a plain
            // `#include` with no resolver installed, ...) falls through to
            // default token output below, verbatim.
        } else if in_foreach && m.kind == TokenKind::Identifier {
            if let Some(value) = replacement::lookup(replacements, text) {
                flush_pending_space(&mut pending_space, &mut line_directive_pending, markers, end, em, out);
                for vm in value {
                    write_token(vm, em, out);
                }
                cursor += 1;
                continue;
            }
        }

        if pending_space.is_some() {
            flush_pending_space(&mut pending_space, &mut line_directive_pending, markers, end, em, out);
        }
        if m.kind == TokenKind::Space {
            pending_space = Some(cursor);
            cursor += 1;
            continue;
        }
        write_token(&m, em, out);
        cursor += 1;
    }

    if pending_space.is_some() {
        flush_pending_space(&mut pending_space, &mut line_directive_pending, markers, end, em, out);
    }

    cursor
}

fn emit_padded_text(text: &str, line_length: &mut usize, out: &mut String) {
    let mut rest = text;
    while let Some(nl) = rest.find('\n') {
        out.push_str(&rest[..nl]);
        *line_length += rest[..nl].chars().count();
        out.push(' ');
        *line_length += 1;
        if *line_length < RIGHT_MARGIN {
            for _ in *line_length..RIGHT_MARGIN {
                out.push(' ');
            }
        }
        out.push_str("\\\n");
        *line_length = 0;
        rest = &rest[nl + 1..];
    }
    out.push_str(rest);
    *line_length += rest.chars().count();
}

/// `#define { NAME(ARGS) ... #define }` expansion (spec.md §4.6).
fn emit_define_block(
    markers: &MarkerArray,
    open_idx: usize,
    end: usize,
    em: &Emitter,
    out: &mut String,
) -> Result<usize, ()> {
    let m = *markers.get(open_idx);
    let text = m.text(em.buffer);
    let rest = &text[9..]; // after "#define {"
    let mut line_length;
    if rest.starts_with(' ') {
        out.push_str("#define");
        line_length = 7;
    } else {
        out.push_str("#define ");
        line_length = 8;
    }
    out.push_str(rest);
    line_length += rest.chars().count();

    let mut cursor = open_idx + 1;
    while cursor < end {
        let cm = *markers.get(cursor);
        if em.options.discard_comments && cm.kind == TokenKind::Comment {
            cursor += 1;
            continue;
        }
        if cm.kind == TokenKind::Preprocessor {
            let ctext = cm.text(em.buffer);
            if ctext.len() >= 9 && &ctext[..9] == "#define }" {
                out.push_str("/* End #define */");
                let after = &ctext[9..];
                let mut rest2 = after;
                if rest2.starts_with(';') {
                    rest2 = &rest2[1..];
                }
                if !rest2.trim().is_empty() {
                    write_directive_error(UnparseError::InvalidContentAfterDefineClose, &cm, em, out);
                    return Err(());
                }
                return Ok(cursor + 1);
            }
            out.push_str(ctext);
            line_length += ctext.chars().count();
            cursor += 1;
            continue;
        }

        let ctext = cm.text(em.buffer);
        if cm.kind == TokenKind::Comment && ctext.len() > 2 && ctext.as_bytes()[1] == b'/' {
            let bytes = ctext.as_bytes();
            out.push('/');
            line_length += 1;
            let mut i = 1;
            while i < bytes.len() && bytes[i] == b'/' {
                out.push('*');
                line_length += 1;
                i += 1;
            }
            emit_padded_text(&ctext[i..], &mut line_length, out);
            out.push_str(" */");
            line_length += 3;
        } else {
            emit_padded_text(ctext, &mut line_length, out);
        }
        cursor += 1;
    }

    write_directive_error(UnparseError::UnclosedForeach, &m, em, out);
    Err(())
}

/// `#include {path}` binary embed (spec.md §4.6, scenario 4).
fn emit_include_embed(
    markers: &MarkerArray,
    open_idx: usize,
    end: usize,
    em: &Emitter,
    out: &mut String,
) -> Result<usize, ()> {
    let m = *markers.get(open_idx);
    let text = m.text(em.buffer);
    let after_prefix = &text[10..]; // after "#include {"
    let Some(brace_pos) = after_prefix.find('}') else {
        write_directive_error(UnparseError::MissingIncludeClosingBrace, &m, em, out);
        return Err(());
    };
    let path = &after_prefix[..brace_pos];
    let trailing = &after_prefix[brace_pos + 1..];
    if !trailing.trim().is_empty() {
        write_directive_error(UnparseError::InvalidContentAfterIncludeEmbed, &m, em, out);
        return Err(());
    }

    let full_path = em.source_dir.join(path);
    match std::fs::read(&full_path) {
        Ok(bytes) if bytes.is_empty() => {
            out.push_str(&format!(";\n#error file is empty: {}\n", full_path.display()));
        }
        Ok(bytes) => {
            let basename = full_path
                .file_name()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.to_string());
            out.push_str(&format!("[{}] = {{ /* {basename} */\n0x{:02X}", bytes.len(), bytes[0]));
            for (i, b) in bytes.iter().enumerate().skip(1) {
                if i % 16 == 0 {
                    out.push_str(&format!(",\n0x{b:02X}"));
                } else {
                    out.push_str(&format!(",0x{b:02X}"));
                }
            }
            out.push_str("\n}");
        }
        Err(e) => {
            let err = UnparseError::Io(format!("{e}: {}", full_path.display()));
            tracing::warn!(position = m.start, "{err}");
            out.push_str(&format!(";\n#error {err}\n"));
        }
    }

    Ok(skip_trivia_forward(markers, open_idx + 1, end))
}

/// `#foreach { <var-spec> <values> ... #foreach }` expansion (spec.md
/// §4.6, scenario 5). Returns the cursor just past the matching
/// `#foreach }` and the (possibly unchanged) running `previous_marker_end`.
fn emit_foreach(
    markers: &MarkerArray,
    open_idx: usize,
    end: usize,
    previous_marker_end: usize,
    outer_replacements: &[Replacement],
    em: &mut Emitter,
    out: &mut String,
) -> (usize, usize) {
    let m = *markers.get(open_idx);
    let text = m.text(em.buffer);
    let header_rest = &text[10..]; // after "#foreach {"
    let header_base_offset = m.start + 10;

    let header_markers = match cedro_syntax::lex_fragment(header_rest, header_base_offset) {
        Ok(hm) => hm,
        Err(_) => {
            write_directive_error(UnparseError::Syntax, &m, em, out);
            return (end, previous_marker_end);
        }
    };
    let hend = header_markers.len();

    macro_rules! fail {
        ($err:expr) => {{
            write_directive_error($err, &m, em, out);
            return (end, previous_marker_end);
        }};
    }

    let mut hi = skip_trivia_forward(&header_markers, 0, hend);
    if hi == hend {
        fail!(UnparseError::Syntax);
    }

    let mut var_names: Vec<String> = Vec::new();
    match header_markers.get(hi).kind {
        TokenKind::Identifier => {
            var_names.push(header_markers.get(hi).text(em.buffer).to_string());
            hi += 1;
        }
        TokenKind::BlockStart => {
            hi += 1;
            loop {
                hi = skip_trivia_forward(&header_markers, hi, hend);
                if hi == hend {
                    fail!(UnparseError::Syntax);
                }
                match header_markers.get(hi).kind {
                    TokenKind::BlockEnd => {
                        if var_names.len() < 2 {
                            fail!(UnparseError::BracesWithSingleVariable);
                        }
                        hi += 1;
                        break;
                    }
                    TokenKind::Identifier => {
                        let name = header_markers.get(hi).text(em.buffer).to_string();
                        if var_names.contains(&name) {
                            fail!(UnparseError::DuplicatedArgument);
                        }
                        var_names.push(name);
                        hi += 1;
                    }
                    TokenKind::Comma => hi += 1,
                    _ => fail!(UnparseError::ExpectedComma),
                }
            }
        }
        _ => fail!(UnparseError::Syntax),
    }

    hi = skip_trivia_forward(&header_markers, hi, hend);
    if hi == hend {
        fail!(UnparseError::MissingValueList);
    }

    let rows: Vec<Vec<Marker>> = match header_markers.get(hi).kind {
        TokenKind::BlockStart => {
            let list_start = hi + 1;
            let Some(list_end) = find_matching_close(&header_markers, hi, hend) else {
                fail!(UnparseError::UnfinishedValueList);
            };
            let after = skip_trivia_forward(&header_markers, list_end + 1, hend);
            if after != hend {
                fail!(UnparseError::InvalidContentAfterValueList);
            }
            let inner: Vec<Marker> = header_markers.as_slice()[list_start..list_end].to_vec();
            match split_top_level(&inner) {
                Ok(rows) => rows,
                Err(e) => fail!(e),
            }
        }
        TokenKind::Identifier => {
            let name = header_markers.get(hi).text(em.buffer).to_string();
            let after = skip_trivia_forward(&header_markers, hi + 1, hend);
            if after != hend {
                fail!(UnparseError::InvalidContentAfterValueList);
            }
            match replacement::lookup(outer_replacements, &name) {
                Some(v) => vec![v.to_vec()],
                None => fail!(UnparseError::SyntaxErrorInValueList),
            }
        }
        _ => fail!(UnparseError::SyntaxErrorInValueList),
    };

    let body_start = open_idx + 1;
    let n_rows = rows.len();
    let mut cursor_after_body = body_start;

    for (row_index, row) in rows.into_iter().enumerate() {
        let is_last_row = row_index + 1 == n_rows;
        let row_replacements = match bind_row(&var_names, row) {
            Ok(r) => r,
            Err(e) => fail!(e),
        };
        cursor_after_body = emit_fragment(
            markers,
            body_start,
            end,
            previous_marker_end,
            &row_replacements,
            true,
            is_last_row,
            em,
            out,
        );
    }

    (cursor_after_body, previous_marker_end)
}

fn bind_row(var_names: &[String], row: Vec<Marker>) -> Result<Vec<Replacement>, UnparseError> {
    if var_names.len() == 1 {
        let (s, e) = trim_trivia(&row);
        if s == e {
            return Err(UnparseError::EmptyValue);
        }
        return Ok(vec![Replacement {
            name: var_names[0].clone(),
            value: row[s..e].to_vec(),
        }]);
    }

    let (s, e) = trim_trivia(&row);
    let row = &row[s..e];
    if row.len() < 2
        || row.first().map(|m| m.kind) != Some(TokenKind::BlockStart)
        || row.last().map(|m| m.kind) != Some(TokenKind::BlockEnd)
    {
        return Err(UnparseError::SyntaxErrorInValueList);
    }
    let inner = &row[1..row.len() - 1];
    let parts = split_top_level(inner)?;
    if parts.len() > var_names.len() {
        return Err(UnparseError::MoreValuesThanVariables);
    }
    if parts.len() < var_names.len() {
        return Err(UnparseError::FewerValuesThanVariables);
    }
    let mut replacements = Vec::with_capacity(var_names.len());
    for (name, part) in var_names.iter().zip(parts.into_iter()) {
        let (s, e) = trim_trivia(&part);
        if s == e {
            return Err(UnparseError::EmptyValue);
        }
        replacements.push(Replacement {
            name: name.clone(),
            value: part[s..e].to_vec(),
        });
    }
    Ok(replacements)
}
