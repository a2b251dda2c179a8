//! File-system `#include "..."` / `#include <...>` resolution (spec.md
//! §5 "Suspension/blocking", §6 "`#include \"header\"`"), the concrete
//! `IncludeResolver` the `cedro` orchestrator installs — the core
//! unparser itself stays decoupled from search paths and recursion
//! bookkeeping (spec.md §1 "out of scope").

use std::path::{Path, PathBuf};

use cedro_syntax::{find_prelude, Buffer};
use cedro_unparse::{IncludeOutcome, IncludeResolver};

use crate::{Error, MAX_INCLUDE_DEPTH};

/// Resolves `#include` targets against a quote-style current directory
/// plus a shared list of search paths, recursing into `cedro::process`
/// when the target itself starts with a Cedro pragma. Declines (leaves
/// the line untouched) for any target that is not itself Cedro source,
/// matching the original's "inline only if the target begins with the
/// pragma" rule.
pub struct FileIncludeResolver<'a> {
    pub current_dir: PathBuf,
    pub search_paths: &'a [PathBuf],
    pub depth: u32,
    pub max_depth: u32,
}

impl<'a> FileIncludeResolver<'a> {
    pub fn new(current_dir: PathBuf, search_paths: &'a [PathBuf]) -> Self {
        Self {
            current_dir,
            search_paths,
            depth: 0,
            max_depth: MAX_INCLUDE_DEPTH,
        }
    }

    fn resolve_path(&self, current_dir: &Path, target: &str, quoted: bool) -> Option<PathBuf> {
        if quoted {
            let candidate = current_dir.join(target);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        for dir in self.search_paths {
            let candidate = dir.join(target);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        None
    }
}

/// Parse `#include "path"` / `#include <path>` into `(path, is_quoted)`.
fn parse_target(directive_text: &str) -> Option<(&str, bool)> {
    let rest = directive_text.trim_start_matches("#include").trim_start();
    if let Some(rest) = rest.strip_prefix('"') {
        let end = rest.find('"')?;
        Some((&rest[..end], true))
    } else if let Some(rest) = rest.strip_prefix('<') {
        let end = rest.find('>')?;
        Some((&rest[..end], false))
    } else {
        None
    }
}

impl<'a> IncludeResolver for FileIncludeResolver<'a> {
    fn resolve(&mut self, directive_text: &str) -> IncludeOutcome {
        let Some((target, quoted)) = parse_target(directive_text) else {
            return IncludeOutcome::NotCedro;
        };

        let Some(full_path) = self.resolve_path(&self.current_dir, target, quoted) else {
            return IncludeOutcome::Error(format!("include target not found: {target}"));
        };

        let bytes = match std::fs::read(&full_path) {
            Ok(b) => b,
            Err(e) => return IncludeOutcome::Error(format!("{e}: {}", full_path.display())),
        };

        let buffer = Buffer::from_bytes(&bytes);
        if find_prelude(&buffer).pragma_line.is_none() {
            return IncludeOutcome::NotCedro;
        }

        if self.depth + 1 > self.max_depth {
            return IncludeOutcome::Error(
                Error::IncludeDepthExceeded(self.max_depth, full_path.display().to_string())
                    .to_string(),
            );
        }

        let child_dir = full_path.parent().map(Path::to_path_buf).unwrap_or_default();
        let mut child_resolver = FileIncludeResolver {
            current_dir: child_dir.clone(),
            search_paths: self.search_paths,
            depth: self.depth + 1,
            max_depth: self.max_depth,
        };
        let file_name = full_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| target.to_string());

        match crate::process(&bytes, &file_name, &child_dir, &mut child_resolver) {
            Ok(expanded) => IncludeOutcome::Expanded(expanded),
            Err(e) => IncludeOutcome::Error(e.to_string()),
        }
    }
}
