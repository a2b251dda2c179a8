//! `#pragma Cedro <major>.<minor>[ <feature>…]` parsing (spec.md §6).

use crate::error::Error;
use crate::options::Options;

/// Parse a `#pragma Cedro ...` line's version and feature words into
/// `Options`. `line` is the full directive text as found by
/// `cedro_syntax::find_prelude` (starts with `#pragma`).
///
/// Unknown feature words are a directive-class error (spec.md §7
/// "unknown pragma option") that does not abort the rest of the file:
/// the caller logs it and proceeds with whatever options were parsed
/// before the unknown word.
pub fn parse(line: &str) -> Result<Options, Error> {
    let rest = line.trim_start_matches("#pragma").trim_start();
    let rest = rest
        .strip_prefix("Cedro")
        .ok_or_else(|| Error::Pragma(format!("not a Cedro pragma: {line:?}")))?
        .trim_start();

    let mut words = rest.split_whitespace();
    let version = words
        .next()
        .ok_or_else(|| Error::Pragma("missing Cedro version".to_string()))?;
    let (major, minor) = version
        .split_once('.')
        .ok_or_else(|| Error::Pragma(format!("malformed version {version:?}")))?;
    let major: u32 = major
        .parse()
        .map_err(|_| Error::Pragma(format!("malformed major version {major:?}")))?;
    let minor: u32 = minor
        .parse()
        .map_err(|_| Error::Pragma(format!("malformed minor version {minor:?}")))?;

    let mut options = Options {
        version_major: major,
        version_minor: minor,
        ..Options::default()
    };

    for word in words {
        match word {
            "defer" => options.defer_keyword_enabled = true,
            "self" => options.pass_self_to_member_functions = true,
            other => {
                tracing::warn!("unknown pragma option {other:?} in {line:?}");
            }
        }
    }

    Ok(options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_version() {
        let options = parse("#pragma Cedro 1.0").unwrap();
        assert_eq!(options.version_major, 1);
        assert_eq!(options.version_minor, 0);
        assert!(!options.defer_keyword_enabled);
        assert!(!options.pass_self_to_member_functions);
    }

    #[test]
    fn defer_and_self_feature_words() {
        let options = parse("#pragma Cedro 1.0 defer self").unwrap();
        assert!(options.defer_keyword_enabled);
        assert!(options.pass_self_to_member_functions);
    }

    #[test]
    fn rejects_non_cedro_pragma() {
        assert!(parse("#pragma GCC diagnostic push").is_err());
    }
}
