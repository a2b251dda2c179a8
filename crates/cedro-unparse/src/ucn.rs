//! Universal-character-name escaping (spec.md §4.6 "Identifier escaping").

use cedro_syntax::utf8::decode_utf8_unchecked;

/// Decode `text` code point by code point and rewrite any non-ASCII code
/// point (other than `$`, `@`, `` ` ``) as `\uXXXX` / `\UXXXXXXXX`.
///
/// Mirrors `write_token`'s `options.escape_ucn` branch in
/// `examples/original_source/src/cedro.c`: ported byte-for-byte rather than
/// through `char::escape_unicode`, since the code-point classification
/// (`$`/`@`/`` ` `` exemptions, the 0x10000 split between `\u` and `\U`)
/// is the original's own rule, not Rust's.
pub fn escape_identifier(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < bytes.len() {
        let decoded = decode_utf8_unchecked(&bytes[i..]);
        let u = decoded.code_point;
        if u & 0xFFFF_FF80 == 0 && u != 0x0024 && u != 0x0040 && u != 0x0060 {
            out.push(u as u8 as char);
        } else if u & 0xFFFF_0000 == 0 {
            out.push_str(&format!("\\u{u:04X}"));
        } else {
            out.push_str(&format!("\\U{u:08X}"));
        }
        i += decoded.len.max(1);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_passthrough() {
        assert_eq!(escape_identifier("hola_mundo"), "hola_mundo");
    }

    #[test]
    fn bmp_escape() {
        assert_eq!(escape_identifier("café"), "caf\\u00E9");
    }

    #[test]
    fn dollar_at_backtick_exempt() {
        assert_eq!(escape_identifier("$x@y`z"), "$x@y`z");
    }
}
