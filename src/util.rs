//! Text decoding for page files.

use std::borrow::Cow;

/// Decode page bytes to a string.
///
/// This function:
/// 1. First tries UTF-8 (a BOM is stripped via encoding_rs)
/// 2. Falls back to Windows-1252 (common in notes written by old editors)
///
/// Uses `Cow<str>` to avoid allocation when the input is valid UTF-8
/// without a BOM.
///
/// # Examples
///
/// ```
/// use jugaadpress::util::decode_text;
///
/// assert_eq!(decode_text("héllo".as_bytes()), "héllo");
/// assert_eq!(decode_text(b"caf\xe9"), "café");
/// ```
pub fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let (result, _encoding, malformed) = encoding_rs::UTF_8.decode(bytes);

    if !malformed {
        return result;
    }

    let (result, _, _) = encoding_rs::WINDOWS_1252.decode(bytes);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_utf8() {
        assert_eq!(decode_text(b"Hello, World!"), "Hello, World!");
    }

    #[test]
    fn test_decode_strips_bom() {
        assert_eq!(decode_text(b"\xEF\xBB\xBF# Title"), "# Title");
    }

    #[test]
    fn test_decode_cp1252_fallback() {
        // 0x93/0x94 are curly quotes in Windows-1252
        assert_eq!(decode_text(b"\x93quoted\x94"), "\u{201C}quoted\u{201D}");
    }
}
