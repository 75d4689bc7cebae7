//! Text decoding for PDF strings.
//!
//! Strings carrying a UTF-16BE byte-order mark are decoded as UTF-16;
//! everything else goes through PDFDocEncoding.

/// The code points PDFDocEncoding assigns differently from Latin-1, for
/// the byte ranges 0x18..=0x1f and 0x80..=0xa0. A zero entry marks an
/// undefined code.
const SPECIALS_18: [u16; 8] = [
    0x02d8, 0x02c7, 0x02c6, 0x02d9, 0x02dd, 0x02db, 0x02da, 0x02dc,
];

const SPECIALS_80: [u16; 33] = [
    0x2022, 0x2020, 0x2021, 0x2026, 0x2014, 0x2013, 0x0192, 0x2044, 0x2039, 0x203a, 0x2212, 0x2030,
    0x201e, 0x201c, 0x201d, 0x2018, 0x2019, 0x201a, 0x2122, 0xfb01, 0xfb02, 0x0141, 0x0152, 0x0160,
    0x0178, 0x017d, 0x0131, 0x0142, 0x0153, 0x0161, 0x017e, 0x0000, 0x20ac,
];

fn pdf_doc_char(byte: u8) -> Option<char> {
    let cp = match byte {
        0x18..=0x1f => SPECIALS_18[usize::from(byte - 0x18)],
        0x80..=0xa0 => SPECIALS_80[usize::from(byte - 0x80)],
        0xad => 0,
        b => u16::from(b),
    };

    if cp == 0 && byte != 0 {
        None
    } else {
        char::from_u32(u32::from(cp))
    }
}

/// Decode a byte string using PDFDocEncoding. Undefined codes are dropped.
pub fn decode_pdf_doc(bytes: &[u8]) -> String {
    bytes.iter().filter_map(|b| pdf_doc_char(*b)).collect()
}

/// Decode a UTF-16BE byte string (without the byte-order mark).
pub fn decode_utf16_be(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();

    String::from_utf16_lossy(&units)
}

/// Decode PDF text: UTF-16BE when the BOM is present, PDFDocEncoding
/// otherwise.
pub fn decode_text(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xfe, 0xff]) {
        decode_utf16_be(rest)
    } else {
        decode_pdf_doc(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_is_identity() {
        assert_eq!(decode_text(b"Hello, world"), "Hello, world");
    }

    #[test]
    fn pdf_doc_specials() {
        assert_eq!(decode_text(&[0x80]), "\u{2022}");
        assert_eq!(decode_text(&[0xa0]), "\u{20ac}");
        assert_eq!(decode_text(&[0x18]), "\u{02d8}");
    }

    #[test]
    fn utf16_with_bom() {
        assert_eq!(decode_text(&[0xfe, 0xff, 0x00, 0x41, 0x00, 0x42]), "AB");
    }

    #[test]
    fn undefined_codes_are_dropped() {
        assert_eq!(decode_text(&[b'a', 0x9f, b'b']), "ab");
    }
}
