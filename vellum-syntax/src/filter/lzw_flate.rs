//! Decoders for flate- and LZW-encoded streams, plus the predictor step
//! both share.

use crate::object::Dict;
use crate::object::dict::keys::{BITS_PER_COMPONENT, COLORS, COLUMNS, EARLY_CHANGE, PREDICTOR};
use log::warn;

pub(crate) mod flate {
    use super::{PredictorParams, apply_predictor};
    use crate::object::Dict;
    use flate2::read::{DeflateDecoder, ZlibDecoder};
    use std::io::Read;

    /// Decode a flate-encoded stream.
    pub(crate) fn decode(data: &[u8], params: &Dict) -> Option<Vec<u8>> {
        let decoded = zlib(data).or_else(|| raw_deflate(data))?;

        apply_predictor(decoded, &PredictorParams::from_dict(params))
    }

    fn zlib(data: &[u8]) -> Option<Vec<u8>> {
        let mut out = vec![];

        // Read as much as possible; a checksum error at the very end
        // should not discard an otherwise intact stream.
        match ZlibDecoder::new(data).read_to_end(&mut out) {
            Ok(_) => Some(out),
            Err(_) if !out.is_empty() => Some(out),
            Err(_) => None,
        }
    }

    fn raw_deflate(data: &[u8]) -> Option<Vec<u8>> {
        let mut out = vec![];

        match DeflateDecoder::new(data).read_to_end(&mut out) {
            Ok(_) => Some(out),
            Err(_) => None,
        }
    }
}

pub(crate) mod lzw {
    use super::{PredictorParams, apply_predictor};
    use crate::object::Dict;
    use log::warn;

    const CLEAR_CODE: u16 = 256;
    const EOD_CODE: u16 = 257;
    const FIRST_FREE: u16 = 258;
    const MAX_CODES: usize = 4096;

    /// Decode an LZW-encoded stream.
    pub(crate) fn decode(data: &[u8], params: &Dict) -> Option<Vec<u8>> {
        let params = PredictorParams::from_dict(params);
        let decoded = decode_codes(data, params.early_change)?;

        apply_predictor(decoded, &params)
    }

    /// The code dictionary. Every entry above the initial 258 is a back
    /// reference to an earlier entry plus one byte, so entries never copy
    /// their prefixes.
    struct CodeTable {
        entries: Vec<(Option<u16>, u8)>,
        early_change: bool,
    }

    impl CodeTable {
        fn new(early_change: bool) -> Self {
            let mut entries: Vec<(Option<u16>, u8)> =
                (0..=255).map(|b| (None, b as u8)).collect();
            // Placeholders for the clear and EOD codes.
            entries.push((None, 0));
            entries.push((None, 0));

            Self {
                entries,
                early_change,
            }
        }

        fn reset(&mut self) {
            self.entries.truncate(usize::from(FIRST_FREE));
        }

        fn next_code(&self) -> u16 {
            self.entries.len() as u16
        }

        fn add(&mut self, prefix: u16, byte: u8) {
            if self.entries.len() < MAX_CODES {
                self.entries.push((Some(prefix), byte));
            }
        }

        fn code_width(&self) -> u32 {
            let len = self.entries.len() + usize::from(self.early_change);

            match len {
                0..512 => 9,
                512..1024 => 10,
                1024..2048 => 11,
                _ => 12,
            }
        }

        /// Expand a code into `out`, returning its first byte.
        fn expand(&self, code: u16, out: &mut Vec<u8>) -> Option<u8> {
            let start = out.len();
            let mut cur = code;

            loop {
                let (prefix, byte) = *self.entries.get(usize::from(cur))?;
                out.push(byte);

                match prefix {
                    Some(p) => cur = p,
                    None => break,
                }
            }

            out[start..].reverse();

            Some(out[start])
        }
    }

    fn decode_codes(data: &[u8], early_change: bool) -> Option<Vec<u8>> {
        let mut table = CodeTable::new(early_change);
        let mut out = vec![];
        let mut prev: Option<u16> = None;

        let mut bit_pos = 0usize;

        loop {
            let width = table.code_width();
            let Some(code) = read_code(data, &mut bit_pos, width) else {
                warn!("LZW stream ended without an EOD code");

                return Some(out);
            };

            match code {
                CLEAR_CODE => {
                    table.reset();
                    prev = None;
                }
                EOD_CODE => return Some(out),
                code if code < table.next_code() => {
                    let first = table.expand(code, &mut out)?;

                    if let Some(prev) = prev {
                        table.add(prev, first);
                    }

                    prev = Some(code);
                }
                code if code == table.next_code() && prev.is_some() => {
                    // The classic KwKwK case: the new entry is the previous
                    // sequence plus its own first byte.
                    let prev_code = prev?;
                    let first = table.expand(prev_code, &mut out)?;
                    out.push(first);

                    table.add(prev_code, first);
                    prev = Some(code);
                }
                code => {
                    warn!("invalid LZW code {code}");

                    return None;
                }
            }
        }
    }

    fn read_code(data: &[u8], bit_pos: &mut usize, width: u32) -> Option<u16> {
        let mut code = 0u32;

        for _ in 0..width {
            let byte = *data.get(*bit_pos / 8)?;
            let bit = byte >> (7 - *bit_pos % 8) & 1;
            code = code << 1 | u32::from(bit);
            *bit_pos += 1;
        }

        Some(code as u16)
    }
}

/// The predictor parameters shared by flate and LZW.
pub(crate) struct PredictorParams {
    pub(crate) predictor: u8,
    pub(crate) colors: u8,
    pub(crate) bits_per_component: u8,
    pub(crate) columns: usize,
    pub(crate) early_change: bool,
}

impl Default for PredictorParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            colors: 1,
            bits_per_component: 8,
            columns: 1,
            early_change: true,
        }
    }
}

impl PredictorParams {
    pub(crate) fn from_dict(dict: &Dict) -> Self {
        let defaults = Self::default();

        Self {
            predictor: dict.get_direct::<u8>(PREDICTOR).unwrap_or(defaults.predictor),
            colors: dict.get_direct::<u8>(COLORS).unwrap_or(defaults.colors),
            bits_per_component: dict
                .get_direct::<u8>(BITS_PER_COMPONENT)
                .unwrap_or(defaults.bits_per_component),
            columns: dict.get_direct::<usize>(COLUMNS).unwrap_or(defaults.columns),
            early_change: dict
                .get_direct::<u8>(EARLY_CHANGE)
                .map(|e| e != 0)
                .unwrap_or(defaults.early_change),
        }
    }

    fn row_len(&self) -> usize {
        (self.columns * usize::from(self.colors) * usize::from(self.bits_per_component))
            .div_ceil(8)
    }

    /// Bytes per pixel, at least one. PNG predictors for sub-byte depths
    /// operate on whole bytes.
    fn bytes_per_pixel(&self) -> usize {
        (usize::from(self.colors) * usize::from(self.bits_per_component)).div_ceil(8)
    }
}

/// Undo the predictor declared in the stream parameters.
pub(crate) fn apply_predictor(data: Vec<u8>, params: &PredictorParams) -> Option<Vec<u8>> {
    match params.predictor {
        1 => Some(data),
        2 => apply_tiff_predictor(data, params),
        10..=15 => apply_png_predictor(data, params),
        other => {
            warn!("unknown predictor {other}");

            None
        }
    }
}

fn apply_tiff_predictor(mut data: Vec<u8>, params: &PredictorParams) -> Option<Vec<u8>> {
    let colors = usize::from(params.colors);

    match params.bits_per_component {
        8 => {
            let row_len = params.row_len();

            for row in data.chunks_mut(row_len) {
                for i in colors..row.len() {
                    row[i] = row[i].wrapping_add(row[i - colors]);
                }
            }

            Some(data)
        }
        other => {
            // Sub-byte and 16-bit TIFF prediction does not appear in the
            // wild for the streams this crate reads.
            warn!("TIFF predictor with {other} bits per component is unsupported");

            None
        }
    }
}

fn apply_png_predictor(data: Vec<u8>, params: &PredictorParams) -> Option<Vec<u8>> {
    let row_len = params.row_len();
    let bpp = params.bytes_per_pixel();

    // Every encoded row is prefixed with the predictor tag it uses.
    let encoded_row_len = row_len + 1;

    if row_len == 0 || !data.len().is_multiple_of(encoded_row_len) {
        warn!("predictor row length doesn't divide the data length");

        return None;
    }

    let rows = data.len() / encoded_row_len;
    let mut out = vec![0u8; rows * row_len];
    let mut prev_start: Option<usize> = None;

    for (row_idx, encoded) in data.chunks_exact(encoded_row_len).enumerate() {
        let tag = encoded[0];
        let row = &encoded[1..];
        let out_start = row_idx * row_len;

        for i in 0..row_len {
            let raw = row[i];
            let left = if i >= bpp { out[out_start + i - bpp] } else { 0 };
            let (up, up_left) = match prev_start {
                Some(prev) => (
                    out[prev + i],
                    if i >= bpp { out[prev + i - bpp] } else { 0 },
                ),
                None => (0, 0),
            };

            let value = match tag {
                0 => raw,
                1 => raw.wrapping_add(left),
                2 => raw.wrapping_add(up),
                3 => raw.wrapping_add(((u16::from(left) + u16::from(up)) / 2) as u8),
                4 => raw.wrapping_add(paeth(left, up, up_left)),
                other => {
                    warn!("unknown PNG row predictor {other}");

                    return None;
                }
            };

            out[out_start + i] = value;
        }

        prev_start = Some(out_start);
    }

    Some(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = i32::from(a) + i32::from(b) - i32::from(c);
    let pa = (p - i32::from(a)).abs();
    let pb = (p - i32::from(b)).abs();
    let pc = (p - i32::from(c)).abs();

    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

#[cfg(test)]
#[rustfmt::skip]
mod tests {
    use super::*;
    use crate::object::Dict;

    #[test]
    fn decode_lzw() {
        let input = [0x80, 0x0B, 0x60, 0x50, 0x22, 0x0C, 0x0C, 0x85, 0x01];
        let decoded = lzw::decode(&input, &Dict::new()).unwrap();

        assert_eq!(decoded, vec![45, 45, 45, 45, 45, 65, 45, 45, 45, 66]);
    }

    #[test]
    fn decode_flate_zlib() {
        let input = [
            0x78, 0x9c, 0xf3, 0x48, 0xcd, 0xc9, 0xc9, 0x7, 0x0, 0x5, 0x8c, 0x1, 0xf5,
        ];

        assert_eq!(flate::decode(&input, &Dict::new()).unwrap(), b"Hello");
    }

    #[test]
    fn decode_flate_raw() {
        let input = [0xf3, 0x48, 0xcd, 0xc9, 0xc9, 0x7, 0x0];

        assert_eq!(flate::decode(&input, &Dict::new()).unwrap(), b"Hello");
    }

    fn predictor_expected() -> Vec<u8> {
        vec![
            // Row 1
            127, 127, 127, 125, 129, 127, 123, 130, 128,
            // Row 2
            128, 129, 126, 126, 132, 124, 121, 127, 126,
            // Row 3
            131, 130, 122, 133, 129, 128, 127, 100, 126,
        ]
    }

    fn predictor_test(predictor: u8, input: &[u8]) {
        let params = PredictorParams {
            predictor,
            colors: 3,
            bits_per_component: 8,
            columns: 3,
            early_change: false,
        };

        let out = apply_predictor(input.to_vec(), &params).unwrap();
        assert_eq!(predictor_expected(), out);
    }

    #[test]
    fn predictor_none() {
        let mut tagged = vec![];
        for row in predictor_expected().chunks(9) {
            tagged.push(0);
            tagged.extend_from_slice(row);
        }

        predictor_test(10, &tagged);
    }

    #[test]
    fn predictor_sub() {
        predictor_test(
            11,
            &[
                // Row 1
                1, 127, 127, 127, 254, 2, 0, 254, 1, 1,
                // Row 2
                1, 128, 129, 126, 254, 3, 254, 251, 251, 2,
                // Row 3
                1, 131, 130, 122, 2, 255, 6, 250, 227, 254,
            ],
        );
    }

    #[test]
    fn predictor_up() {
        predictor_test(
            12,
            &[
                // Row 1
                2, 127, 127, 127, 125, 129, 127, 123, 130, 128,
                // Row 2
                2, 1, 2, 255, 1, 3, 253, 254, 253, 254,
                // Row 3
                2, 3, 1, 252, 7, 253, 4, 6, 229, 0,
            ],
        );
    }

    #[test]
    fn predictor_avg() {
        predictor_test(
            13,
            &[
                // Row 1
                3, 127, 127, 127, 62, 66, 64, 61, 66, 65,
                // Row 2
                3, 65, 66, 63, 0, 3, 254, 253, 252, 0,
                // Row 3
                3, 67, 66, 59, 5, 254, 5, 0, 228, 255,
            ],
        );
    }

    #[test]
    fn predictor_paeth() {
        predictor_test(
            14,
            &[
                // Row 1
                4, 127, 127, 127, 254, 2, 0, 254, 1, 1,
                // Row 2
                4, 1, 2, 255, 1, 3, 254, 254, 251, 2,
                // Row 3
                4, 3, 1, 252, 5, 253, 6, 1, 229, 254,
            ],
        );
    }

    #[test]
    fn tiff_predictor() {
        let params = PredictorParams {
            predictor: 2,
            colors: 1,
            bits_per_component: 8,
            columns: 4,
            early_change: false,
        };

        assert_eq!(
            apply_predictor(vec![10, 1, 1, 1], &params).unwrap(),
            vec![10, 11, 12, 13]
        );
    }
}
