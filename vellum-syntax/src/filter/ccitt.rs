//! A decoder for CCITT fax data streams.

use crate::object::Dict;
use crate::object::dict::keys::{
    BLACK_IS_1, COLUMNS, ENCODED_BYTE_ALIGN, END_OF_BLOCK, END_OF_LINE, K, ROWS,
};
use hayro_ccitt::{DecodeSettings, Decoder, DecoderContext, EncodingMode};
use log::warn;

/// Collects decoded pixels into rows of packed bits, one bit per pixel,
/// each row padded to a byte boundary. A set bit is a white pixel.
struct BitPacker {
    out: Vec<u8>,
    current: u8,
    filled: u8,
}

impl BitPacker {
    fn new() -> Self {
        Self {
            out: vec![],
            current: 0,
            filled: 0,
        }
    }

    fn finish(mut self) -> Vec<u8> {
        self.flush();

        self.out
    }

    fn flush(&mut self) {
        if self.filled > 0 {
            self.out.push(self.current << (8 - self.filled));
            self.current = 0;
            self.filled = 0;
        }
    }
}

impl Decoder for BitPacker {
    fn push_pixel(&mut self, white: bool) {
        self.current = self.current << 1 | u8::from(white);
        self.filled += 1;

        if self.filled == 8 {
            self.out.push(self.current);
            self.current = 0;
            self.filled = 0;
        }
    }

    fn push_pixel_chunk(&mut self, white: bool, chunk_count: u32) {
        let byte = if white { 0xff } else { 0x00 };

        for _ in 0..chunk_count {
            self.out.push(byte);
        }
    }

    fn next_line(&mut self) {
        self.flush();
    }
}

/// Decode a CCITT fax data stream.
pub(crate) fn decode(data: &[u8], params: &Dict) -> Option<Vec<u8>> {
    let k = params.get_direct::<i32>(K).unwrap_or(0);

    let encoding = if k < 0 {
        EncodingMode::Group4
    } else if k == 0 {
        EncodingMode::Group3_1D
    } else {
        EncodingMode::Group3_2D { k: k as u32 }
    };

    let rows = params.get_direct::<u32>(ROWS).unwrap_or(0);

    let settings = DecodeSettings {
        columns: params.get_direct::<u32>(COLUMNS).unwrap_or(1728),
        // Without an explicit row count, decoding runs until the end of
        // the data.
        rows: if rows == 0 { u32::MAX } else { rows },
        end_of_block: params.get_direct::<bool>(END_OF_BLOCK).unwrap_or(true),
        end_of_line: params.get_direct::<bool>(END_OF_LINE).unwrap_or(false),
        rows_are_byte_aligned: params
            .get_direct::<bool>(ENCODED_BYTE_ALIGN)
            .unwrap_or(false),
        encoding,
        // The filter output uses 0 for black unless BlackIs1 asks for the
        // opposite; the decoder's inversion flag expresses exactly that.
        invert_black: params.get_direct::<bool>(BLACK_IS_1).unwrap_or(false),
    };

    let mut packer = BitPacker::new();
    let mut ctx = DecoderContext::new(settings);

    match hayro_ccitt::decode(data, &mut packer, &mut ctx) {
        Ok(_) => Some(packer.finish()),
        Err(e) => {
            // Truncated fax data is common; keep the rows that decoded.
            warn!("CCITT decoding stopped early: {e}");

            let out = packer.finish();

            if out.is_empty() { None } else { Some(out) }
        }
    }
}
