//! A decoder for embedded JBIG2 data streams.

use crate::object::dict::keys::JBIG2_GLOBALS;
use crate::object::{ByteString, Dict};
use hayro_jbig2::{Decoder, Image};
use log::warn;

/// Collects decoded pixels into rows of packed bits, one bit per pixel,
/// each row padded to a byte boundary. A set bit is a black pixel.
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
    fn push_pixel(&mut self, black: bool) {
        self.current = self.current << 1 | u8::from(black);
        self.filled += 1;

        if self.filled == 8 {
            self.out.push(self.current);
            self.current = 0;
            self.filled = 0;
        }
    }

    fn push_pixel_chunk(&mut self, black: bool, chunk_count: u32) {
        let byte = if black { 0xff } else { 0x00 };

        for _ in 0..chunk_count {
            self.out.push(byte);
        }
    }

    fn next_line(&mut self) {
        self.flush();
    }
}

/// Decode an embedded JBIG2 stream.
///
/// The owning document stores the decoded bytes of any `/JBIG2Globals`
/// stream directly in the parameter dictionary before the chain runs, so
/// the filter itself never touches other objects.
pub(crate) fn decode(data: &[u8], params: &Dict) -> Option<Vec<u8>> {
    let globals = params.get_direct::<ByteString>(JBIG2_GLOBALS);

    let image = match Image::new_embedded(data, globals.as_deref()) {
        Ok(image) => image,
        Err(e) => {
            warn!("JBIG2 decoding failed: {e}");

            return None;
        }
    };

    let mut packer = BitPacker::new();

    if let Err(e) = image.decode(&mut packer) {
        warn!("JBIG2 decoding failed: {e}");

        return None;
    }

    Some(packer.finish())
}
