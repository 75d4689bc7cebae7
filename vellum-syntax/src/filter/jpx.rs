//! A decoder for JPX (JPEG 2000) data streams.

use crate::filter::{FilterResult, ImageColorSpace};
use hayro_jpeg2000::{ColorSpace, DecodeSettings, Image};
use log::warn;

/// Decode a JPX-encoded image stream into interleaved 8-bit components.
pub(crate) fn decode(data: &[u8]) -> Option<FilterResult> {
    let image = match Image::new(data, &DecodeSettings::default()) {
        Ok(image) => image,
        Err(e) => {
            warn!("JPX decoding failed: {e}");

            return None;
        }
    };

    let num_channels = image.color_space().num_channels() as usize;

    let color_space = match image.color_space() {
        ColorSpace::Gray => ImageColorSpace::Gray,
        ColorSpace::RGB => ImageColorSpace::Rgb,
        ColorSpace::CMYK => ImageColorSpace::Cmyk,
        _ => {
            warn!("JPX image with {num_channels} color channels is unsupported");

            return None;
        }
    };

    let decoded = match image.decode() {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!("JPX decoding failed: {e}");

            return None;
        }
    };

    let out = if image.has_alpha() {
        let stride = num_channels + 1;
        let mut out = Vec::with_capacity(decoded.len() / stride * num_channels);

        for pixel in decoded.chunks_exact(stride) {
            out.extend_from_slice(&pixel[..num_channels]);
        }

        out
    } else {
        decoded
    };

    Some(FilterResult {
        data: out,
        color_space: Some(color_space),
        bits_per_component: Some(8),
    })
}
