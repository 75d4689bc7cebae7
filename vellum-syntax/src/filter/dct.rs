//! A decoder for JPEG data streams.

use crate::filter::{FilterResult, ImageColorSpace};
use crate::object::Dict;
use zune_jpeg::JpegDecoder;
use zune_jpeg::zune_core::bytestream::ZCursor;
use zune_jpeg::zune_core::colorspace::ColorSpace;
use zune_jpeg::zune_core::options::DecoderOptions;

/// Decode a JPEG data stream.
pub(crate) fn decode(data: &[u8], _: &Dict) -> Option<FilterResult> {
    let out_colorspace = probe_output_colorspace(data)?;

    decode_as(data, out_colorspace).or_else(|| {
        // An APP14 marker can make the probe pick the wrong input space;
        // retry with the opposite family.
        let fallback = if matches!(out_colorspace, ColorSpace::CMYK | ColorSpace::YCCK) {
            ColorSpace::RGB
        } else {
            ColorSpace::CMYK
        };

        decode_as(data, fallback)
    })
}

fn probe_output_colorspace(data: &[u8]) -> Option<ColorSpace> {
    let mut decoder = JpegDecoder::new(ZCursor::new(data));
    decoder.decode_headers().ok()?;

    Some(match decoder.input_colorspace()? {
        ColorSpace::RGB | ColorSpace::RGBA | ColorSpace::YCbCr => ColorSpace::RGB,
        ColorSpace::Luma | ColorSpace::LumaA => ColorSpace::Luma,
        ColorSpace::CMYK => ColorSpace::CMYK,
        ColorSpace::YCCK => ColorSpace::YCCK,
        _ => ColorSpace::RGB,
    })
}

fn decode_as(data: &[u8], out_colorspace: ColorSpace) -> Option<FilterResult> {
    let mut decoder = JpegDecoder::new(ZCursor::new(data));
    decoder.decode_headers().ok()?;
    decoder.set_options(DecoderOptions::default().jpeg_set_out_colorspace(out_colorspace));

    let mut decoded = decoder.decode().ok()?;

    let color_space = match out_colorspace {
        ColorSpace::Luma => ImageColorSpace::Gray,
        ColorSpace::CMYK | ColorSpace::YCCK => ImageColorSpace::Cmyk,
        _ => ImageColorSpace::Rgb,
    };

    if out_colorspace == ColorSpace::YCCK {
        // YCCK to CMYK, following pdf.js.
        for c in decoded.chunks_mut(4) {
            let y = f32::from(c[0]);
            let cb = f32::from(c[1]);
            let cr = f32::from(c[2]);
            c[0] = (434.456 - y - 1.402 * cr) as u8;
            c[1] = (119.541 - y + 0.344 * cb + 0.714 * cr) as u8;
            c[2] = (481.816 - y - 1.772 * cb) as u8;
        }
    }

    Some(FilterResult {
        data: decoded,
        color_space: Some(color_space),
        bits_per_component: Some(8),
    })
}
