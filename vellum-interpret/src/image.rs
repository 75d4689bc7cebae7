//! Decoding image XObjects and inline images into RGBA.

use crate::canvas::RgbaImage;
use crate::color::{AlphaColor, ColorSpace, RenderingIntent};
use crate::resources::ResourceSet;
use log::warn;
use smallvec::SmallVec;
use std::sync::Arc;
use vellum_syntax::Document;
use vellum_syntax::filter::ImageColorSpace;
use vellum_syntax::object::dict::keys::{
    BITS_PER_COMPONENT, DECODE, HEIGHT, IMAGE_MASK, INTERPOLATE, S_MASK, WIDTH,
};
use vellum_syntax::object::{Dict, Stream, Value};

// A hard ceiling against absurd dimensions in hostile files.
const MAX_PIXELS: u64 = 64 * 1024 * 1024;

/// Decode an image stream to RGBA. Stencil masks are rendered in the
/// given fill color.
pub(crate) fn decode_image(
    resources: &ResourceSet<'_>,
    stream: &Stream,
    fill_color: AlphaColor,
    intent: RenderingIntent,
) -> Option<RgbaImage> {
    let info = resources.doc().decoded_stream_with_info(stream)?;

    decode_image_data(resources, &stream.dict, info, fill_color, intent)
}

/// Decode an inline image (`BI … ID … EI`).
pub(crate) fn decode_inline_image(
    resources: &ResourceSet<'_>,
    dict: &Dict,
    data: &[u8],
    fill_color: AlphaColor,
    intent: RenderingIntent,
) -> Option<RgbaImage> {
    let info = resources.doc().decode_raw(data, dict)?;

    decode_image_data(resources, dict, info, fill_color, intent)
}

fn decode_image_data(
    resources: &ResourceSet<'_>,
    dict: &Dict,
    info: vellum_syntax::filter::FilterResult,
    fill_color: AlphaColor,
    intent: RenderingIntent,
) -> Option<RgbaImage> {
    let doc = resources.doc();

    let width = image_key::<u32>(doc, dict, WIDTH, b"W")?;
    let height = image_key::<u32>(doc, dict, HEIGHT, b"H")?;

    if width == 0 || height == 0 || u64::from(width) * u64::from(height) > MAX_PIXELS {
        warn!("image dimensions {width}x{height} are out of range");

        return None;
    }

    let interpolate = image_key::<bool>(doc, dict, INTERPOLATE, b"I").unwrap_or(false);
    let is_mask = image_key::<bool>(doc, dict, IMAGE_MASK, b"IM").unwrap_or(false);

    if is_mask {
        return decode_stencil(width, height, &info.data, doc, dict, fill_color, interpolate);
    }

    let bits = info
        .bits_per_component
        .or_else(|| image_key::<u8>(doc, dict, BITS_PER_COMPONENT, b"BPC"))
        .unwrap_or(8);

    if !matches!(bits, 1 | 2 | 4 | 8 | 16) {
        warn!("unsupported bits per component {bits}");

        return None;
    }

    // The codec knows best; the dictionary is the fallback.
    let space = match info.color_space {
        Some(ImageColorSpace::Gray) => ColorSpace::device_gray(),
        Some(ImageColorSpace::Rgb) => ColorSpace::device_rgb(),
        Some(ImageColorSpace::Cmyk) => ColorSpace::device_cmyk(),
        None => color_space_of(resources, dict)?,
    };

    let n = usize::from(space.num_components());

    let decode: SmallVec<[(f32, f32); 4]> = image_key::<vellum_syntax::object::Array>(doc, dict, DECODE, b"D")
        .and_then(|arr| {
            let nums: Vec<f32> = arr.iter_resolved::<f32>(doc).collect();

            if nums.len() == 2 * n {
                Some(nums.chunks_exact(2).map(|c| (c[0], c[1])).collect())
            } else {
                None
            }
        })
        .unwrap_or_else(|| space.default_decode(bits));

    let sample_max = ((1u32 << bits.min(16)) - 1) as f32;
    let row_bytes = (width as usize * n * usize::from(bits)).div_ceil(8);

    let mut out = Vec::with_capacity(width as usize * height as usize * 4);
    let mut components: SmallVec<[f32; 4]> = SmallVec::from_elem(0.0, n);

    for y in 0..height as usize {
        let Some(row) = info.data.get(y * row_bytes..(y + 1) * row_bytes) else {
            // Short data: pad the remaining rows with transparency.
            out.resize(width as usize * height as usize * 4, 0);

            break;
        };

        let mut cursor = RowCursor::new(row, bits);

        for _ in 0..width {
            for (j, slot) in components.iter_mut().enumerate() {
                let raw = cursor.next().unwrap_or(0) as f32;
                let (d0, d1) = decode[j];

                *slot = d0 + raw * (d1 - d0) / sample_max;
            }

            let rgba = space.to_rgba(&components, 1.0, intent).to_rgba8();
            out.extend_from_slice(&rgba);
        }
    }

    let mut image = RgbaImage {
        width,
        height,
        data: Arc::new(out),
        interpolate,
    };

    apply_soft_mask(resources, doc, dict, &mut image, intent);

    Some(image)
}

/// A 1-bit stencil mask painted in the current fill color. A sample of 0
/// paints; `/Decode [1 0]` flips that.
fn decode_stencil(
    width: u32,
    height: u32,
    data: &[u8],
    doc: &Document,
    dict: &Dict,
    fill_color: AlphaColor,
    interpolate: bool,
) -> Option<RgbaImage> {
    let invert = image_key::<vellum_syntax::object::Array>(doc, dict, DECODE, b"D")
        .map(|arr| arr.get_direct::<f32>(0) == Some(1.0))
        .unwrap_or(false);

    let row_bytes = (width as usize).div_ceil(8);
    let fill = fill_color.to_rgba8();

    let mut out = Vec::with_capacity(width as usize * height as usize * 4);

    for y in 0..height as usize {
        let row = data.get(y * row_bytes..(y + 1) * row_bytes);

        for x in 0..width as usize {
            let bit = row
                .and_then(|r| r.get(x / 8))
                .map(|b| b >> (7 - x % 8) & 1)
                .unwrap_or(1);

            let paint = (bit == 0) != invert;

            if paint {
                out.extend_from_slice(&fill);
            } else {
                out.extend_from_slice(&[0, 0, 0, 0]);
            }
        }
    }

    Some(RgbaImage {
        width,
        height,
        data: Arc::new(out),
        interpolate,
    })
}

/// Multiply the image's alpha by its `/SMask`, when it carries one.
fn apply_soft_mask(
    resources: &ResourceSet<'_>,
    doc: &Document,
    dict: &Dict,
    image: &mut RgbaImage,
    intent: RenderingIntent,
) {
    let Some(mask_stream) = dict.get::<Stream>(doc, S_MASK) else {
        return;
    };

    let Some(mask) = decode_image(resources, &mask_stream, AlphaColor::BLACK, intent) else {
        return;
    };

    let mut data = (*image.data).clone();

    for (i, pixel) in data.chunks_exact_mut(4).enumerate() {
        // Sample the mask with nearest neighbor; mask and image sizes may
        // differ.
        let x = i as u32 % image.width;
        let y = i as u32 / image.width;

        let mx = (u64::from(x) * u64::from(mask.width) / u64::from(image.width)) as u32;
        let my = (u64::from(y) * u64::from(mask.height) / u64::from(image.height)) as u32;

        let mask_index = (my * mask.width + mx) as usize * 4;

        // The mask's gray level arrives in its red channel.
        let alpha = mask.data.get(mask_index).copied().unwrap_or(255);

        pixel[3] = (u16::from(pixel[3]) * u16::from(alpha) / 255) as u8;
    }

    image.data = Arc::new(data);
}

/// Image dictionaries use full names in XObjects and abbreviations in
/// inline images; accept both.
fn image_key<T: vellum_syntax::object::FromValue>(
    doc: &Document,
    dict: &Dict,
    key: &[u8],
    abbreviation: &[u8],
) -> Option<T> {
    dict.get::<T>(doc, key)
        .or_else(|| dict.get::<T>(doc, abbreviation))
}

fn color_space_of(resources: &ResourceSet<'_>, dict: &Dict) -> Option<ColorSpace> {
    let doc = resources.doc();

    let value = dict
        .get_raw(b"ColorSpace")
        .or_else(|| dict.get_raw(b"CS"))?;

    // A name can be a device family or a resource reference.
    if let Value::Name(name) = &doc.resolve(value) {
        if let Some(family) = ColorSpace::from_family_name(name) {
            return Some(family);
        }

        return resources.color_space(name);
    }

    ColorSpace::from_value(doc, value, resources.icc_cache())
}

#[cfg(test)]
mod tests {
    use super::RowCursor;

    #[test]
    fn row_cursor_sub_byte() {
        // 4-bit samples: 0x12 0x34 -> 1, 2, 3, 4.
        let mut cursor = RowCursor::new(&[0x12, 0x34], 4);
        assert_eq!(cursor.next(), Some(1));
        assert_eq!(cursor.next(), Some(2));
        assert_eq!(cursor.next(), Some(3));
        assert_eq!(cursor.next(), Some(4));
        assert_eq!(cursor.next(), None);
    }

    #[test]
    fn row_cursor_sixteen_bits() {
        let mut cursor = RowCursor::new(&[0x01, 0x00, 0xff, 0xff], 16);
        assert_eq!(cursor.next(), Some(256));
        assert_eq!(cursor.next(), Some(65535));
    }
}

/// Reads fixed-width samples from one image row.
struct RowCursor<'a> {
    data: &'a [u8],
    bit_pos: usize,
    bits: u8,
}

impl<'a> RowCursor<'a> {
    fn new(data: &'a [u8], bits: u8) -> Self {
        Self {
            data,
            bit_pos: 0,
            bits,
        }
    }

    fn next(&mut self) -> Option<u32> {
        let mut out = 0u32;

        for _ in 0..self.bits {
            let byte = *self.data.get(self.bit_pos / 8)?;
            out = out << 1 | u32::from(byte >> (7 - self.bit_pos % 8) & 1);
            self.bit_pos += 1;
        }

        Some(out)
    }
}
