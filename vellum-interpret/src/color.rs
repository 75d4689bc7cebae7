//! PDF colors and color spaces.
//!
//! Every color space resolves to a converter that turns component values
//! into sRGB. Calibrated spaces follow the pdf.js-derived math; ICC
//! profiles go through qcms.

use crate::resources::IccStreamCache;
use log::warn;
use qcms::Transform;
use smallvec::{SmallVec, smallvec};
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, OnceLock};
use vellum_syntax::Document;
use vellum_syntax::function::Function;
use vellum_syntax::object::dict::keys::{
    ALTERNATE, BLACK_POINT, GAMMA, MATRIX, N, RANGE, WHITE_POINT,
};
use vellum_syntax::object::{Array, ByteString, Dict, Name, Stream, Value};

/// A storage for the components of colors.
pub type ColorComponents = SmallVec<[f32; 4]>;

/// An sRGB color with an alpha channel.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct AlphaColor {
    components: [f32; 4],
}

impl AlphaColor {
    /// Opaque black.
    pub const BLACK: Self = Self::new([0.0, 0.0, 0.0, 1.0]);

    /// Fully transparent.
    pub const TRANSPARENT: Self = Self::new([0.0, 0.0, 0.0, 0.0]);

    /// Opaque white.
    pub const WHITE: Self = Self::new([1.0, 1.0, 1.0, 1.0]);

    /// Create a color from RGBA components in `0.0..=1.0`.
    pub const fn new(components: [f32; 4]) -> Self {
        Self { components }
    }

    /// Create an opaque color from 8-bit RGB values.
    pub const fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self::new([u8_to_f32(r), u8_to_f32(g), u8_to_f32(b), 1.0])
    }

    /// The color as 8-bit RGBA.
    pub fn to_rgba8(&self) -> [u8; 4] {
        self.components.map(f32_to_u8)
    }

    /// The RGBA components.
    pub fn components(&self) -> [f32; 4] {
        self.components
    }

    /// The same color with a different alpha.
    pub fn with_alpha(&self, alpha: f32) -> Self {
        let mut components = self.components;
        components[3] = alpha;

        Self { components }
    }
}

const fn u8_to_f32(x: u8) -> f32 {
    x as f32 * (1.0 / 255.0)
}

fn f32_to_u8(x: f32) -> u8 {
    (x.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
}

/// The policy for mapping out-of-gamut colors between spaces.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum RenderingIntent {
    /// Preserve in-gamut colors relative to the media white.
    #[default]
    RelativeColorimetric,
    /// Preserve absolute colorimetry.
    AbsoluteColorimetric,
    /// Preserve overall appearance.
    Perceptual,
    /// Preserve saturation.
    Saturation,
}

impl RenderingIntent {
    /// Parse the `/Intent` name; unknown names keep the default.
    pub fn from_name(name: &[u8]) -> Self {
        match name {
            b"AbsoluteColorimetric" => Self::AbsoluteColorimetric,
            b"Perceptual" => Self::Perceptual,
            b"Saturation" => Self::Saturation,
            b"RelativeColorimetric" => Self::RelativeColorimetric,
            _ => {
                warn!("unknown rendering intent {}", String::from_utf8_lossy(name));

                Self::RelativeColorimetric
            }
        }
    }

    fn index(self) -> usize {
        match self {
            Self::RelativeColorimetric => 0,
            Self::AbsoluteColorimetric => 1,
            Self::Perceptual => 2,
            Self::Saturation => 3,
        }
    }
}

#[derive(Debug)]
enum Space {
    DeviceGray,
    DeviceRgb,
    DeviceCmyk,
    CalGray(CalGray),
    CalRgb(CalRgb),
    Lab(Lab),
    IccBased(Arc<IccProfile>),
    Indexed(Indexed),
    Separation(Separation),
    DeviceN(DeviceN),
    Pattern(Option<ColorSpace>),
}

/// A color space converter.
#[derive(Debug, Clone)]
pub struct ColorSpace(Arc<Space>);

impl ColorSpace {
    /// The device gray color space.
    pub fn device_gray() -> Self {
        Self(Arc::new(Space::DeviceGray))
    }

    /// The device RGB color space.
    pub fn device_rgb() -> Self {
        Self(Arc::new(Space::DeviceRgb))
    }

    /// The device CMYK color space.
    pub fn device_cmyk() -> Self {
        Self(Arc::new(Space::DeviceCmyk))
    }

    /// The pattern color space, optionally carrying a base space for the
    /// pattern's components.
    pub fn pattern(base: Option<ColorSpace>) -> Self {
        Self(Arc::new(Space::Pattern(base)))
    }

    /// Build a converter from an ICC profile.
    pub fn from_icc_data(profile: &[u8], components: usize) -> Option<Self> {
        IccProfile::new(profile, components).map(Self::from_icc_profile)
    }

    pub(crate) fn from_icc_profile(icc: Arc<IccProfile>) -> Self {
        Self(Arc::new(Space::IccBased(icc)))
    }

    /// Resolve a color-space value (a name or an array) to a converter.
    pub fn from_value(doc: &Document, value: &Value, icc_cache: &IccStreamCache) -> Option<Self> {
        let resolved = doc.resolve(value);

        if let Some(name) = resolved.as_name() {
            return Self::from_family_name(name);
        }

        let arr = resolved.as_array()?;
        let family = doc.resolve_as::<Name>(arr.get_raw(0)?)?.0;

        match family.as_bytes() {
            b"ICCBased" => {
                let stream = doc.resolve_as::<Stream>(arr.get_raw(1)?)?;
                let components = stream.dict.get::<usize>(doc, N).unwrap_or(3);

                let profile = icc_cache.get_or_build(doc, &stream, components);

                profile
                    .map(Self::from_icc_profile)
                    .or_else(|| {
                        // Fall back to the alternate, then to the device
                        // space matching the component count.
                        stream
                            .dict
                            .get_raw(ALTERNATE)
                            .and_then(|alt| Self::from_value(doc, alt, icc_cache))
                    })
                    .or_else(|| match components {
                        1 => Some(Self::device_gray()),
                        4 => Some(Self::device_cmyk()),
                        _ => Some(Self::device_rgb()),
                    })
            }
            b"CalGray" => {
                let dict = doc.resolve_as::<Dict>(arr.get_raw(1)?)?;

                Some(Self(Arc::new(Space::CalGray(CalGray::new(doc, &dict)))))
            }
            b"CalRGB" => {
                let dict = doc.resolve_as::<Dict>(arr.get_raw(1)?)?;

                Some(Self(Arc::new(Space::CalRgb(CalRgb::new(doc, &dict)))))
            }
            b"CalCMYK" => Some(Self::device_cmyk()),
            b"Lab" => {
                let dict = doc.resolve_as::<Dict>(arr.get_raw(1)?)?;

                Some(Self(Arc::new(Space::Lab(Lab::new(doc, &dict)))))
            }
            b"Indexed" | b"I" => Indexed::new(doc, arr, icc_cache)
                .map(|i| Self(Arc::new(Space::Indexed(i)))),
            b"Separation" => Separation::new(doc, arr, icc_cache)
                .map(|s| Self(Arc::new(Space::Separation(s)))),
            b"DeviceN" => DeviceN::new(doc, arr, icc_cache)
                .map(|d| Self(Arc::new(Space::DeviceN(d)))),
            b"Pattern" => {
                let base = arr
                    .get_raw(1)
                    .and_then(|v| Self::from_value(doc, v, icc_cache));

                Some(Self::pattern(base))
            }
            b"DeviceRGB" | b"RGB" => Some(Self::device_rgb()),
            b"DeviceGray" | b"G" => Some(Self::device_gray()),
            b"DeviceCMYK" | b"CMYK" => Some(Self::device_cmyk()),
            other => {
                warn!(
                    "unsupported color space family {}",
                    String::from_utf8_lossy(other)
                );

                None
            }
        }
    }

    /// Resolve a bare family name.
    pub fn from_family_name(name: &ByteString) -> Option<Self> {
        match name.as_bytes() {
            b"DeviceRGB" | b"RGB" | b"CalRGB" => Some(Self::device_rgb()),
            b"DeviceGray" | b"G" | b"CalGray" => Some(Self::device_gray()),
            b"DeviceCMYK" | b"CMYK" | b"CalCMYK" => Some(Self::device_cmyk()),
            b"Pattern" => Some(Self::pattern(None)),
            _ => None,
        }
    }

    /// The number of components a color in this space has.
    pub fn num_components(&self) -> u8 {
        match self.0.as_ref() {
            Space::DeviceGray | Space::CalGray(_) => 1,
            Space::DeviceRgb | Space::CalRgb(_) | Space::Lab(_) => 3,
            Space::DeviceCmyk => 4,
            Space::IccBased(icc) => icc.components as u8,
            Space::Indexed(_) => 1,
            Space::Separation(_) => 1,
            Space::DeviceN(d) => d.components as u8,
            Space::Pattern(base) => base.as_ref().map(|b| b.num_components()).unwrap_or(1),
        }
    }

    /// Whether this is one of the device color spaces.
    pub fn is_device(&self) -> bool {
        matches!(
            self.0.as_ref(),
            Space::DeviceGray | Space::DeviceRgb | Space::DeviceCmyk
        )
    }

    /// Whether this is the pattern color space.
    pub fn is_pattern(&self) -> bool {
        matches!(self.0.as_ref(), Space::Pattern(_))
    }

    /// The base space a pattern carries, when there is one.
    pub fn pattern_base(&self) -> Option<ColorSpace> {
        match self.0.as_ref() {
            Space::Pattern(base) => base.clone(),
            _ => None,
        }
    }

    /// The color operators select when the space is first installed.
    pub fn initial_color(&self) -> ColorComponents {
        match self.0.as_ref() {
            Space::DeviceGray | Space::CalGray(_) => smallvec![0.0],
            Space::DeviceRgb | Space::CalRgb(_) | Space::Lab(_) => smallvec![0.0, 0.0, 0.0],
            Space::DeviceCmyk => smallvec![0.0, 0.0, 0.0, 1.0],
            Space::IccBased(icc) => match icc.components {
                1 => smallvec![0.0],
                4 => smallvec![0.0, 0.0, 0.0, 1.0],
                _ => smallvec![0.0, 0.0, 0.0],
            },
            Space::Indexed(_) => smallvec![0.0],
            Space::Separation(_) => smallvec![1.0],
            Space::DeviceN(d) => smallvec![1.0; d.components],
            Space::Pattern(base) => base
                .as_ref()
                .map(|b| b.initial_color())
                .unwrap_or(smallvec![0.0]),
        }
    }

    /// The default `/Decode` ranges for an image in this space.
    pub fn default_decode(&self, bits_per_component: u8) -> SmallVec<[(f32, f32); 4]> {
        match self.0.as_ref() {
            Space::DeviceGray | Space::CalGray(_) | Space::Separation(_) => smallvec![(0.0, 1.0)],
            Space::DeviceRgb | Space::CalRgb(_) => smallvec![(0.0, 1.0); 3],
            Space::DeviceCmyk => smallvec![(0.0, 1.0); 4],
            Space::IccBased(icc) => smallvec![(0.0, 1.0); icc.components],
            Space::Lab(lab) => smallvec![
                (0.0, 100.0),
                (lab.range[0], lab.range[1]),
                (lab.range[2], lab.range[3]),
            ],
            Space::Indexed(_) => {
                smallvec![(0.0, (1u32 << bits_per_component.min(16)) as f32 - 1.0)]
            }
            Space::DeviceN(d) => smallvec![(0.0, 1.0); d.components],
            Space::Pattern(_) => smallvec![(0.0, 1.0)],
        }
    }

    /// Convert component values and an alpha into an sRGB color.
    pub fn to_rgba(&self, c: &[f32], alpha: f32, intent: RenderingIntent) -> AlphaColor {
        self.to_rgba_inner(c, alpha, intent)
            .unwrap_or(AlphaColor::BLACK.with_alpha(alpha))
    }

    fn to_rgba_inner(&self, c: &[f32], alpha: f32, intent: RenderingIntent) -> Option<AlphaColor> {
        let color = match self.0.as_ref() {
            Space::DeviceGray => {
                let g = c.first()?.clamp(0.0, 1.0);

                AlphaColor::new([g, g, g, alpha])
            }
            Space::DeviceRgb => AlphaColor::new([
                c.first()?.clamp(0.0, 1.0),
                c.get(1)?.clamp(0.0, 1.0),
                c.get(2)?.clamp(0.0, 1.0),
                alpha,
            ]),
            Space::DeviceCmyk => {
                let [cy, m, y, k] = [
                    c.first()?.clamp(0.0, 1.0),
                    c.get(1)?.clamp(0.0, 1.0),
                    c.get(2)?.clamp(0.0, 1.0),
                    c.get(3)?.clamp(0.0, 1.0),
                ];

                AlphaColor::new([
                    (1.0 - cy) * (1.0 - k),
                    (1.0 - m) * (1.0 - k),
                    (1.0 - y) * (1.0 - k),
                    alpha,
                ])
            }
            Space::CalGray(cal) => {
                let [r, g, b] = cal.to_srgb(*c.first()?);

                AlphaColor::from_rgb8(r, g, b).with_alpha(alpha)
            }
            Space::CalRgb(cal) => {
                let [r, g, b] = cal.to_srgb([*c.first()?, *c.get(1)?, *c.get(2)?]);

                AlphaColor::from_rgb8(r, g, b).with_alpha(alpha)
            }
            Space::Lab(lab) => {
                let [r, g, b] = lab.to_srgb([*c.first()?, *c.get(1)?, *c.get(2)?]);

                AlphaColor::from_rgb8(r, g, b).with_alpha(alpha)
            }
            Space::IccBased(icc) => {
                let [r, g, b] = icc.to_srgb(c)?;

                AlphaColor::from_rgb8(r, g, b).with_alpha(alpha)
            }
            Space::Indexed(indexed) => indexed.lookup(*c.first()?, intent).with_alpha(alpha),
            Space::Separation(sep) => sep.to_rgba(*c.first()?, alpha, intent),
            Space::DeviceN(dn) => dn.to_rgba(c, alpha, intent),
            Space::Pattern(_) => AlphaColor::BLACK.with_alpha(alpha),
        };

        Some(color)
    }
}

#[derive(Debug)]
struct CalGray {
    white_point: [f32; 3],
    black_point: [f32; 3],
    gamma: f32,
}

impl CalGray {
    fn new(doc: &Document, dict: &Dict) -> Self {
        Self {
            white_point: dict
                .get::<[f32; 3]>(doc, WHITE_POINT)
                .unwrap_or([1.0, 1.0, 1.0]),
            black_point: dict
                .get::<[f32; 3]>(doc, BLACK_POINT)
                .unwrap_or([0.0, 0.0, 0.0]),
            gamma: dict.get::<f32>(doc, GAMMA).unwrap_or(1.0),
        }
    }

    fn luminance_to_srgb_byte(luminance: f32) -> f32 {
        0.0f32.max(295.8 * luminance.powf(1.0 / 3.0) - 40.8)
    }

    fn to_srgb(&self, c: f32) -> [u8; 3] {
        let a = c.clamp(0.0, 1.0);
        let luminance = self.white_point[1] * a.powf(self.gamma);
        let value = Self::luminance_to_srgb_byte(luminance) / 255.0;

        // Black-point compensation, applied after conversion in sRGB.
        let floor = Self::luminance_to_srgb_byte(self.black_point[1].max(0.0)) / 255.0;
        let compensated = floor + (1.0 - floor) * value;

        let byte = f32_to_u8(compensated);

        [byte, byte, byte]
    }
}

#[derive(Debug)]
struct CalRgb {
    white_point: [f32; 3],
    matrix: [f32; 9],
    gamma: [f32; 3],
}

// The `/BlackPoint` entry is read but deliberately not applied; viewers
// disagree about it and ignoring it matches the reference behavior.
impl CalRgb {
    const BRADFORD: [f32; 9] = [
        0.8951, 0.2664, -0.1614, -0.7502, 1.7135, 0.0367, 0.0389, -0.0685, 1.0296,
    ];

    const BRADFORD_INVERSE: [f32; 9] = [
        0.9869929, -0.1470543, 0.1599627, 0.4323053, 0.5183603, 0.0492912, -0.0085287, 0.0400428,
        0.9684867,
    ];

    const SRGB_D65_XYZ_TO_RGB: [f32; 9] = [
        3.2404542, -1.5371385, -0.4985314, -0.969_266, 1.8760108, 0.0415560, 0.0556434, -0.2040259,
        1.0572252,
    ];

    const D65_WHITE: [f32; 3] = [0.95047, 1.0, 1.08883];

    fn new(doc: &Document, dict: &Dict) -> Self {
        Self {
            white_point: dict
                .get::<[f32; 3]>(doc, WHITE_POINT)
                .unwrap_or([1.0, 1.0, 1.0]),
            matrix: dict
                .get::<[f32; 9]>(doc, MATRIX)
                .unwrap_or([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]),
            gamma: dict.get::<[f32; 3]>(doc, GAMMA).unwrap_or([1.0, 1.0, 1.0]),
        }
    }

    fn mat_mul(a: &[f32; 9], v: &[f32; 3]) -> [f32; 3] {
        [
            a[0] * v[0] + a[1] * v[1] + a[2] * v[2],
            a[3] * v[0] + a[4] * v[1] + a[5] * v[2],
            a[6] * v[0] + a[7] * v[1] + a[8] * v[2],
        ]
    }

    /// Bradford-adapt `xyz` from the given white point to D65.
    fn adapt_to_d65(source_white: &[f32; 3], xyz: &[f32; 3]) -> [f32; 3] {
        let lms = Self::mat_mul(&Self::BRADFORD, xyz);
        let scaled = [
            lms[0] * Self::D65_WHITE[0] / source_white[0],
            lms[1] * Self::D65_WHITE[1] / source_white[1],
            lms[2] * Self::D65_WHITE[2] / source_white[2],
        ];

        Self::mat_mul(&Self::BRADFORD_INVERSE, &scaled)
    }

    fn srgb_transfer(v: f32) -> f32 {
        if v <= 0.0031308 {
            (12.92 * v).clamp(0.0, 1.0)
        } else if v >= 0.99554525 {
            1.0
        } else {
            (1.055 * v.powf(1.0 / 2.4) - 0.055).clamp(0.0, 1.0)
        }
    }

    fn to_srgb(&self, c: [f32; 3]) -> [u8; 3] {
        let [r, g, b] = c.map(|v| v.clamp(0.0, 1.0));
        let [gr, gg, gb] = self.gamma;

        let lin = [
            if r == 1.0 { 1.0 } else { r.powf(gr) },
            if g == 1.0 { 1.0 } else { g.powf(gg) },
            if b == 1.0 { 1.0 } else { b.powf(gb) },
        ];

        let m = &self.matrix;
        let xyz = [
            m[0] * lin[0] + m[3] * lin[1] + m[6] * lin[2],
            m[1] * lin[0] + m[4] * lin[1] + m[7] * lin[2],
            m[2] * lin[0] + m[5] * lin[1] + m[8] * lin[2],
        ];

        let adapted = Self::adapt_to_d65(&self.white_point, &xyz);
        let srgb = Self::mat_mul(&Self::SRGB_D65_XYZ_TO_RGB, &adapted);

        srgb.map(|v| (Self::srgb_transfer(v) * 255.0 + 0.5) as u8)
    }
}

#[derive(Debug)]
struct Lab {
    white_point: [f32; 3],
    range: [f32; 4],
}

impl Lab {
    fn new(doc: &Document, dict: &Dict) -> Self {
        Self {
            white_point: dict
                .get::<[f32; 3]>(doc, WHITE_POINT)
                .unwrap_or([1.0, 1.0, 1.0]),
            range: dict
                .get::<[f32; 4]>(doc, RANGE)
                .unwrap_or([-100.0, 100.0, -100.0, 100.0]),
        }
    }

    fn finv(t: f32) -> f32 {
        if t >= 6.0 / 29.0 {
            t.powi(3)
        } else {
            (108.0 / 841.0) * (t - 4.0 / 29.0)
        }
    }

    fn to_srgb(&self, c: [f32; 3]) -> [u8; 3] {
        let l = c[0].clamp(0.0, 100.0);
        let a = c[1].clamp(self.range[0], self.range[1]);
        let b = c[2].clamp(self.range[2], self.range[3]);

        let m = (l + 16.0) / 116.0;

        let x = self.white_point[0] * Self::finv(m + a / 500.0);
        let y = self.white_point[1] * Self::finv(m);
        let z = self.white_point[2] * Self::finv(m - b / 200.0);

        // The matrix depends on whether the white point is D50-ish or
        // D65-ish.
        let (r, g, bb) = if self.white_point[2] < 1.0 {
            (
                x * 3.1339 + y * -1.617 + z * -0.4906,
                x * -0.9785 + y * 1.916 + z * 0.0333,
                x * 0.072 + y * -0.229 + z * 1.4057,
            )
        } else {
            (
                x * 3.2406 + y * -1.5372 + z * -0.4986,
                x * -0.9689 + y * 1.8758 + z * 0.0415,
                x * 0.0557 + y * -0.204 + z * 1.057,
            )
        };

        let convert = |v: f32| (v.max(0.0).sqrt() * 255.0).clamp(0.0, 255.0) as u8;

        [convert(r), convert(g), convert(bb)]
    }
}

pub(crate) struct IccProfile {
    transform: Transform,
    components: usize,
}

impl Debug for IccProfile {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "IccProfile {{ components: {} }}", self.components)
    }
}

impl IccProfile {
    pub(crate) fn new(profile: &[u8], components: usize) -> Option<Arc<Self>> {
        let input = qcms::Profile::new_from_slice(profile, false)?;
        let mut output = qcms::Profile::new_sRGB();
        output.precache_output_transform();

        let data_type = match components {
            1 => qcms::DataType::Gray8,
            3 => qcms::DataType::RGB8,
            4 => qcms::DataType::CMYK,
            _ => {
                warn!("unsupported number of components {components} for an ICC profile");

                return None;
            }
        };

        let transform = Transform::new_to(
            &input,
            &output,
            data_type,
            qcms::DataType::RGB8,
            qcms::Intent::default(),
        )?;

        Some(Arc::new(Self {
            transform,
            components,
        }))
    }

    fn to_srgb(&self, c: &[f32]) -> Option<[u8; 3]> {
        if c.len() < self.components {
            return None;
        }

        let input: SmallVec<[u8; 4]> = c[..self.components].iter().map(|v| f32_to_u8(*v)).collect();
        let mut out = [0u8; 3];

        self.transform.convert(&input, &mut out);

        Some(out)
    }
}

#[derive(Debug)]
struct Indexed {
    base: ColorSpace,
    hival: u8,
    lookup: Vec<u8>,
    // One palette per rendering intent, built on first use.
    palettes: [OnceLock<Arc<Vec<AlphaColor>>>; 4],
}

impl Indexed {
    fn new(doc: &Document, arr: &Array, icc_cache: &IccStreamCache) -> Option<Self> {
        let base = ColorSpace::from_value(doc, arr.get_raw(1)?, icc_cache)?;
        let hival = doc.resolve_as::<u8>(arr.get_raw(2)?)?;

        let lookup = match doc.resolve(arr.get_raw(3)?) {
            Value::Stream(stream) => doc.decoded_stream(&stream),
            Value::String(bytes) => bytes.as_bytes().to_vec(),
            _ => return None,
        };

        Some(Self {
            base,
            hival,
            lookup,
            palettes: [const { OnceLock::new() }; 4],
        })
    }

    fn palette(&self, intent: RenderingIntent) -> &Arc<Vec<AlphaColor>> {
        self.palettes[intent.index()].get_or_init(|| {
            let n = usize::from(self.base.num_components());

            let colors = (0..=usize::from(self.hival))
                .map(|i| {
                    let components: ColorComponents = (0..n)
                        .map(|j| {
                            self.lookup
                                .get(i * n + j)
                                .map(|b| f32::from(*b) / 255.0)
                                .unwrap_or(0.0)
                        })
                        .collect();

                    self.base.to_rgba(&components, 1.0, intent)
                })
                .collect();

            Arc::new(colors)
        })
    }

    fn lookup(&self, value: f32, intent: RenderingIntent) -> AlphaColor {
        let palette = self.palette(intent);
        let index = (value.clamp(0.0, f32::from(self.hival)) + 0.5) as usize;

        palette
            .get(index)
            .copied()
            .unwrap_or(AlphaColor::BLACK)
    }
}

#[derive(Debug)]
struct Separation {
    alternate: ColorSpace,
    tint: Function,
}

impl Separation {
    fn new(doc: &Document, arr: &Array, icc_cache: &IccStreamCache) -> Option<Self> {
        // Entry 1 is the colorant name, which only matters for
        // `All`/`None` special cases.
        let name = doc.resolve_as::<Name>(arr.get_raw(1)?)?.0;

        if matches!(name.as_bytes(), b"All" | b"None") {
            warn!("separations named All or None are treated as ordinary colorants");
        }

        let alternate = ColorSpace::from_value(doc, arr.get_raw(2)?, icc_cache)?;
        let tint = Function::new(doc, arr.get_raw(3)?)?;

        Some(Self { alternate, tint })
    }

    fn to_rgba(&self, c: f32, alpha: f32, intent: RenderingIntent) -> AlphaColor {
        let components = self
            .tint
            .eval(&[c])
            .unwrap_or_else(|| self.alternate.initial_color());

        self.alternate.to_rgba(&components, alpha, intent)
    }
}

#[derive(Debug)]
struct DeviceN {
    alternate: ColorSpace,
    components: usize,
    tint: Function,
}

impl DeviceN {
    fn new(doc: &Document, arr: &Array, icc_cache: &IccStreamCache) -> Option<Self> {
        let components = doc.resolve_as::<Array>(arr.get_raw(1)?)?.len();
        let alternate = ColorSpace::from_value(doc, arr.get_raw(2)?, icc_cache)?;
        let tint = Function::new(doc, arr.get_raw(3)?)?;

        Some(Self {
            alternate,
            components,
            tint,
        })
    }

    fn to_rgba(&self, c: &[f32], alpha: f32, intent: RenderingIntent) -> AlphaColor {
        let components = self
            .tint
            .eval(c)
            .unwrap_or_else(|| self.alternate.initial_color());

        self.alternate.to_rgba(&components, alpha, intent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_gray() {
        let cs = ColorSpace::device_gray();
        let c = cs.to_rgba(&[0.5], 1.0, RenderingIntent::default());
        assert_eq!(c.components(), [0.5, 0.5, 0.5, 1.0]);
    }

    #[test]
    fn device_cmyk_black_generation() {
        let cs = ColorSpace::device_cmyk();

        let black = cs.to_rgba(&[0.0, 0.0, 0.0, 1.0], 1.0, RenderingIntent::default());
        assert_eq!(black.to_rgba8(), [0, 0, 0, 255]);

        let red = cs.to_rgba(&[0.0, 1.0, 1.0, 0.0], 1.0, RenderingIntent::default());
        assert_eq!(red.to_rgba8(), [255, 0, 0, 255]);
    }

    #[test]
    fn accessor_defaults() {
        let cs = ColorSpace::device_rgb();
        // Too few components degrade to black rather than failing.
        let c = cs.to_rgba(&[0.3], 0.5, RenderingIntent::default());
        assert_eq!(c.components(), [0.0, 0.0, 0.0, 0.5]);
    }

    #[test]
    fn component_counts() {
        assert_eq!(ColorSpace::device_gray().num_components(), 1);
        assert_eq!(ColorSpace::device_rgb().num_components(), 3);
        assert_eq!(ColorSpace::device_cmyk().num_components(), 4);
        assert!(ColorSpace::device_rgb().is_device());
        assert!(!ColorSpace::pattern(None).is_device());
    }

    #[test]
    fn intent_parsing() {
        assert_eq!(
            RenderingIntent::from_name(b"Perceptual"),
            RenderingIntent::Perceptual
        );
        assert_eq!(
            RenderingIntent::from_name(b"NoSuchIntent"),
            RenderingIntent::RelativeColorimetric
        );
    }
}
