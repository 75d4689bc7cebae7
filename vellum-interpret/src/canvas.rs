//! The canvas seam.
//!
//! The interpreter draws into this trait; the concrete 2D backend (a
//! recording canvas in the display panel) lives on the other side.

use crate::color::AlphaColor;
use kurbo::{Affine, BezPath};
use smallvec::SmallVec;
use std::sync::Arc;
use vellum_syntax::object::ByteString;

/// The rule deciding which regions a path encloses.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum FillRule {
    /// The non-zero winding rule.
    #[default]
    NonZero,
    /// The even-odd rule.
    EvenOdd,
}

/// The shape of stroke endpoints.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum LineCap {
    /// Square end, flush with the endpoint.
    #[default]
    Butt,
    /// Semicircular end.
    Round,
    /// Square end, extending past the endpoint.
    Square,
}

/// The shape of stroke corners.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum LineJoin {
    /// Sharp corner.
    #[default]
    Miter,
    /// Rounded corner.
    Round,
    /// Cut-off corner.
    Bevel,
}

/// Stroke parameters, in device space.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeProps {
    /// The line width.
    pub width: f32,
    /// The line cap style.
    pub cap: LineCap,
    /// The line join style.
    pub join: LineJoin,
    /// The miter limit.
    pub miter_limit: f32,
    /// The dash pattern; empty means solid.
    pub dash_array: SmallVec<[f32; 4]>,
    /// The dash phase.
    pub dash_offset: f32,
}

impl Default for StrokeProps {
    fn default() -> Self {
        Self {
            width: 1.0,
            cap: LineCap::Butt,
            join: LineJoin::Miter,
            miter_limit: 10.0,
            dash_array: SmallVec::new(),
            dash_offset: 0.0,
        }
    }
}

/// A solid paint. Patterns and shadings degrade to their base color
/// before reaching the canvas.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Paint {
    /// The color, already converted to sRGB with alpha.
    pub color: AlphaColor,
}

/// A decoded raster image, RGBA8 with premultiplication left to the
/// backend.
#[derive(Debug, Clone)]
pub struct RgbaImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// `width * height * 4` bytes, rows top-down.
    pub data: Arc<Vec<u8>>,
    /// Whether the backend should interpolate when scaling.
    pub interpolate: bool,
}

/// A run of text, delegated to the font subsystem behind the canvas.
#[derive(Debug, Clone)]
pub struct TextRun {
    /// The resource name of the font.
    pub font: ByteString,
    /// The font size.
    pub size: f32,
    /// The raw string bytes, still in the font's encoding.
    pub bytes: ByteString,
    /// Device transform for the text origin: combines the text matrix,
    /// the current transformation matrix and the text-state parameters.
    pub transform: Affine,
    /// The fill color.
    pub color: AlphaColor,
    /// Character spacing.
    pub char_spacing: f32,
    /// Word spacing.
    pub word_spacing: f32,
    /// Horizontal scaling, as a fraction (1.0 is unscaled).
    pub horizontal_scaling: f32,
    /// The text rendering mode (0 through 7).
    pub render_mode: u8,
}

/// The drawing surface of the interpreter.
///
/// Paths arrive already transformed to device space. Image transforms map
/// the image's unit square to its placement, with the image's top edge on
/// the `y = 1` side of the square (PDF image space).
pub trait Canvas {
    /// Push a graphics-state snapshot (clip stack included).
    fn save(&mut self);
    /// Pop back to the last saved state.
    fn restore(&mut self);
    /// Intersect the clip with a path.
    fn clip(&mut self, path: &BezPath, rule: FillRule);
    /// Fill a path.
    fn fill_path(&mut self, path: &BezPath, rule: FillRule, paint: &Paint);
    /// Stroke a path.
    fn stroke_path(&mut self, path: &BezPath, paint: &Paint, stroke: &StrokeProps);
    /// Draw an image.
    fn draw_image(&mut self, image: &RgbaImage, transform: Affine);
    /// Draw a text run.
    fn draw_text(&mut self, run: &TextRun);
    /// Begin a marked-content section. The default does nothing.
    fn begin_marked_content(&mut self, _tag: &[u8]) {}
    /// End a marked-content section. The default does nothing.
    fn end_marked_content(&mut self) {}
}
