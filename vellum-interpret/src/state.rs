//! The graphics state.

use crate::canvas::StrokeProps;
use crate::color::{AlphaColor, ColorComponents, ColorSpace, RenderingIntent};
use kurbo::Affine;
use smallvec::smallvec;
use vellum_syntax::object::ByteString;

/// A color: a space plus current component values.
#[derive(Debug, Clone)]
pub(crate) struct ColorState {
    pub(crate) space: ColorSpace,
    pub(crate) components: ColorComponents,
}

impl ColorState {
    fn black() -> Self {
        Self {
            space: ColorSpace::device_gray(),
            components: smallvec![0.0],
        }
    }

    /// Install a new space with its initial color.
    pub(crate) fn set_space(&mut self, space: ColorSpace) {
        self.components = space.initial_color();
        self.space = space;
    }

    pub(crate) fn to_rgba(&self, alpha: f32, intent: RenderingIntent) -> AlphaColor {
        self.space.to_rgba(&self.components, alpha, intent)
    }
}

/// The text-specific portion of the graphics state.
#[derive(Debug, Clone)]
pub(crate) struct TextState {
    pub(crate) char_spacing: f32,
    pub(crate) word_spacing: f32,
    pub(crate) horizontal_scaling: f32,
    pub(crate) leading: f32,
    pub(crate) rise: f32,
    pub(crate) font: Option<ByteString>,
    pub(crate) font_size: f32,
    pub(crate) render_mode: u8,
    pub(crate) text_matrix: Affine,
    pub(crate) line_matrix: Affine,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scaling: 1.0,
            leading: 0.0,
            rise: 0.0,
            font: None,
            font_size: 0.0,
            render_mode: 0,
            text_matrix: Affine::IDENTITY,
            line_matrix: Affine::IDENTITY,
        }
    }
}

impl TextState {
    /// Move to the next line displaced by `(tx, ty)` from the start of
    /// the current one.
    pub(crate) fn next_line(&mut self, tx: f64, ty: f64) {
        self.line_matrix = self.line_matrix * Affine::translate((tx, ty));
        self.text_matrix = self.line_matrix;
    }
}

/// One level of the graphics-state stack.
#[derive(Debug, Clone)]
pub(crate) struct GraphicsState {
    pub(crate) ctm: Affine,
    pub(crate) stroke: ColorState,
    pub(crate) fill: ColorState,
    pub(crate) stroke_alpha: f32,
    pub(crate) fill_alpha: f32,
    pub(crate) stroke_props: StrokeProps,
    pub(crate) intent: RenderingIntent,
    pub(crate) text: TextState,
}

impl GraphicsState {
    pub(crate) fn new(ctm: Affine) -> Self {
        Self {
            ctm,
            stroke: ColorState::black(),
            fill: ColorState::black(),
            stroke_alpha: 1.0,
            fill_alpha: 1.0,
            stroke_props: StrokeProps::default(),
            intent: RenderingIntent::default(),
            text: TextState::default(),
        }
    }

    pub(crate) fn stroke_color(&self) -> AlphaColor {
        self.stroke.to_rgba(self.stroke_alpha, self.intent)
    }

    pub(crate) fn fill_color(&self) -> AlphaColor {
        self.fill.to_rgba(self.fill_alpha, self.intent)
    }
}
