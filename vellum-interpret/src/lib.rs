/*!
Color conversion and content-stream interpretation.

This crate executes a page's content stream into an abstract [`Canvas`]:
it maintains the graphics-state stack, converts colors to sRGB through
the color space engine, decodes images, and dispatches drawing operators.
Glyph realization, rasterization and compositing live on the other side
of the canvas trait.

Rendering is cancellation-aware: [`render_page`](interpret::render_page)
polls its [`CancelToken`] at every operator boundary and returns early
when it fires.
*/

#![forbid(unsafe_code)]

pub mod cancel;
pub mod canvas;
pub mod color;
pub mod content;
pub mod image;
pub mod interpret;
pub mod resources;
pub mod state;

pub use cancel::CancelToken;
pub use canvas::{Canvas, FillRule, LineCap, LineJoin, Paint, RgbaImage, StrokeProps, TextRun};
pub use color::{AlphaColor, ColorSpace, RenderingIntent};
pub use interpret::{RenderParams, render_page};
pub use resources::PageCaches;

pub use vellum_syntax;
