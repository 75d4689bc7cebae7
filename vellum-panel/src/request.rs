//! Drawing requests.

use crate::panel::PageInfo;
use kurbo::Point;
use vellum_interpret::color::AlphaColor;
use vellum_syntax::object::ObjRef;

/// The pointer's relationship to the viewport, as far as annotation
/// appearances care.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum PointerState {
    /// No interaction.
    #[default]
    Idle,
    /// The pointer hovers over the active annotation.
    Hovered,
    /// The pointer is pressed on the active annotation.
    Pressed,
}

/// A page currently (or imminently) inside the viewport, as the producer
/// saw it when it built the request.
#[derive(Debug, Clone, PartialEq)]
pub struct VisiblePage {
    /// The 1-based page number.
    pub page_number: u32,
    /// Where the page's top-left corner sits on the canvas, in canvas
    /// pixels.
    pub offset: Point,
    /// A snapshot of the page's display properties.
    pub info: PageInfo,
    /// The viewer-applied rotation at snapshot time.
    pub user_rotation: i32,
}

/// A request to draw a set of visible pages.
#[derive(Debug, Clone, PartialEq)]
pub struct PagesDrawingRequest {
    /// The zoom factor.
    pub scale: f32,
    /// The scroll offset of the viewport, in canvas pixels.
    pub offset: Point,
    /// The viewport size in pixels.
    pub canvas_size: (u32, u32),
    /// The color behind and between pages.
    pub background_color: AlphaColor,
    /// The bounding size for thumbnails.
    pub max_thumbnail_size: f32,
    /// The pages to draw.
    pub visible_pages: Vec<VisiblePage>,
    /// The annotation currently under the pointer, if any.
    pub active_annotation: Option<ObjRef>,
    /// The pointer state for the active annotation's appearance.
    pub pointer_state: PointerState,
}

/// A request processed by the rendering queue.
///
/// Equality is structural; the queue drops a request equal to the last
/// one enqueued.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawingRequest {
    /// Draw pages.
    Pages(PagesDrawingRequest),
    /// Drop the current surface and start over at a new size.
    Reset {
        /// The new viewport size.
        canvas_size: (u32, u32),
    },
    /// Re-present the last surface without re-rendering.
    RefreshGraphics,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> DrawingRequest {
        DrawingRequest::Pages(PagesDrawingRequest {
            scale: 1.0,
            offset: Point::ZERO,
            canvas_size: (800, 600),
            background_color: AlphaColor::WHITE,
            max_thumbnail_size: 128.0,
            visible_pages: vec![],
            active_annotation: None,
            pointer_state: PointerState::Idle,
        })
    }

    #[test]
    fn structural_equality() {
        assert_eq!(request(), request());

        let mut other = request();
        if let DrawingRequest::Pages(pages) = &mut other {
            pages.scale = 1.5;
        }

        assert_ne!(request(), other);
    }
}
