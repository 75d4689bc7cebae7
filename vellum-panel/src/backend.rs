//! The collaborator seams of the panel.
//!
//! The panel records pages into pictures, rasterizes thumbnails into
//! surfaces and presents frames through a render target; all of those are
//! provided by the embedding application.

use crate::request::PagesDrawingRequest;
use kurbo::{Affine, Rect};
use std::future::Future;
use std::pin::Pin;
use vellum_interpret::color::AlphaColor;

/// A boxed future, so provider and target traits stay object-safe.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The family of graphics types the panel draws with.
pub trait GraphicsBackend: Send + Sync + 'static {
    /// A recorded, replayable list of draw commands.
    type Picture: Clone + Send + Sync + 'static;
    /// An immutable raster image (thumbnails, surface snapshots).
    type Image: Clone + Send + Sync + 'static;
    /// A mutable drawing surface.
    type Surface: Surface<Picture = Self::Picture, Image = Self::Image> + Send + 'static;
    /// A canvas that records into a picture.
    type Recorder: RecordingCanvas<Picture = Self::Picture> + Send;

    /// Start recording a picture of the given logical size.
    fn begin_recording(&self, width: f64, height: f64) -> Self::Recorder;
}

/// A canvas whose drawing is captured as a picture.
pub trait RecordingCanvas: vellum_interpret::Canvas {
    /// The picture type produced.
    type Picture;

    /// Finish recording.
    fn finish(self) -> Self::Picture;
}

/// A mutable drawing surface owned by the rendering worker.
pub trait Surface {
    /// The picture type this surface can replay.
    type Picture;
    /// The image type this surface can blit and snapshot to.
    type Image;

    /// The surface width in pixels.
    fn width(&self) -> u32;
    /// The surface height in pixels.
    fn height(&self) -> u32;

    /// Fill the whole surface with a color.
    fn clear(&mut self, color: AlphaColor);
    /// Fill a rectangle.
    fn fill_rect(&mut self, rect: Rect, color: AlphaColor);
    /// Replay a picture under a transform.
    fn draw_picture(&mut self, picture: &Self::Picture, transform: Affine);
    /// Draw an image scaled into `dst`.
    fn draw_image(&mut self, image: &Self::Image, dst: Rect);
    /// Draw the `src` portion of an image scaled into `dst`, optionally
    /// clipped to rounded corners.
    fn draw_image_from(&mut self, image: &Self::Image, src: Rect, dst: Rect, corner_radius: f64);
    /// An immutable snapshot of the current contents.
    fn snapshot(&self) -> Self::Image;
}

/// Creates surfaces for the rendering worker.
pub trait SurfaceProvider<B: GraphicsBackend>: Send + Sync {
    /// The main drawing surface for a viewport of the given size. May be
    /// recycled between passes.
    fn get_drawing_surface(&self, width: u32, height: u32) -> BoxFuture<'_, B::Surface>;
    /// A scratch surface for thumbnail rasterization.
    fn create_thumbnail_surface(&self, width: u32, height: u32) -> BoxFuture<'_, B::Surface>;
}

/// What a present call is delivering.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FrameKind {
    /// The coarse first frame of a pass (backgrounds, old content).
    First,
    /// A frame after one more thumbnail landed.
    Thumbnail,
    /// A frame after one more full page picture landed.
    Picture,
    /// The surface was cleared by a reset request.
    Reset,
    /// A re-present of unchanged contents.
    Refresh,
}

/// Information shipped with every incremental present.
#[derive(Debug, Clone)]
pub struct PresentInfo<'a> {
    /// What this frame contains.
    pub kind: FrameKind,
    /// The request the frame belongs to, for pages passes.
    pub request: Option<&'a PagesDrawingRequest>,
}

/// Receives incremental frames.
pub trait RenderTarget<B: GraphicsBackend>: Send + Sync {
    /// Present the surface's current contents.
    fn present<'a>(&'a self, surface: &'a B::Surface, info: PresentInfo<'a>) -> BoxFuture<'a, ()>;
}

/// An optional dispatcher hook: when present, the worker funnels its draw
/// work through it (for backends that require drawing on a UI thread).
pub type DrawInvoker = std::sync::Arc<dyn Fn(&mut dyn FnMut()) + Send + Sync>;
