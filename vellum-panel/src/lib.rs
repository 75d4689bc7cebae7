/*!
The display panel.

This crate keeps a viewport responsive while pages render in the
background:

- [`PanelRenderer`] produces per-page artifacts: recorded pictures at a
  scale, pre-rasterized thumbnails, annotation overlays and popups.
- [`PageCollection`] caches those artifacts per visible page and disposes
  them when the viewport moves on.
- [`RenderingQueue`] serializes all drawing onto one worker task with
  request coalescing, cooperative cancellation and incremental presents.

The concrete 2D backend is abstracted behind [`backend::GraphicsBackend`];
the panel never touches pixel memory.
*/

#![forbid(unsafe_code)]

pub mod backend;
pub mod cache;
pub mod error;
pub mod panel;
pub mod popups;
pub mod queue;
pub mod request;

pub use cache::{CachedPagePicture, PageCollection};
pub use error::PanelError;
pub use panel::{PageInfo, PanelRenderer};
pub use popups::{AnnotationPopup, PopupMessage};
pub use queue::{QueueInvokers, RenderingQueue};
pub use request::{DrawingRequest, PagesDrawingRequest, PointerState, VisiblePage};

pub use vellum_interpret::{self, CancelToken};
pub use vellum_syntax;
