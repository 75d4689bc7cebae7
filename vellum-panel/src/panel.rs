//! The per-document renderer facade.

use crate::backend::{GraphicsBackend, RecordingCanvas, Surface};
use crate::popups::{AnnotationPopup, build_popups, to_canvas_rect};
use crate::request::PointerState;
use kurbo::{Affine, Point, Shape};
use rustc_hash::FxHashMap;
use std::sync::{Arc, Mutex};
use vellum_interpret::color::AlphaColor;
use vellum_interpret::interpret::{RenderParams, page_transform, render_page};
use vellum_interpret::resources::PageCaches;
use vellum_interpret::{CancelToken, Canvas, FillRule, Paint};
use vellum_syntax::Document;
use vellum_syntax::annot::Annotation;
use vellum_syntax::object::ObjRef;
use vellum_syntax::page::Page;

/// Display properties of one page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageInfo {
    /// The page label, empty when the document has none.
    pub label: String,
    /// The displayed width at scale one (rotation applied).
    pub width: f32,
    /// The displayed height at scale one (rotation applied).
    pub height: f32,
    /// The page rotation in degrees.
    pub rotation: i32,
}

/// How an annotation appears, derived from the pointer state.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Appearance {
    Normal,
    Rollover,
    Down,
}

impl Appearance {
    fn from_pointer(state: PointerState) -> Self {
        match state {
            PointerState::Pressed => Self::Down,
            PointerState::Hovered => Self::Rollover,
            PointerState::Idle => Self::Normal,
        }
    }
}

/// Produces per-page artifacts for the display panel: recorded pictures,
/// thumbnails, annotation overlays, popup threads and hit tests.
///
/// Page numbers are 1-based throughout; out-of-range numbers yield `None`
/// or empty collections.
pub struct PanelRenderer<B: GraphicsBackend> {
    doc: Arc<Document>,
    backend: Arc<B>,
    caches: Mutex<FxHashMap<u32, Arc<PageCaches>>>,
}

impl<B: GraphicsBackend> PanelRenderer<B> {
    /// Create a renderer for a document.
    pub fn new(doc: Arc<Document>, backend: Arc<B>) -> Self {
        Self {
            doc,
            backend,
            caches: Mutex::new(FxHashMap::default()),
        }
    }

    /// The document being rendered.
    pub fn document(&self) -> &Arc<Document> {
        &self.doc
    }

    /// The number of pages.
    pub fn page_count(&self) -> usize {
        self.doc.pages().len()
    }

    fn page(&self, number: usize) -> Option<&Page> {
        self.doc.page(number)
    }

    fn page_caches(&self, number: u32) -> Arc<PageCaches> {
        let mut caches = self.caches.lock().unwrap_or_else(|e| e.into_inner());

        caches
            .entry(number)
            .or_insert_with(|| Arc::new(PageCaches::default()))
            .clone()
    }

    /// The display properties of a page.
    pub fn page_info(&self, number: usize) -> Option<PageInfo> {
        let page = self.page(number)?;
        let (width, height) = page.display_size();

        Some(PageInfo {
            label: page.label().to_string(),
            width,
            height,
            rotation: page.rotation(),
        })
    }

    /// Record the page into a picture at the given scale.
    ///
    /// The picture is clipped to the crop box and uses canvas coordinates
    /// (origin top-left, y down). Returns `None` on cancellation or when
    /// the page doesn't exist; rendering problems inside the page degrade
    /// instead of failing.
    pub fn get_picture(
        &self,
        number: usize,
        scale: f32,
        cancel: &CancelToken,
    ) -> Option<B::Picture> {
        let page = self.page(number)?;
        let caches = self.page_caches(page.number());

        let (_, (width, height)) = page_transform(page, scale);
        let mut recorder = self.backend.begin_recording(width, height);

        // The page itself is opaque white; whatever the content paints
        // goes on top.
        recorder.fill_path(
            &kurbo::Rect::new(0.0, 0.0, width, height).to_path(0.1),
            FillRule::NonZero,
            &Paint {
                color: AlphaColor::WHITE,
            },
        );

        let params = RenderParams {
            scale,
            preview: false,
        };

        let completed = render_page(&self.doc, page, &mut recorder, &caches, &params, cancel);

        if !completed {
            return None;
        }

        Some(recorder.finish())
    }

    /// Record the annotation overlay of a page: hover-rectangle marks for
    /// every root annotation, with the active one emphasized per the
    /// pointer state.
    pub fn get_annotation_picture(
        &self,
        number: usize,
        scale: f32,
        active: Option<ObjRef>,
        pointer_state: PointerState,
        cancel: &CancelToken,
    ) -> Option<B::Picture> {
        let page = self.page(number)?;
        let (transform, (width, height)) = page_transform(page, scale);

        let annotations = page.annotations(&self.doc);

        let mut recorder = self.backend.begin_recording(width, height);

        for annot in annotations.iter().filter(|a| a.is_root()) {
            if cancel.is_cancelled() {
                return None;
            }

            if annot.is_hidden() {
                continue;
            }

            let appearance = if active.is_some() && annot.id == active {
                Appearance::from_pointer(pointer_state)
            } else {
                Appearance::Normal
            };

            let alpha = match appearance {
                Appearance::Normal => 0.25,
                Appearance::Rollover => 0.4,
                Appearance::Down => 0.55,
            };

            let [r, g, b] = annot.color.unwrap_or([1.0, 0.85, 0.2]);
            let rect = to_canvas_rect(transform, annot.hover_rect());

            recorder.fill_path(&rect.to_path(0.1), FillRule::NonZero, &Paint {
                color: AlphaColor::new([r, g, b, alpha]),
            });
        }

        Some(recorder.finish())
    }

    /// Rasterize a thumbnail: the page scaled to fit inside
    /// `max_size x max_size`, drawn into the provided surface and
    /// snapshotted.
    pub fn get_thumbnail(
        &self,
        number: usize,
        max_size: f32,
        surface: &mut B::Surface,
    ) -> Option<B::Image> {
        let page = self.page(number)?;
        let (width, height) = page.display_size();

        if width <= 0.0 || height <= 0.0 || max_size <= 0.0 {
            return None;
        }

        let scale = max_size / width.max(height);

        // Thumbnails are placeholders; a cancelled thumbnail would just
        // get re-requested, so the pass runs without a token.
        let picture = self.get_picture(number, scale, &CancelToken::new())?;

        surface.clear(AlphaColor::TRANSPARENT);
        surface.draw_picture(&picture, Affine::IDENTITY);

        Some(surface.snapshot())
    }

    /// Build the popup threads of a page. The same input yields the same
    /// structure every time.
    pub fn create_annotation_popups(&self, number: usize) -> Vec<AnnotationPopup> {
        let Some(page) = self.page(number) else {
            return vec![];
        };

        let (transform, _) = page_transform(page, 1.0);

        build_popups(&self.doc, page, transform)
    }

    /// Hit-test the root annotations of a page at a canvas point (scale
    /// one). Annotations that display a bubble win over those that
    /// don't.
    pub fn get_active_annotation(&self, number: usize, point: Point) -> Option<Annotation> {
        let page = self.page(number)?;
        let (transform, _) = page_transform(page, 1.0);

        let annotations = page.annotations(&self.doc);

        let mut roots: Vec<&Annotation> = annotations
            .iter()
            .filter(|a| a.is_root() && !a.is_hidden())
            .collect();

        // Stable: bubbles first, document order within each group.
        roots.sort_by_key(|a| !a.should_display_bubble());

        roots
            .into_iter()
            .find(|a| to_canvas_rect(transform, a.hover_rect()).contains(point))
            .cloned()
    }

    /// Map a page-space rectangle to canvas coordinates at the given
    /// scale.
    pub fn to_canvas_rect(
        &self,
        number: usize,
        rect: vellum_syntax::object::Rect,
        scale: f32,
    ) -> Option<kurbo::Rect> {
        let page = self.page(number)?;
        let (transform, _) = page_transform(page, scale);

        Some(to_canvas_rect(transform, rect))
    }

    /// Forget the caches of pages that are no longer of interest.
    pub fn trim_page_caches(&self, keep: impl Fn(u32) -> bool) {
        let mut caches = self.caches.lock().unwrap_or_else(|e| e.into_inner());

        caches.retain(|page, _| keep(*page));
    }
}
