//! The rendering queue.
//!
//! One worker task owns the drawing surface and serializes every pass.
//! Producers enqueue requests from any thread; enqueuing cancels the
//! active pass, and at every suspension point the worker checks whether a
//! newer request arrived and short-circuits if so. Between cancellations
//! the presented surface only ever improves: the first frame of a pass
//! already carries backgrounds, cached thumbnails and remapped content
//! from the previous pass.

use crate::backend::{
    DrawInvoker, FrameKind, GraphicsBackend, PresentInfo, RenderTarget, Surface, SurfaceProvider,
};
use crate::cache::PageCollection;
use crate::error::PanelError;
use crate::panel::PanelRenderer;
use crate::request::{DrawingRequest, PagesDrawingRequest, VisiblePage};
use kurbo::{Affine, Point, Rect};
use log::warn;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use vellum_interpret::CancelToken;
use vellum_interpret::color::AlphaColor;

// The gap between page backgrounds and their drop shadows, in canvas
// pixels.
const SHADOW_OFFSET: f64 = 4.0;
const SNAPSHOT_CORNER_RADIUS: f64 = 4.0;

struct QueueState {
    pending: VecDeque<DrawingRequest>,
    last_enqueued: Option<DrawingRequest>,
    active_cancel: Option<CancelToken>,
    in_flight: bool,
    shutdown: bool,
}

struct Shared {
    state: Mutex<QueueState>,
    wake: Notify,
    idle: Notify,
}

impl Shared {
    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// The serialized drawing orchestrator.
///
/// Spawning requires a running tokio runtime; the worker lives on one
/// task until [`shutdown`](Self::shutdown).
pub struct RenderingQueue<B: GraphicsBackend> {
    shared: Arc<Shared>,
    _marker: std::marker::PhantomData<fn() -> B>,
}

/// Optional dispatcher hooks: when set, the worker funnels its drawing
/// through them (backends that require a UI thread install marshalling
/// callbacks here; without them, drawing happens inline on the worker).
#[derive(Clone, Default)]
pub struct QueueInvokers {
    /// Wraps surface drawing.
    pub canvas_draw: Option<DrawInvoker>,
    /// Wraps thumbnail rasterization.
    pub thumbnail_draw: Option<DrawInvoker>,
}

/// Run a draw section, through the invoker when one is installed.
fn invoked(invoker: &Option<DrawInvoker>, f: impl FnOnce()) {
    match invoker {
        Some(invoker) => {
            let mut f = Some(f);

            invoker(&mut move || {
                if let Some(f) = f.take() {
                    f();
                }
            });
        }
        None => f(),
    }
}

impl<B: GraphicsBackend> RenderingQueue<B> {
    /// Spawn the worker task with inline drawing.
    pub fn spawn(
        renderer: Arc<PanelRenderer<B>>,
        provider: Arc<dyn SurfaceProvider<B>>,
        target: Arc<dyn RenderTarget<B>>,
    ) -> Arc<Self> {
        Self::spawn_with_invokers(renderer, provider, target, QueueInvokers::default())
    }

    /// Spawn the worker task with dispatcher hooks.
    pub fn spawn_with_invokers(
        renderer: Arc<PanelRenderer<B>>,
        provider: Arc<dyn SurfaceProvider<B>>,
        target: Arc<dyn RenderTarget<B>>,
        invokers: QueueInvokers,
    ) -> Arc<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                last_enqueued: None,
                active_cancel: None,
                in_flight: false,
                shutdown: false,
            }),
            wake: Notify::new(),
            idle: Notify::new(),
        });

        let worker_shared = shared.clone();

        tokio::spawn(async move {
            worker_loop(worker_shared, renderer, provider, target, invokers).await;
        });

        Arc::new(Self {
            shared,
            _marker: std::marker::PhantomData,
        })
    }

    /// Enqueue a request.
    ///
    /// A request equal to the last enqueued one is dropped. Enqueuing
    /// cancels the pass in flight so the worker can move on promptly.
    pub fn enqueue(&self, request: DrawingRequest) -> Result<(), PanelError> {
        let mut state = self.shared.lock();

        if state.shutdown {
            warn!("request enqueued after shutdown");

            return Err(PanelError::QueueShutDown);
        }

        if state.last_enqueued.as_ref() == Some(&request) {
            return Ok(());
        }

        state.last_enqueued = Some(request.clone());
        state.pending.push_back(request);

        if let Some(cancel) = &state.active_cancel {
            cancel.cancel();
        }

        drop(state);
        self.shared.wake.notify_one();

        Ok(())
    }

    /// Stop the worker. The pass in flight is cancelled; queued requests
    /// are dropped.
    pub fn shutdown(&self) {
        let mut state = self.shared.lock();
        state.shutdown = true;
        state.pending.clear();

        if let Some(cancel) = &state.active_cancel {
            cancel.cancel();
        }

        drop(state);
        self.shared.wake.notify_one();
        self.shared.idle.notify_waiters();
    }

    /// Wait until the queue is empty and no pass is in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();

            {
                let state = self.shared.lock();

                if state.shutdown || (state.pending.is_empty() && !state.in_flight) {
                    return;
                }
            }

            notified.await;
        }
    }
}

impl<B: GraphicsBackend> Drop for RenderingQueue<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Pull the next request, collapsing stale pages requests: when several
/// are queued, only the newest one runs.
fn dequeue(state: &mut QueueState) -> Option<DrawingRequest> {
    let front = state.pending.pop_front()?;

    if !matches!(front, DrawingRequest::Pages(_)) {
        return Some(front);
    }

    let mut newest = front;
    let mut i = 0;

    while i < state.pending.len() {
        if matches!(state.pending[i], DrawingRequest::Pages(_)) {
            // Remove is fine here; the queue is tiny.
            newest = state.pending.remove(i).expect("index checked");
        } else {
            i += 1;
        }
    }

    Some(newest)
}

struct PassState<B: GraphicsBackend> {
    surface: Option<B::Surface>,
    thumb_surface: Option<B::Surface>,
    last_pages: Option<PagesDrawingRequest>,
    collection: PageCollection<B>,
}

async fn worker_loop<B: GraphicsBackend>(
    shared: Arc<Shared>,
    renderer: Arc<PanelRenderer<B>>,
    provider: Arc<dyn SurfaceProvider<B>>,
    target: Arc<dyn RenderTarget<B>>,
    invokers: QueueInvokers,
) {
    let mut pass = PassState::<B> {
        surface: None,
        thumb_surface: None,
        last_pages: None,
        collection: PageCollection::new(renderer.clone()),
    };

    loop {
        // Wait for the next request.
        let (request, cancel) = loop {
            let wake = shared.wake.notified();

            {
                let mut state = shared.lock();

                if state.shutdown {
                    state.in_flight = false;
                    drop(state);
                    shared.idle.notify_waiters();

                    return;
                }

                if let Some(request) = dequeue(&mut state) {
                    let cancel = CancelToken::new();
                    state.active_cancel = Some(cancel.clone());
                    state.in_flight = true;

                    break (request, cancel);
                }

                state.in_flight = false;
            }

            shared.idle.notify_waiters();
            wake.await;
        };

        match request {
            DrawingRequest::Reset { canvas_size } => {
                let surface = provider
                    .get_drawing_surface(canvas_size.0, canvas_size.1)
                    .await;

                pass.surface = Some(surface);
                pass.last_pages = None;
                pass.collection.drain();

                if let Some(surface) = &mut pass.surface {
                    invoked(&invokers.canvas_draw, || surface.clear(AlphaColor::WHITE));
                    target
                        .present(surface, PresentInfo {
                            kind: FrameKind::Reset,
                            request: None,
                        })
                        .await;
                }
            }
            DrawingRequest::RefreshGraphics => {
                if let Some(surface) = &pass.surface {
                    target
                        .present(surface, PresentInfo {
                            kind: FrameKind::Refresh,
                            request: None,
                        })
                        .await;
                }
            }
            DrawingRequest::Pages(request) => {
                // Cancellation is a normal exit: the worker loops back
                // and picks up the newer request.
                let _all_drawn = pages_pass(
                    &shared, &mut pass, &renderer, &provider, &target, &invokers, request, &cancel,
                )
                .await;
            }
        }

        shared.lock().active_cancel = None;
    }
}

fn should_abort(shared: &Shared, cancel: &CancelToken) -> bool {
    cancel.is_cancelled() || !shared.lock().pending.is_empty()
}

fn page_rect(vp: &VisiblePage, scale: f32) -> Rect {
    Rect::new(
        vp.offset.x,
        vp.offset.y,
        vp.offset.x + f64::from(vp.info.width * scale),
        vp.offset.y + f64::from(vp.info.height * scale),
    )
}

/// One full drawing pass for a pages request. Returns whether everything
/// was drawn; `false` means the pass gave way to a newer request.
async fn pages_pass<B: GraphicsBackend>(
    shared: &Shared,
    pass: &mut PassState<B>,
    renderer: &Arc<PanelRenderer<B>>,
    provider: &Arc<dyn SurfaceProvider<B>>,
    target: &Arc<dyn RenderTarget<B>>,
    invokers: &QueueInvokers,
    request: PagesDrawingRequest,
    cancel: &CancelToken,
) -> bool {
    let (width, height) = request.canvas_size;

    // 1. Acquire or reuse the drawing surface.
    let needs_surface = match &pass.surface {
        Some(s) => s.width() != width || s.height() != height,
        None => true,
    };

    if needs_surface {
        pass.surface = Some(provider.get_drawing_surface(width, height).await);
        // A new surface has no usable previous contents.
        pass.last_pages = None;

        if should_abort(shared, cancel) {
            return false;
        }
    }

    // 2. Snapshot the previous contents while they are still around.
    let previous = pass.last_pages.take();
    let snapshot = match (&pass.surface, &previous) {
        (Some(surface), Some(_)) => Some(surface.snapshot()),
        _ => None,
    };

    let Some(surface) = pass.surface.as_mut() else {
        return false;
    };

    let collection = &pass.collection;

    invoked(&invokers.canvas_draw, || {
        // 3. Background, page backgrounds and shadows.
        surface.clear(request.background_color);

        for vp in &request.visible_pages {
            let rect = page_rect(vp, request.scale);

            surface.fill_rect(
                rect + kurbo::Vec2::new(SHADOW_OFFSET, SHADOW_OFFSET),
                AlphaColor::new([0.0, 0.0, 0.0, 0.25]),
            );
            surface.fill_rect(rect, AlphaColor::WHITE);
        }

        // 4. Whatever thumbnails the cache already has.
        for vp in &request.visible_pages {
            if let Some(entry) = collection.try_get(vp.page_number)
                && let Some(thumbnail) = entry.thumbnail()
            {
                surface.draw_image(&thumbnail, page_rect(vp, request.scale));
            }
        }

        // 5. Remap the previous frame's pages that are still visible.
        if let (Some(snapshot), Some(previous)) = (&snapshot, &previous) {
            for vp in &request.visible_pages {
                if let Some(old) = previous
                    .visible_pages
                    .iter()
                    .find(|old| old.page_number == vp.page_number)
                {
                    surface.draw_image_from(
                        snapshot,
                        page_rect(old, previous.scale),
                        page_rect(vp, request.scale),
                        SNAPSHOT_CORNER_RADIUS,
                    );
                }
            }
        }

        // Pictures the cache already holds at this scale replay crisply
        // on top of the blit.
        for vp in &request.visible_pages {
            if let Some(entry) = collection.try_get(vp.page_number)
                && let Some((picture, scale)) = entry.picture()
                && scale == request.scale
            {
                let rect = page_rect(vp, request.scale);
                let placement = Affine::translate((rect.x0, rect.y0));

                surface.draw_picture(&picture, placement);

                if let Some(overlay) = entry.annotation_picture() {
                    surface.draw_picture(&overlay, placement);
                }
            }
        }
    });

    // From here on the surface reflects the new request's layout.
    pass.last_pages = Some(request.clone());

    // 6. The coarse first frame.
    target
        .present(surface, PresentInfo {
            kind: FrameKind::First,
            request: Some(&request),
        })
        .await;

    if should_abort(shared, cancel) {
        return false;
    }

    // 7. Thumbnails for the extended visible set, presenting after each
    // page.
    let thumb_size = request.max_thumbnail_size.max(1.0).ceil() as u32;

    let needs_thumb_surface = match &pass.thumb_surface {
        Some(s) => s.width() < thumb_size || s.height() < thumb_size,
        None => true,
    };

    if needs_thumb_surface {
        pass.thumb_surface = Some(
            provider
                .create_thumbnail_surface(thumb_size, thumb_size)
                .await,
        );

        if should_abort(shared, cancel) {
            return false;
        }
    }

    let extended = extended_visible_set(renderer, &request, previous.as_ref());

    {
        let PassState {
            collection,
            thumb_surface,
            surface,
            ..
        } = pass;

        let Some(surface) = surface.as_mut() else {
            return false;
        };

        let Some(thumb_surface) = thumb_surface.as_mut() else {
            return false;
        };

        let mut updates = collection.update_cache_with_thumbnails(
            &extended,
            request.scale,
            thumb_surface,
            request.max_thumbnail_size,
        );

        loop {
            if should_abort(shared, cancel) {
                return false;
            }

            // Thumbnail rasterization happens inside the iterator.
            let mut next = None;
            invoked(&invokers.thumbnail_draw, || next = updates.next());

            let Some(entry) = next else {
                break;
            };

            let in_view = request
                .visible_pages
                .iter()
                .find(|vp| vp.page_number == entry.page_number());

            if let Some(vp) = in_view
                && let Some(thumbnail) = entry.thumbnail()
            {
                invoked(&invokers.canvas_draw, || {
                    surface.draw_image(&thumbnail, page_rect(vp, request.scale));
                });

                target
                    .present(surface, PresentInfo {
                        kind: FrameKind::Thumbnail,
                        request: Some(&request),
                    })
                    .await;
            }
        }
    }

    // 8. Full pictures, presenting after each page.
    {
        let PassState {
            collection,
            surface,
            ..
        } = pass;

        let Some(surface) = surface.as_mut() else {
            return false;
        };

        let mut pictures = collection.generate_pictures_for_cached_pages(cancel);

        loop {
            if should_abort(shared, cancel) {
                return false;
            }

            let Some(entry) = pictures.next() else {
                break;
            };

            let Some(vp) = request
                .visible_pages
                .iter()
                .find(|vp| vp.page_number == entry.page_number())
            else {
                continue;
            };

            let rect = page_rect(vp, request.scale);
            let placement = Affine::translate((rect.x0, rect.y0));

            // The annotation overlay depends on the request's pointer
            // state, so it is produced per pass.
            let overlay = renderer
                .get_annotation_picture(
                    entry.page_number() as usize,
                    request.scale,
                    request.active_annotation,
                    request.pointer_state,
                    cancel,
                )
                .filter(|overlay| entry.set_annotation_picture(overlay.clone()).is_ok());

            invoked(&invokers.canvas_draw, || {
                if let Some((picture, _)) = entry.picture() {
                    surface.draw_picture(&picture, placement);
                }

                if let Some(overlay) = &overlay {
                    surface.draw_picture(overlay, placement);
                }
            });

            target
                .present(surface, PresentInfo {
                    kind: FrameKind::Picture,
                    request: Some(&request),
                })
                .await;
        }
    }

    true
}

/// The visible set plus one page beyond the edge in the scroll
/// direction, when the scale is unchanged.
fn extended_visible_set<B: GraphicsBackend>(
    renderer: &PanelRenderer<B>,
    request: &PagesDrawingRequest,
    previous: Option<&PagesDrawingRequest>,
) -> Vec<VisiblePage> {
    let mut extended = request.visible_pages.clone();

    let Some(previous) = previous else {
        return extended;
    };

    if extended.is_empty() || previous.scale != request.scale {
        return extended;
    }

    let scrolling_down = request.offset.y >= previous.offset.y;

    let candidate = if scrolling_down {
        let last = extended
            .iter()
            .max_by_key(|vp| vp.page_number)
            .expect("non-empty")
            .clone();

        (last.page_number + 1, {
            let below = last.offset.y
                + f64::from(last.info.height * request.scale)
                + 2.0 * SHADOW_OFFSET;

            Point::new(last.offset.x, below)
        })
    } else {
        let first = extended
            .iter()
            .min_by_key(|vp| vp.page_number)
            .expect("non-empty")
            .clone();

        if first.page_number <= 1 {
            return extended;
        }

        (first.page_number - 1, Point::new(first.offset.x, f64::NAN))
    };

    let (page_number, mut offset) = candidate;

    let Some(info) = renderer.page_info(page_number as usize) else {
        return extended;
    };

    if offset.y.is_nan() {
        // Above the first page: position it by its own height.
        let first_y = extended
            .iter()
            .min_by_key(|vp| vp.page_number)
            .expect("non-empty")
            .offset
            .y;

        offset.y = first_y - f64::from(info.height * request.scale) - 2.0 * SHADOW_OFFSET;
    }

    let user_rotation = renderer
        .document()
        .page(page_number as usize)
        .map(|p| p.user_rotation())
        .unwrap_or(0);

    extended.push(VisiblePage {
        page_number,
        offset,
        info,
        user_rotation,
    });

    extended
}
