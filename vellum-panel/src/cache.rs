//! The per-page picture cache.

use crate::backend::GraphicsBackend;
use crate::error::PanelError;
use crate::panel::PanelRenderer;
use crate::popups::AnnotationPopup;
use crate::request::VisiblePage;
use kurbo::Point;
use log::warn;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use vellum_interpret::CancelToken;

struct Slot<B: GraphicsBackend> {
    thumbnail: Option<B::Image>,
    picture: Option<B::Picture>,
    annotation_picture: Option<B::Picture>,
    /// The scale the picture is (or will be) recorded at.
    target_scale: f32,
    popups: Arc<Vec<AnnotationPopup>>,
    user_rotation: i32,
    disposed: bool,
}

/// The cached artifacts of one page.
///
/// All access goes through one gate: updates and disposal are mutually
/// exclusive, disposal releases the artifacts at most once, and any
/// update after disposal is a no-op.
pub struct CachedPagePicture<B: GraphicsBackend> {
    page_number: u32,
    gate: Mutex<Slot<B>>,
}

impl<B: GraphicsBackend> CachedPagePicture<B> {
    fn new(
        page_number: u32,
        thumbnail: Option<B::Image>,
        popups: Arc<Vec<AnnotationPopup>>,
        target_scale: f32,
        user_rotation: i32,
    ) -> Self {
        Self {
            page_number,
            gate: Mutex::new(Slot {
                thumbnail,
                picture: None,
                annotation_picture: None,
                target_scale,
                popups,
                user_rotation,
                disposed: false,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot<B>> {
        self.gate.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// The 1-based page number.
    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    /// The thumbnail, if the entry still owns one.
    pub fn thumbnail(&self) -> Option<B::Image> {
        self.lock().thumbnail.clone()
    }

    /// The recorded picture and its scale, when one is present.
    pub fn picture(&self) -> Option<(B::Picture, f32)> {
        let slot = self.lock();

        slot.picture.clone().map(|p| (p, slot.target_scale))
    }

    /// The annotation overlay, when one is present.
    pub fn annotation_picture(&self) -> Option<B::Picture> {
        self.lock().annotation_picture.clone()
    }

    /// The popup threads of the page.
    pub fn popups(&self) -> Arc<Vec<AnnotationPopup>> {
        self.lock().popups.clone()
    }

    /// The scale the next picture should be recorded at.
    pub fn target_scale(&self) -> f32 {
        self.lock().target_scale
    }

    /// Whether the entry has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }

    /// Whether the entry still needs a picture.
    pub fn needs_picture(&self) -> bool {
        let slot = self.lock();

        !slot.disposed && slot.picture.is_none()
    }

    /// Store a freshly recorded picture.
    ///
    /// A disposed entry refuses the update: that is a lifecycle bug in
    /// debug builds and a no-op in release.
    pub fn set_picture(&self, picture: B::Picture, scale: f32) -> Result<(), PanelError> {
        let mut slot = self.lock();

        if slot.disposed {
            debug_assert!(false, "picture stored into a disposed cache entry");

            return Err(PanelError::Disposed(self.page_number));
        }

        slot.picture = Some(picture);
        slot.target_scale = scale;

        Ok(())
    }

    /// Store an annotation overlay, unless the entry was disposed.
    pub fn set_annotation_picture(&self, picture: B::Picture) -> Result<(), PanelError> {
        let mut slot = self.lock();

        if slot.disposed {
            return Err(PanelError::Disposed(self.page_number));
        }

        slot.annotation_picture = Some(picture);

        Ok(())
    }

    /// Drop the picture (the thumbnail survives) and retarget the entry
    /// to a new scale.
    fn invalidate_picture(&self, new_scale: f32) {
        let mut slot = self.lock();

        if slot.disposed {
            return;
        }

        slot.picture = None;
        slot.annotation_picture = None;
        slot.target_scale = new_scale;
    }

    /// Drop everything after a page-level change (user rotation).
    fn invalidate_all(&self, user_rotation: i32) {
        let mut slot = self.lock();

        if slot.disposed {
            return;
        }

        slot.picture = None;
        slot.annotation_picture = None;
        slot.thumbnail = None;
        slot.user_rotation = user_rotation;
    }

    /// Release the owned artifacts. Runs at most once; later calls and
    /// later updates are no-ops.
    pub fn dispose(&self) {
        let mut slot = self.lock();

        if slot.disposed {
            return;
        }

        slot.disposed = true;
        slot.picture = None;
        slot.annotation_picture = None;
        slot.thumbnail = None;
        slot.popups = Arc::new(vec![]);
    }
}

/// The set of cached pages currently of interest, keyed by page number.
pub struct PageCollection<B: GraphicsBackend> {
    renderer: Arc<PanelRenderer<B>>,
    entries: BTreeMap<u32, Arc<CachedPagePicture<B>>>,
}

impl<B: GraphicsBackend> PageCollection<B> {
    /// Create an empty collection backed by the renderer.
    pub fn new(renderer: Arc<PanelRenderer<B>>) -> Self {
        Self {
            renderer,
            entries: BTreeMap::new(),
        }
    }

    /// The number of cached entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the collection is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry for a page, when one is cached.
    pub fn try_get(&self, page_number: u32) -> Option<Arc<CachedPagePicture<B>>> {
        self.entries.get(&page_number).cloned()
    }

    /// The popup under a canvas point (scale one) on a cached page.
    pub fn try_get_popup(&self, page_number: u32, point: Point) -> Option<AnnotationPopup> {
        let entry = self.try_get(page_number)?;

        entry
            .popups()
            .iter()
            .find(|p| p.hover_rect.contains(point))
            .cloned()
    }

    /// Align the cache with the visible set: evict-and-dispose pages that
    /// scrolled away, invalidate entries whose scale changed (their
    /// thumbnails survive), and create entries (with popups and a
    /// freshly rasterized thumbnail) for new pages.
    ///
    /// The returned sequence is lazy: each changed or created entry is
    /// yielded as it is processed, so the caller can present between
    /// items.
    pub fn update_cache_with_thumbnails<'a>(
        &'a mut self,
        visible: &'a [VisiblePage],
        scale: f32,
        thumb_surface: &'a mut <B as GraphicsBackend>::Surface,
        max_thumbnail_size: f32,
    ) -> impl Iterator<Item = Arc<CachedPagePicture<B>>> + 'a {
        // 1. Out-of-view entries are disposed before anything new is
        // created.
        let keep: Vec<u32> = visible.iter().map(|v| v.page_number).collect();

        let evicted: Vec<u32> = self
            .entries
            .keys()
            .copied()
            .filter(|n| !keep.contains(n))
            .collect();

        for number in evicted {
            if let Some(entry) = self.entries.remove(&number) {
                entry.dispose();
            }
        }

        self.renderer.trim_page_caches(|n| keep.contains(&n));

        // 2 + 3. Walk the visible pages lazily.
        let mut index = 0;

        std::iter::from_fn(move || {
            loop {
                let vp = visible.get(index)?;
                index += 1;

                if let Some(existing) = self.entries.get(&vp.page_number) {
                    if (existing.target_scale() - scale).abs() > f32::EPSILON {
                        existing.invalidate_picture(scale);

                        return Some(existing.clone());
                    }

                    // Present at the right scale already; nothing to
                    // yield.
                    continue;
                }

                let popups = Arc::new(
                    self.renderer
                        .create_annotation_popups(vp.page_number as usize),
                );

                let thumbnail = self.renderer.get_thumbnail(
                    vp.page_number as usize,
                    max_thumbnail_size,
                    thumb_surface,
                );

                if thumbnail.is_none() {
                    warn!("thumbnail for page {} failed to build", vp.page_number);
                }

                let entry = Arc::new(CachedPagePicture::new(
                    vp.page_number,
                    thumbnail,
                    popups,
                    scale,
                    vp.user_rotation,
                ));

                self.entries.insert(vp.page_number, entry.clone());

                return Some(entry);
            }
        })
    }

    /// Produce pictures for every cached entry that lacks one, lazily.
    /// The sequence ends early when the token fires.
    pub fn generate_pictures_for_cached_pages<'a>(
        &'a self,
        cancel: &'a CancelToken,
    ) -> impl Iterator<Item = Arc<CachedPagePicture<B>>> + 'a {
        let pending: Vec<Arc<CachedPagePicture<B>>> = self
            .entries
            .values()
            .filter(|e| e.needs_picture())
            .cloned()
            .collect();

        let renderer = self.renderer.clone();
        let mut queue = pending.into_iter();

        std::iter::from_fn(move || {
            loop {
                if cancel.is_cancelled() {
                    return None;
                }

                let entry = queue.next()?;

                let Some(picture) = renderer.get_picture(
                    entry.page_number() as usize,
                    entry.target_scale(),
                    cancel,
                ) else {
                    // Either cancelled or the page is unrenderable; in
                    // both cases move on.
                    if cancel.is_cancelled() {
                        return None;
                    }

                    continue;
                };

                let scale = entry.target_scale();

                if entry.set_picture(picture, scale).is_ok() {
                    return Some(entry);
                }
            }
        })
    }

    /// Invalidate entries whose page changed under the cache (a user
    /// rotation applied by the viewer).
    pub fn check_document_updates(&mut self) {
        let doc = self.renderer.document().clone();

        for (number, entry) in &self.entries {
            if let Some(page) = doc.page(*number as usize) {
                let rotation = page.user_rotation();

                if rotation != entry.lock().user_rotation {
                    entry.invalidate_all(rotation);
                }
            }
        }
    }

    /// Dispose every entry and empty the collection.
    pub fn drain(&mut self) {
        for entry in self.entries.values() {
            entry.dispose();
        }

        self.entries.clear();
    }
}

impl<B: GraphicsBackend> Drop for PageCollection<B> {
    fn drop(&mut self) {
        self.drain();
    }
}
