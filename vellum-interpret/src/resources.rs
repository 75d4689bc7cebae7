//! Resource lookup with per-page caches.

use crate::canvas::{LineCap, LineJoin};
use crate::color::{ColorSpace, IccProfile};
use log::warn;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::sync::{Arc, Mutex};
use vellum_syntax::Document;
use vellum_syntax::object::dict::keys::{
    COLOR_SPACE, EXT_G_STATE, FONT, PATTERN, SHADING, X_OBJECT,
};
use vellum_syntax::object::{Array, ByteString, Dict, ObjRef, Stream, Value};

/// A cache of parsed ICC profiles, keyed by the profile stream's object.
#[derive(Debug, Default)]
pub struct IccStreamCache(Mutex<FxHashMap<ObjRef, Option<Arc<IccProfile>>>>);

impl IccStreamCache {
    pub(crate) fn get_or_build(
        &self,
        doc: &Document,
        stream: &Stream,
        components: usize,
    ) -> Option<Arc<IccProfile>> {
        let key = stream.locator.owner;

        if key.is_valid()
            && let Ok(cache) = self.0.lock()
            && let Some(hit) = cache.get(&key)
        {
            return hit.clone();
        }

        let data = doc.decoded_stream(stream);
        let built = IccProfile::new(&data, components);

        if key.is_valid()
            && let Ok(mut cache) = self.0.lock()
        {
            cache.entry(key).or_insert_with(|| built.clone());
        }

        built
    }
}

/// The graphics-state parameters read from an `/ExtGState` dictionary.
/// Only the subset the interpreter consumes is represented.
#[derive(Debug, Clone, Default)]
pub struct ExtGState {
    /// `/LW`.
    pub line_width: Option<f32>,
    /// `/LC`.
    pub line_cap: Option<LineCap>,
    /// `/LJ`.
    pub line_join: Option<LineJoin>,
    /// `/ML`.
    pub miter_limit: Option<f32>,
    /// `/D`, as (dash array, phase).
    pub dash: Option<(SmallVec<[f32; 4]>, f32)>,
    /// `/CA` (stroking alpha).
    pub stroke_alpha: Option<f32>,
    /// `/ca` (non-stroking alpha).
    pub fill_alpha: Option<f32>,
}

impl ExtGState {
    fn from_dict(doc: &Document, dict: &Dict) -> Self {
        let dash = dict.get::<Array>(doc, b"D").and_then(|d| {
            let array: SmallVec<[f32; 4]> = d
                .get::<Array>(doc, 0)?
                .iter_resolved::<f32>(doc)
                .collect();
            let phase = d.get::<f32>(doc, 1).unwrap_or(0.0);

            Some((array, phase))
        });

        Self {
            line_width: dict.get::<f32>(doc, b"LW"),
            line_cap: dict.get::<u8>(doc, b"LC").map(line_cap_from_number),
            line_join: dict.get::<u8>(doc, b"LJ").map(line_join_from_number),
            miter_limit: dict.get::<f32>(doc, b"ML"),
            dash,
            stroke_alpha: dict.get::<f32>(doc, b"CA"),
            fill_alpha: dict.get::<f32>(doc, b"ca"),
        }
    }
}

pub(crate) fn line_cap_from_number(n: u8) -> LineCap {
    match n {
        1 => LineCap::Round,
        2 => LineCap::Square,
        _ => LineCap::Butt,
    }
}

pub(crate) fn line_join_from_number(n: u8) -> LineJoin {
    match n {
        1 => LineJoin::Round,
        2 => LineJoin::Bevel,
        _ => LineJoin::Miter,
    }
}

/// The name-keyed caches of one page. These outlive a single render pass
/// so repeated renders of a page don't rebuild converters.
#[derive(Debug, Default)]
pub struct PageCaches {
    color_spaces: Mutex<FxHashMap<ByteString, Option<ColorSpace>>>,
    ext_g_states: Mutex<FxHashMap<ByteString, Option<ExtGState>>>,
    fonts: Mutex<FxHashMap<ByteString, Option<Dict>>>,
    pub(crate) icc: IccStreamCache,
}

/// A page's resource dictionary, with fallback to the enclosing
/// resources for form XObjects.
pub struct ResourceSet<'a> {
    doc: &'a Document,
    dict: Dict,
    caches: &'a PageCaches,
    parent: Option<&'a ResourceSet<'a>>,
}

impl<'a> ResourceSet<'a> {
    /// Wrap a page's resource dictionary.
    pub fn new(doc: &'a Document, dict: Dict, caches: &'a PageCaches) -> Self {
        Self {
            doc,
            dict,
            caches,
            parent: None,
        }
    }

    /// A child set for a form XObject's own resources; lookups fall back
    /// to this set.
    pub(crate) fn child(&self, dict: Dict) -> ResourceSet<'_> {
        ResourceSet {
            doc: self.doc,
            dict,
            caches: self.caches,
            parent: Some(self),
        }
    }

    pub(crate) fn doc(&self) -> &'a Document {
        self.doc
    }

    fn category(&self, key: &[u8]) -> Dict {
        self.dict.get::<Dict>(self.doc, key).unwrap_or_default()
    }

    fn lookup_raw(&self, category: &[u8], name: &ByteString) -> Option<Value> {
        let local = self.category(category).get_raw(name).cloned();

        match local {
            Some(v) => Some(v),
            None => self.parent.and_then(|p| p.lookup_raw(category, name)),
        }
    }

    /// Resolve a color space by resource name. Device names go through
    /// the `Default*` remapping and the document's output intent.
    pub(crate) fn color_space(&self, name: &ByteString) -> Option<ColorSpace> {
        if let Some(device) = self.device_color_space(name) {
            return Some(device);
        }

        if let Ok(cache) = self.caches.color_spaces.lock()
            && let Some(hit) = cache.get(name)
        {
            return hit.clone();
        }

        let built = self
            .lookup_raw(COLOR_SPACE, name)
            .and_then(|v| ColorSpace::from_value(self.doc, &v, &self.caches.icc));

        if built.is_none() {
            warn!("color space {:?} is unresolvable", name.as_str_lossy());
        }

        if let Ok(mut cache) = self.caches.color_spaces.lock() {
            cache.entry(name.clone()).or_insert_with(|| built.clone());
        }

        built
    }

    /// Device color spaces, remapped through `DefaultGray`, `DefaultRGB`
    /// or `DefaultCMYK` when the resources declare one, with the
    /// document's output intent as the further fallback.
    fn device_color_space(&self, name: &ByteString) -> Option<ColorSpace> {
        let (default_key, components, plain): (&[u8], usize, fn() -> ColorSpace) =
            match name.as_bytes() {
                b"DeviceGray" | b"G" => (b"DefaultGray", 1, ColorSpace::device_gray),
                b"DeviceRGB" | b"RGB" => (b"DefaultRGB", 3, ColorSpace::device_rgb),
                b"DeviceCMYK" | b"CMYK" => (b"DefaultCMYK", 4, ColorSpace::device_cmyk),
                _ => return None,
            };

        let remapped = self
            .lookup_raw(COLOR_SPACE, &ByteString::from(default_key))
            .and_then(|v| ColorSpace::from_value(self.doc, &v, &self.caches.icc))
            .or_else(|| {
                self.doc
                    .output_intent()
                    .and_then(|profile| ColorSpace::from_icc_data(profile, components))
            });

        Some(remapped.unwrap_or_else(plain))
    }

    /// Resolve an `/ExtGState` by name.
    pub(crate) fn ext_g_state(&self, name: &ByteString) -> Option<ExtGState> {
        if let Ok(cache) = self.caches.ext_g_states.lock()
            && let Some(hit) = cache.get(name)
        {
            return hit.clone();
        }

        let built = self
            .lookup_raw(EXT_G_STATE, name)
            .and_then(|v| self.doc.resolve_as::<Dict>(&v))
            .map(|dict| ExtGState::from_dict(self.doc, &dict));

        if let Ok(mut cache) = self.caches.ext_g_states.lock() {
            cache.entry(name.clone()).or_insert_with(|| built.clone());
        }

        built
    }

    /// Resolve a font dictionary by name.
    pub(crate) fn font(&self, name: &ByteString) -> Option<Dict> {
        if let Ok(cache) = self.caches.fonts.lock()
            && let Some(hit) = cache.get(name)
        {
            return hit.clone();
        }

        let built = self
            .lookup_raw(FONT, name)
            .and_then(|v| self.doc.resolve_as::<Dict>(&v));

        if let Ok(mut cache) = self.caches.fonts.lock() {
            cache.entry(name.clone()).or_insert_with(|| built.clone());
        }

        built
    }

    /// Resolve an XObject stream by name.
    pub(crate) fn x_object(&self, name: &ByteString) -> Option<Stream> {
        self.lookup_raw(X_OBJECT, name)
            .and_then(|v| self.doc.resolve_as::<Stream>(&v))
    }

    /// Resolve a pattern by name.
    pub(crate) fn pattern(&self, name: &ByteString) -> Option<Value> {
        self.lookup_raw(PATTERN, name).map(|v| self.doc.resolve(&v))
    }

    /// Resolve a shading by name.
    pub(crate) fn shading(&self, name: &ByteString) -> Option<Value> {
        self.lookup_raw(SHADING, name).map(|v| self.doc.resolve(&v))
    }

    /// The shared ICC profile cache.
    pub(crate) fn icc_cache(&self) -> &IccStreamCache {
        &self.caches.icc
    }
}
