//! The page tree.

use crate::annot::{self, Annotation};
use crate::document::Document;
use crate::object::dict::keys::{
    ART_BOX, BLEED_BOX, CONTENTS, CROP_BOX, KIDS, MEDIA_BOX, NUMS, P, PAGE_LABELS, PAGES,
    RESOURCES, ROTATE, S, ST, TRIM_BOX, TYPE,
};
use crate::object::{Array, Dict, Name, ObjRef, Rect, Stream, Value};
use log::warn;
use rustc_hash::FxHashSet;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, OnceLock};

/// The dimensions of an A4 page, the fallback when a page has no usable
/// media box anywhere in its inheritance chain.
pub const A4: Rect = Rect {
    x0: 0.0,
    y0: 0.0,
    x1: 595.275_6,
    y1: 841.889_76,
};

/// Normalize a rotation value into `{0, 90, 180, 270}`. Values that are
/// not multiples of ninety degrees are treated as unrotated.
pub fn normalize_rotation(degrees: i64) -> i32 {
    let wrapped = ((degrees % 360) + 360) % 360;

    match wrapped {
        90 | 180 | 270 => wrapped as i32,
        0 => 0,
        other => {
            warn!("rotation {other} is not a multiple of 90, ignoring");

            0
        }
    }
}

/// The attributes a page inherits from its ancestors unless it declares
/// them itself.
#[derive(Debug, Clone, Default)]
struct InheritedAttributes {
    resources: Option<Dict>,
    media_box: Option<Rect>,
    crop_box: Option<Rect>,
    bleed_box: Option<Rect>,
    trim_box: Option<Rect>,
    art_box: Option<Rect>,
    rotate: Option<i64>,
}

impl InheritedAttributes {
    /// Overlay the keys a tree node declares locally.
    fn apply(&mut self, doc: &Document, dict: &Dict) {
        if let Some(resources) = dict.get::<Dict>(doc, RESOURCES) {
            self.resources = Some(resources);
        }

        // Boxes are only accepted from well-formed four-element arrays;
        // anything else keeps the inherited value.
        for (key, slot) in [
            (MEDIA_BOX, &mut self.media_box),
            (CROP_BOX, &mut self.crop_box),
            (BLEED_BOX, &mut self.bleed_box),
            (TRIM_BOX, &mut self.trim_box),
            (ART_BOX, &mut self.art_box),
        ] {
            if let Some(rect) = dict.get::<Rect>(doc, key) {
                *slot = Some(rect);
            }
        }

        if let Some(rotate) = dict.get::<i64>(doc, ROTATE) {
            self.rotate = Some(rotate);
        }
    }
}

/// A page of a document.
pub struct Page {
    number: u32,
    id: Option<ObjRef>,
    dict: Dict,
    label: String,
    resources: Dict,
    media_box: Rect,
    crop_box: Rect,
    bleed_box: Option<Rect>,
    trim_box: Option<Rect>,
    art_box: Option<Rect>,
    rotation: i32,
    user_rotation: AtomicI32,
    content: OnceLock<Arc<Vec<u8>>>,
    annotations: OnceLock<Arc<Vec<Annotation>>>,
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("number", &self.number)
            .field("crop_box", &self.crop_box)
            .field("rotation", &self.rotation)
            .finish_non_exhaustive()
    }
}

impl Page {
    /// The 1-based page number.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// The reference of the page object, when it is known.
    pub fn id(&self) -> Option<ObjRef> {
        self.id
    }

    /// The page label, or the empty string when the document defines no
    /// labels.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The raw page dictionary.
    pub fn dict(&self) -> &Dict {
        &self.dict
    }

    /// The resources in effect for the page.
    pub fn resources(&self) -> &Dict {
        &self.resources
    }

    /// The media box.
    pub fn media_box(&self) -> Rect {
        self.media_box
    }

    /// The crop box, clipped to the media box.
    pub fn crop_box(&self) -> Rect {
        let clipped = self.crop_box.intersect(&self.media_box);

        if clipped.is_empty() { self.media_box } else { clipped }
    }

    /// The bleed box, when declared.
    pub fn bleed_box(&self) -> Option<Rect> {
        self.bleed_box
    }

    /// The trim box, when declared.
    pub fn trim_box(&self) -> Option<Rect> {
        self.trim_box
    }

    /// The art box, when declared.
    pub fn art_box(&self) -> Option<Rect> {
        self.art_box
    }

    /// The page rotation, normalized into `{0, 90, 180, 270}`.
    pub fn rotation(&self) -> i32 {
        self.rotation
    }

    /// The width and height of the page as displayed: the crop box
    /// dimensions, swapped when the rotation is sideways.
    pub fn display_size(&self) -> (f32, f32) {
        let crop = self.crop_box();
        let (w, h) = (crop.width(), crop.height());

        if self.rotation % 180 == 90 { (h, w) } else { (w, h) }
    }

    /// An additional rotation applied by the viewer, on top of the
    /// rotation declared in the file.
    pub fn user_rotation(&self) -> i32 {
        self.user_rotation.load(Ordering::Relaxed)
    }

    /// Set the viewer-applied rotation.
    pub fn set_user_rotation(&self, degrees: i32) {
        self.user_rotation
            .store(normalize_rotation(i64::from(degrees)), Ordering::Relaxed);
    }

    /// The concatenated, decoded content streams of the page. Multiple
    /// streams are joined with a single space, and the result is computed
    /// once.
    pub fn content(&self, doc: &Document) -> Arc<Vec<u8>> {
        self.content
            .get_or_init(|| {
                let mut out = vec![];

                match self.dict.get_raw(CONTENTS).map(|v| doc.resolve(v)) {
                    Some(Value::Stream(stream)) => {
                        out = doc.decoded_stream(&stream);
                    }
                    Some(Value::Array(streams)) => {
                        for stream in streams.iter_resolved::<Stream>(doc) {
                            out.extend_from_slice(&doc.decoded_stream(&stream));
                            // Streams must stay separated by white space.
                            out.push(b' ');
                        }
                    }
                    Some(_) => {
                        warn!("page contents are neither a stream nor an array of streams");
                    }
                    None => {}
                }

                Arc::new(out)
            })
            .clone()
    }

    /// The annotations of the page, parsed once.
    pub fn annotations(&self, doc: &Document) -> Arc<Vec<Annotation>> {
        self.annotations
            .get_or_init(|| Arc::new(annot::parse_page_annotations(doc, &self.dict)))
            .clone()
    }
}

/// Build the document's page list by walking the page tree.
pub(crate) fn build_page_list(doc: &Document) -> Vec<Page> {
    let mut pages = vec![];

    let root = doc.catalog().get::<Dict>(doc, PAGES);

    if let Some(root_dict) = root {
        let root_id = doc.catalog().get_ref(PAGES);
        let mut visited = FxHashSet::default();

        collect_pages(
            doc,
            &root_dict,
            root_id,
            InheritedAttributes::default(),
            &mut visited,
            &mut pages,
            0,
        );
    }

    if pages.is_empty() {
        // No walkable page tree; collect anything that looks like a page,
        // in object-number order.
        warn!("page tree is unreadable, collecting pages from the index");

        brute_force_pages(doc, &mut pages);
    }

    let labels = page_labels(doc, pages.len());

    for (i, page) in pages.iter_mut().enumerate() {
        page.number = i as u32 + 1;

        if let Some(label) = labels.get(i) {
            page.label = label.clone();
        }
    }

    pages
}

fn collect_pages(
    doc: &Document,
    node: &Dict,
    node_id: Option<ObjRef>,
    mut inherited: InheritedAttributes,
    visited: &mut FxHashSet<ObjRef>,
    out: &mut Vec<Page>,
    depth: u32,
) {
    // Page trees in the wild are shallow; anything deeper than this is a
    // cycle the visited set missed (direct dictionaries have no id).
    if depth > 64 {
        warn!("page tree is deeper than supported, pruning");

        return;
    }

    if let Some(id) = node_id
        && !visited.insert(id)
    {
        warn!("page tree contains a cycle through {id:?}");

        return;
    }

    inherited.apply(doc, node);

    let Some(kids) = node.get::<Array>(doc, KIDS) else {
        return;
    };

    for kid in kids.iter() {
        let kid_id = kid.as_ref();

        let Some(kid_dict) = doc.resolve_as::<Dict>(kid) else {
            continue;
        };

        match kid_dict.get::<Name>(doc, TYPE) {
            Some(name) if *name == b"Pages"[..] => {
                collect_pages(
                    doc,
                    &kid_dict,
                    kid_id,
                    inherited.clone(),
                    visited,
                    out,
                    depth + 1,
                );
            }
            // Anything else is treated as a page; files misdeclare the
            // type often enough.
            _ => {
                let mut leaf = inherited.clone();
                leaf.apply(doc, &kid_dict);

                out.push(make_page(kid_id, kid_dict, leaf));
            }
        }
    }
}

fn make_page(id: Option<ObjRef>, dict: Dict, attrs: InheritedAttributes) -> Page {
    let media_box = attrs.media_box.unwrap_or(A4);

    Page {
        number: 0,
        id,
        dict,
        label: String::new(),
        resources: attrs.resources.unwrap_or_default(),
        media_box,
        crop_box: attrs.crop_box.unwrap_or(media_box),
        bleed_box: attrs.bleed_box,
        trim_box: attrs.trim_box,
        art_box: attrs.art_box,
        rotation: normalize_rotation(attrs.rotate.unwrap_or(0)),
        user_rotation: AtomicI32::new(0),
        content: OnceLock::new(),
        annotations: OnceLock::new(),
    }
}

fn brute_force_pages(doc: &Document, out: &mut Vec<Page>) {
    let mut candidates: Vec<ObjRef> = vec![];

    {
        let index = match doc.index_snapshot() {
            Some(refs) => refs,
            None => return,
        };

        for id in index {
            if let Some(obj) = doc.get_object(id)
                && let Some(dict) = obj.value.as_dict()
                && dict.get_direct::<Name>(TYPE).is_some_and(|n| *n == b"Page"[..])
            {
                candidates.push(id);
            }
        }
    }

    candidates.sort();

    for id in candidates {
        if let Some(obj) = doc.get_object(id)
            && let Some(dict) = obj.value.as_dict()
        {
            let mut attrs = InheritedAttributes::default();
            attrs.apply(doc, dict);

            out.push(make_page(Some(id), dict.clone(), attrs));
        }
    }
}

/// Expand the catalog's `/PageLabels` number tree into one label per
/// page. Documents without labels get empty strings.
fn page_labels(doc: &Document, page_count: usize) -> Vec<String> {
    let mut out = vec![String::new(); page_count];

    let Some(labels) = doc.catalog().get::<Dict>(doc, PAGE_LABELS) else {
        return out;
    };

    let Some(nums) = labels.get::<Array>(doc, NUMS) else {
        return out;
    };

    // (start_index, style, prefix, first_value)
    let mut ranges: Vec<(usize, Option<u8>, String, i64)> = vec![];

    let mut iter = nums.iter();

    while let (Some(index), Some(entry)) = (iter.next(), iter.next()) {
        let Some(index) = doc.resolve_as::<usize>(index) else {
            continue;
        };

        let Some(entry) = doc.resolve_as::<Dict>(entry) else {
            continue;
        };

        let style = entry.get::<Name>(doc, S).and_then(|n| n.first().copied());
        let prefix = entry
            .get::<crate::object::ByteString>(doc, P)
            .map(|s| s.to_text())
            .unwrap_or_default();
        let start = entry.get::<i64>(doc, ST).unwrap_or(1);

        ranges.push((index, style, prefix, start));
    }

    ranges.sort_by_key(|r| r.0);

    for (i, (start_index, style, prefix, first_value)) in ranges.iter().enumerate() {
        let end = ranges
            .get(i + 1)
            .map(|r| r.0)
            .unwrap_or(page_count)
            .min(page_count);

        for page_index in *start_index..end {
            let value = first_value + (page_index - start_index) as i64;

            out[page_index] = format!("{prefix}{}", format_label(*style, value));
        }
    }

    out
}

fn format_label(style: Option<u8>, value: i64) -> String {
    match style {
        Some(b'D') => value.to_string(),
        Some(b'R') => roman(value),
        Some(b'r') => roman(value).to_lowercase(),
        Some(b'A') => letters(value),
        Some(b'a') => letters(value).to_lowercase(),
        _ => String::new(),
    }
}

fn roman(mut value: i64) -> String {
    if value <= 0 {
        return value.to_string();
    }

    const TABLE: [(i64, &str); 13] = [
        (1000, "M"),
        (900, "CM"),
        (500, "D"),
        (400, "CD"),
        (100, "C"),
        (90, "XC"),
        (50, "L"),
        (40, "XL"),
        (10, "X"),
        (9, "IX"),
        (5, "V"),
        (4, "IV"),
        (1, "I"),
    ];

    let mut out = String::new();

    for (n, s) in TABLE {
        while value >= n {
            out.push_str(s);
            value -= n;
        }
    }

    out
}

fn letters(value: i64) -> String {
    if value <= 0 {
        return value.to_string();
    }

    // 1 -> A, 26 -> Z, 27 -> AA, and so on.
    let letter = char::from(b'A' + ((value - 1) % 26) as u8);
    let repeats = (value - 1) / 26 + 1;

    std::iter::repeat_n(letter, repeats as usize).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{annotated_two_page_pdf, finish_classic, minimal_classic_pdf};
    use std::sync::Arc;

    fn open(data: Vec<u8>) -> Document {
        Document::open(Arc::new(data)).unwrap()
    }

    #[test]
    fn rotation_normalization() {
        assert_eq!(normalize_rotation(0), 0);
        assert_eq!(normalize_rotation(90), 90);
        assert_eq!(normalize_rotation(-90), 270);
        assert_eq!(normalize_rotation(450), 90);
        assert_eq!(normalize_rotation(-450), 270);
        assert_eq!(normalize_rotation(360), 0);
        assert_eq!(normalize_rotation(45), 0);

        for r in [-720i64, -361, -1, 0, 89, 90, 179, 359, 720] {
            assert_eq!(normalize_rotation(r), normalize_rotation(r + 360));
        }
    }

    #[test]
    fn single_page_attributes() {
        let doc = open(minimal_classic_pdf());
        let page = doc.page(1).unwrap();

        assert_eq!(page.label(), "");
        assert_eq!(page.media_box(), Rect::new(0.0, 0.0, 612.0, 792.0));
        assert_eq!(page.crop_box(), page.media_box());
        assert_eq!(page.rotation(), 0);
        assert_eq!(page.display_size(), (612.0, 792.0));
    }

    #[test]
    fn inheritance_and_local_override() {
        let doc = open(annotated_two_page_pdf());

        // Page one inherits the media box and the (normalized) rotation
        // from the pages node, and declares its own crop box.
        let one = doc.page(1).unwrap();
        assert_eq!(one.media_box(), Rect::new(0.0, 0.0, 612.0, 792.0));
        assert_eq!(one.crop_box(), Rect::new(10.0, 10.0, 400.0, 500.0));
        assert_eq!(one.rotation(), 90);

        // Page two overrides the rotation locally.
        let two = doc.page(2).unwrap();
        assert_eq!(two.crop_box(), two.media_box());
        assert_eq!(two.rotation(), 270);
        // Sideways rotation swaps the displayed dimensions.
        assert_eq!(two.display_size(), (792.0, 612.0));
    }

    #[test]
    fn content_is_concatenated_and_cached(){
        let doc = open(minimal_classic_pdf());
        let page = doc.page(1).unwrap();

        let content = page.content(&doc);
        assert_eq!(content.as_slice(), b"0 0 m S\n");
        assert!(Arc::ptr_eq(&content, &page.content(&doc)));
    }

    #[test]
    fn page_labels_with_styles() {
        let mut out = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n");

        let bodies = [
            "1 0 obj <</Type/Catalog/Pages 2 0 R/PageLabels <</Nums [0 <</S/r>> 2 <</S/D/St 10/P (A-)>>]>>>> endobj\n".to_string(),
            "2 0 obj <</Type/Pages/Kids [3 0 R 4 0 R 5 0 R]/Count 3/MediaBox [0 0 100 100]>> endobj\n".to_string(),
            "3 0 obj <</Type/Page/Parent 2 0 R>> endobj\n".to_string(),
            "4 0 obj <</Type/Page/Parent 2 0 R>> endobj\n".to_string(),
            "5 0 obj <</Type/Page/Parent 2 0 R>> endobj\n".to_string(),
        ];

        let mut offsets = vec![];
        for body in &bodies {
            offsets.push(out.len());
            out.extend_from_slice(body.as_bytes());
        }

        let data = finish_classic(out, &offsets, "<</Size 6/Root 1 0 R>>");
        let doc = open(data);

        assert_eq!(doc.pages().len(), 3);
        assert_eq!(doc.page(1).unwrap().label(), "i");
        assert_eq!(doc.page(2).unwrap().label(), "ii");
        assert_eq!(doc.page(3).unwrap().label(), "A-10");
    }

    #[test]
    fn user_rotation_updates() {
        let doc = open(minimal_classic_pdf());
        let page = doc.page(1).unwrap();

        assert_eq!(page.user_rotation(), 0);
        page.set_user_rotation(90);
        assert_eq!(page.user_rotation(), 90);
        page.set_user_rotation(-90);
        assert_eq!(page.user_rotation(), 270);
    }
}
