//! Annotations.

use crate::document::Document;
use crate::object::dict::keys::{ANNOTS, C, F, IRT, M, RECT, RT, SUBTYPE, T};
use crate::object::{Array, ByteString, Dict, Name, ObjRef, Rect};
use bitflags::bitflags;

bitflags! {
    /// The `/F` flags of an annotation.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
    pub struct AnnotationFlags: u32 {
        /// Do not display unknown annotation types.
        const INVISIBLE = 1 << 0;
        /// Do not display or print the annotation at all.
        const HIDDEN = 1 << 1;
        /// Print the annotation.
        const PRINT = 1 << 2;
        /// Do not scale with the page zoom.
        const NO_ZOOM = 1 << 3;
        /// Do not rotate with the page.
        const NO_ROTATE = 1 << 4;
        /// Do not display on screen.
        const NO_VIEW = 1 << 5;
        /// Do not allow interaction.
        const READ_ONLY = 1 << 6;
        /// Do not allow deletion or repositioning.
        const LOCKED = 1 << 7;
        /// Invert the no-view flag on certain events.
        const TOGGLE_NO_VIEW = 1 << 8;
        /// Do not allow content changes.
        const LOCKED_CONTENTS = 1 << 9;
    }
}

/// How an annotation relates to the one named by `/IRT`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ReplyType {
    /// The annotation is a reply.
    #[default]
    Reply,
    /// The annotation is grouped with the target.
    Group,
}

/// An annotation on a page.
#[derive(Debug, Clone)]
pub struct Annotation {
    /// The annotation's own reference, when it was an indirect object.
    pub id: Option<ObjRef>,
    /// The subtype name, such as `Text` or `Highlight`.
    pub subtype: ByteString,
    /// The annotation rectangle in page space.
    pub rect: Rect,
    /// The text content, decoded.
    pub contents: String,
    /// The title, usually the author.
    pub title: String,
    /// The modification date string, verbatim.
    pub modified: String,
    /// The annotation flags.
    pub flags: AnnotationFlags,
    /// The annotation this one replies to.
    pub in_reply_to: Option<ObjRef>,
    /// The kind of the `/IRT` relationship.
    pub reply_type: ReplyType,
    /// The annotation color, when it has one with one or three
    /// components.
    pub color: Option<[f32; 3]>,
}

impl Annotation {
    pub(crate) fn from_dict(doc: &Document, id: Option<ObjRef>, dict: &Dict) -> Option<Self> {
        let subtype = dict.get::<Name>(doc, SUBTYPE)?.0;
        let rect = dict.get::<Rect>(doc, RECT)?;

        let reply_type = match dict.get::<Name>(doc, RT) {
            Some(name) if *name == b"Group"[..] => ReplyType::Group,
            _ => ReplyType::Reply,
        };

        let color = dict.get::<Array>(doc, C).and_then(|arr| {
            let c: Vec<f32> = arr.iter_resolved::<f32>(doc).collect();

            match c.as_slice() {
                [g] => Some([*g, *g, *g]),
                [r, g, b] => Some([*r, *g, *b]),
                _ => None,
            }
        });

        Some(Self {
            id,
            subtype,
            rect,
            contents: dict
                .get::<ByteString>(doc, crate::object::dict::keys::CONTENTS)
                .map(|s| s.to_text())
                .unwrap_or_default(),
            title: dict
                .get::<ByteString>(doc, T)
                .map(|s| s.to_text())
                .unwrap_or_default(),
            modified: dict
                .get::<ByteString>(doc, M)
                .map(|s| s.to_text())
                .unwrap_or_default(),
            flags: AnnotationFlags::from_bits_truncate(dict.get::<u32>(doc, F).unwrap_or(0)),
            in_reply_to: dict.get_ref(IRT),
            reply_type,
            color,
        })
    }

    /// The rectangle hit-testing uses, in unrotated page space.
    pub fn hover_rect(&self) -> Rect {
        self.rect
    }

    /// A root annotation starts a thread: it replies to nothing.
    pub fn is_root(&self) -> bool {
        self.in_reply_to.is_none()
    }

    /// Whether the annotation is excluded from display.
    pub fn is_hidden(&self) -> bool {
        self.flags
            .intersects(AnnotationFlags::HIDDEN | AnnotationFlags::NO_VIEW)
    }

    /// Whether the annotation presents a comment bubble: a markup
    /// annotation that actually carries text.
    pub fn should_display_bubble(&self) -> bool {
        let markup = matches!(
            self.subtype.as_bytes(),
            b"Text"
                | b"FreeText"
                | b"Highlight"
                | b"Underline"
                | b"Squiggly"
                | b"StrikeOut"
                | b"Square"
                | b"Circle"
                | b"Polygon"
                | b"PolyLine"
                | b"Ink"
                | b"Caret"
        );

        markup && !self.contents.is_empty()
    }
}

/// Parse the `/Annots` of a page. Unreadable entries are skipped.
pub(crate) fn parse_page_annotations(doc: &Document, page_dict: &Dict) -> Vec<Annotation> {
    let Some(annots) = page_dict.get::<Array>(doc, ANNOTS) else {
        return vec![];
    };

    annots
        .iter()
        .filter_map(|entry| {
            let id = entry.as_ref();
            let dict = doc.resolve_as::<Dict>(entry)?;

            Annotation::from_dict(doc, id, &dict)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::annotated_two_page_pdf;
    use std::sync::Arc;

    #[test]
    fn thread_fields() {
        let doc = Document::open(Arc::new(annotated_two_page_pdf())).unwrap();
        let page = doc.page(1).unwrap();
        let annots = page.annotations(&doc);

        assert_eq!(annots.len(), 3);

        let root = &annots[0];
        assert!(root.is_root());
        assert_eq!(root.subtype, b"Text"[..]);
        assert_eq!(root.title, "alice");
        assert_eq!(root.contents, "root note");
        assert_eq!(root.hover_rect(), Rect::new(20.0, 20.0, 40.0, 40.0));
        assert!(root.should_display_bubble());

        let reply = &annots[1];
        assert!(!reply.is_root());
        assert_eq!(reply.in_reply_to, root.id);
        assert_eq!(reply.reply_type, ReplyType::Reply);
    }

    #[test]
    fn pages_without_annotations() {
        let doc = Document::open(Arc::new(annotated_two_page_pdf())).unwrap();
        let page = doc.page(2).unwrap();

        assert!(page.annotations(&doc).is_empty());
    }
}
