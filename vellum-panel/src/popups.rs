//! Annotation popup threads.

use kurbo::{Affine, Point, Rect};
use vellum_syntax::Document;
use vellum_syntax::annot::{Annotation, ReplyType};
use vellum_syntax::object::ObjRef;
use vellum_syntax::page::Page;

/// One message inside a popup thread.
#[derive(Debug, Clone, PartialEq)]
pub struct PopupMessage {
    /// The annotation's reference.
    pub id: Option<ObjRef>,
    /// The author.
    pub title: String,
    /// The message text.
    pub contents: String,
    /// The modification date string.
    pub modified: String,
}

impl PopupMessage {
    fn from_annotation(annot: &Annotation) -> Self {
        Self {
            id: annot.id,
            title: annot.title.clone(),
            contents: annot.contents.clone(),
            modified: annot.modified.clone(),
        }
    }
}

/// A popup: a root annotation plus its reply thread, collected
/// depth-first.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationPopup {
    /// The page the thread lives on (1-based).
    pub page_number: u32,
    /// The root annotation's hover rectangle in canvas coordinates at
    /// scale one.
    pub hover_rect: Rect,
    /// The thread, root first.
    pub messages: Vec<PopupMessage>,
}

/// Map an axis-aligned page-space rectangle through a page transform.
pub(crate) fn to_canvas_rect(transform: Affine, rect: vellum_syntax::object::Rect) -> Rect {
    let corners = [
        Point::new(f64::from(rect.x0), f64::from(rect.y0)),
        Point::new(f64::from(rect.x1), f64::from(rect.y0)),
        Point::new(f64::from(rect.x0), f64::from(rect.y1)),
        Point::new(f64::from(rect.x1), f64::from(rect.y1)),
    ]
    .map(|p| transform * p);

    let xs = corners.map(|p| p.x);
    let ys = corners.map(|p| p.y);

    Rect::new(
        xs.iter().copied().fold(f64::INFINITY, f64::min),
        ys.iter().copied().fold(f64::INFINITY, f64::min),
        xs.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        ys.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    )
}

/// Build the popup threads of a page: one per root annotation, each
/// followed by its replies of type `Reply`, depth-first.
pub(crate) fn build_popups(doc: &Document, page: &Page, transform: Affine) -> Vec<AnnotationPopup> {
    let annotations = page.annotations(doc);

    let mut popups = vec![];

    for root in annotations.iter().filter(|a| a.is_root()) {
        let mut messages = vec![PopupMessage::from_annotation(root)];

        if let Some(root_id) = root.id {
            collect_replies(&annotations, root_id, &mut messages, 0);
        }

        popups.push(AnnotationPopup {
            page_number: page.number(),
            hover_rect: to_canvas_rect(transform, root.hover_rect()),
            messages,
        });
    }

    popups
}

fn collect_replies(
    annotations: &[Annotation],
    parent: ObjRef,
    out: &mut Vec<PopupMessage>,
    depth: u32,
) {
    // Reply chains in the wild are short; a bound keeps cyclic `/IRT`
    // references from recursing forever.
    if depth > 32 {
        return;
    }

    for reply in annotations {
        if reply.in_reply_to == Some(parent) && reply.reply_type == ReplyType::Reply {
            out.push(PopupMessage::from_annotation(reply));

            if let Some(id) = reply.id {
                collect_replies(annotations, id, out, depth + 1);
            }
        }
    }
}
