//! Executing a page's content stream into a canvas.

use crate::cancel::CancelToken;
use crate::canvas::{Canvas, FillRule, Paint, TextRun};
use crate::color::ColorSpace;
use crate::content::{ContentItem, ContentIter};
use crate::image;
use crate::resources::{PageCaches, ResourceSet, line_cap_from_number, line_join_from_number};
use crate::state::GraphicsState;
use kurbo::{Affine, BezPath, Point, Shape};
use log::warn;
use smallvec::SmallVec;
use vellum_syntax::Document;
use vellum_syntax::object::dict::keys::{B_BOX, MATRIX, RESOURCES, SUBTYPE};
use vellum_syntax::object::{ByteString, Dict, Name, Rect, Stream, Value};
use vellum_syntax::page::Page;

// Form XObjects can nest; past this depth it's a cycle.
const MAX_FORM_DEPTH: u32 = 12;

/// Parameters of a render pass.
#[derive(Debug, Copy, Clone)]
pub struct RenderParams {
    /// The scale from PDF points to device units.
    pub scale: f32,
    /// Preview mode skips image decoding so a first frame appears
    /// quickly.
    pub preview: bool,
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            scale: 1.0,
            preview: false,
        }
    }
}

/// The transform from PDF page space to canvas space (origin top-left,
/// y down), honoring the page rotation, plus the resulting canvas size.
pub fn page_transform(page: &Page, scale: f32) -> (Affine, (f64, f64)) {
    let crop = page.crop_box();
    let s = f64::from(scale);

    let (x0, y0, x1, y1) = (
        f64::from(crop.x0),
        f64::from(crop.y0),
        f64::from(crop.x1),
        f64::from(crop.y1),
    );
    let (w, h) = (x1 - x0, y1 - y0);

    match page.rotation() {
        90 => (
            Affine::new([0.0, s, s, 0.0, -s * y0, -s * x0]),
            (s * h, s * w),
        ),
        180 => (
            Affine::new([-s, 0.0, 0.0, s, s * x1, -s * y0]),
            (s * w, s * h),
        ),
        270 => (
            Affine::new([0.0, -s, -s, 0.0, s * y1, s * x1]),
            (s * h, s * w),
        ),
        _ => (
            Affine::new([s, 0.0, 0.0, -s, -s * x0, s * y1]),
            (s * w, s * h),
        ),
    }
}

/// Execute the page's content into the canvas.
///
/// Returns `false` when the pass was cancelled; whatever was drawn up to
/// that point stays on the canvas. Malformed content never fails the
/// pass.
pub fn render_page(
    doc: &Document,
    page: &Page,
    canvas: &mut impl Canvas,
    caches: &PageCaches,
    params: &RenderParams,
    cancel: &CancelToken,
) -> bool {
    let (transform, size) = page_transform(page, params.scale);

    let resources = ResourceSet::new(doc, page.resources().clone(), caches);
    let content = page.content(doc);

    canvas.save();
    canvas.clip(
        &kurbo::Rect::new(0.0, 0.0, size.0, size.1).to_path(0.1),
        FillRule::NonZero,
    );

    let mut interpreter = Interpreter {
        doc,
        cancel,
        states: vec![GraphicsState::new(transform)],
        path: BezPath::new(),
        last_point: Point::ZERO,
        subpath_start: Point::ZERO,
        pending_clip: None,
        preview: params.preview,
        canvas_saves: 0,
    };

    let completed = interpreter.run(canvas, &resources, ContentIter::new(&content), 0);

    // Unbalanced q operators must not leak clip state.
    for _ in 0..interpreter.canvas_saves {
        canvas.restore();
    }

    canvas.restore();

    completed
}

struct Interpreter<'a> {
    doc: &'a Document,
    cancel: &'a CancelToken,
    states: Vec<GraphicsState>,
    path: BezPath,
    last_point: Point,
    subpath_start: Point,
    pending_clip: Option<FillRule>,
    preview: bool,
    canvas_saves: u32,
}

impl Interpreter<'_> {
    fn state(&self) -> &GraphicsState {
        self.states.last().expect("state stack is never empty")
    }

    fn state_mut(&mut self) -> &mut GraphicsState {
        self.states.last_mut().expect("state stack is never empty")
    }

    fn run(
        &mut self,
        canvas: &mut impl Canvas,
        resources: &ResourceSet<'_>,
        items: ContentIter<'_>,
        depth: u32,
    ) -> bool {
        for item in items {
            if self.cancel.is_cancelled() {
                return false;
            }

            match item {
                ContentItem::Operation { operands, operator } => {
                    if !self.op(canvas, resources, &operands, &operator, depth) {
                        return false;
                    }
                }
                ContentItem::InlineImage { dict, data } => {
                    if self.preview {
                        continue;
                    }

                    let state = self.state();

                    if let Some(img) = image::decode_inline_image(
                        resources,
                        &dict,
                        &data,
                        state.fill_color(),
                        state.intent,
                    ) {
                        canvas.draw_image(&img, state.ctm);
                    }
                }
            }
        }

        true
    }

    fn op(
        &mut self,
        canvas: &mut impl Canvas,
        resources: &ResourceSet<'_>,
        operands: &[Value],
        operator: &ByteString,
        depth: u32,
    ) -> bool {
        let f = |i: usize| operands.get(i).map(|v| v.as_f32()).unwrap_or(0.0);

        match operator.as_bytes() {
            b"q" => {
                let top = self.state().clone();
                self.states.push(top);
                canvas.save();
                self.canvas_saves += 1;
            }
            b"Q" => {
                if self.states.len() > 1 {
                    self.states.pop();
                }

                if self.canvas_saves > 0 {
                    canvas.restore();
                    self.canvas_saves -= 1;
                }
            }
            b"cm" => {
                let m = Affine::new([
                    f64::from(f(0)),
                    f64::from(f(1)),
                    f64::from(f(2)),
                    f64::from(f(3)),
                    f64::from(f(4)),
                    f64::from(f(5)),
                ]);

                let state = self.state_mut();
                state.ctm = state.ctm * m;
            }

            b"w" => self.state_mut().stroke_props.width = f(0),
            b"J" => {
                self.state_mut().stroke_props.cap = line_cap_from_number(f(0) as u8);
            }
            b"j" => {
                self.state_mut().stroke_props.join = line_join_from_number(f(0) as u8);
            }
            b"M" => self.state_mut().stroke_props.miter_limit = f(0),
            b"d" => {
                let array: SmallVec<[f32; 4]> = operands
                    .first()
                    .and_then(|v| v.as_array())
                    .map(|a| a.iter().map(|v| v.as_f32()).collect())
                    .unwrap_or_default();

                let state = self.state_mut();
                state.stroke_props.dash_array = array;
                state.stroke_props.dash_offset = f(1);
            }
            b"ri" => {
                if let Some(name) = operands.first().and_then(|v| v.as_name()) {
                    self.state_mut().intent = crate::color::RenderingIntent::from_name(name);
                }
            }
            b"i" => {}
            b"gs" => {
                if let Some(name) = operands.first().and_then(|v| v.as_name())
                    && let Some(gs) = resources.ext_g_state(name)
                {
                    let state = self.state_mut();

                    if let Some(w) = gs.line_width {
                        state.stroke_props.width = w;
                    }
                    if let Some(cap) = gs.line_cap {
                        state.stroke_props.cap = cap;
                    }
                    if let Some(join) = gs.line_join {
                        state.stroke_props.join = join;
                    }
                    if let Some(ml) = gs.miter_limit {
                        state.stroke_props.miter_limit = ml;
                    }
                    if let Some((array, phase)) = gs.dash {
                        state.stroke_props.dash_array = array;
                        state.stroke_props.dash_offset = phase;
                    }
                    if let Some(ca) = gs.stroke_alpha {
                        state.stroke_alpha = ca;
                    }
                    if let Some(ca) = gs.fill_alpha {
                        state.fill_alpha = ca;
                    }
                } else {
                    warn!("unresolvable graphics state parameter dictionary");
                }
            }

            // Path construction.
            b"m" => {
                let p = Point::new(f64::from(f(0)), f64::from(f(1)));
                self.path.move_to(p);
                self.last_point = p;
                self.subpath_start = p;
            }
            b"l" => {
                if !self.path.elements().is_empty() {
                    let p = Point::new(f64::from(f(0)), f64::from(f(1)));
                    self.path.line_to(p);
                    self.last_point = p;
                }
            }
            b"c" => {
                if !self.path.elements().is_empty() {
                    let p1 = Point::new(f64::from(f(0)), f64::from(f(1)));
                    let p2 = Point::new(f64::from(f(2)), f64::from(f(3)));
                    let p3 = Point::new(f64::from(f(4)), f64::from(f(5)));
                    self.path.curve_to(p1, p2, p3);
                    self.last_point = p3;
                }
            }
            b"v" => {
                if !self.path.elements().is_empty() {
                    let p1 = self.last_point;
                    let p2 = Point::new(f64::from(f(0)), f64::from(f(1)));
                    let p3 = Point::new(f64::from(f(2)), f64::from(f(3)));
                    self.path.curve_to(p1, p2, p3);
                    self.last_point = p3;
                }
            }
            b"y" => {
                if !self.path.elements().is_empty() {
                    let p1 = Point::new(f64::from(f(0)), f64::from(f(1)));
                    let p3 = Point::new(f64::from(f(2)), f64::from(f(3)));
                    self.path.curve_to(p1, p3, p3);
                    self.last_point = p3;
                }
            }
            b"h" => {
                if !self.path.elements().is_empty() {
                    self.path.close_path();
                    self.last_point = self.subpath_start;
                }
            }
            b"re" => {
                let rect = kurbo::Rect::new(
                    f64::from(f(0)),
                    f64::from(f(1)),
                    f64::from(f(0)) + f64::from(f(2)),
                    f64::from(f(1)) + f64::from(f(3)),
                );

                self.path.extend(rect.to_path(0.1));
                self.last_point = Point::new(rect.x0, rect.y0);
                self.subpath_start = self.last_point;
            }

            // Path painting.
            b"n" => self.end_path(canvas),
            b"f" | b"F" => self.fill(canvas, FillRule::NonZero),
            b"f*" => self.fill(canvas, FillRule::EvenOdd),
            b"S" => self.stroke(canvas, false),
            b"s" => self.stroke(canvas, true),
            b"B" => self.fill_and_stroke(canvas, FillRule::NonZero),
            b"B*" => self.fill_and_stroke(canvas, FillRule::EvenOdd),
            b"b" => {
                self.path.close_path();
                self.fill_and_stroke(canvas, FillRule::NonZero);
            }
            b"b*" => {
                self.path.close_path();
                self.fill_and_stroke(canvas, FillRule::EvenOdd);
            }
            b"W" => self.pending_clip = Some(FillRule::NonZero),
            b"W*" => self.pending_clip = Some(FillRule::EvenOdd),

            // Color.
            b"CS" | b"cs" => {
                let space = operands
                    .first()
                    .and_then(|v| v.as_name())
                    .and_then(|name| {
                        ColorSpace::from_family_name(name)
                            .or_else(|| resources.color_space(name))
                    })
                    .unwrap_or_else(ColorSpace::device_gray);

                if operator.as_bytes() == b"CS" {
                    self.state_mut().stroke.set_space(space);
                } else {
                    self.state_mut().fill.set_space(space);
                }
            }
            b"SC" | b"SCN" | b"sc" | b"scn" => {
                let numeric: SmallVec<[f32; 4]> = operands
                    .iter()
                    .filter(|v| matches!(v, Value::Int(_) | Value::Real(_)))
                    .map(|v| v.as_f32())
                    .collect();

                let pattern_name = operands.last().and_then(|v| v.as_name()).cloned();

                let stroking = matches!(operator.as_bytes(), b"SC" | b"SCN");
                let state = self.state_mut();
                let color = if stroking {
                    &mut state.stroke
                } else {
                    &mut state.fill
                };

                color.components = numeric;

                if let Some(name) = pattern_name {
                    // Pattern cells and shadings are realized behind the
                    // canvas; here the pattern paints as its base color.
                    if resources.pattern(&name).is_none() {
                        warn!("pattern {:?} is unresolvable", name.as_str_lossy());
                    }
                }
            }
            b"G" | b"g" => {
                let state = self.state_mut();
                let color = if operator.as_bytes() == b"G" {
                    &mut state.stroke
                } else {
                    &mut state.fill
                };

                color.set_space(ColorSpace::device_gray());
                color.components = smallvec::smallvec![f(0)];
            }
            b"RG" | b"rg" => {
                let state = self.state_mut();
                let color = if operator.as_bytes() == b"RG" {
                    &mut state.stroke
                } else {
                    &mut state.fill
                };

                color.set_space(ColorSpace::device_rgb());
                color.components = smallvec::smallvec![f(0), f(1), f(2)];
            }
            b"K" | b"k" => {
                let state = self.state_mut();
                let color = if operator.as_bytes() == b"K" {
                    &mut state.stroke
                } else {
                    &mut state.fill
                };

                color.set_space(ColorSpace::device_cmyk());
                color.components = smallvec::smallvec![f(0), f(1), f(2), f(3)];
            }
            b"sh" => {
                if let Some(name) = operands.first().and_then(|v| v.as_name()) {
                    if resources.shading(name).is_none() {
                        warn!("shading {:?} is unresolvable", name.as_str_lossy());
                    }

                    // Shading rasterization is the backend's concern; the
                    // recording layer has no mesh primitive.
                }
            }

            // Text.
            b"BT" => {
                let text = &mut self.state_mut().text;
                text.text_matrix = Affine::IDENTITY;
                text.line_matrix = Affine::IDENTITY;
            }
            b"ET" => {}
            b"Tc" => self.state_mut().text.char_spacing = f(0),
            b"Tw" => self.state_mut().text.word_spacing = f(0),
            b"Tz" => self.state_mut().text.horizontal_scaling = f(0) / 100.0,
            b"TL" => self.state_mut().text.leading = f(0),
            b"Ts" => self.state_mut().text.rise = f(0),
            b"Tr" => self.state_mut().text.render_mode = f(0) as u8,
            b"Tf" => {
                let name = operands.first().and_then(|v| v.as_name()).cloned();

                if let Some(name) = &name
                    && resources.font(name).is_none()
                {
                    warn!("font {:?} is not in the resources", name.as_str_lossy());
                }

                let text = &mut self.state_mut().text;
                text.font = name;
                text.font_size = f(1);
            }
            b"Td" => {
                self.state_mut()
                    .text
                    .next_line(f64::from(f(0)), f64::from(f(1)));
            }
            b"TD" => {
                self.state_mut().text.leading = -f(1);
                self.state_mut()
                    .text
                    .next_line(f64::from(f(0)), f64::from(f(1)));
            }
            b"Tm" => {
                let m = Affine::new([
                    f64::from(f(0)),
                    f64::from(f(1)),
                    f64::from(f(2)),
                    f64::from(f(3)),
                    f64::from(f(4)),
                    f64::from(f(5)),
                ]);

                let text = &mut self.state_mut().text;
                text.text_matrix = m;
                text.line_matrix = m;
            }
            b"T*" => {
                let leading = self.state().text.leading;
                self.state_mut().text.next_line(0.0, -f64::from(leading));
            }
            b"Tj" => {
                if let Some(bytes) = operands.first().and_then(|v| v.as_string_bytes()) {
                    self.show_text(canvas, bytes.clone());
                }
            }
            b"'" => {
                let leading = self.state().text.leading;
                self.state_mut().text.next_line(0.0, -f64::from(leading));

                if let Some(bytes) = operands.first().and_then(|v| v.as_string_bytes()) {
                    self.show_text(canvas, bytes.clone());
                }
            }
            b"\"" => {
                self.state_mut().text.word_spacing = f(0);
                self.state_mut().text.char_spacing = f(1);

                let leading = self.state().text.leading;
                self.state_mut().text.next_line(0.0, -f64::from(leading));

                if let Some(bytes) = operands.get(2).and_then(|v| v.as_string_bytes()) {
                    self.show_text(canvas, bytes.clone());
                }
            }
            b"TJ" => {
                if let Some(parts) = operands.first().and_then(|v| v.as_array()) {
                    for part in parts.iter() {
                        match part {
                            Value::String(bytes) => self.show_text(canvas, bytes.clone()),
                            Value::Int(_) | Value::Real(_) => {
                                let adjustment = part.as_f32();
                                let text = &self.state().text;
                                let tx = f64::from(
                                    -adjustment / 1000.0
                                        * text.font_size
                                        * text.horizontal_scaling,
                                );

                                let text = &mut self.state_mut().text;
                                text.text_matrix =
                                    text.text_matrix * Affine::translate((tx, 0.0));
                            }
                            _ => {}
                        }
                    }
                }
            }

            // XObjects.
            b"Do" => {
                if let Some(name) = operands.first().and_then(|v| v.as_name())
                    && let Some(stream) = resources.x_object(name)
                {
                    return self.x_object(canvas, resources, &stream, depth);
                }
            }

            // Marked content and compatibility sections.
            b"BMC" | b"BDC" => {
                let tag = operands
                    .first()
                    .and_then(|v| v.as_name())
                    .cloned()
                    .unwrap_or_default();

                canvas.begin_marked_content(&tag);
            }
            b"EMC" => canvas.end_marked_content(),
            b"MP" | b"DP" | b"BX" | b"EX" => {}

            // Type 3 glyph metrics; nothing to do at this layer.
            b"d0" | b"d1" => {}

            other => {
                warn!(
                    "unhandled content operator {}",
                    String::from_utf8_lossy(other)
                );
            }
        }

        true
    }

    fn device_path(&self) -> BezPath {
        self.state().ctm * self.path.clone()
    }

    /// Apply a pending `W`/`W*` and clear the path. Runs after every
    /// painting operator.
    fn end_path(&mut self, canvas: &mut impl Canvas) {
        if let Some(rule) = self.pending_clip.take()
            && !self.path.elements().is_empty()
        {
            canvas.clip(&self.device_path(), rule);
        }

        self.path.truncate(0);
    }

    fn fill(&mut self, canvas: &mut impl Canvas, rule: FillRule) {
        if !self.path.elements().is_empty() {
            let paint = Paint {
                color: self.state().fill_color(),
            };

            canvas.fill_path(&self.device_path(), rule, &paint);
        }

        self.end_path(canvas);
    }

    fn stroke(&mut self, canvas: &mut impl Canvas, close_first: bool) {
        if close_first {
            self.path.close_path();
        }

        if !self.path.elements().is_empty() {
            let state = self.state();
            let paint = Paint {
                color: state.stroke_color(),
            };

            // The stroke width is defined in user space; scale it by the
            // CTM's average stretch.
            let mut props = state.stroke_props.clone();
            props.width = (props.width * ctm_scale(&state.ctm)).max(0.1);

            canvas.stroke_path(&self.device_path(), &paint, &props);
        }

        self.end_path(canvas);
    }

    fn fill_and_stroke(&mut self, canvas: &mut impl Canvas, rule: FillRule) {
        if !self.path.elements().is_empty() {
            let state = self.state();
            let device = self.device_path();

            canvas.fill_path(&device, rule, &Paint {
                color: state.fill_color(),
            });

            let mut props = state.stroke_props.clone();
            props.width = (props.width * ctm_scale(&state.ctm)).max(0.1);

            canvas.stroke_path(&device, &Paint {
                color: state.stroke_color(),
            }, &props);
        }

        self.end_path(canvas);
    }

    fn show_text(&mut self, canvas: &mut impl Canvas, bytes: ByteString) {
        let state = self.state();
        let text = &state.text;

        let Some(font) = text.font.clone() else {
            warn!("text shown before a font was selected");

            return;
        };

        let params = Affine::new([
            f64::from(text.font_size * text.horizontal_scaling),
            0.0,
            0.0,
            f64::from(text.font_size),
            0.0,
            f64::from(text.rise),
        ]);

        let run = TextRun {
            font,
            size: text.font_size,
            bytes,
            transform: state.ctm * text.text_matrix * params,
            color: state.fill_color(),
            char_spacing: text.char_spacing,
            word_spacing: text.word_spacing,
            horizontal_scaling: text.horizontal_scaling,
            render_mode: text.render_mode,
        };

        // Invisible text (mode 3) is still recorded; selection and
        // extraction behind the canvas may want it.
        canvas.draw_text(&run);
    }

    fn x_object(
        &mut self,
        canvas: &mut impl Canvas,
        resources: &ResourceSet<'_>,
        stream: &Stream,
        depth: u32,
    ) -> bool {
        let subtype = stream
            .dict
            .get::<Name>(self.doc, SUBTYPE)
            .map(|n| n.0)
            .unwrap_or_default();

        match subtype.as_bytes() {
            b"Image" => {
                if self.preview {
                    return true;
                }

                let state = self.state();

                if let Some(img) = image::decode_image(
                    resources,
                    stream,
                    state.fill_color(),
                    state.intent,
                ) {
                    canvas.draw_image(&img, state.ctm);
                }

                true
            }
            b"Form" => {
                if depth >= MAX_FORM_DEPTH {
                    warn!("form XObjects nest deeper than supported");

                    return true;
                }

                let matrix = stream
                    .dict
                    .get::<[f32; 6]>(self.doc, MATRIX)
                    .map(|m| Affine::new(m.map(f64::from)))
                    .unwrap_or(Affine::IDENTITY);

                let bbox = stream.dict.get::<Rect>(self.doc, B_BOX);

                let form_resources = stream
                    .dict
                    .get::<Dict>(self.doc, RESOURCES)
                    .map(|dict| resources.child(dict));

                let content = self.doc.decoded_stream(stream);

                let top = self.state().clone();
                self.states.push(top);
                canvas.save();

                self.state_mut().ctm = self.state().ctm * matrix;

                if let Some(bbox) = bbox {
                    let rect = kurbo::Rect::new(
                        f64::from(bbox.x0),
                        f64::from(bbox.y0),
                        f64::from(bbox.x1),
                        f64::from(bbox.y1),
                    );

                    canvas.clip(&(self.state().ctm * rect.to_path(0.1)), FillRule::NonZero);
                }

                let completed = match &form_resources {
                    Some(child) => self.run(canvas, child, ContentIter::new(&content), depth + 1),
                    None => self.run(canvas, resources, ContentIter::new(&content), depth + 1),
                };

                canvas.restore();
                self.states.pop();

                completed
            }
            other => {
                warn!(
                    "unsupported XObject subtype {}",
                    String::from_utf8_lossy(other)
                );

                true
            }
        }
    }
}

/// The average stretch of a transform, for scaling stroke widths.
fn ctm_scale(ctm: &Affine) -> f32 {
    let c = ctm.as_coeffs();
    let x = (c[0] * c[0] + c[1] * c[1]).sqrt();
    let y = (c[2] * c[2] + c[3] * c[3]).sqrt();

    ((x + y) / 2.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{RgbaImage, StrokeProps};
    use crate::color::AlphaColor;

    #[derive(Debug, PartialEq)]
    enum Cmd {
        Save,
        Restore,
        Clip,
        Fill(AlphaColor),
        Stroke(AlphaColor),
        Image(u32, u32),
        Text(Vec<u8>),
    }

    #[derive(Default)]
    struct RecordingCanvas {
        cmds: Vec<Cmd>,
    }

    impl Canvas for RecordingCanvas {
        fn save(&mut self) {
            self.cmds.push(Cmd::Save);
        }

        fn restore(&mut self) {
            self.cmds.push(Cmd::Restore);
        }

        fn clip(&mut self, _: &BezPath, _: FillRule) {
            self.cmds.push(Cmd::Clip);
        }

        fn fill_path(&mut self, _: &BezPath, _: FillRule, paint: &Paint) {
            self.cmds.push(Cmd::Fill(paint.color));
        }

        fn stroke_path(&mut self, _: &BezPath, paint: &Paint, _: &StrokeProps) {
            self.cmds.push(Cmd::Stroke(paint.color));
        }

        fn draw_image(&mut self, image: &RgbaImage, _: Affine) {
            self.cmds.push(Cmd::Image(image.width, image.height));
        }

        fn draw_text(&mut self, run: &TextRun) {
            self.cmds.push(Cmd::Text(run.bytes.as_bytes().to_vec()));
        }
    }

    fn render(content: &str) -> Vec<Cmd> {
        let doc = test_doc(content);
        let page = doc.page(1).unwrap();
        let caches = PageCaches::default();
        let mut canvas = RecordingCanvas::default();

        let completed = render_page(
            &doc,
            page,
            &mut canvas,
            &caches,
            &RenderParams::default(),
            &CancelToken::new(),
        );
        assert!(completed);

        canvas.cmds
    }

    fn test_doc(content: &str) -> Document {
        let mut out = Vec::new();
        out.extend_from_slice(b"%PDF-1.4\n");

        let bodies = [
            "1 0 obj <</Type/Catalog/Pages 2 0 R>> endobj\n".to_string(),
            "2 0 obj <</Type/Pages/Kids [3 0 R]/Count 1/MediaBox [0 0 200 100]>> endobj\n"
                .to_string(),
            "3 0 obj <</Type/Page/Parent 2 0 R/Contents 4 0 R>> endobj\n".to_string(),
            format!(
                "4 0 obj <</Length {}>> stream\n{content}\nendstream endobj\n",
                content.len()
            ),
        ];

        let mut offsets = vec![];
        for body in &bodies {
            offsets.push(out.len());
            out.extend_from_slice(body.as_bytes());
        }

        let xref_pos = out.len();
        let mut data = out;
        data.extend_from_slice(b"xref\n0 5\n0000000000 65535 f \n");
        for offset in &offsets {
            data.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
        }
        data.extend_from_slice(
            format!("trailer <</Size 5/Root 1 0 R>>\nstartxref\n{xref_pos}\n%%EOF").as_bytes(),
        );

        Document::open(std::sync::Arc::new(data)).unwrap()
    }

    use crate::cancel::CancelToken;

    #[test]
    fn fill_uses_the_current_color() {
        let cmds = render("1 0 0 rg 10 10 50 50 re f");

        assert!(cmds.contains(&Cmd::Fill(AlphaColor::new([1.0, 0.0, 0.0, 1.0]))));
    }

    #[test]
    fn save_restore_balances_even_when_unbalanced_in_content() {
        let cmds = render("q q 0 0 10 10 re f S");

        let saves = cmds.iter().filter(|c| matches!(c, Cmd::Save)).count();
        let restores = cmds.iter().filter(|c| matches!(c, Cmd::Restore)).count();
        assert_eq!(saves, restores);
    }

    #[test]
    fn text_runs_are_recorded() {
        let cmds = render("BT /F1 12 Tf (Hi) Tj ET");

        assert!(cmds.contains(&Cmd::Text(b"Hi".to_vec())));
    }

    #[test]
    fn cancellation_stops_promptly() {
        let doc = test_doc("1 0 0 rg 10 10 50 50 re f");
        let page = doc.page(1).unwrap();
        let caches = PageCaches::default();
        let mut canvas = RecordingCanvas::default();

        let cancel = CancelToken::new();
        cancel.cancel();

        let completed = render_page(
            &doc,
            page,
            &mut canvas,
            &caches,
            &RenderParams::default(),
            &cancel,
        );

        assert!(!completed);
        assert!(!canvas.cmds.contains(&Cmd::Fill(AlphaColor::new([
            1.0, 0.0, 0.0, 1.0
        ]))));
    }

    #[test]
    fn inline_images_draw() {
        let cmds = render("BI /W 2 /H 1 /BPC 8 /CS /G ID \x30\x31 EI");

        assert!(cmds.contains(&Cmd::Image(2, 1)));
    }

    #[test]
    fn each_paint_operator_records_once() {
        let cmds = render("q 0 0 10 10 re f Q 1 0 0 rg 0 0 10 10 re f");

        assert_eq!(
            cmds.iter().filter(|c| matches!(c, Cmd::Fill(_))).count(),
            2
        );
    }
}
