//! A command-recording mock backend and document fixtures shared by the
//! integration tests.

// Each test binary uses a different slice of this module.
#![allow(dead_code)]

use kurbo::{Affine, BezPath, Rect};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use vellum_interpret::canvas::{Canvas, FillRule, Paint, RgbaImage, StrokeProps, TextRun};
use vellum_interpret::color::AlphaColor;
use vellum_panel::backend::{
    BoxFuture, FrameKind, GraphicsBackend, PresentInfo, RecordingCanvas, RenderTarget, Surface,
    SurfaceProvider,
};
use vellum_syntax::Document;

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCmd {
    Save,
    Restore,
    Clip,
    Fill(AlphaColor),
    Stroke,
    Image(u32, u32),
    Text(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct MockPicture(pub Arc<Vec<DrawCmd>>);

#[derive(Debug, Clone, PartialEq)]
pub struct MockImage {
    pub width: u32,
    pub height: u32,
}

#[derive(Default)]
pub struct MockRecorder {
    cmds: Vec<DrawCmd>,
}

impl Canvas for MockRecorder {
    fn save(&mut self) {
        self.cmds.push(DrawCmd::Save);
    }

    fn restore(&mut self) {
        self.cmds.push(DrawCmd::Restore);
    }

    fn clip(&mut self, _: &BezPath, _: FillRule) {
        self.cmds.push(DrawCmd::Clip);
    }

    fn fill_path(&mut self, _: &BezPath, _: FillRule, paint: &Paint) {
        self.cmds.push(DrawCmd::Fill(paint.color));
    }

    fn stroke_path(&mut self, _: &BezPath, _: &Paint, _: &StrokeProps) {
        self.cmds.push(DrawCmd::Stroke);
    }

    fn draw_image(&mut self, image: &RgbaImage, _: Affine) {
        self.cmds.push(DrawCmd::Image(image.width, image.height));
    }

    fn draw_text(&mut self, run: &TextRun) {
        self.cmds.push(DrawCmd::Text(run.bytes.as_bytes().to_vec()));
    }
}

impl RecordingCanvas for MockRecorder {
    type Picture = MockPicture;

    fn finish(self) -> MockPicture {
        MockPicture(Arc::new(self.cmds))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceOp {
    Clear,
    FillRect(Rect),
    Picture(usize),
    Image(Rect),
    Blit { src: Rect, dst: Rect },
}

pub struct MockSurface {
    width: u32,
    height: u32,
    pub ops: Vec<SurfaceOp>,
}

impl Surface for MockSurface {
    type Picture = MockPicture;
    type Image = MockImage;

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn clear(&mut self, _: AlphaColor) {
        self.ops.push(SurfaceOp::Clear);
    }

    fn fill_rect(&mut self, rect: Rect, _: AlphaColor) {
        self.ops.push(SurfaceOp::FillRect(rect));
    }

    fn draw_picture(&mut self, picture: &MockPicture, _: Affine) {
        self.ops.push(SurfaceOp::Picture(picture.0.len()));
    }

    fn draw_image(&mut self, _: &MockImage, dst: Rect) {
        self.ops.push(SurfaceOp::Image(dst));
    }

    fn draw_image_from(&mut self, _: &MockImage, src: Rect, dst: Rect, _: f64) {
        self.ops.push(SurfaceOp::Blit { src, dst });
    }

    fn snapshot(&self) -> MockImage {
        MockImage {
            width: self.width,
            height: self.height,
        }
    }
}

pub struct MockBackend;

impl GraphicsBackend for MockBackend {
    type Picture = MockPicture;
    type Image = MockImage;
    type Surface = MockSurface;
    type Recorder = MockRecorder;

    fn begin_recording(&self, _: f64, _: f64) -> MockRecorder {
        MockRecorder::default()
    }
}

pub struct MockProvider;

impl SurfaceProvider<MockBackend> for MockProvider {
    fn get_drawing_surface(&self, width: u32, height: u32) -> BoxFuture<'_, MockSurface> {
        Box::pin(async move {
            MockSurface {
                width,
                height,
                ops: vec![],
            }
        })
    }

    fn create_thumbnail_surface(&self, width: u32, height: u32) -> BoxFuture<'_, MockSurface> {
        Box::pin(async move {
            MockSurface {
                width,
                height,
                ops: vec![],
            }
        })
    }
}

/// A frame as the target saw it: the kind plus the scale of the request
/// it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub kind: FrameKind,
    pub scale: Option<f32>,
}

/// A render target that records frames. Presents block on the semaphore,
/// so tests can hold a pass at a suspension point deterministically.
pub struct MockTarget {
    pub frames: Mutex<Vec<Frame>>,
    pub gate: Semaphore,
}

impl MockTarget {
    pub fn new(initial_permits: usize) -> Self {
        Self {
            frames: Mutex::new(vec![]),
            gate: Semaphore::new(initial_permits),
        }
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().unwrap().clone()
    }

    pub fn release(&self, permits: usize) {
        self.gate.add_permits(permits);
    }
}

impl RenderTarget<MockBackend> for MockTarget {
    fn present<'a>(
        &'a self,
        _: &'a MockSurface,
        info: PresentInfo<'a>,
    ) -> BoxFuture<'a, ()> {
        let frame = Frame {
            kind: info.kind,
            scale: info.request.map(|r| r.scale),
        };

        Box::pin(async move {
            self.frames.lock().unwrap().push(frame);

            let permit = self.gate.acquire().await.expect("gate is never closed");
            permit.forget();
        })
    }
}

/// Build a document with `pages` simple pages (100 x 150 points each).
pub fn fixture_pdf(pages: usize) -> Arc<Document> {
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");

    let content_obj = pages + 3;

    let kids: Vec<String> = (0..pages).map(|i| format!("{} 0 R", i + 3)).collect();

    let mut bodies = vec![
        "1 0 obj <</Type/Catalog/Pages 2 0 R>> endobj\n".to_string(),
        format!(
            "2 0 obj <</Type/Pages/Kids [{}]/Count {pages}/MediaBox [0 0 100 150]>> endobj\n",
            kids.join(" ")
        ),
    ];

    for i in 0..pages {
        bodies.push(format!(
            "{} 0 obj <</Type/Page/Parent 2 0 R/Contents {content_obj} 0 R>> endobj\n",
            i + 3
        ));
    }

    bodies.push(format!(
        "{content_obj} 0 obj <</Length 23>> stream\n1 0 0 rg 0 0 50 50 re f\nendstream endobj\n"
    ));

    let mut offsets = vec![];

    for body in &bodies {
        offsets.push(out.len());
        out.extend_from_slice(body.as_bytes());
    }

    let xref_pos = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", offsets.len() + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");

    for offset in &offsets {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }

    out.extend_from_slice(
        format!(
            "trailer <</Size {}/Root 1 0 R>>\nstartxref\n{xref_pos}\n%%EOF",
            offsets.len() + 1
        )
        .as_bytes(),
    );

    Arc::new(Document::open(Arc::new(out)).expect("fixture must open"))
}

/// A document with an annotation thread (A <- B <- C) on page one.
pub fn annotated_pdf() -> Arc<Document> {
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");

    let bodies = [
        "1 0 obj <</Type/Catalog/Pages 2 0 R>> endobj\n".to_string(),
        "2 0 obj <</Type/Pages/Kids [3 0 R]/Count 1/MediaBox [0 0 612 792]>> endobj\n".to_string(),
        "3 0 obj <</Type/Page/Parent 2 0 R/Contents 4 0 R/Annots [5 0 R 6 0 R 7 0 R 8 0 R]>> endobj\n"
            .to_string(),
        "4 0 obj <</Length 8>> stream\n0 0 m S\n\nendstream endobj\n".to_string(),
        "5 0 obj <</Type/Annot/Subtype/Text/Rect [100 700 120 720]/T (alice)/Contents (first!)>> endobj\n"
            .to_string(),
        "6 0 obj <</Type/Annot/Subtype/Text/Rect [105 705 125 725]/T (bob)/Contents (reply one)/IRT 5 0 R/RT/R>> endobj\n"
            .to_string(),
        "7 0 obj <</Type/Annot/Subtype/Text/Rect [110 710 130 730]/T (carol)/Contents (reply two)/IRT 6 0 R/RT/R>> endobj\n"
            .to_string(),
        "8 0 obj <</Type/Annot/Subtype/Link/Rect [100 700 300 780]>> endobj\n".to_string(),
    ];

    let mut offsets = vec![];

    for body in &bodies {
        offsets.push(out.len());
        out.extend_from_slice(body.as_bytes());
    }

    let xref_pos = out.len();
    out.extend_from_slice(b"xref\n0 9\n0000000000 65535 f \n");

    for offset in &offsets {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }

    out.extend_from_slice(
        format!("trailer <</Size 9/Root 1 0 R>>\nstartxref\n{xref_pos}\n%%EOF").as_bytes(),
    );

    Arc::new(Document::open(Arc::new(out)).expect("fixture must open"))
}
