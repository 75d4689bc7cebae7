//! Facade-level behavior: page info, pictures, thumbnails, popups and
//! hit-testing.

mod common;

use common::{DrawCmd, MockBackend, MockProvider, MockSurface, annotated_pdf, fixture_pdf};
use kurbo::Point;
use std::sync::Arc;
use vellum_interpret::CancelToken;
use vellum_interpret::color::AlphaColor;
use vellum_panel::PanelRenderer;
use vellum_panel::backend::SurfaceProvider;
use vellum_panel::request::PointerState;

fn renderer(doc: Arc<vellum_syntax::Document>) -> PanelRenderer<MockBackend> {
    PanelRenderer::new(doc, Arc::new(MockBackend))
}

#[test]
fn page_info_basics() {
    let r = renderer(fixture_pdf(2));

    let info = r.page_info(1).unwrap();
    assert_eq!(info.label, "");
    assert_eq!(info.width, 100.0);
    assert_eq!(info.height, 150.0);
    assert_eq!(info.rotation, 0);

    assert!(r.page_info(0).is_none());
    assert!(r.page_info(3).is_none());

    let letter = renderer(annotated_pdf()).page_info(1).unwrap();
    assert_eq!(
        (letter.label.as_str(), letter.width, letter.height, letter.rotation),
        ("", 612.0, 792.0, 0)
    );
}

#[test]
fn pictures_record_content() {
    let r = renderer(fixture_pdf(1));

    let picture = r.get_picture(1, 1.0, &CancelToken::new()).unwrap();

    // The white page base plus the red square from the content stream.
    assert!(
        picture
            .0
            .contains(&DrawCmd::Fill(AlphaColor::new([1.0, 0.0, 0.0, 1.0])))
    );
}

#[test]
fn cancelled_picture_is_none() {
    let r = renderer(fixture_pdf(1));

    let cancel = CancelToken::new();
    cancel.cancel();

    assert!(r.get_picture(1, 1.0, &cancel).is_none());
}

#[test]
fn out_of_range_pictures_are_none() {
    let r = renderer(fixture_pdf(1));

    assert!(r.get_picture(9, 1.0, &CancelToken::new()).is_none());
}

#[tokio::test]
async fn thumbnails_fit_the_bound() {
    let r = renderer(fixture_pdf(1));

    let mut surface: MockSurface = MockProvider.create_thumbnail_surface(128, 128).await;

    let image = r.get_thumbnail(1, 128.0, &mut surface).unwrap();
    assert_eq!((image.width, image.height), (128, 128));
}

#[test]
fn popup_threads_are_depth_first_and_idempotent() {
    let r = renderer(annotated_pdf());

    let popups = r.create_annotation_popups(1);

    // One thread for the text annotation, one for the (reply-less) link.
    assert_eq!(popups.len(), 2);

    let thread = &popups[0];
    let titles: Vec<&str> = thread.messages.iter().map(|m| m.title.as_str()).collect();
    assert_eq!(titles, ["alice", "bob", "carol"]);

    let again = r.create_annotation_popups(1);
    assert_eq!(popups, again);
}

#[test]
fn hit_testing_prefers_bubbles() {
    let r = renderer(annotated_pdf());

    // (110, 80) in canvas space lies inside both the link and the text
    // annotation; the text annotation displays a bubble, so it wins.
    let hit = r.get_active_annotation(1, Point::new(110.0, 80.0)).unwrap();
    assert_eq!(hit.title, "alice");

    // (200, 50) only hits the link.
    let hit = r.get_active_annotation(1, Point::new(200.0, 50.0)).unwrap();
    assert_eq!(hit.subtype.as_bytes(), b"Link");

    assert!(r.get_active_annotation(1, Point::new(50.0, 50.0)).is_none());
    assert!(r.get_active_annotation(7, Point::new(0.0, 0.0)).is_none());
}

#[test]
fn annotation_pictures_reflect_pointer_state() {
    let r = renderer(annotated_pdf());
    let cancel = CancelToken::new();

    let normal = r
        .get_annotation_picture(1, 1.0, None, PointerState::Idle, &cancel)
        .unwrap();

    let active_id = r
        .get_active_annotation(1, Point::new(110.0, 80.0))
        .unwrap()
        .id;

    let pressed = r
        .get_annotation_picture(1, 1.0, active_id, PointerState::Pressed, &cancel)
        .unwrap();

    // Both record one mark per root annotation.
    assert_eq!(normal.0.len(), 2);
    assert_eq!(pressed.0.len(), 2);

    // The pressed appearance differs from the idle one.
    assert_ne!(normal.0, pressed.0);
}
