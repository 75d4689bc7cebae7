//! Fixture builders shared by the unit tests.

/// A minimal one-page file with a classic xref table. Offsets are patched
/// in by the builder so the fixture stays readable.
pub(crate) fn minimal_classic_pdf() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");

    let mut offsets = vec![];

    for body in [
        &b"1 0 obj <</Type/Catalog/Pages 2 0 R>> endobj\n"[..],
        &b"2 0 obj <</Type/Pages/Kids [3 0 R]/Count 1>> endobj\n"[..],
        &b"3 0 obj <</Type/Page/Parent 2 0 R/MediaBox [0 0 612 792]/Contents 4 0 R>> endobj\n"[..],
        &b"4 0 obj <</Length 8>> stream\n0 0 m S\n\nendstream endobj\n"[..],
    ] {
        offsets.push(out.len());
        out.extend_from_slice(body);
    }

    finish_classic(out, &offsets, "<</Size 5/Root 1 0 R>>")
}

/// Append a classic xref table, trailer and `startxref` for objects
/// `1..=offsets.len()` at the given byte offsets.
pub(crate) fn finish_classic(mut out: Vec<u8>, offsets: &[usize], trailer: &str) -> Vec<u8> {
    let xref_pos = out.len();
    out.extend_from_slice(
        format!("xref\n0 {}\n0000000000 65535 f \n", offsets.len() + 1).as_bytes(),
    );

    for offset in offsets {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }

    out.extend_from_slice(format!("trailer {trailer}\nstartxref\n{xref_pos}\n%%EOF").as_bytes());

    out
}

/// A document whose object 3 is the given body, for tests that need a
/// single interesting object behind a working index.
pub(crate) fn doc_with_object(body: &str) -> crate::document::Document {
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");

    let bodies = [
        "1 0 obj <</Type/Catalog/Pages 2 0 R>> endobj\n".to_string(),
        "2 0 obj <</Type/Pages/Kids []/Count 0>> endobj\n".to_string(),
        format!("3 0 obj {body} endobj\n"),
    ];

    let mut offsets = vec![];
    for body in &bodies {
        offsets.push(out.len());
        out.extend_from_slice(body.as_bytes());
    }

    let data = finish_classic(out, &offsets, "<</Size 4/Root 1 0 R>>");

    crate::document::Document::open(std::sync::Arc::new(data)).unwrap()
}

/// A two-page document with annotations forming a reply thread on page
/// one, used by the page and annotation tests.
pub(crate) fn annotated_two_page_pdf() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");

    let bodies: Vec<String> = vec![
        "1 0 obj <</Type/Catalog/Pages 2 0 R>> endobj\n".into(),
        "2 0 obj <</Type/Pages/Kids [3 0 R 4 0 R]/Count 2/MediaBox [0 0 612 792]/Rotate 450>> endobj\n"
            .into(),
        "3 0 obj <</Type/Page/Parent 2 0 R/Contents 5 0 R/CropBox [10 10 400 500]/Annots [6 0 R 7 0 R 8 0 R]>> endobj\n"
            .into(),
        "4 0 obj <</Type/Page/Parent 2 0 R/Contents 5 0 R/Rotate -90>> endobj\n".into(),
        "5 0 obj <</Length 8>> stream\n0 0 m S\n\nendstream endobj\n".into(),
        "6 0 obj <</Type/Annot/Subtype/Text/Rect [20 20 40 40]/T (alice)/Contents (root note)>> endobj\n"
            .into(),
        "7 0 obj <</Type/Annot/Subtype/Text/Rect [25 25 45 45]/T (bob)/Contents (first reply)/IRT 6 0 R/RT/R>> endobj\n"
            .into(),
        "8 0 obj <</Type/Annot/Subtype/Text/Rect [30 30 50 50]/T (carol)/Contents (second reply)/IRT 7 0 R/RT/R>> endobj\n"
            .into(),
    ];

    let mut offsets = vec![];

    for body in &bodies {
        offsets.push(out.len());
        out.extend_from_slice(body.as_bytes());
    }

    finish_classic(out, &offsets, "<</Size 9/Root 1 0 R>>")
}
