//! Document-level robustness tests: malformed cross-reference data and
//! structurally broken files must surface a typed [`PdfError`], never panic.

use pdf_core::{Document, PdfError};

#[test]
fn invalid_xref_entry_type_byte_is_reported() {
    let mut pdf = b"%PDF-1.4\n".to_vec();
    let obj_offset = pdf.len();
    pdf.extend_from_slice(b"1 0 obj\n<< /Type /Catalog >>\nendobj\n");
    let xref_offset = pdf.len();
    pdf.extend_from_slice(b"xref\n0 2\n");
    pdf.extend_from_slice(b"0000000000 65535 f \n");
    pdf.extend_from_slice(format!("{obj_offset:010} 00000 x \n").as_bytes());
    pdf.extend_from_slice(b"trailer\n<< /Size 2 /Root 1 0 R >>\n");
    pdf.extend_from_slice(b"startxref\n");
    pdf.extend_from_slice(format!("{xref_offset}\n").as_bytes());
    pdf.extend_from_slice(b"%%EOF\n");

    let err = Document::open(pdf).unwrap_err();
    assert!(matches!(err, PdfError::InvalidXRef { .. }));
}

#[test]
fn missing_startxref_is_reported() {
    let pdf = b"%PDF-1.4\n\
1 0 obj\n<< /Type /Catalog >>\nendobj\n\
xref\n0 1\n0000000000 65535 f \n\
trailer\n<< /Size 1 /Root 1 0 R >>\n%%EOF"
        .to_vec();

    let err = Document::open(pdf).unwrap_err();
    assert!(matches!(err, PdfError::InvalidXRef { .. }));
}

#[test]
fn xref_offset_past_end_of_file_is_reported() {
    let pdf = b"%PDF-1.4\n\
1 0 obj\n<< /Type /Catalog >>\nendobj\n\
startxref\n999999\n%%EOF"
        .to_vec();

    let err = Document::open(pdf).unwrap_err();
    assert!(!err.to_string().is_empty());
}

#[test]
fn missing_header_is_not_a_pdf() {
    let err = Document::open(b"just some bytes, no header at all".to_vec()).unwrap_err();
    assert!(matches!(err, PdfError::NotAPdf));
}

#[test]
fn object_mismatch_between_xref_and_body_is_reported() {
    // xref claims object 1 lives at an offset that actually holds object 2.
    let mut pdf = b"%PDF-1.4\n".to_vec();
    let obj_offset = pdf.len();
    pdf.extend_from_slice(b"2 0 obj\n<< /Type /Catalog >>\nendobj\n");
    let xref_offset = pdf.len();
    pdf.extend_from_slice(b"xref\n0 2\n");
    pdf.extend_from_slice(b"0000000000 65535 f \n");
    pdf.extend_from_slice(format!("{obj_offset:010} 00000 n \n").as_bytes());
    pdf.extend_from_slice(b"trailer\n<< /Size 2 /Root 1 0 R >>\n");
    pdf.extend_from_slice(b"startxref\n");
    pdf.extend_from_slice(format!("{xref_offset}\n").as_bytes());
    pdf.extend_from_slice(b"%%EOF\n");

    let err = Document::open(pdf).unwrap_err();
    assert!(matches!(err, PdfError::ObjectMismatch { .. }));
}

#[test]
fn truncated_stream_length_does_not_panic() {
    let mut pdf = b"%PDF-1.4\n".to_vec();
    let obj_offset = pdf.len();
    pdf.extend_from_slice(b"1 0 obj\n<< /Length 999 >>\nstream\nshort\nendstream\nendobj\n");
    let xref_offset = pdf.len();
    pdf.extend_from_slice(b"xref\n0 2\n");
    pdf.extend_from_slice(b"0000000000 65535 f \n");
    pdf.extend_from_slice(format!("{obj_offset:010} 00000 n \n").as_bytes());
    pdf.extend_from_slice(b"trailer\n<< /Size 2 /Root 1 0 R >>\n");
    pdf.extend_from_slice(b"startxref\n");
    pdf.extend_from_slice(format!("{xref_offset}\n").as_bytes());
    pdf.extend_from_slice(b"%%EOF\n");

    // Must return a typed error, not panic.
    let _ = Document::open(pdf);
}

#[test]
fn lenient_open_skips_broken_object_instead_of_failing() {
    use pdf_core::OpenOptions;

    let mut pdf = b"%PDF-1.4\n".to_vec();
    pdf.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
    let broken_offset = pdf.len();
    pdf.extend_from_slice(b"2 0 obj\n<< /Length 999 >>\nstream\nXX\nendstream\nendobj\n");
    let xref_offset = pdf.len();
    pdf.extend_from_slice(b"xref\n0 3\n");
    pdf.extend_from_slice(b"0000000000 65535 f \n");
    pdf.extend_from_slice(b"0000000009 00000 n \n");
    pdf.extend_from_slice(format!("{broken_offset:010} 00000 n \n").as_bytes());
    pdf.extend_from_slice(b"trailer\n<< /Size 3 /Root 1 0 R >>\n");
    pdf.extend_from_slice(b"startxref\n");
    pdf.extend_from_slice(format!("{xref_offset}\n").as_bytes());
    pdf.extend_from_slice(b"%%EOF\n");

    let options = OpenOptions {
        strict: false,
        ..OpenOptions::default()
    };
    let doc = Document::open_with_options(pdf, options).unwrap();
    assert!(doc.get_catalog(-1).is_ok());
    assert!(doc.get_obj(2, 0).is_err());
}
