//! Opening a document straight from a file path, exercising the on-disk
//! entry point rather than the in-memory `Document::open`.

use pdf_core::{Document, OpenOptions};
use std::io::Write;

fn minimal_pdf() -> Vec<u8> {
    let mut pdf = b"%PDF-1.7\n".to_vec();
    let obj_offset = pdf.len();
    pdf.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
    let pages_offset = pdf.len();
    pdf.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Kids [] /Count 0 >>\nendobj\n");
    let xref_offset = pdf.len();
    pdf.extend_from_slice(b"xref\n0 3\n");
    pdf.extend_from_slice(b"0000000000 65535 f \n");
    pdf.extend_from_slice(format!("{obj_offset:010} 00000 n \n").as_bytes());
    pdf.extend_from_slice(format!("{pages_offset:010} 00000 n \n").as_bytes());
    pdf.extend_from_slice(b"trailer\n<< /Size 3 /Root 1 0 R >>\n");
    pdf.extend_from_slice(b"startxref\n");
    pdf.extend_from_slice(format!("{xref_offset}\n").as_bytes());
    pdf.extend_from_slice(b"%%EOF\n");
    pdf
}

#[test]
fn opens_a_real_file_on_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&minimal_pdf()).unwrap();
    file.flush().unwrap();

    let doc = Document::from_path(file.path(), OpenOptions::default()).unwrap();
    assert_eq!(doc.version(), (1, 7));
    assert!(doc.get_catalog(-1).is_ok());
}
