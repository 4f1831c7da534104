//! Document extraction tests
//!
//! Builds small PDF, DOCX and ODT files on the fly and checks that text
//! comes out in order, that damage is tolerated and that unreadable input
//! is reported with the right error

#![cfg(all(feature = "pdf", feature = "office"))]

use docvox::document::odt::write_odt;
use docvox::document::{extract, extract_path, Document, DocumentFormat};
use docvox::pipeline::prepare_text;
use docvox::text::TextUnit;
use docvox::{DocvoxError, Stage};
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;

/// Assemble a one-page PDF with correct xref offsets
fn build_pdf(content: &str, image: Option<&[u8]>) -> Vec<u8> {
    let mut objects: Vec<Vec<u8>> = Vec::new();
    let xobject = if image.is_some() { " /XObject << /Im1 6 0 R >>" } else { "" };

    objects.push(b"<< /Type /Catalog /Pages 2 0 R >>".to_vec());
    objects.push(b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_vec());
    objects.push(
        format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 4 0 R >>{} >> /Contents 5 0 R >>",
            xobject
        )
        .into_bytes(),
    );
    objects.push(
        b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>".to_vec(),
    );

    let mut stream = format!("<< /Length {} >>\nstream\n", content.len()).into_bytes();
    stream.extend_from_slice(content.as_bytes());
    stream.extend_from_slice(b"\nendstream");
    objects.push(stream);

    if let Some(data) = image {
        let mut stream = format!(
            "<< /Type /XObject /Subtype /Image /Width 16 /Height 16 /ColorSpace /DeviceRGB \
             /BitsPerComponent 8 /Filter /DCTDecode /Length {} >>\nstream\n",
            data.len()
        )
        .into_bytes();
        stream.extend_from_slice(data);
        stream.extend_from_slice(b"\nendstream");
        objects.push(stream);
    }

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::new();
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n", i + 1).as_bytes());
        pdf.extend_from_slice(body);
        pdf.extend_from_slice(b"\nendobj\n");
    }

    let xref = pdf.len();
    pdf.extend_from_slice(format!("xref\n0 {}\n", objects.len() + 1).as_bytes());
    pdf.extend_from_slice(b"0000000000 65535 f \n");
    for offset in offsets {
        pdf.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref
        )
        .as_bytes(),
    );
    pdf
}

const THREE_PARAGRAPHS: &str = "BT /F1 12 Tf 72 720 Td (The river runs north.) Tj ET\n\
     BT /F1 12 Tf 72 420 Td (Mountains rise in the east.) Tj ET\n\
     BT /F1 12 Tf 72 120 Td (The sea lies to the west.) Tj ET\n\
     q 100 0 0 100 300 300 cm /Im1 Do Q";

fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    for (name, data) in entries {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(data).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

fn docx(body: &str) -> Vec<u8> {
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    );
    build_zip(&[
        ("[Content_Types].xml", &br#"<?xml version="1.0"?><Types/>"#[..]),
        ("word/document.xml", document.as_bytes()),
    ])
}

fn write(dir: &Path, name: &str, bytes: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn test_pdf_with_corrupted_image_yields_three_segments() {
    let dir = tempfile::tempdir().unwrap();
    let garbage_jpeg = b"\xFF\xD8\xFF\xE0\x00\x10JFIF broken \x00\x01\x02\x03 not an image";
    let path = write(dir.path(), "report.pdf", &build_pdf(THREE_PARAGRAPHS, Some(garbage_jpeg)));

    let unit = prepare_text(&path, None).expect("text should survive a broken image");
    let texts: Vec<&str> = unit.segments().iter().map(|s| s.text.as_str()).collect();
    assert_eq!(
        texts,
        vec![
            "The river runs north.",
            "Mountains rise in the east.",
            "The sea lies to the west."
        ]
    );
}

#[test]
fn test_pdf_without_text_is_extraction_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "scan.pdf", &build_pdf("q 1 0 0 1 0 0 cm Q", None));

    let err = extract_path(&path).unwrap_err();
    assert!(matches!(err, DocvoxError::Extraction { .. }));
    assert_eq!(err.stage(), Stage::Extraction);
}

#[test]
fn test_docx_paragraphs_in_order() {
    let bytes = docx(
        "<w:p><w:r><w:t>Primer párrafo.</w:t></w:r></w:p>\
         <w:p><w:r><w:t>Segundo </w:t></w:r><w:r><w:t>párrafo.</w:t></w:r></w:p>\
         <w:p><w:r><w:t>Tercero.</w:t></w:r></w:p>",
    );
    // Detected by content even with a misleading name
    let doc = Document::from_bytes(Path::new("upload.bin"), bytes).unwrap();
    assert_eq!(doc.format, DocumentFormat::Docx);

    let unit = extract(doc).unwrap();
    assert_eq!(unit.paragraphs(), vec!["Primer párrafo.", "Segundo párrafo.", "Tercero."]);
}

#[test]
fn test_truncated_docx_keeps_recoverable_text() {
    let full = r#"<?xml version="1.0"?><w:document xmlns:w="w"><w:body><w:p><w:r><w:t>Survives intact.</w:t></w:r></w:p><w:p><w:r><w:t>Partly there"#;
    let bytes = build_zip(&[("word/document.xml", full.as_bytes())]);
    let doc = Document::from_bytes(Path::new("cut.docx"), bytes).unwrap();

    let unit = extract(doc).unwrap();
    assert_eq!(unit.get(0).unwrap().text, "Survives intact.");
    assert!(unit.len() >= 1);
}

#[test]
fn test_odt_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("edition.odt");

    let mut unit = TextUnit::new();
    unit.push(0, "Capítulo uno.");
    unit.push(1, "Había una vez un río.");
    unit.push(1, "Corría hacia el mar.");
    write_odt(&unit, &path).unwrap();

    let doc = Document::open(&path).unwrap();
    assert_eq!(doc.format, DocumentFormat::Odt);
    let extracted = extract(doc).unwrap();
    assert_eq!(extracted.paragraphs(), unit.paragraphs());

    // Re-normalizing the saved edition gives the same segments back
    let again = prepare_text(&path, None).unwrap();
    assert_eq!(again, unit);
}

#[test]
fn test_plain_text_input() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "notes.txt",
        "Hola. ¿Cómo estás?\n\nBien, gracias.".as_bytes(),
    );
    let unit = prepare_text(&path, None).unwrap();
    assert_eq!(unit.len(), 3);
    assert_eq!(unit.get(2).unwrap().paragraph, 1);
}

#[test]
fn test_unsupported_formats() {
    let err = Document::from_bytes(Path::new("notes.rtf"), b"{\\rtf1 hello}".to_vec()).unwrap_err();
    assert!(matches!(err, DocvoxError::UnsupportedFormat(_)));
    assert_eq!(err.stage(), Stage::Extraction);

    // A ZIP that is neither DOCX nor ODT
    let bytes = build_zip(&[("readme.md", &b"# hi"[..])]);
    let err = Document::from_bytes(Path::new("bundle.zip"), bytes).unwrap_err();
    assert!(matches!(err, DocvoxError::UnsupportedFormat(_)));
}

#[test]
fn test_docx_name_on_broken_zip() {
    let doc = Document::from_bytes(Path::new("broken.docx"), b"PK\x03\x04 truncated".to_vec()).unwrap();
    assert_eq!(doc.format, DocumentFormat::Docx);
    assert!(matches!(extract(doc), Err(DocvoxError::Extraction { .. })));
}
