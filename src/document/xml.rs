//! Shared helpers for the ZIP + XML office formats

use super::DocumentFormat;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesRef, BytesText};
use std::io::{Cursor, Read};
use zip::ZipArchive;

pub(crate) const ODT_MIMETYPE: &str = "application/vnd.oasis.opendocument.text";

/// Tell ODT and DOCX apart by their entries
pub(crate) fn detect_container(bytes: &[u8]) -> Option<DocumentFormat> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).ok()?;

    if let Ok(mut entry) = archive.by_name("mimetype") {
        let mut mimetype = String::new();
        if entry.read_to_string(&mut mimetype).is_ok() && mimetype.trim() == ODT_MIMETYPE {
            return Some(DocumentFormat::Odt);
        }
    }
    if archive.by_name("word/document.xml").is_ok() {
        return Some(DocumentFormat::Docx);
    }
    None
}

/// Read one entry of a ZIP container as text
///
/// A damaged entry still returns what could be inflated, with a warning.
pub(crate) fn read_entry(
    bytes: &[u8],
    name: &str,
    warnings: &mut Vec<String>,
) -> Result<String, String> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| format!("not a valid ZIP container: {}", e))?;
    let mut entry = archive
        .by_name(name)
        .map_err(|e| format!("missing {}: {}", name, e))?;

    let mut data = Vec::new();
    if let Err(e) = entry.read_to_end(&mut data) {
        warnings.push(format!("{} is damaged ({}), using the first {} bytes", name, e, data.len()));
    }
    Ok(String::from_utf8_lossy(&data).into_owned())
}

/// Text of a character data event
pub(crate) fn text_of(text: &BytesText<'_>) -> String {
    match text.decode() {
        Ok(s) => s.into_owned(),
        Err(_) => String::from_utf8_lossy(text).into_owned(),
    }
}

/// Character or predefined entity reference (`&#233;`, `&amp;`)
pub(crate) fn resolve_reference(reference: &BytesRef<'_>) -> Option<String> {
    if let Ok(Some(c)) = reference.resolve_char_ref() {
        return Some(c.to_string());
    }
    let name = reference.decode().ok()?;
    resolve_predefined_entity(&name).map(str::to_string)
}

/// Collects text into paragraphs as paragraph elements open and close
///
/// Paragraphs nested inside paragraphs (notes, frames) are folded into the
/// outer one.
#[derive(Debug, Default)]
pub(crate) struct ParagraphCollector {
    paragraphs: Vec<String>,
    current: String,
    depth: usize,
}

impl ParagraphCollector {
    pub fn open(&mut self) {
        self.depth += 1;
    }

    pub fn close(&mut self) {
        if self.depth == 0 {
            return;
        }
        self.depth -= 1;
        if self.depth == 0 {
            self.flush();
        }
    }

    pub fn in_paragraph(&self) -> bool {
        self.depth > 0
    }

    pub fn push_str(&mut self, text: &str) {
        if self.in_paragraph() {
            self.current.push_str(text);
        }
    }

    pub fn push_char(&mut self, c: char) {
        if self.in_paragraph() {
            self.current.push(c);
        }
    }

    fn flush(&mut self) {
        let text = self.current.trim();
        if !text.is_empty() {
            self.paragraphs.push(text.to_string());
        }
        self.current.clear();
    }

    /// Paragraphs so far, including one left open by truncated input
    pub fn finish(mut self) -> Vec<String> {
        self.flush();
        self.paragraphs
    }
}
