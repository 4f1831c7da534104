//! Document extraction
//!
//! A [`Document`] is read once from disk and handed to the adapter for its
//! format, which returns the paragraphs it could recover. Adapters are
//! lenient: a damaged file yields whatever text survives, with warnings,
//! and only a document with no text at all is an error.
//!
//! Format backends sit behind cargo features (`pdf`, `office`); a disabled
//! backend reports `UnsupportedFormat` rather than failing at link time.

#[cfg(feature = "office")]
pub mod docx;
#[cfg(feature = "office")]
pub mod odt;
#[cfg(feature = "pdf")]
pub mod pdf;
pub mod plain;
#[cfg(feature = "office")]
mod xml;

use crate::text::TextUnit;
use crate::{DocvoxError, Result};
use log::{debug, info, warn};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Input formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Odt,
    Text,
}

impl DocumentFormat {
    /// Detect format from file extension. Returns None for unsupported formats.
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "odt" => Some(Self::Odt),
            "txt" | "text" => Some(Self::Text),
            _ => None,
        }
    }

    /// Detect format from the leading bytes
    ///
    /// ZIP containers are told apart by their entries, which needs the
    /// `office` feature.
    pub fn from_signature(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"%PDF-") {
            return Some(Self::Pdf);
        }
        if bytes.starts_with(b"PK\x03\x04") {
            return zip_format(bytes);
        }
        None
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Odt => "odt",
            Self::Text => "txt",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(feature = "office")]
fn zip_format(bytes: &[u8]) -> Option<DocumentFormat> {
    xml::detect_container(bytes)
}

#[cfg(not(feature = "office"))]
fn zip_format(_bytes: &[u8]) -> Option<DocumentFormat> {
    None
}

/// A loaded input document
///
/// The bytes are consumed by [`extract`] and not kept afterwards.
#[derive(Debug)]
pub struct Document {
    pub path: PathBuf,
    pub format: DocumentFormat,
    pub bytes: Vec<u8>,
}

impl Document {
    /// Read a document and detect its format
    ///
    /// A recognised signature wins over the extension.
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| DocvoxError::Extraction {
            path: path.to_path_buf(),
            reason: format!("cannot read the file: {}", e),
        })?;
        Self::from_bytes(path, bytes)
    }

    pub fn from_bytes(path: &Path, bytes: Vec<u8>) -> Result<Self> {
        let format = DocumentFormat::from_signature(&bytes)
            .or_else(|| DocumentFormat::from_extension(path))
            .ok_or_else(|| {
                DocvoxError::UnsupportedFormat(format!(
                    "{:?} is not a PDF, DOCX, ODT or text file",
                    path
                ))
            })?;

        debug!("Detected {:?} as {}", path, format);
        Ok(Self {
            path: path.to_path_buf(),
            format,
            bytes,
        })
    }
}

/// Text recovered from a document
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Extracted {
    /// Paragraphs in document order
    pub paragraphs: Vec<String>,

    /// Problems that were worked around
    pub warnings: Vec<String>,
}

/// Capability shared by every format adapter
pub trait PlainTextExtractor {
    /// Recover paragraphs from the raw bytes
    ///
    /// Errors only when the input cannot be read at all.
    fn extract(&self, bytes: &[u8]) -> std::result::Result<Extracted, String>;
}

/// Adapter for a format, if its backend is compiled in
pub fn adapter_for(format: DocumentFormat) -> Result<Box<dyn PlainTextExtractor>> {
    match format {
        DocumentFormat::Text => Ok(Box::new(plain::TextAdapter)),
        #[cfg(feature = "pdf")]
        DocumentFormat::Pdf => Ok(Box::new(pdf::PdfAdapter)),
        #[cfg(feature = "office")]
        DocumentFormat::Docx => Ok(Box::new(docx::DocxAdapter)),
        #[cfg(feature = "office")]
        DocumentFormat::Odt => Ok(Box::new(odt::OdtAdapter)),
        #[allow(unreachable_patterns)]
        other => Err(DocvoxError::UnsupportedFormat(format!(
            "{} support was not compiled in",
            other
        ))),
    }
}

/// Extract a document into a paragraph-level [`TextUnit`]
pub fn extract(document: Document) -> Result<TextUnit> {
    let Document {
        path,
        format,
        bytes,
    } = document;

    info!("Extracting text from {:?} ({})", path, format);
    let adapter = adapter_for(format)?;
    let extracted = adapter
        .extract(&bytes)
        .map_err(|reason| DocvoxError::Extraction {
            path: path.clone(),
            reason,
        })?;

    for warning in &extracted.warnings {
        warn!("{:?}: {}", path, warning);
    }

    let paragraphs: Vec<String> = extracted
        .paragraphs
        .iter()
        .map(|p| collapse_whitespace(p))
        .filter(|p| !p.is_empty())
        .collect();

    if paragraphs.is_empty() {
        let reason = match extracted.warnings.first() {
            Some(w) => format!("no text could be recovered ({})", w),
            None => "no text could be recovered".to_string(),
        };
        return Err(DocvoxError::Extraction { path, reason });
    }

    debug!("Extracted {} paragraphs from {:?}", paragraphs.len(), path);
    Ok(TextUnit::from_paragraphs(paragraphs))
}

/// Read and extract a file in one step
pub fn extract_path(path: &Path) -> Result<TextUnit> {
    extract(Document::open(path)?)
}

/// Split text on blank lines
pub(crate) fn split_paragraphs(text: &str) -> Vec<String> {
    let mut paragraphs = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                paragraphs.push(std::mem::take(&mut current));
            }
        } else {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }
    paragraphs
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_extension() {
        assert_eq!(DocumentFormat::from_extension(Path::new("a/b.PDF")), Some(DocumentFormat::Pdf));
        assert_eq!(DocumentFormat::from_extension(Path::new("x.odt")), Some(DocumentFormat::Odt));
        assert_eq!(DocumentFormat::from_extension(Path::new("x.rtf")), None);
    }

    #[test]
    fn test_signature_beats_extension() {
        let doc = Document::from_bytes(Path::new("report.txt"), b"%PDF-1.4\n".to_vec()).unwrap();
        assert_eq!(doc.format, DocumentFormat::Pdf);
    }

    #[test]
    fn test_unknown_format() {
        let err = Document::from_bytes(Path::new("notes.rtf"), b"{\\rtf1}".to_vec()).unwrap_err();
        assert!(matches!(err, DocvoxError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_missing_file_is_extraction_error() {
        let err = extract_path(Path::new("/nonexistent/book.pdf")).unwrap_err();
        assert!(matches!(err, DocvoxError::Extraction { .. }));
        assert_eq!(err.stage(), crate::Stage::Extraction);
    }

    #[test]
    fn test_split_paragraphs() {
        assert_eq!(
            split_paragraphs("one\ntwo\n\n \nthree\n"),
            vec!["one\ntwo".to_string(), "three".to_string()]
        );
    }

    #[test]
    fn test_empty_document_is_extraction_error() {
        let doc = Document::from_bytes(Path::new("blank.txt"), b"  \n\n\t\n".to_vec()).unwrap();
        match extract(doc) {
            Err(DocvoxError::Extraction { path, .. }) => assert_eq!(path, PathBuf::from("blank.txt")),
            other => panic!("expected extraction error, got {:?}", other),
        }
    }
}
