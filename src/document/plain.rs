//! Plain text input

use super::{split_paragraphs, Extracted, PlainTextExtractor};

/// UTF-8 text, paragraphs separated by blank lines
///
/// Invalid byte sequences are replaced rather than rejected.
pub struct TextAdapter;

impl PlainTextExtractor for TextAdapter {
    fn extract(&self, bytes: &[u8]) -> Result<Extracted, String> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        let mut warnings = Vec::new();

        let text = match std::str::from_utf8(bytes) {
            Ok(text) => text.to_string(),
            Err(e) => {
                warnings.push(format!("invalid UTF-8 at byte {}, replaced", e.valid_up_to()));
                String::from_utf8_lossy(bytes).into_owned()
            }
        };

        Ok(Extracted {
            paragraphs: split_paragraphs(&text),
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bom_and_invalid_bytes() {
        let out = TextAdapter.extract(b"\xEF\xBB\xBFHola\xFF mundo.\n\nAdi\xC3\xB3s.").unwrap();
        assert_eq!(out.paragraphs, vec!["Hola\u{FFFD} mundo.", "Adiós."]);
        assert_eq!(out.warnings.len(), 1);
    }
}
