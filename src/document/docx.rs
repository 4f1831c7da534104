//! DOCX adapter
//!
//! Reads `word/document.xml`. Paragraphs are `w:p` elements and only the
//! contents of `w:t` runs count as text; tabs and breaks become spaces.

use super::xml::{read_entry, resolve_reference, text_of, ParagraphCollector};
use super::{Extracted, PlainTextExtractor};
use quick_xml::events::Event;
use quick_xml::Reader;

pub struct DocxAdapter;

impl PlainTextExtractor for DocxAdapter {
    fn extract(&self, bytes: &[u8]) -> Result<Extracted, String> {
        let mut warnings = Vec::new();
        let xml = read_entry(bytes, "word/document.xml", &mut warnings)?;
        let paragraphs = parse_body(&xml, &mut warnings);
        Ok(Extracted {
            paragraphs,
            warnings,
        })
    }
}

fn parse_body(xml: &str, warnings: &mut Vec<String>) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    let mut collector = ParagraphCollector::default();
    let mut in_run_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"p" => collector.open(),
                b"t" => in_run_text = true,
                b"tab" | b"br" | b"cr" => collector.push_char(' '),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" | b"br" | b"cr" => collector.push_char(' '),
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"p" => collector.close(),
                b"t" => in_run_text = false,
                _ => {}
            },
            Ok(Event::Text(t)) if in_run_text => collector.push_str(&text_of(&t)),
            Ok(Event::GeneralRef(r)) if in_run_text => {
                if let Some(s) = resolve_reference(&r) {
                    collector.push_str(&s);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                warnings.push(format!(
                    "document.xml is malformed near byte {}: {}",
                    reader.buffer_position(),
                    e
                ));
                break;
            }
            _ => {}
        }
    }

    collector.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main""#;

    #[test]
    fn test_runs_and_entities() {
        let xml = format!(
            r#"<w:document {NS}><w:body>
                <w:p><w:pPr><w:tabs><w:tab w:val="left"/></w:tabs></w:pPr>
                  <w:r><w:t>Caf&#233; </w:t></w:r><w:r><w:t xml:space="preserve">&amp; t&#xE9;</w:t></w:r></w:p>
                <w:p><w:r><w:t>Line</w:t><w:br/><w:t>two</w:t></w:r></w:p>
                <w:p/>
              </w:body></w:document>"#
        );
        let mut warnings = Vec::new();
        let paragraphs = parse_body(&xml, &mut warnings);
        assert!(warnings.is_empty());
        assert_eq!(paragraphs.len(), 2);
        assert_eq!(paragraphs[0].split_whitespace().collect::<Vec<_>>(), vec!["Café", "&", "té"]);
        assert_eq!(paragraphs[1].split_whitespace().collect::<Vec<_>>(), vec!["Line", "two"]);
    }

    #[test]
    fn test_truncated_xml_keeps_text() {
        let xml = format!(
            r#"<w:document {NS}><w:body><w:p><w:r><w:t>First.</w:t></w:r></w:p><w:p><w:r><w:t>Second is cut"#
        );
        let mut warnings = Vec::new();
        let paragraphs = parse_body(&xml, &mut warnings);
        assert_eq!(paragraphs[0], "First.");
        assert_eq!(paragraphs.len(), 2);
        assert!(paragraphs[1].starts_with("Second"));
    }

    #[test]
    fn test_mismatched_tags_keep_earlier_paragraphs() {
        let xml = format!(
            r#"<w:document {NS}><w:body><w:p><w:r><w:t>Kept.</w:t></w:r></w:p><w:p><w:r></w:p></w:x></w:body></w:document>"#
        );
        let mut warnings = Vec::new();
        let paragraphs = parse_body(&xml, &mut warnings);
        assert_eq!(paragraphs, vec!["Kept."]);
        assert_eq!(warnings.len(), 1);
    }
}
