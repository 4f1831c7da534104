//! ODT adapter and writer
//!
//! Reading walks `content.xml`: headings (`text:h`) and paragraphs
//! (`text:p`) become paragraphs, `text:s` expands to its space count and
//! tabs and line breaks become spaces. Footnote bodies are read in place;
//! their citation marks and office comments are skipped.
//!
//! [`write_odt`] produces the smallest package LibreOffice accepts: the
//! uncompressed `mimetype` entry first, a manifest, and `content.xml`.

use super::xml::{read_entry, resolve_reference, text_of, ParagraphCollector, ODT_MIMETYPE};
use super::{Extracted, PlainTextExtractor};
use crate::text::TextUnit;
use crate::{DocvoxError, Result};
use log::info;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::{Seek, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

pub struct OdtAdapter;

impl PlainTextExtractor for OdtAdapter {
    fn extract(&self, bytes: &[u8]) -> std::result::Result<Extracted, String> {
        let mut warnings = Vec::new();
        let xml = read_entry(bytes, "content.xml", &mut warnings)?;
        let paragraphs = parse_content(&xml, &mut warnings);
        Ok(Extracted {
            paragraphs,
            warnings,
        })
    }
}

/// Space count of a `text:s` element (defaults to one)
fn space_count(e: &BytesStart<'_>) -> usize {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == b"c")
        .and_then(|a| std::str::from_utf8(&a.value).ok()?.trim().parse().ok())
        .unwrap_or(1)
}

/// Comments (author, date and body) and footnote reference marks
fn is_silent(local_name: &[u8]) -> bool {
    matches!(local_name, b"annotation" | b"note-citation")
}

fn parse_content(xml: &str, warnings: &mut Vec<String>) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    let mut collector = ParagraphCollector::default();
    // Depth inside an element whose text is not read aloud
    let mut skip = 0usize;

    loop {
        match reader.read_event() {
            Ok(Event::Start(_)) if skip > 0 => skip += 1,
            Ok(Event::End(_)) if skip > 0 => skip -= 1,
            Ok(Event::Eof) => break,
            Ok(_) if skip > 0 => {}
            Ok(Event::Start(e)) if is_silent(e.local_name().as_ref()) => skip = 1,
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"p" | b"h" => collector.open(),
                b"s" => collector.push_str(&" ".repeat(space_count(&e))),
                b"tab" | b"line-break" => collector.push_char(' '),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"s" => collector.push_str(&" ".repeat(space_count(&e))),
                b"tab" | b"line-break" => collector.push_char(' '),
                _ => {}
            },
            Ok(Event::End(e)) => {
                if matches!(e.local_name().as_ref(), b"p" | b"h") {
                    collector.close();
                }
            }
            Ok(Event::Text(t)) => collector.push_str(&text_of(&t)),
            Ok(Event::GeneralRef(r)) => {
                if let Some(s) = resolve_reference(&r) {
                    collector.push_str(&s);
                }
            }
            Err(e) => {
                warnings.push(format!(
                    "content.xml is malformed near byte {}: {}",
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

const MANIFEST: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<manifest:manifest xmlns:manifest="urn:oasis:names:tc:opendocument:xmlns:manifest:1.0" manifest:version="1.2">
 <manifest:file-entry manifest:full-path="/" manifest:version="1.2" manifest:media-type="application/vnd.oasis.opendocument.text"/>
 <manifest:file-entry manifest:full-path="content.xml" manifest:media-type="text/xml"/>
</manifest:manifest>
"#;

fn content_xml(unit: &TextUnit) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<office:document-content xmlns:office="urn:oasis:names:tc:opendocument:xmlns:office:1.0" xmlns:text="urn:oasis:names:tc:opendocument:xmlns:text:1.0" office:version="1.2">
<office:body>
<office:text>
"#,
    );
    for paragraph in unit.paragraphs() {
        xml.push_str("<text:p>");
        xml.push_str(&escape(paragraph.as_str()));
        xml.push_str("</text:p>\n");
    }
    xml.push_str("</office:text>\n</office:body>\n</office:document-content>\n");
    xml
}

fn write_package<W: Write + Seek>(out: W, unit: &TextUnit) -> zip::result::ZipResult<W> {
    let mut zip = ZipWriter::new(out);

    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    zip.start_file("mimetype", stored)?;
    zip.write_all(ODT_MIMETYPE.as_bytes())?;

    let deflated = || SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file("META-INF/manifest.xml", deflated())?;
    zip.write_all(MANIFEST.as_bytes())?;

    zip.start_file("content.xml", deflated())?;
    zip.write_all(content_xml(unit).as_bytes())?;

    zip.finish()
}

/// Save a text unit as an ODT document, one `text:p` per paragraph
///
/// The file is written beside `path` and renamed into place.
pub fn write_odt(unit: &TextUnit, path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let temp = tempfile::Builder::new()
        .prefix(".docvox-")
        .suffix(".odt")
        .tempfile_in(dir)?;

    let (file, temp_path) = temp.into_parts();
    let file = write_package(file, unit)
        .map_err(|e| DocvoxError::Other(format!("failed to write ODT package: {}", e)))?;
    file.sync_all()?;
    drop(file);

    temp_path
        .persist(path)
        .map_err(|e| DocvoxError::Io(e.error))?;

    info!("Saved {} paragraphs to {:?}", unit.paragraphs().len(), path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spaces_headings_and_notes() {
        let xml = r#"<office:document-content xmlns:office="o" xmlns:text="t"><office:body><office:text>
            <text:h text:outline-level="1">Cap&#237;tulo 1</text:h>
            <text:p>Uno<text:s text:c="3"/>dos<text:tab/>tres<text:line-break/>cuatro</text:p>
            <text:p>Texto<text:note><text:note-body><text:p> con nota</text:p></text:note-body></text:note>.</text:p>
            </office:text></office:body></office:document-content>"#;
        let mut warnings = Vec::new();
        let paragraphs = parse_content(xml, &mut warnings);
        assert!(warnings.is_empty());
        assert_eq!(
            paragraphs,
            vec!["Capítulo 1", "Uno   dos tres cuatro", "Texto con nota."]
        );
    }

    #[test]
    fn test_skips_citations_and_comments() {
        let xml = r#"<office:document-content xmlns:office="o" xmlns:text="t" xmlns:dc="d"><office:body><office:text>
            <text:p>Texto<text:note text:id="ftn1" text:note-class="footnote"><text:note-citation>1</text:note-citation><text:note-body><text:p> con nota</text:p></text:note-body></text:note>.</text:p>
            <text:p>Antes<office:annotation office:name="c1"><dc:creator>Ana</dc:creator><dc:date>2024-03-01T10:00:00</dc:date><text:p>Revisar esto</text:p></office:annotation> y después.<office:annotation-end office:name="c1"/></text:p>
            <text:p>Final.</text:p>
            </office:text></office:body></office:document-content>"#;
        let mut warnings = Vec::new();
        let paragraphs = parse_content(xml, &mut warnings);
        assert!(warnings.is_empty());
        assert_eq!(paragraphs, vec!["Texto con nota.", "Antes y después.", "Final."]);
    }

    #[test]
    fn test_content_xml_escapes() {
        let unit = TextUnit::from_paragraphs(["Fish & <chips>"]);
        let xml = content_xml(&unit);
        assert!(xml.contains("<text:p>Fish &amp; &lt;chips&gt;</text:p>"));
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edition.odt");
        let mut unit = TextUnit::new();
        unit.push(0, "Primera frase.");
        unit.push(0, "Segunda & última.");
        unit.push(1, "Otro párrafo.");

        write_odt(&unit, &path).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[30..38], b"mimetype");
        let out = OdtAdapter.extract(&bytes).unwrap();
        assert_eq!(out.paragraphs, unit.paragraphs());
    }
}
