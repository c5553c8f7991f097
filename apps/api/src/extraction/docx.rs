//! Raw text from `.docx` containers: the main document part is walked with
//! quick-xml and only run text, tabs, breaks and paragraph ends are kept.

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::ZipArchive;

use super::ExtractionError;

const DOCUMENT_PART: &str = "word/document.xml";

pub(super) fn extract_raw_text(bytes: &[u8]) -> Result<String, ExtractionError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| ExtractionError::Docx(format!("not a valid .docx container: {e}")))?;

    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_PART)
        .map_err(|e| ExtractionError::Docx(format!("missing {DOCUMENT_PART}: {e}")))?
        .read_to_string(&mut xml)
        .map_err(|e| ExtractionError::Docx(format!("failed to read {DOCUMENT_PART}: {e}")))?;

    document_xml_to_text(&xml)
}

fn document_xml_to_text(xml: &str) -> Result<String, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    let mut text = String::new();
    // tab stops in w:pPr/w:tabs are also named w:tab; only run children are content
    let mut in_run = false;
    let mut in_run_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"w:r" => in_run = true,
                b"w:t" => in_run_text = true,
                _ => {}
            },
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:r" => in_run = false,
                b"w:t" => in_run_text = false,
                b"w:p" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) if in_run => match e.name().as_ref() {
                b"w:tab" => text.push('\t'),
                b"w:br" | b"w:cr" => text.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_run_text => {
                let unescaped = t
                    .unescape()
                    .map_err(|e| ExtractionError::Docx(format!("bad text run: {e}")))?;
                text.push_str(&unescaped);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ExtractionError::Docx(format!(
                    "malformed {DOCUMENT_PART} at byte {}: {e}",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
    }

    Ok(text.trim_end().to_string())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use zip::write::SimpleFileOptions;

    use super::*;

    fn build_docx(document_xml: &str) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file(DOCUMENT_PART, SimpleFileOptions::default())
            .unwrap();
        writer.write_all(document_xml.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:r><w:rPr><w:b/></w:rPr><w:t>John Doe</w:t></w:r></w:p>
    <w:p>
      <w:r><w:t xml:space="preserve">Software </w:t></w:r>
      <w:r><w:t>Engineer</w:t></w:r>
      <w:r><w:tab/><w:t>R&amp;D</w:t></w:r>
    </w:p>
    <w:p><w:r><w:t>Line one</w:t><w:br/><w:t>Line two</w:t></w:r></w:p>
  </w:body>
</w:document>"#;

    #[test]
    fn test_extracts_runs_and_paragraphs() {
        let text = extract_raw_text(&build_docx(SAMPLE)).unwrap();
        assert_eq!(text, "John Doe\nSoftware Engineer\tR&D\nLine one\nLine two");
    }

    #[test]
    fn test_tab_stop_definitions_are_not_text() {
        let xml = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>
<w:p><w:pPr><w:tabs><w:tab w:val="right" w:pos="9360"/></w:tabs></w:pPr><w:r><w:t>Engineer</w:t></w:r></w:p>
<w:p><w:pPr><w:tabs><w:tab w:val="right" w:pos="9360"/></w:tabs></w:pPr><w:r><w:t>Acme</w:t><w:tab/><w:t>2020</w:t></w:r></w:p>
</w:body></w:document>"#;
        assert_eq!(document_xml_to_text(xml).unwrap(), "Engineer\nAcme\t2020");
    }

    #[test]
    fn test_styling_is_discarded() {
        let text = extract_raw_text(&build_docx(SAMPLE)).unwrap();
        assert!(!text.contains("rPr"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn test_missing_document_part_is_an_error() {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("word/styles.xml", SimpleFileOptions::default())
            .unwrap();
        writer.write_all(b"<w:styles/>").unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        let err = extract_raw_text(&bytes).unwrap_err();
        assert!(matches!(err, ExtractionError::Docx(msg) if msg.contains(DOCUMENT_PART)));
    }

    #[test]
    fn test_malformed_xml_is_an_error() {
        let bytes = build_docx("<w:document><w:body><w:p></w:body>");
        assert!(extract_raw_text(&bytes).is_err());
    }
}
