//! PDF rendering of generated documents.
//!
//! Layout is plain paragraphs: a centered title at the top of the first page,
//! then left-aligned body text wrapped to the text width, flowing onto new
//! pages as needed. Documents use the standard Helvetica font with WinAnsi
//! encoding, so no font files are embedded.
//!
//! Files are written to `<name>.part`, synced, then renamed into place. A
//! reader never observes a partially written document under its final name.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

pub mod font_metrics;

use font_metrics::HELVETICA;

// US Letter, 1" margins.
const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const MARGIN: f32 = 72.0;
const TEXT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;

const TITLE_SIZE: f32 = 18.0;
const BODY_SIZE: f32 = 12.0;
const LINE_SPACING: f32 = 1.2;

const FONT_RESOURCE: &str = "F1";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("I/O error writing document: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF encoding error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Renderer aborted: {0}")]
    Aborted(String),
}

/// A document written to durable storage. Immutable once returned.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedDocument {
    pub file_path: PathBuf,
    pub title: String,
}

impl RenderedDocument {
    pub fn file_name(&self) -> &str {
        self.file_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
    }
}

/// A single line of text positioned on a page, in PDF user space (origin bottom-left).
#[derive(Debug, Clone, PartialEq)]
struct PlacedLine {
    x: f32,
    y: f32,
    size: f32,
    text: String,
}

/// Renders `text` under `title` to a PDF at `output_path`.
///
/// Returns only after the file has been synced and moved to its final name.
pub async fn render_pdf(
    text: &str,
    output_path: &Path,
    title: &str,
) -> Result<RenderedDocument, RenderError> {
    let pages = layout_pages(text, title);
    let path = output_path.to_path_buf();
    let doc_title = title.to_string();

    tokio::task::spawn_blocking(move || -> Result<(), RenderError> {
        let mut doc = build_document(&pages, &doc_title)?;
        write_atomically(&mut doc, &path)
    })
    .await
    .map_err(|e| RenderError::Aborted(e.to_string()))??;

    debug!(path = %output_path.display(), "Rendered document");
    Ok(RenderedDocument {
        file_path: output_path.to_path_buf(),
        title: title.to_string(),
    })
}

/// Flows title and body into pages of positioned lines.
fn layout_pages(text: &str, title: &str) -> Vec<Vec<PlacedLine>> {
    let mut pages: Vec<Vec<PlacedLine>> = vec![Vec::new()];
    let mut cursor = PAGE_HEIGHT - MARGIN;

    let title_leading = TITLE_SIZE * LINE_SPACING;
    for line in HELVETICA.wrap(title, TITLE_SIZE, TEXT_WIDTH) {
        cursor -= title_leading;
        let x = MARGIN + (TEXT_WIDTH - HELVETICA.width_pt(&line, TITLE_SIZE)).max(0.0) / 2.0;
        if let Some(page) = pages.last_mut() {
            page.push(PlacedLine {
                x,
                y: cursor,
                size: TITLE_SIZE,
                text: line,
            });
        }
    }

    let body_leading = BODY_SIZE * LINE_SPACING;
    // one blank body line between title and body
    cursor -= body_leading;

    for paragraph in text.lines() {
        let lines = HELVETICA.wrap(paragraph, BODY_SIZE, TEXT_WIDTH);
        if lines.is_empty() {
            // blank source line: keep the gap, but never at the top of a page
            if cursor < PAGE_HEIGHT - MARGIN {
                cursor -= body_leading;
            }
            continue;
        }
        for line in lines {
            if cursor - body_leading < MARGIN {
                pages.push(Vec::new());
                cursor = PAGE_HEIGHT - MARGIN;
            }
            cursor -= body_leading;
            if let Some(page) = pages.last_mut() {
                page.push(PlacedLine {
                    x: MARGIN,
                    y: cursor,
                    size: BODY_SIZE,
                    text: line,
                });
            }
        }
    }

    pages
}

fn build_document(pages: &[Vec<PlacedLine>], title: &str) -> Result<Document, lopdf::Error> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            FONT_RESOURCE => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for lines in pages {
        let mut operations = Vec::with_capacity(lines.len() * 5);
        for line in lines {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new(
                "Tf",
                vec![FONT_RESOURCE.into(), points(line.size)],
            ));
            operations.push(Operation::new("Td", vec![points(line.x), points(line.y)]));
            operations.push(Operation::new(
                "Tj",
                vec![Object::string_literal(encode_win_ansi(&line.text))],
            ));
            operations.push(Operation::new("ET", vec![]));
        }

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
            "Resources" => resources_id,
            "MediaBox" => vec![points(0.0), points(0.0), points(PAGE_WIDTH), points(PAGE_HEIGHT)],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(encode_win_ansi(title)),
        "Producer" => Object::string_literal(env!("CARGO_PKG_NAME")),
    });
    doc.trailer.set("Info", info_id);

    doc.compress();
    Ok(doc)
}

/// Coordinates are emitted as whole points.
fn points(value: f32) -> Object {
    Object::Integer(value.round() as i64)
}

fn write_atomically(doc: &mut Document, path: &Path) -> Result<(), RenderError> {
    let part_path = path.with_extension("pdf.part");

    let result = (|| -> Result<(), RenderError> {
        let mut writer = BufWriter::new(File::create(&part_path)?);
        doc.save_to(&mut writer)?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;
        fs::rename(&part_path, path)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&part_path);
    }
    result
}

/// Encodes text for a WinAnsi-encoded standard font.
///
/// Latin-1 maps directly; common typographic punctuation maps to its
/// Windows-1252 slot; anything else becomes `?`.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '\t' => b' ',
            ' '..='~' => c as u8,
            '\u{a0}'..='\u{ff}' => c as u32 as u8,
            '€' => 0x80,
            '‚' => 0x82,
            '„' => 0x84,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '™' => 0x99,
            _ => b'?',
        })
        .collect()
}
