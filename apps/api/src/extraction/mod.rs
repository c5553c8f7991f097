//! Résumé text extraction.
//!
//! An upload lives in a `NamedTempFile` under the upload directory for exactly as
//! long as extraction needs it. Parsers are synchronous and run inside
//! `tokio::task::spawn_blocking`; a parser panic surfaces as an `ExtractionError`.

use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

mod docx;

/// Prompt budget for résumé text, in characters.
pub const MAX_RESUME_CHARS: usize = 8000;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("Failed to read uploaded file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse PDF: {0}")]
    Pdf(String),

    #[error("Failed to parse Word document: {0}")]
    Docx(String),

    #[error("Uploaded text file is not valid UTF-8")]
    NotUtf8,

    #[error("No readable text found in the uploaded document")]
    Empty,

    #[error("Document parser aborted: {0}")]
    Aborted(String),
}

/// Declared format of an upload, inferred from its file name suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    WordDocument,
    PlainText,
}

impl DocumentFormat {
    pub fn from_file_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".pdf") {
            DocumentFormat::Pdf
        } else if lower.ends_with(".docx") {
            DocumentFormat::WordDocument
        } else {
            DocumentFormat::PlainText
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            DocumentFormat::Pdf => ".pdf",
            DocumentFormat::WordDocument => ".docx",
            DocumentFormat::PlainText => ".txt",
        }
    }
}

/// A résumé upload held in temporary storage.
///
/// The file is removed by `discard`, or by `Drop` if the owner bails out early.
#[derive(Debug)]
pub struct UploadedDocument {
    file: NamedTempFile,
    format: DocumentFormat,
}

impl UploadedDocument {
    /// Writes the uploaded bytes to a randomly named file inside `upload_dir`.
    /// The client-supplied name only decides the format.
    pub async fn store(
        upload_dir: &Path,
        original_name: &str,
        data: Bytes,
    ) -> std::io::Result<Self> {
        let format = DocumentFormat::from_file_name(original_name);
        let dir = upload_dir.to_path_buf();

        let file = tokio::task::spawn_blocking(move || -> std::io::Result<NamedTempFile> {
            let mut file = tempfile::Builder::new()
                .prefix("resume-")
                .suffix(format.suffix())
                .tempfile_in(&dir)?;
            file.write_all(&data)?;
            file.as_file().sync_all()?;
            Ok(file)
        })
        .await
        .map_err(std::io::Error::other)??;

        debug!(path = %file.path().display(), ?format, "Stored upload");
        Ok(Self { file, format })
    }

    pub fn storage_path(&self) -> &Path {
        self.file.path()
    }

    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    /// Deletes the temporary file.
    pub fn discard(self) -> std::io::Result<()> {
        self.file.close()
    }
}

/// Extracts plain text from the file at `path` according to `format`.
///
/// Returns an error if the document cannot be parsed or yields no text.
pub async fn extract_text(path: &Path, format: DocumentFormat) -> Result<String, ExtractionError> {
    let path: PathBuf = path.to_path_buf();

    let text = tokio::task::spawn_blocking(move || extract_sync(&path, format))
        .await
        .map_err(|e| ExtractionError::Aborted(e.to_string()))??;

    if text.trim().is_empty() {
        return Err(ExtractionError::Empty);
    }
    Ok(text)
}

fn extract_sync(path: &Path, format: DocumentFormat) -> Result<String, ExtractionError> {
    let bytes = std::fs::read(path)?;
    match format {
        DocumentFormat::Pdf => pdf_extract::extract_text_from_mem(&bytes)
            .map_err(|e| ExtractionError::Pdf(e.to_string())),
        DocumentFormat::WordDocument => docx::extract_raw_text(&bytes),
        DocumentFormat::PlainText => String::from_utf8(bytes).map_err(|_| ExtractionError::NotUtf8),
    }
}

/// Truncates `text` to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
