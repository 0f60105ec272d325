use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ImportError;

/// Document formats the validator can decode to text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum DocumentFormat {
    PlainText,
    Markdown,
    Pdf,
    Docx,
}

impl DocumentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlainText => "plain_text",
            Self::Markdown => "markdown",
            Self::Pdf => "pdf",
            Self::Docx => "docx",
        }
    }
}

const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024; // 100MB

/// Detect the document format from the file extension (case-insensitive).
/// A `.pdf` must also carry the `%PDF` magic bytes.
pub fn detect_format(path: &Path) -> Result<DocumentFormat, ImportError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let format = match ext.as_str() {
        "txt" | "text" => DocumentFormat::PlainText,
        "md" | "markdown" => DocumentFormat::Markdown,
        "pdf" => DocumentFormat::Pdf,
        "docx" => DocumentFormat::Docx,
        "" => return Err(ImportError::UnsupportedFormat("(no extension)".into())),
        other => return Err(ImportError::UnsupportedFormat(format!(".{other}"))),
    };

    let file_size = std::fs::metadata(path)?.len();
    if file_size > MAX_FILE_SIZE {
        return Err(ImportError::FileTooLarge {
            size_mb: file_size as f64 / (1024.0 * 1024.0),
            max_mb: MAX_FILE_SIZE / (1024 * 1024),
        });
    }

    if format == DocumentFormat::Pdf && !has_pdf_magic(path)? {
        return Err(ImportError::UnsupportedFormat(
            ".pdf without a PDF header".into(),
        ));
    }

    Ok(format)
}

fn has_pdf_magic(path: &Path) -> Result<bool, ImportError> {
    let mut file = std::fs::File::open(path)?;
    let mut header = [0u8; 4];
    let bytes_read = file.read(&mut header)?;
    Ok(bytes_read == 4 && &header == b"%PDF")
}
