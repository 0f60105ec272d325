use std::path::Path;

use super::format::{detect_format, DocumentFormat};
use super::ImportError;

/// Decoded text of one document.
#[derive(Debug, Clone)]
pub struct DecodedDocument {
    pub name: String,
    pub format: DocumentFormat,
    pub text: String,
}

/// Detect the format and decode the document to raw text.
pub fn decode_document(path: &Path) -> Result<DecodedDocument, ImportError> {
    let format = detect_format(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let text = match format {
        DocumentFormat::PlainText | DocumentFormat::Markdown => read_utf8(path)?,
        DocumentFormat::Pdf => decode_pdf(path)?,
        DocumentFormat::Docx => decode_docx(path)?,
    };

    tracing::debug!(
        document = %name,
        format = format.as_str(),
        chars = text.chars().count(),
        "Decoded document"
    );

    Ok(DecodedDocument { name, format, text })
}

fn read_utf8(path: &Path) -> Result<String, ImportError> {
    let bytes = std::fs::read(path)?;
    let text = String::from_utf8(bytes).map_err(|e| ImportError::Decode {
        format: "plain_text",
        reason: format!("not valid UTF-8: {e}"),
    })?;
    // Strip a UTF-8 BOM written by some Windows editors
    Ok(text.trim_start_matches('\u{feff}').to_string())
}

/// Pages are joined with newlines and hyphenated line breaks rejoined.
/// Line structure is kept so headings survive for segmentation.
fn decode_pdf(path: &Path) -> Result<String, ImportError> {
    let bytes = std::fs::read(path)?;
    let pages = pdf_extract::extract_text_from_mem_by_pages(&bytes).map_err(|e| {
        ImportError::Decode {
            format: "pdf",
            reason: e.to_string(),
        }
    })?;

    Ok(pages
        .iter()
        .map(|page| page.replace("-\n", "").trim().to_string())
        .filter(|page| !page.is_empty())
        .collect::<Vec<_>>()
        .join("\n"))
}

fn decode_docx(path: &Path) -> Result<String, ImportError> {
    docx_lite::extract_text(path).map_err(|e| ImportError::Decode {
        format: "docx",
        reason: e.to_string(),
    })
}
