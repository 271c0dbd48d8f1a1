//! PDF text extraction with lopdf.

use std::path::Path;

use litgraph_common::LitgraphError;
use tracing::warn;

/// Pages read per paper when the config does not say otherwise. Metadata and
/// the densest entity signal live in the opening pages.
pub const DEFAULT_MAX_PAGES: usize = 10;

/// Extract plain text from the first `max_pages` pages of a PDF,
/// concatenated with a newline per page.
///
/// Failure is non-fatal to the caller: a corrupt or unreadable file logs a
/// warning and yields an empty string, so downstream extraction degrades
/// instead of aborting the batch.
pub fn extract_text(pdf_path: &Path, max_pages: usize) -> String {
    match try_extract_text(pdf_path, max_pages) {
        Ok(text) => text,
        Err(e) => {
            warn!(path = %pdf_path.display(), error = %e, "PDF read failed, using empty text");
            String::new()
        }
    }
}

fn try_extract_text(pdf_path: &Path, max_pages: usize) -> Result<String, LitgraphError> {
    let pdf = lopdf::Document::load(pdf_path)
        .map_err(|e| LitgraphError::Pdf(e.to_string()))?;

    // get_pages is keyed by page number, so iteration order is page order
    let mut pages: Vec<u32> = pdf.get_pages().keys().copied().collect();
    pages.truncate(max_pages);

    let mut text = String::new();
    for page_num in pages {
        let page_text = pdf
            .extract_text(&[page_num])
            .map_err(|e| LitgraphError::Pdf(e.to_string()))?;
        text.push_str(&page_text);
        text.push('\n');
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_yields_empty_text() {
        let text = extract_text(Path::new("/nonexistent/paper.pdf"), DEFAULT_MAX_PAGES);
        assert_eq!(text, "");
    }

    #[test]
    fn test_corrupt_file_yields_empty_text() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"this is not a pdf").unwrap();
        let text = extract_text(file.path(), DEFAULT_MAX_PAGES);
        assert_eq!(text, "");
    }
}
