//! Text extraction seam: the boundary to PDF/DOCX/TXT collaborators.
//!
//! Raw container parsing is an external concern. The core consumes an
//! ordered sequence of [`Page`]s; format dispatch happens exactly once,
//! at this boundary, via [`SourceType::from_filename`].

use crate::document::Page;
use crate::error::{RagError, Result};

/// Supported source document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceType {
    /// Portable Document Format; one [`Page`] per PDF page.
    Pdf,
    /// Word document; extracted as a single page.
    Docx,
    /// Plain UTF-8 text; extracted as a single page.
    Txt,
}

impl SourceType {
    /// Determine the source type from a filename extension.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Extraction`] for an unsupported extension.
    pub fn from_filename(filename: &str) -> Result<Self> {
        let extension = filename.rsplit('.').next().unwrap_or_default().to_ascii_lowercase();
        match extension.as_str() {
            "pdf" => Ok(Self::Pdf),
            "docx" | "doc" => Ok(Self::Docx),
            "txt" => Ok(Self::Txt),
            other => Err(RagError::Extraction {
                document: filename.to_string(),
                message: format!("unsupported file type: '{other}'"),
            }),
        }
    }
}

/// Extracts plain text with page numbers from raw document bytes.
///
/// Implementations fail with
/// [`RagError::Extraction`](crate::RagError::Extraction) on unreadable,
/// corrupt, or unsupported input (a scanned image-only PDF, for example).
/// An extraction failure aborts that document's ingestion only.
pub trait TextExtractor: Send + Sync {
    /// Extract the ordered pages of `document` from its raw bytes.
    fn extract(&self, bytes: &[u8], document: &str) -> Result<Vec<Page>>;
}

/// The trivial [`TextExtractor`] for plain UTF-8 text files: the whole
/// file becomes page 1.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, bytes: &[u8], document: &str) -> Result<Vec<Page>> {
        let text = std::str::from_utf8(bytes).map_err(|e| RagError::Extraction {
            document: document.to_string(),
            message: format!("file is not valid UTF-8: {e}"),
        })?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![Page::new(1, text)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_type_dispatches_on_extension() {
        assert_eq!(SourceType::from_filename("report.PDF").unwrap(), SourceType::Pdf);
        assert_eq!(SourceType::from_filename("notes.docx").unwrap(), SourceType::Docx);
        assert_eq!(SourceType::from_filename("readme.txt").unwrap(), SourceType::Txt);
        assert!(matches!(
            SourceType::from_filename("image.png").unwrap_err(),
            RagError::Extraction { .. }
        ));
    }

    #[test]
    fn plain_text_extracts_as_single_page() {
        let pages = PlainTextExtractor.extract(b"hello world", "a.txt").unwrap();
        assert_eq!(pages, vec![Page::new(1, "hello world")]);
    }

    #[test]
    fn empty_text_extracts_as_zero_pages() {
        assert!(PlainTextExtractor.extract(b"  \n ", "a.txt").unwrap().is_empty());
    }

    #[test]
    fn invalid_utf8_is_an_extraction_error() {
        let err = PlainTextExtractor.extract(&[0xff, 0xfe, 0x80], "a.txt").unwrap_err();
        assert!(matches!(err, RagError::Extraction { .. }));
    }
}
