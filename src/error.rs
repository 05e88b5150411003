//! Error types shared by the paginator, page store and document loader.

use core::fmt;

use crate::measure::MeasureError;

/// Boxed error raised by a [`SpineReader`](crate::SpineReader) implementation.
pub type ReaderError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Pagination and page-store error.
#[derive(Debug)]
pub enum PagerError {
    /// The layout measurer could not shape a candidate page.
    Measurement {
        /// Spine index of the chapter being paginated.
        chapter_index: usize,
        /// Position of the chunk whose trial layout failed.
        chunk_index: usize,
        /// Underlying measurer failure.
        source: MeasureError,
    },
    /// A cancellation token stopped the run between chunks.
    Cancelled,
    /// Page lookup outside `[0, count)`.
    PageOutOfRange { index: usize, count: usize },
    /// The document reader failed while walking the spine.
    Reader(ReaderError),
    /// Pagination parameters are unusable.
    Config(String),
}

impl fmt::Display for PagerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Measurement {
                chapter_index,
                chunk_index,
                source,
            } => write!(
                f,
                "measurement failed in chapter {} at chunk {}: {}",
                chapter_index, chunk_index, source
            ),
            Self::Cancelled => write!(f, "pagination cancelled"),
            Self::PageOutOfRange { index, count } => {
                write!(f, "page index {} out of range (page count {})", index, count)
            }
            Self::Reader(err) => write!(f, "document reader failed: {}", err),
            Self::Config(message) => write!(f, "invalid pagination config: {}", message),
        }
    }
}

impl std::error::Error for PagerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Measurement { source, .. } => Some(source),
            Self::Reader(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for PagerError {
    fn from(value: serde_json::Error) -> Self {
        Self::Config(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measurement_error_display_names_chapter_and_chunk() {
        let err = PagerError::Measurement {
            chapter_index: 2,
            chunk_index: 7,
            source: MeasureError::new("unbalanced tag"),
        };
        let text = err.to_string();
        assert!(text.contains("chapter 2"));
        assert!(text.contains("chunk 7"));
        assert!(text.contains("unbalanced tag"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn out_of_range_display_reports_count() {
        let err = PagerError::PageOutOfRange { index: 4, count: 0 };
        assert_eq!(err.to_string(), "page index 4 out of range (page count 0)");
    }
}
