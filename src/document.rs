//! Spine traversal and the paginated document handed to renderers.

use crate::chunk::StyledChunk;
use crate::config::PaginationConfig;
use crate::error::{PagerError, ReaderError};
use crate::page_store::{Page, PageStore};

/// One spine item's extracted chunks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Chapter {
    /// Spine index (0-based).
    pub index: usize,
    /// Chapter href in reader-relative form.
    pub href: String,
    /// Chunks in reading order.
    pub chunks: Vec<StyledChunk>,
}

impl Chapter {
    /// Chapter `index` at `href` with its chunks in reading order.
    pub fn new(index: usize, href: impl Into<String>, chunks: Vec<StyledChunk>) -> Self {
        Self {
            index,
            href: href.into(),
            chunks,
        }
    }
}

/// Document-format reader walking the spine one chapter at a time.
///
/// Returns `Ok(None)` once the spine is exhausted.
pub trait SpineReader {
    fn next_chapter(&mut self) -> Result<Option<Chapter>, ReaderError>;
}

/// Spine held entirely in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemorySpine {
    chapters: std::vec::IntoIter<Chapter>,
}

impl InMemorySpine {
    /// Spine yielding `chapters` in order.
    pub fn new(chapters: Vec<Chapter>) -> Self {
        Self {
            chapters: chapters.into_iter(),
        }
    }

    /// Build a spine from bare chunk lists, numbering chapters in order.
    pub fn from_chunk_lists<I>(lists: I) -> Self
    where
        I: IntoIterator<Item = Vec<StyledChunk>>,
    {
        let chapters = lists
            .into_iter()
            .enumerate()
            .map(|(index, chunks)| Chapter::new(index, format!("chapter-{}", index), chunks))
            .collect();
        Self::new(chapters)
    }
}

impl SpineReader for InMemorySpine {
    fn next_chapter(&mut self) -> Result<Option<Chapter>, ReaderError> {
        Ok(self.chapters.next())
    }
}

/// Fixed page size reported to renderers; independent of content.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageGeometry {
    pub width: f64,
    pub height: f64,
}

/// Fully paginated document.
///
/// Owns its page store for the document's lifetime; the store is read-only
/// once loading completes.
#[derive(Clone, Debug, PartialEq)]
pub struct PagedDocument {
    config: PaginationConfig,
    pages: PageStore,
}

impl PagedDocument {
    pub(crate) fn new(config: PaginationConfig, pages: PageStore) -> Self {
        Self { config, pages }
    }

    /// Number of pages; `0` for an empty document.
    pub fn page_count(&self) -> usize {
        self.pages.count()
    }

    /// Page size shared by every page.
    pub fn page_geometry(&self) -> PageGeometry {
        PageGeometry {
            width: f64::from(self.config.page_width),
            height: f64::from(self.config.page_height),
        }
    }

    /// Page by global index.
    pub fn page(&self, index: usize) -> Result<&Page, PagerError> {
        self.pages.get(index)
    }

    /// All pages with their chapter spans.
    pub fn pages(&self) -> &PageStore {
        &self.pages
    }

    /// Geometry used to paginate this document.
    pub fn config(&self) -> PaginationConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_spine_yields_chapters_then_exhausts() {
        let mut spine = InMemorySpine::from_chunk_lists(vec![
            vec![StyledChunk::normal("a")],
            Vec::new(),
        ]);
        let first = spine.next_chapter().expect("read").expect("chapter 0");
        assert_eq!(first.index, 0);
        assert_eq!(first.href, "chapter-0");
        let second = spine.next_chapter().expect("read").expect("chapter 1");
        assert!(second.chunks.is_empty());
        assert!(spine.next_chapter().expect("read").is_none());
        assert!(spine.next_chapter().expect("read").is_none());
    }

    #[test]
    fn geometry_is_page_size_not_content_size() {
        let doc = PagedDocument::new(PaginationConfig::default(), PageStore::new());
        assert_eq!(
            doc.page_geometry(),
            PageGeometry {
                width: 660.0,
                height: 900.0
            }
        );
        assert_eq!(doc.page_count(), 0);
        assert!(doc.page(0).is_err());
    }
}
