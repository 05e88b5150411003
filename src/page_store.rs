//! Sealed pages and the document-wide page store.

use core::ops::Range;

use serde::{Deserialize, Serialize};

use crate::error::PagerError;

/// Alias used for chapter page slicing.
pub type PageRange = Range<usize>;

/// Immutable snapshot of one page's markup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    /// Spine index of the chapter the page belongs to.
    pub chapter_index: usize,
    /// 0-based page position within its chapter.
    pub chapter_page_index: usize,
    markup: String,
}

impl Page {
    /// Page `chapter_page_index` of chapter `chapter_index` holding `markup`.
    pub fn new(chapter_index: usize, chapter_page_index: usize, markup: String) -> Self {
        Self {
            chapter_index,
            chapter_page_index,
            markup,
        }
    }

    /// Page content as markup.
    pub fn markup(&self) -> &str {
        &self.markup
    }

    /// Consume the page, returning its markup.
    pub fn into_markup(self) -> String {
        self.markup
    }
}

/// Chapter-level page span within a [`PageStore`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterPageSpan {
    /// Spine index (0-based).
    pub chapter_index: usize,
    /// Chapter href as reported by the reader.
    pub href: String,
    /// First global page index for this chapter.
    pub first_page_index: usize,
    /// Page count for this chapter; may be 0.
    pub page_count: usize,
}

impl ChapterPageSpan {
    /// Global page indices covered by this chapter.
    pub fn page_range(&self) -> PageRange {
        self.first_page_index..self.first_page_index + self.page_count
    }

    fn contains_global_page(&self, global_page_index: usize) -> bool {
        self.page_range().contains(&global_page_index)
    }
}

/// Ordered, index-addressable pages in reading order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PageStore {
    pages: Vec<Page>,
    chapters: Vec<ChapterPageSpan>,
}

impl PageStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pages.
    pub fn count(&self) -> usize {
        self.pages.len()
    }

    /// `true` for a document without pages.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Look up a page by global index.
    pub fn get(&self, index: usize) -> Result<&Page, PagerError> {
        self.pages.get(index).ok_or(PagerError::PageOutOfRange {
            index,
            count: self.pages.len(),
        })
    }

    /// Pages in reading order.
    pub fn iter(&self) -> core::slice::Iter<'_, Page> {
        self.pages.iter()
    }

    /// Per-chapter spans in spine order.
    pub fn chapters(&self) -> &[ChapterPageSpan] {
        &self.chapters
    }

    /// Global page range for a chapter, if that chapter was paginated.
    pub fn chapter_page_range(&self, chapter_index: usize) -> Option<PageRange> {
        self.chapters
            .iter()
            .find(|span| span.chapter_index == chapter_index)
            .map(ChapterPageSpan::page_range)
    }

    /// Chapter span that owns a global page index.
    pub fn chapter_for_page(&self, global_page_index: usize) -> Option<&ChapterPageSpan> {
        self.chapters
            .iter()
            .find(|span| span.contains_global_page(global_page_index))
    }

    /// Append one chapter's pages after everything stored so far.
    pub(crate) fn push_chapter(&mut self, chapter_index: usize, href: &str, pages: Vec<Page>) {
        self.chapters.push(ChapterPageSpan {
            chapter_index,
            href: href.to_string(),
            first_page_index: self.pages.len(),
            page_count: pages.len(),
        });
        self.pages.extend(pages);
    }
}

impl<'a> IntoIterator for &'a PageStore {
    type Item = &'a Page;
    type IntoIter = core::slice::Iter<'a, Page>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(chapter: usize, n: usize) -> Vec<Page> {
        (0..n)
            .map(|i| Page::new(chapter, i, format!("c{}p{}", chapter, i)))
            .collect()
    }

    #[test]
    fn chapters_concatenate_in_push_order() {
        let mut store = PageStore::new();
        store.push_chapter(0, "c0.xhtml", pages(0, 2));
        store.push_chapter(1, "c1.xhtml", Vec::new());
        store.push_chapter(2, "c2.xhtml", pages(2, 3));

        assert_eq!(store.count(), 5);
        assert_eq!(store.get(2).map(Page::markup).ok(), Some("c2p0"));
        assert_eq!(store.chapter_page_range(0), Some(0..2));
        assert_eq!(store.chapter_page_range(1), Some(2..2));
        assert_eq!(store.chapter_page_range(2), Some(2..5));
        assert_eq!(store.chapter_page_range(9), None);
        assert_eq!(store.chapter_for_page(4).map(|s| s.chapter_index), Some(2));
        assert_eq!(store.chapter_for_page(5), None);
    }

    #[test]
    fn out_of_range_lookup_is_an_error() {
        let store = PageStore::new();
        assert!(store.is_empty());
        match store.get(0) {
            Err(PagerError::PageOutOfRange { index, count }) => {
                assert_eq!(index, 0);
                assert_eq!(count, 0);
            }
            other => panic!("unexpected lookup result: {:?}", other),
        }
    }
}
