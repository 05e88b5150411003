//! Greedy chunk → page packing.
//!
//! Each recognized chunk is appended to the candidate page and the result is
//! measured twice at the content width: once unbounded, once bounded to the
//! content height. When the bounded layout loses lines the candidate is
//! sealed and the triggering fragment seeds the next page. Fragments are
//! never split, so a fragment taller than the viewport becomes a page that
//! overflows its own viewport.

use crate::chunk::StyledChunk;
use crate::error::PagerError;
use crate::markup::{format_chunk, MarkupBuffer};
use crate::measure::{LayoutHeight, LayoutMeasurer};
use crate::page_store::Page;

/// Cancellation hook checked between chunks.
pub trait CancelToken {
    fn is_cancelled(&self) -> bool;
}

/// Never-cancel token for default call paths.
#[derive(Clone, Copy, Debug, Default)]
pub struct NeverCancel;

impl CancelToken for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

impl CancelToken for core::sync::atomic::AtomicBool {
    fn is_cancelled(&self) -> bool {
        self.load(core::sync::atomic::Ordering::Relaxed)
    }
}

/// Runtime diagnostics emitted while paginating.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaginationDiagnostic {
    /// A chunk with an unrecognized kind contributed nothing.
    ChunkDropped {
        chapter_index: usize,
        chunk_index: usize,
        tag: String,
    },
    /// A sealed page holds one fragment taller than the viewport, kept whole.
    OversizedFragment {
        chapter_index: usize,
        chunk_index: usize,
    },
    /// A run stopped on its cancellation token.
    Cancelled,
    /// A chapter finished paginating.
    ChapterPaginated {
        chapter_index: usize,
        page_count: usize,
        elapsed_ms: u32,
    },
    /// Chapter pages were served from the cache.
    CacheHit {
        chapter_index: usize,
        page_count: usize,
    },
    /// No cached pages for the chapter.
    CacheMiss { chapter_index: usize },
}

/// A page closed by the paginator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SealedPage {
    pub page: Page,
    /// Chunk whose fragment alone overflows this page's viewport.
    pub oversized_chunk: Option<usize>,
}

/// What happened to one pushed chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// The chunk had no markup and was skipped.
    Dropped,
    /// The fragment fit and was appended to the candidate page.
    Appended,
    /// The fragment overflowed; it now seeds the candidate page.
    ///
    /// `sealed` is the page closed by the overflow, or `None` when the
    /// candidate was empty.
    Overflowed { sealed: Option<SealedPage> },
}

/// What is known about the candidate page's fit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CandidateFit {
    /// The whole candidate was measured and fits.
    Fits,
    /// Seeded by one fragment that was never measured alone.
    Unverified { chunk_index: usize },
    /// Seeded by one fragment that overflowed an empty page.
    Oversized { chunk_index: usize },
}

/// Incremental pagination of one chapter.
///
/// State never carries across chapters: build a fresh session per spine item.
pub struct ChapterPaginator<M> {
    measurer: M,
    chapter_index: usize,
    content_width: i32,
    content_height: i32,
    candidate: MarkupBuffer,
    fit: CandidateFit,
    chunk_index: usize,
    sealed_pages: usize,
}

impl<M: LayoutMeasurer> ChapterPaginator<M> {
    /// Start a chapter session for the given content box.
    pub fn new(measurer: M, chapter_index: usize, content_width: i32, content_height: i32) -> Self {
        Self {
            measurer,
            chapter_index,
            content_width,
            content_height,
            candidate: MarkupBuffer::new(),
            fit: CandidateFit::Fits,
            chunk_index: 0,
            sealed_pages: 0,
        }
    }

    /// Markup committed to the page under construction.
    pub fn candidate(&self) -> &str {
        self.candidate.as_str()
    }

    /// Pages sealed so far, not counting the final flush.
    pub fn sealed_pages(&self) -> usize {
        self.sealed_pages
    }

    /// Feed the next chunk in reading order.
    pub fn push(&mut self, chunk: &StyledChunk) -> Result<ChunkOutcome, PagerError> {
        let chunk_index = self.chunk_index;
        self.chunk_index += 1;

        let Some(fragment) = format_chunk(chunk) else {
            return Ok(ChunkOutcome::Dropped);
        };

        let trial = self.candidate.trial(&fragment);
        let overflows = self.overflows(&trial, chunk_index)?;
        if !overflows {
            self.candidate.commit(trial);
            self.fit = CandidateFit::Fits;
            return Ok(ChunkOutcome::Appended);
        }

        let seeded_empty = self.candidate.is_empty();
        let previous = self.candidate.reseed(fragment);
        let previous_fit = self.fit;
        self.fit = if seeded_empty {
            CandidateFit::Oversized { chunk_index }
        } else {
            CandidateFit::Unverified { chunk_index }
        };
        let sealed = self.seal_markup(previous, previous_fit)?;
        Ok(ChunkOutcome::Overflowed { sealed })
    }

    /// Flush the candidate as the chapter's last page, if non-empty.
    pub fn finish(mut self) -> Result<Option<SealedPage>, PagerError> {
        let remaining = self.candidate.seal();
        let fit = self.fit;
        self.seal_markup(remaining, fit)
    }

    /// Measure `markup` unbounded and bounded; `true` when lines are lost.
    fn overflows(&mut self, markup: &str, chunk_index: usize) -> Result<bool, PagerError> {
        let unbounded = self.measure(markup, LayoutHeight::Unbounded, chunk_index)?;
        let bounded = self.measure(
            markup,
            LayoutHeight::Bounded(self.content_height),
            chunk_index,
        )?;
        log::trace!(
            "chapter {} chunk {}: {} lines unbounded, {} bounded",
            self.chapter_index,
            chunk_index,
            unbounded,
            bounded
        );
        if bounded > unbounded {
            log::warn!(
                "measurer reported more bounded lines ({}) than unbounded ({}) in chapter {} chunk {}",
                bounded,
                unbounded,
                self.chapter_index,
                chunk_index
            );
        }
        Ok(bounded < unbounded)
    }

    fn measure(
        &mut self,
        markup: &str,
        height: LayoutHeight,
        chunk_index: usize,
    ) -> Result<usize, PagerError> {
        self.measurer
            .measure(markup, self.content_width, height)
            .map_err(|source| PagerError::Measurement {
                chapter_index: self.chapter_index,
                chunk_index,
                source,
            })
    }

    fn seal_markup(
        &mut self,
        markup: String,
        fit: CandidateFit,
    ) -> Result<Option<SealedPage>, PagerError> {
        if markup.is_empty() {
            return Ok(None);
        }
        let oversized_chunk = match fit {
            CandidateFit::Fits => None,
            CandidateFit::Oversized { chunk_index } => Some(chunk_index),
            CandidateFit::Unverified { chunk_index } => self
                .overflows(&markup, chunk_index)?
                .then_some(chunk_index),
        };
        let page = Page::new(self.chapter_index, self.sealed_pages, markup);
        self.sealed_pages += 1;
        log::debug!(
            "sealed page {} of chapter {} ({} bytes)",
            page.chapter_page_index,
            page.chapter_index,
            page.markup().len()
        );
        if let Some(chunk_index) = oversized_chunk {
            log::warn!(
                "chunk {} of chapter {} exceeds one page on its own; keeping it whole",
                chunk_index,
                self.chapter_index
            );
        }
        Ok(Some(SealedPage {
            page,
            oversized_chunk,
        }))
    }
}

/// Paginate one chapter's chunks into pages.
///
/// Any measurer failure aborts the pass; no partial pages are returned.
pub fn paginate<'c, I, M>(
    chunks: I,
    content_width: i32,
    content_height: i32,
    measurer: M,
) -> Result<Vec<Page>, PagerError>
where
    I: IntoIterator<Item = &'c StyledChunk>,
    M: LayoutMeasurer,
{
    paginate_with_cancel(chunks, content_width, content_height, measurer, &NeverCancel)
}

/// [`paginate`] with a cooperative cancellation check before every chunk.
pub fn paginate_with_cancel<'c, I, M, C>(
    chunks: I,
    content_width: i32,
    content_height: i32,
    measurer: M,
    cancel: &C,
) -> Result<Vec<Page>, PagerError>
where
    I: IntoIterator<Item = &'c StyledChunk>,
    M: LayoutMeasurer,
    C: CancelToken + ?Sized,
{
    let mut session = ChapterPaginator::new(measurer, 0, content_width, content_height);
    let mut pages = Vec::new();
    for chunk in chunks {
        if cancel.is_cancelled() {
            return Err(PagerError::Cancelled);
        }
        if let ChunkOutcome::Overflowed { sealed: Some(sealed) } = session.push(chunk)? {
            pages.push(sealed.page);
        }
    }
    pages.extend(session.finish()?.map(|sealed| sealed.page));
    Ok(pages)
}
