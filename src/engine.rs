use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::cache::{ChapterCacheKey, PageCacheStore, PaginationProfileId};
use crate::chunk::ChunkKind;
use crate::config::PagerOptions;
use crate::document::{Chapter, PagedDocument, SpineReader};
use crate::error::PagerError;
use crate::measure::LayoutMeasurer;
use crate::page_store::{Page, PageStore};
use crate::paginate::{
    CancelToken, ChapterPaginator, ChunkOutcome, PaginationDiagnostic, SealedPage,
};

type DiagnosticCallback = Arc<Mutex<Box<dyn FnMut(PaginationDiagnostic) + Send + 'static>>>;

/// Per-run configuration used by [`Pager`] entry points.
#[derive(Clone, Default)]
pub struct RunConfig<'a> {
    cancel: Option<&'a dyn CancelToken>,
    cache: Option<&'a dyn PageCacheStore>,
}

impl<'a> RunConfig<'a> {
    /// Attach a cancellation token checked between chunks.
    pub fn with_cancel(mut self, cancel: &'a dyn CancelToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Load and store chapter pages through a cache.
    pub fn with_cache(mut self, cache: &'a dyn PageCacheStore) -> Self {
        self.cache = Some(cache);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.is_some_and(|cancel| cancel.is_cancelled())
    }
}

/// Pagination engine for chapter → page conversion.
#[derive(Clone)]
pub struct Pager {
    opts: PagerOptions,
    diagnostic_sink: Option<DiagnosticCallback>,
}

impl core::fmt::Debug for Pager {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Pager")
            .field("opts", &self.opts)
            .field("has_diagnostic_sink", &self.diagnostic_sink.is_some())
            .finish()
    }
}

impl Pager {
    /// Create a pager with no diagnostics sink.
    pub fn new(opts: PagerOptions) -> Self {
        Self {
            opts,
            diagnostic_sink: None,
        }
    }

    /// Options this pager was built with.
    pub fn options(&self) -> PagerOptions {
        self.opts
    }

    /// Register or replace the diagnostics sink.
    pub fn set_diagnostic_sink<F>(&mut self, sink: F)
    where
        F: FnMut(PaginationDiagnostic) + Send + 'static,
    {
        self.diagnostic_sink = Some(Arc::new(Mutex::new(Box::new(sink))));
    }

    fn emit_diagnostic(&self, diagnostic: PaginationDiagnostic) {
        let Some(sink) = &self.diagnostic_sink else {
            return;
        };
        if let Ok(mut sink) = sink.lock() {
            sink(diagnostic);
        }
    }

    /// Fingerprint of the geometry plus the measurer identity.
    pub fn pagination_profile_id<M: LayoutMeasurer + ?Sized>(
        &self,
        measurer: &M,
    ) -> PaginationProfileId {
        PaginationProfileId::new(&self.opts.pagination, &measurer.fingerprint())
    }

    /// Paginate a single chapter with fresh state.
    ///
    /// Returns the chapter's pages, or an error with no partial output.
    pub fn paginate_chapter<M: LayoutMeasurer>(
        &self,
        chapter: &Chapter,
        measurer: &mut M,
        run: &RunConfig<'_>,
    ) -> Result<Vec<Page>, PagerError> {
        let cache_key = run
            .cache
            .map(|_| ChapterCacheKey::for_chapter(self.pagination_profile_id(&*measurer), chapter));
        if let (Some(cache), Some(key)) = (run.cache, cache_key.as_ref()) {
            if let Some(pages) = cache.load_chapter_pages(key) {
                log::debug!(
                    "page cache hit for chapter {} ({} pages)",
                    chapter.index,
                    pages.len()
                );
                self.emit_diagnostic(PaginationDiagnostic::CacheHit {
                    chapter_index: chapter.index,
                    page_count: pages.len(),
                });
                return Ok(pages);
            }
            self.emit_diagnostic(PaginationDiagnostic::CacheMiss {
                chapter_index: chapter.index,
            });
        }

        let started = Instant::now();
        let cfg = self.opts.pagination;
        let mut session = ChapterPaginator::new(
            &mut *measurer,
            chapter.index,
            cfg.content_width(),
            cfg.content_height(),
        );
        let mut pages = Vec::new();
        for (chunk_index, chunk) in chapter.chunks.iter().enumerate() {
            if run.is_cancelled() {
                self.emit_diagnostic(PaginationDiagnostic::Cancelled);
                return Err(PagerError::Cancelled);
            }
            match session.push(chunk)? {
                ChunkOutcome::Appended => {}
                ChunkOutcome::Dropped => {
                    let tag = match &chunk.kind {
                        ChunkKind::Other(tag) => tag.clone(),
                        _ => String::new(),
                    };
                    log::debug!(
                        "dropping chunk {} of chapter {} with unrecognized kind {:?}",
                        chunk_index,
                        chapter.index,
                        tag
                    );
                    self.emit_diagnostic(PaginationDiagnostic::ChunkDropped {
                        chapter_index: chapter.index,
                        chunk_index,
                        tag,
                    });
                }
                ChunkOutcome::Overflowed { sealed } => {
                    if let Some(sealed) = sealed {
                        self.record_sealed(&mut pages, sealed);
                    }
                }
            }
        }
        if let Some(sealed) = session.finish()? {
            self.record_sealed(&mut pages, sealed);
        }

        let elapsed_ms = started.elapsed().as_millis().min(u32::MAX as u128) as u32;
        self.emit_diagnostic(PaginationDiagnostic::ChapterPaginated {
            chapter_index: chapter.index,
            page_count: pages.len(),
            elapsed_ms,
        });
        if let (Some(cache), Some(key)) = (run.cache, cache_key.as_ref()) {
            if let Err(err) = cache.store_chapter_pages(key, &pages) {
                log::warn!(
                    "failed to cache pages of chapter {}: {}",
                    chapter.index,
                    err
                );
            }
        }
        Ok(pages)
    }

    fn record_sealed(&self, pages: &mut Vec<Page>, sealed: SealedPage) {
        if let Some(chunk_index) = sealed.oversized_chunk {
            self.emit_diagnostic(PaginationDiagnostic::OversizedFragment {
                chapter_index: sealed.page.chapter_index,
                chunk_index,
            });
        }
        pages.push(sealed.page);
    }

    /// Walk the whole spine and paginate every chapter in order.
    ///
    /// Each chapter starts a fresh page. Any reader, measurer or
    /// cancellation failure aborts the load.
    pub fn load_document<R, M>(
        &self,
        reader: &mut R,
        measurer: &mut M,
        run: RunConfig<'_>,
    ) -> Result<PagedDocument, PagerError>
    where
        R: SpineReader + ?Sized,
        M: LayoutMeasurer,
    {
        let config = self.opts.pagination.validate()?;
        let started = Instant::now();
        let mut store = PageStore::new();
        let mut chapters = 0usize;
        while let Some(chapter) = reader.next_chapter().map_err(PagerError::Reader)? {
            if run.is_cancelled() {
                self.emit_diagnostic(PaginationDiagnostic::Cancelled);
                return Err(PagerError::Cancelled);
            }
            let pages = self.paginate_chapter(&chapter, measurer, &run)?;
            store.push_chapter(chapter.index, &chapter.href, pages);
            chapters += 1;
        }
        log::info!(
            "paginated {} chapters into {} pages in {} ms",
            chapters,
            store.count(),
            started.elapsed().as_millis()
        );
        Ok(PagedDocument::new(config, store))
    }
}
