//! Fixed-viewport pagination for reflowable ebook text.
//!
//! A document reader supplies styled chunks chapter by chapter. Each chunk
//! is formatted as markup and packed greedily onto the current page; a
//! [`LayoutMeasurer`] decides when the page would overflow its viewport.
//! Finished pages land in a [`PageStore`] owned by a [`PagedDocument`].
//!
//! ```
//! use epub_pager::{paginate, LayoutHeight, LayoutMeasurer, MeasureError, StyledChunk};
//!
//! struct Roomy;
//!
//! impl LayoutMeasurer for Roomy {
//!     fn measure(&mut self, _: &str, _: i32, _: LayoutHeight) -> Result<usize, MeasureError> {
//!         Ok(1)
//!     }
//! }
//!
//! let chunks = [StyledChunk::normal("Hello "), StyledChunk::bold("world")];
//! let pages = paginate(&chunks, 580, 820, Roomy).unwrap();
//! assert_eq!(pages[0].markup(), "Hello <b>world</b>");
//! ```

#![cfg_attr(
    not(test),
    deny(
        clippy::disallowed_methods,
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::panic_in_result_fn,
        clippy::todo,
        clippy::unimplemented
    )
)]

mod cache;
mod chunk;
mod config;
mod document;
mod engine;
mod error;
pub mod markup;
mod measure;
mod page_store;
mod paginate;

pub use cache::{
    CacheError, ChapterCacheKey, FilePageCacheStore, PageCacheStore, PaginationProfileId,
};
pub use chunk::{ChunkKind, StyledChunk};
pub use config::{PagerOptions, PaginationConfig};
pub use document::{Chapter, InMemorySpine, PageGeometry, PagedDocument, SpineReader};
pub use engine::{Pager, RunConfig};
pub use error::{PagerError, ReaderError};
pub use markup::{format_chunk, MarkupBuffer};
pub use measure::{LayoutHeight, LayoutMeasurer, MeasureError};
pub use page_store::{ChapterPageSpan, Page, PageRange, PageStore};
pub use paginate::{
    paginate, paginate_with_cancel, CancelToken, ChapterPaginator, ChunkOutcome, NeverCancel,
    PaginationDiagnostic, SealedPage,
};
