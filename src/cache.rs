//! Optional per-chapter page cache.
//!
//! Entries are keyed by the pagination profile (geometry plus measurer
//! identity), the chapter index and a digest of the chapter's formatted
//! content, so pages are only replayed for the exact text they were cut from.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::config::PaginationConfig;
use crate::document::Chapter;
use crate::markup::format_chunk;
use crate::page_store::Page;

/// FNV-1a over length-prefixed fields, stable across platforms.
#[derive(Clone, Copy, Debug)]
struct Digest(u64);

impl Digest {
    fn new() -> Self {
        Self(0xcbf2_9ce4_8422_2325)
    }

    fn bytes(mut self, payload: &[u8]) -> Self {
        for b in payload {
            self.0 ^= u64::from(*b);
            self.0 = self.0.wrapping_mul(0x0000_0100_0000_01b3);
        }
        self
    }

    fn field(self, payload: &[u8]) -> Self {
        self.bytes(&(payload.len() as u64).to_le_bytes()).bytes(payload)
    }

    fn int(self, value: i32) -> Self {
        self.bytes(&value.to_le_bytes())
    }
}

/// Fingerprint of every setting that affects page boundaries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaginationProfileId(u64);

impl PaginationProfileId {
    /// Profile for `config` laid out by a measurer with `measurer_fingerprint`.
    pub fn new(config: &PaginationConfig, measurer_fingerprint: &str) -> Self {
        let digest = Digest::new()
            .int(config.page_width)
            .int(config.page_height)
            .int(config.margin)
            .field(measurer_fingerprint.as_bytes());
        Self(digest.0)
    }

    /// Raw 64-bit digest.
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PaginationProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Identity of one chapter's pages under one profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChapterCacheKey {
    pub profile: PaginationProfileId,
    pub chapter_index: usize,
    /// Digest of the chapter's formatted fragments in reading order.
    pub content_digest: u64,
}

impl ChapterCacheKey {
    /// Key `chapter` under `profile`. Dropped chunks do not affect the key.
    pub fn for_chapter(profile: PaginationProfileId, chapter: &Chapter) -> Self {
        let digest = chapter
            .chunks
            .iter()
            .filter_map(format_chunk)
            .fold(Digest::new(), |digest, fragment| {
                digest.field(fragment.as_bytes())
            });
        Self {
            profile,
            chapter_index: chapter.index,
            content_digest: digest.0,
        }
    }
}

/// Failure to persist a chapter's pages.
#[derive(Debug)]
pub enum CacheError {
    Io(io::Error),
    Encode(serde_json::Error),
    /// Encoded entry is larger than the store accepts.
    TooLarge { size: usize, limit: usize },
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "cache I/O failed: {}", err),
            Self::Encode(err) => write!(f, "cache entry encoding failed: {}", err),
            Self::TooLarge { size, limit } => {
                write!(f, "cache entry of {} bytes exceeds limit of {}", size, limit)
            }
        }
    }
}

impl std::error::Error for CacheError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Encode(err) => Some(err),
            Self::TooLarge { .. } => None,
        }
    }
}

impl From<io::Error> for CacheError {
    fn from(err: io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encode(err)
    }
}

/// Storage for paginated chapters.
///
/// A load that cannot produce valid pages is a miss; store failures are
/// reported to the caller, which treats them as non-fatal.
pub trait PageCacheStore {
    fn load_chapter_pages(&self, key: &ChapterCacheKey) -> Option<Vec<Page>>;

    fn store_chapter_pages(&self, key: &ChapterCacheKey, pages: &[Page]) -> Result<(), CacheError>;
}

const ENTRY_VERSION: u16 = 2;
const DEFAULT_MAX_ENTRY_BYTES: usize = 4 * 1024 * 1024;

/// JSON files under a cache root, one per chapter entry:
/// `<root>/<profile>/chapter-<index>-<content digest>.json`.
#[derive(Clone, Debug)]
pub struct FilePageCacheStore {
    root: PathBuf,
    max_entry_bytes: usize,
}

impl FilePageCacheStore {
    /// Create a store rooted at `root`; directories are made on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_entry_bytes: DEFAULT_MAX_ENTRY_BYTES,
        }
    }

    /// Cap the encoded size of a single entry; `0` is treated as `1`.
    pub fn with_max_entry_bytes(mut self, max_entry_bytes: usize) -> Self {
        self.max_entry_bytes = max_entry_bytes.max(1);
        self
    }

    /// Directory holding every profile's entries.
    pub fn cache_root(&self) -> &Path {
        &self.root
    }

    /// Largest encoded entry the store will write or read.
    pub fn max_entry_bytes(&self) -> usize {
        self.max_entry_bytes
    }

    /// File holding the entry for `key`.
    pub fn entry_path(&self, key: &ChapterCacheKey) -> PathBuf {
        self.root.join(key.profile.to_string()).join(format!(
            "chapter-{}-{:016x}.json",
            key.chapter_index, key.content_digest
        ))
    }
}

impl PageCacheStore for FilePageCacheStore {
    fn load_chapter_pages(&self, key: &ChapterCacheKey) -> Option<Vec<Page>> {
        let path = self.entry_path(key);
        let size = fs::metadata(&path).ok()?.len();
        if size > self.max_entry_bytes as u64 {
            log::debug!("ignoring oversized cache entry {}", path.display());
            return None;
        }
        let payload = fs::read(&path).ok()?;
        let entry: CacheEntry = serde_json::from_slice(&payload).ok()?;
        entry.into_pages(key)
    }

    fn store_chapter_pages(&self, key: &ChapterCacheKey, pages: &[Page]) -> Result<(), CacheError> {
        let entry = CacheEntry {
            version: ENTRY_VERSION,
            key: *key,
            pages: pages.to_vec(),
        };
        let payload = serde_json::to_vec(&entry)?;
        if payload.len() > self.max_entry_bytes {
            return Err(CacheError::TooLarge {
                size: payload.len(),
                limit: self.max_entry_bytes,
            });
        }

        let path = self.entry_path(key);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let partial = path.with_extension(format!("json.{}.partial", std::process::id()));
        let written = File::create(&partial)
            .and_then(|mut file| {
                file.write_all(&payload)?;
                file.sync_all()
            })
            .and_then(|()| fs::rename(&partial, &path));
        if let Err(err) = written {
            let _ = fs::remove_file(&partial);
            return Err(err.into());
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct CacheEntry {
    version: u16,
    key: ChapterCacheKey,
    pages: Vec<Page>,
}

impl CacheEntry {
    /// Pages if the entry belongs to `key` and is internally consistent.
    fn into_pages(self, key: &ChapterCacheKey) -> Option<Vec<Page>> {
        if self.version != ENTRY_VERSION || self.key != *key {
            return None;
        }
        let consistent = self.pages.iter().enumerate().all(|(i, page)| {
            page.chapter_index == key.chapter_index && page.chapter_page_index == i
        });
        consistent.then_some(self.pages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::StyledChunk;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static ROOT_NONCE: AtomicUsize = AtomicUsize::new(0);

    fn temp_cache_root(label: &str) -> PathBuf {
        let nonce = ROOT_NONCE.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!(
            "epub-pager-{label}-{}-{nonce}",
            std::process::id()
        ))
    }

    fn profile() -> PaginationProfileId {
        PaginationProfileId::new(&PaginationConfig::default(), "fixed")
    }

    fn chapter(index: usize, text: &str) -> Chapter {
        Chapter::new(index, "c.xhtml", vec![StyledChunk::normal(text)])
    }

    fn pages_for(chapter: usize, text: &str) -> Vec<Page> {
        vec![Page::new(chapter, 0, text.to_string())]
    }

    #[test]
    fn profile_tracks_geometry_and_measurer() {
        let base = PaginationConfig::default();
        assert_eq!(profile(), PaginationProfileId::new(&base, "fixed"));
        assert_ne!(profile(), PaginationProfileId::new(&base, "other"));
        assert_ne!(
            profile(),
            PaginationProfileId::new(&base.with_margin(41), "fixed")
        );
        assert_eq!(profile().to_string().len(), 16);
    }

    #[test]
    fn content_digest_ignores_dropped_chunks_only() {
        let plain = chapter(0, "text");
        let mut with_drop = plain.clone();
        with_drop.chunks.push(StyledChunk::other("img", "cover"));
        let restyled = Chapter::new(0, "c.xhtml", vec![StyledChunk::bold("text")]);
        let split = Chapter::new(
            0,
            "c.xhtml",
            vec![StyledChunk::normal("te"), StyledChunk::normal("xt")],
        );

        let key = ChapterCacheKey::for_chapter(profile(), &plain);
        assert_eq!(key, ChapterCacheKey::for_chapter(profile(), &with_drop));
        assert_ne!(key, ChapterCacheKey::for_chapter(profile(), &restyled));
        assert_ne!(key, ChapterCacheKey::for_chapter(profile(), &split));
        assert_ne!(key, ChapterCacheKey::for_chapter(profile(), &chapter(0, "other")));
    }

    #[test]
    fn stored_pages_load_only_for_matching_content() {
        let root = temp_cache_root("content");
        let store = FilePageCacheStore::new(&root);
        let key_a = ChapterCacheKey::for_chapter(profile(), &chapter(2, "book A"));
        let key_b = ChapterCacheKey::for_chapter(profile(), &chapter(2, "book B"));

        assert!(store.load_chapter_pages(&key_a).is_none());
        store
            .store_chapter_pages(&key_a, &pages_for(2, "book A"))
            .expect("store");
        assert_eq!(store.load_chapter_pages(&key_a), Some(pages_for(2, "book A")));
        assert!(store.load_chapter_pages(&key_b).is_none());

        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn oversized_entry_is_rejected_and_leaves_no_files() {
        let root = temp_cache_root("limit");
        let store = FilePageCacheStore::new(&root).with_max_entry_bytes(16);
        let key = ChapterCacheKey::for_chapter(profile(), &chapter(0, "x"));

        let err = store
            .store_chapter_pages(&key, &pages_for(0, "x"))
            .expect_err("entry exceeds limit");
        assert!(matches!(err, CacheError::TooLarge { limit: 16, .. }));
        assert!(!root.exists());
    }

    #[test]
    fn entry_for_another_key_is_a_miss() {
        let root = temp_cache_root("mismatch");
        let store = FilePageCacheStore::new(&root);
        let key = ChapterCacheKey::for_chapter(profile(), &chapter(1, "x"));
        let path = store.entry_path(&key);
        fs::create_dir_all(path.parent().expect("entry has a parent")).expect("mkdir");

        let foreign = CacheEntry {
            version: ENTRY_VERSION,
            key: ChapterCacheKey::for_chapter(profile(), &chapter(1, "y")),
            pages: pages_for(1, "y"),
        };
        fs::write(&path, serde_json::to_vec(&foreign).expect("encode")).expect("write");
        assert!(store.load_chapter_pages(&key).is_none());

        let misnumbered = CacheEntry {
            version: ENTRY_VERSION,
            key,
            pages: pages_for(7, "x"),
        };
        fs::write(&path, serde_json::to_vec(&misnumbered).expect("encode")).expect("write");
        assert!(store.load_chapter_pages(&key).is_none());

        fs::write(&path, b"{not json").expect("write");
        assert!(store.load_chapter_pages(&key).is_none());

        let _ = fs::remove_dir_all(root);
    }
}
