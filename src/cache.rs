//! Local caches for incremental crawls.
//!
//! Listing a Drive folder is one round trip; deriving a lesson (download the
//! description, download the metadata, list every nested folder) is dozens.
//! This module lets a run skip both when nothing changed since the last one.
//!
//! # Design
//!
//! Two caches sit on top of a namespaced key/value [`CacheStore`]:
//!
//! - **Folder listings** ([`FolderListingCache`]): per folder id, the sorted
//!   children and the folder's `modifiedTime` at capture. Whether an entry may
//!   be trusted is decided by the caller from the change feed; this module
//!   never second-guesses it.
//!
//! - **Lesson objects** ([`LessonCache`]): per lesson folder id, the derived
//!   [`LessonRecord`]. A lookup only hits when the stored `modifiedTime` is
//!   exactly the one the caller saw this run.
//!
//! Freshness is plain string equality on the remote timestamp. There is no
//! dirty flag anywhere; the timestamp is the only source of truth.
//!
//! ## Storage
//!
//! [`FsCacheStore`] keeps one pretty-printed JSON file per entity:
//!
//! ```text
//! cache/
//! ├── folder_listings/<folder-id>.json
//! ├── lesson_objects/<folder-id>.json
//! ├── state/page_token.json
//! └── changes_api/changes-16-10-2026_08-30-12-417.json
//! ```
//!
//! Every file carries its own timestamp, so a run that was killed halfway
//! leaves files that the next run re-validates one by one.
//!
//! ## Corruption
//!
//! An unreadable or unparsable entry, or one written by a different format
//! version, reads as a miss. It is logged and never fatal.

use crate::naming::cache_key;
use crate::types::{Fetched, LessonRecord, ListingEntry};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Version of the listing entry format. Bump to drop every cached listing.
const LISTING_FORMAT_VERSION: u32 = 1;

/// Version of the lesson entry format. Bump when [`LessonRecord`] changes shape.
const LESSON_FORMAT_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Independent key spaces inside a cache store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Namespace {
    FolderListings,
    LessonObjects,
    /// Append-only audit trail of change-feed batches.
    Changes,
    /// Single-value run state (the change-feed continuation token).
    State,
}

impl Namespace {
    pub fn dir_name(self) -> &'static str {
        match self {
            Namespace::FolderListings => "folder_listings",
            Namespace::LessonObjects => "lesson_objects",
            Namespace::Changes => "changes_api",
            Namespace::State => "state",
        }
    }
}

/// Persistent key/value storage for cache entries.
///
/// Keys are raw remote ids; implementations make them safe for their medium.
/// Values are serialized JSON documents.
pub trait CacheStore {
    /// `Ok(None)` when no entry exists.
    fn load(&self, ns: Namespace, key: &str) -> Result<Option<String>, CacheError>;

    /// Write an entry, replacing any previous value.
    fn save(&self, ns: Namespace, key: &str, contents: &str) -> Result<(), CacheError>;

    /// Delete an entry. Deleting a missing entry is not an error.
    fn remove(&self, ns: Namespace, key: &str) -> Result<(), CacheError>;

    /// Contents of every entry in a namespace, in unspecified order.
    fn load_all(&self, ns: Namespace) -> Result<Vec<String>, CacheError>;

    /// Delete every entry in a namespace.
    fn clear(&self, ns: Namespace) -> Result<(), CacheError>;
}

// =============================================================================
// Filesystem store
// =============================================================================

/// File-per-entity store rooted at a cache directory.
#[derive(Debug, Clone)]
pub struct FsCacheStore {
    root: PathBuf,
}

impl FsCacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn dir(&self, ns: Namespace) -> PathBuf {
        self.root.join(ns.dir_name())
    }

    fn path(&self, ns: Namespace, key: &str) -> PathBuf {
        self.dir(ns).join(format!("{}.json", cache_key(key)))
    }
}

impl CacheStore for FsCacheStore {
    fn load(&self, ns: Namespace, key: &str) -> Result<Option<String>, CacheError> {
        match fs::read_to_string(self.path(ns, key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, ns: Namespace, key: &str, contents: &str) -> Result<(), CacheError> {
        fs::create_dir_all(self.dir(ns))?;
        fs::write(self.path(ns, key), contents)?;
        Ok(())
    }

    fn remove(&self, ns: Namespace, key: &str) -> Result<(), CacheError> {
        match fs::remove_file(self.path(ns, key)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn load_all(&self, ns: Namespace) -> Result<Vec<String>, CacheError> {
        let dir = self.dir(ns);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut contents = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().is_none_or(|e| e != "json") {
                continue;
            }
            match fs::read_to_string(&path) {
                Ok(c) => contents.push(c),
                Err(e) => log::warn!("skipping unreadable cache file {}: {e}", path.display()),
            }
        }
        Ok(contents)
    }

    fn clear(&self, ns: Namespace) -> Result<(), CacheError> {
        match fs::remove_dir_all(self.dir(ns)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

// =============================================================================
// In-memory store
// =============================================================================

/// Store that lives for one process. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RefCell<BTreeMap<(Namespace, String), String>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys present in a namespace, sorted.
    pub fn keys(&self, ns: Namespace) -> Vec<String> {
        self.entries
            .borrow()
            .keys()
            .filter(|(n, _)| *n == ns)
            .map(|(_, k)| k.clone())
            .collect()
    }
}

impl CacheStore for MemoryCacheStore {
    fn load(&self, ns: Namespace, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entries.borrow().get(&(ns, key.to_string())).cloned())
    }

    fn save(&self, ns: Namespace, key: &str, contents: &str) -> Result<(), CacheError> {
        self.entries
            .borrow_mut()
            .insert((ns, key.to_string()), contents.to_string());
        Ok(())
    }

    fn remove(&self, ns: Namespace, key: &str) -> Result<(), CacheError> {
        self.entries.borrow_mut().remove(&(ns, key.to_string()));
        Ok(())
    }

    fn load_all(&self, ns: Namespace) -> Result<Vec<String>, CacheError> {
        Ok(self
            .entries
            .borrow()
            .iter()
            .filter(|((n, _), _)| *n == ns)
            .map(|(_, v)| v.clone())
            .collect())
    }

    fn clear(&self, ns: Namespace) -> Result<(), CacheError> {
        self.entries.borrow_mut().retain(|(n, _), _| *n != ns);
        Ok(())
    }
}

/// Load and decode one entry, folding every failure into [`Fetched`].
fn load_entry<T, S>(store: &S, ns: Namespace, key: &str) -> Fetched<T>
where
    T: for<'de> Deserialize<'de>,
    S: CacheStore + ?Sized,
{
    match store.load(ns, key) {
        Ok(None) => Fetched::Absent,
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(entry) => Fetched::Found(entry),
            Err(e) => Fetched::Failed(format!("corrupt entry: {e}")),
        },
        Err(e) => Fetched::Failed(e.to_string()),
    }
}

// =============================================================================
// Folder listing cache
// =============================================================================

/// On-disk form of one cached folder listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListingCacheEntry {
    pub version: u32,
    pub folder_id: String,
    pub items: Vec<ListingEntry>,
    pub modified_time: String,
    pub cached_at: DateTime<Utc>,
}

/// A listing read back from the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedListing {
    pub items: Vec<ListingEntry>,
    pub modified_time: String,
}

pub struct FolderListingCache<'a, S: CacheStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: CacheStore + ?Sized> FolderListingCache<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Cached listing for a folder. A version mismatch reads as absent.
    pub fn read(&self, folder_id: &str) -> Fetched<CachedListing> {
        match load_entry::<ListingCacheEntry, S>(self.store, Namespace::FolderListings, folder_id)
        {
            Fetched::Found(entry) if entry.version == LISTING_FORMAT_VERSION => {
                Fetched::Found(CachedListing {
                    items: entry.items,
                    modified_time: entry.modified_time,
                })
            }
            Fetched::Found(_) | Fetched::Absent => Fetched::Absent,
            Fetched::Failed(e) => Fetched::Failed(e),
        }
    }

    /// Persist a full listing, overwriting any prior entry.
    pub fn write(
        &self,
        folder_id: &str,
        items: &[ListingEntry],
        modified_time: &str,
    ) -> Result<(), CacheError> {
        let entry = ListingCacheEntry {
            version: LISTING_FORMAT_VERSION,
            folder_id: folder_id.to_string(),
            items: items.to_vec(),
            modified_time: modified_time.to_string(),
            cached_at: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&entry)?;
        self.store.save(Namespace::FolderListings, folder_id, &json)
    }

    pub fn invalidate(&self, folder_id: &str) -> Result<(), CacheError> {
        self.store.remove(Namespace::FolderListings, folder_id)
    }

    /// Drop every listing, every lesson object, and the continuation token.
    ///
    /// The token has to go too: replaying changes against a cache that no
    /// longer exists would leave the next run trusting nothing it can verify.
    pub fn invalidate_all(&self) -> Result<(), CacheError> {
        self.store.clear(Namespace::FolderListings)?;
        self.store.clear(Namespace::LessonObjects)?;
        self.store.clear(Namespace::State)
    }

    /// Every readable listing entry. Corrupt files are skipped.
    pub fn entries(&self) -> Result<Vec<ListingCacheEntry>, CacheError> {
        Ok(self
            .store
            .load_all(Namespace::FolderListings)?
            .iter()
            .filter_map(|raw| serde_json::from_str::<ListingCacheEntry>(raw).ok())
            .filter(|e| e.version == LISTING_FORMAT_VERSION)
            .collect())
    }
}

// =============================================================================
// Lesson object cache
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LessonCacheEntry {
    pub version: u32,
    pub modified_time: String,
    pub record: LessonRecord,
}

pub struct LessonCache<'a, S: CacheStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: CacheStore + ?Sized> LessonCache<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Cached record, only if it was stored under exactly `current_modified_time`.
    pub fn get(&self, lesson_folder_id: &str, current_modified_time: &str) -> Fetched<LessonRecord> {
        match load_entry::<LessonCacheEntry, S>(
            self.store,
            Namespace::LessonObjects,
            lesson_folder_id,
        ) {
            Fetched::Found(entry)
                if entry.version == LESSON_FORMAT_VERSION
                    && entry.modified_time == current_modified_time =>
            {
                Fetched::Found(entry.record)
            }
            Fetched::Found(_) | Fetched::Absent => Fetched::Absent,
            Fetched::Failed(e) => Fetched::Failed(e),
        }
    }

    pub fn put(
        &self,
        lesson_folder_id: &str,
        modified_time: &str,
        record: &LessonRecord,
    ) -> Result<(), CacheError> {
        let entry = LessonCacheEntry {
            version: LESSON_FORMAT_VERSION,
            modified_time: modified_time.to_string(),
            record: record.clone(),
        };
        let json = serde_json::to_string_pretty(&entry)?;
        self.store.save(Namespace::LessonObjects, lesson_folder_id, &json)
    }

    pub fn remove(&self, lesson_folder_id: &str) -> Result<(), CacheError> {
        self.store.remove(Namespace::LessonObjects, lesson_folder_id)
    }
}

// =============================================================================
// Stats
// =============================================================================

/// Cache behaviour over one run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub listing_hits: u32,
    pub listing_fetches: u32,
    pub lesson_hits: u32,
    pub lesson_misses: u32,
}

impl CacheStats {
    pub fn merge(&mut self, other: &CacheStats) {
        self.listing_hits += other.listing_hits;
        self.listing_fetches += other.listing_fetches;
        self.lesson_hits += other.lesson_hits;
        self.lesson_misses += other.lesson_misses;
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.listing_hits > 0 || self.lesson_hits > 0 {
            write!(
                f,
                "listings: {} cached, {} fetched; lessons: {} cached, {} derived",
                self.listing_hits, self.listing_fetches, self.lesson_hits, self.lesson_misses
            )
        } else {
            write!(
                f,
                "listings: {} fetched; lessons: {} derived",
                self.listing_fetches, self.lesson_misses
            )
        }
    }
}
