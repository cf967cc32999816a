//! Change feed tracking.
//!
//! Between runs the remote store keeps a feed of every item that changed. A
//! run replays the feed from the token stored by the previous run and turns
//! the changed items into the set of folders whose cached listings can no
//! longer be trusted.
//!
//! ```text
//! stored token ──► fetch_since ──► changes ──► compute_invalidated_folders
//!                       │                             │
//!                       ▼                             ▼
//!               changes_api/ log               invalidated set ──► crawl
//!                                                                    │
//!              state/page_token.json ◄──────── commit(pending) ◄─────┘
//! ```
//!
//! The token is only advanced after every class has been written. A run that
//! dies halfway replays the same changes next time.

use crate::cache::{CacheError, CacheStore, FolderListingCache, Namespace};
use crate::remote::{ChangeEntry, RemoteError, RemoteStore};
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Key of the continuation token inside [`Namespace::State`].
pub const PAGE_TOKEN_KEY: &str = "page_token";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredToken {
    token: String,
    saved_at: DateTime<Utc>,
}

/// Every change since a token, plus where to resume next time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeBatch {
    pub changes: Vec<ChangeEntry>,
    /// Only present once the feed was read to the end.
    pub next_token: Option<String>,
}

/// Page through the change feed until it is exhausted.
pub fn fetch_since<R: RemoteStore + ?Sized>(
    remote: &R,
    token: &str,
) -> Result<ChangeBatch, RemoteError> {
    let mut batch = ChangeBatch::default();
    let mut page_token = token.to_string();
    loop {
        let page = remote.list_changes(&page_token)?;
        batch.changes.extend(page.changes);
        batch.next_token = page.new_start_page_token;
        match page.next_page_token {
            Some(next) => page_token = next,
            None => return Ok(batch),
        }
    }
}

/// Folders whose listings are stale given a batch of changes.
///
/// A change that reports its parents invalidates them. Removed items report
/// none, and moved items only report where they went, so both are also looked
/// up in the cached listings to find the folder that still lists them.
pub fn compute_invalidated_folders<S: CacheStore + ?Sized>(
    changes: &[ChangeEntry],
    listings: &FolderListingCache<'_, S>,
) -> BTreeSet<String> {
    let mut invalidated = BTreeSet::new();
    let mut lookups = Vec::new();
    for change in changes {
        invalidated.extend(change.parents.iter().cloned());
        if let Some(id) = &change.file_id
            && (change.removed || !change.parents.is_empty())
        {
            lookups.push(id.as_str());
        }
    }
    if lookups.is_empty() {
        return invalidated;
    }

    let containing = match reverse_index(listings) {
        Ok(index) => index,
        Err(e) => {
            log::warn!("cannot scan cached listings for removed items: {e}");
            return invalidated;
        }
    };
    for id in lookups {
        match containing.get(id) {
            Some(folders) => invalidated.extend(folders.iter().cloned()),
            None => log::debug!("changed item {id} is not in any cached listing"),
        }
    }
    invalidated
}

/// Child id to every cached folder listing it.
fn reverse_index<S: CacheStore + ?Sized>(
    listings: &FolderListingCache<'_, S>,
) -> Result<HashMap<String, Vec<String>>, CacheError> {
    let mut index: HashMap<String, Vec<String>> = HashMap::new();
    for entry in listings.entries()? {
        for item in entry.items {
            index.entry(item.id).or_default().push(entry.folder_id.clone());
        }
    }
    Ok(index)
}

// =============================================================================
// Persistence
// =============================================================================

/// One audit record of a fetched batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeLogRecord {
    pub timestamp: String,
    pub saved_at: DateTime<Utc>,
    pub new_start_page_token: Option<String>,
    pub change_count: usize,
    pub changes: Vec<ChangeEntry>,
}

/// Append a batch to the change log. Returns the record's key.
pub fn persist_batch<S: CacheStore + ?Sized>(
    store: &S,
    batch: &ChangeBatch,
) -> Result<String, CacheError> {
    let timestamp = Local::now().format("%d-%m-%Y_%H-%M-%S-%3f").to_string();
    let record = ChangeLogRecord {
        timestamp: timestamp.clone(),
        saved_at: Utc::now(),
        new_start_page_token: batch.next_token.clone(),
        change_count: batch.changes.len(),
        changes: batch.changes.clone(),
    };
    let key = format!("changes-{timestamp}");
    store.save(
        Namespace::Changes,
        &key,
        &serde_json::to_string_pretty(&record)?,
    )?;
    Ok(key)
}

/// Stored continuation token. An unreadable token reads as none.
pub fn load_token<S: CacheStore + ?Sized>(store: &S) -> Option<String> {
    let raw = match store.load(Namespace::State, PAGE_TOKEN_KEY) {
        Ok(raw) => raw?,
        Err(e) => {
            log::warn!("cannot read page token: {e}");
            return None;
        }
    };
    match serde_json::from_str::<StoredToken>(&raw) {
        Ok(stored) if !stored.token.is_empty() => Some(stored.token),
        Ok(_) => None,
        Err(e) => {
            log::warn!("discarding corrupt page token: {e}");
            None
        }
    }
}

pub fn save_token<S: CacheStore + ?Sized>(store: &S, token: &str) -> Result<(), CacheError> {
    let stored = StoredToken {
        token: token.to_string(),
        saved_at: Utc::now(),
    };
    store.save(
        Namespace::State,
        PAGE_TOKEN_KEY,
        &serde_json::to_string_pretty(&stored)?,
    )
}

pub fn clear_token<S: CacheStore + ?Sized>(store: &S) -> Result<(), CacheError> {
    store.remove(Namespace::State, PAGE_TOKEN_KEY)
}

// =============================================================================
// Run planning
// =============================================================================

/// What a run may trust, decided before any folder is crawled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunPlan {
    /// Whether cached listings may be used at all.
    pub caching_enabled: bool,
    /// Folders whose cached listings must be bypassed.
    pub invalidated: BTreeSet<String>,
    /// Token to store once the run has finished.
    pub pending_token: Option<String>,
    /// Changes replayed from the feed (0 for an uncached run).
    pub change_count: usize,
}

pub struct ChangeTracker<'a, R: RemoteStore + ?Sized, S: CacheStore + ?Sized> {
    remote: &'a R,
    store: &'a S,
}

impl<'a, R: RemoteStore + ?Sized, S: CacheStore + ?Sized> ChangeTracker<'a, R, S> {
    pub fn new(remote: &'a R, store: &'a S) -> Self {
        Self { remote, store }
    }

    /// Decide what this run may trust.
    ///
    /// - `use_cache == false` or no stored token: full uncached crawl; a fresh
    ///   start token is requested now so edits made during the crawl are
    ///   replayed next run.
    /// - stored token, feed readable: cached crawl minus the invalidated set.
    /// - stored token, feed unreadable: token dropped, uncached crawl, nothing
    ///   committed (next run is a full crawl too).
    pub fn plan(&self, use_cache: bool) -> RunPlan {
        let stored = if use_cache {
            load_token(self.store)
        } else {
            None
        };
        let Some(token) = stored else {
            if use_cache {
                log::info!("no change-feed token stored, crawling everything");
            }
            return RunPlan {
                pending_token: self.fresh_token(),
                ..Default::default()
            };
        };

        match fetch_since(self.remote, &token) {
            Ok(batch) => {
                if let Err(e) = persist_batch(self.store, &batch) {
                    log::warn!("cannot write change log: {e}");
                }
                let invalidated =
                    compute_invalidated_folders(&batch.changes, &FolderListingCache::new(self.store));
                log::info!(
                    "{} changes since last run, {} folders invalidated",
                    batch.changes.len(),
                    invalidated.len()
                );
                RunPlan {
                    caching_enabled: true,
                    invalidated,
                    pending_token: batch.next_token,
                    change_count: batch.changes.len(),
                }
            }
            Err(e) => {
                log::error!("change feed unavailable ({e}), crawling without cache");
                if let Err(e) = clear_token(self.store) {
                    log::warn!("cannot delete page token: {e}");
                }
                RunPlan::default()
            }
        }
    }

    /// Store the plan's pending token. Last step of a successful run.
    pub fn commit(&self, plan: &RunPlan) -> Result<(), CacheError> {
        match &plan.pending_token {
            Some(token) => {
                save_token(self.store, token)?;
                log::debug!("stored change-feed token {token}");
            }
            None => log::debug!("no change-feed token to store"),
        }
        Ok(())
    }

    fn fresh_token(&self) -> Option<String> {
        match self.remote.start_page_token() {
            Ok(token) => Some(token),
            Err(e) => {
                log::warn!("cannot get change-feed start token: {e}");
                None
            }
        }
    }
}
