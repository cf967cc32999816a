//! Recursive class crawler.
//!
//! Walks one class folder top-down and assembles its [`ClassDocument`]:
//!
//! ```text
//! class root ── assignments.md
//!  └── topic folders (numeric-prefix order)
//!       └── lesson folders
//!            ├── description.md, metadata.json
//!            └── files and folders, any depth ──► content tree
//! ```
//!
//! Every folder goes through [`Crawler::fetch_listing`], which serves the
//! cached listing when the run plan allows it and otherwise fetches, sorts,
//! and re-caches. Lesson folders whose listing came from the cache then try
//! the lesson object cache, keyed by the folder's stored `modifiedTime`; a hit
//! skips every download below the lesson.
//!
//! Only a failure to list the class root is fatal. Any other failure degrades
//! the affected part of the document and is counted in [`CrawlStats`].

use crate::cache::{CacheStats, CacheStore, FolderListingCache, LessonCache};
use crate::changes::RunPlan;
use crate::config::{ClassConfig, CrawlConfig};
use crate::markup::{render_assignments, render_markdown};
use crate::metadata::parse_metadata;
use crate::naming::{display_name, sort_listing, topic_slug};
use crate::remote::{RemoteError, RemoteStore, list_all_children};
use crate::types::{
    ClassDocument, ContentNode, Fetched, Lesson, LessonMetadata, LessonRecord, Listing,
    ListingEntry, Topic,
};
use std::collections::HashSet;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("cannot list root folder {folder} of class '{class}': {source}")]
    Root {
        class: String,
        folder: String,
        #[source]
        source: RemoteError,
    },
}

/// Counters over one or more class crawls.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CrawlStats {
    pub cache: CacheStats,
    /// Optional file reads that failed and were treated as absent.
    pub failed_reads: u32,
    /// Non-root folders that could not be listed and were treated as empty.
    pub failed_listings: u32,
}

impl CrawlStats {
    pub fn merge(&mut self, other: &CrawlStats) {
        self.cache.merge(&other.cache);
        self.failed_reads += other.failed_reads;
        self.failed_listings += other.failed_listings;
    }

    /// Failed reads plus failed listings.
    pub fn failures(&self) -> u32 {
        self.failed_reads + self.failed_listings
    }
}

/// Folder whose children are still being turned into content nodes.
struct Frame {
    folder: Option<(String, String)>,
    pending: std::vec::IntoIter<ListingEntry>,
    content: Vec<ContentNode>,
}

pub struct Crawler<'a, R: RemoteStore + ?Sized, S: CacheStore + ?Sized> {
    remote: &'a R,
    listings: FolderListingCache<'a, S>,
    lessons: LessonCache<'a, S>,
    plan: &'a RunPlan,
    config: &'a CrawlConfig,
    ignored: HashSet<String>,
    stats: CrawlStats,
}

impl<'a, R: RemoteStore + ?Sized, S: CacheStore + ?Sized> Crawler<'a, R, S> {
    pub fn new(remote: &'a R, store: &'a S, plan: &'a RunPlan, config: &'a CrawlConfig) -> Self {
        Self {
            remote,
            listings: FolderListingCache::new(store),
            lessons: LessonCache::new(store),
            plan,
            config,
            ignored: config.ignored_names(),
            stats: CrawlStats::default(),
        }
    }

    pub fn stats(&self) -> &CrawlStats {
        &self.stats
    }

    /// Crawl one class into its document.
    pub fn crawl_class(&mut self, class: &ClassConfig) -> Result<ClassDocument, CrawlError> {
        let root_id = class.folder_id();
        log::info!("crawling class '{}' ({})", class.name, root_id);
        let root = self
            .fetch_listing(&root_id)
            .map_err(|source| CrawlError::Root {
                class: class.name.clone(),
                folder: root_id.clone(),
                source,
            })?;

        let assignments = match root.file_named(&self.config.assignments.file) {
            Some(file) => self
                .read_text(&file.id)
                .map(|text| render_assignments(&text))
                .found()
                .unwrap_or_default(),
            None => String::new(),
        };

        let mut topics = Vec::new();
        for (index, entry) in root.folders().enumerate() {
            topics.push(self.crawl_topic(entry, index + 1));
        }

        Ok(ClassDocument {
            id: class.id,
            name: class.name.clone(),
            url_name: class.url_name.clone(),
            banner_url: class.banner_url.clone(),
            desc: String::new(),
            tags: topics.iter().map(|t| t.name.clone()).collect(),
            topics,
            assignments,
            active: class.active,
        })
    }

    fn crawl_topic(&mut self, entry: &ListingEntry, topic_index: usize) -> Topic {
        let mut lessons = Vec::new();
        if let Some(listing) = self.listing_or_empty(&entry.id) {
            for (index, lesson) in listing.folders().enumerate() {
                let position = format!("{}-{}", topic_index, index + 1);
                lessons.push(self.crawl_lesson(lesson, position));
            }
        }
        Topic {
            name: entry.name.clone(),
            id: topic_slug(&entry.name),
            lessons,
        }
    }

    fn crawl_lesson(&mut self, entry: &ListingEntry, position: String) -> Lesson {
        let Some(listing) = self.listing_or_empty(&entry.id) else {
            let record = LessonRecord {
                name: entry.name.clone(),
                desc: String::new(),
                content: Vec::new(),
                metadata: LessonMetadata::default(),
            };
            return Lesson::from_record(record, position);
        };

        if listing.from_cache {
            match self.lessons.get(&entry.id, &listing.modified_time) {
                Fetched::Found(record) if !self.touches_invalidated(&record) => {
                    self.stats.cache.lesson_hits += 1;
                    return Lesson::from_record(
                        LessonRecord {
                            name: entry.name.clone(),
                            ..record
                        },
                        position,
                    );
                }
                Fetched::Found(_) => {
                    log::debug!("lesson {} holds an invalidated folder", entry.id)
                }
                Fetched::Absent => {}
                Fetched::Failed(e) => log::warn!("ignoring cached lesson {}: {e}", entry.id),
            }
        }

        let failures = self.stats.failures();
        let record = self.derive_lesson(&entry.name, &listing);
        self.stats.cache.lesson_misses += 1;
        let stored = if self.stats.failures() > failures {
            // An older complete record may still match the timestamp.
            log::warn!("lesson {} is incomplete, not caching it", entry.id);
            self.lessons.remove(&entry.id)
        } else {
            self.lessons.put(&entry.id, &listing.modified_time, &record)
        };
        if let Err(e) = stored {
            log::warn!("cannot cache lesson {}: {e}", entry.id);
        }
        Lesson::from_record(record, position)
    }

    fn touches_invalidated(&self, record: &LessonRecord) -> bool {
        record
            .nested_folder_ids()
            .iter()
            .any(|id| self.plan.invalidated.contains(*id))
    }

    /// Description, metadata, and content tree of one lesson folder.
    pub fn derive_lesson(&mut self, name: &str, listing: &Listing) -> LessonRecord {
        let lessons = &self.config.lessons;
        let desc_id = listing.file_named(&lessons.description_file).map(|f| f.id.clone());
        let meta_id = listing.file_named(&lessons.metadata_file).map(|f| f.id.clone());

        let desc = desc_id
            .and_then(|id| self.read_text(&id).found())
            .map(|text| render_markdown(&text))
            .unwrap_or_default();
        let metadata = meta_id
            .and_then(|id| self.read_text(&id).found())
            .map(|text| parse_metadata(&text))
            .unwrap_or_default();

        LessonRecord {
            name: name.to_string(),
            desc,
            content: self.content_tree(listing),
            metadata,
        }
    }

    /// Content nodes for a lesson listing, descending into every nested
    /// folder with an explicit stack.
    fn content_tree(&mut self, listing: &Listing) -> Vec<ContentNode> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut stack = vec![Frame {
            folder: None,
            pending: listing.items.clone().into_iter(),
            content: Vec::new(),
        }];

        while let Some(frame) = stack.last_mut() {
            match frame.pending.next() {
                Some(entry) if entry.is_folder() => {
                    if !seen.insert(entry.id.clone()) {
                        log::warn!("folder {} appears twice in one lesson, skipping", entry.id);
                        continue;
                    }
                    let items = self
                        .listing_or_empty(&entry.id)
                        .map(|l| l.items)
                        .unwrap_or_default();
                    stack.push(Frame {
                        folder: Some((entry.name, entry.id)),
                        pending: items.into_iter(),
                        content: Vec::new(),
                    });
                }
                Some(entry) => {
                    if self.ignored.contains(&entry.name.to_lowercase()) {
                        continue;
                    }
                    frame.content.push(ContentNode::File {
                        name: display_name(&entry.name).to_string(),
                        url: self.remote.file_url(&entry.id),
                        file_name: entry.name,
                    });
                }
                None => {
                    let Some(done) = stack.pop() else { break };
                    let Some((name, id)) = done.folder else {
                        return done.content;
                    };
                    if let Some(parent) = stack.last_mut() {
                        parent.content.push(ContentNode::Folder {
                            name,
                            id,
                            content: done.content,
                        });
                    }
                }
            }
        }
        Vec::new()
    }

    // =========================================================================
    // Remote access
    // =========================================================================

    /// Listing of a folder, from cache when the run plan trusts it.
    pub fn fetch_listing(&mut self, folder_id: &str) -> Result<Listing, RemoteError> {
        if self.plan.caching_enabled && !self.plan.invalidated.contains(folder_id) {
            match self.listings.read(folder_id) {
                Fetched::Found(cached) => {
                    self.stats.cache.listing_hits += 1;
                    return Ok(Listing {
                        items: cached.items,
                        modified_time: cached.modified_time,
                        from_cache: true,
                    });
                }
                Fetched::Absent => {}
                Fetched::Failed(e) => log::warn!("ignoring cached listing of {folder_id}: {e}"),
            }
        }

        let mut items = list_all_children(self.remote, folder_id)?;
        let modified_time = self.remote.modified_time(folder_id)?;
        sort_listing(&mut items);
        if let Err(e) = self.listings.write(folder_id, &items, &modified_time) {
            log::warn!("cannot cache listing of {folder_id}: {e}");
        }
        self.stats.cache.listing_fetches += 1;
        log::debug!("listed {folder_id}: {} children", items.len());
        Ok(Listing {
            items,
            modified_time,
            from_cache: false,
        })
    }

    /// Listing of a non-root folder. On failure the stale cache entry is
    /// dropped and `None` is returned so the caller can treat it as empty.
    fn listing_or_empty(&mut self, folder_id: &str) -> Option<Listing> {
        match self.fetch_listing(folder_id) {
            Ok(listing) => Some(listing),
            Err(e) => {
                log::warn!("cannot list folder {folder_id}, treating as empty: {e}");
                self.stats.failed_listings += 1;
                if let Err(e) = self.listings.invalidate(folder_id) {
                    log::warn!("cannot drop cached listing of {folder_id}: {e}");
                }
                None
            }
        }
    }

    /// Download a text file. Failures other than "not found" are logged and
    /// counted.
    fn read_text(&mut self, file_id: &str) -> Fetched<String> {
        match self.remote.read_file(file_id) {
            Ok(bytes) => Fetched::Found(String::from_utf8_lossy(&bytes).into_owned()),
            Err(RemoteError::NotFound(_)) => Fetched::Absent,
            Err(e) => {
                log::warn!("cannot read file {file_id}: {e}");
                self.stats.failed_reads += 1;
                Fetched::Failed(e.to_string())
            }
        }
    }
}
