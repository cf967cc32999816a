//! One full sync run.
//!
//! ```text
//! plan (change feed) → crawl each class → write class-<url_name>.json → commit token
//! ```
//!
//! The continuation token is committed last and only when every class was
//! written. A class whose root could not be listed keeps the old token in
//! place, so the changes it missed are replayed next run.

use crate::cache::{CacheError, CacheStore};
use crate::changes::{ChangeTracker, RunPlan};
use crate::config::{ClassConfig, CrawlConfig};
use crate::crawl::{CrawlStats, Crawler};
use crate::remote::RemoteStore;
use crate::types::ClassDocument;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

/// What happened to one configured class.
#[derive(Debug)]
pub enum ClassOutcome {
    Written {
        path: PathBuf,
        document: ClassDocument,
    },
    Failed {
        class: String,
        error: String,
    },
}

#[derive(Debug)]
pub struct SyncReport {
    pub plan: RunPlan,
    pub classes: Vec<ClassOutcome>,
    pub stats: CrawlStats,
    /// Whether the change-feed token was advanced.
    pub token_committed: bool,
}

impl SyncReport {
    pub fn failed_classes(&self) -> usize {
        self.classes
            .iter()
            .filter(|c| matches!(c, ClassOutcome::Failed { .. }))
            .count()
    }
}

/// Crawl every configured class and write its document.
pub fn sync<R, S>(
    remote: &R,
    store: &S,
    config: &CrawlConfig,
    use_cache: bool,
) -> Result<SyncReport, SyncError>
where
    R: RemoteStore + ?Sized,
    S: CacheStore + ?Sized,
{
    let tracker = ChangeTracker::new(remote, store);
    let plan = tracker.plan(use_cache);

    let mut crawler = Crawler::new(remote, store, &plan, config);
    let mut classes = Vec::new();
    for class in &config.classes {
        match crawler.crawl_class(class) {
            Ok(document) => {
                let path = write_document(&config.data_dir, class, &document)?;
                log::info!("wrote {}", path.display());
                classes.push(ClassOutcome::Written { path, document });
            }
            Err(e) => {
                log::error!("{e}");
                classes.push(ClassOutcome::Failed {
                    class: class.name.clone(),
                    error: e.to_string(),
                });
            }
        }
    }
    let stats = crawler.stats().clone();

    let all_written = classes
        .iter()
        .all(|c| matches!(c, ClassOutcome::Written { .. }));
    let token_committed = all_written && plan.pending_token.is_some();
    if all_written {
        tracker.commit(&plan)?;
    } else {
        log::warn!("not advancing the change-feed token: some classes failed");
    }

    Ok(SyncReport {
        plan,
        classes,
        stats,
        token_committed,
    })
}

/// Write a class document as pretty-printed JSON. Returns its path.
pub fn write_document(
    data_dir: &Path,
    class: &ClassConfig,
    document: &ClassDocument,
) -> Result<PathBuf, SyncError> {
    fs::create_dir_all(data_dir)?;
    let path = data_dir.join(class.output_filename());
    let json = serde_json::to_string_pretty(document)?;
    fs::write(&path, json)?;
    Ok(path)
}
