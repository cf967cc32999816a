//! # classdrive
//!
//! Flattens class folders on Google Drive into one JSON document per class,
//! and keeps those documents fresh without re-crawling the whole drive.
//!
//! # Architecture: Plan, Crawl, Commit
//!
//! ```text
//! 1. Plan     change feed since stored token  →  invalidated folder set
//! 2. Crawl    class root → topics → lessons   →  data/class-<url_name>.json
//! 3. Commit   new change-feed token           →  cache/state/page_token.json
//! ```
//!
//! The crawl trusts a cached folder listing unless the change feed says the
//! folder changed. Lesson folders whose listing was trusted also reuse their
//! derived record (description HTML, metadata, content tree) when the folder's
//! stored `modifiedTime` matches. On an unchanged drive a run makes no listing
//! calls and downloads nothing below the lessons.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`sync`] | One full run: plan, crawl every class, write documents, commit token |
//! | [`crawl`] | Recursive crawler assembling a [`types::ClassDocument`] |
//! | [`changes`] | Change-feed paging, invalidated-folder computation, token persistence |
//! | [`cache`] | Namespaced cache store, folder listing cache, lesson object cache |
//! | [`remote`] | The `RemoteStore` trait the crawler and tracker depend on |
//! | [`drive`] | Google Drive v3 implementation of `RemoteStore` |
//! | [`config`] | `classdrive.toml` loading, merging over stock defaults, validation |
//! | [`markup`] | Markdown to sanitized HTML, assignments truncation |
//! | [`metadata`] | Lesson metadata parsing and due-date display |
//! | [`naming`] | Numeric-prefix ordering, slugs, display names, cache keys |
//! | [`types`] | Shared types persisted in the caches and written to documents |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Timestamps Are the Only Freshness Signal
//!
//! There are no dirty flags. A cached lesson is valid when the `modifiedTime`
//! stored with it equals the one stored with the lesson's cached listing; the
//! change feed decides which listings are trusted at all. Both are plain
//! string comparisons on values Drive hands out.
//!
//! ## The Token Moves Last
//!
//! A fresh start token is requested before crawling and stored only after
//! every document has been written. A crashed or partial run replays the same
//! changes next time, which at worst refetches a few folders.
//!
//! ## Degrade, Don't Abort
//!
//! Only an unreachable class root stops a class. A missing or unreadable
//! description, metadata file, or nested folder leaves a hole in the document
//! and a warning in the log. A lesson with such a hole is not cached, so the
//! next run tries it again.

pub mod cache;
pub mod changes;
pub mod config;
pub mod crawl;
pub mod drive;
pub mod markup;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod remote;
pub mod sync;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
