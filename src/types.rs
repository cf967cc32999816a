//! Shared types used across the crawl pipeline.
//!
//! Listing entries and lesson records are persisted in the caches between
//! runs; the class document is the JSON handed to the site renderer. All of
//! them round-trip through `serde_json` and must stay stable across releases
//! (bump the cache format versions in [`crate::cache`] when they change).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Kind of a child inside a remote folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Folder,
}

/// One immediate child of a remote folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingEntry {
    pub id: String,
    pub name: String,
    pub kind: EntryKind,
}

impl ListingEntry {
    pub fn is_folder(&self) -> bool {
        self.kind == EntryKind::Folder
    }
}

/// A folder's children plus the remote modification timestamp they were
/// captured under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub items: Vec<ListingEntry>,
    pub modified_time: String,
    /// True when the items were served from the folder listing cache during
    /// this run rather than fetched from the remote store.
    pub from_cache: bool,
}

impl Listing {
    /// Find a direct child file by exact name.
    pub fn file_named(&self, name: &str) -> Option<&ListingEntry> {
        self.items
            .iter()
            .find(|e| e.kind == EntryKind::File && e.name == name)
    }

    pub fn folders(&self) -> impl Iterator<Item = &ListingEntry> {
        self.items.iter().filter(|e| e.is_folder())
    }
}

/// A node in a lesson's recursive content tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentNode {
    Folder {
        name: String,
        id: String,
        content: Vec<ContentNode>,
    },
    File {
        /// Display name, document extension stripped.
        name: String,
        /// Original remote name.
        file_name: String,
        url: String,
    },
}

/// Parsed lesson metadata.
///
/// `due_date` is lifted out of the raw JSON object so the display string can
/// be derived from it; every other key is kept verbatim in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LessonMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub due_date_display: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// The expensive-to-derive part of a lesson. Cached per lesson folder.
///
/// Carries no positional id: sibling order can change between runs while the
/// lesson folder itself stays untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonRecord {
    pub name: String,
    pub desc: String,
    pub content: Vec<ContentNode>,
    pub metadata: LessonMetadata,
}

impl LessonRecord {
    /// Ids of every folder nested anywhere inside the content tree.
    pub fn nested_folder_ids(&self) -> Vec<&str> {
        let mut ids = Vec::new();
        let mut stack: Vec<&ContentNode> = self.content.iter().collect();
        while let Some(node) = stack.pop() {
            if let ContentNode::Folder { id, content, .. } = node {
                ids.push(id.as_str());
                stack.extend(content.iter());
            }
        }
        ids
    }
}

/// A lesson as it appears in the class document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub name: String,
    pub desc: String,
    /// `"{topic}-{lesson}"`, both 1-based.
    pub id: String,
    pub content: Vec<ContentNode>,
    pub metadata: LessonMetadata,
}

impl Lesson {
    pub fn from_record(record: LessonRecord, id: String) -> Self {
        Self {
            name: record.name,
            desc: record.desc,
            id,
            content: record.content,
            metadata: record.metadata,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    /// URL slug derived from the topic name.
    pub id: String,
    pub lessons: Vec<Lesson>,
}

/// One class, flattened. This is the unit the renderer consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassDocument {
    pub id: u32,
    pub name: String,
    pub url_name: String,
    pub banner_url: String,
    /// Reserved by the renderer; always empty.
    pub desc: String,
    pub tags: Vec<String>,
    pub topics: Vec<Topic>,
    pub assignments: String,
    pub active: bool,
}

/// Result of an optional read that is allowed to fail without aborting the
/// surrounding work.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<T> {
    Found(T),
    Absent,
    Failed(String),
}

impl<T> Fetched<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Fetched::Found(v) => Some(v),
            Fetched::Absent | Fetched::Failed(_) => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
        match self {
            Fetched::Found(v) => Fetched::Found(f(v)),
            Fetched::Absent => Fetched::Absent,
            Fetched::Failed(e) => Fetched::Failed(e),
        }
    }
}
