//! Shared test utilities for the classdrive test suite.
//!
//! Provides [`FakeRemote`], an in-memory [`RemoteStore`] that records every
//! call, plus lookup helpers over [`ClassDocument`] that panic with the list of
//! available names on a miss.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let remote = FakeRemote::new()
//!     .root("root", "t0")
//!     .folder_in("root", "topic", "1 Mechanics", "t1")
//!     .folder_in("topic", "lesson", "1 Vectors", "t2")
//!     .file_in("lesson", "desc", "description.md", b"# Vectors");
//!
//! remote.touch("lesson", "t3");
//! assert_eq!(remote.read_calls("desc"), 0);
//! ```

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};

use crate::config::ClassConfig;
use crate::remote::{ChangeEntry, ChangePage, ListingPage, RemoteError, RemoteStore};
use crate::types::{ClassDocument, EntryKind, Lesson, ListingEntry, Topic};

// =========================================================================
// Fake remote store
// =========================================================================

#[derive(Debug, Clone)]
struct FakeFolder {
    modified_time: String,
    children: Vec<ListingEntry>,
}

/// A remote call, as recorded by [`FakeRemote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    List(String),
    ModifiedTime(String),
    Read(String),
    Changes(String),
    StartToken,
}

/// In-memory remote store.
///
/// Change-feed tokens are indexes into the list of pushed changes, so a token
/// handed out by [`RemoteStore::start_page_token`] replays exactly the changes
/// pushed after it.
pub struct FakeRemote {
    folders: RefCell<BTreeMap<String, FakeFolder>>,
    files: RefCell<BTreeMap<String, Vec<u8>>>,
    changes: RefCell<Vec<ChangeEntry>>,
    failing: RefCell<BTreeSet<String>>,
    change_feed_down: Cell<bool>,
    page_size: usize,
    calls: RefCell<Vec<RecordedCall>>,
}

impl Default for FakeRemote {
    fn default() -> Self {
        Self {
            folders: RefCell::default(),
            files: RefCell::default(),
            changes: RefCell::default(),
            failing: RefCell::default(),
            change_feed_down: Cell::new(false),
            page_size: 100,
            calls: RefCell::default(),
        }
    }
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Add a folder that has no parent in the fake.
    pub fn root(self, id: &str, modified_time: &str) -> Self {
        self.folders.borrow_mut().insert(
            id.to_string(),
            FakeFolder {
                modified_time: modified_time.to_string(),
                children: Vec::new(),
            },
        );
        self
    }

    pub fn folder_in(self, parent: &str, id: &str, name: &str, modified_time: &str) -> Self {
        let this = self.root(id, modified_time);
        this.add_child(parent, id, name, EntryKind::Folder);
        this
    }

    pub fn file_in(self, parent: &str, id: &str, name: &str, bytes: &[u8]) -> Self {
        self.files.borrow_mut().insert(id.to_string(), bytes.to_vec());
        self.add_child(parent, id, name, EntryKind::File);
        self
    }

    fn add_child(&self, parent: &str, id: &str, name: &str, kind: EntryKind) {
        self.folders
            .borrow_mut()
            .get_mut(parent)
            .unwrap_or_else(|| panic!("fake parent folder '{parent}' does not exist"))
            .children
            .push(ListingEntry {
                id: id.to_string(),
                name: name.to_string(),
                kind,
            });
    }

    // ---------------------------------------------------------------------
    // Mutation between runs
    // ---------------------------------------------------------------------

    pub fn touch(&self, folder_id: &str, modified_time: &str) {
        self.folders
            .borrow_mut()
            .get_mut(folder_id)
            .unwrap_or_else(|| panic!("fake folder '{folder_id}' does not exist"))
            .modified_time = modified_time.to_string();
    }

    pub fn set_file(&self, file_id: &str, bytes: &[u8]) {
        self.files
            .borrow_mut()
            .insert(file_id.to_string(), bytes.to_vec());
    }

    pub fn add_file(&self, parent: &str, id: &str, name: &str, bytes: &[u8]) {
        self.set_file(id, bytes);
        self.add_child(parent, id, name, EntryKind::File);
    }

    pub fn add_folder(&self, parent: &str, id: &str, name: &str, modified_time: &str) {
        self.folders.borrow_mut().insert(
            id.to_string(),
            FakeFolder {
                modified_time: modified_time.to_string(),
                children: Vec::new(),
            },
        );
        self.add_child(parent, id, name, EntryKind::Folder);
    }

    pub fn remove_child(&self, parent: &str, id: &str) {
        if let Some(folder) = self.folders.borrow_mut().get_mut(parent) {
            folder.children.retain(|c| c.id != id);
        }
        self.files.borrow_mut().remove(id);
    }

    pub fn push_change(&self, change: ChangeEntry) {
        self.changes.borrow_mut().push(change);
    }

    /// Make every call touching `id` fail.
    pub fn fail_on(&self, id: &str) {
        self.failing.borrow_mut().insert(id.to_string());
    }

    pub fn recover(&self, id: &str) {
        self.failing.borrow_mut().remove(id);
    }

    pub fn set_change_feed_down(&self, down: bool) {
        self.change_feed_down.set(down);
    }

    // ---------------------------------------------------------------------
    // Call inspection
    // ---------------------------------------------------------------------

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.borrow().clone()
    }

    pub fn reset_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    pub fn list_calls(&self, folder_id: &str) -> usize {
        self.count(|c| matches!(c, RecordedCall::List(id) if id == folder_id))
    }

    pub fn read_calls(&self, file_id: &str) -> usize {
        self.count(|c| matches!(c, RecordedCall::Read(id) if id == file_id))
    }

    pub fn total_lists(&self) -> usize {
        self.count(|c| matches!(c, RecordedCall::List(_)))
    }

    pub fn total_reads(&self) -> usize {
        self.count(|c| matches!(c, RecordedCall::Read(_)))
    }

    fn count(&self, pred: impl Fn(&RecordedCall) -> bool) -> usize {
        self.calls.borrow().iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: RecordedCall) {
        self.calls.borrow_mut().push(call);
    }

    fn check(&self, operation: &'static str, id: &str) -> Result<(), RemoteError> {
        if self.failing.borrow().contains(id) {
            return Err(RemoteError::Status {
                operation,
                id: id.to_string(),
                status: 503,
            });
        }
        Ok(())
    }
}

impl RemoteStore for FakeRemote {
    fn list_children(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> Result<ListingPage, RemoteError> {
        self.record(RecordedCall::List(folder_id.to_string()));
        self.check("list", folder_id)?;
        let folders = self.folders.borrow();
        let folder = folders
            .get(folder_id)
            .ok_or_else(|| RemoteError::NotFound(folder_id.to_string()))?;
        let start: usize = page_token.map(|t| t.parse().unwrap()).unwrap_or(0);
        let end = (start + self.page_size).min(folder.children.len());
        Ok(ListingPage {
            items: folder.children[start..end].to_vec(),
            next_page_token: (end < folder.children.len()).then(|| end.to_string()),
        })
    }

    fn modified_time(&self, folder_id: &str) -> Result<String, RemoteError> {
        self.record(RecordedCall::ModifiedTime(folder_id.to_string()));
        self.check("get", folder_id)?;
        self.folders
            .borrow()
            .get(folder_id)
            .map(|f| f.modified_time.clone())
            .ok_or_else(|| RemoteError::NotFound(folder_id.to_string()))
    }

    fn read_file(&self, file_id: &str) -> Result<Vec<u8>, RemoteError> {
        self.record(RecordedCall::Read(file_id.to_string()));
        self.check("download", file_id)?;
        self.files
            .borrow()
            .get(file_id)
            .cloned()
            .ok_or_else(|| RemoteError::NotFound(file_id.to_string()))
    }

    fn file_url(&self, file_id: &str) -> String {
        format!("https://drive.test/file/{file_id}")
    }

    fn list_changes(&self, page_token: &str) -> Result<ChangePage, RemoteError> {
        self.record(RecordedCall::Changes(page_token.to_string()));
        if self.change_feed_down.get() {
            return Err(RemoteError::Http("change feed unavailable".into()));
        }
        let changes = self.changes.borrow();
        let start: usize = page_token
            .parse()
            .map_err(|_| RemoteError::Malformed(format!("bad token {page_token}")))?;
        let start = start.min(changes.len());
        let end = (start + self.page_size).min(changes.len());
        let more = end < changes.len();
        Ok(ChangePage {
            changes: changes[start..end].to_vec(),
            next_page_token: more.then(|| end.to_string()),
            new_start_page_token: (!more).then(|| changes.len().to_string()),
        })
    }

    fn start_page_token(&self) -> Result<String, RemoteError> {
        self.record(RecordedCall::StartToken);
        if self.change_feed_down.get() {
            return Err(RemoteError::Http("change feed unavailable".into()));
        }
        Ok(self.changes.borrow().len().to_string())
    }
}

// =========================================================================
// Fixtures
// =========================================================================

/// A class with one topic holding one lesson with a description, metadata,
/// a worksheet, and a nested folder.
///
/// ```text
/// root (class)                 t-root
/// ├── assignments.md
/// └── topic: "1 Mechanics"     t-topic
///     └── lesson: "1 Vectors"  t-lesson
///         ├── description.md
///         ├── metadata.json
///         ├── Worksheet.pdf
///         ├── desktop.ini
///         └── extra: "Extras"  t-extra
///             └── Solutions.pdf
/// ```
pub fn sample_remote() -> FakeRemote {
    FakeRemote::new()
        .root("root", "t-root")
        .file_in("root", "assign", "assignments.md", b"# Week 1\n\nRead chapter 1.")
        .folder_in("root", "topic", "1 Mechanics", "t-topic")
        .folder_in("topic", "lesson", "1 Vectors", "t-lesson")
        .file_in("lesson", "desc", "description.md", b"Adding **vectors**.")
        .file_in(
            "lesson",
            "meta",
            "metadata.json",
            br#"{"due_date": "01-09-25", "pages": "12-14"}"#,
        )
        .file_in("lesson", "ws", "Worksheet.pdf", b"%PDF")
        .file_in("lesson", "junk", "desktop.ini", b"")
        .folder_in("lesson", "extra", "Extras", "t-extra")
        .file_in("extra", "sol", "Solutions.pdf", b"%PDF")
}

pub fn sample_class() -> ClassConfig {
    ClassConfig {
        id: 3,
        name: "Physics 10".into(),
        url_name: "physics-10".into(),
        folder: "https://drive.google.com/drive/folders/root".into(),
        banner_url: "images/banner3.png".into(),
        active: true,
    }
}

// =========================================================================
// Document lookups — panics with a clear message on miss
// =========================================================================

/// Find a topic by name. Panics if not found.
pub fn find_topic<'a>(doc: &'a ClassDocument, name: &str) -> &'a Topic {
    doc.topics
        .iter()
        .find(|t| t.name == name)
        .unwrap_or_else(|| {
            let names: Vec<&str> = doc.topics.iter().map(|t| t.name.as_str()).collect();
            panic!("topic '{name}' not found. Available: {names:?}")
        })
}

/// Find a lesson by name within a topic. Panics if not found.
pub fn find_lesson<'a>(topic: &'a Topic, name: &str) -> &'a Lesson {
    topic
        .lessons
        .iter()
        .find(|l| l.name == name)
        .unwrap_or_else(|| {
            let names: Vec<&str> = topic.lessons.iter().map(|l| l.name.as_str()).collect();
            panic!(
                "lesson '{name}' not found in topic '{}'. Available: {names:?}",
                topic.name
            )
        })
}

/// Names of every lesson in document order, across all topics.
pub fn lesson_names(doc: &ClassDocument) -> Vec<&str> {
    doc.topics
        .iter()
        .flat_map(|t| t.lessons.iter().map(|l| l.name.as_str()))
        .collect()
}
