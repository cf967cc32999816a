//! Remote store trait and shared types.
//!
//! The [`RemoteStore`] trait is everything the crawler and the change tracker
//! need from the hierarchical store: page through a folder, read a folder's
//! modification timestamp, download a file, and page through the change feed.
//!
//! The production implementation is [`DriveClient`](crate::drive::DriveClient),
//! which talks to the Google Drive v3 REST API. Tests use an in-memory fake
//! that records every call.

use crate::types::ListingEntry;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("{operation} {id}: status {status}")]
    Status {
        operation: &'static str,
        id: String,
        status: u16,
    },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Malformed response: {0}")]
    Malformed(String),
    #[error("Missing credentials: environment variable {0} is not set")]
    MissingCredentials(String),
}

/// One page of a folder listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingPage {
    pub items: Vec<ListingEntry>,
    pub next_page_token: Option<String>,
}

/// One entry of the change feed.
///
/// Removed items no longer report their parents, so `parents` is empty for
/// them and the containing folder has to be recovered from cached listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ChangeEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(default)]
    pub removed: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parents: Vec<String>,
}

/// One page of the change feed.
///
/// Exactly one of `next_page_token` (more pages follow) and
/// `new_start_page_token` (feed exhausted, resume here next run) is set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangePage {
    pub changes: Vec<ChangeEntry>,
    pub next_page_token: Option<String>,
    pub new_start_page_token: Option<String>,
}

pub trait RemoteStore {
    /// One page of the non-trashed children of a folder.
    fn list_children(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> Result<ListingPage, RemoteError>;

    /// Opaque modification timestamp of a folder.
    fn modified_time(&self, folder_id: &str) -> Result<String, RemoteError>;

    /// Raw bytes of a file.
    fn read_file(&self, file_id: &str) -> Result<Vec<u8>, RemoteError>;

    /// Link a reader follows to open a file.
    fn file_url(&self, file_id: &str) -> String;

    /// One page of changes starting at `page_token`.
    fn list_changes(&self, page_token: &str) -> Result<ChangePage, RemoteError>;

    /// Token marking "now" in the change feed.
    fn start_page_token(&self) -> Result<String, RemoteError>;
}

/// Every child of a folder, across all pages, in remote order.
pub fn list_all_children<R: RemoteStore + ?Sized>(
    remote: &R,
    folder_id: &str,
) -> Result<Vec<ListingEntry>, RemoteError> {
    let mut items = Vec::new();
    let mut token: Option<String> = None;
    loop {
        let page = remote.list_children(folder_id, token.as_deref())?;
        items.extend(page.items);
        match page.next_page_token {
            Some(next) => token = Some(next),
            None => return Ok(items),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::FakeRemote;

    #[test]
    fn list_all_children_follows_pages() {
        let remote = FakeRemote::new()
            .root("root", "t1")
            .file_in("root", "a", "a.pdf", b"")
            .file_in("root", "b", "b.pdf", b"")
            .file_in("root", "c", "c.pdf", b"")
            .with_page_size(2);

        let names: Vec<String> = list_all_children(&remote, "root")
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["a.pdf", "b.pdf", "c.pdf"]);
        assert_eq!(remote.list_calls("root"), 2);
    }

    #[test]
    fn change_entry_serializes_compactly() {
        let entry = ChangeEntry {
            file_id: Some("x".into()),
            removed: true,
            parents: Vec::new(),
        };
        assert_eq!(
            serde_json::to_string(&entry).unwrap(),
            r#"{"file_id":"x","removed":true}"#
        );
    }
}
