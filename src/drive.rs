//! Google Drive v3 client.
//!
//! A thin blocking wrapper over the REST API implementing [`RemoteStore`].
//! Each trait method is one HTTP request; paging is left to the callers.
//!
//! Authentication is a bearer token taken from the environment (see
//! [`DriveConfig::access_token_env`]). Obtaining that token is somebody
//! else's job.

use crate::config::DriveConfig;
use crate::remote::{ChangeEntry, ChangePage, ListingPage, RemoteError, RemoteStore};
use crate::types::{EntryKind, ListingEntry};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
const PAGE_SIZE: &str = "1000";
const LIST_FIELDS: &str = "nextPageToken,files(id,name,mimeType)";
const CHANGE_FIELDS: &str = "nextPageToken,newStartPageToken,\
                             changes(fileId,removed,file(id,name,mimeType,parents,trashed))";

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<WireFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireFile {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    parents: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileTimes {
    modified_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChangeList {
    #[serde(default)]
    changes: Vec<WireChange>,
    next_page_token: Option<String>,
    new_start_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireChange {
    file_id: Option<String>,
    #[serde(default)]
    removed: bool,
    file: Option<WireFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartPageToken {
    start_page_token: String,
}

impl From<WireFile> for ListingEntry {
    fn from(file: WireFile) -> Self {
        let kind = if file.mime_type == FOLDER_MIME_TYPE {
            EntryKind::Folder
        } else {
            EntryKind::File
        };
        ListingEntry {
            id: file.id,
            name: file.name,
            kind,
        }
    }
}

impl From<WireChange> for ChangeEntry {
    fn from(change: WireChange) -> Self {
        ChangeEntry {
            file_id: change.file_id,
            removed: change.removed,
            parents: change.file.map(|f| f.parents).unwrap_or_default(),
        }
    }
}

/// Drive query selecting the live children of a folder.
fn children_query(folder_id: &str) -> String {
    format!(
        "'{}' in parents and trashed = false",
        folder_id.replace('\\', "\\\\").replace('\'', "\\'")
    )
}

// =============================================================================
// Client
// =============================================================================

pub struct DriveClient {
    client: Client,
    api_base: String,
    access_token: String,
}

impl DriveClient {
    pub fn new(api_base: &str, access_token: String, timeout: Duration) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .user_agent(concat!("classdrive/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Http(e.to_string()))?;
        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            access_token,
        })
    }

    /// Build a client from config, reading the token from the environment.
    pub fn from_config(config: &DriveConfig) -> Result<Self, RemoteError> {
        let token = std::env::var(&config.access_token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| RemoteError::MissingCredentials(config.access_token_env.clone()))?;
        Self::new(
            &config.api_base,
            token.trim().to_string(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.client
            .get(format!("{}/{}", self.api_base, path))
            .bearer_auth(&self.access_token)
    }

    fn send(
        &self,
        request: RequestBuilder,
        operation: &'static str,
        id: &str,
    ) -> Result<Response, RemoteError> {
        let response = request
            .send()
            .map_err(|e| RemoteError::Http(format!("{operation} {id}: {e}")))?;
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else if status == StatusCode::NOT_FOUND {
            Err(RemoteError::NotFound(id.to_string()))
        } else {
            Err(RemoteError::Status {
                operation,
                id: id.to_string(),
                status: status.as_u16(),
            })
        }
    }

    fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        operation: &'static str,
        id: &str,
    ) -> Result<T, RemoteError> {
        self.send(request, operation, id)?
            .json()
            .map_err(|e| RemoteError::Malformed(format!("{operation} {id}: {e}")))
    }
}

impl RemoteStore for DriveClient {
    fn list_children(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> Result<ListingPage, RemoteError> {
        let mut request = self.get("files").query(&[
            ("q", children_query(folder_id).as_str()),
            ("fields", LIST_FIELDS),
            ("pageSize", PAGE_SIZE),
        ]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }
        let list: FileList = self.send_json(request, "list", folder_id)?;
        Ok(ListingPage {
            items: list.files.into_iter().map(ListingEntry::from).collect(),
            next_page_token: list.next_page_token,
        })
    }

    fn modified_time(&self, folder_id: &str) -> Result<String, RemoteError> {
        let request = self
            .get(&format!("files/{folder_id}"))
            .query(&[("fields", "modifiedTime")]);
        let times: FileTimes = self.send_json(request, "get", folder_id)?;
        times
            .modified_time
            .ok_or_else(|| RemoteError::Malformed(format!("{folder_id} has no modifiedTime")))
    }

    fn read_file(&self, file_id: &str) -> Result<Vec<u8>, RemoteError> {
        let request = self
            .get(&format!("files/{file_id}"))
            .query(&[("alt", "media")]);
        let bytes = self
            .send(request, "download", file_id)?
            .bytes()
            .map_err(|e| RemoteError::Http(format!("download {file_id}: {e}")))?;
        Ok(bytes.to_vec())
    }

    fn file_url(&self, file_id: &str) -> String {
        format!("https://drive.google.com/file/d/{file_id}/view")
    }

    fn list_changes(&self, page_token: &str) -> Result<ChangePage, RemoteError> {
        let request = self.get("changes").query(&[
            ("pageToken", page_token),
            ("spaces", "drive"),
            ("includeRemoved", "true"),
            ("restrictToMyDrive", "true"),
            ("pageSize", PAGE_SIZE),
            ("fields", CHANGE_FIELDS),
        ]);
        let list: ChangeList = self.send_json(request, "changes", page_token)?;
        Ok(ChangePage {
            changes: list.changes.into_iter().map(ChangeEntry::from).collect(),
            next_page_token: list.next_page_token,
            new_start_page_token: list.new_start_page_token,
        })
    }

    fn start_page_token(&self) -> Result<String, RemoteError> {
        let token: StartPageToken =
            self.send_json(self.get("changes/startPageToken"), "start token", "")?;
        Ok(token.start_page_token)
    }
}
