use async_trait::async_trait;
use serde::Deserialize;

use super::{BackendError, FileStorage, GoogleConnector, GoogleSession, StoredFile};

pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";
const FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const PAGE_SIZE: &str = "1000";

/// Google Drive v3 file listing.
pub struct DriveStorage {
    session: GoogleSession,
}

impl DriveStorage {
    pub fn new(connector: GoogleConnector) -> Self {
        Self {
            session: GoogleSession::new(connector),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    #[serde(default)]
    mime_type: String,
    /// int64 values arrive as JSON strings.
    size: Option<String>,
}

impl From<DriveFile> for StoredFile {
    fn from(file: DriveFile) -> Self {
        Self {
            size: file.size.and_then(|s| s.parse().ok()),
            id: file.id,
            name: file.name,
            mime_type: file.mime_type,
        }
    }
}

/// Quotes a value for a Drive query string literal.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn folder_query(parent_id: &str, name: &str) -> String {
    format!(
        "name={} and mimeType='application/vnd.google-apps.folder' and {} in parents and trashed=false",
        quote(name),
        quote(parent_id)
    )
}

fn media_query(folder_id: &str) -> String {
    format!(
        "{} in parents and (mimeType contains 'video/' or name contains '.mp4' or name contains '.pdf') and trashed=false",
        quote(folder_id)
    )
}

impl DriveStorage {
    async fn list(&self, query: &str, fields: &str, order_by: Option<&str>) -> Result<Vec<DriveFile>, BackendError> {
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params = vec![
                ("q", query.to_string()),
                ("spaces", "drive".to_string()),
                ("fields", format!("nextPageToken, {fields}")),
                ("pageSize", PAGE_SIZE.to_string()),
            ];
            if let Some(order_by) = order_by {
                params.push(("orderBy", order_by.to_string()));
            }
            if let Some(token) = page_token.take() {
                params.push(("pageToken", token));
            }

            let page: FileList = self
                .session
                .send(|http| http.get(FILES_URL).query(&params))
                .await?
                .json()
                .await
                .map_err(|e| BackendError::Decode(e.to_string()))?;

            files.extend(page.files);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(files)
    }
}

#[async_trait]
impl FileStorage for DriveStorage {
    async fn find_folder(&self, parent_id: &str, name: &str) -> Result<Option<String>, BackendError> {
        let folders = self
            .list(&folder_query(parent_id, name), "files(id, name)", None)
            .await?;

        match folders.into_iter().next() {
            Some(folder) => Ok(Some(folder.id)),
            None => {
                tracing::warn!(folder = name, "Folder not found");
                Ok(None)
            }
        }
    }

    async fn list_files(&self, folder_id: &str) -> Result<Vec<StoredFile>, BackendError> {
        let files = self
            .list(
                &media_query(folder_id),
                "files(id, name, mimeType, size, webViewLink)",
                Some("name"),
            )
            .await?;

        tracing::info!(folder_id, count = files.len(), "Retrieved files from folder");
        Ok(files.into_iter().map(StoredFile::from).collect())
    }

    async fn check_connection(&self) -> Result<(), BackendError> {
        self.session.check().await
    }
}
