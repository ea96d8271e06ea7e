//! External storage collaborators.
//!
//! The catalog reads education media from a [`FileStorage`] and the symptom
//! history lives in a [`SpreadsheetStore`]. Google Drive and Google Sheets
//! implement them in production; the in-memory versions back tests and
//! local runs without credentials.

pub mod drive;
pub mod google_auth;
pub mod memory;
pub mod sheets;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::MediaKind;

pub use drive::DriveStorage;
pub use google_auth::{GoogleConnector, GoogleSession};
pub use memory::{MemoryFileStorage, MemorySpreadsheet};
pub use sheets::SheetsStore;

/// Failure to build an authenticated client.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("GOOGLE_CREDENTIALS_JSON is not set")]
    MissingCredentials,

    #[error("invalid service account credentials: {0}")]
    InvalidCredentials(String),

    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("access token exchange failed: {0}")]
    Token(String),
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("backend returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected backend response: {0}")]
    Decode(String),
}

impl BackendError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound(_))
    }
}

/// A file as listed by the storage backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub size: Option<u64>,
}

impl StoredFile {
    /// Videos and PDF documents are education media; everything else is not.
    pub fn media_kind(&self) -> Option<MediaKind> {
        let name = self.name.to_ascii_lowercase();
        if self.mime_type.starts_with("video/") || name.ends_with(".mp4") {
            Some(MediaKind::Video)
        } else if self.mime_type == "application/pdf" || name.ends_with(".pdf") {
            Some(MediaKind::Document)
        } else {
            None
        }
    }
}

#[async_trait]
pub trait FileStorage: Send + Sync {
    /// Finds a folder named `name` directly under `parent_id`, ignoring
    /// trashed folders.
    async fn find_folder(&self, parent_id: &str, name: &str) -> Result<Option<String>, BackendError>;

    /// Lists the video and PDF files in `folder_id`, ordered by name.
    async fn list_files(&self, folder_id: &str) -> Result<Vec<StoredFile>, BackendError>;

    async fn check_connection(&self) -> Result<(), BackendError>;
}

#[async_trait]
pub trait SpreadsheetStore: Send + Sync {
    async fn sheet_exists(&self, sheet: &str) -> Result<bool, BackendError>;

    /// Adds `sheet` and writes `header` as its first row. On error neither
    /// the sheet nor the header exists.
    async fn create_sheet(&self, sheet: &str, header: &[&str]) -> Result<(), BackendError>;

    async fn append_row(&self, sheet: &str, row: Vec<String>) -> Result<(), BackendError>;

    /// Every row after the header, oldest first. Fails with
    /// [`BackendError::NotFound`] when the sheet does not exist.
    async fn read_rows(&self, sheet: &str) -> Result<Vec<Vec<String>>, BackendError>;

    async fn check_connection(&self) -> Result<(), BackendError>;
}
