//! Process-local backends.
//!
//! Both stores suspend on every call, the way a network round trip would, so
//! concurrent callers interleave exactly where they would against Google.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use super::{BackendError, ConnectError, FileStorage, SpreadsheetStore, StoredFile};

async fn round_trip(latency: Duration) {
    if latency.is_zero() {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(latency).await;
    }
}

/// Spreadsheet held in memory. Sheets include their header row.
#[derive(Default)]
pub struct MemorySpreadsheet {
    sheets: Mutex<HashMap<String, Vec<Vec<String>>>>,
    sheets_created: AtomicUsize,
    fail_appends: AtomicBool,
    fail_next_create: AtomicBool,
    latency: Duration,
}

impl MemorySpreadsheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    /// All rows of `sheet`, header first.
    pub fn sheet_rows(&self, sheet: &str) -> Option<Vec<Vec<String>>> {
        self.sheets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(sheet)
            .cloned()
    }

    pub fn sheets_created(&self) -> usize {
        self.sheets_created.load(Ordering::SeqCst)
    }

    pub fn set_fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Makes the next `create_sheet` fail without creating anything.
    pub fn fail_next_create(&self) {
        self.fail_next_create.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SpreadsheetStore for MemorySpreadsheet {
    async fn sheet_exists(&self, sheet: &str) -> Result<bool, BackendError> {
        round_trip(self.latency).await;
        Ok(self
            .sheets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(sheet))
    }

    async fn create_sheet(&self, sheet: &str, header: &[&str]) -> Result<(), BackendError> {
        round_trip(self.latency).await;
        if self.fail_next_create.swap(false, Ordering::SeqCst) {
            return Err(BackendError::Status {
                status: 503,
                message: "The service is currently unavailable".to_string(),
            });
        }
        let mut sheets = self.sheets.lock().unwrap_or_else(PoisonError::into_inner);
        if sheets.contains_key(sheet) {
            return Err(BackendError::Status {
                status: 400,
                message: format!("A sheet with the name \"{sheet}\" already exists"),
            });
        }
        sheets.insert(
            sheet.to_string(),
            vec![header.iter().map(|h| h.to_string()).collect()],
        );
        self.sheets_created.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn append_row(&self, sheet: &str, row: Vec<String>) -> Result<(), BackendError> {
        round_trip(self.latency).await;
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(BackendError::Status {
                status: 503,
                message: "The service is currently unavailable".to_string(),
            });
        }
        let mut sheets = self.sheets.lock().unwrap_or_else(PoisonError::into_inner);
        match sheets.get_mut(sheet) {
            Some(rows) => {
                rows.push(row);
                Ok(())
            }
            None => Err(BackendError::NotFound(format!("Unable to parse range: {sheet}!A:D"))),
        }
    }

    async fn read_rows(&self, sheet: &str) -> Result<Vec<Vec<String>>, BackendError> {
        round_trip(self.latency).await;
        let sheets = self.sheets.lock().unwrap_or_else(PoisonError::into_inner);
        sheets
            .get(sheet)
            .map(|rows| rows.iter().skip(1).cloned().collect())
            .ok_or_else(|| BackendError::NotFound(format!("Unable to parse range: {sheet}!A2:D")))
    }

    async fn check_connection(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

struct MemoryFolder {
    id: String,
    parent_id: String,
    name: String,
}

/// Folder tree held in memory.
#[derive(Default)]
pub struct MemoryFileStorage {
    folders: Mutex<Vec<MemoryFolder>>,
    files: Mutex<HashMap<String, Vec<StoredFile>>>,
    list_calls: AtomicUsize,
    unreachable: AtomicBool,
}

impl MemoryFileStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_folder(&self, parent_id: &str, id: &str, name: &str) {
        self.folders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(MemoryFolder {
                id: id.to_string(),
                parent_id: parent_id.to_string(),
                name: name.to_string(),
            });
    }

    pub fn add_file(&self, folder_id: &str, file: StoredFile) {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(folder_id.to_string())
            .or_default()
            .push(file);
    }

    /// How many times `list_files` reached the store.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    fn ensure_reachable(&self) -> Result<(), BackendError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(ConnectError::Token("file storage unreachable".to_string()).into());
        }
        Ok(())
    }
}

#[async_trait]
impl FileStorage for MemoryFileStorage {
    async fn find_folder(&self, parent_id: &str, name: &str) -> Result<Option<String>, BackendError> {
        round_trip(Duration::ZERO).await;
        self.ensure_reachable()?;
        let folders = self.folders.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(folders
            .iter()
            .find(|f| f.parent_id == parent_id && f.name == name)
            .map(|f| f.id.clone()))
    }

    async fn list_files(&self, folder_id: &str) -> Result<Vec<StoredFile>, BackendError> {
        round_trip(Duration::ZERO).await;
        self.ensure_reachable()?;
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        let files = self.files.lock().unwrap_or_else(PoisonError::into_inner);
        let mut listed: Vec<StoredFile> = files
            .get(folder_id)
            .map(|files| files.iter().filter(|f| f.media_kind().is_some()).cloned().collect())
            .unwrap_or_default();
        listed.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(listed)
    }

    async fn check_connection(&self) -> Result<(), BackendError> {
        self.ensure_reachable()
    }
}
