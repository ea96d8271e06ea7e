use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{BackendError, GoogleConnector, GoogleSession, SpreadsheetStore};

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const SPREADSHEETS_URL: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// One spreadsheet on Google Sheets v4; each user gets a tab in it.
pub struct SheetsStore {
    session: GoogleSession,
    spreadsheet_id: String,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

/// Tries at picking a free sheet id before giving up on a new sheet.
const SHEET_ID_ATTEMPTS: u32 = 3;

/// Stable, non-zero sheet id for `sheet`. Sheet 0 is the spreadsheet's
/// default tab.
fn sheet_id_for(sheet: &str, attempt: u32) -> i64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in sheet.bytes().chain(attempt.to_le_bytes()) {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    match (hash & 0x7fff_ffff) as i64 {
        0 => 1,
        id => id,
    }
}

/// One `batchUpdate` that adds the sheet and writes its header row. Google
/// applies the requests together or not at all.
fn add_sheet_request(sheet: &str, header: &[&str], sheet_id: i64) -> Value {
    let cells: Vec<Value> = header
        .iter()
        .map(|title| json!({ "userEnteredValue": { "stringValue": title } }))
        .collect();

    json!({
        "requests": [
            { "addSheet": { "properties": { "sheetId": sheet_id, "title": sheet } } },
            {
                "updateCells": {
                    "start": { "sheetId": sheet_id, "rowIndex": 0, "columnIndex": 0 },
                    "rows": [{ "values": cells }],
                    "fields": "userEnteredValue"
                }
            }
        ]
    })
}

/// Whether `err` rejected an `addSheet` because its id is taken, as opposed
/// to its title.
fn is_sheet_id_conflict(err: &BackendError) -> bool {
    match err {
        BackendError::Status { status: 400, message } => {
            message.contains("already exists") && !message.contains("with the name")
        }
        _ => false,
    }
}

/// A1 range on `sheet`, quoted so any title is addressable.
fn a1_range(sheet: &str, cells: &str) -> String {
    format!("'{}'!{}", sheet.replace('\'', "''"), cells)
}

impl SheetsStore {
    pub fn new(connector: GoogleConnector, spreadsheet_id: impl Into<String>) -> Self {
        Self {
            session: GoogleSession::new(connector),
            spreadsheet_id: spreadsheet_id.into(),
        }
    }

    fn spreadsheet_url(&self) -> String {
        format!("{}/{}", SPREADSHEETS_URL, self.spreadsheet_id)
    }

    fn values_url(&self, range: &str) -> String {
        format!("{}/values/{}", self.spreadsheet_url(), urlencoding::encode(range))
    }
}

#[async_trait]
impl SpreadsheetStore for SheetsStore {
    async fn sheet_exists(&self, sheet: &str) -> Result<bool, BackendError> {
        let url = self.spreadsheet_url();
        let meta: SpreadsheetMeta = self
            .session
            .send(|http| http.get(&url).query(&[("fields", "sheets.properties.title")]))
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        Ok(meta.sheets.iter().any(|s| s.properties.title == sheet))
    }

    async fn create_sheet(&self, sheet: &str, header: &[&str]) -> Result<(), BackendError> {
        let batch_url = format!("{}:batchUpdate", self.spreadsheet_url());

        let mut attempt = 0;
        loop {
            let sheet_id = sheet_id_for(sheet, attempt);
            let body = add_sheet_request(sheet, header, sheet_id);
            match self.session.send(|http| http.post(&batch_url).json(&body)).await {
                Ok(_) => {
                    tracing::info!(sheet, sheet_id, "Created new sheet");
                    return Ok(());
                }
                Err(e) if is_sheet_id_conflict(&e) && attempt + 1 < SHEET_ID_ATTEMPTS => {
                    tracing::warn!(sheet, sheet_id, "Sheet id taken, retrying with another");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn append_row(&self, sheet: &str, row: Vec<String>) -> Result<(), BackendError> {
        let url = format!("{}:append", self.values_url(&a1_range(sheet, "A:D")));
        let body = json!({ "values": [row] });
        self.session
            .send(|http| {
                http.post(&url)
                    .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
                    .json(&body)
            })
            .await?;
        Ok(())
    }

    async fn read_rows(&self, sheet: &str) -> Result<Vec<Vec<String>>, BackendError> {
        let url = self.values_url(&a1_range(sheet, "A2:D"));
        let range: ValueRange = self
            .session
            .send(|http| http.get(&url))
            .await?
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        Ok(range.values)
    }

    async fn check_connection(&self) -> Result<(), BackendError> {
        self.session.check().await
    }
}
