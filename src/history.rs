//! Per-user symptom history on the spreadsheet backend.
//!
//! Every user owns one sheet. Writes for a sheet go through its
//! [`SheetLocks`] entry so that creating the sheet, writing its header and
//! appending the first record happen as one sequence even when two requests
//! for a new user arrive together.

use chrono::Utc;
use std::sync::Arc;

use crate::backend::{BackendError, SpreadsheetStore};
use crate::calendar::LocalCalendar;
use crate::models::{SymptomRecord, SymptomType};
use crate::sheet_lock::SheetLocks;

/// First row of every user sheet: date, time, symptom type, value.
pub const SHEET_HEADER: [&str; 4] = ["تاریخ", "ساعت", "نوع علامت", "مقدار"];

pub fn sheet_name(user_id: &str) -> String {
    format!("User_{user_id}")
}

pub struct HistoryService {
    store: Arc<dyn SpreadsheetStore>,
    locks: SheetLocks,
    calendar: Arc<dyn LocalCalendar>,
}

impl HistoryService {
    pub fn new(store: Arc<dyn SpreadsheetStore>, calendar: Arc<dyn LocalCalendar>) -> Self {
        Self {
            store,
            locks: SheetLocks::new(),
            calendar,
        }
    }

    pub fn locks(&self) -> &SheetLocks {
        &self.locks
    }

    /// Appends one record to the user's sheet, creating the sheet first if
    /// needed. The sheet lock is held for the whole sequence and released on
    /// every exit path.
    pub async fn save_symptom(
        &self,
        user_id: &str,
        symptom_type: SymptomType,
        value: &str,
    ) -> Result<SymptomRecord, BackendError> {
        let sheet = sheet_name(user_id);
        let _guard = self.locks.acquire(&sheet).await;

        if !self.store.sheet_exists(&sheet).await? {
            self.store.create_sheet(&sheet, &SHEET_HEADER).await?;
        }

        let stamp = self.calendar.stamp(Utc::now());
        let record = SymptomRecord {
            date: stamp.date,
            time: stamp.time,
            symptom_type: symptom_type.label().to_string(),
            value: value.to_string(),
        };

        self.store.append_row(&sheet, record.clone().into_row()).await?;

        tracing::info!(
            user_id,
            symptom_type = %symptom_type,
            value,
            "Saved symptom"
        );
        Ok(record)
    }

    /// Records in storage order, optionally only those whose type contains
    /// `filter`. A filter naming a symptom type by id or label selects that
    /// type. A user without a sheet has an empty history.
    pub async fn user_history(
        &self,
        user_id: &str,
        filter: Option<&str>,
    ) -> Result<Vec<SymptomRecord>, BackendError> {
        let sheet = sheet_name(user_id);
        let rows = match self.store.read_rows(&sheet).await {
            Ok(rows) => rows,
            Err(e) if e.is_not_found() => {
                tracing::info!(user_id, "No data found for user");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        // A symptom id or label narrows to that type's stored label.
        let filter = filter
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(|f| match f.parse::<SymptomType>() {
                Ok(kind) => kind.label(),
                Err(_) => f,
            });
        let records: Vec<SymptomRecord> = rows
            .iter()
            .filter_map(|row| SymptomRecord::from_row(row))
            .filter(|record| filter.map_or(true, |f| record.symptom_type.contains(f)))
            .collect();

        tracing::info!(user_id, count = records.len(), "Retrieved records");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemorySpreadsheet;
    use crate::calendar::PersianCalendar;
    use regex::Regex;
    use std::time::Duration;

    fn service(store: Arc<MemorySpreadsheet>) -> HistoryService {
        HistoryService::new(store, Arc::new(PersianCalendar::default()))
    }

    #[tokio::test]
    async fn test_save_creates_sheet_with_header() {
        let store = Arc::new(MemorySpreadsheet::new());
        let history = service(store.clone());

        let record = history
            .save_symptom("user_abc12", SymptomType::Weight, "75")
            .await
            .unwrap();

        let timestamp = Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}$").unwrap();
        assert!(timestamp.is_match(&record.timestamp()), "got {}", record.timestamp());
        assert_eq!(record.symptom_type, "وزن");

        let rows = store.sheet_rows("User_user_abc12").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], SHEET_HEADER.map(String::from).to_vec());
        assert_eq!(rows[1], record.into_row());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_writes_create_one_sheet() {
        let store = Arc::new(MemorySpreadsheet::with_latency(Duration::from_millis(2)));
        let history = Arc::new(service(store.clone()));

        let mut tasks = Vec::new();
        for i in 0..10 {
            let history = history.clone();
            tasks.push(tokio::spawn(async move {
                history
                    .save_symptom("user_new01", SymptomType::FastingGlucose, &format!("{}", 90 + i))
                    .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(store.sheets_created(), 1);
        let rows = store.sheet_rows("User_user_new01").unwrap();
        assert_eq!(rows.len(), 11);
        assert_eq!(rows[0][0], SHEET_HEADER[0]);
        assert!(rows[1..].iter().all(|row| row[2] == "قند ناشتا"));
    }

    #[tokio::test]
    async fn test_sequential_saves_keep_order() {
        let store = Arc::new(MemorySpreadsheet::new());
        let history = service(store);

        for value in ["80", "81", "82"] {
            history
                .save_symptom("user_seq01", SymptomType::Weight, value)
                .await
                .unwrap();
        }

        let values: Vec<String> = history
            .user_history("user_seq01", None)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.value)
            .collect();
        assert_eq!(values, vec!["80", "81", "82"]);
    }

    #[tokio::test]
    async fn test_round_trip_matches_input() {
        let history = service(Arc::new(MemorySpreadsheet::new()));
        let saved = history
            .save_symptom("user_rt001", SymptomType::BloodPressure, "120/80")
            .await
            .unwrap();

        let read = history.user_history("user_rt001", None).await.unwrap();
        assert_eq!(read, vec![saved.clone()]);
        assert_eq!(read[0].symptom_type, "فشار خون");
        assert_eq!(read[0].value, "120/80");
    }

    #[tokio::test]
    async fn test_history_filter_is_substring_match() {
        let history = service(Arc::new(MemorySpreadsheet::new()));
        history.save_symptom("user_f0001", SymptomType::FastingGlucose, "95").await.unwrap();
        history.save_symptom("user_f0001", SymptomType::PostMealGlucose, "140").await.unwrap();
        history.save_symptom("user_f0001", SymptomType::Weight, "70").await.unwrap();

        let glucose = history.user_history("user_f0001", Some("قند")).await.unwrap();
        assert_eq!(glucose.len(), 2);

        let weight = history.user_history("user_f0001", Some("وزن")).await.unwrap();
        assert_eq!(weight.len(), 1);

        let all = history.user_history("user_f0001", Some("  ")).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_history_filter_by_symptom_id() {
        let history = service(Arc::new(MemorySpreadsheet::new()));
        history.save_symptom("user_f0002", SymptomType::Weight, "75").await.unwrap();
        history.save_symptom("user_f0002", SymptomType::FastingGlucose, "95").await.unwrap();
        history.save_symptom("user_f0002", SymptomType::PostMealGlucose, "140").await.unwrap();

        let weight = history.user_history("user_f0002", Some("weight")).await.unwrap();
        assert_eq!(weight.len(), 1);
        assert_eq!(weight[0].symptom_type, "وزن");
        assert_eq!(weight[0].value, "75");

        let fasting = history.user_history("user_f0002", Some(" fasting_glucose ")).await.unwrap();
        assert_eq!(fasting.len(), 1);
        assert_eq!(fasting[0].value, "95");

        let none = history.user_history("user_f0002", Some("blood_pressure")).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_user_has_empty_history() {
        let history = service(Arc::new(MemorySpreadsheet::new()));
        assert!(history.user_history("user_nobody", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_sheet_creation_leaves_nothing_behind() {
        let store = Arc::new(MemorySpreadsheet::new());
        let history = service(store.clone());

        store.fail_next_create();
        let err = history
            .save_symptom("user_hdr01", SymptomType::Weight, "70")
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Status { status: 503, .. }));
        assert!(store.sheet_rows("User_user_hdr01").is_none());

        history.save_symptom("user_hdr01", SymptomType::Weight, "71").await.unwrap();

        let rows = store.sheet_rows("User_user_hdr01").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], SHEET_HEADER.map(String::from).to_vec());

        let read = history.user_history("user_hdr01", None).await.unwrap();
        assert_eq!(read.len(), 1);
        assert_eq!(read[0].value, "71");
    }

    #[tokio::test]
    async fn test_lock_released_after_failed_append() {
        let store = Arc::new(MemorySpreadsheet::new());
        let history = service(store.clone());

        store.set_fail_appends(true);
        let err = history
            .save_symptom("user_fail1", SymptomType::Weight, "70")
            .await
            .unwrap_err();
        assert!(matches!(err, BackendError::Status { status: 503, .. }));

        store.set_fail_appends(false);
        let saved = tokio::time::timeout(
            Duration::from_secs(1),
            history.save_symptom("user_fail1", SymptomType::Weight, "71"),
        )
        .await
        .expect("sheet lock was not released")
        .unwrap();
        assert_eq!(saved.value, "71");
        assert_eq!(store.sheets_created(), 1);
    }
}
