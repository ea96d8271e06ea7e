use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Path, Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use crate::backend::drive::DRIVE_SCOPE;
use crate::backend::sheets::SHEETS_SCOPE;
use crate::backend::{
    DriveStorage, FileStorage, GoogleConnector, MemoryFileStorage, MemorySpreadsheet, SheetsStore,
    SpreadsheetStore,
};
use crate::cache::TtlCache;
use crate::calendar::PersianCalendar;
use crate::catalog::CatalogService;
use crate::clock::{Clock, SystemClock};
use crate::config::{Config, StorageBackend};
use crate::error::{AppError, Result};
use crate::health::{HealthChecker, HealthStatus};
use crate::history::HistoryService;
use crate::models::Disease;
use crate::rate_limiter::RateLimiter;
use crate::response::{
    ContactInfo, DiseasesResponse, HistoryResponse, RootResponse, SymptomSavedResponse,
    SymptomTypesResponse, VideosResponse,
};
use crate::validation::{validate_user_id, RequestValidator};

/// Shared application state
pub type SharedState = Arc<AppState>;

/// Long-lived services, built once at startup.
pub struct AppState {
    pub config: Config,
    pub catalog: CatalogService,
    pub history: HistoryService,
    pub rate_limiter: RateLimiter,
    pub health: HealthChecker,
}

impl AppState {
    /// Builds the state with the backends `config` selects.
    pub fn new(config: Config) -> SharedState {
        let (files, sheets): (Arc<dyn FileStorage>, Arc<dyn SpreadsheetStore>) = match config.storage_backend {
            StorageBackend::Google => {
                let timeout = config.backend_timeout();
                let credentials = config.google_credentials_json.clone();
                (
                    Arc::new(DriveStorage::new(GoogleConnector::new(credentials.clone(), DRIVE_SCOPE, timeout))),
                    Arc::new(SheetsStore::new(
                        GoogleConnector::new(credentials, SHEETS_SCOPE, timeout),
                        config.google_sheet_id.clone(),
                    )),
                )
            }
            StorageBackend::Memory => (
                Arc::new(MemoryFileStorage::new()),
                Arc::new(MemorySpreadsheet::new()),
            ),
        };

        Self::with_backends(config, files, sheets, Arc::new(SystemClock))
    }

    pub fn with_backends(
        config: Config,
        files: Arc<dyn FileStorage>,
        sheets: Arc<dyn SpreadsheetStore>,
        clock: Arc<dyn Clock>,
    ) -> SharedState {
        let cache = TtlCache::with_clock(config.cache_ttl(), clock.clone());
        let catalog = CatalogService::new(files.clone(), config.main_folder_id.clone(), cache);
        let history = HistoryService::new(sheets.clone(), Arc::new(PersianCalendar::default()));
        let rate_limiter = RateLimiter::with_clock(
            config.max_requests_per_minute,
            config.rate_limit_max_clients,
            clock,
        );
        let health = HealthChecker::new(files, sheets);

        Arc::new(Self {
            config,
            catalog,
            history,
            rate_limiter,
            health,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SymptomRequest {
    #[serde(alias = "userId")]
    #[validate(
        length(min = 5, max = 50, message = "شناسه کاربر باید بین 5 تا 50 کاراکتر باشد"),
        custom(function = "validate_user_id")
    )]
    pub user_id: String,

    #[serde(alias = "symptomType")]
    #[validate(length(min = 2, max = 50, message = "نوع علامت نامعتبر است"))]
    pub symptom_type: String,

    #[validate(length(min = 1, max = 50, message = "مقدار باید بین 1 تا 50 کاراکتر باشد"))]
    pub value: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct HistoryRequest {
    #[serde(alias = "userId")]
    #[validate(
        length(min = 5, max = 50, message = "شناسه کاربر باید بین 5 تا 50 کاراکتر باشد"),
        custom(function = "validate_user_id")
    )]
    pub user_id: String,

    #[serde(default, alias = "symptomFilter")]
    #[validate(length(max = 50, message = "فیلتر نباید بیشتر از 50 کاراکتر باشد"))]
    pub symptom_filter: Option<String>,
}

fn malformed(rejection: impl std::fmt::Display) -> AppError {
    tracing::debug!(%rejection, "Malformed request");
    AppError::Validation("درخواست نامعتبر است".to_string())
}

/// Liveness
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse::running())
}

/// Backend connectivity
pub async fn health_check(State(state): State<SharedState>) -> Json<HealthStatus> {
    Json(state.health.check_health().await)
}

/// Education media for one disease
pub async fn get_videos(
    State(state): State<SharedState>,
    Path(category): Path<String>,
) -> Result<Json<VideosResponse>> {
    if Disease::from_id(&category).is_none() {
        return Err(AppError::NotFound(format!("بیماری '{category}' یافت نشد")));
    }

    let videos = state.catalog.media_for_category(&category).await?;
    Ok(Json(VideosResponse { videos }))
}

pub async fn list_diseases() -> Json<DiseasesResponse> {
    Json(DiseasesResponse::all())
}

pub async fn symptom_types() -> Json<SymptomTypesResponse> {
    Json(SymptomTypesResponse::all())
}

/// Validates and stores one measurement
pub async fn save_symptom(
    State(state): State<SharedState>,
    payload: std::result::Result<Json<SymptomRequest>, JsonRejection>,
) -> Result<Json<SymptomSavedResponse>> {
    let Json(request) = payload.map_err(malformed)?;
    RequestValidator::validate_fields(&request)?;
    let symptom_type = RequestValidator::validate_symptom(&request.symptom_type, &request.value)?;

    let record = state
        .history
        .save_symptom(&request.user_id, symptom_type, &request.value)
        .await?;

    Ok(Json(SymptomSavedResponse::saved(&record)))
}

pub async fn history_query(
    State(state): State<SharedState>,
    query: std::result::Result<Query<HistoryRequest>, QueryRejection>,
) -> Result<Json<HistoryResponse>> {
    let Query(request) = query.map_err(malformed)?;
    user_history(&state, request).await
}

pub async fn history_body(
    State(state): State<SharedState>,
    payload: std::result::Result<Json<HistoryRequest>, JsonRejection>,
) -> Result<Json<HistoryResponse>> {
    let Json(request) = payload.map_err(malformed)?;
    user_history(&state, request).await
}

async fn user_history(state: &AppState, request: HistoryRequest) -> Result<Json<HistoryResponse>> {
    RequestValidator::validate_fields(&request)?;
    let data = state
        .history
        .user_history(&request.user_id, request.symptom_filter.as_deref())
        .await?;
    Ok(Json(HistoryResponse { data }))
}

pub async fn contact(State(state): State<SharedState>) -> Json<ContactInfo> {
    Json(ContactInfo::from_config(&state.config))
}

pub async fn not_found() -> AppError {
    AppError::NotFound("مسیر درخواستی یافت نشد".to_string())
}
