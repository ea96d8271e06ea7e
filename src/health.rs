use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::backend::{FileStorage, SpreadsheetStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Connected,
    Error,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub drive: ServiceState,
    pub sheets: ServiceState,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub services: ServiceStatus,
    pub version: String,
    pub timestamp: String,
}

/// Probes both storage backends.
pub struct HealthChecker {
    files: Arc<dyn FileStorage>,
    sheets: Arc<dyn SpreadsheetStore>,
}

impl HealthChecker {
    pub fn new(files: Arc<dyn FileStorage>, sheets: Arc<dyn SpreadsheetStore>) -> Self {
        Self { files, sheets }
    }

    pub async fn check_health(&self) -> HealthStatus {
        let (drive, sheets) = tokio::join!(self.check_drive(), self.check_sheets());

        let overall_status = if drive == ServiceState::Connected && sheets == ServiceState::Connected {
            "healthy"
        } else {
            "degraded"
        };

        HealthStatus {
            status: overall_status.to_string(),
            services: ServiceStatus { drive, sheets },
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    async fn check_drive(&self) -> ServiceState {
        match self.files.check_connection().await {
            Ok(()) => ServiceState::Connected,
            Err(e) => {
                tracing::error!(error = %e, "Drive service error");
                ServiceState::Error
            }
        }
    }

    async fn check_sheets(&self) -> ServiceState {
        match self.sheets.check_connection().await {
            Ok(()) => ServiceState::Connected,
            Err(e) => {
                tracing::error!(error = %e, "Sheets service error");
                ServiceState::Error
            }
        }
    }
}
