use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::models::{Disease, MediaDescriptor, SymptomRecord, SymptomType};

pub const APP_TITLE: &str = "Patient Education API";

#[derive(Debug, Serialize, Deserialize)]
pub struct RootResponse {
    pub message: String,
    pub version: String,
    pub status: String,
    pub timestamp: String,
}

impl RootResponse {
    pub fn running() -> Self {
        Self {
            message: format!("{APP_TITLE} is running"),
            version: env!("CARGO_PKG_VERSION").to_string(),
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VideosResponse {
    pub videos: Vec<MediaDescriptor>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DiseaseInfo {
    pub id: String,
    pub name: String,
    pub name_fa: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DiseasesResponse {
    pub diseases: Vec<DiseaseInfo>,
}

impl DiseasesResponse {
    pub fn all() -> Self {
        Self {
            diseases: Disease::ALL
                .into_iter()
                .map(|disease| DiseaseInfo {
                    id: disease.id().to_string(),
                    name: disease.folder_name().to_string(),
                    name_fa: disease.localized_name().to_string(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SymptomSavedResponse {
    pub success: bool,
    pub message: String,
    pub timestamp: String,
}

impl SymptomSavedResponse {
    pub fn saved(record: &SymptomRecord) -> Self {
        Self {
            success: true,
            message: "Symptom saved successfully".to_string(),
            timestamp: record.timestamp(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub data: Vec<SymptomRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SymptomTypeInfo {
    pub id: String,
    pub name: String,
    pub unit: String,
    pub format: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SymptomTypesResponse {
    pub types: Vec<SymptomTypeInfo>,
}

impl SymptomTypesResponse {
    pub fn all() -> Self {
        Self {
            types: SymptomType::ALL
                .into_iter()
                .map(|kind| SymptomTypeInfo {
                    id: kind.id().to_string(),
                    name: kind.label().to_string(),
                    unit: kind.unit().to_string(),
                    format: kind.format().to_string(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContactInfo {
    pub eitaa: String,
    pub phone: String,
    pub email: String,
    pub address: String,
}

impl ContactInfo {
    pub fn from_config(config: &Config) -> Self {
        Self {
            eitaa: config.contact_eitaa.clone(),
            phone: config.contact_phone.clone(),
            email: config.contact_email.clone(),
            address: config.contact_address.clone(),
        }
    }
}
