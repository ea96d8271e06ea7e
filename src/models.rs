//! Domain types shared by the services and the HTTP layer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Symptom kinds a patient can log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymptomType {
    FastingGlucose,
    PostMealGlucose,
    BloodPressure,
    Weight,
}

impl SymptomType {
    pub const ALL: [SymptomType; 4] = [
        SymptomType::FastingGlucose,
        SymptomType::PostMealGlucose,
        SymptomType::BloodPressure,
        SymptomType::Weight,
    ];

    pub fn id(self) -> &'static str {
        match self {
            SymptomType::FastingGlucose => "fasting_glucose",
            SymptomType::PostMealGlucose => "post_meal_glucose",
            SymptomType::BloodPressure => "blood_pressure",
            SymptomType::Weight => "weight",
        }
    }

    /// Label written to the sheet and shown to patients.
    pub fn label(self) -> &'static str {
        match self {
            SymptomType::FastingGlucose => "قند ناشتا",
            SymptomType::PostMealGlucose => "قند بعد از غذا",
            SymptomType::BloodPressure => "فشار خون",
            SymptomType::Weight => "وزن",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            SymptomType::FastingGlucose | SymptomType::PostMealGlucose => "mg/dL",
            SymptomType::BloodPressure => "mmHg",
            SymptomType::Weight => "kg",
        }
    }

    /// Expected shape of the value, as a hint for clients.
    pub fn format(self) -> &'static str {
        match self {
            SymptomType::BloodPressure => "systolic/diastolic",
            _ => "number",
        }
    }
}

impl fmt::Display for SymptomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSymptomType(pub String);

impl fmt::Display for UnknownSymptomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown symptom type '{}'", self.0)
    }
}

impl std::error::Error for UnknownSymptomType {}

impl FromStr for SymptomType {
    type Err = UnknownSymptomType;

    /// Accepts the stored label or the ascii id.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        SymptomType::ALL
            .into_iter()
            .find(|kind| kind.label() == s || kind.id() == s)
            .ok_or_else(|| UnknownSymptomType(s.to_string()))
    }
}

/// Disease categories with an education folder in file storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disease {
    Diabetes,
    Hypertension,
    Cardiac,
}

impl Disease {
    pub const ALL: [Disease; 3] = [Disease::Diabetes, Disease::Hypertension, Disease::Cardiac];

    pub fn from_id(id: &str) -> Option<Self> {
        Disease::ALL.into_iter().find(|disease| disease.id() == id)
    }

    pub fn id(self) -> &'static str {
        match self {
            Disease::Diabetes => "diabetes",
            Disease::Hypertension => "hypertension",
            Disease::Cardiac => "cardiac",
        }
    }

    /// Name of the folder under the main education folder.
    pub fn folder_name(self) -> &'static str {
        match self {
            Disease::Diabetes => "Diabetes Mellitus",
            Disease::Hypertension => "Hypertension",
            Disease::Cardiac => "Heart disease",
        }
    }

    pub fn localized_name(self) -> &'static str {
        match self {
            Disease::Diabetes => "دیابت نوع ۲",
            Disease::Hypertension => "فشار خون بالا",
            Disease::Cardiac => "بیماری قلبی عروقی",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Document,
}

/// A playable or downloadable education file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub url: String,
    #[serde(rename = "size")]
    pub size_bytes: u64,
}

/// One logged measurement, as stored in a user's sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymptomRecord {
    pub date: String,
    pub time: String,
    #[serde(rename = "type")]
    pub symptom_type: String,
    pub value: String,
}

impl SymptomRecord {
    pub fn into_row(self) -> Vec<String> {
        vec![self.date, self.time, self.symptom_type, self.value]
    }

    /// Rebuilds a record from a sheet row. Rows with fewer than four cells are
    /// not records.
    pub fn from_row(row: &[String]) -> Option<Self> {
        match row {
            [date, time, symptom_type, value, ..] => Some(Self {
                date: date.clone(),
                time: time.clone(),
                symptom_type: symptom_type.clone(),
                value: value.clone(),
            }),
            _ => None,
        }
    }

    /// `date time`, the form returned to clients after a save.
    pub fn timestamp(&self) -> String {
        format!("{} {}", self.date, self.time)
    }
}
