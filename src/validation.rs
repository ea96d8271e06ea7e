use regex::Regex;
use std::ops::RangeInclusive;
use std::sync::LazyLock;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::error::AppError;
use crate::models::SymptomType;

pub const SYSTOLIC_RANGE: RangeInclusive<f64> = 70.0..=250.0;
pub const DIASTOLIC_RANGE: RangeInclusive<f64> = 40.0..=150.0;
pub const GLUCOSE_RANGE: RangeInclusive<f64> = 20.0..=600.0;
pub const WEIGHT_RANGE: RangeInclusive<f64> = 20.0..=300.0;

static USER_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^user_[A-Za-z0-9_-]+$").unwrap_or_else(|e| panic!("invalid user id pattern: {e}"))
});

/// Checks a user id for the `user_` prefix and sheet-safe characters.
pub fn validate_user_id(user_id: &str) -> Result<(), ValidationError> {
    if USER_ID_PATTERN.is_match(user_id) {
        Ok(())
    } else {
        Err(ValidationError::new("user_id_format").with_message("شناسه کاربر نامعتبر است".into()))
    }
}

/// Validates `raw` against the numeric rule for `kind`.
///
/// Blood pressure is `systolic/diastolic` with exactly one separator and a
/// systolic reading strictly above the diastolic one. Every other kind is a
/// single number.
pub fn validate_symptom_value(kind: SymptomType, raw: &str) -> Result<(), String> {
    let raw = raw.trim();
    match kind {
        SymptomType::BloodPressure => {
            let (systolic, diastolic) = match raw.split('/').collect::<Vec<_>>().as_slice() {
                [systolic, diastolic] => (parse_number(systolic)?, parse_number(diastolic)?),
                _ => return Err(invalid("فشار خون باید به فرمت \"عدد/عدد\" باشد")),
            };
            if !SYSTOLIC_RANGE.contains(&systolic) {
                return Err(invalid("فشار سیستولیک باید بین 70 تا 250 باشد"));
            }
            if !DIASTOLIC_RANGE.contains(&diastolic) {
                return Err(invalid("فشار دیاستولیک باید بین 40 تا 150 باشد"));
            }
            if systolic <= diastolic {
                return Err(invalid("فشار سیستولیک باید بزرگتر از دیاستولیک باشد"));
            }
            Ok(())
        }
        SymptomType::FastingGlucose | SymptomType::PostMealGlucose => {
            if !GLUCOSE_RANGE.contains(&parse_number(raw)?) {
                return Err(invalid("مقدار قند باید بین 20 تا 600 باشد"));
            }
            Ok(())
        }
        SymptomType::Weight => {
            if !WEIGHT_RANGE.contains(&parse_number(raw)?) {
                return Err(invalid("وزن باید بین 20 تا 300 کیلوگرم باشد"));
            }
            Ok(())
        }
    }
}

/// Parses a symptom type name and checks the value against its rule.
pub fn validate(symptom_type: &str, raw_value: &str) -> Result<SymptomType, String> {
    let kind: SymptomType = symptom_type
        .parse()
        .map_err(|_| "نوع علامت نامعتبر است".to_string())?;
    validate_symptom_value(kind, raw_value)?;
    Ok(kind)
}

/// Rewrites Persian and Arabic-Indic digits, and the Arabic decimal
/// separator, to their ASCII forms.
fn ascii_digits(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '\u{06F0}'..='\u{06F9}' => char::from(b'0' + (c as u32 - 0x06F0) as u8),
            '\u{0660}'..='\u{0669}' => char::from(b'0' + (c as u32 - 0x0660) as u8),
            '\u{066B}' => '.',
            other => other,
        })
        .collect()
}

fn parse_number(raw: &str) -> Result<f64, String> {
    ascii_digits(raw.trim())
        .parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .ok_or_else(|| invalid("عدد وارد شده معتبر نیست"))
}

fn invalid(detail: &str) -> String {
    format!("مقدار نامعتبر: {detail}")
}

/// Request validation utilities
pub struct RequestValidator;

impl RequestValidator {
    /// Runs the derived field rules on `request`.
    pub fn validate_fields<T: Validate>(request: &T) -> Result<(), AppError> {
        request
            .validate()
            .map_err(|errors| AppError::Validation(first_message(&errors)))
    }

    /// Validates a symptom submission and resolves its type.
    pub fn validate_symptom(symptom_type: &str, value: &str) -> Result<SymptomType, AppError> {
        validate(symptom_type, value).map_err(AppError::Validation)
    }
}

/// Picks one user-safe message out of a validation report, preferring the
/// alphabetically first field so the answer is stable.
fn first_message(errors: &ValidationErrors) -> String {
    let field_errors = errors.field_errors();
    let mut fields: Vec<_> = field_errors.iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    fields
        .into_iter()
        .flat_map(|(_, errors)| errors.iter())
        .find_map(|error| error.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| "درخواست نامعتبر است".to_string())
}
