#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Validation engine for raw register records.
//!
//! Records are validated as raw JSON so that type mismatches can be
//! reported field by field. Rules are looked up per [`RecordType`] from the
//! `validation` settings table; a record type without rules is trivially
//! valid.
//!
//! Problems come in two severities. Errors make a record invalid; warnings
//! flag it but leave it valid.

pub mod formats;

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::str::FromStr;

use serde::Serialize;
use serde_json::{Map, Value};
use strum_macros::EnumString;
use uk_solicitors_config::{FieldType, Settings, ValidationRules};

use crate::formats::{
    validate_date, validate_email, validate_phone_uk, validate_postcode_uk, validate_rating,
    validate_registration_number,
};

/// Kind of record being validated. Selects the rule set and the
/// record-specific checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum RecordType {
    SraOrganization,
    SraOffice,
    SraRecord,
    ReviewRecord,
    /// Any other configured record type. Only the generic checks apply.
    #[strum(default)]
    Other(String),
}

impl RecordType {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::SraOrganization => "sra_organization",
            Self::SraOffice => "sra_office",
            Self::SraRecord => "sra_record",
            Self::ReviewRecord => "review_record",
            Self::Other(name) => name,
        }
    }

    /// Parses a record type name. Unknown names map to [`RecordType::Other`].
    #[must_use]
    pub fn parse(name: &str) -> Self {
        Self::from_str(name).unwrap_or_else(|_| Self::Other(name.to_string()))
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of validating one record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Required field name to whether it was present and non-empty.
    pub required_fields_valid: BTreeMap<String, bool>,
    /// Typed field name to whether its value matched the declared type.
    pub field_types_valid: BTreeMap<String, bool>,
}

impl ValidationResult {
    fn valid() -> Self {
        Self {
            valid: true,
            ..Self::default()
        }
    }
}

/// Aggregate outcome of validating a list of records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetValidation {
    pub total_records: usize,
    pub valid_records: usize,
    pub invalid_records: usize,
    /// Percentage of valid records, `0` for an empty dataset.
    pub validation_rate: f64,
    /// `"Record N: ..."` messages, 1-based.
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub error_count: usize,
    pub warning_count: usize,
}

/// Rule-driven record validator.
#[derive(Debug, Clone, Default)]
pub struct Validator {
    rules: BTreeMap<String, ValidationRules>,
}

impl Validator {
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        Self::from_rules(settings.validation.clone())
    }

    #[must_use]
    pub const fn from_rules(rules: BTreeMap<String, ValidationRules>) -> Self {
        Self { rules }
    }

    /// Validates one record against the rules for `record_type`.
    #[must_use]
    pub fn validate_record(&self, record: &Value, record_type: &RecordType) -> ValidationResult {
        let Some(rules) = self
            .rules
            .get(record_type.as_str())
            .filter(|rules| !rules.is_empty())
        else {
            log::debug!("No validation rules found for record type: {record_type}");
            return ValidationResult::valid();
        };

        let empty = Map::new();
        let fields = match record {
            Value::Object(map) => map,
            _ => &empty,
        };

        let mut result = ValidationResult::default();
        if !record.is_object() {
            result
                .errors
                .push("Record must be an object".to_string());
        }

        for field in &rules.required_fields {
            let present = fields.get(field).is_some_and(is_filled);
            if !present {
                log::debug!("Missing or empty required field: {field}");
                result
                    .errors
                    .push(format!("Missing or empty required field: {field}"));
            }
            result.required_fields_valid.insert(field.clone(), present);
        }

        for (field, expected) in &rules.field_types {
            let matches = fields
                .get(field)
                .is_none_or(|value| matches_type(value, *expected, field));
            if !matches {
                log::debug!("Field {field} has incorrect type: expected {expected:?}");
                result
                    .errors
                    .push(format!("Invalid type for field: {field}"));
            }
            result.field_types_valid.insert(field.clone(), matches);
        }

        record_specific_checks(fields, record_type, &mut result);
        generic_checks(fields, &mut result);

        result.valid = result.errors.is_empty();
        result
    }

    /// Validates every record and aggregates the results.
    #[must_use]
    pub fn validate_dataset(&self, records: &[Value], record_type: &RecordType) -> DatasetValidation {
        log::info!(
            "Validating dataset with {} records of type: {record_type}",
            records.len()
        );

        let mut valid_records = 0;
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for (i, record) in records.iter().enumerate() {
            let result = self.validate_record(record, record_type);
            let n = i + 1;

            if result.valid {
                valid_records += 1;
            } else {
                errors.extend(result.errors.iter().map(|e| format!("Record {n}: {e}")));
            }
            warnings.extend(result.warnings.iter().map(|w| format!("Record {n}: {w}")));
        }

        let total_records = records.len();
        #[allow(clippy::cast_precision_loss)]
        let validation_rate = if total_records == 0 {
            0.0
        } else {
            valid_records as f64 / total_records as f64 * 100.0
        };

        log::info!(
            "Validation complete: {valid_records}/{total_records} records valid ({validation_rate:.1}%)"
        );
        if !errors.is_empty() {
            log::warn!("Found {} validation errors", errors.len());
        }
        if !warnings.is_empty() {
            log::info!("Found {} validation warnings", warnings.len());
        }

        DatasetValidation {
            total_records,
            valid_records,
            invalid_records: total_records - valid_records,
            validation_rate,
            error_count: errors.len(),
            warning_count: warnings.len(),
            errors,
            warnings,
        }
    }
}

fn record_specific_checks(
    fields: &Map<String, Value>,
    record_type: &RecordType,
    result: &mut ValidationResult,
) {
    match record_type {
        RecordType::SraRecord => {
            if let Some(number) = fields.get("solicitor_number")
                && !validate_registration_number(&as_text(number))
            {
                result
                    .errors
                    .push("Invalid solicitor number format".to_string());
            }
        }
        RecordType::SraOrganization => {
            if let Some(number) = fields.get("SraNumber")
                && !validate_registration_number(&as_text(number))
            {
                result
                    .errors
                    .push("Invalid SRA organization number format".to_string());
            }
            match fields.get("Offices") {
                Some(Value::Array(offices)) if offices.is_empty() => {
                    result
                        .warnings
                        .push("Organization has no offices".to_string());
                }
                Some(Value::Array(_)) | None => {}
                Some(_) => {
                    result
                        .errors
                        .push("Offices field must be a list".to_string());
                }
            }
        }
        RecordType::SraOffice => {
            let checks: [(&str, fn(&str) -> bool, &str); 3] = [
                ("Postcode", validate_postcode_uk, "Invalid postcode format"),
                ("Email", validate_email, "Invalid email format"),
                ("PhoneNumber", validate_phone_uk, "Invalid phone number format"),
            ];
            for (field, check, message) in checks {
                if let Some(text) = truthy_text(fields.get(field))
                    && !check(&text)
                {
                    result.warnings.push(message.to_string());
                }
            }
        }
        RecordType::ReviewRecord => {
            if let Some(rating) = fields.get("rating")
                && !as_number(rating).is_some_and(validate_rating)
            {
                result.errors.push("Invalid rating value".to_string());
            }
            if let Some(date) = fields.get("date")
                && !date.as_str().is_some_and(validate_date)
            {
                result
                    .warnings
                    .push("Date format may be incorrect".to_string());
            }
        }
        RecordType::Other(_) => {}
    }
}

/// Lowercase contact fields any record type may carry.
fn generic_checks(fields: &Map<String, Value>, result: &mut ValidationResult) {
    let checks: [(&str, fn(&str) -> bool, &str); 3] = [
        ("email", validate_email, "Email format appears invalid"),
        ("phone", validate_phone_uk, "Phone number format appears invalid"),
        ("postcode", validate_postcode_uk, "Postcode format appears invalid"),
    ];
    for (field, check, message) in checks {
        if let Some(text) = truthy_text(fields.get(field))
            && !check(&text)
        {
            result.warnings.push(message.to_string());
        }
    }
}

/// Present, not `null`, and not a blank string.
fn is_filled(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

fn matches_type(value: &Value, expected: FieldType, field: &str) -> bool {
    match expected {
        FieldType::String => value.is_string(),
        FieldType::Integer => value.is_i64() || value.is_u64(),
        FieldType::Number => value.is_number(),
        FieldType::Boolean => value.is_boolean(),
        FieldType::List => value.is_array(),
        FieldType::Dict => value.is_object(),
        FieldType::Unknown => {
            log::warn!("Unknown type specification for field: {field}");
            true
        }
    }
}

/// Text form of a scalar, used for pattern checks on values that may be
/// numbers or strings.
fn as_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s.as_str()),
        Value::Null => Cow::Borrowed(""),
        other => Cow::Owned(other.to_string()),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Text of a value that should be format-checked: non-empty strings, and
/// the text form of any other non-empty scalar.
fn truthy_text(value: Option<&Value>) -> Option<Cow<'_, str>> {
    match value? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::Array(items) if items.is_empty() => None,
        Value::Object(map) if map.is_empty() => None,
        other => Some(as_text(other)),
    }
}
