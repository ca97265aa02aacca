#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Typed organisation and office records from the SRA public register.
//!
//! The wire format uses `PascalCase` field names (`SraNumber`,
//! `PracticeName`, `Offices`, ...). The same shape is used for the
//! canonical dataset file written by the collector, so a canonical file can
//! be read back with plain `serde_json::from_str`.

pub mod lenient;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use strum_macros::EnumString;

/// Label used when no quality category can be determined.
pub const UNKNOWN_CATEGORY: &str = "Unknown";

/// Identifier of an organisation or office. The register emits integers,
/// but some exports carry string identifiers.
///
/// Decoding never fails: integral floats become numbers, other scalars are
/// kept as text, and a missing, `null` or structured id becomes
/// [`RecordId::Unknown`], which serializes back as `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(untagged)]
pub enum RecordId {
    /// Numeric identifier.
    Number(i64),
    /// Textual identifier.
    Text(String),
    /// The record carried no usable identifier.
    #[default]
    Unknown,
}

impl RecordId {
    /// Converts a raw JSON identifier.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().and_then(integral))
                .map_or_else(|| Self::Text(n.to_string()), Self::Number),
            Value::String(s) => Self::Text(s.clone()),
            Value::Bool(b) => Self::Text(b.to_string()),
            Value::Null | Value::Array(_) | Value::Object(_) => Self::Unknown,
        }
    }
}

/// `Some` for floats that hold an exact integer (`1001.0`).
#[allow(clippy::cast_possible_truncation, clippy::float_cmp)]
fn integral(value: f64) -> Option<i64> {
    (value.trunc() == value && value.abs() < 9.0e15).then_some(value as i64)
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::from_value(&Value::deserialize(deserializer)?))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
            Self::Unknown => Ok(()),
        }
    }
}

impl From<i64> for RecordId {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

/// Kind of regulated organisation.
///
/// Unrecognised values are preserved verbatim in [`OrganisationType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, EnumString)]
pub enum OrganisationType {
    #[strum(serialize = "Recognised Body")]
    RecognisedBody,
    #[strum(serialize = "Licensed Body")]
    LicensedBody,
    #[strum(serialize = "Recognised Sole Practice")]
    RecognisedSolePractice,
    #[strum(serialize = "Sole Practitioner")]
    SolePractitioner,
    #[strum(default)]
    Other(String),
}

impl OrganisationType {
    /// Returns the register's label for this type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::RecognisedBody => "Recognised Body",
            Self::LicensedBody => "Licensed Body",
            Self::RecognisedSolePractice => "Recognised Sole Practice",
            Self::SolePractitioner => "Sole Practitioner",
            Self::Other(label) => label,
        }
    }
}

/// Kind of office location.
///
/// Unrecognised values are preserved verbatim in [`OfficeType::Other`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, EnumString)]
pub enum OfficeType {
    #[strum(serialize = "Head Office")]
    HeadOffice,
    #[strum(serialize = "Branch Office")]
    BranchOffice,
    #[strum(default)]
    Other(String),
}

impl OfficeType {
    /// Returns the register's label for this type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::HeadOffice => "Head Office",
            Self::BranchOffice => "Branch Office",
            Self::Other(label) => label,
        }
    }
}

macro_rules! label_serde {
    ($ty:ident) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let label = match Value::deserialize(deserializer)? {
                    Value::String(label) => label,
                    other => other.to_string(),
                };
                Ok(Self::from_str(&label).unwrap_or(Self::Other(label)))
            }
        }
    };
}

label_serde!(OrganisationType);
label_serde!(OfficeType);

/// Buckets a quality score into a category label.
#[must_use]
pub fn quality_bucket(score: f64) -> &'static str {
    if score >= 90.0 {
        "Excellent"
    } else if score >= 80.0 {
        "Good"
    } else if score >= 70.0 {
        "Fair"
    } else {
        "Poor"
    }
}

/// A regulated legal-practice entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Organization {
    #[serde(default)]
    pub id: RecordId,
    #[serde(
        default,
        deserialize_with = "lenient::string",
        skip_serializing_if = "Option::is_none"
    )]
    pub sra_number: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::string",
        skip_serializing_if = "Option::is_none"
    )]
    pub practice_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organisation_type: Option<OrganisationType>,
    #[serde(
        default,
        deserialize_with = "lenient::string",
        skip_serializing_if = "Option::is_none"
    )]
    pub authorisation_type: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::string",
        skip_serializing_if = "Option::is_none"
    )]
    pub authorisation_status: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::string",
        skip_serializing_if = "Option::is_none"
    )]
    pub authorisation_date: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::string",
        skip_serializing_if = "Option::is_none"
    )]
    pub freelance_basis: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::string",
        skip_serializing_if = "Option::is_none"
    )]
    pub regulator: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::string",
        skip_serializing_if = "Option::is_none"
    )]
    pub constitution: Option<String>,
    #[serde(
        rename = "Type",
        default,
        deserialize_with = "lenient::string",
        skip_serializing_if = "Option::is_none"
    )]
    pub kind: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::integer",
        skip_serializing_if = "Option::is_none"
    )]
    pub no_of_offices: Option<i64>,
    #[serde(
        default,
        deserialize_with = "lenient::number",
        skip_serializing_if = "Option::is_none"
    )]
    pub data_quality_score: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient::string",
        skip_serializing_if = "Option::is_none"
    )]
    pub data_quality_category: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::list")]
    pub offices: Vec<Office>,
}

impl Organization {
    /// Decodes an organisation from a raw register record and stamps every
    /// nested office with the organisation's id.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is not an object or contains an
    /// office that is not an object.
    pub fn from_record(record: Value) -> Result<Self, serde_json::Error> {
        if !record.is_object() {
            return Err(serde::de::Error::custom(
                "organization record must be an object",
            ));
        }
        let mut organization: Self = serde_json::from_value(record)?;
        organization.adopt_offices();
        Ok(organization)
    }

    /// Sets `organisation_id` on every office to this organisation's id.
    pub fn adopt_offices(&mut self) {
        for office in &mut self.offices {
            office.organisation_id = Some(self.id.clone());
        }
    }

    /// Quality score, `0` when the register did not provide one.
    #[must_use]
    pub fn quality_score(&self) -> f64 {
        self.data_quality_score.unwrap_or(0.0)
    }

    /// Quality category: the provided label, else a bucket of the provided
    /// score, else [`UNKNOWN_CATEGORY`].
    #[must_use]
    pub fn quality_category(&self) -> &str {
        match (&self.data_quality_category, self.data_quality_score) {
            (Some(category), _) if !category.trim().is_empty() => category,
            (_, Some(score)) => quality_bucket(score),
            _ => UNKNOWN_CATEGORY,
        }
    }

    /// Practice name, or an empty string.
    #[must_use]
    pub fn name(&self) -> &str {
        self.practice_name.as_deref().unwrap_or_default()
    }
}

/// A physical location belonging to one organisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Office {
    #[serde(default)]
    pub office_id: RecordId,
    /// Owning organisation. Not part of the register payload; filled in
    /// by [`Organization::adopt_offices`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organisation_id: Option<RecordId>,
    #[serde(
        default,
        deserialize_with = "lenient::string",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub office_type: Option<OfficeType>,
    #[serde(
        rename = "Address1",
        default,
        deserialize_with = "lenient::string",
        skip_serializing_if = "Option::is_none"
    )]
    pub address1: Option<String>,
    #[serde(
        rename = "Address2",
        default,
        deserialize_with = "lenient::string",
        skip_serializing_if = "Option::is_none"
    )]
    pub address2: Option<String>,
    #[serde(
        rename = "Address3",
        default,
        deserialize_with = "lenient::string",
        skip_serializing_if = "Option::is_none"
    )]
    pub address3: Option<String>,
    #[serde(
        rename = "Address4",
        default,
        deserialize_with = "lenient::string",
        skip_serializing_if = "Option::is_none"
    )]
    pub address4: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::string",
        skip_serializing_if = "Option::is_none"
    )]
    pub town: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::string",
        skip_serializing_if = "Option::is_none"
    )]
    pub county: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::string",
        skip_serializing_if = "Option::is_none"
    )]
    pub postcode: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::string",
        skip_serializing_if = "Option::is_none"
    )]
    pub country: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::string",
        skip_serializing_if = "Option::is_none"
    )]
    pub phone_number: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::string",
        skip_serializing_if = "Option::is_none"
    )]
    pub email: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient::string",
        skip_serializing_if = "Option::is_none"
    )]
    pub website: Option<String>,
}

impl Office {
    /// Whether any of phone, email or website is non-empty.
    #[must_use]
    pub fn has_contact(&self) -> bool {
        [&self.phone_number, &self.email, &self.website]
            .into_iter()
            .any(|field| non_empty(field.as_deref()).is_some())
    }
}

/// Returns `Some(s)` when `s` is present and not blank.
#[must_use]
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.trim().is_empty())
}

/// Envelope returned by the register's "get all organisations" endpoint.
///
/// Organisation records are kept as raw JSON so the validation engine can
/// report structural problems field by field before they are decoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistryResponse {
    #[serde(rename = "Count")]
    pub count: i64,
    #[serde(rename = "Organisations")]
    pub organisations: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_record() -> Value {
        json!({
            "Id": 1001,
            "SraNumber": "123456",
            "PracticeName": "Smith & Co Solicitors",
            "OrganisationType": "Recognised Body",
            "AuthorisationStatus": "Authorised",
            "NoOfOffices": 1,
            "DataQualityScore": 92.5,
            "Offices": [{
                "OfficeId": 5001,
                "Name": "Head Office",
                "OfficeType": "Head Office",
                "Address1": "1 High Street",
                "Town": "London",
                "Postcode": "SW1A 1AA",
                "Country": "England",
                "PhoneNumber": "020 7946 0000"
            }]
        })
    }

    #[test]
    fn decodes_register_record_and_adopts_offices() {
        let org = Organization::from_record(sample_record()).unwrap();
        assert_eq!(org.id, RecordId::Number(1001));
        assert_eq!(org.organisation_type, Some(OrganisationType::RecognisedBody));
        assert_eq!(org.offices.len(), 1);
        assert_eq!(org.offices[0].organisation_id, Some(RecordId::Number(1001)));
        assert_eq!(org.offices[0].office_type, Some(OfficeType::HeadOffice));
    }

    #[test]
    fn unknown_type_labels_are_preserved() {
        let parsed: OfficeType = serde_json::from_value(json!("Satellite")).unwrap();
        assert_eq!(parsed, OfficeType::Other("Satellite".to_string()));
        assert_eq!(serde_json::to_value(&parsed).unwrap(), json!("Satellite"));
    }

    #[test]
    fn unusable_ids_decode_instead_of_failing() {
        let missing = Organization::from_record(json!({"SraNumber": "123456"})).unwrap();
        assert_eq!(missing.id, RecordId::Unknown);

        let null = Organization::from_record(json!({"Id": null})).unwrap();
        assert_eq!(null.id, RecordId::Unknown);

        let fractional = Organization::from_record(json!({"Id": 2.5})).unwrap();
        assert_eq!(fractional.id, RecordId::Text("2.5".to_string()));

        let whole = Organization::from_record(json!({"Id": 1001.0})).unwrap();
        assert_eq!(whole.id, RecordId::Number(1001));

        assert_eq!(serde_json::to_value(&missing.id).unwrap(), Value::Null);
        assert_eq!(missing.id.to_string(), "");
    }

    #[test]
    fn non_string_type_labels_are_kept() {
        let org = Organization::from_record(json!({"Id": 1, "OrganisationType": 3})).unwrap();
        assert_eq!(org.organisation_type, Some(OrganisationType::Other("3".to_string())));
    }

    #[test]
    fn non_object_records_still_fail() {
        assert!(Organization::from_record(json!("not a record")).is_err());
        assert!(Organization::from_record(json!([1, 2, 3])).is_err());
    }

    #[test]
    fn missing_offices_default_to_empty() {
        let org = Organization::from_record(json!({"Id": "ABC", "Offices": "n/a"})).unwrap();
        assert!(org.offices.is_empty());
        assert_eq!(org.id, RecordId::Text("ABC".to_string()));
    }

    #[test]
    fn lenient_fields_accept_numbers_and_nulls() {
        let org = Organization::from_record(json!({
            "Id": 7,
            "SraNumber": 654_321,
            "Regulator": null,
            "NoOfOffices": "3",
            "DataQualityScore": "71"
        }))
        .unwrap();
        assert_eq!(org.sra_number.as_deref(), Some("654321"));
        assert_eq!(org.regulator, None);
        assert_eq!(org.no_of_offices, Some(3));
        assert!((org.quality_score() - 71.0).abs() < f64::EPSILON);
    }

    #[test]
    fn quality_category_falls_back_to_bucket_then_unknown() {
        let mut org = Organization::from_record(json!({"Id": 1})).unwrap();
        assert_eq!(org.quality_category(), UNKNOWN_CATEGORY);
        assert!(org.quality_score().abs() < f64::EPSILON);

        org.data_quality_score = Some(85.0);
        assert_eq!(org.quality_category(), "Good");

        org.data_quality_category = Some("Excellent".to_string());
        assert_eq!(org.quality_category(), "Excellent");
    }

    #[test]
    fn non_object_record_is_rejected() {
        assert!(Organization::from_record(json!("not an organisation")).is_err());
    }

    #[test]
    fn contact_presence_ignores_blank_fields() {
        let mut office: Office =
            serde_json::from_value(json!({"OfficeId": 1, "Email": "  "})).unwrap();
        assert!(!office.has_contact());
        office.website = Some("https://example.co.uk".to_string());
        assert!(office.has_contact());
    }

    #[test]
    fn canonical_round_trip_keeps_type_field_name() {
        let org = Organization::from_record(json!({"Id": 3, "Type": "Firm"})).unwrap();
        let value = serde_json::to_value(&org).unwrap();
        assert_eq!(value["Type"], json!("Firm"));
        assert_eq!(value["Offices"], json!([]));
        assert!(value.get("Regulator").is_none());
    }
}
