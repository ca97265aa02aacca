#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Types describing a collection run: live counters, the persisted state
//! snapshot, the canonical dataset file and the final report.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{AsRefStr, Display, EnumString};
use uk_solicitors_register_models::Organization;

/// Number of processing errors carried into the report.
pub const REPORTED_ERRORS: usize = 10;

/// Where a collection run currently is.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CollectionPhase {
    #[default]
    Idle,
    Fetching,
    Validating,
    Persisting,
    Reporting,
    Completed,
    Failed,
}

impl CollectionPhase {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Running counters for a single collection run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionStats {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Organisation count reported by the API.
    pub total_organizations: u64,
    pub organizations_processed: u64,
    pub total_offices: u64,
    pub offices_processed: u64,
    /// Organisations whose processing failed unexpectedly.
    pub processing_errors: u64,
    /// Invalid organisations plus invalid offices.
    pub validation_errors: u64,
    pub api_calls: u64,
    pub data_size_bytes: u64,
}

impl CollectionStats {
    /// Seconds between start and end, `0` until both are set.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_seconds(&self) -> f64 {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => (end - start).num_milliseconds() as f64 / 1000.0,
            _ => 0.0,
        }
    }
}

/// Snapshot written after a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionState {
    pub last_collection: DateTime<Utc>,
    pub organizations_count: usize,
    pub collection_completed: bool,
    /// File role (`main_data`, `metadata`) to path.
    pub files_saved: BTreeMap<String, PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum IssueKind {
    Organization,
    Office,
}

/// Validation failure of one organisation or office.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    /// The raw `Id` of the organisation, `null` if it had none.
    pub organization_id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub office_id: Option<Value>,
    #[serde(rename = "type")]
    pub kind: IssueKind,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub valid_organizations: u64,
    pub invalid_organizations: u64,
    pub valid_offices: u64,
    pub invalid_offices: u64,
    pub validation_errors: Vec<ValidationIssue>,
}

/// `metadata` block of the canonical dataset file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalMetadata {
    pub collection_date: DateTime<Utc>,
    pub total_organizations: usize,
    /// Offices received from the API, before filtering.
    pub total_offices: usize,
    pub validation_summary: ValidationSummary,
}

/// The canonical dataset file: validated organisations with their valid
/// offices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalDataset {
    pub metadata: CanonicalMetadata,
    pub organizations: Vec<Organization>,
}

/// An unexpected failure while processing one organisation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingError {
    pub organization_id: Value,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSummary {
    pub timestamp: DateTime<Utc>,
    pub duration_seconds: f64,
    pub total_organizations: u64,
    pub organizations_processed: u64,
    pub total_offices: u64,
    pub offices_processed: u64,
    pub success_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQuality {
    pub validation_errors: u64,
    pub processing_errors: u64,
    pub error_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiPerformance {
    pub api_calls: u64,
    /// Run duration divided by API calls, in seconds.
    pub average_response_time: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSize {
    pub total_bytes: u64,
    pub total_mb: f64,
}

/// Final report of a collection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionReport {
    pub collection_summary: CollectionSummary,
    pub data_quality: DataQuality,
    pub api_performance: ApiPerformance,
    pub data_files: BTreeMap<String, PathBuf>,
    pub data_size: DataSize,
    /// The most recent processing errors, at most [`REPORTED_ERRORS`].
    pub errors: Vec<ProcessingError>,
}

impl CollectionReport {
    /// Builds a report from frozen run statistics.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(
        stats: &CollectionStats,
        data_files: BTreeMap<String, PathBuf>,
        errors_log: &[ProcessingError],
    ) -> Self {
        let duration = stats.duration_seconds();
        let denominator = stats.total_organizations.max(1) as f64;
        let tail = errors_log.len().saturating_sub(REPORTED_ERRORS);

        Self {
            collection_summary: CollectionSummary {
                timestamp: Utc::now(),
                duration_seconds: duration,
                total_organizations: stats.total_organizations,
                organizations_processed: stats.organizations_processed,
                total_offices: stats.total_offices,
                offices_processed: stats.offices_processed,
                success_rate: stats.organizations_processed as f64 / denominator * 100.0,
            },
            data_quality: DataQuality {
                validation_errors: stats.validation_errors,
                processing_errors: stats.processing_errors,
                error_rate: stats.processing_errors as f64 / denominator * 100.0,
            },
            api_performance: ApiPerformance {
                api_calls: stats.api_calls,
                average_response_time: duration / stats.api_calls.max(1) as f64,
            },
            data_files,
            data_size: DataSize {
                total_bytes: stats.data_size_bytes,
                total_mb: round2(stats.data_size_bytes as f64 / 1024.0 / 1024.0),
            },
            errors: errors_log[tail..].to_vec(),
        }
    }
}

/// Result of a collection run, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Phase the run ended in.
    pub phase: CollectionPhase,
    pub organizations_collected: u64,
    pub offices_collected: u64,
    pub duration_seconds: f64,
    #[serde(default)]
    pub files_saved: BTreeMap<String, PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub report_file: Option<PathBuf>,
    pub collection_stats: CollectionStats,
}

/// Persisted state of the previous run plus the live counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionStatus {
    pub has_previous_collection: bool,
    pub current_stats: CollectionStats,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_collection_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_collection_completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_organizations_count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files_from_last_collection: Option<BTreeMap<String, PathBuf>>,
}

impl CollectionStatus {
    #[must_use]
    pub fn new(previous: Option<CollectionState>, current_stats: CollectionStats) -> Self {
        match previous {
            Some(state) => Self {
                has_previous_collection: true,
                current_stats,
                last_collection_date: Some(state.last_collection),
                last_collection_completed: Some(state.collection_completed),
                last_organizations_count: Some(state.organizations_count),
                files_from_last_collection: Some(state.files_saved),
            },
            None => Self {
                has_previous_collection: false,
                current_stats,
                last_collection_date: None,
                last_collection_completed: None,
                last_organizations_count: None,
                files_from_last_collection: None,
            },
        }
    }
}

/// Re-validation audit of an existing canonical dataset file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingDataValidation {
    pub file_path: PathBuf,
    pub total_organizations: usize,
    pub valid_organizations: usize,
    pub invalid_organizations: usize,
    pub total_offices: usize,
    pub valid_offices: usize,
    pub invalid_offices: usize,
    pub validation_errors: Vec<ValidationIssue>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
