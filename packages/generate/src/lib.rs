#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Output generation for the solicitors register.
//!
//! Turns a canonical dataset file into the distribution artifacts: a
//! compact JSON document, two CSV tables, relational-load JSON arrays, a
//! statistics report and quality dashboard data. A generation summary
//! records what was written. Every run rewrites all outputs from scratch.
//!
//! The [`verify`] module checks a generated directory from the consumer's
//! side.

pub mod compact;
pub mod relational;
pub mod statistics;
pub mod tables;
pub mod verify;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uk_solicitors_register_models::Organization;
use uk_solicitors_source::progress::ProgressCallback;

/// Output name constant for the compact JSON document.
pub const OUTPUT_COMPACT_JSON: &str = "compact_json";

/// Output name constant for the organizations CSV table.
pub const OUTPUT_ORGANIZATIONS_CSV: &str = "organizations_csv";

/// Output name constant for the offices CSV table.
pub const OUTPUT_OFFICES_CSV: &str = "offices_csv";

/// Output name constant for the relational organizations array.
pub const OUTPUT_DB_ORGANIZATIONS: &str = "database_organizations";

/// Output name constant for the relational offices array.
pub const OUTPUT_DB_OFFICES: &str = "database_offices";

/// Output name constant for the statistics report.
pub const OUTPUT_STATISTICS: &str = "statistics_report";

/// Output name constant for the quality dashboard data.
pub const OUTPUT_DASHBOARD: &str = "quality_dashboard";

/// Output name constant for the generation summary.
pub const OUTPUT_SUMMARY: &str = "generation_summary";

/// Every artifact listed in a generation summary, in write order.
pub const ARTIFACTS: [&str; 7] = [
    OUTPUT_COMPACT_JSON,
    OUTPUT_ORGANIZATIONS_CSV,
    OUTPUT_OFFICES_CSV,
    OUTPUT_DB_ORGANIZATIONS,
    OUTPUT_DB_OFFICES,
    OUTPUT_STATISTICS,
    OUTPUT_DASHBOARD,
];

/// Errors that can occur while generating outputs.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV encoding failure.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Offices whose `organization_id` has no matching organization.
    #[error("{orphans} offices reference unknown organizations")]
    Integrity {
        /// Number of orphaned offices.
        orphans: usize,
    },

    /// The input dataset file does not exist.
    #[error("Input file not found: {}", path.display())]
    MissingInput {
        /// The path that was looked up.
        path: PathBuf,
    },
}

/// Returns the file name for a given output name.
#[must_use]
pub fn output_file_name(output_name: &str) -> &str {
    match output_name {
        OUTPUT_COMPACT_JSON => "uk_solicitors_compact.json",
        OUTPUT_ORGANIZATIONS_CSV => "organizations.csv",
        OUTPUT_OFFICES_CSV => "offices.csv",
        OUTPUT_DB_ORGANIZATIONS => "db_organizations.json",
        OUTPUT_DB_OFFICES => "db_offices.json",
        OUTPUT_STATISTICS => "dataset_statistics.json",
        OUTPUT_DASHBOARD => "quality_dashboard.json",
        OUTPUT_SUMMARY => "generation_summary.json",
        _ => output_name,
    }
}

/// Returns the file path for a given output name.
#[must_use]
pub fn output_file_path(dir: &Path, output_name: &str) -> PathBuf {
    dir.join(output_file_name(output_name))
}

/// The dataset a generation run reads.
///
/// Accepts the collector's canonical file (`metadata` + `organizations`)
/// as well as the register-style `ProcessingInfo` + `Organisations`
/// layout.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceDataset {
    #[serde(default, alias = "ProcessingInfo")]
    pub metadata: Value,
    #[serde(alias = "Organisations")]
    pub organizations: Vec<Organization>,
}

impl SourceDataset {
    /// Builds a dataset from decoded organizations, stamping each office
    /// with its owner's id.
    #[must_use]
    pub fn new(metadata: Value, mut organizations: Vec<Organization>) -> Self {
        for organization in &mut organizations {
            organization.adopt_offices();
        }
        Self {
            metadata,
            organizations,
        }
    }

    /// Reads a dataset file.
    ///
    /// # Errors
    ///
    /// * [`GenerateError::MissingInput`] if `path` does not exist
    /// * [`GenerateError::Io`] or [`GenerateError::Json`] if it cannot be
    ///   read or decoded
    pub fn load(path: &Path) -> Result<Self, GenerateError> {
        if !path.exists() {
            return Err(GenerateError::MissingInput {
                path: path.to_path_buf(),
            });
        }
        let contents = std::fs::read_to_string(path)?;
        let dataset: Self = serde_json::from_str(&contents)?;
        log::info!(
            "Loaded {} organizations from {}",
            dataset.organizations.len(),
            path.display()
        );
        Ok(Self::new(dataset.metadata, dataset.organizations))
    }

    #[must_use]
    pub fn office_count(&self) -> usize {
        self.organizations.iter().map(|org| org.offices.len()).sum()
    }

    /// Mean quality score over all organizations, `0` for an empty dataset.
    #[must_use]
    pub fn average_quality_score(&self) -> f64 {
        mean(self.organizations.iter().map(Organization::quality_score))
    }

    /// Date the dataset was produced, as recorded in its metadata.
    #[must_use]
    pub fn processing_date(&self) -> &str {
        ["processed_date", "collection_date"]
            .iter()
            .find_map(|key| self.metadata.get(*key).and_then(Value::as_str))
            .unwrap_or_default()
    }
}

/// Arithmetic mean, `0` when empty.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0_usize), |(sum, count), value| (sum + value, count + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

/// `part / whole * 100`, `0` when `whole` is zero.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Manifest of a generation run, written as `generation_summary.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSummary {
    pub generation_date: DateTime<Utc>,
    pub source_file: String,
    pub output_directory: String,
    pub files_generated: FilesGenerated,
    pub dataset_summary: DatasetSummary,
}

/// File name of every generated artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesGenerated {
    pub compact_json: String,
    pub organizations_csv: String,
    pub offices_csv: String,
    pub database_organizations: String,
    pub database_offices: String,
    pub statistics_report: String,
    pub quality_dashboard: String,
}

impl Default for FilesGenerated {
    fn default() -> Self {
        let name = |output: &str| output_file_name(output).to_string();
        Self {
            compact_json: name(OUTPUT_COMPACT_JSON),
            organizations_csv: name(OUTPUT_ORGANIZATIONS_CSV),
            offices_csv: name(OUTPUT_OFFICES_CSV),
            database_organizations: name(OUTPUT_DB_ORGANIZATIONS),
            database_offices: name(OUTPUT_DB_OFFICES),
            statistics_report: name(OUTPUT_STATISTICS),
            quality_dashboard: name(OUTPUT_DASHBOARD),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub organizations: usize,
    pub offices: usize,
    pub average_quality_score: f64,
}

/// Writes pretty JSON via a `.tmp` sibling and a rename.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub(crate) fn write_json_file<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
    pretty: bool,
) -> Result<(), GenerateError> {
    let contents = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    write_atomic(path, contents.as_bytes())
}

pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), GenerateError> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);
    std::fs::write(&tmp_path, contents)?;
    std::fs::rename(&tmp_path, path)?;
    log::debug!("Wrote {}", path.display());
    Ok(())
}

/// Loads `input` and writes every artifact plus the generation summary to
/// `output_dir`, overwriting whatever a previous run left there.
///
/// # Errors
///
/// Returns [`GenerateError`] if the input cannot be loaded, an artifact
/// cannot be written, or the relational arrays fail the integrity check.
pub fn generate_all(
    input: &Path,
    output_dir: &Path,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<GenerationSummary, GenerateError> {
    let dataset = SourceDataset::load(input)?;
    generate_from_dataset(&dataset, input, output_dir, progress)
}

/// Same as [`generate_all`] for an already loaded dataset. `input` is only
/// recorded as the source file.
///
/// # Errors
///
/// See [`generate_all`].
pub fn generate_from_dataset(
    dataset: &SourceDataset,
    input: &Path,
    output_dir: &Path,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<GenerationSummary, GenerateError> {
    std::fs::create_dir_all(output_dir)?;
    let generated_at = Utc::now();
    let source_file = input.display().to_string();

    log::info!(
        "Generating outputs for {} organizations / {} offices into {}",
        dataset.organizations.len(),
        dataset.office_count(),
        output_dir.display()
    );
    progress.set_total(ARTIFACTS.len() as u64);

    progress.set_message("compact JSON".to_string());
    let compact = compact::build(&dataset.organizations, generated_at);
    write_json_file(
        &output_file_path(output_dir, OUTPUT_COMPACT_JSON),
        &compact,
        false,
    )?;
    progress.inc(1);

    progress.set_message("CSV tables".to_string());
    write_atomic(
        &output_file_path(output_dir, OUTPUT_ORGANIZATIONS_CSV),
        &tables::organizations_csv(&dataset.organizations)?,
    )?;
    progress.inc(1);
    write_atomic(
        &output_file_path(output_dir, OUTPUT_OFFICES_CSV),
        &tables::offices_csv(&dataset.organizations)?,
    )?;
    progress.inc(1);

    progress.set_message("relational JSON".to_string());
    let (db_organizations, db_offices) = relational::build(&dataset.organizations, generated_at);
    relational::check_integrity(&db_organizations, &db_offices)?;
    write_json_file(
        &output_file_path(output_dir, OUTPUT_DB_ORGANIZATIONS),
        &db_organizations,
        true,
    )?;
    progress.inc(1);
    write_json_file(
        &output_file_path(output_dir, OUTPUT_DB_OFFICES),
        &db_offices,
        true,
    )?;
    progress.inc(1);

    progress.set_message("statistics".to_string());
    let stats = statistics::build_statistics(dataset, &source_file, generated_at);
    write_json_file(
        &output_file_path(output_dir, OUTPUT_STATISTICS),
        &stats,
        true,
    )?;
    progress.inc(1);

    let dashboard = statistics::build_dashboard(dataset);
    write_json_file(
        &output_file_path(output_dir, OUTPUT_DASHBOARD),
        &dashboard,
        true,
    )?;
    progress.inc(1);

    let summary = GenerationSummary {
        generation_date: generated_at,
        source_file,
        output_directory: output_dir.display().to_string(),
        files_generated: FilesGenerated::default(),
        dataset_summary: DatasetSummary {
            organizations: dataset.organizations.len(),
            offices: dataset.office_count(),
            average_quality_score: dataset.average_quality_score(),
        },
    };
    write_json_file(
        &output_file_path(output_dir, OUTPUT_SUMMARY),
        &summary,
        true,
    )?;
    progress.finish(format!(
        "Generated {} artifacts in {}",
        ARTIFACTS.len() + 1,
        output_dir.display()
    ));

    log::info!(
        "Output generation complete: {} organizations, {} offices, average quality {:.1}",
        summary.dataset_summary.organizations,
        summary.dataset_summary.offices,
        summary.dataset_summary.average_quality_score
    );

    Ok(summary)
}

#[cfg(test)]
pub(crate) mod test_support {
    use serde_json::json;
    use uk_solicitors_register_models::Organization;

    use super::SourceDataset;

    /// Two organizations: one with a fully populated London office, one
    /// with a sparse Welsh office and no quality data.
    pub fn sample_dataset() -> SourceDataset {
        let organizations = vec![
            Organization::from_record(json!({
                "Id": 1,
                "SraNumber": "123456",
                "PracticeName": "Smith & Co Solicitors",
                "OrganisationType": "Recognised Body",
                "AuthorisationType": "Authorised",
                "AuthorisationStatus": "Active",
                "AuthorisationDate": "2001-05-04",
                "Regulator": "SRA",
                "Constitution": "LLP",
                "Type": "Organisation",
                "NoOfOffices": 1,
                "DataQualityScore": 92.5,
                "DataQualityCategory": "Excellent",
                "Offices": [{
                    "OfficeId": 10,
                    "Name": "Head Office",
                    "OfficeType": "Head Office",
                    "Address1": "1 Strand",
                    "Address2": "",
                    "Town": "London",
                    "County": "Greater London",
                    "Postcode": "SW1A 1AA",
                    "Country": "England",
                    "PhoneNumber": "+44 20 7946 0000",
                    "Email": "info@smith.co.uk"
                }]
            }))
            .unwrap(),
            Organization::from_record(json!({
                "Id": 2,
                "SraNumber": "654321",
                "PracticeName": "Jones Law",
                "Offices": [{
                    "OfficeId": 20,
                    "Name": "Cardiff",
                    "Address1": "2 Queen Street",
                    "Town": "Cardiff",
                    "Postcode": "CF10 2BH",
                    "Country": "Wales"
                }]
            }))
            .unwrap(),
        ];
        SourceDataset::new(
            json!({"collection_date": "2024-06-01T12:00:00Z", "total_organizations": 2}),
            organizations,
        )
    }
}
