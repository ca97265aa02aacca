//! Consumer-side verification of a generated output directory.
//!
//! Each artifact is re-read from disk and checked for the structure a
//! downstream loader relies on. Problems that make an artifact unusable
//! are errors; cosmetic gaps are warnings.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    OUTPUT_COMPACT_JSON, OUTPUT_DASHBOARD, OUTPUT_DB_OFFICES, OUTPUT_DB_ORGANIZATIONS,
    OUTPUT_OFFICES_CSV, OUTPUT_ORGANIZATIONS_CSV, OUTPUT_STATISTICS, OUTPUT_SUMMARY,
    output_file_name,
};

const COMPACT_FIELDS: [&str; 4] = ["version", "generated", "count", "organizations"];
const COMPACT_ORG_FIELDS: [&str; 5] = ["id", "sra_number", "name", "quality_score", "offices"];
const DB_ORG_FIELDS: [&str; 5] = [
    "id",
    "sra_number",
    "practice_name",
    "data_quality_score",
    "created_at",
];
const DB_OFFICE_FIELDS: [&str; 5] = ["id", "organization_id", "name", "postcode", "created_at"];
const STATISTICS_SECTIONS: [&str; 5] = [
    "dataset_info",
    "quality_distribution",
    "geographic_distribution",
    "organization_types",
    "contact_completeness",
];
const DASHBOARD_SECTIONS: [&str; 4] = [
    "summary",
    "quality_metrics",
    "geographic_breakdown",
    "top_quality_organizations",
];
const DASHBOARD_SUMMARY_FIELDS: [&str; 3] =
    ["total_organizations", "total_offices", "average_quality_score"];

/// Overall verdict of a verification run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationStatus {
    #[serde(rename = "PASSED")]
    Passed,
    #[serde(rename = "PASSED WITH WARNINGS")]
    PassedWithWarnings,
    #[serde(rename = "FAILED")]
    Failed,
}

impl VerificationStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Passed => "PASSED",
            Self::PassedWithWarnings => "PASSED WITH WARNINGS",
            Self::Failed => "FAILED",
        }
    }

    #[must_use]
    pub const fn grade(self) -> char {
        match self {
            Self::Passed => 'A',
            Self::PassedWithWarnings => 'B',
            Self::Failed => 'F',
        }
    }
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationReport {
    pub status: VerificationStatus,
    pub grade: char,
    pub files_checked: usize,
    pub validations_passed: usize,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub all_validations_passed: bool,
}

struct Verifier<'a> {
    dir: &'a Path,
    files_checked: usize,
    validations_passed: usize,
    errors: Vec<String>,
    warnings: Vec<String>,
}

fn missing_fields<'v>(value: &Value, fields: &[&'v str]) -> Vec<&'v str> {
    fields
        .iter()
        .copied()
        .filter(|field| value.get(field).is_none())
        .collect()
}

impl<'a> Verifier<'a> {
    const fn new(dir: &'a Path) -> Self {
        Self {
            dir,
            files_checked: 0,
            validations_passed: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn path(&self, output: &str) -> PathBuf {
        self.dir.join(output_file_name(output))
    }

    fn file_exists(&mut self, output: &str) -> bool {
        let name = output_file_name(output);
        match std::fs::metadata(self.path(output)) {
            Err(_) => {
                self.errors.push(format!("Missing file: {name}"));
                false
            }
            Ok(meta) if meta.len() == 0 => {
                self.errors.push(format!("Empty file: {name}"));
                false
            }
            Ok(_) => {
                self.files_checked += 1;
                true
            }
        }
    }

    fn json(&mut self, output: &str) -> Option<Value> {
        if !self.file_exists(output) {
            return None;
        }
        let name = output_file_name(output);
        let parsed = std::fs::read_to_string(self.path(output))
            .map_err(|e| e.to_string())
            .and_then(|contents| serde_json::from_str(&contents).map_err(|e| e.to_string()));
        match parsed {
            Ok(value) => {
                self.validations_passed += 1;
                Some(value)
            }
            Err(e) => {
                self.errors.push(format!("Invalid JSON in {name}: {e}"));
                None
            }
        }
    }

    /// Data row count of a CSV artifact.
    fn csv_rows(&mut self, output: &str) -> Option<usize> {
        if !self.file_exists(output) {
            return None;
        }
        let name = output_file_name(output);
        let counted = csv::Reader::from_path(self.path(output)).and_then(|mut reader| {
            reader.headers()?;
            reader
                .records()
                .try_fold(0_usize, |rows, record| record.map(|_| rows + 1))
        });
        match counted {
            Ok(0) => {
                self.warnings.push(format!("Empty CSV data in {name}"));
                Some(0)
            }
            Ok(rows) => {
                self.validations_passed += 1;
                Some(rows)
            }
            Err(e) => {
                self.errors.push(format!("CSV error in {name}: {e}"));
                None
            }
        }
    }

    fn check_compact(&mut self) -> bool {
        let Some(data) = self.json(OUTPUT_COMPACT_JSON) else {
            return false;
        };

        if let Some(field) = missing_fields(&data, &COMPACT_FIELDS).first() {
            self.errors
                .push(format!("Missing field '{field}' in compact JSON"));
            return false;
        }

        let organizations = data["organizations"].as_array();
        let listed = organizations.map_or(0, Vec::len);
        if data["count"].as_u64() != Some(listed as u64) {
            self.errors.push("Count mismatch in compact JSON".to_string());
            return false;
        }

        if let Some(sample) = organizations.and_then(|orgs| orgs.first()) {
            for field in missing_fields(sample, &COMPACT_ORG_FIELDS) {
                self.warnings
                    .push(format!("Missing '{field}' in organization structure"));
            }
        }

        log::info!("Compact JSON: {listed} organizations");
        true
    }

    fn check_tables(&mut self) -> bool {
        let Some(organizations) = self.csv_rows(OUTPUT_ORGANIZATIONS_CSV) else {
            return false;
        };
        let Some(offices) = self.csv_rows(OUTPUT_OFFICES_CSV) else {
            return false;
        };

        log::info!("CSV tables: {organizations} organizations, {offices} offices");
        if organizations == 0 || offices == 0 {
            self.errors.push("Empty CSV files detected".to_string());
            return false;
        }
        true
    }

    fn check_relational(&mut self) -> bool {
        let Some(organizations) = self.json(OUTPUT_DB_ORGANIZATIONS) else {
            return false;
        };
        let Some(offices) = self.json(OUTPUT_DB_OFFICES) else {
            return false;
        };
        let organizations = organizations.as_array().map_or(&[][..], Vec::as_slice);
        let offices = offices.as_array().map_or(&[][..], Vec::as_slice);

        if let Some(sample) = organizations.first() {
            for field in missing_fields(sample, &DB_ORG_FIELDS) {
                self.warnings.push(format!(
                    "Missing database field '{field}' in organizations"
                ));
            }
        }
        if let Some(sample) = offices.first() {
            for field in missing_fields(sample, &DB_OFFICE_FIELDS) {
                self.warnings
                    .push(format!("Missing database field '{field}' in offices"));
            }
        }

        let ids: BTreeSet<String> = organizations
            .iter()
            .map(|org| org["id"].to_string())
            .collect();
        let orphaned: BTreeSet<String> = offices
            .iter()
            .map(|office| office["organization_id"].to_string())
            .filter(|id| !ids.contains(id))
            .collect();
        if !orphaned.is_empty() {
            self.errors
                .push(format!("Found {} orphaned offices", orphaned.len()));
            return false;
        }

        log::info!(
            "Relational arrays: {} organizations, {} offices, referential integrity maintained",
            organizations.len(),
            offices.len()
        );
        true
    }

    fn check_statistics(&mut self) -> bool {
        let Some(data) = self.json(OUTPUT_STATISTICS) else {
            return false;
        };

        if let Some(section) = missing_fields(&data, &STATISTICS_SECTIONS).first() {
            self.errors
                .push(format!("Missing statistics section: {section}"));
            return false;
        }

        let info = &data["dataset_info"];
        let positive = |key: &str| info[key].as_u64().is_some_and(|n| n > 0);
        if !positive("total_organizations") || !positive("total_offices") {
            self.errors
                .push("Invalid dataset counts in statistics".to_string());
            return false;
        }
        true
    }

    fn check_dashboard(&mut self) -> bool {
        let Some(data) = self.json(OUTPUT_DASHBOARD) else {
            return false;
        };

        if let Some(section) = missing_fields(&data, &DASHBOARD_SECTIONS).first() {
            self.errors
                .push(format!("Missing dashboard section: {section}"));
            return false;
        }

        for field in missing_fields(&data["summary"], &DASHBOARD_SUMMARY_FIELDS) {
            self.warnings.push(format!("Missing summary field: {field}"));
        }
        true
    }

    fn check_summary(&mut self) {
        if self.json(OUTPUT_SUMMARY).is_some() {
            log::debug!("Generation summary present");
        }
    }
}

/// Verifies every artifact in `dir`.
///
/// The run passes when every artifact check succeeds and no error was
/// recorded; warnings downgrade a pass to "passed with warnings".
#[must_use]
pub fn verify_outputs(dir: &Path) -> VerificationReport {
    let mut verifier = Verifier::new(dir);

    let checks = [
        verifier.check_compact(),
        verifier.check_tables(),
        verifier.check_relational(),
        verifier.check_statistics(),
        verifier.check_dashboard(),
    ];
    verifier.check_summary();

    let all_validations_passed = checks.iter().all(|passed| *passed);
    let status = if !all_validations_passed || !verifier.errors.is_empty() {
        VerificationStatus::Failed
    } else if verifier.warnings.is_empty() {
        VerificationStatus::Passed
    } else {
        VerificationStatus::PassedWithWarnings
    };

    for error in &verifier.errors {
        log::error!("{error}");
    }
    for warning in &verifier.warnings {
        log::warn!("{warning}");
    }
    log::info!(
        "Verification {status} (grade {}): {} files checked, {} validations passed",
        status.grade(),
        verifier.files_checked,
        verifier.validations_passed
    );

    VerificationReport {
        status,
        grade: status.grade(),
        files_checked: verifier.files_checked,
        validations_passed: verifier.validations_passed,
        errors: verifier.errors,
        warnings: verifier.warnings,
        all_validations_passed,
    }
}
