#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Collection of the SRA organisation dataset.
//!
//! A run moves through [`CollectionPhase::Fetching`],
//! [`CollectionPhase::Validating`], [`CollectionPhase::Persisting`] and
//! [`CollectionPhase::Reporting`] before ending as
//! [`CollectionPhase::Completed`] or [`CollectionPhase::Failed`].
//!
//! Invalid offices are dropped from their organisation. Invalid
//! organisations are kept and recorded in the validation summary. An
//! unexpected failure while processing one organisation is logged and
//! recorded, and the run continues with the next one. Only a failed
//! connection, an empty dataset or a persistence failure fails the run.

pub mod storage;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use uk_solicitors_collect_models::{
    CanonicalDataset, CanonicalMetadata, CollectionOutcome, CollectionPhase, CollectionReport,
    CollectionState, CollectionStats, CollectionStatus, ExistingDataValidation, IssueKind,
    ProcessingError, ValidationIssue, ValidationSummary,
};
use uk_solicitors_config::{Settings, SraApiSettings};
use uk_solicitors_register_models::Organization;
use uk_solicitors_source::ApiError;
use uk_solicitors_source::client::RegistryClient;
use uk_solicitors_source::progress::{ProgressCallback, null_progress};
use uk_solicitors_source::transport::Transport;
use uk_solicitors_validation::{RecordType, ValidationResult, Validator};

/// Errors that fail a collection run or an audit.
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// The registry API failed after the client's own retries.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// The connection test did not succeed.
    #[error("Failed to establish connection to SRA API")]
    ConnectionFailed,

    /// The API returned no organisations.
    #[error("No organizations data received from API")]
    EmptyDataset,

    /// A file could not be written or read.
    #[error("Failed to access {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON (de)serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The run was cancelled by the user.
    #[error("Collection interrupted by user")]
    Interrupted,

    /// No canonical dataset file exists to audit.
    #[error("No existing data files found")]
    NoExistingData,
}

/// Drives one collection run at a time and owns its counters.
pub struct Collector {
    api: SraApiSettings,
    output_dir: PathBuf,
    validator: Validator,
    transport: Option<Arc<dyn Transport>>,
    progress: Arc<dyn ProgressCallback>,
    phase: CollectionPhase,
    stats: CollectionStats,
    errors_log: Vec<ProcessingError>,
}

impl Collector {
    /// Creates a collector writing under `settings.paths.raw_dir`.
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        Self {
            api: settings.data_sources.sra_api.clone(),
            output_dir: settings.paths.raw_dir.clone(),
            validator: Validator::new(settings),
            transport: None,
            progress: null_progress(),
            phase: CollectionPhase::Idle,
            stats: CollectionStats::default(),
            errors_log: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Sends API requests through `transport` instead of a new HTTP pool.
    #[must_use]
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    #[must_use]
    pub const fn phase(&self) -> CollectionPhase {
        self.phase
    }

    #[must_use]
    pub const fn stats(&self) -> &CollectionStats {
        &self.stats
    }

    /// Runs a full collection.
    ///
    /// With `resume`, a previous state snapshot is loaded and logged, but
    /// the dataset is always fetched again.
    ///
    /// Never fails: errors are reported in the returned outcome together
    /// with whatever counters were accumulated.
    pub async fn collect(&mut self, resume: bool) -> CollectionOutcome {
        self.stats = CollectionStats {
            start_time: Some(Utc::now()),
            ..CollectionStats::default()
        };
        self.errors_log.clear();
        self.phase = CollectionPhase::Idle;
        log::info!("Starting SRA organizations collection...");

        match self.run(resume).await {
            Ok((files_saved, report_file)) => {
                self.phase = CollectionPhase::Completed;
                let duration = self.stats.duration_seconds();
                log::info!(
                    "SRA Collection completed in {duration:.2}s (organizations={}, offices={}, errors={})",
                    self.stats.organizations_processed,
                    self.stats.offices_processed,
                    self.stats.processing_errors
                );

                CollectionOutcome {
                    success: true,
                    error: None,
                    phase: self.phase,
                    organizations_collected: self.stats.organizations_processed,
                    offices_collected: self.stats.offices_processed,
                    duration_seconds: duration,
                    files_saved,
                    report_file: Some(report_file),
                    collection_stats: self.stats.clone(),
                }
            }
            Err(e) => self.failed_outcome(&e),
        }
    }

    /// Finalizes a run whose future was dropped before completion.
    ///
    /// Files already persisted are left in place.
    pub fn interrupted_outcome(&mut self) -> CollectionOutcome {
        log::warn!("Collection interrupted during {} phase", self.phase);
        self.failed_outcome(&CollectError::Interrupted)
    }

    fn failed_outcome(&mut self, error: &CollectError) -> CollectionOutcome {
        self.stats.end_time = Some(Utc::now());
        log::error!("SRA collection failed during {} phase: {error}", self.phase);
        self.phase = CollectionPhase::Failed;

        CollectionOutcome {
            success: false,
            error: Some(error.to_string()),
            phase: self.phase,
            organizations_collected: self.stats.organizations_processed,
            offices_collected: self.stats.offices_processed,
            duration_seconds: self.stats.duration_seconds(),
            files_saved: BTreeMap::new(),
            report_file: None,
            collection_stats: self.stats.clone(),
        }
    }

    async fn run(
        &mut self,
        resume: bool,
    ) -> Result<(BTreeMap<String, PathBuf>, PathBuf), CollectError> {
        storage::ensure_directories(&self.output_dir)?;

        if resume && let Some(state) = self.load_state() {
            log::info!(
                "Previous collection from {} found ({} organizations); collecting again",
                state.last_collection,
                state.organizations_count
            );
        }

        self.phase = CollectionPhase::Fetching;
        let organisations = {
            let mut client = self.open_client()?;

            if !client.test_connection().await {
                self.stats.api_calls = u64::from(client.requests_made());
                return Err(CollectError::ConnectionFailed);
            }

            log::info!("Requesting organizations data from SRA API...");
            let fetched = client.get_all_organizations().await;
            self.stats.api_calls = u64::from(client.requests_made());
            let response = fetched?;

            self.stats.total_organizations = u64::try_from(response.count).unwrap_or(0);
            if response.organisations.is_empty() {
                return Err(CollectError::EmptyDataset);
            }
            log::info!(
                "Received {} organizations (API reports {} total)",
                response.organisations.len(),
                response.count
            );
            response.organisations
        };

        self.phase = CollectionPhase::Validating;
        let dataset = self.process_organizations(organisations);

        self.phase = CollectionPhase::Persisting;
        let files_saved = self.save_data(&dataset)?;
        self.save_state(&CollectionState {
            last_collection: Utc::now(),
            organizations_count: dataset.metadata.total_organizations,
            collection_completed: true,
            files_saved: files_saved.clone(),
        })?;

        self.stats.end_time = Some(Utc::now());
        self.phase = CollectionPhase::Reporting;
        let report_file = self.write_report(files_saved.clone())?;

        Ok((files_saved, report_file))
    }

    fn open_client(&self) -> Result<RegistryClient, ApiError> {
        match &self.transport {
            Some(transport) => RegistryClient::new(&self.api, Arc::clone(transport)),
            None => RegistryClient::connect(&self.api),
        }
    }

    /// Validates every organisation and its offices, dropping invalid
    /// offices, and builds the canonical dataset.
    fn process_organizations(&mut self, records: Vec<Value>) -> CanonicalDataset {
        let mut summary = ValidationSummary::default();
        let mut total_offices = 0;
        let total_organizations = records.len();
        let mut organizations = Vec::with_capacity(total_organizations);

        self.progress.set_total(total_organizations as u64);
        self.progress.set_message("Processing organizations".to_string());

        for record in records {
            let org_id = record.get("Id").cloned().unwrap_or(Value::Null);

            match self.process_organization(record, &org_id, &mut summary, &mut total_offices) {
                Ok(organization) => {
                    organizations.push(organization);
                    self.stats.organizations_processed += 1;
                }
                Err(e) => {
                    self.stats.processing_errors += 1;
                    log::error!("Error processing organization {org_id}: {e}");
                    self.errors_log.push(ProcessingError {
                        organization_id: org_id,
                        error: e.to_string(),
                        timestamp: Utc::now(),
                    });
                }
            }
            self.progress.inc(1);
        }

        self.progress
            .finish("All organizations processed".to_string());
        log::info!(
            "Validation Summary: {}/{total_organizations} orgs valid, {}/{total_offices} offices valid",
            summary.valid_organizations,
            summary.valid_offices
        );

        CanonicalDataset {
            metadata: CanonicalMetadata {
                collection_date: Utc::now(),
                total_organizations,
                total_offices,
                validation_summary: summary,
            },
            organizations,
        }
    }

    fn process_organization(
        &mut self,
        mut record: Value,
        org_id: &Value,
        summary: &mut ValidationSummary,
        total_offices: &mut usize,
    ) -> Result<Organization, serde_json::Error> {
        let result = self
            .validator
            .validate_record(&record, &RecordType::SraOrganization);
        if result.valid {
            summary.valid_organizations += 1;
        } else {
            self.stats.validation_errors += 1;
            summary.invalid_organizations += 1;
            log::warn!("Invalid organization {org_id}: {:?}", result.errors);
            summary
                .validation_errors
                .push(issue(org_id, None, result));
        }

        let mut rejected = Vec::new();
        let mut seen_offices = 0;
        if let Some(Value::Array(offices)) = record.get_mut("Offices") {
            seen_offices = offices.len();
            let mut valid_offices = Vec::with_capacity(offices.len());
            for office in std::mem::take(offices) {
                let result = self.validator.validate_record(&office, &RecordType::SraOffice);
                if result.valid {
                    valid_offices.push(office);
                } else {
                    let office_id = office.get("OfficeId").cloned().unwrap_or(Value::Null);
                    rejected.push((office_id, result));
                }
            }
            *offices = valid_offices;
        }

        // Office counters only move once the organisation is known to be kept.
        let organization = Organization::from_record(record)?;

        *total_offices += seen_offices;
        self.stats.total_offices += seen_offices as u64;
        summary.valid_offices += organization.offices.len() as u64;
        self.stats.offices_processed += organization.offices.len() as u64;
        for (office_id, result) in rejected {
            self.stats.validation_errors += 1;
            summary.invalid_offices += 1;
            log::warn!(
                "Invalid office {office_id} for org {org_id}: {:?}",
                result.errors
            );
            summary
                .validation_errors
                .push(issue(org_id, Some(office_id), result));
        }

        Ok(organization)
    }

    fn save_data(
        &mut self,
        dataset: &CanonicalDataset,
    ) -> Result<BTreeMap<String, PathBuf>, CollectError> {
        let main_file = self
            .output_dir
            .join(storage::ORGANIZATIONS_DIR)
            .join(storage::dated_file_name("organizations_complete"));
        let main_size = storage::write_json(&main_file, dataset)?;
        log::info!("Organizations data saved to {}", main_file.display());

        let metadata_file = self
            .output_dir
            .join(storage::METADATA_DIR)
            .join(storage::dated_file_name("organizations_metadata"));
        let metadata_size = storage::write_json(&metadata_file, &dataset.metadata)?;
        log::info!("Metadata saved to {}", metadata_file.display());

        self.stats.data_size_bytes = main_size + metadata_size;

        Ok(BTreeMap::from([
            (storage::ROLE_MAIN_DATA.to_string(), main_file),
            (storage::ROLE_METADATA.to_string(), metadata_file),
        ]))
    }

    fn save_state(&self, state: &CollectionState) -> Result<(), CollectError> {
        storage::write_json(&storage::state_path(&self.output_dir), state)?;
        log::debug!("Collection state saved");
        Ok(())
    }

    /// Loads the previous state snapshot. A missing or unreadable file is
    /// treated as "no previous collection".
    fn load_state(&self) -> Option<CollectionState> {
        let path = storage::state_path(&self.output_dir);
        if !path.exists() {
            return None;
        }
        match storage::read_json(&path) {
            Ok(state) => {
                log::info!("Previous collection state loaded");
                Some(state)
            }
            Err(e) => {
                log::error!("Failed to load collection state: {e}");
                None
            }
        }
    }

    fn write_report(&self, files: BTreeMap<String, PathBuf>) -> Result<PathBuf, CollectError> {
        let report = CollectionReport::new(&self.stats, files, &self.errors_log);
        let path = self
            .output_dir
            .join(storage::REPORTS_DIR)
            .join(storage::dated_file_name("collection_summary"));
        storage::write_json(&path, &report)?;
        log::info!("Collection report saved to {}", path.display());
        Ok(path)
    }

    /// Returns the persisted state of the previous run, if any, together
    /// with the live counters of the current one.
    #[must_use]
    pub fn get_collection_status(&self) -> CollectionStatus {
        CollectionStatus::new(self.load_state(), self.stats.clone())
    }

    /// Re-validates an existing canonical dataset file without fetching or
    /// writing anything. Without `data_file`, the most recent dataset in
    /// the organisations directory is used.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::NoExistingData`] if no file is given and
    /// none exists, or an I/O/JSON error if the file cannot be read.
    pub fn validate_existing_data(
        &self,
        data_file: Option<&Path>,
    ) -> Result<ExistingDataValidation, CollectError> {
        let path = match data_file {
            Some(path) => path.to_path_buf(),
            None => {
                storage::latest_dataset_file(&self.output_dir).ok_or(CollectError::NoExistingData)?
            }
        };
        log::info!("Validating data from {}", path.display());

        let data: Value = storage::read_json(&path)?;
        let organizations = data
            .get("organizations")
            .and_then(Value::as_array)
            .map_or(&[][..], Vec::as_slice);

        let mut audit = ExistingDataValidation {
            file_path: path.clone(),
            total_organizations: organizations.len(),
            ..ExistingDataValidation::default()
        };

        for org in organizations {
            let org_id = org.get("Id").cloned().unwrap_or(Value::Null);
            let result = self
                .validator
                .validate_record(org, &RecordType::SraOrganization);
            if result.valid {
                audit.valid_organizations += 1;
            } else {
                audit.invalid_organizations += 1;
                audit.validation_errors.push(issue(&org_id, None, result));
            }

            let offices = org
                .get("Offices")
                .and_then(Value::as_array)
                .map_or(&[][..], Vec::as_slice);
            audit.total_offices += offices.len();

            for office in offices {
                let result = self.validator.validate_record(office, &RecordType::SraOffice);
                if result.valid {
                    audit.valid_offices += 1;
                } else {
                    audit.invalid_offices += 1;
                    let office_id = office.get("OfficeId").cloned().unwrap_or(Value::Null);
                    audit
                        .validation_errors
                        .push(issue(&org_id, Some(office_id), result));
                }
            }
        }

        log::info!(
            "Validation complete: {}/{} orgs valid, {}/{} offices valid",
            audit.valid_organizations,
            audit.total_organizations,
            audit.valid_offices,
            audit.total_offices
        );

        Ok(audit)
    }
}

fn issue(org_id: &Value, office_id: Option<Value>, result: ValidationResult) -> ValidationIssue {
    ValidationIssue {
        organization_id: org_id.clone(),
        kind: if office_id.is_some() {
            IssueKind::Office
        } else {
            IssueKind::Organization
        },
        office_id,
        errors: result.errors,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;
    use uk_solicitors_register_models::RecordId;
    use uk_solicitors_source::transport::{HttpRequest, HttpResponse};

    use super::*;

    struct ScriptedTransport {
        responses: Mutex<VecDeque<HttpResponse>>,
        calls: Mutex<usize>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<HttpResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(0),
            })
        }

        fn serving(body: &Value, times: usize) -> Arc<Self> {
            Self::new((0..times).map(|_| ok(body)).collect())
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn get(&self, _request: &HttpRequest) -> Result<HttpResponse, ApiError> {
            *self.calls.lock().unwrap() += 1;
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| ApiError::Transport {
                    message: "script exhausted".to_string(),
                })
        }
    }

    fn ok(body: &Value) -> HttpResponse {
        HttpResponse {
            status: 200,
            retry_after: None,
            body: body.to_string(),
        }
    }

    fn registry_body() -> Value {
        json!({
            "Count": 2,
            "Organisations": [
                {
                    "Id": 1,
                    "SraNumber": "123456",
                    "PracticeName": "Alpha Law LLP",
                    "OrganisationType": "Recognised Body",
                    "NoOfOffices": 1,
                    "DataQualityScore": 92.0,
                    "Offices": [{
                        "OfficeId": 11,
                        "Name": "Alpha Head Office",
                        "OfficeType": "Head Office",
                        "Address1": "1 Strand",
                        "Town": "London",
                        "Postcode": "SW1A 1AA",
                        "Country": "England",
                        "PhoneNumber": "+44 20 7946 0000",
                        "Email": "info@alpha.co.uk"
                    }]
                },
                {
                    "Id": 2,
                    "SraNumber": "12",
                    "PracticeName": "Beta Legal",
                    "NoOfOffices": 1,
                    "Offices": [{
                        "OfficeId": 21,
                        "Name": "",
                        "Town": "Leeds",
                        "Postcode": "BAD"
                    }]
                }
            ]
        })
    }

    fn settings() -> Settings {
        Settings::from_toml_str(
            r#"
            [data_sources.sra_api]
            api_key = "test-key"
            "#,
        )
        .unwrap()
    }

    fn collector(name: &str, transport: Arc<ScriptedTransport>) -> Collector {
        let dir = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&dir);
        Collector::new(&settings())
            .with_output_dir(dir)
            .with_transport(transport)
    }

    #[tokio::test(start_paused = true)]
    async fn collects_validates_and_persists() {
        let transport = ScriptedTransport::serving(&registry_body(), 2);
        let mut collector = collector("uk_solicitors_collect_e2e", transport.clone());

        let outcome = collector.collect(false).await;

        assert!(outcome.success, "{:?}", outcome.error);
        assert_eq!(outcome.phase, CollectionPhase::Completed);
        assert_eq!(outcome.organizations_collected, 2);
        assert_eq!(outcome.offices_collected, 1);

        let stats = &outcome.collection_stats;
        assert_eq!(stats.total_organizations, 2);
        assert_eq!(stats.total_offices, 2);
        assert_eq!(stats.validation_errors, 2);
        assert_eq!(stats.processing_errors, 0);
        assert_eq!(stats.api_calls, 2);
        assert_eq!(transport.calls(), 2);
        assert!(stats.data_size_bytes > 0);

        let main_file = &outcome.files_saved[storage::ROLE_MAIN_DATA];
        let dataset: CanonicalDataset = storage::read_json(main_file).unwrap();
        assert_eq!(dataset.organizations.len(), 2);
        assert_eq!(dataset.organizations[0].offices.len(), 1);
        assert!(dataset.organizations[1].offices.is_empty());

        let summary = &dataset.metadata.validation_summary;
        assert_eq!(dataset.metadata.total_offices, 2);
        assert_eq!(summary.valid_organizations, 1);
        assert_eq!(summary.invalid_organizations, 1);
        assert_eq!(summary.valid_offices, 1);
        assert_eq!(summary.invalid_offices, 1);
        assert_eq!(summary.validation_errors.len(), 2);
        assert_eq!(summary.validation_errors[1].kind, IssueKind::Office);
        assert_eq!(summary.validation_errors[1].office_id, Some(json!(21)));
        // The "BAD" postcode alone is only a warning; the empty name drops it.
        assert_eq!(
            summary.validation_errors[1].errors,
            vec!["Missing or empty required field: Name".to_string()]
        );

        let status = collector.get_collection_status();
        assert!(status.has_previous_collection);
        assert_eq!(status.last_collection_completed, Some(true));
        assert_eq!(status.last_organizations_count, Some(2));

        let report: Value = storage::read_json(outcome.report_file.as_ref().unwrap()).unwrap();
        for section in [
            "collection_summary",
            "data_quality",
            "api_performance",
            "data_files",
            "data_size",
            "errors",
        ] {
            assert!(report.get(section).is_some(), "missing {section}");
        }
        assert_eq!(report["collection_summary"]["success_rate"], json!(100.0));

        std::fs::remove_dir_all(collector.output_dir()).ok();
    }

    #[tokio::test(start_paused = true)]
    async fn audit_revalidates_latest_dataset() {
        let transport = ScriptedTransport::serving(&registry_body(), 2);
        let mut collector = collector("uk_solicitors_collect_audit", transport);
        assert!(collector.collect(false).await.success);

        let audit = collector.validate_existing_data(None).unwrap();
        assert_eq!(audit.total_organizations, 2);
        assert_eq!(audit.valid_organizations, 1);
        assert_eq!(audit.invalid_organizations, 1);
        assert_eq!(audit.total_offices, 1);
        assert_eq!(audit.valid_offices, 1);
        assert_eq!(audit.invalid_offices, 0);

        std::fs::remove_dir_all(collector.output_dir()).ok();
    }

    #[test]
    fn audit_without_data_fails() {
        let collector = collector("uk_solicitors_collect_no_data", ScriptedTransport::new(Vec::new()));
        assert!(matches!(
            collector.validate_existing_data(None),
            Err(CollectError::NoExistingData)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_dataset_fails_the_run() {
        let body = json!({"Count": 0, "Organisations": []});
        let transport = ScriptedTransport::serving(&body, 2);
        let mut collector = collector("uk_solicitors_collect_empty", transport);

        let outcome = collector.collect(false).await;

        assert!(!outcome.success);
        assert_eq!(outcome.phase, CollectionPhase::Failed);
        assert_eq!(
            outcome.error.as_deref(),
            Some("No organizations data received from API")
        );
        assert!(!collector.get_collection_status().has_previous_collection);

        std::fs::remove_dir_all(collector.output_dir()).ok();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_connection_test_fails_the_run() {
        let unauthorized = HttpResponse {
            status: 401,
            retry_after: None,
            body: String::new(),
        };
        let transport = ScriptedTransport::new(vec![unauthorized]);
        let mut collector = collector("uk_solicitors_collect_unauthorized", transport.clone());

        let outcome = collector.collect(false).await;

        assert!(!outcome.success);
        assert_eq!(
            outcome.error.as_deref(),
            Some("Failed to establish connection to SRA API")
        );
        assert_eq!(transport.calls(), 1);
        assert_eq!(outcome.collection_stats.api_calls, 1);
        assert!(outcome.files_saved.is_empty());

        std::fs::remove_dir_all(collector.output_dir()).ok();
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_organisation_is_skipped_and_logged() {
        let mut body = registry_body();
        body["Organisations"]
            .as_array_mut()
            .unwrap()
            .push(json!("not an organisation"));
        let transport = ScriptedTransport::serving(&body, 2);
        let mut collector = collector("uk_solicitors_collect_malformed", transport);

        let outcome = collector.collect(false).await;

        assert!(outcome.success);
        assert_eq!(outcome.organizations_collected, 2);
        assert_eq!(outcome.collection_stats.processing_errors, 1);

        let report: CollectionReport =
            storage::read_json(outcome.report_file.as_ref().unwrap()).unwrap();
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].organization_id, Value::Null);

        std::fs::remove_dir_all(collector.output_dir()).ok();
    }

    #[tokio::test(start_paused = true)]
    async fn organisations_with_unusable_ids_are_kept() {
        let body = json!({
            "Count": 3,
            "Organisations": [
                registry_body()["Organisations"][0].clone(),
                {
                    "SraNumber": "654321",
                    "PracticeName": "No Id LLP",
                    "Offices": [{"OfficeId": 31, "Name": "Main", "Town": "York"}]
                },
                {
                    "Id": 2.5,
                    "SraNumber": "765432",
                    "PracticeName": "Fractional Id Ltd",
                    "Offices": [{"OfficeId": 41, "Name": "Main", "Town": "Bath"}]
                }
            ]
        });
        let transport = ScriptedTransport::serving(&body, 2);
        let mut collector = collector("uk_solicitors_collect_unusable_ids", transport);

        let outcome = collector.collect(false).await;

        assert!(outcome.success, "{:?}", outcome.error);
        let stats = &outcome.collection_stats;
        assert_eq!(stats.processing_errors, 0);
        assert_eq!(stats.organizations_processed, 3);
        assert_eq!(stats.total_offices, 3);
        assert_eq!(stats.offices_processed, 3);

        let dataset: CanonicalDataset =
            storage::read_json(&outcome.files_saved[storage::ROLE_MAIN_DATA]).unwrap();
        assert_eq!(dataset.organizations.len(), 3);
        assert_eq!(dataset.organizations[1].id, RecordId::Unknown);
        assert_eq!(dataset.organizations[2].id, RecordId::Text("2.5".to_string()));
        assert_eq!(dataset.organizations[2].offices.len(), 1);

        let summary = &dataset.metadata.validation_summary;
        assert_eq!(summary.invalid_organizations, 2);
        assert_eq!(summary.valid_organizations, 1);
        assert_eq!(summary.valid_offices, 3);
        assert_eq!(
            summary.valid_offices + summary.invalid_offices,
            dataset.metadata.total_offices as u64
        );

        std::fs::remove_dir_all(collector.output_dir()).ok();
    }

    #[tokio::test(start_paused = true)]
    async fn non_object_records_leave_office_counters_untouched() {
        let body = json!({
            "Count": 2,
            "Organisations": [registry_body()["Organisations"][0].clone(), [1, 2, 3]]
        });
        let transport = ScriptedTransport::serving(&body, 2);
        let mut collector = collector("uk_solicitors_collect_non_object", transport);

        let outcome = collector.collect(false).await;

        assert!(outcome.success);
        let stats = &outcome.collection_stats;
        assert_eq!(stats.processing_errors, 1);
        assert_eq!(stats.organizations_processed, 1);
        assert_eq!(stats.total_offices, 1);
        assert_eq!(stats.offices_processed, 1);

        std::fs::remove_dir_all(collector.output_dir()).ok();
    }

    #[tokio::test(start_paused = true)]
    async fn resume_still_fetches_everything() {
        let transport = ScriptedTransport::serving(&registry_body(), 4);
        let mut collector = collector("uk_solicitors_collect_resume", transport.clone());

        assert!(collector.collect(false).await.success);
        let outcome = collector.collect(true).await;

        assert!(outcome.success);
        assert_eq!(transport.calls(), 4);
        assert_eq!(outcome.organizations_collected, 2);

        std::fs::remove_dir_all(collector.output_dir()).ok();
    }

    #[test]
    fn interruption_reports_partial_counters() {
        let mut collector = collector("uk_solicitors_collect_interrupt", ScriptedTransport::new(Vec::new()));
        collector.stats.start_time = Some(Utc::now());
        collector.stats.organizations_processed = 7;
        collector.phase = CollectionPhase::Validating;

        let outcome = collector.interrupted_outcome();

        assert!(!outcome.success);
        assert_eq!(outcome.phase, CollectionPhase::Failed);
        assert_eq!(outcome.organizations_collected, 7);
        assert_eq!(outcome.error.as_deref(), Some("Collection interrupted by user"));
        assert!(outcome.collection_stats.end_time.is_some());
    }
}
