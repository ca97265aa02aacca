//! Subcommand implementations.

use std::path::{Path, PathBuf};

use uk_solicitors_cli_utils::{MultiProgress, PipelineProgress};
use uk_solicitors_collect::{Collector, storage};
use uk_solicitors_collect_models::{CollectionOutcome, REPORTED_ERRORS};
use uk_solicitors_config::Settings;
use uk_solicitors_generate::verify::{VerificationStatus, verify_outputs};
use uk_solicitors_generate::{ARTIFACTS, GenerationSummary, generate_all, output_file_path};
use uk_solicitors_source::client::RegistryClient;

type CommandResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Runs `collector` until it finishes or the user presses Ctrl-C.
///
/// An interrupted run still reports the counters accumulated so far.
/// Files it already wrote are kept.
async fn run_collection(mut collector: Collector, resume: bool) -> CollectionOutcome {
    let finished = tokio::select! {
        outcome = collector.collect(resume) => Some(outcome),
        _ = tokio::signal::ctrl_c() => None,
    };

    match finished {
        Some(outcome) => outcome,
        None => collector.interrupted_outcome(),
    }
}

fn print_outcome(outcome: &CollectionOutcome) {
    let stats = &outcome.collection_stats;
    println!();
    println!(
        "{:<28}{}",
        "Status:",
        if outcome.success { "completed" } else { "failed" }
    );
    println!("{:<28}{}", "Phase:", outcome.phase);
    println!("{:<28}{:>10}", "Organizations collected:", outcome.organizations_collected);
    println!("{:<28}{:>10}", "Offices collected:", outcome.offices_collected);
    println!("{:<28}{:>10}", "Validation errors:", stats.validation_errors);
    println!("{:<28}{:>10}", "Processing errors:", stats.processing_errors);
    println!("{:<28}{:>10}", "API calls:", stats.api_calls);
    println!("{:<28}{:>10.1}s", "Duration:", outcome.duration_seconds);

    for (role, path) in &outcome.files_saved {
        println!("  {role}: {}", path.display());
    }
    if let Some(report) = &outcome.report_file {
        println!("  report: {}", report.display());
    }
}

pub async fn collect(settings: &Settings, multi: &MultiProgress, resume: bool) -> CommandResult<()> {
    let progress = PipelineProgress::collection(multi);
    let collector = Collector::new(settings).with_progress(progress);

    let outcome = run_collection(collector, resume).await;
    print_outcome(&outcome);

    if outcome.success {
        Ok(())
    } else {
        Err(outcome
            .error
            .unwrap_or_else(|| "Collection failed".to_string())
            .into())
    }
}

pub fn status(settings: &Settings) -> CommandResult<()> {
    let status = Collector::new(settings).get_collection_status();
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

pub async fn test_connection(settings: &Settings) -> CommandResult<()> {
    let mut client = RegistryClient::connect(&settings.data_sources.sra_api)?;
    if client.test_connection().await {
        println!("SRA API connection successful");
        Ok(())
    } else {
        Err("SRA API connection failed".into())
    }
}

pub fn api_info(settings: &Settings) -> CommandResult<()> {
    let client = RegistryClient::connect(&settings.data_sources.sra_api)?;
    println!("{}", serde_json::to_string_pretty(&client.get_api_info())?);
    Ok(())
}

pub fn validate(settings: &Settings, file: Option<&Path>) -> CommandResult<()> {
    let audit = Collector::new(settings).validate_existing_data(file)?;

    println!("File: {}", audit.file_path.display());
    println!(
        "Organizations: {} valid / {} invalid of {}",
        audit.valid_organizations, audit.invalid_organizations, audit.total_organizations
    );
    println!(
        "Offices:       {} valid / {} invalid of {}",
        audit.valid_offices, audit.invalid_offices, audit.total_offices
    );
    for issue in audit.validation_errors.iter().take(REPORTED_ERRORS) {
        println!(
            "  {} {}: {}",
            issue.kind,
            issue.office_id.as_ref().unwrap_or(&issue.organization_id),
            issue.errors.join("; ")
        );
    }
    if audit.validation_errors.len() > REPORTED_ERRORS {
        println!(
            "  ... and {} more",
            audit.validation_errors.len() - REPORTED_ERRORS
        );
    }
    Ok(())
}

fn resolve_input(settings: &Settings, input: Option<&Path>) -> CommandResult<PathBuf> {
    match input {
        Some(path) => Ok(path.to_path_buf()),
        None => storage::latest_dataset_file(&settings.paths.raw_dir).ok_or_else(|| {
            format!(
                "No collected dataset under {}; run `collect` first",
                settings.paths.raw_dir.display()
            )
            .into()
        }),
    }
}

pub fn generate(
    settings: &Settings,
    multi: &MultiProgress,
    input: Option<&Path>,
    output: Option<&Path>,
) -> CommandResult<GenerationSummary> {
    let input = resolve_input(settings, input)?;
    let output_dir = output.unwrap_or(&settings.paths.output_dir);

    let progress = PipelineProgress::generation(multi, ARTIFACTS.len());
    let summary = generate_all(&input, output_dir, &progress)?;

    println!();
    println!("{:<28}{:>10}", "Organizations:", summary.dataset_summary.organizations);
    println!("{:<28}{:>10}", "Offices:", summary.dataset_summary.offices);
    println!(
        "{:<28}{:>10.1}",
        "Average quality score:", summary.dataset_summary.average_quality_score
    );
    for output_name in ARTIFACTS {
        let path = output_file_path(output_dir, output_name);
        #[allow(clippy::cast_precision_loss)]
        let size_mb = std::fs::metadata(&path)
            .map(|meta| meta.len() as f64 / (1024.0 * 1024.0))
            .unwrap_or_default();
        println!(
            "  {output_name}: {} ({size_mb:.1} MB)",
            path.file_name().map_or_else(String::new, |name| name.to_string_lossy().into_owned())
        );
    }

    Ok(summary)
}

pub fn verify(settings: &Settings, dir: Option<&Path>) -> CommandResult<()> {
    let dir = dir.unwrap_or(&settings.paths.output_dir);
    let report = verify_outputs(dir);

    println!("{:<28}{:>10}", "Files checked:", report.files_checked);
    println!("{:<28}{:>10}", "Validations passed:", report.validations_passed);
    println!("{:<28}{:>10}", "Errors found:", report.errors.len());
    println!("{:<28}{:>10}", "Warnings:", report.warnings.len());
    for error in &report.errors {
        println!("  error: {error}");
    }
    for warning in &report.warnings {
        println!("  warning: {warning}");
    }
    println!("Overall status: {} (Grade: {})", report.status, report.grade);

    if report.status == VerificationStatus::Failed {
        return Err(format!("Output verification failed for {}", dir.display()).into());
    }
    Ok(())
}
