#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal output for the `uk_solicitors` binary.
//!
//! [`PipelineProgress`] renders collection and generation progress, and
//! [`init_logger`] routes `log` records through the same
//! [`MultiProgress`] so log lines print above the bars.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use uk_solicitors_source::progress::ProgressCallback;

pub use indicatif::MultiProgress;

const WAITING_TEMPLATE: &str = "{spinner:.cyan} {msg} [{elapsed}]";
const ORGANIZATIONS_TEMPLATE: &str =
    "  {msg} {wide_bar:.cyan/dim} {human_pos}/{human_len} orgs ({per_sec}, {eta} left)";
const ARTIFACTS_TEMPLATE: &str = "{msg} {wide_bar:.green/dim} {pos}/{len} files";

fn style(template: &str, fallback: fn() -> ProgressStyle) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| fallback())
}

/// Progress display for one pipeline stage.
///
/// The collection stage cannot know the organisation count until the
/// register responds, so it spins first and switches to
/// `counted_style` on [`ProgressCallback::set_total`].
pub struct PipelineProgress {
    bar: ProgressBar,
    counted_style: ProgressStyle,
}

impl PipelineProgress {
    /// Spinner while the register download runs, then a per-organisation
    /// bar during validation.
    #[must_use]
    pub fn collection(multi: &MultiProgress) -> Arc<dyn ProgressCallback> {
        Arc::new(Self::collection_bar(multi))
    }

    fn collection_bar(multi: &MultiProgress) -> Self {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(120));
        bar.set_style(style(WAITING_TEMPLATE, ProgressStyle::default_spinner));
        bar.set_message("Downloading SRA register");

        Self {
            bar,
            counted_style: style(ORGANIZATIONS_TEMPLATE, ProgressStyle::default_bar)
                .progress_chars("=> "),
        }
    }

    /// One tick per generated output file.
    #[must_use]
    pub fn generation(multi: &MultiProgress, artifacts: usize) -> Arc<dyn ProgressCallback> {
        Arc::new(Self::generation_bar(multi, artifacts))
    }

    fn generation_bar(multi: &MultiProgress, artifacts: usize) -> Self {
        let counted_style =
            style(ARTIFACTS_TEMPLATE, ProgressStyle::default_bar).progress_chars("=> ");
        let bar = multi.add(ProgressBar::new(artifacts as u64));
        bar.set_style(counted_style.clone());
        bar.set_message("Writing outputs");

        Self { bar, counted_style }
    }
}

impl ProgressCallback for PipelineProgress {
    fn set_total(&self, total: u64) {
        self.bar.disable_steady_tick();
        self.bar.set_style(self.counted_style.clone());
        self.bar.set_length(total);
        self.bar.reset();
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }
}

/// Installs the `pretty_env_logger` backend behind
/// `indicatif_log_bridge::LogWrapper`.
///
/// `RUST_LOG` wins over `default_filter`. A second call (tests, embedded
/// use) leaves the first logger in place.
#[must_use]
pub fn init_logger(default_filter: &str) -> MultiProgress {
    let multi = MultiProgress::new();

    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default_filter.to_string());
    let logger = pretty_env_logger::formatted_builder()
        .parse_filters(&filter)
        .build();
    let max_level = logger.filter();

    if indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .is_ok()
    {
        log::set_max_level(max_level);
    }

    multi
}
