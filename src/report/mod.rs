mod langid;
mod tables;

use std::path::PathBuf;

pub use langid::rescan_langids;
pub use tables::{write_alldomains_tables, write_master_tables};

use crate::metrics::MetricKind;

/// Metric name as it appears in report file names, which predate the
/// results-file keys and differ for two of them.
#[must_use]
pub fn metric_file_stem(kind: MetricKind) -> &'static str {
    match kind {
        MetricKind::Bleu => "bleu",
        MetricKind::Chrf => "chrf",
        MetricKind::Comet => "comet",
        MetricKind::LangId => "langid",
        MetricKind::AvgLen => "length",
    }
}

/// What the report generator walks: every (modifier, pair, domain)
/// combination, artifacts read from `outputs_dir`, CSVs written to
/// `results_dir`.
#[derive(Clone, Debug)]
pub struct ReportPlan {
    pub modifiers: Vec<String>,
    pub lang_pairs: Vec<String>,
    pub domains: Vec<String>,
    pub metrics: Vec<MetricKind>,
    pub outputs_dir: PathBuf,
    pub results_dir: PathBuf,
}
