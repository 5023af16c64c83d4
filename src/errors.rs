use std::path::PathBuf;

use thiserror::Error;

/// Failure taxonomy for the evaluation harness.
///
/// Pair-level failures (missing corpus, failed topic fit, absent segmenter)
/// abort the current language pair only; the batch driver logs them and moves
/// on. Construction-time failures (unknown language code, bad metric config)
/// abort the run before anything is scheduled.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("corpus file not found: {path}")]
    DataNotFound { path: PathBuf },

    #[error("corpus sides differ: {src_lines} source vs {ref_lines} reference lines")]
    CorpusMismatch { src_lines: usize, ref_lines: usize },

    #[error("topic model fit failed: {0}")]
    ModelFit(String),

    #[error("requested {requested} few-shot topics but the model produced {available}")]
    InsufficientTopics { requested: usize, available: usize },

    #[error("no representative documents recorded for topic {0}")]
    MissingTopic(i32),

    #[error("no segmenter for target language '{lang}' (rebuild with --features {feature})")]
    SegmenterUnavailable { lang: String, feature: &'static str },

    #[error("unknown language code: {0}")]
    UnknownLanguageCode(String),

    #[error("metric configuration: {0}")]
    MetricConfig(String),

    #[error("generation backend failed: {0}")]
    Generation(String),

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl EvalError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether the batch driver should skip the current language pair and
    /// keep going, rather than abort the whole run.
    #[must_use]
    pub fn skips_pair(&self) -> bool {
        matches!(
            self,
            Self::DataNotFound { .. }
                | Self::CorpusMismatch { .. }
                | Self::ModelFit(_)
                | Self::SegmenterUnavailable { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, EvalError>;
