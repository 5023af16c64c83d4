mod bleu;
mod chrf;
mod comet;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub use bleu::BleuAccumulator;
pub use chrf::ChrfAccumulator;
pub use comet::CometScorer;

use crate::errors::{EvalError, Result};
use crate::langs::langid_matches;

/// The closed set of metrics a task can request. Unknown names are a
/// configuration error, caught before any corpus is loaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Bleu,
    Chrf,
    Comet,
    LangId,
    AvgLen,
}

impl MetricKind {
    pub const ALL: [MetricKind; 5] = [
        MetricKind::Bleu,
        MetricKind::Chrf,
        MetricKind::Comet,
        MetricKind::LangId,
        MetricKind::AvgLen,
    ];

    /// Key under which the metric appears in results files.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            MetricKind::Bleu => "bleu",
            MetricKind::Chrf => "chrf",
            MetricKind::Comet => "comet",
            MetricKind::LangId => "langids",
            MetricKind::AvgLen => "av_len",
        }
    }

    #[must_use]
    pub fn higher_is_better(self) -> bool {
        true
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for MetricKind {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "bleu" => Ok(MetricKind::Bleu),
            "chrf" => Ok(MetricKind::Chrf),
            "comet" => Ok(MetricKind::Comet),
            "langids" | "langid" => Ok(MetricKind::LangId),
            "av_len" => Ok(MetricKind::AvgLen),
            other => Err(EvalError::MetricConfig(format!(
                "unknown metric `{other}`"
            ))),
        }
    }
}

/// Accumulates every enabled metric over one (dataset, pair) run and
/// produces the final keyed score map.
pub struct MetricSet {
    target_code: String,
    bleu: Option<BleuAccumulator>,
    chrf: Option<ChrfAccumulator>,
    comet: Option<CometScorer>,
    langid_hits: Option<u64>,
    len_sum: Option<(u64, u64)>,
}

impl MetricSet {
    /// Validates the requested metric list against what the run can
    /// actually provide. COMET without a scorer command is rejected here
    /// rather than after hours of generation.
    pub fn from_config(
        kinds: &[MetricKind],
        target_code: &str,
        comet_command: Option<&[String]>,
    ) -> Result<Self> {
        let mut set = MetricSet {
            target_code: target_code.to_string(),
            bleu: None,
            chrf: None,
            comet: None,
            langid_hits: None,
            len_sum: None,
        };
        for kind in kinds {
            match kind {
                MetricKind::Bleu => set.bleu = Some(BleuAccumulator::default()),
                MetricKind::Chrf => set.chrf = Some(ChrfAccumulator::default()),
                MetricKind::Comet => {
                    let command = comet_command.ok_or_else(|| {
                        EvalError::MetricConfig(
                            "metric `comet` requested but no comet scorer command configured"
                                .into(),
                        )
                    })?;
                    set.comet = Some(CometScorer::from_command(command)?);
                }
                MetricKind::LangId => set.langid_hits = Some(0),
                MetricKind::AvgLen => set.len_sum = Some((0, 0)),
            }
        }
        Ok(set)
    }

    /// True when the generated text is in the target language, according
    /// to the built-in detector. Always computed so example records can
    /// carry the flag even when the langid metric is disabled.
    pub fn record(&mut self, src: &str, reference: &str, hypothesis: &str) -> bool {
        let langid_ok = langid_matches(hypothesis, &self.target_code);
        if let Some(bleu) = self.bleu.as_mut() {
            bleu.push(reference, hypothesis);
        }
        if let Some(chrf) = self.chrf.as_mut() {
            chrf.push(reference, hypothesis);
        }
        if let Some(comet) = self.comet.as_mut() {
            comet.push(src, reference, hypothesis);
        }
        if let Some(hits) = self.langid_hits.as_mut() {
            if langid_ok {
                *hits += 1;
            }
        }
        if let Some((sum, count)) = self.len_sum.as_mut() {
            *sum += hypothesis.split_whitespace().count() as u64;
            *count += 1;
        }
        langid_ok
    }

    /// Runs any deferred scorers and returns the keyed results.
    pub fn finalize(self) -> Result<BTreeMap<String, f64>> {
        let mut out = BTreeMap::new();
        if let Some(bleu) = self.bleu {
            out.insert(MetricKind::Bleu.key().to_string(), bleu.score());
        }
        if let Some(chrf) = self.chrf {
            out.insert(MetricKind::Chrf.key().to_string(), chrf.score());
        }
        if let Some(comet) = self.comet {
            out.insert(MetricKind::Comet.key().to_string(), comet.score()?);
        }
        if let Some(hits) = self.langid_hits {
            out.insert(MetricKind::LangId.key().to_string(), hits as f64);
        }
        if let Some((sum, count)) = self.len_sum {
            let avg = if count == 0 { 0.0 } else { sum as f64 / count as f64 };
            out.insert(MetricKind::AvgLen.key().to_string(), avg);
        }
        Ok(out)
    }
}
