use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::Deserialize;

use crate::metrics::MetricKind;
use crate::prompt::PromptOptions;
use crate::report::ReportPlan;
use crate::task::{RunPlan, TaskOptions};
use crate::topic::FitOptions;

pub const CONFIG_FILENAME: &str = "topic-mt-eval.toml";
pub const CONFIG_ENV_VAR: &str = "TOPIC_MT_EVAL_CONFIG";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub eval: EvalSection,
    #[serde(default)]
    pub topics: TopicsSection,
    #[serde(default)]
    pub prompt: PromptSection,
    #[serde(default)]
    pub metrics: MetricsSection,
    #[serde(default)]
    pub generator: GeneratorSection,
    #[serde(default)]
    pub report: ReportSection,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct EvalSection {
    /// Pre-staged corpora root: `{data_dir}/{dataset}/{pair}.{lang}`.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// Fetch cache for recognized benchmark families (wmt*).
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    /// Where results/examples JSON artifacts land.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Where report CSVs land.
    #[serde(default)]
    pub results_dir: Option<PathBuf>,
    #[serde(default)]
    pub datasets: Vec<String>,
    #[serde(default)]
    pub lang_pairs: Vec<String>,
    /// Run variant tag, baked into artifact file names.
    #[serde(default)]
    pub modifier: Option<String>,
    /// Optional dev-only limiter: evaluate at most N documents per pair.
    #[serde(default)]
    pub max_docs: Option<usize>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct TopicsSection {
    #[serde(default)]
    pub target_topic_count: Option<usize>,
    #[serde(default)]
    pub n_representative: Option<usize>,
    #[serde(default)]
    pub fit_sample: Option<usize>,
    #[serde(default)]
    pub use_stops: Option<bool>,
    /// Fit on paired source+reference lines instead of the two sides
    /// concatenated.
    #[serde(default)]
    pub parallel: Option<bool>,
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PromptSection {
    #[serde(default)]
    pub num_fewshot: Option<usize>,
    #[serde(default)]
    pub include_keywords: Option<bool>,
    #[serde(default)]
    pub include_examples: Option<bool>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct MetricsSection {
    #[serde(default)]
    pub enabled: Vec<String>,
    /// External scorer command, program first. Required when "comet" is
    /// enabled.
    #[serde(default)]
    pub comet_command: Vec<String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct GeneratorSection {
    /// Backend command, program first. The prompt arrives on its stdin.
    #[serde(default)]
    pub command: Vec<String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ReportSection {
    #[serde(default)]
    pub modifiers: Vec<String>,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default)]
    pub lang_pairs: Vec<String>,
    #[serde(default)]
    pub metrics: Vec<String>,
}

pub fn find_file_upwards(start: &Path, filename: &str, max_depth: usize) -> Option<PathBuf> {
    let mut dir = Some(start.to_path_buf());
    for _ in 0..=max_depth {
        let d = dir?;
        let cand = d.join(filename);
        if cand.is_file() {
            return Some(cand);
        }
        dir = d.parent().map(|p| p.to_path_buf());
    }
    None
}

/// Locate the config file: the env override first, then an upward search
/// from the working directory and the executable's directory.
pub fn find_default_config() -> Option<PathBuf> {
    if let Ok(p) = std::env::var(CONFIG_ENV_VAR) {
        let p = PathBuf::from(p);
        if p.is_file() {
            return Some(p);
        }
    }
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, CONFIG_FILENAME, 8) {
            return Some(p);
        }
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            if let Some(p) = find_file_upwards(dir, CONFIG_FILENAME, 10) {
                return Some(p);
            }
        }
    }
    None
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: AppConfig = toml::from_str(&text).context("parse config toml")?;
    Ok(cfg)
}

const DEFAULT_CONFIG_TOML: &str = r#"# topic-mt-eval configuration

[eval]
# data_dir = "data"
# cache_dir = "cache"
output_dir = "outputs"
results_dir = "results"
datasets = ["EMEA"]
lang_pairs = ["fr-en"]
modifier = "base"
# max_docs = 200

[topics]
target_topic_count = 100
n_representative = 10
fit_sample = 1000
use_stops = false
parallel = true
seed = 42

[prompt]
num_fewshot = 0
include_keywords = false
include_examples = false

[metrics]
enabled = ["bleu", "chrf", "langids", "av_len"]
# comet_command = ["comet-serve", "--model", "wmt22-comet-da"]

[generator]
# command = ["my-backend", "--greedy"]

[report]
modifiers = ["base"]
domains = ["EMEA"]
lang_pairs = ["fr-en"]
metrics = ["bleu", "langids", "av_len"]
"#;

/// Write a commented starter config. Refuses to clobber an existing file
/// unless `force` is set.
pub fn init_default_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        return Err(anyhow!("config already exists: {}", path.display()));
    }
    std::fs::write(path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("write config: {}", path.display()))?;
    Ok(())
}

fn parse_metrics(names: &[String]) -> anyhow::Result<Vec<MetricKind>> {
    names
        .iter()
        .map(|n| n.parse::<MetricKind>().map_err(|e| anyhow!("{e}")))
        .collect()
}

impl AppConfig {
    pub fn task_options(&self) -> anyhow::Result<TaskOptions> {
        let defaults = FitOptions::default();
        Ok(TaskOptions {
            prompt: PromptOptions {
                num_fewshot: self.prompt.num_fewshot.unwrap_or(0),
                include_keywords: self.prompt.include_keywords.unwrap_or(false),
                include_examples: self.prompt.include_examples.unwrap_or(false),
            },
            metrics: parse_metrics(&self.metrics.enabled)?,
            comet_command: if self.metrics.comet_command.is_empty() {
                None
            } else {
                Some(self.metrics.comet_command.clone())
            },
            max_docs: self.eval.max_docs,
            fit: FitOptions {
                target_topic_count: self
                    .topics
                    .target_topic_count
                    .unwrap_or(defaults.target_topic_count),
                n_representative: self
                    .topics
                    .n_representative
                    .unwrap_or(defaults.n_representative),
                fit_sample: self.topics.fit_sample.unwrap_or(defaults.fit_sample),
                languages: Vec::new(),
                use_stops: self.topics.use_stops.unwrap_or(defaults.use_stops),
                parallel: self.topics.parallel.unwrap_or(defaults.parallel),
                seed: self.topics.seed.unwrap_or(defaults.seed),
            },
        })
    }

    pub fn run_plan(&self) -> anyhow::Result<RunPlan> {
        if self.eval.datasets.is_empty() {
            return Err(anyhow!("[eval] datasets is empty"));
        }
        if self.eval.lang_pairs.is_empty() {
            return Err(anyhow!("[eval] lang_pairs is empty"));
        }
        let data_dir = self
            .eval
            .data_dir
            .clone()
            .ok_or_else(|| anyhow!("[eval] data_dir is not set"))?;
        let cache_dir = self.eval.cache_dir.clone().unwrap_or_else(|| data_dir.clone());
        Ok(RunPlan {
            datasets: self.eval.datasets.clone(),
            lang_pairs: self.eval.lang_pairs.clone(),
            modifier: self
                .eval
                .modifier
                .clone()
                .unwrap_or_else(|| "base".to_string()),
            data_dir,
            cache_dir,
            output_dir: self
                .eval
                .output_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from("outputs")),
        })
    }

    /// Report grids fall back to the evaluation lists when the `[report]`
    /// section leaves them out, so a one-run config reports on itself.
    pub fn report_plan(&self) -> anyhow::Result<ReportPlan> {
        let modifiers = if self.report.modifiers.is_empty() {
            vec![self
                .eval
                .modifier
                .clone()
                .unwrap_or_else(|| "base".to_string())]
        } else {
            self.report.modifiers.clone()
        };
        let domains = if self.report.domains.is_empty() {
            self.eval.datasets.clone()
        } else {
            self.report.domains.clone()
        };
        let lang_pairs = if self.report.lang_pairs.is_empty() {
            self.eval.lang_pairs.clone()
        } else {
            self.report.lang_pairs.clone()
        };
        let metrics = if self.report.metrics.is_empty() {
            parse_metrics(&self.metrics.enabled)?
        } else {
            parse_metrics(&self.report.metrics)?
        };
        if domains.is_empty() || lang_pairs.is_empty() || metrics.is_empty() {
            return Err(anyhow!("[report] needs domains, lang_pairs and metrics"));
        }
        Ok(ReportPlan {
            modifiers,
            lang_pairs,
            domains,
            metrics,
            outputs_dir: self
                .eval
                .output_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from("outputs")),
            results_dir: self
                .eval
                .results_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from("results")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{init_default_config, AppConfig, DEFAULT_CONFIG_TOML};
    use crate::metrics::MetricKind;

    #[test]
    fn default_config_template_parses() {
        let cfg: AppConfig = toml::from_str(DEFAULT_CONFIG_TOML).expect("template");
        let opts = cfg.task_options().expect("task options");
        assert_eq!(opts.prompt.num_fewshot, 0);
        assert!(opts.metrics.contains(&MetricKind::Bleu));
        let plan = cfg.report_plan().expect("report plan");
        assert_eq!(plan.modifiers, vec!["base".to_string()]);
    }

    #[test]
    fn empty_sections_take_defaults() {
        let cfg: AppConfig = toml::from_str("").expect("empty");
        let opts = cfg.task_options().expect("task options");
        assert!(opts.metrics.is_empty());
        assert_eq!(opts.fit.target_topic_count, 100);
        assert!(cfg.run_plan().is_err());
    }

    #[test]
    fn unknown_metric_names_are_rejected() {
        let cfg: AppConfig = toml::from_str(
            "[metrics]\nenabled = [\"bleu\", \"perplexity\"]\n",
        )
        .expect("parse");
        assert!(cfg.task_options().is_err());
    }

    #[test]
    fn report_falls_back_to_eval_lists() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [eval]
            datasets = ["EMEA", "Tanzil"]
            lang_pairs = ["fr-en"]
            modifier = "topic1shot"
            [metrics]
            enabled = ["bleu"]
            "#,
        )
        .expect("parse");
        let plan = cfg.report_plan().expect("plan");
        assert_eq!(plan.domains, vec!["EMEA".to_string(), "Tanzil".to_string()]);
        assert_eq!(plan.modifiers, vec!["topic1shot".to_string()]);
        assert_eq!(plan.metrics, vec![MetricKind::Bleu]);
    }

    #[test]
    fn init_refuses_to_clobber() {
        let path = std::env::temp_dir().join(format!(
            "topic-mt-eval-config-{}.toml",
            std::process::id()
        ));
        std::fs::remove_file(&path).ok();
        init_default_config(&path, false).expect("first write");
        assert!(init_default_config(&path, false).is_err());
        init_default_config(&path, true).expect("forced overwrite");
        std::fs::remove_file(&path).ok();
    }
}
