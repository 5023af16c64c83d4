use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use topic_mt_eval::config::{
    find_default_config, init_default_config, load_config, CONFIG_ENV_VAR, CONFIG_FILENAME,
};
use topic_mt_eval::generate::CommandGenerator;
use topic_mt_eval::progress::ConsoleProgress;
use topic_mt_eval::report::{rescan_langids, write_alldomains_tables, write_master_tables};
use topic_mt_eval::segment::SegmenterRegistry;
use topic_mt_eval::task::EvalRunner;

#[derive(Parser, Debug)]
#[command(name = "topic-mt-eval")]
#[command(about = "Topic-conditioned machine translation evaluation harness", long_about = None)]
struct Args {
    /// Generate a default config file, then exit
    #[arg(long)]
    init_config: bool,

    /// Directory to write the config file (default: current directory)
    #[arg(long, value_name = "DIR")]
    init_config_dir: Option<PathBuf>,

    /// Overwrite an existing config file when used with --init-config
    #[arg(long)]
    force: bool,

    /// Config file path (default: search for topic-mt-eval.toml upwards)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run variant tag baked into artifact names (overrides config)
    #[arg(long)]
    modifier: Option<String>,

    /// Datasets to evaluate, comma-separated (overrides config)
    #[arg(long, value_delimiter = ',')]
    datasets: Vec<String>,

    /// Language pairs like fr-en, comma-separated (overrides config)
    #[arg(long, value_delimiter = ',')]
    lang_pairs: Vec<String>,

    /// Few-shot topic count for prompt annotations (overrides config)
    #[arg(long)]
    num_fewshot: Option<usize>,

    /// Evaluate at most N documents per pair (dev-only)
    #[arg(long)]
    max_docs: Option<usize>,

    /// Write the per-modifier and rollup CSV tables, then exit (no generation)
    #[arg(long)]
    report: bool,

    /// Re-run language identification over stored examples, then exit
    #[arg(long)]
    rescan_langid: bool,

    /// Suppress progress output on stderr
    #[arg(long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let progress = ConsoleProgress::new(!args.quiet);

    if args.init_config {
        let dir = args
            .init_config_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let path = dir.join(CONFIG_FILENAME);
        init_default_config(&path, args.force).context("init default config")?;
        eprintln!("Wrote config: {}", path.display());
        return Ok(());
    }

    let config_path = match args.config.clone().or_else(find_default_config) {
        Some(p) => p,
        None => {
            return Err(anyhow::anyhow!(
                "no config found: pass --config, set {CONFIG_ENV_VAR}, or run --init-config \
                 to create {CONFIG_FILENAME}"
            ));
        }
    };
    let mut cfg = load_config(&config_path)?;
    progress.info(format!("config: {}", config_path.display()));

    if let Some(modifier) = args.modifier {
        cfg.eval.modifier = Some(modifier);
    }
    if !args.datasets.is_empty() {
        cfg.eval.datasets = args.datasets.clone();
    }
    if !args.lang_pairs.is_empty() {
        cfg.eval.lang_pairs = args.lang_pairs.clone();
    }
    if let Some(n) = args.num_fewshot {
        cfg.prompt.num_fewshot = Some(n);
    }
    if let Some(n) = args.max_docs {
        cfg.eval.max_docs = Some(n);
    }

    if args.report {
        let plan = cfg.report_plan()?;
        let tables = write_alldomains_tables(&plan)?;
        let rollups = write_master_tables(&plan)?;
        progress.info(format!(
            "wrote {} tables to {}",
            tables.len() + rollups.len(),
            plan.results_dir.display()
        ));
        return Ok(());
    }

    if args.rescan_langid {
        let plan = cfg.report_plan()?;
        let updated = rescan_langids(&plan, &progress)?;
        progress.info(format!("rescanned {updated} artifact sets"));
        return Ok(());
    }

    let plan = cfg.run_plan()?;
    let opts = cfg.task_options()?;
    if cfg.generator.command.is_empty() {
        return Err(anyhow::anyhow!(
            "[generator] command is not set in {}",
            config_path.display()
        ));
    }
    let generator = CommandGenerator::from_command(&cfg.generator.command)?;
    let segmenters = SegmenterRegistry::detect();

    let runner = EvalRunner::new(plan, opts, &generator, &segmenters, &progress);
    let completed = runner.run()?;
    progress.info(format!("completed {} task(s)", completed.len()));
    Ok(())
}
