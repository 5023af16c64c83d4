use std::path::{Path, PathBuf};

use crate::errors::{EvalError, Result};
use crate::metrics::MetricKind;
use crate::report::{metric_file_stem, ReportPlan};

/// Placeholder cell for any score that cannot be recovered: absent results
/// file, unreadable JSON, or a missing key. Reports never fail over a hole
/// in the grid.
const NA: &str = "NA";

/// Newest results artifact for one task + modifier: names are matched on the
/// `task={task}.modifier={modifier}.` prefix and `results.json` suffix, and
/// the lexicographically last match wins, so re-runs shadow older files.
pub(crate) fn find_results_file(
    outputs_dir: &Path,
    task_name: &str,
    modifier: &str,
) -> Option<PathBuf> {
    find_artifact(outputs_dir, task_name, modifier, "results.json")
}

pub(crate) fn find_artifact(
    outputs_dir: &Path,
    task_name: &str,
    modifier: &str,
    suffix: &str,
) -> Option<PathBuf> {
    let prefix = format!("task={task_name}.modifier={modifier}.");
    let entries = std::fs::read_dir(outputs_dir).ok()?;
    let mut matches: Vec<String> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| e.file_name().into_string().ok())
        .filter(|name| name.starts_with(&prefix) && name.ends_with(suffix))
        .collect();
    matches.sort();
    matches.pop().map(|name| outputs_dir.join(name))
}

/// Score cell for one (task, metric), or `None` for anything that should
/// render as NA.
fn metric_cell(outputs_dir: &Path, task_name: &str, modifier: &str, key: &str) -> Option<f64> {
    let path = find_results_file(outputs_dir, task_name, modifier)?;
    let text = std::fs::read_to_string(path).ok()?;
    let data: serde_json::Value = serde_json::from_str(&text).ok()?;
    data.get(task_name)?.get(key)?.as_f64()
}

fn format_cell(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{:.6}", value)
    }
}

fn csv_writer(path: &Path) -> Result<csv::Writer<std::fs::File>> {
    csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .map_err(|e| EvalError::MetricConfig(format!("open {}: {e}", path.display())))
}

fn write_row<W: std::io::Write>(writer: &mut csv::Writer<W>, row: &[String]) -> Result<()> {
    writer
        .write_record(row)
        .map_err(|e| EvalError::MetricConfig(format!("write csv row: {e}")))
}

/// One `alldomains_{modifier}_{metric}_results.csv` per (modifier, metric):
/// language pairs down, domains across, tab-delimited.
pub fn write_alldomains_tables(plan: &ReportPlan) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(&plan.results_dir)
        .map_err(|e| EvalError::io("create results directory", e))?;
    let mut written = Vec::new();
    for modifier in &plan.modifiers {
        for metric in &plan.metrics {
            let path = plan.results_dir.join(format!(
                "alldomains_{modifier}_{}_results.csv",
                metric_file_stem(*metric)
            ));
            let mut writer = csv_writer(&path)?;
            let mut header = vec!["lang-pair".to_string()];
            header.extend(plan.domains.iter().cloned());
            write_row(&mut writer, &header)?;

            for pair in &plan.lang_pairs {
                let mut row = vec![pair.clone()];
                for domain in &plan.domains {
                    let task_name = format!("{domain}-{pair}");
                    let cell =
                        metric_cell(&plan.outputs_dir, &task_name, modifier, metric.key());
                    row.push(cell.map_or_else(|| NA.to_string(), format_cell));
                }
                write_row(&mut writer, &row)?;
            }
            writer
                .flush()
                .map_err(|e| EvalError::io(format!("flush {}", path.display()), e))?;
            written.push(path);
        }
    }
    Ok(written)
}

/// Cross-modifier rollups read back from the alldomains CSVs: one
/// `{pair}_{metric}_results.csv` per language pair plus a
/// `master_{metric}_results.csv` concatenating them, each row prefixed with
/// its modifier. A modifier whose alldomains file is missing contributes an
/// all-NA row.
pub fn write_master_tables(plan: &ReportPlan) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(&plan.results_dir)
        .map_err(|e| EvalError::io("create results directory", e))?;
    let mut written = Vec::new();
    for metric in &plan.metrics {
        let stem = metric_file_stem(*metric);
        let master_path = plan.results_dir.join(format!("master_{stem}_results.csv"));
        let mut master = csv_writer(&master_path)?;
        let mut header = vec!["modifier".to_string(), "lang-pair".to_string()];
        header.extend(plan.domains.iter().cloned());
        write_row(&mut master, &header)?;

        for pair in &plan.lang_pairs {
            let pair_path = plan.results_dir.join(format!("{pair}_{stem}_results.csv"));
            let mut pair_out = csv_writer(&pair_path)?;
            write_row(&mut pair_out, &header)?;

            for modifier in &plan.modifiers {
                let alldomains = plan
                    .results_dir
                    .join(format!("alldomains_{modifier}_{stem}_results.csv"));
                let row = match read_pair_row(&alldomains, pair) {
                    Some(cells) => {
                        let mut row = vec![modifier.clone()];
                        row.extend(cells);
                        row
                    }
                    None => {
                        let mut row = vec![modifier.clone(), pair.clone()];
                        row.extend(std::iter::repeat(NA.to_string()).take(plan.domains.len()));
                        row
                    }
                };
                write_row(&mut pair_out, &row)?;
                write_row(&mut master, &row)?;
            }
            pair_out
                .flush()
                .map_err(|e| EvalError::io(format!("flush {}", pair_path.display()), e))?;
            written.push(pair_path);
        }
        master
            .flush()
            .map_err(|e| EvalError::io(format!("flush {}", master_path.display()), e))?;
        written.push(master_path);
    }
    Ok(written)
}

/// The row for `pair` from an alldomains CSV, header included in the cells
/// (first cell is the pair itself). `None` when the file or row is absent.
fn read_pair_row(path: &Path, pair: &str) -> Option<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_path(path)
        .ok()?;
    for record in reader.records() {
        let record = record.ok()?;
        if record.get(0) == Some(pair) {
            return Some(record.iter().map(|s| s.to_string()).collect());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{find_results_file, write_alldomains_tables, write_master_tables};
    use crate::metrics::MetricKind;
    use crate::report::ReportPlan;

    fn temp_report_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "topic-mt-eval-report-{tag}-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(dir.join("outputs")).expect("outputs dir");
        std::fs::create_dir_all(dir.join("results")).expect("results dir");
        dir
    }

    fn plan(dir: &PathBuf) -> ReportPlan {
        ReportPlan {
            modifiers: vec!["topic1shot".to_string()],
            lang_pairs: vec!["fr-en".to_string(), "en-de".to_string()],
            domains: vec!["EMEA".to_string(), "Tanzil".to_string()],
            metrics: vec![MetricKind::Bleu],
            outputs_dir: dir.join("outputs"),
            results_dir: dir.join("results"),
        }
    }

    fn stage_results(dir: &PathBuf, name: &str, body: &str) {
        std::fs::write(dir.join("outputs").join(name), body).expect("stage results");
    }

    #[test]
    fn newest_matching_results_file_wins() {
        let dir = temp_report_dir("newest");
        stage_results(
            &dir,
            "task=EMEA-fr-en.modifier=topic1shot.2024-01.results.json",
            "{}",
        );
        stage_results(
            &dir,
            "task=EMEA-fr-en.modifier=topic1shot.2024-02.results.json",
            "{}",
        );
        let found = find_results_file(&dir.join("outputs"), "EMEA-fr-en", "topic1shot")
            .expect("found");
        assert!(found
            .file_name()
            .unwrap()
            .to_string_lossy()
            .contains("2024-02"));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_and_malformed_artifacts_render_as_na() {
        let dir = temp_report_dir("na");
        // EMEA-fr-en has a real score; Tanzil-fr-en is malformed JSON;
        // EMEA-en-de lacks the bleu key; Tanzil-en-de is simply absent.
        stage_results(
            &dir,
            "task=EMEA-fr-en.modifier=topic1shot.results.json",
            r#"{"EMEA-fr-en": {"bleu": 31.5}}"#,
        );
        stage_results(
            &dir,
            "task=Tanzil-fr-en.modifier=topic1shot.results.json",
            "{not json",
        );
        // en-de exists but carries no bleu key.
        stage_results(
            &dir,
            "task=EMEA-en-de.modifier=topic1shot.results.json",
            r#"{"EMEA-en-de": {"comet": 0.7}}"#,
        );
        let plan = plan(&dir);
        write_alldomains_tables(&plan).expect("tables");

        let text = std::fs::read_to_string(
            dir.join("results/alldomains_topic1shot_bleu_results.csv"),
        )
        .expect("csv");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "lang-pair\tEMEA\tTanzil");
        assert_eq!(lines[1], "fr-en\t31.500000\tNA");
        assert_eq!(lines[2], "en-de\tNA\tNA");
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn master_tables_roll_up_per_pair_rows() {
        let dir = temp_report_dir("master");
        stage_results(
            &dir,
            "task=EMEA-fr-en.modifier=topic1shot.results.json",
            r#"{"EMEA-fr-en": {"bleu": 20.0}}"#,
        );
        let plan = plan(&dir);
        write_alldomains_tables(&plan).expect("alldomains");
        write_master_tables(&plan).expect("master");

        let master = std::fs::read_to_string(dir.join("results/master_bleu_results.csv"))
            .expect("master csv");
        let lines: Vec<&str> = master.lines().collect();
        assert_eq!(lines[0], "modifier\tlang-pair\tEMEA\tTanzil");
        assert_eq!(lines[1], "topic1shot\tfr-en\t20\tNA");
        assert_eq!(lines[2], "topic1shot\ten-de\tNA\tNA");

        let per_pair = std::fs::read_to_string(dir.join("results/fr-en_bleu_results.csv"))
            .expect("pair csv");
        assert!(per_pair.lines().any(|l| l == "topic1shot\tfr-en\t20\tNA"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
