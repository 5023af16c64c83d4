use serde::{Deserialize, Serialize};

use crate::corpus::split_pair;
use crate::errors::{EvalError, Result};
use crate::langs::langid_matches;
use crate::metrics::MetricKind;
use crate::progress::ConsoleProgress;
use crate::report::tables::find_artifact;
use crate::report::ReportPlan;
use crate::task::write_json;

#[derive(Debug, Deserialize, Serialize)]
struct StoredExample {
    gen: String,
    gold: String,
    langid_ok: bool,
}

/// Re-run language identification over existing example artifacts and fold
/// the corrected counts back into their results files. Useful after the
/// detector improves; running it twice is a no-op.
pub fn rescan_langids(plan: &ReportPlan, progress: &ConsoleProgress) -> Result<usize> {
    let mut updated = 0;
    for modifier in &plan.modifiers {
        for pair in &plan.lang_pairs {
            let (_, target_code) = split_pair(pair)?;
            for domain in &plan.domains {
                let task_name = format!("{domain}-{pair}");
                if rescan_one(plan, &task_name, modifier, &target_code)? {
                    progress.info(format!("langid rescan: {task_name} ({modifier})"));
                    updated += 1;
                }
            }
        }
    }
    Ok(updated)
}

/// True when artifacts for this task existed and were rewritten. Absent or
/// unreadable artifacts are holes in the grid, not failures.
fn rescan_one(
    plan: &ReportPlan,
    task_name: &str,
    modifier: &str,
    target_code: &str,
) -> Result<bool> {
    let Some(examples_path) =
        find_artifact(&plan.outputs_dir, task_name, modifier, "examples.json")
    else {
        return Ok(false);
    };
    let Ok(text) = std::fs::read_to_string(&examples_path) else {
        return Ok(false);
    };
    let Ok(mut examples) = serde_json::from_str::<Vec<StoredExample>>(&text) else {
        return Ok(false);
    };

    let mut hits: u64 = 0;
    for example in &mut examples {
        example.langid_ok = langid_matches(&example.gen, target_code);
        if example.langid_ok {
            hits += 1;
        }
    }
    write_json(&examples_path, &examples)?;

    let Some(results_path) =
        find_artifact(&plan.outputs_dir, task_name, modifier, "results.json")
    else {
        return Ok(true);
    };
    let text = std::fs::read_to_string(&results_path)
        .map_err(|e| EvalError::io(format!("read {}", results_path.display()), e))?;
    let Ok(mut data) = serde_json::from_str::<serde_json::Value>(&text) else {
        return Ok(true);
    };
    if let Some(scores) = data.get_mut(task_name).and_then(|v| v.as_object_mut()) {
        scores.insert(
            MetricKind::LangId.key().to_string(),
            serde_json::Value::from(hits),
        );
        write_json(&results_path, &data)?;
    }
    Ok(true)
}
