use std::io::Write as _;
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};

use crate::errors::{EvalError, Result};

#[derive(Clone, Debug, Serialize)]
struct CometSegment {
    src: String,
    mt: String,
    #[serde(rename = "ref")]
    reference: String,
}

/// Neural quality estimation through an external scorer process. The
/// command receives one JSON array of `{src, mt, ref}` objects on stdin
/// and must print a JSON object containing a `score` field; anything the
/// scorer logs before that object is skipped.
#[derive(Clone, Debug)]
pub struct CometScorer {
    program: String,
    args: Vec<String>,
    segments: Vec<CometSegment>,
}

impl CometScorer {
    pub fn from_command(command: &[String]) -> Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| EvalError::MetricConfig("comet command is empty".into()))?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            segments: Vec::new(),
        })
    }

    pub fn push(&mut self, src: &str, reference: &str, hypothesis: &str) {
        self.segments.push(CometSegment {
            src: src.to_string(),
            mt: hypothesis.to_string(),
            reference: reference.to_string(),
        });
    }

    pub fn score(&self) -> Result<f64> {
        if self.segments.is_empty() {
            return Ok(0.0);
        }
        let payload = serde_json::to_string(&self.segments)
            .map_err(|e| EvalError::MetricConfig(format!("comet payload: {e}")))?;
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| EvalError::io(format!("spawn comet scorer `{}`", self.program), e))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(payload.as_bytes())
                .map_err(|e| EvalError::io("write comet scorer stdin", e))?;
        }
        let output = child
            .wait_with_output()
            .map_err(|e| EvalError::io("wait for comet scorer", e))?;
        if !output.status.success() {
            return Err(EvalError::MetricConfig(format!(
                "comet scorer `{}` exited with {}",
                self.program, output.status
            )));
        }
        let text = String::from_utf8_lossy(&output.stdout);
        parse_score(&text)
    }
}

fn parse_score(text: &str) -> Result<f64> {
    let start = text
        .find('{')
        .ok_or_else(|| EvalError::MetricConfig("comet scorer printed no JSON object".into()))?;
    let mut de = serde_json::Deserializer::from_str(&text[start..]);
    let reply = CometReply::deserialize(&mut de)
        .map_err(|e| EvalError::MetricConfig(format!("comet scorer output: {e}")))?;
    Ok(reply.score)
}

#[derive(Debug, Deserialize)]
struct CometReply {
    score: f64,
}

#[cfg(test)]
mod tests {
    use super::{parse_score, CometScorer};

    #[test]
    fn rejects_empty_command() {
        assert!(CometScorer::from_command(&[]).is_err());
    }

    #[test]
    fn empty_batch_scores_zero() {
        let scorer = CometScorer::from_command(&["true".to_string()]).unwrap();
        assert_eq!(scorer.score().unwrap(), 0.0);
    }

    #[test]
    fn parses_score_after_log_noise() {
        let out = "loading checkpoint...\n{\"score\": 0.8342}\n";
        assert!((parse_score(out).unwrap() - 0.8342).abs() < 1e-9);
    }

    #[test]
    fn missing_object_is_an_error() {
        assert!(parse_score("no json here").is_err());
    }
}
