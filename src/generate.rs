use std::cell::Cell;
use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::{anyhow, Context};

/// One generation request: a prompt in, the continuation out. The stop
/// condition is fixed for this harness — generation ends at the first
/// newline, matching the one-sentence-per-line shape of the corpora.
pub trait TextGenerator {
    fn name(&self) -> &str;
    fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Applies the stop condition: everything up to the first newline.
#[must_use]
pub fn truncate_at_stop(text: &str) -> &str {
    match text.find('\n') {
        Some(idx) => &text[..idx],
        None => text,
    }
    .trim_end()
}

/// Generator backed by an external backend command. The prompt is written to
/// the child's stdin; its stdout is the continuation. The backend owns
/// model choice, sampling, and hardware — this harness only formats prompts
/// and scores outputs.
pub struct CommandGenerator {
    name: String,
    program: String,
    args: Vec<String>,
}

impl CommandGenerator {
    /// `command` is the program followed by its arguments, as listed in the
    /// `[generator]` config section.
    pub fn from_command(command: &[String]) -> anyhow::Result<Self> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| anyhow!("generator command is empty"))?;
        Ok(Self {
            name: program.clone(),
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl TextGenerator for CommandGenerator {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("spawn generator: {}", self.program))?;
        child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("generator stdin unavailable"))?
            .write_all(prompt.as_bytes())
            .context("write prompt to generator")?;
        let output = child
            .wait_with_output()
            .context("wait for generator")?;
        if !output.status.success() {
            return Err(anyhow!(
                "generator {} exited with {}",
                self.program,
                output.status
            ));
        }
        let text = String::from_utf8_lossy(&output.stdout);
        Ok(truncate_at_stop(&text).to_string())
    }
}

/// Test generator that replays a fixed list of responses in order.
pub struct CannedGenerator {
    replies: Vec<String>,
    cursor: Cell<usize>,
}

impl CannedGenerator {
    #[must_use]
    pub fn new(replies: Vec<String>) -> Self {
        Self {
            replies,
            cursor: Cell::new(0),
        }
    }
}

impl TextGenerator for CannedGenerator {
    fn name(&self) -> &str {
        "canned"
    }

    fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
        let i = self.cursor.get();
        let reply = self
            .replies
            .get(i)
            .cloned()
            .unwrap_or_default();
        self.cursor.set(i + 1);
        Ok(truncate_at_stop(&reply).to_string())
    }
}
