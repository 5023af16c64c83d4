use std::io::{self, Write};
use std::time::Instant;

/// Elapsed-stamped stderr logging for batch runs. One instance per process;
/// timestamps are relative to construction so a multi-pair run reads as a
/// single timeline.
pub struct ConsoleProgress {
    enabled: bool,
    t0: Instant,
}

impl ConsoleProgress {
    #[must_use]
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            t0: Instant::now(),
        }
    }

    pub fn info(&self, msg: impl AsRef<str>) {
        self.emit("", msg.as_ref());
    }

    pub fn warn(&self, msg: impl AsRef<str>) {
        self.emit("WARN ", msg.as_ref());
    }

    /// Section header for a new dataset/pair.
    pub fn stage(&self, label: impl AsRef<str>) {
        self.emit("", &format!("=== {}", label.as_ref()));
    }

    pub fn progress(&self, label: &str, current: usize, total: usize) {
        let total = total.max(1);
        let current = current.min(total);
        let pct = (current as f64 / total as f64) * 100.0;
        self.emit("", &format!("{label} {current}/{total} ({pct:5.1}%)"));
    }

    fn emit(&self, level: &str, msg: &str) {
        if !self.enabled {
            return;
        }
        let ts = fmt_elapsed(self.t0.elapsed().as_secs_f64());
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "[{ts}] {level}{msg}");
    }
}

fn fmt_elapsed(seconds: f64) -> String {
    let seconds = seconds.max(0.0) as u64;
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    if h > 0 {
        format!("{h:02}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}
