use std::collections::HashMap;

const MAX_ORDER: usize = 4;

/// Corpus-level BLEU: clipped n-gram precision up to 4-grams with brevity
/// penalty, computed once over statistics accumulated across all segments.
/// Single reference per segment, which is all these test sets carry.
#[derive(Clone, Debug, Default)]
pub struct BleuAccumulator {
    matches: [u64; MAX_ORDER],
    totals: [u64; MAX_ORDER],
    hyp_len: u64,
    ref_len: u64,
}

/// Tokenization for scoring: punctuation and symbols are split off into
/// their own tokens, everything else splits on whitespace. No-space scripts
/// reach this already segmented.
#[must_use]
pub fn score_tokens(text: &str) -> Vec<String> {
    let mut spaced = String::with_capacity(text.len() * 2);
    for ch in text.chars() {
        if ch.is_alphanumeric() || ch == '\'' {
            spaced.push(ch);
        } else if ch.is_whitespace() {
            spaced.push(' ');
        } else {
            spaced.push(' ');
            spaced.push(ch);
            spaced.push(' ');
        }
    }
    spaced.split_whitespace().map(|t| t.to_string()).collect()
}

fn ngram_counts(tokens: &[String], n: usize) -> HashMap<String, u64> {
    let mut out: HashMap<String, u64> = HashMap::new();
    if tokens.len() >= n {
        for win in tokens.windows(n) {
            *out.entry(win.join("\u{1f}")).or_insert(0) += 1;
        }
    }
    out
}

impl BleuAccumulator {
    pub fn push(&mut self, reference: &str, hypothesis: &str) {
        let ref_tokens = score_tokens(reference);
        let hyp_tokens = score_tokens(hypothesis);
        self.ref_len += ref_tokens.len() as u64;
        self.hyp_len += hyp_tokens.len() as u64;
        for n in 1..=MAX_ORDER {
            let ref_counts = ngram_counts(&ref_tokens, n);
            let hyp_counts = ngram_counts(&hyp_tokens, n);
            for (gram, count) in &hyp_counts {
                self.totals[n - 1] += count;
                let clip = ref_counts.get(gram).copied().unwrap_or(0);
                self.matches[n - 1] += (*count).min(clip);
            }
        }
    }

    /// Score in [0, 100]. Any zero n-gram precision collapses the geometric
    /// mean to zero, the classic unsmoothed corpus behavior.
    #[must_use]
    pub fn score(&self) -> f64 {
        if self.hyp_len == 0 || self.totals[0] == 0 {
            return 0.0;
        }
        let mut log_sum = 0.0f64;
        for n in 0..MAX_ORDER {
            if self.totals[n] == 0 || self.matches[n] == 0 {
                return 0.0;
            }
            log_sum += (self.matches[n] as f64 / self.totals[n] as f64).ln();
        }
        let precision = (log_sum / MAX_ORDER as f64).exp();
        let bp = if self.hyp_len >= self.ref_len {
            1.0
        } else {
            (1.0 - self.ref_len as f64 / self.hyp_len as f64).exp()
        };
        100.0 * bp * precision
    }
}
