use std::collections::HashMap;

const CHAR_ORDER: usize = 6;
const BETA: f64 = 2.0;

/// Corpus-level chrF: character n-gram F-score (n up to 6, recall-weighted
/// with beta 2), computed from statistics summed over the whole corpus.
/// Whitespace is stripped before n-gram extraction, so tokenization choices
/// do not leak into the score.
#[derive(Clone, Debug, Default)]
pub struct ChrfAccumulator {
    matches: [u64; CHAR_ORDER],
    hyp_totals: [u64; CHAR_ORDER],
    ref_totals: [u64; CHAR_ORDER],
}

fn char_ngrams(text: &str, n: usize) -> HashMap<String, u64> {
    let chars: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
    let mut out: HashMap<String, u64> = HashMap::new();
    if chars.len() >= n {
        for win in chars.windows(n) {
            *out.entry(win.iter().collect()).or_insert(0) += 1;
        }
    }
    out
}

impl ChrfAccumulator {
    pub fn push(&mut self, reference: &str, hypothesis: &str) {
        for n in 1..=CHAR_ORDER {
            let ref_counts = char_ngrams(reference, n);
            let hyp_counts = char_ngrams(hypothesis, n);
            self.ref_totals[n - 1] += ref_counts.values().sum::<u64>();
            self.hyp_totals[n - 1] += hyp_counts.values().sum::<u64>();
            for (gram, count) in &hyp_counts {
                let clip = ref_counts.get(gram).copied().unwrap_or(0);
                self.matches[n - 1] += (*count).min(clip);
            }
        }
    }

    /// Score in [0, 100]: precision and recall macro-averaged over n-gram
    /// orders that occur, combined with F-beta.
    #[must_use]
    pub fn score(&self) -> f64 {
        let mut precision_sum = 0.0f64;
        let mut recall_sum = 0.0f64;
        let mut orders = 0usize;
        for n in 0..CHAR_ORDER {
            if self.hyp_totals[n] == 0 && self.ref_totals[n] == 0 {
                continue;
            }
            orders += 1;
            if self.hyp_totals[n] > 0 {
                precision_sum += self.matches[n] as f64 / self.hyp_totals[n] as f64;
            }
            if self.ref_totals[n] > 0 {
                recall_sum += self.matches[n] as f64 / self.ref_totals[n] as f64;
            }
        }
        if orders == 0 {
            return 0.0;
        }
        let precision = precision_sum / orders as f64;
        let recall = recall_sum / orders as f64;
        if precision <= 0.0 && recall <= 0.0 {
            return 0.0;
        }
        let beta_sq = BETA * BETA;
        100.0 * (1.0 + beta_sq) * precision * recall / (beta_sq * precision + recall)
    }
}

#[cfg(test)]
mod tests {
    use super::ChrfAccumulator;

    #[test]
    fn identical_corpus_scores_one_hundred() {
        let mut acc = ChrfAccumulator::default();
        acc.push("the cat sat on the mat", "the cat sat on the mat");
        assert!((acc.score() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn disjoint_strings_score_zero() {
        let mut acc = ChrfAccumulator::default();
        acc.push("aaaaaa", "zzzzzz");
        assert_eq!(acc.score(), 0.0);
    }

    #[test]
    fn near_match_scores_high_but_not_perfect() {
        let mut acc = ChrfAccumulator::default();
        acc.push("the cat sat on the mat", "the cat sat on a mat");
        let s = acc.score();
        assert!(s > 50.0 && s < 100.0, "score was {s}");
    }

    #[test]
    fn whitespace_differences_do_not_matter() {
        let mut a = ChrfAccumulator::default();
        a.push("我 爱 你", "我 爱 你");
        let mut b = ChrfAccumulator::default();
        b.push("我爱你", "我爱你");
        assert!((a.score() - b.score()).abs() < 1e-9);
    }
}
