use std::collections::{HashMap, HashSet};

use crate::topic::cluster::OUTLIER_LABEL;

/// Built-in stop-word lists for the `use_stops` fit option. Deliberately
/// short; they only have to keep function words out of topic keyword lists,
/// not support full-text search.
static STOPWORDS: &[(&str, &[&str])] = &[
    (
        "en",
        &[
            "the", "a", "an", "and", "or", "of", "to", "in", "is", "are", "was", "were", "that",
            "this", "it", "for", "with", "on", "as", "be", "by", "at", "not", "have", "has",
        ],
    ),
    (
        "fr",
        &[
            "le", "la", "les", "un", "une", "des", "de", "du", "et", "ou", "est", "sont", "dans",
            "que", "qui", "pour", "avec", "sur", "pas", "ne", "se", "ce", "il", "elle", "au",
        ],
    ),
    (
        "de",
        &[
            "der", "die", "das", "ein", "eine", "und", "oder", "ist", "sind", "von", "mit",
            "den", "dem", "für", "auf", "in", "an", "zu", "nicht", "sich", "als", "auch", "es",
        ],
    ),
    (
        "es",
        &[
            "el", "la", "los", "las", "un", "una", "de", "del", "y", "o", "es", "son", "en",
            "que", "por", "para", "con", "no", "se", "su", "al", "lo", "como", "más",
        ],
    ),
    (
        "cs",
        &[
            "a", "se", "na", "je", "v", "to", "že", "s", "z", "do", "pro", "za", "po", "by",
            "jsou", "ale", "i", "o", "k", "při",
        ],
    ),
    (
        "ro",
        &[
            "și", "de", "la", "în", "o", "un", "cu", "pe", "este", "sunt", "care", "nu",
            "pentru", "să", "se", "din", "mai", "al", "ale", "lor",
        ],
    ),
];

/// Stop words for the given language hints (two-letter codes). Languages
/// without a built-in list contribute nothing, mirroring the permissive
/// behavior of the original pipeline.
#[must_use]
pub fn stopwords_for(langs: &[String]) -> HashSet<String> {
    let mut out = HashSet::new();
    for lang in langs {
        let code = lang.trim().to_ascii_lowercase();
        if let Some((_, words)) = STOPWORDS.iter().find(|(c, _)| *c == code) {
            out.extend(words.iter().map(|w| (*w).to_string()));
        }
    }
    out
}

/// Class-conditional TF-IDF: per cluster, term weight is the within-class
/// term frequency scaled by ln(1 + A / f_t), where A is the average token
/// count per class and f_t the term's corpus-wide frequency. Weights are
/// max-normalized per topic so a fixed visibility threshold is comparable
/// across corpora. The outlier class is skipped; it has no keywords.
#[must_use]
pub fn class_tfidf(
    doc_tokens: &[Vec<String>],
    labels: &[i32],
    n_topics: usize,
    top_n_words: usize,
    stops: &HashSet<String>,
) -> Vec<Vec<(String, f32)>> {
    let mut class_counts: Vec<HashMap<&str, usize>> = vec![HashMap::new(); n_topics];
    let mut class_tokens = vec![0usize; n_topics];
    let mut corpus_freq: HashMap<&str, usize> = HashMap::new();

    for (tokens, &label) in doc_tokens.iter().zip(labels) {
        if label == OUTLIER_LABEL {
            continue;
        }
        let class = label as usize;
        for tok in tokens {
            if tok.chars().count() < 2 || stops.contains(tok) {
                continue;
            }
            *class_counts[class].entry(tok.as_str()).or_insert(0) += 1;
            *corpus_freq.entry(tok.as_str()).or_insert(0) += 1;
            class_tokens[class] += 1;
        }
    }

    let used_classes = class_tokens.iter().filter(|&&n| n > 0).count().max(1);
    let avg_class_tokens =
        class_tokens.iter().sum::<usize>() as f32 / used_classes as f32;

    (0..n_topics)
        .map(|class| {
            let mut scored: Vec<(String, f32)> = class_counts[class]
                .iter()
                .map(|(term, &count)| {
                    let tf = count as f32 / class_tokens[class].max(1) as f32;
                    let f_t = *corpus_freq.get(term).unwrap_or(&1) as f32;
                    let idf = (1.0 + avg_class_tokens / f_t).ln();
                    ((*term).to_string(), tf * idf)
                })
                .collect();
            scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            scored.truncate(top_n_words);
            if let Some(max) = scored.first().map(|(_, w)| *w).filter(|w| *w > 0.0) {
                for (_, w) in scored.iter_mut() {
                    *w /= max;
                }
            }
            scored
        })
        .collect()
}
