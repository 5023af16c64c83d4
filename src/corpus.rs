use std::path::{Path, PathBuf};

use crate::errors::{EvalError, Result};

/// One test item: a source sentence and its gold reference.
#[derive(Clone, Debug)]
pub struct DocPair {
    pub src: String,
    pub reference: String,
}

/// Immutable bilingual corpus for one dataset + language pair. Loaded once,
/// owned by the evaluation task for its lifetime.
#[derive(Clone, Debug)]
pub struct ParallelCorpus {
    pub dataset: String,
    pub pair: String,
    pub source_code: String,
    pub target_code: String,
    source: Vec<String>,
    reference: Vec<String>,
}

/// Split "fr-en" into ("fr", "en").
pub fn split_pair(pair: &str) -> Result<(String, String)> {
    let mut it = pair.splitn(2, '-');
    match (it.next(), it.next()) {
        (Some(src), Some(tgt)) if !src.is_empty() && !tgt.is_empty() => {
            Ok((src.to_string(), tgt.to_string()))
        }
        _ => Err(EvalError::UnknownLanguageCode(pair.to_string())),
    }
}

impl ParallelCorpus {
    /// Load `{dir}/{dataset}/{pair}.{src}` and `.{tgt}`, one sentence per
    /// line. Datasets with "wmt" in the name resolve under the fetch cache
    /// directory instead of the pre-staged data directory; both sides must
    /// exist and agree on line count.
    pub fn load(data_dir: &Path, cache_dir: &Path, dataset: &str, pair: &str) -> Result<Self> {
        let (source_code, target_code) = split_pair(pair)?;
        let base = if dataset.contains("wmt") {
            cache_dir
        } else {
            data_dir
        };
        let src_path = corpus_path(base, dataset, pair, &source_code);
        let ref_path = corpus_path(base, dataset, pair, &target_code);

        let source = read_sentences(&src_path)?;
        let reference = read_sentences(&ref_path)?;
        if source.len() != reference.len() {
            return Err(EvalError::CorpusMismatch {
                src_lines: source.len(),
                ref_lines: reference.len(),
            });
        }

        Ok(Self {
            dataset: dataset.to_string(),
            pair: pair.to_string(),
            source_code,
            target_code,
            source,
            reference,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.source.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    #[must_use]
    pub fn source_sentences(&self) -> &[String] {
        &self.source
    }

    #[must_use]
    pub fn reference_sentences(&self) -> &[String] {
        &self.reference
    }

    pub fn docs(&self) -> impl Iterator<Item = DocPair> + '_ {
        self.source
            .iter()
            .zip(self.reference.iter())
            .map(|(src, reference)| DocPair {
                src: src.clone(),
                reference: reference.clone(),
            })
    }
}

fn corpus_path(base: &Path, dataset: &str, pair: &str, code: &str) -> PathBuf {
    base.join(dataset).join(format!("{pair}.{code}"))
}

fn read_sentences(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Err(EvalError::DataNotFound {
            path: path.to_path_buf(),
        });
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| EvalError::io(format!("read corpus: {}", path.display()), e))?;
    Ok(text.lines().map(|l| l.trim_end().to_string()).collect())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{split_pair, ParallelCorpus};
    use crate::errors::EvalError;

    fn temp_data_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "topic-mt-eval-corpus-{tag}-{}",
            std::process::id()
        ));
        std::fs::create_dir_all(dir.join("EMEA")).expect("create data dir");
        dir
    }

    #[test]
    fn splits_language_pairs() {
        let (src, tgt) = split_pair("fr-en").expect("pair");
        assert_eq!(src, "fr");
        assert_eq!(tgt, "en");
        assert!(split_pair("fren").is_err());
    }

    #[test]
    fn loads_parallel_files() {
        let dir = temp_data_dir("load");
        std::fs::write(dir.join("EMEA/fr-en.fr"), "Bonjour.\nMerci.\n").expect("write fr");
        std::fs::write(dir.join("EMEA/fr-en.en"), "Hello.\nThank you.\n").expect("write en");

        let corpus = ParallelCorpus::load(&dir, &dir, "EMEA", "fr-en").expect("load");
        assert_eq!(corpus.len(), 2);
        let docs: Vec<_> = corpus.docs().collect();
        assert_eq!(docs[0].src, "Bonjour.");
        assert_eq!(docs[1].reference, "Thank you.");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn wmt_family_resolves_under_the_cache_dir() {
        let base = std::env::temp_dir().join(format!(
            "topic-mt-eval-corpus-wmt-{}",
            std::process::id()
        ));
        let data = base.join("data");
        let cache = base.join("cache");
        // The staged files live only under the cache directory.
        std::fs::create_dir_all(data.join("wmt14")).expect("data dir");
        std::fs::create_dir_all(cache.join("wmt14")).expect("cache dir");
        std::fs::write(cache.join("wmt14/fr-en.fr"), "Bonjour.\n").expect("write fr");
        std::fs::write(cache.join("wmt14/fr-en.en"), "Hello.\n").expect("write en");

        let corpus = ParallelCorpus::load(&data, &cache, "wmt14", "fr-en").expect("load");
        assert_eq!(corpus.len(), 1);
        assert_eq!(corpus.source_sentences()[0], "Bonjour.");

        // Swapping the directories makes the same load fail: the cache
        // directory really is the one consulted.
        let err = ParallelCorpus::load(&cache, &data, "wmt14", "fr-en").expect_err("empty cache");
        assert!(matches!(err, EvalError::DataNotFound { .. }));

        std::fs::remove_dir_all(&base).ok();
    }

    #[test]
    fn missing_file_is_data_not_found() {
        let dir = temp_data_dir("missing");
        let err = ParallelCorpus::load(&dir, &dir, "EMEA", "de-en").expect_err("missing");
        assert!(matches!(err, EvalError::DataNotFound { .. }));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn mismatched_sides_are_rejected() {
        let dir = temp_data_dir("mismatch");
        std::fs::write(dir.join("EMEA/fr-en.fr"), "Un.\nDeux.\n").expect("write fr");
        std::fs::write(dir.join("EMEA/fr-en.en"), "One.\n").expect("write en");
        let err = ParallelCorpus::load(&dir, &dir, "EMEA", "fr-en").expect_err("mismatch");
        assert!(matches!(err, EvalError::CorpusMismatch { .. }));
        std::fs::remove_dir_all(&dir).ok();
    }
}
