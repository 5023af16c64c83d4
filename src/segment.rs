use std::collections::HashMap;

use crate::errors::{EvalError, Result};

/// Target languages written without inter-word spaces. Their references and
/// hypotheses must be re-tokenized into space-delimited form before any
/// n-gram metric sees them.
pub const NO_SPACE_LANGS: [&str; 2] = ["zh", "ja"];

/// Cargo feature that provides the segmenter for a no-space language.
fn feature_for(lang: &str) -> &'static str {
    match lang {
        "zh" => "zh",
        _ => "ja",
    }
}

enum Engine {
    #[cfg(feature = "zh")]
    Jieba(jieba_rs::Jieba),
    #[cfg(feature = "ja")]
    Lindera(lindera::tokenizer::Tokenizer),
}

/// Capability registry for word segmenters, resolved once at startup from
/// what was compiled in. A language pair whose target needs a segmenter that
/// is not here is rejected before scheduling, never mid-batch.
pub struct SegmenterRegistry {
    engines: HashMap<&'static str, Engine>,
}

impl SegmenterRegistry {
    /// Probe compiled-in segmenters. Engines that fail to initialize (e.g. a
    /// dictionary problem) are simply absent, which surfaces later as the
    /// same `SegmenterUnavailable` as a missing feature.
    #[must_use]
    pub fn detect() -> Self {
        #[allow(unused_mut)]
        let mut engines: HashMap<&'static str, Engine> = HashMap::new();
        #[cfg(feature = "zh")]
        {
            engines.insert("zh", Engine::Jieba(jieba_rs::Jieba::new()));
        }
        #[cfg(feature = "ja")]
        {
            if let Some(tok) = build_lindera() {
                engines.insert("ja", Engine::Lindera(tok));
            }
        }
        Self { engines }
    }

    /// Whether scoring for this target language requires segmentation at all.
    #[must_use]
    pub fn requires_segmentation(target_code: &str) -> bool {
        NO_SPACE_LANGS.contains(&target_code)
    }

    #[must_use]
    pub fn available(&self, target_code: &str) -> bool {
        self.engines.contains_key(target_code)
    }

    /// Up-front check used by the batch driver before a pair is scheduled.
    pub fn check(&self, target_code: &str) -> Result<()> {
        if !Self::requires_segmentation(target_code) || self.available(target_code) {
            return Ok(());
        }
        Err(EvalError::SegmenterUnavailable {
            lang: target_code.to_string(),
            feature: feature_for(target_code),
        })
    }

    /// Re-tokenize `text` into space-delimited tokens. Existing whitespace is
    /// treated as a hard boundary and each chunk segmented independently, so
    /// already-segmented text is a fixed point.
    pub fn segment(&self, target_code: &str, text: &str) -> Result<String> {
        let engine = self
            .engines
            .get(target_code)
            .ok_or_else(|| EvalError::SegmenterUnavailable {
                lang: target_code.to_string(),
                feature: feature_for(target_code),
            })?;
        let mut tokens: Vec<String> = Vec::new();
        for chunk in text.split_whitespace() {
            segment_chunk(engine, chunk, &mut tokens);
        }
        Ok(tokens.join(" "))
    }
}

#[allow(unused_variables)]
fn segment_chunk(engine: &Engine, chunk: &str, out: &mut Vec<String>) {
    match engine {
        #[cfg(feature = "zh")]
        // HMM off: dictionary-only segmentation is deterministic and maps
        // every token back onto itself when re-segmented.
        Engine::Jieba(jieba) => {
            for tok in jieba.cut(chunk, false) {
                let tok = tok.trim();
                if !tok.is_empty() {
                    out.push(tok.to_string());
                }
            }
        }
        #[cfg(feature = "ja")]
        Engine::Lindera(tokenizer) => match tokenizer.tokenize(chunk) {
            Ok(parsed) => {
                for tok in parsed {
                    let text = tok.text.trim();
                    if !text.is_empty() {
                        out.push(text.to_string());
                    }
                }
            }
            Err(_) => out.push(chunk.to_string()),
        },
        #[allow(unreachable_patterns)]
        _ => out.push(chunk.to_string()),
    }
}

#[cfg(feature = "ja")]
fn build_lindera() -> Option<lindera::tokenizer::Tokenizer> {
    use lindera::tokenizer::{Tokenizer, TokenizerConfig};
    use lindera::{DictionaryConfig, DictionaryKind, Mode};

    let config = TokenizerConfig {
        dictionary: DictionaryConfig {
            kind: Some(DictionaryKind::IPADIC),
            path: None,
        },
        user_dictionary: None,
        mode: Mode::Normal,
    };
    Tokenizer::from_config(config).ok()
}
