use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

/// Width of the hashed feature space. Wide enough that collisions stay rare
/// for sentence-sized inputs, small enough to embed a few thousand documents
/// without ceremony.
pub const EMBED_DIM: usize = 256;

static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\p{L}[\p{L}\p{N}'’\-]*|\p{N}+").expect("token regex"));

/// Lowercased word tokens. Shared by the embedder and the c-TF-IDF stage so
/// keyword terms line up with what was embedded.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    TOKEN_RE
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Deterministic sentence embedding: signed feature hashing over word
/// unigrams and character trigrams, L2-normalized. Multilingual by
/// construction (trigrams carry script and morphology), stable across runs
/// and machines because the bucket hash is SHA-256, not a randomized hasher.
#[must_use]
pub fn embed(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; EMBED_DIM];
    for token in tokenize(text) {
        add_feature(&mut v, &token, 1.0);
        let chars: Vec<char> = token.chars().collect();
        if chars.len() > 2 {
            for win in chars.windows(3) {
                let tri: String = win.iter().collect();
                add_feature(&mut v, &format!("#{tri}"), 0.5);
            }
        }
    }
    l2_normalize(&mut v);
    v
}

pub fn embed_all(texts: &[String]) -> Vec<Vec<f32>> {
    texts.iter().map(|t| embed(t)).collect()
}

fn add_feature(v: &mut [f32], feature: &str, weight: f32) {
    let digest = Sha256::digest(feature.as_bytes());
    let bucket = u64::from_le_bytes(digest[0..8].try_into().expect("digest slice")) as usize
        % EMBED_DIM;
    // Second hash byte decides the sign, the usual trick to keep hashed
    // features zero-mean under collisions.
    let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
    v[bucket] += sign * weight;
}

fn l2_normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{embed, tokenize, EMBED_DIM};

    #[test]
    fn tokenizes_with_diacritics_and_digits() {
        assert_eq!(tokenize("L'été 2024, c'est fini."), vec![
            "l'été", "2024", "c'est", "fini"
        ]);
    }

    #[test]
    fn embedding_is_deterministic_and_normalized() {
        let a = embed("The committee approved the directive.");
        let b = embed("The committee approved the directive.");
        assert_eq!(a, b);
        assert_eq!(a.len(), EMBED_DIM);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn related_sentences_are_closer_than_unrelated() {
        let dot = |a: &[f32], b: &[f32]| -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() };
        let a = embed("The patient received a dose of the medicine.");
        let b = embed("The medicine dose was given to the patient.");
        let c = embed("Stock markets fell sharply on Tuesday morning.");
        assert!(dot(&a, &b) > dot(&a, &c));
    }
}
