use std::collections::HashSet;

use crate::errors::{EvalError, Result};
use crate::topic::cluster::{dist_sq, kmeans, merge_to, KMeansConfig, OUTLIER_LABEL};
use crate::topic::ctfidf::{class_tfidf, stopwords_for};
use crate::topic::embed::{embed, embed_all, tokenize, EMBED_DIM};
use crate::topic::reduce::RandomProjection;

/// Fewer documents than this cannot support a meaningful fit.
pub const MIN_FIT_DOCS: usize = 8;

/// Reduced dimension the clustering runs in.
const REDUCED_DIM: usize = 16;

/// Keywords retained per topic.
const TOP_N_WORDS: usize = 10;

/// Topic identifier. `OUTLIER` is the reserved "fits no discovered cluster"
/// sentinel and is never a valid keyword or exemplar source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopicId(pub i32);

impl TopicId {
    pub const OUTLIER: TopicId = TopicId(OUTLIER_LABEL);

    #[must_use]
    pub fn is_outlier(self) -> bool {
        self == Self::OUTLIER
    }
}

impl std::fmt::Display for TopicId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug)]
pub struct FitOptions {
    /// Upper bound on the number of topics after merging.
    pub target_topic_count: usize,
    /// Exemplar sentences retained per topic.
    pub n_representative: usize,
    /// Head-of-corpus subsample cap for fitting.
    pub fit_sample: usize,
    /// Two-letter language hints, used for stop-word selection.
    pub languages: Vec<String>,
    pub use_stops: bool,
    /// Pair source and reference into one fit document per line instead of
    /// concatenating both sides.
    pub parallel: bool,
    pub seed: u64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            target_topic_count: 100,
            n_representative: 10,
            fit_sample: 1000,
            languages: Vec::new(),
            use_stops: false,
            parallel: true,
            seed: 42,
        }
    }
}

/// Ranked topic distribution for one query sentence. Returned by value from
/// every query: the model keeps no mutable per-query state, so assignments
/// from different calls never interfere.
#[derive(Clone, Debug)]
pub struct TopicAssignment {
    ranked: Vec<(TopicId, f32)>,
    top_topic: Option<TopicId>,
}

impl TopicAssignment {
    /// `ranked` must already be sorted by non-increasing probability. The top
    /// topic is the best-ranked entry that is not the outlier sentinel,
    /// wherever the sentinel happens to rank; the sentinel itself is dropped
    /// from the returned ranking and never consumes a `top_n` slot.
    pub(crate) fn new(ranked: Vec<(TopicId, f32)>, top_n: usize) -> Self {
        let top_topic = ranked
            .iter()
            .map(|(id, _)| *id)
            .find(|id| !id.is_outlier());
        let mut ranked: Vec<(TopicId, f32)> = ranked
            .into_iter()
            .filter(|(id, _)| !id.is_outlier())
            .collect();
        ranked.truncate(top_n);
        Self { ranked, top_topic }
    }

    /// Up to `top_n` real (topic, probability) pairs, probability
    /// non-increasing. The outlier sentinel never appears here.
    #[must_use]
    pub fn ranked(&self) -> &[(TopicId, f32)] {
        &self.ranked
    }

    /// Best non-outlier topic, if any real topic got probability mass.
    #[must_use]
    pub fn top_topic(&self) -> Option<TopicId> {
        self.top_topic
    }
}

/// Fitted topic model: embedding transform, cluster centroids, per-topic
/// keyword lists and exemplars. Immutable after `fit`; all queries go
/// through `&self`.
#[derive(Debug)]
pub struct FittedTopicModel {
    projection: RandomProjection,
    centroids: Vec<Vec<f32>>,
    keywords: Vec<Vec<(String, f32)>>,
    representatives: Vec<Vec<String>>,
    sigma_sq: f32,
    outlier_sq_threshold: f32,
}

/// Assemble fit documents from the two corpus sides. `parallel` pairs them
/// into one line per sentence pair using the prompt phrasing, so in-context
/// exemplars read like the prompts the model will see.
#[must_use]
pub fn fit_documents(
    src: &[String],
    refs: &[String],
    parallel: bool,
    src_lang_name: &str,
    tgt_lang_name: &str,
) -> Vec<String> {
    if parallel {
        src.iter()
            .zip(refs)
            .map(|(s, r)| format!("{src_lang_name} phrase: {s}. {tgt_lang_name} phrase: {r}"))
            .collect()
    } else {
        let mut docs: Vec<String> = src.to_vec();
        docs.extend(refs.iter().cloned());
        docs
    }
}

impl FittedTopicModel {
    pub fn fit(documents: &[String], opts: &FitOptions) -> Result<Self> {
        let docs: Vec<String> = documents
            .iter()
            .filter(|d| !d.trim().is_empty())
            .take(opts.fit_sample.max(1))
            .cloned()
            .collect();
        if docs.len() < MIN_FIT_DOCS {
            return Err(EvalError::ModelFit(format!(
                "{} documents, need at least {MIN_FIT_DOCS}",
                docs.len()
            )));
        }

        let embedded = embed_all(&docs);
        let projection = RandomProjection::new(EMBED_DIM, REDUCED_DIM, opts.seed);
        let points = projection.project_all(&embedded);

        // Free clustering first, then merge down to the requested count, the
        // way the reference pipeline reduces its discovered topics.
        let k = (docs.len() / 4).clamp(2, docs.len());
        let mut clustering = kmeans(
            &points,
            &KMeansConfig {
                k,
                seed: opts.seed,
                ..Default::default()
            },
        );
        merge_to(&mut clustering, &points, opts.target_topic_count.max(1));

        if clustering
            .labels
            .iter()
            .all(|&l| l == OUTLIER_LABEL)
        {
            return Err(EvalError::ModelFit("no coherent topics found".to_string()));
        }

        let n_topics = clustering.centroids.len();
        let stops: HashSet<String> = if opts.use_stops {
            stopwords_for(&opts.languages)
        } else {
            HashSet::new()
        };
        let doc_tokens: Vec<Vec<String>> = docs.iter().map(|d| tokenize(d)).collect();
        let keywords = class_tfidf(&doc_tokens, &clustering.labels, n_topics, TOP_N_WORDS, &stops);

        let mut representatives: Vec<Vec<String>> = vec![Vec::new(); n_topics];
        for topic in 0..n_topics {
            let mut members: Vec<(usize, f32)> = clustering
                .labels
                .iter()
                .enumerate()
                .filter(|(_, &l)| l == topic as i32)
                .map(|(i, _)| (i, dist_sq(&points[i], &clustering.centroids[topic])))
                .collect();
            members.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
            representatives[topic] = members
                .into_iter()
                .take(opts.n_representative.max(1))
                .map(|(i, _)| docs[i].clone())
                .collect();
        }

        Ok(Self {
            projection,
            centroids: clustering.centroids,
            keywords,
            representatives,
            sigma_sq: clustering.mean_sq_dist.max(1e-6),
            outlier_sq_threshold: clustering.outlier_sq_threshold.max(1e-6),
        })
    }

    /// Number of real (non-outlier) topics.
    #[must_use]
    pub fn n_topics(&self) -> usize {
        self.centroids.len()
    }

    /// Ranked topic distributions for a batch of query sentences. Each query
    /// gets up to `top_n` real-topic entries, probabilities in [0, 1] summing
    /// to at most one, sorted descending; if fewer topics exist, all of them
    /// are returned. The outlier sentinel participates in the weighting (a
    /// query far from every centroid hands it most of the mass, deflating
    /// every real topic's probability) but is never returned in the ranking.
    #[must_use]
    pub fn closest_topics(&self, queries: &[String], top_n: usize) -> Vec<TopicAssignment> {
        let top_n = top_n.max(1);
        queries
            .iter()
            .map(|q| {
                let point = self.projection.project(&embed(q));
                let mut weighted: Vec<(TopicId, f32)> = self
                    .centroids
                    .iter()
                    .enumerate()
                    .map(|(i, c)| {
                        let d2 = dist_sq(&point, c);
                        (TopicId(i as i32), (-d2 / (2.0 * self.sigma_sq)).exp())
                    })
                    .collect();
                // The outlier pseudo-topic sits at the rejection radius; it
                // outranks real topics only when the query is farther than
                // that from all of them.
                weighted.push((
                    TopicId::OUTLIER,
                    (-self.outlier_sq_threshold / (2.0 * self.sigma_sq)).exp(),
                ));
                let total: f32 = weighted.iter().map(|(_, w)| w).sum();
                if total > 0.0 {
                    for (_, w) in weighted.iter_mut() {
                        *w /= total;
                    }
                }
                weighted.sort_by(|a, b| {
                    b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal)
                });
                TopicAssignment::new(weighted, top_n)
            })
            .collect()
    }

    /// Keyword list for a topic, descending weight, entries with
    /// weight >= `min_weight` only. The outlier sentinel and unknown ids
    /// yield an empty list; having nothing clear the threshold is not an
    /// error.
    #[must_use]
    pub fn keywords(&self, topic: TopicId, min_weight: f32) -> Vec<(String, f32)> {
        if topic.is_outlier() || topic.0 < 0 {
            return Vec::new();
        }
        match self.keywords.get(topic.0 as usize) {
            Some(list) => list
                .iter()
                .filter(|(_, w)| *w >= min_weight)
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    /// Exemplar sentences nearest the topic centroid. Fails for the outlier
    /// sentinel and for topics with no recorded members.
    pub fn representative_examples(&self, topic: TopicId) -> Result<&[String]> {
        if topic.is_outlier() || topic.0 < 0 {
            return Err(EvalError::MissingTopic(topic.0));
        }
        match self.representatives.get(topic.0 as usize) {
            Some(reps) if !reps.is_empty() => Ok(reps),
            _ => Err(EvalError::MissingTopic(topic.0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{fit_documents, FitOptions, FittedTopicModel, TopicAssignment, TopicId};
    use crate::errors::EvalError;

    fn themed_corpus() -> Vec<String> {
        let medical = [
            "The patient received a dose of the new medicine.",
            "Doctors adjusted the medicine dose for each patient.",
            "The patient reported side effects from the medicine.",
            "A smaller dose helped the patient recover quickly.",
            "The medicine was approved after patient trials.",
            "Each patient takes the medicine twice daily.",
        ];
        let finance = [
            "Stock markets fell sharply on Tuesday morning.",
            "Investors sold stock as market prices dropped.",
            "The market rally lifted stock prices again.",
            "Trading volume on the stock market doubled.",
            "Analysts expect the market to recover slowly.",
            "Stock prices follow the wider market trend.",
        ];
        medical
            .iter()
            .chain(finance.iter())
            .map(|s| (*s).to_string())
            .collect()
    }

    fn fit_two_topics() -> FittedTopicModel {
        FittedTopicModel::fit(
            &themed_corpus(),
            &FitOptions {
                target_topic_count: 2,
                n_representative: 3,
                ..Default::default()
            },
        )
        .expect("fit")
    }

    #[test]
    fn too_few_documents_fail_fit() {
        let docs = vec!["one sentence".to_string(); 4];
        let err = FittedTopicModel::fit(&docs, &FitOptions::default()).expect_err("too few");
        assert!(matches!(err, EvalError::ModelFit(_)));
    }

    #[test]
    fn closest_topics_is_sorted_capped_and_duplicate_free() {
        let model = fit_two_topics();
        let queries = vec!["The patient needs a different medicine dose.".to_string()];
        let assignment = &model.closest_topics(&queries, 2)[0];

        let ranked = assignment.ranked();
        assert!(ranked.len() <= 2);
        for pair in ranked.windows(2) {
            assert!(pair[0].1 >= pair[1].1);
        }
        let ids: Vec<TopicId> = ranked.iter().map(|(id, _)| *id).collect();
        let mut dedup = ids.clone();
        dedup.sort();
        dedup.dedup();
        assert_eq!(ids.len(), dedup.len());
        for (id, p) in ranked {
            assert!(!id.is_outlier());
            assert!((0.0..=1.0).contains(p));
        }
    }

    #[test]
    fn asking_for_more_topics_than_exist_returns_exactly_the_real_ones() {
        let model = fit_two_topics();
        assert_eq!(model.n_topics(), 2);
        let queries = vec!["Stock prices rose in early trading.".to_string()];
        let assignment = &model.closest_topics(&queries, 3)[0];
        // Exactly the two real topics, no error, no sentinel padding the
        // list out to the requested three.
        assert_eq!(assignment.ranked().len(), 2);
        assert!(assignment.ranked().iter().all(|(id, _)| !id.is_outlier()));
    }

    #[test]
    fn keyword_weights_respect_threshold_and_order() {
        let model = fit_two_topics();
        for topic in 0..model.n_topics() {
            let kws = model.keywords(TopicId(topic as i32), 0.3);
            for (_, w) in &kws {
                assert!(*w >= 0.3);
            }
            for pair in kws.windows(2) {
                assert!(pair[0].1 >= pair[1].1);
            }
        }
        assert!(model.keywords(TopicId::OUTLIER, 0.0).is_empty());
    }

    #[test]
    fn representative_examples_err_for_outlier() {
        let model = fit_two_topics();
        let err = model
            .representative_examples(TopicId::OUTLIER)
            .expect_err("outlier");
        assert!(matches!(err, EvalError::MissingTopic(-1)));

        let with_reps = (0..model.n_topics())
            .filter_map(|t| model.representative_examples(TopicId(t as i32)).ok())
            .collect::<Vec<_>>();
        assert!(!with_reps.is_empty());
        for reps in with_reps {
            assert!(!reps.is_empty() && reps.len() <= 3);
        }
    }

    #[test]
    fn top_topic_skips_the_outlier_sentinel_wherever_it_ranks() {
        // Sentinel ranked first: the next real topic wins, and the sentinel
        // does not occupy one of the returned slots.
        let a = TopicAssignment::new(
            vec![
                (TopicId::OUTLIER, 0.6),
                (TopicId(1), 0.3),
                (TopicId(0), 0.1),
            ],
            3,
        );
        assert_eq!(a.top_topic(), Some(TopicId(1)));
        assert_eq!(a.ranked().len(), 2);
        assert!(a.ranked().iter().all(|(id, _)| !id.is_outlier()));

        // Sentinel mid-ranking: the genuine top topic is kept, not skipped
        // by position.
        let b = TopicAssignment::new(
            vec![
                (TopicId(0), 0.5),
                (TopicId::OUTLIER, 0.3),
                (TopicId(1), 0.2),
            ],
            3,
        );
        assert_eq!(b.top_topic(), Some(TopicId(0)));
        assert_eq!(b.ranked().len(), 2);

        // Sentinel intruding into a tight top_n no longer costs a real
        // topic its slot.
        let c = TopicAssignment::new(
            vec![
                (TopicId::OUTLIER, 0.5),
                (TopicId(0), 0.4),
                (TopicId(1), 0.1),
            ],
            2,
        );
        assert_eq!(c.ranked().len(), 2);
        assert_eq!(c.top_topic(), Some(TopicId(0)));
    }

    #[test]
    fn parallel_fit_documents_pair_both_sides() {
        let src = vec!["Bonjour.".to_string()];
        let refs = vec!["Hello.".to_string()];
        let docs = fit_documents(&src, &refs, true, "French", "English");
        assert_eq!(docs[0], "French phrase: Bonjour.. English phrase: Hello.");
        let flat = fit_documents(&src, &refs, false, "French", "English");
        assert_eq!(flat, vec!["Bonjour.".to_string(), "Hello.".to_string()]);
    }
}
