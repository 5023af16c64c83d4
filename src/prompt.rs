use crate::errors::{EvalError, Result};
use crate::langs::language_name;
use crate::topic::{FittedTopicModel, TopicAssignment};

/// Keywords below this weight are left out of prompt annotations.
pub const KEYWORD_VISIBILITY_THRESHOLD: f32 = 0.05;

const REP_LEAD_IN: &str = "Representative sentences in the closest topic include: ";

/// Which topic-derived annotations to prepend to the translation prompt.
#[derive(Clone, Copy, Debug, Default)]
pub struct PromptOptions {
    pub num_fewshot: usize,
    pub include_keywords: bool,
    pub include_examples: bool,
}

/// Builds the textual context handed to the generative model: optional topic
/// annotation followed by the fixed translation template. Language names are
/// resolved once at construction; an unrecognized code fails here, before
/// any data is loaded.
#[derive(Debug)]
pub struct PromptBuilder {
    source_lang: &'static str,
    target_lang: &'static str,
    opts: PromptOptions,
}

impl PromptBuilder {
    pub fn new(source_code: &str, target_code: &str, opts: PromptOptions) -> Result<Self> {
        Ok(Self {
            source_lang: language_name(source_code)?,
            target_lang: language_name(target_code)?,
            opts,
        })
    }

    /// The bare template, no annotation:
    /// `"{src_lang} phrase: {source}  {tgt_lang} phrase:"`.
    #[must_use]
    pub fn base_prompt(&self, source: &str) -> String {
        format!(
            "{} phrase: {}  {} phrase:",
            self.source_lang, source, self.target_lang
        )
    }

    /// Full prompt for one test sentence. Zero-shot emits the bare template;
    /// otherwise the configured annotations are derived from the sentence's
    /// topic assignment and prepended.
    pub fn build(&self, model: Option<&FittedTopicModel>, source: &str) -> Result<String> {
        let n = self.opts.num_fewshot;
        if n == 0 || (!self.opts.include_keywords && !self.opts.include_examples) {
            return Ok(self.base_prompt(source));
        }
        let model = match model {
            Some(m) => m,
            None => return Ok(self.base_prompt(source)),
        };
        if n > model.n_topics() {
            return Err(EvalError::InsufficientTopics {
                requested: n,
                available: model.n_topics(),
            });
        }

        let queries = vec![source.to_string()];
        let assignment = &model.closest_topics(&queries, n)[0];

        let mut annotation = String::new();
        if self.opts.include_keywords {
            annotation.push_str(&self.keyword_sentence(model, assignment, n));
        }
        if self.opts.include_examples {
            annotation.push_str(&self.representative_block(model, assignment));
        }
        Ok(format!("{annotation}{}", self.base_prompt(source)))
    }

    fn keyword_sentence(
        &self,
        model: &FittedTopicModel,
        assignment: &TopicAssignment,
        n: usize,
    ) -> String {
        let visible = |id| -> Vec<String> {
            model
                .keywords(id, 0.0)
                .into_iter()
                .filter(|(_, w)| *w > KEYWORD_VISIBILITY_THRESHOLD)
                .map(|(term, _)| term)
                .collect()
        };

        if n == 1 {
            let Some(top) = assignment.top_topic() else {
                return String::new();
            };
            let keywords = visible(top);
            if keywords.is_empty() {
                return String::new();
            }
            format!(
                "This sentence's predicted topic includes keywords such as: {}. ",
                keywords.join(", ")
            )
        } else {
            // Union of keywords across the top n topics, first occurrence
            // keeps its rank position.
            let mut keywords: Vec<String> = Vec::new();
            for (id, _) in assignment.ranked() {
                for kw in visible(*id) {
                    if !keywords.contains(&kw) {
                        keywords.push(kw);
                    }
                }
            }
            if keywords.is_empty() {
                return String::new();
            }
            format!(
                "This sentence's best {n} predicted topics include keywords such as: {}. ",
                keywords.join(", ")
            )
        }
    }

    fn representative_block(
        &self,
        model: &FittedTopicModel,
        assignment: &TopicAssignment,
    ) -> String {
        let Some(top) = assignment.top_topic() else {
            return String::new();
        };
        match model.representative_examples(top) {
            Ok(reps) => format!("{REP_LEAD_IN}{}\n", reps.join("\n")),
            Err(_) => String::new(),
        }
    }
}
