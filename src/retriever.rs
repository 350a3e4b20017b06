use crate::config::RetrievalConfig;
use crate::corpus::{RegulationCorpus, RegulationExcerpt};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// An excerpt selected by the retriever, with the score it was ranked by.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedExcerpt<'a> {
    pub excerpt: &'a RegulationExcerpt,
    pub score: f64,
}

impl RetrievedExcerpt<'_> {
    pub fn to_scored_reference(&self) -> ScoredReference {
        ScoredReference {
            id: self.excerpt.id.clone(),
            score: self.score,
        }
    }
}

/// Owned form of a retrieval hit, used in serialized artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredReference {
    pub id: String,
    pub score: f64,
}

/// Keyword-overlap retriever. Stateless apart from its scoring constants.
#[derive(Debug, Clone, Default)]
pub struct Retriever {
    config: RetrievalConfig,
}

impl Retriever {
    pub fn new(config: RetrievalConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Scores every excerpt against `query_text` and returns the best `limit`
    /// matches, highest score first and ties broken by ascending id.
    ///
    /// Tag matches count `tag_weight`, text matches `text_weight`. Excerpts whose
    /// tags intersect `tag_hints` additionally receive a bonus larger than any
    /// score the query tokens alone can produce.
    pub fn retrieve<'c>(
        &self,
        query_text: &str,
        corpus: &'c RegulationCorpus,
        tag_hints: &BTreeSet<String>,
        limit: usize,
    ) -> Vec<RetrievedExcerpt<'c>> {
        let tokens = tokenize(query_text, self.config.min_token_len);
        let hints: BTreeSet<String> = tag_hints.iter().map(|h| h.trim().to_lowercase()).collect();
        let bonus = self.effective_hint_bonus(tokens.len());

        let mut scored: Vec<RetrievedExcerpt<'c>> = corpus
            .iter()
            .filter_map(|excerpt| {
                let mut score = self.token_score(&tokens, excerpt);
                if !hints.is_empty() && !excerpt.tags.is_disjoint(&hints) {
                    score += bonus;
                }
                (score > 0.0).then_some(RetrievedExcerpt { excerpt, score })
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.excerpt.id.cmp(&b.excerpt.id))
        });
        scored.truncate(limit);

        debug!(
            "Query '{}' ({} tokens, {} hints) matched {} excerpts",
            query_text,
            tokens.len(),
            hints.len(),
            scored.len()
        );

        scored
    }

    fn token_score(&self, tokens: &BTreeSet<String>, excerpt: &RegulationExcerpt) -> f64 {
        if tokens.is_empty() {
            return 0.0;
        }
        let text_tokens = tokenize(&excerpt.text, self.config.min_token_len);
        let tag_matches = tokens.intersection(&excerpt.tags).count();
        let text_matches = tokens.intersection(&text_tokens).count();

        tag_matches as f64 * self.config.tag_weight + text_matches as f64 * self.config.text_weight
    }

    // Each distinct token can match at most once in tags and once in text.
    fn effective_hint_bonus(&self, token_count: usize) -> f64 {
        let ceiling =
            token_count as f64 * (self.config.tag_weight + self.config.text_weight) + 1.0;
        self.config.hint_bonus.max(ceiling)
    }
}

/// Lowercase word tokens split on non-alphanumeric boundaries, dropping tokens
/// shorter than `min_len` characters.
pub fn tokenize(text: &str, min_len: usize) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|raw| raw.chars().count() >= min_len)
        .map(str::to_lowercase)
        .collect()
}
