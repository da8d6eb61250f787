use crate::similarity::cosine_similarity;
use crate::tokenizer::{TextTokenizer, Tokenizer};
use crate::vector::{DocumentVector, VectorId};
use crate::DocId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// How the document-frequency table is maintained on ingestion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrequencyPolicy {
    /// Every ingestion call counts each distinct token once, even when the
    /// document already carried it. Re-ingesting a document inflates its
    /// tokens' frequencies.
    #[default]
    PerIngestion,
    /// Only tokens new to the document are counted.
    DistinctPerDocument,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Scale weights by inverse document frequency. When off the frequency
    /// table is not maintained and weights are the raw base weights.
    pub frequency_weighting: bool,
    pub frequency_policy: FrequencyPolicy,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { frequency_weighting: true, frequency_policy: FrequencyPolicy::default() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMatch {
    pub id: DocId,
    pub similarity: f64,
    pub name: String,
}

/// Index shared between readers and a single writer.
pub type SharedIndex<T = TextTokenizer> = Arc<RwLock<VectorIndex<T>>>;

/// In-memory vector space over stored documents.
///
/// Documents iterate in ascending id order. Ranking and clustering depend on
/// that order for ties and for anchor de-duplication.
pub struct VectorIndex<T = TextTokenizer> {
    config: IndexConfig,
    tokenizer: T,
    documents: BTreeMap<DocId, DocumentVector>,
    document_frequency: HashMap<String, u32>,
}

impl Default for VectorIndex<TextTokenizer> {
    fn default() -> Self { Self::new() }
}

impl VectorIndex<TextTokenizer> {
    pub fn new() -> Self { Self::with_config(IndexConfig::default()) }

    pub fn with_config(config: IndexConfig) -> Self { Self::with_tokenizer(config, TextTokenizer::default()) }
}

impl<T: Tokenizer> VectorIndex<T> {
    pub fn with_tokenizer(config: IndexConfig, tokenizer: T) -> Self {
        Self { config, tokenizer, documents: BTreeMap::new(), document_frequency: HashMap::new() }
    }

    pub fn into_shared(self) -> SharedIndex<T> { Arc::new(RwLock::new(self)) }

    pub fn config(&self) -> &IndexConfig { &self.config }

    pub fn tokenizer(&self) -> &T { &self.tokenizer }

    pub fn len(&self) -> usize { self.documents.len() }

    pub fn is_empty(&self) -> bool { self.documents.is_empty() }

    pub fn contains(&self, id: DocId) -> bool { self.documents.contains_key(&id) }

    pub fn ids(&self) -> impl Iterator<Item = DocId> + '_ { self.documents.keys().copied() }

    /// Number of documents counted for `token`, or 0 if never seen.
    pub fn document_frequency(&self, token: &str) -> u32 {
        self.document_frequency.get(token).copied().unwrap_or(0)
    }

    /// Adds `text` to document `id`, creating it if needed and renaming it otherwise.
    ///
    /// Every token mentioned gets `base_weight`, replacing any earlier weight.
    /// Weights are only recomputed here when `recompute_now` is set; bulk loads
    /// should leave it off and call [`recompute_all_weights`](Self::recompute_all_weights)
    /// once at the end.
    pub fn upsert_document(
        &mut self,
        id: DocId,
        name: &str,
        text: &str,
        base_weight: f64,
        recompute_now: bool,
    ) -> &DocumentVector {
        let tokens = self.tokenizer.tokenize(text);
        let total = self.documents.len() + usize::from(!self.documents.contains_key(&id));

        let vector = self
            .documents
            .entry(id)
            .and_modify(|v| v.name = name.to_string())
            .or_insert_with(|| DocumentVector::document(id, name));

        if self.config.frequency_weighting {
            let distinct: HashSet<&str> = tokens.iter().map(String::as_str).collect();
            for token in distinct {
                let counted = match self.config.frequency_policy {
                    FrequencyPolicy::PerIngestion => true,
                    FrequencyPolicy::DistinctPerDocument => !vector.base_weights.contains_key(token),
                };
                if counted {
                    *self.document_frequency.entry(token.to_string()).or_insert(0) += 1;
                }
            }
        }

        vector.add_tokens(&tokens, base_weight);
        if recompute_now {
            vector.compute_token_weights(&self.document_frequency, total);
        }
        tracing::debug!(doc_id = id, tokens = tokens.len(), base_weight, "upserted document");
        vector
    }

    /// Upserts one `(text, weight)` field after another under the same id.
    pub fn upsert_weighted_fields<'a, I>(&mut self, id: DocId, name: &str, fields: I) -> &DocumentVector
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        for (text, weight) in fields {
            self.upsert_document(id, name, text, weight, false);
        }
        self.documents
            .entry(id)
            .or_insert_with(|| DocumentVector::document(id, name))
    }

    /// Rebuilds every stored vector's weights from the current frequency table
    /// and document count. Required after a batch of ingestions before searching.
    pub fn recompute_all_weights(&mut self) {
        let total = self.documents.len();
        for vector in self.documents.values_mut() {
            vector.compute_token_weights(&self.document_frequency, total);
        }
        tracing::info!(num_docs = total, num_terms = self.document_frequency.len(), "recomputed token weights");
    }

    /// Removes a document and uncounts its tokens. Remaining weights are stale
    /// until the next recompute.
    pub fn remove_document(&mut self, id: DocId) -> Option<DocumentVector> {
        let vector = self.documents.remove(&id)?;
        if self.config.frequency_weighting {
            for token in vector.tokens() {
                if let Some(count) = self.document_frequency.get_mut(token) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        self.document_frequency.remove(token);
                    }
                }
            }
        }
        tracing::debug!(doc_id = id, "removed document");
        Some(vector)
    }

    /// Independent copy of a stored vector.
    pub fn get_document_vector(&self, id: DocId) -> Option<DocumentVector> {
        self.documents.get(&id).cloned()
    }

    /// Weighted query vector for `text`. Never touches the frequency table.
    pub fn query_vector(&self, text: &str) -> DocumentVector {
        let mut vector = DocumentVector::query(text);
        vector.add_tokens(self.tokenizer.tokenize(text), 1.0);
        vector.compute_token_weights(&self.document_frequency, self.documents.len());
        vector
    }

    /// Ranks stored documents against free text.
    pub fn search(&self, text: &str, max_results: Option<usize>) -> Vec<VectorMatch> {
        self.ranked_search(&self.query_vector(text), max_results)
    }

    /// Scores every stored document other than `query` itself, drops exact
    /// zeros and returns the rest by descending similarity. Ties keep id order.
    pub fn ranked_search(&self, query: &DocumentVector, max_results: Option<usize>) -> Vec<VectorMatch> {
        let mut matches: Vec<VectorMatch> = self
            .documents
            .iter()
            .filter(|&(&id, _)| query.id != VectorId::Document(id))
            .filter_map(|(&id, vector)| {
                let similarity = cosine_similarity(query, vector);
                (similarity != 0.0).then(|| VectorMatch { id, similarity, name: vector.name.clone() })
            })
            .collect();
        matches.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
        if let Some(k) = max_results {
            matches.truncate(k);
        }
        matches
    }

    /// Groups documents with their near neighbours.
    ///
    /// A single forward pass in ascending id order: each anchor is marked seen
    /// before its matches are collected, and seen ids are never reported as a
    /// match again. A mutually similar pair is therefore listed once, under the
    /// lower id. Anchors with no match at or above `threshold` are absent.
    pub fn find_similar_documents(&self, threshold: f64) -> BTreeMap<DocId, Vec<VectorMatch>> {
        let mut seen: HashSet<DocId> = HashSet::new();
        let mut groups = BTreeMap::new();
        for (&id, anchor) in &self.documents {
            seen.insert(id);
            let similar: Vec<VectorMatch> = self
                .ranked_search(anchor, None)
                .into_iter()
                .filter(|m| m.similarity >= threshold && !seen.contains(&m.id))
                .collect();
            if !similar.is_empty() {
                groups.insert(id, similar);
            }
        }
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn greetings() -> VectorIndex {
        let mut index = VectorIndex::new();
        for (id, text) in [(1, "hello"), (2, "hi"), (3, "hi there"), (4, "hey"), (5, "hi to you")] {
            index.upsert_document(id, text, text, 1.0, false);
        }
        index.recompute_all_weights();
        index
    }

    #[test]
    fn frequency_counts_distinct_documents() {
        let mut index = VectorIndex::new();
        index.upsert_document(1, "a", "hi hi hi", 1.0, false);
        index.upsert_document(2, "b", "hi there", 1.0, false);
        assert_eq!(index.document_frequency("hi"), 2);
        assert_eq!(index.document_frequency("there"), 1);
        assert_eq!(index.document_frequency("absent"), 0);
    }

    #[test]
    fn upsert_renames_existing_document() {
        let mut index = VectorIndex::new();
        index.upsert_document(1, "old", "alpha", 1.0, false);
        let v = index.upsert_document(1, "new", "beta", 0.5, false);
        assert_eq!(v.name, "new");
        assert_eq!(v.base_weights["alpha"], 1.0);
        assert_eq!(v.base_weights["beta"], 0.5);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn recompute_now_uses_count_including_new_document() {
        let mut index = VectorIndex::new();
        index.upsert_document(1, "a", "shared", 1.0, false);
        let v = index.upsert_document(2, "b", "shared unique", 0.8, true);
        // two documents, "shared" in both
        assert_eq!(v.dimension_lengths["shared"], 0.0);
        assert!((v.dimension_lengths["unique"] - 0.8 * 2.0f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn reingestion_double_counts_by_default() {
        let mut once = VectorIndex::new();
        once.upsert_document(1, "a", "hello world", 1.0, false);
        once.upsert_document(2, "b", "hello there", 1.0, false);
        once.recompute_all_weights();

        let mut twice = VectorIndex::new();
        twice.upsert_document(1, "a", "hello world", 1.0, false);
        twice.upsert_document(1, "a", "hello world", 1.0, false);
        twice.upsert_document(2, "b", "hello there", 1.0, false);
        twice.recompute_all_weights();

        let a = once.get_document_vector(1).unwrap();
        let b = twice.get_document_vector(1).unwrap();
        assert_eq!(a.base_weights, b.base_weights);
        assert_eq!(once.document_frequency("hello"), 2);
        assert_eq!(twice.document_frequency("hello"), 3);
        assert_eq!(twice.document_frequency("world"), 2);
    }

    #[test]
    fn distinct_policy_makes_reingestion_idempotent() {
        let config = IndexConfig { frequency_policy: FrequencyPolicy::DistinctPerDocument, ..IndexConfig::default() };
        let mut once = VectorIndex::with_config(config.clone());
        once.upsert_document(1, "a", "hello world", 1.0, false);
        once.upsert_document(2, "b", "hello there", 1.0, false);
        once.recompute_all_weights();

        let mut twice = VectorIndex::with_config(config);
        twice.upsert_document(1, "a", "hello world", 1.0, false);
        twice.upsert_document(1, "a", "hello world", 1.0, false);
        twice.upsert_document(2, "b", "hello there", 1.0, false);
        twice.recompute_all_weights();

        assert_eq!(twice.document_frequency("hello"), 2);
        assert_eq!(
            once.get_document_vector(1).unwrap().dimension_lengths,
            twice.get_document_vector(1).unwrap().dimension_lengths
        );
    }

    #[test]
    fn disabled_weighting_keeps_base_weights() {
        let config = IndexConfig { frequency_weighting: false, ..IndexConfig::default() };
        let mut index = VectorIndex::with_config(config);
        index.upsert_document(1, "a", "common word", 0.5, false);
        index.upsert_document(2, "b", "common", 1.0, false);
        index.recompute_all_weights();
        assert_eq!(index.document_frequency("common"), 0);
        let v = index.get_document_vector(1).unwrap();
        assert_eq!(v.dimension_lengths["common"], 0.5);
        assert_eq!(v.dimension_lengths["word"], 0.5);
    }

    #[test]
    fn search_ranks_greetings() {
        let index = greetings();
        let results = index.search("hi bob", Some(3));
        let ids: Vec<DocId> = results.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![2, 5, 3]);
        assert!(results.iter().all(|m| m.similarity > 0.0));
        assert!(results.windows(2).all(|w| w[0].similarity >= w[1].similarity));
        assert_eq!(results[0].name, "hi");
    }

    #[test]
    fn search_respects_max_results_and_skips_non_matches() {
        let index = greetings();
        assert_eq!(index.search("hi", Some(1)).len(), 1);
        assert_eq!(index.search("hi", None).len(), 3);
        assert!(index.search("nothing matches", None).is_empty());
        assert!(index.search("", None).is_empty());
    }

    #[test]
    fn ranked_search_skips_the_query_document() {
        let index = greetings();
        let anchor = index.get_document_vector(3).unwrap();
        let results = index.ranked_search(&anchor, None);
        assert!(results.iter().all(|m| m.id != 3));
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn similar_pairs_are_reported_once() {
        let mut index = VectorIndex::new();
        index.upsert_document(1, "one", "rust programming", 1.0, false);
        index.upsert_document(2, "two", "rust programming", 1.0, false);
        index.upsert_document(3, "three", "cooking pasta", 1.0, false);
        index.recompute_all_weights();

        let groups = index.find_similar_documents(0.8);
        assert_eq!(groups.len(), 1);
        let matches = &groups[&1];
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].id, 2);
        assert!((matches[0].similarity - 1.0).abs() < 1e-12);
        assert!(!groups.contains_key(&2));
    }

    #[test]
    fn similar_threshold_filters_weak_matches() {
        let index = greetings();
        assert!(index.find_similar_documents(1.01).is_empty());
        let groups = index.find_similar_documents(0.0);
        // anchor 3 cannot list 2 again, it was already an anchor
        assert_eq!(groups[&2].iter().map(|m| m.id).collect::<Vec<_>>(), vec![5, 3]);
        assert_eq!(groups[&3].iter().map(|m| m.id).collect::<Vec<_>>(), vec![5]);
    }

    #[test]
    fn document_copy_is_independent() {
        let index = greetings();
        let mut copy = index.get_document_vector(2).unwrap();
        copy.name = "changed".into();
        copy.base_weights.clear();
        let stored = index.get_document_vector(2).unwrap();
        assert_eq!(stored.name, "hi");
        assert!(stored.base_weights.contains_key("hi"));
        assert!(index.get_document_vector(42).is_none());
    }

    #[test]
    fn remove_uncounts_tokens() {
        let mut index = greetings();
        assert_eq!(index.document_frequency("hi"), 3);
        let removed = index.remove_document(3).unwrap();
        assert_eq!(removed.name, "hi there");
        assert_eq!(index.document_frequency("hi"), 2);
        assert_eq!(index.document_frequency("there"), 0);
        assert!(!index.contains(3));
        assert!(index.remove_document(3).is_none());
    }

    #[test]
    fn weighted_fields_last_write_wins() {
        let mut index = VectorIndex::new();
        let v = index.upsert_weighted_fields(7, "repo", [("ruby library", 1.0), ("ruby", 0.2)]);
        assert_eq!(v.base_weights["ruby"], 0.2);
        assert_eq!(v.base_weights["library"], 1.0);
    }

    #[test]
    fn custom_tokenizer_is_used() {
        let split = |text: &str| text.split('|').map(str::to_string).collect::<Vec<_>>();
        let mut index = VectorIndex::with_tokenizer(IndexConfig::default(), split);
        let v = index.upsert_document(1, "a", "Foo|Bar", 1.0, false);
        assert!(v.base_weights.contains_key("Foo"));
    }
}
