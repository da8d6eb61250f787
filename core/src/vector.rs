use crate::DocId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Identity of a vector. Query vectors are ephemeral and can never collide
/// with a stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorId {
    Document(DocId),
    Query,
}

impl fmt::Display for VectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VectorId::Document(id) => write!(f, "{id}"),
            VectorId::Query => f.write_str("query"),
        }
    }
}

/// Sparse vector keyed by token.
///
/// `base_weights` hold the caller-assigned weight of each token; `dimension_lengths`
/// are the magnitudes used by the similarity math and are always rebuilt from
/// `base_weights`, so their keys are a subset of the base keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentVector {
    pub id: VectorId,
    pub name: String,
    pub base_weights: BTreeMap<String, f64>,
    pub dimension_lengths: BTreeMap<String, f64>,
}

impl DocumentVector {
    pub fn new(id: VectorId, name: impl Into<String>) -> Self {
        Self { id, name: name.into(), base_weights: BTreeMap::new(), dimension_lengths: BTreeMap::new() }
    }

    pub fn document(id: DocId, name: impl Into<String>) -> Self { Self::new(VectorId::Document(id), name) }

    pub fn query(text: impl Into<String>) -> Self { Self::new(VectorId::Query, text) }

    /// Writes `base_weight` for every token. Repeated tokens overwrite rather than
    /// accumulate, so a token mentioned twice weighs the same as once. The
    /// dimension length is a placeholder until the next weight computation.
    pub fn add_tokens<I, S>(&mut self, tokens: I, base_weight: f64)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for token in tokens {
            let token = token.as_ref();
            self.base_weights.insert(token.to_string(), base_weight);
            self.dimension_lengths.insert(token.to_string(), base_weight);
        }
    }

    /// Rebuilds `dimension_lengths` as `base * ln(total / df)`. Tokens missing
    /// from `document_frequency` keep their raw base weight.
    pub fn compute_token_weights(&mut self, document_frequency: &HashMap<String, u32>, total_documents: usize) {
        let total = total_documents as f64;
        self.dimension_lengths = self
            .base_weights
            .iter()
            .map(|(token, &base)| {
                let weight = match document_frequency.get(token) {
                    Some(&df) => base * (total / df as f64).ln(),
                    None => base,
                };
                (token.clone(), weight)
            })
            .collect();
    }

    /// Euclidean norm over the dimension lengths; 0 for an empty vector.
    pub fn norm(&self) -> f64 {
        self.dimension_lengths.values().map(|w| w * w).sum::<f64>().sqrt()
    }

    pub fn is_empty(&self) -> bool { self.base_weights.is_empty() }

    pub fn tokens(&self) -> impl Iterator<Item = &str> { self.base_weights.keys().map(String::as_str) }
}
