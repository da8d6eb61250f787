pub mod corpus;
pub mod index;
pub mod similarity;
pub mod tokenizer;
pub mod vector;

pub type DocId = u32;

pub use index::{FrequencyPolicy, IndexConfig, SharedIndex, VectorIndex, VectorMatch};
pub use similarity::{cosine_similarity, dot_product};
pub use tokenizer::{tokenize, TextTokenizer, Tokenizer};
pub use vector::{DocumentVector, VectorId};
