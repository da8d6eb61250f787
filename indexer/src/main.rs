use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{fmt, EnvFilter};
use vecspace_core::corpus::{ingest_corpus, load_corpus};
use vecspace_core::tokenizer::{TextTokenizer, Tokenizer};
use vecspace_core::{DocId, DocumentVector, FrequencyPolicy, IndexConfig, VectorIndex};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Load documents into an in-memory vector space and query it", long_about = None)]
struct Cli {
    /// Use raw base weights instead of TF-IDF scaling
    #[arg(long, global = true, default_value_t = false)]
    no_frequency_weighting: bool,
    /// Count a token once per document even when the document is ingested again
    #[arg(long, global = true, default_value_t = false)]
    distinct_frequency: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank documents against a query string
    Search {
        /// Input path (JSON/JSONL file or directory)
        #[arg(long)]
        input: String,
        #[arg(long)]
        query: String,
        /// Maximum number of results (all non-zero matches when omitted)
        #[arg(long)]
        k: Option<usize>,
    },
    /// Group documents with their near duplicates
    Similar {
        #[arg(long)]
        input: String,
        #[arg(long, default_value_t = 0.8)]
        threshold: f64,
    },
    /// Print the weighted vector of one document
    Show {
        #[arg(long)]
        input: String,
        #[arg(long)]
        id: DocId,
    },
    /// Print the tokens extracted from a piece of text
    Tokenize {
        #[arg(long)]
        text: String,
        #[arg(long, default_value_t = false)]
        stem: bool,
    },
}

#[derive(Serialize)]
struct SimilarVector {
    #[serde(flatten)]
    vector: DocumentVector,
    similarity: f64,
}

#[derive(Serialize)]
struct SimilarGroup {
    #[serde(flatten)]
    anchor: DocumentVector,
    similar_vectors: Vec<SimilarVector>,
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    let config = IndexConfig {
        frequency_weighting: !cli.no_frequency_weighting,
        frequency_policy: if cli.distinct_frequency { FrequencyPolicy::DistinctPerDocument } else { FrequencyPolicy::PerIngestion },
    };

    match cli.command {
        Commands::Search { input, query, k } => {
            let index = build_index(&input, config)?;
            print_json(&index.search(&query, k))
        }
        Commands::Similar { input, threshold } => {
            let index = build_index(&input, config)?;
            print_json(&similar_groups(&index, threshold))
        }
        Commands::Show { input, id } => {
            let index = build_index(&input, config)?;
            let vector = index.get_document_vector(id).ok_or_else(|| anyhow!("document {id} not found"))?;
            print_json(&vector)
        }
        Commands::Tokenize { text, stem } => print_json(&TextTokenizer::new().stemmed(stem).tokenize(&text)),
    }
}

fn build_index(input: &str, config: IndexConfig) -> Result<VectorIndex> {
    let docs = load_corpus(input)?;
    let mut index = VectorIndex::with_config(config);
    let n = ingest_corpus(&mut index, &docs);
    tracing::info!(num_docs = n, "index ready");
    Ok(index)
}

/// Expands each anchor's matches into full vector copies.
fn similar_groups(index: &VectorIndex, threshold: f64) -> Vec<SimilarGroup> {
    index
        .find_similar_documents(threshold)
        .into_iter()
        .filter_map(|(anchor_id, matches)| {
            let anchor = index.get_document_vector(anchor_id)?;
            let similar_vectors = matches
                .into_iter()
                .filter_map(|m| {
                    index
                        .get_document_vector(m.id)
                        .map(|vector| SimilarVector { vector, similarity: m.similarity })
                })
                .collect();
            Some(SimilarGroup { anchor, similar_vectors })
        })
        .collect()
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
