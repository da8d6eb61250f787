use anyhow::Result;
use axum::Router;
use clap::Parser;
use std::net::SocketAddr;
use tracing_subscriber::{fmt, EnvFilter};
use vecspace_core::{FrequencyPolicy, IndexConfig};
use vecspace_server::build_app;
use tokio::net::TcpListener;

#[derive(Parser)]
struct Args {
    /// Corpus to load at startup (JSON/JSONL file or directory)
    #[arg(long)]
    corpus: Option<String>,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
    /// Use raw base weights instead of TF-IDF scaling
    #[arg(long, default_value_t = false)]
    no_frequency_weighting: bool,
    /// Count a token once per document even when the document is ingested again
    #[arg(long, default_value_t = false)]
    distinct_frequency: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let config = IndexConfig {
        frequency_weighting: !args.no_frequency_weighting,
        frequency_policy: if args.distinct_frequency { FrequencyPolicy::DistinctPerDocument } else { FrequencyPolicy::PerIngestion },
    };
    let app: Router = build_app(args.corpus, config)?;

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
