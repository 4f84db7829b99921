use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use factlens_common::observability::{init_logging, LogConfig};
use factlens_config::{FactlensConfig, FactlensConfigLoader};
use factlens_engine::{AnalysisPool, AnalysisRequest, ExtractionOrchestrator, HttpAnalysisService};

/// Extract article content and images from a web page.
#[derive(Debug, Parser)]
#[command(name = "factlens", version)]
struct Args {
    /// Page URL to extract.
    url: String,

    /// Configuration file (YAML). `FACTLENS_*` env vars override it.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// After extraction, submit the result to the configured analysis
    /// service and print its verdict as well.
    #[arg(long)]
    analyse: bool,

    /// Mirror log events to stderr.
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut loader = FactlensConfigLoader::new();
    if let Some(path) = &args.config {
        loader = loader.with_file(path);
    }
    let config: FactlensConfig = loader.load()?;

    init_logging(LogConfig {
        emit_stderr: args.verbose,
        ..LogConfig::default()
    })?;

    tracing::info!(url = %args.url, "starting extraction");
    let orchestrator = ExtractionOrchestrator::from_config(&config);
    let result = orchestrator.extract(&args.url).await;
    println!("{}", serde_json::to_string_pretty(&result)?);

    if args.analyse && result.success {
        let service = Arc::new(HttpAnalysisService::new(&config.analysis)?);
        let pool = AnalysisPool::new(service, &config.analysis);
        let verdict = pool
            .analyse(&AnalysisRequest {
                text: result.text_content.clone(),
                images: result.images.clone(),
                source_url: result.url.clone(),
            })
            .await?;
        println!("{}", serde_json::to_string_pretty(&verdict)?);
    }

    if result.success {
        Ok(())
    } else {
        std::process::exit(1);
    }
}
