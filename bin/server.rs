// Registry Insights - Web Server
// Search API over the enriched dataset

use anyhow::{Context, Result};
use clap::Parser;
use registry_insights::api::{router, AppState};
use registry_insights::{DatasetHandle, PipelineConfig};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "registry-server", about = "HTTP search API over the enriched dataset", version)]
struct ServerArgs {
    /// Pipeline configuration (JSON); defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "0.0.0.0:5000")]
    addr: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = ServerArgs::parse();

    println!("🌐 Registry Insights - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = PipelineConfig::load(args.config.as_deref())
        .context("Failed to load pipeline configuration")?;

    // Loaded once here; POST /api/reload refreshes it
    let dataset = DatasetHandle::open(&config.enriched_output, &config.summary_output);
    if dataset.is_loaded() {
        println!("✓ Dataset loaded: {} records", dataset.records().len());
    } else {
        println!("⚠️  Dataset not loaded from {}", config.enriched_output.display());
        println!("   Run: registry-insights run");
        println!("   then POST /api/reload");
    }

    let app = router(AppState::new(dataset));

    let listener = tokio::net::TcpListener::bind(&args.addr)
        .await
        .with_context(|| format!("Failed to bind to {}", args.addr))?;

    info!(addr = %args.addr, "server listening");
    println!("\n🚀 Server running on http://{}", args.addr);
    println!("   Search: /search_company?q=&state=&status=");
    println!("   API:    /api/companies, /api/filters, /api/summary, /api/ask");
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}
