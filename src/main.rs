mod classify;
mod config;
mod error;
mod export;
mod llm;
mod memory;
mod notify;
mod orchestrator;
mod records;
mod revise;

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, Level};

use config::Settings;
use export::Exporter;
use llm::{Completion, LlmClient};
use memory::ArtifactStore;
use notify::Notifier;
use orchestrator::Orchestrator;
use records::AirtableStore;
use revise::ReviseEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    // Load env; missing credentials are fatal before the loop starts
    let _ = dotenv::dotenv();
    let settings = Settings::from_env()?;
    info!(
        client = %settings.client_name,
        owner = %settings.owner,
        interval = ?settings.poll_interval,
        "settings loaded"
    );

    let store = Arc::new(AirtableStore::new(&settings)?);
    let llm: Arc<dyn Completion> = Arc::new(LlmClient::new(&settings)?);

    let memory = ArtifactStore::open(
        &settings.data_dir,
        settings.exclude_within_days,
        settings.top_k,
    )?;
    let stats = memory.stats();
    info!(
        entries = stats.total,
        avg_voice = stats.avg_voice_quality,
        avg_quality = stats.avg_post_quality,
        "artifact store ready"
    );

    let engine = ReviseEngine::new(llm, settings.client_name.clone());
    let exporter = Exporter::new(settings.export_path.clone());
    let notifier = Notifier::new(&settings)?;

    // Cooperative shutdown: ctrl-c flips the watch, the loop finishes the
    // current record and stops
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, finishing current record");
            let _ = tx.send(true);
        }
    });

    let mut orchestrator = Orchestrator::new(
        store,
        engine,
        memory,
        exporter,
        notifier,
        settings.owner.clone(),
        settings.poll_interval,
    );
    orchestrator.run(rx).await
}
