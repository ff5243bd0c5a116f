mod analyzer;
mod config;
mod source;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use tessera_client::AdapterEnum;
use tessera_core::{
    AnalysisProcessor, AppError, Collection, CollectionRegistry, CollectionStore, ContentSource,
    JobKind, JobRunner, SyncJob, SyncProcessor, cancel_job, job_status, load_collections_config,
};
use tessera_db::{CollectionRepository, JobSnapshotRepository, RecordRepository};

use analyzer::{StructuralAnalyzer, TracingReportSink};
use config::{Cli, Command};
use source::JsonlContentSource;

type SyncRunner = JobRunner<
    SyncProcessor<CollectionRepository, AdapterEnum, JsonlContentSource, RecordRepository>,
    JobSnapshotRepository,
>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let cli = Cli::parse();

    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&cli.database_url)
        .await
        .context("Failed to connect to database")?;
    tessera_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let engine = Engine {
        pool,
        api_key: cli.api_key,
        base_url: cli.base_url,
        config_path: cli.config,
        content_file: cli.content_file,
    };

    if let Err(err) = run(&engine, cli.command).await {
        match err.downcast_ref::<AppError>() {
            Some(app) => eprintln!("Error: {}", app.user_message()),
            None => eprintln!("Error: {:#}", err),
        }
        std::process::exit(1);
    }

    Ok(())
}

async fn run(engine: &Engine, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Sync { collection, cron } => {
            sync(engine, &collection, cron).await?;
        }
        Command::Step { collection } => {
            let runner = engine.sync_runner(&collection).await?;
            let job = runner.process_next_unit().await?;
            print_progress(&job);
        }
        Command::Status => {
            let store = engine.job_store();
            for job_type in ["sync", "analysis"] {
                let job = job_status(&store, job_type).await?;
                info!(
                    "{}: {} ({}/{} items, {} errors, {}%)",
                    job_type,
                    job.status,
                    job.processed,
                    job.total,
                    job.errors,
                    job.percent()
                );
            }
        }
        Command::Cancel { job_type } => {
            let job = cancel_job(&engine.job_store(), &job_type).await?;
            info!("{} job cancelled (status: {})", job_type, job.status);
        }
        Command::Analyze { collection } => {
            analyze(engine, &collection).await?;
        }
        Command::Collections => {
            list_collections(engine).await?;
        }
    }

    Ok(())
}

/// Shared handles and settings behind every command.
struct Engine {
    pool: PgPool,
    api_key: String,
    base_url: Option<String>,
    config_path: Option<PathBuf>,
    content_file: Option<PathBuf>,
}

impl Engine {
    fn job_store(&self) -> JobSnapshotRepository {
        JobSnapshotRepository::new(self.pool.clone())
    }

    fn adapter(&self, provider: tessera_core::ProviderKind) -> Result<AdapterEnum, AppError> {
        match &self.base_url {
            Some(url) => AdapterEnum::for_provider_at(provider, &self.api_key, url),
            None => AdapterEnum::for_provider(provider, &self.api_key),
        }
    }

    fn content_source(&self) -> anyhow::Result<JsonlContentSource> {
        let path = self.content_file.as_ref().ok_or_else(|| {
            anyhow::anyhow!("No content file. Set TESSERA_CONTENT_FILE or pass --content-file")
        })?;
        let source = JsonlContentSource::load(path)?;
        info!("Loaded {} content items from {}", source.item_count(), path.display());
        Ok(source)
    }

    /// Resolve the named collection: the config entry supplies provider and
    /// filter, the database row carries the durable identity and store id.
    async fn collection(&self, name: &str) -> anyhow::Result<Collection> {
        let config = load_collections_config(self.config_path.clone())?.ok_or_else(|| {
            anyhow::anyhow!(
                "No configuration file found. Create ~/.config/tessera/collections.toml or use --config"
            )
        })?;

        let entry = config
            .find_by_name(name)
            .ok_or_else(|| anyhow::anyhow!("Collection '{}' not found in configuration", name))?;

        if !entry.enabled {
            info!("Note: Collection '{}' is marked as disabled in configuration", name);
        }

        let repo = CollectionRepository::new(self.pool.clone());
        if let Some(mut existing) = repo.get_by_name(&entry.name).await? {
            // Config is authoritative for provider and filter.
            if existing.provider != entry.provider
                || existing.content_filter != entry.content_filter
            {
                existing.provider = entry.provider;
                existing.content_filter = entry.content_filter.clone();
                repo.save(&existing).await?;
            }
            return Ok(existing);
        }

        let mut collection = Collection::new(&entry.name, entry.provider);
        collection.content_filter = entry.content_filter.clone();
        repo.save(&collection).await?;
        info!("Registered collection '{}' ({})", collection.name, collection.provider);
        Ok(collection)
    }

    async fn sync_runner(&self, name: &str) -> anyhow::Result<SyncRunner> {
        let collection = self.collection(name).await?;
        let adapter = self.adapter(collection.provider)?;
        let registry =
            CollectionRegistry::new(CollectionRepository::new(self.pool.clone()), adapter);
        let processor = SyncProcessor::new(
            registry,
            self.content_source()?,
            RecordRepository::new(self.pool.clone()),
            collection.id,
        );
        Ok(JobRunner::new(processor, self.job_store()))
    }
}

async fn sync(engine: &Engine, collection: &str, cron: bool) -> anyhow::Result<()> {
    let runner = engine.sync_runner(collection).await?;

    let plan = runner.processor().plan().await?;
    if !plan.exhausted.is_empty() {
        warn!(
            "{} items exceeded the retry budget and are excluded: {:?}",
            plan.exhausted.len(),
            plan.exhausted
        );
    }
    if plan.is_empty() {
        info!("Collection '{}' is up to date; nothing to sync", collection);
        return Ok(());
    }
    info!(
        "Sync plan for '{}': {} new, {} changed, {} removed",
        collection,
        plan.additions.len(),
        plan.candidates.len(),
        plan.removals.len()
    );

    let kind = if cron { JobKind::Cron } else { JobKind::Direct };
    let job = runner.initialize(plan.job_items(), kind).await?;

    if cron {
        info!(
            "Job scheduled with {} items; drive it with 'tessera step {}'",
            job.total, collection
        );
        return Ok(());
    }

    let final_job = runner.run_to_completion().await?;
    print_summary(collection, &final_job);
    Ok(())
}

async fn analyze(engine: &Engine, collection: &str) -> anyhow::Result<()> {
    let entry = engine.collection(collection).await?;
    let source = engine.content_source()?;
    let items = source.resolve_items(entry.content_filter.as_deref()).await?;
    if items.is_empty() {
        info!("Collection '{}' has no items to analyze", collection);
        return Ok(());
    }

    let processor = AnalysisProcessor::new(source, StructuralAnalyzer, TracingReportSink);
    let runner = JobRunner::new(processor, engine.job_store());
    runner.initialize(items, JobKind::Direct).await?;
    let job = runner.run_to_completion().await?;

    info!(
        "Analysis complete: {}/{} items, {} errors",
        job.processed, job.total, job.errors
    );
    Ok(())
}

async fn list_collections(engine: &Engine) -> anyhow::Result<()> {
    let config = load_collections_config(engine.config_path.clone())?.ok_or_else(|| {
        anyhow::anyhow!(
            "No configuration file found. Create ~/.config/tessera/collections.toml or use --config"
        )
    })?;

    if config.collections.is_empty() {
        info!("No collections configured.");
        return Ok(());
    }

    let repo = CollectionRepository::new(engine.pool.clone());
    println!("\nConfigured collections:\n");
    for entry in &config.collections {
        let row = repo.get_by_name(&entry.name).await?;
        let store = row
            .and_then(|c| c.store_id)
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {:<24} provider: {:<8} enabled: {:<5} store: {}",
            entry.name, entry.provider, entry.enabled, store
        );
        if let Some(filter) = &entry.content_filter {
            println!("  {:<24} filter:   {}", "", filter);
        }
    }
    println!();
    Ok(())
}

fn print_progress(job: &SyncJob) {
    info!(
        "{}: {}/{} items ({}%), {} errors{}",
        job.status,
        job.processed,
        job.total,
        job.percent(),
        job.errors,
        if job.retrying { " [retry pass]" } else { "" }
    );
}

fn print_summary(collection: &str, job: &SyncJob) {
    info!("");
    info!("═══════════════════════════════════════");
    info!("Sync complete: {}", collection);
    info!("═══════════════════════════════════════");
    info!("  Status:      {}", job.status);
    info!("  Processed:   {}/{}", job.processed, job.total);
    info!("  Errors:      {}", job.errors);
    info!("═══════════════════════════════════════");

    if job.errors == 0 {
        info!("All items processed successfully!");
    }
}
