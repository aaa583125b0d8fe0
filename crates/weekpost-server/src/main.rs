use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use weekpost_api::WeeklyService;
use weekpost_db::Database;
use weekpost_gateway::discord::DiscordClient;
use weekpost_gateway::{MessagingClient, Reconciler, Scheduler, SyncWorker};
use weekpost_render::Renderer;
use weekpost_types::clock::{Clock, SystemClock};
use weekpost_types::config::{ConfigStore, WeeklyConfig};

const ENV_PREFIX: &str = "WEEKPOST_";
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
const DEFAULT_LOG_FILTER: &str = "weekpost=debug,weekpost_gateway=debug,weekpost_db=info,weekpost_api=info,weekpost_types=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    // Config
    let token = std::env::var("WEEKPOST_DISCORD_TOKEN").unwrap_or_default();
    if token.trim().is_empty() {
        anyhow::bail!("WEEKPOST_DISCORD_TOKEN is not set");
    }
    let db_path = std::env::var("WEEKPOST_DB_PATH").unwrap_or_else(|_| "weekpost.db".into());
    let config = WeeklyConfig::from_map(&config_from_env(std::env::vars()))?;
    if config.channel_id.is_empty() {
        warn!("WEEKPOST_CHANNEL_ID is empty, weekly syncs will be skipped");
    }
    let config = ConfigStore::new(config);

    // Init database
    let db = Arc::new(Database::open(&PathBuf::from(&db_path))?);

    // Messaging client
    let mut discord = DiscordClient::new(token)?;
    if let Ok(base_url) = std::env::var("WEEKPOST_DISCORD_API_BASE") {
        info!(base_url = %base_url, "Using custom Discord API base");
        discord = discord.with_base_url(base_url);
    }
    let discord = Arc::new(discord);
    discord.connect().await?;
    let client: Arc<dyn MessagingClient> = discord.clone();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let renderer = Renderer::default();

    // Sync worker + scheduler
    let cancel = CancellationToken::new();
    let reconciler = Arc::new(Reconciler::new(
        db.clone(),
        client.clone(),
        config.clone(),
        clock.clone(),
        renderer.clone(),
    ));
    let (sync, worker) = SyncWorker::spawn(reconciler, cancel.clone());
    let scheduler = Scheduler::new(db.clone(), client.clone(), config.clone(), clock.clone(), sync.clone());
    let scheduler_task = tokio::spawn(scheduler.run(cancel.clone()));

    let service = WeeklyService::new(db, config, clock, client, sync, renderer);
    match service.status().await {
        Ok(status) => info!(
            week = %status.week_label,
            entries = status.entry_count,
            scheduled_at = %status.scheduled_at,
            message_id = ?status.message_id,
            "Weekpost is running"
        ),
        Err(e) => error!("Failed to read startup status: {}", e),
    }
    // Catch up on anything missed while offline.
    service.request_sync(false);

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    cancel.cancel();
    discord.disconnect();

    let stopped = async {
        let _ = worker.await;
        let _ = scheduler_task.await;
    };
    if tokio::time::timeout(SHUTDOWN_GRACE, stopped).await.is_err() {
        warn!("Background tasks did not stop in time");
    }

    Ok(())
}

/// Collect `WEEKPOST_<KEY>` variables for every supported config key.
fn config_from_env(vars: impl Iterator<Item = (String, String)>) -> BTreeMap<String, String> {
    let env: BTreeMap<String, String> = vars.collect();
    WeeklyConfig::supported_keys()
        .filter_map(|key| {
            let name = format!("{}{}", ENV_PREFIX, key.to_ascii_uppercase());
            env.get(&name).map(|value| (key.to_string(), value.clone()))
        })
        .collect()
}
