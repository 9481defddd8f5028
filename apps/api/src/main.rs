mod clock;
mod config;
mod crawl;
mod errors;
mod llm_client;
mod models;
mod routes;
mod schedule;
mod selection;
mod state;
mod store;
#[cfg(test)]
mod testutil;

use anyhow::Result;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::{Config, S3Settings, StorageBackend};
use crate::crawl::feed::JsonFeedSource;
use crate::crawl::PromptSource;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::schedule::{spawn_triggers, SchedulePolicy};
use crate::selection::oracle::LlmRankingOracle;
use crate::selection::orchestrator::DailySelector;
use crate::state::AppState;
use crate::store::fs::FsStore;
use crate::store::s3::S3Store;
use crate::store::{HistoryLedger, PromptStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Prompt of the Day API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize storage
    let (prompts, ledger): (Arc<dyn PromptStore>, Arc<dyn HistoryLedger>) = match &config.storage {
        StorageBackend::Fs { data_dir } => {
            let store = Arc::new(FsStore::new(data_dir.clone()));
            info!("File store initialized at {}", store.data_dir().display());
            (store.clone() as Arc<dyn PromptStore>, store as Arc<dyn HistoryLedger>)
        }
        StorageBackend::S3(settings) => {
            let client = build_s3_client(settings).await;
            let store = Arc::new(S3Store::new(client, &settings.bucket, &settings.prefix));
            info!("S3 store initialized (bucket: {})", settings.bucket);
            (store.clone() as Arc<dyn PromptStore>, store as Arc<dyn HistoryLedger>)
        }
    };

    // Initialize ranking oracle
    let llm = LlmClient::new(config.anthropic_api_key.clone(), config.oracle.clone())?;
    if llm.has_api_key() {
        info!("LLM client initialized (model: {})", llm_client::MODEL);
    } else {
        tracing::warn!("ANTHROPIC_API_KEY not set; selection will use the random fallback");
    }
    let oracle = Arc::new(LlmRankingOracle::new(llm));

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(config.timezone));
    let selector = Arc::new(DailySelector::new(
        prompts.clone(),
        ledger.clone(),
        oracle,
        clock.clone(),
    ));

    // Initialize crawl sources
    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(60))
        .build()?;
    let sources: Vec<Arc<dyn PromptSource>> = config
        .feeds
        .iter()
        .cloned()
        .map(|spec| Arc::new(JsonFeedSource::new(spec, http.clone())) as Arc<dyn PromptSource>)
        .collect();
    info!("{} crawl sources configured", sources.len());

    // Build app state
    let state = AppState {
        selector,
        prompts,
        ledger,
        sources: Arc::new(sources),
        clock,
        schedule: SchedulePolicy::new(config.timezone),
        config: config.clone(),
    };

    if config.enable_scheduler {
        spawn_triggers(state.clone());
    } else {
        info!("Scheduler disabled; selection and crawl run only on request");
    }

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Constructs an S3 client configured for MinIO (local) or AWS (production).
async fn build_s3_client(settings: &S3Settings) -> aws_sdk_s3::Client {
    let credentials = Credentials::new(
        &settings.access_key_id,
        &settings.secret_access_key,
        None,
        None,
        "prompt-of-the-day-static",
    );

    let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(Region::new("us-east-1"))
        .credentials_provider(credentials)
        .endpoint_url(&settings.endpoint)
        .load()
        .await;

    aws_sdk_s3::Client::new(&s3_config)
}
