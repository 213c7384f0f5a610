//! modbot service binary: wires configuration, storage, providers, and the
//! HTTP intake together.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use modbot::actions::ActionDispatcher;
use modbot::config::Config;
use modbot::engine::evaluator::RuleEvaluator;
use modbot::engine::registry::{CheckDependencies, CheckRegistry};
use modbot::http::{WebContext, build_router};
use modbot::intake::{EventIntake, MemoryDedupStore};
use modbot::metrics::{MetricsPublisher, NoOpMetricsPublisher, StatsdMetricsPublisher};
use modbot::moderation::ModerationEngine;
use modbot::providers::NoopModerationBackend;
use modbot::storage::{
    ChannelStorage, CooldownStorage, InMemoryChannelStorage, InMemoryCooldownStorage,
    InMemoryModerationLogStorage, ModerationLogStorage, PostgresChannelStorage,
    PostgresCooldownStorage, PostgresModerationLogStorage, Storage,
};
use modbot::test_helpers::{
    MockBotDetector, MockChainProvider, MockIcebreaker, MockMoxie, MockParagraph, MockRankProvider,
    MockSocialGraph,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::new()?;

    let metrics: Arc<dyn MetricsPublisher> = match &config.statsd_host {
        Some(host) => {
            info!(host = host.as_ref(), "Publishing metrics to statsd");
            Arc::new(StatsdMetricsPublisher::new(
                host.as_ref(),
                &config.metrics_prefix,
            )?)
        }
        None => Arc::new(NoOpMetricsPublisher::new()),
    };

    let (channels, cooldowns, logs, health): (
        Arc<dyn ChannelStorage>,
        Arc<dyn CooldownStorage>,
        Arc<dyn ModerationLogStorage>,
        Arc<dyn Storage>,
    ) = match &config.database_url {
        Some(url) => {
            info!("Connecting to Postgres");
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await?;
            let channel_storage = Arc::new(PostgresChannelStorage::new(pool.clone()));
            (
                channel_storage.clone(),
                Arc::new(PostgresCooldownStorage::new(pool.clone())),
                Arc::new(PostgresModerationLogStorage::new(pool)),
                channel_storage,
            )
        }
        None => {
            warn!("DATABASE_URL not set, using in-memory storage");
            let channel_storage = Arc::new(InMemoryChannelStorage::new());
            (
                channel_storage.clone(),
                Arc::new(InMemoryCooldownStorage::new()),
                Arc::new(InMemoryModerationLogStorage::new()),
                channel_storage,
            )
        }
    };

    // Provider clients are wired by the embedding deployment; this binary
    // starts with inert development providers.
    let social = Arc::new(MockSocialGraph::new());
    let backend = Arc::new(NoopModerationBackend::new());
    let dependencies = CheckDependencies {
        social: social.clone(),
        chain: Arc::new(MockChainProvider::new()),
        airstack: Arc::new(MockRankProvider::with_rank(u64::MAX)),
        openrank: Arc::new(MockRankProvider::with_rank(u64::MAX)),
        bot_detection: Arc::new(MockBotDetector::new(
            modbot::providers::BotClassification::Human,
        )),
        icebreaker: Arc::new(MockIcebreaker::new()),
        paragraph: Arc::new(MockParagraph::new()),
        moxie: Arc::new(MockMoxie::new()),
        http_client: reqwest::Client::new(),
    };

    let registry = Arc::new(CheckRegistry::builtin(dependencies));
    let evaluator = RuleEvaluator::new(registry).with_check_timeout(config.check_timeout.get());
    let dispatcher = ActionDispatcher::new(backend.clone(), cooldowns.clone());

    let engine = Arc::new(ModerationEngine::new(
        evaluator,
        dispatcher,
        logs,
        cooldowns,
        social.clone(),
        backend,
        metrics.clone(),
    ));

    let dedup = Arc::new(MemoryDedupStore::new(
        config.dedup_capacity.get(),
        config.dedup_ttl.get(),
    ));
    let intake = Arc::new(EventIntake::new(
        channels,
        engine,
        dedup,
        social.clone(),
        metrics,
    ));

    let app = build_router(WebContext::new(intake, health));
    let addr = format!("0.0.0.0:{}", config.http_port.get());
    info!(addr = %addr, "Starting modbot intake server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
