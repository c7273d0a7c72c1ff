#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::todo)]
#![warn(clippy::panic)]
#![warn(clippy::dbg_macro)]
#![warn(clippy::print_stdout)]
#![warn(clippy::print_stderr)]
#![warn(clippy::clone_on_ref_ptr)]
#![warn(unreachable_pub)]
#![warn(missing_debug_implementations)]
#![warn(unused_qualifications)]
#![deny(unused_must_use)]

use post_notifier::adapters::memory::MemoryTokenStore;
use post_notifier::adapters::push::fcm::FcmPushProvider;
use post_notifier::adapters::redis::{PostEventStream, RedisClient};
use post_notifier::adapters::token_store::TokenStore;
use post_notifier::adapters::{database, database::push_token_repo::PushTokenRepository};
use post_notifier::config::{Config, TokenStoreKind};
use post_notifier::{AppBuilder, telemetry};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::Instrument;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load();
    let telemetry_guard = telemetry::init_telemetry(&config.telemetry)?;

    post_notifier::setup_panic_hook();

    let boot_span = tracing::info_span!("boot_server");
    let (api_listener, mgmt_listener, app, shutdown_tx, shutdown_rx) = async {
        // Phase 1: Infrastructure Setup (Resources)
        let token_store: Arc<dyn TokenStore> = match config.database.token_store {
            TokenStoreKind::Postgres => {
                let pool = database::init_pool(&config.database).await?;
                database::run_migrations(&pool).await?;
                Arc::new(PushTokenRepository::new(pool, config.database.token_page_size))
            }
            TokenStoreKind::Memory => {
                tracing::warn!("Using in-memory token store, registrations are lost on restart");
                Arc::new(MemoryTokenStore::new())
            }
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        post_notifier::spawn_signal_handler(shutdown_tx.clone());

        let pubsub = RedisClient::new(&config.pubsub).await?;
        let post_stream = PostEventStream::new(Arc::clone(&pubsub), &config.pubsub);
        post_stream.ensure_group().await?;
        tracing::info!(consumer = %post_stream.consumer(), stream = %config.pubsub.stream_key, "Post stream ready");

        let push_provider = Arc::new(FcmPushProvider::new(&config.fcm)?);

        // Phase 2: Component Wiring
        let app = AppBuilder::new(config.clone())
            .with_token_store(token_store)
            .with_event_source(Arc::new(post_stream))
            .with_push_provider(push_provider)
            .with_pubsub(pubsub)
            .build()?;

        // Phase 3: Listeners
        let api_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
        let mgmt_addr: SocketAddr = format!("{}:{}", config.server.host, config.server.mgmt_port).parse()?;

        tracing::info!(address = %api_addr, "listening");
        tracing::info!(address = %mgmt_addr, "management server listening");

        let api_listener = tokio::net::TcpListener::bind(api_addr).await?;
        let mgmt_listener = tokio::net::TcpListener::bind(mgmt_addr).await?;

        Ok::<_, anyhow::Error>((api_listener, mgmt_listener, app, shutdown_tx, shutdown_rx))
    }
    .instrument(boot_span)
    .await?;

    // Phase 4: Start Runtime
    let worker_tasks = app.workers.spawn_all(shutdown_rx.clone());

    let mut api_rx = shutdown_rx.clone();
    let api_server = axum::serve(api_listener, app.router).with_graceful_shutdown(async move {
        let _ = api_rx.wait_for(|&s| s).await;
    });

    let mut mgmt_rx = shutdown_rx.clone();
    let mgmt_server = axum::serve(mgmt_listener, app.mgmt_router).with_graceful_shutdown(async move {
        let _ = mgmt_rx.wait_for(|&s| s).await;
    });

    if let Err(e) = tokio::try_join!(api_server, mgmt_server) {
        tracing::error!(error = %e, "Server error");
    }

    // Phase 5: Graceful Shutdown
    let _ = shutdown_tx.send(true);
    tokio::select! {
        () = async {
            futures::future::join_all(worker_tasks).await;
        } => {
            tracing::info!("Background tasks finished.");
        }
        () = tokio::time::sleep(std::time::Duration::from_secs(config.server.shutdown_timeout_secs)) => {
            tracing::warn!("Timeout waiting for background tasks to finish.");
        }
    }

    telemetry_guard.shutdown();
    Ok(())
}
