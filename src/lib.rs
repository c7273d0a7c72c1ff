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

pub mod adapters;
pub mod api;
pub mod config;
pub mod domain;
pub mod error;
pub mod services;
pub mod telemetry;
pub mod workers;

use crate::adapters::events::EventSource;
use crate::adapters::push::PushProvider;
use crate::adapters::redis::RedisClient;
use crate::adapters::token_store::TokenStore;
use crate::api::{AppState, MgmtState};
use crate::config::Config;
use crate::services::dispatcher::Dispatcher;
use crate::services::health_service::HealthService;
use crate::services::post_notification_service::PostNotificationService;
use crate::services::push_token_service::PushTokenService;
use crate::workers::PostEventWorker;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Fully wired application: HTTP routers plus the background workers.
#[derive(Debug)]
pub struct App {
    pub router: axum::Router,
    pub mgmt_router: axum::Router,
    pub workers: Workers,
}

#[derive(Debug)]
pub struct Workers {
    post_events: PostEventWorker,
}

impl Workers {
    /// Spawns every background worker on the current runtime.
    #[must_use]
    pub fn spawn_all(self, shutdown_rx: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        vec![tokio::spawn(self.post_events.run(shutdown_rx))]
    }
}

/// Collects the infrastructure handles and wires the services together.
#[derive(Debug)]
pub struct AppBuilder {
    config: Config,
    token_store: Option<Arc<dyn TokenStore>>,
    event_source: Option<Arc<dyn EventSource>>,
    push_provider: Option<Arc<dyn PushProvider>>,
    pubsub: Option<Arc<RedisClient>>,
}

impl AppBuilder {
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config, token_store: None, event_source: None, push_provider: None, pubsub: None }
    }

    #[must_use]
    pub fn with_token_store(mut self, store: Arc<dyn TokenStore>) -> Self {
        self.token_store = Some(store);
        self
    }

    #[must_use]
    pub fn with_event_source(mut self, source: Arc<dyn EventSource>) -> Self {
        self.event_source = Some(source);
        self
    }

    #[must_use]
    pub fn with_push_provider(mut self, provider: Arc<dyn PushProvider>) -> Self {
        self.push_provider = Some(provider);
        self
    }

    /// Redis connection checked by the readiness endpoint.
    #[must_use]
    pub fn with_pubsub(mut self, pubsub: Arc<RedisClient>) -> Self {
        self.pubsub = Some(pubsub);
        self
    }

    /// Wires services, routers and workers.
    ///
    /// # Errors
    /// Returns an error if a required component was not provided.
    pub fn build(self) -> anyhow::Result<App> {
        let store = self.token_store.ok_or_else(|| anyhow::anyhow!("token store is required"))?;
        let source = self.event_source.ok_or_else(|| anyhow::anyhow!("event source is required"))?;
        let provider = self.push_provider.ok_or_else(|| anyhow::anyhow!("push provider is required"))?;

        let dispatcher = Dispatcher::new(provider, Arc::clone(&store), &self.config.dispatch);
        let notification_service = PostNotificationService::new(Arc::clone(&store), dispatcher);
        let push_token_service = PushTokenService::new(Arc::clone(&store));
        let health_service = HealthService::new(store, self.pubsub, self.config.health.clone());

        let post_events = PostEventWorker::new(source, notification_service, &self.config.pubsub);

        Ok(App {
            router: api::app_router(&self.config, AppState { push_token_service }),
            mgmt_router: api::mgmt_router(MgmtState { health_service }),
            workers: Workers { post_events },
        })
    }
}

/// Flips the shutdown channel on SIGINT or SIGTERM.
pub fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = ctrl_c => {},
            () = terminate => {},
        }

        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });
}

/// Routes panics through tracing so they reach the configured log sink.
pub fn setup_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        tracing::error!(panic = %info, "Unrecoverable panic");
        default_hook(info);
    }));
}
