//! Alias service - Entry point.

use alias_service::{
    api::{create_router, AppState},
    config::{Config, KvBackend, KvConfig, RoutingConfig},
    spawn_sweeper, ExpirySweeper, Registrar,
};
use anyhow::{Context, Result};
use email_routing_client::EmailRoutingClient;
use kv_store::{CloudflareKv, KvStore, MemoryKv};
use secrecy::ExposeSecret;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run(config).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<()> {
    info!(domain = %config.routing.domain, "Starting alias service");

    let provider = Arc::new(
        EmailRoutingClient::new(
            config.routing.api_token.expose_secret().as_str(),
            config.routing.api_url.as_str(),
            config.routing.zone_id.as_str(),
            config.routing.timeout,
        )
        .context("Failed to create Email Routing client")?
        .with_priority(config.routing.priority),
    );

    let kv = build_kv(&config.kv, &config.routing)?;

    let registrar = Registrar::new(provider.clone(), kv.clone(), config.routing.domain.as_str())
        .with_expiration_grace(config.sweep.record_grace());

    if config.sweep.enabled {
        spawn_sweeper(ExpirySweeper::new(provider, kv, config.sweep.interval));
    } else {
        warn!("Expiry sweep disabled, temporary aliases will not be removed");
    }

    let app = create_router(AppState::new(registrar));

    let addr = SocketAddr::new(
        config
            .server
            .listen_addr
            .parse()
            .with_context(|| format!("Invalid listen address {}", config.server.listen_addr))?,
        config.server.port,
    );

    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    axum::serve(listener, app).await.context("Server error")
}

/// Build the expiry store selected in configuration.
fn build_kv(kv: &KvConfig, routing: &RoutingConfig) -> Result<Arc<dyn KvStore>> {
    match kv.backend {
        KvBackend::Memory => {
            warn!("Using in-memory expiry store (records will be lost on restart)");
            Ok(Arc::new(MemoryKv::new()))
        }
        KvBackend::Cloudflare => {
            let account_id = kv
                .account_id
                .as_deref()
                .context("KV__ACCOUNT_ID is required for the cloudflare backend")?;
            let namespace_id = kv
                .namespace_id
                .as_deref()
                .context("KV__NAMESPACE_ID is required for the cloudflare backend")?;
            let token = kv.api_token.as_ref().unwrap_or(&routing.api_token);

            info!(namespace_id, "Using Workers KV expiry store");
            let store = CloudflareKv::new(
                token.expose_secret().as_str(),
                kv.api_url.as_str(),
                account_id,
                namespace_id,
                routing.timeout,
            )
            .context("Failed to create Workers KV client")?;
            Ok(Arc::new(store))
        }
    }
}
