//! Access Relay service
//!
//! Proof-gated HTTP relay with replay protection and hashed upstream endpoints.

use access_relay::{
    create_router, AccessLog, AccessRelay, Allowlist, Config, Dispatcher, FileNullifierStore,
    Groth16Verifier, NullifierStore, ProofVerifier, RedisNullifierStore, StorageBackend,
};
use anyhow::{Context, Result};
use endpoint_registry::{AppState, EndpointRegistry, EndpointStore, FileEndpointStore, RedisEndpointStore};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "access_relay=debug,endpoint_registry=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Access Relay");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    info!("Storage backend: {:?}", config.storage_backend);

    let (nullifiers, endpoints): (Arc<dyn NullifierStore>, Arc<dyn EndpointStore>) =
        match config.storage_backend {
            StorageBackend::File => {
                info!("Data directory: {}", config.data_dir.display());
                let nullifiers = FileNullifierStore::open(config.nullifier_path())
                    .await
                    .context("Failed to open nullifier store")?;
                let endpoints = FileEndpointStore::open(config.endpoints_path())
                    .await
                    .context("Failed to open endpoint store")?;
                (Arc::new(nullifiers) as _, Arc::new(endpoints) as _)
            }
            StorageBackend::Redis => {
                let nullifiers = RedisNullifierStore::new(&config.redis_url)
                    .await
                    .context("Failed to connect nullifier store to Redis")?;
                let endpoints = RedisEndpointStore::new(&config.redis_url)
                    .await
                    .context("Failed to connect endpoint store to Redis")?;
                (Arc::new(nullifiers) as _, Arc::new(endpoints) as _)
            }
        };

    let verifier: Arc<dyn ProofVerifier> = Arc::new(
        Groth16Verifier::from_file(&config.verification_key_path).with_context(|| {
            format!(
                "Failed to load verification key from {}",
                config.verification_key_path.display()
            )
        })?,
    );
    info!(
        "Verification key loaded from {}",
        config.verification_key_path.display()
    );

    let allowlist = Allowlist::new(&config.allowed_targets);
    if allowlist.is_empty() {
        warn!("ALLOWED_TARGETS is empty: every access request will be refused");
    } else {
        info!("{} allowed upstream targets", allowlist.len());
    }

    if config.admin_token.is_none() {
        warn!("ADMIN_TOKEN not set: registry resolve/all/clear routes are disabled");
    }

    let registry = Arc::new(EndpointRegistry::new(endpoints));
    let dispatcher =
        Dispatcher::new(config.upstream_timeout).context("Failed to build HTTP client")?;
    let schema = config.signal_schema()?;

    let relay = Arc::new(AccessRelay::new(
        verifier,
        registry.clone(),
        nullifiers,
        allowlist,
        dispatcher,
        AccessLog::new(config.audit_log_path()),
        schema,
    ));

    let app = create_router(
        relay,
        AppState::new(registry, config.admin_token.clone()),
        config.circuits_dir.clone(),
    );

    let listener = TcpListener::bind(&config.api_address())
        .await
        .with_context(|| format!("Failed to bind to {}", config.api_address()))?;

    info!("Access Relay listening on {}", config.api_address());

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
