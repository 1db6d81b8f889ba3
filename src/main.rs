use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use filebox::{
    accounts::UserDirectory,
    api,
    config::{Config, ServiceRole},
    file_store::FileStore,
    gateway::{self, GatewayState},
    object_store::LocalStore,
    storage::Database,
    tokens::TokenAuthority,
    AuthState, StorageState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "gcp" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_stackdriver::layer())
                .init();
        }
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), "filebox starting");

    let config = Config::load()?;
    info!(role = ?config.role, "Loaded configuration");

    let app = match config.role {
        ServiceRole::Gateway => {
            let state = GatewayState::new(&config)?;
            info!(
                auth = %config.gateway.auth.base_url(),
                storage = %config.gateway.storage.base_url(),
                static_content = %config.gateway.static_content.base_url(),
                "Gateway backends configured"
            );
            gateway::create_gateway_router(Arc::new(state))
        }
        ServiceRole::Auth => {
            let db = Database::open(&config.node.data_dir)?;
            info!("Database opened at: {}", config.node.data_dir);
            api::create_auth_router(Arc::new(auth_state(&config, db)))
        }
        ServiceRole::Storage => {
            let db = Database::open(&config.node.data_dir)?;
            info!("Database opened at: {}", config.node.data_dir);
            api::create_storage_router(Arc::new(storage_state(&config, db).await?))
        }
        ServiceRole::Standalone => {
            let db = Database::open(&config.node.data_dir)?;
            info!("Database opened at: {}", config.node.data_dir);
            let storage = storage_state(&config, db.clone()).await?;
            api::create_standalone_router(
                Arc::new(auth_state(&config, db)),
                Arc::new(storage),
            )
        }
    };

    let listener = tokio::net::TcpListener::bind(&config.node.bind_address).await?;
    info!("Listening on: {}", config.node.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}

fn auth_state(config: &Config, db: Database) -> AuthState {
    AuthState {
        config: config.clone(),
        accounts: UserDirectory::new(db),
        tokens: TokenAuthority::new(&config.auth),
    }
}

/// Open the content store and finish interrupted uploads and deletes before
/// any request is accepted.
async fn storage_state(config: &Config, db: Database) -> anyhow::Result<StorageState> {
    let content = LocalStore::new(&config.storage.content_root)?;
    info!(
        "Using local content store at: {}",
        config.storage.content_root
    );

    let files = FileStore::new(db, Arc::new(content));
    let stats = files.reconcile().await?;
    if stats.pending_removed > 0 || stats.deletions_completed > 0 {
        info!(
            pending_removed = stats.pending_removed,
            deletions_completed = stats.deletions_completed,
            "Reconciled interrupted file operations"
        );
    }

    Ok(StorageState {
        config: config.clone(),
        shares: files.share_resolver(),
        files,
        tokens: TokenAuthority::new(&config.auth),
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
