use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ballotbox=info,tower_http=debug")),
        )
        .init();

    let args = cli::Args::parse();
    let mut config = config::Config::load(&args.config)?;
    // CLI --bind overrides the config file
    if let Some(bind) = args.bind {
        config.server.bind_address = bind;
    }

    ensure_db_dir(&config.database.url);

    let db =
        ballotbox_db::create_pool(&config.database.url, config.database.max_connections).await?;
    ballotbox_db::run_migrations(&db).await?;

    let state = ballotbox_core::AppState {
        db,
        config: ballotbox_core::AppConfig {
            session_ttl_seconds: config.auth.session_ttl_seconds,
            registration_enabled: config.auth.registration_enabled,
            listing_limit: config.server.listing_limit,
        },
    };

    let app = ballotbox_api::build_router()
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.server.bind_address).await?;
    tracing::info!("listening on http://{}", config.server.bind_address);
    tracing::info!("database: {}", config.database.url);
    if !config.auth.registration_enabled {
        tracing::info!("registration is disabled");
    }

    let shutdown_signal = async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutting down...");
    };

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal)
    .await?;

    Ok(())
}

/// Ensure the database parent directory exists before the pool opens it.
fn ensure_db_dir(database_url: &str) {
    if let Some(db_path) = database_url
        .strip_prefix("sqlite://")
        .and_then(|s| s.split('?').next())
    {
        if let Some(parent) = std::path::Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                let _ = std::fs::create_dir_all(parent);
            }
        }
    }
}
