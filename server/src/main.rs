use std::sync::Arc;
use tokio::net::TcpListener;

use meetingmind_server::auth::jwt::load_or_generate_jwt_secret;
use meetingmind_server::config::{generate_config_template, Config};
use meetingmind_server::identity::sqlite::SqliteIdentityStore;
use meetingmind_server::rooms::RoomRegistry;
use meetingmind_server::{db, routes, state, ws};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("meetingmind_server=info"));
    if config.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().pretty().with_env_filter(env_filter).init();
    }

    tracing::info!(
        "MeetingMind server v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let db = db::init_db(&config.data_dir)?;
    tracing::info!("Identity database ready in {}", config.data_dir);

    // A configured secret is shared with the HTTP layer that issues tokens
    let jwt_secret = match &config.jwt_secret {
        Some(secret) if !secret.is_empty() => secret.as_bytes().to_vec(),
        _ => load_or_generate_jwt_secret(&config.data_dir)?,
    };

    let app_state = state::AppState {
        identity: Arc::new(SqliteIdentityStore::new(db)),
        jwt_secret,
        rooms: RoomRegistry::new(),
        sessions: ws::new_session_directory(),
        keepalive: config.keepalive,
        captions: config.captions,
    };

    let app = routes::build_router(app_state);

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
