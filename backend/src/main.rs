//! Access Console - Main Entry Point

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, Method};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use access_console_backend::{
    api,
    config::Config,
    error::{AppError, Result},
    storage, telemetry,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    telemetry::init_tracing(&config.log_level);
    tracing::info!(config = ?config, "Starting Access Console");

    let store = storage::from_config(&config).await?;
    let state = Arc::new(api::AppState::new(config.clone(), store));

    // First boot: create the SuperAdmin account
    let admin_password = std::env::var("ADMIN_PASSWORD").ok();
    if let Some(generated) = state.auth.provision_admin(admin_password).await? {
        tracing::warn!(
            "\n\
            ===========================================================\n\
            \n\
              Initial admin user created.\n\
            \n\
              Username:  admin\n\
              Password:  {}\n\
            \n\
              Change it after the first login (POST /api/v1/auth/password).\n\
            \n\
            ===========================================================",
            generated
        );
    }

    let app = Router::new()
        .merge(api::routes::create_router(state))
        .layer(cors_layer()?)
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = config.bind_address.parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Same-origin in production; `CORS_ORIGINS` with credentials in development
fn cors_layer() -> Result<CorsLayer> {
    if std::env::var("ENVIRONMENT").unwrap_or_default() != "development" {
        return Ok(CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any));
    }

    let origins = std::env::var("CORS_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3000".into())
        .split(',')
        .map(|s| {
            s.trim()
                .parse()
                .map_err(|e| AppError::Config(format!("Invalid CORS origin '{}': {}", s, e)))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::COOKIE,
        ])
        .allow_credentials(true))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received");
}
