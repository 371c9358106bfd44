use std::sync::{Arc, Mutex};
use std::time::Duration;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use petspa::config::AppConfig;
use petspa::db;
use petspa::handlers;
use petspa::services::api::http::HttpSpaApi;
use petspa::services::api::SpaApi;
use petspa::state::AppState;
use petspa::store::{SessionStore, SqliteSessionStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;
    let store: Arc<dyn SessionStore> = Arc::new(SqliteSessionStore::new(Arc::new(Mutex::new(conn))));

    tracing::info!("using spa backend at {}", config.api_base_url);
    let api: Arc<dyn SpaApi> = Arc::new(
        HttpSpaApi::new(config.api_base_url.clone(), config.api_token.clone())
            .with_timeout(Duration::from_secs(30))?,
    );

    let state = Arc::new(AppState::new(config.clone(), api, store));
    state.spawn_sweeper();

    let app = handlers::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
