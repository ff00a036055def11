use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use respawn_bot::api::{self, AppState};
use respawn_bot::bot::{Bot, BotSettings};
use respawn_bot::catalog;
use respawn_bot::config::Config;
use respawn_bot::db::Database;
use respawn_bot::messenger::{LineMessenger, LogMessenger, MessageSender};
use respawn_bot::metrics;
use respawn_bot::render::ColorMap;
use respawn_bot::scanner::{spawn_reminder_scanner, ScanSettings};
use respawn_bot::store::Store;

fn load_colors(config: &Config) -> ColorMap {
    let raw = match std::fs::read_to_string(&config.color_map_path) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(path = %config.color_map_path.display(), "No color map loaded: {e}");
            return ColorMap::default();
        }
    };
    ColorMap::from_json(&raw).unwrap_or_else(|e| {
        tracing::warn!(path = %config.color_map_path.display(), "Invalid color map: {e}");
        ColorMap::default()
    })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    metrics::register_metrics();

    let config = Config::load();

    let db = Database::new(&config.database_url)
        .await
        .expect("Failed to initialize database");
    let store: Arc<dyn Store> = Arc::new(db);

    match catalog::load_catalog(&config.catalog_path) {
        Ok(entries) => {
            if let Err(e) = catalog::reconcile(store.as_ref(), &entries).await {
                tracing::error!("Catalog import failed: {e}");
            }
        }
        Err(e) => {
            tracing::error!(path = %config.catalog_path.display(), "Catalog not loaded: {e}");
        }
    }

    let messenger: Arc<dyn MessageSender> = match &config.line_access_token {
        Some(token) => Arc::new(LineMessenger::new(token.clone())),
        None => {
            tracing::warn!("LINE_CHANNEL_ACCESS_TOKEN not set, messages will only be logged");
            Arc::new(LogMessenger)
        }
    };
    if config.line_channel_secret.is_none() {
        tracing::warn!("LINE_CHANNEL_SECRET not set, webhook signatures will not be checked");
    }

    spawn_reminder_scanner(
        store.clone(),
        messenger.clone(),
        ScanSettings {
            tick: std::time::Duration::from_secs(config.scan_interval_seconds),
            lead_window: chrono::Duration::minutes(config.reminder_lead_minutes),
            time_zone: config.time_zone,
        },
    );

    let bot = Bot::new(
        store,
        BotSettings {
            time_zone: config.time_zone,
            list_as_card: config.list_as_card,
            colors: load_colors(&config),
        },
    );

    let app = api::router(AppState {
        bot: Arc::new(bot),
        messenger,
        channel_secret: config.line_channel_secret.clone(),
    })
    .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {addr}: {e}"));

    tracing::info!(time_zone = %config.time_zone, "Respawn bot listening on {addr}");
    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
