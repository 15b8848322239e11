// src/main.rs

use axum::{Router, extract::DefaultBodyLimit, routing::{get, post}};
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marketplace_frontend::config::AppConfig;
use marketplace_frontend::gateway::Gateway;
use marketplace_frontend::handlers::*;
use marketplace_frontend::state::AppState;

#[tokio::main]
async fn main() {
    dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marketplace_frontend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting marketplace front end...");

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("Invalid configuration: {}", err);
            std::process::exit(1);
        }
    };

    let gateway = match Gateway::connect(&config).await {
        Ok(gateway) => gateway,
        Err(err) => {
            tracing::error!("Could not connect to the backend: {:?}", err);
            std::process::exit(1);
        }
    };

    let app_state = AppState::new(gateway, config.client_idle);

    let app = Router::new()
        .route("/", get(index))
        .route("/ui/auth/login", post(open_login))
        .route("/ui/auth/register", post(open_register))
        .route("/ui/auth/close", post(close_auth))
        .route("/ui/auth/submit", post(submit_auth))
        .route("/ui/logout", post(logout))
        .route("/ui/listings/new", post(new_listing))
        .route("/ui/listings/close", post(close_listing_form))
        .route("/ui/listings/save", post(save_listing))
        .route("/ui/listings/{id}/edit", post(edit_listing))
        .route("/ui/listings/{id}/delete", post(delete_listing))
        .route("/ui/deletion/confirm", post(confirm_deletion))
        .route("/ui/deletion/cancel", post(cancel_deletion))
        .route("/ui/search", post(search))
        .route("/ui/category-filter", post(filter_category))
        .route("/ui/filters/clear", post(clear_filters))
        .route("/ui/admin/open", post(open_admin))
        .route("/ui/admin/close", post(close_admin))
        .route("/ui/categories", post(add_category))
        .route("/ui/categories/{id}/delete", post(delete_category))
        .route("/ui/notice/dismiss", post(dismiss_notice))
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024))
        .with_state(app_state);

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = match TcpListener::bind(config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Cannot bind {}: {}", config.bind_addr, e);
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app.into_make_service()).await {
        tracing::error!("Server error: {}", e);
    }
}
