//! Clippy widget server
//!
//! Runs the widget core against the answer service and serves the renderer
//! bridge.

use clippy_widget::api::{create_router, AppState};
use clippy_widget::config::WidgetConfig;
use clippy_widget::runtime;
use clippy_widget::state_machine::WidgetContext;
use clippy_widget::transport::{HttpTransport, WidgetDataSource};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "clippy_widget=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = WidgetConfig::from_env();
    tracing::info!(
        api_base = %config.api_base,
        project_id = ?config.project_id,
        citation_key = %config.citation_key,
        "Widget configuration loaded"
    );

    let transport = Arc::new(HttpTransport::new(&config));
    let widget = runtime::spawn(
        WidgetContext::new(config.citation_key),
        config.theme,
        transport.clone(),
        Some(transport.clone() as Arc<dyn WidgetDataSource>),
    );

    let state = AppState::new(widget, transport);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Clippy widget server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
