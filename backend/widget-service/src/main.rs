use actix_web::{web, App, HttpServer};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use widget_service::handlers::{resolve_page_view, WidgetHandlerState};
use widget_service::services::cdn::{FeedLoader, ManifestSource, TopItemsSource};
use widget_service::services::sponsored::{HttpSponsoredSource, SponsoredSource};
use widget_service::services::{CdnClient, ResolutionService, UserAgentClassifier};
use widget_service::Config;

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Structured logging with JSON format
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_line_number(true)
                .with_file(true)
                .with_target(true),
        )
        .init();

    // Load configuration
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Configuration loading failed: {:#}", e);
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting widget-service v{}", env!("CARGO_PKG_VERSION"));
    info!("Environment: {}", config.app.env);

    let cdn = match CdnClient::new(
        &config.cdn.base_url,
        Duration::from_secs(config.cdn.request_timeout_secs),
    ) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            tracing::error!("CDN client initialization failed: {}", e);
            eprintln!("ERROR: Failed to build CDN client: {}", e);
            std::process::exit(1);
        }
    };

    let sponsored: Option<Arc<dyn SponsoredSource>> = match &config.sponsored.endpoint {
        Some(endpoint) => Some(Arc::new(HttpSponsoredSource::new(endpoint.clone()))),
        None => {
            info!("Sponsored content disabled by configuration");
            None
        }
    };

    let resolution = ResolutionService::new(
        &config,
        cdn.clone() as Arc<dyn ManifestSource>,
        cdn.clone() as Arc<dyn FeedLoader>,
        cdn.clone() as Arc<dyn TopItemsSource>,
        sponsored,
    );

    let state = web::Data::new(WidgetHandlerState {
        resolution,
        bots: Arc::new(UserAgentClassifier::default()),
    });

    info!("Widget service listening on 0.0.0.0:{}", config.app.port);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .route("/health", web::get().to(|| async { "OK" }))
            .service(resolve_page_view)
    })
    .bind(format!("0.0.0.0:{}", config.app.port))?
    .run()
    .await
}
