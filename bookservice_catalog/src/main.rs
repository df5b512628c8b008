use std::sync::Arc;

use actix_web::{App, HttpServer};
use anyhow::Context;
use opentelemetry::global;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::runtime::TokioCurrentThread;
use paperclip::actix::{web, OpenApiExt};
use tracing_actix_web::TracingLogger;
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Registry};

use bookservice_catalog::app_config::{config_app, json_config, query_config};
use bookservice_catalog::books_repository::{
    BookRepository, InMemoryBookRepository, PostgresBooksRepository,
};
use bookservice_catalog::catalog_service::BookCatalogService;
use bookservice_catalog::settings::Settings;

const APP_NAME: &str = "bookservice_catalog";

// Based on https://github.com/LukeMathWalker/tracing-actix-web/blob/main/examples/opentelemetry/src/main.rs#L15
fn init_telemetry(settings: &Settings) -> anyhow::Result<()> {
    // Spans are exported to Jaeger in batch when enabled
    let telemetry = if settings.jaeger_enabled {
        global::set_text_map_propagator(TraceContextPropagator::new());
        #[allow(deprecated)]
        let tracer = opentelemetry_jaeger::new_agent_pipeline()
            .with_service_name(APP_NAME)
            .install_batch(TokioCurrentThread)
            .context("Failed to install OpenTelemetry tracer")?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    // Filter based on level - trace, debug, info, warn, error
    // Tunable via `RUST_LOG` env variable
    let env_filter = EnvFilter::try_from_default_env().unwrap_or(EnvFilter::new("info"));
    let formatting_layer = BunyanFormattingLayer::new(APP_NAME.into(), std::io::stdout);
    let subscriber = Registry::default()
        .with(env_filter)
        .with(telemetry)
        .with(JsonStorageLayer)
        .with(formatting_layer);
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install `tracing` subscriber")
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    init_telemetry(&settings)?;

    let books_repository: Arc<dyn BookRepository> = if settings.use_in_memory_db {
        tracing::info!("Using in-memory book storage");
        Arc::new(InMemoryBookRepository::default())
    } else {
        Arc::new(
            PostgresBooksRepository::init(settings.postgres_config())
                .await
                .context("Failed to init postgres")?,
        )
    };
    let catalog = Arc::new(BookCatalogService::new(books_repository));

    tracing::info!(
        "Starting HTTP server at http://{}:{}",
        settings.bind_address,
        settings.port
    );

    HttpServer::new(move || {
        App::new()
            .wrap_api()
            .app_data(web::Data::from(catalog.clone()))
            .app_data(json_config())
            .app_data(query_config())
            .wrap(TracingLogger::default())
            .configure(config_app)
            .with_json_spec_at("/apispec/v2")
            .build()
    })
    .bind((settings.bind_address.as_str(), settings.port))?
    .run()
    .await?;

    Ok(())
}
