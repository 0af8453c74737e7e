use anyhow::Context;
use dotenv::dotenv;
use std::sync::Arc;
use task_board::app_env::ServerConfig;
use task_board::{SharedData, build_router, db, logging, persistence};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenv().ok();
    let config = ServerConfig::from_env()?;

    let otel_exporters = match (&config.otel_span_export_url, &config.otel_metric_export_url) {
        (Some(span_url), Some(metric_url)) => Some(logging::init_exporters(span_url, metric_url)?),
        _ => None,
    };
    logging::setup_logging_and_tracing(logging::init_env_filter()?, otel_exporters);

    info!("Connecting to the database.");
    let db_pool = db::connect_sqlx(&config.database_url, config.db_max_connections).await?;
    db::run_migrations(&db_pool).await?;

    let shared_data = Arc::new(SharedData {
        ext_cxn: persistence::ExternalConnectivity::new(db_pool),
        session: config.session.clone(),
    });
    let router = logging::attach_tracing_http(build_router(shared_data));

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding to {}", config.listen_addr))?;
    info!("Starting server on {}.", config.listen_addr);
    axum::serve(listener, router)
        .await
        .context("serving HTTP requests")
}
