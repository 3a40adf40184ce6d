use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::routing::{get, post};
use axum::Router;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use sqlgen_core::agent::client::ModelClient;
use sqlgen_core::app_state::AppState;
use sqlgen_core::config::Config;
use sqlgen_core::db;
use sqlgen_core::external::workspace_loader::{StaticWorkspaceLoader, WorkspaceLoader};
use sqlgen_core::handlers;
use sqlgen_core::models::workspace::Workspace;
use sqlgen_core::session_cache::SessionCache;
use sqlgen_core::shutdown::{install_signal_handlers, ShutdownHandler};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::generate_sql::generate_sql,
        handlers::explain_sql::explain_sql,
        handlers::execute_query::execute_query,
        handlers::feedback::save_sql_feedback,
        handlers::health::health,
        handlers::health::ready,
    ),
    components(schemas(
        sqlgen_core::models::request::SqlRequest,
        handlers::explain_sql::ExplainSqlRequest,
        handlers::explain_sql::ExplainSqlResponse,
        handlers::execute_query::ExecuteQueryRequest,
        handlers::execute_query::ExecuteQueryResponse,
        handlers::execute_query::SortSpec,
        handlers::feedback::SaveSqlFeedbackRequest,
        handlers::feedback::SaveSqlFeedbackResponse,
        handlers::health::HealthResponse,
        handlers::health::ReadyResponse,
    )),
    tags(
        (name = "SQL Generation", description = "Natural-language to validated SQL pipeline"),
        (name = "Operations", description = "Liveness and readiness probes"),
    ),
)]
struct ApiDoc;

/// Loads the static workspace catalog the standalone binary serves from.
/// The admin surface that stores workspaces is explicitly out of scope
/// (spec §1); deployments that have one are expected to implement
/// `WorkspaceLoader` against it and link the library directly instead of
/// running this binary. Here we read a flat TOML file of workspaces so
/// the binary is runnable on its own.
fn load_static_workspaces(path: &str) -> Vec<Workspace> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<StaticWorkspaceFile>(&contents) {
            Ok(file) => file.workspace,
            Err(err) => {
                tracing::warn!(error = %err, path, "failed to parse workspaces file, starting with no workspaces");
                Vec::new()
            },
        },
        Err(_) => {
            tracing::warn!(path, "workspaces file not found, starting with no workspaces");
            Vec::new()
        },
    }
}

#[derive(serde::Deserialize, Default)]
struct StaticWorkspaceFile {
    #[serde(default)]
    workspace: Vec<Workspace>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let (config, config_source) = Config::load_with_source()?;

    let log_filter = tracing_subscriber::EnvFilter::new(&config.logging.level);
    let registry = tracing_subscriber::registry().with(log_filter);

    if let Some(log_file) = &config.logging.file {
        let log_path = std::path::Path::new(log_file);
        if let Some(parent) = log_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let log_dir = log_path.parent().and_then(|p| p.to_str()).unwrap_or("logs");
        let file_name = log_path.file_name().and_then(|n| n.to_str()).unwrap_or("sqlgen-core.log");
        let file_prefix = file_name.strip_suffix(".log").unwrap_or(file_name);

        let file_appender = tracing_appender::rolling::daily(log_dir, file_prefix);
        let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(non_blocking))
            .with(tracing_subscriber::fmt::layer())
            .init();
        std::mem::forget(_guard);
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("SQL Generation Core starting up");
    tracing::info!("Configuration loaded successfully");

    let pool = db::create_pool(&config.store.url).await?;
    tracing::info!("Local bookkeeping store ready");
    let request_log = Arc::new(db::RequestLogRepository::new(pool));

    let workspaces_path = std::env::var("SQLGEN_WORKSPACES_FILE").unwrap_or_else(|_| "workspaces.toml".to_string());
    let workspace_loader: Arc<dyn WorkspaceLoader> = Arc::new(StaticWorkspaceLoader::new(load_static_workspaces(&workspaces_path)));

    let session_cache = Arc::new(SessionCache::new(Duration::from_millis(config.pipeline.session_cache_ttl_ms)));
    session_cache.spawn_sweeper(Duration::from_secs(60));

    let model_client = ModelClient::new();
    let shutdown = ShutdownHandler::new();

    let config_swap = Arc::new(ArcSwap::from_pointee(config.clone()));
    if let Some(source_path) = config_source.clone() {
        let swap = config_swap.clone();
        install_signal_handlers(shutdown.clone(), move || {
            let current = swap.load();
            match current.reload(&source_path) {
                Ok(reloaded) => {
                    tracing::info!("configuration reloaded from {source_path}");
                    swap.store(Arc::new(reloaded));
                },
                Err(err) => tracing::error!(error = %err, "failed to reload configuration on SIGHUP"),
            }
        });
    } else {
        install_signal_handlers(shutdown.clone(), || {
            tracing::warn!("SIGHUP received but no config file source is known, ignoring");
        });
    }

    let app_state = Arc::new(AppState {
        config: config_swap,
        request_log,
        session_cache,
        workspace_loader,
        model_client,
        shutdown: shutdown.clone(),
    });

    let app = Router::new()
        .merge(SwaggerUi::new("/api-docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/generate-sql", post(handlers::generate_sql::generate_sql))
        .route("/explain-sql", post(handlers::explain_sql::explain_sql))
        .route("/execute-query", post(handlers::execute_query::execute_query))
        .route("/save-sql-feedback", post(handlers::feedback::save_sql_feedback))
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .with_state(app_state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::cors::CorsLayer::permissive());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on http://{}", addr);
    tracing::info!("API documentation available at http://{}/api-docs", addr);
    tracing::info!("SQL Generation Core is ready to serve requests");

    axum::serve(listener, app).with_graceful_shutdown(wait_for_shutdown(shutdown.clone())).await?;

    shutdown.wait_for_requests(Duration::from_secs(30)).await;
    tracing::info!("shutdown complete");

    Ok(())
}

/// Resolves once shutdown has been requested (SIGTERM/SIGINT), handing
/// control to axum's graceful-shutdown drain; in-flight `/generate-sql`
/// streams are then given up to 30s to finish via `wait_for_requests`.
async fn wait_for_shutdown(shutdown: ShutdownHandler) {
    loop {
        if shutdown.is_shutdown_requested() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}
