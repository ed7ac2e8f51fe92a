//! Maia Test Dashboard
//!
//! Read-only HTTP API over a directory of Maia test reports, plus the derived
//! views the dashboard frontend renders (run overview, test metrics, session
//! timelines and checks).

pub mod client;
pub mod overview;
pub mod routes;
pub mod selection;
pub mod source;
pub mod store;

use axum::Router;
use source::ReportSource;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Where reports are read from
    pub source: Arc<dyn ReportSource>,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Port to listen on
    pub port: u16,
    /// Address to bind
    pub bind: IpAddr,
    /// Path to static files (frontend build output)
    pub static_dir: Option<PathBuf>,
    /// Reports root, one subdirectory per run
    pub reports_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            bind: IpAddr::V4(Ipv4Addr::LOCALHOST),
            static_dir: None,
            reports_dir: PathBuf::from("test_reports"),
        }
    }
}

/// Create the application router reading from `config.reports_dir`
pub fn create_app(config: &Config) -> Router {
    let state = AppState {
        source: Arc::new(store::FsReportStore::new(config.reports_dir.clone())),
    };

    create_app_with_state(config, state)
}

/// Create the application router with provided state (for dependency injection)
pub fn create_app_with_state(config: &Config, state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = Router::new()
        .merge(routes::api_routes(state))
        .layer(cors);

    // Serve the frontend build, falling back to index.html for client-side routes
    if let Some(ref static_dir) = config.static_dir
        && static_dir.exists()
    {
        app = app.fallback_service(
            tower_http::services::ServeDir::new(static_dir).not_found_service(
                tower_http::services::ServeFile::new(static_dir.join("index.html")),
            ),
        );
    }

    app
}

/// Start the server
pub async fn serve(config: Config) -> Result<(), std::io::Error> {
    if !config.reports_dir.is_dir() {
        tracing::warn!(
            "Reports directory {:?} does not exist; run listing will fail until it is created",
            config.reports_dir
        );
    }

    let app = create_app(&config);
    let addr = SocketAddr::new(config.bind, config.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        "Serving reports from {:?} on http://{}",
        config.reports_dir,
        listener.local_addr()?
    );

    axum::serve(listener, app).await
}
