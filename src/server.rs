pub mod handlers;
pub mod session;

use crate::app::Inventory;
use axum::{
    http::Method,
    routing::{get, post},
    Router,
};
use hyper::Server;
use session::AuthSettings;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub inventory: Inventory,
    pub auth: Arc<AuthSettings>,
}

impl AppState {
    pub fn new(inventory: Inventory, auth: AuthSettings) -> Self {
        Self {
            inventory,
            auth: Arc::new(auth),
        }
    }
}

/// Create the HTTP router. `images_dir` is served under `/images` when the
/// local image backend is in use.
pub fn create_server(state: AppState, images_dir: Option<PathBuf>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    let mut router = Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .route("/login", get(handlers::login_page).post(handlers::login))
        .route("/logout", get(handlers::logout))
        .route("/", get(handlers::index))
        .route("/enquiry", post(handlers::enquiry))
        .route("/submit_enquiry", post(handlers::submit_enquiry))
        .route("/all_products", get(handlers::all_products))
        .route("/item_admin", get(handlers::new_item))
        .route("/item_admin/:code", get(handlers::edit_item))
        .route("/submit_form", post(handlers::submit_form));

    if let Some(dir) = images_dir {
        router = router.nest_service("/images", ServeDir::new(dir));
    }

    router
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
}

/// Start the HTTP server on the specified port; stops on Ctrl-C
pub async fn start_server(app: Router, port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!("HTTP server running on http://localhost:{}", port);
    info!("Health check: http://localhost:{}/health", port);

    Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    Ok(())
}
