use crate::config::Config;
use crate::gate::Gate;
use crate::http_server::{middleware, routes};
use crate::utils::shutdown::shutdown_signal;
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

pub struct HttpServer {
    config: Arc<Config>,
    gate: Arc<Gate>,
}

impl HttpServer {
    pub fn new(config: Arc<Config>, gate: Arc<Gate>) -> Self {
        Self { config, gate }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let app = create_router(self.gate.clone());

        let addr = SocketAddr::from((
            self.config.server.host.parse::<std::net::IpAddr>()?,
            self.config.server.port,
        ));

        info!("Starting HTTP server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("HTTP server stopped");
        Ok(())
    }
}

/// Every route sits behind the gate; the authorization table decides which
/// of them are reachable. Preflights are answered by the CORS layer before
/// admission runs.
pub fn create_router(gate: Arc<Gate>) -> Router {
    let mut router = Router::new()
        .route("/health", get(routes::health))
        .route("/auth/login", post(routes::login))
        .route("/auth/logout", post(routes::logout))
        .route("/me", get(routes::me))
        .fallback(routes::not_found)
        .layer(from_fn_with_state(gate.clone(), middleware::gate_middleware));

    if let Some(cors) = gate.cors() {
        router = router
            .layer(cors.layer())
            .layer(from_fn_with_state(gate.clone(), middleware::cors_guard));
    }

    router
        .layer(from_fn_with_state(gate.clone(), middleware::security_headers))
        .layer(TraceLayer::new_for_http())
        .with_state(gate)
}
