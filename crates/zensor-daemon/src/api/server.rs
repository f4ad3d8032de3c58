use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use zensor_types::{ZensorError, ZensorResult};

use super::handlers;
use crate::config::ApiConfig;
use crate::group::GroupRegistry;
use crate::prover::ProvingBackend;
use crate::verification::VerificationService;

/// Shared handler state. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<VerificationService>,
    pub registry: Arc<GroupRegistry>,
    /// Backend behind `POST /api/prove`; the route is absent when `None`.
    pub prover: Option<Arc<dyn ProvingBackend>>,
    pub prover_backend: &'static str,
    pub default_group: String,
    pub allow_registration: bool,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(verifier: Arc<VerificationService>, default_group: impl Into<String>) -> Self {
        Self {
            registry: verifier.registry().clone(),
            verifier,
            prover: None,
            prover_backend: "none",
            default_group: default_group.into(),
            allow_registration: true,
            started_at: Instant::now(),
        }
    }

    pub fn with_prover_backend(mut self, name: &'static str) -> Self {
        self.prover_backend = name;
        self
    }

    pub fn serving_proofs(mut self, backend: Arc<dyn ProvingBackend>) -> Self {
        self.prover = Some(backend);
        self
    }

    pub fn with_registration(mut self, allowed: bool) -> Self {
        self.allow_registration = allowed;
        self
    }
}

/// Routes without the transport layers.
pub fn router(state: AppState) -> Router {
    let mut api = Router::new()
        .route("/api/send-feedback", post(handlers::send_feedback))
        .route("/api/get-feedback", get(handlers::get_feedback))
        .route("/api/groups/:group_id", get(handlers::get_group))
        .route(
            "/api/groups/:group_id/signals",
            get(handlers::list_group_signals).post(handlers::submit_group_signal),
        )
        .route("/api/groups/:group_id/members", post(handlers::add_member))
        .route("/api/groups/:group_id/sync", post(handlers::sync_group))
        .route("/api/status", get(handlers::status))
        .route("/health", get(handlers::health));

    if state.prover.is_some() {
        api = api.route("/api/prove", post(handlers::prove));
    }

    api.with_state(state)
}

pub struct ApiServer {
    addr: SocketAddr,
    config: ApiConfig,
    state: AppState,
    running: Arc<RwLock<bool>>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ApiServer {
    pub fn new(addr: SocketAddr, config: ApiConfig, state: AppState) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            addr,
            config,
            state,
            running: Arc::new(RwLock::new(false)),
            shutdown,
            task: Mutex::new(None),
        }
    }

    fn app(&self) -> Router {
        let mut app = router(self.state.clone())
            .layer(RequestBodyLimitLayer::new(self.config.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(
                self.config.request_timeout_secs,
            )))
            .layer(TraceLayer::new_for_http());

        if self.config.cors_enabled {
            app = app.layer(CorsLayer::permissive());
        }
        app
    }

    /// Binds and serves in the background. Returns the bound address, which
    /// differs from the configured one when port 0 was requested.
    pub async fn start(&self) -> ZensorResult<SocketAddr> {
        if *self.running.read().await {
            return Err(ZensorError::Internal("API server already running".into()));
        }

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .map_err(|e| ZensorError::Network(format!("Failed to bind API server: {}", e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ZensorError::Network(format!("Failed to read bound address: {}", e)))?;

        info!("API server listening on http://{}", local_addr);
        *self.running.write().await = true;

        let app = self.app();
        let running = self.running.clone();
        let mut shutdown = self.shutdown.subscribe();

        let task = tokio::spawn(async move {
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    while !*shutdown.borrow_and_update() {
                        if shutdown.changed().await.is_err() {
                            break;
                        }
                    }
                })
                .await;

            if let Err(e) = served {
                error!("API server error: {}", e);
            }
            *running.write().await = false;
        });
        *self.task.lock().await = Some(task);

        Ok(local_addr)
    }

    /// Signals shutdown and waits for open connections to drain.
    pub async fn stop(&self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.lock().await.take() {
            if let Err(e) = task.await {
                error!("API server task failed: {}", e);
            }
        }
        info!("API server stopped");
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }
}
