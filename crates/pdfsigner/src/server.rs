use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    Router,
    body::Bytes,
    extract::{Request, State},
    http::{Method, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{any, get},
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::error::{SignerError, TEXT_CONTENT_TYPE};
use crate::orchestrator::SigningOrchestrator;
use crate::resolver::{SignRequest, SignatureDefaults, resolve};

pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Server-wide handles, created once at startup and shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: SigningOrchestrator,
    pub defaults: Arc<SignatureDefaults>,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(orchestrator: SigningOrchestrator, defaults: SignatureDefaults) -> Self {
        Self {
            orchestrator,
            defaults: Arc::new(defaults),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Decodes a request body and signs the document it names. Blocking.
    fn sign(&self, body: &[u8]) -> Result<(), SignerError> {
        let request = SignRequest::from_json(body)?;
        let params = resolve(&request, &self.defaults)?;
        self.orchestrator.sign_one(&params)?;
        info!(
            src = %request.input_file,
            output = %request.output_file,
            "Signed file"
        );
        Ok(())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/healthcheck", get(|| async move { (StatusCode::OK, "Ok").into_response() }))
        .route("/sign", any(sign_handler))
        .with_state(state)
}

pub async fn run(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "Server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving HTTP")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn sign_handler(State(state): State<AppState>, request: Request) -> Response {
    if request.method() != Method::POST {
        return SignerError::DispatchRejected.into_response();
    }

    let body: Bytes = match axum::body::to_bytes(request.into_body(), state.max_body_bytes).await {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "Error reading request body");
            return SignerError::ParseFailed(format!("Error reading request: {e}")).into_response();
        }
    };

    match tokio::task::spawn_blocking(move || state.sign(&body)).await {
        Ok(Ok(())) => (StatusCode::OK, [(header::CONTENT_TYPE, TEXT_CONTENT_TYPE)]).into_response(),
        Ok(Err(e)) => {
            error!(error = %e, "Error processing request");
            e.into_response()
        }
        Err(e) => {
            error!(error = %e, "Signing worker panicked");
            SignerError::SigningFailed(e.into()).into_response()
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
