//! HTTP surface for the turn API. Transport only; all orchestration logic
//! lives in depot-core.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use eyre::Result;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use depot_core::app::{Orchestrator, prompts};
use depot_core::session::ThreadId;

#[derive(Debug, Deserialize)]
struct ChatRequest {
    message: String,
    #[serde(default = "default_thread_id")]
    thread_id: String,
    #[serde(default = "default_page")]
    current_page: String,
}

fn default_thread_id() -> String {
    "session_1".to_string()
}

fn default_page() -> String {
    "busDashboard".to_string()
}

#[derive(Debug, Serialize)]
struct ChatResponse {
    response: String,
    awaiting_confirmation: bool,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

pub async fn serve(orchestrator: Arc<Orchestrator>, addr: SocketAddr) -> Result<()> {
    let router = Router::new()
        .route("/api/chat", post(chat))
        .route("/api/health", get(health))
        .with_state(orchestrator);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Depot backend listening");
    axum::serve(listener, router).await?;
    Ok(())
}

async fn chat(
    State(orchestrator): State<Arc<Orchestrator>>,
    Json(request): Json<ChatRequest>,
) -> Json<ChatResponse> {
    let thread_id = ThreadId::new(request.thread_id);
    match orchestrator
        .submit_turn(thread_id, &request.message, &request.current_page)
        .await
    {
        Ok(outcome) => Json(ChatResponse {
            response: outcome.reply,
            awaiting_confirmation: outcome.awaiting_confirmation,
        }),
        // Turn-level failures (gateway outage, loop ceiling, checkpoint
        // trouble) left no partial state behind; the caller may retry.
        Err(e) => {
            error!(error = %e, "Turn failed");
            Json(ChatResponse {
                response: prompts::DEGRADED_REPLY.to_string(),
                awaiting_confirmation: false,
            })
        }
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}
