use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::HandlerError;
use crate::events::Delivery;
use crate::handler::{Outcome, ThumbnailHandler};

pub const WEBHOOK_PATH: &str = "/runtime/webhooks/EventGrid";

#[derive(Clone)]
pub struct AppState {
    handler: Arc<ThumbnailHandler>,
}

pub fn router(handler: Arc<ThumbnailHandler>) -> Router {
    Router::new()
        .route(WEBHOOK_PATH, post(receive_events))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { handler })
}

pub async fn serve(bind: &str, handler: Arc<ThumbnailHandler>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!(addr = %listener.local_addr()?, path = WEBHOOK_PATH, "listening for storage events");
    axum::serve(listener, router(handler))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ValidationResponse {
    validation_response: String,
}

#[derive(Serialize)]
struct EventResult {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<Outcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
}

#[derive(Serialize)]
struct DeliveryResponse {
    results: Vec<EventResult>,
}

async fn receive_events(State(st): State<AppState>, body: String) -> Result<axum::response::Response, ApiErr> {
    let delivery: Delivery = serde_json::from_str(&body)
        .map_err(|e| ApiErr::bad_request(format!("request body is not an Event Grid delivery: {e}")))?;
    let events = delivery.into_events();

    if let Some(code) = events.iter().find_map(|e| e.validation_code()) {
        info!("answering subscription validation handshake");
        return Ok(Json(ValidationResponse { validation_response: code }).into_response());
    }

    // Each event is its own invocation; a failure does not stop the rest of the delivery.
    let mut results = Vec::with_capacity(events.len());
    let mut failed = false;
    for event in &events {
        let result = match st.handler.handle(event).await {
            Ok(outcome) => EventResult { id: event.id.clone(), outcome: Some(outcome), error: None, kind: None },
            Err(e) => {
                failed = true;
                failure(&event.id, &e)
            }
        };
        results.push(result);
    }

    let status = if failed { StatusCode::INTERNAL_SERVER_ERROR } else { StatusCode::OK };
    Ok((status, Json(DeliveryResponse { results })).into_response())
}

fn failure(id: &str, e: &HandlerError) -> EventResult {
    EventResult { id: id.to_string(), outcome: None, error: Some(e.to_string()), kind: Some(e.kind()) }
}

#[derive(Debug)]
struct ApiErr {
    status: StatusCode,
    code: String,
    message: String,
}

impl ApiErr {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request".to_string(),
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiErr {
    fn into_response(self) -> axum::response::Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: String,
            code: String,
        }
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
                code: self.code,
            }),
        )
            .into_response()
    }
}
