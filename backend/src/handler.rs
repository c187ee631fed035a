//! HTTP surface of the rendezvous service.
//!
//! Path parameters are validated before any room state is touched. The
//! join and submit handlers stay pending until the barrier releases. If the
//! connection goes away first, the handler future is dropped and the
//! service withdraws the participant.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::commitment::Commitment;
use crate::error::RendezvousError;
use crate::protocol::{Health, HEALTH_PATH, JOIN_PATH, NEW_ROOM_PATH, SUBMIT_PATH};
use crate::room_id::RoomId;
use crate::service::RendezvousService;

impl IntoResponse for RendezvousError {
    fn into_response(self) -> Response {
        let status = match &self {
            RendezvousError::NotFound(_) => StatusCode::NOT_FOUND,
            RendezvousError::NotReady(_) => StatusCode::IM_A_TEAPOT,
            RendezvousError::Timeout => StatusCode::SERVICE_UNAVAILABLE,
            RendezvousError::Malformed(_) => StatusCode::BAD_REQUEST,
            RendezvousError::Internal(msg) => {
                error!("Internal error: {}", msg);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.to_string()).into_response()
    }
}

/// Build the router serving the rendezvous endpoints.
pub fn router(service: Arc<RendezvousService>) -> Router {
    Router::new()
        .route(NEW_ROOM_PATH, get(create_room))
        .route(&format!("{JOIN_PATH}/{{room_id}}"), get(join))
        .route(&format!("{SUBMIT_PATH}/{{room_id}}/{{commitment}}"), get(submit))
        .route(HEALTH_PATH, get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

async fn create_room(
    State(service): State<Arc<RendezvousService>>,
) -> Result<String, RendezvousError> {
    service.create_room().map(|room_id| room_id.to_string())
}

async fn join(
    State(service): State<Arc<RendezvousService>>,
    Path(room_id): Path<String>,
) -> Result<StatusCode, RendezvousError> {
    let room_id = RoomId::parse(&room_id)?;
    service.join(&room_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn submit(
    State(service): State<Arc<RendezvousService>>,
    Path((room_id, commitment)): Path<(String, String)>,
) -> Result<&'static str, RendezvousError> {
    let room_id = RoomId::parse(&room_id)?;
    let commitment = Commitment::parse(&commitment)?;
    let verdict = service.submit(&room_id, commitment).await?;
    Ok(verdict.as_wire())
}

async fn health(State(service): State<Arc<RendezvousService>>) -> Json<Health> {
    Json(Health {
        status: "ok".to_owned(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
        live_rooms: service.live_rooms(),
    })
}
