use std::convert::Infallible;

use axum::{
    Router,
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
};
use futures::Stream;
use tracing::info;

use crate::{error::AppError, services::sse_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/rooms/{code}/events",
    tag = "sse",
    params(("code" = String, Path, description = "Room code, case-insensitive")),
    responses(
        (status = 200, description = "Room event stream", content_type = "text/event-stream", body = String),
        (status = 404, description = "Unknown room")
    )
)]
/// Stream a room's broadcasts to a host display or spectator.
pub async fn room_stream(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let (handle, receiver, handshake) = sse_service::subscribe_room(&state, &code).await?;
    info!(code = %handle.code(), "new room SSE connection");
    Ok(sse_service::to_sse_stream(handle, receiver, handshake))
}

/// Configure the SSE endpoints.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/rooms/{code}/events", get(room_stream))
}
