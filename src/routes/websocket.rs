use axum::{
    Router,
    extract::{Path, State, WebSocketUpgrade},
    response::IntoResponse,
    routing::get,
};

use crate::{error::AppError, services::websocket_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/rooms/{code}/ws",
    tag = "players",
    params(("code" = String, Path, description = "Room code, case-insensitive")),
    responses(
        (status = 101, description = "Switching protocols to WebSocket"),
        (status = 404, description = "Unknown room")
    )
)]
/// Upgrade the HTTP connection into a player WebSocket session.
pub async fn ws_handler(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    let handle = state
        .registry()
        .resolve(&code)
        .map_err(crate::error::ServiceError::from)?;
    Ok(ws.on_upgrade(move |socket| websocket_service::handle_socket(handle, socket)))
}

/// Configure the WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/rooms/{code}/ws", get(ws_handler))
}
