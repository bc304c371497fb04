use axum::{
    Json, Router,
    extract::{Path, State},
    http::HeaderMap,
    routing::{delete, get, post},
};
use axum_valid::Valid;

use crate::{
    dto::{
        common::RoomSummaryDto,
        room::{
            CreateRoomRequest, CreateRoomResponse, HostActionResponse, LeaderboardResponse,
            RoomPlayerPath,
        },
    },
    error::AppError,
    services::room_service,
    state::{SharedState, session::HostCommand},
};

const HOST_TOKEN_HEADER: &str = "x-host-token";

/// Room lifecycle endpoints: creation, projections and host controls.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms", post(create_room))
        .route("/rooms/{code}", get(get_room))
        .route("/rooms/{code}/leaderboard", get(get_leaderboard))
        .route("/rooms/{code}/start", post(start_room))
        .route("/rooms/{code}/pause", post(pause_room))
        .route("/rooms/{code}/resume", post(resume_room))
        .route("/rooms/{code}/end", post(end_room))
        .route("/rooms/{code}/players/{player_id}", delete(remove_player))
}

/// Open a room and start its session.
#[utoipa::path(
    post,
    path = "/rooms",
    tag = "rooms",
    request_body = CreateRoomRequest,
    responses(
        (status = 200, description = "Room created", body = CreateRoomResponse),
        (status = 400, description = "Invalid room definition")
    )
)]
pub async fn create_room(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateRoomRequest>>,
) -> Result<Json<CreateRoomResponse>, AppError> {
    Ok(Json(room_service::create_room(&state, payload).await?))
}

#[utoipa::path(
    get,
    path = "/rooms/{code}",
    tag = "rooms",
    params(("code" = String, Path, description = "Room code, case-insensitive")),
    responses(
        (status = 200, description = "Room summary", body = RoomSummaryDto),
        (status = 404, description = "Unknown room")
    )
)]
/// Return phase, round index and players of a room.
pub async fn get_room(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<RoomSummaryDto>, AppError> {
    Ok(Json(room_service::get_room(&state, &code).await?))
}

#[utoipa::path(
    get,
    path = "/rooms/{code}/leaderboard",
    tag = "rooms",
    params(("code" = String, Path, description = "Room code, case-insensitive")),
    responses(
        (status = 200, description = "Current leaderboard", body = LeaderboardResponse),
        (status = 404, description = "Unknown room")
    )
)]
/// Return the current ranking of a room.
pub async fn get_leaderboard(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    Ok(Json(room_service::get_leaderboard(&state, &code).await?))
}

#[utoipa::path(
    post,
    path = "/rooms/{code}/start",
    tag = "host",
    params(
        ("code" = String, Path, description = "Room code"),
        ("X-Host-Token" = String, Header, description = "Host token returned at creation")
    ),
    responses(
        (status = 200, description = "Countdown started", body = HostActionResponse),
        (status = 409, description = "Room cannot start now")
    )
)]
/// Leave the waiting room and start the countdown.
pub async fn start_room(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    headers: HeaderMap,
) -> Result<Json<HostActionResponse>, AppError> {
    host_control(&state, &code, &headers, HostCommand::Start).await
}

#[utoipa::path(
    post,
    path = "/rooms/{code}/pause",
    tag = "host",
    params(
        ("code" = String, Path, description = "Room code"),
        ("X-Host-Token" = String, Header, description = "Host token returned at creation")
    ),
    responses((status = 200, description = "Room paused", body = HostActionResponse))
)]
/// Suspend the current round or reveal window.
pub async fn pause_room(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    headers: HeaderMap,
) -> Result<Json<HostActionResponse>, AppError> {
    host_control(&state, &code, &headers, HostCommand::Pause).await
}

#[utoipa::path(
    post,
    path = "/rooms/{code}/resume",
    tag = "host",
    params(
        ("code" = String, Path, description = "Room code"),
        ("X-Host-Token" = String, Header, description = "Host token returned at creation")
    ),
    responses((status = 200, description = "Room resumed", body = HostActionResponse))
)]
/// Resume a paused room with the time it had left.
pub async fn resume_room(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    headers: HeaderMap,
) -> Result<Json<HostActionResponse>, AppError> {
    host_control(&state, &code, &headers, HostCommand::Resume).await
}

#[utoipa::path(
    post,
    path = "/rooms/{code}/end",
    tag = "host",
    params(
        ("code" = String, Path, description = "Room code"),
        ("X-Host-Token" = String, Header, description = "Host token returned at creation")
    ),
    responses((status = 200, description = "Room finished", body = HostActionResponse))
)]
/// Terminate the room immediately.
pub async fn end_room(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    headers: HeaderMap,
) -> Result<Json<HostActionResponse>, AppError> {
    host_control(&state, &code, &headers, HostCommand::ForceEnd).await
}

#[utoipa::path(
    delete,
    path = "/rooms/{code}/players/{player_id}",
    tag = "host",
    params(
        ("code" = String, Path, description = "Room code"),
        ("player_id" = String, Path, description = "Player identity"),
        ("X-Host-Token" = String, Header, description = "Host token returned at creation")
    ),
    responses(
        (status = 200, description = "Player removed", body = HostActionResponse),
        (status = 404, description = "Unknown room or player")
    )
)]
/// Delete a player record from the room.
pub async fn remove_player(
    State(state): State<SharedState>,
    Valid(Path(path)): Valid<Path<RoomPlayerPath>>,
    headers: HeaderMap,
) -> Result<Json<HostActionResponse>, AppError> {
    let response =
        room_service::remove_player(&state, &path.code, host_token(&headers), path.player_id)
            .await?;
    Ok(Json(response))
}

async fn host_control(
    state: &SharedState,
    code: &str,
    headers: &HeaderMap,
    command: HostCommand,
) -> Result<Json<HostActionResponse>, AppError> {
    let response = room_service::host_action(state, code, host_token(headers), command).await?;
    Ok(Json(response))
}

fn host_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(HOST_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
}
