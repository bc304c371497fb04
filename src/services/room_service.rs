//! Service helpers behind the room REST API.

use tracing::info;

use crate::{
    dto::{
        common::RoomSummaryDto,
        room::{CreateRoomRequest, CreateRoomResponse, HostActionResponse, LeaderboardResponse},
    },
    error::ServiceError,
    state::{
        RoomHandle, SharedState,
        game::{PlayerId, Question},
        session::HostCommand,
    },
};

/// Open a room from a validated request, applying the configured room defaults.
pub async fn create_room(
    state: &SharedState,
    request: CreateRoomRequest,
) -> Result<CreateRoomResponse, ServiceError> {
    let config = request
        .config
        .unwrap_or_default()
        .apply_to(&state.config().room_defaults);
    if config.min_players > config.max_players {
        return Err(ServiceError::InvalidInput(format!(
            "min_players ({}) exceeds max_players ({})",
            config.min_players, config.max_players
        )));
    }
    let questions = request.questions.into_iter().map(Question::from).collect();

    let handle = state
        .registry()
        .create_room(request.host_id, questions, config)?;
    let summary = handle.summary().await?;
    info!(code = %handle.code(), host_id = %handle.host_id(), "room opened over HTTP");

    Ok(CreateRoomResponse {
        code: handle.code().to_string(),
        host_token: handle.host_token().to_string(),
        room: RoomSummaryDto::from(&summary),
    })
}

/// Return the public projection of a room.
pub async fn get_room(state: &SharedState, code: &str) -> Result<RoomSummaryDto, ServiceError> {
    let handle = state.registry().resolve(code)?;
    let summary = handle.summary().await?;
    Ok(RoomSummaryDto::from(&summary))
}

/// Return the current ranking of a room.
pub async fn get_leaderboard(
    state: &SharedState,
    code: &str,
) -> Result<LeaderboardResponse, ServiceError> {
    let handle = state.registry().resolve(code)?;
    let snapshot = handle.leaderboard().await?;
    Ok(LeaderboardResponse::new(handle.code().to_string(), &snapshot))
}

/// Run a host control on a room.
pub async fn host_action(
    state: &SharedState,
    code: &str,
    token: Option<&str>,
    command: HostCommand,
) -> Result<HostActionResponse, ServiceError> {
    let handle = state.registry().resolve(code)?;
    let token = require_host_token(&handle, token)?;
    let phase = handle.host(token, command).await?;
    info!(code = %handle.code(), ?command, "host control applied");
    Ok(HostActionResponse {
        code: handle.code().to_string(),
        phase: phase.into(),
    })
}

/// Delete a player from a room on behalf of the host.
pub async fn remove_player(
    state: &SharedState,
    code: &str,
    token: Option<&str>,
    player_id: PlayerId,
) -> Result<HostActionResponse, ServiceError> {
    host_action(state, code, token, HostCommand::RemovePlayer(player_id)).await
}

fn require_host_token<'a>(
    handle: &RoomHandle,
    token: Option<&'a str>,
) -> Result<&'a str, ServiceError> {
    token.ok_or_else(|| {
        ServiceError::Unauthorized(format!(
            "missing host token for room `{}`",
            handle.code()
        ))
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::results::MemoryResultSink,
        error::AppError,
        state::AppState,
    };
    use axum::{http::StatusCode, response::IntoResponse};

    fn state() -> SharedState {
        AppState::new(AppConfig::default(), Arc::new(MemoryResultSink::new()))
    }

    fn request() -> CreateRoomRequest {
        serde_json::from_value(serde_json::json!({
            "host_id": "host-1",
            "questions": [{
                "id": 1,
                "prompt": "Largest planet?",
                "options": ["Mars", "Jupiter"],
                "correct": 1,
                "time_limit_ms": 15000,
                "points": 1000
            }],
            "config": { "max_players": 4 }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn create_then_get_room() {
        let state = state();
        let created = create_room(&state, request()).await.unwrap();
        assert_eq!(created.room.total_rounds, 1);
        assert_eq!(created.room.config.max_players, 4);

        let room = get_room(&state, &created.code.to_lowercase()).await.unwrap();
        assert_eq!(room.code, created.code);
        assert!(room.players.is_empty());
    }

    #[tokio::test]
    async fn host_controls_require_the_host_token() {
        let state = state();
        let created = create_room(&state, request()).await.unwrap();

        let err = host_action(&state, &created.code, None, HostCommand::Start)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));

        let err = host_action(&state, &created.code, Some("nope"), HostCommand::Start)
            .await
            .unwrap_err();
        let response = AppError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn start_without_players_is_a_conflict() {
        let state = state();
        let created = create_room(&state, request()).await.unwrap();

        let err = host_action(
            &state,
            &created.code,
            Some(&created.host_token),
            HostCommand::Start,
        )
        .await
        .unwrap_err();
        let response = AppError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn min_players_above_max_is_rejected() {
        let state = state();
        let mut request = request();
        request.config = Some(crate::dto::room::RoomConfigInput {
            max_players: Some(2),
            min_players: Some(3),
            ..Default::default()
        });
        let err = create_room(&state, request).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn unknown_room_is_not_found() {
        let state = state();
        let err = get_leaderboard(&state, "ZZZZZZ").await.unwrap_err();
        let response = AppError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
