use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI document for the live quiz backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::rooms::create_room,
        crate::routes::rooms::get_room,
        crate::routes::rooms::get_leaderboard,
        crate::routes::rooms::start_room,
        crate::routes::rooms::pause_room,
        crate::routes::rooms::resume_room,
        crate::routes::rooms::end_room,
        crate::routes::rooms::remove_player,
        crate::routes::sse::room_stream,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::room::CreateRoomRequest,
            crate::dto::room::QuestionInput,
            crate::dto::room::RoomConfigInput,
            crate::dto::room::CreateRoomResponse,
            crate::dto::room::HostActionResponse,
            crate::dto::room::LeaderboardResponse,
            crate::dto::common::RoomSummaryDto,
            crate::dto::ws::PlayerInboundMessage,
            crate::dto::ws::PlayerOutboundMessage,
            crate::dto::ws::PowerUpEffectDto,
            crate::dto::sse::Handshake,
            crate::dto::sse::PhaseChangedEvent,
            crate::dto::sse::RoundOpenedEvent,
            crate::dto::sse::TimeRemainingEvent,
            crate::dto::sse::RoundClosedEvent,
            crate::dto::sse::RoundProgressEvent,
            crate::dto::sse::RoundExtendedEvent,
            crate::dto::sse::LeaderboardDeltaEvent,
            crate::dto::sse::PlayerPresenceEvent,
            crate::dto::sse::PlayerDisconnectedEvent,
            crate::dto::sse::ScoreUpdateEvent,
            crate::dto::sse::PowerUpUsedEvent,
            crate::dto::sse::PlayerFrozenEvent,
            crate::dto::sse::GameFinishedEvent,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "rooms", description = "Room creation and projections"),
        (name = "host", description = "Host-only controls, authenticated by the X-Host-Token header"),
        (name = "sse", description = "Server-sent events streams"),
        (name = "players", description = "WebSocket protocol for players"),
    )
)]
pub struct ApiDoc;
