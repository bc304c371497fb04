/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Room event payload generation and broadcasting.
pub mod room_events;
/// Background sweep of stopped rooms.
pub mod room_reaper;
/// Room creation, projections and host controls.
pub mod room_service;
/// Server-Sent Events streaming of room broadcasts.
pub mod sse_service;
/// Player WebSocket connection and message handling.
pub mod websocket_service;
