use axum::Router;

use crate::state::SharedState;

pub mod docs;
pub mod health;
pub mod rooms;
pub mod sse;
pub mod websocket;

/// Compose the room, player, observer and documentation routes over the shared state.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(rooms::router())
        .merge(sse::router())
        .merge(websocket::router())
        .merge(docs::router())
        .with_state(state)
}
