mod errors;
pub mod game;
pub mod hub;
pub mod leaderboard;
pub mod power_ups;
pub mod presence;
pub mod registry;
pub mod round;
pub mod scoring;
pub mod session;
pub mod state_machine;

use std::sync::Arc;

use crate::{config::AppConfig, dao::results::ResultSink};

pub use self::errors::{ErrorClass, RegistryError, RoomError};
pub use self::registry::{RoomCode, RoomRegistry};
pub use self::session::RoomHandle;

pub type SharedState = Arc<AppState>;

/// Central application state: the runtime configuration and the room registry.
pub struct AppState {
    config: Arc<AppConfig>,
    registry: Arc<RoomRegistry>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(config: AppConfig, sink: Arc<dyn ResultSink>) -> SharedState {
        let registry = RoomRegistry::new(config.engine.clone(), sink);
        Arc::new(Self {
            config: Arc::new(config),
            registry,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Registry of live rooms.
    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }
}
