//! Application-level configuration loading: engine timings, capacities and room defaults.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use serde_with::{DurationMilliSeconds, serde_as};
use tracing::{info, warn};

use crate::state::{game::RoomConfig, power_ups::PowerUpLedger};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "LIVE_QUIZ_CONFIG_PATH";

/// Timings and capacities shared by every room actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Delay between the host starting the game and the first round.
    pub countdown: Duration,
    /// How long the results of a round stay on screen before the next one.
    pub reveal: Duration,
    /// Interval of the time-remaining broadcasts.
    pub tick_interval: Duration,
    /// Bounded capacity of each room's command queue.
    pub queue_capacity: usize,
    /// Capacity of each room's broadcast channel.
    pub broadcast_capacity: usize,
    /// Attempts made to find a free room code.
    pub code_attempts: usize,
    /// How long a room may stay without any connected player.
    pub abandon_grace: Duration,
    /// Interval of the registry sweep.
    pub reaper_interval: Duration,
    /// Time added by the extra-time power-up.
    pub extra_time: Duration,
    /// How long the freeze power-up blocks its target.
    pub freeze_duration: Duration,
    /// Units of each power-up handed to a new player.
    pub initial_power_ups: u32,
}

impl EngineSettings {
    /// Ledger handed to each new player.
    pub fn initial_ledger(&self) -> PowerUpLedger {
        PowerUpLedger::with_uniform(self.initial_power_ups)
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            countdown: Duration::from_secs(3),
            reveal: Duration::from_secs(5),
            tick_interval: Duration::from_secs(1),
            queue_capacity: 64,
            broadcast_capacity: 128,
            code_attempts: 32,
            abandon_grace: Duration::from_secs(300),
            reaper_interval: Duration::from_secs(30),
            extra_time: Duration::from_secs(10),
            freeze_duration: Duration::from_secs(5),
            initial_power_ups: 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Engine-wide timings and capacities.
    pub engine: EngineSettings,
    /// Room options applied when a creation request leaves them out.
    pub room_defaults: RoomConfig,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match Self::from_json(&contents) {
                Ok(app_config) => {
                    info!(path = %path.display(), "loaded engine settings from config");
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Parse a JSON document; absent keys keep their default value.
    pub fn from_json(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<RawConfig>(contents).map(Into::into)
    }
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    countdown_ms: Option<Duration>,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    reveal_ms: Option<Duration>,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    tick_interval_ms: Option<Duration>,
    queue_capacity: Option<usize>,
    broadcast_capacity: Option<usize>,
    code_attempts: Option<usize>,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    abandon_grace_ms: Option<Duration>,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    reaper_interval_ms: Option<Duration>,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    extra_time_ms: Option<Duration>,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    freeze_ms: Option<Duration>,
    initial_power_ups: Option<u32>,
    room_defaults: RawRoomDefaults,
}

#[serde_as]
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
/// JSON representation of the default room options.
struct RawRoomDefaults {
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    time_limit_ms: Option<Duration>,
    point_multiplier: Option<u32>,
    shuffle_questions: Option<bool>,
    shuffle_options: Option<bool>,
    max_players: Option<usize>,
    min_players: Option<usize>,
    allow_reconnect: Option<bool>,
    allow_late_join: Option<bool>,
    lives: Option<u32>,
    teams: Option<u32>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let defaults = EngineSettings::default();
        let engine = EngineSettings {
            countdown: value.countdown_ms.unwrap_or(defaults.countdown),
            reveal: value.reveal_ms.unwrap_or(defaults.reveal),
            tick_interval: value
                .tick_interval_ms
                .filter(|interval| !interval.is_zero())
                .unwrap_or(defaults.tick_interval),
            queue_capacity: value
                .queue_capacity
                .filter(|capacity| *capacity > 0)
                .unwrap_or(defaults.queue_capacity),
            broadcast_capacity: value
                .broadcast_capacity
                .filter(|capacity| *capacity > 0)
                .unwrap_or(defaults.broadcast_capacity),
            code_attempts: value
                .code_attempts
                .filter(|attempts| *attempts > 0)
                .unwrap_or(defaults.code_attempts),
            abandon_grace: value.abandon_grace_ms.unwrap_or(defaults.abandon_grace),
            reaper_interval: value
                .reaper_interval_ms
                .filter(|interval| !interval.is_zero())
                .unwrap_or(defaults.reaper_interval),
            extra_time: value.extra_time_ms.unwrap_or(defaults.extra_time),
            freeze_duration: value.freeze_ms.unwrap_or(defaults.freeze_duration),
            initial_power_ups: value
                .initial_power_ups
                .unwrap_or(defaults.initial_power_ups),
        };

        Self {
            engine,
            room_defaults: value.room_defaults.into(),
        }
    }
}

impl From<RawRoomDefaults> for RoomConfig {
    fn from(value: RawRoomDefaults) -> Self {
        let defaults = RoomConfig::default();
        Self {
            time_limit: value.time_limit_ms.or(defaults.time_limit),
            point_multiplier: value
                .point_multiplier
                .unwrap_or(defaults.point_multiplier),
            shuffle_questions: value
                .shuffle_questions
                .unwrap_or(defaults.shuffle_questions),
            shuffle_options: value.shuffle_options.unwrap_or(defaults.shuffle_options),
            max_players: value.max_players.unwrap_or(defaults.max_players),
            min_players: value.min_players.unwrap_or(defaults.min_players),
            allow_reconnect: value.allow_reconnect.unwrap_or(defaults.allow_reconnect),
            allow_late_join: value.allow_late_join.unwrap_or(defaults.allow_late_join),
            lives: value.lives.or(defaults.lives),
            teams: value.teams.or(defaults.teams),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
