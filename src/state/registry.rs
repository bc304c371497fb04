//! Process-wide table of room codes to running room actors.

use std::{fmt, sync::Arc};

use dashmap::{DashMap, mapref::entry::Entry};
use rand::Rng;
use tracing::{debug, info};

use crate::{
    config::EngineSettings,
    dao::results::ResultSink,
    state::{
        RegistryError, RoomError,
        game::{Question, RoomConfig, prepare_questions, validate_questions},
        session::{RoomHandle, RoomSetup, build_room},
    },
};

/// Characters a room code is drawn from; no `0/O` or `1/I` lookalikes.
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
/// Number of characters in a room code.
pub const CODE_LENGTH: usize = 6;

/// Normalised room code.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomCode(String);

impl RoomCode {
    /// Parse user input, ignoring surrounding whitespace and case.
    pub fn parse(input: &str) -> Option<Self> {
        let normalized = input.trim().to_ascii_uppercase();
        let valid = normalized.len() == CODE_LENGTH
            && normalized.bytes().all(|byte| CODE_ALPHABET.contains(&byte));
        valid.then_some(Self(normalized))
    }

    /// Draw a random code.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..CODE_LENGTH)
            .map(|_| char::from(CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())]))
            .collect();
        Self(code)
    }

    /// Code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registry of live rooms. Lookups never wait on room actors.
pub struct RoomRegistry {
    rooms: DashMap<RoomCode, RoomHandle>,
    settings: EngineSettings,
    sink: Arc<dyn ResultSink>,
}

impl RoomRegistry {
    /// Create an empty registry.
    pub fn new(settings: EngineSettings, sink: Arc<dyn ResultSink>) -> Arc<Self> {
        Arc::new(Self {
            rooms: DashMap::new(),
            settings,
            sink,
        })
    }

    /// Engine settings handed to every room.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Validate the questions, reserve a fresh code and start the room actor.
    pub fn create_room(
        self: &Arc<Self>,
        host_id: String,
        questions: Vec<Question>,
        config: RoomConfig,
    ) -> Result<RoomHandle, RegistryError> {
        let mut rng = rand::rng();
        self.create_room_with(host_id, questions, config, || RoomCode::generate(&mut rng))
    }

    /// Same as [`RoomRegistry::create_room`] with a caller-supplied code generator.
    pub fn create_room_with<F>(
        self: &Arc<Self>,
        host_id: String,
        questions: Vec<Question>,
        config: RoomConfig,
        mut next_code: F,
    ) -> Result<RoomHandle, RegistryError>
    where
        F: FnMut() -> RoomCode,
    {
        validate_questions(&questions).map_err(RegistryError::InvalidQuestions)?;
        let questions = prepare_questions(questions, &config);

        let attempts = self.settings.code_attempts.max(1);
        for attempt in 0..attempts {
            let code = next_code();
            match self.rooms.entry(code.clone()) {
                Entry::Occupied(_) => {
                    debug!(%code, attempt, "room code collision; drawing another");
                }
                Entry::Vacant(slot) => {
                    let (handle, actor) = build_room(RoomSetup {
                        code: code.clone(),
                        host_id,
                        questions,
                        config,
                        settings: self.settings.clone(),
                        sink: self.sink.clone(),
                    });
                    slot.insert(handle.clone());

                    let registry = Arc::downgrade(self);
                    tokio::spawn(async move {
                        actor.run().await;
                        if let Some(registry) = registry.upgrade() {
                            registry.evict(&code);
                        }
                    });
                    info!(code = %handle.code(), "room created");
                    return Ok(handle);
                }
            }
        }

        Err(RegistryError::CodeSpaceExhausted { attempts })
    }

    /// Find the room registered under user-supplied `code`.
    pub fn resolve(&self, code: &str) -> Result<RoomHandle, RoomError> {
        let code = RoomCode::parse(code).ok_or(RoomError::RoomNotFound)?;
        self.rooms
            .get(&code)
            .map(|entry| entry.value().clone())
            .ok_or(RoomError::RoomNotFound)
    }

    /// Drop the room registered under `code`.
    pub fn evict(&self, code: &RoomCode) -> Option<RoomHandle> {
        let removed = self.rooms.remove(code).map(|(_, handle)| handle);
        if removed.is_some() {
            info!(%code, "room evicted");
        }
        removed
    }

    /// Evict every room whose actor already stopped; returns how many went.
    pub fn sweep(&self) -> usize {
        let before = self.rooms.len();
        self.rooms.retain(|code, handle| {
            let keep = !handle.is_closed();
            if !keep {
                info!(%code, "swept stopped room");
            }
            keep
        });
        before.saturating_sub(self.rooms.len())
    }

    /// Number of live rooms.
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Whether no room is live.
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        dao::results::MemoryResultSink,
        state::{game::sample_question, session::HostCommand},
    };

    fn registry() -> Arc<RoomRegistry> {
        RoomRegistry::new(EngineSettings::default(), Arc::new(MemoryResultSink::new()))
    }

    fn fixed(code: &str) -> impl FnMut() -> RoomCode + '_ {
        move || RoomCode::parse(code).unwrap()
    }

    #[test]
    fn codes_use_the_restricted_alphabet() {
        let mut rng = rand::rng();
        for _ in 0..100 {
            let code = RoomCode::generate(&mut rng);
            assert_eq!(code.as_str().len(), CODE_LENGTH);
            assert!(
                code.as_str()
                    .bytes()
                    .all(|byte| !b"01OI".contains(&byte))
            );
        }
    }

    #[test]
    fn parse_is_case_insensitive_and_strict() {
        assert_eq!(RoomCode::parse(" abc234 ").unwrap().as_str(), "ABC234");
        assert!(RoomCode::parse("ABC23").is_none());
        assert!(RoomCode::parse("ABC230").is_none());
        assert!(RoomCode::parse("ABCDEFG").is_none());
    }

    #[tokio::test]
    async fn created_room_resolves_from_lowercase_input() {
        let registry = registry();
        let handle = registry
            .create_room_with(
                "host".into(),
                vec![sample_question(1)],
                RoomConfig::default(),
                fixed("QUZ342"),
            )
            .unwrap();
        assert_eq!(handle.code().as_str(), "QUZ342");
        let resolved = registry.resolve("quz342").unwrap();
        assert_eq!(resolved.host_token(), handle.host_token());
        assert_eq!(registry.resolve("NOPE22").unwrap_err(), RoomError::RoomNotFound);
    }

    #[tokio::test]
    async fn exhausted_code_space_is_fatal() {
        let registry = registry();
        registry
            .create_room_with(
                "host".into(),
                vec![sample_question(1)],
                RoomConfig::default(),
                fixed("AAAAAA"),
            )
            .unwrap();
        let err = registry
            .create_room_with(
                "host".into(),
                vec![sample_question(1)],
                RoomConfig::default(),
                fixed("AAAAAA"),
            )
            .err()
            .unwrap();
        assert_eq!(err, RegistryError::CodeSpaceExhausted { attempts: 32 });
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn invalid_questions_are_rejected_before_reserving() {
        let registry = registry();
        let err = registry
            .create_room("host".into(), Vec::new(), RoomConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, RegistryError::InvalidQuestions(_)));
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn finished_room_evicts_its_code() {
        let registry = registry();
        let handle = registry
            .create_room(
                "host".into(),
                vec![sample_question(1)],
                RoomConfig::default(),
            )
            .unwrap();
        handle
            .host(handle.host_token(), HostCommand::ForceEnd)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(handle.is_closed());
        assert!(registry.is_empty());
        assert_eq!(
            registry.resolve(handle.code().as_str()).unwrap_err(),
            RoomError::RoomNotFound
        );
        assert_eq!(
            handle.summary().await.unwrap_err(),
            RoomError::RoomClosed
        );
    }

    #[tokio::test]
    async fn evict_and_sweep() {
        let registry = registry();
        let handle = registry
            .create_room(
                "host".into(),
                vec![sample_question(1)],
                RoomConfig::default(),
            )
            .unwrap();
        assert_eq!(registry.sweep(), 0);
        assert!(registry.evict(handle.code()).is_some());
        assert!(registry.evict(handle.code()).is_none());
        assert!(registry.is_empty());
    }
}
