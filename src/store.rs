//! Sessions of every room a host serves

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    game::{Session, UpdateMessage},
    location::LocationTable,
    runtime::Runtime,
    timer::AlarmMessage,
};

/// A stable identifier for a chat room, as issued by the chat transport
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
    derive_more::FromStr,
)]
#[serde(transparent)]
pub struct RoomId(i64);

impl RoomId {
    /// Returns the raw transport identifier
    pub fn get(self) -> i64 {
        self.0
    }
}

/// Independent sessions keyed by room
///
/// Rooms never share state: each session owns its roster, phase, timers and
/// random source. The location table is shared read-only.
///
/// A session lives as long as the store. Ending a game or expiring a lobby
/// clears the session's contents in place, so one room hosts any number of
/// successive games.
#[derive(Debug)]
pub struct Sessions<R: Runtime> {
    config: Config,
    locations: LocationTable,
    sessions: HashMap<RoomId, Session<R>>,
}

impl<R: Runtime> Sessions<R> {
    /// Creates an empty store
    pub fn new(config: Config, locations: LocationTable) -> Self {
        Self {
            config,
            locations,
            sessions: HashMap::new(),
        }
    }

    /// The session of a room, created in the lobby on first use
    pub fn get_or_create<F: FnOnce() -> R>(&mut self, room: RoomId, runtime: F) -> &mut Session<R> {
        self.sessions.entry(room).or_insert_with(|| {
            tracing::debug!(%room, "session created");
            Session::new(room, &self.config, self.locations.clone(), runtime())
        })
    }

    /// The session of a room, if it exists
    pub fn get(&self, room: RoomId) -> Option<&Session<R>> {
        self.sessions.get(&room)
    }

    /// The session of a room, mutably
    pub fn get_mut(&mut self, room: RoomId) -> Option<&mut Session<R>> {
        self.sessions.get_mut(&room)
    }

    /// Routes a fired alarm to its room
    ///
    /// Alarms for rooms this store never created are dropped.
    pub fn receive_alarm(&mut self, room: RoomId, alarm: AlarmMessage) -> Vec<UpdateMessage> {
        match self.sessions.get_mut(&room) {
            Some(session) => session.receive_alarm(alarm),
            None => {
                tracing::debug!(%room, ?alarm, "alarm for unknown room");
                Vec::new()
            }
        }
    }

    /// Known rooms
    pub fn rooms(&self) -> impl Iterator<Item = RoomId> + '_ {
        self.sessions.keys().copied()
    }

    /// Number of known rooms
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no room was seen yet
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::{
        game::PhaseKind,
        location::tests::table,
        player::PlayerId,
        runtime::ManualRuntime,
        timer::TimerClass,
    };

    fn store() -> Sessions<ManualRuntime> {
        Sessions::new(
            Config {
                seed: Some(3),
                ..Config::default()
            },
            table(),
        )
    }

    #[test]
    fn test_rooms_are_independent() {
        let mut sessions = store();
        let first = RoomId::from(1);
        let second = RoomId::from(2);

        for id in 1..=3 {
            sessions
                .get_or_create(first, ManualRuntime::new)
                .join(PlayerId::from(id), format!("p{id}"))
                .unwrap();
        }
        sessions
            .get_or_create(second, ManualRuntime::new)
            .join(PlayerId::from(1), "p1")
            .unwrap();

        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions.get(first).unwrap().phase(), PhaseKind::Waiting);
        assert_eq!(sessions.get(second).unwrap().phase(), PhaseKind::Lobby);
        assert_eq!(sessions.get(second).unwrap().roster().len(), 1);
    }

    #[test]
    fn test_get_or_create_reuses_session() {
        let mut sessions = store();
        let room = RoomId::from(-100);

        sessions
            .get_or_create(room, ManualRuntime::new)
            .join(PlayerId::from(1), "a")
            .unwrap();
        let session = sessions.get_or_create(room, || panic!("must not create twice"));

        assert_eq!(session.roster().len(), 1);
        assert_eq!(sessions.rooms().collect::<Vec<_>>(), vec![room]);
    }

    #[test]
    fn test_room_hosts_successive_games() {
        let mut sessions = store();
        let room = RoomId::from(5);

        for game in 0..3 {
            let session = sessions.get_or_create(room, ManualRuntime::new);
            for id in 1..=3 {
                session.join(PlayerId::from(id), format!("p{id}")).unwrap();
            }
            session.request_start().unwrap();
            let updates = session.end_game(format!("game {game} over")).unwrap();

            assert!(matches!(updates[..], [UpdateMessage::GameEnded(_)]));
            assert_eq!(session.phase(), PhaseKind::Lobby);
            assert!(session.roster().is_empty());
        }

        assert_eq!(sessions.len(), 1);
    }

    #[test]
    fn test_alarms_route_to_their_room() {
        let mut sessions = store();
        let room = RoomId::from(7);

        sessions
            .get_or_create(room, ManualRuntime::new)
            .join(PlayerId::from(1), "a")
            .unwrap();

        let fired = sessions
            .get_mut(room)
            .unwrap()
            .runtime_mut()
            .advance(web_time::Duration::from_secs(120));
        assert_eq!(fired.len(), 2);

        let updates = fired
            .into_iter()
            .flat_map(|alarm| sessions.receive_alarm(room, alarm))
            .collect::<Vec<_>>();

        assert!(matches!(
            updates.last(),
            Some(UpdateMessage::LobbyExpired { players }) if players == &["a".to_owned()]
        ));
        assert!(sessions.get(room).unwrap().roster().is_empty());

        let unknown = AlarmMessage {
            class: TimerClass::Idle,
            ticket: 1,
        };
        assert!(sessions.receive_alarm(RoomId::from(8), unknown).is_empty());
    }
}
