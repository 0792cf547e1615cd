use dashmap::DashMap;
use std::sync::{Arc, Weak};

use crate::ws::{ConnectionId, SessionHandle};

/// One member of a room. Holds only a weak reference to the session.
#[derive(Debug, Clone)]
struct Member {
    connection_id: ConnectionId,
    handle: Weak<SessionHandle>,
}

/// Members of one active meeting, in join order.
#[derive(Debug, Default)]
struct Room {
    members: Vec<Member>,
}

impl Room {
    fn contains(&self, connection_id: ConnectionId) -> bool {
        self.members.iter().any(|m| m.connection_id == connection_id)
    }

    fn live_members_except(&self, exclude: Option<ConnectionId>) -> Vec<Arc<SessionHandle>> {
        self.members
            .iter()
            .filter(|m| Some(m.connection_id) != exclude)
            .filter_map(|m| m.handle.upgrade())
            .collect()
    }
}

/// Result of adding a session to a room.
#[derive(Debug)]
pub struct JoinOutcome {
    /// False when the session was already a member.
    pub newly_joined: bool,
    /// Everyone else in the room at the moment of the join.
    pub others: Vec<Arc<SessionHandle>>,
}

/// Result of removing a session from a room.
#[derive(Debug, Default)]
pub struct LeaveOutcome {
    /// False when the session was not a member (the call was a no-op).
    pub was_member: bool,
    /// Members still in the room after the removal.
    pub remaining: Vec<Arc<SessionHandle>>,
    /// True when this removal emptied and deleted the room.
    pub room_closed: bool,
}

/// Process-wide room membership.
///
/// Every mutation goes through the DashMap entry for that room id, which
/// holds the shard's write lock for the duration, so join/leave on one room
/// are serialized while other rooms proceed independently. A room exists
/// exactly as long as it has members.
#[derive(Debug, Clone, Default)]
pub struct RoomRegistry {
    rooms: Arc<DashMap<String, Room>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `session` to `room_id`, creating the room if absent. Idempotent.
    pub fn join(&self, room_id: &str, session: &Arc<SessionHandle>) -> JoinOutcome {
        let mut room = self.rooms.entry(room_id.to_string()).or_default();

        let newly_joined = !room.contains(session.connection_id);
        if newly_joined {
            room.members.push(Member {
                connection_id: session.connection_id,
                handle: Arc::downgrade(session),
            });
        }

        JoinOutcome {
            newly_joined,
            others: room.live_members_except(Some(session.connection_id)),
        }
    }

    /// Remove a connection from `room_id`. Removing a non-member is a no-op.
    /// Deletes the room when its last member leaves.
    pub fn leave(&self, room_id: &str, connection_id: ConnectionId) -> LeaveOutcome {
        let mut outcome = LeaveOutcome::default();

        // remove_if_mut runs under the entry's write lock, so the removal and
        // the emptiness check cannot interleave with a concurrent join.
        let removed = self.rooms.remove_if_mut(room_id, |_, room| {
            let before = room.members.len();
            room.members.retain(|m| m.connection_id != connection_id);
            outcome.was_member = room.members.len() < before;
            outcome.remaining = room.live_members_except(None);
            room.members.is_empty()
        });
        outcome.room_closed = removed.is_some();

        outcome
    }

    /// Snapshot of the live members of `room_id`, in join order.
    pub fn members_of(&self, room_id: &str) -> Vec<Arc<SessionHandle>> {
        self.rooms
            .get(room_id)
            .map(|room| room.live_members_except(None))
            .unwrap_or_default()
    }

    /// Snapshot of the live members of `room_id` other than `exclude`.
    pub fn members_except(&self, room_id: &str, exclude: ConnectionId) -> Vec<Arc<SessionHandle>> {
        self.rooms
            .get(room_id)
            .map(|room| room.live_members_except(Some(exclude)))
            .unwrap_or_default()
    }

    pub fn contains_room(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    pub fn is_member(&self, room_id: &str, connection_id: ConnectionId) -> bool {
        self.rooms
            .get(room_id)
            .map(|room| room.contains(connection_id))
            .unwrap_or(false)
    }

    /// Number of active rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::session;

    #[test]
    fn join_creates_room_and_reports_others() {
        let registry = RoomRegistry::new();
        let (a, _ra) = session("a", "Ann");
        let (b, _rb) = session("b", "Ben");

        let first = registry.join("m1", &a);
        assert!(first.newly_joined);
        assert!(first.others.is_empty());
        assert!(registry.contains_room("m1"));

        let second = registry.join("m1", &b);
        assert!(second.newly_joined);
        assert_eq!(second.others.len(), 1);
        assert_eq!(second.others[0].user_id, "a");
    }

    #[test]
    fn join_is_idempotent() {
        let registry = RoomRegistry::new();
        let (a, _ra) = session("a", "Ann");

        assert!(registry.join("m1", &a).newly_joined);
        assert!(!registry.join("m1", &a).newly_joined);
        assert_eq!(registry.members_of("m1").len(), 1);
    }

    #[test]
    fn leave_of_non_member_is_a_no_op() {
        let registry = RoomRegistry::new();
        let (a, _ra) = session("a", "Ann");
        let (b, _rb) = session("b", "Ben");
        registry.join("m1", &a);

        let outcome = registry.leave("m1", b.connection_id);
        assert!(!outcome.was_member);
        assert!(!outcome.room_closed);
        assert_eq!(registry.members_of("m1").len(), 1);

        let outcome = registry.leave("never-seen", a.connection_id);
        assert!(!outcome.was_member);
        assert!(!registry.contains_room("never-seen"));
    }

    #[test]
    fn last_leave_deletes_room() {
        let registry = RoomRegistry::new();
        let (a, _ra) = session("a", "Ann");
        let (b, _rb) = session("b", "Ben");
        registry.join("m1", &a);
        registry.join("m1", &b);

        let outcome = registry.leave("m1", a.connection_id);
        assert!(outcome.was_member);
        assert!(!outcome.room_closed);
        assert_eq!(outcome.remaining.len(), 1);

        let outcome = registry.leave("m1", b.connection_id);
        assert!(outcome.was_member);
        assert!(outcome.room_closed);
        assert!(outcome.remaining.is_empty());
        assert!(registry.members_of("m1").is_empty());
        assert!(!registry.contains_room("m1"));
        assert_eq!(registry.room_count(), 0);
    }

    #[test]
    fn members_keep_join_order() {
        let registry = RoomRegistry::new();
        let sessions: Vec<_> = ["a", "b", "c"].iter().map(|u| session(u, u)).collect();
        for (s, _) in &sessions {
            registry.join("m1", s);
        }

        let order: Vec<_> = registry
            .members_of("m1")
            .iter()
            .map(|s| s.user_id.clone())
            .collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn members_except_excludes_only_that_connection() {
        let registry = RoomRegistry::new();
        let (a1, _r1) = session("a", "Ann");
        let (a2, _r2) = session("a", "Ann");
        registry.join("m1", &a1);
        registry.join("m1", &a2);

        let others = registry.members_except("m1", a1.connection_id);
        assert_eq!(others.len(), 1);
        assert_eq!(others[0].connection_id, a2.connection_id);
    }

    #[test]
    fn rooms_are_independent() {
        let registry = RoomRegistry::new();
        let (a, _ra) = session("a", "Ann");
        let (b, _rb) = session("b", "Ben");
        registry.join("m1", &a);
        registry.join("m2", &b);

        assert!(registry.is_member("m1", a.connection_id));
        assert!(!registry.is_member("m1", b.connection_id));
        assert_eq!(registry.room_count(), 2);
    }

    #[test]
    fn dropped_sessions_are_not_returned() {
        let registry = RoomRegistry::new();
        let (a, _ra) = session("a", "Ann");
        let (b, rb) = session("b", "Ben");
        registry.join("m1", &a);
        registry.join("m1", &b);
        drop(rb);
        drop(b);

        let members = registry.members_of("m1");
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].user_id, "a");
    }

    #[test]
    fn concurrent_joins_on_one_room_lose_nothing() {
        let registry = RoomRegistry::new();
        let sessions: Vec<_> = (0..64).map(|i| session(&format!("u{i}"), "User")).collect();

        std::thread::scope(|scope| {
            for (s, _) in &sessions {
                let registry = registry.clone();
                scope.spawn(move || {
                    registry.join("m1", s);
                });
            }
        });

        assert_eq!(registry.members_of("m1").len(), 64);
    }

    #[test]
    fn concurrent_join_and_leave_keep_room_consistent() {
        let registry = RoomRegistry::new();
        let (stayer, _rs) = session("stay", "Stay");
        let churn: Vec<_> = (0..32).map(|i| session(&format!("c{i}"), "Churn")).collect();

        std::thread::scope(|scope| {
            for (s, _) in &churn {
                let registry = registry.clone();
                scope.spawn(move || {
                    registry.join("m1", s);
                    registry.leave("m1", s.connection_id);
                });
            }
            let registry = registry.clone();
            let stayer = &stayer;
            scope.spawn(move || {
                registry.join("m1", stayer);
            });
        });

        let members = registry.members_of("m1");
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].user_id, "stay");
    }
}
