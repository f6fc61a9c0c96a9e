//! Outbox events produced by simulation code and drained by the network
//! layer. Simulation functions never touch sockets; they return these.

use valewood_shared::ServerEvent;

/// Who should receive an event.
#[derive(Debug, Clone, PartialEq)]
pub enum Recipients {
    /// Every connected session.
    All,
    /// Every session except the originating one.
    AllExceptSession(String),
    /// The session a frame arrived on.
    Session(String),
    /// One player by id.
    Player(String),
    /// A fixed set of players (attacker and victim for HIT_DETAILED).
    Players(Vec<String>),
}

/// An event paired with its audience.
#[derive(Debug, Clone, PartialEq)]
pub struct Outgoing {
    pub to: Recipients,
    pub event: ServerEvent,
}

impl Outgoing {
    pub fn broadcast(event: ServerEvent) -> Self {
        Self {
            to: Recipients::All,
            event,
        }
    }

    pub fn to_player(player_id: impl Into<String>, event: ServerEvent) -> Self {
        Self {
            to: Recipients::Player(player_id.into()),
            event,
        }
    }

    pub fn to_players(player_ids: Vec<String>, event: ServerEvent) -> Self {
        Self {
            to: Recipients::Players(player_ids),
            event,
        }
    }

    pub fn to_session(session_id: impl Into<String>, event: ServerEvent) -> Self {
        Self {
            to: Recipients::Session(session_id.into()),
            event,
        }
    }
}
