//! Connection registry: session senders and the player-to-session mapping.

use dashmap::DashMap;
use log::debug;
use tokio::sync::mpsc::UnboundedSender;

use crate::events::{Outgoing, Recipients};

/// Text frames queued for a session's writer task.
pub type FrameSender = UnboundedSender<String>;

/// Who is connected right now. A session exists from socket accept until
/// close; the player binding appears once a JOIN names the player.
pub struct ConnectionRegistry {
    sessions: DashMap<String, FrameSender>,
    player_sessions: DashMap<String, String>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            player_sessions: DashMap::new(),
        }
    }

    pub fn add_session(&self, session_id: String, sender: FrameSender) {
        self.sessions.insert(session_id, sender);
    }

    pub fn bind_player(&self, player_id: String, session_id: String) {
        self.player_sessions.insert(player_id, session_id);
    }

    /// Drop a session and its player binding. Returns the player id that was
    /// bound to it, if any.
    pub fn remove_session(&self, session_id: &str) -> Option<String> {
        self.sessions.remove(session_id);
        let player_id = self
            .player_sessions
            .iter()
            .find(|entry| entry.value() == session_id)
            .map(|entry| entry.key().clone());
        if let Some(ref id) = player_id {
            self.player_sessions.remove(id);
        }
        player_id
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn send_to_session(&self, session_id: &str, frame: &str) {
        if let Some(sender) = self.sessions.get(session_id) {
            if sender.send(frame.to_string()).is_err() {
                // Writer task is gone; the reader's cleanup will remove us
                debug!("Dropping frame for dead session {}", session_id);
            }
        }
    }

    fn send_to_player(&self, player_id: &str, frame: &str) {
        if let Some(session_id) = self.player_sessions.get(player_id) {
            self.send_to_session(session_id.value(), frame);
        }
    }

    fn broadcast(&self, frame: &str) {
        for entry in self.sessions.iter() {
            if entry.value().send(frame.to_string()).is_err() {
                debug!("Dropping frame for dead session {}", entry.key());
            }
        }
    }

    fn broadcast_except(&self, excluded_session: &str, frame: &str) {
        for entry in self.sessions.iter() {
            if entry.key() != excluded_session
                && entry.value().send(frame.to_string()).is_err()
            {
                debug!("Dropping frame for dead session {}", entry.key());
            }
        }
    }

    /// Deliver one outbox entry to its audience.
    pub fn dispatch(&self, outgoing: &Outgoing) {
        let frame = outgoing.event.encode();
        match &outgoing.to {
            Recipients::All => self.broadcast(&frame),
            Recipients::AllExceptSession(session_id) => {
                self.broadcast_except(session_id, &frame)
            }
            Recipients::Session(session_id) => self.send_to_session(session_id, &frame),
            Recipients::Player(player_id) => self.send_to_player(player_id, &frame),
            Recipients::Players(player_ids) => {
                for player_id in player_ids {
                    self.send_to_player(player_id, &frame);
                }
            }
        }
    }

    pub fn dispatch_all(&self, outbox: &[Outgoing]) {
        for outgoing in outbox {
            self.dispatch(outgoing);
        }
    }
}
