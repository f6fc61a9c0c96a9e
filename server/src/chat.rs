//! In-memory chat history.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

const MAX_HISTORY: usize = 100;

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub sender_id: String,
    pub sender_name: String,
    pub content: String,
    pub timestamp_ms: u128,
}

impl ChatMessage {
    pub fn new(sender_id: String, sender_name: String, content: String) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        Self {
            sender_id,
            sender_name,
            content,
            timestamp_ms,
        }
    }
}

/// Rolling buffer of the most recent chat messages. Dropping old entries is
/// a hard cap, not persistence; nothing here survives a restart.
#[derive(Default)]
pub struct ChatLog {
    history: Mutex<VecDeque<ChatMessage>>,
}

impl ChatLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, message: ChatMessage) {
        if let Ok(mut history) = self.history.lock() {
            history.push_back(message);
            while history.len() > MAX_HISTORY {
                history.pop_front();
            }
        }
    }

    pub fn recent(&self) -> Vec<ChatMessage> {
        self.history
            .lock()
            .map(|history| history.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_capped() {
        let log = ChatLog::new();
        for i in 0..150 {
            log.record(ChatMessage::new("p1".into(), "bob".into(), format!("msg {}", i)));
        }
        let recent = log.recent();
        assert_eq!(recent.len(), 100);
        assert_eq!(recent[0].content, "msg 50");
        assert_eq!(recent[99].content, "msg 149");
    }
}
