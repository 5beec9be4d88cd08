//! Outbound notifications for the network layer
//!
//! The registry calls these from inside the per-session lock, so
//! implementations must return quickly and never call back into the registry.

use serde::Serialize;
use tokio::sync::mpsc;

use crate::state::{ItemResult, MoveOutcome, RankingEntry};

/// Broadcast hooks; every method defaults to doing nothing
pub trait SessionEvents: Send + Sync {
    fn turn_timeout(&self, _session_id: &str, _player_id: &str) {}

    fn time_update(&self, _session_id: &str, _seconds_left: u32) {}

    fn ai_move_completed(&self, _session_id: &str, _outcome: &MoveOutcome) {}

    fn ai_settled(&self, _session_id: &str, _player_id: &str) {}

    fn ai_item_used(&self, _session_id: &str, _result: &ItemResult) {}

    /// A seat's clock started (or restarted after a pause, item phase or stand-in change)
    fn turn_started(&self, _session_id: &str, _player_id: &str, _seconds: u32) {}

    fn game_finished(&self, _session_id: &str, _rankings: &[RankingEntry]) {}
}

/// Discards every notification
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopEvents;

impl SessionEvents for NoopEvents {}

/// Owned copy of a notification
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    TurnTimeout {
        session_id: String,
        player_id: String,
    },
    TimeUpdate {
        session_id: String,
        seconds_left: u32,
    },
    AiMoveCompleted {
        session_id: String,
        outcome: Box<MoveOutcome>,
    },
    AiSettled {
        session_id: String,
        player_id: String,
    },
    AiItemUsed {
        session_id: String,
        result: Box<ItemResult>,
    },
    TurnStarted {
        session_id: String,
        player_id: String,
        seconds: u32,
    },
    GameFinished {
        session_id: String,
        rankings: Vec<RankingEntry>,
    },
}

impl SessionEvent {
    pub fn session_id(&self) -> &str {
        match self {
            SessionEvent::TurnTimeout { session_id, .. }
            | SessionEvent::TimeUpdate { session_id, .. }
            | SessionEvent::AiMoveCompleted { session_id, .. }
            | SessionEvent::AiSettled { session_id, .. }
            | SessionEvent::AiItemUsed { session_id, .. }
            | SessionEvent::TurnStarted { session_id, .. }
            | SessionEvent::GameFinished { session_id, .. } => session_id,
        }
    }
}

/// Forwards notifications into an unbounded channel
#[derive(Clone, Debug)]
pub struct ChannelEvents {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelEvents {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: SessionEvent) {
        // A dropped receiver just means nobody is listening anymore
        let _ = self.tx.send(event);
    }
}

impl SessionEvents for ChannelEvents {
    fn turn_timeout(&self, session_id: &str, player_id: &str) {
        self.send(SessionEvent::TurnTimeout {
            session_id: session_id.to_string(),
            player_id: player_id.to_string(),
        });
    }

    fn time_update(&self, session_id: &str, seconds_left: u32) {
        self.send(SessionEvent::TimeUpdate {
            session_id: session_id.to_string(),
            seconds_left,
        });
    }

    fn ai_move_completed(&self, session_id: &str, outcome: &MoveOutcome) {
        self.send(SessionEvent::AiMoveCompleted {
            session_id: session_id.to_string(),
            outcome: Box::new(outcome.clone()),
        });
    }

    fn ai_settled(&self, session_id: &str, player_id: &str) {
        self.send(SessionEvent::AiSettled {
            session_id: session_id.to_string(),
            player_id: player_id.to_string(),
        });
    }

    fn ai_item_used(&self, session_id: &str, result: &ItemResult) {
        self.send(SessionEvent::AiItemUsed {
            session_id: session_id.to_string(),
            result: Box::new(result.clone()),
        });
    }

    fn turn_started(&self, session_id: &str, player_id: &str, seconds: u32) {
        self.send(SessionEvent::TurnStarted {
            session_id: session_id.to_string(),
            player_id: player_id.to_string(),
            seconds,
        });
    }

    fn game_finished(&self, session_id: &str, rankings: &[RankingEntry]) {
        self.send(SessionEvent::GameFinished {
            session_id: session_id.to_string(),
            rankings: rankings.to_vec(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_forwards_in_order() {
        let (events, mut rx) = ChannelEvents::new();
        events.time_update("g1", 12);
        events.turn_timeout("g1", "p1");
        match rx.try_recv().unwrap() {
            SessionEvent::TimeUpdate { seconds_left, .. } => assert_eq!(seconds_left, 12),
            other => panic!("unexpected {:?}", other),
        }
        let next = rx.try_recv().unwrap();
        assert_eq!(next.session_id(), "g1");
        assert!(matches!(next, SessionEvent::TurnTimeout { .. }));
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (events, rx) = ChannelEvents::new();
        drop(rx);
        events.ai_settled("g1", "bot");
    }

    #[test]
    fn test_event_json_tag() {
        let event = SessionEvent::TimeUpdate {
            session_id: "g1".into(),
            seconds_left: 3,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "time_update");
        assert_eq!(json["seconds_left"], 3);
    }
}
