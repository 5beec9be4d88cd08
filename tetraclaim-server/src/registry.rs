//! Session registry and scheduling
//!
//! One `SessionRegistry` is created at service start. Each entry sits behind
//! its own mutex, which serializes every call, timer tick and AI step for that
//! session while other sessions run concurrently.
//!
//! After every operation the registry compares the session's activation
//! counter with the one it last scheduled for. On a change the old timer is
//! cancelled and the new turn state decides what runs next:
//! - `AwaitingHumanMove`: a one-second interval timer
//! - `AiThinking`: a one-shot task after a randomized delay
//! - `ItemPhase`, `Paused`: nothing (client-clocked or frozen)
//! - `Finished`: a final `game_finished` notification

use std::sync::{Arc, Weak};
use std::time::Duration;

use rustc_hash::FxHashMap;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, instrument};

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::events::SessionEvents;
use crate::session::{AiAction, Session, TickOutcome};
use crate::state::{
    ItemResult, MoveOutcome, MoveSubmission, PieceUsage, RankingEntry, SeatConfig, SessionId,
    SessionState, TurnState,
};

struct SessionEntry {
    session: Session,
    timer: Option<JoinHandle<()>>,
    /// Activation the current timer or AI task was scheduled for
    scheduled: Option<u64>,
    removed: bool,
}

impl SessionEntry {
    fn new(session: Session) -> Self {
        Self {
            session,
            timer: None,
            scheduled: None,
            removed: false,
        }
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

type EntryHandle = Arc<Mutex<SessionEntry>>;

/// Keyed map of live sessions
pub struct SessionRegistry {
    sessions: RwLock<FxHashMap<SessionId, EntryHandle>>,
    events: Arc<dyn SessionEvents>,
}

impl SessionRegistry {
    pub fn new(events: Arc<dyn SessionEvents>) -> Self {
        Self {
            sessions: RwLock::new(FxHashMap::default()),
            events,
        }
    }

    /// Create a session and schedule its first turn
    #[instrument(skip(self, seats, config))]
    pub async fn start_session(
        &self,
        session_id: &str,
        seats: Vec<SeatConfig>,
        config: SessionConfig,
    ) -> SessionResult<SessionState> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(session_id) {
            return Err(SessionError::SessionExists);
        }
        let session = Session::new(session_id, seats, config)?;
        let handle: EntryHandle = Arc::new(Mutex::new(SessionEntry::new(session)));
        let snapshot = {
            let mut entry = handle.lock().await;
            reschedule(&handle, &mut entry, &self.events);
            entry.session.snapshot()
        };
        sessions.insert(session_id.to_string(), handle);
        Ok(snapshot)
    }

    pub async fn submit_move(
        &self,
        session_id: &str,
        player_id: &str,
        submission: &MoveSubmission,
    ) -> SessionResult<MoveOutcome> {
        self.mutate(session_id, |s| s.submit_move(player_id, submission)).await
    }

    pub async fn settle_player(&self, session_id: &str, player_id: &str) -> SessionResult<SessionState> {
        self.mutate(session_id, |s| s.settle_player(player_id)).await
    }

    pub async fn use_item_card(
        &self,
        session_id: &str,
        player_id: &str,
        card_index: usize,
        target_id: Option<&str>,
    ) -> SessionResult<ItemResult> {
        self.mutate(session_id, |s| s.use_item_card(player_id, card_index, target_id))
            .await
    }

    pub async fn skip_item_phase(&self, session_id: &str, player_id: &str) -> SessionResult<SessionState> {
        self.mutate(session_id, |s| s.skip_item_phase(player_id)).await
    }

    pub async fn set_offline(&self, session_id: &str, player_id: &str) -> SessionResult<SessionState> {
        self.mutate(session_id, |s| s.set_offline(player_id)).await
    }

    pub async fn set_online(&self, session_id: &str, player_id: &str) -> SessionResult<SessionState> {
        self.mutate(session_id, |s| s.set_online(player_id)).await
    }

    pub async fn get_state(&self, session_id: &str) -> SessionResult<SessionState> {
        self.read(session_id, |s| Ok(s.snapshot())).await
    }

    pub async fn rankings(&self, session_id: &str) -> SessionResult<Vec<RankingEntry>> {
        self.read(session_id, |s| Ok(s.rankings())).await
    }

    pub async fn turn_time_limit(&self, session_id: &str, player_id: &str) -> SessionResult<u32> {
        self.read(session_id, |s| s.turn_time_limit(player_id)).await
    }

    pub async fn piece_usage(&self, session_id: &str, player_id: &str) -> SessionResult<PieceUsage> {
        self.read(session_id, |s| s.piece_usage(player_id)).await
    }

    /// Drop a session, cancelling its timer; pending AI tasks find it gone
    #[instrument(skip(self))]
    pub async fn remove_session(&self, session_id: &str) -> SessionResult<()> {
        let handle = self
            .sessions
            .write()
            .await
            .remove(session_id)
            .ok_or(SessionError::GameNotFound)?;
        let mut entry = handle.lock().await;
        entry.removed = true;
        entry.cancel_timer();
        entry.session.teardown();
        info!("session removed");
        Ok(())
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.read().await.keys().cloned().collect()
    }

    async fn handle(&self, session_id: &str) -> SessionResult<EntryHandle> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or(SessionError::GameNotFound)
    }

    /// Run a state-changing operation under the session lock, then reschedule
    async fn mutate<T>(
        &self,
        session_id: &str,
        op: impl FnOnce(&mut Session) -> SessionResult<T>,
    ) -> SessionResult<T> {
        let handle = self.handle(session_id).await?;
        let mut entry = handle.lock().await;
        if entry.removed {
            return Err(SessionError::GameNotFound);
        }
        let result = op(&mut entry.session);
        reschedule(&handle, &mut entry, &self.events);
        result
    }

    async fn read<T>(&self, session_id: &str, op: impl FnOnce(&Session) -> SessionResult<T>) -> SessionResult<T> {
        let handle = self.handle(session_id).await?;
        let entry = handle.lock().await;
        if entry.removed {
            return Err(SessionError::GameNotFound);
        }
        op(&entry.session)
    }
}

// ============================================================================
// SCHEDULING
// ============================================================================

/// Replace the session's timer or AI task if its activation moved on
fn reschedule(handle: &EntryHandle, entry: &mut SessionEntry, events: &Arc<dyn SessionEvents>) {
    let activation = entry.session.activation();
    if entry.removed || entry.scheduled == Some(activation) {
        return;
    }
    entry.scheduled = Some(activation);
    entry.cancel_timer();

    let state = entry.session.state();
    let session_id = state.session_id.clone();
    let player_id = state.current_player().player_id.clone();
    let time_left = state.time_left;
    let turn_state = state.turn_state;
    match turn_state {
        TurnState::AwaitingHumanMove => {
            events.turn_started(&session_id, &player_id, time_left);
            entry.timer = Some(spawn_timer(Arc::downgrade(handle), activation, events.clone()));
        }
        TurnState::ItemPhase => {
            events.turn_started(&session_id, &player_id, time_left);
        }
        TurnState::AiThinking => {
            events.turn_started(&session_id, &player_id, time_left);
            let delay = entry.session.think_delay();
            debug!(
                session_id = %session_id,
                player_id = %player_id,
                delay_ms = delay.as_millis() as u64,
                "AI scheduled"
            );
            spawn_ai(Arc::downgrade(handle), activation, delay, events.clone());
        }
        TurnState::Paused => {}
        TurnState::Finished => {
            events.game_finished(&session_id, &entry.session.rankings());
        }
    }
}

/// One tick per second against the live activation
fn spawn_timer(handle: Weak<Mutex<SessionEntry>>, activation: u64, events: Arc<dyn SessionEvents>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = Duration::from_secs(1);
        let mut ticks = interval_at(Instant::now() + period, period);
        loop {
            ticks.tick().await;
            let Some(handle) = handle.upgrade() else {
                break;
            };
            let mut entry = handle.lock().await;
            if entry.removed {
                break;
            }
            let session_id = entry.session.id().to_string();
            match entry.session.tick_second(activation) {
                TickOutcome::Stale => break,
                TickOutcome::Remaining(seconds) => events.time_update(&session_id, seconds),
                TickOutcome::TimedOut(report) => {
                    // This task is the timer being replaced; detach instead of aborting itself
                    entry.timer.take();
                    events.time_update(&session_id, 0);
                    events.turn_timeout(&session_id, &report.player_id);
                    reschedule(&handle, &mut entry, &events);
                    break;
                }
            }
        }
    })
}

/// Play an AI turn after `delay` unless the session moved on meanwhile
fn spawn_ai(handle: Weak<Mutex<SessionEntry>>, activation: u64, delay: Duration, events: Arc<dyn SessionEvents>) {
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let Some(handle) = handle.upgrade() else {
            debug!(activation, "AI callback for a removed session");
            return;
        };
        let mut entry = handle.lock().await;
        if entry.removed {
            return;
        }
        let Some(turn) = entry.session.run_ai_turn(activation) else {
            return;
        };
        let session_id = entry.session.id().to_string();
        if let Some(item) = &turn.item {
            events.ai_item_used(&session_id, item);
        }
        match &turn.action {
            AiAction::Moved(outcome) => events.ai_move_completed(&session_id, outcome),
            AiAction::Settled => events.ai_settled(&session_id, &turn.player_id),
        }
        reschedule(&handle, &mut entry, &events);
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NoopEvents;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(Arc::new(NoopEvents))
    }

    fn humans() -> Vec<SeatConfig> {
        vec![SeatConfig::human("a", "A"), SeatConfig::human("b", "B")]
    }

    #[tokio::test]
    async fn test_start_and_lookup() {
        let registry = registry();
        let state = registry
            .start_session("g1", humans(), SessionConfig::default())
            .await
            .unwrap();
        assert_eq!(state.session_id, "g1");
        assert_eq!(registry.session_count().await, 1);
        assert_eq!(
            registry
                .start_session("g1", humans(), SessionConfig::default())
                .await
                .unwrap_err(),
            SessionError::SessionExists
        );
        assert_eq!(
            registry.get_state("missing").await.unwrap_err(),
            SessionError::GameNotFound
        );
    }

    #[tokio::test]
    async fn test_remove_session() {
        let registry = registry();
        registry
            .start_session("g1", humans(), SessionConfig::default())
            .await
            .unwrap();
        registry.remove_session("g1").await.unwrap();
        assert_eq!(registry.session_count().await, 0);
        assert_eq!(
            registry.settle_player("g1", "a").await.unwrap_err(),
            SessionError::GameNotFound
        );
        assert_eq!(
            registry.remove_session("g1").await.unwrap_err(),
            SessionError::GameNotFound
        );
    }

    #[tokio::test]
    async fn test_invalid_seats_do_not_register() {
        let registry = registry();
        let err = registry
            .start_session("g1", vec![SeatConfig::human("a", "A")], SessionConfig::default())
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_SEATS");
        assert_eq!(registry.session_count().await, 0);
    }
}
