//! The authoritative attack-state machine.
//!
//! [`StateStore`] owns the single [`AttackState`] and applies one
//! [`Command`] at a time. It is synchronous and lock-free; the engine
//! task is the only caller, which makes it the serialization point for
//! every transport and for the countdown driver.
//!
//! # Transitions
//!
//! | Command | From | Result |
//! |---------|------|--------|
//! | `Attack` | `Secure` | `UnderAttack`, countdown rearmed, history opened |
//! | `Attack` | `UnderAttack` / `Compromised` | no-op |
//! | `Defend` | `UnderAttack` | `Secure`, history closed |
//! | `Defend` | `Secure` / `Compromised` | no-op |
//! | `Tick` | `UnderAttack`, current episode | countdown - 1; `Compromised` at 0 |
//! | `Tick` | anything else | no-op (stale) |
//! | `Reset` | any | `Secure`, countdown full, history kept |
//!
//! Rejected commands are not errors: they return [`Effect::NoOp`].

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use siege_types::{
    AttackStarted, AttackState, AttackStopped, EpisodeId, EpisodeOutcome, HistoryRecord, Phase,
    ServerEvent, Snapshot, StateView, TimerUpdate,
};

use crate::command::Command;

/// Why a command produced no state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoOpReason {
    /// `Attack` while an episode is already running.
    AlreadyUnderAttack,
    /// `Attack` or `Defend` after the countdown ran out.
    AlreadyCompromised,
    /// `Defend` while `Secure`.
    NotUnderAttack,
    /// A tick for an episode that is no longer running.
    StaleTick,
}

/// What an applied command changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// A new episode started.
    AttackStarted {
        /// The new episode.
        episode: EpisodeId,
        /// Event payload.
        payload: AttackStarted,
    },
    /// The running episode was defended.
    AttackStopped {
        /// The episode that ended.
        episode: EpisodeId,
        /// Event payload.
        payload: AttackStopped,
    },
    /// The countdown advanced and is still above zero.
    Ticked {
        /// Seconds left.
        time_remaining: u32,
    },
    /// The countdown reached zero.
    Compromised {
        /// The episode that ended.
        episode: EpisodeId,
    },
    /// The system returned to `Secure`.
    Reset {
        /// The episode interrupted by the reset, if one was running.
        interrupted: Option<EpisodeId>,
    },
    /// The command's precondition did not hold.
    NoOp(NoOpReason),
}

impl Effect {
    /// Whether the command changed state.
    pub const fn is_applied(&self) -> bool {
        !matches!(self, Self::NoOp(_))
    }

    /// Whether the countdown must stop after this effect.
    pub const fn stops_countdown(&self) -> bool {
        matches!(
            self,
            Self::AttackStopped { .. } | Self::Compromised { .. } | Self::Reset { .. }
        )
    }

    /// Outbound events for this effect, in delivery order.
    pub fn events(&self) -> Vec<ServerEvent> {
        match self {
            Self::AttackStarted { payload, .. } => vec![ServerEvent::AttackStarted(payload.clone())],
            Self::AttackStopped { payload, .. } => vec![ServerEvent::AttackStopped(payload.clone())],
            Self::Ticked { time_remaining } => {
                vec![ServerEvent::Timer(TimerUpdate::new(*time_remaining))]
            }
            Self::Compromised { .. } => vec![
                ServerEvent::Timer(TimerUpdate::new(0)),
                ServerEvent::Compromised,
            ],
            Self::Reset { .. } => vec![ServerEvent::Reset],
            Self::NoOp(_) => Vec::new(),
        }
    }
}

/// Owner of the authoritative [`AttackState`].
#[derive(Debug, Clone)]
pub struct StateStore {
    state: AttackState,
    timer_ceiling: u32,
    max_history: usize,
}

impl StateStore {
    /// Create a store in `Secure` with a full countdown.
    ///
    /// A zero `timer_ceiling` is raised to one second; a zero
    /// `max_history` is raised to one record.
    pub fn new(timer_ceiling: u32, max_history: usize) -> Self {
        let timer_ceiling = timer_ceiling.max(1);
        Self {
            state: AttackState::new(timer_ceiling),
            timer_ceiling,
            max_history: max_history.max(1),
        }
    }

    /// Apply one command at time `now`.
    pub fn apply(&mut self, command: Command, now: DateTime<Utc>) -> Effect {
        match command {
            Command::Attack {
                attacker_id,
                attack_type,
            } => self.attack(attacker_id, attack_type, now),
            Command::Defend { defender_id } => self.defend(defender_id, now),
            Command::Tick { episode } => self.tick(episode, now),
            Command::Reset => self.reset(now),
        }
    }

    /// Read-only view of the current state.
    pub const fn state(&self) -> &AttackState {
        &self.state
    }

    /// Full state for queries.
    pub fn view(&self, total_users: u64) -> StateView {
        StateView {
            phase: self.state.phase,
            time_remaining: self.state.time_remaining,
            timer_ceiling: self.timer_ceiling,
            started_at: self.state.started_at,
            active_attackers: self.state.active_attackers.clone(),
            episode: self.state.episode,
            history: self.state.history.clone(),
            total_users,
        }
    }

    /// Catch-up state for a newly connected observer.
    pub fn snapshot(&self, total_users: u64) -> Snapshot {
        Snapshot {
            phase: self.state.phase,
            time_remaining: self.state.time_remaining,
            started_at: self.state.started_at,
            active_attackers: self.state.active_attackers.clone(),
            total_users,
        }
    }

    fn attack(&mut self, attacker_id: String, attack_type: String, now: DateTime<Utc>) -> Effect {
        match self.state.phase {
            Phase::UnderAttack => return Effect::NoOp(NoOpReason::AlreadyUnderAttack),
            Phase::Compromised => return Effect::NoOp(NoOpReason::AlreadyCompromised),
            Phase::Secure => {}
        }

        let episode = self.state.episode.next();
        self.state.phase = Phase::UnderAttack;
        self.state.episode = episode;
        self.state.time_remaining = self.timer_ceiling;
        self.state.started_at = Some(now);
        self.state.active_attackers = BTreeSet::from([attacker_id.clone()]);
        self.state.history.push(HistoryRecord::open(
            episode,
            attacker_id.clone(),
            attack_type.clone(),
            now,
        ));
        self.trim_history();

        Effect::AttackStarted {
            episode,
            payload: AttackStarted {
                attacker_id,
                attack_type,
                time_remaining: self.timer_ceiling,
                started_at: now,
            },
        }
    }

    fn defend(&mut self, defender_id: String, now: DateTime<Utc>) -> Effect {
        match self.state.phase {
            Phase::Secure => return Effect::NoOp(NoOpReason::NotUnderAttack),
            Phase::Compromised => return Effect::NoOp(NoOpReason::AlreadyCompromised),
            Phase::UnderAttack => {}
        }

        let episode = self.state.episode;
        if let Some(record) = self.state.open_record_mut() {
            record.close(EpisodeOutcome::Defended, Some(defender_id.clone()), now);
        }
        self.state.phase = Phase::Secure;
        self.state.active_attackers.clear();

        Effect::AttackStopped {
            episode,
            payload: AttackStopped {
                defender_id,
                timestamp: now,
            },
        }
    }

    fn tick(&mut self, episode: EpisodeId, now: DateTime<Utc>) -> Effect {
        if self.state.phase != Phase::UnderAttack || episode != self.state.episode {
            return Effect::NoOp(NoOpReason::StaleTick);
        }

        let remaining = self.state.time_remaining.saturating_sub(1);
        self.state.time_remaining = remaining;
        if remaining > 0 {
            return Effect::Ticked {
                time_remaining: remaining,
            };
        }

        if let Some(record) = self.state.open_record_mut() {
            record.close(EpisodeOutcome::Compromised, None, now);
        }
        self.state.phase = Phase::Compromised;
        Effect::Compromised { episode }
    }

    fn reset(&mut self, now: DateTime<Utc>) -> Effect {
        let interrupted = (self.state.phase == Phase::UnderAttack).then_some(self.state.episode);
        if let Some(record) = self.state.open_record_mut() {
            record.close(EpisodeOutcome::Reset, None, now);
        }
        // The episode counter survives so ticks armed before the reset stay stale.
        self.state.phase = Phase::Secure;
        self.state.time_remaining = self.timer_ceiling;
        self.state.started_at = None;
        self.state.active_attackers.clear();

        Effect::Reset { interrupted }
    }

    /// Drop the oldest closed records beyond the retention limit.
    fn trim_history(&mut self) {
        let excess = self.state.history.len().saturating_sub(self.max_history);
        if excess == 0 {
            return;
        }
        let closed_prefix = self
            .state
            .history
            .iter()
            .take(excess)
            .take_while(|r| !r.is_open())
            .count();
        self.state.history.drain(..closed_prefix);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    const CEILING: u32 = 5;

    fn store() -> StateStore {
        StateStore::new(CEILING, 100)
    }

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        t0().checked_add_signed(TimeDelta::seconds(secs)).unwrap()
    }

    fn attack(store: &mut StateStore, who: &str, now: DateTime<Utc>) -> Effect {
        store.apply(Command::attack(Some(who), None), now)
    }

    fn current_episode(store: &StateStore) -> EpisodeId {
        store.state().episode
    }

    #[test]
    fn starts_secure_with_full_timer() {
        let s = store();
        assert_eq!(s.state().phase, Phase::Secure);
        assert_eq!(s.state().time_remaining, CEILING);
        assert!(s.state().history.is_empty());
    }

    #[test]
    fn attack_from_secure_starts_episode() {
        let mut s = store();
        let effect = attack(&mut s, "alice", t0());

        let Effect::AttackStarted { episode, payload } = effect else {
            panic!("expected AttackStarted, got {effect:?}");
        };
        assert_eq!(episode, EpisodeId(1));
        assert_eq!(payload.attacker_id, "alice");
        assert_eq!(payload.attack_type, "manual");
        assert_eq!(payload.time_remaining, CEILING);

        let state = s.state();
        assert_eq!(state.phase, Phase::UnderAttack);
        assert_eq!(state.started_at, Some(t0()));
        assert!(state.active_attackers.contains("alice"));
        assert_eq!(state.history.len(), 1);
        assert!(state.open_record().is_some());
    }

    #[test]
    fn second_attack_is_a_noop() {
        let mut s = store();
        attack(&mut s, "alice", t0());
        s.apply(Command::Tick { episode: EpisodeId(1) }, at(1));

        let effect = attack(&mut s, "mallory", at(2));

        assert_eq!(effect, Effect::NoOp(NoOpReason::AlreadyUnderAttack));
        let state = s.state();
        assert_eq!(state.started_at, Some(t0()));
        assert_eq!(state.time_remaining, CEILING - 1);
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.active_attackers.len(), 1);
        assert!(state.active_attackers.contains("alice"));
    }

    #[test]
    fn defend_while_secure_is_a_noop() {
        let mut s = store();
        let effect = s.apply(Command::defend(Some("carol")), t0());
        assert_eq!(effect, Effect::NoOp(NoOpReason::NotUnderAttack));
        assert_eq!(s.state().phase, Phase::Secure);
        assert!(s.state().history.is_empty());
    }

    #[test]
    fn defend_closes_exactly_one_record() {
        let mut s = store();
        attack(&mut s, "bob", t0());
        s.apply(Command::Tick { episode: EpisodeId(1) }, at(1));
        s.apply(Command::Tick { episode: EpisodeId(1) }, at(2));

        let effect = s.apply(Command::defend(Some("carol")), at(2));

        assert!(matches!(effect, Effect::AttackStopped { .. }));
        let state = s.state();
        assert_eq!(state.phase, Phase::Secure);
        assert!(state.active_attackers.is_empty());
        assert_eq!(state.history.len(), 1);
        let record = state.history.first().cloned();
        let record = record.unwrap();
        assert_eq!(record.attacker_id, "bob");
        assert_eq!(record.closed_by.as_deref(), Some("carol"));
        assert_eq!(record.outcome, Some(EpisodeOutcome::Defended));
        let duration = record.duration_seconds.unwrap();
        assert!((duration - 2.0).abs() < 1e-9);
        assert!(state.open_record().is_none());
    }

    #[test]
    fn full_countdown_compromises_once() {
        let mut s = store();
        attack(&mut s, "alice", t0());
        let episode = current_episode(&s);

        let mut events = Vec::new();
        for i in 1..=i64::from(CEILING) {
            events.extend(s.apply(Command::Tick { episode }, at(i)).events());
        }

        let expected: Vec<ServerEvent> = [4, 3, 2, 1]
            .into_iter()
            .map(|t| ServerEvent::Timer(TimerUpdate::new(t)))
            .chain([
                ServerEvent::Timer(TimerUpdate::new(0)),
                ServerEvent::Compromised,
            ])
            .collect();
        assert_eq!(events, expected);
        assert_eq!(s.state().phase, Phase::Compromised);
        assert_eq!(s.state().time_remaining, 0);
        assert_eq!(
            s.state().history.first().and_then(|r| r.outcome),
            Some(EpisodeOutcome::Compromised)
        );

        // Further ticks are stale and emit nothing.
        let late = s.apply(Command::Tick { episode }, at(6));
        assert_eq!(late, Effect::NoOp(NoOpReason::StaleTick));
        assert!(late.events().is_empty());
        assert_eq!(s.state().time_remaining, 0);
    }

    #[test]
    fn only_episode_endings_stop_the_countdown() {
        let mut s = StateStore::new(2, 10);
        let started = attack(&mut s, "alice", t0());
        assert!(!started.stops_countdown());
        assert!(!s.apply(Command::attack(Some("bob"), None), at(1)).stops_countdown());

        let ticked = s.apply(Command::Tick { episode: EpisodeId(1) }, at(1));
        assert_eq!(ticked, Effect::Ticked { time_remaining: 1 });
        assert!(!ticked.stops_countdown());

        let compromised = s.apply(Command::Tick { episode: EpisodeId(1) }, at(2));
        assert!(compromised.stops_countdown());
        assert!(s.apply(Command::Reset, at(3)).stops_countdown());

        attack(&mut s, "carol", at(4));
        assert!(s.apply(Command::defend(None), at(5)).stops_countdown());
    }

    #[test]
    fn compromised_rejects_attack_and_defend() {
        let mut s = StateStore::new(1, 10);
        attack(&mut s, "alice", t0());
        s.apply(Command::Tick { episode: EpisodeId(1) }, at(1));
        assert_eq!(s.state().phase, Phase::Compromised);

        assert_eq!(
            attack(&mut s, "bob", at(2)),
            Effect::NoOp(NoOpReason::AlreadyCompromised)
        );
        assert_eq!(
            s.apply(Command::defend(None), at(2)),
            Effect::NoOp(NoOpReason::AlreadyCompromised)
        );
        assert_eq!(s.state().history.len(), 1);
    }

    #[test]
    fn reset_from_every_phase() {
        // Secure
        let mut s = store();
        assert_eq!(s.apply(Command::Reset, t0()), Effect::Reset { interrupted: None });

        // Under attack
        attack(&mut s, "alice", t0());
        s.apply(Command::Tick { episode: EpisodeId(1) }, at(1));
        let effect = s.apply(Command::Reset, at(1));
        assert_eq!(effect, Effect::Reset { interrupted: Some(EpisodeId(1)) });
        assert_eq!(s.state().phase, Phase::Secure);
        assert_eq!(s.state().time_remaining, CEILING);
        assert!(s.state().active_attackers.is_empty());
        assert!(s.state().started_at.is_none());

        // Compromised
        attack(&mut s, "bob", at(2));
        for i in 0..CEILING {
            s.apply(Command::Tick { episode: EpisodeId(2) }, at(3 + i64::from(i)));
        }
        assert_eq!(s.state().phase, Phase::Compromised);
        s.apply(Command::Reset, at(10));
        assert_eq!(s.state().phase, Phase::Secure);
        assert_eq!(s.state().time_remaining, CEILING);
        assert!(s.state().active_attackers.is_empty());
    }

    #[test]
    fn reset_preserves_history_and_closes_open_record() {
        let mut s = store();
        attack(&mut s, "alice", t0());
        s.apply(Command::defend(None), at(1));
        attack(&mut s, "bob", at(2));

        s.apply(Command::Reset, at(4));

        let history = &s.state().history;
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|r| !r.is_open()));
        assert_eq!(
            history.last().and_then(|r| r.outcome),
            Some(EpisodeOutcome::Reset)
        );
    }

    #[test]
    fn tick_from_previous_episode_is_stale() {
        let mut s = store();
        attack(&mut s, "alice", t0());
        s.apply(Command::defend(None), at(1));
        attack(&mut s, "bob", at(2));

        let effect = s.apply(Command::Tick { episode: EpisodeId(1) }, at(3));

        assert_eq!(effect, Effect::NoOp(NoOpReason::StaleTick));
        assert_eq!(s.state().time_remaining, CEILING);
    }

    #[test]
    fn tick_after_reset_is_stale_even_when_reattacked() {
        let mut s = store();
        attack(&mut s, "alice", t0());
        s.apply(Command::Reset, at(1));
        attack(&mut s, "alice", at(1));
        assert_eq!(current_episode(&s), EpisodeId(2));

        let effect = s.apply(Command::Tick { episode: EpisodeId(1) }, at(2));
        assert_eq!(effect, Effect::NoOp(NoOpReason::StaleTick));
    }

    #[test]
    fn time_remaining_stays_in_range() {
        let mut s = StateStore::new(3, 10);
        let commands = [
            Command::attack(None, None),
            Command::Tick { episode: EpisodeId(1) },
            Command::attack(None, None),
            Command::Tick { episode: EpisodeId(1) },
            Command::Tick { episode: EpisodeId(1) },
            Command::Tick { episode: EpisodeId(1) },
            Command::Tick { episode: EpisodeId(1) },
            Command::defend(None),
            Command::Reset,
            Command::attack(None, None),
            Command::defend(None),
            Command::Tick { episode: EpisodeId(2) },
        ];
        for (i, command) in commands.into_iter().enumerate() {
            s.apply(command, at(i64::try_from(i).unwrap()));
            assert!(s.state().time_remaining <= 3);
            let open = s.state().history.iter().filter(|r| r.is_open()).count();
            let expected_open = usize::from(s.state().phase == Phase::UnderAttack);
            assert_eq!(open, expected_open);
        }
    }

    #[test]
    fn history_retention_drops_oldest_closed() {
        let mut s = StateStore::new(CEILING, 2);
        for i in 0..4 {
            attack(&mut s, &format!("attacker-{i}"), at(i));
            s.apply(Command::defend(None), at(i));
        }
        attack(&mut s, "latest", at(10));

        let history = &s.state().history;
        assert_eq!(history.len(), 2);
        assert_eq!(history.last().map(|r| r.attacker_id.as_str()), Some("latest"));
        assert!(history.last().is_some_and(HistoryRecord::is_open));
    }

    #[test]
    fn snapshot_and_view_reflect_state() {
        let mut s = store();
        attack(&mut s, "alice", t0());
        s.apply(Command::Tick { episode: EpisodeId(1) }, at(1));

        let snap = s.snapshot(7);
        assert_eq!(snap.phase, Phase::UnderAttack);
        assert_eq!(snap.time_remaining, CEILING - 1);
        assert_eq!(snap.total_users, 7);

        let view = s.view(7);
        assert_eq!(view.timer_ceiling, CEILING);
        assert_eq!(view.history.len(), 1);
        assert_eq!(view.total_users, 7);
    }
}
