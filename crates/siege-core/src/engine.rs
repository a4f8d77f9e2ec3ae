//! The single serialized command path.
//!
//! [`spawn_engine`] starts one task that owns the [`StateStore`] and the
//! [`TimerDriver`]. Every mutation (REST call, `WebSocket` message, or
//! countdown tick) travels through the same bounded mailbox and is
//! applied to completion before the next one is read, so commands can
//! never interleave. For each applied command the task, in order:
//!
//! 1. applies it to the store,
//! 2. publishes the resulting events to all observers,
//! 3. arms or cancels the countdown,
//! 4. replies to the caller.
//!
//! Subscriptions are created on the same path: the snapshot and the
//! broadcast receiver are taken between two commands, so a late joiner
//! sees either the snapshot alone or the snapshot followed by every
//! later event.

use std::sync::Arc;
use std::time::Duration;

use siege_types::{AttackRequest, DefendRequest, ServerEvent, Snapshot, StateView};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::broadcast::Broadcaster;
use crate::clock::Clock;
use crate::command::Command;
use crate::config::SiegeConfig;
use crate::session::SessionRegistry;
use crate::store::{Effect, StateStore};
use crate::timer::TimerDriver;

/// Default number of queued commands before callers wait.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 256;

/// Errors returned by [`EngineHandle`] calls.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The engine task has stopped and no longer accepts commands.
    #[error("engine unavailable: {0}")]
    Unavailable(String),
}

/// Runtime parameters for the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Countdown start value in seconds.
    pub timer_ceiling: u32,
    /// Real time between countdown ticks.
    pub tick_interval: Duration,
    /// History retention limit.
    pub max_history: usize,
    /// Events buffered per observer.
    pub broadcast_capacity: usize,
    /// Commands buffered in the mailbox.
    pub mailbox_capacity: usize,
}

impl EngineSettings {
    /// Derive settings from the service configuration.
    pub fn from_config(config: &SiegeConfig) -> Self {
        Self {
            timer_ceiling: config.countdown.timer_ceiling_secs,
            tick_interval: config.countdown.tick_interval(),
            max_history: config.history.max_records,
            broadcast_capacity: config.broadcast.capacity,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&SiegeConfig::default())
    }
}

/// Result of a caller-issued command.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    /// What the command changed.
    pub effect: Effect,
    /// State right after the command.
    pub view: StateView,
}

impl CommandOutcome {
    /// Whether the command changed state (`false` for a no-op).
    pub const fn applied(&self) -> bool {
        self.effect.is_applied()
    }
}

/// A new observer's catch-up state plus its live event stream.
#[derive(Debug)]
pub struct Subscription {
    /// State at the moment of subscribing.
    pub snapshot: Snapshot,
    /// Every event published after the snapshot was taken.
    pub receiver: broadcast::Receiver<ServerEvent>,
}

/// Messages processed by the engine task.
#[derive(Debug)]
pub(crate) enum EngineMessage {
    /// Apply a command, optionally replying with the outcome.
    Command {
        command: Command,
        respond_to: Option<oneshot::Sender<CommandOutcome>>,
    },
    /// Read the full state.
    Query {
        respond_to: oneshot::Sender<StateView>,
    },
    /// Take a snapshot and subscribe atomically.
    Subscribe {
        respond_to: oneshot::Sender<Subscription>,
    },
}

/// Cloneable handle to the engine task.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    sender: mpsc::Sender<EngineMessage>,
    sessions: Arc<SessionRegistry>,
    broadcaster: Broadcaster,
}

impl EngineHandle {
    /// Start an attack. Returns the state after the command, whether or
    /// not it was accepted.
    pub async fn attack(&self, request: &AttackRequest) -> Result<CommandOutcome, EngineError> {
        self.submit(Command::from(request)).await
    }

    /// Defend against the running attack.
    pub async fn defend(&self, request: &DefendRequest) -> Result<CommandOutcome, EngineError> {
        self.submit(Command::from(request)).await
    }

    /// Return the system to `Secure`.
    pub async fn reset(&self) -> Result<CommandOutcome, EngineError> {
        self.submit(Command::Reset).await
    }

    /// Full current state plus the connected-observer count.
    pub async fn query_state(&self) -> Result<StateView, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineMessage::Query { respond_to: tx }).await?;
        rx.await
            .map_err(|e| EngineError::Unavailable(format!("response receive failed: {e}")))
    }

    /// Snapshot the state and subscribe to subsequent events.
    pub async fn subscribe(&self) -> Result<Subscription, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineMessage::Subscribe { respond_to: tx }).await?;
        rx.await
            .map_err(|e| EngineError::Unavailable(format!("response receive failed: {e}")))
    }

    /// The observer registry.
    pub const fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// The event channel.
    pub const fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    async fn submit(&self, command: Command) -> Result<CommandOutcome, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.send(EngineMessage::Command {
            command,
            respond_to: Some(tx),
        })
        .await?;
        rx.await
            .map_err(|e| EngineError::Unavailable(format!("response receive failed: {e}")))
    }

    async fn send(&self, message: EngineMessage) -> Result<(), EngineError> {
        self.sender
            .send(message)
            .await
            .map_err(|e| EngineError::Unavailable(format!("channel send failed: {e}")))
    }
}

/// Start the engine task.
///
/// The task runs until every [`EngineHandle`] clone is dropped. Must be
/// called from within a Tokio runtime.
pub fn spawn_engine(settings: &EngineSettings, clock: Arc<dyn Clock>) -> (EngineHandle, JoinHandle<()>) {
    let (sender, receiver) = mpsc::channel(settings.mailbox_capacity.max(1));
    let broadcaster = Broadcaster::new(settings.broadcast_capacity);
    let sessions = Arc::new(SessionRegistry::new(broadcaster.clone(), Arc::clone(&clock)));

    let engine = Engine {
        store: StateStore::new(settings.timer_ceiling, settings.max_history),
        timer: TimerDriver::new(settings.tick_interval, sender.downgrade()),
        broadcaster: broadcaster.clone(),
        sessions: Arc::clone(&sessions),
        clock,
        receiver,
    };

    info!(
        timer_ceiling = settings.timer_ceiling,
        tick_interval = ?settings.tick_interval,
        max_history = settings.max_history,
        "Attack-state engine starting"
    );
    let task = tokio::spawn(engine.run());

    let handle = EngineHandle {
        sender,
        sessions,
        broadcaster,
    };
    (handle, task)
}

/// State owned by the engine task.
struct Engine {
    store: StateStore,
    timer: TimerDriver,
    broadcaster: Broadcaster,
    sessions: Arc<SessionRegistry>,
    clock: Arc<dyn Clock>,
    receiver: mpsc::Receiver<EngineMessage>,
}

impl Engine {
    async fn run(mut self) {
        while let Some(message) = self.receiver.recv().await {
            self.handle(message);
        }
        self.timer.cancel();
        info!("Attack-state engine stopped");
    }

    fn handle(&mut self, message: EngineMessage) {
        match message {
            EngineMessage::Command {
                command,
                respond_to,
            } => {
                let effect = self.apply(command);
                if let Some(tx) = respond_to {
                    let outcome = CommandOutcome {
                        effect,
                        view: self.store.view(self.sessions.count()),
                    };
                    if tx.send(outcome).is_err() {
                        debug!("Command caller went away before the reply");
                    }
                }
            }
            EngineMessage::Query { respond_to } => {
                let view = self.store.view(self.sessions.count());
                if respond_to.send(view).is_err() {
                    debug!("Query caller went away before the reply");
                }
            }
            EngineMessage::Subscribe { respond_to } => {
                let (total_users, receiver) = self.sessions.subscribe();
                let subscription = Subscription {
                    snapshot: self.store.snapshot(total_users),
                    receiver,
                };
                if respond_to.send(subscription).is_err() {
                    debug!("Subscriber went away before the snapshot");
                }
            }
        }
    }

    fn apply(&mut self, command: Command) -> Effect {
        let name = command.name();
        let effect = self.store.apply(command, self.clock.now());
        let receivers = self.broadcaster.publish_effect(&effect);

        if effect.stops_countdown() {
            self.timer.cancel();
        }

        match &effect {
            Effect::AttackStarted { episode, payload } => {
                self.timer.arm(*episode);
                info!(
                    %episode,
                    attacker_id = %payload.attacker_id,
                    attack_type = %payload.attack_type,
                    time_remaining = payload.time_remaining,
                    receivers,
                    "Attack started"
                );
            }
            Effect::AttackStopped { episode, payload } => {
                info!(%episode, defender_id = %payload.defender_id, receivers, "Attack defended");
            }
            Effect::Compromised { episode } => {
                warn!(%episode, receivers, "System compromised: countdown reached zero");
            }
            Effect::Reset { interrupted } => {
                info!(interrupted = ?interrupted, receivers, "System reset");
            }
            Effect::Ticked { time_remaining } => {
                debug!(time_remaining, receivers, "Countdown tick");
            }
            Effect::NoOp(reason) => {
                debug!(command = name, ?reason, phase = %self.store.state().phase, "Command had no effect");
            }
        }

        effect
    }
}
