//! Countdown driver.
//!
//! [`TimerDriver`] owns at most one background task that sends a
//! [`Command::Tick`] into the engine mailbox once per interval. Ticks
//! carry the episode they were armed for, and the store rejects any tick
//! whose episode has ended. Cancellation aborts the task, but
//! correctness never depends on the abort winning a race with an
//! in-flight tick.

use std::time::Duration;

use siege_types::EpisodeId;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::debug;

use crate::command::Command;
use crate::engine::EngineMessage;

/// A running countdown task.
#[derive(Debug)]
struct ArmedTimer {
    episode: EpisodeId,
    handle: JoinHandle<()>,
}

/// Drives the once-per-interval tick while an episode runs.
#[derive(Debug)]
pub struct TimerDriver {
    period: Duration,
    mailbox: mpsc::WeakSender<EngineMessage>,
    active: Option<ArmedTimer>,
}

impl TimerDriver {
    /// Create an idle driver that will tick every `period`.
    ///
    /// The driver holds a weak sender so a running countdown never keeps
    /// the engine alive on its own.
    pub(crate) fn new(period: Duration, mailbox: mpsc::WeakSender<EngineMessage>) -> Self {
        Self {
            period,
            mailbox,
            active: None,
        }
    }

    /// Start ticking for `episode`, cancelling any previous countdown.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn arm(&mut self, episode: EpisodeId) {
        self.cancel();

        let period = self.period;
        let mailbox = self.mailbox.clone();
        let handle = tokio::spawn(async move {
            let start = Instant::now().checked_add(period).unwrap_or_else(Instant::now);
            let mut interval = time::interval_at(start, period);
            // Catch up after a stall so the countdown tracks elapsed time.
            interval.set_missed_tick_behavior(MissedTickBehavior::Burst);
            loop {
                interval.tick().await;
                let Some(tx) = mailbox.upgrade() else {
                    return;
                };
                let tick = EngineMessage::Command {
                    command: Command::Tick { episode },
                    respond_to: None,
                };
                if tx.send(tick).await.is_err() {
                    return;
                }
            }
        });

        debug!(%episode, ?period, "Countdown armed");
        self.active = Some(ArmedTimer { episode, handle });
    }

    /// Stop the countdown, if one is running.
    pub fn cancel(&mut self) {
        if let Some(armed) = self.active.take() {
            armed.handle.abort();
            debug!(episode = %armed.episode, "Countdown cancelled");
        }
    }

    /// Whether a countdown task is currently armed.
    pub const fn is_armed(&self) -> bool {
        self.active.is_some()
    }

    /// Episode the running countdown belongs to.
    pub fn armed_episode(&self) -> Option<EpisodeId> {
        self.active.as_ref().map(|armed| armed.episode)
    }
}

impl Drop for TimerDriver {
    fn drop(&mut self) {
        self.cancel();
    }
}
