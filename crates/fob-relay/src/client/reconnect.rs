//! Reconnection state machine.
//!
//! The machine does no I/O and owns no timers. Each input returns the
//! [`ReconnectAction`]s the driver must perform, so backoff and budget
//! behavior can be tested without a clock.

use crate::config::ReconnectBudget;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Delay before the first retry; doubles on every further attempt.
pub const BASE_DELAY: Duration = Duration::from_millis(1000);

/// Upper bound (exclusive) of the random jitter added to each delay.
pub const MAX_JITTER: Duration = Duration::from_millis(100);

/// Source of the randomized part of a backoff delay.
pub trait Jitter: Send {
    /// A value in `[0, MAX_JITTER)`.
    fn next_jitter(&mut self) -> Duration;
}

/// Uniform jitter from a seeded RNG.
#[derive(Debug)]
pub struct RandomJitter(StdRng);

impl RandomJitter {
    pub fn new() -> Self {
        Self(StdRng::from_entropy())
    }
}

impl Default for RandomJitter {
    fn default() -> Self {
        Self::new()
    }
}

impl Jitter for RandomJitter {
    fn next_jitter(&mut self) -> Duration {
        let max = MAX_JITTER.as_millis() as u64;
        Duration::from_millis(self.0.gen_range(0..max))
    }
}

/// Constant jitter, for deterministic schedules.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedJitter(pub Duration);

impl Jitter for FixedJitter {
    fn next_jitter(&mut self) -> Duration {
        self.0.min(MAX_JITTER - Duration::from_millis(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Side effects requested by the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectAction {
    /// Open a new transport connection to the same URL.
    Connect,
    /// Drop the pending reconnect timer.
    CancelReconnect,
    /// Tell the application the connection was lost.
    NotifyClosed,
    /// Start a timer; call [`ReconnectMachine::on_timer`] when it fires.
    ScheduleReconnect { delay: Duration, attempt: u32 },
    /// Budget exhausted; no further attempts.
    GiveUp,
}

/// Backoff without jitter for 0-indexed attempt `retries`.
pub fn backoff_delay(retries: u32) -> Duration {
    BASE_DELAY.saturating_mul(2u32.saturating_pow(retries))
}

#[derive(Debug)]
pub struct ReconnectMachine<J: Jitter = RandomJitter> {
    phase: Phase,
    retries: u32,
    configured: ReconnectBudget,
    max_retries: ReconnectBudget,
    timer_pending: bool,
    jitter: J,
}

impl ReconnectMachine<RandomJitter> {
    pub fn new(budget: ReconnectBudget) -> Self {
        Self::with_jitter(budget, RandomJitter::new())
    }
}

impl<J: Jitter> ReconnectMachine<J> {
    pub fn with_jitter(budget: ReconnectBudget, jitter: J) -> Self {
        Self {
            phase: Phase::Disconnected,
            retries: 0,
            configured: budget,
            max_retries: budget,
            timer_pending: false,
            jitter,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Budget adopted on the next open.
    pub fn budget(&self) -> ReconnectBudget {
        self.configured
    }

    /// Budget announced by the server; applies to the current and later sockets.
    pub fn set_budget(&mut self, budget: ReconnectBudget) {
        self.configured = budget;
        self.max_retries = budget;
    }

    /// First connection attempt.
    pub fn start(&mut self) -> Vec<ReconnectAction> {
        match self.phase {
            Phase::Disconnected => {
                self.phase = Phase::Connecting;
                vec![ReconnectAction::Connect]
            }
            _ => Vec::new(),
        }
    }

    pub fn on_open(&mut self) -> Vec<ReconnectAction> {
        self.phase = Phase::Connected;
        self.retries = 0;
        self.max_retries = self.configured;

        if std::mem::take(&mut self.timer_pending) {
            vec![ReconnectAction::CancelReconnect]
        } else {
            Vec::new()
        }
    }

    /// The transport closed, or a connection attempt failed.
    pub fn on_close(&mut self) -> Vec<ReconnectAction> {
        if matches!(self.phase, Phase::Disconnected | Phase::Reconnecting) {
            return Vec::new();
        }

        let mut actions = Vec::new();
        if self.retries == 0 {
            actions.push(ReconnectAction::NotifyClosed);
        }

        if self.max_retries.allows(self.retries) {
            let delay = backoff_delay(self.retries) + self.jitter.next_jitter();
            self.retries += 1;
            self.phase = Phase::Reconnecting;
            self.timer_pending = true;
            actions.push(ReconnectAction::ScheduleReconnect {
                delay,
                attempt: self.retries,
            });
        } else {
            self.phase = Phase::Disconnected;
            actions.push(ReconnectAction::GiveUp);
        }
        actions
    }

    /// The reconnect timer fired.
    pub fn on_timer(&mut self) -> Vec<ReconnectAction> {
        if self.phase != Phase::Reconnecting || !self.timer_pending {
            return Vec::new();
        }
        self.timer_pending = false;
        self.phase = Phase::Connecting;
        vec![ReconnectAction::Connect]
    }
}
