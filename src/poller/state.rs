//! Explicit poll state machine.
//!
//! `Idle -> Polling -> (Succeeded | Failed) -> Idle`, with `Halted` as the
//! terminal state after a fatal upstream error. The machine also carries the
//! circuit breaker: once `max_consecutive_failures` cycles in a row failed,
//! only every `probe_every`-th tick is allowed through until a success.

use serde::Serialize;

use crate::config::PollerConfig;

/// Where the poller is in its cycle.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PollPhase {
    /// Waiting for the next tick.
    Idle,
    /// Fetching, evaluating and writing.
    Polling,
    /// The cycle committed a snapshot.
    Succeeded,
    /// Every attempt in the cycle failed transiently.
    Failed,
    /// A fatal error stopped polling.
    Halted,
}

/// Upstream connectivity as shown to dashboard clients.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// No cycle has completed yet.
    Connecting,
    /// The last cycle succeeded.
    Connected,
    /// The last cycle failed; last-known-good data is being served.
    Degraded,
    /// Polling halted on a fatal error.
    Disconnected,
}

/// What to do with a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDecision {
    /// Run a cycle.
    Poll,
    /// Breaker open and this tick is not a probe.
    Skip,
    /// Polling has stopped for good.
    Halted,
}

/// Pure poll state, advanced by the poller and inspected by tests.
#[derive(Debug, Clone)]
pub struct PollMachine {
    phase: PollPhase,
    connection: ConnectionStatus,
    consecutive_failures: u32,
    ticks_while_open: u32,
    max_consecutive_failures: u32,
    probe_every: u32,
}

impl PollMachine {
    /// Fresh machine in `Idle` / `Connecting`.
    #[must_use]
    pub fn new(max_consecutive_failures: u32, probe_every: u32) -> Self {
        Self {
            phase: PollPhase::Idle,
            connection: ConnectionStatus::Connecting,
            consecutive_failures: 0,
            ticks_while_open: 0,
            max_consecutive_failures: max_consecutive_failures.max(1),
            probe_every: probe_every.max(1),
        }
    }

    /// Machine configured from poller settings.
    #[must_use]
    pub fn from_config(config: &PollerConfig) -> Self {
        Self::new(config.max_consecutive_failures, config.breaker_probe_every)
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> PollPhase {
        self.phase
    }

    /// Current connection status.
    #[must_use]
    pub fn connection(&self) -> ConnectionStatus {
        self.connection
    }

    /// Failed cycles since the last success.
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Whether the breaker is holding back ticks.
    #[must_use]
    pub fn breaker_open(&self) -> bool {
        self.consecutive_failures >= self.max_consecutive_failures
    }

    /// Decide what to do with a tick.
    pub fn on_tick(&mut self) -> TickDecision {
        if self.phase == PollPhase::Halted {
            return TickDecision::Halted;
        }
        if !self.breaker_open() {
            return TickDecision::Poll;
        }
        self.ticks_while_open += 1;
        if self.ticks_while_open % self.probe_every == 0 {
            TickDecision::Poll
        } else {
            TickDecision::Skip
        }
    }

    /// Enter `Polling`.
    pub fn begin(&mut self) {
        if self.phase != PollPhase::Halted {
            self.phase = PollPhase::Polling;
        }
    }

    /// The cycle committed.
    pub fn succeed(&mut self) {
        self.phase = PollPhase::Succeeded;
        self.connection = ConnectionStatus::Connected;
        self.consecutive_failures = 0;
        self.ticks_while_open = 0;
    }

    /// The cycle failed but may recover on a later tick.
    pub fn fail_transient(&mut self) {
        self.phase = PollPhase::Failed;
        self.connection = ConnectionStatus::Degraded;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    /// The cycle hit an error that retrying will not fix.
    pub fn fail_fatal(&mut self) {
        self.phase = PollPhase::Halted;
        self.connection = ConnectionStatus::Disconnected;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    /// Return to `Idle` after a finished cycle. `Halted` stays put.
    pub fn settle(&mut self) {
        if matches!(self.phase, PollPhase::Succeeded | PollPhase::Failed | PollPhase::Polling) {
            self.phase = PollPhase::Idle;
        }
    }
}
