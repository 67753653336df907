//! Reconnect state machine for the live feed.
//!
//! Pure bookkeeping: no sockets, no timers. The feed driver reports
//! channel events here and acts on the returned `ReconnectDecision`.
//!
//! ```text
//! Idle ─connect─▶ Connecting ─open─▶ Open
//!                     ▲                │ close
//!                     │ retry          ▼
//!                     └──── Closed { retry_pending: true }
//!                                      │ budget spent / disconnect
//!                                      ▼
//!                            Closed { retry_pending: false }
//! ```

use std::time::Duration;

/// Default number of reconnect attempts before giving up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default base delay; the k-th retry waits `k × base`.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

/// Connection state of a feed client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FeedState {
    /// Never connected.
    #[default]
    Idle,
    /// Channel open in progress.
    Connecting,
    /// Channel established; messages flow and `send` is allowed.
    Open,
    /// Channel closed. `retry_pending` is false once the client has
    /// stopped for good (budget exhausted or explicit disconnect).
    Closed { retry_pending: bool },
}

impl FeedState {
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Open)
    }

    /// Closed with no reconnect coming.
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Closed { retry_pending: false })
    }
}

impl std::fmt::Display for FeedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Connecting => write!(f, "connecting"),
            Self::Open => write!(f, "open"),
            Self::Closed { retry_pending: true } => write!(f, "closed (retrying)"),
            Self::Closed { retry_pending: false } => write!(f, "closed"),
        }
    }
}

/// Retry budget parameters, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Linear backoff: attempt `k` (1-based) waits `base_delay × k`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

/// What the driver should do after a close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    /// Reopen after `delay`; this is retry number `attempt`.
    Retry { attempt: u32, delay: Duration },
    /// Budget spent; stop permanently.
    Exhausted { attempts: u32 },
}

/// Enumerated state plus attempt counter.
///
/// Open failures and mid-session drops are budgeted identically: both
/// arrive as `on_close`, and only `on_open` refunds the budget.
#[derive(Debug, Clone)]
pub struct ReconnectMachine {
    policy: RetryPolicy,
    state: FeedState,
    attempts: u32,
}

impl ReconnectMachine {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            state: FeedState::Idle,
            attempts: 0,
        }
    }

    pub const fn state(&self) -> FeedState {
        self.state
    }

    /// Retries consumed since the last successful open.
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    pub const fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// A channel open is starting (first connect or a scheduled retry).
    pub fn on_connecting(&mut self) {
        self.state = FeedState::Connecting;
    }

    /// The channel is established.
    pub fn on_open(&mut self) {
        self.state = FeedState::Open;
        self.attempts = 0;
    }

    /// The channel closed (or never opened). Applies the retry policy.
    pub fn on_close(&mut self) -> ReconnectDecision {
        if self.attempts < self.policy.max_attempts {
            self.attempts += 1;
            self.state = FeedState::Closed {
                retry_pending: true,
            };
            ReconnectDecision::Retry {
                attempt: self.attempts,
                delay: self.policy.delay_for(self.attempts),
            }
        } else {
            self.state = FeedState::Closed {
                retry_pending: false,
            };
            ReconnectDecision::Exhausted {
                attempts: self.attempts,
            }
        }
    }

    /// Explicit stop by the owner. Terminal, idempotent.
    pub fn on_disconnect(&mut self) {
        self.state = FeedState::Closed {
            retry_pending: false,
        };
    }
}
