//! Retransmission policy.
//!
//! Only timeouts are retried. A retransmission resends the identical
//! datagram, so the agent sees the same request-id every time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// How many times to retransmit after a timeout, and how long to wait first.
///
/// ```rust
/// use snmp_manager::Retry;
/// use std::time::Duration;
///
/// // Send once, never retransmit
/// let retry = Retry::none();
///
/// // Two retransmissions, 200ms apart
/// let retry = Retry::fixed(2, Duration::from_millis(200));
///
/// // Exponential backoff with jitter: ~100ms, ~200ms, ~400ms
/// let retry = Retry::exponential(3)
///     .initial_delay(Duration::from_millis(100))
///     .jitter(0.1)
///     .build();
/// assert_eq!(retry.max_attempts, 3);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Retry {
    /// Retransmissions after the first send (0 = send once)
    pub max_attempts: u32,
    /// Delay before each retransmission
    pub backoff: Backoff,
}

/// Delay strategy between retransmissions.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Backoff {
    /// Retransmit as soon as the timeout expires.
    #[default]
    None,

    /// Wait the same delay before every retransmission.
    Fixed {
        /// Delay before each retransmission
        delay: Duration,
    },

    /// Double the delay after each retransmission, up to `max`.
    Exponential {
        /// Delay before the first retransmission
        initial: Duration,
        /// Cap
        max: Duration,
        /// Randomization factor in [0.0, 1.0]; 0.25 means ±25%
        jitter: f64,
    },
}

impl Default for Retry {
    /// Two retransmissions, no delay.
    fn default() -> Self {
        Self {
            max_attempts: 2,
            backoff: Backoff::None,
        }
    }
}

impl Retry {
    /// Send once; a timeout is final.
    pub fn none() -> Self {
        Self {
            max_attempts: 0,
            backoff: Backoff::None,
        }
    }

    /// `attempts` retransmissions with no delay.
    pub fn immediate(attempts: u32) -> Self {
        Self {
            max_attempts: attempts,
            backoff: Backoff::None,
        }
    }

    /// `attempts` retransmissions, each preceded by `delay`.
    pub fn fixed(attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: attempts,
            backoff: Backoff::Fixed { delay },
        }
    }

    /// Start building an exponential policy with `attempts` retransmissions.
    pub fn exponential(attempts: u32) -> RetryBuilder {
        RetryBuilder {
            max_attempts: attempts,
            ..Default::default()
        }
    }

    /// Delay before retransmission number `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match &self.backoff {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed { delay } => *delay,
            Backoff::Exponential {
                initial,
                max,
                jitter,
            } => {
                let multiplier = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
                let capped = initial.saturating_mul(multiplier).min(*max);
                capped.mul_f64(jitter_factor(*jitter))
            }
        }
    }
}

/// Builder for [`Backoff::Exponential`] policies.
#[derive(Debug)]
pub struct RetryBuilder {
    max_attempts: u32,
    initial: Duration,
    max: Duration,
    jitter: f64,
}

impl Default for RetryBuilder {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            initial: Duration::from_millis(500),
            max: Duration::from_secs(5),
            jitter: 0.25,
        }
    }
}

impl RetryBuilder {
    /// Delay before the first retransmission (default 500ms).
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial = delay;
        self
    }

    /// Upper bound on any delay (default 5s).
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max = delay;
        self
    }

    /// Randomization factor, clamped to [0.0, 1.0] (default 0.25).
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Build the policy.
    pub fn build(self) -> Retry {
        Retry {
            max_attempts: self.max_attempts,
            backoff: Backoff::Exponential {
                initial: self.initial,
                max: self.max,
                jitter: self.jitter,
            },
        }
    }
}

impl From<RetryBuilder> for Retry {
    fn from(builder: RetryBuilder) -> Self {
        builder.build()
    }
}

static JITTER_SEQ: AtomicU64 = AtomicU64::new(0);

/// Pseudo-random factor in [1 - jitter, 1 + jitter].
fn jitter_factor(jitter: f64) -> f64 {
    if jitter <= 0.0 {
        return 1.0;
    }
    let hash = JITTER_SEQ
        .fetch_add(1, Ordering::Relaxed)
        .wrapping_mul(0x5851_f42d_4c95_7f2d);
    let unit = (hash >> 11) as f64 / (1u64 << 53) as f64;
    1.0 + (unit * 2.0 - 1.0) * jitter
}
