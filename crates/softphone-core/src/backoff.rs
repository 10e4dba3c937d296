//! Backoff scheduling for reconnection attempts
//!
//! A [`BackoffScheduler`] only computes delays. Waiting is the caller's job,
//! and every reconnection episode builds a fresh scheduler so no state leaks
//! from one disconnect to the next.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// Configuration for backoff behavior
///
/// # Examples
///
/// ```rust
/// use softphone_core::backoff::BackoffConfig;
/// use std::time::Duration;
///
/// let config = BackoffConfig::default();
/// assert_eq!(config.initial_delay(), Duration::from_millis(2000));
/// assert_eq!(config.max_delay(), Duration::from_millis(60000));
/// assert_eq!(config.multiplier, 2.0);
/// assert!(!config.use_jitter);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Delay before the first attempt of an episode, in milliseconds
    pub initial_delay_ms: u64,
    /// Ceiling for any delay, in milliseconds
    pub max_delay_ms: u64,
    /// Growth factor applied after each failed attempt
    pub multiplier: f64,
    /// Spread returned delays by +/-10%
    pub use_jitter: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 2000,
            max_delay_ms: 60000,
            multiplier: 2.0,
            use_jitter: false,
        }
    }
}

impl BackoffConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> ClientResult<()> {
        if self.initial_delay_ms == 0 {
            return Err(ClientError::InvalidConfiguration {
                field: "backoff.initial_delay_ms".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(ClientError::InvalidConfiguration {
                field: "backoff.max_delay_ms".to_string(),
                reason: format!(
                    "must not be below initial delay ({} < {})",
                    self.max_delay_ms, self.initial_delay_ms
                ),
            });
        }
        if self.multiplier.is_nan() || self.multiplier < 1.0 {
            return Err(ClientError::InvalidConfiguration {
                field: "backoff.multiplier".to_string(),
                reason: format!("must be at least 1.0, got {}", self.multiplier),
            });
        }
        Ok(())
    }
}

/// Exponential backoff state for one reconnection episode
///
/// ```rust
/// use softphone_core::backoff::{BackoffConfig, BackoffScheduler};
///
/// let mut backoff = BackoffScheduler::new(BackoffConfig::default());
/// let delays: Vec<u128> = (0..7).map(|_| backoff.next_delay().as_millis()).collect();
/// assert_eq!(delays, vec![2000, 4000, 8000, 16000, 32000, 60000, 60000]);
/// ```
#[derive(Debug, Clone)]
pub struct BackoffScheduler {
    config: BackoffConfig,
    current: Option<Duration>,
    attempts: u32,
}

impl BackoffScheduler {
    pub fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            current: None,
            attempts: 0,
        }
    }

    /// Delay to wait before the next attempt
    ///
    /// The first call of an episode yields the initial delay; every following
    /// call grows the previous delay by the multiplier, capped at the maximum.
    pub fn next_delay(&mut self) -> Duration {
        let max = self.config.max_delay();
        let delay = match self.current {
            None => self.config.initial_delay().min(max),
            Some(previous) => {
                let grown = previous.as_millis() as f64 * self.config.multiplier;
                if grown >= max.as_millis() as f64 {
                    max
                } else {
                    Duration::from_millis(grown as u64)
                }
            }
        };
        self.current = Some(delay);
        self.attempts += 1;

        if self.config.use_jitter {
            let jitter = (rand::random::<f64>() - 0.5) * 0.2;
            let millis = delay.as_millis() as f64 * (1.0 + jitter);
            Duration::from_millis(millis as u64).min(max)
        } else {
            delay
        }
    }

    /// Last delay handed out, before jitter
    pub fn current_delay(&self) -> Option<Duration> {
        self.current
    }

    /// Number of delays handed out so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Start over from the initial delay
    pub fn reset(&mut self) {
        self.current = None;
        self.attempts = 0;
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }
}
