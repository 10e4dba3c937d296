//! Configuration for the softphone resilience layer
//!
//! # Examples
//!
//! ```rust
//! use softphone_core::SoftphoneConfig;
//!
//! let config = SoftphoneConfig::new()
//!     .with_device_id("device-42")
//!     .with_queue_pickup("62282928016");
//!
//! assert_eq!(config.device_id.as_deref(), Some("device-42"));
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backoff::BackoffConfig;
use crate::error::{ClientError, ClientResult};

/// Reconnection behavior of the transport watchdog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectConfig {
    /// Delay progression between restart attempts
    pub backoff: BackoffConfig,
    /// Restart on a network-online signal even if the transport looks open
    pub restart_on_online_when_healthy: bool,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffConfig::default(),
            restart_on_online_when_healthy: true,
        }
    }
}

/// Presentation of user-visible notifications
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// How long an outbound-call failure stays on screen, in seconds
    pub outbound_failure_duration_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            outbound_failure_duration_secs: 10,
        }
    }
}

impl NotificationConfig {
    pub fn outbound_failure_duration(&self) -> Duration {
        Duration::from_secs(self.outbound_failure_duration_secs)
    }
}

/// Automatic pickup of calls proceeding in a call queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickupConfig {
    /// Extension id of the call queue to watch
    pub queue_extension_id: String,
    /// Delay between seeing the call and picking it up, in milliseconds
    #[serde(default = "default_pickup_delay_ms")]
    pub delay_ms: u64,
}

fn default_pickup_delay_ms() -> u64 {
    5000
}

impl PickupConfig {
    pub fn new(queue_extension_id: impl Into<String>) -> Self {
        Self {
            queue_extension_id: queue_extension_id.into(),
            delay_ms: default_pickup_delay_ms(),
        }
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Configuration for a [`Softphone`](crate::Softphone)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoftphoneConfig {
    pub reconnect: ReconnectConfig,
    pub notifications: NotificationConfig,
    /// Queue auto-pickup; disabled when absent
    pub pickup: Option<PickupConfig>,
    /// Device id of this phone as known to the remote API
    pub device_id: Option<String>,
    /// Capacity of the phone event broadcast channel
    pub event_channel_capacity: usize,
}

impl Default for SoftphoneConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectConfig::default(),
            notifications: NotificationConfig::default(),
            pickup: None,
            device_id: None,
            event_channel_capacity: 256,
        }
    }
}

impl SoftphoneConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> ClientResult<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| ClientError::InvalidConfiguration {
            field: "<root>".to_string(),
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.reconnect.backoff = backoff;
        self
    }

    pub fn with_restart_on_online_when_healthy(mut self, enabled: bool) -> Self {
        self.reconnect.restart_on_online_when_healthy = enabled;
        self
    }

    pub fn with_device_id(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn with_queue_pickup(mut self, queue_extension_id: impl Into<String>) -> Self {
        self.pickup = Some(PickupConfig::new(queue_extension_id));
        self
    }

    pub fn with_pickup(mut self, pickup: PickupConfig) -> Self {
        self.pickup = Some(pickup);
        self
    }

    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }

    pub fn validate(&self) -> ClientResult<()> {
        self.reconnect.backoff.validate()?;
        if self.event_channel_capacity == 0 {
            return Err(ClientError::InvalidConfiguration {
                field: "event_channel_capacity".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if let Some(pickup) = &self.pickup {
            if pickup.queue_extension_id.is_empty() {
                return Err(ClientError::InvalidConfiguration {
                    field: "pickup.queue_extension_id".to_string(),
                    reason: "must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }
}
