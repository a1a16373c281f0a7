//! Event bus runtime configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Liveness, queueing and abuse limits of the broker
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct BusConfig {
    /// Seconds between liveness probes
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    /// Seconds without a pong before a connection is evicted
    #[serde(default = "default_pong_timeout")]
    pub pong_timeout_secs: u64,

    /// Frames buffered per connection before it counts as stalled
    #[serde(default = "default_outbound_queue_capacity")]
    pub outbound_queue_capacity: usize,

    /// Published events buffered ahead of fan-out
    #[serde(default = "default_publish_queue_capacity")]
    pub publish_queue_capacity: usize,

    /// Milliseconds fan-out waits on a full connection queue (0 = fail at once)
    #[serde(default)]
    pub send_timeout_ms: u64,

    /// Malformed frames tolerated per connection
    #[serde(default = "default_max_malformed_frames")]
    pub max_malformed_frames: u32,
}

impl BusConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    /// Validate bus configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.ping_interval_secs == 0 {
            return Err(ValidationError::MustBePositive("ping_interval_secs"));
        }
        if self.outbound_queue_capacity == 0 {
            return Err(ValidationError::MustBePositive("outbound_queue_capacity"));
        }
        if self.publish_queue_capacity == 0 {
            return Err(ValidationError::MustBePositive("publish_queue_capacity"));
        }
        if self.pong_timeout_secs <= self.ping_interval_secs {
            return Err(ValidationError::PongTimeoutTooShort);
        }
        Ok(())
    }
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            ping_interval_secs: default_ping_interval(),
            pong_timeout_secs: default_pong_timeout(),
            outbound_queue_capacity: default_outbound_queue_capacity(),
            publish_queue_capacity: default_publish_queue_capacity(),
            send_timeout_ms: 0,
            max_malformed_frames: default_max_malformed_frames(),
        }
    }
}

fn default_ping_interval() -> u64 {
    30
}

fn default_pong_timeout() -> u64 {
    60
}

fn default_outbound_queue_capacity() -> usize {
    64
}

fn default_publish_queue_capacity() -> usize {
    1024
}

fn default_max_malformed_frames() -> u32 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bus_config_defaults() {
        let config = BusConfig::default();
        assert_eq!(config.ping_interval(), Duration::from_secs(30));
        assert_eq!(config.pong_timeout(), Duration::from_secs(60));
        assert_eq!(config.send_timeout(), Duration::ZERO);
        assert_eq!(config.max_malformed_frames, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_timeout_must_exceed_interval() {
        let config = BusConfig {
            ping_interval_secs: 30,
            pong_timeout_secs: 30,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::PongTimeoutTooShort));
    }

    #[test]
    fn test_validation_rejects_zero_capacity() {
        let config = BusConfig {
            outbound_queue_capacity: 0,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ValidationError::MustBePositive("outbound_queue_capacity"))
        );
    }

    #[test]
    fn test_validation_rejects_zero_interval() {
        let config = BusConfig {
            ping_interval_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
