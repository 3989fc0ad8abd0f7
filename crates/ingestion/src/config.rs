//! Queue manager configuration

use contracts::QueueSettings;

use crate::error::{IngestionError, Result};

/// Resolved configuration for one `QueueManager`
///
/// Built from [`QueueSettings`]; construction fails on values that cannot be
/// run, so a bad config aborts startup instead of surfacing later.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueManagerConfig {
    /// Maximum number of messages processed concurrently
    pub max_concurrent: usize,

    /// Maximum number of admitted messages waiting for a slot
    pub max_size: usize,

    /// Backpressure threshold in percent of `max_size`
    pub backpressure_threshold: f64,

    /// Admissions per minute, `None` when rate limiting is disabled
    pub max_messages_per_minute: Option<u32>,

    /// Maximum message size in bytes
    pub max_message_size: usize,
}

impl Default for QueueManagerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 10,
            max_size: 200,
            backpressure_threshold: 80.0,
            max_messages_per_minute: None,
            max_message_size: 65_507,
        }
    }
}

impl QueueManagerConfig {
    /// Check that the configuration can be run
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            return Err(IngestionError::invalid_config(
                "message_queue.max_concurrent",
                "must be > 0",
            ));
        }

        if !self.backpressure_threshold.is_finite()
            || !(0.0..=100.0).contains(&self.backpressure_threshold)
        {
            return Err(IngestionError::invalid_config(
                "message_queue.backpressure_threshold",
                format!(
                    "must be within 0..=100, got {}",
                    self.backpressure_threshold
                ),
            ));
        }

        if self.max_messages_per_minute == Some(0) {
            return Err(IngestionError::invalid_config(
                "rate_limit.max_messages_per_minute",
                "must be > 0",
            ));
        }

        if self.max_message_size == 0 {
            return Err(IngestionError::invalid_config(
                "max_message_size",
                "must be > 0",
            ));
        }

        Ok(())
    }
}

impl TryFrom<&QueueSettings> for QueueManagerConfig {
    type Error = IngestionError;

    fn try_from(settings: &QueueSettings) -> Result<Self> {
        let max_messages_per_minute = if settings.rate_limit.enable {
            let max = settings.rate_limit.max_messages_per_minute.ok_or_else(|| {
                IngestionError::invalid_config(
                    "rate_limit.max_messages_per_minute",
                    "required when rate limiting is enabled",
                )
            })?;
            Some(max)
        } else {
            None
        };

        let config = Self {
            max_concurrent: settings.message_queue.max_concurrent,
            max_size: settings.message_queue.max_size,
            backpressure_threshold: settings.message_queue.backpressure_threshold,
            max_messages_per_minute,
            max_message_size: settings.max_message_size,
        };
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{MessageQueueConfig, RateLimitConfig};

    #[test]
    fn test_from_default_settings() {
        let config = QueueManagerConfig::try_from(&QueueSettings::default()).unwrap();
        assert_eq!(config, QueueManagerConfig::default());
    }

    #[test]
    fn test_rate_limit_requires_max() {
        let settings = QueueSettings {
            rate_limit: RateLimitConfig {
                enable: true,
                max_messages_per_minute: None,
            },
            ..Default::default()
        };
        let err = QueueManagerConfig::try_from(&settings).unwrap_err();
        assert!(err.to_string().contains("required when rate limiting"));
    }

    #[test]
    fn test_disabled_rate_limit_ignores_max() {
        let settings = QueueSettings {
            rate_limit: RateLimitConfig {
                enable: false,
                max_messages_per_minute: Some(10),
            },
            ..Default::default()
        };
        let config = QueueManagerConfig::try_from(&settings).unwrap();
        assert_eq!(config.max_messages_per_minute, None);
    }

    #[test]
    fn test_zero_concurrency_is_fatal() {
        let settings = QueueSettings {
            message_queue: MessageQueueConfig {
                max_concurrent: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            QueueManagerConfig::try_from(&settings),
            Err(IngestionError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn test_threshold_range() {
        let config = QueueManagerConfig {
            backpressure_threshold: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = QueueManagerConfig {
            backpressure_threshold: 100.0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
