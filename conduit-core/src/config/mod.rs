pub mod constants;
pub mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

impl PipelineConfig {
    /// Load configuration from a JSON file and validate it
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {:?}", path))?;
        Self::from_json(&text)
            .with_context(|| format!("Invalid configuration in {:?}", path))
    }

    /// Parse and validate a JSON document
    pub fn from_json(text: &str) -> Result<Self> {
        let cfg: PipelineConfig =
            serde_json::from_str(text).context("Failed to deserialize configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        // Ring
        if self.ring.capacity < crate::ring::MIN_CAPACITY || !self.ring.capacity.is_power_of_two()
        {
            anyhow::bail!(
                "ring.capacity must be a power of two >= {}, got {}",
                crate::ring::MIN_CAPACITY,
                self.ring.capacity
            );
        }

        // Stages
        if self.stages.park_initial_delay_us == 0 {
            anyhow::bail!("stages.park_initial_delay_us must be positive");
        }

        if self.stages.park_max_delay_us < self.stages.park_initial_delay_us {
            anyhow::bail!(
                "stages.park_max_delay_us ({}) cannot be below park_initial_delay_us ({})",
                self.stages.park_max_delay_us,
                self.stages.park_initial_delay_us
            );
        }

        // Validation limits
        if self.validation.max_quantity == 0 {
            anyhow::bail!("validation.max_quantity must be positive");
        }

        if self.validation.max_price == 0 {
            anyhow::bail!("validation.max_price must be positive");
        }

        // Risk limits
        if self.risk.max_order_quantity == 0 {
            anyhow::bail!("risk.max_order_quantity must be positive");
        }

        if self.risk.max_order_notional == 0 {
            anyhow::bail!("risk.max_order_notional must be positive");
        }

        if self.risk.max_position <= 0 {
            anyhow::bail!("risk.max_position must be positive");
        }

        if self.risk.max_order_quantity as i128 > self.risk.max_position as i128 {
            anyhow::bail!("risk.max_order_quantity cannot exceed risk.max_position");
        }

        if self.risk.max_open_orders == 0 {
            anyhow::bail!("risk.max_open_orders must be positive");
        }

        // Gateway
        if self.gateway.sender_comp_id.is_empty() || self.gateway.target_comp_id.is_empty() {
            anyhow::bail!("gateway comp ids must not be empty");
        }

        if self.gateway.dedup_capacity == 0 {
            anyhow::bail!("gateway.dedup_capacity must be positive");
        }

        // Audit
        if self.audit.buffer == 0 {
            anyhow::bail!("audit.buffer must be positive");
        }

        // Logging
        if !constants::VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            anyhow::bail!(
                "Invalid log level '{}', must be one of: {:?}",
                self.logging.level,
                constants::VALID_LOG_LEVELS
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::{BackpressurePolicy, ProducerMode, WaitStrategyKind};
    use crate::stage::FailurePolicy;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.ring.capacity, constants::DEFAULT_RING_CAPACITY);
        assert_eq!(config.stages.failure_policy, FailurePolicy::FailEvent);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = PipelineConfig::from_json("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_partial_document() {
        let config = PipelineConfig::from_json(
            r#"{
                "ring": { "capacity": 8, "backpressure": "reject", "wait_strategy": "busy_spin",
                          "producer_mode": "multi" },
                "stages": { "max_park_retries": 5, "retry_overrides": { "router": 10 },
                            "failure_policy": "fail_stage" },
                "logging": { "level": "debug", "json": true }
            }"#,
        )
        .unwrap();

        assert_eq!(config.ring.capacity, 8);
        assert_eq!(config.ring.backpressure, BackpressurePolicy::Reject);
        assert_eq!(config.ring.wait_strategy, WaitStrategyKind::BusySpin);
        assert_eq!(config.ring.producer_mode, ProducerMode::Multi);
        assert_eq!(config.stages.retries_for("router"), 10);
        assert_eq!(config.stages.retries_for("validation"), 5);
        assert_eq!(config.stages.failure_policy, FailurePolicy::FailStage);
        assert!(config.logging.json);
        // Untouched sections keep their defaults
        assert_eq!(config.risk, RiskConfig::default());
    }

    #[test]
    fn test_config_validation() {
        let mut config = PipelineConfig::default();

        config.ring.capacity = 1000;
        assert!(config.validate().is_err());
        config.ring.capacity = 1;
        assert!(config.validate().is_err());
        config.ring.capacity = 2;
        assert!(config.validate().is_ok());

        config.stages.park_max_delay_us = 1;
        config.stages.park_initial_delay_us = 10;
        assert!(config.validate().is_err());
        config.stages = StageConfig::default();

        config.risk.max_order_quantity = (config.risk.max_position + 1) as u64;
        assert!(config.validate().is_err());
        config.risk = RiskConfig::default();

        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
        config.logging.level = "warn".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{ "ring": {{ "capacity": 64 }} }}"#).unwrap();
        let config = PipelineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.ring.capacity, 64);

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        writeln!(bad, r#"{{ "ring": {{ "capacity": 63 }} }}"#).unwrap();
        assert!(PipelineConfig::from_file(bad.path()).is_err());

        assert!(PipelineConfig::from_file("/nonexistent/conduit.json").is_err());
    }
}
