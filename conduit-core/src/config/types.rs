use super::constants::*;
use crate::ring::{BackpressurePolicy, ProducerMode, WaitStrategyKind};
use crate::stage::FailurePolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Main configuration structure
///
/// Every field has a default, so `{}` is a valid configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub ring: RingConfig,
    pub stages: StageConfig,
    pub validation: ValidationConfig,
    pub risk: RiskConfig,
    pub gateway: GatewayConfig,
    pub audit: AuditConfig,
    pub logging: LoggingConfig,
}

/// Ring buffer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RingConfig {
    /// Slot count; must be a power of two
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Producer behaviour on a full ring: "block" or "reject"
    #[serde(default)]
    pub backpressure: BackpressurePolicy,

    /// Consumer suspension: "busy_spin", "yielding" or "blocking"
    #[serde(default)]
    pub wait_strategy: WaitStrategyKind,

    /// "single" or "multi"
    #[serde(default)]
    pub producer_mode: ProducerMode,
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            backpressure: BackpressurePolicy::default(),
            wait_strategy: WaitStrategyKind::default(),
            producer_mode: ProducerMode::default(),
        }
    }
}

/// Stage runner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    /// Park retries before an event is rejected
    #[serde(default = "default_max_park_retries")]
    pub max_park_retries: u32,

    /// Per-stage override of `max_park_retries`, keyed by stage name
    #[serde(default)]
    pub retry_overrides: HashMap<String, u32>,

    #[serde(default = "default_park_initial_delay_us")]
    pub park_initial_delay_us: u64,

    #[serde(default = "default_park_max_delay_us")]
    pub park_max_delay_us: u64,

    /// What a panic inside a stage does: "fail_event" or "fail_stage"
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// CPU cores for stage threads, in stage order (optional)
    #[serde(default)]
    pub pin_cores: Vec<usize>,
}

impl StageConfig {
    /// Retry limit for `stage`, honoring overrides
    pub fn retries_for(&self, stage: &str) -> u32 {
        self.retry_overrides
            .get(stage)
            .copied()
            .unwrap_or(self.max_park_retries)
    }
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            max_park_retries: default_max_park_retries(),
            retry_overrides: HashMap::new(),
            park_initial_delay_us: default_park_initial_delay_us(),
            park_max_delay_us: default_park_max_delay_us(),
            failure_policy: FailurePolicy::default(),
            pin_cores: Vec::new(),
        }
    }
}

/// Field-range limits for the Validation stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_max_quantity")]
    pub max_quantity: u64,

    /// Fixed-point, 9 decimals
    #[serde(default = "default_max_price")]
    pub max_price: u64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_quantity: default_max_quantity(),
            max_price: default_max_price(),
        }
    }
}

/// Limits enforced by the RiskCheck stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    #[serde(default = "default_max_order_quantity")]
    pub max_order_quantity: u64,

    /// Whole currency units
    #[serde(default = "default_max_order_notional")]
    pub max_order_notional: u64,

    /// Absolute net position per symbol, including open orders
    #[serde(default = "default_max_position")]
    pub max_position: i64,

    #[serde(default = "default_max_open_orders")]
    pub max_open_orders: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_order_quantity: default_max_order_quantity(),
            max_order_notional: default_max_order_notional(),
            max_position: default_max_position(),
            max_open_orders: default_max_open_orders(),
        }
    }
}

/// Wire session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_sender_comp_id")]
    pub sender_comp_id: String,

    #[serde(default = "default_target_comp_id")]
    pub target_comp_id: String,

    /// Correlation ids remembered for duplicate-send suppression
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            sender_comp_id: default_sender_comp_id(),
            target_comp_id: default_target_comp_id(),
            dedup_capacity: default_dedup_capacity(),
        }
    }
}

/// Audit sink configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// JSON-lines journal; in-memory sink when absent
    #[serde(default)]
    pub journal_path: Option<PathBuf>,

    #[serde(default = "default_audit_buffer")]
    pub buffer: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            journal_path: None,
            buffer: default_audit_buffer(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON output instead of the human-readable format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_capacity() -> usize {
    DEFAULT_RING_CAPACITY
}

fn default_max_park_retries() -> u32 {
    DEFAULT_MAX_PARK_RETRIES
}

fn default_park_initial_delay_us() -> u64 {
    DEFAULT_PARK_INITIAL_DELAY_US
}

fn default_park_max_delay_us() -> u64 {
    DEFAULT_PARK_MAX_DELAY_US
}

fn default_max_quantity() -> u64 {
    DEFAULT_MAX_QUANTITY
}

fn default_max_price() -> u64 {
    DEFAULT_MAX_PRICE
}

fn default_max_order_quantity() -> u64 {
    DEFAULT_MAX_ORDER_QUANTITY
}

fn default_max_order_notional() -> u64 {
    DEFAULT_MAX_ORDER_NOTIONAL
}

fn default_max_position() -> i64 {
    DEFAULT_MAX_POSITION
}

fn default_max_open_orders() -> usize {
    DEFAULT_MAX_OPEN_ORDERS
}

fn default_sender_comp_id() -> String {
    DEFAULT_SENDER_COMP_ID.to_string()
}

fn default_target_comp_id() -> String {
    DEFAULT_TARGET_COMP_ID.to_string()
}

fn default_dedup_capacity() -> usize {
    DEFAULT_DEDUP_CAPACITY
}

fn default_audit_buffer() -> usize {
    DEFAULT_AUDIT_BUFFER
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
