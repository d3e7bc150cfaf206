//! Default values for every configurable knob
//!
//! Prices are fixed-point with 9 decimals; quantities are whole units.

use crate::core::fixed_point;

// ===== RING =====

/// Default ring capacity (slots)
pub const DEFAULT_RING_CAPACITY: usize = 1024;

// ===== STAGES =====

/// Park retries before a parked event is rejected
pub const DEFAULT_MAX_PARK_RETRIES: u32 = 3;

/// First retry delay after a Park outcome (microseconds)
pub const DEFAULT_PARK_INITIAL_DELAY_US: u64 = 50;

/// Ceiling on the exponential retry delay (microseconds)
pub const DEFAULT_PARK_MAX_DELAY_US: u64 = 5_000;

// ===== VALIDATION =====

/// Largest order quantity Validation accepts
pub const DEFAULT_MAX_QUANTITY: u64 = 1_000_000;

/// Largest limit price Validation accepts: 1,000,000.0
pub const DEFAULT_MAX_PRICE: u64 = fixed_point::from_units(1_000_000);

// ===== RISK =====

/// Largest single order RiskCheck allows
pub const DEFAULT_MAX_ORDER_QUANTITY: u64 = 10_000;

/// Largest single order notional (quantity x price), whole currency units
pub const DEFAULT_MAX_ORDER_NOTIONAL: u64 = 10_000_000;

/// Absolute net position limit per symbol, whole units
pub const DEFAULT_MAX_POSITION: i64 = 100_000;

/// Open orders allowed at once
pub const DEFAULT_MAX_OPEN_ORDERS: usize = 1_000;

// ===== GATEWAY =====

/// Correlation ids remembered by the dedup boundary
pub const DEFAULT_DEDUP_CAPACITY: usize = 65_536;

pub const DEFAULT_SENDER_COMP_ID: &str = "CONDUIT";
pub const DEFAULT_TARGET_COMP_ID: &str = "EXCHANGE";

// ===== AUDIT =====

/// Channel depth in front of the journal writer
pub const DEFAULT_AUDIT_BUFFER: usize = 4096;

// ===== LOGGING =====

pub const DEFAULT_LOG_LEVEL: &str = "info";

pub const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
