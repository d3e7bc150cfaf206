//! Zero-overhead core types for order-flow events
//!
//! All types in this module are designed for:
//! - Zero heap allocations
//! - Copy semantics (events live inside pre-allocated ring slots)
//! - Minimal memory footprint

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;
use std::time::{Instant, SystemTime};

/// Unique identifier for an order
///
/// Uses u128 instead of String for zero-allocation, copy semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct OrderId(pub u128);

impl OrderId {
    /// Sentinel for "no order id supplied"
    pub const NONE: OrderId = OrderId(0);

    #[inline(always)]
    pub const fn new(id: u128) -> Self {
        Self(id)
    }

    #[inline(always)]
    pub const fn as_u128(&self) -> u128 {
        self.0
    }

    #[inline(always)]
    pub const fn is_none(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u128> for OrderId {
    #[inline(always)]
    fn from(id: u128) -> Self {
        Self(id)
    }
}

/// Key used to deduplicate side effects at collaborator boundaries
///
/// Replaying an event after crash-recovery reuses its correlation id, so
/// external sends keyed by it are applied at most once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct CorrelationId(pub u64);

impl CorrelationId {
    pub const NONE: CorrelationId = CorrelationId(0);

    #[inline(always)]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    #[inline(always)]
    pub const fn is_none(&self) -> bool {
        self.0 == 0
    }

    /// Id for an inbound message, unique across sessions and re-logons
    ///
    /// Layout: session id (16 bits) | logon epoch (16 bits) | MsgSeqNum
    /// (32 bits). The epoch wraps after 65535 logons. Returns `None` when
    /// the sequence number needs more than 32 bits.
    pub fn scoped(session_id: u16, epoch: u64, seq_num: u64) -> Option<Self> {
        let seq_num = u32::try_from(seq_num).ok()?;
        let epoch = epoch & 0xFFFF;
        Some(Self(
            ((session_id as u64) << 48) | (epoch << 32) | seq_num as u64,
        ))
    }

    pub const fn session_id(&self) -> u16 {
        (self.0 >> 48) as u16
    }

    pub const fn seq_num(&self) -> u32 {
        self.0 as u32
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order side (Buy or Sell)
///
/// Single byte enum for minimal size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Side {
    Buy = 0,
    Sell = 1,
}

impl Side {
    /// +1 for buys, -1 for sells
    #[inline(always)]
    pub const fn sign(&self) -> i64 {
        match self {
            Side::Buy => 1,
            Side::Sell => -1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum OrderType {
    Limit = 0,
    Market = 1,
}

/// Execution report type (FIX tag 150 subset)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ExecType {
    New = 0,
    PartialFill = 1,
    Fill = 2,
    Canceled = 4,
    Rejected = 8,
}

impl ExecType {
    /// Whether this report carries traded quantity
    #[inline(always)]
    pub const fn is_fill(&self) -> bool {
        matches!(self, ExecType::PartialFill | ExecType::Fill)
    }
}

/// Maximum symbol length stored inline
pub const SYMBOL_CAPACITY: usize = 16;

/// Instrument symbol stored inline (no heap allocation)
///
/// Unused trailing bytes are zero. An all-zero symbol is "empty".
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Symbol([u8; SYMBOL_CAPACITY]);

impl Symbol {
    pub const EMPTY: Symbol = Symbol([0; SYMBOL_CAPACITY]);

    /// Build a symbol from ASCII bytes
    ///
    /// Returns None if the input is longer than [`SYMBOL_CAPACITY`] or
    /// contains a NUL byte.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() > SYMBOL_CAPACITY || bytes.contains(&0) {
            return None;
        }
        let mut buf = [0u8; SYMBOL_CAPACITY];
        buf[..bytes.len()].copy_from_slice(bytes);
        Some(Self(buf))
    }

    /// Build a symbol from a string slice
    pub fn new(s: &str) -> Option<Self> {
        Self::from_bytes(s.as_bytes())
    }

    pub fn len(&self) -> usize {
        self.0.iter().position(|&b| b == 0).unwrap_or(SYMBOL_CAPACITY)
    }

    pub fn is_empty(&self) -> bool {
        self.0[0] == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0[..self.len()]
    }

    /// Symbol as text (non-UTF-8 symbols render as "?")
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(self.as_bytes()).unwrap_or("?")
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.as_str())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Symbol {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Symbol {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Symbol::new(&s).ok_or_else(|| serde::de::Error::custom(format!("invalid symbol '{}'", s)))
    }
}

/// Fixed-point price helpers (9 decimal places)
///
/// Prices travel through the pipeline as u64 in units of 1e-9.
pub mod fixed_point {
    /// Scale factor: 1.0 == 1_000_000_000
    pub const SCALE: u64 = 1_000_000_000;

    /// Number of fractional digits
    pub const DECIMALS: usize = 9;

    /// Convert a whole-unit value to fixed-point
    #[inline(always)]
    pub const fn from_units(units: u64) -> u64 {
        units * SCALE
    }

    /// Convert fixed-point to f64 (display / reporting only)
    #[inline]
    pub fn to_f64(value: u64) -> f64 {
        value as f64 / SCALE as f64
    }

    /// Parse a decimal string ("101.25") into fixed-point without floats
    ///
    /// Returns None on malformed input, overflow, or more than 9 decimals.
    pub fn parse(text: &[u8]) -> Option<u64> {
        if text.is_empty() {
            return None;
        }
        let (int_part, frac_part) = match text.iter().position(|&b| b == b'.') {
            Some(dot) => (&text[..dot], &text[dot + 1..]),
            None => (text, &[][..]),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }
        if frac_part.len() > DECIMALS {
            return None;
        }

        let mut whole: u64 = 0;
        for &b in int_part {
            if !b.is_ascii_digit() {
                return None;
            }
            whole = whole.checked_mul(10)?.checked_add((b - b'0') as u64)?;
        }

        let mut frac: u64 = 0;
        for &b in frac_part {
            if !b.is_ascii_digit() {
                return None;
            }
            frac = frac * 10 + (b - b'0') as u64;
        }
        for _ in frac_part.len()..DECIMALS {
            frac *= 10;
        }

        whole.checked_mul(SCALE)?.checked_add(frac)
    }

    /// Render fixed-point as a decimal string with trailing zeros trimmed
    pub fn format(value: u64) -> String {
        let whole = value / SCALE;
        let frac = value % SCALE;
        if frac == 0 {
            return whole.to_string();
        }
        let frac = format!("{:09}", frac);
        format!("{}.{}", whole, frac.trim_end_matches('0'))
    }
}

/// Clock helpers
///
/// `monotonic_ns` is used for latency measurement; `wall_clock_ns` for
/// event and audit timestamps.
pub mod clock {
    use super::*;

    fn epoch() -> &'static Instant {
        static EPOCH: OnceLock<Instant> = OnceLock::new();
        EPOCH.get_or_init(Instant::now)
    }

    /// Nanoseconds since the first call in this process (monotonic)
    #[inline]
    pub fn monotonic_ns() -> u64 {
        epoch().elapsed().as_nanos() as u64
    }

    /// Nanoseconds since the UNIX epoch (0 if the system clock is before it)
    #[inline]
    pub fn wall_clock_ns() -> u64 {
        SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    }
}
