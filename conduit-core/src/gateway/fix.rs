//! FIX 4.4 tag=value codec
//!
//! Parsing borrows from the input buffer: a [`FixMessage`] is a list of
//! `(tag, value)` slices, no copies. Fields may be delimited by SOH (0x01)
//! or by `|` for human-written messages; the delimiter is detected per
//! message. When tag 10 is present its checksum is verified.
//!
//! Application messages mapped to events:
//!
//! | MsgType | Event | Order id tag |
//! |---|---|---|
//! | D NewOrderSingle | NewOrder | 11 ClOrdID |
//! | F OrderCancelRequest | CancelOrder | 41 OrigClOrdID |
//! | 8 ExecutionReport | ExecutionReport | 11 ClOrdID |
//! | W MarketDataSnapshot | MarketDataTick | - |
//!
//! The inbound MsgSeqNum (34) becomes the event's correlation id, so a
//! retransmitted message keeps its identity.

use super::DecodeError;
use crate::core::{
    clock, fixed_point, CancelOrder, CorrelationId, EventPayload, ExecType, ExecutionReport,
    MarketDataTick, NewOrder, OrderId, OrderType, Side, Symbol, TradingEvent,
};

pub const SOH: u8 = 0x01;
pub const BEGIN_STRING: &str = "FIX.4.4";

pub mod tags {
    pub const BEGIN_STRING: u32 = 8;
    pub const BODY_LENGTH: u32 = 9;
    pub const CHECKSUM: u32 = 10;
    pub const CL_ORD_ID: u32 = 11;
    pub const LAST_PX: u32 = 31;
    pub const LAST_QTY: u32 = 32;
    pub const MSG_SEQ_NUM: u32 = 34;
    pub const MSG_TYPE: u32 = 35;
    pub const ORDER_QTY: u32 = 38;
    pub const ORD_TYPE: u32 = 40;
    pub const ORIG_CL_ORD_ID: u32 = 41;
    pub const PRICE: u32 = 44;
    pub const SENDER_COMP_ID: u32 = 49;
    pub const SENDING_TIME: u32 = 52;
    pub const SIDE: u32 = 54;
    pub const SYMBOL: u32 = 55;
    pub const TARGET_COMP_ID: u32 = 56;
    pub const TEXT: u32 = 58;
    pub const HEART_BT_INT: u32 = 108;
    pub const BID_PX: u32 = 132;
    pub const OFFER_PX: u32 = 133;
    pub const BID_SIZE: u32 = 134;
    pub const OFFER_SIZE: u32 = 135;
    pub const EXEC_TYPE: u32 = 150;
    pub const LEAVES_QTY: u32 = 151;
}

pub mod msg_types {
    pub const HEARTBEAT: &str = "0";
    pub const LOGOUT: &str = "5";
    pub const EXECUTION_REPORT: &str = "8";
    pub const LOGON: &str = "A";
    pub const NEW_ORDER_SINGLE: &str = "D";
    pub const ORDER_CANCEL_REQUEST: &str = "F";
    pub const MARKET_DATA_SNAPSHOT: &str = "W";
}

/// FIX checksum: byte sum modulo 256
#[inline]
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

fn parse_u64(text: &[u8]) -> Option<u64> {
    if text.is_empty() {
        return None;
    }
    text.iter().try_fold(0u64, |acc, &b| {
        if !b.is_ascii_digit() {
            return None;
        }
        acc.checked_mul(10)?.checked_add((b - b'0') as u64)
    })
}

fn parse_u128(text: &[u8]) -> Option<u128> {
    if text.is_empty() {
        return None;
    }
    text.iter().try_fold(0u128, |acc, &b| {
        if !b.is_ascii_digit() {
            return None;
        }
        acc.checked_mul(10)?.checked_add((b - b'0') as u128)
    })
}

fn invalid(tag: u32, value: &[u8]) -> DecodeError {
    DecodeError::InvalidValue {
        tag,
        value: String::from_utf8_lossy(value).into_owned(),
    }
}

/// Parsed tag=value message borrowing the input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixMessage<'a> {
    fields: Vec<(u32, &'a [u8])>,
}

impl<'a> FixMessage<'a> {
    pub fn parse(raw: &'a [u8]) -> Result<Self, DecodeError> {
        let end = raw
            .iter()
            .rposition(|&b| b != b'\n' && b != b'\r')
            .map(|i| i + 1)
            .unwrap_or(0);
        let raw = &raw[..end];
        if raw.is_empty() {
            return Err(DecodeError::Empty);
        }

        let delimiter = if raw.contains(&SOH) { SOH } else { b'|' };
        let mut fields = Vec::with_capacity(16);
        let mut checksum_field = None;
        let mut offset = 0;

        for part in raw.split(|&b| b == delimiter) {
            let start = offset;
            offset += part.len() + 1;
            if part.is_empty() {
                continue;
            }

            let eq = part
                .iter()
                .position(|&b| b == b'=')
                .ok_or(DecodeError::MalformedField { offset: start })?;
            let tag = parse_u64(&part[..eq])
                .filter(|&t| t > 0 && t <= u32::MAX as u64)
                .ok_or(DecodeError::MalformedField { offset: start })? as u32;
            let value = &part[eq + 1..];

            if tag == tags::CHECKSUM {
                checksum_field = Some((start, value));
            }
            fields.push((tag, value));
        }

        if fields.is_empty() {
            return Err(DecodeError::Empty);
        }

        if let Some((start, value)) = checksum_field {
            let declared = parse_u64(value)
                .filter(|&v| v <= u8::MAX as u64)
                .ok_or_else(|| invalid(tags::CHECKSUM, value))? as u8;
            let computed = checksum(&raw[..start]);
            if declared != computed {
                return Err(DecodeError::ChecksumMismatch { declared, computed });
            }
        }

        Ok(Self { fields })
    }

    /// First value for `tag`
    pub fn get(&self, tag: u32) -> Option<&'a [u8]> {
        self.fields.iter().find(|(t, _)| *t == tag).map(|(_, v)| *v)
    }

    pub fn require(&self, tag: u32) -> Result<&'a [u8], DecodeError> {
        self.get(tag).ok_or(DecodeError::MissingTag { tag })
    }

    pub fn msg_type(&self) -> Result<&'a [u8], DecodeError> {
        self.require(tags::MSG_TYPE)
    }

    pub fn u64_field(&self, tag: u32) -> Result<u64, DecodeError> {
        let value = self.require(tag)?;
        parse_u64(value).ok_or_else(|| invalid(tag, value))
    }

    /// Optional integer field, zero when absent
    pub fn u64_or_zero(&self, tag: u32) -> Result<u64, DecodeError> {
        match self.get(tag) {
            Some(value) => parse_u64(value).ok_or_else(|| invalid(tag, value)),
            None => Ok(0),
        }
    }

    /// Optional decimal field as fixed-point, zero when absent
    pub fn price_or_zero(&self, tag: u32) -> Result<u64, DecodeError> {
        match self.get(tag) {
            Some(value) => fixed_point::parse(value).ok_or_else(|| invalid(tag, value)),
            None => Ok(0),
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (u32, &'a [u8])> + '_ {
        self.fields.iter().copied()
    }

    fn order_id(&self, tag: u32) -> Result<OrderId, DecodeError> {
        let value = self.require(tag)?;
        parse_u128(value)
            .map(OrderId)
            .ok_or_else(|| invalid(tag, value))
    }

    fn symbol(&self) -> Result<Symbol, DecodeError> {
        let value = self.require(tags::SYMBOL)?;
        Symbol::from_bytes(value).ok_or_else(|| invalid(tags::SYMBOL, value))
    }

    fn side(&self) -> Result<Side, DecodeError> {
        match self.require(tags::SIDE)? {
            b"1" => Ok(Side::Buy),
            b"2" => Ok(Side::Sell),
            other => Err(invalid(tags::SIDE, other)),
        }
    }

    fn ord_type(&self) -> Result<OrderType, DecodeError> {
        match self.require(tags::ORD_TYPE)? {
            b"1" => Ok(OrderType::Market),
            b"2" => Ok(OrderType::Limit),
            other => Err(invalid(tags::ORD_TYPE, other)),
        }
    }

    fn exec_type(&self, leaves: u64) -> Result<ExecType, DecodeError> {
        match self.require(tags::EXEC_TYPE)? {
            b"0" => Ok(ExecType::New),
            b"1" => Ok(ExecType::PartialFill),
            b"2" => Ok(ExecType::Fill),
            b"4" => Ok(ExecType::Canceled),
            b"8" => Ok(ExecType::Rejected),
            // FIX 4.4 trade: leaves quantity tells partial from full
            b"F" if leaves == 0 => Ok(ExecType::Fill),
            b"F" => Ok(ExecType::PartialFill),
            other => Err(invalid(tags::EXEC_TYPE, other)),
        }
    }
}

/// Maps messages to events and encodes outbound frames
#[derive(Debug, Clone)]
pub struct FixCodec {
    sender_comp_id: String,
    target_comp_id: String,
    delimiter: u8,
}

impl FixCodec {
    pub fn new(sender_comp_id: impl Into<String>, target_comp_id: impl Into<String>) -> Self {
        Self {
            sender_comp_id: sender_comp_id.into(),
            target_comp_id: target_comp_id.into(),
            delimiter: SOH,
        }
    }

    /// Encode with `|` instead of SOH (logs and tests)
    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn delimiter(&self) -> u8 {
        self.delimiter
    }

    /// Map an application message to an unsequenced event
    ///
    /// The correlation id is the raw MsgSeqNum; a session scopes it to
    /// its logon epoch.
    pub fn decode_event(&self, msg: &FixMessage<'_>) -> Result<TradingEvent, DecodeError> {
        let correlation_id = CorrelationId(msg.u64_field(tags::MSG_SEQ_NUM)?);

        let payload = match msg.msg_type()? {
            b"D" => {
                let order_type = msg.ord_type()?;
                EventPayload::NewOrder(NewOrder {
                    order_id: msg.order_id(tags::CL_ORD_ID)?,
                    symbol: msg.symbol()?,
                    side: msg.side()?,
                    order_type,
                    quantity: msg.u64_field(tags::ORDER_QTY)?,
                    price: msg.price_or_zero(tags::PRICE)?,
                })
            }
            b"F" => EventPayload::CancelOrder(CancelOrder {
                order_id: msg.order_id(tags::ORIG_CL_ORD_ID)?,
                symbol: msg.symbol()?,
            }),
            b"8" => {
                let leaves_quantity = msg.u64_or_zero(tags::LEAVES_QTY)?;
                EventPayload::ExecutionReport(ExecutionReport {
                    order_id: msg.order_id(tags::CL_ORD_ID)?,
                    symbol: msg.symbol()?,
                    side: msg.side()?,
                    exec_type: msg.exec_type(leaves_quantity)?,
                    last_quantity: msg.u64_or_zero(tags::LAST_QTY)?,
                    last_price: msg.price_or_zero(tags::LAST_PX)?,
                    leaves_quantity,
                })
            }
            b"W" => EventPayload::MarketDataTick(MarketDataTick {
                symbol: msg.symbol()?,
                bid_price: msg.price_or_zero(tags::BID_PX)?,
                bid_quantity: msg.u64_or_zero(tags::BID_SIZE)?,
                ask_price: msg.price_or_zero(tags::OFFER_PX)?,
                ask_quantity: msg.u64_or_zero(tags::OFFER_SIZE)?,
            }),
            other => {
                return Err(DecodeError::UnsupportedMsgType {
                    msg_type: String::from_utf8_lossy(other).into_owned(),
                })
            }
        };

        Ok(TradingEvent::new(
            correlation_id,
            clock::wall_clock_ns(),
            payload,
        ))
    }

    /// Encode a full frame: header, `body`, checksum trailer
    pub fn encode(&self, msg_type: &str, seq_num: u64, body: &[(u32, String)]) -> Vec<u8> {
        let d = self.delimiter as char;
        let sending_time = chrono::Utc::now().format("%Y%m%d-%H:%M:%S%.3f");

        let mut inner = format!(
            "{}={}{d}{}={}{d}{}={}{d}{}={}{d}{}={}{d}",
            tags::MSG_TYPE,
            msg_type,
            tags::SENDER_COMP_ID,
            self.sender_comp_id,
            tags::TARGET_COMP_ID,
            self.target_comp_id,
            tags::MSG_SEQ_NUM,
            seq_num,
            tags::SENDING_TIME,
            sending_time,
        );
        for (tag, value) in body {
            inner.push_str(&format!("{}={}{d}", tag, value));
        }

        let mut frame = format!(
            "{}={}{d}{}={}{d}{}",
            tags::BEGIN_STRING,
            BEGIN_STRING,
            tags::BODY_LENGTH,
            inner.len(),
            inner
        )
        .into_bytes();
        let sum = checksum(&frame);
        frame.extend_from_slice(format!("{}={:03}{d}", tags::CHECKSUM, sum).as_bytes());
        frame
    }

    /// Outbound frame for an order event; `None` for other event kinds
    pub fn encode_event(&self, event: &TradingEvent, seq_num: u64) -> Option<Vec<u8>> {
        match &event.payload {
            EventPayload::NewOrder(order) => {
                let side = match order.side {
                    Side::Buy => "1",
                    Side::Sell => "2",
                };
                let mut body = vec![
                    (tags::CL_ORD_ID, order.order_id.to_string()),
                    (tags::SYMBOL, order.symbol.to_string()),
                    (tags::SIDE, side.to_string()),
                    (tags::ORDER_QTY, order.quantity.to_string()),
                ];
                match order.order_type {
                    OrderType::Limit => {
                        body.push((tags::ORD_TYPE, "2".to_string()));
                        body.push((tags::PRICE, fixed_point::format(order.price)));
                    }
                    OrderType::Market => body.push((tags::ORD_TYPE, "1".to_string())),
                }
                Some(self.encode(msg_types::NEW_ORDER_SINGLE, seq_num, &body))
            }
            EventPayload::CancelOrder(cancel) => {
                let body = [
                    (tags::CL_ORD_ID, event.correlation_id.to_string()),
                    (tags::ORIG_CL_ORD_ID, cancel.order_id.to_string()),
                    (tags::SYMBOL, cancel.symbol.to_string()),
                ];
                Some(self.encode(msg_types::ORDER_CANCEL_REQUEST, seq_num, &body))
            }
            EventPayload::ExecutionReport(_) | EventPayload::MarketDataTick(_) => None,
        }
    }
}
