//! Outbound byte transport
//!
//! The session encodes frames; a transport only moves bytes. Sockets live
//! outside the core, so the shipped implementation hands frames to a
//! bounded crossbeam channel drained by whoever owns the connection.

use super::SendFailure;
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use std::sync::Arc;

pub trait OutboundTransport: Send + Sync {
    /// Write one complete frame without blocking
    fn send(&self, frame: &[u8]) -> Result<(), SendFailure>;
}

impl<T: OutboundTransport + ?Sized> OutboundTransport for Arc<T> {
    fn send(&self, frame: &[u8]) -> Result<(), SendFailure> {
        (**self).send(frame)
    }
}

/// Frames onto a bounded channel
#[derive(Debug, Clone)]
pub struct ChannelTransport {
    tx: Sender<Vec<u8>>,
}

impl ChannelTransport {
    /// Transport plus the receiving end for the connection writer
    pub fn bounded(capacity: usize) -> (Self, Receiver<Vec<u8>>) {
        let (tx, rx) = channel::bounded(capacity);
        (Self { tx }, rx)
    }
}

impl OutboundTransport for ChannelTransport {
    fn send(&self, frame: &[u8]) -> Result<(), SendFailure> {
        match self.tx.try_send(frame.to_vec()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(SendFailure::Busy),
            Err(TrySendError::Disconnected(_)) => Err(SendFailure::Disconnected),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_channel_is_busy() {
        let (transport, rx) = ChannelTransport::bounded(1);
        assert_eq!(transport.send(b"one"), Ok(()));
        assert_eq!(transport.send(b"two"), Err(SendFailure::Busy));

        assert_eq!(rx.try_recv().unwrap(), b"one".to_vec());
        assert_eq!(transport.send(b"three"), Ok(()));
    }

    #[test]
    fn test_dropped_receiver_disconnects() {
        let (transport, rx) = ChannelTransport::bounded(4);
        drop(rx);
        assert_eq!(transport.send(b"x"), Err(SendFailure::Disconnected));
    }
}
