// SPDX-FileCopyrightText: 2026 blinry <mail@blinry.org>
// SPDX-FileCopyrightText: 2026 zormit <nt4u@kpvn.de>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The `Transport` trait: the abstract seam between a connection actor and
//! whatever bidirectional, message-framed channel carries `Msg` frames.
//!
//! Grounded on `internal/server/random_test.go`'s `ws` test double, which
//! already has exactly this shape (`ReadJSON`/`WriteJSON` plus four timeout
//! operations) because it stands in for the WebSocket transport in tests.
//! `InMemoryTransport` here plays the same role: a paired duplex channel
//! used by the connection test harness and `tests/convergence.rs`. A real
//! WebSocket-backed transport is out of scope (spec §1) but would implement
//! this same trait.

use crate::error::FocusError;
use crate::protocol::Msg;
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

#[async_trait]
pub trait Transport: Send {
    async fn read_frame(&mut self) -> Result<Msg, FocusError>;
    async fn write_frame(&mut self, msg: Msg) -> Result<(), FocusError>;

    fn set_read_timeout(&mut self, timeout: Duration);
    fn set_write_timeout(&mut self, timeout: Duration);
    fn cancel_read_timeout(&mut self);
    fn cancel_write_timeout(&mut self);
}

/// One end of an in-process, channel-backed transport pair.
pub struct InMemoryTransport {
    tx: mpsc::Sender<Msg>,
    rx: mpsc::Receiver<Msg>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
}

impl InMemoryTransport {
    /// Builds a connected pair: frames written to one side are read from the other.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::channel(64);
        let (b_tx, a_rx) = mpsc::channel(64);
        (
            Self { tx: a_tx, rx: a_rx, read_timeout: None, write_timeout: None },
            Self { tx: b_tx, rx: b_rx, read_timeout: None, write_timeout: None },
        )
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn read_frame(&mut self) -> Result<Msg, FocusError> {
        let recv = self.rx.recv();
        let msg = match self.read_timeout {
            Some(d) => tokio::time::timeout(d, recv).await.map_err(|_| FocusError::TransportTimeout)?,
            None => recv.await,
        };
        msg.ok_or_else(|| FocusError::FramingError("transport closed".to_string()))
    }

    async fn write_frame(&mut self, msg: Msg) -> Result<(), FocusError> {
        let send = self.tx.send(msg);
        let result = match self.write_timeout {
            Some(d) => tokio::time::timeout(d, send).await.map_err(|_| FocusError::TransportTimeout)?,
            None => send.await,
        };
        result.map_err(|_| FocusError::FramingError("transport closed".to_string()))
    }

    fn set_read_timeout(&mut self, timeout: Duration) {
        self.read_timeout = Some(timeout);
    }

    fn set_write_timeout(&mut self, timeout: Duration) {
        self.write_timeout = Some(timeout);
    }

    fn cancel_read_timeout(&mut self) {
        self.read_timeout = None;
    }

    fn cancel_write_timeout(&mut self) {
        self.write_timeout = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Msg;

    #[tokio::test]
    async fn pair_roundtrips_a_frame() {
        let (mut a, mut b) = InMemoryTransport::pair();
        a.write_frame(Msg::open("/".to_string(), 0)).await.unwrap();
        let received = b.read_frame().await.unwrap();
        assert_eq!(received, Msg::open("/".to_string(), 0));
    }

    #[tokio::test]
    async fn read_times_out_with_no_writer() {
        let (mut a, _b) = InMemoryTransport::pair();
        a.set_read_timeout(Duration::from_millis(10));
        let err = a.read_frame().await.unwrap_err();
        assert!(matches!(err, FocusError::TransportTimeout));
    }

    #[tokio::test]
    async fn cancelled_timeout_blocks_normally() {
        let (mut a, b) = InMemoryTransport::pair();
        a.set_read_timeout(Duration::from_millis(1));
        a.cancel_read_timeout();
        drop(b);
        let err = a.read_frame().await.unwrap_err();
        assert!(matches!(err, FocusError::FramingError(_)));
    }
}
