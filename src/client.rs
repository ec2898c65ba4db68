// SPDX-FileCopyrightText: 2026 blinry <mail@blinry.org>
// SPDX-FileCopyrightText: 2026 zormit <nt4u@kpvn.de>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The client controller: a three-state protocol machine that serialises
//! local edits against server acknowledgements over a half-duplex
//! request/response window.
//!
//! Ported from the `Synchronized`/`Waiting`/`Buffering` states of
//! `ot/client.go` in the original implementation. The controller performs no
//! I/O itself — every transition returns the outbound write (if any) and/or
//! the `Ops` to hand to the editor adapter, and the caller (an editor
//! connection task) performs the actual send/apply.

use crate::error::FocusError;
use crate::ot::{self, Doc, Ops};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Synced,
    WaitingAck,
    WaitingAckBuffering,
}

/// An outbound write the caller must send to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundWrite {
    pub rev: u64,
    pub fingerprint: String,
    pub ops: Ops,
}

/// Drives the three-state machine of the client controller. Holds the
/// shadow document (the client's best view of the committed server state),
/// the observed revision, and the in-flight/buffered writes.
#[derive(Debug)]
pub struct ClientController {
    state: ClientState,
    shadow: Doc,
    rev: u64,
    /// The write currently in flight (`Some` iff not `Synced`).
    first: Option<Ops>,
    /// Local writes issued while `first` is in flight, not yet composed.
    rest: Vec<Ops>,
}

impl ClientController {
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ClientState::Synced,
            shadow: Doc::new(),
            rev: 0,
            first: None,
            rest: Vec::new(),
        }
    }

    #[must_use]
    pub const fn state(&self) -> ClientState {
        self.state
    }

    #[must_use]
    pub const fn rev(&self) -> u64 {
        self.rev
    }

    #[must_use]
    pub fn shadow(&self) -> &Doc {
        &self.shadow
    }

    fn fingerprint(&self) -> String {
        self.shadow.to_string()
    }

    /// A local edit arrives from the editor adapter.
    pub fn on_local_write(&mut self, ops: Ops) -> Option<OutboundWrite> {
        match self.state {
            ClientState::Synced => {
                let fingerprint = self.fingerprint();
                let out = OutboundWrite { rev: self.rev, fingerprint, ops: ops.clone() };
                self.first = Some(ops);
                self.state = ClientState::WaitingAck;
                Some(out)
            }
            ClientState::WaitingAck => {
                self.rest = vec![ops];
                self.state = ClientState::WaitingAckBuffering;
                None
            }
            ClientState::WaitingAckBuffering => {
                self.rest.push(ops);
                None
            }
        }
    }

    /// The server acknowledges the in-flight write, echoing back its
    /// canonicalised `ops` (which may differ from what was sent, if other
    /// writes committed first and were transformed away) and the new
    /// revision.
    pub fn on_server_ack(&mut self, rev: u64, ops: &Ops) -> Result<Option<OutboundWrite>, FocusError> {
        match self.state {
            ClientState::Synced => Err(FocusError::AckUnexpected),
            ClientState::WaitingAck => {
                self.shadow.apply(ops)?;
                self.rev = rev;
                self.first = None;
                self.state = ClientState::Synced;
                Ok(None)
            }
            ClientState::WaitingAckBuffering => {
                self.shadow.apply(ops)?;
                self.rev = rev;
                let composed = ot::normalize(&ot::compose_all(&self.rest)?);
                self.rest.clear();
                let fingerprint = self.fingerprint();
                let out = OutboundWrite { rev: self.rev, fingerprint, ops: composed.clone() };
                self.first = Some(composed);
                self.state = ClientState::WaitingAck;
                Ok(Some(out))
            }
        }
    }

    /// A write from another client arrives, already transformed by the
    /// server against this client's concurrent history. Returns the `Ops`
    /// to hand to the editor adapter (suppressing re-entrant local writes).
    pub fn on_server_write(&mut self, rev: u64, ops: &Ops) -> Result<Ops, FocusError> {
        match self.state {
            ClientState::Synced => {
                self.shadow.apply(ops)?;
                self.rev = rev;
                Ok(ops.clone())
            }
            ClientState::WaitingAck => {
                let first = self.first.take().expect("first set while WaitingAck");
                let (first_prime, ops_prime) = ot::transform(&first, ops)?;
                self.shadow.apply(ops)?;
                self.rev = rev;
                self.first = Some(first_prime);
                Ok(ops_prime)
            }
            ClientState::WaitingAckBuffering => {
                let first = self.first.take().expect("first set while WaitingAckBuffering");
                let (first_prime, o2) = ot::transform(&first, ops)?;
                let rest_composed = ot::compose_all(&self.rest)?;
                let (rest_prime, o3) = ot::transform(&rest_composed, &o2)?;
                self.shadow.apply(ops)?;
                self.rev = rev;
                self.first = Some(first_prime);
                self.rest = vec![rest_prime];
                Ok(o3)
            }
        }
    }
}

impl Default for ClientController {
    fn default() -> Self {
        Self::new()
    }
}
