// SPDX-FileCopyrightText: 2026 blinry <mail@blinry.org>
// SPDX-FileCopyrightText: 2026 zormit <nt4u@kpvn.de>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The error taxonomy shared by the OT core, the document actor, and the
//! session plane.
//!
//! OT-algebra errors (`LengthMismatch`, `Incomposable`, `Incompatible`)
//! signal a violated precondition rather than a recoverable runtime
//! condition: callers inside the document actor and client controller treat
//! them as fatal, per the propagation rules in the specification.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FocusError {
    /// `Apply` received `Ops` whose base length disagrees with the document length.
    #[error("length mismatch: ops has base length {ops_base_len}, document has length {doc_len}")]
    LengthMismatch { ops_base_len: u64, doc_len: u64 },

    /// `Compose(a, b)` received operations whose target/base lengths disagree.
    #[error("incomposable: a has target length {a_target_len}, b has base length {b_base_len}")]
    Incomposable { a_target_len: u64, b_base_len: u64 },

    /// `Transform(a, b)` received operations over unequal base lengths.
    #[error("incompatible: a has base length {a_base_len}, b has base length {b_base_len}")]
    Incompatible { a_base_len: u64, b_base_len: u64 },

    /// The client received a `ServerAck` while in `Synced`.
    #[error("ack received while client was already synced")]
    AckUnexpected,

    /// A client referenced an unknown file descriptor.
    #[error("unknown fd {0}")]
    BadFd(u64),

    /// The transport could not decode a frame.
    #[error("framing error: {0}")]
    FramingError(String),

    /// The store failed to persist a write; in-memory state still advances.
    #[error("store error: {0}")]
    StoreError(String),

    /// A read or write deadline elapsed.
    #[error("transport timeout")]
    TransportTimeout,
}
