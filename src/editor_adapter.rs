// SPDX-FileCopyrightText: 2026 blinry <mail@blinry.org>
// SPDX-FileCopyrightText: 2026 zormit <nt4u@kpvn.de>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The editor adapter contract: the abstract boundary between the client
//! controller and a concrete editor integration (spec §6). No concrete
//! implementation is provided — translating editor-specific change events
//! into `Ops` is out of scope (spec §1).

use crate::ot::Ops;
use async_trait::async_trait;

#[async_trait]
pub trait EditorAdapter: Send {
    /// Sends a local write to the server.
    async fn send(&mut self, rev: u64, fingerprint: String, ops: Ops);

    /// Applies a server-originated `Ops` to the editor's buffer.
    async fn recv(&mut self, ops: Ops);

    /// Marks the next local change notification as originating from `recv`,
    /// so the editor-integration layer does not feed it back in as a new
    /// local write.
    fn suppress(&mut self);

    fn is_suppressed(&self) -> bool;
}
