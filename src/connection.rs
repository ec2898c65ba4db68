// SPDX-FileCopyrightText: 2026 blinry <mail@blinry.org>
// SPDX-FileCopyrightText: 2026 zormit <nt4u@kpvn.de>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The connection actor: one task per transport endpoint. Decodes framed
//! messages, allocates local file descriptors, routes to document actors,
//! and encodes outbound frames.
//!
//! Grounded on `server/conn.go`'s `readLoop`/`writeLoop` split and
//! `daemon/src/editor_connection.rs`'s analogous per-socket task structure.

use crate::document::{AttachId, DocMessage, DocumentHandle};
use crate::error::FocusError;
use crate::ot::Ops;
use crate::protocol::{Cmd, Fd, Msg};
use crate::registry::{RegistryHandle, RegistryMessage};
use crate::transport::Transport;
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

/// A message a document actor sends back to an attached connection,
/// already addressed by the connection-local `Fd` the document was told
/// about at `Open` time.
#[derive(Debug, Clone)]
pub enum ConnEvent {
    Write { fd: Fd, rev: u64, ops: Ops },
    WriteAck { fd: Fd, rev: u64, ops: Ops },
}

impl ConnEvent {
    fn into_msg(self) -> Msg {
        match self {
            Self::Write { fd, rev, ops } => Msg::write(fd, rev, None, ops),
            Self::WriteAck { fd, rev, ops } => Msg::write_resp(fd, rev, ops),
        }
    }
}

pub type ConnHandle = mpsc::Sender<ConnEvent>;

/// One per transport endpoint.
pub struct Connection<T: Transport> {
    transport: T,
    registry: RegistryHandle,
    fds: HashMap<Fd, (DocumentHandle, AttachId)>,
    next_fd: u64,
    self_tx: ConnHandle,
    self_rx: mpsc::Receiver<ConnEvent>,
}

impl<T: Transport> Connection<T> {
    #[must_use]
    pub fn new(transport: T, registry: RegistryHandle) -> Self {
        let (self_tx, self_rx) = mpsc::channel(256);
        Self { transport, registry, fds: HashMap::new(), next_fd: 0, self_tx, self_rx }
    }

    /// Runs the connection until the transport closes, a framing error
    /// occurs, or an unknown fd is referenced. Always detaches from every
    /// attached document before returning.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                frame = self.transport.read_frame() => {
                    match frame {
                        Ok(msg) => {
                            if let Err(e) = self.handle_inbound(msg).await {
                                warn!(error = %e, "connection terminating");
                                break;
                            }
                        }
                        Err(e) => {
                            debug!(error = %e, "transport closed");
                            break;
                        }
                    }
                }
                event = self.self_rx.recv() => {
                    let Some(event) = event else { break };
                    if let Err(e) = self.transport.write_frame(event.into_msg()).await {
                        warn!(error = %e, "failed to write outbound frame");
                        break;
                    }
                }
            }
        }
        self.detach_all().await;
    }

    async fn handle_inbound(&mut self, msg: Msg) -> Result<(), FocusError> {
        match msg.cmd {
            Cmd::Open => self.handle_open(msg).await,
            Cmd::Write => self.handle_write(msg).await,
            other => Err(FocusError::FramingError(format!("unexpected client command {other:?}"))),
        }
    }

    async fn handle_open(&mut self, msg: Msg) -> Result<(), FocusError> {
        let name = msg.name.ok_or_else(|| FocusError::FramingError("OPEN missing Name".to_string()))?;
        let client_rev = msg.rev.unwrap_or(0);
        let fd = Fd(self.next_fd);
        self.next_fd += 1;

        let doc = self.alloc_doc(&name).await?;
        let (reply, recv) = oneshot::channel();
        doc.send(DocMessage::Open { fd, conn: self.self_tx.clone(), client_rev, reply })
            .await
            .map_err(|_| FocusError::FramingError("document actor gone".to_string()))?;
        let attach = recv.await.map_err(|_| FocusError::FramingError("document actor dropped reply".to_string()))?;

        self.fds.insert(fd, (doc, attach));
        self.transport.write_frame(Msg::open_resp(name, fd)).await
    }

    async fn handle_write(&mut self, msg: Msg) -> Result<(), FocusError> {
        let fd = msg.fd.ok_or_else(|| FocusError::FramingError("WRITE missing Fd".to_string()))?;
        let (doc, attach) = self.fds.get(&fd).cloned().ok_or(FocusError::BadFd(fd.0))?;
        let client_rev = msg.rev.unwrap_or(0);
        let ops = msg.ops.unwrap_or_default();
        doc.send(DocMessage::Write { attach, client_rev, ops })
            .await
            .map_err(|_| FocusError::FramingError("document actor gone".to_string()))
    }

    async fn alloc_doc(&self, name: &str) -> Result<DocumentHandle, FocusError> {
        let (reply, recv) = oneshot::channel();
        self.registry
            .send(RegistryMessage::AllocDoc { name: name.to_string(), reply })
            .await
            .map_err(|_| FocusError::FramingError("registry gone".to_string()))?;
        recv.await.map_err(|_| FocusError::FramingError("registry dropped reply".to_string()))
    }

    async fn detach_all(&mut self) {
        for (_, (doc, attach)) in self.fds.drain() {
            let _ = doc.send(DocMessage::Detach { attach }).await;
        }
    }
}
