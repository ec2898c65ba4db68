// SPDX-FileCopyrightText: 2026 blinry <mail@blinry.org>
// SPDX-FileCopyrightText: 2026 zormit <nt4u@kpvn.de>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The document actor: the server-side per-document authority. Orders,
//! transforms, records, and broadcasts operations across attached
//! connections.
//!
//! Grounded on `server/document.go`'s `doc` actor (`transform`/`broadcast`
//! pair, and `openDescription`'s clientRev-relative framing) and
//! `daemon/src/daemon.rs`'s `DocMessage`-enum-plus-`oneshot`-reply idiom.
//!
//! Broadcast attachments are keyed by an `AttachId` generated by this
//! actor itself, not by the connection-local `Fd`: `Fd` is scoped per
//! connection (spec §3), so two different connections could allocate the
//! same small `Fd` value for their own first open of this document, and
//! keying the broadcast map by `Fd` directly would let one silently
//! overwrite the other's attachment.

use crate::connection::{ConnEvent, ConnHandle};
use crate::ot::{self, Ops};
use crate::protocol::Fd;
use crate::store::{StoreClient, StoreId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

pub type AttachId = u64;
pub type DocumentHandle = mpsc::Sender<DocMessage>;

struct Attachment {
    conn: ConnHandle,
    fd: Fd,
}

pub enum DocMessage {
    /// Registers `conn` as an attached endpoint and returns the attach id
    /// the caller must use for subsequent `Write`/`Detach` messages. The
    /// bring-to-current `Ops` are delivered separately, as a normal
    /// `ConnEvent::Write` on `conn` (not folded into this reply) — matching
    /// spec §4.3's "delivered to the opener as a normal Write, not an ack".
    Open { fd: Fd, conn: ConnHandle, client_rev: u64, reply: oneshot::Sender<AttachId> },
    Write { attach: AttachId, client_rev: u64, ops: Ops },
    ReadAll { reply: oneshot::Sender<(String, u64)> },
    Detach { attach: AttachId },
}

pub(crate) struct Document {
    name: String,
    store: Arc<dyn StoreClient>,
    store_id: StoreId,
    history: Vec<Ops>,
    composed: Ops,
    attachments: HashMap<AttachId, Attachment>,
    next_attach: AttachId,
    receiver: mpsc::Receiver<DocMessage>,
}

impl Document {
    /// Spawns the actor task, loading any persisted history first.
    pub async fn spawn(name: String, store: Arc<dyn StoreClient>) -> DocumentHandle {
        let (sender, receiver) = mpsc::channel(256);
        let (store_id, history) = match store.load_doc(&name).await {
            Ok(Some((store_id, history))) => (store_id, history),
            Ok(None) => {
                let store_id = store
                    .store_doc(&name)
                    .await
                    .unwrap_or_else(|_| name.clone());
                (store_id, Vec::new())
            }
            Err(e) => {
                warn!(error = %e, doc = %name, "failed to load document history, starting fresh");
                (name.clone(), Vec::new())
            }
        };
        let composed = ot::compose_all(&history).expect("persisted history composes");
        let doc = Self {
            name,
            store,
            store_id,
            history,
            composed,
            attachments: HashMap::new(),
            next_attach: 0,
            receiver,
        };
        tokio::spawn(doc.run());
        sender
    }

    async fn run(mut self) {
        while let Some(msg) = self.receiver.recv().await {
            match msg {
                DocMessage::Open { fd, conn, client_rev, reply } => self.on_open(fd, conn, client_rev, reply).await,
                DocMessage::Write { attach, client_rev, ops } => self.on_write(attach, client_rev, ops).await,
                DocMessage::ReadAll { reply } => self.on_read_all(reply),
                DocMessage::Detach { attach } => {
                    self.attachments.remove(&attach);
                }
            }
        }
    }

    async fn on_open(&mut self, fd: Fd, conn: ConnHandle, client_rev: u64, reply: oneshot::Sender<AttachId>) {
        let rev = self.history.len() as u64;
        let initial_ops = if client_rev == 0 {
            self.composed.clone()
        } else if client_rev < rev {
            ot::compose_all(&self.history[client_rev as usize..]).expect("history tail composes")
        } else {
            Ops::new()
        };

        let attach = self.next_attach;
        self.next_attach += 1;
        self.attachments.insert(attach, Attachment { conn: conn.clone(), fd });
        let _ = reply.send(attach);

        if conn.send(ConnEvent::Write { fd, rev, ops: initial_ops }).await.is_err() {
            self.attachments.remove(&attach);
        }
    }

    async fn on_write(&mut self, attach: AttachId, client_rev: u64, mut ops: Ops) {
        let Some(origin_fd) = self.attachments.get(&attach).map(|a| a.fd) else {
            warn!(doc = %self.name, attach, "write from unknown attachment, dropping");
            return;
        };

        // `rev > len(history)` is treated as `rev == len(history)` (spec §8 property 9).
        let client_rev = client_rev.min(self.history.len() as u64);
        for concurrent in &self.history[client_rev as usize..] {
            let (transformed, _) = ot::transform(&ops, concurrent).expect("concurrent write transforms");
            ops = transformed;
        }

        self.history.push(ops.clone());
        self.composed = ot::compose(&self.composed, &ops).expect("server-canonical op composes");
        let rev = self.history.len() as u64;

        if let Err(e) = self.store.store_write(&self.store_id, rev, ops.clone()).await {
            warn!(error = %e, doc = %self.name, rev, "failed to persist write, continuing in-memory");
        }

        let mut dead = Vec::new();
        for (&id, attachment) in &self.attachments {
            let event = if id == attach {
                ConnEvent::WriteAck { fd: attachment.fd, rev, ops: ops.clone() }
            } else {
                ConnEvent::Write { fd: attachment.fd, rev, ops: ops.clone() }
            };
            if attachment.conn.send(event).await.is_err() {
                dead.push(id);
            }
        }
        for id in dead {
            self.attachments.remove(&id);
        }
        debug!(doc = %self.name, rev, origin_fd = %origin_fd, "write committed");
    }

    fn on_read_all(&self, reply: oneshot::Sender<(String, u64)>) {
        let mut doc = ot::Doc::new();
        doc.apply(&self.composed).expect("composed history applies to the empty document");
        let _ = reply.send((doc.to_string(), self.history.len() as u64));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Fd;
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;

    async fn spawn_test_doc() -> DocumentHandle {
        Document::spawn("/".to_string(), Arc::new(MemoryStore::spawn())).await
    }

    async fn read_all(doc: &DocumentHandle) -> (String, u64) {
        let (reply, recv) = oneshot::channel();
        doc.send(DocMessage::ReadAll { reply }).await.unwrap();
        recv.await.unwrap()
    }

    async fn open(doc: &DocumentHandle, fd: Fd, client_rev: u64) -> (AttachId, mpsc::Receiver<ConnEvent>) {
        let (conn_tx, conn_rx) = mpsc::channel(16);
        let (reply, recv) = oneshot::channel();
        doc.send(DocMessage::Open { fd, conn: conn_tx, client_rev, reply }).await.unwrap();
        (recv.await.unwrap(), conn_rx)
    }

    #[tokio::test]
    async fn single_client_echo_s1() {
        let doc = spawn_test_doc().await;
        let (attach, mut events) = open(&doc, Fd(0), 0).await;
        assert!(matches!(events.recv().await.unwrap(), ConnEvent::Write { ops, .. } if ops.is_empty()));

        let ops = ot::new_insert(0, 0, "a");
        doc.send(DocMessage::Write { attach, client_rev: 0, ops }).await.unwrap();

        let ConnEvent::WriteAck { fd, rev, ops } = events.recv().await.unwrap() else {
            panic!("expected WriteAck");
        };
        assert_eq!(fd, Fd(0));
        assert_eq!(rev, 1);
        assert_eq!(ops.ops(), &[ot::Op::Insert("a".to_string())]);
        assert_eq!(read_all(&doc).await, ("a".to_string(), 1));
    }

    #[tokio::test]
    async fn concurrent_inserts_converge_s2() {
        let doc = spawn_test_doc().await;
        let (attach1, mut events1) = open(&doc, Fd(0), 0).await;
        let (attach2, mut events2) = open(&doc, Fd(0), 0).await;
        events1.recv().await.unwrap();
        events2.recv().await.unwrap();

        doc.send(DocMessage::Write { attach: attach1, client_rev: 0, ops: ot::new_insert(0, 0, "a") })
            .await
            .unwrap();
        let ack1 = events1.recv().await.unwrap();
        let ConnEvent::WriteAck { rev: 1, .. } = ack1 else { panic!("expected rev 1 ack") };
        let ConnEvent::Write { rev: 1, .. } = events2.recv().await.unwrap() else { panic!("expected peer write") };

        doc.send(DocMessage::Write { attach: attach2, client_rev: 0, ops: ot::new_insert(0, 0, "b") })
            .await
            .unwrap();
        let ConnEvent::WriteAck { rev: 2, ops: ack2_ops, .. } = events2.recv().await.unwrap() else {
            panic!("expected rev 2 ack")
        };
        let ConnEvent::Write { rev: 2, ops: peer_ops, .. } = events1.recv().await.unwrap() else {
            panic!("expected peer write")
        };
        assert_eq!(ack2_ops, peer_ops);

        let (body, rev) = read_all(&doc).await;
        assert_eq!(rev, 2);
        assert!(body == "ab" || body == "ba");
    }

    #[tokio::test]
    async fn reopen_mid_stream_s5() {
        let doc = spawn_test_doc().await;
        let (attach, mut events) = open(&doc, Fd(0), 0).await;
        events.recv().await.unwrap();
        for (i, c) in "hello".chars().enumerate() {
            doc.send(DocMessage::Write {
                attach,
                client_rev: i as u64,
                ops: ot::new_insert(i as u64, i as u64, &c.to_string()),
            })
            .await
            .unwrap();
            events.recv().await.unwrap();
        }

        let (_attach2, mut events2) = open(&doc, Fd(0), 0).await;
        let ConnEvent::Write { rev: 5, ops, .. } = events2.recv().await.unwrap() else {
            panic!("expected bring-to-current write")
        };
        let mut editor_doc = ot::Doc::new();
        editor_doc.apply(&ops).unwrap();
        assert_eq!(editor_doc.to_string(), "hello");
    }

    #[tokio::test]
    async fn disconnect_does_not_stall_others_s6() {
        let doc = spawn_test_doc().await;
        let (attach1, events1) = open(&doc, Fd(0), 0).await;
        let (attach2, mut events2) = open(&doc, Fd(0), 0).await;
        events2.recv().await.unwrap(); // initial bring-to-current write
        drop(events1);
        doc.send(DocMessage::Detach { attach: attach1 }).await.unwrap();

        doc.send(DocMessage::Write { attach: attach2, client_rev: 0, ops: ot::new_insert(0, 0, "z") })
            .await
            .unwrap();
        events2.recv().await.unwrap();
        let (body, rev) = read_all(&doc).await;
        assert_eq!((body, rev), ("z".to_string(), 1));
    }
}
