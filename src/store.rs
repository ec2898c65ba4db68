// SPDX-FileCopyrightText: 2026 blinry <mail@blinry.org>
// SPDX-FileCopyrightText: 2026 zormit <nt4u@kpvn.de>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The store adapter: an opaque, append-only journal of per-document
//! operations, reduced to the three operations of spec §4.6/§6.
//!
//! Grounded on `store/store.go`'s actor (`readLoop` dispatching
//! `Storedoc`/`Storewrite`) and its idempotent schema-reset shape; here
//! reduced to an in-memory equivalent since a real on-disk/SQL store is
//! named but not mandated. `MemoryStore` is itself an actor (a tokio task
//! behind a cloneable channel handle), consistent with spec §5's "the store
//! adapter serialises all writes".

use crate::error::FocusError;
use crate::ot::Ops;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

/// An opaque per-document persistence handle, returned by `store_doc`/`load_doc`.
pub type StoreId = String;

#[async_trait]
pub trait StoreClient: Send + Sync {
    /// Creates a fresh journal entry for `name`, returning its store id.
    async fn store_doc(&self, name: &str) -> Result<StoreId, FocusError>;

    /// Loads a previously-created document's store id and history, if any.
    async fn load_doc(&self, name: &str) -> Result<Option<(StoreId, Vec<Ops>)>, FocusError>;

    /// Appends `ops` at `rev` to the journal for `store_id`.
    async fn store_write(&self, store_id: &StoreId, rev: u64, ops: Ops) -> Result<(), FocusError>;
}

enum StoreMessage {
    StoreDoc { name: String, reply: oneshot::Sender<Result<StoreId, FocusError>> },
    LoadDoc { name: String, reply: oneshot::Sender<Result<Option<(StoreId, Vec<Ops>)>, FocusError>> },
    StoreWrite { store_id: StoreId, rev: u64, ops: Ops, reply: oneshot::Sender<Result<(), FocusError>> },
}

/// An in-memory, process-lifetime-only journal. Schema "reset" is trivial:
/// an empty `HashMap` is already a valid empty journal, so startup is
/// idempotent by construction.
#[derive(Clone)]
pub struct MemoryStore {
    sender: mpsc::Sender<StoreMessage>,
}

impl MemoryStore {
    #[must_use]
    pub fn spawn() -> Self {
        let (sender, receiver) = mpsc::channel(64);
        tokio::spawn(Self::run(receiver));
        Self { sender }
    }

    async fn run(mut receiver: mpsc::Receiver<StoreMessage>) {
        let mut docs: HashMap<String, (StoreId, Vec<Ops>)> = HashMap::new();
        while let Some(msg) = receiver.recv().await {
            match msg {
                StoreMessage::StoreDoc { name, reply } => {
                    let store_id = name.clone();
                    docs.entry(name).or_insert_with(|| (store_id.clone(), Vec::new()));
                    let _ = reply.send(Ok(store_id));
                }
                StoreMessage::LoadDoc { name, reply } => {
                    let _ = reply.send(Ok(docs.get(&name).cloned()));
                }
                StoreMessage::StoreWrite { store_id, rev, ops, reply } => {
                    let result = docs
                        .values_mut()
                        .find(|(id, _)| *id == store_id)
                        .map(|(_, history)| {
                            debug_assert_eq!(history.len() as u64 + 1, rev);
                            history.push(ops);
                        })
                        .ok_or_else(|| FocusError::StoreError(format!("unknown store id {store_id}")));
                    let _ = reply.send(result);
                }
            }
        }
    }
}

#[async_trait]
impl StoreClient for MemoryStore {
    async fn store_doc(&self, name: &str) -> Result<StoreId, FocusError> {
        let (reply, recv) = oneshot::channel();
        self.sender
            .send(StoreMessage::StoreDoc { name: name.to_string(), reply })
            .await
            .map_err(|_| FocusError::StoreError("store actor gone".to_string()))?;
        recv.await.map_err(|_| FocusError::StoreError("store actor dropped reply".to_string()))?
    }

    async fn load_doc(&self, name: &str) -> Result<Option<(StoreId, Vec<Ops>)>, FocusError> {
        let (reply, recv) = oneshot::channel();
        self.sender
            .send(StoreMessage::LoadDoc { name: name.to_string(), reply })
            .await
            .map_err(|_| FocusError::StoreError("store actor gone".to_string()))?;
        recv.await.map_err(|_| FocusError::StoreError("store actor dropped reply".to_string()))?
    }

    async fn store_write(&self, store_id: &StoreId, rev: u64, ops: Ops) -> Result<(), FocusError> {
        let (reply, recv) = oneshot::channel();
        self.sender
            .send(StoreMessage::StoreWrite { store_id: store_id.clone(), rev, ops, reply })
            .await
            .map_err(|_| FocusError::StoreError("store actor gone".to_string()))?;
        let result = recv.await.map_err(|_| FocusError::StoreError("store actor dropped reply".to_string()))?;
        if let Err(ref e) = result {
            warn!(error = %e, store_id = %store_id, "failed to persist write");
        }
        Ok(())
    }
}
