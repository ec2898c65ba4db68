// SPDX-FileCopyrightText: 2026 blinry <mail@blinry.org>
// SPDX-FileCopyrightText: 2026 zormit <nt4u@kpvn.de>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The registry: a process-wide mapping from document name to document
//! actor. Lazily instantiates documents on first open; no eviction.
//!
//! Grounded on `internal/server/server.go`'s `Server.openDoc`/`names` map.

use crate::document::{Document, DocumentHandle};
use crate::store::StoreClient;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};

pub enum RegistryMessage {
    AllocDoc { name: String, reply: oneshot::Sender<DocumentHandle> },
}

pub type RegistryHandle = mpsc::Sender<RegistryMessage>;

struct Registry {
    store: Arc<dyn StoreClient>,
    docs: HashMap<String, DocumentHandle>,
    receiver: mpsc::Receiver<RegistryMessage>,
}

impl Registry {
    fn spawn(store: Arc<dyn StoreClient>) -> RegistryHandle {
        let (sender, receiver) = mpsc::channel(64);
        let registry = Self { store, docs: HashMap::new(), receiver };
        tokio::spawn(registry.run());
        sender
    }

    async fn run(mut self) {
        while let Some(msg) = self.receiver.recv().await {
            match msg {
                RegistryMessage::AllocDoc { name, reply } => {
                    let handle = if let Some(handle) = self.docs.get(&name) {
                        handle.clone()
                    } else {
                        let handle = Document::spawn(name.clone(), self.store.clone()).await;
                        self.docs.insert(name, handle.clone());
                        handle
                    };
                    let _ = reply.send(handle);
                }
            }
        }
    }
}

/// Spawns the registry actor and returns a cloneable handle to it.
#[must_use]
pub fn spawn(store: Arc<dyn StoreClient>) -> RegistryHandle {
    Registry::spawn(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn alloc_doc_is_idempotent_per_name() {
        let registry = spawn(Arc::new(MemoryStore::spawn()));

        let (reply1, recv1) = oneshot::channel();
        registry.send(RegistryMessage::AllocDoc { name: "/a".to_string(), reply: reply1 }).await.unwrap();
        let handle1 = recv1.await.unwrap();

        let (reply2, recv2) = oneshot::channel();
        registry.send(RegistryMessage::AllocDoc { name: "/a".to_string(), reply: reply2 }).await.unwrap();
        let handle2 = recv2.await.unwrap();

        assert!(handle1.same_channel(&handle2));
    }

    #[tokio::test]
    async fn distinct_names_get_distinct_documents() {
        let registry = spawn(Arc::new(MemoryStore::spawn()));

        let (reply1, recv1) = oneshot::channel();
        registry.send(RegistryMessage::AllocDoc { name: "/a".to_string(), reply: reply1 }).await.unwrap();
        let handle1 = recv1.await.unwrap();

        let (reply2, recv2) = oneshot::channel();
        registry.send(RegistryMessage::AllocDoc { name: "/b".to_string(), reply: reply2 }).await.unwrap();
        let handle2 = recv2.await.unwrap();

        assert!(!handle1.same_channel(&handle2));
    }
}
