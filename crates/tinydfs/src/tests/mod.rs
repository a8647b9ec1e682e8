// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

mod locking;
mod remote;

use crate::container::StorageContainer;
use crate::error::{Error, Result};
use crate::memory::MemoryStorage;
use crate::path::DfsPath;
use crate::storage::{Command, Storage};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::task::Unconstrained;
use tokio_test::task::Spawn;

pub(crate) fn p(s: &str) -> DfsPath {
    DfsPath::parse(s).unwrap()
}

/// A memory storage server and the container that refers to it directly
pub(crate) fn memory(name: &str) -> (Arc<MemoryStorage>, StorageContainer) {
    let storage = MemoryStorage::new(name);
    let container = StorageContainer::new(storage.clone(), storage.clone());
    (storage, container)
}

/// A memory storage server preloaded with `files`, each holding its own path
pub(crate) async fn memory_with(name: &str, files: &[&str]) -> (Arc<MemoryStorage>, StorageContainer) {
    let (storage, container) = memory(name);
    for f in files {
        storage.put(&p(f), f.as_bytes().to_vec()).await.unwrap();
    }
    (storage, container)
}

/// Wraps a future for manual polling, so a test can observe that it is
/// blocked and later that it completes.
pub(crate) fn spawn<F: Future>(future: F) -> Spawn<Unconstrained<F>> {
    tokio_test::task::spawn(tokio::task::unconstrained(future))
}

/// Command handle whose every call fails as if the server were unreachable
pub(crate) struct UnreachableCommand {
    endpoint: String,
    pub(crate) calls: AtomicUsize,
}

impl UnreachableCommand {
    pub(crate) fn new(endpoint: &str) -> Arc<Self> {
        Arc::new(Self {
            endpoint: endpoint.to_string(),
            calls: AtomicUsize::new(0),
        })
    }

    fn fail(&self) -> Result<bool> {
        let _ = self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::communication(format!("{} is unreachable", self.endpoint)))
    }
}

#[async_trait]
impl Command for UnreachableCommand {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn create(&self, _path: &DfsPath) -> Result<bool> {
        self.fail()
    }

    async fn delete(&self, _path: &DfsPath) -> Result<bool> {
        self.fail()
    }

    async fn copy(&self, _path: &DfsPath, _from: Arc<dyn Storage>) -> Result<bool> {
        self.fail()
    }
}

/// A container whose storage works but whose command handle does not
pub(crate) fn unreachable(name: &str) -> (Arc<UnreachableCommand>, StorageContainer) {
    let storage = MemoryStorage::new(name);
    let command = UnreachableCommand::new(&format!("{}.command", name));
    let container = StorageContainer::new(storage, command.clone());
    (command, container)
}
