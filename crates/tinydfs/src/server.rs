// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Storage server lifecycle: serve a backend and join the naming server.

use crate::error::Result;
use crate::path::DfsPath;
use crate::remote::{CommandStub, Network, RegistrationStub, Skeleton, StorageStub};
use crate::service::Registration;
use crate::storage::{Command, Storage, StorageBackend};
use diagnostics::*;
use std::sync::Arc;

/// Endpoint of the client interface of storage server `name`
#[must_use]
pub fn storage_endpoint(name: &str) -> String {
    format!("{}.storage", name)
}

/// Endpoint of the command interface of storage server `name`
#[must_use]
pub fn command_endpoint(name: &str) -> String {
    format!("{}.command", name)
}

pub struct StorageServer {
    backend: Arc<dyn StorageBackend>,
    storage: Skeleton,
    command: Skeleton,
    /// Files the naming server already knew about, deleted locally
    duplicates: Vec<DfsPath>,
}

impl StorageServer {
    /// Binds both interfaces of `backend`, registers with the naming server
    /// at `registration`, then deletes every file reported as a duplicate
    /// and prunes directories left empty.
    ///
    /// On any failure both interfaces are unbound again.
    pub async fn start<B>(backend: Arc<B>, network: &Network, registration: &str) -> Result<Self>
    where
        B: StorageBackend + 'static,
    {
        let storage_name = Storage::endpoint(backend.as_ref()).to_string();
        let command_name = Command::endpoint(backend.as_ref()).to_string();

        let storage = Skeleton::storage(network, &storage_name, backend.clone()).await?;
        let command = match Skeleton::command(network, &command_name, backend.clone()).await {
            Ok(command) => command,
            Err(err) => {
                storage.stop().await;
                return Err(err);
            }
        };

        let server = Self {
            backend,
            storage,
            command,
            duplicates: Vec::new(),
        };
        match server.join(network, registration).await {
            Ok(duplicates) => Ok(Self {
                duplicates,
                ..server
            }),
            Err(err) => {
                server.stop().await;
                Err(err)
            }
        }
    }

    async fn join(&self, network: &Network, registration: &str) -> Result<Vec<DfsPath>> {
        let files = self.backend.list_files().await?;
        let naming = RegistrationStub::new(network, registration);
        let storage: Arc<dyn Storage> = Arc::new(StorageStub::new(network, self.storage.endpoint()));
        let command: Arc<dyn Command> = Arc::new(CommandStub::new(network, self.command.endpoint()));

        let offered = files.len();
        let duplicates = naming.register(storage, command, files).await?;
        for path in &duplicates {
            if !self.backend.delete(path).await? {
                let pathstr = path.to_string();
                log_warn!("Duplicate {path} was already gone", path: pathstr);
            }
        }
        self.backend.prune_empty_directories().await?;

        let endpoint = self.storage.endpoint();
        let dups = duplicates.len();
        log_info!("Storage server {endpoint} registered {offered} files, deleted {dups} duplicates", endpoint: endpoint, offered: offered, dups: dups);
        Ok(duplicates)
    }

    #[must_use]
    pub fn backend(&self) -> Arc<dyn StorageBackend> {
        self.backend.clone()
    }

    #[must_use]
    pub fn storage_endpoint(&self) -> &str {
        self.storage.endpoint()
    }

    #[must_use]
    pub fn command_endpoint(&self) -> &str {
        self.command.endpoint()
    }

    #[must_use]
    pub fn duplicates(&self) -> &[DfsPath] {
        &self.duplicates
    }

    pub async fn stop(&self) {
        self.storage.stop().await;
        self.command.stop().await;
    }
}
