// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Interfaces exposed by the naming server.

use crate::error::Result;
use crate::path::DfsPath;
use crate::storage::{Command, Storage};
use async_trait::async_trait;
use std::sync::Arc;

/// Client interface of the naming server
#[async_trait]
pub trait Service: Send + Sync {
    /// Locks `path`, shared or exclusive, waiting as long as necessary.
    ///
    /// An exclusive lock also holds every ancestor shared and every
    /// descendant exclusively until the matching [`Service::unlock`].
    async fn lock(&self, path: &DfsPath, exclusive: bool) -> Result<()>;

    async fn unlock(&self, path: &DfsPath, exclusive: bool) -> Result<()>;

    async fn is_directory(&self, path: &DfsPath) -> Result<bool>;

    async fn list(&self, directory: &DfsPath) -> Result<Vec<String>>;

    async fn create_file(&self, path: &DfsPath) -> Result<bool>;

    async fn create_directory(&self, path: &DfsPath) -> Result<bool>;

    async fn delete(&self, path: &DfsPath) -> Result<bool>;

    /// A storage handle holding a copy of the file
    async fn get_storage(&self, path: &DfsPath) -> Result<Arc<dyn Storage>>;
}

/// Interface storage servers use to join the filesystem
#[async_trait]
pub trait Registration: Send + Sync {
    /// Announces a storage server and the files it already holds.
    ///
    /// Returns the paths the naming server already knows about; the storage
    /// server is expected to delete its copies of them.
    async fn register(
        &self,
        storage: Arc<dyn Storage>,
        command: Arc<dyn Command>,
        files: Vec<DfsPath>,
    ) -> Result<Vec<DfsPath>>;
}
