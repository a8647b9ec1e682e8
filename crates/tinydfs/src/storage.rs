// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Interfaces exposed by storage servers.
//!
//! A storage server offers two interfaces: [`Storage`] for client data
//! access and [`Command`] for administrative operations issued by the
//! naming server. Either may be a local object or a stub that forwards
//! calls over the transport, so every method can fail with
//! [`Error::Communication`](crate::Error::Communication).

use crate::error::Result;
use crate::path::DfsPath;
use async_trait::async_trait;
use std::sync::Arc;

/// Client data interface of a storage server
#[async_trait]
pub trait Storage: Send + Sync {
    /// Address that identifies this handle
    fn endpoint(&self) -> &str;

    async fn size(&self, path: &DfsPath) -> Result<u64>;

    async fn read(&self, path: &DfsPath, offset: u64, length: u64) -> Result<Vec<u8>>;

    async fn write(&self, path: &DfsPath, offset: u64, data: &[u8]) -> Result<()>;
}

/// Administrative interface of a storage server
#[async_trait]
pub trait Command: Send + Sync {
    /// Address that identifies this handle
    fn endpoint(&self) -> &str;

    /// Creates an empty file, along with any missing parent directories.
    async fn create(&self, path: &DfsPath) -> Result<bool>;

    /// Deletes a file or a whole directory.
    async fn delete(&self, path: &DfsPath) -> Result<bool>;

    /// Copies `path` from another storage server, replacing any local copy.
    async fn copy(&self, path: &DfsPath, from: Arc<dyn Storage>) -> Result<bool>;
}

/// Storage servers that can enumerate and tidy their own contents.
#[async_trait]
pub trait StorageBackend: Storage + Command {
    /// Every file currently held, as absolute paths
    async fn list_files(&self) -> Result<Vec<DfsPath>>;

    /// Removes directories left empty after duplicates were deleted
    async fn prune_empty_directories(&self) -> Result<()> {
        Ok(())
    }
}
