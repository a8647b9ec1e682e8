// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::error::{Error, Result};
use crate::path::DfsPath;
use crate::server::{command_endpoint, storage_endpoint};
use crate::storage::{Command, Storage, StorageBackend};
use async_trait::async_trait;
use diagnostics::*;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

/// Storage server backend over a host directory.
pub struct HostStorage {
    name: String,
    /// The host directory that maps to `/`
    root_path: PathBuf,
    storage_endpoint: String,
    command_endpoint: String,
}

impl HostStorage {
    /// Create a backend rooted at `root_path`, which must be an existing directory.
    pub fn new<S: Into<String>>(name: S, root_path: PathBuf) -> Result<Arc<Self>> {
        let canonical = root_path.canonicalize().map_err(|e| {
            Error::Io(format!(
                "Storage root '{}' cannot be resolved: {}",
                root_path.display(),
                e
            ))
        })?;
        if !canonical.is_dir() {
            return Err(Error::Io(format!(
                "Storage root '{}' is not a directory",
                canonical.display()
            )));
        }

        let name = name.into();
        Ok(Arc::new(Self {
            storage_endpoint: storage_endpoint(&name),
            command_endpoint: command_endpoint(&name),
            name,
            root_path: canonical,
        }))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    fn host(&self, path: &DfsPath) -> PathBuf {
        path.to_host_path(&self.root_path)
    }

    /// Size of the regular file at `path`
    async fn file_len(&self, path: &DfsPath) -> Result<u64> {
        match tokio::fs::metadata(self.host(path)).await {
            Ok(meta) if meta.is_file() => Ok(meta.len()),
            _ => Err(Error::not_found(path)),
        }
    }

    /// Every file and every directory below the root, directories deepest first.
    async fn walk(&self) -> Result<(Vec<DfsPath>, Vec<DfsPath>)> {
        let mut files = Vec::new();
        let mut dirs = Vec::new();
        let mut stack = vec![DfsPath::root()];
        while let Some(dir) = stack.pop() {
            let mut entries = tokio::fs::read_dir(self.host(&dir)).await?;
            while let Some(entry) = entries.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                let Ok(path) = dir.child(&name) else {
                    let skipped = entry.path().display().to_string();
                    log_debug!("Skipping unrepresentable host path {skipped}", skipped: skipped);
                    continue;
                };
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    stack.push(path.clone());
                    dirs.push(path);
                } else if file_type.is_file() {
                    files.push(path);
                }
            }
        }
        files.sort();
        dirs.sort_by_key(|d| std::cmp::Reverse(d.depth()));
        Ok((files, dirs))
    }

    async fn is_empty_dir(&self, path: &DfsPath) -> Result<bool> {
        let mut entries = tokio::fs::read_dir(self.host(path)).await?;
        Ok(entries.next_entry().await?.is_none())
    }
}

#[async_trait]
impl Storage for HostStorage {
    fn endpoint(&self) -> &str {
        &self.storage_endpoint
    }

    async fn size(&self, path: &DfsPath) -> Result<u64> {
        self.file_len(path).await
    }

    async fn read(&self, path: &DfsPath, offset: u64, length: u64) -> Result<Vec<u8>> {
        let size = self.file_len(path).await?;
        if offset.checked_add(length).is_none_or(|end| end > size) {
            return Err(Error::OutOfBounds {
                path: path.clone(),
                offset,
                length,
                size,
            });
        }
        let mut file = tokio::fs::File::open(self.host(path)).await?;
        let _ = file.seek(SeekFrom::Start(offset)).await?;
        let mut data = vec![0; length as usize];
        let _ = file.read_exact(&mut data).await?;
        Ok(data)
    }

    async fn write(&self, path: &DfsPath, offset: u64, data: &[u8]) -> Result<()> {
        let _ = self.file_len(path).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .open(self.host(path))
            .await?;
        let _ = file.seek(SeekFrom::Start(offset)).await?;
        file.write_all(data).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl Command for HostStorage {
    fn endpoint(&self) -> &str {
        &self.command_endpoint
    }

    async fn create(&self, path: &DfsPath) -> Result<bool> {
        let Some(parent) = path.parent() else {
            return Ok(false);
        };
        if tokio::fs::metadata(self.host(path)).await.is_ok() {
            return Ok(false);
        }
        if tokio::fs::create_dir_all(self.host(&parent)).await.is_err() {
            return Ok(false);
        }
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.host(path))
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, path: &DfsPath) -> Result<bool> {
        if path.is_root() {
            return Ok(false);
        }
        let host = self.host(path);
        let Ok(meta) = tokio::fs::metadata(&host).await else {
            return Ok(false);
        };
        if meta.is_dir() {
            tokio::fs::remove_dir_all(&host).await?;
        } else {
            tokio::fs::remove_file(&host).await?;
        }
        Ok(true)
    }

    async fn copy(&self, path: &DfsPath, from: Arc<dyn Storage>) -> Result<bool> {
        let Some(parent) = path.parent() else {
            return Ok(false);
        };
        let size = from.size(path).await?;
        let data = from.read(path, 0, size).await?;

        let host = self.host(path);
        if tokio::fs::metadata(&host).await.is_ok_and(|m| m.is_dir()) {
            return Ok(false);
        }
        if tokio::fs::create_dir_all(self.host(&parent)).await.is_err() {
            return Ok(false);
        }
        tokio::fs::write(&host, data).await?;
        Ok(true)
    }
}

#[async_trait]
impl StorageBackend for HostStorage {
    async fn list_files(&self) -> Result<Vec<DfsPath>> {
        Ok(self.walk().await?.0)
    }

    async fn prune_empty_directories(&self) -> Result<()> {
        let (_, dirs) = self.walk().await?;
        for dir in dirs {
            if self.is_empty_dir(&dir).await? {
                tokio::fs::remove_dir(self.host(&dir)).await?;
            }
        }
        Ok(())
    }
}
