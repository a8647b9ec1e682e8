// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! In-memory storage server backend.
//!
//! Keeps every file as a byte vector keyed by path, plus the set of
//! directories that exist. Used by tests and demos; nothing survives the
//! process.

use crate::error::{Error, Result};
use crate::path::DfsPath;
use crate::server::{command_endpoint, storage_endpoint};
use crate::storage::{Command, Storage, StorageBackend};
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Default)]
struct Contents {
    files: BTreeMap<DfsPath, Vec<u8>>,
    /// Every directory except the root, which always exists
    directories: BTreeSet<DfsPath>,
}

impl Contents {
    fn is_directory(&self, path: &DfsPath) -> bool {
        path.is_root() || self.directories.contains(path)
    }

    fn file(&self, path: &DfsPath) -> Result<&Vec<u8>> {
        self.files.get(path).ok_or_else(|| Error::not_found(path))
    }

    /// Creates the parent directories of `path`; false if one is a file.
    fn make_parents(&mut self, path: &DfsPath) -> bool {
        let ancestors = path.ancestors();
        if ancestors.iter().any(|a| self.files.contains_key(a)) {
            return false;
        }
        self.directories
            .extend(ancestors.into_iter().filter(|a| !a.is_root()));
        true
    }
}

pub struct MemoryStorage {
    name: String,
    storage_endpoint: String,
    command_endpoint: String,
    contents: Mutex<Contents>,
}

impl MemoryStorage {
    /// An empty storage server named `name`
    pub fn new<S: Into<String>>(name: S) -> Arc<Self> {
        let name = name.into();
        Arc::new(Self {
            storage_endpoint: storage_endpoint(&name),
            command_endpoint: command_endpoint(&name),
            name,
            contents: Mutex::new(Contents::default()),
        })
    }

    /// A storage server already holding the given files
    pub async fn with_files<S, I>(name: S, files: I) -> Result<Arc<Self>>
    where
        S: Into<String>,
        I: IntoIterator<Item = (DfsPath, Vec<u8>)>,
    {
        let storage = Self::new(name);
        for (path, data) in files {
            storage.put(&path, data).await?;
        }
        Ok(storage)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stores `data` at `path`, creating parent directories.
    pub async fn put(&self, path: &DfsPath, data: Vec<u8>) -> Result<()> {
        let mut contents = self.contents.lock().await;
        if path.is_root() || contents.directories.contains(path) {
            return Err(Error::not_a_file(path));
        }
        if !contents.make_parents(path) {
            return Err(Error::not_a_directory(path));
        }
        let _ = contents.files.insert(path.clone(), data);
        Ok(())
    }

    pub async fn contains_file(&self, path: &DfsPath) -> bool {
        self.contents.lock().await.files.contains_key(path)
    }

    pub async fn directories(&self) -> Vec<DfsPath> {
        self.contents.lock().await.directories.iter().cloned().collect()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    fn endpoint(&self) -> &str {
        &self.storage_endpoint
    }

    async fn size(&self, path: &DfsPath) -> Result<u64> {
        let contents = self.contents.lock().await;
        Ok(contents.file(path)?.len() as u64)
    }

    async fn read(&self, path: &DfsPath, offset: u64, length: u64) -> Result<Vec<u8>> {
        let contents = self.contents.lock().await;
        let data = contents.file(path)?;
        let size = data.len() as u64;
        let end = offset.checked_add(length).filter(|end| *end <= size);
        let Some(end) = end else {
            return Err(Error::OutOfBounds {
                path: path.clone(),
                offset,
                length,
                size,
            });
        };
        Ok(data[offset as usize..end as usize].to_vec())
    }

    async fn write(&self, path: &DfsPath, offset: u64, data: &[u8]) -> Result<()> {
        let mut contents = self.contents.lock().await;
        let file = contents
            .files
            .get_mut(path)
            .ok_or_else(|| Error::not_found(path))?;
        let bounds = usize::try_from(offset)
            .ok()
            .and_then(|start| Some((start, start.checked_add(data.len())?)));
        let Some((start, end)) = bounds else {
            return Err(Error::OutOfBounds {
                path: path.clone(),
                offset,
                length: data.len() as u64,
                size: file.len() as u64,
            });
        };
        if file.len() < end {
            file.resize(end, 0);
        }
        file[start..end].copy_from_slice(data);
        Ok(())
    }
}

#[async_trait]
impl Command for MemoryStorage {
    fn endpoint(&self) -> &str {
        &self.command_endpoint
    }

    async fn create(&self, path: &DfsPath) -> Result<bool> {
        let mut contents = self.contents.lock().await;
        if contents.is_directory(path) || contents.files.contains_key(path) {
            return Ok(false);
        }
        if !contents.make_parents(path) {
            return Ok(false);
        }
        let _ = contents.files.insert(path.clone(), Vec::new());
        Ok(true)
    }

    async fn delete(&self, path: &DfsPath) -> Result<bool> {
        if path.is_root() {
            return Ok(false);
        }
        let mut contents = self.contents.lock().await;
        if contents.files.remove(path).is_some() {
            return Ok(true);
        }
        if !contents.directories.contains(path) {
            return Ok(false);
        }
        contents.files.retain(|p, _| !p.is_subpath(path));
        contents.directories.retain(|p| !p.is_subpath(path));
        Ok(true)
    }

    async fn copy(&self, path: &DfsPath, from: Arc<dyn Storage>) -> Result<bool> {
        let size = from.size(path).await?;
        let data = from.read(path, 0, size).await?;
        let mut contents = self.contents.lock().await;
        if contents.is_directory(path) || !contents.make_parents(path) {
            return Ok(false);
        }
        let _ = contents.files.insert(path.clone(), data);
        Ok(true)
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn list_files(&self) -> Result<Vec<DfsPath>> {
        Ok(self.contents.lock().await.files.keys().cloned().collect())
    }

    async fn prune_empty_directories(&self) -> Result<()> {
        let mut contents = self.contents.lock().await;
        let Contents { files, directories } = &mut *contents;
        directories.retain(|dir| files.keys().any(|f| f.is_subpath(dir)));
        Ok(())
    }
}
