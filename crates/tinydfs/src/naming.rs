// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! The naming server.
//!
//! Holds the directory tree, answers client [`Service`] calls and accepts
//! storage server [`Registration`]s. Structural changes (create, delete,
//! registration) are serialized behind one gate; locking goes straight to
//! the tree's per-node state.

use crate::config::NamingConfig;
use crate::container::StorageContainer;
use crate::error::{Error, Result};
use crate::lock::LockMode;
use crate::node::NodeKind;
use crate::path::DfsPath;
use crate::remote::{Network, Skeleton};
use crate::service::{Registration, Service};
use crate::storage::{Command, Storage};
use crate::tree::DirectoryTree;
use async_trait::async_trait;
use diagnostics::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

pub struct NamingServer {
    tree: DirectoryTree,
    config: NamingConfig,
    /// Endpoints of every registered storage and command handle
    registered: Mutex<HashSet<String>>,
    gate: Mutex<()>,
    stopped: AtomicBool,
    skeleton: Mutex<Option<Skeleton>>,
}

impl NamingServer {
    pub fn new(config: NamingConfig) -> Result<Arc<Self>> {
        config.validate()?;
        Ok(Arc::new(Self {
            tree: DirectoryTree::with_threshold(config.replication_threshold),
            config,
            registered: Mutex::new(HashSet::new()),
            gate: Mutex::new(()),
            stopped: AtomicBool::new(false),
            skeleton: Mutex::new(None),
        }))
    }

    #[must_use]
    pub fn tree(&self) -> &DirectoryTree {
        &self.tree
    }

    #[must_use]
    pub fn config(&self) -> &NamingConfig {
        &self.config
    }

    /// Binds the registration interface on the configured endpoint.
    pub async fn start(self: &Arc<Self>, network: &Network) -> Result<()> {
        let mut skeleton = self.skeleton.lock().await;
        if skeleton.is_some() {
            return Ok(());
        }
        let endpoint = self.config.registration_endpoint.as_str();
        let target: Arc<dyn Registration> = self.clone();
        *skeleton = Some(Skeleton::registration(network, endpoint, target).await?);
        log_info!("Naming server accepting registrations at {endpoint}", endpoint: endpoint);
        Ok(())
    }

    /// Unbinds the registration interface and fails every waiting lock request.
    pub async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        if let Some(skeleton) = self.skeleton.lock().await.take() {
            skeleton.stop().await;
        }
        let interrupted = self.tree.interrupt_waiters().await;
        log_info!("Naming server stopped, {interrupted} lock waiters interrupted", interrupted: interrupted);
    }

    pub async fn registered_count(&self) -> usize {
        self.registered.lock().await.len() / 2
    }

    /// Parent of a path about to be created, which must be a directory
    async fn creation_parent(&self, path: &DfsPath) -> Result<Option<crate::node::NodeRef>> {
        let Some(parent_path) = path.parent() else {
            return Ok(None);
        };
        let parent = self.tree.get(&parent_path).await?;
        if parent.is_file() {
            return Err(Error::not_a_directory(&parent_path));
        }
        Ok(Some(parent))
    }
}

#[async_trait]
impl Service for NamingServer {
    async fn lock(&self, path: &DfsPath, exclusive: bool) -> Result<()> {
        if self.stopped.load(Ordering::SeqCst) {
            return Err(Error::lock_interrupted(path));
        }
        let mode = LockMode::from_exclusive(exclusive);
        let node = self.tree.lock(path, mode).await?;
        match mode {
            LockMode::Shared => {
                let _ = self.tree.record_read(&node).await;
            }
            LockMode::Exclusive => {
                if let Err(err) = self.tree.consolidate(&node).await {
                    let _ = self.tree.unlock(path, mode).await;
                    return Err(err);
                }
            }
        }
        Ok(())
    }

    async fn unlock(&self, path: &DfsPath, exclusive: bool) -> Result<()> {
        self.tree
            .unlock(path, LockMode::from_exclusive(exclusive))
            .await
    }

    async fn is_directory(&self, path: &DfsPath) -> Result<bool> {
        Ok(self.tree.get(path).await?.is_directory())
    }

    async fn list(&self, directory: &DfsPath) -> Result<Vec<String>> {
        self.tree.children_names(directory).await
    }

    async fn create_file(&self, path: &DfsPath) -> Result<bool> {
        let _gate = self.gate.lock().await;
        let Some(parent) = self.creation_parent(path).await? else {
            return Ok(false);
        };
        if self.tree.contains(path).await {
            return Ok(false);
        }
        if self.registered.lock().await.is_empty() {
            return Err(Error::NoStorage);
        }

        let (container, from_pool) = match parent.home().await {
            Some(home) => (home, false),
            None => self
                .tree
                .take_available(&[])
                .await
                .ok_or(Error::NoStorage)?,
        };

        let created = match container.command().create(path).await {
            Ok(created) => created,
            Err(err) => {
                if from_pool {
                    self.tree.return_to_pool(container).await;
                }
                return Err(err);
            }
        };
        if !created {
            if from_pool {
                self.tree.return_to_pool(container).await;
            }
            return Ok(false);
        }

        let pathstr = path.to_string();
        let target = container.to_string();
        let _ = self
            .tree
            .add(path, NodeKind::File, Some(container))
            .await?;
        log_info!("Created {path} on {target}", path: pathstr, target: target);
        Ok(true)
    }

    async fn create_directory(&self, path: &DfsPath) -> Result<bool> {
        let _gate = self.gate.lock().await;
        if self.creation_parent(path).await?.is_none() {
            return Ok(false);
        }
        if self.tree.contains(path).await {
            return Ok(false);
        }
        let _ = self.tree.add(path, NodeKind::Directory, None).await?;
        let pathstr = path.to_string();
        log_info!("Created directory {path}", path: pathstr);
        Ok(true)
    }

    async fn delete(&self, path: &DfsPath) -> Result<bool> {
        if path.is_root() {
            return Ok(false);
        }
        let _gate = self.gate.lock().await;
        for container in self.tree.containers_under(path).await? {
            if !container.command().delete(path).await? {
                let pathstr = path.to_string();
                let target = container.to_string();
                log_warn!("Storage {target} had nothing to delete at {pathstr}", target: target, pathstr: pathstr);
            }
        }
        let removed = self.tree.remove(path).await;
        let pathstr = path.to_string();
        log_info!("Deleted {path}: {removed}", path: pathstr, removed: removed);
        Ok(removed)
    }

    async fn get_storage(&self, path: &DfsPath) -> Result<Arc<dyn Storage>> {
        let node = self.tree.get(path).await?;
        if !node.is_file() {
            return Err(Error::not_a_file(path));
        }
        let mut state = node.state.lock().await;
        let count = state.replicas.len();
        if count == 0 {
            return Err(Error::not_found(path));
        }
        let index = state.next_read % count;
        state.next_read = state.next_read.wrapping_add(1);
        Ok(state.replicas[index].storage())
    }
}

#[async_trait]
impl Registration for NamingServer {
    async fn register(
        &self,
        storage: Arc<dyn Storage>,
        command: Arc<dyn Command>,
        files: Vec<DfsPath>,
    ) -> Result<Vec<DfsPath>> {
        let container = StorageContainer::new(storage, command);
        {
            let mut registered = self.registered.lock().await;
            if registered.contains(container.storage_endpoint())
                || registered.contains(container.command_endpoint())
            {
                return Err(Error::AlreadyRegistered(container.to_string()));
            }
            let _ = registered.insert(container.storage_endpoint().to_string());
            let _ = registered.insert(container.command_endpoint().to_string());
        }

        let _gate = self.gate.lock().await;
        let mut duplicates = Vec::new();
        let mut added = 0;
        for path in files {
            if path.is_root() {
                continue;
            }
            if self.tree.contains(&path).await {
                duplicates.push(path);
                continue;
            }
            match self.tree.register(&path, &container).await {
                Ok(_) => added += 1,
                Err(Error::AlreadyExists(_)) | Err(Error::NotADirectory(_)) => duplicates.push(path),
                Err(err) => return Err(err),
            }
        }

        let target = container.to_string();
        let dups = duplicates.len();
        if added == 0 {
            self.tree.add_empty_server(container).await;
            log_info!("Registered {target} with no files, {dups} duplicates", target: target, dups: dups);
        } else {
            log_info!("Registered {target} with {added} files, {dups} duplicates", target: target, added: added, dups: dups);
        }
        Ok(duplicates)
    }
}
