// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! The naming server's directory tree.
//!
//! The tree owns the root node and the pool of storage containers that
//! registered without any files. Lookups walk from the root one component
//! at a time, taking each node's mutex only long enough to read its child
//! map.
//!
//! # Locking
//!
//! A shared lock touches the target node only. An exclusive lock on `P` is
//! one logical acquisition of
//!
//! 1. SHARED on every strict ancestor of `P`, root first,
//! 2. EXCLUSIVE on `P`,
//! 3. EXCLUSIVE on every descendant of `P`, level by level in name order,
//!    from a snapshot taken once `P` is held.
//!
//! Every logical call therefore acquires nodes in increasing (depth, path)
//! order, so concurrent calls cannot wait on each other in a cycle. The
//! nodes taken by an exclusive acquisition are recorded and exactly that
//! set is released by the matching unlock. If any step fails, everything
//! taken so far is released before the error is returned.
//!
//! A path can carry more than one record when the locked node was removed
//! and a new node was added and locked under the same name. Unlock releases
//! the records of detached nodes first, so the node now in the tree stays
//! held until its own record is released.
//!
//! Dropping a lock future while it waits is not supported; stop the naming
//! server instead, which fails every waiter with
//! [`Error::LockInterrupted`].

use crate::config::DEFAULT_REPLICATION_THRESHOLD;
use crate::container::StorageContainer;
use crate::error::{Error, Result};
use crate::lock::LockMode;
use crate::node::{NodeKind, NodeRef};
use crate::path::DfsPath;
use diagnostics::*;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

/// Nodes locked by one exclusive acquisition, in acquisition order
struct ExclusiveHold {
    target: NodeRef,
    taken: Vec<(NodeRef, LockMode)>,
}

pub struct DirectoryTree {
    root: NodeRef,
    empty_servers: Mutex<VecDeque<StorageContainer>>,
    holds: Mutex<HashMap<DfsPath, Vec<ExclusiveHold>>>,
    pub(crate) replication_threshold: u32,
}

impl Default for DirectoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectoryTree {
    #[must_use]
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_REPLICATION_THRESHOLD)
    }

    /// Creates an empty tree that replicates a file after `threshold` shared grants.
    #[must_use]
    pub fn with_threshold(threshold: u32) -> Self {
        Self {
            root: NodeRef::new_root(None),
            empty_servers: Mutex::new(VecDeque::new()),
            holds: Mutex::new(HashMap::new()),
            replication_threshold: threshold,
        }
    }

    #[must_use]
    pub fn root(&self) -> NodeRef {
        self.root.clone()
    }

    #[must_use]
    pub fn replication_threshold(&self) -> u32 {
        self.replication_threshold
    }

    /// Resolves `path`, walking from the root.
    pub async fn get(&self, path: &DfsPath) -> Result<NodeRef> {
        let mut node = self.root.clone();
        for name in path.components() {
            let next = node.child(name).await;
            node = next.ok_or_else(|| Error::not_found(path))?;
        }
        Ok(node)
    }

    pub async fn contains(&self, path: &DfsPath) -> bool {
        self.get(path).await.is_ok()
    }

    /// Inserts a new node under an existing directory.
    ///
    /// The node inherits the parent's home container unless `container` is
    /// given. A file needs a container from one or the other.
    pub async fn add(
        &self,
        path: &DfsPath,
        kind: NodeKind,
        container: Option<StorageContainer>,
    ) -> Result<NodeRef> {
        let (Some(parent_path), Some(name)) = (path.parent(), path.last()) else {
            return Err(Error::already_exists(path));
        };
        let parent = self.get(&parent_path).await?;
        if parent.is_file() {
            return Err(Error::not_a_directory(&parent_path));
        }

        let mut state = parent.state.lock().await;
        if state.children.contains_key(name) {
            return Err(Error::already_exists(path));
        }
        let home = container.or_else(|| state.home.clone());
        let node = match kind {
            NodeKind::Root => {
                return Err(Error::invalid_path(path.to_string(), "cannot add a root"));
            }
            NodeKind::Directory => NodeRef::new_directory(&parent, path.clone(), home),
            NodeKind::File => {
                NodeRef::new_file(&parent, path.clone(), home.ok_or(Error::NoStorage)?)
            }
        };
        let _ = state.children.insert(name.to_string(), node.clone());
        Ok(node)
    }

    /// Unlinks `path` from its parent. The root is never removed.
    pub async fn remove(&self, path: &DfsPath) -> bool {
        let (Some(parent_path), Some(name)) = (path.parent(), path.last()) else {
            return false;
        };
        let Ok(parent) = self.get(&parent_path).await else {
            return false;
        };
        parent.state.lock().await.children.remove(name).is_some()
    }

    /// Records `path` as a file held by `container`, creating any missing
    /// directories along the way with `container` as their home.
    pub async fn register(&self, path: &DfsPath, container: &StorageContainer) -> Result<NodeRef> {
        {
            let mut root = self.root.state.lock().await;
            if root.home.is_none() {
                root.home = Some(container.clone());
            }
        }

        let components: Vec<&str> = path.components().collect();
        let Some((file_name, dirs)) = components.split_last() else {
            return Err(Error::already_exists(path));
        };

        let mut node = self.root.clone();
        let mut walked = DfsPath::root();
        for name in dirs {
            walked = walked.child(name)?;
            let next = {
                let mut state = node.state.lock().await;
                match state.children.get(*name) {
                    Some(child) => child.clone(),
                    None => {
                        let child =
                            NodeRef::new_directory(&node, walked.clone(), Some(container.clone()));
                        let _ = state.children.insert(name.to_string(), child.clone());
                        child
                    }
                }
            };
            if next.is_file() {
                return Err(Error::not_a_directory(&walked));
            }
            node = next;
        }

        let mut state = node.state.lock().await;
        if state.children.contains_key(*file_name) {
            return Err(Error::already_exists(path));
        }
        let file = NodeRef::new_file(&node, path.clone(), container.clone());
        let _ = state.children.insert(file_name.to_string(), file.clone());
        Ok(file)
    }

    /// Names of the immediate children of a directory, in name order
    pub async fn children_names(&self, path: &DfsPath) -> Result<Vec<String>> {
        let node = self.get(path).await?;
        if node.is_file() {
            return Err(Error::not_a_directory(path));
        }
        let state = node.state.lock().await;
        Ok(state.children.keys().cloned().collect())
    }

    /// Every distinct container holding a file at or below `path`
    pub async fn containers_under(&self, path: &DfsPath) -> Result<Vec<StorageContainer>> {
        let mut found: Vec<StorageContainer> = Vec::new();
        let mut stack = vec![self.get(path).await?];
        while let Some(node) = stack.pop() {
            let state = node.state.lock().await;
            for replica in &state.replicas {
                if !found.contains(replica) {
                    found.push(replica.clone());
                }
            }
            stack.extend(state.children.values().rev().cloned());
        }
        Ok(found)
    }

    /// Adds a container that holds no files to the back of the pool.
    pub async fn add_empty_server(&self, container: StorageContainer) {
        let mut pool = self.empty_servers.lock().await;
        if !pool.contains(&container) {
            pool.push_back(container);
        }
    }

    pub async fn empty_servers(&self) -> Vec<StorageContainer> {
        self.empty_servers.lock().await.iter().cloned().collect()
    }

    /// First container not in `excluding`: the oldest pool entry, else the
    /// first directory home or file replica met by a depth-first walk in
    /// name order. A pool entry is taken out of the pool.
    pub async fn find_available_storage_container(
        &self,
        excluding: &[StorageContainer],
    ) -> Option<StorageContainer> {
        self.take_available(excluding)
            .await
            .map(|(container, _)| container)
    }

    /// As [`Self::find_available_storage_container`], also reporting whether
    /// the container came out of the pool.
    pub(crate) async fn take_available(
        &self,
        excluding: &[StorageContainer],
    ) -> Option<(StorageContainer, bool)> {
        {
            let mut pool = self.empty_servers.lock().await;
            if let Some(pos) = pool.iter().position(|c| !excluding.contains(c)) {
                return pool.remove(pos).map(|c| (c, true));
            }
        }

        let mut stack = vec![self.root.clone()];
        while let Some(node) = stack.pop() {
            let state = node.state.lock().await;
            if let Some(found) = state
                .home
                .iter()
                .chain(state.replicas.iter())
                .find(|c| !excluding.contains(c))
            {
                return Some((found.clone(), false));
            }
            stack.extend(state.children.values().rev().cloned());
        }
        None
    }

    /// Puts a container taken from the pool back at its head.
    pub(crate) async fn return_to_pool(&self, container: StorageContainer) {
        let mut pool = self.empty_servers.lock().await;
        if !pool.contains(&container) {
            pool.push_front(container);
        }
    }

    /// Takes a logical lock on `path`, waiting as long as necessary.
    pub async fn lock(&self, path: &DfsPath, mode: LockMode) -> Result<NodeRef> {
        let target = self.get(path).await?;
        match mode {
            LockMode::Shared => target.acquire(mode).await?,
            LockMode::Exclusive => {
                let mut taken = Vec::new();
                if let Err(err) = Self::acquire_exclusive(&target, &mut taken).await {
                    let pathstr = path.to_string();
                    let count = taken.len();
                    log_debug!("Exclusive lock on {pathstr} failed, releasing {count} nodes", pathstr: pathstr, count: count);
                    let _ = Self::release_all(&taken).await;
                    return Err(err);
                }
                self.holds
                    .lock()
                    .await
                    .entry(path.clone())
                    .or_default()
                    .push(ExclusiveHold {
                        target: target.clone(),
                        taken,
                    });
            }
        }
        Ok(target)
    }

    async fn acquire_exclusive(target: &NodeRef, taken: &mut Vec<(NodeRef, LockMode)>) -> Result<()> {
        for ancestor in target.ancestors() {
            ancestor.acquire(LockMode::Shared).await?;
            taken.push((ancestor, LockMode::Shared));
        }

        target.acquire(LockMode::Exclusive).await?;
        taken.push((target.clone(), LockMode::Exclusive));

        let mut level = target.children().await;
        while !level.is_empty() {
            let mut next = Vec::new();
            for node in level {
                node.acquire(LockMode::Exclusive).await?;
                next.extend(node.children().await);
                taken.push((node, LockMode::Exclusive));
            }
            level = next;
        }
        Ok(())
    }

    /// Releases in reverse acquisition order, reporting the first failure.
    async fn release_all(taken: &[(NodeRef, LockMode)]) -> Result<()> {
        let mut first_err = None;
        for (node, mode) in taken.iter().rev() {
            if let Err(err) = node.release(*mode).await {
                let _ = first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Releases a logical lock taken by [`Self::lock`].
    pub async fn unlock(&self, path: &DfsPath, mode: LockMode) -> Result<()> {
        match mode {
            LockMode::Shared => self.get(path).await?.release(mode).await,
            LockMode::Exclusive => {
                let current = self.get(path).await;
                let hold = {
                    let mut holds = self.holds.lock().await;
                    let hold = holds.get_mut(path).and_then(|list| {
                        let pos = list
                            .iter()
                            .position(|h| current.as_ref().ok() != Some(&h.target))
                            .unwrap_or(0);
                        (pos < list.len()).then(|| list.remove(pos))
                    });
                    if holds.get(path).is_some_and(Vec::is_empty) {
                        let _ = holds.remove(path);
                    }
                    hold
                };
                match hold {
                    Some(hold) => Self::release_all(&hold.taken).await,
                    None => {
                        let _ = current?;
                        Err(Error::not_locked(path, mode))
                    }
                }
            }
        }
    }

    /// Paths currently held exclusively through [`Self::lock`]
    pub async fn exclusive_holds(&self) -> Vec<DfsPath> {
        let mut paths: Vec<DfsPath> = self
            .holds
            .lock()
            .await
            .iter()
            .flat_map(|(path, list)| std::iter::repeat_n(path.clone(), list.len()))
            .collect();
        paths.sort();
        paths
    }

    /// Fails every waiting lock request and refuses new waits on every node
    /// now in the tree. Holders keep their locks and may still release them.
    pub async fn interrupt_waiters(&self) -> usize {
        let mut interrupted = 0;
        let mut stack = vec![self.root.clone()];
        while let Some(node) = stack.pop() {
            interrupted += node.close_waiters().await;
            stack.extend(node.children().await);
        }
        interrupted
    }
}
