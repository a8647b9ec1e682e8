// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::container::StorageContainer;
use crate::error::{Error, Result};
use crate::lock::{Acquire, LockMode, LockState, LockStatus};
use crate::path::DfsPath;
use diagnostics::*;
use std::collections::BTreeMap;
use std::ops::Deref;
use std::sync::{Arc, Weak};
use tokio::sync::Mutex;

/// Type of node (root, directory, or file)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Root,
    Directory,
    File,
}

/// Mutable part of a node, guarded by the node's mutex
#[derive(Default)]
pub(crate) struct NodeState {
    pub(crate) children: BTreeMap<String, NodeRef>,
    /// Administrative home of a directory or the root
    pub(crate) home: Option<StorageContainer>,
    /// Containers holding a copy of a file, the first is canonical
    pub(crate) replicas: Vec<StorageContainer>,
    pub(crate) lock: LockState,
    pub(crate) read_counter: u32,
    pub(crate) next_read: usize,
}

/// One entry of the directory tree.
///
/// Parents own their children through the child map; the parent link is a
/// [`Weak`] reference used only to walk upwards.
pub struct DirectoryNode {
    path: DfsPath,
    kind: NodeKind,
    parent: Weak<DirectoryNode>,
    pub(crate) state: Mutex<NodeState>,
}

#[derive(Clone)]
pub struct NodeRef(Arc<DirectoryNode>);

impl Deref for NodeRef {
    type Target = DirectoryNode;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl PartialEq for NodeRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for NodeRef {}

impl std::fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeRef({:?} {})", self.kind, self.path)
    }
}

impl NodeRef {
    pub(crate) fn new_root(home: Option<StorageContainer>) -> Self {
        Self(Arc::new(DirectoryNode {
            path: DfsPath::root(),
            kind: NodeKind::Root,
            parent: Weak::new(),
            state: Mutex::new(NodeState {
                home,
                ..NodeState::default()
            }),
        }))
    }

    pub(crate) fn new_directory(
        parent: &NodeRef,
        path: DfsPath,
        home: Option<StorageContainer>,
    ) -> Self {
        Self(Arc::new(DirectoryNode {
            path,
            kind: NodeKind::Directory,
            parent: Arc::downgrade(&parent.0),
            state: Mutex::new(NodeState {
                home,
                ..NodeState::default()
            }),
        }))
    }

    pub(crate) fn new_file(parent: &NodeRef, path: DfsPath, replica: StorageContainer) -> Self {
        Self(Arc::new(DirectoryNode {
            path,
            kind: NodeKind::File,
            parent: Arc::downgrade(&parent.0),
            state: Mutex::new(NodeState {
                replicas: vec![replica],
                ..NodeState::default()
            }),
        }))
    }

    /// Strict ancestors still linked to this node, root first
    #[must_use]
    pub fn ancestors(&self) -> Vec<NodeRef> {
        let mut chain = Vec::new();
        let mut cursor = self.parent();
        while let Some(node) = cursor {
            cursor = node.parent();
            chain.push(node);
        }
        chain.reverse();
        chain
    }
}

impl DirectoryNode {
    #[must_use]
    pub fn path(&self) -> &DfsPath {
        &self.path
    }

    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    #[must_use]
    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    /// True for directories and the root
    #[must_use]
    pub fn is_directory(&self) -> bool {
        self.kind != NodeKind::File
    }

    #[must_use]
    pub fn parent(&self) -> Option<NodeRef> {
        self.parent.upgrade().map(NodeRef)
    }

    pub async fn child(&self, name: &str) -> Option<NodeRef> {
        self.state.lock().await.children.get(name).cloned()
    }

    /// Children in name order
    pub async fn children(&self) -> Vec<NodeRef> {
        self.state.lock().await.children.values().cloned().collect()
    }

    pub async fn home(&self) -> Option<StorageContainer> {
        self.state.lock().await.home.clone()
    }

    pub async fn replicas(&self) -> Vec<StorageContainer> {
        self.state.lock().await.replicas.clone()
    }

    pub async fn lock_status(&self) -> LockStatus {
        self.state.lock().await.lock.status()
    }

    /// Shared and exclusive hold counts
    pub async fn lock_counts(&self) -> (usize, usize) {
        let state = self.state.lock().await;
        (state.lock.shared_count(), state.lock.exclusive_count())
    }

    pub async fn read_counter(&self) -> u32 {
        self.state.lock().await.read_counter
    }

    /// Takes one hold of `mode` on this node alone, waiting in the node's
    /// queue while the mode is incompatible with the current holders.
    pub(crate) async fn acquire(&self, mode: LockMode) -> Result<()> {
        let granted = {
            let mut state = self.state.lock().await;
            match state.lock.acquire(mode) {
                Acquire::Granted => return Ok(()),
                Acquire::Closed => return Err(Error::lock_interrupted(&self.path)),
                Acquire::Wait(granted) => granted,
            }
        };
        let path = self.path.to_string();
        let mode_str = mode.to_string();
        log_debug!("Waiting for {mode} lock on {path}", mode: mode_str, path: path);
        granted
            .await
            .map_err(|_| Error::lock_interrupted(&self.path))?;
        log_debug!("Granted {mode} lock on {path} after waiting", mode: mode_str, path: path);
        Ok(())
    }

    /// Drops one hold of `mode`, waking whatever the queue now admits.
    pub(crate) async fn release(&self, mode: LockMode) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.lock.release(mode) {
            Ok(())
        } else {
            Err(Error::not_locked(&self.path, mode))
        }
    }

    /// Fails every queued waiter and refuses new waits.
    pub(crate) async fn close_waiters(&self) -> usize {
        self.state.lock().await.lock.close()
    }
}
