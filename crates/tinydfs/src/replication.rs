// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Read-driven replication and write-driven consolidation of file replicas.
//!
//! Neither operation holds a node's mutex across a call to a storage
//! server: the replica list is read or trimmed under the mutex, the remote
//! calls happen afterwards, and the list is updated again on success.

use crate::container::StorageContainer;
use crate::error::Result;
use crate::node::NodeRef;
use crate::tree::DirectoryTree;
use diagnostics::*;

impl DirectoryTree {
    /// Counts one shared grant on `node`. Every `replication_threshold`
    /// grants on a file, one more replica is attempted. Returns the
    /// container that received the new copy, if any.
    ///
    /// Failures are logged and otherwise ignored.
    pub async fn record_read(&self, node: &NodeRef) -> Option<StorageContainer> {
        if !node.is_file() {
            return None;
        }
        let replicas = {
            let mut state = node.state.lock().await;
            state.read_counter += 1;
            if state.read_counter < self.replication_threshold {
                return None;
            }
            state.read_counter = 0;
            state.replicas.clone()
        };
        self.replicate(node, &replicas).await
    }

    async fn replicate(
        &self,
        node: &NodeRef,
        replicas: &[StorageContainer],
    ) -> Option<StorageContainer> {
        let path = node.path().to_string();
        let source = replicas.first()?;
        let Some((target, from_pool)) = self.take_available(replicas).await else {
            log_debug!("No storage available to replicate {path}", path: path);
            return None;
        };

        let target_str = target.to_string();
        match target.command().copy(node.path(), source.storage()).await {
            Ok(true) => {
                let count = {
                    let mut state = node.state.lock().await;
                    if !state.replicas.contains(&target) {
                        state.replicas.push(target.clone());
                    }
                    state.replicas.len()
                };
                log_info!("Replicated {path} to {target}, now {count} replicas", path: path, target: target_str, count: count);
                Some(target)
            }
            Ok(false) => {
                log_warn!("Storage {target} refused a copy of {path}", target: target_str, path: path);
                if from_pool {
                    self.return_to_pool(target).await;
                }
                None
            }
            Err(err) => {
                let reason = err.to_string();
                log_warn!("Replicating {path} to {target} failed: {reason}", path: path, target: target_str, reason: reason);
                if from_pool {
                    self.return_to_pool(target).await;
                }
                None
            }
        }
    }

    /// Reduces a file to its first replica and deletes the copies held by
    /// every other container. Returns how many copies were dropped.
    ///
    /// The replica list is trimmed before any delete is issued; the first
    /// delete failure is returned after all deletes were attempted.
    pub async fn consolidate(&self, node: &NodeRef) -> Result<usize> {
        if !node.is_file() {
            return Ok(0);
        }
        let removed = {
            let mut state = node.state.lock().await;
            if state.replicas.len() <= 1 {
                return Ok(0);
            }
            state.replicas.split_off(1)
        };

        let path = node.path().to_string();
        let count = removed.len();
        log_info!("Consolidating {path}, dropping {count} replicas", path: path, count: count);

        let mut first_err = None;
        for container in &removed {
            if let Err(err) = container.command().delete(node.path()).await {
                let target = container.to_string();
                let reason = err.to_string();
                log_warn!("Deleting replica of {path} from {target} failed: {reason}", path: path, target: target, reason: reason);
                let _ = first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(count), Err)
    }
}
