// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! TinyDFS - a distributed filesystem with a central naming server
//!
//! The naming server keeps the whole directory tree in memory and
//! coordinates clients through hierarchical path locks. File bytes live on
//! storage servers, which register the files they hold at startup. Files
//! that are read often get copied to further storage servers; an exclusive
//! lock on a file first reduces it back to one copy.
//!
//! Set DFS_LOG to control logging:
//! - DFS_LOG=off (default) - silent
//! - DFS_LOG=info - registrations, creates, deletes, replication
//! - DFS_LOG=debug - lock waits and endpoint binding

// Paths and errors
pub mod error;
pub mod path;

// Interfaces of the naming and storage servers
pub mod service;
pub mod storage;

// Directory tree and its locking protocol
pub mod container;
pub mod lock;
pub mod node;
pub mod tree;

// Replication and consolidation of file replicas
mod replication;

pub mod config;
pub mod naming;

// Storage server backends
pub mod hostmount;
pub mod memory;
pub mod server;

// In-process transport
pub mod remote;

pub use config::{ClusterConfig, NamingConfig, StorageConfig};
pub use container::StorageContainer;
pub use error::{Error, Result};
pub use hostmount::HostStorage;
pub use lock::{LockMode, LockStatus};
pub use memory::MemoryStorage;
pub use naming::NamingServer;
pub use node::{DirectoryNode, NodeKind, NodeRef};
pub use path::DfsPath;
pub use remote::Network;
pub use server::StorageServer;
pub use service::{Registration, Service};
pub use storage::{Command, Storage, StorageBackend};
pub use tree::DirectoryTree;

#[cfg(test)]
mod tests;
