// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::storage::{Command, Storage};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// One physical location able to hold a replica: a storage server's data
/// handle paired with its administrative handle.
///
/// Two containers are equal when both handles talk to the same endpoints,
/// so separately created stubs for one server compare equal.
#[derive(Clone)]
pub struct StorageContainer {
    storage: Arc<dyn Storage>,
    command: Arc<dyn Command>,
}

impl StorageContainer {
    pub fn new(storage: Arc<dyn Storage>, command: Arc<dyn Command>) -> Self {
        Self { storage, command }
    }

    #[must_use]
    pub fn storage(&self) -> Arc<dyn Storage> {
        self.storage.clone()
    }

    #[must_use]
    pub fn command(&self) -> Arc<dyn Command> {
        self.command.clone()
    }

    #[must_use]
    pub fn storage_endpoint(&self) -> &str {
        self.storage.endpoint()
    }

    #[must_use]
    pub fn command_endpoint(&self) -> &str {
        self.command.endpoint()
    }
}

impl PartialEq for StorageContainer {
    fn eq(&self, other: &Self) -> bool {
        self.storage_endpoint() == other.storage_endpoint()
            && self.command_endpoint() == other.command_endpoint()
    }
}

impl Eq for StorageContainer {}

impl Hash for StorageContainer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.storage_endpoint().hash(state);
        self.command_endpoint().hash(state);
    }
}

impl fmt::Display for StorageContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[storage: {}, command: {}]",
            self.storage_endpoint(),
            self.command_endpoint()
        )
    }
}

impl fmt::Debug for StorageContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageContainer{}", self)
    }
}
