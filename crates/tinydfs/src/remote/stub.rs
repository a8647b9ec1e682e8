// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Client side of the remote interfaces.

use super::network::Network;
use super::protocol::{Reply, Request, unexpected};
use crate::error::Result;
use crate::path::DfsPath;
use crate::service::Registration;
use crate::storage::{Command, Storage};
use async_trait::async_trait;
use std::sync::Arc;

/// Forwards [`Storage`] calls to a bound endpoint
#[derive(Clone, Debug)]
pub struct StorageStub {
    network: Network,
    endpoint: String,
}

impl StorageStub {
    pub fn new<S: Into<String>>(network: &Network, endpoint: S) -> Self {
        Self {
            network: network.clone(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Storage for StorageStub {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn size(&self, path: &DfsPath) -> Result<u64> {
        let request = Request::Size { path: path.clone() };
        match self.network.call(&self.endpoint, request).await? {
            Reply::Size(size) => Ok(size),
            other => Err(unexpected("size", &other)),
        }
    }

    async fn read(&self, path: &DfsPath, offset: u64, length: u64) -> Result<Vec<u8>> {
        let request = Request::Read {
            path: path.clone(),
            offset,
            length,
        };
        match self.network.call(&self.endpoint, request).await? {
            Reply::Data(data) => Ok(data),
            other => Err(unexpected("read", &other)),
        }
    }

    async fn write(&self, path: &DfsPath, offset: u64, data: &[u8]) -> Result<()> {
        let request = Request::Write {
            path: path.clone(),
            offset,
            data: data.to_vec(),
        };
        match self.network.call(&self.endpoint, request).await? {
            Reply::Unit => Ok(()),
            other => Err(unexpected("write", &other)),
        }
    }
}

/// Forwards [`Command`] calls to a bound endpoint
#[derive(Clone, Debug)]
pub struct CommandStub {
    network: Network,
    endpoint: String,
}

impl CommandStub {
    pub fn new<S: Into<String>>(network: &Network, endpoint: S) -> Self {
        Self {
            network: network.clone(),
            endpoint: endpoint.into(),
        }
    }

    async fn flag(&self, name: &str, request: Request) -> Result<bool> {
        match self.network.call(&self.endpoint, request).await? {
            Reply::Flag(flag) => Ok(flag),
            other => Err(unexpected(name, &other)),
        }
    }
}

#[async_trait]
impl Command for CommandStub {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn create(&self, path: &DfsPath) -> Result<bool> {
        self.flag("create", Request::Create { path: path.clone() })
            .await
    }

    async fn delete(&self, path: &DfsPath) -> Result<bool> {
        self.flag("delete", Request::Delete { path: path.clone() })
            .await
    }

    async fn copy(&self, path: &DfsPath, from: Arc<dyn Storage>) -> Result<bool> {
        let request = Request::Copy {
            path: path.clone(),
            from: from.endpoint().to_string(),
        };
        self.flag("copy", request).await
    }
}

/// Forwards [`Registration`] calls to the naming server
#[derive(Clone, Debug)]
pub struct RegistrationStub {
    network: Network,
    endpoint: String,
}

impl RegistrationStub {
    pub fn new<S: Into<String>>(network: &Network, endpoint: S) -> Self {
        Self {
            network: network.clone(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Registration for RegistrationStub {
    async fn register(
        &self,
        storage: Arc<dyn Storage>,
        command: Arc<dyn Command>,
        files: Vec<DfsPath>,
    ) -> Result<Vec<DfsPath>> {
        let request = Request::Register {
            storage: storage.endpoint().to_string(),
            command: command.endpoint().to_string(),
            files,
        };
        match self.network.call(&self.endpoint, request).await? {
            Reply::Paths(duplicates) => Ok(duplicates),
            other => Err(unexpected("register", &other)),
        }
    }
}
