// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use anyhow::{Context, Result, anyhow};
use diagnostics::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tinydfs::{ClusterConfig, HostStorage, NamingServer, Network, StorageConfig, StorageServer};

/// Parses a `--storage name=dir` argument.
pub fn parse_storage_arg(arg: &str) -> Result<StorageConfig> {
    let (name, root) = arg
        .split_once('=')
        .ok_or_else(|| anyhow!("expected name=dir, got '{}'", arg))?;
    if name.is_empty() || root.is_empty() {
        return Err(anyhow!("expected name=dir, got '{}'", arg));
    }
    Ok(StorageConfig {
        name: name.to_string(),
        root: PathBuf::from(root),
    })
}

/// Reads the optional config file and appends the command-line storage servers.
pub async fn load_config(path: Option<&Path>, storage: &[StorageConfig]) -> Result<ClusterConfig> {
    let mut config = match path {
        Some(path) => ClusterConfig::from_file(path)
            .await
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ClusterConfig::default(),
    };
    config.storage.extend(storage.iter().cloned());
    config.validate()?;
    if config.storage.is_empty() {
        return Err(anyhow!("no storage servers: pass --storage name=dir or list them in --config"));
    }
    Ok(config)
}

/// A naming server and its storage servers on one in-process network
pub struct Cluster {
    network: Network,
    naming: Arc<NamingServer>,
    servers: Vec<StorageServer>,
}

impl Cluster {
    /// Starts the naming server, then each storage server in order.
    ///
    /// Storage servers register one at a time, so when two directories hold
    /// the same path the one listed first keeps it and the other deletes its copy.
    pub async fn start(config: &ClusterConfig) -> Result<Self> {
        let network = Network::new();
        let naming = NamingServer::new(config.naming.clone())?;
        naming.start(&network).await?;

        let mut cluster = Self {
            network,
            naming,
            servers: Vec::new(),
        };
        for storage in &config.storage {
            if let Err(err) = cluster.add_server(config, storage).await {
                cluster.stop().await;
                return Err(err);
            }
        }

        let count = cluster.servers.len();
        log_info!("Cluster started with {count} storage servers", count: count);
        Ok(cluster)
    }

    async fn add_server(&mut self, config: &ClusterConfig, storage: &StorageConfig) -> Result<()> {
        let backend = HostStorage::new(storage.name.clone(), storage.root.clone())
            .with_context(|| format!("Storage server '{}'", storage.name))?;
        let server = StorageServer::start(backend, &self.network, &config.naming.registration_endpoint)
            .await
            .with_context(|| format!("Failed to register storage server '{}'", storage.name))?;
        self.servers.push(server);
        Ok(())
    }

    #[must_use]
    pub fn naming(&self) -> &Arc<NamingServer> {
        &self.naming
    }

    #[must_use]
    pub fn servers(&self) -> &[StorageServer] {
        &self.servers
    }

    pub async fn stop(&self) {
        for server in self.servers.iter().rev() {
            server.stop().await;
        }
        self.naming.stop().await;
    }
}
