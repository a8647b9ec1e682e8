// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Shared grants on a file between two replication attempts
pub const DEFAULT_REPLICATION_THRESHOLD: u32 = 20;

/// Endpoint the naming server's registration interface is bound to
pub const DEFAULT_REGISTRATION_ENDPOINT: &str = "naming.registration";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    pub replication_threshold: u32,
    pub registration_endpoint: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            replication_threshold: DEFAULT_REPLICATION_THRESHOLD,
            registration_endpoint: DEFAULT_REGISTRATION_ENDPOINT.to_string(),
        }
    }
}

impl NamingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.replication_threshold == 0 {
            return Err(Error::config("replication_threshold must be at least 1"));
        }
        if self.registration_endpoint.is_empty() {
            return Err(Error::config("registration_endpoint must not be empty"));
        }
        Ok(())
    }
}

/// One storage server backed by a host directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    pub name: String,
    pub root: PathBuf,
}

/// A naming server plus the storage servers that register with it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub naming: NamingConfig,
    pub storage: Vec<StorageConfig>,
}

impl ClusterConfig {
    pub fn validate(&self) -> Result<()> {
        self.naming.validate()?;
        for (i, s) in self.storage.iter().enumerate() {
            if s.name.is_empty() {
                return Err(Error::config(format!("storage[{}] has an empty name", i)));
            }
            if self.storage[..i].iter().any(|other| other.name == s.name) {
                return Err(Error::config(format!("duplicate storage name '{}'", s.name)));
            }
        }
        Ok(())
    }

    /// Parses and validates a YAML document.
    pub fn from_yaml_bytes(bytes: &[u8]) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_slice(bytes)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_yaml_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_yaml_ng::to_string(self)?.into_bytes())
    }

    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = tokio::fs::read(path.as_ref()).await.map_err(|e| {
            Error::config(format!("cannot read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_yaml_bytes(&bytes)
    }
}
