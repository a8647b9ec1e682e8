// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// An absolute path in the distributed filesystem.
///
/// The root is the empty component list. Ordering is component-wise, which
/// places every ancestor before its descendants; paths that have to be
/// locked together are always locked in increasing order.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DfsPath {
    components: Vec<String>,
}

fn check_component(path: &str, component: &str) -> Result<()> {
    if component.is_empty() {
        return Err(Error::invalid_path(path, "empty component"));
    }
    if component.contains('/') {
        return Err(Error::invalid_path(path, "component contains '/'"));
    }
    if component.contains(':') {
        return Err(Error::invalid_path(path, "component contains ':'"));
    }
    Ok(())
}

impl DfsPath {
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Parses a `/`-delimited path; empty components are dropped.
    pub fn parse(path: &str) -> Result<Self> {
        if !path.starts_with('/') {
            return Err(Error::invalid_path(path, "must start with '/'"));
        }
        let mut components = Vec::new();
        for part in path.split('/').filter(|p| !p.is_empty()) {
            check_component(path, part)?;
            components.push(part.to_string());
        }
        Ok(Self { components })
    }

    /// Returns the path of the named child of this path
    pub fn child(&self, name: &str) -> Result<Self> {
        check_component(name, name)?;
        let mut components = self.components.clone();
        components.push(name.to_string());
        Ok(Self { components })
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    /// Parent path, `None` for the root
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let (_, init) = self.components.split_last()?;
        Some(Self {
            components: init.to_vec(),
        })
    }

    /// Final component, `None` for the root
    #[must_use]
    pub fn last(&self) -> Option<&str> {
        self.components.last().map(String::as_str)
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.components.len()
    }

    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.components.iter().map(String::as_str)
    }

    /// True if `other` is a prefix of this path (every path is a subpath of itself).
    #[must_use]
    pub fn is_subpath(&self, other: &DfsPath) -> bool {
        other.components.len() <= self.components.len()
            && self.components.iter().zip(&other.components).all(|(a, b)| a == b)
    }

    /// Strict ancestors, root first.
    #[must_use]
    pub fn ancestors(&self) -> Vec<DfsPath> {
        (0..self.components.len())
            .map(|n| Self {
                components: self.components[..n].to_vec(),
            })
            .collect()
    }

    /// Maps this path under a host directory
    #[must_use]
    pub fn to_host_path<P: AsRef<Path>>(&self, root: P) -> PathBuf {
        let mut host = root.as_ref().to_path_buf();
        host.extend(&self.components);
        host
    }
}

impl fmt::Display for DfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return write!(f, "/");
        }
        for c in &self.components {
            write!(f, "/{}", c)?;
        }
        Ok(())
    }
}

impl fmt::Debug for DfsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DfsPath({})", self)
    }
}

impl FromStr for DfsPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for DfsPath {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<DfsPath> for String {
    fn from(p: DfsPath) -> String {
        p.to_string()
    }
}
