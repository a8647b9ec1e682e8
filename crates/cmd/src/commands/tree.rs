// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use super::locked;
use anyhow::Result;
use diagnostics::*;
use tinydfs::{DfsPath, Service};

/// Prints every path in the filesystem, depth first in name order.
/// Directories end in `/`.
pub async fn tree_command(service: &dyn Service, mut handler: impl FnMut(String)) -> Result<()> {
    let root = DfsPath::root();
    let lines = locked(service, &root, false, move || walk(service)).await?;

    let count = lines.len();
    log_debug!("Tree walk found {count} paths", count: count);
    for line in lines {
        handler(line);
    }
    Ok(())
}

async fn walk(service: &dyn Service) -> Result<Vec<String>> {
    let mut lines = Vec::new();
    let mut stack = vec![DfsPath::root()];
    while let Some(path) = stack.pop() {
        if !service.is_directory(&path).await? {
            lines.push(path.to_string());
            continue;
        }
        if path.is_root() {
            lines.push("/".to_string());
        } else {
            lines.push(format!("{}/", path));
        }
        for name in service.list(&path).await?.iter().rev() {
            stack.push(path.child(name)?);
        }
    }
    Ok(lines)
}
