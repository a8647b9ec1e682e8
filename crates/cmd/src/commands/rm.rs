// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use super::{locked, parent_of};
use anyhow::{Result, anyhow};
use diagnostics::*;
use tinydfs::{DfsPath, Service};

/// Removes a file or a whole directory, from the tree and from every
/// storage server holding part of it.
pub async fn rm_command(service: &dyn Service, path: &DfsPath) -> Result<()> {
    let parent = parent_of(path)?;
    let removed = locked(service, &parent, true, move || async move {
        anyhow::Ok(service.delete(path).await?)
    })
    .await?;
    if !removed {
        return Err(anyhow!("'{}' was not removed", path));
    }
    let pathstr = path.to_string();
    log_info!("Removed {path}", path: pathstr);
    Ok(())
}
