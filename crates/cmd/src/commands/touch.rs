// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use super::{locked, parent_of};
use anyhow::{Result, anyhow};
use tinydfs::{DfsPath, Service};

/// Creates an empty file. The parent directory is held exclusively meanwhile.
pub async fn touch_command(service: &dyn Service, path: &DfsPath) -> Result<()> {
    let parent = parent_of(path)?;
    let created = locked(service, &parent, true, move || async move {
        anyhow::Ok(service.create_file(path).await?)
    })
    .await?;
    if !created {
        return Err(anyhow!("'{}' already exists", path));
    }
    Ok(())
}
