// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use super::locked;
use anyhow::Result;
use tinydfs::{DfsPath, Service};

/// Lists the entries of a directory, or names a single file.
pub async fn ls_command(
    service: &dyn Service,
    path: &DfsPath,
    mut handler: impl FnMut(String),
) -> Result<()> {
    let lines = locked(service, path, false, move || async move {
        if !service.is_directory(path).await? {
            return anyhow::Ok(vec![path.to_string()]);
        }
        let mut lines = Vec::new();
        for name in service.list(path).await? {
            if service.is_directory(&path.child(&name)?).await? {
                lines.push(format!("{}/", name));
            } else {
                lines.push(name);
            }
        }
        anyhow::Ok(lines)
    })
    .await?;

    for line in lines {
        handler(line);
    }
    Ok(())
}
