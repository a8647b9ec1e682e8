// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use super::locked;
use anyhow::Result;
use diagnostics::*;
use std::io::Write;
use tinydfs::{DfsPath, Service};

const CHUNK_SIZE: u64 = 64 * 1024;

/// Copies a file to `out` under a shared lock; returns the bytes written.
pub async fn cat_command<W: Write>(service: &dyn Service, path: &DfsPath, out: &mut W) -> Result<u64> {
    let written = locked(service, path, false, move || async move {
        let storage = service.get_storage(path).await?;
        let size = storage.size(path).await?;
        let mut offset = 0;
        while offset < size {
            let length = CHUNK_SIZE.min(size - offset);
            let data = storage.read(path, offset, length).await?;
            out.write_all(&data)?;
            offset += length;
        }
        out.flush()?;
        anyhow::Ok(size)
    })
    .await?;

    let pathstr = path.to_string();
    log_debug!("Read {written} bytes of {path}", written: written, path: pathstr);
    Ok(written)
}
