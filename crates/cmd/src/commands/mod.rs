// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

pub mod cat;
pub mod ls;
pub mod mkdir;
pub mod rm;
pub mod touch;
pub mod tree;

pub use cat::cat_command;
pub use ls::ls_command;
pub use mkdir::mkdir_command;
pub use rm::rm_command;
pub use touch::touch_command;
pub use tree::tree_command;

use anyhow::{Result, anyhow};
use std::future::Future;
use tinydfs::{DfsPath, Service};

/// Runs `op` while holding a lock on `path`. The lock is released whether
/// or not `op` succeeds; an error from `op` takes precedence.
pub(crate) async fn locked<T, F, Fut>(
    service: &dyn Service,
    path: &DfsPath,
    exclusive: bool,
    op: F,
) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    service.lock(path, exclusive).await?;
    let result = op().await;
    let released = service.unlock(path, exclusive).await;
    let value = result?;
    released?;
    Ok(value)
}

/// Directory a new or removed entry lives in
pub(crate) fn parent_of(path: &DfsPath) -> Result<DfsPath> {
    path.parent()
        .ok_or_else(|| anyhow!("'{}' has no parent directory", path))
}
