// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Structured logging shared by every crate in the workspace.
//!
//! Usage:
//! - Set DFS_LOG=off (default) - no logs
//! - Set DFS_LOG=info - naming and storage server operations
//! - Set DFS_LOG=debug - lock grants, waits and tree walks

use std::sync::Once;

// Re-export emit so macros can use it
pub use emit;

static INIT: Once = Once::new();

/// Environment variable that selects the log level.
pub const LOG_ENV: &str = "DFS_LOG";

fn min_level(name: &str) -> Option<emit::Level> {
    match name {
        "debug" => Some(emit::Level::Debug),
        "info" => Some(emit::Level::Info),
        "warn" => Some(emit::Level::Warn),
        "error" => Some(emit::Level::Error),
        _ => None,
    }
}

/// Initialize diagnostics based on the DFS_LOG environment variable
///
/// Safe to call more than once; only the first call has any effect.
pub fn init_diagnostics() {
    INIT.call_once(|| {
        let log_level = std::env::var(LOG_ENV).unwrap_or_else(|_| "off".to_string());
        if log_level == "off" {
            return;
        }

        let level = min_level(&log_level);
        let rt = emit::setup()
            .emit_to(emit_term::stderr())
            .emit_when(emit::level::min_filter(level.unwrap_or(emit::Level::Info)))
            .init();

        if level.is_none() {
            emit::warn!("unknown {env} value {value}, using info", env: LOG_ENV, value: log_level);
        }

        // The runtime lives for the rest of the process.
        std::mem::forget(rt);
    });
}

/// Log basic operations (registrations, creates, deletes, server start/stop)
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::emit::info!($($arg)*)
    };
}

/// Log detailed diagnostics (lock grants, queue lengths, tree walks)
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::emit::debug!($($arg)*)
    };
}

/// Log recoverable problems (best-effort replication failures, fallbacks)
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::emit::warn!($($arg)*)
    };
}

/// Log failures that abort a request
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::emit::error!($($arg)*)
    };
}

/// Re-export the init function for convenience
pub use init_diagnostics as init;
