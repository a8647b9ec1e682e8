// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Hostmount -- a host directory as a storage server backend
//!
//! The filesystem root `/` maps to a configurable host directory, and every
//! path maps to the host path below it. All I/O goes through `tokio::fs`.

mod storage;


pub use storage::HostStorage;
