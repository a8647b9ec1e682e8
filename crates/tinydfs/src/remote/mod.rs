// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! In-process remote calls between the naming server and storage servers.
//!
//! Every call is encoded as JSON, sent over a channel to the task serving
//! the target endpoint, decoded there, and answered the same way. Any
//! failure of the call itself (nothing bound, server gone, undecodable
//! payload) surfaces as [`Error::Communication`](crate::Error::Communication).

mod network;
pub mod protocol;
mod skeleton;
mod stub;

pub use network::Network;
pub use skeleton::Skeleton;
pub use stub::{CommandStub, RegistrationStub, StorageStub};
