// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use crate::error::{Error, Result};
use crate::path::DfsPath;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A call on one of the remote interfaces. Handle arguments travel as the
/// endpoint names they are bound to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Size {
        path: DfsPath,
    },
    Read {
        path: DfsPath,
        offset: u64,
        length: u64,
    },
    Write {
        path: DfsPath,
        offset: u64,
        data: Vec<u8>,
    },
    Create {
        path: DfsPath,
    },
    Delete {
        path: DfsPath,
    },
    Copy {
        path: DfsPath,
        from: String,
    },
    Register {
        storage: String,
        command: String,
        files: Vec<DfsPath>,
    },
}

impl Request {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Request::Size { .. } => "size",
            Request::Read { .. } => "read",
            Request::Write { .. } => "write",
            Request::Create { .. } => "create",
            Request::Delete { .. } => "delete",
            Request::Copy { .. } => "copy",
            Request::Register { .. } => "register",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reply {
    Size(u64),
    Data(Vec<u8>),
    Unit,
    Flag(bool),
    Paths(Vec<DfsPath>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: u64,
    pub request: Request,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    pub result: std::result::Result<Reply, Error>,
}

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Error for a reply variant the caller did not ask for
pub(crate) fn unexpected(request: &str, reply: &Reply) -> Error {
    Error::communication(format!("unexpected reply to {}: {:?}", request, reply))
}
