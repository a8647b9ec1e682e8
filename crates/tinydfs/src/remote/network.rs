// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use super::protocol::{Envelope, Reply, Request, Response, decode, encode};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{RwLock, mpsc, oneshot};

const INBOX_CAPACITY: usize = 64;

/// One encoded request and the channel its encoded response goes back on
pub(crate) struct Frame {
    pub(crate) payload: Vec<u8>,
    pub(crate) reply: oneshot::Sender<Vec<u8>>,
}

/// Registry of bound endpoints.
///
/// Cloning is cheap; clones share the registry.
#[derive(Clone, Default)]
pub struct Network {
    endpoints: Arc<RwLock<HashMap<String, mpsc::Sender<Frame>>>>,
    next_id: Arc<AtomicU64>,
}

impl std::fmt::Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network").finish_non_exhaustive()
    }
}

impl Network {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn bind(&self, endpoint: &str) -> Result<mpsc::Receiver<Frame>> {
        let mut endpoints = self.endpoints.write().await;
        if endpoints.contains_key(endpoint) {
            return Err(Error::communication(format!(
                "endpoint {} is already bound",
                endpoint
            )));
        }
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        let _ = endpoints.insert(endpoint.to_string(), tx);
        Ok(rx)
    }

    /// Removes an endpoint; returns whether it was bound.
    pub async fn unbind(&self, endpoint: &str) -> bool {
        self.endpoints.write().await.remove(endpoint).is_some()
    }

    pub async fn is_bound(&self, endpoint: &str) -> bool {
        self.endpoints.read().await.contains_key(endpoint)
    }

    /// Sends `request` to `endpoint` and waits for its response.
    pub(crate) async fn call(&self, endpoint: &str, request: Request) -> Result<Reply> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let name = request.name();
        let payload = encode(&Envelope { id, request })?;

        let inbox = self
            .endpoints
            .read()
            .await
            .get(endpoint)
            .cloned()
            .ok_or_else(|| Error::communication(format!("nothing bound at {}", endpoint)))?;

        let (reply, response) = oneshot::channel();
        inbox
            .send(Frame { payload, reply })
            .await
            .map_err(|_| Error::communication(format!("{} is not accepting calls", endpoint)))?;
        let bytes = response.await.map_err(|_| {
            Error::communication(format!("{} dropped the {} call", endpoint, name))
        })?;

        let response: Response = decode(&bytes)?;
        if response.id != id {
            return Err(Error::communication(format!(
                "response id {} does not match call {}",
                response.id, id
            )));
        }
        response.result
    }
}
