// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Server side of the remote interfaces.
//!
//! A [`Skeleton`] owns one bound endpoint. Each inbound call is decoded and
//! served on its own task, so a slow call never holds up the next one.

use super::network::{Frame, Network};
use super::protocol::{Envelope, Reply, Request, Response, decode, encode};
use super::stub::{CommandStub, StorageStub};
use crate::error::{Error, Result};
use crate::service::Registration;
use crate::storage::{Command, Storage};
use async_trait::async_trait;
use diagnostics::*;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Maps decoded requests onto a local object
#[async_trait]
trait Dispatch: Send + Sync + 'static {
    async fn dispatch(&self, network: &Network, request: Request) -> Result<Reply>;
}

fn unsupported(request: &Request) -> Error {
    Error::communication(format!("{} is not served here", request.name()))
}

struct StorageDispatch(Arc<dyn Storage>);

#[async_trait]
impl Dispatch for StorageDispatch {
    async fn dispatch(&self, _network: &Network, request: Request) -> Result<Reply> {
        match request {
            Request::Size { path } => Ok(Reply::Size(self.0.size(&path).await?)),
            Request::Read {
                path,
                offset,
                length,
            } => Ok(Reply::Data(self.0.read(&path, offset, length).await?)),
            Request::Write { path, offset, data } => {
                self.0.write(&path, offset, &data).await?;
                Ok(Reply::Unit)
            }
            other => Err(unsupported(&other)),
        }
    }
}

struct CommandDispatch(Arc<dyn Command>);

#[async_trait]
impl Dispatch for CommandDispatch {
    async fn dispatch(&self, network: &Network, request: Request) -> Result<Reply> {
        match request {
            Request::Create { path } => Ok(Reply::Flag(self.0.create(&path).await?)),
            Request::Delete { path } => Ok(Reply::Flag(self.0.delete(&path).await?)),
            Request::Copy { path, from } => {
                let source: Arc<dyn Storage> = Arc::new(StorageStub::new(network, from));
                Ok(Reply::Flag(self.0.copy(&path, source).await?))
            }
            other => Err(unsupported(&other)),
        }
    }
}

struct RegistrationDispatch(Arc<dyn Registration>);

#[async_trait]
impl Dispatch for RegistrationDispatch {
    async fn dispatch(&self, network: &Network, request: Request) -> Result<Reply> {
        match request {
            Request::Register {
                storage,
                command,
                files,
            } => {
                let storage: Arc<dyn Storage> = Arc::new(StorageStub::new(network, storage));
                let command: Arc<dyn Command> = Arc::new(CommandStub::new(network, command));
                let duplicates = self.0.register(storage, command, files).await?;
                Ok(Reply::Paths(duplicates))
            }
            other => Err(unsupported(&other)),
        }
    }
}

/// A bound endpoint serving one local object
pub struct Skeleton {
    endpoint: String,
    network: Network,
    accept: JoinHandle<()>,
}

impl Skeleton {
    pub async fn storage(network: &Network, endpoint: &str, target: Arc<dyn Storage>) -> Result<Self> {
        Self::start(network, endpoint, Arc::new(StorageDispatch(target))).await
    }

    pub async fn command(network: &Network, endpoint: &str, target: Arc<dyn Command>) -> Result<Self> {
        Self::start(network, endpoint, Arc::new(CommandDispatch(target))).await
    }

    pub async fn registration(
        network: &Network,
        endpoint: &str,
        target: Arc<dyn Registration>,
    ) -> Result<Self> {
        Self::start(network, endpoint, Arc::new(RegistrationDispatch(target))).await
    }

    async fn start<D: Dispatch>(network: &Network, endpoint: &str, handler: Arc<D>) -> Result<Self> {
        let mut inbox = network.bind(endpoint).await?;
        let served = network.clone();
        let accept = tokio::spawn(async move {
            while let Some(frame) = inbox.recv().await {
                let handler = handler.clone();
                let network = served.clone();
                let _ = tokio::spawn(serve(handler, network, frame));
            }
        });
        log_debug!("Bound {endpoint}", endpoint: endpoint);
        Ok(Self {
            endpoint: endpoint.to_string(),
            network: network.clone(),
            accept,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Unbinds the endpoint; calls already being served run to completion.
    pub async fn stop(&self) {
        let _ = self.network.unbind(&self.endpoint).await;
        self.accept.abort();
        let endpoint = self.endpoint.as_str();
        log_debug!("Unbound {endpoint}", endpoint: endpoint);
    }
}

async fn serve<D: Dispatch>(handler: Arc<D>, network: Network, frame: Frame) {
    let envelope: Envelope = match decode(&frame.payload) {
        Ok(envelope) => envelope,
        Err(err) => {
            // Dropping the reply channel fails the caller.
            let reason = err.to_string();
            log_warn!("Discarding undecodable call: {reason}", reason: reason);
            return;
        }
    };
    let result = handler.dispatch(&network, envelope.request).await;
    match encode(&Response {
        id: envelope.id,
        result,
    }) {
        Ok(bytes) => {
            let _ = frame.reply.send(bytes);
        }
        Err(err) => {
            let reason = err.to_string();
            log_warn!("Cannot encode response: {reason}", reason: reason);
        }
    }
}
