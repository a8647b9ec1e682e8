// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Naming and storage servers talking through the in-process transport.

use super::{memory_with, p};
use crate::config::NamingConfig;
use crate::error::Error;
use crate::naming::NamingServer;
use crate::remote::{CommandStub, Network, RegistrationStub, Skeleton, StorageStub};
use crate::server::StorageServer;
use crate::service::{Registration, Service};
use crate::storage::{Command, Storage};
use std::sync::Arc;

const REGISTRATION: &str = "naming.registration";

async fn naming(network: &Network, threshold: u32) -> Arc<NamingServer> {
    let server = NamingServer::new(NamingConfig {
        replication_threshold: threshold,
        ..NamingConfig::default()
    })
    .unwrap();
    server.start(network).await.unwrap();
    server
}

#[tokio::test]
async fn test_cluster_registration_and_reads() {
    let network = Network::new();
    let naming = naming(&network, 20).await;

    let (s1, _) = memory_with("alpha", &["/etc/hosts", "/shared"]).await;
    let (s2, _) = memory_with("beta", &["/shared", "/var/log/syslog"]).await;
    let alpha = StorageServer::start(s1.clone(), &network, REGISTRATION)
        .await
        .unwrap();
    let beta = StorageServer::start(s2.clone(), &network, REGISTRATION)
        .await
        .unwrap();

    assert!(alpha.duplicates().is_empty());
    assert_eq!(beta.duplicates(), &[p("/shared")]);
    // The duplicate is gone from beta, along with nothing else.
    assert!(!s2.contains_file(&p("/shared")).await);
    assert!(s2.contains_file(&p("/var/log/syslog")).await);
    assert_eq!(naming.registered_count().await, 2);

    assert_eq!(
        naming.list(&p("/")).await.unwrap(),
        vec!["etc", "shared", "var"]
    );

    // Storage handles handed to clients are stubs.
    let storage = naming.get_storage(&p("/var/log/syslog")).await.unwrap();
    assert_eq!(storage.endpoint(), "beta.storage");
    let size = storage.size(&p("/var/log/syslog")).await.unwrap();
    assert_eq!(
        storage.read(&p("/var/log/syslog"), 0, size).await.unwrap(),
        b"/var/log/syslog"
    );

    storage.write(&p("/var/log/syslog"), size, b"!").await.unwrap();
    assert_eq!(storage.size(&p("/var/log/syslog")).await.unwrap(), size + 1);

    // Errors raised by the storage server cross the wire intact.
    assert_eq!(
        storage.read(&p("/var/log/syslog"), 0, 1000).await.unwrap_err(),
        Error::OutOfBounds {
            path: p("/var/log/syslog"),
            offset: 0,
            length: 1000,
            size: size + 1,
        }
    );

    alpha.stop().await;
    beta.stop().await;
    naming.stop().await;
    assert!(!network.is_bound("alpha.storage").await);
    assert!(!network.is_bound(REGISTRATION).await);
}

#[tokio::test]
async fn test_create_and_delete_through_commands() {
    let network = Network::new();
    let naming = naming(&network, 20).await;
    let (s1, _) = memory_with("alpha", &["/docs/readme"]).await;
    let alpha = StorageServer::start(s1.clone(), &network, REGISTRATION)
        .await
        .unwrap();

    assert!(naming.create_file(&p("/docs/new")).await.unwrap());
    assert!(s1.contains_file(&p("/docs/new")).await);

    assert!(naming.delete(&p("/docs")).await.unwrap());
    assert!(!s1.contains_file(&p("/docs/readme")).await);
    assert!(s1.directories().await.is_empty());

    // A stopped storage server fails the call, not the naming server.
    alpha.stop().await;
    assert!(naming.create_directory(&p("/d")).await.unwrap());
    assert!(naming.create_file(&p("/d/f")).await.unwrap_err().is_communication());
    assert!(!naming.tree().contains(&p("/d/f")).await);
    naming.stop().await;
}

#[tokio::test]
async fn test_replication_copies_between_servers() {
    let network = Network::new();
    let naming = naming(&network, 2).await;
    let (s1, _) = memory_with("alpha", &["/hot"]).await;
    let (s2, _) = memory_with("beta", &[]).await;
    let _alpha = StorageServer::start(s1.clone(), &network, REGISTRATION)
        .await
        .unwrap();
    let _beta = StorageServer::start(s2.clone(), &network, REGISTRATION)
        .await
        .unwrap();

    for _ in 0..2 {
        naming.lock(&p("/hot"), false).await.unwrap();
        naming.unlock(&p("/hot"), false).await.unwrap();
    }
    assert!(s2.contains_file(&p("/hot")).await);
    let node = naming.tree().get(&p("/hot")).await.unwrap();
    let endpoints: Vec<String> = node
        .replicas()
        .await
        .iter()
        .map(|c| c.command_endpoint().to_string())
        .collect();
    assert_eq!(endpoints, vec!["alpha.command", "beta.command"]);

    naming.lock(&p("/hot"), true).await.unwrap();
    assert!(!s2.contains_file(&p("/hot")).await);
    assert_eq!(node.replicas().await.len(), 1);
    naming.unlock(&p("/hot"), true).await.unwrap();
}

#[tokio::test]
async fn test_registration_stub_rejects_second_registration() {
    let network = Network::new();
    let _naming = naming(&network, 20).await;
    let (s1, _) = memory_with("alpha", &[]).await;
    let alpha = StorageServer::start(s1.clone(), &network, REGISTRATION)
        .await
        .unwrap();

    let stub = RegistrationStub::new(&network, REGISTRATION);
    let err = stub
        .register(
            Arc::new(StorageStub::new(&network, "alpha.storage")),
            Arc::new(CommandStub::new(&network, "other.command")),
            vec![],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AlreadyRegistered(_)));

    // Binding the same endpoints again fails before registering.
    assert!(
        StorageServer::start(s1, &network, REGISTRATION)
            .await
            .err()
            .expect("start must fail")
            .is_communication()
    );
    assert!(network.is_bound(alpha.storage_endpoint()).await);
}

#[tokio::test]
async fn test_transport_failures_are_communication_errors() {
    let network = Network::new();
    let nowhere = StorageStub::new(&network, "nowhere.storage");
    assert!(nowhere.size(&p("/f")).await.unwrap_err().is_communication());

    let command = CommandStub::new(&network, "nowhere.command");
    assert!(command.create(&p("/f")).await.unwrap_err().is_communication());

    // No naming server yet
    let (s1, _) = memory_with("alpha", &[]).await;
    assert!(
        StorageServer::start(s1, &network, REGISTRATION)
            .await
            .err()
            .expect("start must fail")
            .is_communication()
    );
    assert!(!network.is_bound("alpha.storage").await);
    assert!(!network.is_bound("alpha.command").await);
}

#[tokio::test]
async fn test_skeleton_refuses_other_interfaces() {
    let network = Network::new();
    let (s1, _) = memory_with("alpha", &["/f"]).await;
    let skeleton = Skeleton::storage(&network, "alpha.storage", s1).await.unwrap();

    // A command call sent to a storage endpoint
    let misdirected = CommandStub::new(&network, "alpha.storage");
    assert!(misdirected.delete(&p("/f")).await.unwrap_err().is_communication());

    let storage = StorageStub::new(&network, "alpha.storage");
    assert_eq!(storage.size(&p("/f")).await.unwrap(), 2);

    skeleton.stop().await;
    assert!(storage.size(&p("/f")).await.unwrap_err().is_communication());
}
