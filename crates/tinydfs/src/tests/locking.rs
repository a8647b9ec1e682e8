// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

use super::{memory, p, spawn};
use crate::config::NamingConfig;
use crate::error::Error;
use crate::lock::{LockMode, LockStatus};
use crate::naming::NamingServer;
use crate::node::NodeKind;
use crate::service::Service;
use crate::tree::DirectoryTree;
use std::sync::Arc;
use tokio_test::{assert_pending, assert_ready, assert_ready_ok};

async fn tree_with(paths: &[&str]) -> DirectoryTree {
    let tree = DirectoryTree::new();
    let (_, c1) = memory("c1");
    for path in paths {
        let _ = tree.register(&p(path), &c1).await.unwrap();
    }
    tree
}

async fn status(tree: &DirectoryTree, path: &str) -> LockStatus {
    tree.get(&p(path)).await.unwrap().lock_status().await
}

#[tokio::test]
async fn test_shared_locks_coexist() {
    let tree = tree_with(&["/x"]).await;
    let _ = tree.lock(&p("/x"), LockMode::Shared).await.unwrap();
    let _ = tree.lock(&p("/x"), LockMode::Shared).await.unwrap();

    let node = tree.get(&p("/x")).await.unwrap();
    assert_eq!(node.lock_counts().await, (2, 0));
    // Shared locks do not ripple.
    assert_eq!(status(&tree, "/").await, LockStatus::Open);

    tree.unlock(&p("/x"), LockMode::Shared).await.unwrap();
    assert_eq!(node.lock_status().await, LockStatus::Shared);
    tree.unlock(&p("/x"), LockMode::Shared).await.unwrap();
    assert_eq!(node.lock_status().await, LockStatus::Open);
}

#[tokio::test]
async fn test_two_exclusive_lockers_on_same_path() {
    let tree = tree_with(&["/x"]).await;
    let x = p("/x");

    let _ = tree.lock(&x, LockMode::Exclusive).await.unwrap();
    assert_eq!(status(&tree, "/x").await, LockStatus::Exclusive);

    let mut second = spawn(tree.lock(&x, LockMode::Exclusive));
    assert_pending!(second.poll());

    tree.unlock(&x, LockMode::Exclusive).await.unwrap();
    assert!(second.is_woken());
    let _ = assert_ready_ok!(second.poll());
    assert_eq!(status(&tree, "/x").await, LockStatus::Exclusive);

    tree.unlock(&x, LockMode::Exclusive).await.unwrap();
    assert_eq!(status(&tree, "/x").await, LockStatus::Open);
    assert_eq!(status(&tree, "/").await, LockStatus::Open);
}

#[tokio::test]
async fn test_exclusive_directory_blocks_exclusive_child() {
    let tree = tree_with(&["/dir/child"]).await;

    let _ = tree.lock(&p("/dir"), LockMode::Exclusive).await.unwrap();
    assert_eq!(status(&tree, "/").await, LockStatus::Shared);
    assert_eq!(status(&tree, "/dir/child").await, LockStatus::Exclusive);

    let child = p("/dir/child");
    let mut b = spawn(tree.lock(&child, LockMode::Exclusive));
    assert_pending!(b.poll());

    tree.unlock(&p("/dir"), LockMode::Exclusive).await.unwrap();
    assert!(b.is_woken());
    let _ = assert_ready_ok!(b.poll());

    assert_eq!(status(&tree, "/").await, LockStatus::Shared);
    assert_eq!(status(&tree, "/dir").await, LockStatus::Shared);
    assert_eq!(status(&tree, "/dir/child").await, LockStatus::Exclusive);
}

#[tokio::test]
async fn test_exclusive_ripple_set_is_held_and_released_exactly() {
    let tree = tree_with(&["/a/b/c", "/a/b/d/e", "/a/f", "/g"]).await;

    let _ = tree.lock(&p("/a/b"), LockMode::Exclusive).await.unwrap();
    assert_eq!(tree.exclusive_holds().await, vec![p("/a/b")]);

    for ancestor in ["/", "/a"] {
        let node = tree.get(&p(ancestor)).await.unwrap();
        assert_eq!(node.lock_counts().await, (1, 0), "{}", ancestor);
    }
    for held in ["/a/b", "/a/b/c", "/a/b/d", "/a/b/d/e"] {
        let node = tree.get(&p(held)).await.unwrap();
        assert_eq!(node.lock_counts().await, (0, 1), "{}", held);
    }
    for untouched in ["/a/f", "/g"] {
        assert_eq!(status(&tree, untouched).await, LockStatus::Open);
    }

    tree.unlock(&p("/a/b"), LockMode::Exclusive).await.unwrap();
    for path in ["/", "/a", "/a/b", "/a/b/c", "/a/b/d", "/a/b/d/e", "/a/f", "/g"] {
        assert_eq!(status(&tree, path).await, LockStatus::Open, "{}", path);
    }
    assert!(tree.exclusive_holds().await.is_empty());
}

#[tokio::test]
async fn test_disjoint_subtrees_do_not_block() {
    let tree = tree_with(&["/left/x", "/right/y"]).await;

    let _ = tree.lock(&p("/left"), LockMode::Exclusive).await.unwrap();
    let right = p("/right");
    let mut other = spawn(tree.lock(&right, LockMode::Exclusive));
    let _ = assert_ready_ok!(other.poll());
    drop(other);

    let y = p("/right/y");
    let mut reader = spawn(tree.lock(&y, LockMode::Shared));
    assert_pending!(reader.poll());

    tree.unlock(&right, LockMode::Exclusive).await.unwrap();
    let _ = assert_ready_ok!(reader.poll());
    assert_eq!(status(&tree, "/left/x").await, LockStatus::Exclusive);
}

#[tokio::test]
async fn test_queued_writer_is_not_starved() {
    let tree = tree_with(&["/f"]).await;
    let f = p("/f");

    let _ = tree.lock(&f, LockMode::Shared).await.unwrap();
    let mut writer = spawn(tree.lock(&f, LockMode::Exclusive));
    assert_pending!(writer.poll());

    // A reader arriving after the writer waits behind it.
    let mut late_reader = spawn(tree.lock(&f, LockMode::Shared));
    assert_pending!(late_reader.poll());

    tree.unlock(&f, LockMode::Shared).await.unwrap();
    let _ = assert_ready_ok!(writer.poll());
    assert_pending!(late_reader.poll());

    tree.unlock(&f, LockMode::Exclusive).await.unwrap();
    let _ = assert_ready_ok!(late_reader.poll());
    assert_eq!(status(&tree, "/f").await, LockStatus::Shared);
}

#[tokio::test]
async fn test_lock_errors() {
    let tree = tree_with(&["/f"]).await;

    assert_eq!(
        tree.lock(&p("/nope"), LockMode::Shared).await.unwrap_err(),
        Error::not_found(&p("/nope"))
    );
    assert_eq!(
        tree.unlock(&p("/nope"), LockMode::Exclusive).await.unwrap_err(),
        Error::not_found(&p("/nope"))
    );
    assert_eq!(
        tree.unlock(&p("/f"), LockMode::Shared).await.unwrap_err(),
        Error::not_locked(&p("/f"), LockMode::Shared)
    );
    assert_eq!(
        tree.unlock(&p("/f"), LockMode::Exclusive).await.unwrap_err(),
        Error::not_locked(&p("/f"), LockMode::Exclusive)
    );

    // A shared hold is not released by an exclusive unlock.
    let _ = tree.lock(&p("/f"), LockMode::Shared).await.unwrap();
    assert!(tree.unlock(&p("/f"), LockMode::Exclusive).await.is_err());
    assert_eq!(status(&tree, "/f").await, LockStatus::Shared);
}

#[tokio::test]
async fn test_interrupted_exclusive_releases_partial_ripple() {
    let tree = tree_with(&["/a/b"]).await;
    let b = p("/a/b");
    let a = p("/a");

    let _ = tree.lock(&b, LockMode::Shared).await.unwrap();
    // Takes / shared and /a exclusive, then waits on /a/b.
    let mut writer = spawn(tree.lock(&a, LockMode::Exclusive));
    assert_pending!(writer.poll());
    assert_eq!(status(&tree, "/").await, LockStatus::Shared);
    assert_eq!(status(&tree, "/a").await, LockStatus::Exclusive);

    assert_eq!(tree.interrupt_waiters().await, 1);
    let result = assert_ready!(writer.poll());
    assert_eq!(result.unwrap_err(), Error::lock_interrupted(&b));

    assert_eq!(status(&tree, "/").await, LockStatus::Open);
    assert_eq!(status(&tree, "/a").await, LockStatus::Open);
    assert_eq!(status(&tree, "/a/b").await, LockStatus::Shared);
    assert!(tree.exclusive_holds().await.is_empty());

    // Holders may still release after an interrupt.
    tree.unlock(&b, LockMode::Shared).await.unwrap();
}

#[tokio::test]
async fn test_stop_interrupts_blocked_clients() {
    let server = NamingServer::new(NamingConfig::default()).unwrap();
    let (_, c1) = memory("c1");
    let _ = server.tree().register(&p("/x"), &c1).await.unwrap();
    let x = p("/x");

    server.lock(&x, true).await.unwrap();
    let mut waiter = spawn(server.lock(&x, false));
    assert_pending!(waiter.poll());

    server.stop().await;
    let result = assert_ready!(waiter.poll());
    assert_eq!(result.unwrap_err(), Error::lock_interrupted(&x));
    assert_eq!(
        server.lock(&x, false).await.unwrap_err(),
        Error::lock_interrupted(&x)
    );

    server.unlock(&x, true).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_lockers_never_mix_modes() {
    let tree = Arc::new(tree_with(&["/d/a", "/d/b", "/d/e/f", "/g"]).await);
    let paths = ["/", "/d", "/d/a", "/d/b", "/d/e", "/d/e/f", "/g"];

    let mut tasks = Vec::new();
    for worker in 0..16usize {
        let tree = tree.clone();
        tasks.push(tokio::spawn(async move {
            for round in 0..25usize {
                let path = p(paths[(worker * 7 + round * 3) % paths.len()]);
                let mode = LockMode::from_exclusive((worker + round) % 3 == 0);
                let node = tree.lock(&path, mode).await.unwrap();
                let (shared, exclusive) = node.lock_counts().await;
                assert!(exclusive <= 1);
                assert!(shared == 0 || exclusive == 0);
                match mode {
                    LockMode::Shared => assert!(shared > 0),
                    LockMode::Exclusive => assert_eq!((shared, exclusive), (0, 1)),
                }
                tokio::task::yield_now().await;
                tree.unlock(&path, mode).await.unwrap();
            }
        }));
    }
    for result in futures::future::join_all(tasks).await {
        result.unwrap();
    }

    for path in paths {
        let node = tree.get(&p(path)).await.unwrap();
        assert_eq!(node.lock_counts().await, (0, 0), "{}", path);
    }
}

#[tokio::test]
async fn test_relocking_a_recreated_path_keeps_both_holds() {
    let tree = tree_with(&["/a/f"]).await;
    let a = p("/a");

    let old = tree.lock(&a, LockMode::Exclusive).await.unwrap();
    assert!(tree.remove(&a).await);
    let new = tree.add(&a, NodeKind::Directory, None).await.unwrap();
    let _ = tree.lock(&a, LockMode::Exclusive).await.unwrap();
    assert_eq!(tree.exclusive_holds().await, vec![a.clone(), a.clone()]);
    assert_eq!(tree.root().lock_counts().await, (2, 0));

    // The detached node's record goes first; the new node stays held.
    tree.unlock(&a, LockMode::Exclusive).await.unwrap();
    assert_eq!(old.lock_status().await, LockStatus::Open);
    assert_eq!(new.lock_status().await, LockStatus::Exclusive);
    assert_eq!(tree.root().lock_counts().await, (1, 0));

    tree.unlock(&a, LockMode::Exclusive).await.unwrap();
    assert_eq!(new.lock_status().await, LockStatus::Open);
    assert_eq!(tree.root().lock_counts().await, (0, 0));
    assert!(tree.exclusive_holds().await.is_empty());
    assert_eq!(
        tree.unlock(&a, LockMode::Exclusive).await.unwrap_err(),
        Error::not_locked(&a, LockMode::Exclusive)
    );

    let root = p("/");
    let mut whole = spawn(tree.lock(&root, LockMode::Exclusive));
    let _ = assert_ready_ok!(whole.poll());
}
