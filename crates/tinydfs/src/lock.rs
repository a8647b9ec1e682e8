// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Per-node reader/writer lock state machine.
//!
//! [`LockState`] holds the counters and the FIFO wait queue of one node. It
//! never blocks: callers that cannot be granted immediately get a oneshot
//! receiver that the releasing task completes once the request reaches the
//! head of the queue and is compatible with the current holders. The state
//! (Open / Shared / Exclusive) is derived from the counters.
//!
//! Fairness: a Shared request is not granted while any Exclusive request is
//! queued, and an Exclusive request is not granted while anything is queued
//! ahead of it. Dispatch pops the queue in arrival order.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LockMode {
    Shared,
    Exclusive,
}

impl LockMode {
    #[must_use]
    pub fn from_exclusive(exclusive: bool) -> Self {
        if exclusive {
            LockMode::Exclusive
        } else {
            LockMode::Shared
        }
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockMode::Shared => write!(f, "shared"),
            LockMode::Exclusive => write!(f, "exclusive"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    Open,
    Shared,
    Exclusive,
}

struct Waiter {
    mode: LockMode,
    grant: oneshot::Sender<()>,
}

/// Outcome of an acquisition attempt
pub(crate) enum Acquire {
    Granted,
    Wait(oneshot::Receiver<()>),
    Closed,
}

#[derive(Default)]
pub struct LockState {
    shared_count: usize,
    exclusive_count: usize,
    waiters: VecDeque<Waiter>,
    closed: bool,
}

impl LockState {
    #[must_use]
    pub fn status(&self) -> LockStatus {
        if self.exclusive_count > 0 {
            LockStatus::Exclusive
        } else if self.shared_count > 0 {
            LockStatus::Shared
        } else {
            LockStatus::Open
        }
    }

    #[must_use]
    pub fn shared_count(&self) -> usize {
        self.shared_count
    }

    #[must_use]
    pub fn exclusive_count(&self) -> usize {
        self.exclusive_count
    }

    /// Number of requests waiting for this node
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.waiters.len()
    }

    fn compatible(&self, mode: LockMode) -> bool {
        match mode {
            LockMode::Shared => self.exclusive_count == 0,
            LockMode::Exclusive => self.exclusive_count == 0 && self.shared_count == 0,
        }
    }

    fn exclusive_queued(&self) -> bool {
        self.waiters.iter().any(|w| w.mode == LockMode::Exclusive)
    }

    fn grant(&mut self, mode: LockMode) {
        match mode {
            LockMode::Shared => self.shared_count += 1,
            LockMode::Exclusive => self.exclusive_count = 1,
        }
    }

    fn revoke(&mut self, mode: LockMode) {
        match mode {
            LockMode::Shared => self.shared_count -= 1,
            LockMode::Exclusive => self.exclusive_count = 0,
        }
    }

    pub(crate) fn acquire(&mut self, mode: LockMode) -> Acquire {
        if self.closed {
            return Acquire::Closed;
        }
        let queued_ahead = match mode {
            LockMode::Shared => self.exclusive_queued(),
            LockMode::Exclusive => !self.waiters.is_empty(),
        };
        if !queued_ahead && self.compatible(mode) {
            self.grant(mode);
            return Acquire::Granted;
        }
        let (grant, granted) = oneshot::channel();
        self.waiters.push_back(Waiter { mode, grant });
        Acquire::Wait(granted)
    }

    /// Releases one hold of `mode`. Returns false if no such hold exists.
    pub(crate) fn release(&mut self, mode: LockMode) -> bool {
        match mode {
            LockMode::Shared if self.shared_count > 0 => self.shared_count -= 1,
            LockMode::Exclusive if self.exclusive_count == 1 => self.exclusive_count = 0,
            _ => return false,
        }
        let _ = self.dispatch();
        true
    }

    /// Grants queued requests in arrival order while they are compatible.
    fn dispatch(&mut self) -> usize {
        let mut granted = 0;
        while let Some(front) = self.waiters.front() {
            if !self.compatible(front.mode) {
                break;
            }
            let Some(waiter) = self.waiters.pop_front() else {
                break;
            };
            self.grant(waiter.mode);
            if waiter.grant.send(()).is_err() {
                // The waiting task went away.
                self.revoke(waiter.mode);
                continue;
            }
            granted += 1;
        }
        granted
    }

    /// Refuses further waits and fails everything queued.
    pub(crate) fn close(&mut self) -> usize {
        self.closed = true;
        let dropped = self.waiters.len();
        self.waiters.clear();
        dropped
    }
}

impl fmt::Debug for LockState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockState")
            .field("status", &self.status())
            .field("shared_count", &self.shared_count)
            .field("exclusive_count", &self.exclusive_count)
            .field("queued", &self.waiters.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn waiting(a: Acquire) -> oneshot::Receiver<()> {
        match a {
            Acquire::Wait(rx) => rx,
            Acquire::Granted => panic!("expected to wait, was granted"),
            Acquire::Closed => panic!("expected to wait, was closed"),
        }
    }

    fn assert_counts(state: &LockState) {
        match state.status() {
            LockStatus::Exclusive => {
                assert_eq!(state.exclusive_count(), 1);
                assert_eq!(state.shared_count(), 0);
            }
            LockStatus::Shared => {
                assert_eq!(state.exclusive_count(), 0);
                assert!(state.shared_count() > 0);
            }
            LockStatus::Open => {
                assert_eq!(state.exclusive_count(), 0);
                assert_eq!(state.shared_count(), 0);
            }
        }
    }

    #[test]
    fn test_shared_holders_coexist() {
        let mut state = LockState::default();
        assert!(matches!(state.acquire(LockMode::Shared), Acquire::Granted));
        assert!(matches!(state.acquire(LockMode::Shared), Acquire::Granted));
        assert_eq!(state.status(), LockStatus::Shared);
        assert_eq!(state.shared_count(), 2);

        assert!(state.release(LockMode::Shared));
        assert_eq!(state.status(), LockStatus::Shared);
        assert!(state.release(LockMode::Shared));
        assert_eq!(state.status(), LockStatus::Open);
        assert_counts(&state);
    }

    #[test]
    fn test_exclusive_waits_for_readers() {
        let mut state = LockState::default();
        assert!(matches!(state.acquire(LockMode::Shared), Acquire::Granted));
        let mut writer = waiting(state.acquire(LockMode::Exclusive));
        assert!(writer.try_recv().is_err());

        assert!(state.release(LockMode::Shared));
        assert!(writer.try_recv().is_ok());
        assert_eq!(state.status(), LockStatus::Exclusive);
        assert_counts(&state);
    }

    #[test]
    fn test_reader_does_not_overtake_queued_writer() {
        let mut state = LockState::default();
        assert!(matches!(state.acquire(LockMode::Shared), Acquire::Granted));
        let mut writer = waiting(state.acquire(LockMode::Exclusive));
        // Compatible with the current holder, but a writer is queued.
        let mut reader = waiting(state.acquire(LockMode::Shared));

        assert!(state.release(LockMode::Shared));
        assert!(writer.try_recv().is_ok());
        assert!(reader.try_recv().is_err());

        assert!(state.release(LockMode::Exclusive));
        assert!(reader.try_recv().is_ok());
        assert_eq!(state.status(), LockStatus::Shared);
    }

    #[test]
    fn test_dispatch_grants_run_of_readers() {
        let mut state = LockState::default();
        assert!(matches!(state.acquire(LockMode::Exclusive), Acquire::Granted));
        let mut r1 = waiting(state.acquire(LockMode::Shared));
        let mut r2 = waiting(state.acquire(LockMode::Shared));
        let mut w = waiting(state.acquire(LockMode::Exclusive));
        let mut r3 = waiting(state.acquire(LockMode::Shared));

        assert!(state.release(LockMode::Exclusive));
        assert!(r1.try_recv().is_ok());
        assert!(r2.try_recv().is_ok());
        assert!(w.try_recv().is_err());
        assert!(r3.try_recv().is_err());
        assert_eq!(state.shared_count(), 2);
        assert_eq!(state.queue_len(), 2);
    }

    #[test]
    fn test_abandoned_waiter_is_skipped() {
        let mut state = LockState::default();
        assert!(matches!(state.acquire(LockMode::Exclusive), Acquire::Granted));
        let abandoned = waiting(state.acquire(LockMode::Exclusive));
        let mut next = waiting(state.acquire(LockMode::Exclusive));
        drop(abandoned);

        assert!(state.release(LockMode::Exclusive));
        assert!(next.try_recv().is_ok());
        assert_eq!(state.status(), LockStatus::Exclusive);
        assert_eq!(state.queue_len(), 0);
    }

    #[test]
    fn test_release_without_hold() {
        let mut state = LockState::default();
        assert!(!state.release(LockMode::Shared));
        assert!(!state.release(LockMode::Exclusive));
        assert!(matches!(state.acquire(LockMode::Shared), Acquire::Granted));
        assert!(!state.release(LockMode::Exclusive));
    }

    #[test]
    fn test_close_fails_waiters() {
        let mut state = LockState::default();
        assert!(matches!(state.acquire(LockMode::Exclusive), Acquire::Granted));
        let mut w = waiting(state.acquire(LockMode::Shared));
        assert_eq!(state.close(), 1);
        assert!(matches!(
            w.try_recv(),
            Err(oneshot::error::TryRecvError::Closed)
        ));
        assert!(matches!(state.acquire(LockMode::Shared), Acquire::Closed));
        // Holders can still release.
        assert!(state.release(LockMode::Exclusive));
    }
}
