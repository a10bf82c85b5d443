//! Single-flight session refresh.
//!
//! Any number of requests may discover an expired session at once; only the
//! first one runs the refresh attempt. The others park until that attempt settles
//! and all of them observe the same outcome.

use std::{
    future::Future,
    sync::{Mutex, MutexGuard, PoisonError},
};

use tokio::sync::oneshot;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed,
    Failed(String),
}

enum RefreshState {
    Idle,
    Refreshing {
        waiters: Vec<oneshot::Sender<RefreshOutcome>>,
    },
}

pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
}

impl Default for RefreshCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RefreshState::Idle),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RefreshState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(*self.lock(), RefreshState::Refreshing { .. })
    }

    /// Requests parked behind the refresh in flight.
    pub fn waiting(&self) -> usize {
        match &*self.lock() {
            RefreshState::Idle => 0,
            RefreshState::Refreshing { waiters } => waiters.len(),
        }
    }

    /// Runs `attempt` unless a refresh is already in flight, in which case the
    /// caller waits for that one instead.
    pub async fn refresh<F, Fut>(&self, attempt: F) -> RefreshOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = RefreshOutcome>,
    {
        let parked = {
            let mut state = self.lock();
            match &mut *state {
                RefreshState::Idle => {
                    *state = RefreshState::Refreshing {
                        waiters: Vec::new(),
                    };
                    None
                }
                RefreshState::Refreshing { waiters } => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Some(rx)
                }
            }
        };

        if let Some(rx) = parked {
            return rx
                .await
                .unwrap_or_else(|_| RefreshOutcome::Failed("refresh abandoned".into()));
        }

        let guard = LeaderGuard {
            coordinator: self,
            settled: false,
        };
        let outcome = attempt().await;
        guard.settle(outcome.clone());
        outcome
    }

    fn release(&self, outcome: RefreshOutcome) {
        let waiters = match std::mem::replace(&mut *self.lock(), RefreshState::Idle) {
            RefreshState::Refreshing { waiters } => waiters,
            RefreshState::Idle => Vec::new(),
        };
        debug!(waiters = waiters.len(), ?outcome, "refresh settled");
        for tx in waiters {
            let _ = tx.send(outcome.clone());
        }
    }
}

/// Returns the coordinator to idle even if the leader's future is dropped.
struct LeaderGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl LeaderGuard<'_> {
    fn settle(mut self, outcome: RefreshOutcome) {
        self.settled = true;
        self.coordinator.release(outcome);
    }
}

impl Drop for LeaderGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.coordinator
                .release(RefreshOutcome::Failed("refresh cancelled".into()));
        }
    }
}
