//! Holder of the single observable [`UpdateState`].

use std::sync::Arc;

use log::debug;
use tokio::sync::watch;

use crate::domain::model::UpdateState;

/// Owns the update state. Clones share the same value.
///
/// Observers subscribe to a `watch` receiver and never write.
#[derive(Clone)]
pub struct StateMachine {
    tx: Arc<watch::Sender<UpdateState>>,
}

impl StateMachine {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(UpdateState::Idle);
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<UpdateState> {
        self.tx.subscribe()
    }

    /// Snapshot of the live value.
    pub fn current(&self) -> UpdateState {
        self.tx.borrow().clone()
    }

    pub fn is_downloading(&self) -> bool {
        self.tx.borrow().is_downloading()
    }

    /// Unconditionally replace the state. Returns the published value.
    pub fn publish(&self, state: UpdateState) -> UpdateState {
        debug!("Update state -> {}", state);
        self.tx.send_replace(state.clone());
        state
    }

    /// Record download progress.
    ///
    /// Only applies while downloading, never moves backwards and never
    /// exceeds 100. Returns whether the observable value changed.
    pub fn advance_progress(&self, percent: u8) -> bool {
        let percent = percent.min(100);
        self.tx.send_if_modified(|current| match current {
            UpdateState::Downloading { progress, .. } if percent > *progress => {
                *progress = percent;
                true
            }
            _ => false,
        })
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
