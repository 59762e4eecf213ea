//! Latest network load, observable through a watch channel.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::domain::NetworkLoad;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkLoadState {
    pub current: NetworkLoad,
    pub previous: Option<NetworkLoad>,
    /// Unix millis of the last update, 0 before the first one.
    pub updated_at: u64,
}

pub struct NetworkLoadSnapshot {
    state: watch::Sender<NetworkLoadState>,
}

impl Default for NetworkLoadSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkLoadSnapshot {
    pub fn new() -> Self {
        let (state, _) = watch::channel(NetworkLoadState::default());
        Self { state }
    }

    pub fn update(&self, load: NetworkLoad, now: u64) {
        self.state.send_modify(|state| {
            state.previous = Some(state.current);
            state.current = load;
            state.updated_at = now;
        });
    }

    pub fn current(&self) -> NetworkLoad {
        self.state.borrow().current
    }

    pub fn state(&self) -> NetworkLoadState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<NetworkLoadState> {
        self.state.subscribe()
    }
}
