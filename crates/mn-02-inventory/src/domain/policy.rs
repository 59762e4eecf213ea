//! # Inventory Request Policy
//!
//! Decides when to ask peers for their inventory and what to do after each
//! answer. Pure state: the service feeds it pending-request facts and acts
//! on the returned [`PolicyAction`].
//!
//! ## Phases
//!
//! ```text
//! Initial ──(min_completed complete responses)──→ Periodic
//!    ↑                                               │
//!    └──────────────(all connections lost)───────────┘
//! ```
//!
//! In the initial phase every new connection may receive a request while
//! fewer than `max_pending` are in flight. A partial answer is retried on the
//! same connection, anything else moves on to a fresh one.

use std::collections::HashSet;
use std::time::Duration;

use shared_types::Address;
use tracing::{info, warn};

/// What the requester does after a request finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyAction {
    DoNothing,
    RetrySameConnection,
    RetryNewConnection,
    StartPeriodic,
}

/// Result of one request as the policy sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Delivered { entries: usize, max_size_reached: bool },
    Failed,
}

impl RequestOutcome {
    /// The peer had nothing more to send.
    pub fn is_complete(&self) -> bool {
        matches!(self, RequestOutcome::Delivered { max_size_reached: false, .. })
    }
}

#[derive(Debug, Clone)]
pub struct InventoryRequestPolicy {
    min_completed_requests: usize,
    max_pending_requests: usize,
    repeat_interval: Duration,
    retry_delay: Duration,
    idle_delay: Duration,
    num_completed: usize,
    initial_completed: bool,
    ignored: HashSet<Address>,
}

impl InventoryRequestPolicy {
    pub fn new(
        min_completed_requests: usize,
        max_pending_requests: usize,
        repeat_interval: Duration,
        retry_delay: Duration,
        idle_delay: Duration,
    ) -> Self {
        Self {
            min_completed_requests: min_completed_requests.max(1),
            max_pending_requests,
            repeat_interval,
            retry_delay,
            idle_delay,
            num_completed: 0,
            initial_completed: false,
            ignored: HashSet::new(),
        }
    }

    pub fn initial_requests_completed(&self) -> bool {
        self.initial_completed
    }

    pub fn num_completed(&self) -> usize {
        self.num_completed
    }

    /// A connection may be asked: its peer is not ignored and it has no
    /// request in flight.
    pub fn can_use(&self, peer: &Address, has_pending: bool) -> bool {
        !has_pending && !self.ignored.contains(peer)
    }

    pub fn should_request_on_new_connection(
        &self,
        peer: &Address,
        has_pending: bool,
        num_pending: usize,
    ) -> bool {
        !self.initial_completed && self.can_use(peer, has_pending) && num_pending < self.max_pending_requests
    }

    pub fn on_request_completed(
        &mut self,
        peer: &Address,
        outcome: RequestOutcome,
        has_pending: bool,
        num_pending: usize,
    ) -> PolicyAction {
        if self.initial_completed {
            return PolicyAction::DoNothing;
        }
        let below_max_pending = num_pending < self.max_pending_requests;

        let (entries, max_size_reached) = match outcome {
            RequestOutcome::Failed => {
                return if below_max_pending {
                    PolicyAction::RetryNewConnection
                } else {
                    PolicyAction::DoNothing
                };
            }
            RequestOutcome::Delivered {
                entries,
                max_size_reached,
            } => (entries, max_size_reached),
        };

        if !max_size_reached {
            self.num_completed += 1;
            if self.num_completed >= self.min_completed_requests {
                self.initial_completed = true;
                // Periodic requests may ask anyone again.
                self.ignored.clear();
                info!(
                    completed = self.num_completed,
                    "Initial inventory requests completed"
                );
                return PolicyAction::StartPeriodic;
            }
        }

        if !below_max_pending {
            return PolicyAction::DoNothing;
        }

        // Peers that sent everything or nothing have no more to offer.
        if entries == 0 || !max_size_reached {
            self.ignored.insert(peer.clone());
        }

        if max_size_reached && entries > 0 && self.can_use(peer, has_pending) {
            PolicyAction::RetrySameConnection
        } else {
            PolicyAction::RetryNewConnection
        }
    }

    /// Delay before the next periodic batch, given its outcomes and how many
    /// connections were asked.
    pub fn periodic_delay(&self, outcomes: &[RequestOutcome]) -> Duration {
        if outcomes.iter().any(|o| *o == RequestOutcome::Failed) {
            info!("Periodic inventory request failed, retrying soon");
            return self.retry_delay;
        }
        if outcomes.iter().any(RequestOutcome::is_complete) {
            self.repeat_interval
        } else if !outcomes.is_empty() {
            info!(requests = outcomes.len(), "Data still missing after periodic requests");
            self.retry_delay
        } else {
            self.idle_delay
        }
    }

    pub fn on_all_connections_lost(&mut self) {
        warn!("All connections lost, inventory sync restarts on reconnect");
        self.num_completed = 0;
        self.initial_completed = false;
        self.ignored.clear();
    }
}
