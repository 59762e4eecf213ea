//! # Peer Exchange Service
//!
//! Runs exchange rounds: connect to each candidate, send our peers, merge
//! the peers it sends back. Rounds contact candidates concurrently and
//! each attempt fails on its own without affecting the others.
//!
//! ## Phases
//!
//! - `Bootstrapping` until the first exchange succeeds
//! - `Exchanging` while the initial round is still running
//! - `SteadyState` afterwards; failed rounds are retried with backoff and
//!   the maintenance task extends the group on demand

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use shared_types::{Address, ConnectionId, ConnectionInfo};
use tokio::sync::{oneshot, watch};
use tracing::{debug, info, warn};

use super::config::PeerExchangeConfig;
use super::metrics::PeerGroupMetrics;
use super::peer_group::PeerGroupService;
use super::strategy::PeerExchangeStrategy;
use super::waiters::ExchangeWaiters;
use crate::domain::policy::{min_success, retry_delay, should_extend_after_initial, too_many_failures};
use crate::domain::{ExchangeState, PeerExchangeRequest, PeerExchangeResponse, PeerGroupError};
use crate::ports::PeerTransport;

/// Result of one exchange round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundOutcome {
    pub num_candidates: usize,
    pub num_success: usize,
    pub num_failures: usize,
}

impl RoundOutcome {
    pub fn failed(&self) -> bool {
        self.num_success == 0 || too_many_failures(self.num_success, self.num_failures)
    }
}

pub struct PeerExchangeService {
    peer_group: Arc<PeerGroupService>,
    strategy: PeerExchangeStrategy,
    transport: Arc<dyn PeerTransport>,
    waiters: ExchangeWaiters,
    metrics: Arc<PeerGroupMetrics>,
    state: watch::Sender<ExchangeState>,
    extending: AtomicBool,
    retrying: AtomicBool,
    num_retries: AtomicU32,
    shutdown: watch::Receiver<bool>,
}

impl PeerExchangeService {
    pub fn new(
        peer_group: Arc<PeerGroupService>,
        config: PeerExchangeConfig,
        transport: Arc<dyn PeerTransport>,
        metrics: Arc<PeerGroupMetrics>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        let (state, _) = watch::channel(ExchangeState::Bootstrapping);
        Self {
            strategy: PeerExchangeStrategy::new(peer_group.clone(), config),
            peer_group,
            transport,
            waiters: ExchangeWaiters::new(),
            metrics,
            state,
            extending: AtomicBool::new(false),
            retrying: AtomicBool::new(false),
            num_retries: AtomicU32::new(0),
            shutdown,
        }
    }

    pub fn state(&self) -> ExchangeState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ExchangeState> {
        self.state.subscribe()
    }

    pub fn strategy(&self) -> &PeerExchangeStrategy {
        &self.strategy
    }

    pub fn num_pending_requests(&self) -> usize {
        self.waiters.len()
    }

    fn advance(&self, next: ExchangeState) {
        self.state.send_if_modified(|state| {
            if next > *state {
                info!(transport = %self.peer_group.transport_type(), from = %state, to = %next, "Peer exchange state changed");
                *state = next;
                true
            } else {
                false
            }
        });
    }

    // =========================================================================
    // INITIAL EXCHANGE
    // =========================================================================

    /// Exchange with seeds and known peers. Resolves `true` once half of
    /// the candidates (at least one) answered, `false` when that did not
    /// happen within the bootstrap timeout or no candidate was available.
    /// The round keeps running in the background after this returns.
    pub async fn start_initial_exchange(self: &Arc<Self>) -> bool {
        let addresses = self.strategy.addresses_for_initial_exchange();
        if addresses.is_empty() {
            warn!(transport = %self.peer_group.transport_type(), "No seed or peer to exchange with");
            self.advance(ExchangeState::SteadyState);
            return false;
        }
        info!(
            transport = %self.peer_group.transport_type(),
            candidates = addresses.len(),
            "Starting initial peer exchange"
        );

        let (reached_tx, reached_rx) = oneshot::channel();
        let service = self.clone();
        tokio::spawn(async move {
            let min_connected = service.peer_group.config().min_num_connected_peers;
            let outcome = service.run_round(addresses, Some(reached_tx)).await;
            service.advance(ExchangeState::SteadyState);
            if outcome.failed() {
                service.schedule_retry();
            } else if should_extend_after_initial(outcome.num_candidates, min_connected) {
                service.extend_peer_group();
            }
        });

        let timeout = self.strategy.config().bootstrap_timeout;
        match tokio::time::timeout(timeout, reached_rx).await {
            Ok(Ok(reached)) => reached,
            Ok(Err(_)) => false,
            Err(_) => {
                warn!(?timeout, "Initial peer exchange did not complete in time");
                false
            }
        }
    }

    async fn run_round(
        &self,
        addresses: Vec<Address>,
        mut min_success_reached: Option<oneshot::Sender<bool>>,
    ) -> RoundOutcome {
        let mut outcome = RoundOutcome {
            num_candidates: addresses.len(),
            ..RoundOutcome::default()
        };
        let required = min_success(addresses.len());
        let mut attempts: FuturesUnordered<_> = addresses
            .into_iter()
            .map(|address| async move {
                let result = self.exchange_with(&address).await;
                (address, result)
            })
            .collect();
        let mut shutdown = self.shutdown.clone();

        loop {
            let next = tokio::select! {
                next = attempts.next() => next,
                _ = shutdown.changed() => break,
            };
            let Some((address, result)) = next else { break };
            self.metrics.record_exchange(result.is_ok());
            match result {
                Ok(count) => {
                    outcome.num_success += 1;
                    debug!(peer = %address, merged = count, "Peer exchange succeeded");
                    self.advance(ExchangeState::Exchanging);
                }
                Err(e) => {
                    outcome.num_failures += 1;
                    debug!(peer = %address, error = %e, "Peer exchange failed");
                }
            }
            if outcome.num_success >= required {
                if let Some(sender) = min_success_reached.take() {
                    let _ = sender.send(true);
                }
            }
        }

        if let Some(sender) = min_success_reached.take() {
            let _ = sender.send(false);
        }
        outcome
    }

    /// One exchange with `address`. Returns the number of merged peers.
    pub async fn exchange_with(&self, address: &Address) -> Result<usize, PeerGroupError> {
        if self.peer_group.is_banned(address) {
            return Err(PeerGroupError::Banned(address.clone()));
        }
        let connection = self.transport.connect(address).await?;
        self.peer_group.on_connection(&connection);

        let (nonce, receiver, _guard) = self.waiters.register(connection.id.clone());
        let peers = self.strategy.peers_for_reporting(Some(address), &[]);
        self.transport
            .send_exchange_request(&connection.id, PeerExchangeRequest::new(nonce, peers))
            .await?;

        let timeout = self.strategy.config().request_timeout;
        let response = match tokio::time::timeout(timeout, receiver).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(PeerGroupError::Cancelled(connection.id)),
            Err(_) => {
                return Err(PeerGroupError::Timeout {
                    address: address.clone(),
                    timeout,
                })
            }
        };
        if !response.is_valid() {
            return Err(PeerGroupError::InvalidResponse(address.clone()));
        }
        Ok(self.strategy.add_reported_peers(response.peers, address))
    }

    // =========================================================================
    // RETRY AND EXTENSION
    // =========================================================================

    fn schedule_retry(self: &Arc<Self>) {
        if self.retrying.swap(true, Ordering::SeqCst) {
            return;
        }
        let service = self.clone();
        tokio::spawn(async move {
            service.retry_loop().await;
            service.retrying.store(false, Ordering::SeqCst);
        });
    }

    async fn retry_loop(&self) {
        let max_attempts = self.strategy.config().max_retry_attempts;
        let mut shutdown = self.shutdown.clone();
        loop {
            let attempt = self.num_retries.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt > max_attempts {
                warn!(attempts = max_attempts, "Giving up peer exchange retries");
                return;
            }
            let delay = retry_delay(attempt);
            debug!(attempt, ?delay, "Retrying peer exchange");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => return,
            }

            let addresses = self.strategy.addresses_for_retry();
            if addresses.is_empty() {
                continue;
            }
            if !self.run_round(addresses, None).await.failed() {
                self.num_retries.store(0, Ordering::SeqCst);
                return;
            }
        }
    }

    /// Contact more peers. A no-op while an extension is already running.
    pub fn extend_peer_group(self: &Arc<Self>) -> bool {
        if self.extending.swap(true, Ordering::SeqCst) {
            return false;
        }
        let addresses = self.strategy.addresses_for_extension();
        if addresses.is_empty() {
            self.extending.store(false, Ordering::SeqCst);
            return false;
        }
        debug!(candidates = addresses.len(), "Extending peer group");
        let service = self.clone();
        tokio::spawn(async move {
            let outcome = service.run_round(addresses, None).await;
            service.extending.store(false, Ordering::SeqCst);
            if outcome.failed() {
                service.schedule_retry();
            }
        });
        true
    }

    pub fn is_extending(&self) -> bool {
        self.extending.load(Ordering::SeqCst)
    }

    // =========================================================================
    // INBOUND
    // =========================================================================

    /// Answer a peer exchange request with the peers the requester does not
    /// know yet.
    pub async fn on_request(
        &self,
        connection: &ConnectionInfo,
        request: PeerExchangeRequest,
    ) -> Result<(), PeerGroupError> {
        let requester = &connection.peer_address;
        if !request.is_valid() {
            warn!(peer = %requester, "Dropping oversized peer exchange request");
            return Err(PeerGroupError::InvalidResponse(requester.clone()));
        }
        self.peer_group.on_connection(connection);

        let peers = self.strategy.peers_for_reporting(Some(requester), &request.peers);
        self.strategy.add_reported_peers(request.peers, requester);
        self.transport
            .send_exchange_response(&connection.id, PeerExchangeResponse::new(request.nonce, peers))
            .await?;
        self.metrics.record_served();
        Ok(())
    }

    pub fn on_response(&self, connection: &ConnectionId, response: PeerExchangeResponse) -> bool {
        let resolved = self.waiters.resolve(connection, response);
        if !resolved {
            debug!(%connection, "Peer exchange response without a waiting request");
        }
        resolved
    }

    pub fn on_connection_closed(&self, connection: &ConnectionInfo) {
        let cancelled = self.waiters.cancel_connection(&connection.id);
        if cancelled > 0 {
            debug!(connection = %connection.id, cancelled, "Cancelled peer exchange requests");
        }
        self.peer_group.on_connection_closed(connection);
    }
}
