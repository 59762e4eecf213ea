//! # Peer Exchange Policy
//!
//! Pure decisions of the exchange protocol: phases, per-round limits,
//! success thresholds and retry backoff.

use std::fmt;
use std::time::Duration;

/// Upper bound on the retry backoff.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Peers older than this are neither reported nor dialed.
pub const MAX_PEER_AGE_MS: u64 = 5 * 24 * 60 * 60 * 1000;

/// Phase of the exchange protocol on one transport.
///
/// ```text
/// Bootstrapping ──(first exchange succeeded)──→ Exchanging ──(initial attempt done)──→ SteadyState
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExchangeState {
    Bootstrapping,
    Exchanging,
    SteadyState,
}

impl fmt::Display for ExchangeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExchangeState::Bootstrapping => "bootstrapping",
            ExchangeState::Exchanging => "exchanging",
            ExchangeState::SteadyState => "steady_state",
        };
        f.write_str(name)
    }
}

/// Why a connection is closed by the peer group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Banned,
    DuplicateConnection,
    TooManyConnectionsToSeeds,
    TooManyInboundConnections,
    TooManyConnections,
    Shutdown,
}

/// How many addresses one exchange round contacts.
///
/// At least a quarter of `min_connected`, more when below target. With
/// enough connections but few reported peers, half of `min_connected`.
pub fn exchange_limit(
    min_connected: usize,
    target_connected: usize,
    num_connections: usize,
    num_reported: usize,
    num_reported_at_bootstrap: usize,
) -> usize {
    let min_value = min_connected / 4;
    let missing = target_connected.saturating_sub(num_connections);
    let limit = min_value.max(missing);
    if limit == min_value && num_reported < num_reported_at_bootstrap / 4 {
        return min_connected / 2;
    }
    limit
}

pub fn min_success(num_candidates: usize) -> usize {
    (num_candidates / 2).max(1)
}

pub fn too_many_failures(num_success: usize, num_failures: usize) -> bool {
    num_failures > (num_success + num_failures) / 2
}

/// Quadratic backoff, capped at [`MAX_RETRY_DELAY`].
pub fn retry_delay(num_retries: u32) -> Duration {
    let n = u64::from(num_retries);
    Duration::from_millis(1000u64.saturating_mul(n).saturating_mul(n)).min(MAX_RETRY_DELAY)
}

/// Start an extension right after the initial exchange when it contacted
/// fewer peers than we want to be connected to.
pub fn should_extend_after_initial(num_candidates: usize, min_connected: usize) -> bool {
    num_candidates < min_connected
}
