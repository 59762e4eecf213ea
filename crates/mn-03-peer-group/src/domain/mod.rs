//! Domain layer: peer records, the peer arena, exchange messages and policy.

pub mod arena;
pub mod errors;
pub mod messages;
pub mod peer;
pub mod policy;

pub use arena::{PeerArena, PeerStore, PeerView};
pub use errors::PeerGroupError;
pub use messages::{PeerExchangeRequest, PeerExchangeResponse, MAX_EXCHANGED_PEERS};
pub use peer::{newest_first, Peer};
pub use policy::{CloseReason, ExchangeState, MAX_PEER_AGE_MS, MAX_RETRY_DELAY};
