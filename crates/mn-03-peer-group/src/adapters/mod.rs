//! # Adapters Layer
//!
//! - `ban_list.rs` - In-memory ban list

pub mod ban_list;

pub use ban_list::InMemoryBanList;
