//! Domain model for the to-do list screen.
//!
//! # Responsibility
//! - Define the canonical `Item` record persisted by the repository.
//! - Define display-only filtering and ordering over in-memory items.
//!
//! # Invariants
//! - Every item is identified by a positive, storage-assigned `ItemId`.
//! - `complete` is the only field that changes after creation.

pub mod filter;
pub mod item;
