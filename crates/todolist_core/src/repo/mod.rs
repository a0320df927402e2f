//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the item data-access contract used by the list controller.
//! - Isolate SQLite statements from controller/FFI orchestration.
//!
//! # Invariants
//! - Repository writes must enforce `Item::validate()` before persistence.
//! - Every storage failure names the statement that failed.

pub mod item_repo;
