//! Storage implementations for view state

pub mod in_memory;

pub use in_memory::{InMemoryRecords, InMemoryStateStore};
