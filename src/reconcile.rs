//! Item reconciliation engine
//!
//! Merges an out-of-order, duplicate-tolerant upsert stream into one
//! authoritative snapshot per item. Items never share state: applying an
//! upsert for one item id only touches that item's entry.

mod engine;
mod snapshot;

#[cfg(test)]
mod proptests;

pub use engine::{Discard, ItemChange, ItemMap};
pub use snapshot::{ItemBody, ItemSnapshot};
