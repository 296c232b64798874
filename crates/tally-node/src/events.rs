//! Node event stream

use tally_core::{Hash32, SignedTransaction};

/// Capacity of each subscriber's event buffer
pub const EVENT_CAPACITY: usize = 64;

/// Something observable happened on a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    /// A transfer was applied to the node's table
    TransactionCompleted(SignedTransaction),
    /// A reconciled table was adopted
    NewTable(Hash32),
}
