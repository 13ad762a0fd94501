//! State module for tracking harvest progress
//!
//! # Components
//!
//! - `QueuePhase`: lifecycle of a pagination queue (not started, running, done, errored)
//! - `QueueState`: the page cursor, pending references and already-persisted counter

mod queue_state;

// Re-export main types
pub use queue_state::{QueuePhase, QueueState};
