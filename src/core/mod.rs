//! Core traits and types for the pipewright library.
//!
//! This module contains the channel primitive and the traits that define the
//! pipewright processing model.

pub mod channel;
pub mod traits;

// Re-export core items
pub use channel::{channel, Capacity, ChannelRx, ChannelTx, RecvOutcome, SendOutcome};
pub use traits::{Outcome, Processor, Sink, Source};
