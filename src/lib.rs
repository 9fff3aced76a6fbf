//! # Pipewright: concurrent multi-stage pipelines over async channels
//!
//! A pipeline is a generator, a chain of stages and a sink. Every component
//! runs as its own tokio task and talks to its neighbours over bounded
//! channels, so a slow stage pushes back on everything upstream of it.
//!
//! ## Core Concepts
//!
//! - **Source**: feeds the generator, lazily and exactly once
//! - **Processor**: the per-item transform of a stage; emits, skips or rejects
//! - **Sink**: folds the final stream into a result
//! - **Splitter / Merger**: round-robin fan-out and arrival-order fan-in
//! - **Errors**: every component has an error channel next to its data
//!   channel; rejected items become [`StageError`] records instead of
//!   stopping the run
//! - **Cancellation**: one token per run, checked by every component before
//!   it reads or writes
//!
//! ## Example
//!
//! ```rust
//! use pipewright::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let report = Pipeline::source("words", VecSource::new(vec!["1", "two", "3"]))
//!         .stage(
//!             "parse",
//!             TryMapProcessor::new(|s: &str| s.parse::<i64>().map_err(|e| e.to_string())),
//!         )
//!         .buffer_size(8)
//!         .run(CollectSink::new())
//!         .await?;
//!
//!     assert_eq!(report.output, vec![1, 3]);
//!     assert_eq!(report.errors.len(), 1);
//!     assert_eq!(report.errors[0].stage, "parse");
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `tracing` (default): a span per component task and lifecycle events
//! - `metrics`: `pipewright_items_*_total` counters labelled by stage
//! - `serde`: serialize configuration, states, stats and error records

#[macro_use]
mod macros;

pub mod core;
pub mod error;
pub mod pipeline;
pub mod processors;
pub mod sinks;
pub mod sources;
pub mod util;

// Re-export commonly used items
pub mod prelude {
    pub use crate::core::{Capacity, ChannelRx, ChannelTx, Outcome, Processor, Sink, Source};
    pub use crate::error::{Error, Rejection, Result, StageError};
    pub use crate::pipeline::{
        ComponentKind, Fanned, Pipeline, PipelineConfig, PipelineReport, PipelineState,
        RunningPipeline, StageStats,
    };
    pub use crate::processors::*;
    pub use crate::sinks::*;
    pub use crate::sources::*;
    pub use crate::util::{processor_from_fn, sink_from_fn, source_from_fn};
}

pub use error::{Error, Rejection, Result, StageError};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
