//! Spawning and bookkeeping shared by every component task.

use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::SendOutcome;
use crate::error::{Error, Result};
use crate::util::panic_message;

/// Which role a component plays in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ComponentKind {
    Generator,
    Stage,
    Splitter,
    Merger,
    Sink,
}

/// Counters reported by a component when it terminates.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StageStats {
    pub name: String,
    pub kind: ComponentKind,
    /// Items read from the input (or pulled from the source)
    pub received: u64,
    /// Items written downstream
    pub emitted: u64,
    /// Items routed to the error channel
    pub rejected: u64,
    /// Items dropped on purpose
    pub skipped: u64,
    /// Whether the component stopped because it observed cancellation
    pub cancelled: bool,
}

impl StageStats {
    pub(crate) fn new(name: &str, kind: ComponentKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            received: 0,
            emitted: 0,
            rejected: 0,
            skipped: 0,
            cancelled: false,
        }
    }

    pub(crate) fn absorb(&mut self, other: &StageStats) {
        self.received += other.received;
        self.emitted += other.emitted;
        self.rejected += other.rejected;
        self.skipped += other.skipped;
        self.cancelled |= other.cancelled;
    }
}

/// Handle to a running component task
pub type ComponentTask = JoinHandle<Result<StageStats>>;

/// Spawn a component body as its own task.
///
/// A panic escaping the body becomes [`Error::Panicked`]. Any error cancels
/// `abort` so the rest of the run winds down instead of waiting forever.
pub(crate) fn spawn_component<F, T>(
    name: Arc<str>,
    kind: ComponentKind,
    abort: CancellationToken,
    body: F,
) -> JoinHandle<Result<T>>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    #[cfg(feature = "tracing")]
    let span = tracing::info_span!("pipewright.component", kind = ?kind, name = %name);
    #[cfg(not(feature = "tracing"))]
    let _ = kind;

    let task = async move {
        log_debug!(kind = ?kind, "component started");

        let result = match AssertUnwindSafe(body).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => Err(Error::Panicked {
                stage: name.to_string(),
                message: panic_message(payload.as_ref()),
            }),
        };

        match &result {
            Ok(_) => log_debug!("component finished"),
            Err(err) => {
                log_warn!(error = %err, "component failed, aborting run");
                abort.cancel();
            }
        }
        result
    };

    #[cfg(feature = "tracing")]
    let handle = {
        use tracing::Instrument;
        tokio::spawn(task.instrument(span))
    };

    #[cfg(not(feature = "tracing"))]
    let handle = tokio::spawn(task);

    handle
}

/// Await a component task, folding join failures into [`Error`]
pub(crate) async fn join_component(task: ComponentTask) -> Result<StageStats> {
    task.await?
}

/// What a component loop should do after a send
pub(crate) enum Flow {
    Continue,
    Stop,
}

/// Interpret a send result on behalf of component `stage`.
///
/// A reader that vanished while the run is still live means some component
/// dropped its input early, which is a wiring bug rather than an item error.
pub(crate) fn settle(
    outcome: SendOutcome,
    stage: &str,
    cancel: &CancellationToken,
    stats: &mut StageStats,
) -> Result<Flow> {
    match outcome {
        SendOutcome::Sent => Ok(Flow::Continue),
        SendOutcome::Cancelled => {
            stats.cancelled = true;
            Ok(Flow::Stop)
        }
        SendOutcome::Disconnected if cancel.is_cancelled() => {
            log_debug!("downstream closed after cancellation");
            stats.cancelled = true;
            Ok(Flow::Stop)
        }
        SendOutcome::Disconnected => Err(Error::ChannelClosed {
            stage: stage.to_string(),
        }),
    }
}
