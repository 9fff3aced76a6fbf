//! Stage runtime: one input channel, one output channel, one error channel.
//!
//! A stage reads an item, runs its [`Processor`] on it and routes the
//! [`Outcome`]: emitted values go to the output, rejections to the error
//! channel, skips nowhere. When the input is drained, or cancellation is
//! observed, the stage drops both senders and so closes its outputs.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::core::{channel, ChannelRx, ChannelTx, Outcome, Processor, RecvOutcome};
use crate::error::{Result, StageError};
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::task::{
    settle, spawn_component, ComponentKind, ComponentTask, Flow, StageStats,
};
use crate::util::panic_message;

/// The channels and task of a spawned stage
#[derive(Debug)]
pub struct StageHandle<T> {
    pub output: ChannelRx<T>,
    pub errors: ChannelRx<StageError>,
    pub task: ComponentTask,
}

/// Spawn a stage that applies `processor` to every item of `input`.
pub fn spawn_stage<P>(
    name: impl Into<Arc<str>>,
    input: ChannelRx<P::Input>,
    processor: P,
    cancel: CancellationToken,
    config: &PipelineConfig,
) -> Result<StageHandle<P::Output>>
where
    P: Processor + 'static,
{
    let name = name.into();
    let (output_tx, output) = channel(config.capacity)?;
    let (errors_tx, errors) = channel(config.error_capacity)?;

    let body = run_stage(
        name.clone(),
        input,
        processor,
        output_tx,
        errors_tx,
        cancel.clone(),
        config.item_timeout,
    );
    let task = spawn_component(name, ComponentKind::Stage, cancel, body);

    Ok(StageHandle {
        output,
        errors,
        task,
    })
}

pub(crate) async fn run_stage<P: Processor>(
    name: Arc<str>,
    mut input: ChannelRx<P::Input>,
    processor: P,
    output: ChannelTx<P::Output>,
    errors: ChannelTx<StageError>,
    cancel: CancellationToken,
    item_timeout: Option<Duration>,
) -> Result<StageStats> {
    let mut stats = StageStats::new(&name, ComponentKind::Stage);

    loop {
        let item = match input.recv_or_cancel(&cancel).await {
            RecvOutcome::Item(item) => item,
            RecvOutcome::Closed => break,
            RecvOutcome::Cancelled => {
                log_debug!("cancellation observed while waiting for input");
                stats.cancelled = true;
                break;
            }
        };
        stats.received += 1;

        // The token may have fired while the item was in hand; drop it unprocessed.
        if cancel.is_cancelled() {
            stats.cancelled = true;
            break;
        }

        let flow = match apply(&processor, item, item_timeout).await {
            Outcome::Emit(value) => {
                let flow = settle(output.send(value, &cancel).await, &name, &cancel, &mut stats)?;
                if let Flow::Continue = flow {
                    stats.emitted += 1;
                    count_items!("pipewright_items_emitted_total", name);
                }
                flow
            }
            Outcome::Skip => {
                stats.skipped += 1;
                count_items!("pipewright_items_skipped_total", name);
                Flow::Continue
            }
            Outcome::Reject(rejection) => {
                log_debug!(reason = %rejection, "item rejected");
                let record = rejection.into_stage_error(&name);
                let flow = settle(errors.send(record, &cancel).await, &name, &cancel, &mut stats)?;
                if let Flow::Continue = flow {
                    stats.rejected += 1;
                    count_items!("pipewright_items_rejected_total", name);
                }
                flow
            }
        };

        if let Flow::Stop = flow {
            break;
        }
    }

    // Dropping the senders here is what closes this stage's outputs.
    drop(output);
    drop(errors);
    Ok(stats)
}

/// Run one transform, turning panics and timeouts into rejections.
pub(crate) async fn apply<P: Processor>(
    processor: &P,
    item: P::Input,
    item_timeout: Option<Duration>,
) -> Outcome<P::Output> {
    let work = AssertUnwindSafe(processor.process(item)).catch_unwind();

    let result = match item_timeout {
        Some(limit) => match tokio::time::timeout(limit, work).await {
            Ok(result) => result,
            Err(_) => {
                return Outcome::reject(format!("timed out after {}ms", limit.as_millis()));
            }
        },
        None => work.await,
    };

    result.unwrap_or_else(|payload| {
        let message = panic_message(payload.as_ref());
        log_warn!(panic = %message, "transform panicked");
        Outcome::reject(format!("transform panicked: {message}"))
    })
}
