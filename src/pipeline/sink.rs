//! Sink runtime: folds the final data channel and drains error channels.
//!
//! The data fold and the error drain are separate tasks joined at the end, so
//! a sink that is slow to fold never stalls components that are reporting
//! errors.

use tokio_util::sync::CancellationToken;

use crate::core::{Capacity, ChannelRx, Sink};
use crate::error::{Result, StageError};
use crate::pipeline::merger::merge;

/// Fold `input` into `sink` while collecting every record from `errors`.
///
/// Returns once the data channel and all error channels are closed.
pub async fn drain<S>(
    input: ChannelRx<S::Item>,
    sink: S,
    errors: Vec<ChannelRx<StageError>>,
) -> Result<(S::Output, Vec<StageError>)>
where
    S: Sink + 'static,
{
    let collector = tokio::spawn(collect_errors(errors));
    let output = write_all(input, sink).await;
    let errors = collector.await??;
    Ok((output, errors))
}

/// Fold a channel into an accumulator until it closes
pub async fn fold<T, A, F>(mut input: ChannelRx<T>, initial: A, mut f: F) -> A
where
    T: Send + 'static,
    F: FnMut(A, T) -> A,
{
    let mut acc = initial;
    while let Some(item) = input.recv().await {
        acc = f(acc, item);
    }
    acc
}

async fn write_all<S: Sink>(mut input: ChannelRx<S::Item>, mut sink: S) -> S::Output {
    while let Some(item) = input.recv().await {
        sink.write(item).await;
    }
    sink.finish().await
}

async fn collect_errors(errors: Vec<ChannelRx<StageError>>) -> Result<Vec<StageError>> {
    // Error channels close through upstream completion, never through cancellation.
    let handle = merge("errors", errors, CancellationToken::new(), Capacity::Unbounded)?;
    let records = handle.output.collect().await;
    handle.task.await??;
    Ok(records)
}
