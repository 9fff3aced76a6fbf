//! Merger: fan-in from N channels to one, optionally transforming on the way.
//!
//! Every input gets its own reader task. All readers write into clones of a
//! single output sender, so the channel serializes their writes and the output
//! closes exactly when the last reader is done. Output order follows arrival
//! time, not input index.

use futures::future::join_all;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::core::{channel, Capacity, ChannelRx, Processor};
use crate::error::{Result, StageError};
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::stage::run_stage;
use crate::pipeline::task::{spawn_component, ComponentKind, ComponentTask, StageStats};
use crate::processors::NoOpProcessor;

/// The channels and task of a spawned merger.
///
/// The task resolves once every reader has finished.
#[derive(Debug)]
pub struct MergeHandle<T> {
    pub output: ChannelRx<T>,
    /// Rejections from the merge transform; closes empty for a plain merge
    pub errors: ChannelRx<StageError>,
    pub task: ComponentTask,
}

/// Merge `inputs` into one channel without transforming items.
pub fn merge<T>(
    name: impl Into<Arc<str>>,
    inputs: Vec<ChannelRx<T>>,
    cancel: CancellationToken,
    capacity: Capacity,
) -> Result<MergeHandle<T>>
where
    T: Send + 'static,
{
    let config = PipelineConfig {
        capacity,
        error_capacity: Capacity::Bounded(1),
        item_timeout: None,
    };
    merge_with(name, inputs, NoOpProcessor::new(), cancel, &config)
}

/// Merge `inputs` into one channel, running `processor` on each item as it
/// arrives.
pub fn merge_with<P>(
    name: impl Into<Arc<str>>,
    inputs: Vec<ChannelRx<P::Input>>,
    processor: P,
    cancel: CancellationToken,
    config: &PipelineConfig,
) -> Result<MergeHandle<P::Output>>
where
    P: Processor + 'static,
{
    let name = name.into();
    let (output_tx, output) = channel(config.capacity)?;
    let (errors_tx, errors) = channel(config.error_capacity)?;
    let processor = Arc::new(processor);

    let readers: Vec<_> = inputs
        .into_iter()
        .map(|input| {
            let body = run_stage(
                name.clone(),
                input,
                processor.clone(),
                output_tx.clone(),
                errors_tx.clone(),
                cancel.clone(),
                config.item_timeout,
            );
            // A failing reader cancels the run, which releases its siblings.
            spawn_component(name.clone(), ComponentKind::Merger, cancel.clone(), body)
        })
        .collect();

    // The readers now hold the only senders.
    drop(output_tx);
    drop(errors_tx);

    let body = join_readers(name.clone(), readers);
    let task = spawn_component(name, ComponentKind::Merger, cancel, body);

    Ok(MergeHandle {
        output,
        errors,
        task,
    })
}

async fn join_readers(name: Arc<str>, readers: Vec<ComponentTask>) -> Result<StageStats> {
    let mut stats = StageStats::new(&name, ComponentKind::Merger);

    for joined in join_all(readers).await {
        stats.absorb(&joined??);
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Outcome, SendOutcome};
    use crate::error::Error;
    use crate::util::processor_from_fn;

    async fn filled(items: Vec<u32>) -> ChannelRx<u32> {
        let (tx, rx) = channel(Capacity::Unbounded).unwrap();
        let token = CancellationToken::new();
        for item in items {
            assert_eq!(tx.send(item, &token).await, SendOutcome::Sent);
        }
        rx
    }

    #[tokio::test]
    async fn output_closes_after_every_input() {
        let inputs = vec![
            filled(vec![1, 2]).await,
            filled(vec![]).await,
            filled(vec![3, 4, 5]).await,
        ];
        let handle =
            merge("merge", inputs, CancellationToken::new(), Capacity::Bounded(2)).unwrap();

        let mut output = handle.output.collect().await;
        output.sort();
        assert_eq!(output, vec![1, 2, 3, 4, 5]);

        let stats = handle.task.await.unwrap().unwrap();
        assert_eq!(stats.kind, ComponentKind::Merger);
        assert_eq!(stats.emitted, 5);
    }

    #[tokio::test]
    async fn per_input_order_survives_interleaving() {
        let inputs = vec![
            filled((0..50).collect()).await,
            filled((100..150).collect()).await,
        ];
        let handle =
            merge("merge", inputs, CancellationToken::new(), Capacity::Bounded(1)).unwrap();
        let output = handle.output.collect().await;

        let low: Vec<_> = output.iter().copied().filter(|x| *x < 100).collect();
        let high: Vec<_> = output.iter().copied().filter(|x| *x >= 100).collect();
        assert_eq!(low, (0..50).collect::<Vec<_>>());
        assert_eq!(high, (100..150).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn merge_with_transforms_and_reports_rejections() {
        let inputs = vec![filled(vec![1, 2]).await, filled(vec![3, 0]).await];
        let describe = processor_from_fn(|x: u32| async move {
            if x == 0 {
                Outcome::reject("zero")
            } else {
                Outcome::Emit(format!("#{x}"))
            }
        });
        let handle = merge_with(
            "describe",
            inputs,
            describe,
            CancellationToken::new(),
            &PipelineConfig::default(),
        )
        .unwrap();

        let (mut output, errors) =
            tokio::join!(handle.output.collect(), handle.errors.collect());
        output.sort();
        assert_eq!(output, vec!["#1", "#2", "#3"]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].stage, "describe");
        assert_eq!(handle.task.await.unwrap().unwrap().rejected, 1);
    }

    #[tokio::test]
    async fn zero_inputs_close_immediately() {
        let handle =
            merge::<u32>("merge", Vec::new(), CancellationToken::new(), Capacity::Unbounded)
                .unwrap();
        assert!(handle.output.collect().await.is_empty());
    }

    #[tokio::test]
    async fn failed_reader_cancels_the_run_while_siblings_idle() {
        let (_quiet_tx, quiet) = channel::<u32>(Capacity::Bounded(1)).unwrap();
        let (busy_tx, busy) = channel::<u32>(Capacity::Bounded(1)).unwrap();
        let token = CancellationToken::new();

        let handle =
            merge("merge", vec![quiet, busy], token.clone(), Capacity::Bounded(1)).unwrap();
        drop(handle.output);
        assert_eq!(busy_tx.send(7, &CancellationToken::new()).await, SendOutcome::Sent);

        let result = tokio::time::timeout(std::time::Duration::from_secs(2), handle.task)
            .await
            .expect("merger stayed blocked on an idle input")
            .unwrap();

        assert!(matches!(result, Err(Error::ChannelClosed { .. })));
        assert!(token.is_cancelled());
    }
}
