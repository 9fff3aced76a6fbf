//! Generator runtime: drives a [`Source`] into an output channel.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::core::{channel, ChannelRx, ChannelTx, Source};
use crate::error::{Result, StageError};
use crate::pipeline::config::PipelineConfig;
use crate::pipeline::task::{
    settle, spawn_component, ComponentKind, ComponentTask, Flow, StageStats,
};

/// The channels and task of a spawned generator
#[derive(Debug)]
pub struct SourceHandle<T> {
    pub output: ChannelRx<T>,
    pub errors: ChannelRx<StageError>,
    pub task: ComponentTask,
}

/// Spawn a generator pulling from `source` until it is exhausted or cancelled.
pub fn spawn_source<S>(
    name: impl Into<Arc<str>>,
    source: S,
    cancel: CancellationToken,
    config: &PipelineConfig,
) -> Result<SourceHandle<S::Item>>
where
    S: Source + 'static,
{
    let name = name.into();
    let (output_tx, output) = channel(config.capacity)?;
    let (errors_tx, errors) = channel(config.error_capacity)?;

    let body = run_source(name.clone(), source, output_tx, errors_tx, cancel.clone());
    let task = spawn_component(name, ComponentKind::Generator, cancel, body);

    Ok(SourceHandle {
        output,
        errors,
        task,
    })
}

async fn run_source<S: Source>(
    name: Arc<str>,
    mut source: S,
    output: ChannelTx<S::Item>,
    errors: ChannelTx<StageError>,
    cancel: CancellationToken,
) -> Result<StageStats> {
    let mut stats = StageStats::new(&name, ComponentKind::Generator);

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log_debug!("cancellation observed, stopping traversal");
                stats.cancelled = true;
                break;
            }
            next = source.produce() => next,
        };

        let flow = match next {
            None => break,
            Some(Ok(item)) => {
                stats.received += 1;
                let flow = settle(output.send(item, &cancel).await, &name, &cancel, &mut stats)?;
                if let Flow::Continue = flow {
                    stats.emitted += 1;
                    count_items!("pipewright_items_emitted_total", name);
                }
                flow
            }
            Some(Err(rejection)) => {
                stats.received += 1;
                log_debug!(reason = %rejection, "source entry skipped");
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

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Rejection;
    use crate::sources::{TryIterSource, VecSource};

    #[tokio::test]
    async fn emits_every_item_in_order() {
        let handle = spawn_source(
            "vec",
            VecSource::new(vec!["a.ts", "b.txt", "c.js"]),
            CancellationToken::new(),
            &PipelineConfig::new().buffer_size(1),
        )
        .unwrap();

        assert_eq!(handle.output.collect().await, vec!["a.ts", "b.txt", "c.js"]);
        let stats = handle.task.await.unwrap().unwrap();
        assert_eq!(stats.emitted, 3);
    }

    #[tokio::test]
    async fn traversal_errors_do_not_stop_the_source() {
        let entries = vec![
            Ok(1),
            Err(Rejection::new("permission denied").with_item("/secret")),
            Ok(2),
        ];
        let handle = spawn_source(
            "walk",
            TryIterSource::new(entries),
            CancellationToken::new(),
            &PipelineConfig::default(),
        )
        .unwrap();

        let (output, errors) = tokio::join!(handle.output.collect(), handle.errors.collect());
        assert_eq!(output, vec![1, 2]);
        assert_eq!(
            errors,
            vec![StageError {
                stage: "walk".to_string(),
                message: "permission denied".to_string(),
                item: Some("/secret".to_string()),
            }]
        );
    }

    #[tokio::test]
    async fn cancellation_stops_an_endless_source() {
        let cancel = CancellationToken::new();
        let mut handle = spawn_source(
            "endless",
            crate::sources::IterSource::new(0_u64..),
            cancel.clone(),
            &PipelineConfig::new().buffer_size(2),
        )
        .unwrap();

        assert_eq!(handle.output.recv().await, Some(0));
        cancel.cancel();

        let stats = handle.task.await.unwrap().unwrap();
        assert!(stats.cancelled);
        // Whatever was buffered drains, then the stream ends.
        let rest = handle.output.collect().await;
        assert!(rest.len() <= 2);
    }
}
