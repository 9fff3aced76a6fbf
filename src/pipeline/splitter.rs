//! Splitter: round-robin fan-out from one channel to N.
//!
//! Item `k` read from the input goes to output `k mod n`. Each output keeps
//! the relative order of the items it receives; nothing is said about order
//! across outputs.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::core::{channel, Capacity, ChannelRx, ChannelTx, RecvOutcome};
use crate::error::{Error, Result};
use crate::pipeline::task::{
    settle, spawn_component, ComponentKind, ComponentTask, Flow, StageStats,
};

/// The outputs and task of a spawned splitter
#[derive(Debug)]
pub struct SplitHandle<T> {
    pub outputs: Vec<ChannelRx<T>>,
    pub task: ComponentTask,
}

/// Fan `input` out to `n` outputs in round-robin order.
pub fn split<T>(
    name: impl Into<Arc<str>>,
    input: ChannelRx<T>,
    n: usize,
    cancel: CancellationToken,
    capacity: Capacity,
) -> Result<SplitHandle<T>>
where
    T: Send + 'static,
{
    if n == 0 {
        return Err(Error::invalid_config("a splitter needs at least one output"));
    }

    let name = name.into();
    let mut senders = Vec::with_capacity(n);
    let mut outputs = Vec::with_capacity(n);
    for _ in 0..n {
        let (tx, rx) = channel(capacity)?;
        senders.push(tx);
        outputs.push(rx);
    }

    let body = run_splitter(name.clone(), input, senders, cancel.clone());
    let task = spawn_component(name, ComponentKind::Splitter, cancel, body);

    Ok(SplitHandle { outputs, task })
}

async fn run_splitter<T: Send + 'static>(
    name: Arc<str>,
    mut input: ChannelRx<T>,
    outputs: Vec<ChannelTx<T>>,
    cancel: CancellationToken,
) -> Result<StageStats> {
    let mut stats = StageStats::new(&name, ComponentKind::Splitter);
    // Only this task ever touches the counter.
    let mut next = 0usize;

    loop {
        let item = match input.recv_or_cancel(&cancel).await {
            RecvOutcome::Item(item) => item,
            RecvOutcome::Closed => break,
            RecvOutcome::Cancelled => {
                stats.cancelled = true;
                break;
            }
        };
        stats.received += 1;

        let target = &outputs[next % outputs.len()];
        next += 1;

        match settle(target.send(item, &cancel).await, &name, &cancel, &mut stats)? {
            Flow::Continue => stats.emitted += 1,
            Flow::Stop => break,
        }
    }

    log_debug!(outputs = outputs.len(), "closing all outputs");
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SendOutcome;

    #[tokio::test]
    async fn seven_items_over_three_outputs() {
        let (tx, rx) = channel(Capacity::Unbounded).unwrap();
        let token = CancellationToken::new();
        for i in 0..7 {
            assert_eq!(tx.send(i, &token).await, SendOutcome::Sent);
        }
        drop(tx);

        let handle = split("split", rx, 3, token, Capacity::Bounded(8)).unwrap();
        let mut sizes = Vec::new();
        let mut contents = Vec::new();
        for output in handle.outputs {
            let items = output.collect().await;
            sizes.push(items.len());
            contents.push(items);
        }

        assert_eq!(sizes, vec![3, 2, 2]);
        assert_eq!(contents, vec![vec![0, 3, 6], vec![1, 4], vec![2, 5]]);
        assert_eq!(handle.task.await.unwrap().unwrap().emitted, 7);
    }

    #[tokio::test]
    async fn zero_outputs_is_rejected() {
        let (_tx, rx) = channel::<u8>(Capacity::Unbounded).unwrap();
        let result = split("split", rx, 0, CancellationToken::new(), Capacity::Unbounded);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }
}
