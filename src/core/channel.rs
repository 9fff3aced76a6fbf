//! The channel primitive every component communicates through.
//!
//! A thin layer over `tokio::sync::mpsc` that puts bounded and unbounded
//! queues behind one type and makes both suspension points (a full channel on
//! send, an empty one on receive) wake on cancellation.
//!
//! A channel is closed when every [`ChannelTx`] has been dropped (or consumed
//! by [`ChannelTx::close`]), or when the reader calls [`ChannelRx::close`].
//! Items already buffered stay readable after close; once they are drained
//! every further receive reports end-of-stream without blocking.

use futures::stream::{BoxStream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::{ReceiverStream, UnboundedReceiverStream};
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// How many items a channel may buffer before writers suspend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Capacity {
    /// At most `n` buffered items; writers wait for space (backpressure)
    Bounded(usize),
    /// Writers never wait
    Unbounded,
}

impl Capacity {
    /// Reject capacities that cannot back a channel
    pub fn validate(self) -> Result<Self> {
        match self {
            Capacity::Bounded(0) => Err(Error::invalid_config(
                "bounded channel capacity must be at least 1",
            )),
            other => Ok(other),
        }
    }
}

impl Default for Capacity {
    fn default() -> Self {
        Capacity::Bounded(64)
    }
}

/// Result of a cancellable send.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The item is in the channel
    Sent,
    /// Cancellation was observed first; the item was dropped
    Cancelled,
    /// The reader is gone; the item was dropped
    Disconnected,
}

/// Result of a cancellable receive.
#[derive(Debug, PartialEq, Eq)]
pub enum RecvOutcome<T> {
    Item(T),
    /// The channel is closed and drained
    Closed,
    /// Cancellation was observed before an item arrived
    Cancelled,
}

/// Create a channel with the given capacity.
pub fn channel<T>(capacity: Capacity) -> Result<(ChannelTx<T>, ChannelRx<T>)> {
    match capacity.validate()? {
        Capacity::Bounded(n) => {
            let (tx, rx) = mpsc::channel(n);
            Ok((
                ChannelTx {
                    inner: TxInner::Bounded(tx),
                },
                ChannelRx {
                    inner: RxInner::Bounded(rx),
                },
            ))
        }
        Capacity::Unbounded => {
            let (tx, rx) = mpsc::unbounded_channel();
            Ok((
                ChannelTx {
                    inner: TxInner::Unbounded(tx),
                },
                ChannelRx {
                    inner: RxInner::Unbounded(rx),
                },
            ))
        }
    }
}

enum TxInner<T> {
    Bounded(mpsc::Sender<T>),
    Unbounded(mpsc::UnboundedSender<T>),
}

/// The write end of a channel.
///
/// Clones share the same queue; the channel closes when the last clone goes
/// away, which is how a merger's readers jointly own one output.
pub struct ChannelTx<T> {
    inner: TxInner<T>,
}

impl<T> Clone for ChannelTx<T> {
    fn clone(&self) -> Self {
        let inner = match &self.inner {
            TxInner::Bounded(tx) => TxInner::Bounded(tx.clone()),
            TxInner::Unbounded(tx) => TxInner::Unbounded(tx.clone()),
        };
        Self { inner }
    }
}

impl<T> std::fmt::Debug for ChannelTx<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelTx")
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<T: Send> ChannelTx<T> {
    /// Send an item, suspending while a bounded channel is full.
    ///
    /// Cancellation wins over available space, so once the token fires no
    /// further item is accepted.
    pub async fn send(&self, item: T, cancel: &CancellationToken) -> SendOutcome {
        if cancel.is_cancelled() {
            return SendOutcome::Cancelled;
        }

        match &self.inner {
            TxInner::Bounded(tx) => tokio::select! {
                biased;
                _ = cancel.cancelled() => SendOutcome::Cancelled,
                sent = tx.send(item) => match sent {
                    Ok(()) => SendOutcome::Sent,
                    Err(_) => SendOutcome::Disconnected,
                },
            },
            TxInner::Unbounded(tx) => match tx.send(item) {
                Ok(()) => SendOutcome::Sent,
                Err(_) => SendOutcome::Disconnected,
            },
        }
    }
}

impl<T> ChannelTx<T> {
    /// Whether the reader has closed or dropped its end
    pub fn is_closed(&self) -> bool {
        match &self.inner {
            TxInner::Bounded(tx) => tx.is_closed(),
            TxInner::Unbounded(tx) => tx.is_closed(),
        }
    }

    /// Give up this write handle.
    pub fn close(self) {}
}

enum RxInner<T> {
    Bounded(mpsc::Receiver<T>),
    Unbounded(mpsc::UnboundedReceiver<T>),
}

/// The read end of a channel.
pub struct ChannelRx<T> {
    inner: RxInner<T>,
}

impl<T> std::fmt::Debug for ChannelRx<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelRx").finish_non_exhaustive()
    }
}

impl<T: Send + 'static> ChannelRx<T> {
    /// Receive the next item, or `None` once the channel is closed and drained
    pub async fn recv(&mut self) -> Option<T> {
        match &mut self.inner {
            RxInner::Bounded(rx) => rx.recv().await,
            RxInner::Unbounded(rx) => rx.recv().await,
        }
    }

    /// Receive the next item unless cancellation is observed first.
    pub async fn recv_or_cancel(&mut self, cancel: &CancellationToken) -> RecvOutcome<T> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => RecvOutcome::Cancelled,
            item = self.recv() => match item {
                Some(item) => RecvOutcome::Item(item),
                None => RecvOutcome::Closed,
            },
        }
    }

    /// Stop accepting writes. Buffered items can still be received.
    ///
    /// Calling this more than once has no further effect.
    pub fn close(&mut self) {
        match &mut self.inner {
            RxInner::Bounded(rx) => rx.close(),
            RxInner::Unbounded(rx) => rx.close(),
        }
    }

    /// Read everything until the channel is closed
    pub async fn collect(mut self) -> Vec<T> {
        let mut items = Vec::new();
        while let Some(item) = self.recv().await {
            items.push(item);
        }
        items
    }

    /// View the channel as a stream
    pub fn into_stream(self) -> BoxStream<'static, T> {
        match self.inner {
            RxInner::Bounded(rx) => ReceiverStream::new(rx).boxed(),
            RxInner::Unbounded(rx) => UnboundedReceiverStream::new(rx).boxed(),
        }
    }
}
