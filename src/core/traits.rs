//! Core traits for the pipeline system.
//!
//! These are the seams a caller plugs work into: a [`Source`] feeds a
//! generator, a [`Processor`] is the function a stage runs for every item,
//! and a [`Sink`] folds the final stream into a result.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Rejection;

/// What a stage does with one input item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    /// Forward a value downstream
    Emit(T),
    /// Drop the item on purpose (filtering)
    Skip,
    /// Route the item to the stage's error channel
    Reject(Rejection),
}

impl<T> Outcome<T> {
    /// Create a rejection outcome from a message
    pub fn reject<S: Into<String>>(message: S) -> Self {
        Outcome::Reject(Rejection::new(message))
    }

    pub fn is_emit(&self) -> bool {
        matches!(self, Outcome::Emit(_))
    }

    /// Map the emitted value, leaving skips and rejections alone
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Emit(value) => Outcome::Emit(f(value)),
            Outcome::Skip => Outcome::Skip,
            Outcome::Reject(rejection) => Outcome::Reject(rejection),
        }
    }
}

impl<T, E: Into<Rejection>> From<std::result::Result<T, E>> for Outcome<T> {
    fn from(result: std::result::Result<T, E>) -> Self {
        match result {
            Ok(value) => Outcome::Emit(value),
            Err(err) => Outcome::Reject(err.into()),
        }
    }
}

impl<T> From<Option<T>> for Outcome<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Outcome::Emit(value),
            None => Outcome::Skip,
        }
    }
}

/// A source produces the initial sequence of a pipeline.
///
/// The sequence is lazy and consumed once. Returning `Some(Err(_))` reports a
/// non-fatal problem (an unreadable entry, say); the generator forwards it to
/// its error channel and keeps pulling.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use pipewright::core::Source;
/// use pipewright::error::Rejection;
///
/// struct CounterSource {
///     current: u64,
///     max: u64,
/// }
///
/// #[async_trait]
/// impl Source for CounterSource {
///     type Item = u64;
///
///     async fn produce(&mut self) -> Option<Result<Self::Item, Rejection>> {
///         if self.current > self.max {
///             return None;
///         }
///         self.current += 1;
///         Some(Ok(self.current - 1))
///     }
/// }
/// ```
#[async_trait]
pub trait Source: Send {
    /// The type of items this source generates
    type Item: Send + 'static;

    /// Produce the next item, or `None` once the source is exhausted.
    async fn produce(&mut self) -> Option<Result<Self::Item, Rejection>>;
}

/// A processor is the unit of work a stage applies to each item.
///
/// It takes `&self` and must be `Sync`: when a stage is fanned out, every
/// branch shares one processor behind an `Arc` and calls it concurrently.
/// Anything it needs to mutate has to carry its own synchronization.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use pipewright::core::{Outcome, Processor};
///
/// struct DoubleProcessor;
///
/// #[async_trait]
/// impl Processor for DoubleProcessor {
///     type Input = i32;
///     type Output = i32;
///
///     async fn process(&self, item: Self::Input) -> Outcome<Self::Output> {
///         Outcome::Emit(item * 2)
///     }
/// }
/// ```
#[async_trait]
pub trait Processor: Send + Sync {
    /// The type of items this processor accepts
    type Input: Send + 'static;
    /// The type of items this processor produces
    type Output: Send + 'static;

    /// Handle one item.
    async fn process(&self, item: Self::Input) -> Outcome<Self::Output>;
}

#[async_trait]
impl<P: Processor + ?Sized> Processor for Arc<P> {
    type Input = P::Input;
    type Output = P::Output;

    async fn process(&self, item: Self::Input) -> Outcome<Self::Output> {
        (**self).process(item).await
    }
}

/// A sink consumes the final stream of a pipeline and produces a result.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use pipewright::core::Sink;
///
/// struct SumSink(i64);
///
/// #[async_trait]
/// impl Sink for SumSink {
///     type Item = i64;
///     type Output = i64;
///
///     async fn write(&mut self, item: Self::Item) {
///         self.0 += item;
///     }
///
///     async fn finish(self) -> Self::Output {
///         self.0
///     }
/// }
/// ```
#[async_trait]
pub trait Sink: Send {
    /// The type of items this sink accepts
    type Item: Send + 'static;
    /// What the sink hands back once its input is closed
    type Output: Send + 'static;

    /// Fold a single item into the sink.
    async fn write(&mut self, item: Self::Item);

    /// Called once the input is closed and drained.
    async fn finish(self) -> Self::Output
    where
        Self: Sized;
}
