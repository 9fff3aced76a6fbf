//! Utility functions and helper types.

use async_trait::async_trait;
use std::any::Any;
use std::future::Future;
use std::marker::PhantomData;

use crate::core::{Outcome, Processor, Sink, Source};
use crate::error::Rejection;

/// Helper function to create a source from an async function
pub fn source_from_fn<F, Fut, T>(f: F) -> FnSource<F, Fut, T>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Option<Result<T, Rejection>>> + Send,
    T: Send + 'static,
{
    FnSource {
        f,
        _phantom: PhantomData,
    }
}

/// A source created from a function
pub struct FnSource<F, Fut, T> {
    f: F,
    _phantom: PhantomData<fn() -> (Fut, T)>,
}

#[async_trait]
impl<F, Fut, T> Source for FnSource<F, Fut, T>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Option<Result<T, Rejection>>> + Send,
    T: Send + 'static,
{
    type Item = T;

    async fn produce(&mut self) -> Option<Result<Self::Item, Rejection>> {
        (self.f)().await
    }
}

/// Helper function to create a processor from an async function
pub fn processor_from_fn<F, Fut, T, U>(f: F) -> FnProcessor<F, Fut, T, U>
where
    F: Fn(T) -> Fut + Send + Sync,
    Fut: Future<Output = Outcome<U>> + Send,
    T: Send + 'static,
    U: Send + 'static,
{
    FnProcessor {
        f,
        _phantom: PhantomData,
    }
}

/// A processor created from a function
pub struct FnProcessor<F, Fut, T, U> {
    f: F,
    _phantom: PhantomData<fn(T) -> (Fut, U)>,
}

#[async_trait]
impl<F, Fut, T, U> Processor for FnProcessor<F, Fut, T, U>
where
    F: Fn(T) -> Fut + Send + Sync,
    Fut: Future<Output = Outcome<U>> + Send,
    T: Send + 'static,
    U: Send + 'static,
{
    type Input = T;
    type Output = U;

    async fn process(&self, item: Self::Input) -> Outcome<Self::Output> {
        (self.f)(item).await
    }
}

/// Helper function to create a sink from an async function
pub fn sink_from_fn<F, Fut, T>(f: F) -> FnSink<F, Fut, T>
where
    F: FnMut(T) -> Fut + Send,
    Fut: Future<Output = ()> + Send,
    T: Send + 'static,
{
    FnSink {
        f,
        _phantom: PhantomData,
    }
}

/// A sink created from a function
pub struct FnSink<F, Fut, T> {
    f: F,
    _phantom: PhantomData<fn(T) -> Fut>,
}

#[async_trait]
impl<F, Fut, T> Sink for FnSink<F, Fut, T>
where
    F: FnMut(T) -> Fut + Send,
    Fut: Future<Output = ()> + Send,
    T: Send + 'static,
{
    type Item = T;
    type Output = ();

    async fn write(&mut self, item: Self::Item) {
        (self.f)(item).await
    }

    async fn finish(self) -> Self::Output {}
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
