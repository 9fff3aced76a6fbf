//! Processor implementations for the pipewright library.
//!
//! This module provides the stage functions most pipelines are built from.
//! All of them are `Send + Sync` and hold no mutable state, so they can be
//! shared across the branches of a fanned-out stage.

pub mod combinators;

use async_trait::async_trait;
use std::marker::PhantomData;
use std::time::Duration;
use tokio::time::sleep;

use crate::core::{Outcome, Processor};
use crate::error::Rejection;

pub use combinators::{ProcessorExt, Then};

/// A processor that maps items using a function.
pub struct MapProcessor<F, T, U> {
    f: F,
    _phantom: PhantomData<fn(T) -> U>,
}

impl<F, T, U> MapProcessor<F, T, U> {
    /// Create a new map processor
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<F, T, U> Processor for MapProcessor<F, T, U>
where
    F: Fn(T) -> U + Send + Sync + 'static,
    T: Send + 'static,
    U: Send + 'static,
{
    type Input = T;
    type Output = U;

    async fn process(&self, item: Self::Input) -> Outcome<Self::Output> {
        Outcome::Emit((self.f)(item))
    }
}

/// A processor that maps items with a fallible function.
///
/// `Err` values are routed to the stage's error channel.
pub struct TryMapProcessor<F, T, U, E> {
    f: F,
    _phantom: PhantomData<fn(T) -> Result<U, E>>,
}

impl<F, T, U, E> TryMapProcessor<F, T, U, E> {
    /// Create a new fallible map processor
    pub fn new(f: F) -> Self {
        Self {
            f,
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<F, T, U, E> Processor for TryMapProcessor<F, T, U, E>
where
    F: Fn(T) -> Result<U, E> + Send + Sync + 'static,
    T: Send + 'static,
    U: Send + 'static,
    E: Into<Rejection> + 'static,
{
    type Input = T;
    type Output = U;

    async fn process(&self, item: Self::Input) -> Outcome<Self::Output> {
        (self.f)(item).into()
    }
}

/// A processor that drops items failing a predicate.
pub struct FilterProcessor<F, T> {
    predicate: F,
    _phantom: PhantomData<fn(T)>,
}

impl<F, T> FilterProcessor<F, T> {
    /// Create a new filter processor
    pub fn new(predicate: F) -> Self {
        Self {
            predicate,
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<F, T> Processor for FilterProcessor<F, T>
where
    F: Fn(&T) -> bool + Send + Sync + 'static,
    T: Send + 'static,
{
    type Input = T;
    type Output = T;

    async fn process(&self, item: Self::Input) -> Outcome<Self::Output> {
        if (self.predicate)(&item) {
            Outcome::Emit(item)
        } else {
            Outcome::Skip
        }
    }
}

/// A processor that delays every item by a fixed duration.
pub struct DelayProcessor<T> {
    delay: Duration,
    _phantom: PhantomData<fn(T)>,
}

impl<T> DelayProcessor<T> {
    /// Create a new delay processor
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Send + 'static> Processor for DelayProcessor<T> {
    type Input = T;
    type Output = T;

    async fn process(&self, item: Self::Input) -> Outcome<Self::Output> {
        sleep(self.delay).await;
        Outcome::Emit(item)
    }
}

/// A processor that passes items through unchanged
pub struct NoOpProcessor<T> {
    _phantom: PhantomData<fn(T)>,
}

impl<T> NoOpProcessor<T> {
    /// Create a new no-op processor
    pub fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Send + 'static> Processor for NoOpProcessor<T> {
    type Input = T;
    type Output = T;

    async fn process(&self, item: Self::Input) -> Outcome<Self::Output> {
        Outcome::Emit(item)
    }
}

impl<T> Default for NoOpProcessor<T> {
    fn default() -> Self {
        Self::new()
    }
}
