//! Source implementations for the pipewright library.
//!
//! This module provides concrete sources that feed a pipeline's generator.
//! All of them yield items in a deterministic order for a given input.

use async_trait::async_trait;
use futures::StreamExt;
use futures_core::Stream;
use std::collections::VecDeque;
use std::ops::Range;
use std::pin::Pin;

use crate::core::Source;
use crate::error::Rejection;

/// A source that generates numbers from a range
pub struct RangeSource {
    range: Range<i64>,
}

impl RangeSource {
    /// Create a new range source
    pub fn new(range: Range<i64>) -> Self {
        Self { range }
    }
}

#[async_trait]
impl Source for RangeSource {
    type Item = i64;

    async fn produce(&mut self) -> Option<Result<Self::Item, Rejection>> {
        self.range.next().map(Ok)
    }
}

/// A source that yields items from a vector
pub struct VecSource<T> {
    items: VecDeque<T>,
}

impl<T> VecSource<T> {
    /// Create a new vector source
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: items.into(),
        }
    }

    /// Check if the source has more items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get the number of remaining items
    pub fn len(&self) -> usize {
        self.items.len()
    }
}

#[async_trait]
impl<T: Send + 'static> Source for VecSource<T> {
    type Item = T;

    async fn produce(&mut self) -> Option<Result<Self::Item, Rejection>> {
        self.items.pop_front().map(Ok)
    }
}

/// A source that drains any iterator, including endless ones
pub struct IterSource<I> {
    iter: I,
}

impl<I: Iterator> IterSource<I> {
    pub fn new<C: IntoIterator<IntoIter = I>>(items: C) -> Self {
        Self {
            iter: items.into_iter(),
        }
    }
}

#[async_trait]
impl<I> Source for IterSource<I>
where
    I: Iterator + Send,
    I::Item: Send + 'static,
{
    type Item = I::Item;

    async fn produce(&mut self) -> Option<Result<Self::Item, Rejection>> {
        self.iter.next().map(Ok)
    }
}

/// A source over an iterator of results.
///
/// `Err` entries are reported on the generator's error channel and the
/// iteration carries on, which is how a traversal skips unreadable entries.
pub struct TryIterSource<I> {
    iter: I,
}

impl<I> TryIterSource<I> {
    pub fn new<C, T, E>(items: C) -> Self
    where
        C: IntoIterator<IntoIter = I>,
        I: Iterator<Item = Result<T, E>>,
    {
        Self {
            iter: items.into_iter(),
        }
    }
}

#[async_trait]
impl<I, T, E> Source for TryIterSource<I>
where
    I: Iterator<Item = Result<T, E>> + Send,
    T: Send + 'static,
    E: Into<Rejection>,
{
    type Item = T;

    async fn produce(&mut self) -> Option<Result<Self::Item, Rejection>> {
        self.iter.next().map(|entry| entry.map_err(Into::into))
    }
}

/// A source that pulls from any stream
pub struct StreamSource<T> {
    stream: Pin<Box<dyn Stream<Item = T> + Send>>,
}

impl<T> StreamSource<T> {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = T> + Send + 'static,
    {
        Self {
            stream: Box::pin(stream),
        }
    }
}

#[async_trait]
impl<T: Send + 'static> Source for StreamSource<T> {
    type Item = T;

    async fn produce(&mut self) -> Option<Result<Self::Item, Rejection>> {
        self.stream.next().await.map(Ok)
    }
}
