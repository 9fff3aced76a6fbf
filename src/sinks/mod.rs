//! Sink implementations for the pipewright library.
//!
//! A sink owns its accumulator outright and hands it back from
//! [`Sink::finish`], so none of these need shared state.

use async_trait::async_trait;
use std::marker::PhantomData;

use crate::core::Sink;

/// A sink that collects items into a vector.
pub struct CollectSink<T> {
    items: Vec<T>,
}

impl<T> CollectSink<T> {
    /// Create a new collect sink
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }
}

#[async_trait]
impl<T: Send + 'static> Sink for CollectSink<T> {
    type Item = T;
    type Output = Vec<T>;

    async fn write(&mut self, item: Self::Item) {
        self.items.push(item);
    }

    async fn finish(self) -> Self::Output {
        self.items
    }
}

impl<T> Default for CollectSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A sink that counts items
pub struct CountSink<T> {
    count: usize,
    _phantom: PhantomData<fn(T)>,
}

impl<T> CountSink<T> {
    /// Create a new count sink
    pub fn new() -> Self {
        Self {
            count: 0,
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Send + 'static> Sink for CountSink<T> {
    type Item = T;
    type Output = usize;

    async fn write(&mut self, _item: Self::Item) {
        self.count += 1;
    }

    async fn finish(self) -> Self::Output {
        self.count
    }
}

impl<T> Default for CountSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A sink that folds items into an accumulator.
pub struct FoldSink<A, F, T> {
    acc: Option<A>,
    f: F,
    _phantom: PhantomData<fn(T)>,
}

impl<A, F, T> FoldSink<A, F, T>
where
    F: FnMut(A, T) -> A,
{
    /// Create a fold sink starting from `initial`
    pub fn new(initial: A, f: F) -> Self {
        Self {
            acc: Some(initial),
            f,
            _phantom: PhantomData,
        }
    }
}

#[async_trait]
impl<A, F, T> Sink for FoldSink<A, F, T>
where
    A: Send + 'static,
    F: FnMut(A, T) -> A + Send,
    T: Send + 'static,
{
    type Item = T;
    type Output = A;

    async fn write(&mut self, item: Self::Item) {
        // `acc` is only ever `None` for the duration of this call.
        if let Some(acc) = self.acc.take() {
            self.acc = Some((self.f)(acc, item));
        }
    }

    async fn finish(self) -> Self::Output {
        match self.acc {
            Some(acc) => acc,
            None => unreachable!("fold accumulator is restored after every write"),
        }
    }
}
