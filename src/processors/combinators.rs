//! Combinators for composing processors inside a single stage.

use async_trait::async_trait;

use crate::core::{Outcome, Processor};

/// Runs `first`, then feeds whatever it emits into `second`.
///
/// Skips and rejections from `first` short-circuit.
pub struct Then<A, B> {
    first: A,
    second: B,
}

#[async_trait]
impl<A, B> Processor for Then<A, B>
where
    A: Processor,
    B: Processor<Input = A::Output>,
{
    type Input = A::Input;
    type Output = B::Output;

    async fn process(&self, item: Self::Input) -> Outcome<Self::Output> {
        match self.first.process(item).await {
            Outcome::Emit(value) => self.second.process(value).await,
            Outcome::Skip => Outcome::Skip,
            Outcome::Reject(rejection) => Outcome::Reject(rejection),
        }
    }
}

/// Extension trait for composing processors
pub trait ProcessorExt: Processor + Sized {
    /// Chain another processor after this one
    fn then<B>(self, next: B) -> Then<Self, B>
    where
        B: Processor<Input = Self::Output>,
    {
        Then {
            first: self,
            second: next,
        }
    }
}

impl<P: Processor> ProcessorExt for P {}
