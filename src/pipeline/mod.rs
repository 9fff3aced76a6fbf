//! Pipeline composition and execution.
//!
//! A [`Pipeline`] is a description: a source, a chain of stages, optional
//! fan-out/fan-in segments. Nothing runs until [`Pipeline::spawn`] or
//! [`Pipeline::run`] hands it a sink. At that point every component gets its
//! own task, wired to its neighbours by channels built from the pipeline's
//! [`PipelineConfig`], and all of them share one cancellation token.
//!
//! ```rust
//! use pipewright::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> pipewright::Result<()> {
//! let report = Pipeline::source("numbers", RangeSource::new(0..10))
//!     .stage("square", MapProcessor::new(|x: i64| x * x))
//!     .parallel("odd", 3, FilterProcessor::new(|x: &i64| x % 2 == 1))
//!     .run(CountSink::new())
//!     .await?;
//!
//! assert_eq!(report.output, 5);
//! assert_eq!(report.state, PipelineState::Completed);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod generator;
pub mod merger;
pub mod sink;
pub mod splitter;
pub mod stage;
pub mod task;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::{ChannelRx, Processor, Sink, Source};
use crate::error::{Error, Result, StageError};

pub use config::PipelineConfig;
pub use generator::{spawn_source, SourceHandle};
pub use merger::{merge, merge_with, MergeHandle};
pub use sink::{drain, fold};
pub use splitter::{split, SplitHandle};
pub use stage::{spawn_stage, StageHandle};
pub use task::{ComponentKind, ComponentTask, StageStats};

use task::{join_component, spawn_component};

/// Lifecycle of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PipelineState {
    /// Built but not started
    Idle,
    Running,
    /// Every component drained its input and exited
    Completed,
    /// At least one component stopped because of a cancellation request
    Cancelled,
    /// A component failed outright (panic, wiring fault, join failure)
    Failed,
}

impl PipelineState {
    /// Whether the run is over
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

/// Everything a launch closure needs to spawn its components.
struct Assembly {
    config: PipelineConfig,
    cancel: CancellationToken,
    errors: Vec<ChannelRx<StageError>>,
    tasks: Vec<ComponentTask>,
}

impl Assembly {
    fn track(&mut self, errors: ChannelRx<StageError>, task: ComponentTask) {
        self.errors.push(errors);
        self.tasks.push(task);
    }
}

type Launch<T> = Box<dyn FnOnce(&mut Assembly) -> Result<ChannelRx<T>> + Send>;
type LaunchMany<T> = Box<dyn FnOnce(&mut Assembly) -> Result<Vec<ChannelRx<T>>> + Send>;

/// A linear pipeline whose current tail yields items of type `T`.
pub struct Pipeline<T> {
    launch: Launch<T>,
    config: PipelineConfig,
    cancel: CancellationToken,
    state: watch::Sender<PipelineState>,
}

impl<T: Send + 'static> Pipeline<T> {
    /// Start a pipeline whose generator pulls from `source`.
    pub fn source<S>(name: impl Into<Arc<str>>, source: S) -> Self
    where
        S: Source<Item = T> + 'static,
    {
        let name = name.into();
        Self::with_launch(Box::new(move |asm: &mut Assembly| {
            let handle = spawn_source(name, source, asm.cancel.clone(), &asm.config)?;
            asm.track(handle.errors, handle.task);
            Ok(handle.output)
        }))
    }

    /// Start a pipeline from a channel someone else is already writing to.
    ///
    /// The pipeline ends when every sender of `input` has been dropped.
    pub fn from_channel(input: ChannelRx<T>) -> Self {
        Self::with_launch(Box::new(move |_: &mut Assembly| Ok(input)))
    }

    fn with_launch(launch: Launch<T>) -> Self {
        let (state, _) = watch::channel(PipelineState::Idle);
        Self {
            launch,
            config: PipelineConfig::default(),
            cancel: CancellationToken::new(),
            state,
        }
    }

    /// Append a stage running `processor` on every item.
    pub fn stage<P>(self, name: impl Into<Arc<str>>, processor: P) -> Pipeline<P::Output>
    where
        P: Processor<Input = T> + 'static,
    {
        let name = name.into();
        let upstream = self.launch;
        let launch: Launch<P::Output> = Box::new(move |asm: &mut Assembly| {
            let input = upstream(asm)?;
            let handle = spawn_stage(name, input, processor, asm.cancel.clone(), &asm.config)?;
            asm.track(handle.errors, handle.task);
            Ok(handle.output)
        });
        Pipeline {
            launch,
            config: self.config,
            cancel: self.cancel,
            state: self.state,
        }
    }

    /// Fan the current tail out to `n` branches, round-robin.
    ///
    /// `n == 0` is reported as [`Error::InvalidConfig`] when the pipeline is
    /// spawned.
    pub fn split(self, n: usize) -> Fanned<T> {
        self.split_named("split", n)
    }

    fn split_named(self, name: impl Into<Arc<str>>, n: usize) -> Fanned<T> {
        let name = name.into();
        let upstream = self.launch;
        Fanned {
            launch: Box::new(move |asm: &mut Assembly| {
                let input = upstream(asm)?;
                let handle = split(name, input, n, asm.cancel.clone(), asm.config.capacity)?;
                asm.tasks.push(handle.task);
                Ok(handle.outputs)
            }),
            config: self.config,
            cancel: self.cancel,
            state: self.state,
        }
    }

    /// Run `processor` on `n` parallel branches and merge the results.
    ///
    /// Output order across branches is not preserved.
    pub fn parallel<P>(
        self,
        name: impl Into<Arc<str>>,
        n: usize,
        processor: P,
    ) -> Pipeline<P::Output>
    where
        P: Processor<Input = T> + 'static,
    {
        let name = name.into();
        self.split_named(format!("{name}.split"), n)
            .stage(name.clone(), processor)
            .merge_named(format!("{name}.merge"))
    }

    /// Capacity of every data channel
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.config = self.config.buffer_size(size);
        self
    }

    /// Make every data channel unbounded
    pub fn unbounded(mut self) -> Self {
        self.config = self.config.unbounded();
        self
    }

    /// Capacity of every error channel
    pub fn error_buffer_size(mut self, size: usize) -> Self {
        self.config = self.config.error_buffer_size(size);
        self
    }

    /// Reject any item whose transform runs longer than `timeout`
    pub fn item_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.item_timeout(timeout);
        self
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Token that cancels this pipeline's run once it is spawned.
    ///
    /// Cancelling before [`spawn`](Self::spawn) makes the run stop as soon as
    /// it starts.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Watch the pipeline's lifecycle state
    pub fn subscribe_state(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    /// Spawn every component and a sink task folding the output into `sink`.
    pub fn spawn<S>(self, sink: S) -> Result<RunningPipeline<S::Output>>
    where
        S: Sink<Item = T> + 'static,
    {
        let Pipeline {
            launch,
            config,
            cancel,
            state,
        } = self;
        if let Err(err) = config.validate() {
            state.send_replace(PipelineState::Failed);
            return Err(err);
        }

        let mut assembly = Assembly {
            config,
            cancel: cancel.clone(),
            errors: Vec::new(),
            tasks: Vec::new(),
        };
        let output = match launch(&mut assembly) {
            Ok(output) => output,
            Err(err) => {
                // Whatever did get spawned winds down on its own.
                cancel.cancel();
                state.send_replace(PipelineState::Failed);
                return Err(err);
            }
        };
        let Assembly { errors, tasks, .. } = assembly;

        state.send_replace(PipelineState::Running);
        log_info!(components = tasks.len(), "pipeline running");

        // Panics in the sink surface as `Error::Panicked { stage: "sink" }`.
        let sink = spawn_component(
            Arc::from("sink"),
            ComponentKind::Sink,
            cancel.clone(),
            drain(output, sink, errors),
        );

        Ok(RunningPipeline {
            sink,
            tasks,
            cancel,
            state,
        })
    }

    /// Spawn the pipeline and wait for it to finish.
    pub async fn run<S>(self, sink: S) -> Result<PipelineReport<S::Output>>
    where
        S: Sink<Item = T> + 'static,
    {
        self.spawn(sink)?.join().await
    }
}

/// A pipeline segment fanned out into parallel branches of type `T`.
pub struct Fanned<T> {
    launch: LaunchMany<T>,
    config: PipelineConfig,
    cancel: CancellationToken,
    state: watch::Sender<PipelineState>,
}

impl<T: Send + 'static> Fanned<T> {
    /// Append a stage to every branch.
    ///
    /// All branches share one `processor`; branch `i` is named `name[i]`.
    pub fn stage<P>(self, name: impl Into<Arc<str>>, processor: P) -> Fanned<P::Output>
    where
        P: Processor<Input = T> + 'static,
    {
        let name: Arc<str> = name.into();
        let processor = Arc::new(processor);
        let upstream = self.launch;
        Fanned {
            launch: Box::new(move |asm: &mut Assembly| {
                let inputs = upstream(asm)?;
                let mut outputs = Vec::with_capacity(inputs.len());
                for (i, input) in inputs.into_iter().enumerate() {
                    let handle = spawn_stage(
                        format!("{name}[{i}]"),
                        input,
                        processor.clone(),
                        asm.cancel.clone(),
                        &asm.config,
                    )?;
                    asm.track(handle.errors, handle.task);
                    outputs.push(handle.output);
                }
                Ok(outputs)
            }),
            config: self.config,
            cancel: self.cancel,
            state: self.state,
        }
    }

    /// Merge the branches back into one channel.
    pub fn merge(self) -> Pipeline<T> {
        self.merge_named("merge")
    }

    fn merge_named(self, name: impl Into<Arc<str>>) -> Pipeline<T> {
        let name = name.into();
        let upstream = self.launch;
        Pipeline {
            launch: Box::new(move |asm: &mut Assembly| {
                let inputs = upstream(asm)?;
                let handle = merge(name, inputs, asm.cancel.clone(), asm.config.capacity)?;
                asm.track(handle.errors, handle.task);
                Ok(handle.output)
            }),
            config: self.config,
            cancel: self.cancel,
            state: self.state,
        }
    }

    /// Merge the branches, running `processor` on each item as it arrives.
    pub fn merge_with<P>(self, name: impl Into<Arc<str>>, processor: P) -> Pipeline<P::Output>
    where
        P: Processor<Input = T> + 'static,
    {
        let name = name.into();
        let upstream = self.launch;
        Pipeline {
            launch: Box::new(move |asm: &mut Assembly| {
                let inputs = upstream(asm)?;
                let handle =
                    merge_with(name, inputs, processor, asm.cancel.clone(), &asm.config)?;
                asm.track(handle.errors, handle.task);
                Ok(handle.output)
            }),
            config: self.config,
            cancel: self.cancel,
            state: self.state,
        }
    }
}

/// A spawned pipeline.
///
/// Dropping this does not stop the run; call [`cancel`](Self::cancel) for
/// that.
pub struct RunningPipeline<O> {
    sink: JoinHandle<Result<(O, Vec<StageError>)>>,
    tasks: Vec<ComponentTask>,
    cancel: CancellationToken,
    state: watch::Sender<PipelineState>,
}

impl<O: Send + 'static> RunningPipeline<O> {
    /// Ask every component to stop.
    ///
    /// Items already written downstream still reach the sink; items a stage
    /// was holding when it noticed the request are dropped.
    pub fn cancel(&self) {
        log_info!("pipeline cancellation requested");
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Current lifecycle state
    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    /// Wait for every component and the sink to finish.
    ///
    /// When several components fail, the first panic wins over other errors,
    /// and any error wins over [`Error::ChannelClosed`], which is usually a
    /// symptom of a failure further downstream.
    pub async fn join(self) -> Result<PipelineReport<O>> {
        let RunningPipeline {
            sink,
            tasks,
            cancel: _,
            state,
        } = self;

        let mut failures = Vec::new();
        let drained = match sink.await {
            Ok(Ok(drained)) => Some(drained),
            Ok(Err(err)) => {
                failures.push(err);
                None
            }
            Err(err) => {
                failures.push(Error::from(err));
                None
            }
        };

        let mut stats = Vec::with_capacity(tasks.len());
        for task in tasks {
            match join_component(task).await {
                Ok(component) => stats.push(component),
                Err(err) => failures.push(err),
            }
        }

        let (output, errors) = match (drained, root_cause(failures)) {
            (Some(drained), None) => drained,
            (_, Some(err)) => {
                log_warn!(error = %err, "pipeline failed");
                state.send_replace(PipelineState::Failed);
                return Err(err);
            }
            (None, None) => {
                state.send_replace(PipelineState::Failed);
                return Err(Error::custom("sink finished without a result"));
            }
        };

        let final_state = if stats.iter().any(|component| component.cancelled) {
            PipelineState::Cancelled
        } else {
            PipelineState::Completed
        };
        state.send_replace(final_state);
        log_info!(state = ?final_state, errors = errors.len(), "pipeline finished");

        Ok(PipelineReport {
            output,
            errors,
            state: final_state,
            stats,
        })
    }
}

fn root_cause(mut failures: Vec<Error>) -> Option<Error> {
    failures.sort_by_key(|err| match err {
        Error::Panicked { .. } => 0,
        Error::ChannelClosed { .. } => 2,
        _ => 1,
    });
    failures.into_iter().next()
}

/// What a finished run produced.
#[derive(Debug)]
pub struct PipelineReport<O> {
    /// The sink's result
    pub output: O,
    /// Every error record, in the order the sink received them
    pub errors: Vec<StageError>,
    pub state: PipelineState,
    /// One entry per generator, stage, splitter and merger
    pub stats: Vec<StageStats>,
}

impl<O> PipelineReport<O> {
    pub fn is_cancelled(&self) -> bool {
        self.state == PipelineState::Cancelled
    }

    /// Stats of the component called `name`
    pub fn stats_for(&self, name: &str) -> Option<&StageStats> {
        self.stats.iter().find(|stats| stats.name == name)
    }

    /// Error records raised by component `name`
    pub fn errors_from<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a StageError> + 'a {
        self.errors.iter().filter(move |err| err.stage == name)
    }
}
