//! Pipeline Composer
//!
//! Chains a [`Source`] and any number of [`Stage`]s into one ordered flow.
//! Every link is a bounded channel, so a slow consumer throttles every
//! upstream stage. All stages report on one merged fault stream, returned
//! by [`Pipeline::build`].
//!
//! ```text
//! source ──► stage 1 ──► stage 2 ──► ... ──► stage n ──► (drained)
//!    │          │           │                   │
//!    └──────────┴───────────┴─────── faults ────┴──► caller
//! ```
//!
//! Shutdown is driven by channel closure: the source stops on
//! cancellation and drops its output, each stage finishes once its input
//! is closed, and the fault stream closes after the last stage exits. A
//! fatal fault cancels the shared token, which starts the same cascade.

mod consumer;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub use consumer::{Consumer, ConsumerStage};

use crate::domain::FeedEvent;
use crate::error::{Fault, Severity};
use crate::infrastructure::metrics;

/// Default capacity of the links between stages.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Receiving end of the merged fault stream.
pub type FaultStream = mpsc::UnboundedReceiver<Fault>;

/// Handle for reporting faults.
///
/// Fatal faults cancel the pipeline.
#[derive(Debug, Clone)]
pub struct FaultSink {
    tx: mpsc::UnboundedSender<Fault>,
    cancel: CancellationToken,
}

impl FaultSink {
    /// Create a sink and its stream.
    #[must_use]
    pub fn new(cancel: CancellationToken) -> (Self, FaultStream) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, cancel }, rx)
    }

    /// Report a fault.
    pub fn report(&self, fault: Fault) {
        metrics::record_fault(fault.severity);
        match fault.severity {
            Severity::Advisory => {
                tracing::warn!(stage = fault.stage, error = %fault.error, "Pipeline fault");
            }
            Severity::Fatal => {
                tracing::error!(stage = fault.stage, error = %fault.error, "Fatal pipeline fault");
                self.cancel.cancel();
            }
        }
        let _ = self.tx.send(fault);
    }

    /// Pipeline cancellation token.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// Start of the pipeline.
#[async_trait]
pub trait Source: Send + 'static {
    /// Name used in faults and logs.
    fn name(&self) -> &'static str;

    /// Produce events until `cancel` fires or `output` is closed.
    async fn run(
        self: Box<Self>,
        output: mpsc::Sender<FeedEvent>,
        faults: FaultSink,
        cancel: CancellationToken,
    );
}

/// Transform over the event stream.
///
/// A stage must forward events in arrival order and return once `input`
/// is closed.
#[async_trait]
pub trait Stage: Send + 'static {
    /// Name used in faults and logs.
    fn name(&self) -> &'static str;

    /// Capacity of the link feeding this stage, when it differs from the
    /// pipeline default.
    fn buffer(&self) -> Option<usize> {
        None
    }

    /// Process `input` into `output`.
    async fn run(
        self: Box<Self>,
        input: mpsc::Receiver<FeedEvent>,
        output: mpsc::Sender<FeedEvent>,
        faults: FaultSink,
    );
}

/// Pipeline under construction.
pub struct Pipeline {
    source: Box<dyn Source>,
    stages: Vec<Box<dyn Stage>>,
    capacity: usize,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("source", &self.source.name())
            .field(
                "stages",
                &self.stages.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Start a pipeline from a source.
    #[must_use]
    pub fn new(source: impl Source, cancel: CancellationToken) -> Self {
        Self {
            source: Box::new(source),
            stages: Vec::new(),
            capacity: DEFAULT_CAPACITY,
            cancel,
        }
    }

    /// Default capacity of the links; zero is raised to one.
    #[must_use]
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Append a stage.
    #[must_use]
    pub fn stage(mut self, stage: impl Stage) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Append a boxed stage.
    #[must_use]
    pub fn boxed_stage(mut self, stage: Box<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Spawn every stage and return the merged fault stream.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn build(self) -> FaultStream {
        build(self.source, self.stages, self.capacity, self.cancel)
    }
}

/// Wire `source` through `stages` and spawn them.
///
/// Each link has the capacity its receiving stage asks for, or `capacity`.
/// The output of the last stage is drained. The returned stream closes
/// once every stage has exited.
#[must_use]
pub fn build(
    source: Box<dyn Source>,
    stages: Vec<Box<dyn Stage>>,
    capacity: usize,
    cancel: CancellationToken,
) -> FaultStream {
    let link = |buffer: Option<usize>| buffer.unwrap_or(capacity).max(1);
    let (sink, faults) = FaultSink::new(cancel.clone());
    let mut stages = stages.into_iter().peekable();

    let (tx, mut rx) = mpsc::channel(link(stages.peek().and_then(|s| s.buffer())));
    tracing::debug!(stage = source.name(), "Starting pipeline source");
    tokio::spawn(source.run(tx, sink.clone(), cancel));

    while let Some(stage) = stages.next() {
        let (tx, next_rx) = mpsc::channel(link(stages.peek().and_then(|s| s.buffer())));
        tracing::debug!(stage = stage.name(), buffer = ?stage.buffer(), "Starting pipeline stage");
        tokio::spawn(stage.run(rx, tx, sink.clone()));
        rx = next_rx;
    }

    tokio::spawn(async move { while rx.recv().await.is_some() {} });

    faults
}
