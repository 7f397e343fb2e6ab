//! Terminal Consumers
//!
//! Application callbacks at the end of the pipeline. A consumer error is
//! the only fatal fault: it cancels the pipeline, after which the stage
//! keeps draining its input so upstream stages can exit.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{FaultSink, Stage};
use crate::domain::FeedEvent;
use crate::error::{Fault, FeedError};

/// Application callback receiving every event in order.
#[async_trait]
pub trait Consumer: Send + 'static {
    /// Handle one event.
    async fn consume(&mut self, event: &FeedEvent) -> anyhow::Result<()>;
}

#[async_trait]
impl<F> Consumer for F
where
    F: FnMut(&FeedEvent) -> anyhow::Result<()> + Send + 'static,
{
    async fn consume(&mut self, event: &FeedEvent) -> anyhow::Result<()> {
        self(event)
    }
}

/// Stage running a consumer and forwarding events unchanged.
pub struct ConsumerStage<C> {
    name: &'static str,
    consumer: C,
    buffer: Option<usize>,
}

impl<C: Consumer> ConsumerStage<C> {
    /// Wrap a consumer.
    #[must_use]
    pub const fn new(name: &'static str, consumer: C) -> Self {
        Self {
            name,
            consumer,
            buffer: None,
        }
    }

    /// Give the consumer its own input buffer of `size` events, so a
    /// burst can queue up in front of it without holding up the stages
    /// upstream.
    #[must_use]
    pub const fn buffered(mut self, size: usize) -> Self {
        self.buffer = Some(size);
        self
    }
}

#[async_trait]
impl<C: Consumer> Stage for ConsumerStage<C> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn buffer(&self) -> Option<usize> {
        self.buffer
    }

    async fn run(
        self: Box<Self>,
        mut input: mpsc::Receiver<FeedEvent>,
        output: mpsc::Sender<FeedEvent>,
        faults: FaultSink,
    ) {
        let Self { name, mut consumer, .. } = *self;
        while let Some(event) = input.recv().await {
            if let Err(e) = consumer.consume(&event).await {
                faults.report(Fault::fatal(name, FeedError::Consumer(e)));
                drop(output);
                while input.recv().await.is_some() {}
                return;
            }
            let _ = output.send(event).await;
        }
        tracing::debug!(stage = name, "Consumer finished");
    }
}
