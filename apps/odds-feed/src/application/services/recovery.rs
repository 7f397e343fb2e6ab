//! Recovery Coordinator
//!
//! Pipeline stage that, at startup, asks the API to replay what the
//! client missed: one request per producer watermark. A watermark with a
//! positive timestamp asks for everything after it; anything else asks
//! for a full recovery.
//!
//! Requests are fired in the background and never hold up the stream.
//! Completion arrives later as a `snapshot_complete` feed event carrying
//! the request id, which this stage correlates against its request table
//! before passing the event on.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::Instrument;

use crate::application::pipeline::{FaultSink, Stage};
use crate::application::ports::{ApiError, RecoveryPort};
use crate::domain::{FeedEvent, MessageKind, Producer, ProducerChange};
use crate::error::{Fault, FeedError};
use crate::infrastructure::{metrics, telemetry};

/// Stage name.
const STAGE: &str = "recovery";

/// Default lifetime of an unanswered request.
pub const DEFAULT_REQUEST_TTL: Duration = Duration::from_secs(3600);

// =============================================================================
// Request IDs
// =============================================================================

/// Monotonic request id generator.
///
/// Seeded from the Unix time in seconds so ids are not reused across
/// restarts.
#[derive(Debug)]
pub struct RequestIds(AtomicI64);

impl RequestIds {
    /// Generator starting at `first`.
    #[must_use]
    pub const fn starting_at(first: i64) -> Self {
        Self(AtomicI64::new(first))
    }

    /// Generator seeded from the current time.
    #[must_use]
    pub fn seeded() -> Self {
        Self::starting_at(chrono::Utc::now().timestamp())
    }

    /// Next id.
    pub fn next_id(&self) -> i64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

// =============================================================================
// Coordinator
// =============================================================================

/// What a request asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryKind {
    /// Everything currently valid.
    Full,
    /// Everything after a timestamp (ms).
    Since(i64),
}

impl RecoveryKind {
    /// Kind requested for a watermark.
    #[must_use]
    pub const fn for_timestamp(timestamp: i64) -> Self {
        if timestamp > 0 {
            Self::Since(timestamp)
        } else {
            Self::Full
        }
    }
}

#[derive(Debug)]
struct Pending {
    producer: Producer,
    kind: RecoveryKind,
    issued_at: Instant,
}

type Submission = (i64, Result<(), ApiError>);

/// Stage issuing startup recovery and tracking its completion.
pub struct RecoveryCoordinator {
    port: Arc<dyn RecoveryPort>,
    changes: Vec<ProducerChange>,
    ids: Arc<RequestIds>,
    pending: HashMap<i64, Pending>,
    ttl: Duration,
}

impl std::fmt::Debug for RecoveryCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryCoordinator")
            .field("changes", &self.changes)
            .field("pending", &self.pending.len())
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl RecoveryCoordinator {
    /// Coordinator for the given watermarks.
    #[must_use]
    pub fn new(
        port: Arc<dyn RecoveryPort>,
        changes: Vec<ProducerChange>,
        ids: Arc<RequestIds>,
    ) -> Self {
        Self {
            port,
            changes,
            ids,
            pending: HashMap::new(),
            ttl: DEFAULT_REQUEST_TTL,
        }
    }

    /// Override how long an unanswered request is tracked.
    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Fire one request per watermark. Results arrive on the returned
    /// channel.
    fn submit_all(&mut self) -> mpsc::UnboundedReceiver<Submission> {
        let (tx, rx) = mpsc::unbounded_channel();
        for change in std::mem::take(&mut self.changes) {
            let request_id = self.ids.next_id();
            let kind = RecoveryKind::for_timestamp(change.timestamp);
            tracing::info!(
                producer = %change.producer,
                request_id,
                kind = ?kind,
                "Requesting recovery"
            );
            self.pending.insert(
                request_id,
                Pending {
                    producer: change.producer,
                    kind,
                    issued_at: Instant::now(),
                },
            );

            let port = Arc::clone(&self.port);
            let tx = tx.clone();
            let span =
                telemetry::recovery_span(change.producer, request_id, kind == RecoveryKind::Full);
            tokio::spawn(
                async move {
                    let result = port
                        .request_recovery(change.producer, change.timestamp, request_id)
                        .await;
                    let _ = tx.send((request_id, result));
                }
                .instrument(span),
            );
        }
        rx
    }

    fn on_submitted(&mut self, request_id: i64, result: Result<(), ApiError>, faults: &FaultSink) {
        metrics::record_recovery_request(result.is_ok());
        match result {
            Ok(()) => tracing::info!(request_id, "Recovery request accepted"),
            Err(source) => {
                let Some(pending) = self.pending.remove(&request_id) else {
                    return;
                };
                faults.report(Fault::advisory(
                    STAGE,
                    FeedError::Recovery {
                        producer: pending.producer,
                        source,
                    },
                ));
            }
        }
    }

    fn observe(&mut self, event: &FeedEvent) {
        if event.kind() == MessageKind::SnapshotComplete
            && let Some(request_id) = event.request_id()
            && let Some(pending) = self.pending.remove(&request_id)
        {
            tracing::info!(
                producer = %pending.producer,
                request_id,
                kind = ?pending.kind,
                elapsed_ms = u64::try_from(pending.issued_at.elapsed().as_millis()).unwrap_or(u64::MAX),
                "Recovery complete"
            );
        }
        self.expire();
    }

    fn expire(&mut self) {
        let ttl = self.ttl;
        self.pending.retain(|request_id, pending| {
            let alive = pending.issued_at.elapsed() < ttl;
            if !alive {
                tracing::warn!(
                    producer = %pending.producer,
                    request_id,
                    "Recovery not confirmed in time, no longer tracked"
                );
            }
            alive
        });
    }

    /// Requests still awaiting `snapshot_complete`.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[async_trait]
impl Stage for RecoveryCoordinator {
    fn name(&self) -> &'static str {
        STAGE
    }

    async fn run(
        self: Box<Self>,
        mut input: mpsc::Receiver<FeedEvent>,
        output: mpsc::Sender<FeedEvent>,
        faults: FaultSink,
    ) {
        let mut this = *self;
        let mut submissions = this.submit_all();

        loop {
            tokio::select! {
                biased;
                Some((request_id, result)) = submissions.recv() => {
                    this.on_submitted(request_id, result, &faults);
                }
                next = input.recv() => {
                    let Some(event) = next else { break };
                    this.observe(&event);
                    if output.send(event).await.is_err() {
                        tracing::debug!(stage = STAGE, "Downstream closed, draining input");
                        while input.recv().await.is_some() {}
                        break;
                    }
                }
            }
        }
        tracing::debug!(pending = this.pending(), "Recovery coordinator finished");
    }
}

#[cfg(test)]
mod tests {
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::application::ports::MockRecoveryPort;
    use crate::domain::{EventHeader, Priority, Scope};
    use crate::error::Severity;

    fn snapshot_complete(producer: u16, request_id: i64) -> FeedEvent {
        let header = EventHeader {
            kind: MessageKind::SnapshotComplete,
            priority: Priority::None,
            scope: Scope::System,
            producer: Producer(producer),
            event_urn: None,
            sport_id: None,
            node_id: None,
            timestamp: 1,
            request_id: Some(request_id),
        };
        FeedEvent::new(header, Vec::new(), "-.-.-.snapshot_complete.-.-.-.-", Vec::new())
    }

    #[test]
    fn watermark_selects_kind() {
        assert_eq!(RecoveryKind::for_timestamp(0), RecoveryKind::Full);
        assert_eq!(RecoveryKind::for_timestamp(-5), RecoveryKind::Full);
        assert_eq!(RecoveryKind::for_timestamp(1000), RecoveryKind::Since(1000));
    }

    #[test]
    fn request_ids_increase() {
        let ids = RequestIds::starting_at(10);
        assert_eq!(ids.next_id(), 10);
        assert_eq!(ids.next_id(), 11);
        assert!(RequestIds::seeded().next_id() > 1_600_000_000);
    }

    #[tokio::test]
    async fn one_request_per_producer_and_completion_clears_table() {
        let mut port = MockRecoveryPort::new();
        port.expect_request_recovery()
            .withf(|p, ts, id| *p == Producer(1) && *ts == 1000 && *id == 100)
            .times(1)
            .returning(|_, _, _| Ok(()));
        port.expect_request_recovery()
            .withf(|p, ts, id| *p == Producer(3) && *ts == 0 && *id == 101)
            .times(1)
            .returning(|_, _, _| Ok(()));

        let coordinator = RecoveryCoordinator::new(
            Arc::new(port),
            vec![
                ProducerChange::new(Producer(1), 1000),
                ProducerChange::new(Producer(3), 0),
            ],
            Arc::new(RequestIds::starting_at(100)),
        );

        let (in_tx, in_rx) = mpsc::channel(4);
        let (out_tx, mut out_rx) = mpsc::channel(4);
        let (sink, mut faults) = FaultSink::new(CancellationToken::new());
        let handle = tokio::spawn(Box::new(coordinator).run(in_rx, out_tx, sink));

        in_tx.send(snapshot_complete(1, 100)).await.unwrap();
        in_tx.send(snapshot_complete(3, 101)).await.unwrap();
        assert_eq!(out_rx.recv().await.unwrap().request_id(), Some(100));
        assert_eq!(out_rx.recv().await.unwrap().request_id(), Some(101));

        drop(in_tx);
        handle.await.unwrap();
        assert!(faults.try_recv().is_err());
    }

    #[tokio::test]
    async fn failed_submission_is_advisory() {
        let mut port = MockRecoveryPort::new();
        port.expect_request_recovery().times(1).returning(|_, _, _| {
            Err(ApiError::Status {
                url: "http://api/v1/1/recovery/initiate_request".into(),
                status: 403,
                body: "forbidden".into(),
            })
        });

        let cancel = CancellationToken::new();
        let coordinator = RecoveryCoordinator::new(
            Arc::new(port),
            vec![ProducerChange::new(Producer(1), 5)],
            Arc::new(RequestIds::starting_at(1)),
        );

        let (in_tx, in_rx) = mpsc::channel(4);
        let (out_tx, mut out_rx) = mpsc::channel(4);
        let (sink, mut faults) = FaultSink::new(cancel.clone());
        let _handle = tokio::spawn(Box::new(coordinator).run(in_rx, out_tx, sink));

        let fault = faults.recv().await.unwrap();
        assert_eq!(fault.severity, Severity::Advisory);
        assert_eq!(fault.stage, "recovery");
        assert!(matches!(
            fault.error,
            FeedError::Recovery { producer: Producer(1), ref source } if source.status() == Some(403)
        ));
        assert!(!cancel.is_cancelled());

        in_tx.send(snapshot_complete(1, 1)).await.unwrap();
        assert!(out_rx.recv().await.is_some());
    }

    #[test]
    fn stale_requests_expire() {
        let mut coordinator = RecoveryCoordinator::new(
            Arc::new(MockRecoveryPort::new()),
            Vec::new(),
            Arc::new(RequestIds::starting_at(1)),
        )
        .with_ttl(Duration::ZERO);
        coordinator.pending.insert(
            7,
            Pending {
                producer: Producer(1),
                kind: RecoveryKind::Full,
                issued_at: Instant::now(),
            },
        );
        coordinator.observe(&snapshot_complete(1, 99));
        assert_eq!(coordinator.pending(), 0);
    }
}
