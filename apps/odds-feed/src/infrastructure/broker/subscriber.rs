//! Resilient Subscriber
//!
//! Pipeline source that keeps a broker subscription alive. Deliveries are
//! decoded and forwarded in arrival order; undecodable deliveries are
//! dropped with an advisory fault. When the link is lost the subscriber
//! reports it, redials with capped exponential backoff and resumes on a
//! fresh queue. Messages published while disconnected are not replayed
//! here; that is what producer recovery is for.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::codec;
use super::connection::{Connection, Dialer};
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::application::pipeline::{FaultSink, Source};
use crate::domain::FeedEvent;
use crate::error::{Fault, FeedError};
use crate::infrastructure::metrics;

/// Stage name used for link faults.
const STAGE: &str = "subscriber";

/// Stage name used for decode faults.
const DECODER: &str = "decoder";

/// How a connection stopped serving.
enum Drained {
    /// Cancelled or downstream closed.
    Stopped,
    /// Link lost with the given reason.
    Lost(String),
}

/// Source that decodes broker deliveries and survives link loss.
pub struct ResilientSubscriber<D> {
    dialer: D,
    policy: ReconnectPolicy,
    connection: Option<Connection>,
}

impl<D: Dialer> ResilientSubscriber<D> {
    /// Subscriber that dials on start.
    #[must_use]
    pub const fn new(dialer: D, reconnect: ReconnectConfig) -> Self {
        Self {
            dialer,
            policy: ReconnectPolicy::new(reconnect),
            connection: None,
        }
    }

    /// Start from an already established connection.
    #[must_use]
    pub fn with_connection(mut self, connection: Connection) -> Self {
        self.connection = Some(connection);
        self
    }

    /// Decode and forward deliveries until the link drops or the pipeline
    /// stops.
    async fn drain(
        connection: &mut Connection,
        output: &mpsc::Sender<FeedEvent>,
        faults: &FaultSink,
        cancel: &CancellationToken,
    ) -> Drained {
        let (deliveries, link_faults) = connection.streams();
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Drained::Stopped,
                next = deliveries.recv() => {
                    let Some(raw) = next else {
                        let reason = link_faults
                            .try_recv()
                            .unwrap_or_else(|_| "delivery stream closed".to_string());
                        return Drained::Lost(reason);
                    };
                    match codec::decode(&raw.routing_key, &raw.body) {
                        Ok(event) => {
                            metrics::record_message_received(event.kind());
                            tokio::select! {
                                () = cancel.cancelled() => return Drained::Stopped,
                                sent = output.send(event) => if sent.is_err() {
                                    return Drained::Stopped;
                                },
                            }
                        }
                        Err(source) => {
                            metrics::record_decode_error();
                            faults.report(Fault::advisory(
                                DECODER,
                                FeedError::Decode {
                                    routing_key: raw.routing_key,
                                    source,
                                },
                            ));
                        }
                    }
                }
                Some(reason) = link_faults.recv() => return Drained::Lost(reason),
            }
        }
    }

    /// Redial until a connection is established. `None` when cancelled.
    async fn redial(&mut self, faults: &FaultSink, cancel: &CancellationToken) -> Option<Connection> {
        loop {
            let delay = self.policy.next_delay();
            metrics::record_reconnect();
            tracing::info!(
                attempt = self.policy.attempt_count(),
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Reconnecting to feed broker"
            );

            tokio::select! {
                () = cancel.cancelled() => return None,
                () = tokio::time::sleep(delay) => {}
            }

            let attempt = tokio::select! {
                () = cancel.cancelled() => return None,
                attempt = self.dialer.dial(cancel.child_token()) => attempt,
            };
            match attempt {
                Ok(connection) => {
                    tracing::info!(
                        attempts = self.policy.attempt_count(),
                        "Reconnected to feed broker"
                    );
                    self.policy.reset();
                    return Some(connection);
                }
                Err(e) => faults.report(Fault::advisory(STAGE, e)),
            }
        }
    }
}

#[async_trait]
impl<D: Dialer + 'static> Source for ResilientSubscriber<D> {
    fn name(&self) -> &'static str {
        STAGE
    }

    async fn run(
        self: Box<Self>,
        output: mpsc::Sender<FeedEvent>,
        faults: FaultSink,
        cancel: CancellationToken,
    ) {
        let mut this = *self;
        loop {
            let connection = match this.connection.take() {
                Some(connection) => Some(connection),
                None => this.redial(&faults, &cancel).await,
            };
            let Some(mut connection) = connection else {
                break;
            };

            match Self::drain(&mut connection, &output, &faults, &cancel).await {
                Drained::Stopped => break,
                Drained::Lost(reason) => {
                    faults.report(Fault::advisory(STAGE, FeedError::ConnectionLost(reason)));
                }
            }
        }
        tracing::info!("Feed subscriber stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::error::Severity;
    use crate::infrastructure::broker::connection::{DialError, DialStage, RawDelivery};

    enum Script {
        Fail(&'static str),
        Serve {
            deliveries: Vec<RawDelivery>,
            lost: Option<&'static str>,
        },
    }

    #[derive(Clone)]
    struct ScriptedDialer {
        script: Arc<Mutex<VecDeque<Script>>>,
        dials: Arc<Mutex<usize>>,
    }

    impl ScriptedDialer {
        fn new(script: Vec<Script>) -> Self {
            Self {
                script: Arc::new(Mutex::new(script.into())),
                dials: Arc::new(Mutex::new(0)),
            }
        }
    }

    fn serve(
        deliveries: Vec<RawDelivery>,
        lost: Option<&'static str>,
        close: CancellationToken,
    ) -> Connection {
        let (dtx, drx) = mpsc::channel(deliveries.len().max(1));
        let (ftx, frx) = mpsc::channel(1);
        let token = close.clone();
        tokio::spawn(async move {
            for raw in deliveries {
                let _ = dtx.send(raw).await;
            }
            match lost {
                Some(reason) => {
                    let _ = ftx.send(reason.to_string()).await;
                }
                None => token.cancelled().await,
            }
        });
        Connection::new(drx, frx, close)
    }

    #[async_trait]
    impl Dialer for ScriptedDialer {
        async fn dial(&self, close: CancellationToken) -> Result<Connection, DialError> {
            *self.dials.lock() += 1;
            let next = self.script.lock().pop_front();
            match next {
                Some(Script::Fail(message)) => Err(DialError::new(DialStage::Connect, message)),
                Some(Script::Serve { deliveries, lost }) => Ok(serve(deliveries, lost, close)),
                None => Err(DialError::new(DialStage::Connect, "script exhausted")),
            }
        }
    }

    fn alive(ts: i64) -> RawDelivery {
        RawDelivery {
            routing_key: "-.-.-.alive.-.-.-.-".to_string(),
            body: format!(r#"<alive product="1" timestamp="{ts}" subscribed="1"/>"#).into_bytes(),
        }
    }

    fn collect_faults(rx: &mut mpsc::UnboundedReceiver<Fault>) -> Vec<Fault> {
        let mut out = Vec::new();
        while let Ok(f) = rx.try_recv() {
            out.push(f);
        }
        out
    }

    #[tokio::test]
    async fn survives_link_loss_and_failed_redial() {
        let dialer = ScriptedDialer::new(vec![
            Script::Fail("connection refused"),
            Script::Serve {
                deliveries: vec![alive(3), alive(4)],
                lost: None,
            },
        ]);
        let cancel = CancellationToken::new();
        let first = serve(vec![alive(1), alive(2)], Some("link reset"), cancel.child_token());
        let subscriber = ResilientSubscriber::new(dialer.clone(), ReconnectConfig::immediate())
            .with_connection(first);

        let (tx, mut rx) = mpsc::channel(8);
        let (sink, mut faults) = FaultSink::new(cancel.clone());
        let handle = tokio::spawn(Box::new(subscriber).run(tx, sink, cancel.clone()));

        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(rx.recv().await.unwrap().timestamp());
        }
        assert_eq!(seen, vec![1, 2, 3, 4]);

        let reported = collect_faults(&mut faults);
        assert_eq!(reported.len(), 2);
        assert!(reported.iter().all(|f| f.severity == Severity::Advisory));
        assert!(matches!(reported[0].error, FeedError::ConnectionLost(ref r) if r == "link reset"));
        assert!(matches!(reported[1].error, FeedError::Dial(_)));
        assert_eq!(*dialer.dials.lock(), 2);
        assert!(!cancel.is_cancelled());

        cancel.cancel();
        handle.await.unwrap();
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn undecodable_delivery_is_dropped_with_fault() {
        let dialer = ScriptedDialer::new(Vec::new());
        let cancel = CancellationToken::new();
        let garbage = RawDelivery {
            routing_key: "hi.-.live.odds_change.1.sr:match.1.-".to_string(),
            body: b"<odds_change".to_vec(),
        };
        let first = serve(vec![alive(1), garbage, alive(2)], None, cancel.child_token());
        let subscriber = ResilientSubscriber::new(dialer, ReconnectConfig::immediate())
            .with_connection(first);

        let (tx, mut rx) = mpsc::channel(8);
        let (sink, mut faults) = FaultSink::new(cancel.clone());
        let handle = tokio::spawn(Box::new(subscriber).run(tx, sink, cancel.clone()));

        assert_eq!(rx.recv().await.unwrap().timestamp(), 1);
        assert_eq!(rx.recv().await.unwrap().timestamp(), 2);

        let fault = faults.recv().await.unwrap();
        assert_eq!(fault.stage, "decoder");
        assert!(matches!(fault.error, FeedError::Decode { ref routing_key, .. }
            if routing_key.starts_with("hi.-.live.odds_change")));

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn cancel_during_backoff_stops_source() {
        let dialer = ScriptedDialer::new(Vec::new());
        let cancel = CancellationToken::new();
        let config = ReconnectConfig {
            initial_delay: std::time::Duration::from_secs(3600),
            ..ReconnectConfig::default()
        };
        let subscriber = ResilientSubscriber::new(dialer.clone(), config);

        let (tx, mut rx) = mpsc::channel(1);
        let (sink, _faults) = FaultSink::new(cancel.clone());
        let handle = tokio::spawn(Box::new(subscriber).run(tx, sink, cancel.clone()));

        cancel.cancel();
        handle.await.unwrap();
        assert!(rx.recv().await.is_none());
        assert_eq!(*dialer.dials.lock(), 0);
    }
}
