//! Transport Connection
//!
//! One dial to the broker: open a TLS link, create a channel, declare a
//! fresh server-named queue (exclusive, auto-delete, non-durable), bind the
//! resolved topic patterns on the feed exchange and start consuming with
//! broker-side acknowledgement.
//!
//! A dial yields a [`Connection`]: a stream of raw deliveries and a stream
//! of link faults. Dropping the connection (or cancelling the token it was
//! dialed with) cancels the consumer and closes the link.

use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::options::{
    BasicCancelOptions, BasicConsumeOptions, QueueBindOptions, QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{Connection as AmqpConnection, ConnectionProperties};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::bindings::resolve_bindings;
use crate::infrastructure::config::FeedConfig;
use crate::infrastructure::telemetry;

/// Exchange all feed messages are published on.
pub const EXCHANGE: &str = "unifiedfeed";

/// Link faults buffered per connection.
const FAULT_BUFFER: usize = 8;

/// Dial step that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialStage {
    /// Link establishment.
    Connect,
    /// Channel creation.
    Channel,
    /// Queue declaration.
    QueueDeclare,
    /// Topic binding.
    QueueBind,
    /// Consumer registration.
    Consume,
}

impl std::fmt::Display for DialStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Connect => "connect",
            Self::Channel => "channel",
            Self::QueueDeclare => "queue declare",
            Self::QueueBind => "queue bind",
            Self::Consume => "consume",
        })
    }
}

/// Failed dial attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("broker dial failed at {stage}: {message}")]
pub struct DialError {
    /// Step that failed.
    pub stage: DialStage,
    /// Error details.
    pub message: String,
}

impl DialError {
    /// Create a dial error for a step.
    #[must_use]
    pub fn new(stage: DialStage, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

/// Raw broker delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDelivery {
    /// Routing key.
    pub routing_key: String,
    /// Message body.
    pub body: Vec<u8>,
}

/// Live subscription produced by one dial.
#[derive(Debug)]
pub struct Connection {
    deliveries: mpsc::Receiver<RawDelivery>,
    faults: mpsc::Receiver<String>,
    close: CancellationToken,
}

impl Connection {
    /// Assemble a connection from its streams and the token that closes it.
    #[must_use]
    pub const fn new(
        deliveries: mpsc::Receiver<RawDelivery>,
        faults: mpsc::Receiver<String>,
        close: CancellationToken,
    ) -> Self {
        Self {
            deliveries,
            faults,
            close,
        }
    }

    /// Split into delivery and fault streams.
    pub fn streams(
        &mut self,
    ) -> (
        &mut mpsc::Receiver<RawDelivery>,
        &mut mpsc::Receiver<String>,
    ) {
        (&mut self.deliveries, &mut self.faults)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close.cancel();
    }
}

/// Establishes broker connections.
#[async_trait]
pub trait Dialer: Send + Sync {
    /// Make a single dial attempt. The connection closes when `close` is
    /// cancelled or the returned value is dropped.
    async fn dial(&self, close: CancellationToken) -> Result<Connection, DialError>;
}

/// AMQP dialer for the feed broker.
#[derive(Clone)]
pub struct AmqpDialer {
    uri: String,
    bindings: Vec<String>,
    buffer: usize,
}

impl std::fmt::Debug for AmqpDialer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AmqpDialer")
            .field("uri", &"[REDACTED]")
            .field("bindings", &self.bindings)
            .field("buffer", &self.buffer)
            .finish()
    }
}

impl AmqpDialer {
    /// Dialer for the configured environment, credentials and bindings.
    #[must_use]
    pub fn new(config: &FeedConfig) -> Self {
        Self {
            uri: config.broker_uri(),
            bindings: resolve_bindings(config.bind_mode(), config.node_id()),
            buffer: config.channel_capacity(),
        }
    }

    /// Patterns bound on every dial.
    #[must_use]
    pub fn bindings(&self) -> &[String] {
        &self.bindings
    }

    async fn subscribe(&self, close: CancellationToken) -> Result<Connection, DialError> {
        let conn = AmqpConnection::connect(&self.uri, ConnectionProperties::default())
            .await
            .map_err(|e| DialError::new(DialStage::Connect, e.to_string()))?;

        let channel = conn
            .create_channel()
            .await
            .map_err(|e| DialError::new(DialStage::Channel, e.to_string()))?;

        let queue = channel
            .queue_declare(
                "",
                QueueDeclareOptions {
                    durable: false,
                    exclusive: true,
                    auto_delete: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| DialError::new(DialStage::QueueDeclare, e.to_string()))?;
        let queue_name = queue.name().as_str().to_string();

        for pattern in &self.bindings {
            channel
                .queue_bind(
                    &queue_name,
                    EXCHANGE,
                    pattern,
                    QueueBindOptions::default(),
                    FieldTable::default(),
                )
                .await
                .map_err(|e| {
                    DialError::new(DialStage::QueueBind, format!("{pattern}: {e}"))
                })?;
        }

        let mut consumer = channel
            .basic_consume(
                &queue_name,
                "",
                BasicConsumeOptions {
                    no_ack: true,
                    exclusive: true,
                    ..BasicConsumeOptions::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| DialError::new(DialStage::Consume, e.to_string()))?;

        tracing::info!(
            queue = %queue_name,
            bindings = ?self.bindings,
            "Subscribed to feed broker"
        );

        let (delivery_tx, delivery_rx) = mpsc::channel(self.buffer);
        let (fault_tx, fault_rx) = mpsc::channel(FAULT_BUFFER);

        let link_faults = fault_tx.clone();
        conn.on_error(move |e| {
            let _ = link_faults.try_send(e.to_string());
        });

        let consumer_tag = consumer.tag().as_str().to_string();
        let token = close.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    next = consumer.next() => match next {
                        Some(Ok(delivery)) => {
                            let raw = RawDelivery {
                                routing_key: delivery.routing_key.as_str().to_string(),
                                body: delivery.data,
                            };
                            tokio::select! {
                                () = token.cancelled() => break,
                                sent = delivery_tx.send(raw) => if sent.is_err() { break },
                            }
                        }
                        Some(Err(e)) => {
                            let _ = fault_tx.send(e.to_string()).await;
                            break;
                        }
                        None => {
                            let _ = fault_tx.send("consumer stream ended".to_string()).await;
                            break;
                        }
                    },
                }
            }

            if let Err(e) = channel
                .basic_cancel(&consumer_tag, BasicCancelOptions::default())
                .await
            {
                tracing::debug!(error = %e, "Consumer cancel failed");
            }
            if let Err(e) = conn.close(200, "client closing").await {
                tracing::debug!(error = %e, "Broker link close failed");
            }
            tracing::debug!(queue = %queue_name, "Broker connection closed");
        });

        Ok(Connection::new(delivery_rx, fault_rx, close))
    }
}

#[async_trait]
impl Dialer for AmqpDialer {
    async fn dial(&self, close: CancellationToken) -> Result<Connection, DialError> {
        self.subscribe(close)
            .instrument(telemetry::dial_span(self.bindings.len()))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::config::{Credentials, Environment};
    use crate::infrastructure::broker::bindings::BindMode;

    #[test]
    fn dialer_resolves_bindings_from_config() {
        let config = FeedConfig::builder(Credentials::new("1", "t"))
            .environment(Environment::Replay)
            .bind_mode(BindMode::Live)
            .node_id(3)
            .build()
            .unwrap();
        let dialer = AmqpDialer::new(&config);
        assert_eq!(
            dialer.bindings(),
            &["*.*.live.#", "-.-.-.#", "*.*.*.*.*.*.*.3"]
        );
        assert!(!format!("{dialer:?}").contains("amqps://t"));
    }

    #[test]
    fn dial_error_names_stage() {
        let err = DialError::new(DialStage::QueueBind, "access refused");
        assert_eq!(
            err.to_string(),
            "broker dial failed at queue bind: access refused"
        );
    }

    #[tokio::test]
    async fn dropping_connection_cancels_token() {
        let (_dtx, drx) = mpsc::channel(1);
        let (_ftx, frx) = mpsc::channel(1);
        let token = CancellationToken::new();
        let conn = Connection::new(drx, frx, token.clone());
        drop(conn);
        assert!(token.is_cancelled());
    }
}
