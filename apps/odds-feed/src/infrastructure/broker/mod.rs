//! Feed Broker
//!
//! AMQP subscription to the odds feed exchange.
//!
//! - `bindings`: routing-key patterns per bind mode
//! - `codec`: routing key and XML body decoding
//! - `connection`: a single dial and its delivery stream
//! - `reconnect`: backoff policy between dials
//! - `subscriber`: pipeline source that survives link loss

pub mod bindings;
pub mod codec;
pub mod connection;
pub mod reconnect;
pub mod subscriber;

pub use bindings::{BindMode, resolve_bindings};
pub use codec::{DecodeError, decode};
pub use connection::{AmqpDialer, Connection, DialError, DialStage, Dialer, RawDelivery};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use subscriber::ResilientSubscriber;
