//! Domain Layer - Feed events and reference records.
//!
//! Pure data types shared by every stage of the pipeline. Nothing here
//! performs I/O.

/// Structured entity identifiers.
pub mod urn;

/// Decoded feed messages and their annotation slot.
pub mod message;

/// Fixtures, market descriptions, players and probabilities.
pub mod reference;

pub use message::{
    Annotations, EventHeader, FeedEvent, Lang, LangError, Localized, MarketRef, MessageKind,
    Priority, Producer, ProducerChange, Scope,
};
pub use reference::{Fixture, MarketDescription, Player, Probabilities};
pub use urn::{Urn, UrnError};
