//! Feed Event Types
//!
//! Canonical representation of a decoded feed message. A [`FeedEvent`] is
//! created by the message decoder with fixed identity fields; enrichment
//! stages may only append to its annotation slot.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::reference::{Fixture, MarketDescription, Player};
use super::urn::Urn;

// =============================================================================
// Language
// =============================================================================

/// Language code used for reference-data lookups (`en`, `de`, `pt-br`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Lang(String);

/// Error returned for malformed language codes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid language code: {0:?}")]
pub struct LangError(pub String);

impl Lang {
    /// Language code as sent to the API.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse a comma separated language list (`"en,de"`).
    ///
    /// # Errors
    ///
    /// Returns the first invalid code.
    pub fn parse_list(s: &str) -> Result<Vec<Self>, LangError> {
        s.split(',')
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl FromStr for Lang {
    type Err = LangError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_lowercase();
        let valid = (2..=6).contains(&code.len())
            && code.chars().all(|c| c.is_ascii_alphabetic() || c == '-');
        if valid {
            Ok(Self(code))
        } else {
            Err(LangError(s.to_string()))
        }
    }
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Producers
// =============================================================================

/// Upstream source of odds and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Producer(pub u16);

impl Producer {
    /// Numeric producer id.
    #[must_use]
    pub const fn id(self) -> u16 {
        self.0
    }

    /// Short name for well-known producers.
    #[must_use]
    pub const fn name(self) -> Option<&'static str> {
        match self.0 {
            1 => Some("LO"),
            3 => Some("Ctrl"),
            4 => Some("BetPal"),
            5 => Some("PremiumCricket"),
            6 => Some("VF"),
            7 => Some("WNS"),
            8 => Some("VBL"),
            9 => Some("VTO"),
            10 => Some("VDR"),
            11 => Some("VHC"),
            12 => Some("VTI"),
            14 => Some("C"),
            15 => Some("VBI"),
            _ => None,
        }
    }
}

impl fmt::Display for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}({name})", self.0),
            None => write!(f, "{}", self.0),
        }
    }
}

/// Resume point for one producer, supplied by the caller at startup.
///
/// A timestamp of zero or less means no watermark is known and a full
/// recovery is requested instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducerChange {
    /// Producer to recover.
    pub producer: Producer,
    /// Timestamp (ms since epoch) of the last processed message.
    pub timestamp: i64,
}

impl ProducerChange {
    /// Create a watermark for `producer`.
    #[must_use]
    pub const fn new(producer: Producer, timestamp: i64) -> Self {
        Self {
            producer,
            timestamp,
        }
    }
}

// =============================================================================
// Message Classification
// =============================================================================

/// Kind of feed message, taken from the routing key and the body root element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Producer heartbeat.
    Alive,
    /// Recovery request finished delivering.
    SnapshotComplete,
    /// Odds update.
    OddsChange,
    /// Markets suspended.
    BetStop,
    /// Markets settled.
    BetSettlement,
    /// Settlement reverted.
    RollbackBetSettlement,
    /// Bets cancelled.
    BetCancel,
    /// Cancellation reverted.
    RollbackBetCancel,
    /// Fixture data changed.
    FixtureChange,
}

impl MessageKind {
    /// Wire name used in routing keys and as body root element.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Alive => "alive",
            Self::SnapshotComplete => "snapshot_complete",
            Self::OddsChange => "odds_change",
            Self::BetStop => "bet_stop",
            Self::BetSettlement => "bet_settlement",
            Self::RollbackBetSettlement => "rollback_bet_settlement",
            Self::BetCancel => "bet_cancel",
            Self::RollbackBetCancel => "rollback_bet_cancel",
            Self::FixtureChange => "fixture_change",
        }
    }

    /// Parse a wire name.
    #[must_use]
    pub fn from_wire(s: &str) -> Option<Self> {
        Some(match s {
            "alive" => Self::Alive,
            "snapshot_complete" => Self::SnapshotComplete,
            "odds_change" => Self::OddsChange,
            "bet_stop" => Self::BetStop,
            "bet_settlement" => Self::BetSettlement,
            "rollback_bet_settlement" => Self::RollbackBetSettlement,
            "bet_cancel" => Self::BetCancel,
            "rollback_bet_cancel" => Self::RollbackBetCancel,
            "fixture_change" => Self::FixtureChange,
            _ => return None,
        })
    }

    /// System messages carry no sport event.
    #[must_use]
    pub const fn is_system(self) -> bool {
        matches!(self, Self::Alive | Self::SnapshotComplete)
    }

    /// Messages whose markets are described by market reference data.
    #[must_use]
    pub const fn carries_markets(self) -> bool {
        matches!(
            self,
            Self::OddsChange
                | Self::BetSettlement
                | Self::RollbackBetSettlement
                | Self::BetCancel
                | Self::RollbackBetCancel
        )
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Routing priority segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// `hi`
    High,
    /// `lo`
    Low,
    /// `-`
    #[default]
    None,
}

/// Match phase encoded in the routing key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// `-.-.-` system traffic.
    #[default]
    System,
    /// Pre-match only.
    Prematch,
    /// Live only.
    Live,
    /// Both pre-match and live interest.
    PrematchLive,
    /// Virtual sports.
    Virtual,
}

/// Market referenced by a message body.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketRef {
    /// Market description id.
    pub id: u32,
    /// Raw specifiers (`total=2.5|variant=sr:...`).
    pub specifiers: Option<String>,
}

impl MarketRef {
    /// Value of a single specifier.
    #[must_use]
    pub fn specifier(&self, name: &str) -> Option<&str> {
        self.specifiers.as_deref()?.split('|').find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key.trim() == name).then(|| value.trim())
        })
    }

    /// Variant specifier, present on variant markets.
    #[must_use]
    pub fn variant(&self) -> Option<&str> {
        self.specifier("variant")
    }

    /// Player ids referenced by specifier values (`sr:player:<id>`).
    #[must_use]
    pub fn player_ids(&self) -> Vec<u64> {
        let Some(specifiers) = self.specifiers.as_deref() else {
            return Vec::new();
        };
        specifiers
            .split('|')
            .filter_map(|pair| pair.split_once('=').map(|(_, v)| v.trim()))
            .filter_map(|value| value.parse::<Urn>().ok())
            .filter(|urn| urn.kind() == "player")
            .map(|urn| urn.id())
            .collect()
    }
}

// =============================================================================
// Annotations
// =============================================================================

/// Reference data attached to an event in one language.
#[derive(Debug, Clone)]
pub struct Localized<T> {
    /// Language of the payload.
    pub lang: Lang,
    /// Shared reference record.
    pub value: Arc<T>,
}

/// Append-only enrichment slot.
#[derive(Debug, Clone, Default)]
pub struct Annotations {
    markets: Vec<Localized<MarketDescription>>,
    fixtures: Vec<Localized<Fixture>>,
    players: Vec<Localized<Player>>,
}

impl Annotations {
    /// Attached market descriptions.
    #[must_use]
    pub fn markets(&self) -> &[Localized<MarketDescription>] {
        &self.markets
    }

    /// Attached fixtures.
    #[must_use]
    pub fn fixtures(&self) -> &[Localized<Fixture>] {
        &self.fixtures
    }

    /// Attached player profiles.
    #[must_use]
    pub fn players(&self) -> &[Localized<Player>] {
        &self.players
    }

    /// Fixture in a given language.
    #[must_use]
    pub fn fixture(&self, lang: &Lang) -> Option<&Fixture> {
        self.fixtures
            .iter()
            .find(|f| &f.lang == lang)
            .map(|f| f.value.as_ref())
    }

    /// True when nothing has been attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.markets.is_empty() && self.fixtures.is_empty() && self.players.is_empty()
    }
}

// =============================================================================
// Feed Event
// =============================================================================

/// Identity fields of a decoded message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventHeader {
    /// Message kind.
    pub kind: MessageKind,
    /// Routing priority.
    pub priority: Priority,
    /// Match phase.
    pub scope: Scope,
    /// Producer that emitted the message.
    pub producer: Producer,
    /// Sport event the message is about.
    pub event_urn: Option<Urn>,
    /// Sport id from the routing key.
    pub sport_id: Option<u32>,
    /// Node id for messages routed back to a single client.
    pub node_id: Option<i32>,
    /// Generation timestamp in ms since epoch.
    pub timestamp: i64,
    /// Recovery request id, on recovered traffic and `snapshot_complete`.
    pub request_id: Option<i64>,
}

/// Decoded feed message flowing through the pipeline.
#[derive(Debug, Clone)]
pub struct FeedEvent {
    header: EventHeader,
    markets: Vec<MarketRef>,
    routing_key: String,
    body: Arc<[u8]>,
    received_at: DateTime<Utc>,
    annotations: Annotations,
}

impl FeedEvent {
    /// Create an event; identity fields are fixed from here on.
    #[must_use]
    pub fn new(
        header: EventHeader,
        markets: Vec<MarketRef>,
        routing_key: impl Into<String>,
        body: impl Into<Arc<[u8]>>,
    ) -> Self {
        Self {
            header,
            markets,
            routing_key: routing_key.into(),
            body: body.into(),
            received_at: Utc::now(),
            annotations: Annotations::default(),
        }
    }

    /// Identity fields.
    #[must_use]
    pub const fn header(&self) -> &EventHeader {
        &self.header
    }

    /// Message kind.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        self.header.kind
    }

    /// Emitting producer.
    #[must_use]
    pub const fn producer(&self) -> Producer {
        self.header.producer
    }

    /// Sport event URN, if any.
    #[must_use]
    pub const fn event_urn(&self) -> Option<&Urn> {
        self.header.event_urn.as_ref()
    }

    /// Generation timestamp in ms.
    #[must_use]
    pub const fn timestamp(&self) -> i64 {
        self.header.timestamp
    }

    /// Recovery request id.
    #[must_use]
    pub const fn request_id(&self) -> Option<i64> {
        self.header.request_id
    }

    /// Markets referenced by the body.
    #[must_use]
    pub fn markets(&self) -> &[MarketRef] {
        &self.markets
    }

    /// Broker routing key.
    #[must_use]
    pub fn routing_key(&self) -> &str {
        &self.routing_key
    }

    /// Raw XML body.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Local receive time.
    #[must_use]
    pub const fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    /// Enrichment payloads attached so far.
    #[must_use]
    pub const fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    /// Attach a market description.
    pub fn annotate_market(&mut self, lang: Lang, value: Arc<MarketDescription>) {
        self.annotations.markets.push(Localized { lang, value });
    }

    /// Attach a fixture.
    pub fn annotate_fixture(&mut self, lang: Lang, value: Arc<Fixture>) {
        self.annotations.fixtures.push(Localized { lang, value });
    }

    /// Attach a player profile.
    pub fn annotate_player(&mut self, lang: Lang, value: Arc<Player>) {
        self.annotations.players.push(Localized { lang, value });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lang_list_parsing() {
        let langs = Lang::parse_list("en, DE ,pt-br").unwrap();
        let codes: Vec<_> = langs.iter().map(Lang::as_str).collect();
        assert_eq!(codes, vec!["en", "de", "pt-br"]);
        assert!(Lang::parse_list("en,1x").is_err());
    }

    #[test]
    fn message_kind_wire_names_round_trip() {
        for kind in [
            MessageKind::Alive,
            MessageKind::SnapshotComplete,
            MessageKind::OddsChange,
            MessageKind::FixtureChange,
        ] {
            assert_eq!(MessageKind::from_wire(kind.as_str()), Some(kind));
        }
        assert_eq!(MessageKind::from_wire("product_down"), None);
    }

    #[test]
    fn market_ref_specifiers() {
        let market = MarketRef {
            id: 892,
            specifiers: Some("variant=sr:goalscorer:fieldplayers|player=sr:player:123".to_string()),
        };
        assert_eq!(market.variant(), Some("sr:goalscorer:fieldplayers"));
        assert_eq!(market.player_ids(), vec![123]);

        let plain = MarketRef {
            id: 18,
            specifiers: Some("total=2.5".to_string()),
        };
        assert_eq!(plain.variant(), None);
        assert!(plain.player_ids().is_empty());
    }

    #[test]
    fn producer_display_uses_known_name() {
        assert_eq!(Producer(1).to_string(), "1(LO)");
        assert_eq!(Producer(42).to_string(), "42");
    }
}
