//! Message Decoder
//!
//! Turns a broker delivery (routing key + XML body) into a [`FeedEvent`].
//! Decoding is pure; any failure yields a [`DecodeError`] and the delivery
//! is dropped by the caller.
//!
//! The routing key carries the classification:
//!
//! ```text
//! hi.pre.live.odds_change.1.sr:match.12345.-
//! ^  ^   ^    ^           ^ ^        ^     ^
//! |  |   |    kind        | urn type id    node id
//! |  |   live             sport id
//! |  pre | virt
//! priority
//! ```
//!
//! The body root element must match the kind segment. Identity attributes
//! are read from the root; every `<market>` element is recorded.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::domain::{EventHeader, FeedEvent, MarketRef, MessageKind, Priority, Producer, Scope, Urn};

/// Minimum number of routing key segments.
const MIN_SEGMENTS: usize = 4;

/// Decoder errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Routing key has too few segments.
    #[error("malformed routing key: {0:?}")]
    RoutingKey(String),

    /// Kind segment is not a known message kind.
    #[error("unknown message kind: {0:?}")]
    UnknownKind(String),

    /// Body root element does not match the routing key.
    #[error("body root <{root}> does not match routing kind {kind}")]
    KindMismatch {
        /// Kind from the routing key.
        kind: MessageKind,
        /// Root element name.
        root: String,
    },

    /// Body is not UTF-8.
    #[error("body is not valid UTF-8")]
    Utf8,

    /// Body is not well-formed XML.
    #[error("XML error: {0}")]
    Xml(String),

    /// Body has no root element.
    #[error("empty body")]
    EmptyBody,

    /// Required attribute is missing.
    #[error("missing attribute {0:?}")]
    MissingAttribute(&'static str),

    /// Attribute value cannot be parsed.
    #[error("invalid value {value:?} for attribute {name:?}")]
    InvalidAttribute {
        /// Attribute name.
        name: &'static str,
        /// Raw value.
        value: String,
    },
}

/// Classification fields taken from the routing key.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RoutingKey {
    kind: MessageKind,
    priority: Priority,
    scope: Scope,
    sport_id: Option<u32>,
    event_urn: Option<Urn>,
    node_id: Option<i32>,
}

/// Decode a delivery into a feed event.
///
/// # Errors
///
/// Returns a [`DecodeError`] for malformed routing keys, unknown kinds,
/// malformed XML or missing identity attributes.
pub fn decode(routing_key: &str, body: &[u8]) -> Result<FeedEvent, DecodeError> {
    let route = parse_routing_key(routing_key)?;
    let text = std::str::from_utf8(body).map_err(|_| DecodeError::Utf8)?;

    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut root: Option<RootAttributes> = None;
    let mut markets = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e) | Event::Empty(e)) => {
                if root.is_none() {
                    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    if name != route.kind.as_str() {
                        return Err(DecodeError::KindMismatch {
                            kind: route.kind,
                            root: name,
                        });
                    }
                    root = Some(RootAttributes::read(&e)?);
                } else if e.name().as_ref() == b"market" {
                    markets.push(read_market(&e)?);
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => return Err(DecodeError::Xml(e.to_string())),
        }
    }

    let root = root.ok_or(DecodeError::EmptyBody)?;
    let producer = root.product.ok_or(DecodeError::MissingAttribute("product"))?;

    let header = EventHeader {
        kind: route.kind,
        priority: route.priority,
        scope: route.scope,
        producer: Producer(producer),
        event_urn: root.event_id.or(route.event_urn),
        sport_id: route.sport_id,
        node_id: route.node_id,
        timestamp: root.timestamp.unwrap_or_default(),
        request_id: root.request_id,
    };

    Ok(FeedEvent::new(header, markets, routing_key, body))
}

fn parse_routing_key(key: &str) -> Result<RoutingKey, DecodeError> {
    let segments: Vec<&str> = key.split('.').collect();
    if segments.len() < MIN_SEGMENTS {
        return Err(DecodeError::RoutingKey(key.to_string()));
    }

    let kind = MessageKind::from_wire(segments[3])
        .ok_or_else(|| DecodeError::UnknownKind(segments[3].to_string()))?;

    let priority = match segments[0] {
        "hi" => Priority::High,
        "lo" => Priority::Low,
        _ => Priority::None,
    };

    let scope = match (segments[1], segments[2]) {
        ("virt", _) => Scope::Virtual,
        ("pre", "live") => Scope::PrematchLive,
        ("pre", _) => Scope::Prematch,
        (_, "live") => Scope::Live,
        _ => Scope::System,
    };

    let segment = |i: usize| segments.get(i).copied().filter(|s| *s != "-" && !s.is_empty());

    let sport_id = segment(4).and_then(|s| s.parse().ok());
    let event_urn = match (segment(5), segment(6)) {
        (Some(urn_type), Some(id)) => format!("{urn_type}:{id}").parse().ok(),
        _ => None,
    };
    let node_id = segment(7).and_then(|s| s.parse().ok());

    Ok(RoutingKey {
        kind,
        priority,
        scope,
        sport_id,
        event_urn,
        node_id,
    })
}

#[derive(Debug, Default)]
struct RootAttributes {
    product: Option<u16>,
    timestamp: Option<i64>,
    event_id: Option<Urn>,
    request_id: Option<i64>,
}

impl RootAttributes {
    fn read(element: &BytesStart<'_>) -> Result<Self, DecodeError> {
        let mut attrs = Self::default();
        for (name, value) in attributes(element)? {
            match name.as_str() {
                "product" => attrs.product = Some(parse_attr("product", &value)?),
                "timestamp" => attrs.timestamp = Some(parse_attr("timestamp", &value)?),
                "event_id" => attrs.event_id = Some(parse_attr("event_id", &value)?),
                "request_id" => attrs.request_id = Some(parse_attr("request_id", &value)?),
                _ => {}
            }
        }
        Ok(attrs)
    }
}

fn read_market(element: &BytesStart<'_>) -> Result<MarketRef, DecodeError> {
    let mut id = None;
    let mut specifiers = None;
    for (name, value) in attributes(element)? {
        match name.as_str() {
            "id" => id = Some(parse_attr("id", &value)?),
            "specifiers" => specifiers = Some(value),
            _ => {}
        }
    }
    Ok(MarketRef {
        id: id.ok_or(DecodeError::MissingAttribute("id"))?,
        specifiers,
    })
}

fn attributes(element: &BytesStart<'_>) -> Result<Vec<(String, String)>, DecodeError> {
    element
        .attributes()
        .map(|attr| {
            let attr = attr.map_err(|e| DecodeError::Xml(e.to_string()))?;
            let name = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| DecodeError::Xml(e.to_string()))?
                .into_owned();
            Ok((name, value))
        })
        .collect()
}

fn parse_attr<T: std::str::FromStr>(name: &'static str, value: &str) -> Result<T, DecodeError> {
    value.parse().map_err(|_| DecodeError::InvalidAttribute {
        name,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ODDS_CHANGE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<odds_change product="1" event_id="sr:match:12345" timestamp="1700000000000" request_id="42">
  <odds>
    <market id="18" specifiers="total=2.5" status="1">
      <outcome id="12" odds="1.9" active="1"/>
    </market>
    <market id="892" specifiers="variant=sr:goalscorer:fieldplayers|player=sr:player:77"/>
  </odds>
</odds_change>"#;

    #[test]
    fn decodes_odds_change() {
        let event = decode(
            "hi.pre.live.odds_change.1.sr:match.12345.-",
            ODDS_CHANGE.as_bytes(),
        )
        .unwrap();

        assert_eq!(event.kind(), MessageKind::OddsChange);
        assert_eq!(event.producer(), Producer(1));
        assert_eq!(event.event_urn().map(ToString::to_string).as_deref(), Some("sr:match:12345"));
        assert_eq!(event.timestamp(), 1_700_000_000_000);
        assert_eq!(event.request_id(), Some(42));
        assert_eq!(event.header().priority, Priority::High);
        assert_eq!(event.header().scope, Scope::PrematchLive);
        assert_eq!(event.header().sport_id, Some(1));
        assert_eq!(event.header().node_id, None);
        assert_eq!(event.markets().len(), 2);
        assert_eq!(event.markets()[1].variant(), Some("sr:goalscorer:fieldplayers"));
        assert_eq!(event.body(), ODDS_CHANGE.as_bytes());
    }

    #[test]
    fn decodes_system_alive() {
        let body = br#"<alive product="3" timestamp="1700000000123" subscribed="1"/>"#;
        let event = decode("-.-.-.alive.-.-.-.-", body).unwrap();
        assert_eq!(event.kind(), MessageKind::Alive);
        assert_eq!(event.header().scope, Scope::System);
        assert!(event.event_urn().is_none());
        assert_eq!(event.producer(), Producer(3));
    }

    #[test]
    fn snapshot_complete_carries_node_and_request() {
        let body = br#"<snapshot_complete product="1" request_id="99" timestamp="5"/>"#;
        let event = decode("-.-.-.snapshot_complete.-.-.-.7", body).unwrap();
        assert_eq!(event.request_id(), Some(99));
        assert_eq!(event.header().node_id, Some(7));
    }

    #[test]
    fn event_urn_falls_back_to_routing_key() {
        let body = br#"<bet_stop product="1" timestamp="5"/>"#;
        let event = decode("hi.-.live.bet_stop.1.sr:match.555.-", body).unwrap();
        assert_eq!(event.event_urn().map(Urn::id), Some(555));
    }

    #[test]
    fn rejects_short_routing_key() {
        let err = decode("hi.pre.live", b"<odds_change product=\"1\"/>").unwrap_err();
        assert!(matches!(err, DecodeError::RoutingKey(_)));
    }

    #[test]
    fn rejects_unknown_kind() {
        let err = decode("-.-.-.product_down.-.-.-.-", b"<product_down/>").unwrap_err();
        assert_eq!(err, DecodeError::UnknownKind("product_down".to_string()));
    }

    #[test]
    fn rejects_root_mismatch() {
        let err = decode("-.-.-.alive.-.-.-.-", b"<bet_stop product=\"1\"/>").unwrap_err();
        assert!(matches!(err, DecodeError::KindMismatch { .. }));
    }

    #[test]
    fn rejects_missing_product_and_garbage() {
        assert_eq!(
            decode("-.-.-.alive.-.-.-.-", b"<alive timestamp=\"1\"/>").unwrap_err(),
            DecodeError::MissingAttribute("product")
        );
        assert_eq!(
            decode("-.-.-.alive.-.-.-.-", b"").unwrap_err(),
            DecodeError::EmptyBody
        );
        assert!(matches!(
            decode("-.-.-.alive.-.-.-.-", b"<alive product=\"x\"/>").unwrap_err(),
            DecodeError::InvalidAttribute { name: "product", .. }
        ));
    }
}
