//! Request Path Templates
//!
//! Every API operation is a path template with `{name}` placeholders. A
//! template is rendered from a [`Params`] set; a configured node id is
//! appended to producer recovery requests so recovered messages are routed
//! back to this client's private queue only. Per-event recovery templates
//! carry the node id themselves.

use std::collections::HashMap;

/// Health check.
pub const WHOAMI: &str = "/v1/users/whoami.xml";

/// Recovery of everything after a timestamp.
pub const RECOVERY_SINCE: &str =
    "/v1/{producer}/recovery/initiate_request?after={timestamp}&request_id={request_id}";
/// Recovery of all currently valid odds.
pub const RECOVERY_FULL: &str = "/v1/{producer}/recovery/initiate_request?request_id={request_id}";
/// Odds recovery for one sport event. The node id is always sent, zero
/// when none is configured.
pub const RECOVERY_EVENT_ODDS: &str =
    "/v1/{producer}/odds/events/{event}/initiate_request?request_id={request_id}&node_id={node_id}";
/// Stateful message recovery for one sport event; same node id rule.
pub const RECOVERY_EVENT_STATEFUL: &str = "/v1/{producer}/stateful_messages/events/{event}/initiate_request?request_id={request_id}&node_id={node_id}";

/// All market descriptions.
pub const MARKETS: &str = "/v1/descriptions/{lang}/markets.xml?include_mappings=false";
/// Variant-specific market description.
pub const MARKET_VARIANT: &str =
    "/v1/descriptions/{lang}/markets/{market}/variants/{variant}?include_mappings=false";
/// Fixture of a sport event.
pub const FIXTURE: &str = "/v1/sports/{lang}/sport_events/{event}/fixture.xml";
/// Player profile.
pub const PLAYER: &str = "/v1/sports/{lang}/players/sr:player:{player}/profile.xml";
/// Fixtures of live events.
pub const SCHEDULE_LIVE: &str = "/v1/sports/{lang}/schedules/live/schedule.xml";
/// One page of upcoming fixtures.
pub const SCHEDULE_PRE: &str =
    "/v1/sports/{lang}/schedules/pre/schedule.xml?start={start}&limit={limit}";

/// Probabilities for all markets of an event.
pub const PROBABILITIES_EVENT: &str = "/v1/probabilities/{event}";
/// Probabilities for one market.
pub const PROBABILITIES_MARKET: &str = "/v1/probabilities/{event}/{market}";

/// Start a replay scenario.
pub const REPLAY_SCENARIO: &str = "/v1/replay/scenario/play/{scenario}?speed={speed}&max_delay={max_delay}&use_replay_timestamp={use_replay_timestamp}";
/// Start playing the queued events.
pub const REPLAY_PLAY: &str =
    "/v1/replay/play?speed={speed}&max_delay={max_delay}&use_replay_timestamp={use_replay_timestamp}";
/// Stop the replay player.
pub const REPLAY_STOP: &str = "/v1/replay/stop";
/// Stop the player and clear the queue.
pub const REPLAY_RESET: &str = "/v1/replay/reset";
/// Add an event to the replay queue.
pub const REPLAY_ADD: &str = "/v1/replay/events/{event}";

/// Placeholder values for rendering.
#[derive(Debug, Clone, Default)]
pub struct Params {
    values: HashMap<&'static str, String>,
    node_id: Option<i32>,
}

impl Params {
    /// Empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a placeholder value.
    #[must_use]
    pub fn with(mut self, name: &'static str, value: impl ToString) -> Self {
        self.values.insert(name, value.to_string());
        self
    }

    /// Append `node_id` to the rendered path.
    #[must_use]
    pub const fn with_node_id(mut self, node_id: Option<i32>) -> Self {
        self.node_id = node_id;
        self
    }
}

/// Template placeholder without a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no value for placeholder {{{placeholder}}} in {template}")]
pub struct TemplateError {
    /// Template being rendered.
    pub template: &'static str,
    /// Placeholder name.
    pub placeholder: String,
}

/// Render a template.
///
/// # Errors
///
/// Returns an error if a placeholder has no value.
pub fn render(template: &'static str, params: &Params) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len() + 32);
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let Some(len) = rest[start..].find('}') else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let name = &rest[start + 1..start + len];
        let value = params.values.get(name).ok_or_else(|| TemplateError {
            template,
            placeholder: name.to_string(),
        })?;
        out.push_str(value);
        rest = &rest[start + len + 1..];
    }
    out.push_str(rest);

    if let Some(node_id) = params.node_id {
        out.push(if out.contains('?') { '&' } else { '?' });
        out.push_str("node_id=");
        out.push_str(&node_id.to_string());
    }
    Ok(out)
}

/// Recovery path for a producer watermark.
///
/// A timestamp of zero or less selects full recovery.
///
/// # Errors
///
/// Never fails for the built-in templates; the error is propagated from
/// [`render`].
pub fn recovery_path(
    producer: u16,
    timestamp: i64,
    request_id: i64,
    node_id: Option<i32>,
) -> Result<String, TemplateError> {
    let params = Params::new()
        .with("producer", producer)
        .with("request_id", request_id)
        .with_node_id(node_id);
    if timestamp > 0 {
        render(RECOVERY_SINCE, &params.with("timestamp", timestamp))
    } else {
        render(RECOVERY_FULL, &params)
    }
}
