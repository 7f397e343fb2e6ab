//! Reference Data Records
//!
//! Fixtures, market descriptions, player profiles and probabilities as
//! returned by the read endpoints of the API. Only the fields the
//! enrichment stages and consumers need are kept.
//!
//! Decoding is two-pass: the XML is first deserialized into raw wire
//! records, then converted into the domain records, deriving computed
//! fields (numeric ids from URNs, sport and category lifted out of the
//! tournament, home/away picked by competitor qualifier).

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::message::Producer;
use super::urn::Urn;

/// Decoding error for reference payloads.
pub type XmlError = quick_xml::DeError;

// =============================================================================
// Fixture
// =============================================================================

/// Sport of a fixture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sport {
    /// Numeric id.
    pub id: u64,
    /// Full URN.
    pub urn: Urn,
    /// Localized name.
    pub name: String,
}

/// Category (usually a country) of a fixture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    /// Numeric id.
    pub id: u64,
    /// Full URN.
    pub urn: Urn,
    /// Localized name.
    pub name: String,
    /// ISO country code, when the category is a country.
    pub country_code: Option<String>,
}

/// Tournament of a fixture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tournament {
    /// Numeric id.
    pub id: u64,
    /// Full URN.
    pub urn: Urn,
    /// Localized name.
    pub name: String,
}

/// Team or individual taking part in a fixture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Competitor {
    /// Numeric id.
    pub id: u64,
    /// Full URN.
    pub urn: Urn,
    /// Localized name.
    pub name: String,
    /// Short name.
    pub abbreviation: Option<String>,
    /// `home` or `away`.
    pub qualifier: Option<String>,
    /// ISO country code.
    pub country_code: Option<String>,
}

/// Venue of a fixture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Venue {
    /// Numeric id.
    pub id: u64,
    /// Localized name.
    pub name: String,
    /// Seating capacity.
    pub capacity: Option<u32>,
    /// City.
    pub city_name: Option<String>,
    /// ISO country code.
    pub country_code: Option<String>,
}

/// Static or semi-static information about a sport event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixture {
    /// Numeric event id.
    pub id: u64,
    /// Event URN.
    pub urn: Urn,
    /// Event name, mostly set for stages and outrights.
    pub name: Option<String>,
    /// Official start time.
    pub start_time: Option<DateTime<Utc>>,
    /// Scheduled start time.
    pub scheduled: Option<DateTime<Utc>>,
    /// Event status.
    pub status: Option<String>,
    /// Live odds coverage (`booked`, `not_available`, ...).
    pub liveodds: Option<String>,
    /// Sport, taken from the tournament.
    pub sport: Option<Sport>,
    /// Category, taken from the tournament.
    pub category: Option<Category>,
    /// Tournament.
    pub tournament: Option<Tournament>,
    /// All competitors.
    pub competitors: Vec<Competitor>,
    /// Competitor with qualifier `home`.
    pub home: Option<Competitor>,
    /// Competitor with qualifier `away`.
    pub away: Option<Competitor>,
    /// Venue.
    pub venue: Option<Venue>,
    /// Response generation time.
    pub generated_at: Option<DateTime<Utc>>,
}

impl Fixture {
    /// Decode a `fixtures_fixture` API response.
    ///
    /// # Errors
    ///
    /// Returns an error if the XML does not match the fixture schema.
    pub fn from_xml(xml: &str) -> Result<Self, XmlError> {
        let raw: wire::FixtureResponse = quick_xml::de::from_str(xml)?;
        Ok(raw.into())
    }

    /// Decode a `schedule` API response (live or upcoming events).
    ///
    /// # Errors
    ///
    /// Returns an error if the XML does not match the schedule schema.
    pub fn list_from_schedule_xml(xml: &str) -> Result<Vec<Self>, XmlError> {
        let raw: wire::Schedule = quick_xml::de::from_str(xml)?;
        let generated_at = raw.generated_at;
        Ok(raw
            .events
            .into_iter()
            .map(|f| wire::fixture_from(f, generated_at))
            .collect())
    }

    /// `home - away`, or the event name when competitors are missing.
    #[must_use]
    pub fn display_name(&self) -> String {
        match (&self.home, &self.away) {
            (Some(home), Some(away)) => format!("{} - {}", home.name, away.name),
            _ => self
                .name
                .clone()
                .unwrap_or_else(|| self.urn.to_string()),
        }
    }
}

// =============================================================================
// Market Descriptions
// =============================================================================

/// Outcome of a market description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeDescription {
    /// Outcome id, numeric or URN-like for variant markets.
    pub id: String,
    /// Name template.
    pub name: String,
}

/// Specifier declared by a market description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecifierDescription {
    /// Specifier name.
    pub name: String,
    /// Value type (`decimal`, `integer`, `string`, ...).
    pub kind: String,
}

/// Localized description of a betting market.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketDescription {
    /// Market id.
    pub id: u32,
    /// Name template.
    pub name: String,
    /// Variant, for variant-specific descriptions.
    pub variant: Option<String>,
    /// Market groups.
    pub groups: Vec<String>,
    /// Outcomes.
    pub outcomes: Vec<OutcomeDescription>,
    /// Specifiers.
    pub specifiers: Vec<SpecifierDescription>,
}

impl MarketDescription {
    /// Decode a `market_descriptions` API response.
    ///
    /// # Errors
    ///
    /// Returns an error if the XML does not match the schema.
    pub fn list_from_xml(xml: &str) -> Result<Vec<Self>, XmlError> {
        let raw: wire::MarketDescriptions = quick_xml::de::from_str(xml)?;
        Ok(raw.markets.into_iter().map(Into::into).collect())
    }
}

// =============================================================================
// Players
// =============================================================================

/// Player profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    /// Numeric id.
    pub id: u64,
    /// Full URN.
    pub urn: Urn,
    /// Display name, usually `Last, First`.
    pub name: String,
    /// Full name.
    pub full_name: Option<String>,
    /// Playing position.
    pub position: Option<String>,
    /// Date of birth as sent (`YYYY-MM-DD`).
    pub date_of_birth: Option<String>,
    /// Nationality.
    pub nationality: Option<String>,
    /// ISO country code.
    pub country_code: Option<String>,
}

impl Player {
    /// Decode a `player_profile` API response.
    ///
    /// # Errors
    ///
    /// Returns an error if the XML does not match the schema.
    pub fn from_xml(xml: &str) -> Result<Self, XmlError> {
        let raw: wire::PlayerProfile = quick_xml::de::from_str(xml)?;
        Ok(raw.player.into())
    }
}

// =============================================================================
// Probabilities
// =============================================================================

/// Outcome probability.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityOutcome {
    /// Outcome id.
    pub id: String,
    /// Whether the outcome is active.
    pub active: bool,
    /// Probability in `0.0..=1.0`.
    pub probability: Option<f64>,
}

/// Market probabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityMarket {
    /// Market id.
    pub id: u32,
    /// Raw specifiers.
    pub specifiers: Option<String>,
    /// Market status code.
    pub status: Option<i32>,
    /// Outcomes.
    pub outcomes: Vec<ProbabilityOutcome>,
}

/// Probabilities for a sport event (cashout endpoint).
#[derive(Debug, Clone, PartialEq)]
pub struct Probabilities {
    /// Producer that computed the probabilities.
    pub producer: Producer,
    /// Sport event.
    pub event_urn: Urn,
    /// Generation timestamp in ms.
    pub timestamp: i64,
    /// Markets.
    pub markets: Vec<ProbabilityMarket>,
}

impl Probabilities {
    /// Decode a `cashout` API response.
    ///
    /// # Errors
    ///
    /// Returns an error if the XML does not match the schema.
    pub fn from_xml(xml: &str) -> Result<Self, XmlError> {
        let raw: wire::Cashout = quick_xml::de::from_str(xml)?;
        Ok(raw.into())
    }
}

// =============================================================================
// Wire Records
// =============================================================================

mod wire {
    use super::{
        Category, Competitor, DateTime, Deserialize, Fixture, MarketDescription,
        OutcomeDescription, Player, Probabilities, ProbabilityMarket, ProbabilityOutcome,
        Producer, SpecifierDescription, Sport, Tournament, Urn, Utc, Venue,
    };

    #[derive(Debug, Deserialize)]
    pub struct FixtureResponse {
        #[serde(rename = "@generated_at", default)]
        pub generated_at: Option<DateTime<Utc>>,
        pub fixture: RawFixture,
    }

    #[derive(Debug, Deserialize)]
    pub struct Schedule {
        #[serde(rename = "@generated_at", default)]
        pub generated_at: Option<DateTime<Utc>>,
        #[serde(rename = "sport_event", default)]
        pub events: Vec<RawFixture>,
    }

    #[derive(Debug, Deserialize)]
    pub struct RawFixture {
        #[serde(rename = "@id")]
        pub id: Urn,
        #[serde(rename = "@name", default)]
        pub name: Option<String>,
        #[serde(rename = "@start_time", default)]
        pub start_time: Option<DateTime<Utc>>,
        #[serde(rename = "@scheduled", default)]
        pub scheduled: Option<DateTime<Utc>>,
        #[serde(rename = "@status", default)]
        pub status: Option<String>,
        #[serde(rename = "@liveodds", default)]
        pub liveodds: Option<String>,
        #[serde(default)]
        pub tournament: Option<RawTournament>,
        #[serde(default)]
        pub competitors: Option<RawCompetitors>,
        #[serde(default)]
        pub venue: Option<RawVenue>,
    }

    #[derive(Debug, Deserialize)]
    pub struct RawTournament {
        #[serde(rename = "@id")]
        pub id: Urn,
        #[serde(rename = "@name", default)]
        pub name: String,
        #[serde(default)]
        pub sport: Option<RawNamed>,
        #[serde(default)]
        pub category: Option<RawCategory>,
    }

    #[derive(Debug, Deserialize)]
    pub struct RawNamed {
        #[serde(rename = "@id")]
        pub id: Urn,
        #[serde(rename = "@name", default)]
        pub name: String,
    }

    #[derive(Debug, Deserialize)]
    pub struct RawCategory {
        #[serde(rename = "@id")]
        pub id: Urn,
        #[serde(rename = "@name", default)]
        pub name: String,
        #[serde(rename = "@country_code", default)]
        pub country_code: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct RawCompetitors {
        #[serde(rename = "competitor", default)]
        pub items: Vec<RawCompetitor>,
    }

    #[derive(Debug, Deserialize)]
    pub struct RawCompetitor {
        #[serde(rename = "@id")]
        pub id: Urn,
        #[serde(rename = "@name", default)]
        pub name: String,
        #[serde(rename = "@abbreviation", default)]
        pub abbreviation: Option<String>,
        #[serde(rename = "@qualifier", default)]
        pub qualifier: Option<String>,
        #[serde(rename = "@country_code", default)]
        pub country_code: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct RawVenue {
        #[serde(rename = "@id")]
        pub id: Urn,
        #[serde(rename = "@name", default)]
        pub name: String,
        #[serde(rename = "@capacity", default)]
        pub capacity: Option<u32>,
        #[serde(rename = "@city_name", default)]
        pub city_name: Option<String>,
        #[serde(rename = "@country_code", default)]
        pub country_code: Option<String>,
    }

    impl From<RawCompetitor> for Competitor {
        fn from(raw: RawCompetitor) -> Self {
            Self {
                id: raw.id.id(),
                urn: raw.id,
                name: raw.name,
                abbreviation: raw.abbreviation,
                qualifier: raw.qualifier,
                country_code: raw.country_code,
            }
        }
    }

    impl From<FixtureResponse> for Fixture {
        fn from(raw: FixtureResponse) -> Self {
            fixture_from(raw.fixture, raw.generated_at)
        }
    }

    pub fn fixture_from(f: RawFixture, generated_at: Option<DateTime<Utc>>) -> Fixture {
        let (sport, category, tournament) = match f.tournament {
            Some(t) => (
                t.sport.map(|s| Sport {
                    id: s.id.id(),
                    urn: s.id,
                    name: s.name,
                }),
                t.category.map(|c| Category {
                    id: c.id.id(),
                    urn: c.id,
                    name: c.name,
                    country_code: c.country_code,
                }),
                Some(Tournament {
                    id: t.id.id(),
                    urn: t.id,
                    name: t.name,
                }),
            ),
            None => (None, None, None),
        };

        let competitors: Vec<Competitor> = f
            .competitors
            .map(|c| c.items.into_iter().map(Into::into).collect())
            .unwrap_or_default();
        let by_qualifier = |q: &str| {
            competitors
                .iter()
                .find(|c| c.qualifier.as_deref() == Some(q))
                .cloned()
        };
        let home = by_qualifier("home");
        let away = by_qualifier("away");

        Fixture {
            id: f.id.id(),
            urn: f.id,
            name: f.name,
            start_time: f.start_time,
            scheduled: f.scheduled,
            status: f.status,
            liveodds: f.liveodds,
            sport,
            category,
            tournament,
            competitors,
            home,
            away,
            venue: f.venue.map(|v| Venue {
                id: v.id.id(),
                name: v.name,
                capacity: v.capacity,
                city_name: v.city_name,
                country_code: v.country_code,
            }),
            generated_at,
        }
    }

    #[derive(Debug, Deserialize)]
    pub struct MarketDescriptions {
        #[serde(rename = "market", default)]
        pub markets: Vec<RawMarket>,
    }

    #[derive(Debug, Deserialize)]
    pub struct RawMarket {
        #[serde(rename = "@id")]
        pub id: u32,
        #[serde(rename = "@name", default)]
        pub name: String,
        #[serde(rename = "@variant", default)]
        pub variant: Option<String>,
        #[serde(rename = "@groups", default)]
        pub groups: Option<String>,
        #[serde(default)]
        pub outcomes: Option<RawOutcomes>,
        #[serde(default)]
        pub specifiers: Option<RawSpecifiers>,
    }

    #[derive(Debug, Deserialize)]
    pub struct RawOutcomes {
        #[serde(rename = "outcome", default)]
        pub items: Vec<RawOutcome>,
    }

    #[derive(Debug, Deserialize)]
    pub struct RawOutcome {
        #[serde(rename = "@id")]
        pub id: String,
        #[serde(rename = "@name", default)]
        pub name: String,
    }

    #[derive(Debug, Deserialize)]
    pub struct RawSpecifiers {
        #[serde(rename = "specifier", default)]
        pub items: Vec<RawSpecifier>,
    }

    #[derive(Debug, Deserialize)]
    pub struct RawSpecifier {
        #[serde(rename = "@name")]
        pub name: String,
        #[serde(rename = "@type", default)]
        pub kind: String,
    }

    impl From<RawMarket> for MarketDescription {
        fn from(raw: RawMarket) -> Self {
            Self {
                id: raw.id,
                name: raw.name,
                variant: raw.variant,
                groups: raw
                    .groups
                    .map(|g| g.split('|').map(str::to_string).collect())
                    .unwrap_or_default(),
                outcomes: raw
                    .outcomes
                    .map(|o| {
                        o.items
                            .into_iter()
                            .map(|o| OutcomeDescription {
                                id: o.id,
                                name: o.name,
                            })
                            .collect()
                    })
                    .unwrap_or_default(),
                specifiers: raw
                    .specifiers
                    .map(|s| {
                        s.items
                            .into_iter()
                            .map(|s| SpecifierDescription {
                                name: s.name,
                                kind: s.kind,
                            })
                            .collect()
                    })
                    .unwrap_or_default(),
            }
        }
    }

    #[derive(Debug, Deserialize)]
    pub struct PlayerProfile {
        pub player: RawPlayer,
    }

    #[derive(Debug, Deserialize)]
    pub struct RawPlayer {
        #[serde(rename = "@id")]
        pub id: Urn,
        #[serde(rename = "@name", default)]
        pub name: String,
        #[serde(rename = "@full_name", default)]
        pub full_name: Option<String>,
        #[serde(rename = "@type", default)]
        pub position: Option<String>,
        #[serde(rename = "@date_of_birth", default)]
        pub date_of_birth: Option<String>,
        #[serde(rename = "@nationality", default)]
        pub nationality: Option<String>,
        #[serde(rename = "@country_code", default)]
        pub country_code: Option<String>,
    }

    impl From<RawPlayer> for Player {
        fn from(raw: RawPlayer) -> Self {
            Self {
                id: raw.id.id(),
                urn: raw.id,
                name: raw.name,
                full_name: raw.full_name,
                position: raw.position,
                date_of_birth: raw.date_of_birth,
                nationality: raw.nationality,
                country_code: raw.country_code,
            }
        }
    }

    #[derive(Debug, Deserialize)]
    pub struct Cashout {
        #[serde(rename = "@product")]
        pub product: u16,
        #[serde(rename = "@event_id")]
        pub event_id: Urn,
        #[serde(rename = "@timestamp", default)]
        pub timestamp: i64,
        #[serde(default)]
        pub odds: Option<RawOdds>,
    }

    #[derive(Debug, Deserialize)]
    pub struct RawOdds {
        #[serde(rename = "market", default)]
        pub markets: Vec<RawProbabilityMarket>,
    }

    #[derive(Debug, Deserialize)]
    pub struct RawProbabilityMarket {
        #[serde(rename = "@id")]
        pub id: u32,
        #[serde(rename = "@specifiers", default)]
        pub specifiers: Option<String>,
        #[serde(rename = "@status", default)]
        pub status: Option<i32>,
        #[serde(rename = "outcome", default)]
        pub outcomes: Vec<RawProbabilityOutcome>,
    }

    #[derive(Debug, Deserialize)]
    pub struct RawProbabilityOutcome {
        #[serde(rename = "@id")]
        pub id: String,
        #[serde(rename = "@active", default)]
        pub active: Option<u8>,
        #[serde(rename = "@probabilities", default)]
        pub probabilities: Option<f64>,
    }

    impl From<Cashout> for Probabilities {
        fn from(raw: Cashout) -> Self {
            Self {
                producer: Producer(raw.product),
                event_urn: raw.event_id,
                timestamp: raw.timestamp,
                markets: raw
                    .odds
                    .map(|o| o.markets)
                    .unwrap_or_default()
                    .into_iter()
                    .map(|m| ProbabilityMarket {
                        id: m.id,
                        specifiers: m.specifiers,
                        status: m.status,
                        outcomes: m
                            .outcomes
                            .into_iter()
                            .map(|o| ProbabilityOutcome {
                                id: o.id,
                                active: o.active == Some(1),
                                probability: o.probabilities,
                            })
                            .collect(),
                    })
                    .collect(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<fixtures_fixture generated_at="2024-03-01T10:00:00+00:00">
  <fixture id="sr:match:41762137" scheduled="2024-03-02T15:00:00+00:00" start_time="2024-03-02T15:00:00+00:00" status="not_started" liveodds="booked">
    <tournament_round type="group" number="27"/>
    <season id="sr:season:105353" name="Premier League 23/24" start_date="2023-08-11" end_date="2024-05-19"/>
    <tournament id="sr:tournament:17" name="Premier League">
      <sport id="sr:sport:1" name="Soccer"/>
      <category id="sr:category:1" name="England" country_code="ENG"/>
    </tournament>
    <competitors>
      <competitor qualifier="home" id="sr:competitor:44" name="Liverpool" abbreviation="LIV" country_code="ENG"/>
      <competitor qualifier="away" id="sr:competitor:42" name="Arsenal" abbreviation="ARS" country_code="ENG"/>
    </competitors>
    <venue id="sr:venue:579" name="Anfield" capacity="61276" city_name="Liverpool" country_code="ENG"/>
  </fixture>
</fixtures_fixture>"#;

    #[test]
    fn fixture_derives_ids_and_home_away() {
        let fixture = Fixture::from_xml(FIXTURE_XML).unwrap();
        assert_eq!(fixture.id, 41_762_137);
        assert_eq!(fixture.urn.to_string(), "sr:match:41762137");
        assert_eq!(fixture.sport.as_ref().unwrap().id, 1);
        assert_eq!(fixture.category.as_ref().unwrap().name, "England");
        assert_eq!(fixture.tournament.as_ref().unwrap().id, 17);
        assert_eq!(fixture.home.as_ref().unwrap().name, "Liverpool");
        assert_eq!(fixture.away.as_ref().unwrap().abbreviation.as_deref(), Some("ARS"));
        assert_eq!(fixture.venue.as_ref().unwrap().capacity, Some(61_276));
        assert_eq!(fixture.display_name(), "Liverpool - Arsenal");
    }

    #[test]
    fn schedule_lists_every_sport_event() {
        let xml = r#"<schedule generated_at="2024-03-01T10:00:00+00:00">
  <sport_event id="sr:match:1" scheduled="2024-03-02T15:00:00+00:00" status="not_started">
    <tournament id="sr:tournament:17" name="Premier League">
      <sport id="sr:sport:1" name="Soccer"/>
    </tournament>
    <competitors>
      <competitor qualifier="home" id="sr:competitor:44" name="Liverpool"/>
      <competitor qualifier="away" id="sr:competitor:42" name="Arsenal"/>
    </competitors>
  </sport_event>
  <sport_event id="sr:stage:9" scheduled="2024-03-03T12:00:00+00:00" name="Race"/>
</schedule>"#;
        let fixtures = Fixture::list_from_schedule_xml(xml).unwrap();
        assert_eq!(fixtures.len(), 2);
        assert_eq!(fixtures[0].display_name(), "Liverpool - Arsenal");
        assert_eq!(fixtures[1].id, 9);
        assert_eq!(fixtures[1].display_name(), "Race");
        assert!(fixtures.iter().all(|f| f.generated_at.is_some()));
        assert!(Fixture::list_from_schedule_xml("<schedule/>").unwrap().is_empty());
    }

    #[test]
    fn market_descriptions_decode() {
        let xml = r#"<market_descriptions response_code="OK">
  <market id="1" name="1x2" groups="all|score|regular_play">
    <outcomes>
      <outcome id="1" name="{$competitor1}"/>
      <outcome id="2" name="draw"/>
      <outcome id="3" name="{$competitor2}"/>
    </outcomes>
  </market>
  <market id="18" name="Total" groups="all|score">
    <outcomes>
      <outcome id="12" name="over {total}"/>
      <outcome id="13" name="under {total}"/>
    </outcomes>
    <specifiers>
      <specifier name="total" type="decimal"/>
    </specifiers>
  </market>
</market_descriptions>"#;
        let markets = MarketDescription::list_from_xml(xml).unwrap();
        assert_eq!(markets.len(), 2);
        assert_eq!(markets[0].groups, vec!["all", "score", "regular_play"]);
        assert_eq!(markets[0].outcomes.len(), 3);
        assert_eq!(markets[1].specifiers[0].kind, "decimal");
    }

    #[test]
    fn player_profile_decode() {
        let xml = r#"<player_profile generated_at="2024-03-01T10:00:00+00:00">
  <player id="sr:player:159665" name="Salah, Mohamed" full_name="Mohamed Salah" type="forward" date_of_birth="1992-06-15" nationality="Egypt" country_code="EGY"/>
</player_profile>"#;
        let player = Player::from_xml(xml).unwrap();
        assert_eq!(player.id, 159_665);
        assert_eq!(player.full_name.as_deref(), Some("Mohamed Salah"));
        assert_eq!(player.position.as_deref(), Some("forward"));
    }

    #[test]
    fn probabilities_decode() {
        let xml = r#"<cashout product="1" event_id="sr:match:1234" timestamp="1700000000000">
  <odds>
    <market id="1" status="1">
      <outcome id="1" active="1" probabilities="0.45"/>
      <outcome id="2" active="0"/>
    </market>
  </odds>
</cashout>"#;
        let probs = Probabilities::from_xml(xml).unwrap();
        assert_eq!(probs.producer, Producer(1));
        assert_eq!(probs.markets[0].outcomes.len(), 2);
        assert!(probs.markets[0].outcomes[0].active);
        assert_eq!(probs.markets[0].outcomes[0].probability, Some(0.45));
        assert!(!probs.markets[0].outcomes[1].active);
    }
}
