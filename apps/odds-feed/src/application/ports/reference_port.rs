//! Reference Data Port (Driven Port)
//!
//! Read endpoints used by the enrichment stages.

use async_trait::async_trait;

use super::ApiError;
use crate::domain::{Fixture, Lang, MarketDescription, Player, Urn};

/// Port for reference-data reads.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReferenceData: Send + Sync {
    /// Every non-variant market description in a language.
    async fn markets(&self, lang: &Lang) -> Result<Vec<MarketDescription>, ApiError>;

    /// Description of one market variant.
    async fn market_variant(
        &self,
        lang: &Lang,
        market_id: u32,
        variant: &str,
    ) -> Result<Vec<MarketDescription>, ApiError>;

    /// Fixture of a sport event.
    async fn fixture(&self, lang: &Lang, event: &Urn) -> Result<Fixture, ApiError>;

    /// Player profile.
    async fn player(&self, lang: &Lang, player_id: u64) -> Result<Player, ApiError>;

    /// Fixtures of every event currently live.
    async fn live_schedule(&self, lang: &Lang) -> Result<Vec<Fixture>, ApiError>;

    /// One page of upcoming fixtures, ordered by start time.
    async fn schedule(
        &self,
        lang: &Lang,
        start: usize,
        limit: usize,
    ) -> Result<Vec<Fixture>, ApiError>;
}
