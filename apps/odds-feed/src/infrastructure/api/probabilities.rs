//! Probabilities Reads
//!
//! Cashout probabilities for a sport event, either for every market or for
//! one market.

use super::client::ApiClient;
use super::paths::{self, Params};
use crate::application::ports::ApiError;
use crate::domain::{Probabilities, Urn};

impl ApiClient {
    /// Probabilities for every market of an event.
    ///
    /// # Errors
    ///
    /// Returns the API error, or [`ApiError::Decode`] for unexpected
    /// payloads.
    pub async fn probabilities_event(&self, event: &Urn) -> Result<Probabilities, ApiError> {
        let path = self.render(paths::PROBABILITIES_EVENT, &Params::new().with("event", event))?;
        let body = self.get(&path).await?;
        Self::decode(&self.url(&path), &body, Probabilities::from_xml)
    }

    /// Probabilities for one market of an event.
    ///
    /// # Errors
    ///
    /// Returns the API error, or [`ApiError::Decode`] for unexpected
    /// payloads.
    pub async fn probabilities_market(
        &self,
        event: &Urn,
        market_id: u32,
    ) -> Result<Probabilities, ApiError> {
        let path = self.render(
            paths::PROBABILITIES_MARKET,
            &Params::new().with("event", event).with("market", market_id),
        )?;
        let body = self.get(&path).await?;
        Self::decode(&self.url(&path), &body, Probabilities::from_xml)
    }
}
