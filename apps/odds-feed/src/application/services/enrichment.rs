//! Enrichment Stages
//!
//! Each stage looks up reference data for the identifiers an event
//! references, in every configured language, and appends the results to
//! the event's annotation slot. Lookups go through a cache keyed by
//! (identifier, language); cached pairs never reach the network.
//!
//! Lookups for different languages run concurrently; within a language
//! they run one after another and re-check the cache, so a batch response
//! (the market catalogue) serves every later key of the same language.
//! An identifier a successful lookup did not return is remembered as
//! absent and not looked up again, and a batch is requested at most once
//! per event and language even when it fails.
//!
//! Events always leave the stage in arrival order. A failed lookup is an
//! advisory fault and the event continues without that annotation.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::Instrument;

use crate::application::pipeline::{FaultSink, Stage};
use crate::application::ports::{ApiError, ReferenceData, SharedCache};
use crate::domain::{
    FeedEvent, Fixture, Lang, MarketDescription, MessageKind, Player, Urn,
};
use crate::error::{Fault, FeedError};
use crate::infrastructure::{metrics, telemetry};

/// Schedule page size used by the fixture preload.
pub const SCHEDULE_PAGE: usize = 1000;

/// Lookup strategy of one enrichment stage.
#[async_trait]
pub trait Enricher: Send + Sync + 'static {
    /// Identifier type.
    type Key: Clone + Eq + Hash + fmt::Display + Send + Sync + 'static;
    /// Reference record type.
    type Value: Send + Sync + 'static;

    /// Stage name.
    const NAME: &'static str;

    /// Identifiers referenced by an event; empty when the stage does not
    /// apply.
    fn keys(&self, event: &FeedEvent) -> Vec<Self::Key>;

    /// Bypass the cache for this event.
    fn force_refresh(&self, _event: &FeedEvent) -> bool {
        false
    }

    /// Whether `key` is served by one language-wide response, so that a
    /// single fetch answers every such key.
    fn batched(&self, _key: &Self::Key) -> bool {
        false
    }

    /// Records to cache before the first event is processed.
    async fn preload(&self, _lang: &Lang) -> Result<Vec<(Self::Key, Arc<Self::Value>)>, ApiError> {
        Ok(Vec::new())
    }

    /// Fetch `key` in `lang`. May return further records from the same
    /// response, which are cached as well.
    async fn fetch(
        &self,
        key: &Self::Key,
        lang: &Lang,
    ) -> Result<Vec<(Self::Key, Arc<Self::Value>)>, ApiError>;

    /// Append a record to the event.
    fn attach(event: &mut FeedEvent, lang: Lang, value: Arc<Self::Value>);
}

/// Stage running one [`Enricher`].
pub struct EnrichmentStage<E: Enricher> {
    enricher: E,
    languages: Vec<Lang>,
    cache: SharedCache<(E::Key, Lang), Arc<E::Value>>,
    absent: Mutex<HashSet<(E::Key, Lang)>>,
}

/// Batch response state within one event and language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Batch {
    NotFetched,
    Loaded,
    Failed,
}

impl<E: Enricher> EnrichmentStage<E> {
    /// Create a stage.
    #[must_use]
    pub fn new(
        enricher: E,
        languages: Vec<Lang>,
        cache: SharedCache<(E::Key, Lang), Arc<E::Value>>,
    ) -> Self {
        Self {
            enricher,
            languages,
            cache,
            absent: Mutex::new(HashSet::new()),
        }
    }

    async fn preload(&self, faults: &FaultSink) {
        let loads = self
            .languages
            .iter()
            .map(|lang| async move { (lang, self.enricher.preload(lang).await) });

        for (lang, result) in join_all(loads).await {
            match result {
                Ok(records) if records.is_empty() => {}
                Ok(records) => {
                    let count = records.len();
                    for (key, value) in records {
                        self.cache.insert((key, lang.clone()), value);
                    }
                    tracing::info!(stage = E::NAME, %lang, count, "Reference cache preloaded");
                }
                Err(source) => faults.report(Fault::advisory(
                    E::NAME,
                    FeedError::Enrichment {
                        stage: E::NAME,
                        key: "preload".to_string(),
                        lang: lang.clone(),
                        source,
                    },
                )),
            }
        }
    }

    async fn enrich(&self, event: &mut FeedEvent, faults: &FaultSink) {
        let mut keys = self.enricher.keys(event);
        dedup_in_order(&mut keys);
        if keys.is_empty() {
            return;
        }
        let refresh = self.enricher.force_refresh(event);

        let lookups = self
            .languages
            .iter()
            .map(|lang| self.lookup_language(&keys, lang, refresh, faults));
        let found: HashMap<(E::Key, Lang), Arc<E::Value>> =
            join_all(lookups).await.into_iter().flatten().collect();

        for key in &keys {
            for lang in &self.languages {
                if let Some(value) = found.get(&(key.clone(), lang.clone())) {
                    E::attach(event, lang.clone(), Arc::clone(value));
                }
            }
        }
    }

    async fn lookup_language(
        &self,
        keys: &[E::Key],
        lang: &Lang,
        refresh: bool,
        faults: &FaultSink,
    ) -> Vec<((E::Key, Lang), Arc<E::Value>)> {
        let mut found = Vec::with_capacity(keys.len());
        let mut fetched: HashMap<E::Key, Arc<E::Value>> = HashMap::new();
        let mut batch = Batch::NotFetched;

        for key in keys {
            if let Some(value) = fetched.get(key) {
                found.push(((key.clone(), lang.clone()), Arc::clone(value)));
                continue;
            }
            let cache_key = (key.clone(), lang.clone());
            if !refresh {
                if let Some(value) = self.cache.get(&cache_key) {
                    metrics::record_cache_lookup(E::NAME, true);
                    found.push((cache_key, value));
                    continue;
                }
                if self.absent.lock().contains(&cache_key) {
                    metrics::record_cache_lookup(E::NAME, true);
                    continue;
                }
            }

            let batched = self.enricher.batched(key);
            match batch {
                Batch::Loaded if batched => {
                    tracing::debug!(stage = E::NAME, %key, %lang, "Not in batch response");
                    self.absent.lock().insert(cache_key);
                    continue;
                }
                Batch::Failed if batched => continue,
                _ => {}
            }
            metrics::record_cache_lookup(E::NAME, false);

            match self.enricher.fetch(key, lang).await {
                Ok(records) => {
                    if batched {
                        batch = Batch::Loaded;
                    }
                    for (record_key, value) in records {
                        self.cache
                            .insert((record_key.clone(), lang.clone()), Arc::clone(&value));
                        fetched.insert(record_key, value);
                    }
                    match fetched.get(key) {
                        Some(value) => {
                            self.absent.lock().remove(&cache_key);
                            found.push((cache_key, Arc::clone(value)));
                        }
                        None => {
                            tracing::debug!(stage = E::NAME, %key, %lang, "Lookup returned no record");
                            self.absent.lock().insert(cache_key);
                        }
                    }
                }
                Err(source) => {
                    if batched {
                        batch = Batch::Failed;
                    }
                    faults.report(Fault::advisory(
                        E::NAME,
                        FeedError::Enrichment {
                            stage: E::NAME,
                            key: key.to_string(),
                            lang: lang.clone(),
                            source,
                        },
                    ));
                }
            }
        }
        found
    }
}

#[async_trait]
impl<E: Enricher> Stage for EnrichmentStage<E> {
    fn name(&self) -> &'static str {
        E::NAME
    }

    async fn run(
        self: Box<Self>,
        mut input: mpsc::Receiver<FeedEvent>,
        output: mpsc::Sender<FeedEvent>,
        faults: FaultSink,
    ) {
        self.preload(&faults).await;

        while let Some(mut event) = input.recv().await {
            let span = telemetry::enrich_span(E::NAME, &event);
            self.enrich(&mut event, &faults).instrument(span).await;
            if output.send(event).await.is_err() {
                tracing::debug!(stage = E::NAME, "Downstream closed, draining input");
                while input.recv().await.is_some() {}
                break;
            }
        }
        tracing::debug!(stage = E::NAME, cached = self.cache.len(), "Enrichment stage finished");
    }
}

fn dedup_in_order<K: Clone + Eq + Hash>(keys: &mut Vec<K>) {
    let mut seen = std::collections::HashSet::with_capacity(keys.len());
    keys.retain(|k| seen.insert(k.clone()));
}

// =============================================================================
// Markets
// =============================================================================

/// Market description identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MarketKey {
    /// Market id.
    pub id: u32,
    /// Variant, for variant markets.
    pub variant: Option<String>,
}

impl fmt::Display for MarketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.variant {
            Some(variant) => write!(f, "market {} ({variant})", self.id),
            None => write!(f, "market {}", self.id),
        }
    }
}

/// Attaches market descriptions to odds, settlement and cancel messages.
///
/// A miss on a non-variant market fetches the whole catalogue of the
/// language; variant markets use the variant endpoint. Markets missing
/// from a loaded catalogue are not requested again.
pub struct MarketEnricher {
    api: Arc<dyn ReferenceData>,
}

impl MarketEnricher {
    /// Create an enricher backed by `api`.
    #[must_use]
    pub fn new(api: Arc<dyn ReferenceData>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Enricher for MarketEnricher {
    type Key = MarketKey;
    type Value = MarketDescription;

    const NAME: &'static str = "market";

    fn keys(&self, event: &FeedEvent) -> Vec<MarketKey> {
        if !event.kind().carries_markets() {
            return Vec::new();
        }
        event
            .markets()
            .iter()
            .map(|m| MarketKey {
                id: m.id,
                variant: m.variant().map(str::to_string),
            })
            .collect()
    }

    fn batched(&self, key: &MarketKey) -> bool {
        key.variant.is_none()
    }

    async fn fetch(
        &self,
        key: &MarketKey,
        lang: &Lang,
    ) -> Result<Vec<(MarketKey, Arc<MarketDescription>)>, ApiError> {
        let records = match &key.variant {
            Some(variant) => self
                .api
                .market_variant(lang, key.id, variant)
                .await?
                .into_iter()
                .map(|d| {
                    let k = MarketKey {
                        id: d.id,
                        variant: Some(variant.clone()),
                    };
                    (k, Arc::new(d))
                })
                .collect(),
            None => self
                .api
                .markets(lang)
                .await?
                .into_iter()
                .map(|d| {
                    let k = MarketKey {
                        id: d.id,
                        variant: None,
                    };
                    (k, Arc::new(d))
                })
                .collect(),
        };
        Ok(records)
    }

    fn attach(event: &mut FeedEvent, lang: Lang, value: Arc<MarketDescription>) {
        event.annotate_market(lang, value);
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// Attaches the fixture of the event's sport event.
///
/// `fixture_change` messages bypass the cache and overwrite the entry.
/// With a preload horizon, the live schedule and every scheduled event
/// starting before the horizon are cached before the first event, which
/// spares one fixture request per event during recovery.
pub struct FixtureEnricher {
    api: Arc<dyn ReferenceData>,
    preload_until: Option<DateTime<Utc>>,
}

impl FixtureEnricher {
    /// Create an enricher backed by `api`.
    #[must_use]
    pub fn new(api: Arc<dyn ReferenceData>) -> Self {
        Self {
            api,
            preload_until: None,
        }
    }

    /// Preload fixtures of events starting before `until`.
    #[must_use]
    pub const fn preload_until(mut self, until: Option<DateTime<Utc>>) -> Self {
        self.preload_until = until;
        self
    }
}

#[async_trait]
impl Enricher for FixtureEnricher {
    type Key = Urn;
    type Value = Fixture;

    const NAME: &'static str = "fixture";

    fn keys(&self, event: &FeedEvent) -> Vec<Urn> {
        if event.kind().is_system() {
            return Vec::new();
        }
        event.event_urn().cloned().into_iter().collect()
    }

    fn force_refresh(&self, event: &FeedEvent) -> bool {
        event.kind() == MessageKind::FixtureChange
    }

    async fn fetch(&self, key: &Urn, lang: &Lang) -> Result<Vec<(Urn, Arc<Fixture>)>, ApiError> {
        let fixture = self.api.fixture(lang, key).await?;
        Ok(vec![(key.clone(), Arc::new(fixture))])
    }

    async fn preload(&self, lang: &Lang) -> Result<Vec<(Urn, Arc<Fixture>)>, ApiError> {
        let Some(until) = self.preload_until else {
            return Ok(Vec::new());
        };

        let mut fixtures = self.api.live_schedule(lang).await?;
        let mut start = 0;
        loop {
            let page = self.api.schedule(lang, start, SCHEDULE_PAGE).await?;
            let len = page.len();
            let before = fixtures.len();
            fixtures.extend(
                page.into_iter()
                    .filter(|f| f.scheduled.or(f.start_time).is_none_or(|at| at <= until)),
            );
            // Pages are ordered by start time.
            if len < SCHEDULE_PAGE || fixtures.len() - before < len {
                break;
            }
            start += len;
        }

        Ok(fixtures
            .into_iter()
            .map(|f| (f.urn.clone(), Arc::new(f)))
            .collect())
    }

    fn attach(event: &mut FeedEvent, lang: Lang, value: Arc<Fixture>) {
        event.annotate_fixture(lang, value);
    }
}

// =============================================================================
// Players
// =============================================================================

/// Attaches profiles of players referenced by market specifiers.
pub struct PlayerEnricher {
    api: Arc<dyn ReferenceData>,
}

impl PlayerEnricher {
    /// Create an enricher backed by `api`.
    #[must_use]
    pub fn new(api: Arc<dyn ReferenceData>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Enricher for PlayerEnricher {
    type Key = u64;
    type Value = Player;

    const NAME: &'static str = "player";

    fn keys(&self, event: &FeedEvent) -> Vec<u64> {
        if !event.kind().carries_markets() {
            return Vec::new();
        }
        event.markets().iter().flat_map(|m| m.player_ids()).collect()
    }

    async fn fetch(&self, key: &u64, lang: &Lang) -> Result<Vec<(u64, Arc<Player>)>, ApiError> {
        let player = self.api.player(lang, *key).await?;
        Ok(vec![(*key, Arc::new(player))])
    }

    fn attach(event: &mut FeedEvent, lang: Lang, value: Arc<Player>) {
        event.annotate_player(lang, value);
    }
}
