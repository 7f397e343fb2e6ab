//! API Client Integration Tests
//!
//! Exercises retry, status handling and response decoding against a mock
//! HTTP server.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use odds_feed::application::ports::{ApiError, RecoveryPort, ReferenceData};
use odds_feed::infrastructure::api::{ApiClient, RetryConfig};
use odds_feed::{Credentials, Environment, FeedConfig, Lang, Producer, ReplayOptions, Urn};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const FIXTURE_XML: &str = r#"<fixtures_fixture generated_at="2024-03-01T10:00:00+00:00">
  <fixture id="sr:match:1" start_time="2024-03-02T15:00:00+00:00">
    <tournament id="sr:tournament:17" name="Premier League">
      <sport id="sr:sport:1" name="Soccer"/>
      <category id="sr:category:1" name="England"/>
    </tournament>
    <competitors>
      <competitor qualifier="home" id="sr:competitor:44" name="Liverpool"/>
      <competitor qualifier="away" id="sr:competitor:42" name="Arsenal"/>
    </competitors>
  </fixture>
</fixtures_fixture>"#;

const CASHOUT_XML: &str = r#"<cashout product="1" event_id="sr:match:1234" timestamp="1700000000000">
  <odds>
    <market id="1" status="1">
      <outcome id="1" active="1" probabilities="0.45"/>
      <outcome id="2" active="1" probabilities="0.30"/>
    </market>
    <market id="18" specifiers="total=2.5" status="1">
      <outcome id="12" active="1" probabilities="0.55"/>
    </market>
  </odds>
</cashout>"#;

const SCHEDULE_XML: &str = r#"<schedule generated_at="2024-03-01T10:00:00+00:00">
  <sport_event id="sr:match:1" scheduled="2024-03-01T09:00:00+00:00" status="live">
    <competitors>
      <competitor qualifier="home" id="sr:competitor:44" name="Liverpool"/>
      <competitor qualifier="away" id="sr:competitor:42" name="Arsenal"/>
    </competitors>
  </sport_event>
</schedule>"#;

fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 4,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
        multiplier: 2.0,
    }
}

fn client(server: &MockServer, environment: Environment, node_id: i32) -> ApiClient {
    let config = FeedConfig::builder(Credentials::new("1234", "secret-token"))
        .environment(environment)
        .node_id(node_id)
        .api_base_url(server.uri())
        .retry(fast_retry())
        .request_timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    ApiClient::new(&config, CancellationToken::new()).unwrap()
}

#[tokio::test]
async fn retries_transient_status_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/3/recovery/initiate_request"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(3)
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/3/recovery/initiate_request"))
        .and(query_param("after", "1000"))
        .and(query_param("request_id", "7"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server, Environment::Staging, 0);
    api.request_recovery(Producer(3), 1000, 7).await.unwrap();
}

#[tokio::test]
async fn gives_up_after_max_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .expect(4)
        .mount(&server)
        .await;

    let api = client(&server, Environment::Staging, 0);
    let err = api.request_recovery(Producer(1), 0, 9).await.unwrap_err();

    assert_eq!(err.status(), Some(503));
    match err {
        ApiError::Status { url, body, .. } => {
            assert!(url.ends_with("/v1/1/recovery/initiate_request?request_id=9"));
            assert_eq!(body, "unavailable");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server, Environment::Staging, 0);
    let lang: Lang = "en".parse().unwrap();
    let urn: Urn = "sr:match:1".parse().unwrap();
    let err = api.fixture(&lang, &urn).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn every_request_carries_access_token_and_node_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/1/odds/events/sr:match:5/initiate_request"))
        .and(header("x-access-token", "secret-token"))
        .and(query_param("request_id", "11"))
        .and(query_param("node_id", "4"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server, Environment::Staging, 4);
    let urn: Urn = "sr:match:5".parse().unwrap();
    api.recover_event_odds(Producer(1), &urn, 11).await.unwrap();
}

#[tokio::test]
async fn stateful_event_recovery_carries_token_and_node_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/3/stateful_messages/events/sr:match:5/initiate_request"))
        .and(header("x-access-token", "secret-token"))
        .and(query_param("request_id", "12"))
        .and(query_param("node_id", "4"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server, Environment::Staging, 4);
    let urn: Urn = "sr:match:5".parse().unwrap();
    api.recover_event_stateful(Producer(3), &urn, 12).await.unwrap();
}

#[tokio::test]
async fn event_recovery_without_node_id_sends_zero() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/1/odds/events/sr:match:5/initiate_request"))
        .and(query_param("node_id", "0"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/1/stateful_messages/events/sr:match:5/initiate_request"))
        .and(query_param("node_id", "0"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server, Environment::Staging, 0);
    let urn: Urn = "sr:match:5".parse().unwrap();
    api.recover_event_odds(Producer(1), &urn, 1).await.unwrap();
    api.recover_event_stateful(Producer(1), &urn, 2).await.unwrap();
}

#[tokio::test]
async fn probabilities_are_read_per_event_and_per_market() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/probabilities/sr:match:1234"))
        .and(header("x-access-token", "secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CASHOUT_XML))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/probabilities/sr:match:1234/18"))
        .and(header("x-access-token", "secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_string(CASHOUT_XML))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server, Environment::Staging, 0);
    let urn: Urn = "sr:match:1234".parse().unwrap();

    let all = api.probabilities_event(&urn).await.unwrap();
    assert_eq!(all.producer, Producer(1));
    assert_eq!(all.event_urn, urn);
    assert_eq!(all.markets.len(), 2);
    assert_eq!(all.markets[0].outcomes[0].probability, Some(0.45));

    let one = api.probabilities_market(&urn, 18).await.unwrap();
    assert_eq!(one.markets[1].specifiers.as_deref(), Some("total=2.5"));
}

#[tokio::test]
async fn probabilities_status_errors_surface() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no probabilities"))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server, Environment::Staging, 0);
    let urn: Urn = "sr:match:1".parse().unwrap();
    let err = api.probabilities_market(&urn, 1).await.unwrap_err();
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn schedules_are_paged() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/sports/en/schedules/live/schedule.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SCHEDULE_XML))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/sports/en/schedules/pre/schedule.xml"))
        .and(query_param("start", "1000"))
        .and(query_param("limit", "1000"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<schedule/>"))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server, Environment::Staging, 0);
    let lang: Lang = "en".parse().unwrap();
    let live = api.live_schedule(&lang).await.unwrap();
    assert_eq!(live.len(), 1);
    assert_eq!(live[0].display_name(), "Liverpool - Arsenal");
    assert!(api.schedule(&lang, 1000, 1000).await.unwrap().is_empty());
}

#[tokio::test]
async fn fixture_is_decoded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/sports/de/sport_events/sr:match:1/fixture.xml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(FIXTURE_XML))
        .mount(&server)
        .await;

    let api = client(&server, Environment::Staging, 0);
    let lang: Lang = "de".parse().unwrap();
    let urn: Urn = "sr:match:1".parse().unwrap();
    let fixture = api.fixture(&lang, &urn).await.unwrap();

    assert_eq!(fixture.display_name(), "Liverpool - Arsenal");
    assert_eq!(fixture.tournament.as_ref().map(|t| t.id), Some(17));
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server, Environment::Staging, 0);
    let lang: Lang = "en".parse().unwrap();
    let err = api.player(&lang, 7).await.unwrap_err();
    assert!(matches!(err, ApiError::Decode { .. }));
}

#[tokio::test]
async fn replay_is_refused_in_production() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let api = client(&server, Environment::Production, 0);
    let err = api.stop().await.unwrap_err();
    assert!(matches!(err, ApiError::ReplayUnavailable { .. }));
}

#[tokio::test]
async fn replay_event_resets_adds_and_plays() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/replay/reset"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/replay/events/sr:match:42"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/replay/play"))
        .and(query_param("speed", "10"))
        .and(query_param("max_delay", "10000"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let api = client(&server, Environment::Replay, 0);
    let urn: Urn = "sr:match:42".parse().unwrap();
    api.start_event(&urn, ReplayOptions::default()).await.unwrap();
}

#[tokio::test]
async fn cancelled_client_stops_retrying() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = FeedConfig::builder(Credentials::new("1", "t"))
        .environment(Environment::Staging)
        .api_base_url(server.uri())
        .retry(RetryConfig {
            initial_backoff: Duration::from_secs(60),
            max_backoff: Duration::from_secs(60),
            ..fast_retry()
        })
        .build()
        .unwrap();
    let cancel = CancellationToken::new();
    let api = ApiClient::new(&config, cancel.clone()).unwrap();

    let call = tokio::spawn(async move { api.ping().await });
    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();

    let err = tokio::time::timeout(Duration::from_secs(5), call)
        .await
        .unwrap()
        .unwrap()
        .unwrap_err();
    assert!(matches!(err, ApiError::Cancelled { .. }));
}
