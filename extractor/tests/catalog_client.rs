//! `CatalogClient` against a local `wiremock` server. Waits go through a
//! `RecordingSleeper`, so the tests see every requested delay without sleeping.

mod common;

use std::sync::Arc;
use std::time::Duration;

use catalog_core::Config;
use catalog_extractor::catalog::{CatalogClient, CatalogSource, FetchOutcome, INCLUDED_DATA};
use catalog_extractor::market::Market;
use catalog_extractor::model::AccessToken;
use common::RecordingSleeper;
use pretty_assertions::assert_eq;
use reqwest::StatusCode;
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ITEM_PATH: &str = "/catalog/2022-04-01/items/B001";
const DE_MARKETPLACE: &str = "A1PA6795UKMFR9";

fn client(server: &MockServer, sleeper: Arc<RecordingSleeper>) -> CatalogClient {
    let mut api = Config::default().api;
    api.endpoint_override = Some(server.uri());
    CatalogClient::new(reqwest::Client::new(), sleeper, &api)
}

fn token() -> AccessToken {
    AccessToken::new("Atza|test-token", Some(3600))
}

fn item_json() -> serde_json::Value {
    json!({
        "asin": "B001",
        "identifiers": [],
        "summaries": [{"marketplaceId": DE_MARKETPLACE, "itemName": "Test"}],
        "vendorDetails": []
    })
}

async fn fetch(client: &CatalogClient) -> FetchOutcome {
    client.fetch("B001", DE_MARKETPLACE, &token(), Market::De).await
}

#[tokio::test]
async fn sends_marketplace_facets_and_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ITEM_PATH))
        .and(query_param("marketplaceIds", DE_MARKETPLACE))
        .and(query_param("includedData", INCLUDED_DATA))
        .and(header("x-amz-access-token", "Atza|test-token"))
        .and(header("accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(item_json()))
        .expect(1)
        .mount(&server)
        .await;

    let sleeper = Arc::new(RecordingSleeper::new());
    let outcome = fetch(&client(&server, Arc::clone(&sleeper))).await;

    assert_eq!(outcome, FetchOutcome::Found(item_json()));
    assert!(sleeper.waits().is_empty());
}

#[tokio::test]
async fn retries_processing_responses_until_ready() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ITEM_PATH))
        .respond_with(ResponseTemplate::new(202))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(ITEM_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(item_json()))
        .expect(1)
        .mount(&server)
        .await;

    let sleeper = Arc::new(RecordingSleeper::new());
    let outcome = fetch(&client(&server, Arc::clone(&sleeper))).await;

    assert_eq!(outcome.into_payload(), Some(item_json()));
    assert_eq!(
        sleeper.waits(),
        vec![Duration::from_secs(5), Duration::from_secs(5)]
    );
}

#[tokio::test]
async fn gives_up_after_three_processing_responses() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ITEM_PATH))
        .respond_with(ResponseTemplate::new(202))
        .expect(3)
        .mount(&server)
        .await;

    let sleeper = Arc::new(RecordingSleeper::new());
    let outcome = fetch(&client(&server, Arc::clone(&sleeper))).await;

    assert_eq!(outcome, FetchOutcome::StillProcessing { attempts: 3 });
    // Waits happen between attempts only
    assert_eq!(sleeper.waits().len(), 2);
}

#[tokio::test]
async fn not_found_is_terminal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ITEM_PATH))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "errors": [{"code": "NOT_FOUND", "message": "Requested item 'B001' not found"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let sleeper = Arc::new(RecordingSleeper::new());
    let outcome = fetch(&client(&server, Arc::clone(&sleeper))).await;

    assert_eq!(outcome, FetchOutcome::Rejected(StatusCode::NOT_FOUND));
    assert!(sleeper.waits().is_empty());
}

#[tokio::test]
async fn server_error_is_terminal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ITEM_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let sleeper = Arc::new(RecordingSleeper::new());
    let outcome = fetch(&client(&server, Arc::clone(&sleeper))).await;

    assert_eq!(outcome, FetchOutcome::Rejected(StatusCode::INTERNAL_SERVER_ERROR));
    assert_eq!(outcome.into_payload(), None);
    assert!(sleeper.waits().is_empty());
}

#[tokio::test]
async fn throttling_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ITEM_PATH))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;

    let sleeper = Arc::new(RecordingSleeper::new());
    let outcome = fetch(&client(&server, Arc::clone(&sleeper))).await;

    assert_eq!(outcome, FetchOutcome::Rejected(StatusCode::TOO_MANY_REQUESTS));
    assert!(sleeper.waits().is_empty());
}

#[tokio::test]
async fn other_success_codes_end_the_fetch() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ITEM_PATH))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let sleeper = Arc::new(RecordingSleeper::new());
    let outcome = fetch(&client(&server, Arc::clone(&sleeper))).await;

    assert_eq!(outcome, FetchOutcome::UnexpectedStatus(StatusCode::NO_CONTENT));
    assert!(sleeper.waits().is_empty());
}

#[tokio::test]
async fn malformed_body_yields_no_payload() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(ITEM_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let sleeper = Arc::new(RecordingSleeper::new());
    let outcome = fetch(&client(&server, sleeper)).await;

    assert!(matches!(outcome, FetchOutcome::Undecodable(_)), "got {outcome:?}");
}

#[tokio::test]
async fn unreachable_endpoint_is_a_transport_failure() {
    let mut api = Config::default().api;
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    api.endpoint_override = Some(format!("http://127.0.0.1:{port}"));
    let sleeper = Arc::new(RecordingSleeper::new());
    let client = CatalogClient::new(reqwest::Client::new(), Arc::clone(&sleeper) as _, &api);

    let outcome = fetch(&client).await;

    assert!(matches!(outcome, FetchOutcome::Transport(_)), "got {outcome:?}");
    assert!(sleeper.waits().is_empty());
}
