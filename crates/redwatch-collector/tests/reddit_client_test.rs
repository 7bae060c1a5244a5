// Reddit client tests against a mocked API

use std::time::Duration;

use redwatch_collector::reddit::client::ListingSort;
use redwatch_collector::reddit::{
    FetchError, RedditAuthConfig, RedditClient, SubredditCollector,
};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn auth_config(server: &MockServer) -> RedditAuthConfig {
    RedditAuthConfig {
        client_id: "id".to_string(),
        client_secret: "secret".to_string(),
        username: "watcher".to_string(),
        password: "hunter2".to_string(),
        user_agent: "redwatch-test".to_string(),
        auth_base: server.uri(),
        api_base: server.uri(),
    }
}

async fn mock_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "test-token",
            "token_type": "bearer",
            "expires_in": 3600
        })))
        .mount(server)
        .await;
}

async fn connect(server: &MockServer) -> RedditClient {
    RedditClient::connect(&auth_config(server), Duration::from_secs(5))
        .await
        .expect("client should authenticate")
}

#[tokio::test]
async fn authenticates_and_fetches_about() {
    let server = MockServer::start().await;
    mock_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/r/rust/about"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "t5",
            "data": {
                "display_name": "rust",
                "title": "Rust",
                "subscribers": 12345,
                "public_description": "all things rust",
                "over18": false,
                "subreddit_type": "public",
                "lang": "en",
                "created_utc": 1264968000.0
            }
        })))
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let about = client.subreddit_about("r/rust").await.unwrap();

    assert_eq!(about.name, "r/rust");
    assert_eq!(about.subscribers, Some(12345));
    assert_eq!(about.is_nsfw, Some(false));
}

#[tokio::test]
async fn rejected_credentials_map_to_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/access_token"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let result = RedditClient::connect(&auth_config(&server), Duration::from_secs(5)).await;
    assert!(matches!(result, Err(FetchError::Auth)));
}

#[tokio::test]
async fn forbidden_subreddit_maps_to_typed_reason() {
    let server = MockServer::start().await;
    mock_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/r/private_club/about"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let err = client.subreddit_about("private_club").await.unwrap_err();
    assert!(matches!(err, FetchError::Forbidden));
}

#[tokio::test]
async fn missing_subreddit_maps_to_not_found() {
    let server = MockServer::start().await;
    mock_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/r/does_not_exist/about"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let err = client.subreddit_about("does_not_exist").await.unwrap_err();
    assert!(matches!(err, FetchError::NotFound));
}

#[tokio::test]
async fn listing_parses_posts() {
    let server = MockServer::start().await;
    mock_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/r/rust/hot"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "Listing",
            "data": {
                "children": [
                    {"kind": "t3", "data": {
                        "id": "aaa111", "title": "first", "score": 42,
                        "num_comments": 7, "created_utc": 1700000000.0
                    }},
                    {"kind": "t3", "data": {
                        "id": "bbb222", "title": "second", "score": 3,
                        "num_comments": 0, "created_utc": 1700000100.0
                    }}
                ]
            }
        })))
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let posts = client.listing("r/rust", ListingSort::Hot, 25).await.unwrap();

    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0].post_id, "aaa111");
    assert_eq!(posts[0].score, 42);
    assert_eq!(posts[1].num_comments, 0);
}

#[tokio::test]
async fn collector_meta_degrades_failed_subfetches_to_null() {
    let server = MockServer::start().await;
    mock_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/r/rust/about"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "t5",
            "data": {
                "display_name": "rust",
                "public_description": "all things rust",
                "allow_videos": true,
                "allow_images": false
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/r/rust/about/rules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "rules": [
                {"short_name": "be kind", "description": "no flames", "kind": "comment"}
            ]
        })))
        .mount(&server)
        .await;
    // Flair endpoint errors; the field degrades to null instead of
    // failing the subreddit.
    Mock::given(method("GET"))
        .and(path("/r/rust/api/link_flair"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let collector = SubredditCollector::fetch(&client, "r/rust").await.unwrap();
    let meta = collector.collect_meta().await;

    assert_eq!(meta.description.as_deref(), Some("all things rust"));
    assert_eq!(meta.allow_videos, Some(true));
    let rules = meta.rules_json.expect("rules should be present");
    assert_eq!(rules[0]["short_name"], "be kind");
    assert!(meta.flairs_json.is_none());
}

#[tokio::test]
async fn collector_memoizes_meta_subfetches() {
    let server = MockServer::start().await;
    mock_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/r/rust/about"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "kind": "t5",
            "data": {"display_name": "rust"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/r/rust/about/rules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"rules": []})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/r/rust/api/link_flair"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = connect(&server).await;
    let collector = SubredditCollector::fetch(&client, "r/rust").await.unwrap();

    // Two collections, one fetch each thanks to the per-instance memo.
    collector.collect_meta().await;
    collector.collect_meta().await;
}
