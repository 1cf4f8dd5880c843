use chrono::{DateTime, Duration, Utc};
use sqlx::{postgres::PgRow, Row};
use std::collections::HashMap;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::helpers::TestApp;

struct SubscriberRow {
    email: String,
    status: String,
    confirm_token: Option<String>,
    confirm_token_expires_at: Option<DateTime<Utc>>,
    unsubscribe_token: String,
}

async fn fetch_subscriber(test_app: &TestApp, email: &str) -> SubscriberRow {
    sqlx::query(
        "SELECT email, status, confirm_token, confirm_token_expires_at, unsubscribe_token \
         FROM subscribers WHERE email = $1",
    )
    .bind(email)
    .map(|row: PgRow| SubscriberRow {
        email: row.get("email"),
        status: row.get("status"),
        confirm_token: row.get("confirm_token"),
        confirm_token_expires_at: row.get("confirm_token_expires_at"),
        unsubscribe_token: row.get("unsubscribe_token"),
    })
    .fetch_one(&test_app.db_pool)
    .await
    .expect("Query to fetch the subscriber failed.")
}

async fn count_subscribers(test_app: &TestApp) -> i64 {
    sqlx::query("SELECT COUNT(*) AS total FROM subscribers")
        .map(|row: PgRow| row.get::<i64, _>("total"))
        .fetch_one(&test_app.db_pool)
        .await
        .expect("Query to count subscribers failed.")
}

#[tokio::test]
async fn subscribe_returns_200_when_body_is_valid() {
    let test_app = TestApp::spawn_app().await;
    let mut body = HashMap::new();

    body.insert("email", "frank@test.com");

    Mock::given(path("/mail/send"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&test_app.email_server)
        .await;

    let response = test_app.post_subscription(body).await;

    assert_eq!(200, response.status().as_u16());

    let payload: serde_json::Value = response.json().await.unwrap();

    assert_eq!(payload["success"], true);
}

#[tokio::test]
async fn subscribe_persists_a_pending_subscriber_with_both_tokens() {
    let test_app = TestApp::spawn_app().await;
    let mut body = HashMap::new();

    // Mixed case on purpose: the stored row must be normalized
    body.insert("email", "Test@Test.com");

    Mock::given(path("/mail/send"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&test_app.email_server)
        .await;

    test_app.post_subscription(body).await;

    let subscriber = fetch_subscriber(&test_app, "test@test.com").await;
    let now = Utc::now();

    assert_eq!(subscriber.email, "test@test.com");
    assert_eq!(subscriber.status, "pending_confirmation");
    assert!(subscriber.confirm_token.is_some());
    assert!(!subscriber.unsubscribe_token.is_empty());

    // Expiry sits roughly a day out
    let expires_at = subscriber.confirm_token_expires_at.unwrap();
    assert!(expires_at > now + Duration::hours(23));
    assert!(expires_at < now + Duration::hours(25));
}

#[tokio::test]
async fn subscribe_returns_400_when_body_is_invalid() {
    let test_app = TestApp::spawn_app().await;

    // This is a common practice and it is called table-driven tests. In this case, it simulates different kind of possible request bodies
    // where API should return 400.
    let test_cases: Vec<(HashMap<&str, &str>, &str)> = vec![
        (HashMap::from([]), "missing email parameter"),
        (HashMap::from([("email", "")]), "email cannot be empty"),
        (
            HashMap::from([("email", "not-an-email")]),
            "malformed email parameter",
        ),
    ];

    for (invalid_body, error_message) in test_cases {
        let response = test_app.post_subscription(invalid_body).await;

        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not fail with 400 status when payload was {}",
            error_message
        );
    }

    // No rows, no emails
    assert_eq!(count_subscribers(&test_app).await, 0);
    assert!(test_app
        .email_server
        .received_requests()
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn subscribe_sends_a_confirmation_email_with_a_link() {
    let test_app = TestApp::spawn_app().await;
    let mut body = HashMap::new();

    body.insert("email", "test@test.com");

    Mock::given(path("/mail/send"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&test_app.email_server)
        .await;

    test_app.post_subscription(body).await;

    // Get the first request that was sent to the email server
    let received_requests = &test_app.email_server.received_requests().await.unwrap();

    assert_eq!(received_requests.len(), 1);

    let confirmation_link = test_app.get_confirmation_link(&received_requests[0]).await;

    assert!(confirmation_link
        .html
        .path()
        .starts_with("/subscriptions/confirm"));
}

#[tokio::test]
async fn subscribing_twice_keeps_one_row_and_sends_a_fresh_link() {
    let test_app = TestApp::spawn_app().await;
    let body = HashMap::from([("email", "test@test.com")]);

    Mock::given(path("/mail/send"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&test_app.email_server)
        .await;

    test_app.post_subscription(body.clone()).await;
    test_app.post_subscription(body).await;

    assert_eq!(count_subscribers(&test_app).await, 1);

    let received_requests = &test_app.email_server.received_requests().await.unwrap();

    assert_eq!(received_requests.len(), 2);

    let first_link = test_app.get_confirmation_link(&received_requests[0]).await;
    let second_link = test_app.get_confirmation_link(&received_requests[1]).await;

    // The second email carries a newly generated token
    assert_ne!(first_link.html.query(), second_link.html.query());

    // Only the fresh token is live
    let subscriber = fetch_subscriber(&test_app, "test@test.com").await;
    assert_eq!(
        format!("token={}", subscriber.confirm_token.unwrap()),
        second_link.html.query().unwrap()
    );
}

#[tokio::test]
async fn subscribe_returns_409_when_already_confirmed() {
    let test_app = TestApp::spawn_app().await;
    let client = reqwest::Client::new();
    let body = HashMap::from([("email", "test@test.com")]);

    Mock::given(path("/mail/send"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&test_app.email_server)
        .await;

    test_app.post_subscription(body.clone()).await;

    let received_requests = &test_app.email_server.received_requests().await.unwrap();
    let confirmation_link = test_app.get_confirmation_link(&received_requests[0]).await;

    client
        .get(confirmation_link.html)
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap();

    let response = test_app.post_subscription(body).await;

    assert_eq!(409, response.status().as_u16());
}

#[tokio::test]
async fn subscribe_rejects_disposable_email_domains() {
    let test_app = TestApp::spawn_app().await;
    let body = HashMap::from([("email", "spam@mailinator.com")]);

    let response = test_app.post_subscription(body).await;

    assert_eq!(422, response.status().as_u16());
    assert_eq!(count_subscribers(&test_app).await, 0);
}

#[tokio::test]
async fn subscribe_requests_over_quota_are_rejected_before_any_mutation() {
    let test_app = TestApp::spawn_app_with(|config| {
        config.set_subscribe_quota(2, 3600);
    })
    .await;

    Mock::given(path("/mail/send"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&test_app.email_server)
        .await;

    test_app
        .post_subscription(HashMap::from([("email", "first@test.com")]))
        .await;
    test_app
        .post_subscription(HashMap::from([("email", "second@test.com")]))
        .await;

    let response = test_app
        .post_subscription(HashMap::from([("email", "third@test.com")]))
        .await;

    assert_eq!(429, response.status().as_u16());
    // The limited request never reached the database
    assert_eq!(count_subscribers(&test_app).await, 2);
}
