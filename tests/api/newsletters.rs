use std::collections::HashMap;

use wiremock::matchers::{any, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::helpers::{ConfirmationLink, TestApp};

fn newsletter_body() -> serde_json::Value {
    serde_json::json!({
        "subject": "Issue #1",
        "content_html": "<p>Newsletter content</p>",
    })
}

async fn create_unconfirmed_subscriber(test_app: &TestApp, email: &str) -> ConfirmationLink {
    // When executing a mock with the method mount_as_scoped, the mock will stop to listen the /mail/send endpoint when it goes out of scope (so, when the execution of create_unconfirmed_subscriber
    // ends).
    let _mock_guard = Mock::given(path("/mail/send"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .named("Create unconfirmed subscriber")
        .expect(1)
        .mount_as_scoped(&test_app.email_server)
        .await;

    test_app
        .post_subscription(HashMap::from([("email", email)]))
        .await;

    let received_requests = &test_app.email_server.received_requests().await.unwrap();

    test_app
        .get_confirmation_link(received_requests.last().unwrap())
        .await
}

async fn create_confirmed_subscriber(test_app: &TestApp, email: &str) {
    let confirmation_link = create_unconfirmed_subscriber(test_app, email).await;
    let client = reqwest::Client::new();

    let _mock_guard = Mock::given(path("/mail/send"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .named("Welcome email")
        .expect(1)
        .mount_as_scoped(&test_app.email_server)
        .await;

    client
        .get(confirmation_link.html)
        .send()
        .await
        .unwrap()
        .error_for_status()
        .unwrap();
}

#[tokio::test]
async fn newsletters_require_the_admin_token() {
    let test_app = TestApp::spawn_app().await;
    let client = reqwest::Client::new();

    // No Authorization header at all
    let response = client
        .post(format!("{}/newsletters", test_app.address))
        .json(&newsletter_body())
        .send()
        .await
        .expect("Failed to execute request.");

    assert_eq!(401, response.status().as_u16());

    // Wrong token
    let response = test_app
        .post_newsletter_with_token(newsletter_body(), "not-the-admin-token")
        .await;

    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn newsletters_are_not_delivered_to_unconfirmed_subscribers() {
    let test_app = TestApp::spawn_app().await;

    create_unconfirmed_subscriber(&test_app, "pending@test.com").await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&test_app.email_server)
        .await;

    let response = test_app.post_newsletter(newsletter_body()).await;

    assert_eq!(response.status().as_u16(), 200);

    let summary: serde_json::Value = response.json().await.unwrap();

    assert_eq!(summary["sent"], 0);
    assert_eq!(summary["failed"], 0);
}

#[tokio::test]
async fn newsletters_are_delivered_to_confirmed_subscribers() {
    let test_app = TestApp::spawn_app().await;

    create_confirmed_subscriber(&test_app, "confirmed@test.com").await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&test_app.email_server)
        .await;

    let response = test_app.post_newsletter(newsletter_body()).await;

    assert_eq!(response.status().as_u16(), 200);

    let summary: serde_json::Value = response.json().await.unwrap();

    assert_eq!(summary["sent"], 1);
    assert_eq!(summary["failed"], 0);
}

#[tokio::test]
async fn failed_deliveries_are_counted_in_the_summary() {
    let test_app = TestApp::spawn_app().await;

    create_confirmed_subscriber(&test_app, "confirmed@test.com").await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&test_app.email_server)
        .await;

    let response = test_app.post_newsletter(newsletter_body()).await;

    assert_eq!(response.status().as_u16(), 200);

    let summary: serde_json::Value = response.json().await.unwrap();

    assert_eq!(summary["sent"], 0);
    assert_eq!(summary["failed"], 1);
}

#[tokio::test]
async fn newsletters_return_400_when_body_is_invalid() {
    let test_app = TestApp::spawn_app().await;
    let test_cases = vec![
        (
            serde_json::json!({ "content_html": "<p>Newsletter content</p>" }),
            "missing subject",
        ),
        (
            serde_json::json!({ "subject": "Issue #1" }),
            "missing content",
        ),
        (
            serde_json::json!({ "subject": "", "content_html": "<p>Content</p>" }),
            "empty subject",
        ),
    ];

    for (invalid_body, error_message) in test_cases {
        let response = test_app.post_newsletter(invalid_body).await;

        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not fail with 400 status when payload was {}",
            error_message
        );
    }
}

#[tokio::test]
async fn test_newsletters_go_to_the_admin_address() {
    let test_app = TestApp::spawn_app().await;

    Mock::given(path("/mail/send"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&test_app.email_server)
        .await;

    let response = test_app.post_test_newsletter(newsletter_body()).await;

    assert_eq!(response.status().as_u16(), 200);

    let received_requests = &test_app.email_server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received_requests[0].body).unwrap();

    assert_eq!(
        body["personalizations"][0]["to"][0]["email"],
        test_app.config.get_admin_email()
    );
}
