use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::helpers::TestApp;

fn valid_body() -> serde_json::Value {
    serde_json::json!({
        "name": "Frank",
        "email": "visitor@test.com",
        "subject": "A project",
        "message": "Interested in working together?",
    })
}

#[tokio::test]
async fn a_valid_contact_message_is_relayed() {
    let test_app = TestApp::spawn_app().await;

    Mock::given(path("/mail/send"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&test_app.email_server)
        .await;

    let response = test_app.post_contact(valid_body()).await;

    assert_eq!(200, response.status().as_u16());

    let payload: serde_json::Value = response.json().await.unwrap();

    assert_eq!(payload["success"], true);
}

#[tokio::test]
async fn contact_returns_400_when_body_is_invalid() {
    let test_app = TestApp::spawn_app().await;
    let test_cases = vec![
        (
            serde_json::json!({
                "email": "visitor@test.com",
                "subject": "A project",
                "message": "Hello",
            }),
            "missing name",
        ),
        (
            serde_json::json!({
                "name": "{Frank}",
                "email": "visitor@test.com",
                "subject": "A project",
                "message": "Hello",
            }),
            "invalid name",
        ),
        (
            serde_json::json!({
                "name": "Frank",
                "email": "not-an-email",
                "subject": "A project",
                "message": "Hello",
            }),
            "invalid email",
        ),
        (
            serde_json::json!({
                "name": "Frank",
                "email": "visitor@test.com",
                "subject": "",
                "message": "Hello",
            }),
            "empty subject",
        ),
    ];

    for (invalid_body, error_message) in test_cases {
        let response = test_app.post_contact(invalid_body).await;

        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not fail with 400 status when payload was {}",
            error_message
        );
    }
}

#[tokio::test]
async fn contact_messages_over_quota_are_rejected() {
    let test_app = TestApp::spawn_app_with(|config| {
        config.set_contact_quota(1, 3600);
    })
    .await;

    Mock::given(path("/mail/send"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&test_app.email_server)
        .await;

    test_app.post_contact(valid_body()).await;

    let response = test_app.post_contact(valid_body()).await;

    assert_eq!(429, response.status().as_u16());
}
