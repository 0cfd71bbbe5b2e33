use chrono::Utc;
use std::collections::HashMap;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::helpers::{ConfirmationLink, TestApp};
use daily_greeting::lifecycle::RecipientLifecycle;
use daily_greeting::store::PgRecipientStore;

async fn request_enrollment(test_app: &TestApp, email: &str) -> ConfirmationLink {
    let body = HashMap::from([("email", email)]);

    // When executing a mock with the method mount_as_scoped, the mock stops listening to the /mail/send endpoint
    // when it goes out of scope (so, when the execution of request_enrollment ends).
    let _mock_guard = Mock::given(path("/mail/send"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .named("Request an enrollment")
        .expect(1)
        .mount_as_scoped(&test_app.email_server)
        .await;

    test_app.post_enrollment(body).await;

    let received_requests = test_app.email_server.received_requests().await.unwrap();

    test_app.get_confirmation_link(received_requests.last().unwrap())
}

fn lifecycle(test_app: &TestApp) -> RecipientLifecycle {
    RecipientLifecycle::new(std::sync::Arc::new(PgRecipientStore::new(
        test_app.db_pool.clone(),
    )))
}

#[tokio::test]
async fn confirmations_without_token_are_rejected_with_400() {
    let test_app = TestApp::spawn_app().await;

    let response = reqwest::get(&format!("{}/enrollments/confirm", &test_app.address))
        .await
        .expect("Failed to execute request.");

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn confirmations_with_an_unknown_token_are_rejected_with_401() {
    let test_app = TestApp::spawn_app().await;

    let response = reqwest::get(&format!(
        "{}/enrollments/confirm?token=notarealtoken",
        &test_app.address
    ))
    .await
    .expect("Failed to execute request.");

    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn confirming_the_link_enrolls_an_active_recipient() {
    let test_app = TestApp::spawn_app().await;
    let confirmation_link = request_enrollment(&test_app, "sunshine@test.com").await;

    let response = reqwest::get(confirmation_link.html).await.unwrap();

    assert_eq!(response.status(), 200);

    let active = lifecycle(&test_app)
        .active_recipients(Utc::now())
        .await
        .expect("Failed to list active recipients.");

    assert_eq!(active.len(), 1);
    assert_eq!(active[0].email.as_ref(), "sunshine@test.com");
    assert!(!active[0].is_deleted);
    assert_eq!(
        active[0].expiry_date - active[0].created_on,
        test_app.config.get_expiry_window().unwrap()
    );
}

#[tokio::test]
async fn a_confirmation_link_only_works_once() {
    let test_app = TestApp::spawn_app().await;
    let confirmation_link = request_enrollment(&test_app, "sunshine@test.com").await;

    let first = reqwest::get(confirmation_link.html.clone()).await.unwrap();
    let second = reqwest::get(confirmation_link.html).await.unwrap();

    assert_eq!(first.status(), 200);
    assert_eq!(second.status(), 401);
}

#[tokio::test]
async fn enrolling_the_same_address_twice_keeps_a_single_recipient() {
    let test_app = TestApp::spawn_app().await;

    for _ in 0..2 {
        let confirmation_link = request_enrollment(&test_app, "sunshine@test.com").await;

        reqwest::get(confirmation_link.html)
            .await
            .unwrap()
            .error_for_status()
            .unwrap();
    }

    let active = lifecycle(&test_app)
        .active_recipients(Utc::now())
        .await
        .unwrap();

    assert_eq!(active.len(), 1);
}
