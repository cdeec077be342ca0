//! Tests for the user service client against the fake service.

#![allow(clippy::unwrap_used)]

mod common;

use std::time::Duration;

use secrecy::SecretString;

use atelier_core::UserId;
use atelier_core::forms::SignupForm;
use atelier_storefront::services::user_api::SignUpRequest;
use atelier_storefront::services::{UserApiError, UserServiceClient};

use common::FakeUserService;

fn client_for(service: &FakeUserService) -> UserServiceClient {
    UserServiceClient::new(
        &url::Url::parse(&service.url()).unwrap(),
        Duration::from_secs(5),
        Duration::from_secs(300),
    )
    .unwrap()
}

fn signup_form(email: &str) -> SignupForm {
    SignupForm {
        first_name: " Noah ".to_string(),
        last_name: "Park".to_string(),
        email: email.to_string(),
        phone_number: Some("   ".to_string()),
        password: "hunter22".to_string(),
        confirm_password: "hunter22".to_string(),
    }
}

#[tokio::test]
async fn test_login_returns_tokens() {
    let service = FakeUserService::start().await;
    let users = client_for(&service);

    let login = users
        .login(common::EMAIL, &SecretString::from(common::PASSWORD))
        .await
        .unwrap();
    assert_eq!(login.user_id, UserId::new(common::USER_ID));
    assert_eq!(login.access_token, common::ACCESS_TOKEN);
    assert_eq!(login.expires_in, 900);
}

#[tokio::test]
async fn test_login_rejection_carries_service_message() {
    let service = FakeUserService::start().await;
    let users = client_for(&service);

    let err = users
        .login(common::EMAIL, &SecretString::from("nope"))
        .await
        .unwrap_err();
    match &err {
        UserApiError::Api { status, message, .. } => {
            assert_eq!(*status, 401);
            assert_eq!(message, "Invalid username or password");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!err.is_auth_failure());
}

#[tokio::test]
async fn test_signup_created_and_conflict() {
    let service = FakeUserService::start().await;
    let users = client_for(&service);

    users
        .signup(&SignUpRequest::from_form(&signup_form("noah@example.com")))
        .await
        .unwrap();
    {
        let log = service.log();
        assert_eq!(log.signups.len(), 1);
        assert_eq!(log.signups[0]["firstName"], "Noah");
        assert!(log.signups[0].get("phoneNumber").is_none());
    }

    let err = users
        .signup(&SignUpRequest::from_form(&signup_form("taken@example.com")))
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), "An account with this email already exists");
}

#[tokio::test]
async fn test_get_user_is_cached_until_invalidated() {
    let service = FakeUserService::start().await;
    let users = client_for(&service);
    let id = UserId::new(common::USER_ID);

    let user = users.get_user(common::ACCESS_TOKEN, id).await.unwrap();
    assert_eq!(user.first_name, "Emma");

    service.log().reject_tokens = true;
    let cached = users.get_user(common::ACCESS_TOKEN, id).await.unwrap();
    assert_eq!(cached.email, common::EMAIL);

    users.invalidate_user(id).await;
    let err = users.get_user(common::ACCESS_TOKEN, id).await.unwrap_err();
    assert!(matches!(err, UserApiError::Unauthorized));
    assert!(err.is_auth_failure());
}

#[tokio::test]
async fn test_change_password() {
    let service = FakeUserService::start().await;
    let users = client_for(&service);
    let id = UserId::new(common::USER_ID);

    let err = users
        .change_password(
            common::ACCESS_TOKEN,
            id,
            &SecretString::from("wrong-one"),
            &SecretString::from("new-password-1"),
        )
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), "Current password is incorrect");

    users
        .change_password(
            common::ACCESS_TOKEN,
            id,
            &SecretString::from(common::PASSWORD),
            &SecretString::from("new-password-1"),
        )
        .await
        .unwrap();
    assert_eq!(service.log().password_changes, 1);
}

#[tokio::test]
async fn test_refresh() {
    let service = FakeUserService::start().await;
    let users = client_for(&service);

    let refreshed = users.refresh("rt-1").await.unwrap();
    assert_eq!(refreshed.access_token, common::ACCESS_TOKEN);

    let err = users.refresh("rt-stale").await.unwrap_err();
    assert!(matches!(err, UserApiError::SessionExpired));
}

#[tokio::test]
async fn test_logout() {
    let service = FakeUserService::start().await;
    let users = client_for(&service);

    users
        .logout(common::ACCESS_TOKEN, UserId::new(common::USER_ID))
        .await
        .unwrap();
    assert_eq!(service.log().logouts, 1);
}
