//! Account-resolution behavior of the OAuth callback, exercised directly
//! against the resolver with a stub identity provider.

mod common;

use chrono::Duration;
use pretty_assertions::assert_eq;

use common::StubIdentityClient;
use taskhub::auth::service::OAuthCallbackError;
use taskhub::auth::state::StateError;
use taskhub::error::AppError;
use taskhub::store::UserStore;

const EXT_ID: &str = "ext-google-42";
const EMAIL: &str = "jane@example.com";

fn stub() -> StubIdentityClient {
    StubIdentityClient::returning(common::profile(EXT_ID, EMAIL, "Jane Doe", true))
}

#[actix_rt::test]
async fn test_returning_user_logs_in_without_mutation() {
    let t = common::auth_with(stub());
    let seeded = common::seed_user(&t.store, "jane", EMAIL, "", Some(EXT_ID));

    let signed = t.state.sign("nonce-1");
    let (token, user) = t
        .auth
        .oauth_callback(&signed, "nonce-1", "code")
        .await
        .expect("returning user should log straight in");

    assert_eq!(user.id, seeded.id);
    assert_eq!(t.tokens.validate(&token).unwrap(), seeded.id);
    assert_eq!(t.store.create_count(), 0);
    assert_eq!(t.store.update_count(), 0);
}

#[actix_rt::test]
async fn test_matching_email_links_external_identity() {
    let t = common::auth_with(stub());
    // A credential account with the same email and no linkage yet
    let seeded = common::seed_user(&t.store, "jane", EMAIL, "$2b$12$somehash", None);
    assert!(!seeded.email_verified);

    let signed = t.state.sign("nonce-2");
    let (_token, user) = t
        .auth
        .oauth_callback(&signed, "nonce-2", "code")
        .await
        .expect("matching email should link");

    assert_eq!(user.id, seeded.id);
    assert_eq!(user.external_id.as_deref(), Some(EXT_ID));
    assert!(user.email_verified, "linking must force email_verified");
    // The password survives: the account keeps both login methods
    assert_eq!(user.password_hash, "$2b$12$somehash");
    assert_eq!(t.store.update_count(), 1);
    assert_eq!(t.store.create_count(), 0);
    assert_eq!(t.store.user_count(), 1);
}

#[actix_rt::test]
async fn test_email_bound_to_different_identity_conflicts() {
    let t = common::auth_with(stub());
    common::seed_user(&t.store, "jane", EMAIL, "", Some("ext-someone-else"));

    let signed = t.state.sign("nonce-3");
    let err = t
        .auth
        .oauth_callback(&signed, "nonce-3", "code")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OAuthCallbackError::Auth(AppError::Conflict(_))
    ));
    assert_eq!(err.redirect_code(), "auth_conflict");
    assert_eq!(t.store.update_count(), 0);
    assert_eq!(t.store.create_count(), 0);
}

#[actix_rt::test]
async fn test_unknown_profile_creates_provider_only_account() {
    let t = common::auth_with(stub());

    let signed = t.state.sign("nonce-4");
    let (token, user) = t
        .auth
        .oauth_callback(&signed, "nonce-4", "code")
        .await
        .expect("unknown profile should create an account");

    assert_eq!(t.store.user_count(), 1);
    assert_eq!(t.store.create_count(), 1);
    assert_eq!(t.store.update_count(), 0);
    assert_eq!(user.username, "jane_doe");
    assert_eq!(user.email, EMAIL);
    assert!(user.email_verified);
    assert!(user.password_hash.is_empty());
    assert_eq!(user.external_id.as_deref(), Some(EXT_ID));
    assert_eq!(t.tokens.validate(&token).unwrap(), user.id);

    let stored = t.store.get_by_external_id(EXT_ID).await.unwrap().unwrap();
    assert_eq!(stored.id, user.id);
}

#[actix_rt::test]
async fn test_unverified_provider_email_is_rejected() {
    let t = common::auth_with(StubIdentityClient::returning(common::profile(
        EXT_ID, EMAIL, "Jane Doe", false,
    )));
    // Even an account that would otherwise link is out of reach
    common::seed_user(&t.store, "jane", EMAIL, "$2b$12$somehash", None);

    let signed = t.state.sign("nonce-5");
    let err = t
        .auth
        .oauth_callback(&signed, "nonce-5", "code")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OAuthCallbackError::Auth(AppError::Unauthorized(_))
    ));
    assert_eq!(err.redirect_code(), "auth_failed");
    assert_eq!(t.store.update_count(), 0);
    assert_eq!(t.store.create_count(), 0);
}

#[actix_rt::test]
async fn test_expired_state_is_distinguished() {
    let t = common::auth_with(stub());

    let signed = t.state.sign("nonce-6");
    t.clock.advance(Duration::minutes(11));

    let err = t
        .auth
        .oauth_callback(&signed, "nonce-6", "code")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OAuthCallbackError::State(StateError::Expired)
    ));
    assert_eq!(err.redirect_code(), "state_expired");
}

#[actix_rt::test]
async fn test_tampered_state_is_rejected() {
    let t = common::auth_with(stub());

    let signed = t.state.sign("nonce-7");
    let tampered = format!("evil-nonce.{}", signed.split_once('.').unwrap().1);

    let err = t
        .auth
        .oauth_callback(&tampered, "evil-nonce", "code")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OAuthCallbackError::State(StateError::InvalidMac)
    ));
    assert_eq!(err.redirect_code(), "state_invalid");
    assert_eq!(t.store.user_count(), 0);
}

#[actix_rt::test]
async fn test_nonce_mismatch_is_rejected() {
    let t = common::auth_with(stub());

    let signed = t.state.sign("nonce-8");
    let err = t
        .auth
        .oauth_callback(&signed, "a-different-nonce", "code")
        .await
        .unwrap_err();
    assert!(matches!(err, OAuthCallbackError::StateMismatch));

    // An empty echoed nonce never matches either
    let signed = t.state.sign("nonce-9");
    let err = t.auth.oauth_callback(&signed, "", "code").await.unwrap_err();
    assert!(matches!(err, OAuthCallbackError::StateMismatch));
    assert_eq!(err.redirect_code(), "state_mismatch");
}

#[actix_rt::test]
async fn test_failed_exchange_is_unauthorized() {
    let t = common::auth_with(StubIdentityClient::failing_exchange());

    let signed = t.state.sign("nonce-10");
    let err = t
        .auth
        .oauth_callback(&signed, "nonce-10", "bad-code")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OAuthCallbackError::Auth(AppError::Unauthorized(_))
    ));
    assert_eq!(err.redirect_code(), "auth_failed");
    assert_eq!(t.store.user_count(), 0);
}

#[actix_rt::test]
async fn test_failed_profile_fetch_is_unauthorized() {
    let t = common::auth_with(StubIdentityClient::failing_profile());

    let signed = t.state.sign("nonce-11");
    let err = t
        .auth
        .oauth_callback(&signed, "nonce-11", "code")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OAuthCallbackError::Auth(AppError::Unauthorized(_))
    ));
}

#[actix_rt::test]
async fn test_valid_token_with_missing_subject_is_unauthorized() {
    let t = common::auth_with(stub());

    // A correctly signed session whose subject was never (or is no longer)
    // in the store
    let token = t.tokens.issue(uuid::Uuid::new_v4()).unwrap();
    let err = t.auth.authenticate(&token).await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized(_)));
}
