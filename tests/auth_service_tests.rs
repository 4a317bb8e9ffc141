use chrono::Utc;
use dogether_auth::{
    error::AuthError,
    repositories::{SqliteUserRepository, UserRepository},
    services::{
        auth_service::{LoginRequest, SignupRequest},
        TokenPurpose, TokenSubject,
    },
    test_utils::{test_helpers, RecordingNotifier},
};
use std::sync::Arc;

fn signup(email: &str, password: &str) -> SignupRequest {
    SignupRequest {
        email: email.to_string(),
        password: password.to_string(),
        ..Default::default()
    }
}

fn login(email: &str, password: &str) -> LoginRequest {
    LoginRequest {
        email: email.to_string(),
        password: password.to_string(),
    }
}

#[tokio::test]
async fn test_register_persists_unverified_account_with_pending_token() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let notifier = Arc::new(RecordingNotifier::new());
    let auth_service = test_helpers::create_auth_service(&pool, notifier.clone());

    let user = auth_service
        .register(SignupRequest {
            email: "a@x.com".to_string(),
            password: "Passw0rd".to_string(),
            name: Some("Alice".to_string()),
            locale: Some("en".to_string()),
        })
        .await
        .unwrap();

    assert_eq!(user.email, "a@x.com");
    assert_eq!(user.name.as_deref(), Some("Alice"));
    assert_eq!(user.locale, "en");
    assert!(user.created_at.is_some());

    let repository = SqliteUserRepository::new(pool.clone());
    let stored = repository.find_by_email("a@x.com").await.unwrap().unwrap();
    assert!(!stored.email_verified);
    assert!(stored.has_pending_verification());
    assert!(stored.password_hash.starts_with("$argon2id$"));

    // Stored expiry agrees with the 24 hour token lifetime.
    let expires = stored.email_verification_expires.unwrap();
    let expected = Utc::now().timestamp() + 24 * 60 * 60;
    assert!((expected - expires).abs() <= 5);

    let sent_token = notifier.last_token_for("a@x.com").unwrap();
    assert_eq!(stored.email_verification_token.as_deref(), Some(sent_token.as_str()));
}

#[tokio::test]
async fn test_login_before_verification_is_not_invalid_credentials() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let auth_service =
        test_helpers::create_auth_service(&pool, Arc::new(RecordingNotifier::new()));

    for (i, password) in ["Passw0rd", "123456", "correct horse battery"]
        .iter()
        .enumerate()
    {
        let email = format!("user{}@x.com", i);
        auth_service.register(signup(&email, password)).await.unwrap();

        let right = auth_service.login(login(&email, password)).await;
        assert!(matches!(right, Err(AuthError::EmailNotVerified)));

        let wrong = auth_service.login(login(&email, "WrongPass")).await;
        assert!(matches!(wrong, Err(AuthError::EmailNotVerified)));
    }
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let notifier = Arc::new(RecordingNotifier::new());
    let auth_service = test_helpers::create_auth_service(&pool, notifier.clone());

    auth_service.register(signup("a@x.com", "Passw0rd")).await.unwrap();
    let second = auth_service.register(signup("a@x.com", "Other123")).await;

    assert!(matches!(second, Err(AuthError::Conflict)));
    assert_eq!(notifier.sent().len(), 1);
}

#[tokio::test]
async fn test_concurrent_registration_yields_single_account() {
    let (pool, _temp_file) = test_helpers::create_test_db_file().await.unwrap();
    let auth_service = Arc::new(test_helpers::create_auth_service(
        &pool,
        Arc::new(RecordingNotifier::new()),
    ));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let service = auth_service.clone();
            tokio::spawn(async move { service.register(signup("race@x.com", "Passw0rd")).await })
        })
        .collect();

    let mut created = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(AuthError::Conflict) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(created, 1);
    assert_eq!(conflicts, 3);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?")
        .bind("race@x.com")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_verification_is_one_shot() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let notifier = Arc::new(RecordingNotifier::new());
    let auth_service = test_helpers::create_auth_service(&pool, notifier.clone());

    let registered = auth_service.register(signup("a@x.com", "Passw0rd")).await.unwrap();
    let token = notifier.last_token_for("a@x.com").unwrap();

    let verified = auth_service.verify_email(&token).await.unwrap();
    assert_eq!(verified.id, registered.id);
    assert_eq!(verified.email, "a@x.com");

    let stored = SqliteUserRepository::new(pool.clone())
        .find_by_id(registered.id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.email_verified);
    assert!(stored.email_verification_token.is_none());
    assert!(stored.email_verification_expires.is_none());

    let again = auth_service.verify_email(&token).await;
    assert!(matches!(again, Err(AuthError::TokenInvalidOrExpired)));
}

#[tokio::test]
async fn test_expired_stored_row_rejects_valid_token() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let notifier = Arc::new(RecordingNotifier::new());
    let auth_service = test_helpers::create_auth_service(&pool, notifier.clone());

    auth_service.register(signup("a@x.com", "Passw0rd")).await.unwrap();
    let token = notifier.last_token_for("a@x.com").unwrap();

    test_helpers::set_verification_expiry(&pool, "a@x.com", Utc::now().timestamp() - 60)
        .await
        .unwrap();

    for _ in 0..2 {
        let result = auth_service.verify_email(&token).await;
        assert!(matches!(result, Err(AuthError::TokenInvalidOrExpired)));
    }

    let stored = SqliteUserRepository::new(pool)
        .find_by_email("a@x.com")
        .await
        .unwrap()
        .unwrap();
    assert!(!stored.email_verified);
}

#[tokio::test]
async fn test_verify_email_rejects_other_purposes_and_missing_token() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let auth_service =
        test_helpers::create_auth_service(&pool, Arc::new(RecordingNotifier::new()));
    let tokens = test_helpers::test_token_service();

    let access = tokens
        .issue_for(TokenPurpose::Access, TokenSubject::user(1, "a@x.com"))
        .unwrap();
    assert!(matches!(
        auth_service.verify_email(&access.token).await,
        Err(AuthError::TokenInvalid)
    ));

    let expired = tokens
        .issue(
            TokenPurpose::EmailVerification,
            TokenSubject::email("a@x.com"),
            chrono::Duration::zero(),
        )
        .unwrap();
    assert!(matches!(
        auth_service.verify_email(&expired.token).await,
        Err(AuthError::TokenExpired)
    ));

    assert!(matches!(
        auth_service.verify_email("  ").await,
        Err(AuthError::Validation(msg)) if msg == "Token is required"
    ));
}

#[tokio::test]
async fn test_wrong_password_and_unknown_email_are_indistinguishable() {
    let pool = test_helpers::create_test_db().await.unwrap();
    test_helpers::insert_test_user(&pool, "a@x.com", "Passw0rd", true)
        .await
        .unwrap();
    let auth_service =
        test_helpers::create_auth_service(&pool, Arc::new(RecordingNotifier::new()));

    let wrong = auth_service.login(login("a@x.com", "WrongPass")).await;
    let unknown = auth_service.login(login("ghost@x.com", "WrongPass")).await;

    let wrong = wrong.unwrap_err();
    let unknown = unknown.unwrap_err();
    assert!(matches!(wrong, AuthError::InvalidCredentials));
    assert!(matches!(unknown, AuthError::InvalidCredentials));
    assert_eq!(wrong.public_message(), unknown.public_message());
    assert_eq!(wrong.status(), unknown.status());
}

#[tokio::test]
async fn test_login_after_verification_issues_access_and_refresh_tokens() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let notifier = Arc::new(RecordingNotifier::new());
    let auth_service = test_helpers::create_auth_service(&pool, notifier.clone());

    let registered = auth_service.register(signup("a@x.com", "Passw0rd")).await.unwrap();
    let token = notifier.last_token_for("a@x.com").unwrap();
    auth_service.verify_email(&token).await.unwrap();

    let outcome = auth_service.login(login("a@x.com", "Passw0rd")).await.unwrap();
    assert_eq!(outcome.user.id, registered.id);
    assert!(outcome.user.email_verified);
    assert_eq!(outcome.user.locale, "ko");

    let tokens = test_helpers::test_token_service();
    let access = tokens
        .verify_purpose(&outcome.token, TokenPurpose::Access)
        .unwrap();
    assert_eq!(access.subject.user_id, Some(registered.id));
    assert_eq!(access.subject.email.as_deref(), Some("a@x.com"));

    let refresh = tokens
        .verify_purpose(&outcome.refresh_token, TokenPurpose::Refresh)
        .unwrap();
    assert_eq!(refresh.subject.user_id, Some(registered.id));

    // The access token cannot be used where a verification token is expected.
    assert!(matches!(
        auth_service.verify_email(&outcome.token).await,
        Err(AuthError::TokenInvalid)
    ));
}

#[tokio::test]
async fn test_refresh_issues_new_access_token() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let user_id = test_helpers::insert_test_user(&pool, "a@x.com", "Passw0rd", true)
        .await
        .unwrap();
    let auth_service =
        test_helpers::create_auth_service(&pool, Arc::new(RecordingNotifier::new()));

    let outcome = auth_service.login(login("a@x.com", "Passw0rd")).await.unwrap();
    let refreshed = auth_service.refresh(&outcome.refresh_token).await.unwrap();
    assert_eq!(refreshed.user.id, user_id);

    let claims = auth_service.authenticate_access(&refreshed.token).unwrap();
    assert_eq!(claims.subject.user_id, Some(user_id));

    // An access token is not a refresh token.
    assert!(matches!(
        auth_service.refresh(&outcome.token).await,
        Err(AuthError::InvalidBearerToken)
    ));
    assert!(matches!(
        auth_service.refresh("").await,
        Err(AuthError::Validation(_))
    ));
}

#[tokio::test]
async fn test_resend_replaces_pending_token() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let notifier = Arc::new(RecordingNotifier::new());
    let auth_service = test_helpers::create_auth_service(&pool, notifier.clone());

    auth_service.register(signup("a@x.com", "Passw0rd")).await.unwrap();
    let first = notifier.last_token_for("a@x.com").unwrap();

    auth_service.resend_verification("a@x.com").await.unwrap();
    let second = notifier.last_token_for("a@x.com").unwrap();
    assert_ne!(first, second);

    assert!(matches!(
        auth_service.verify_email(&first).await,
        Err(AuthError::TokenInvalidOrExpired)
    ));
    auth_service.verify_email(&second).await.unwrap();

    // Verified accounts get a silent success and no email.
    let sent_before = notifier.sent().len();
    auth_service.resend_verification("a@x.com").await.unwrap();
    assert_eq!(notifier.sent().len(), sent_before);
}

#[tokio::test]
async fn test_notifier_failure_leaves_account_unverified() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let auth_service =
        test_helpers::create_auth_service(&pool, Arc::new(RecordingNotifier::failing()));

    let result = auth_service.register(signup("a@x.com", "Passw0rd")).await;
    assert!(matches!(result, Err(AuthError::Notification(_))));

    let stored = SqliteUserRepository::new(pool)
        .find_by_email("a@x.com")
        .await
        .unwrap()
        .unwrap();
    assert!(!stored.email_verified);

    let retry = auth_service.register(signup("a@x.com", "Passw0rd")).await;
    assert!(matches!(retry, Err(AuthError::Conflict)));
}

#[tokio::test]
async fn test_register_verified_sends_nothing_and_allows_login() {
    let pool = test_helpers::create_test_db().await.unwrap();
    let notifier = Arc::new(RecordingNotifier::new());
    let auth_service = test_helpers::create_auth_service(&pool, notifier.clone());

    let user = auth_service
        .register_verified(signup("admin@x.com", "Passw0rd"))
        .await
        .unwrap();

    assert!(notifier.sent().is_empty());

    let stored = SqliteUserRepository::new(pool)
        .find_by_id(user.id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.email_verified);
    assert!(!stored.has_pending_verification());

    let outcome = auth_service.login(login("admin@x.com", "Passw0rd")).await.unwrap();
    assert_eq!(outcome.user.id, user.id);

    let duplicate = auth_service
        .register_verified(signup("admin@x.com", "Passw0rd"))
        .await;
    assert!(matches!(duplicate, Err(AuthError::Conflict)));
}
