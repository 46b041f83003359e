//! Core business logic for the authentication system.
//!
//! The service owns every security-relevant decision of the credential
//! lifecycle: registration, password and OAuth login, OTP verification,
//! and password reset. Every login path, password-based or federated,
//! passes through the same email-control proof before a session token
//! exists.

use crate::auth::models::*;
use crate::config::Config;
use crate::database::models::{Account, CreateAccount, PublicAccount};
use crate::errors::{ServiceError, ServiceResult};
use crate::repositories::account_repository::AccountRepository;
use crate::services::email_service::EmailService;
use crate::services::google_oauth::OauthProfile;
use crate::utils::otp;
use crate::utils::password::{hash_password, verify_password};
use crate::utils::token::TokenIssuer;
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use validator::Validate;

/// Wrong code and expired code are indistinguishable to the caller.
const INVALID_OTP: &str = "Invalid or expired OTP";

/// Authentication service sequencing registration, login, OTP verification,
/// and password reset.
pub struct AuthService<'a> {
    pool: &'a SqlitePool,
    tokens: Arc<TokenIssuer>,
    email_service: Option<EmailService>,
    config: Config,
}

impl<'a> AuthService<'a> {
    /// Creates a new AuthService instance.
    ///
    /// The token issuer is injected rather than rebuilt so the signing
    /// secret is read exactly once at startup.
    pub fn new(pool: &'a SqlitePool, config: &Config, tokens: Arc<TokenIssuer>) -> Self {
        let email_service = match config.email_config() {
            Some(email_config) => match EmailService::new(email_config) {
                Ok(service) => Some(service),
                Err(e) => {
                    tracing::warn!(
                        "Failed to initialize email service: {}. Email notifications will be disabled.",
                        e
                    );
                    None
                }
            },
            None => {
                tracing::warn!(
                    "Email configuration not found. Email notifications will be disabled."
                );
                None
            }
        };

        AuthService {
            pool,
            tokens,
            email_service,
            config: config.clone(),
        }
    }

    /// Registers a new account and signs it in immediately.
    ///
    /// # Returns
    /// The freshly issued session token. Registration does not require an
    /// OTP; the first email-control proof happens on the next login.
    pub async fn register(&self, request: RegisterRequest) -> ServiceResult<String> {
        validate(&request)?;

        let email = normalize_email(&request.email);
        let repo = AccountRepository::new(self.pool);

        if repo.get_account_by_email(&email).await?.is_some() {
            return Err(ServiceError::already_exists("Account", &email));
        }

        let password_hash = hash_password(&request.password, self.config.bcrypt_cost)?;

        let account = repo
            .create_account(CreateAccount {
                name: Some(request.name),
                email: email.clone(),
                password_hash: Some(password_hash),
                avatar_url: request.avatar_url,
            })
            .await
            .map_err(|e| {
                // A concurrent duplicate register loses the race here.
                if e.to_string().contains("UNIQUE constraint failed") {
                    ServiceError::already_exists("Account", &email)
                } else {
                    ServiceError::Database { source: e }
                }
            })?;

        tracing::info!("Account registered for {}", account.email);
        self.tokens.issue_session(&account, Utc::now())
    }

    /// Authenticates the password and moves the account into the
    /// awaiting-OTP state. Never returns a session token directly.
    pub async fn login(&self, request: LoginRequest) -> ServiceResult<OtpPending> {
        validate(&request)?;

        let email = normalize_email(&request.email);
        let repo = AccountRepository::new(self.pool);

        let account = repo
            .get_account_by_email(&email)
            .await?
            .ok_or_else(|| ServiceError::not_found("Account", &email))?;

        // OAuth-only accounts have no credential to check.
        let Some(ref stored_hash) = account.password_hash else {
            return Err(ServiceError::unauthorized("Invalid password"));
        };

        if !verify_password(&request.password, stored_hash)? {
            return Err(ServiceError::unauthorized("Invalid password"));
        }

        self.issue_login_otp(&account).await
    }

    /// Reconciles a third-party-verified identity with the local store,
    /// then hands off into the same OTP-issuance step as password logins.
    pub async fn oauth_login(&self, profile: OauthProfile) -> ServiceResult<OtpPending> {
        let email = normalize_email(&profile.email);
        let repo = AccountRepository::new(self.pool);

        let account = match repo.get_account_by_email(&email).await? {
            Some(account) => account,
            None => {
                let create = CreateAccount {
                    name: profile.name,
                    email: email.clone(),
                    password_hash: None,
                    avatar_url: profile.avatar_url,
                };
                match repo.create_account(create).await {
                    Ok(account) => {
                        tracing::info!("Account created from OAuth identity for {}", email);
                        account
                    }
                    // Lost a create race; the other request's row wins.
                    Err(e) if e.to_string().contains("UNIQUE constraint failed") => repo
                        .get_account_by_email(&email)
                        .await?
                        .ok_or_else(|| {
                            ServiceError::internal_error("Account vanished after create conflict")
                        })?,
                    Err(e) => return Err(ServiceError::Database { source: e }),
                }
            }
        };

        self.issue_login_otp(&account).await
    }

    /// Validates the submitted code, clears it, and issues the session.
    ///
    /// The validity check and the clear are one unit from the caller's
    /// perspective: the conditional update in the store decides a single
    /// winner, so a code observed in transit cannot be redeemed twice.
    pub async fn verify_otp(&self, email: &str, request: VerifyOtpRequest) -> ServiceResult<VerifyOtpResponse> {
        validate(&request)?;

        let email = normalize_email(email);
        let repo = AccountRepository::new(self.pool);

        let account = repo
            .get_account_by_email(&email)
            .await?
            .ok_or_else(|| ServiceError::not_found("Account", &email))?;

        let (Some(stored_code), Some(expires)) = (&account.otp, account.otp_expires) else {
            return Err(ServiceError::unauthorized(INVALID_OTP));
        };

        if !otp::is_valid(&request.otp, stored_code, expires, Utc::now()) {
            return Err(ServiceError::unauthorized(INVALID_OTP));
        }

        if !repo.take_pending_otp(&account.id, &request.otp).await? {
            return Err(ServiceError::unauthorized(INVALID_OTP));
        }

        let token = self.tokens.issue_session(&account, Utc::now())?;
        tracing::info!("Login completed for {}", account.email);

        Ok(VerifyOtpResponse {
            user: PublicAccount::from(&account),
            token,
        })
    }

    /// Issues a reset capability token and emails the reset link.
    pub async fn forgot_password(&self, request: ForgotPasswordRequest) -> ServiceResult<()> {
        validate(&request)?;

        let email = normalize_email(&request.email);
        let repo = AccountRepository::new(self.pool);

        let account = repo
            .get_account_by_email(&email)
            .await?
            .ok_or_else(|| ServiceError::not_found("Account", &email))?;

        let token = self.tokens.issue_reset(&account.email, Utc::now())?;
        let reset_url = format!("{}/reset-password/{}", self.config.base_url, token);

        if let Some(ref email_service) = self.email_service {
            email_service
                .send_reset_email(&account.email, &reset_url)
                .await?;
            tracing::info!("Password reset link sent to {}", account.email);
        } else {
            tracing::warn!(
                "Email service not configured. Reset link not sent to {}",
                account.email
            );
        }

        Ok(())
    }

    /// Replaces the account's password, gated on a valid capability token.
    ///
    /// The token is verified before any account lookup so an invalid token
    /// learns nothing about account existence.
    pub async fn reset_password(&self, token: &str, request: ResetPasswordRequest) -> ServiceResult<()> {
        validate(&request)?;

        let email = self.tokens.verify_reset(token, Utc::now())?;

        let repo = AccountRepository::new(self.pool);
        let account = repo
            .get_account_by_email(&email)
            .await?
            .ok_or_else(|| ServiceError::not_found("Account", &email))?;

        let password_hash = hash_password(&request.password, self.config.bcrypt_cost)?;
        repo.update_password(&account.id, &password_hash).await?;

        tracing::info!("Password reset completed for {}", account.email);
        Ok(())
    }

    /// Shared OTP-issuance step for both login paths: persist a pending
    /// code, notify the address, and report only the email back.
    async fn issue_login_otp(&self, account: &Account) -> ServiceResult<OtpPending> {
        let code = otp::generate_otp();
        let expires = otp::expiry_from(Utc::now());

        let repo = AccountRepository::new(self.pool);
        let account = repo.set_pending_otp(&account.id, &code, expires).await?;

        if let Some(ref email_service) = self.email_service {
            email_service.send_otp_email(&account.email, &code).await?;
            tracing::info!("OTP sent to {}", account.email);
        } else {
            tracing::warn!(
                "Email service not configured. OTP not sent to {}",
                account.email
            );
        }

        Ok(OtpPending {
            email: account.email,
        })
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Formats `validator` failures into a single ValidationError.
fn validate(request: &impl Validate) -> ServiceResult<()> {
    if let Err(validation_errors) = request.validate() {
        let error_messages: Vec<String> = validation_errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| {
                    format!(
                        "{}: {}",
                        field,
                        error.message.as_ref().unwrap_or(&"Invalid value".into())
                    )
                })
            })
            .collect();
        return Err(ServiceError::validation(error_messages.join(", ")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::token::SigningContext;
    use chrono::Duration;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    fn issuer(config: &Config) -> Arc<TokenIssuer> {
        Arc::new(TokenIssuer::new(&SigningContext::new(
            config.jwt_secret.clone(),
        )))
    }

    fn register_request(email: &str) -> RegisterRequest {
        RegisterRequest {
            name: "Ann".to_string(),
            email: email.to_string(),
            password: "hunter2".to_string(),
            avatar_url: None,
        }
    }

    fn login_request(email: &str, password: &str) -> LoginRequest {
        LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn register_issues_session_and_duplicate_conflicts() {
        let pool = test_pool().await;
        let config = Config::for_tests();
        let tokens = issuer(&config);
        let service = AuthService::new(&pool, &config, tokens.clone());

        let token = service.register(register_request("ann@x.com")).await.unwrap();
        let claims = tokens.verify_session(&token, Utc::now()).unwrap();
        assert_eq!(claims.email, "ann@x.com");
        assert_eq!(claims.name.as_deref(), Some("Ann"));

        // Same email again, different case, still a conflict.
        let err = service
            .register(register_request("Ann@X.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyExists { .. }));

        let repo = AccountRepository::new(&pool);
        let account = repo.get_account_by_email("ann@x.com").await.unwrap().unwrap();
        assert!(account.otp.is_none());
    }

    #[tokio::test]
    async fn register_rejects_short_password() {
        let pool = test_pool().await;
        let config = Config::for_tests();
        let service = AuthService::new(&pool, &config, issuer(&config));

        let mut request = register_request("ann@x.com");
        request.password = "abcd".to_string();

        let err = service.register(request).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation { .. }));
    }

    #[tokio::test]
    async fn login_with_wrong_password_issues_no_otp() {
        let pool = test_pool().await;
        let config = Config::for_tests();
        let service = AuthService::new(&pool, &config, issuer(&config));

        service.register(register_request("ann@x.com")).await.unwrap();

        let err = service
            .login(login_request("ann@x.com", "wrong"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized { .. }));

        let repo = AccountRepository::new(&pool);
        let account = repo.get_account_by_email("ann@x.com").await.unwrap().unwrap();
        assert!(account.otp.is_none());
        assert!(account.otp_expires.is_none());
    }

    #[tokio::test]
    async fn login_with_unknown_email_is_not_found() {
        let pool = test_pool().await;
        let config = Config::for_tests();
        let service = AuthService::new(&pool, &config, issuer(&config));

        let err = service
            .login(login_request("ghost@x.com", "hunter2"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { .. }));
    }

    #[tokio::test]
    async fn login_success_parks_account_awaiting_otp() {
        let pool = test_pool().await;
        let config = Config::for_tests();
        let service = AuthService::new(&pool, &config, issuer(&config));

        service.register(register_request("ann@x.com")).await.unwrap();

        let before = Utc::now();
        let pending = service
            .login(login_request("ann@x.com", "hunter2"))
            .await
            .unwrap();
        assert_eq!(pending.email, "ann@x.com");

        let repo = AccountRepository::new(&pool);
        let account = repo.get_account_by_email("ann@x.com").await.unwrap().unwrap();
        let code = account.otp.expect("pending OTP set");
        assert_eq!(code.len(), 6);

        let expires = account.otp_expires.expect("expiry set");
        let expected = before + Duration::minutes(otp::OTP_TTL_MINUTES);
        assert!((expires - expected).num_seconds().abs() < 5);
    }

    #[tokio::test]
    async fn oauth_only_account_cannot_password_login() {
        let pool = test_pool().await;
        let config = Config::for_tests();
        let service = AuthService::new(&pool, &config, issuer(&config));

        service
            .oauth_login(OauthProfile {
                email: "ann@x.com".to_string(),
                name: Some("Ann".to_string()),
                avatar_url: None,
            })
            .await
            .unwrap();

        let err = service
            .login(login_request("ann@x.com", "hunter2"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn verify_otp_clears_code_and_rejects_reuse() {
        let pool = test_pool().await;
        let config = Config::for_tests();
        let tokens = issuer(&config);
        let service = AuthService::new(&pool, &config, tokens.clone());

        service.register(register_request("ann@x.com")).await.unwrap();
        service
            .login(login_request("ann@x.com", "hunter2"))
            .await
            .unwrap();

        let repo = AccountRepository::new(&pool);
        let code = repo
            .get_account_by_email("ann@x.com")
            .await
            .unwrap()
            .unwrap()
            .otp
            .unwrap();

        let response = service
            .verify_otp(
                "ann@x.com",
                VerifyOtpRequest { otp: code.clone() },
            )
            .await
            .unwrap();
        assert_eq!(response.user.email, "ann@x.com");

        let claims = tokens.verify_session(&response.token, Utc::now()).unwrap();
        assert_eq!(claims.email, "ann@x.com");

        // Succeeding once makes a second submission of the same code fail.
        let err = service
            .verify_otp("ann@x.com", VerifyOtpRequest { otp: code })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn verify_otp_rejects_wrong_and_missing_codes() {
        let pool = test_pool().await;
        let config = Config::for_tests();
        let service = AuthService::new(&pool, &config, issuer(&config));

        service.register(register_request("ann@x.com")).await.unwrap();

        // No pending OTP yet.
        let err = service
            .verify_otp(
                "ann@x.com",
                VerifyOtpRequest {
                    otp: "123456".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized { .. }));

        service
            .login(login_request("ann@x.com", "hunter2"))
            .await
            .unwrap();

        // Wrong guess does not clear the stored code.
        let err = service
            .verify_otp(
                "ann@x.com",
                VerifyOtpRequest {
                    otp: "000000".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized { .. }));

        let repo = AccountRepository::new(&pool);
        let account = repo.get_account_by_email("ann@x.com").await.unwrap().unwrap();
        assert!(account.otp.is_some());
    }

    #[tokio::test]
    async fn verify_otp_rejects_expired_code() {
        let pool = test_pool().await;
        let config = Config::for_tests();
        let service = AuthService::new(&pool, &config, issuer(&config));

        service.register(register_request("ann@x.com")).await.unwrap();

        let repo = AccountRepository::new(&pool);
        let account = repo.get_account_by_email("ann@x.com").await.unwrap().unwrap();
        repo.set_pending_otp(&account.id, "123456", Utc::now() - Duration::seconds(1))
            .await
            .unwrap();

        let err = service
            .verify_otp(
                "ann@x.com",
                VerifyOtpRequest {
                    otp: "123456".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized { .. }));
    }

    #[tokio::test]
    async fn oauth_login_finds_or_creates_then_awaits_otp() {
        let pool = test_pool().await;
        let config = Config::for_tests();
        let service = AuthService::new(&pool, &config, issuer(&config));

        let profile = OauthProfile {
            email: "Ann@X.com".to_string(),
            name: Some("Ann".to_string()),
            avatar_url: Some("https://example.com/ann.png".to_string()),
        };

        let pending = service.oauth_login(profile.clone()).await.unwrap();
        assert_eq!(pending.email, "ann@x.com");

        let repo = AccountRepository::new(&pool);
        let account = repo.get_account_by_email("ann@x.com").await.unwrap().unwrap();
        assert!(account.password_hash.is_none());
        assert!(account.otp.is_some());
        let first_id = account.id;

        // Second federated login reuses the same account.
        service.oauth_login(profile).await.unwrap();
        let account = repo.get_account_by_email("ann@x.com").await.unwrap().unwrap();
        assert_eq!(account.id, first_id);
    }

    #[tokio::test]
    async fn forgot_password_requires_existing_account() {
        let pool = test_pool().await;
        let config = Config::for_tests();
        let service = AuthService::new(&pool, &config, issuer(&config));

        let err = service
            .forgot_password(ForgotPasswordRequest {
                email: "ghost@x.com".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound { .. }));
    }

    #[tokio::test]
    async fn reset_password_replaces_credential() {
        let pool = test_pool().await;
        let config = Config::for_tests();
        let tokens = issuer(&config);
        let service = AuthService::new(&pool, &config, tokens.clone());

        service.register(register_request("ann@x.com")).await.unwrap();

        let token = tokens.issue_reset("ann@x.com", Utc::now()).unwrap();
        service
            .reset_password(
                &token,
                ResetPasswordRequest {
                    password: "correct horse".to_string(),
                },
            )
            .await
            .unwrap();

        // Old password stops working, the new one reaches the OTP step.
        let err = service
            .login(login_request("ann@x.com", "hunter2"))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized { .. }));

        service
            .login(login_request("ann@x.com", "correct horse"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn reset_password_rejects_expired_or_foreign_tokens() {
        let pool = test_pool().await;
        let config = Config::for_tests();
        let tokens = issuer(&config);
        let service = AuthService::new(&pool, &config, tokens.clone());

        service.register(register_request("ann@x.com")).await.unwrap();

        let stale = tokens
            .issue_reset("ann@x.com", Utc::now() - Duration::hours(2))
            .unwrap();
        let err = service
            .reset_password(
                &stale,
                ResetPasswordRequest {
                    password: "new password".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized { .. }));

        // A session token is not a reset capability.
        let repo = AccountRepository::new(&pool);
        let account = repo.get_account_by_email("ann@x.com").await.unwrap().unwrap();
        let session = tokens.issue_session(&account, Utc::now()).unwrap();
        let err = service
            .reset_password(
                &session,
                ResetPasswordRequest {
                    password: "new password".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized { .. }));
    }
}
