//! Database repository for account management operations.
//!
//! Provides CRUD operations for the account store. Accounts are immutable
//! values: every mutation goes through an explicit UPDATE that returns the
//! new row, never through in-place field assignment.

use crate::database::models::{Account, CreateAccount};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Repository for account database operations.
///
/// Handles all persistence operations for the Account entity. Email
/// uniqueness is enforced by a case-insensitive unique index, so concurrent
/// duplicate creates produce exactly one winner and a constraint violation
/// for the loser.
pub struct AccountRepository<'a> {
    /// Shared SQLite connection pool
    pool: &'a SqlitePool,
}

impl<'a> AccountRepository<'a> {
    /// Creates a new AccountRepository instance.
    ///
    /// # Arguments
    /// * `pool` - Reference to SQLite connection pool
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates a new account in the database.
    ///
    /// Insertion and the uniqueness check are one atomic statement; a
    /// duplicate email surfaces as a UNIQUE constraint violation.
    pub async fn create_account(&self, create: CreateAccount) -> Result<Account> {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now();

        let account = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (id, name, email, password_hash, avatar_url, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(&id)
        .bind(&create.name)
        .bind(&create.email)
        .bind(&create.password_hash)
        .bind(&create.avatar_url)
        .bind(now)
        .bind(now)
        .fetch_one(self.pool)
        .await?;

        Ok(account)
    }

    /// Retrieves an account by its email (case-insensitive).
    ///
    /// # Returns
    /// `Some(Account)` if found, `None` otherwise
    pub async fn get_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>(
            "SELECT * FROM accounts WHERE email = ? COLLATE NOCASE",
        )
        .bind(email)
        .fetch_optional(self.pool)
        .await?;

        Ok(account)
    }

    /// Retrieves an account by its unique identifier.
    ///
    /// # Returns
    /// `Some(Account)` if found, `None` otherwise
    pub async fn get_account_by_id(&self, id: &str) -> Result<Option<Account>> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(account)
    }

    /// Stores a freshly issued one-time code and its expiry on the account,
    /// replacing any previous pending code.
    pub async fn set_pending_otp(
        &self,
        id: &str,
        code: &str,
        expires: DateTime<Utc>,
    ) -> Result<Account> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts
            SET otp = ?, otp_expires = ?, updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(code)
        .bind(expires)
        .bind(Utc::now())
        .bind(id)
        .fetch_one(self.pool)
        .await?;

        Ok(account)
    }

    /// Clears the pending one-time code, conditional on the stored code still
    /// matching. The conditional UPDATE makes verify-and-clear atomic: of two
    /// concurrent submissions of the same code, only one observes
    /// `rows_affected == 1`.
    ///
    /// # Returns
    /// `true` if this call cleared the code, `false` if another caller won
    /// or the code no longer matches.
    pub async fn take_pending_otp(&self, id: &str, code: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET otp = NULL, otp_expires = NULL, updated_at = ?
            WHERE id = ? AND otp = ?
            "#,
        )
        .bind(Utc::now())
        .bind(id)
        .bind(code)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Replaces the account's credential hash after a completed reset.
    pub async fn update_password(&self, id: &str, password_hash: &str) -> Result<Account> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            UPDATE accounts
            SET password_hash = ?, updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(password_hash)
        .bind(Utc::now())
        .bind(id)
        .fetch_one(self.pool)
        .await?;

        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn new_account(email: &str) -> CreateAccount {
        CreateAccount {
            name: Some("Ann".to_string()),
            email: email.to_string(),
            password_hash: Some("$2b$04$fakehash".to_string()),
            avatar_url: None,
        }
    }

    #[tokio::test]
    async fn create_then_find_by_email() {
        let pool = test_pool().await;
        let repo = AccountRepository::new(&pool);

        let created = repo.create_account(new_account("ann@x.com")).await.unwrap();
        assert_eq!(created.email, "ann@x.com");
        assert!(created.otp.is_none());

        let found = repo.get_account_by_email("ann@x.com").await.unwrap();
        assert_eq!(found.unwrap().id, created.id);
    }

    #[tokio::test]
    async fn email_lookup_is_case_insensitive() {
        let pool = test_pool().await;
        let repo = AccountRepository::new(&pool);

        repo.create_account(new_account("ann@x.com")).await.unwrap();

        let found = repo.get_account_by_email("ANN@X.COM").await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn duplicate_email_violates_unique_index() {
        let pool = test_pool().await;
        let repo = AccountRepository::new(&pool);

        repo.create_account(new_account("ann@x.com")).await.unwrap();

        let err = repo
            .create_account(new_account("Ann@X.com"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("UNIQUE constraint failed"));
    }

    #[tokio::test]
    async fn take_pending_otp_has_exactly_one_winner() {
        let pool = test_pool().await;
        let repo = AccountRepository::new(&pool);

        let account = repo.create_account(new_account("ann@x.com")).await.unwrap();
        repo.set_pending_otp(&account.id, "123456", Utc::now() + Duration::minutes(10))
            .await
            .unwrap();

        assert!(repo.take_pending_otp(&account.id, "123456").await.unwrap());
        // Second submission of the same code loses.
        assert!(!repo.take_pending_otp(&account.id, "123456").await.unwrap());

        let account = repo
            .get_account_by_id(&account.id)
            .await
            .unwrap()
            .unwrap();
        assert!(account.otp.is_none());
        assert!(account.otp_expires.is_none());
    }

    #[tokio::test]
    async fn take_pending_otp_requires_matching_code() {
        let pool = test_pool().await;
        let repo = AccountRepository::new(&pool);

        let account = repo.create_account(new_account("ann@x.com")).await.unwrap();
        repo.set_pending_otp(&account.id, "123456", Utc::now() + Duration::minutes(10))
            .await
            .unwrap();

        assert!(!repo.take_pending_otp(&account.id, "654321").await.unwrap());

        // The stored code survives a failed attempt, so a later correct
        // submission inside the validity window still succeeds.
        assert!(repo.take_pending_otp(&account.id, "123456").await.unwrap());
    }

    #[tokio::test]
    async fn update_password_replaces_hash() {
        let pool = test_pool().await;
        let repo = AccountRepository::new(&pool);

        let account = repo.create_account(new_account("ann@x.com")).await.unwrap();
        let updated = repo
            .update_password(&account.id, "$2b$04$newhash")
            .await
            .unwrap();

        assert_eq!(updated.password_hash.as_deref(), Some("$2b$04$newhash"));
    }
}
