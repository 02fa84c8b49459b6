use anyhow::{Context as _, Result};
use chrono::Utc;
use sqlx::{sqlite::SqliteConnectOptions, SqlitePool};
use std::{path::Path, str::FromStr};
use uuid::Uuid;

/// Default timeout for individual SQLite queries.
/// Prevents hung queries from blocking the daemon indefinitely.
const QUERY_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Execute a future with the standard query timeout.
/// Returns an error if the operation takes longer than `QUERY_TIMEOUT`.
async fn with_timeout<T>(fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(QUERY_TIMEOUT, fut).await {
        Ok(result) => result,
        Err(_) => Err(anyhow::anyhow!(
            "database query timed out after {}s",
            QUERY_TIMEOUT.as_secs()
        )),
    }
}

/// A Facebook access token scoped to one GTM container.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct TokenRow {
    pub id: String,
    pub token_name: String,
    /// Meta dataset id — identical to the pixel id for CAPI purposes.
    pub dataset_id: String,
    pub dataset_name: Option<String>,
    pub access_token: String,
    pub gtm_container_id: String,
    pub is_active: bool,
    pub last_used: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A (GTM container, domain) ownership claim and its verification state.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct VerificationRow {
    pub id: String,
    pub gtm_container_id: String,
    pub domain_name: String,
    pub verification_token: String,
    pub is_verified: bool,
    pub verified_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub async fn new(data_dir: &Path) -> Result<Self> {
        Self::new_with_slow_query(data_dir, 0).await
    }

    /// Create storage with slow-query logging enabled.
    ///
    /// `slow_query_ms` is the threshold in milliseconds — queries exceeding it are
    /// logged at WARN level. Set to 0 to disable slow-query logging.
    pub async fn new_with_slow_query(data_dir: &Path, slow_query_ms: u64) -> Result<Self> {
        use sqlx::ConnectOptions as _;

        tokio::fs::create_dir_all(data_dir).await?;
        let db_path = data_dir.join("capify.db");
        let mut opts =
            SqliteConnectOptions::from_str(&format!("sqlite://{}?mode=rwc", db_path.display()))?
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .create_if_missing(true);

        if slow_query_ms > 0 {
            opts = opts.log_slow_statements(
                log::LevelFilter::Warn,
                std::time::Duration::from_millis(slow_query_ms),
            );
        }

        let pool = SqlitePool::connect_with(opts).await?;
        Self::migrate(&pool).await?;
        Ok(Self { pool })
    }

    /// Return a clone of the connection pool (cheap — Arc-backed).
    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    async fn migrate(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS tokens (
                 id TEXT PRIMARY KEY,
                 token_name TEXT NOT NULL,
                 dataset_id TEXT NOT NULL,
                 dataset_name TEXT,
                 access_token TEXT NOT NULL,
                 gtm_container_id TEXT NOT NULL,
                 is_active INTEGER NOT NULL DEFAULT 1,
                 last_used TEXT,
                 created_at TEXT NOT NULL,
                 updated_at TEXT NOT NULL
             )",
        )
        .execute(pool)
        .await
        .context("Failed to create tokens table")?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS verifications (
                 id TEXT PRIMARY KEY,
                 gtm_container_id TEXT NOT NULL,
                 domain_name TEXT NOT NULL UNIQUE,
                 verification_token TEXT NOT NULL,
                 is_verified INTEGER NOT NULL DEFAULT 0,
                 verified_at TEXT,
                 created_at TEXT NOT NULL,
                 updated_at TEXT NOT NULL
             )",
        )
        .execute(pool)
        .await
        .context("Failed to create verifications table")?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_tokens_container ON tokens (gtm_container_id)",
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    // ─── Tokens ─────────────────────────────────────────────────────────────

    pub async fn create_token(
        &self,
        token_name: &str,
        dataset_id: &str,
        dataset_name: Option<&str>,
        access_token: &str,
        gtm_container_id: &str,
    ) -> Result<TokenRow> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO tokens (id, token_name, dataset_id, dataset_name, access_token, gtm_container_id, is_active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(&id)
        .bind(token_name)
        .bind(dataset_id)
        .bind(dataset_name)
        .bind(access_token)
        .bind(gtm_container_id)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        self.get_token(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("token not found after insert"))
    }

    pub async fn get_token(&self, id: &str) -> Result<Option<TokenRow>> {
        Ok(sqlx::query_as("SELECT * FROM tokens WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn list_tokens(&self) -> Result<Vec<TokenRow>> {
        with_timeout(async {
            Ok(
                sqlx::query_as("SELECT * FROM tokens ORDER BY created_at DESC")
                    .fetch_all(&self.pool)
                    .await?,
            )
        })
        .await
    }

    /// Any token registered for the container, active or not. The relay
    /// distinguishes "no token" (404) from "token inactive" (403).
    pub async fn get_token_by_container(&self, gtm_container_id: &str) -> Result<Option<TokenRow>> {
        Ok(
            sqlx::query_as("SELECT * FROM tokens WHERE gtm_container_id = ? ORDER BY created_at DESC")
                .bind(gtm_container_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    /// Active token only — what the generated scripts fetch via token-info.
    pub async fn get_active_token_by_container(
        &self,
        gtm_container_id: &str,
    ) -> Result<Option<TokenRow>> {
        Ok(sqlx::query_as(
            "SELECT * FROM tokens WHERE gtm_container_id = ? AND is_active = 1 ORDER BY created_at DESC",
        )
        .bind(gtm_container_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn set_token_active(&self, id: &str, is_active: bool) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE tokens SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(is_active)
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn touch_token_last_used(&self, id: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query("UPDATE tokens SET last_used = ?, updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(&now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn delete_token(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM tokens WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete every token bound to a container. Used when the container's
    /// domain verification is removed; returns the number deleted.
    pub async fn delete_tokens_by_container(&self, gtm_container_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM tokens WHERE gtm_container_id = ?")
            .bind(gtm_container_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // ─── Verifications ──────────────────────────────────────────────────────

    pub async fn create_verification(
        &self,
        gtm_container_id: &str,
        domain_name: &str,
        verification_token: &str,
    ) -> Result<VerificationRow> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO verifications (id, gtm_container_id, domain_name, verification_token, is_verified, created_at, updated_at)
             VALUES (?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(&id)
        .bind(gtm_container_id)
        .bind(domain_name)
        .bind(verification_token)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;
        self.get_verification(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("verification not found after insert"))
    }

    pub async fn get_verification(&self, id: &str) -> Result<Option<VerificationRow>> {
        Ok(sqlx::query_as("SELECT * FROM verifications WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn list_verifications(&self) -> Result<Vec<VerificationRow>> {
        with_timeout(async {
            Ok(
                sqlx::query_as("SELECT * FROM verifications ORDER BY created_at DESC")
                    .fetch_all(&self.pool)
                    .await?,
            )
        })
        .await
    }

    pub async fn find_verification_by_domain(
        &self,
        domain_name: &str,
    ) -> Result<Option<VerificationRow>> {
        Ok(
            sqlx::query_as("SELECT * FROM verifications WHERE domain_name = ?")
                .bind(domain_name)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    /// The verified domain claim for a container, if any. Supplies the
    /// fallback event_source_url for relayed events.
    pub async fn find_verified_by_container(
        &self,
        gtm_container_id: &str,
    ) -> Result<Option<VerificationRow>> {
        Ok(sqlx::query_as(
            "SELECT * FROM verifications WHERE gtm_container_id = ? AND is_verified = 1 ORDER BY created_at DESC",
        )
        .bind(gtm_container_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    pub async fn update_verification(
        &self,
        id: &str,
        gtm_container_id: Option<&str>,
        domain_name: Option<&str>,
    ) -> Result<Option<VerificationRow>> {
        let now = Utc::now().to_rfc3339();
        if let Some(container) = gtm_container_id {
            sqlx::query("UPDATE verifications SET gtm_container_id = ?, updated_at = ? WHERE id = ?")
                .bind(container)
                .bind(&now)
                .bind(id)
                .execute(&self.pool)
                .await?;
        }
        if let Some(domain) = domain_name {
            sqlx::query("UPDATE verifications SET domain_name = ?, updated_at = ? WHERE id = ?")
                .bind(domain)
                .bind(&now)
                .bind(id)
                .execute(&self.pool)
                .await?;
        }
        self.get_verification(id).await
    }

    pub async fn mark_verified(&self, id: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "UPDATE verifications SET is_verified = 1, verified_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete_verification(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM verifications WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
