//! Metadata repository

use chrono::{DateTime, Utc};
use postern_core::privilege;
use postern_core::types::{MailAccount, MailServer, NewMailAccount, NewMailServer, NewUser, User};
use postern_core::{Error, Result};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::{debug, info, warn};

type AccountRow = (i64, i64, String, String, String, String, i64, bool, bool);

const ACCOUNT_COLUMNS: &str = "id, user_id, email, friendly_name, incoming_login, \
     incoming_password, server_id, used_to_authorize, use_threading";

pub struct MetadataStore {
    pool: SqlitePool,
}

impl MetadataStore {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

        let store = Self { pool };
        store.init().await?;

        Ok(store)
    }

    /// Private in-memory database.
    ///
    /// Every SQLite connection gets its own memory database, so the pool is
    /// pinned to a single connection that is never recycled.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

        let store = Self { pool };
        store.init().await?;

        Ok(store)
    }

    async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS mail_servers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                domain TEXT UNIQUE NOT NULL,
                enable_threading INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS mail_accounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                email TEXT NOT NULL,
                friendly_name TEXT NOT NULL DEFAULT '',
                incoming_login TEXT NOT NULL,
                incoming_password TEXT NOT NULL,
                server_id INTEGER NOT NULL,
                used_to_authorize INTEGER NOT NULL DEFAULT 0,
                use_threading INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

        // At most one account per address may be used to log in
        sqlx::query(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_mail_accounts_authorize
            ON mail_accounts(email) WHERE used_to_authorize = 1
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

        info!("Metadata store initialized");
        Ok(())
    }

    // User operations
    pub async fn create_user(&self, user: &NewUser) -> Result<User> {
        let created_at = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO users (name, email, created_at)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

        let id = result.last_insert_rowid();
        debug!("Created user {}: {}", id, user.email);

        Ok(User {
            id,
            name: user.name.clone(),
            email: user.email.clone(),
            created_at,
        })
    }

    pub async fn get_user(&self, id: i64) -> Result<Option<User>> {
        let row: Option<(i64, String, String, String)> = sqlx::query_as(
            r#"SELECT id, name, email, created_at FROM users WHERE id = ?"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

        row.map(|r| {
            Ok(User {
                id: r.0,
                name: r.1,
                email: r.2,
                created_at: parse_timestamp(&r.3)?,
            })
        })
        .transpose()
    }

    pub async fn delete_user(&self, id: i64) -> Result<()> {
        let result = sqlx::query(r#"DELETE FROM users WHERE id = ?"#)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(Error::NoSuchUser);
        }

        debug!("Deleted user {}", id);
        Ok(())
    }

    pub async fn count_users(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(r#"SELECT COUNT(*) FROM users"#)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

        Ok(count)
    }

    // Server operations
    pub async fn create_server(&self, server: &NewMailServer) -> Result<MailServer> {
        let result = sqlx::query(
            r#"
            INSERT INTO mail_servers (name, domain, enable_threading)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&server.name)
        .bind(&server.domain)
        .bind(server.enable_threading)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint") {
                Error::InvalidArgument(format!(
                    "A server for domain {} already exists",
                    server.domain
                ))
            } else {
                Error::DatabaseError(e.to_string())
            }
        })?;

        let id = result.last_insert_rowid();
        debug!("Created mail server {} for domain {}", id, server.domain);

        Ok(MailServer {
            id,
            name: server.name.clone(),
            domain: server.domain.clone(),
            enable_threading: server.enable_threading,
        })
    }

    pub async fn get_server_by_domain(&self, domain: &str) -> Result<Option<MailServer>> {
        let row: Option<(i64, String, String, bool)> = sqlx::query_as(
            r#"
            SELECT id, name, domain, enable_threading
            FROM mail_servers WHERE domain = ?
            "#,
        )
        .bind(domain)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

        Ok(row.map(|r| MailServer {
            id: r.0,
            name: r.1,
            domain: r.2,
            enable_threading: r.3,
        }))
    }

    pub async fn list_servers(&self) -> Result<Vec<MailServer>> {
        let rows: Vec<(i64, String, String, bool)> = sqlx::query_as(
            r#"
            SELECT id, name, domain, enable_threading
            FROM mail_servers ORDER BY domain
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|r| MailServer {
                id: r.0,
                name: r.1,
                domain: r.2,
                enable_threading: r.3,
            })
            .collect())
    }

    // Account operations
    pub async fn create_account(&self, account: &NewMailAccount) -> Result<MailAccount> {
        if !privilege::is_elevated() {
            warn!(
                "Refusing to create mail account {} without elevated privileges",
                account.email
            );
            return Err(Error::AccessDenied);
        }

        if self.get_user(account.user_id).await?.is_none() {
            return Err(Error::NoSuchUser);
        }

        let result = sqlx::query(
            r#"
            INSERT INTO mail_accounts
                (user_id, email, friendly_name, incoming_login, incoming_password, server_id)
            SELECT ?, ?, ?, ?, ?, id FROM mail_servers WHERE id = ?
            "#,
        )
        .bind(account.user_id)
        .bind(&account.email)
        .bind(&account.friendly_name)
        .bind(&account.incoming_login)
        .bind(&account.incoming_password)
        .bind(account.server_id)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(Error::NoSuchServer);
        }

        let id = result.last_insert_rowid();
        debug!("Created mail account {} for user {}", id, account.user_id);

        Ok(MailAccount {
            id: Some(id),
            owner_user_id: Some(account.user_id),
            email: account.email.clone(),
            friendly_name: account.friendly_name.clone(),
            incoming_login: account.incoming_login.clone(),
            incoming_password: account.incoming_password.clone(),
            server_id: account.server_id,
            used_to_authorize: false,
            use_threading: false,
        })
    }

    pub async fn get_account(&self, id: i64) -> Result<Option<MailAccount>> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {} FROM mail_accounts WHERE id = ?",
            ACCOUNT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

        Ok(row.map(account_from_row))
    }

    pub async fn get_account_used_to_authorize(&self, login: &str) -> Result<Option<MailAccount>> {
        let row: Option<AccountRow> = sqlx::query_as(&format!(
            "SELECT {} FROM mail_accounts WHERE email = ? AND used_to_authorize = 1",
            ACCOUNT_COLUMNS
        ))
        .bind(login)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Error::DatabaseError(e.to_string()))?;

        Ok(row.map(account_from_row))
    }

    pub async fn update_account(&self, account: &MailAccount) -> Result<()> {
        let id = account.id.ok_or(Error::NoSuchAccount)?;

        let result = sqlx::query(
            r#"
            UPDATE mail_accounts
            SET email = ?, friendly_name = ?, incoming_login = ?, incoming_password = ?,
                server_id = ?, used_to_authorize = ?, use_threading = ?
            WHERE id = ?
            "#,
        )
        .bind(&account.email)
        .bind(&account.friendly_name)
        .bind(&account.incoming_login)
        .bind(&account.incoming_password)
        .bind(account.server_id)
        .bind(account.used_to_authorize)
        .bind(account.use_threading)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint") {
                Error::AccountExists
            } else {
                Error::DatabaseError(e.to_string())
            }
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::NoSuchAccountNamed(account.email.clone()));
        }

        debug!("Updated mail account {}: {}", id, account.email);
        Ok(())
    }

    pub async fn delete_account(&self, id: i64) -> Result<()> {
        let result = sqlx::query(r#"DELETE FROM mail_accounts WHERE id = ?"#)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(Error::NoSuchAccount);
        }

        debug!("Deleted mail account {}", id);
        Ok(())
    }

    pub async fn count_accounts(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(r#"SELECT COUNT(*) FROM mail_accounts"#)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| Error::DatabaseError(e.to_string()))?;

        Ok(count)
    }
}

fn account_from_row(r: AccountRow) -> MailAccount {
    MailAccount {
        id: Some(r.0),
        owner_user_id: Some(r.1),
        email: r.2,
        friendly_name: r.3,
        incoming_login: r.4,
        incoming_password: r.5,
        server_id: r.6,
        used_to_authorize: r.7,
        use_threading: r.8,
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::DatabaseError(format!("Invalid timestamp {}: {}", value, e)))
}

// ============= Collaborator Trait Implementations =============

use crate::traits::{AccountRepository, IdentityProvisioner, MailProvisioner, ServerRepository};
use async_trait::async_trait;

#[async_trait]
impl AccountRepository for MetadataStore {
    async fn get_account_used_to_authorize(&self, login: &str) -> Result<Option<MailAccount>> {
        MetadataStore::get_account_used_to_authorize(self, login).await
    }

    async fn update_account(&self, account: &MailAccount) -> Result<()> {
        MetadataStore::update_account(self, account).await
    }
}

#[async_trait]
impl ServerRepository for MetadataStore {
    async fn get_server_by_domain(&self, domain: &str) -> Result<Option<MailServer>> {
        MetadataStore::get_server_by_domain(self, domain).await
    }
}

#[async_trait]
impl IdentityProvisioner for MetadataStore {
    async fn create_user(&self, user: &NewUser) -> Result<User> {
        MetadataStore::create_user(self, user).await
    }

    async fn delete_user(&self, user_id: i64) -> Result<()> {
        MetadataStore::delete_user(self, user_id).await
    }
}

#[async_trait]
impl MailProvisioner for MetadataStore {
    async fn create_account(&self, account: &NewMailAccount) -> Result<MailAccount> {
        MetadataStore::create_account(self, account).await
    }

    async fn delete_account(&self, account_id: i64) -> Result<()> {
        MetadataStore::delete_account(self, account_id).await
    }
}
