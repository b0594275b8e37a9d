use crate::admin::{AccountPatch, NewAccount};
use crate::error::{BallotError, Result};
use crate::models::{Ack, PollOption, Selection, VoteRecord};
use crate::store::VoteStore;
use async_trait::async_trait;
use chrono::Utc;
use log::{info, warn};
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use sqlx::{
    Row, Sqlite,
    migrate::MigrateDatabase,
    sqlite::{SqlitePool, SqlitePoolOptions},
};
use uuid::Uuid;

/// SQLite-backed `VoteStore`. The `votes` table is keyed on the voter, so the
/// database itself refuses a second vote.
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(db_url: &str) -> Result<Self> {
        let in_memory = db_url.contains(":memory:");

        // Create database if it doesn't exist
        if !in_memory && !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            Sqlite::create_database(db_url).await?;
        }

        // Every connection to an in-memory database would get its own copy
        let mut options = SqlitePoolOptions::new().max_connections(if in_memory { 1 } else { 5 });
        if in_memory {
            options = options.idle_timeout(None).max_lifetime(None);
        }
        let pool = options.connect(db_url).await?;

        Self::init_schema(&pool).await?;
        info!("Connected to database at {}", db_url);

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn init_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS options (
                id TEXT PRIMARY KEY,
                text TEXT NOT NULL,
                detail_text TEXT NOT NULL DEFAULT '',
                is_other BOOLEAN NOT NULL DEFAULT FALSE,
                position INTEGER NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS votes (
                voter_id TEXT PRIMARY KEY,
                option_id TEXT,
                custom_text TEXT,
                custom_detail TEXT,
                cast_at TEXT NOT NULL,
                FOREIGN KEY (option_id) REFERENCES options(id),
                CHECK (option_id IS NOT NULL OR length(trim(custom_text)) > 0)
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL UNIQUE,
                role TEXT NOT NULL DEFAULT 'user',
                password_hash TEXT NOT NULL,
                has_voted BOOLEAN NOT NULL DEFAULT FALSE,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Append options to the catalog, after any already present.
    pub async fn seed_options(&self, texts: &[String]) -> Result<Vec<PollOption>> {
        let seeded: Vec<PollOption> = texts
            .iter()
            .map(|text| PollOption {
                id: Uuid::new_v4().to_string(),
                text: text.trim().to_string(),
                detail_text: String::new(),
                is_freeform: false,
            })
            .collect();
        if seeded.iter().any(|option| option.text.is_empty()) {
            return Err(BallotError::validation("Option text cannot be empty"));
        }

        let mut tx = self.pool.begin().await?;
        let start: i64 = sqlx::query("SELECT COALESCE(MAX(position) + 1, 0) AS next FROM options")
            .fetch_one(&mut *tx)
            .await?
            .get("next");

        for (i, option) in seeded.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO options (id, text, detail_text, is_other, position)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&option.id)
            .bind(&option.text)
            .bind(&option.detail_text)
            .bind(option.is_freeform)
            .bind(start + i as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(seeded)
    }

    // Get the vote on record for a voter, if any
    pub async fn get_vote(&self, voter_id: &str) -> Result<Option<VoteRecord>> {
        let row = sqlx::query(
            r#"
            SELECT voter_id, option_id, custom_text, custom_detail, cast_at
            FROM votes
            WHERE voter_id = ?
            "#,
        )
        .bind(voter_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let cast_at_str = row.get::<String, _>("cast_at");
        let cast_at = chrono::DateTime::parse_from_rfc3339(&cast_at_str)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|e| {
                warn!("Failed to parse cast_at {:?}: {}", cast_at_str, e);
                Utc::now()
            });

        Ok(Some(VoteRecord {
            voter_id: row.get("voter_id"),
            option_id: row.get("option_id"),
            freeform_title: row.get("custom_text"),
            freeform_detail: row.get("custom_detail"),
            cast_at,
        }))
    }
}

pub(crate) fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

#[async_trait]
impl VoteStore for Database {
    async fn fetch_options(&self) -> Result<Value> {
        let options: Vec<Value> = sqlx::query(
            r#"
            SELECT id, text, detail_text, is_other
            FROM options
            ORDER BY position
            "#,
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| {
            json!({
                "id": row.get::<String, _>("id"),
                "text": row.get::<String, _>("text"),
                "detail_text": row.get::<String, _>("detail_text"),
                "isOther": row.get::<bool, _>("is_other"),
            })
        })
        .collect();

        Ok(Value::Array(options))
    }

    async fn submit_vote(&self, voter_id: &str, selection: &Selection) -> Result<Ack> {
        if voter_id.trim().is_empty() {
            return Err(BallotError::validation("A voter id is required"));
        }

        if let Selection::Freeform { title, .. } = selection {
            if title.trim().is_empty() {
                return Err(BallotError::validation(
                    "Please enter a title for your custom option",
                ));
            }
        }

        // First verify the option exists and isn't the write-in slot
        if let Selection::Catalog { option_id } = selection {
            let is_other: Option<bool> = sqlx::query("SELECT is_other FROM options WHERE id = ?")
                .bind(option_id)
                .fetch_optional(&self.pool)
                .await?
                .map(|row| row.get("is_other"));

            match is_other {
                None => return Err(BallotError::validation(format!("Unknown option: {}", option_id))),
                Some(true) => {
                    return Err(BallotError::validation(
                        "Please enter a title for your custom option",
                    ));
                }
                Some(false) => {}
            }
        }

        let record = VoteRecord::new(voter_id, selection);
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO votes (voter_id, option_id, custom_text, custom_detail, cast_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.voter_id)
        .bind(&record.option_id)
        .bind(&record.freeform_title)
        .bind(&record.freeform_detail)
        .bind(record.cast_at.to_rfc3339())
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                warn!("Rejected second vote from {}", voter_id);
                return Err(BallotError::AlreadyVoted);
            }
            Err(e) => return Err(e.into()),
        }

        sqlx::query("UPDATE users SET has_voted = TRUE WHERE id = ?")
            .bind(voter_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        info!("Recorded vote for {}", voter_id);

        Ok(Ack {
            message: "Vote recorded".to_string(),
        })
    }

    async fn fetch_results(&self) -> Result<Value> {
        let options: Vec<Value> = sqlx::query(
            r#"
            SELECT o.id, o.text, o.detail_text, COUNT(v.voter_id) AS votes
            FROM options o
            LEFT JOIN votes v ON v.option_id = o.id
            WHERE o.is_other = FALSE
            GROUP BY o.id, o.text, o.detail_text, o.position
            ORDER BY o.position
            "#,
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| {
            json!({
                "optionId": row.get::<String, _>("id"),
                "text": row.get::<String, _>("text"),
                "detail_text": row.get::<String, _>("detail_text"),
                "votes": row.get::<i64, _>("votes"),
            })
        })
        .collect();

        let free_texts: Vec<Value> = sqlx::query(
            r#"
            SELECT custom_text, custom_detail
            FROM votes
            WHERE option_id IS NULL
            ORDER BY cast_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| {
            json!({
                "text": row.get::<Option<String>, _>("custom_text").unwrap_or_default(),
                "detail_text": row.get::<Option<String>, _>("custom_detail").unwrap_or_default(),
            })
        })
        .collect();

        let total_users: i64 = sqlx::query("SELECT COUNT(*) AS n FROM users")
            .fetch_one(&self.pool)
            .await?
            .get("n");
        let total_voted: i64 = sqlx::query("SELECT COUNT(*) AS n FROM votes")
            .fetch_one(&self.pool)
            .await?
            .get("n");

        Ok(json!({
            "options": options,
            "freeTexts": free_texts,
            "totalUsers": total_users,
            "totalVoted": total_voted,
        }))
    }

    async fn list_users(&self) -> Result<Value> {
        let users: Vec<Value> = sqlx::query(
            r#"
            SELECT id, name, email, role, has_voted
            FROM users
            ORDER BY created_at
            "#,
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| {
            json!({
                "_id": row.get::<String, _>("id"),
                "name": row.get::<String, _>("name"),
                "email": row.get::<String, _>("email"),
                "role": row.get::<String, _>("role"),
                "hasVoted": row.get::<bool, _>("has_voted"),
            })
        })
        .collect();

        Ok(Value::Array(users))
    }

    async fn create_user(&self, account: &NewAccount) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (id, name, email, role, password_hash, has_voted, created_at)
            VALUES (?, ?, ?, ?, ?, FALSE, ?)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&account.name)
        .bind(&account.email)
        .bind(account.role.as_str())
        .bind(hash_password(&account.password))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(BallotError::validation(format!(
                "A user with email {} already exists",
                account.email
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_user(&self, user_id: &str, patch: &AccountPatch) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET name = COALESCE(?, name),
                role = COALESCE(?, role)
            WHERE id = ?
            "#,
        )
        .bind(&patch.name)
        .bind(patch.role.map(|r| r.as_str()))
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(BallotError::fetch(Some(404), "User not found"));
        }
        Ok(())
    }

    // Votes outlive the account; only the user row goes
    async fn delete_user(&self, user_id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(BallotError::fetch(Some(404), "User not found"));
        }
        Ok(())
    }
}
