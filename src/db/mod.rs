use crate::error::EngineError;
use crate::models::{Test, TestOption, VoteEvent};
use chrono::{DateTime, Utc};
use log::warn;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the database named by `DATABASE_URL` (default `sqlite:pollrank.db`).
    pub async fn new() -> Result<Self, EngineError> {
        let db_url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:pollrank.db".to_string());
        Self::connect(&db_url).await
    }

    pub async fn connect(db_url: &str) -> Result<Self, EngineError> {
        // WAL plus a busy timeout keeps concurrent vote writers queued instead
        // of failing outright; the ledger's retry loop covers the remainder.
        let options = SqliteConnectOptions::from_str(db_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Self::init_schema(&pool).await?;

        Ok(Self { pool })
    }

    // Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // Initialize the database schema
    async fn init_schema(pool: &SqlitePool) -> Result<(), EngineError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tests (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT,
                creator_id TEXT NOT NULL,
                image_url TEXT,
                total_votes INTEGER NOT NULL DEFAULT 0,
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS test_categories (
                test_id TEXT NOT NULL,
                category_id TEXT NOT NULL,
                PRIMARY KEY (test_id, category_id),
                FOREIGN KEY (test_id) REFERENCES tests(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS test_options (
                id TEXT PRIMARY KEY,
                test_id TEXT NOT NULL,
                title TEXT NOT NULL,
                image_url TEXT,
                fields TEXT NOT NULL DEFAULT '[]',
                position INTEGER NOT NULL,
                votes INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (test_id) REFERENCES tests(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        // One vote per (test, voter); the unique key is what makes retried
        // submissions idempotent.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS vote_events (
                id TEXT PRIMARY KEY,
                test_id TEXT NOT NULL,
                option_id TEXT NOT NULL,
                voter_identity TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE (test_id, voter_identity),
                FOREIGN KEY (test_id) REFERENCES tests(id) ON DELETE CASCADE,
                FOREIGN KEY (option_id) REFERENCES test_options(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_vote_events_test ON vote_events (test_id);
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    // Create a new test with its options and category references
    pub async fn create_test(&self, test: &Test) -> Result<(), EngineError> {
        sqlx::query(
            r#"
            INSERT INTO tests (id, title, description, creator_id, image_url, total_votes, is_active, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&test.id)
        .bind(&test.title)
        .bind(&test.description)
        .bind(&test.creator_id)
        .bind(&test.image_url)
        .bind(test.total_votes)
        .bind(test.is_active)
        .bind(test.created_at)
        .execute(&self.pool)
        .await?;

        for category_id in &test.category_ids {
            sqlx::query(
                r#"
                INSERT INTO test_categories (test_id, category_id)
                VALUES (?, ?)
                "#,
            )
            .bind(&test.id)
            .bind(category_id)
            .execute(&self.pool)
            .await?;
        }

        for option in &test.options {
            sqlx::query(
                r#"
                INSERT INTO test_options (id, test_id, title, image_url, fields, position, votes)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&option.id)
            .bind(&test.id)
            .bind(&option.title)
            .bind(&option.image_url)
            .bind(serde_json::to_string(&option.fields).unwrap_or_else(|_| "[]".to_string()))
            .bind(option.position)
            .bind(option.votes)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    // Get a test by ID, with its options in authoring order
    pub async fn get_test(&self, test_id: &str) -> Result<Test, EngineError> {
        let test_row = sqlx::query(
            r#"
            SELECT id, title, description, creator_id, image_url, total_votes, is_active, created_at
            FROM tests
            WHERE id = ?
            "#,
        )
        .bind(test_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(EngineError::TestNotFound)?;

        let category_ids = sqlx::query(
            r#"
            SELECT category_id
            FROM test_categories
            WHERE test_id = ?
            ORDER BY category_id
            "#,
        )
        .bind(test_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| row.get::<String, _>("category_id"))
        .collect();

        let options = self.get_options(test_id).await?;

        Ok(Test {
            id: test_row.get::<String, _>("id"),
            title: test_row.get::<String, _>("title"),
            description: test_row.get("description"),
            creator_id: test_row.get::<String, _>("creator_id"),
            image_url: test_row.get("image_url"),
            category_ids,
            options,
            total_votes: test_row.get::<i64, _>("total_votes"),
            is_active: test_row.get::<bool, _>("is_active"),
            created_at: test_row.get::<DateTime<Utc>, _>("created_at"),
        })
    }

    // Get a test's options in authoring order
    pub async fn get_options(&self, test_id: &str) -> Result<Vec<TestOption>, EngineError> {
        let options = sqlx::query(
            r#"
            SELECT id, test_id, title, image_url, fields, position, votes
            FROM test_options
            WHERE test_id = ?
            ORDER BY position
            "#,
        )
        .bind(test_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| {
            let fields_json = row.get::<String, _>("fields");
            let fields = serde_json::from_str(&fields_json).unwrap_or_else(|e| {
                warn!("Discarding unreadable fields payload for option: {}", e);
                Vec::new()
            });
            TestOption {
                id: row.get::<String, _>("id"),
                test_id: row.get::<String, _>("test_id"),
                title: row.get::<String, _>("title"),
                image_url: row.get("image_url"),
                fields,
                position: row.get::<i64, _>("position"),
                votes: row.get::<i64, _>("votes"),
            }
        })
        .collect();

        Ok(options)
    }

    // Soft-deactivate a test (votes and options are kept)
    pub async fn deactivate_test(&self, test_id: &str) -> Result<(), EngineError> {
        let result = sqlx::query(
            r#"
            UPDATE tests
            SET is_active = FALSE
            WHERE id = ?
            "#,
        )
        .bind(test_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(EngineError::TestNotFound);
        }

        Ok(())
    }

    // Get the recorded vote events for a test
    pub async fn get_vote_events(&self, test_id: &str) -> Result<Vec<VoteEvent>, EngineError> {
        let events = sqlx::query(
            r#"
            SELECT id, test_id, option_id, voter_identity, created_at
            FROM vote_events
            WHERE test_id = ?
            ORDER BY created_at
            "#,
        )
        .bind(test_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| VoteEvent {
            id: row.get::<String, _>("id"),
            test_id: row.get::<String, _>("test_id"),
            option_id: row.get::<String, _>("option_id"),
            voter_identity: row.get::<String, _>("voter_identity"),
            created_at: row.get::<DateTime<Utc>, _>("created_at"),
        })
        .collect();

        Ok(events)
    }
}
