use crate::db::Database;
use crate::error::EngineError;
use crate::models::TestCounts;
use log::debug;
use moka::sync::Cache;
use sqlx::{Row, Sqlite, Transaction};
use std::collections::HashMap;
use std::time::Duration;

const COUNTS_CACHE_TTL_SECONDS: u64 = 5;
const COUNTS_CACHE_CAPACITY: u64 = 10_000;

/// Owns the vote counters. Every counter mutation in the system goes through
/// `apply_increment` or `apply_reset`, inside a transaction opened by the
/// ledger, which is what keeps `tests.total_votes` equal to the sum of its
/// options' counters.
#[derive(Clone)]
pub struct Aggregator {
    db: Database,
    counts_cache: Cache<String, TestCounts>,
}

impl Aggregator {
    pub fn new(db: Database) -> Self {
        let counts_cache = Cache::builder()
            .max_capacity(COUNTS_CACHE_CAPACITY)
            .time_to_live(Duration::from_secs(COUNTS_CACHE_TTL_SECONDS))
            .build();
        Self { db, counts_cache }
    }

    /// Bumps an option's counter and its test's total by one, inside the
    /// caller's transaction. The first statement also revalidates the test:
    /// an update that matches no row distinguishes a missing test from a
    /// deactivated one with a follow-up read.
    pub async fn apply_increment(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        test_id: &str,
        option_id: &str,
    ) -> Result<(), EngineError> {
        let test_update = sqlx::query(
            r#"
            UPDATE tests
            SET total_votes = total_votes + 1
            WHERE id = ? AND is_active = TRUE
            "#,
        )
        .bind(test_id)
        .execute(&mut **tx)
        .await?;

        if test_update.rows_affected() == 0 {
            let existing = sqlx::query("SELECT is_active FROM tests WHERE id = ?")
                .bind(test_id)
                .fetch_optional(&mut **tx)
                .await?;
            return Err(match existing {
                Some(_) => EngineError::TestInactive,
                None => EngineError::TestNotFound,
            });
        }

        let option_update = sqlx::query(
            r#"
            UPDATE test_options
            SET votes = votes + 1
            WHERE id = ? AND test_id = ?
            "#,
        )
        .bind(option_id)
        .bind(test_id)
        .execute(&mut **tx)
        .await?;

        if option_update.rows_affected() == 0 {
            return Err(EngineError::OptionNotFound);
        }

        Ok(())
    }

    /// Zeroes all counters for a test inside the caller's transaction.
    /// Allowed on inactive tests; the admin reset is how old votes leave.
    pub async fn apply_reset(
        &self,
        tx: &mut Transaction<'_, Sqlite>,
        test_id: &str,
    ) -> Result<(), EngineError> {
        let test_update = sqlx::query(
            r#"
            UPDATE tests
            SET total_votes = 0
            WHERE id = ?
            "#,
        )
        .bind(test_id)
        .execute(&mut **tx)
        .await?;

        if test_update.rows_affected() == 0 {
            return Err(EngineError::TestNotFound);
        }

        sqlx::query(
            r#"
            UPDATE test_options
            SET votes = 0
            WHERE test_id = ?
            "#,
        )
        .bind(test_id)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Current counters for a test. Served from a short-TTL cache; writers
    /// invalidate on commit, so reads on one node never move backwards.
    pub async fn get_counts(&self, test_id: &str) -> Result<TestCounts, EngineError> {
        if let Some(counts) = self.counts_cache.get(test_id) {
            return Ok(counts);
        }

        let total_votes = sqlx::query("SELECT total_votes FROM tests WHERE id = ?")
            .bind(test_id)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or(EngineError::TestNotFound)?
            .get::<i64, _>("total_votes");

        let per_option: HashMap<String, i64> =
            sqlx::query("SELECT id, votes FROM test_options WHERE test_id = ?")
                .bind(test_id)
                .fetch_all(self.db.pool())
                .await?
                .into_iter()
                .map(|row| (row.get::<String, _>("id"), row.get::<i64, _>("votes")))
                .collect();

        let counts = TestCounts {
            test_id: test_id.to_string(),
            total_votes,
            per_option,
        };
        self.counts_cache.insert(test_id.to_string(), counts.clone());

        Ok(counts)
    }

    /// Drops the cached counts for a test. Called by the ledger after any
    /// committed write.
    pub fn invalidate(&self, test_id: &str) {
        self.counts_cache.invalidate(test_id);
    }

    /// Housekeeping hook for the periodic sweep task: expires stale entries
    /// that no read has touched since their TTL lapsed.
    pub fn run_pending_maintenance(&self) {
        self.counts_cache.run_pending_tasks();
        debug!("Counts cache holds {} entries", self.counts_cache.entry_count());
    }
}

/// An option's share of its test's votes; 0 when the test has no votes yet.
pub fn win_rate(option_votes: i64, total_votes: i64) -> f64 {
    if total_votes <= 0 {
        0.0
    } else {
        option_votes as f64 / total_votes as f64
    }
}

#[cfg(test)]
mod tests {
    use super::win_rate;

    #[test]
    fn win_rate_is_zero_without_votes() {
        assert_eq!(win_rate(0, 0), 0.0);
        assert_eq!(win_rate(3, 0), 0.0);
    }

    #[test]
    fn win_rate_is_the_vote_share() {
        assert_eq!(win_rate(5, 10), 0.5);
        assert_eq!(win_rate(1, 4), 0.25);
        assert_eq!(win_rate(10, 10), 1.0);
    }
}
