use crate::aggregator::Aggregator;
use crate::db::Database;
use crate::error::EngineError;
use crate::models::VoteEvent;
use log::{info, warn};
use std::time::Duration;
use tokio::time::sleep;

const MAX_WRITE_ATTEMPTS: u32 = 3;
const RETRY_BACKOFF_MS: u64 = 25;

/// Durable record of one vote per (test, voter identity). All writes commit
/// the vote event and the counter updates in a single transaction, so a
/// submission that dies before commit leaves nothing behind and can be
/// retried safely.
#[derive(Clone)]
pub struct VoteLedger {
    db: Database,
    aggregator: Aggregator,
}

impl VoteLedger {
    pub fn new(db: Database, aggregator: Aggregator) -> Self {
        Self { db, aggregator }
    }

    /// Records one vote. Duplicate submissions for the same (test, voter)
    /// come back as `AlreadyVoted`; busy-storage conflicts are retried a
    /// bounded number of times before surfacing as `Transient`.
    pub async fn submit_vote(
        &self,
        test_id: &str,
        option_id: &str,
        voter_identity: &str,
    ) -> Result<VoteEvent, EngineError> {
        if voter_identity.trim().is_empty() {
            return Err(EngineError::InvalidVoter);
        }

        let mut attempt = 0;
        loop {
            match self.try_submit(test_id, option_id, voter_identity).await {
                Err(e) if e.is_busy() => {
                    attempt += 1;
                    if attempt >= MAX_WRITE_ATTEMPTS {
                        warn!(
                            "Giving up on vote for test {} after {} busy attempts",
                            test_id, attempt
                        );
                        return Err(EngineError::Transient);
                    }
                    let backoff = Duration::from_millis(RETRY_BACKOFF_MS << attempt);
                    warn!(
                        "Storage busy recording vote for test {} (attempt {}), retrying in {:?}",
                        test_id, attempt, backoff
                    );
                    sleep(backoff).await;
                }
                Ok(event) => {
                    self.aggregator.invalidate(test_id);
                    info!(
                        "Recorded vote {} for test {} option {}",
                        event.id, test_id, option_id
                    );
                    return Ok(event);
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_submit(
        &self,
        test_id: &str,
        option_id: &str,
        voter_identity: &str,
    ) -> Result<VoteEvent, EngineError> {
        let mut tx = self.db.pool().begin().await?;

        // The increment runs first: it takes the write lock up front and
        // doubles as validation of the test and option. A duplicate vote
        // rolls the whole transaction back below, increments included.
        self.aggregator
            .apply_increment(&mut tx, test_id, option_id)
            .await?;

        let event = VoteEvent::new(test_id, option_id, voter_identity);
        let inserted = sqlx::query(
            r#"
            INSERT INTO vote_events (id, test_id, option_id, voter_identity, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&event.id)
        .bind(&event.test_id)
        .bind(&event.option_id)
        .bind(&event.voter_identity)
        .bind(event.created_at)
        .execute(&mut *tx)
        .await;

        if let Err(e) = inserted {
            if matches!(&e, sqlx::Error::Database(db_err) if db_err.is_unique_violation()) {
                return Err(EngineError::AlreadyVoted);
            }
            return Err(EngineError::from(e));
        }

        tx.commit().await?;
        Ok(event)
    }

    /// Admin operation: removes every vote event for a test and zeroes its
    /// counters, all-or-nothing. Returns how many events were removed.
    pub async fn reset_votes(&self, test_id: &str) -> Result<u64, EngineError> {
        let mut tx = self.db.pool().begin().await?;

        self.aggregator.apply_reset(&mut tx, test_id).await?;

        let deleted = sqlx::query("DELETE FROM vote_events WHERE test_id = ?")
            .bind(test_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        self.aggregator.invalidate(test_id);

        info!("Reset {} vote(s) for test {}", deleted, test_id);
        Ok(deleted)
    }
}
