use crate::aggregator::{self, Aggregator};
use crate::db::Database;
use crate::error::EngineError;
use crate::models::{RankedOption, RankingResult, TestCounts, TestOption};
use std::cmp::Ordering;

/// Turns aggregated counts into the ordered standings consumed by listing
/// pages, detail pages, and the share dialog.
#[derive(Clone)]
pub struct RankingResolver {
    db: Database,
    aggregator: Aggregator,
}

impl RankingResolver {
    pub fn new(db: Database, aggregator: Aggregator) -> Self {
        Self { db, aggregator }
    }

    /// Full standings for a test, descending by score.
    pub async fn rank(&self, test_id: &str) -> Result<RankingResult, EngineError> {
        let options = self.db.get_options(test_id).await?;
        let counts = self.aggregator.get_counts(test_id).await?;
        Ok(compute_ranking(test_id, &options, &counts))
    }

    /// The head of the full ranking, for share/summary surfaces that show
    /// only a few entries. Same computation as `rank`, truncated; the winner
    /// is unaffected.
    pub async fn top_n(&self, test_id: &str, n: usize) -> Result<RankingResult, EngineError> {
        let mut result = self.rank(test_id).await?;
        result.final_rankings.truncate(n);
        Ok(result)
    }
}

/// Scores and orders a test's options against a counts snapshot.
///
/// Scores are vote shares as percentages, rounded to one decimal so repeated
/// reads serialize identically. The sort is stable and `options` arrives in
/// authoring order, so equal scores keep that order deterministically. With
/// no options there is no winner; with options but no votes the first option
/// is still reported and consumers suppress their winner UI off
/// `total_votes == 0`.
pub fn compute_ranking(test_id: &str, options: &[TestOption], counts: &TestCounts) -> RankingResult {
    let total_votes = counts.total_votes;

    let mut final_rankings: Vec<RankedOption> = options
        .iter()
        .map(|option| {
            let votes = counts.per_option.get(&option.id).copied().unwrap_or(0);
            let score = (aggregator::win_rate(votes, total_votes) * 1000.0).round() / 10.0;
            let mut option = option.clone();
            option.votes = votes;
            RankedOption { option, score }
        })
        .collect();

    final_rankings.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let final_winner = final_rankings.first().cloned();

    RankingResult {
        test_id: test_id.to_string(),
        total_votes,
        final_rankings,
        final_winner,
    }
}
