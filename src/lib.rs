pub mod aggregator;
pub mod db;
pub mod error;
pub mod ledger;
pub mod models;
pub mod ranking;
pub mod tasks;
pub mod web;

use aggregator::Aggregator;
use db::Database;
use ledger::VoteLedger;
use ranking::RankingResolver;

/// The wired-up engine: ledger for writes, aggregator for counts, resolver
/// for standings, all sharing one database handle. Cheap to clone; handlers
/// receive it as shared application state.
#[derive(Clone)]
pub struct RankingEngine {
    pub db: Database,
    pub aggregator: Aggregator,
    pub ledger: VoteLedger,
    pub resolver: RankingResolver,
}

impl RankingEngine {
    pub fn new(db: Database) -> Self {
        let aggregator = Aggregator::new(db.clone());
        let ledger = VoteLedger::new(db.clone(), aggregator.clone());
        let resolver = RankingResolver::new(db.clone(), aggregator.clone());
        Self {
            db,
            aggregator,
            ledger,
            resolver,
        }
    }
}
