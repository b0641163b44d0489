use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A poll: a titled set of options voters pick exactly one of.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Test {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub creator_id: String,
    pub image_url: Option<String>,
    /// Category references, used by listing surfaces for display filtering only.
    pub category_ids: Vec<String>,
    /// Options in authoring order.
    pub options: Vec<TestOption>,
    /// Cached counter; always equals the sum of the options' vote counters.
    pub total_votes: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestOption {
    pub id: String,
    pub test_id: String,
    pub title: String,
    pub image_url: Option<String>,
    /// Free-form key/value attributes shown on detail pages, in authoring order.
    pub fields: Vec<OptionField>,
    /// Authoring order; also the tie-break order for rankings.
    pub position: i64,
    pub votes: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionField {
    pub name: String,
    pub value: String,
}

/// Payload for an option at test-creation time, before ids are assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionDraft {
    pub title: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub fields: Vec<OptionField>,
}

impl OptionDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            image_url: None,
            fields: Vec::new(),
        }
    }
}

/// One voter's recorded choice. Never mutated; removed only by an admin reset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteEvent {
    pub id: String,
    pub test_id: String,
    pub option_id: String,
    pub voter_identity: String,
    pub created_at: DateTime<Utc>,
}

/// Aggregated counters for one test, as of a single read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCounts {
    pub test_id: String,
    pub total_votes: i64,
    pub per_option: HashMap<String, i64>,
}

/// One entry of a computed ranking. `score` is the option's vote share as a
/// percentage, rounded to one decimal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedOption {
    pub option: TestOption,
    pub score: f64,
}

/// Computed standings for a test, descending by score. `final_winner` is the
/// head of the list and is absent only when the test has no options; consumers
/// suppress winner UI themselves when `total_votes` is zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingResult {
    pub test_id: String,
    pub total_votes: i64,
    pub final_rankings: Vec<RankedOption>,
    pub final_winner: Option<RankedOption>,
}

impl Test {
    pub fn new(
        title: String,
        description: Option<String>,
        creator_id: String,
        image_url: Option<String>,
        category_ids: Vec<String>,
        options: Vec<OptionDraft>,
    ) -> Self {
        let id = Uuid::new_v4().to_string();

        let options = options
            .into_iter()
            .enumerate()
            .map(|(position, draft)| TestOption {
                id: Uuid::new_v4().to_string(),
                test_id: id.clone(),
                title: draft.title,
                image_url: draft.image_url,
                fields: draft.fields,
                position: position as i64,
                votes: 0,
            })
            .collect();

        Self {
            id,
            title,
            description,
            creator_id,
            image_url,
            category_ids,
            options,
            total_votes: 0,
            is_active: true,
            created_at: Utc::now(),
        }
    }
}

impl VoteEvent {
    pub fn new(test_id: &str, option_id: &str, voter_identity: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            test_id: test_id.to_string(),
            option_id: option_id.to_string(),
            voter_identity: voter_identity.to_string(),
            created_at: Utc::now(),
        }
    }
}
