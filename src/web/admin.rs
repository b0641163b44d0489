/// Admin endpoints for the dashboard: test creation, deactivation, and the
/// vote reset. Authorization happens upstream; these handlers trust the
/// caller was already vetted.
use crate::RankingEngine;
use crate::error::EngineError;
use crate::models::{OptionDraft, Test};
use actix_web::{HttpResponse, post, web};
use log::info;
use serde::{Deserialize, Serialize};

pub(super) fn configure(conf: &mut web::ServiceConfig) {
    conf.service(create_test)
        .service(deactivate_test)
        .service(reset_votes);
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateTestRequest {
    title: String,
    #[serde(default)]
    description: Option<String>,
    creator_id: String,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    category_ids: Vec<String>,
    #[serde(default)]
    options: Vec<OptionDraft>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResetVotesResponse {
    test_id: String,
    removed_votes: u64,
}

#[post("/admin/tests")]
async fn create_test(
    engine: web::Data<RankingEngine>,
    body: web::Json<CreateTestRequest>,
) -> Result<HttpResponse, EngineError> {
    let body = body.into_inner();
    let test = Test::new(
        body.title,
        body.description,
        body.creator_id,
        body.image_url,
        body.category_ids,
        body.options,
    );

    engine.db.create_test(&test).await?;
    info!("Created test {} ({} options)", test.id, test.options.len());

    Ok(HttpResponse::Created().json(test))
}

#[post("/admin/tests/{test_id}/deactivate")]
async fn deactivate_test(
    engine: web::Data<RankingEngine>,
    path: web::Path<String>,
) -> Result<HttpResponse, EngineError> {
    let test_id = path.into_inner();
    engine.db.deactivate_test(&test_id).await?;
    info!("Deactivated test {}", test_id);

    let test = engine.db.get_test(&test_id).await?;
    Ok(HttpResponse::Ok().json(test))
}

#[post("/admin/tests/{test_id}/reset")]
async fn reset_votes(
    engine: web::Data<RankingEngine>,
    path: web::Path<String>,
) -> Result<HttpResponse, EngineError> {
    let test_id = path.into_inner();
    let removed_votes = engine.ledger.reset_votes(&test_id).await?;

    Ok(HttpResponse::Ok().json(ResetVotesResponse {
        test_id,
        removed_votes,
    }))
}
