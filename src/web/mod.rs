pub mod admin;

use crate::RankingEngine;
use crate::error::EngineError;
use actix_web::{HttpRequest, HttpResponse, get, post, web};
use serde::{Deserialize, Serialize};

pub fn configure(conf: &mut web::ServiceConfig) {
    conf.service(view_test)
        .service(view_rank)
        .service(view_counts)
        .service(submit_vote);
    admin::configure(conf);
}

/// The session/auth collaborator forwards the caller's stable identity in
/// this header; the engine only requires that it is present and non-empty.
const VOTER_ID_HEADER: &str = "x-voter-id";

fn voter_identity(req: &HttpRequest) -> Result<String, EngineError> {
    let identity = req
        .headers()
        .get(VOTER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .unwrap_or("");
    if identity.is_empty() {
        return Err(EngineError::InvalidVoter);
    }
    Ok(identity.to_string())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitVoteRequest {
    option_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SubmitVoteResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    vote_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RankQuery {
    /// Truncates the rankings to the first N entries (share dialogs ask for
    /// the top 3-5); scores and winner are computed the same way regardless.
    top: Option<usize>,
}

#[get("/tests/{test_id}")]
async fn view_test(
    engine: web::Data<RankingEngine>,
    path: web::Path<String>,
) -> Result<HttpResponse, EngineError> {
    let test = engine.db.get_test(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(test))
}

#[get("/tests/{test_id}/rank")]
async fn view_rank(
    engine: web::Data<RankingEngine>,
    path: web::Path<String>,
    query: web::Query<RankQuery>,
) -> Result<HttpResponse, EngineError> {
    let test_id = path.into_inner();
    let result = match query.top {
        Some(n) => engine.resolver.top_n(&test_id, n).await?,
        None => engine.resolver.rank(&test_id).await?,
    };
    Ok(HttpResponse::Ok().json(result))
}

#[get("/tests/{test_id}/counts")]
async fn view_counts(
    engine: web::Data<RankingEngine>,
    path: web::Path<String>,
) -> Result<HttpResponse, EngineError> {
    let counts = engine.aggregator.get_counts(&path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(counts))
}

#[post("/tests/{test_id}/votes")]
async fn submit_vote(
    engine: web::Data<RankingEngine>,
    path: web::Path<String>,
    body: web::Json<SubmitVoteRequest>,
    req: HttpRequest,
) -> Result<HttpResponse, EngineError> {
    let test_id = path.into_inner();
    let voter = voter_identity(&req)?;

    match engine.ledger.submit_vote(&test_id, &body.option_id, &voter).await {
        Ok(event) => Ok(HttpResponse::Created().json(SubmitVoteResponse {
            status: "recorded",
            vote_id: Some(event.id),
        })),
        // A repeat submission is not an error to the voter; their vote counted.
        Err(EngineError::AlreadyVoted) => Ok(HttpResponse::Ok().json(SubmitVoteResponse {
            status: "alreadyCounted",
            vote_id: None,
        })),
        Err(e) => Err(e),
    }
}
