/// Integration tests for the HTTP surface: route contracts, camelCase JSON
/// field names, and the status-code mapping of engine errors.
use actix_web::web::Data;
use actix_web::{App, test};
use pollrank::RankingEngine;
use pollrank::db::Database;
use serde_json::{Value, json};
use tempfile::TempDir;

async fn test_engine() -> (TempDir, RankingEngine) {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let db_url = format!("sqlite:{}", dir.path().join("pollrank_test.db").display());
    let db = Database::connect(&db_url)
        .await
        .expect("Failed to open test database");
    (dir, RankingEngine::new(db))
}

fn create_test_body() -> Value {
    json!({
        "title": "Best crisps",
        "creatorId": "admin-1",
        "categoryIds": ["snacks"],
        "options": [
            { "title": "Salted" },
            { "title": "Paprika", "fields": [{ "name": "origin", "value": "Hungary" }] }
        ]
    })
}

macro_rules! init_app {
    ($engine:expr) => {
        test::init_service(
            App::new()
                .app_data(Data::new($engine))
                .configure(pollrank::web::configure),
        )
        .await
    };
}

#[actix_web::test]
async fn create_and_fetch_test() {
    let (_dir, engine) = test_engine().await;
    let app = init_app!(engine);

    let req = test::TestRequest::post()
        .uri("/admin/tests")
        .set_json(create_test_body())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let created: Value = test::read_body_json(resp).await;
    let test_id = created["id"].as_str().expect("id should be a string");

    let req = test::TestRequest::get()
        .uri(&format!("/tests/{}", test_id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let fetched: Value = test::read_body_json(resp).await;

    assert_eq!(fetched["title"], "Best crisps");
    assert_eq!(fetched["creatorId"], "admin-1");
    assert_eq!(fetched["categoryIds"], json!(["snacks"]));
    assert_eq!(fetched["totalVotes"], 0);
    assert_eq!(fetched["isActive"], true);
    assert_eq!(fetched["options"][0]["title"], "Salted");
    assert_eq!(fetched["options"][1]["fields"][0]["name"], "origin");
}

#[actix_web::test]
async fn vote_then_duplicate_then_rank() {
    let (_dir, engine) = test_engine().await;
    let app = init_app!(engine);

    let req = test::TestRequest::post()
        .uri("/admin/tests")
        .set_json(create_test_body())
        .to_request();
    let created: Value = test::read_body_json(test::call_service(&app, req).await).await;
    let test_id = created["id"].as_str().unwrap();
    let salted = created["options"][0]["id"].as_str().unwrap();
    let paprika = created["options"][1]["id"].as_str().unwrap();

    // Two voters for Paprika, one for Salted.
    for (voter, option_id) in [("v1", paprika), ("v2", paprika), ("v3", salted)] {
        let req = test::TestRequest::post()
            .uri(&format!("/tests/{}/votes", test_id))
            .insert_header(("x-voter-id", voter))
            .set_json(json!({ "optionId": option_id }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 201);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "recorded");
        assert!(body["voteId"].is_string());
    }

    // A repeat submission reads back as already counted, not as an error.
    let req = test::TestRequest::post()
        .uri(&format!("/tests/{}/votes", test_id))
        .insert_header(("x-voter-id", "v1"))
        .set_json(json!({ "optionId": salted }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "alreadyCounted");
    assert!(body.get("voteId").is_none());

    let req = test::TestRequest::get()
        .uri(&format!("/tests/{}/rank", test_id))
        .to_request();
    let ranking: Value = test::read_body_json(test::call_service(&app, req).await).await;

    assert_eq!(ranking["totalVotes"], 3);
    assert_eq!(ranking["finalRankings"][0]["option"]["id"], paprika);
    assert_eq!(ranking["finalRankings"][0]["score"], 66.7);
    assert_eq!(ranking["finalRankings"][1]["option"]["id"], salted);
    assert_eq!(ranking["finalRankings"][1]["score"], 33.3);
    assert_eq!(ranking["finalWinner"]["option"]["id"], paprika);

    // Share surfaces truncate with ?top= without changing the winner.
    let req = test::TestRequest::get()
        .uri(&format!("/tests/{}/rank?top=1", test_id))
        .to_request();
    let top: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(top["finalRankings"].as_array().unwrap().len(), 1);
    assert_eq!(top["finalWinner"]["option"]["id"], paprika);

    let req = test::TestRequest::get()
        .uri(&format!("/tests/{}/counts", test_id))
        .to_request();
    let counts: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(counts["totalVotes"], 3);
    assert_eq!(counts["perOption"][paprika], 2);
    assert_eq!(counts["perOption"][salted], 1);
}

#[actix_web::test]
async fn vote_without_identity_is_rejected() {
    let (_dir, engine) = test_engine().await;
    let app = init_app!(engine);

    let req = test::TestRequest::post()
        .uri("/admin/tests")
        .set_json(create_test_body())
        .to_request();
    let created: Value = test::read_body_json(test::call_service(&app, req).await).await;
    let test_id = created["id"].as_str().unwrap();
    let option_id = created["options"][0]["id"].as_str().unwrap();

    let req = test::TestRequest::post()
        .uri(&format!("/tests/{}/votes", test_id))
        .set_json(json!({ "optionId": option_id }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let req = test::TestRequest::post()
        .uri(&format!("/tests/{}/votes", test_id))
        .insert_header(("x-voter-id", "   "))
        .set_json(json!({ "optionId": option_id }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn deactivated_test_returns_conflict() {
    let (_dir, engine) = test_engine().await;
    let app = init_app!(engine);

    let req = test::TestRequest::post()
        .uri("/admin/tests")
        .set_json(create_test_body())
        .to_request();
    let created: Value = test::read_body_json(test::call_service(&app, req).await).await;
    let test_id = created["id"].as_str().unwrap();
    let option_id = created["options"][0]["id"].as_str().unwrap();

    let req = test::TestRequest::post()
        .uri(&format!("/admin/tests/{}/deactivate", test_id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["isActive"], false);

    let req = test::TestRequest::post()
        .uri(&format!("/tests/{}/votes", test_id))
        .insert_header(("x-voter-id", "v1"))
        .set_json(json!({ "optionId": option_id }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 409);
}

#[actix_web::test]
async fn reset_endpoint_clears_counts() {
    let (_dir, engine) = test_engine().await;
    let app = init_app!(engine);

    let req = test::TestRequest::post()
        .uri("/admin/tests")
        .set_json(create_test_body())
        .to_request();
    let created: Value = test::read_body_json(test::call_service(&app, req).await).await;
    let test_id = created["id"].as_str().unwrap();
    let option_id = created["options"][0]["id"].as_str().unwrap();

    for voter in ["v1", "v2"] {
        let req = test::TestRequest::post()
            .uri(&format!("/tests/{}/votes", test_id))
            .insert_header(("x-voter-id", voter))
            .set_json(json!({ "optionId": option_id }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 201);
    }

    let req = test::TestRequest::post()
        .uri(&format!("/admin/tests/{}/reset", test_id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["removedVotes"], 2);

    let req = test::TestRequest::get()
        .uri(&format!("/tests/{}/counts", test_id))
        .to_request();
    let counts: Value = test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(counts["totalVotes"], 0);
    assert!(counts["perOption"].as_object().unwrap().values().all(|v| v == 0));
}

#[actix_web::test]
async fn unknown_test_is_not_found() {
    let (_dir, engine) = test_engine().await;
    let app = init_app!(engine);

    for uri in [
        "/tests/no-such-test",
        "/tests/no-such-test/rank",
        "/tests/no-such-test/counts",
    ] {
        let req = test::TestRequest::get().uri(uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404, "expected 404 for {}", uri);
    }
}
