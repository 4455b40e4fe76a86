// tests/http_api.rs
// Router-level behaviour: status codes, payload shapes, SSE framing.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::{two_participant_config, TestHarness};
use http_body_util::BodyExt;
use quorum::api::http::create_router;
use serde_json::{json, Value};
use tower::ServiceExt;

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn create_debate_returns_201_with_initialized_state() {
    let harness = TestHarness::new(vec![]).await;
    let app = create_router(harness.app_state());

    let config = serde_json::to_value(two_participant_config(2)).unwrap();
    let response = app.oneshot(post_json("/api/debates", config)).await.unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let debate = body_json(response).await;
    assert!(debate["id"].as_str().unwrap().starts_with("debate_v2_"));
    assert_eq!(debate["status"], "initialized");
    assert_eq!(debate["current_round"], 1);
    assert_eq!(debate["current_turn"], 0);
    assert_eq!(debate["rounds"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn create_debate_rejects_bad_participant_count() {
    let harness = TestHarness::new(vec![]).await;
    let app = create_router(harness.app_state());

    let config = json!({
        "topic": "T",
        "participants": [{"name": "Only", "model": "gpt-4o"}],
        "max_rounds": 1
    });
    let response = app.oneshot(post_json("/api/debates", config)).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], true);
    assert!(body["message"].as_str().unwrap().contains("participants"));
}

#[tokio::test]
async fn unknown_debate_is_404() {
    let harness = TestHarness::new(vec![]).await;
    let app = create_router(harness.app_state());

    let response = app
        .oneshot(get("/api/debates/debate_v2_missing"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn pause_from_initialized_is_400() {
    let harness = TestHarness::new(vec![]).await;
    let app = create_router(harness.app_state());

    let debate = harness
        .orchestrator
        .create_debate(two_participant_config(1))
        .await
        .unwrap();

    let response = app
        .oneshot(post_json(
            &format!("/api/debates/{}/pause", debate.id),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stop_returns_the_stopped_debate() {
    let harness = TestHarness::new(vec![]).await;
    let app = create_router(harness.app_state());

    let debate = harness
        .orchestrator
        .create_debate(two_participant_config(1))
        .await
        .unwrap();

    let response = app
        .oneshot(post_json(
            &format!("/api/debates/{}/stop", debate.id),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "stopped");
    assert_eq!(body["stopped_manually"], true);
}

#[tokio::test]
async fn delete_evicts_from_registry() {
    let harness = TestHarness::new(vec![]).await;
    let app = create_router(harness.app_state());

    let debate = harness
        .orchestrator
        .create_debate(two_participant_config(1))
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/debates/{}", debate.id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(get(&format!("/api/debates/{}", debate.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn summary_renders_for_any_state() {
    let harness = TestHarness::new(vec!["Opening thoughts."]).await;
    let app = create_router(harness.app_state());

    let debate = harness
        .orchestrator
        .create_debate(two_participant_config(1))
        .await
        .unwrap();
    harness.drive_turn(&debate.id).await;

    let response = app
        .oneshot(get(&format!("/api/debates/{}/summary", debate.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let summary = body_json(response).await;
    assert_eq!(summary["debate_id"], debate.id.as_str());
    assert_eq!(summary["total_rounds"], 1);
    assert!(summary["markdown_transcript"]
        .as_str()
        .unwrap()
        .contains("# Debate Transcript"));
    assert_eq!(summary["participant_stats"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn next_turn_streams_sse_frames() {
    let harness = TestHarness::new(vec!["Streaming argument one."]).await;
    let app = create_router(harness.app_state());

    let debate = harness
        .orchestrator
        .create_debate(two_participant_config(1))
        .await
        .unwrap();

    let response = app
        .oneshot(get(&format!("/api/debates/{}/next-turn", debate.id)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert!(headers
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));
    assert_eq!(headers.get(header::CACHE_CONTROL).unwrap(), "no-cache");
    assert_eq!(headers.get("x-accel-buffering").unwrap(), "no");

    // The body ends when the driver finishes the turn.
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();

    let frames: Vec<Value> = text
        .lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(|json| serde_json::from_str(json).unwrap())
        .collect();

    assert!(!frames.is_empty());
    assert_eq!(frames[0]["event_type"], "debate_start");
    assert_eq!(frames[0]["debate_id"], debate.id.as_str());
    assert!(frames.iter().any(|f| f["event_type"] == "chunk"));
    assert!(frames.iter().any(|f| f["event_type"] == "participant_complete"));
    assert!(frames.iter().any(|f| f["event_type"] == "cost_update"));
    // Every frame carries the envelope fields.
    for frame in &frames {
        assert!(frame["round_number"].is_number());
        assert!(frame["turn_index"].is_number());
        assert!(frame["timestamp"].is_string());
        assert!(frame.get("data").is_some());
    }
}

#[tokio::test]
async fn next_turn_for_paused_debate_is_400() {
    let harness = TestHarness::new(vec!["One."]).await;
    let app = create_router(harness.app_state());

    let debate = harness
        .orchestrator
        .create_debate(two_participant_config(2))
        .await
        .unwrap();
    harness.drive_turn(&debate.id).await;
    harness.orchestrator.pause(&debate.id).await.unwrap();

    let response = app
        .oneshot(get(&format!("/api/debates/{}/next-turn", debate.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn quality_endpoints_cover_the_read_side() {
    let harness = TestHarness::new(vec!["First.", "Second."]).await;
    let app = create_router(harness.app_state());

    // Unknown conversation: 404.
    let response = app
        .clone()
        .oneshot(get("/api/conversations/nope/quality"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let debate = harness
        .orchestrator
        .create_debate(two_participant_config(1))
        .await
        .unwrap();
    harness.drive_to_completion(&debate.id, 3).await;

    let response = app
        .clone()
        .oneshot(get(&format!("/api/conversations/{}/quality", debate.id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let quality = body_json(response).await;
    assert_eq!(quality["message_count"], 2);
    assert_eq!(quality["embedding_count"], 2);
    assert!(quality["latest_sample"].is_object());

    let response = app
        .clone()
        .oneshot(get(&format!(
            "/api/conversations/{}/health-history?limit=5",
            debate.id
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let history = body_json(response).await;
    assert_eq!(history.as_array().unwrap().len(), 2);

    let response = app
        .oneshot(get(&format!(
            "/api/conversations/{}/contradictions",
            debate.id
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
