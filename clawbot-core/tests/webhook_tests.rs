// tests/webhook_tests.rs
//
// End-to-end through the axum router: signed webhook -> bus -> admission
// worker -> queue, plus the dashboard and play routes.

mod test_utils;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use clawbot_core::eventbus::ClawEvent;
use clawbot_core::ingestion::{
    sign, HEADER_MESSAGE_ID, HEADER_MESSAGE_SIGNATURE, HEADER_MESSAGE_TIMESTAMP, HEADER_MESSAGE_TYPE,
};
use clawbot_core::tasks::spawn_admission_worker;
use clawbot_core::test_utils::ScriptedRandom;

use test_utils::{eventually, Harness, CONTROLLER_TOKEN, SECRET};

fn redemption_body(user_id: &str, name: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "subscription": {
            "id": "sub-1",
            "type": "channel.channel_points_custom_reward_redemption.add",
            "version": "1",
            "status": "enabled"
        },
        "event": {
            "id": format!("redemption-{}", user_id),
            "user_id": user_id,
            "user_login": name.to_lowercase(),
            "user_name": name,
            "user_input": "",
            "status": "unfulfilled",
            "reward": { "id": "claw", "title": "Play the claw", "cost": 500, "prompt": "" },
            "redeemed_at": "2025-01-01T12:00:00Z"
        }
    }))
    .unwrap()
}

fn webhook_request(message_id: &str, message_type: &str, body: Vec<u8>, signature: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .header(HEADER_MESSAGE_ID, message_id)
        .header(HEADER_MESSAGE_TYPE, message_type)
        .header(HEADER_MESSAGE_TIMESTAMP, "2025-01-01T12:00:00Z")
        .header(HEADER_MESSAGE_SIGNATURE, signature)
        .body(Body::from(body))
        .unwrap()
}

fn signed(message_id: &str, body: Vec<u8>) -> Request<Body> {
    let signature = sign(&body, SECRET).unwrap();
    webhook_request(message_id, "notification", body, signature)
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn play_request(user_id: &str, token: Option<&str>) -> Request<Body> {
    let mut req = Request::post(format!("/play/{}", user_id));
    if let Some(token) = token {
        req = req.header("authorization", format!("Bearer {}", token));
    }
    req.body(Body::empty()).unwrap()
}

fn admit(h: &Harness, user_id: &str, username: &str) {
    h.game.handle_admission(clawbot_common::models::Admission::Play(
        clawbot_common::models::AdmissionRequest {
            user_id: user_id.into(),
            username: username.into(),
            base_priority: 0,
            cost: 500,
            input: String::new(),
            redemption_id: format!("r-{}", user_id),
            reward_title: "Claw".into(),
        },
    ));
}

#[tokio::test]
async fn duplicate_delivery_is_processed_once() {
    let h = Harness::new(Box::new(ScriptedRandom::new([])));
    let mut tap = h.bus.subscribe(Some(16)).await;
    let worker = spawn_admission_worker(h.game.clone(), &h.bus).await;
    let app = h.router();

    let (status, body) = send(&app, signed("msg-1", redemption_body("42", "Alice"))).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], "accepted");

    let (status, body) = send(&app, signed("msg-1", redemption_body("42", "Alice"))).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], "duplicate");

    let queue = h.game.queue().clone();
    assert!(eventually(|| queue.is_waiting("42")).await);

    let mut admissions = 0;
    while let Ok(evt) = tap.try_recv() {
        if matches!(evt, ClawEvent::Admission { .. }) {
            admissions += 1;
        }
    }
    assert_eq!(admissions, 1);
    assert_eq!(h.game.queue().queue_len(), 1);

    h.bus.shutdown();
    worker.await.unwrap();
}

#[tokio::test]
async fn bad_signature_is_forbidden_and_changes_nothing() {
    let h = Harness::new(Box::new(ScriptedRandom::new([])));
    let app = h.router();
    let body = redemption_body("42", "Alice");
    let forged = sign(b"something else", SECRET).unwrap();

    let (status, bytes) = send(&app, webhook_request("msg-2", "notification", body.clone(), forged)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let err: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(err["code"], "INVALID_SIGNATURE");

    // The id was not burned by the forged attempt.
    let (status, _) = send(&app, signed("msg-2", body)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn malformed_and_unknown_events() {
    let h = Harness::new(Box::new(ScriptedRandom::new([])));
    let app = h.router();

    let malformed = serde_json::to_vec(&json!({
        "subscription": { "type": "channel.cheer" },
        "event": { "user_id": "1", "user_name": "Bob", "bits": "lots" }
    }))
    .unwrap();
    let (status, bytes) = send(&app, signed("msg-3", malformed)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let err: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(err["code"], "MALFORMED_PAYLOAD");
    assert_eq!(err["path"], "bits");

    let unknown = serde_json::to_vec(&json!({
        "subscription": { "type": "channel.follow" },
        "event": { "user_id": "1" }
    }))
    .unwrap();
    let (status, _) = send(&app, signed("msg-4", unknown)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn callback_verification_echoes_challenge() {
    let h = Harness::new(Box::new(ScriptedRandom::new([])));
    let app = h.router();
    let body = serde_json::to_vec(&json!({
        "subscription": { "type": "channel.cheer" },
        "challenge": "abc123"
    }))
    .unwrap();
    let signature = sign(&body, SECRET).unwrap();
    let (status, bytes) = send(&app, webhook_request("msg-5", "webhook_callback_verification", body, signature)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"abc123".to_vec());
}

#[tokio::test]
async fn play_route_resolves_a_session() {
    // win roll, prize pick, redemption id bytes
    let h = Harness::new(Box::new(ScriptedRandom::new([0.01, 0.0, 0.5, 0.5, 0.5])));
    let app = h.router();

    let (status, bytes) = send(&app, play_request("42", Some(CONTROLLER_TOKEN))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let rejected: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(rejected["status"], "rejected");

    admit(&h, "42", "Alice");
    h.game.promote_ready().await;

    let (status, bytes) = send(&app, play_request("42", Some(CONTROLLER_TOKEN))).await;
    assert_eq!(status, StatusCode::OK);
    let played: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(played["status"], "played");
    assert_eq!(played["prize"]["type"], "win");
    assert_eq!(played["prize"]["prize"]["id"], "steam_5");
    assert_eq!(played["redemption"]["type"], "redeemed");
    assert_eq!(played["receipt"]["completed"], true);

    let (status, bytes) = send(&app, get("/prizes/dashboard")).await;
    assert_eq!(status, StatusCode::OK);
    let dash: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(dash["redemptions"]["total"], 1);
    assert_eq!(dash["top_prizes"][0]["name"], "Steam Wallet $5 USD");
}

#[tokio::test]
async fn play_route_requires_the_controller_token() {
    // A winning roll, if anything got through.
    let h = Harness::new(Box::new(ScriptedRandom::new([0.01, 0.0, 0.5, 0.5, 0.5])));
    let app = h.router();
    admit(&h, "42", "Alice");
    h.game.promote_ready().await;

    for token in [None, Some("wrong-token"), Some("")] {
        let (status, bytes) = send(&app, play_request("42", token)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "token {:?}", token);
        let err: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(err["code"], "UNAUTHORIZED");
    }

    let session = h.game.queue().session("42").unwrap();
    assert_eq!(session.plays_remaining, 1);
    assert_eq!(h.game.queue().player_stats("42").unwrap().total_plays, 0);
    assert_eq!(h.game.prizes().dashboard().redemptions.total, 0);

    let (status, _) = send(&app, play_request("42", Some(CONTROLLER_TOKEN))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn timed_out_handoff_can_be_redelivered() {
    let h = Harness::new(Box::new(ScriptedRandom::new([])));
    // One slot and nobody draining it: the second publish blocks.
    let mut tap = h.bus.subscribe(Some(1)).await;
    let app = h.router_with_timeout(std::time::Duration::from_millis(100));

    let (status, _) = send(&app, signed("msg-a", redemption_body("1", "Ann"))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, signed("msg-b", redemption_body("2", "Ben"))).await;
    assert_eq!(status, StatusCode::REQUEST_TIMEOUT);

    assert!(matches!(tap.recv().await, Some(ClawEvent::Admission { ref message_id, .. }) if message_id == "msg-a"));
    let (status, body) = send(&app, signed("msg-b", redemption_body("2", "Ben"))).await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], "accepted");
    assert!(matches!(tap.recv().await, Some(ClawEvent::Admission { ref message_id, .. }) if message_id == "msg-b"));

    // The completed hand-off still dedups.
    let (_, body) = send(&app, signed("msg-b", redemption_body("2", "Ben"))).await;
    let body: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["status"], "duplicate");
}

#[tokio::test]
async fn read_only_routes() {
    let h = Harness::new(Box::new(ScriptedRandom::new([])));
    let app = h.router();

    let (status, bytes) = send(&app, get("/health")).await;
    assert_eq!((status, bytes), (StatusCode::OK, b"ok".to_vec()));

    let (status, bytes) = send(&app, get("/queue/status")).await;
    assert_eq!(status, StatusCode::OK);
    let qs: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(qs["waiting"], 0);
    assert_eq!(qs["max_concurrent"], 1);

    let (status, bytes) = send(&app, get("/queue/dashboard")).await;
    assert_eq!(status, StatusCode::OK);
    let dash: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(dash["leaderboard"].as_array().unwrap().is_empty());

    let (status, bytes) = send(&app, get("/prizes/available?type=physical&max_value=12000")).await;
    assert_eq!(status, StatusCode::OK);
    let items: Vec<Value> = serde_json::from_slice(&bytes).unwrap();
    let ids: Vec<&str> = items.iter().filter_map(|p| p["id"].as_str()).collect();
    assert_eq!(ids, vec!["merch_sticker_pack", "tech_mousepad"]);

    let (status, bytes) = send(&app, get("/prizes/inventory")).await;
    assert_eq!(status, StatusCode::OK);
    let inv: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(inv["digital"]["total"], 5);
    assert_eq!(inv["physical"]["total"], 4);
}
