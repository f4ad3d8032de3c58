use super::*;
use crate::group::GroupRegistry;
use crate::prover::LocalBackend;
use crate::storage::SignalLedger;
use crate::verification::VerificationService;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::{Arc, OnceLock};
use tower::ServiceExt;
use zensor_crypto::{Identity, MembershipKeys, MembershipWitness, ZkProof};

const DEPTH: usize = 4;
const GROUP: &str = "zensor-sensors";

fn keys() -> Arc<MembershipKeys> {
    static KEYS: OnceLock<Arc<MembershipKeys>> = OnceLock::new();
    KEYS.get_or_init(|| Arc::new(MembershipKeys::from_seed(DEPTH, 77).unwrap()))
        .clone()
}

async fn state() -> AppState {
    let registry = Arc::new(GroupRegistry::new(DEPTH, 4).unwrap());
    registry.create_group(GROUP).await.unwrap();
    let ledger = Arc::new(SignalLedger::in_memory().unwrap());
    let verifier = Arc::new(VerificationService::new(keys(), registry, ledger));
    AppState::new(verifier, GROUP).with_prover_backend("local")
}

async fn join(state: &AppState, seed: &[u8]) -> Identity {
    let identity = Identity::create(Some(seed)).unwrap();
    state
        .registry
        .add_member(GROUP, identity.commitment())
        .await
        .unwrap();
    identity
}

async fn witness(state: &AppState, identity: &Identity, signal: &str) -> MembershipWitness {
    state
        .registry
        .with_tree(GROUP, |tree| {
            let index = tree.index_of(&identity.commitment()).unwrap();
            MembershipWitness::new(identity, tree.proof_path(index).unwrap(), GROUP, signal)
        })
        .await
        .unwrap()
}

async fn proof(state: &AppState, identity: &Identity, signal: &str) -> ZkProof {
    let witness = witness(state, identity, signal).await;
    keys().prove(&witness, &mut rand::thread_rng()).unwrap()
}

async fn call(state: &AppState, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

#[tokio::test]
async fn test_send_feedback_accepts_then_rejects_duplicate() {
    let state = state().await;
    let identity = join(&state, b"api-device-1").await;

    let first = proof(&state, &identity, "0x0101").await;
    let (status, body) = call(
        &state,
        "POST",
        "/api/send-feedback",
        Some(serde_json::to_value(&first).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["signal"], "0x0101");
    assert_eq!(body[0]["id"], 0);
    assert_eq!(body[0]["nullifierHash"], first.nullifier_hash.to_hex());

    let second = proof(&state, &identity, "0x0202").await;
    let (status, body) = call(
        &state,
        "POST",
        "/api/send-feedback",
        Some(serde_json::to_value(&second).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "DUPLICATE_NULLIFIER");

    let (status, body) = call(&state, "GET", "/api/get-feedback", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, serde_json::json!([{ "signal": "0x0101" }]));
}

#[tokio::test]
async fn test_feedback_field_alias() {
    let state = state().await;
    let identity = join(&state, b"api-alias").await;
    let proof = proof(&state, &identity, "0xfeed").await;

    let mut body = serde_json::to_value(&proof).unwrap();
    let signal = body.as_object_mut().unwrap().remove("signal").unwrap();
    body["feedback"] = signal;

    let (status, _) = call(&state, "POST", "/api/send-feedback", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_malformed_submission_is_invalid_proof() {
    let state = state().await;

    let (status, body) = call(
        &state,
        "POST",
        "/api/send-feedback",
        Some(serde_json::json!({ "signal": "0x01" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_PROOF");

    let identity = join(&state, b"api-tamper").await;
    let mut tampered = proof(&state, &identity, "0xaa").await;
    tampered.signal = "0xbb".into();
    let (status, body) = call(
        &state,
        "POST",
        "/api/send-feedback",
        Some(serde_json::to_value(&tampered).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_PROOF");
}

#[tokio::test]
async fn test_stale_root_rejected() {
    let state = state().await;
    let identity = join(&state, b"api-early").await;
    let old = proof(&state, &identity, "0x01").await;

    // History holds 4 roots; push the proof's root out of the window.
    for i in 0..4u8 {
        join(&state, &[b'x', i]).await;
    }

    let (status, body) = call(
        &state,
        "POST",
        &format!("/api/groups/{}/signals", GROUP),
        Some(serde_json::to_value(&old).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "STALE_ROOT");
    assert_eq!(state.verifier.stats().stale_root, 1);
}

#[tokio::test]
async fn test_group_endpoints() {
    let state = state().await;
    let identity = Identity::create(Some(b"api-member")).unwrap();

    let (status, body) = call(
        &state,
        "POST",
        &format!("/api/groups/{}/members", GROUP),
        Some(serde_json::json!({ "commitment": identity.commitment().to_hex() })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["index"], 0);

    let (status, body) = call(&state, "GET", &format!("/api/groups/{}", GROUP), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["size"], 1);
    assert_eq!(body["depth"], DEPTH);
    assert_eq!(body["members"][0], identity.commitment().to_hex());
    assert_eq!(body["rootHistory"].as_array().unwrap().len(), 2);

    let (status, _) = call(&state, "GET", "/api/groups/unknown", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(
        &state,
        "POST",
        "/api/groups/unknown/members",
        Some(serde_json::json!({ "commitment": "1" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "GROUP_NOT_FOUND");

    let (status, body) = call(
        &state,
        "POST",
        &format!("/api/groups/{}/members", GROUP),
        Some(serde_json::json!({ "commitment": "not-a-number" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "SERIALIZATION_ERROR");
}

#[tokio::test]
async fn test_registration_and_sync_can_be_forbidden() {
    let state = state().await.with_registration(false);

    let (status, body) = call(
        &state,
        "POST",
        &format!("/api/groups/{}/members", GROUP),
        Some(serde_json::json!({ "commitment": "5" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let (status, _) = call(&state, "POST", &format!("/api/groups/{}/sync", GROUP), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_prove_endpoint() {
    let state = state().await;
    let identity = join(&state, b"api-prover").await;
    let witness = witness(&state, &identity, "0x77").await;

    let (status, _) = call(
        &state,
        "POST",
        "/api/prove",
        Some(serde_json::to_value(&witness).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let serving = state
        .clone()
        .serving_proofs(Arc::new(LocalBackend::new(keys())));
    let (status, body) = call(
        &serving,
        "POST",
        "/api/prove",
        Some(serde_json::to_value(&witness).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let proof: ZkProof = serde_json::from_value(body).unwrap();
    assert!(keys().verify(&proof, GROUP).unwrap());

    let outsider = Identity::create(Some(b"api-outsider")).unwrap();
    let forged = MembershipWitness::new(&outsider, witness.path.clone(), GROUP, "0x77");
    let (status, body) = call(
        &serving,
        "POST",
        "/api/prove",
        Some(serde_json::to_value(&forged).unwrap()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "NOT_A_MEMBER");
}

#[tokio::test]
async fn test_status_and_health() {
    let state = state().await;
    let identity = join(&state, b"api-status").await;
    let accepted = proof(&state, &identity, "0x01").await;
    call(
        &state,
        "POST",
        "/api/send-feedback",
        Some(serde_json::to_value(&accepted).unwrap()),
    )
    .await;

    let (status, body) = call(&state, "GET", "/api/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["prover_backend"], "local");
    assert_eq!(body["signals"], 1);
    assert_eq!(body["verification"]["accepted"], 1);
    assert_eq!(body["groups"], serde_json::json!([GROUP]));

    let (status, body) = call(&state, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["healthy"], true);
}

#[tokio::test]
async fn test_server_serves_and_stops() {
    let state = state().await;
    let server = ApiServer::new(
        "127.0.0.1:0".parse().unwrap(),
        crate::config::ApiConfig::default(),
        state,
    );

    let addr = server.start().await.unwrap();
    assert!(server.is_running().await);
    assert!(server.start().await.is_err());

    let health: Value = reqwest::get(format!("http://{}/health", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");

    server.stop().await;
}
