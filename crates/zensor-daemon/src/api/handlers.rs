use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zensor_crypto::{parse_field_hash, MembershipWitness, ZkProof};
use zensor_types::{FieldHash, ZensorError};

use super::error::{ApiError, ApiResult};
use super::responses::*;
use super::server::AppState;
use crate::group::GroupSummary;

/// Group detail: the summary plus the leaves, in index order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupResponse {
    #[serde(flatten)]
    pub summary: GroupSummary,
    pub members: Vec<FieldHash>,
}

fn proof_from(payload: Result<Json<ZkProof>, JsonRejection>) -> ApiResult<ZkProof> {
    payload.map(|Json(proof)| proof).map_err(|rejection| {
        ApiError::from(ZensorError::InvalidProof(format!(
            "Malformed proof submission: {}",
            rejection.body_text()
        )))
    })
}

async fn submit(state: &AppState, group_id: &str, proof: ZkProof) -> ApiResult<Vec<FeedbackEntry>> {
    debug!(group = group_id, signal = %proof.signal, "Signal submitted");
    let record = state.verifier.submit(&proof, group_id).await?;
    Ok(vec![FeedbackEntry::from(record)])
}

pub async fn send_feedback(
    State(state): State<AppState>,
    payload: Result<Json<ZkProof>, JsonRejection>,
) -> ApiResult<Json<Vec<FeedbackEntry>>> {
    let proof = proof_from(payload)?;
    let group_id = state.default_group.clone();
    Ok(Json(submit(&state, &group_id, proof).await?))
}

pub async fn submit_group_signal(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    payload: Result<Json<ZkProof>, JsonRejection>,
) -> ApiResult<Json<Vec<FeedbackEntry>>> {
    let proof = proof_from(payload)?;
    Ok(Json(submit(&state, &group_id, proof).await?))
}

pub async fn get_feedback(State(state): State<AppState>) -> ApiResult<Json<Vec<SignalEntry>>> {
    let signals = state
        .verifier
        .ledger()
        .list_group(&state.default_group)?
        .into_iter()
        .map(|record| SignalEntry {
            signal: record.signal,
        })
        .collect();
    Ok(Json(signals))
}

pub async fn list_group_signals(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> ApiResult<Json<Vec<FeedbackEntry>>> {
    if !state.registry.contains_group(&group_id).await {
        return Err(ZensorError::GroupNotFound(group_id).into());
    }
    let entries = state
        .verifier
        .ledger()
        .list_group(&group_id)?
        .into_iter()
        .map(FeedbackEntry::from)
        .collect();
    Ok(Json(entries))
}

pub async fn get_group(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> ApiResult<Json<GroupResponse>> {
    let not_found = || ApiError::from(ZensorError::GroupNotFound(group_id.clone()));
    let summary = state.registry.summary(&group_id).await.ok_or_else(not_found)?;
    let members = state.registry.members(&group_id).await.ok_or_else(not_found)?;
    Ok(Json(GroupResponse { summary, members }))
}

pub async fn add_member(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
    Json(request): Json<AddMemberRequest>,
) -> ApiResult<Json<AddMemberResponse>> {
    if !state.allow_registration {
        return Err(ApiError::Forbidden(
            "Member registration is disabled on this daemon".into(),
        ));
    }
    if !state.registry.contains_group(&group_id).await {
        return Err(ZensorError::GroupNotFound(group_id).into());
    }

    let commitment = parse_field_hash(&request.commitment)?;
    let index = state.registry.add_member(&group_id, commitment).await?;
    let root = state
        .registry
        .root(&group_id)
        .await
        .ok_or_else(|| ZensorError::GroupNotFound(group_id.clone()))?;

    Ok(Json(AddMemberResponse {
        group_id,
        index,
        root,
    }))
}

pub async fn sync_group(
    State(state): State<AppState>,
    Path(group_id): Path<String>,
) -> ApiResult<Json<GroupSummary>> {
    if state.registry.directory().is_none() {
        return Err(ApiError::Forbidden("No group directory configured".into()));
    }
    Ok(Json(state.registry.sync_from_directory(&group_id).await?))
}

/// Remote proving endpoint. Only routed when a backend is attached.
pub async fn prove(
    State(state): State<AppState>,
    Json(witness): Json<MembershipWitness>,
) -> ApiResult<Json<ZkProof>> {
    let backend = state
        .prover
        .clone()
        .ok_or_else(|| ApiError::Forbidden("Remote proving is disabled".into()))?;
    debug!(group = %witness.group_id, "Proving for remote client");
    Ok(Json(backend.prove(witness).await?))
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let ledger = state.verifier.ledger();
    Json(StatusResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
        prover_backend: state.prover_backend.to_string(),
        default_group: state.default_group.clone(),
        groups: state.registry.group_ids().await,
        signals: ledger.len(),
        spent_nullifiers: ledger.spent_nullifiers(),
        verification: state.verifier.stats(),
    })
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        healthy: true,
        status: "ok".to_string(),
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}
