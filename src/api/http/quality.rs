// src/api/http/quality.rs
// Read-side endpoints over the persisted quality rows.

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::error::{ApiError, ApiResult, IntoApiError};
use crate::state::AppState;
use crate::store::{ContradictionRow, HealthSampleRow, LoopRow};

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

#[derive(Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub severity: Option<String>,
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Serialize)]
pub struct ConversationQualityResponse {
    pub conversation_id: String,
    pub current_health_score: f64,
    pub message_count: i64,
    pub embedding_count: i64,
    pub contradiction_count: i64,
    pub loop_count: i64,
    pub latest_sample: Option<HealthSampleBody>,
}

#[derive(Serialize)]
pub struct HealthSampleBody {
    pub id: String,
    pub health_score: f64,
    pub coherence_score: f64,
    pub contradiction_score: f64,
    pub loop_score: f64,
    pub citation_score: f64,
    pub message_count: i64,
    pub analysis_metadata: Value,
    pub created_at: DateTime<Utc>,
}

impl From<HealthSampleRow> for HealthSampleBody {
    fn from(row: HealthSampleRow) -> Self {
        Self {
            id: row.id,
            health_score: row.health_score,
            coherence_score: row.coherence_score,
            contradiction_score: row.contradiction_score,
            loop_score: row.loop_score,
            citation_score: row.citation_score,
            message_count: row.message_count,
            analysis_metadata: row.analysis_metadata,
            created_at: row.created_at,
        }
    }
}

#[derive(Serialize)]
pub struct ContradictionBody {
    pub id: String,
    pub message_id_a: String,
    pub message_id_b: String,
    pub similarity: f64,
    pub severity: String,
    pub explanation: String,
    pub detected_at: DateTime<Utc>,
}

impl From<ContradictionRow> for ContradictionBody {
    fn from(row: ContradictionRow) -> Self {
        Self {
            id: row.id,
            message_id_a: row.message_id_a,
            message_id_b: row.message_id_b,
            similarity: row.similarity,
            severity: row.severity,
            explanation: row.explanation,
            detected_at: row.detected_at,
        }
    }
}

#[derive(Serialize)]
pub struct LoopBody {
    pub id: String,
    pub pattern: String,
    pub fingerprint: String,
    pub message_ids: Vec<String>,
    pub repetition_count: i64,
    pub agents_involved: Vec<String>,
    pub intervention_text: String,
    pub detected_at: DateTime<Utc>,
}

impl From<LoopRow> for LoopBody {
    fn from(row: LoopRow) -> Self {
        Self {
            id: row.id,
            pattern: row.pattern,
            fingerprint: row.fingerprint,
            message_ids: row.message_ids,
            repetition_count: row.repetition_count,
            agents_involved: row.agents_involved,
            intervention_text: row.intervention_text,
            detected_at: row.detected_at,
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn conversation_quality(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ConversationQualityResponse>> {
    let conversation = state
        .store
        .conversation(&id)
        .await
        .into_api_error("Failed to load conversation")?
        .ok_or_else(|| ApiError::not_found(format!("Conversation {id} not found")))?;

    let message_count = state
        .store
        .message_count(&id)
        .await
        .into_api_error("Failed to count messages")?;
    let embedding_count = state
        .store
        .embedding_count(&id)
        .await
        .into_api_error("Failed to count embeddings")?;
    let contradiction_count = state
        .store
        .contradiction_count(&id)
        .await
        .into_api_error("Failed to count contradictions")?;
    let loop_count = state
        .store
        .loop_count(&id)
        .await
        .into_api_error("Failed to count loops")?;
    let latest_sample = state
        .store
        .latest_health_sample(&id)
        .await
        .into_api_error("Failed to load health sample")?
        .map(HealthSampleBody::from);

    Ok(Json(ConversationQualityResponse {
        conversation_id: conversation.id,
        current_health_score: conversation.current_health_score,
        message_count,
        embedding_count,
        contradiction_count,
        loop_count,
        latest_sample,
    }))
}

pub async fn list_contradictions(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<ContradictionBody>>> {
    let rows = state
        .store
        .list_contradictions(&id, query.severity.as_deref(), clamp_limit(query.limit))
        .await
        .into_api_error("Failed to list contradictions")?;
    Ok(Json(rows.into_iter().map(ContradictionBody::from).collect()))
}

pub async fn list_loops(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<LoopBody>>> {
    let rows = state
        .store
        .list_loops(&id, clamp_limit(query.limit))
        .await
        .into_api_error("Failed to list loops")?;
    Ok(Json(rows.into_iter().map(LoopBody::from).collect()))
}

pub async fn health_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<HealthSampleBody>>> {
    let rows = state
        .store
        .health_history(&id, clamp_limit(query.limit))
        .await
        .into_api_error("Failed to load health history")?;
    Ok(Json(rows.into_iter().map(HealthSampleBody::from).collect()))
}
