// src/api/http/debates.rs
// Debate lifecycle endpoints and the next-turn SSE stream.

use axum::{
    extract::{Path, State},
    http::{header, HeaderName, StatusCode},
    response::sse::{Event, KeepAlive, Sse},
    response::IntoResponse,
    Json,
};
use futures::stream::Stream;
use std::convert::Infallible;
use tokio::sync::mpsc;
use tracing::error;

use crate::api::error::{ApiError, ApiResult};
use crate::debate::events::StampedEvent;
use crate::debate::summary::{generate_summary, DebateSummary};
use crate::debate::{Debate, DebateConfig, DebateStatus};
use crate::state::AppState;

/// Events buffered between the driver and a slow subscriber.
const EVENT_CHANNEL_CAPACITY: usize = 256;

pub async fn create_debate(
    State(state): State<AppState>,
    Json(config): Json<DebateConfig>,
) -> ApiResult<(StatusCode, Json<Debate>)> {
    let debate = state.orchestrator.create_debate(config).await?;
    Ok((StatusCode::CREATED, Json(debate)))
}

pub async fn list_debates(State(state): State<AppState>) -> Json<Vec<Debate>> {
    Json(state.orchestrator.list_debates().await)
}

pub async fn get_debate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Debate>> {
    Ok(Json(state.orchestrator.get_debate(&id).await?))
}

pub async fn delete_debate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.orchestrator.delete_debate(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn stop_debate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Debate>> {
    Ok(Json(state.orchestrator.stop(&id).await?))
}

pub async fn pause_debate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Debate>> {
    Ok(Json(state.orchestrator.pause(&id).await?))
}

pub async fn resume_debate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Debate>> {
    Ok(Json(state.orchestrator.resume(&id).await?))
}

pub async fn debate_summary(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<DebateSummary>> {
    let debate = state.orchestrator.get_debate(&id).await?;
    Ok(Json(generate_summary(&debate)))
}

/// `GET /debates/{id}/next-turn` — drive one turn and stream its events as
/// SSE frames (`data: <json>\n\n`).
pub async fn next_turn(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    // Refusals surface as HTTP errors before the stream opens.
    let debate = state.orchestrator.get_debate(&id).await?;
    if debate.status == DebateStatus::Paused {
        return Err(ApiError::bad_request(format!("Debate {id} is paused")));
    }

    let (tx, rx) = mpsc::channel::<StampedEvent>(EVENT_CHANNEL_CAPACITY);

    let orchestrator = state.orchestrator.clone();
    let driver_id = id.clone();
    tokio::spawn(async move {
        if let Err(e) = orchestrator.next_turn(&driver_id, tx).await {
            // Entry raced with a pause/delete; the stream just ends.
            error!("next_turn for {driver_id} refused: {e}");
        }
    });

    let stream = event_stream(id, rx);

    Ok((
        [
            (header::CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        Sse::new(stream).keep_alive(KeepAlive::default()),
    ))
}

/// Encode driver events as SSE frames.
fn event_stream(
    debate_id: String,
    rx: mpsc::Receiver<StampedEvent>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    async_stream::stream! {
        let mut rx = rx;
        while let Some(stamped) = rx.recv().await {
            let frame = stamped.frame(&debate_id);
            yield Ok(Event::default().data(frame.to_json()));
        }
    }
}
