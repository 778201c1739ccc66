// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! To-do list routes, including the live snapshot stream.

use crate::error::Result;
use crate::models::{Identity, ListSnapshot, TodoItem};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, patch},
    Extension, Json, Router,
};
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// List routes (require authentication via JWT).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/todos", get(get_todos).post(add_todo))
        .route("/api/todos/stream", get(stream_todos))
        .route("/api/todos/{id}", patch(toggle_todo).delete(delete_todo))
}

#[derive(Serialize, Clone, Debug)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct TodoResponse {
    pub id: String,
    pub text: String,
    pub completed: bool,
    pub created_at: String,
}

impl From<TodoItem> for TodoResponse {
    fn from(item: TodoItem) -> Self {
        Self {
            id: item.id,
            text: item.text,
            completed: item.completed,
            created_at: format_utc_rfc3339(item.created_at),
        }
    }
}

/// Full ordered list, newest first.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SnapshotResponse {
    pub items: Vec<TodoResponse>,
    #[cfg_attr(feature = "binding-generation", ts(type = "number"))]
    pub revision: u64,
}

impl From<ListSnapshot> for SnapshotResponse {
    fn from(snapshot: ListSnapshot) -> Self {
        Self {
            items: snapshot.items.into_iter().map(Into::into).collect(),
            revision: snapshot.revision,
        }
    }
}

async fn get_todos(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<Json<SnapshotResponse>> {
    let snapshot = state.lists.snapshot(&identity).await?;
    Ok(Json(snapshot.into()))
}

/// Server-Sent Events stream of list snapshots.
///
/// Each event is a complete `SnapshotResponse`. The subscription is dropped
/// (and torn down) when the client disconnects or the session ends.
async fn stream_todos(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let subscription = state.lists.subscribe(&identity);

    let events = stream::unfold(subscription, |mut subscription| async move {
        let snapshot = subscription.next().await?;
        let event = Event::default()
            .event("snapshot")
            .id(snapshot.revision.to_string())
            .json_data(SnapshotResponse::from(snapshot))
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to encode list snapshot");
                Event::default().comment("encode error")
            });
        Some((Ok(event), subscription))
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}

#[derive(Deserialize)]
struct AddTodoRequest {
    text: String,
}

/// Add an item. Blank text is accepted and ignored (204, nothing stored).
///
/// The new item is not echoed into any list view; it shows up in the next
/// snapshot.
async fn add_todo(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(body): Json<AddTodoRequest>,
) -> Result<Response> {
    match state.lists.add_item(&identity, &body.text).await? {
        Some(item) => Ok((StatusCode::CREATED, Json(TodoResponse::from(item))).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

#[derive(Deserialize)]
struct ToggleTodoRequest {
    /// Completion state the client is currently showing
    completed: bool,
}

async fn toggle_todo(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
    Json(body): Json<ToggleTodoRequest>,
) -> Result<StatusCode> {
    state
        .lists
        .toggle_item(&identity, &id, body.completed)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_todo(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.lists.delete_item(&identity, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
