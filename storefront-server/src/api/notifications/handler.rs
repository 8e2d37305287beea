//! Notification API Handlers

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;
use shared::models::Notification;

use crate::auth::Actor;
use crate::core::ServerState;
use crate::utils::AppResult;

#[derive(Deserialize)]
pub struct InboxQuery {
    /// 管理端可以查看任意收件箱
    pub recipient: Option<String>,
    pub limit: Option<i64>,
}

/// GET /api/notifications - 当前调用方的收件箱
pub async fn list(
    State(state): State<ServerState>,
    actor: Actor,
    Query(query): Query<InboxQuery>,
) -> AppResult<Json<Vec<Notification>>> {
    let recipient = match query.recipient {
        Some(r) if actor.is_admin() => r,
        _ => actor.user_id.clone(),
    };
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    Ok(Json(state.notifier.list(&recipient, limit).await?))
}
