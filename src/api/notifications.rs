//! Inbox endpoints.

use axum::extract::{Path, State};

use super::{success, ApiResult};
use crate::auth::Claims;
use crate::models::{NotificationView, UnreadCount};
use crate::AppState;

/// GET /api/notifications - Notifications addressed to the caller, newest first.
pub async fn list_notifications(
    State(state): State<AppState>,
    claims: Claims,
) -> ApiResult<Vec<NotificationView>> {
    let views = state.inbox.list_notifications(&claims).await?;
    success("Notifications retrieved", views)
}

/// GET /api/notifications/unread-count
pub async fn unread_count(State(state): State<AppState>, claims: Claims) -> ApiResult<UnreadCount> {
    let count = state.inbox.unread_count(&claims).await?;
    success("Unread count retrieved", count)
}

/// PUT /api/notifications/{id}/read
pub async fn mark_notification_read(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<String>,
) -> ApiResult<()> {
    state.inbox.mark_as_read(&claims, &id).await?;
    success("Notification marked as read", ())
}
