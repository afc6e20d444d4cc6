//! Role-change request endpoints.

use axum::extract::{Path, State};

use super::{success, ApiResult, JsonBody};
use crate::auth::Claims;
use crate::models::{
    CreateStatusChangeRequest, StatusChangeAccepted, StatusChangeCreated, StatusChangeRejected,
};
use crate::AppState;

/// POST /api/status-change - Propose a role change for another board member.
pub async fn create_status_change(
    State(state): State<AppState>,
    claims: Claims,
    JsonBody(request): JsonBody<CreateStatusChangeRequest>,
) -> ApiResult<StatusChangeCreated> {
    let created = state.workflow.create_request(&claims, &request).await?;
    success(created.message.clone(), created)
}

/// PUT /api/status-change/{id}/accept
pub async fn accept_status_change(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<String>,
) -> ApiResult<StatusChangeAccepted> {
    let accepted = state.workflow.accept_request(&claims, &id).await?;
    success(accepted.message.clone(), accepted)
}

/// PUT /api/status-change/{id}/reject
pub async fn reject_status_change(
    State(state): State<AppState>,
    claims: Claims,
    Path(id): Path<String>,
) -> ApiResult<StatusChangeRejected> {
    let rejected = state.workflow.reject_request(&claims, &id).await?;
    success(rejected.message.clone(), rejected)
}
