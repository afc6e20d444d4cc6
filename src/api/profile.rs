//! Self-service profile endpoints for the authenticated member.

use axum::extract::{Multipart, State};
use once_cell::sync::Lazy;
use regex::Regex;

use super::form::{photo_file_name, remove_photo, save_photo, MemberForm};
use super::{success, ApiResult, JsonBody};
use crate::auth::{hash_password, Claims};
use crate::db::members;
use crate::errors::AppError;
use crate::models::{CompleteProfileRequest, MemberResponse, ProfileResponse, SetPasswordRequest};
use crate::AppState;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}$")
        .expect("email pattern is valid")
});

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// GET /api/profile
pub async fn get_profile(
    State(state): State<AppState>,
    claims: Claims,
) -> ApiResult<ProfileResponse> {
    let mut conn = state.repo.pool().acquire().await?;
    let member = members::get_member_by_identity(&mut conn, &claims).await?;
    success("Profile retrieved", ProfileResponse::from(&member))
}

/// PUT /api/profile/password
pub async fn set_password(
    State(state): State<AppState>,
    claims: Claims,
    JsonBody(request): JsonBody<SetPasswordRequest>,
) -> ApiResult<()> {
    if request.password.is_empty() {
        return Err(AppError::Validation("password is required".to_string()));
    }
    let digest = hash_password(&request.password)?;

    let mut conn = state.repo.pool().acquire().await?;
    let member = members::get_member_by_identity(&mut conn, &claims).await?;
    members::set_password_hash(&mut conn, &member.id, &digest).await?;

    tracing::info!(member = %member.id, "Password set");
    success("Password set successfully", ())
}

/// PUT /api/profile/complete - Multipart form with contact details and a photo.
pub async fn complete_profile(
    State(state): State<AppState>,
    claims: Claims,
    multipart: Multipart,
) -> ApiResult<MemberResponse> {
    let form = MemberForm::read(multipart).await?;

    let (Some(email), Some(phone)) = (form.text("email"), form.text("phone")) else {
        return Err(AppError::Validation("email and phone are required".to_string()));
    };
    if !is_valid_email(email) {
        return Err(AppError::Validation("Invalid email format".to_string()));
    }
    let name = form
        .text("name")
        .ok_or_else(|| AppError::Validation("name is required".to_string()))?;
    let inaugurated_on = form
        .date("inauguratedOn")?
        .ok_or_else(|| AppError::Validation("inauguratedOn is required".to_string()))?;
    let photo = form
        .photo
        .as_ref()
        .ok_or_else(|| AppError::Validation("photo file is required".to_string()))?;

    let mut tx = state.repo.begin().await?;
    let member = members::get_member_by_identity(&mut *tx, &claims).await?;

    let file_name = photo_file_name(&member.nra, name, &photo.file_name);
    let profile = CompleteProfileRequest {
        email: email.to_string(),
        phone: phone.to_string(),
        name: name.to_string(),
        inaugurated_on: Some(inaugurated_on),
        photo: Some(file_name.clone()),
    };
    members::update_profile(&mut *tx, &member.id, &profile).await?;
    let updated = members::find_member_by_id(&mut *tx, &member.id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Member {} not found", member.id)))?;

    let upload_dir = &state.config.upload_dir;
    save_photo(upload_dir, &file_name, &photo.bytes).await?;
    if let Err(e) = tx.commit().await {
        if member.photo.as_deref() != Some(file_name.as_str()) {
            remove_photo(upload_dir, &file_name).await;
        }
        return Err(e.into());
    }
    if let Some(old) = member.photo.as_deref().filter(|old| *old != file_name) {
        remove_photo(upload_dir, old).await;
    }

    tracing::info!(member = %updated.id, "Profile completed");
    success("Profile completed successfully", MemberResponse::from(&updated))
}
