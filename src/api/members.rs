//! Administrative member endpoints, guarded by the admin key.

use axum::extract::{Multipart, Path, State};
use once_cell::sync::Lazy;
use regex::Regex;

use super::form::{photo_file_name, remove_photo, rename_photo, save_photo, MemberForm};
use super::{success, ApiResult};
use crate::auth::generate_login_token;
use crate::db::members;
use crate::errors::AppError;
use crate::models::{
    MemberResponse, MemberUpdateResponse, RegisterMemberRequest, Role, UpdateMemberRequest,
};
use crate::workflow::StatusChangeWorkflow;
use crate::AppState;

static NRA_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{2}\.\d{2}\.\d{3}$").expect("NRA pattern is valid"));

pub fn is_valid_nra(nra: &str) -> bool {
    NRA_PATTERN.is_match(nra)
}

/// GET /api/member - List all members.
pub async fn list_members(State(state): State<AppState>) -> ApiResult<Vec<MemberResponse>> {
    let mut conn = state.repo.pool().acquire().await?;
    let members = members::list_members(&mut conn).await?;
    success(
        "Members retrieved",
        members.iter().map(MemberResponse::from).collect(),
    )
}

/// GET /api/member/{id} - Get a single member.
pub async fn get_member(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<MemberResponse> {
    let mut conn = state.repo.pool().acquire().await?;
    let member = members::find_member_by_id(&mut conn, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Member {} not found", id)))?;
    success("Member retrieved", MemberResponse::from(&member))
}

fn register_request(form: &MemberForm) -> Result<RegisterMemberRequest, AppError> {
    let owned = |name: &str| form.text(name).map(str::to_string);
    Ok(RegisterMemberRequest {
        nra: owned("nra"),
        name: owned("name"),
        cohort: owned("cohort"),
        membership_status: form.membership_status("membershipStatus")?,
        department: owned("department"),
        role: form.role("role")?,
        inaugurated_on: form.date("inauguratedOn")?,
    })
}

fn update_request(form: &MemberForm) -> Result<UpdateMemberRequest, AppError> {
    let owned = |name: &str| form.text(name).map(str::to_string);
    Ok(UpdateMemberRequest {
        nra: owned("nra"),
        name: owned("name"),
        cohort: owned("cohort"),
        membership_status: form.membership_status("membershipStatus")?,
        department: owned("department"),
        role: form.role("role")?,
        inaugurated_on: form.date("inauguratedOn")?,
        requested_by: owned("requestedBy"),
    })
}

fn required<'a>(value: &'a Option<String>, field: &str) -> Result<&'a str, AppError> {
    value
        .as_deref()
        .ok_or_else(|| AppError::Validation(format!("{} is required", field)))
}

/// POST /api/member - Register a new member from a multipart form with a photo,
/// and hand out a single-use login token.
pub async fn register_member(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<MemberResponse> {
    let form = MemberForm::read(multipart).await?;
    let request = register_request(&form)?;

    let nra = required(&request.nra, "nra")?;
    let name = required(&request.name, "name")?;
    let cohort = required(&request.cohort, "cohort")?;
    let Some(membership_status) = request.membership_status else {
        return Err(AppError::Validation(
            "membershipStatus is required".to_string(),
        ));
    };
    let department = required(&request.department, "department")?;
    if !is_valid_nra(nra) {
        return Err(AppError::Validation("Invalid NRA format".to_string()));
    }
    let photo = form
        .photo
        .as_ref()
        .ok_or_else(|| AppError::Validation("photo file is required".to_string()))?;

    let mut tx = state.repo.begin().await?;

    if members::find_member_by_nra(&mut *tx, nra).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "A member with NRA {} already exists",
            nra
        )));
    }

    let cohort_id = members::get_or_create_cohort(&mut *tx, cohort).await?;
    let department_id = members::get_or_create_department(&mut *tx, department).await?;

    let mut member = members::new_member(
        nra.to_string(),
        name.to_string(),
        cohort_id,
        request.role.unwrap_or(Role::Member),
    );
    member.department_id = Some(department_id);
    member.membership_status = membership_status;
    member.inaugurated_on = request.inaugurated_on;
    member.login_token = Some(generate_login_token());
    let photo_name = photo_file_name(nra, name, &photo.file_name);
    member.photo = Some(photo_name.clone());

    members::insert_member(&mut *tx, &member).await?;
    let stored = members::find_member_by_id(&mut *tx, &member.id)
        .await?
        .ok_or_else(|| AppError::Internal("Registered member vanished".to_string()))?;

    let upload_dir = &state.config.upload_dir;
    save_photo(upload_dir, &photo_name, &photo.bytes).await?;
    if let Err(e) = tx.commit().await {
        remove_photo(upload_dir, &photo_name).await;
        return Err(e.into());
    }

    tracing::info!(member = %stored.id, nra = %stored.nra, "Member registered");

    let mut response = MemberResponse::from(&stored);
    response.login_token = stored.login_token.clone();
    success("Registration successful", response)
}

/// What an update does to the member's photo file.
enum PhotoChange {
    Keep,
    /// A new upload; the previous file goes once the update commits.
    Replace { old: Option<String>, new: String },
    /// NRA or name changed, so the stored file moves to its new name.
    Rename { from: String, to: String },
}

/// PUT /api/member/{id} - Partial administrative update from a multipart form.
///
/// A role change that names `requestedBy` is not applied; it is sent to the
/// member as a status-change request instead.
pub async fn update_member(
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> ApiResult<MemberUpdateResponse> {
    let form = MemberForm::read(multipart).await?;
    let request = update_request(&form)?;

    let mut tx = state.repo.begin().await?;

    let current = members::find_member_by_id(&mut *tx, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Member {} not found", id)))?;
    let mut updated = current.clone();

    if let Some(nra) = request.nra.as_deref() {
        if !is_valid_nra(nra) {
            return Err(AppError::Validation("Invalid NRA format".to_string()));
        }
        if nra != current.nra && members::find_member_by_nra(&mut *tx, nra).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "A member with NRA {} already exists",
                nra
            )));
        }
        updated.nra = nra.to_string();
    }
    if let Some(name) = request.name.as_deref() {
        updated.name = name.to_string();
    }
    if let Some(cohort) = request.cohort.as_deref() {
        updated.cohort_id = members::get_or_create_cohort(&mut *tx, cohort).await?;
    }
    if let Some(department) = request.department.as_deref() {
        let department_id = members::get_or_create_department(&mut *tx, department).await?;
        updated.department_id = Some(department_id);
    }
    if let Some(status) = request.membership_status {
        updated.membership_status = status;
    }
    if request.inaugurated_on.is_some() {
        updated.inaugurated_on = request.inaugurated_on;
    }

    let photo_change = match (&form.photo, &current.photo) {
        (Some(upload), old) => PhotoChange::Replace {
            old: old.clone(),
            new: photo_file_name(&updated.nra, &updated.name, &upload.file_name),
        },
        (None, Some(old)) => {
            let renamed = photo_file_name(&updated.nra, &updated.name, old);
            if renamed == *old {
                PhotoChange::Keep
            } else {
                PhotoChange::Rename {
                    from: old.clone(),
                    to: renamed,
                }
            }
        }
        (None, None) => PhotoChange::Keep,
    };
    match &photo_change {
        PhotoChange::Replace { new, .. } => updated.photo = Some(new.clone()),
        PhotoChange::Rename { to, .. } => updated.photo = Some(to.clone()),
        PhotoChange::Keep => {}
    }

    let mut proposed_role = None;
    if let Some(role) = request.role.filter(|role| *role != current.role) {
        match request.requested_by.as_deref() {
            Some(requested_by) => proposed_role = Some((requested_by.to_string(), role)),
            None => updated.role = role,
        }
    }

    members::update_member(&mut *tx, &updated).await?;

    let notification_id = match proposed_role {
        Some((requested_by, role)) => {
            let created = StatusChangeWorkflow::send_notification(
                &mut *tx,
                &requested_by,
                &current.id,
                current.role,
                role,
            )
            .await?;
            Some(created.notification_id)
        }
        None => None,
    };

    let stored = members::find_member_by_id(&mut *tx, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Member {} not found", id)))?;

    // File changes run after the row writes; an error here drops the transaction.
    let upload_dir = &state.config.upload_dir;
    match &photo_change {
        PhotoChange::Replace { new, .. } => {
            if let Some(upload) = &form.photo {
                save_photo(upload_dir, new, &upload.bytes).await?;
            }
        }
        PhotoChange::Rename { from, to } => rename_photo(upload_dir, from, to).await?,
        PhotoChange::Keep => {}
    }

    if let Err(e) = tx.commit().await {
        match &photo_change {
            PhotoChange::Replace { old, new } if old.as_deref() != Some(new.as_str()) => {
                remove_photo(upload_dir, new).await;
            }
            PhotoChange::Rename { from, to } => {
                if let Err(undo) = rename_photo(upload_dir, to, from).await {
                    tracing::warn!(file = %to, "Failed to restore photo name: {}", undo);
                }
            }
            _ => {}
        }
        return Err(e.into());
    }

    if let PhotoChange::Replace { old: Some(old), new } = &photo_change {
        if old != new {
            remove_photo(upload_dir, old).await;
        }
    }

    if current.role != stored.role {
        tracing::info!(
            member = %stored.id,
            from_role = %current.role,
            to_role = %stored.role,
            "Role updated by administrator"
        );
    }

    let message = if notification_id.is_some() {
        "Member updated; role change sent for approval"
    } else {
        "Member updated"
    };
    success(
        message,
        MemberUpdateResponse {
            member: MemberResponse::from(&stored),
            notification_sent: notification_id.is_some(),
            notification_id,
        },
    )
}

/// DELETE /api/member/{id} - Refused while notifications reference the member.
pub async fn delete_member(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    let mut tx = state.repo.begin().await?;

    let references = members::count_notification_references(&mut *tx, &id).await?;
    if references > 0 {
        return Err(AppError::Conflict(format!(
            "Member {} is referenced by {} notification(s)",
            id, references
        )));
    }

    members::delete_member(&mut *tx, &id).await?;
    tx.commit().await?;

    tracing::info!(member = %id, "Member deleted");
    success("Member deleted", ())
}
