//! Status-change workflow engine.
//!
//! A board member proposes a role transition for another board member. The
//! proposal is stored as a notification paired 1:1 with a status-change request,
//! and the addressee later accepts or rejects it. Every operation runs in one
//! transaction: domain checks happen before the first write, and any failure
//! after that discards the whole unit of work.

pub mod query;

use sqlx::SqliteConnection;

use crate::auth::Claims;
use crate::db::{members, notifications, now_timestamp, Repository};
use crate::errors::AppError;
use crate::models::{
    CreateStatusChangeRequest, Member, Notification, NotificationKind, NotificationMetadata,
    RequestStatus, Role, StatusChangeAccepted, StatusChangeCreated, StatusChangeMetadata,
    StatusChangeRejected, StatusChangeRequest,
};

pub use query::NotificationQuery;

const NOTIFICATION_TITLE: &str = "Status Change Request";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resolution {
    Accept,
    Reject,
}

impl Resolution {
    fn status(self) -> RequestStatus {
        match self {
            Resolution::Accept => RequestStatus::Accepted,
            Resolution::Reject => RequestStatus::Rejected,
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Resolution::Accept => "accept",
            Resolution::Reject => "reject",
        }
    }
}

/// Orchestrates creation and resolution of status-change requests.
#[derive(Clone)]
pub struct StatusChangeWorkflow {
    repo: Repository,
}

impl StatusChangeWorkflow {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Propose a role change on behalf of the authenticated `requester`.
    ///
    /// Only board members may propose, and only for a target who is currently
    /// on the board, with `fromRole` also equal to board. Checks run in that
    /// order and `toRole` is parsed last.
    pub async fn create_request(
        &self,
        requester: &Claims,
        input: &CreateStatusChangeRequest,
    ) -> Result<StatusChangeCreated, AppError> {
        let target_member_id = input.target_member_id.trim();
        if target_member_id.is_empty()
            || input.from_role.trim().is_empty()
            || input.to_role.trim().is_empty()
        {
            return Err(AppError::Validation(
                "targetMemberId, fromRole and toRole are required".to_string(),
            ));
        }

        let mut tx = self.repo.begin().await?;

        let requester = members::get_member_by_identity(&mut *tx, requester).await?;
        if requester.role != Role::PRIVILEGED {
            tracing::warn!(
                requester = %requester.id,
                role = %requester.role,
                "Role change request refused: requester is not on the board"
            );
            return Err(AppError::PermissionDenied(
                "Only board members can request role changes".to_string(),
            ));
        }

        let target = members::find_member_by_id(&mut *tx, target_member_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Member {} not found", target_member_id))
            })?;

        // Any fromRole other than board is a transition error, recognised role or not
        if target.role != Role::PRIVILEGED
            || Role::parse(input.from_role.trim()) != Some(Role::PRIVILEGED)
        {
            return Err(AppError::InvalidTransition(
                "Role change requests are only allowed for board members".to_string(),
            ));
        }
        let from_role = Role::PRIVILEGED;
        let to_role = parse_role(&input.to_role)?;

        let created =
            insert_request_pair(&mut *tx, &requester, &target.id, from_role, to_role).await?;
        tx.commit().await?;

        tracing::info!(
            request_id = %created.request_id,
            notification_id = %created.notification_id,
            requester = %requester.id,
            target = %target.id,
            %from_role,
            %to_role,
            "Status change request created"
        );
        Ok(created)
    }

    /// Accept a pending request addressed to `resolver`, applying the new role.
    pub async fn accept_request(
        &self,
        resolver: &Claims,
        request_id: &str,
    ) -> Result<StatusChangeAccepted, AppError> {
        let request = self.resolve(resolver, request_id, Resolution::Accept).await?;
        Ok(StatusChangeAccepted {
            message: "Role change accepted".to_string(),
            new_role: request.to_role,
        })
    }

    /// Reject a pending request addressed to `resolver`. The member's role is untouched.
    pub async fn reject_request(
        &self,
        resolver: &Claims,
        request_id: &str,
    ) -> Result<StatusChangeRejected, AppError> {
        self.resolve(resolver, request_id, Resolution::Reject).await?;
        Ok(StatusChangeRejected {
            message: "Role change rejected".to_string(),
        })
    }

    /// Send a status-change request on behalf of a trusted internal caller.
    ///
    /// Runs inside the caller's transaction so the paired insert commits or rolls
    /// back with the caller's own writes. No authentication or board checks.
    pub async fn send_notification(
        conn: &mut SqliteConnection,
        from_member_id: &str,
        target_member_id: &str,
        from_role: Role,
        to_role: Role,
    ) -> Result<StatusChangeCreated, AppError> {
        let requester = members::find_member_by_id(conn, from_member_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Member {} not found", from_member_id)))?;

        if members::find_member_by_id(conn, target_member_id)
            .await?
            .is_none()
        {
            return Err(AppError::NotFound(format!(
                "Member {} not found",
                target_member_id
            )));
        }

        let created =
            insert_request_pair(conn, &requester, target_member_id, from_role, to_role).await?;

        tracing::info!(
            request_id = %created.request_id,
            notification_id = %created.notification_id,
            requester = %from_member_id,
            target = %target_member_id,
            "Status change notification sent"
        );
        Ok(created)
    }

    async fn resolve(
        &self,
        resolver: &Claims,
        request_id: &str,
        resolution: Resolution,
    ) -> Result<StatusChangeRequest, AppError> {
        // Authorization reads run outside the unit of work. The owner of a
        // request never changes, and its status is re-checked by the guarded write.
        let (member, request) = {
            let mut conn = self.repo.pool().acquire().await?;
            let member = members::get_member_by_identity(&mut conn, resolver).await?;
            let request = notifications::find_status_change_request(&mut conn, request_id)
                .await?
                .ok_or_else(|| {
                    AppError::NotFound(format!("Status change request {} not found", request_id))
                })?;
            (member, request)
        };

        if request.target_member_id != member.id {
            tracing::warn!(
                request_id = %request.id,
                resolver = %member.id,
                "Refused to {} a status change request addressed to another member",
                resolution.verb()
            );
            return Err(AppError::PermissionDenied(format!(
                "You can only {} your own status change requests",
                resolution.verb()
            )));
        }

        if request.status != RequestStatus::Pending {
            return Err(already_processed());
        }

        let now = now_timestamp();
        let mut tx = self.repo.begin().await?;

        // Must stay the first statement of the transaction: it takes the write
        // lock before any snapshot is read, so a losing resolver waits and then
        // matches zero rows.
        if !notifications::resolve_status_change_request(
            &mut *tx,
            &request.id,
            resolution.status(),
            &now,
        )
        .await?
        {
            return Err(already_processed());
        }

        if resolution == Resolution::Accept {
            let current = members::find_member_by_id(&mut *tx, &member.id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Member {} not found", member.id)))?;
            let updated = Member {
                role: request.to_role,
                ..current
            };
            members::update_member(&mut *tx, &updated).await?;
        }

        notifications::resolve_notification(
            &mut *tx,
            &request.notification_id,
            resolution == Resolution::Accept,
            &now,
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            request_id = %request.id,
            member = %member.id,
            status = resolution.status().as_str(),
            from_role = %request.from_role,
            to_role = %request.to_role,
            "Status change request resolved"
        );
        Ok(request)
    }
}

/// Insert the notification and its request. Both rows land in `conn`'s transaction.
async fn insert_request_pair(
    conn: &mut SqliteConnection,
    requester: &Member,
    target_member_id: &str,
    from_role: Role,
    to_role: Role,
) -> Result<StatusChangeCreated, AppError> {
    let notification_id = uuid::Uuid::new_v4().to_string();
    let request_id = uuid::Uuid::new_v4().to_string();
    let now = now_timestamp();

    let metadata = NotificationMetadata::StatusChange(StatusChangeMetadata {
        request_id: request_id.clone(),
        from_role,
        to_role,
    });

    let notification = Notification {
        id: notification_id.clone(),
        target_member_id: target_member_id.to_string(),
        from_member_id: requester.id.clone(),
        kind: NotificationKind::StatusChangeRequest,
        title: NOTIFICATION_TITLE.to_string(),
        message: format!(
            "{} requests to change your role from {} to {}",
            requester.name, from_role, to_role
        ),
        metadata: Some(metadata.encode()?),
        pending: true,
        accepted: None,
        read_at: None,
        created_at: now.clone(),
        updated_at: now.clone(),
    };
    notifications::insert_notification(conn, &notification).await?;

    let request = StatusChangeRequest {
        id: request_id.clone(),
        notification_id: notification_id.clone(),
        target_member_id: target_member_id.to_string(),
        requested_by_member_id: requester.id.clone(),
        from_role,
        to_role,
        status: RequestStatus::Pending,
        processed_at: None,
        created_at: now,
    };
    notifications::insert_status_change_request(conn, &request).await?;

    Ok(StatusChangeCreated {
        request_id,
        notification_id,
        message: "Role change request sent successfully".to_string(),
    })
}

fn parse_role(raw: &str) -> Result<Role, AppError> {
    Role::parse(raw.trim()).ok_or_else(|| AppError::Validation(format!("Unknown role '{}'", raw)))
}

fn already_processed() -> AppError {
    AppError::AlreadyProcessed("Request has already been processed".to_string())
}
