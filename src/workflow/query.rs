//! Read side of the inbox: listing, read receipts and unread counts.

use crate::auth::Claims;
use crate::db::{members, notifications, now_timestamp, Repository};
use crate::errors::AppError;
use crate::models::{
    FromMemberDetails, NotificationMetadata, NotificationView, NotificationWithSender, UnreadCount,
};

/// Notification queries scoped to the authenticated member.
#[derive(Clone)]
pub struct NotificationQuery {
    repo: Repository,
}

impl NotificationQuery {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// All notifications addressed to the caller, newest first.
    pub async fn list_notifications(
        &self,
        caller: &Claims,
    ) -> Result<Vec<NotificationView>, AppError> {
        let mut conn = self.repo.pool().acquire().await?;
        let member = members::get_member_by_identity(&mut conn, caller).await?;
        let rows = notifications::list_notifications_for_member(&mut conn, &member.id).await?;

        Ok(rows.into_iter().map(to_view).collect())
    }

    /// Set `readAt` on one of the caller's notifications.
    ///
    /// A missing notification and one addressed to someone else are reported
    /// identically.
    pub async fn mark_as_read(
        &self,
        caller: &Claims,
        notification_id: &str,
    ) -> Result<(), AppError> {
        let mut conn = self.repo.pool().acquire().await?;
        let member = members::get_member_by_identity(&mut conn, caller).await?;

        let updated = notifications::mark_notification_as_read(
            &mut conn,
            notification_id,
            &member.id,
            &now_timestamp(),
        )
        .await?;

        if !updated {
            return Err(AppError::NotFound(
                "Notification not found or not owned by member".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn unread_count(&self, caller: &Claims) -> Result<UnreadCount, AppError> {
        let mut conn = self.repo.pool().acquire().await?;
        let member = members::get_member_by_identity(&mut conn, caller).await?;
        let count = notifications::count_unread_notifications(&mut conn, &member.id).await?;
        Ok(UnreadCount { count })
    }
}

fn to_view(row: NotificationWithSender) -> NotificationView {
    let n = row.notification;

    let metadata = n.metadata.as_deref().and_then(|raw| {
        match NotificationMetadata::decode(&n.kind, raw) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::warn!(
                    notification_id = %n.id,
                    kind = n.kind.as_str(),
                    "Dropping undecodable notification metadata: {}",
                    e
                );
                None
            }
        }
    });

    NotificationView {
        from_member: FromMemberDetails {
            id: n.from_member_id,
            name: row.from_member_name.unwrap_or_default(),
            nra: row.from_member_nra.unwrap_or_default(),
            role: row.from_member_role,
        },
        id: n.id,
        kind: n.kind,
        title: n.title,
        message: n.message,
        pending: n.pending,
        accepted: n.accepted,
        read_at: n.read_at,
        created_at: n.created_at,
        metadata,
    }
}
