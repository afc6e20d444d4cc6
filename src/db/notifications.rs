//! Notification store: notifications and the status-change requests paired with them.
//!
//! A passive persistence layer. Which writes happen together, and in which
//! transaction, is decided by the workflow engine.

use sqlx::{Row, SqliteConnection};

use crate::errors::AppError;
use crate::models::{
    Notification, NotificationKind, NotificationWithSender, RequestStatus, Role,
    StatusChangeRequest,
};

const NOTIFICATION_COLUMNS: &str = r#"
    n.id, n.target_member_id, n.from_member_id, n.type, n.title, n.message,
    n.metadata, n.pending, n.accepted, n.read_at, n.created_at, n.updated_at
"#;

const REQUEST_COLUMNS: &str = r#"
    id, notification_id, target_member_id, requested_by_member_id,
    from_role, to_role, status, processed_at, created_at
"#;

// ==================== NOTIFICATIONS ====================

pub async fn insert_notification(
    conn: &mut SqliteConnection,
    notification: &Notification,
) -> Result<(), AppError> {
    sqlx::query(
        r#"INSERT INTO notifications (
            id, target_member_id, from_member_id, type, title, message, metadata,
            pending, accepted, read_at, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&notification.id)
    .bind(&notification.target_member_id)
    .bind(&notification.from_member_id)
    .bind(notification.kind.as_str())
    .bind(&notification.title)
    .bind(&notification.message)
    .bind(&notification.metadata)
    .bind(notification.pending as i32)
    .bind(notification.accepted.map(|b| b as i32))
    .bind(&notification.read_at)
    .bind(&notification.created_at)
    .bind(&notification.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[cfg(test)]
pub async fn find_notification_by_id(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<Notification>, AppError> {
    let row = sqlx::query(&format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM notifications n WHERE n.id = ?"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.as_ref().map(notification_from_row))
}

/// All notifications addressed to `member_id`, newest first, with sender details.
pub async fn list_notifications_for_member(
    conn: &mut SqliteConnection,
    member_id: &str,
) -> Result<Vec<NotificationWithSender>, AppError> {
    let rows = sqlx::query(&format!(
        r#"SELECT {NOTIFICATION_COLUMNS},
                  m.name AS from_member_name, m.nra AS from_member_nra, m.role AS from_member_role
           FROM notifications n
           LEFT JOIN members m ON m.id = n.from_member_id
           WHERE n.target_member_id = ?
           ORDER BY n.created_at DESC, n.rowid DESC"#
    ))
    .bind(member_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .iter()
        .map(|row| {
            let role: Option<String> = row.get("from_member_role");
            NotificationWithSender {
                notification: notification_from_row(row),
                from_member_name: row.get("from_member_name"),
                from_member_nra: row.get("from_member_nra"),
                from_member_role: role.as_deref().and_then(Role::parse),
            }
        })
        .collect())
}

/// Mark the resolution of an actionable notification; resolution implies read.
pub async fn resolve_notification(
    conn: &mut SqliteConnection,
    id: &str,
    accepted: bool,
    now: &str,
) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE notifications SET pending = 0, accepted = ?, read_at = ?, updated_at = ? WHERE id = ?",
    )
    .bind(accepted as i32)
    .bind(now)
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Notification {} not found", id)));
    }

    Ok(())
}

/// Set `read_at` on a notification owned by `member_id`. Returns false when no row matched.
pub async fn mark_notification_as_read(
    conn: &mut SqliteConnection,
    id: &str,
    member_id: &str,
    now: &str,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        "UPDATE notifications SET read_at = ?, updated_at = ? WHERE id = ? AND target_member_id = ?",
    )
    .bind(now)
    .bind(now)
    .bind(id)
    .bind(member_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn count_unread_notifications(
    conn: &mut SqliteConnection,
    member_id: &str,
) -> Result<i64, AppError> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS n FROM notifications WHERE target_member_id = ? AND read_at IS NULL",
    )
    .bind(member_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row.get("n"))
}

// ==================== STATUS CHANGE REQUESTS ====================

pub async fn insert_status_change_request(
    conn: &mut SqliteConnection,
    request: &StatusChangeRequest,
) -> Result<(), AppError> {
    sqlx::query(
        r#"INSERT INTO status_change_requests (
            id, notification_id, target_member_id, requested_by_member_id,
            from_role, to_role, status, processed_at, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&request.id)
    .bind(&request.notification_id)
    .bind(&request.target_member_id)
    .bind(&request.requested_by_member_id)
    .bind(request.from_role.as_str())
    .bind(request.to_role.as_str())
    .bind(request.status.as_str())
    .bind(&request.processed_at)
    .bind(&request.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn find_status_change_request(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<StatusChangeRequest>, AppError> {
    let row = sqlx::query(&format!(
        "SELECT {REQUEST_COLUMNS} FROM status_change_requests WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(request_from_row).transpose()
}

/// Move a pending request to its terminal status.
///
/// Guarded on `status = 'pending'`: returns false when the request was already
/// resolved, so two resolutions of the same request cannot both take effect.
pub async fn resolve_status_change_request(
    conn: &mut SqliteConnection,
    id: &str,
    status: RequestStatus,
    now: &str,
) -> Result<bool, AppError> {
    let result = sqlx::query(
        "UPDATE status_change_requests SET status = ?, processed_at = ? WHERE id = ? AND status = 'pending'",
    )
    .bind(status.as_str())
    .bind(now)
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

// Helper functions for row conversion

fn notification_from_row(row: &sqlx::sqlite::SqliteRow) -> Notification {
    let kind: String = row.get("type");
    let pending: i32 = row.get("pending");
    let accepted: Option<i32> = row.get("accepted");
    Notification {
        id: row.get("id"),
        target_member_id: row.get("target_member_id"),
        from_member_id: row.get("from_member_id"),
        kind: NotificationKind::parse(&kind),
        title: row.get("title"),
        message: row.get("message"),
        metadata: row.get("metadata"),
        pending: pending != 0,
        accepted: accepted.map(|v| v != 0),
        read_at: row.get("read_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn request_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<StatusChangeRequest, AppError> {
    let from_role: String = row.get("from_role");
    let to_role: String = row.get("to_role");
    let status: String = row.get("status");
    let parse_role = |s: &str| {
        Role::parse(s).ok_or_else(|| AppError::Internal(format!("Unknown role '{}' in store", s)))
    };
    Ok(StatusChangeRequest {
        id: row.get("id"),
        notification_id: row.get("notification_id"),
        target_member_id: row.get("target_member_id"),
        requested_by_member_id: row.get("requested_by_member_id"),
        from_role: parse_role(&from_role)?,
        to_role: parse_role(&to_role)?,
        status: RequestStatus::parse(&status).ok_or_else(|| {
            AppError::Internal(format!("Unknown request status '{}' in store", status))
        })?,
        processed_at: row.get("processed_at"),
        created_at: row.get("created_at"),
    })
}
