//! Notification and status-change request models.

use serde::{Deserialize, Serialize};

use super::Role;

/// Type tag of a notification. Only status-change requests carry a schema today.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationKind {
    StatusChangeRequest,
    Other(String),
}

impl NotificationKind {
    pub fn as_str(&self) -> &str {
        match self {
            NotificationKind::StatusChangeRequest => "status_change_request",
            NotificationKind::Other(tag) => tag,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "status_change_request" => NotificationKind::StatusChangeRequest,
            other => NotificationKind::Other(other.to_string()),
        }
    }
}

impl Serialize for NotificationKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Lifecycle of a status-change request. Leaves `Pending` exactly once.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RequestStatus::Pending),
            "accepted" => Some(RequestStatus::Accepted),
            "rejected" => Some(RequestStatus::Rejected),
            _ => None,
        }
    }
}

/// Payload of a `status_change_request` notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StatusChangeMetadata {
    pub request_id: String,
    pub from_role: Role,
    pub to_role: Role,
}

/// Structured notification metadata, keyed by the notification type.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum NotificationMetadata {
    StatusChange(StatusChangeMetadata),
    /// Payload of a type this service has no schema for
    Opaque(serde_json::Value),
}

impl NotificationMetadata {
    /// Decode a stored blob. Known types are decoded strictly against their schema.
    pub fn decode(kind: &NotificationKind, raw: &str) -> Result<Self, serde_json::Error> {
        match kind {
            NotificationKind::StatusChangeRequest => {
                serde_json::from_str(raw).map(NotificationMetadata::StatusChange)
            }
            NotificationKind::Other(_) => {
                serde_json::from_str(raw).map(NotificationMetadata::Opaque)
            }
        }
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// An addressed message as stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: String,
    pub target_member_id: String,
    pub from_member_id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// Raw metadata blob; decode with [`NotificationMetadata::decode`]
    pub metadata: Option<String>,
    pub pending: bool,
    /// `None` while undetermined
    pub accepted: Option<bool>,
    pub read_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// A notification row joined with the sender's current directory details.
#[derive(Debug, Clone)]
pub struct NotificationWithSender {
    pub notification: Notification,
    pub from_member_name: Option<String>,
    pub from_member_nra: Option<String>,
    pub from_member_role: Option<Role>,
}

/// The authoritative record of a proposed role transition.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChangeRequest {
    pub id: String,
    pub notification_id: String,
    pub target_member_id: String,
    pub requested_by_member_id: String,
    pub from_role: Role,
    pub to_role: Role,
    pub status: RequestStatus,
    pub processed_at: Option<String>,
    pub created_at: String,
}

/// Sender details shown next to a notification.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FromMemberDetails {
    pub id: String,
    pub name: String,
    pub nra: String,
    pub role: Option<Role>,
}

/// Client-facing projection of a notification.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub pending: bool,
    pub accepted: Option<bool>,
    pub read_at: Option<String>,
    pub created_at: String,
    pub from_member: FromMemberDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<NotificationMetadata>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UnreadCount {
    pub count: i64,
}

/// Request body for proposing a role change.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStatusChangeRequest {
    #[serde(default)]
    pub target_member_id: String,
    #[serde(default)]
    pub from_role: String,
    #[serde(default)]
    pub to_role: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeCreated {
    pub request_id: String,
    pub notification_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeAccepted {
    pub message: String,
    pub new_role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusChangeRejected {
    pub message: String,
}
