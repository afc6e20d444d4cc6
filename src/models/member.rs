//! Member directory models: members, their roles and the auth payloads around them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Organizational position of a member.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Member,
    Board,
    Alumni,
    AdvisoryBoard,
    SupervisoryBoard,
}

impl Role {
    /// The only role allowed to originate, and be the subject of, a status-change request.
    pub const PRIVILEGED: Role = Role::Board;

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Board => "board",
            Role::Alumni => "alumni",
            Role::AdvisoryBoard => "advisory_board",
            Role::SupervisoryBoard => "supervisory_board",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "member" => Some(Role::Member),
            "board" => Some(Role::Board),
            "alumni" => Some(Role::Alumni),
            "advisory_board" => Some(Role::AdvisoryBoard),
            "supervisory_board" => Some(Role::SupervisoryBoard),
            _ => None,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Membership status of a member.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MembershipStatus {
    Active,
    Inactive,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Active => "active",
            MembershipStatus::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(MembershipStatus::Active),
            "inactive" => Some(MembershipStatus::Inactive),
            _ => None,
        }
    }
}

/// A registered member as stored in the directory.
///
/// Carries the credential digest and login token, so it is never serialized
/// directly; see [`MemberResponse`] and [`ProfileResponse`].
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub id: String,
    pub nra: String,
    pub name: String,
    pub cohort_id: String,
    pub cohort_name: Option<String>,
    pub department_id: Option<String>,
    pub department_name: Option<String>,
    pub membership_status: MembershipStatus,
    pub role: Role,
    pub inaugurated_on: Option<NaiveDate>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
    pub login_token: Option<String>,
    pub photo: Option<String>,
    pub created_at: String,
}

/// Member as returned by the administrative routes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberResponse {
    pub id: String,
    pub nra: String,
    pub name: String,
    pub cohort: String,
    pub department: Option<String>,
    pub membership_status: MembershipStatus,
    pub role: Role,
    #[serde(default, with = "dmy_date")]
    pub inaugurated_on: Option<NaiveDate>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub photo: Option<String>,
    /// Only present right after registration, while the token is still unused
    #[serde(skip_serializing_if = "Option::is_none")]
    pub login_token: Option<String>,
}

impl From<&Member> for MemberResponse {
    fn from(member: &Member) -> Self {
        Self {
            id: member.id.clone(),
            nra: member.nra.clone(),
            name: member.name.clone(),
            cohort: member
                .cohort_name
                .clone()
                .unwrap_or_else(|| member.cohort_id.clone()),
            department: member.department_name.clone(),
            membership_status: member.membership_status,
            role: member.role,
            inaugurated_on: member.inaugurated_on,
            email: member.email.clone(),
            phone: member.phone.clone(),
            photo: member.photo.clone(),
            login_token: None,
        }
    }
}

/// The authenticated member's own view of their record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub id: String,
    pub nra: String,
    pub name: String,
    pub cohort: String,
    pub department: Option<String>,
    pub membership_status: MembershipStatus,
    pub role: Role,
    #[serde(default, with = "dmy_date")]
    pub inaugurated_on: Option<NaiveDate>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub photo: Option<String>,
    pub has_password: bool,
}

impl From<&Member> for ProfileResponse {
    fn from(member: &Member) -> Self {
        Self {
            id: member.id.clone(),
            nra: member.nra.clone(),
            name: member.name.clone(),
            cohort: member
                .cohort_name
                .clone()
                .unwrap_or_else(|| member.cohort_id.clone()),
            department: member.department_name.clone(),
            membership_status: member.membership_status,
            role: member.role,
            inaugurated_on: member.inaugurated_on,
            email: member.email.clone(),
            phone: member.phone.clone(),
            photo: member.photo.clone(),
            has_password: member.password_hash.is_some(),
        }
    }
}

/// Registration form. Text fields arrive trimmed; blank ones are `None`.
#[derive(Debug, Clone, Default)]
pub struct RegisterMemberRequest {
    pub nra: Option<String>,
    pub name: Option<String>,
    /// Cohort identifier, e.g. `"015"`
    pub cohort: Option<String>,
    pub membership_status: Option<MembershipStatus>,
    /// Department name
    pub department: Option<String>,
    pub role: Option<Role>,
    pub inaugurated_on: Option<NaiveDate>,
}

/// Administrative update form. Absent fields keep their value.
#[derive(Debug, Clone, Default)]
pub struct UpdateMemberRequest {
    pub nra: Option<String>,
    pub name: Option<String>,
    pub cohort: Option<String>,
    pub membership_status: Option<MembershipStatus>,
    pub department: Option<String>,
    pub role: Option<Role>,
    pub inaugurated_on: Option<NaiveDate>,
    /// When set together with a role change, the change is proposed to the member
    /// as a status-change request on behalf of this member instead of being applied.
    pub requested_by: Option<String>,
}

/// Response for an administrative update that may have turned into a notification.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberUpdateResponse {
    pub member: MemberResponse,
    pub notification_sent: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub nra: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginTokenRequest {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetPasswordRequest {
    #[serde(default)]
    pub password: String,
}

/// Profile fields collected by the complete-profile form.
#[derive(Debug, Clone, Default)]
pub struct CompleteProfileRequest {
    pub email: String,
    pub phone: String,
    pub name: String,
    pub inaugurated_on: Option<NaiveDate>,
    pub photo: Option<String>,
}

/// `DD-MM-YYYY` dates on the wire.
pub mod dmy_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%d-%m-%Y";

    pub fn parse(s: &str) -> Option<NaiveDate> {
        NaiveDate::parse_from_str(s.trim(), FORMAT).ok()
    }

    pub fn serialize<S>(date: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(d) => serializer.serialize_str(&d.format(FORMAT).to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(s) => NaiveDate::parse_from_str(s, FORMAT)
                .map(Some)
                .map_err(|_| serde::de::Error::custom("invalid date format, use DD-MM-YYYY")),
        }
    }
}
