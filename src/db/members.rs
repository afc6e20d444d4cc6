//! Member directory queries.

use sqlx::{Row, SqliteConnection};

use super::now_timestamp;
use crate::auth::Claims;
use crate::errors::AppError;
use crate::models::{CompleteProfileRequest, Member, MembershipStatus, Role};

const MEMBER_SELECT: &str = r#"
    SELECT m.id, m.nra, m.name, m.cohort_id, c.name AS cohort_name,
           m.department_id, d.name AS department_name, m.membership_status, m.role,
           m.inaugurated_on, m.email, m.phone, m.password_hash, m.login_token,
           m.photo, m.created_at
    FROM members m
    LEFT JOIN cohorts c ON c.id = m.cohort_id
    LEFT JOIN departments d ON d.id = m.department_id
"#;

/// List all members ordered by NRA.
pub async fn list_members(conn: &mut SqliteConnection) -> Result<Vec<Member>, AppError> {
    let rows = sqlx::query(&format!("{MEMBER_SELECT} ORDER BY m.nra"))
        .fetch_all(&mut *conn)
        .await?;

    rows.iter().map(member_from_row).collect()
}

pub async fn find_member_by_id(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<Member>, AppError> {
    let row = sqlx::query(&format!("{MEMBER_SELECT} WHERE m.id = ?"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(member_from_row).transpose()
}

pub async fn find_member_by_nra(
    conn: &mut SqliteConnection,
    nra: &str,
) -> Result<Option<Member>, AppError> {
    let row = sqlx::query(&format!("{MEMBER_SELECT} WHERE m.nra = ?"))
        .bind(nra)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(member_from_row).transpose()
}

pub async fn find_member_by_login_token(
    conn: &mut SqliteConnection,
    token: &str,
) -> Result<Option<Member>, AppError> {
    let row = sqlx::query(&format!("{MEMBER_SELECT} WHERE m.login_token = ?"))
        .bind(token)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(member_from_row).transpose()
}

/// Resolve verified token claims to the member they identify.
pub async fn get_member_by_identity(
    conn: &mut SqliteConnection,
    claims: &Claims,
) -> Result<Member, AppError> {
    find_member_by_nra(conn, claims.nra())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Member {} not found", claims.nra())))
}

/// Insert a new member row.
pub async fn insert_member(conn: &mut SqliteConnection, member: &Member) -> Result<(), AppError> {
    sqlx::query(
        r#"INSERT INTO members (
            id, nra, name, cohort_id, department_id, membership_status, role,
            inaugurated_on, email, phone, password_hash, login_token, photo, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(&member.id)
    .bind(&member.nra)
    .bind(&member.name)
    .bind(&member.cohort_id)
    .bind(&member.department_id)
    .bind(member.membership_status.as_str())
    .bind(member.role.as_str())
    .bind(member.inaugurated_on)
    .bind(&member.email)
    .bind(&member.phone)
    .bind(&member.password_hash)
    .bind(&member.login_token)
    .bind(&member.photo)
    .bind(&member.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Full-record update. Every stored column is written from `member`.
pub async fn update_member(conn: &mut SqliteConnection, member: &Member) -> Result<(), AppError> {
    let result = sqlx::query(
        r#"UPDATE members SET
            nra = ?, name = ?, cohort_id = ?, department_id = ?, membership_status = ?,
            role = ?, inaugurated_on = ?, email = ?, phone = ?, password_hash = ?,
            login_token = ?, photo = ?
        WHERE id = ?"#,
    )
    .bind(&member.nra)
    .bind(&member.name)
    .bind(&member.cohort_id)
    .bind(&member.department_id)
    .bind(member.membership_status.as_str())
    .bind(member.role.as_str())
    .bind(member.inaugurated_on)
    .bind(&member.email)
    .bind(&member.phone)
    .bind(&member.password_hash)
    .bind(&member.login_token)
    .bind(&member.photo)
    .bind(&member.id)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Member {} not found", member.id)));
    }

    Ok(())
}

pub async fn delete_member(conn: &mut SqliteConnection, id: &str) -> Result<(), AppError> {
    let result = sqlx::query("DELETE FROM members WHERE id = ?")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Member {} not found", id)));
    }

    Ok(())
}

/// Set or clear the single-use login token.
pub async fn set_login_token(
    conn: &mut SqliteConnection,
    id: &str,
    token: Option<&str>,
) -> Result<(), AppError> {
    sqlx::query("UPDATE members SET login_token = ? WHERE id = ?")
        .bind(token)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn set_password_hash(
    conn: &mut SqliteConnection,
    id: &str,
    password_hash: &str,
) -> Result<(), AppError> {
    sqlx::query("UPDATE members SET password_hash = ? WHERE id = ?")
        .bind(password_hash)
        .bind(id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn update_profile(
    conn: &mut SqliteConnection,
    id: &str,
    profile: &CompleteProfileRequest,
) -> Result<(), AppError> {
    sqlx::query(
        r#"UPDATE members SET
            email = ?, phone = ?, name = ?, inaugurated_on = ?, photo = COALESCE(?, photo)
        WHERE id = ?"#,
    )
    .bind(&profile.email)
    .bind(&profile.phone)
    .bind(&profile.name)
    .bind(profile.inaugurated_on)
    .bind(&profile.photo)
    .bind(id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Look up a cohort by id, creating `Cohort <id>` on first use.
pub async fn get_or_create_cohort(
    conn: &mut SqliteConnection,
    cohort_id: &str,
) -> Result<String, AppError> {
    sqlx::query("INSERT OR IGNORE INTO cohorts (id, name) VALUES (?, ?)")
        .bind(cohort_id)
        .bind(format!("Cohort {}", cohort_id))
        .execute(&mut *conn)
        .await?;

    let row = sqlx::query("SELECT id FROM cohorts WHERE id = ?")
        .bind(cohort_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(row.get("id"))
}

/// Look up a department by name, creating it on first use.
pub async fn get_or_create_department(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<String, AppError> {
    let existing = sqlx::query("SELECT id FROM departments WHERE name = ?")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;

    if let Some(row) = existing {
        return Ok(row.get("id"));
    }

    let id = uuid::Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO departments (id, name) VALUES (?, ?)")
        .bind(&id)
        .bind(name)
        .execute(&mut *conn)
        .await?;
    Ok(id)
}

/// Number of notifications that name the member as sender or target.
pub async fn count_notification_references(
    conn: &mut SqliteConnection,
    member_id: &str,
) -> Result<i64, AppError> {
    let row = sqlx::query(
        "SELECT COUNT(*) AS n FROM notifications WHERE target_member_id = ? OR from_member_id = ?",
    )
    .bind(member_id)
    .bind(member_id)
    .fetch_one(&mut *conn)
    .await?;
    Ok(row.get("n"))
}

/// Build a member for insertion with a fresh id and creation timestamp.
pub fn new_member(nra: String, name: String, cohort_id: String, role: Role) -> Member {
    Member {
        id: uuid::Uuid::new_v4().to_string(),
        nra,
        name,
        cohort_id,
        cohort_name: None,
        department_id: None,
        department_name: None,
        membership_status: MembershipStatus::Active,
        role,
        inaugurated_on: None,
        email: None,
        phone: None,
        password_hash: None,
        login_token: None,
        photo: None,
        created_at: now_timestamp(),
    }
}

fn member_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Member, AppError> {
    let status: String = row.get("membership_status");
    let role: String = row.get("role");
    Ok(Member {
        id: row.get("id"),
        nra: row.get("nra"),
        name: row.get("name"),
        cohort_id: row.get("cohort_id"),
        cohort_name: row.get("cohort_name"),
        department_id: row.get("department_id"),
        department_name: row.get("department_name"),
        membership_status: MembershipStatus::parse(&status).ok_or_else(|| {
            AppError::Internal(format!("Unknown membership status '{}' in store", status))
        })?,
        role: Role::parse(&role)
            .ok_or_else(|| AppError::Internal(format!("Unknown role '{}' in store", role)))?,
        inaugurated_on: row.get("inaugurated_on"),
        email: row.get("email"),
        phone: row.get("phone"),
        password_hash: row.get("password_hash"),
        login_token: row.get("login_token"),
        photo: row.get("photo"),
        created_at: row.get("created_at"),
    })
}
