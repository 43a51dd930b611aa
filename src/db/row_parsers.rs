use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use crate::access::Actor;
use crate::errors::AppError;
use crate::models::branch::Branch;
use crate::models::employee::Employee;
use crate::models::module::ModuleFlag;
use crate::models::rbac::Role;
use crate::models::user::UserProfile;

pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, AppError> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // SQLite default timestamp format, optional fractional seconds
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    if let Ok(naive_date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let ndt = naive_date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| AppError::internal("invalid datetime: date out of range"))?;
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    Err(AppError::internal(format!("invalid datetime: {s}")))
}

fn column<T>(row: &SqliteRow, name: &str) -> Result<T, AppError>
where
    T: for<'r> sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
        .map_err(|e| AppError::internal(format!("missing {name}: {e}")))
}

fn uuid_column(row: &SqliteRow, name: &str) -> Result<Uuid, AppError> {
    let raw: String = column(row, name)?;
    Uuid::parse_str(&raw).map_err(|e| AppError::internal(format!("invalid uuid in {name}: {e}")))
}

fn opt_uuid_column(row: &SqliteRow, name: &str) -> Result<Option<Uuid>, AppError> {
    let raw: Option<String> = column(row, name)?;
    raw.map(|s| Uuid::parse_str(&s).map_err(|e| AppError::internal(format!("invalid uuid in {name}: {e}"))))
        .transpose()
}

fn datetime_column(row: &SqliteRow, name: &str) -> Result<DateTime<Utc>, AppError> {
    let raw: String = column(row, name)?;
    parse_datetime(&raw)
}

fn opt_datetime_column(row: &SqliteRow, name: &str) -> Result<Option<DateTime<Utc>>, AppError> {
    let raw: Option<String> = column(row, name)?;
    match raw {
        Some(s) if !s.trim().is_empty() => Ok(Some(parse_datetime(&s)?)),
        _ => Ok(None),
    }
}

pub fn actor_from_row(row: &SqliteRow) -> Result<Actor, AppError> {
    let role: String = column(row, "role")?;
    let status: String = column(row, "status")?;

    Ok(Actor {
        id: uuid_column(row, "id")?,
        role: role.parse()?,
        role_id: opt_uuid_column(row, "role_id")?,
        branch_id: opt_uuid_column(row, "branch_id")?,
        status: status.parse()?,
    })
}

pub fn user_profile_from_row(row: &SqliteRow) -> Result<UserProfile, AppError> {
    let actor = actor_from_row(row)?;

    Ok(UserProfile {
        id: actor.id,
        name: column(row, "name")?,
        email: column(row, "email")?,
        role: actor.role,
        role_id: actor.role_id,
        branch_id: actor.branch_id,
        status: actor.status,
    })
}

pub fn branch_from_row(row: &SqliteRow) -> Result<Branch, AppError> {
    Ok(Branch {
        id: uuid_column(row, "id")?,
        code: column(row, "code")?,
        name: column(row, "name")?,
        subdomain: column(row, "subdomain")?,
        is_active: column(row, "is_active")?,
        created_at: datetime_column(row, "created_at")?,
        updated_at: datetime_column(row, "updated_at")?,
    })
}

pub fn employee_from_row(row: &SqliteRow) -> Result<Employee, AppError> {
    Ok(Employee {
        id: uuid_column(row, "id")?,
        branch_id: uuid_column(row, "branch_id")?,
        employee_code: column(row, "employee_code")?,
        full_name: column(row, "full_name")?,
        designation: column(row, "designation")?,
        created_at: datetime_column(row, "created_at")?,
        updated_at: datetime_column(row, "updated_at")?,
        deleted_at: opt_datetime_column(row, "deleted_at")?,
    })
}

pub fn role_from_row(row: &SqliteRow) -> Result<Role, AppError> {
    Ok(Role {
        id: uuid_column(row, "id")?,
        name: column(row, "name")?,
        description: column(row, "description")?,
        created_at: datetime_column(row, "created_at")?,
        updated_at: datetime_column(row, "updated_at")?,
    })
}

pub fn module_from_row(row: &SqliteRow) -> Result<ModuleFlag, AppError> {
    Ok(ModuleFlag {
        slug: column(row, "slug")?,
        name: column(row, "name")?,
        is_enabled: column(row, "is_enabled")?,
        updated_at: datetime_column(row, "updated_at")?,
    })
}
