//! SQLite helpers shared by the store implementations.

use crate::db::migrations::{current_user_version, latest_version};
use crate::repo::{IdentityField, RepoError, RepoResult};
use rusqlite::{ffi, Connection, ErrorCode};
use uuid::Uuid;

/// Kind of constraint a failed statement ran into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ConstraintFailure {
    Unique(String),
    ForeignKey,
    Other,
}

pub(crate) fn constraint_failure(err: &rusqlite::Error) -> Option<ConstraintFailure> {
    match err {
        rusqlite::Error::SqliteFailure(inner, message)
            if inner.code == ErrorCode::ConstraintViolation =>
        {
            let failure = match inner.extended_code {
                ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                    ConstraintFailure::Unique(message.clone().unwrap_or_default())
                }
                ffi::SQLITE_CONSTRAINT_FOREIGNKEY => ConstraintFailure::ForeignKey,
                _ => ConstraintFailure::Other,
            };
            Some(failure)
        }
        _ => None,
    }
}

/// Maps `UNIQUE constraint failed: accounts.<column>` to the clashing field.
pub(crate) fn duplicate_identity_field(err: &rusqlite::Error) -> Option<IdentityField> {
    match constraint_failure(err)? {
        ConstraintFailure::Unique(message) if message.contains("accounts.username") => {
            Some(IdentityField::Username)
        }
        ConstraintFailure::Unique(message) if message.contains("accounts.email") => {
            Some(IdentityField::Email)
        }
        _ => None,
    }
}

pub(crate) fn is_foreign_key_violation(err: &rusqlite::Error) -> bool {
    matches!(constraint_failure(err), Some(ConstraintFailure::ForeignKey))
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

pub(crate) fn parse_bool(value: i64, column: &'static str) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {column}"
        ))),
    }
}

/// Verifies the connection is migrated and carries the given tables.
pub(crate) fn ensure_connection_ready(
    conn: &Connection,
    tables: &[&'static str],
) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_user_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in tables {
        if !table_exists(conn, table)? {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
