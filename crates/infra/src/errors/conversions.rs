//! Conversions from external infrastructure errors into domain errors.

use costsync_domain::CostSyncError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub CostSyncError);

impl From<InfraError> for CostSyncError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<CostSyncError> for InfraError {
    fn from(value: CostSyncError) -> Self {
        Self(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoCostSyncError {
    fn into_costsync(self) -> CostSyncError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → CostSyncError */
/* -------------------------------------------------------------------------- */

impl IntoCostSyncError for SqlError {
    fn into_costsync(self) -> CostSyncError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        CostSyncError::Database("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        CostSyncError::Database("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 2067 | 1555) => {
                        CostSyncError::Database("unique constraint violation".into())
                    }
                    (ErrorCode::ConstraintViolation, 787) => {
                        CostSyncError::Database("foreign key constraint violation".into())
                    }
                    (ErrorCode::ReadOnly, _) => {
                        CostSyncError::Database("database is read-only".into())
                    }
                    _ => CostSyncError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => CostSyncError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                CostSyncError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                CostSyncError::Database(format!("invalid column type: {ty}"))
            }
            RE::Utf8Error(_) => {
                CostSyncError::Database("invalid UTF-8 returned from sqlite".into())
            }
            RE::InvalidPath(path) => CostSyncError::Database(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => CostSyncError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        Self(value.into_costsync())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → CostSyncError */
/* -------------------------------------------------------------------------- */

impl IntoCostSyncError for r2d2::Error {
    fn into_costsync(self) -> CostSyncError {
        CostSyncError::Database(format!("connection pool error: {self}"))
    }
}

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        Self(value.into_costsync())
    }
}

/* -------------------------------------------------------------------------- */
/* serde_json::Error → CostSyncError */
/* -------------------------------------------------------------------------- */

impl IntoCostSyncError for serde_json::Error {
    fn into_costsync(self) -> CostSyncError {
        CostSyncError::Internal(format!("json encoding failed: {self}"))
    }
}

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        Self(value.into_costsync())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
