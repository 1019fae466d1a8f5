// sqlx::Error -> AppError
// (orphan rule: From<sqlx::Error> cannot live in core)

use bulkops_core::error::AppError;

/// SQLite extended result codes for constraint failures
pub(crate) const UNIQUE_VIOLATION_CODES: [&str; 2] = ["2067", "1555"];

/// Convert sqlx::Error to AppError with structured information
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            // SQLite error codes: https://www.sqlite.org/rescode.html
            match db_err.code().as_deref() {
                Some(code) if UNIQUE_VIOLATION_CODES.contains(&code) => AppError::Conflict(
                    format!("Unique constraint violation: {} ({})", db_err.message(), code),
                ),
                Some("787") | Some("3850") => AppError::Database(format!(
                    "Foreign key constraint violation: {}",
                    db_err.message()
                )),
                Some("5") | Some("517") => AppError::Database(format!(
                    "Database locked (SQLITE_BUSY): {}",
                    db_err.message()
                )),
                Some("13") => AppError::Database(format!("Database full: {}", db_err.message())),
                Some(code) => AppError::Database(format!(
                    "Database error [{}]: {}",
                    code,
                    db_err.message()
                )),
                None => AppError::Database(format!("Database error: {}", db_err.message())),
            }
        }
        sqlx::Error::RowNotFound => AppError::Database("Row not found".to_string()),
        sqlx::Error::ColumnNotFound(col) => AppError::Database(format!("Column not found: {}", col)),
        _ => AppError::Database(err.to_string()),
    }
}

/// True for a UNIQUE / PRIMARY KEY constraint failure
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .code()
            .is_some_and(|code| UNIQUE_VIOLATION_CODES.contains(&code.as_ref())),
        _ => false,
    }
}
