//! RPC Error Types
//!
//! Maps application errors to JSON-RPC error codes.

use bulkops_core::error::AppError;
use jsonrpsee::types::ErrorObjectOwned;

/// RPC Error Codes
pub mod code {
    pub const VALIDATION_ERROR: i32 = 4000;
    pub const NOT_FOUND: i32 = 4001;
    pub const CONFLICT: i32 = 4002;
    pub const THROTTLED: i32 = 4003;
    pub const FORBIDDEN: i32 = 4004;
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const DB_ERROR: i32 = 5001;
}

/// Convert AppError to JSON-RPC ErrorObject
pub fn to_rpc_error(err: AppError) -> ErrorObjectOwned {
    let code = match &err {
        AppError::Validation(_) | AppError::Domain(_) => code::VALIDATION_ERROR,
        AppError::NotFound(_) => code::NOT_FOUND,
        AppError::Conflict(_) => code::CONFLICT,
        AppError::Database(_) => code::DB_ERROR,
        AppError::Forbidden(_) => code::FORBIDDEN,
        AppError::Serialization(_) | AppError::Config(_) | AppError::Internal(_) => {
            code::INTERNAL_ERROR
        }
    };

    let message = match err {
        AppError::Validation(msg)
        | AppError::NotFound(msg)
        | AppError::Conflict(msg)
        | AppError::Forbidden(msg)
        | AppError::Database(msg)
        | AppError::Config(msg)
        | AppError::Internal(msg) => msg,
        other => other.to_string(),
    };

    ErrorObjectOwned::owned(code, message, None::<()>)
}

/// Error returned when a caller exhausted its request budget
pub fn throttled(user_id: &str) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(
        code::THROTTLED,
        format!("Rate limit exceeded for {}. Please slow down.", user_id),
        None::<()>,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bulkops_core::domain::DomainError;

    #[test]
    fn test_error_codes() {
        let cases = vec![
            (AppError::Validation("bad".into()), code::VALIDATION_ERROR),
            (
                AppError::Domain(DomainError::UnknownOperation("explode".into())),
                code::VALIDATION_ERROR,
            ),
            (AppError::NotFound("job".into()), code::NOT_FOUND),
            (AppError::Conflict("dup".into()), code::CONFLICT),
            (AppError::Forbidden("admin only".into()), code::FORBIDDEN),
            (AppError::Database("locked".into()), code::DB_ERROR),
            (AppError::Internal("boom".into()), code::INTERNAL_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(to_rpc_error(err).code(), expected);
        }
    }

    #[test]
    fn test_message_is_not_double_prefixed() {
        let err = to_rpc_error(AppError::NotFound("Bulk job not found: j1".into()));
        assert_eq!(err.message(), "Bulk job not found: j1");
    }

    #[test]
    fn test_throttled() {
        assert_eq!(throttled("u1").code(), code::THROTTLED);
    }
}
