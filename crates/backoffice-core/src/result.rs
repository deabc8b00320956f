//! Convenience result type alias for Backoffice.

use crate::error::AppError;

/// A specialized `Result` type for Backoffice operations.
pub type AppResult<T> = Result<T, AppError>;
