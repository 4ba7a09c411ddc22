use polars::prelude::PolarsError;
use thiserror::Error;

/// Errors raised by [`QueryState`](crate::QueryState) and the pieces it drives.
///
/// Backend failures (bad SQL, unknown columns, unreadable Parquet) are carried
/// verbatim in [`QueryError::Backend`]; nothing here retries or rewrites them.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error(transparent)]
    Backend(#[from] PolarsError),

    #[error("page size must be at least 1, got {0}")]
    InvalidLimit(usize),

    #[error("count query returned no usable value")]
    MissingCount,
}

pub type Result<T, E = QueryError> = std::result::Result<T, E>;
