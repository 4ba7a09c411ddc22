//! User-facing error message formatting.
//!
//! Uses typed error matching (PolarsError variants, io::ErrorKind) rather than
//! string parsing to produce short, actionable messages for the status line.

use polars::prelude::PolarsError;
use std::io;

use crate::error::QueryError;

/// One-line message for a failed query state operation.
pub fn user_message(err: &QueryError) -> String {
    match err {
        QueryError::Backend(pe) => user_message_from_polars(pe),
        QueryError::InvalidLimit(_) => "Page size must be at least 1.".to_string(),
        QueryError::MissingCount => "Could not count the rows of this query.".to_string(),
    }
}

/// Format a PolarsError as a user-facing message by matching on its variant.
pub fn user_message_from_polars(err: &PolarsError) -> String {
    use polars::prelude::PolarsError as PE;

    match err {
        PE::ColumnNotFound(msg) => format!(
            "Column not found: {}. Check spelling and that the column exists.",
            first_line(msg)
        ),
        PE::Duplicate(msg) => format!(
            "Duplicate column in result: {}. Select each field only once.",
            first_line(msg)
        ),
        PE::IO { error, msg } => {
            user_message_from_io(error.as_ref(), msg.as_ref().map(|m| m.as_ref()))
        }
        PE::NoData(msg) => format!("No data: {}", first_line(msg)),
        PE::SchemaMismatch(msg) => format!(
            "Schema mismatch: {}. Files are unioned by column name; a column must have the same type in every file.",
            first_line(msg)
        ),
        PE::InvalidOperation(msg) => format!("Operation not allowed: {}", first_line(msg)),
        PE::SchemaFieldNotFound(msg) => format!("Schema field not found: {}", first_line(msg)),
        PE::ComputeError(msg) => first_line(msg).to_string(),
        PE::SQLInterface(msg) | PE::SQLSyntax(msg) => {
            format!("Invalid filter or sort: {}", first_line(msg))
        }
        PE::Context { error, msg } => {
            let inner = user_message_from_polars(error);
            format!("{}: {}", msg, inner)
        }
        #[allow(unreachable_patterns)]
        _ => first_line(&err.to_string()).to_string(),
    }
}

/// Format an io::Error as a user-facing message by matching on ErrorKind.
pub fn user_message_from_io(err: &io::Error, context: Option<&str>) -> String {
    use std::io::ErrorKind;

    let base: String = match err.kind() {
        ErrorKind::NotFound => "File or directory not found.".to_string(),
        ErrorKind::PermissionDenied => "Permission denied. Check read access.".to_string(),
        ErrorKind::InvalidData | ErrorKind::InvalidInput => {
            "Invalid or corrupted data.".to_string()
        }
        ErrorKind::UnexpectedEof => "Unexpected end of file.".to_string(),
        ErrorKind::OutOfMemory => "Out of memory.".to_string(),
        _ => err.to_string(),
    };

    match context {
        Some(ctx) if !ctx.is_empty() => format!("{} {}", base, ctx),
        _ => base,
    }
}

/// Polars messages often append the resolved plan after a blank line.
fn first_line(msg: &str) -> &str {
    msg.lines().next().map(str::trim).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_from_io_not_found() {
        let err = io::Error::new(io::ErrorKind::NotFound, "No such file");
        let msg = user_message_from_io(&err, None);
        assert!(
            msg.contains("not found"),
            "expected 'not found', got: {}",
            msg
        );
    }

    #[test]
    fn test_user_message_from_polars_column_not_found() {
        let err = PolarsError::ColumnNotFound("foo".into());
        let msg = user_message_from_polars(&err);
        assert!(msg.contains("foo"), "expected 'foo', got: {}", msg);
        assert!(msg.contains("Column not found"));
    }

    #[test]
    fn test_compute_error_keeps_first_line() {
        let err = PolarsError::ComputeError("bad thing\n\nResolved plan until failure: ...".into());
        assert_eq!(user_message_from_polars(&err), "bad thing");
    }

    #[test]
    fn test_invalid_limit_message() {
        let msg = user_message(&QueryError::InvalidLimit(0));
        assert!(msg.contains("at least 1"));
    }
}
