//! SQL text generation for the selection and count queries.
//!
//! Filter clauses are trusted text: they are placed into the WHERE clause as
//! given. Quoting string values inside a clause is the caller's job
//! ([`quote_literal`] is there to help).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Column the Parquet reader adds with the path each row was read from.
pub const FILENAME_COLUMN: &str = "filename";

/// Alias of the single column produced by the count query.
pub const COUNT_COLUMN: &str = "count_star";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    pub fn reversed(&self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// One ORDER BY key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderKey {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl OrderKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// What the queries read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    /// Parquet files read as one table, columns unioned by name.
    Files(Vec<PathBuf>),
    /// A table the backend already knows about.
    Table(String),
}

impl Source {
    pub fn files<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Source::Files(paths.into_iter().map(Into::into).collect())
    }

    pub fn paths(&self) -> &[PathBuf] {
        match self {
            Source::Files(paths) => paths,
            Source::Table(_) => &[],
        }
    }
}

/// Wrap an identifier in double quotes, doubling any embedded quote.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Wrap a string value in single quotes, doubling any embedded quote.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// `read_parquet([...], union_by_name=true, filename=true)` over `paths`.
pub fn read_files_expr(paths: &[PathBuf]) -> String {
    let files = paths
        .iter()
        .map(|p| quote_literal(&p.to_string_lossy()))
        .collect::<Vec<_>>()
        .join(",");
    format!("read_parquet([{files}], union_by_name=true, filename=true)")
}

fn select_list(fields: &[String]) -> String {
    if fields.is_empty() {
        return "*".to_string();
    }
    fields
        .iter()
        .map(|f| quote_ident(f))
        .collect::<Vec<_>>()
        .join(", ")
}

/// ` WHERE ...` (with leading space) or empty. Blank clauses are skipped; with
/// more than one clause each is parenthesized before joining with AND.
fn where_clause(filters: &[String]) -> String {
    let clauses: Vec<&str> = filters
        .iter()
        .map(|c| c.trim())
        .filter(|c| !c.is_empty())
        .collect();
    match clauses.as_slice() {
        [] => String::new(),
        [only] => format!(" WHERE {only}"),
        many => {
            let joined = many
                .iter()
                .map(|c| format!("({c})"))
                .collect::<Vec<_>>()
                .join(" AND ");
            format!(" WHERE {joined}")
        }
    }
}

fn order_clause(order_by: &[OrderKey]) -> String {
    if order_by.is_empty() {
        return String::new();
    }
    let keys = order_by
        .iter()
        .map(|k| format!("{} {}", quote_ident(&k.field), k.direction))
        .collect::<Vec<_>>()
        .join(", ");
    format!(" ORDER BY {keys}")
}

/// Everything the selection query needs apart from the FROM expression.
#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    pub fields: &'a [String],
    pub filters: &'a [String],
    pub order_by: &'a [OrderKey],
    pub limit: usize,
    pub offset: usize,
}

/// `SELECT <fields|*> FROM <from> [WHERE ..] [ORDER BY ..] LIMIT n OFFSET m`
pub fn select_query(from: &str, sel: &Selection<'_>) -> String {
    format!(
        "SELECT {} FROM {}{}{} LIMIT {} OFFSET {}",
        select_list(sel.fields),
        from,
        where_clause(sel.filters),
        order_clause(sel.order_by),
        sel.limit,
        sel.offset
    )
}

/// `SELECT COUNT(*) AS count_star FROM <from> [WHERE ..]`
pub fn count_query(from: &str, filters: &[String]) -> String {
    format!(
        "SELECT COUNT(*) AS {COUNT_COLUMN} FROM {from}{}",
        where_clause(filters)
    )
}

/// Zero-row query used to discover the column names of `from`.
pub fn columns_query(from: &str) -> String {
    format!("SELECT * FROM {from} LIMIT 0")
}
