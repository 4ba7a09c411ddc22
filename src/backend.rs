//! Query execution backends.
//!
//! [`QueryState`](crate::QueryState) only ever talks to a [`Backend`]: it asks
//! for the FROM expression of a [`Source`] once per source change and then
//! hands over SQL text. The production backend is [`PolarsBackend`].

use polars::prelude::*;
use polars_sql::SQLContext;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::sql::{quote_ident, read_files_expr, Source, FILENAME_COLUMN};

/// Name under which [`PolarsBackend`] registers the files of a [`Source::Files`].
pub const SOURCE_TABLE: &str = "parquet_source";

pub trait Backend {
    /// Run `sql` and return the full result.
    fn execute(&mut self, sql: &str) -> PolarsResult<DataFrame>;

    /// Tables that can be used with [`Source::Table`].
    fn tables(&self) -> Vec<String>;

    /// FROM expression for `source`. Called whenever the source changes, so
    /// backends that need to register the files up front do it here.
    fn source_expr(&mut self, source: &Source) -> PolarsResult<String> {
        Ok(match source {
            Source::Files(paths) => read_files_expr(paths),
            Source::Table(name) => quote_ident(name),
        })
    }
}

/// Lazily scans Parquet files and runs SQL on them through a polars [`SQLContext`].
pub struct PolarsBackend {
    ctx: SQLContext,
}

impl Default for PolarsBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl PolarsBackend {
    pub fn new() -> Self {
        Self {
            ctx: SQLContext::new(),
        }
    }

    /// Make `lf` queryable as table `name`.
    pub fn register(&mut self, name: &str, lf: LazyFrame) {
        self.ctx.register(name, lf);
    }

    fn scan_file(path: &Path) -> PolarsResult<LazyFrame> {
        let pl_path = PlPath::Local(Arc::from(path));
        let args = ScanArgsParquet {
            include_file_paths: Some(FILENAME_COLUMN.into()),
            ..Default::default()
        };
        LazyFrame::scan_parquet(pl_path, args)
    }

    /// One LazyFrame over all `paths`, columns unioned by name (missing columns are null)
    /// and each row tagged with its file in the `filename` column.
    pub fn scan_files(paths: &[PathBuf]) -> PolarsResult<LazyFrame> {
        match paths {
            [] => Err(PolarsError::NoData("no files to scan".into())),
            [single] => Self::scan_file(single),
            many => {
                let frames = many
                    .iter()
                    .map(|p| Self::scan_file(p))
                    .collect::<PolarsResult<Vec<_>>>()?;
                concat_lf_diagonal(frames, UnionArgs::default())
            }
        }
    }
}

impl Backend for PolarsBackend {
    fn execute(&mut self, sql: &str) -> PolarsResult<DataFrame> {
        debug!(sql, "executing query");
        self.ctx.execute(sql)?.collect()
    }

    fn tables(&self) -> Vec<String> {
        self.ctx.get_tables()
    }

    fn source_expr(&mut self, source: &Source) -> PolarsResult<String> {
        match source {
            Source::Files(paths) => {
                let lf = Self::scan_files(paths)?;
                self.register(SOURCE_TABLE, lf);
                Ok(SOURCE_TABLE.to_string())
            }
            Source::Table(name) => Ok(quote_ident(name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Plain;

    impl Backend for Plain {
        fn execute(&mut self, _sql: &str) -> PolarsResult<DataFrame> {
            Ok(DataFrame::empty())
        }

        fn tables(&self) -> Vec<String> {
            Vec::new()
        }
    }

    #[test]
    fn test_default_source_expr() {
        let mut backend = Plain;
        let expr = backend
            .source_expr(&Source::files(["a.parquet", "b.parquet"]))
            .unwrap();
        assert_eq!(
            expr,
            "read_parquet(['a.parquet','b.parquet'], union_by_name=true, filename=true)"
        );
        let expr = backend.source_expr(&Source::Table("runs".into())).unwrap();
        assert_eq!(expr, "\"runs\"");
    }

    #[test]
    fn test_registered_table_is_queryable() {
        let mut backend = PolarsBackend::new();
        let df = df!("a" => [1i64, 2, 3], "b" => ["x", "y", "z"]).unwrap();
        backend.register("t", df.lazy());
        assert!(backend.tables().contains(&"t".to_string()));

        let out = backend
            .execute("SELECT b FROM t WHERE a >= 2 ORDER BY a DESC LIMIT 1 OFFSET 0")
            .unwrap();
        assert_eq!(out.height(), 1);
        assert_eq!(out.get_column_names_str(), vec!["b"]);
    }

    #[test]
    fn test_scan_files_requires_paths() {
        assert!(PolarsBackend::scan_files(&[]).is_err());
    }
}
