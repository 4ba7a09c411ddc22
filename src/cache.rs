use color_eyre::Result;
use polars::prelude::{DataFrame, PolarsResult};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::debug;

use crate::backend::Backend;
use crate::sql::Source;

/// Memoizes query results by their exact SQL text.
///
/// Two queries that differ only in whitespace are separate entries. Entries are
/// never evicted; [`ResultCache::revalidate`] drops everything when the files
/// behind the queries change. Failed queries are not cached.
pub struct ResultCache<B> {
    backend: B,
    entries: HashMap<String, DataFrame>,
    stamp: Option<SourceStamp>,
    enabled: bool,
    hits: u64,
    misses: u64,
}

impl<B: Backend> ResultCache<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            entries: HashMap::new(),
            stamp: None,
            enabled: true,
            hits: 0,
            misses: 0,
        }
    }

    /// With caching off every call goes to the backend.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn cached_execute(&mut self, sql: &str) -> PolarsResult<DataFrame> {
        if self.enabled {
            if let Some(df) = self.entries.get(sql) {
                self.hits += 1;
                debug!(sql, "result cache hit");
                return Ok(df.clone());
            }
        }
        self.misses += 1;
        let df = self.backend.execute(sql)?;
        if self.enabled {
            self.entries.insert(sql.to_string(), df.clone());
        }
        Ok(df)
    }

    /// Drop all entries if `stamp` differs from the one they were produced under.
    /// Returns true when entries were dropped.
    pub fn revalidate(&mut self, stamp: SourceStamp) -> bool {
        let changed = self.stamp.as_ref().is_some_and(|s| *s != stamp);
        if changed && !self.entries.is_empty() {
            debug!(entries = self.entries.len(), "source files changed, clearing result cache");
            self.entries.clear();
        }
        self.stamp = Some(stamp);
        changed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

/// Paths and modification times of the files behind a [`Source`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceStamp(Vec<(PathBuf, Option<SystemTime>)>);

impl SourceStamp {
    pub fn of(source: &Source) -> Self {
        Self(
            source
                .paths()
                .iter()
                .map(|p| {
                    let modified = fs::metadata(p).and_then(|m| m.modified()).ok();
                    (p.clone(), modified)
                })
                .collect(),
        )
    }
}

/// Manages the cache directory (log files live here).
#[derive(Clone)]
pub struct CacheManager {
    pub(crate) cache_dir: PathBuf,
}

impl CacheManager {
    /// Create a new CacheManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| color_eyre::eyre::eyre!("Could not determine cache directory"))?
            .join(app_name);

        Ok(Self { cache_dir })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Get path to a specific cache file
    pub fn cache_file(&self, filename: &str) -> PathBuf {
        self.cache_dir.join(filename)
    }

    /// Ensure the cache directory exists
    pub fn ensure_cache_dir(&self) -> Result<()> {
        if !self.cache_dir.exists() {
            fs::create_dir_all(&self.cache_dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    #[derive(Default)]
    struct Counting {
        executed: Vec<String>,
        fail: bool,
    }

    impl Backend for Counting {
        fn execute(&mut self, sql: &str) -> PolarsResult<DataFrame> {
            self.executed.push(sql.to_string());
            if self.fail {
                return Err(PolarsError::ComputeError("boom".into()));
            }
            df!("n" => [self.executed.len() as i64])
        }

        fn tables(&self) -> Vec<String> {
            Vec::new()
        }
    }

    #[test]
    fn test_identical_text_executes_once() {
        let mut cache = ResultCache::new(Counting::default());
        let a = cache.cached_execute("SELECT 1").unwrap();
        let b = cache.cached_execute("SELECT 1").unwrap();
        assert_eq!(cache.backend().executed.len(), 1);
        assert!(a.equals(&b));
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn test_whitespace_variants_are_distinct() {
        let mut cache = ResultCache::new(Counting::default());
        cache.cached_execute("SELECT 1").unwrap();
        cache.cached_execute("SELECT  1").unwrap();
        assert_eq!(cache.backend().executed.len(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_disabled_cache_always_executes() {
        let mut cache = ResultCache::new(Counting::default()).with_enabled(false);
        cache.cached_execute("SELECT 1").unwrap();
        cache.cached_execute("SELECT 1").unwrap();
        assert_eq!(cache.backend().executed.len(), 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_errors_are_not_cached() {
        let mut cache = ResultCache::new(Counting {
            fail: true,
            ..Default::default()
        });
        assert!(cache.cached_execute("SELECT nope").is_err());
        assert!(cache.is_empty());
        cache.backend_mut().fail = false;
        assert!(cache.cached_execute("SELECT nope").is_ok());
        assert_eq!(cache.backend().executed.len(), 2);
    }

    #[test]
    fn test_revalidate_clears_on_changed_stamp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.parquet");
        let source = Source::files([path.clone()]);

        let mut cache = ResultCache::new(Counting::default());
        assert!(!cache.revalidate(SourceStamp::of(&source)));
        cache.cached_execute("SELECT 1").unwrap();

        // Same (missing) file, same stamp.
        assert!(!cache.revalidate(SourceStamp::of(&source)));
        assert_eq!(cache.len(), 1);

        std::fs::write(&path, b"x").unwrap();
        assert!(cache.revalidate(SourceStamp::of(&source)));
        assert!(cache.is_empty());
    }
}
