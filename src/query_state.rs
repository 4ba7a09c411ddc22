//! The query being displayed and its current page of results.
//!
//! [`QueryState`] owns everything the user picked (source, columns, filters,
//! sort keys, page size, page) together with the result of running it. Every
//! mutator re-runs the query synchronously on the calling thread and then tells
//! subscribers once that the state changed.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::backend::{Backend, PolarsBackend};
use crate::cache::{ResultCache, SourceStamp};
use crate::error::{QueryError, Result};
use crate::pagination::{clamp_page, offset_for_page, page_count, page_for_offset};
use crate::result::{Cell, ResultPage};
use crate::sql::{self, OrderKey, Selection, Source, COUNT_COLUMN};

/// Page size used when nothing else is configured.
pub const DEFAULT_LIMIT: usize = 10;

/// Settings that outlive source changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// Page size restored whenever the source changes.
    pub default_limit: usize,
    /// Memoize query results by SQL text.
    pub cache_results: bool,
    /// Forget memoized results when a source file's modification time changes.
    pub track_source_mtime: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            cache_results: true,
            track_source_mtime: true,
        }
    }
}

/// Saved form of a query, for session persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionState {
    pub fields: Vec<String>,
    pub filters: Vec<String>,
    pub order_by: Vec<OrderKey>,
    pub limit: usize,
    pub offset: usize,
    pub sources: Option<Source>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: DEFAULT_LIMIT,
            offset: 0,
            sources: None,
        }
    }
}

/// Handle returned by [`QueryState::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener<B> = Box<dyn FnMut(&QueryState<B>)>;

/// The current query and its page of results, over a [`Backend`].
///
/// Mutators return `Result<&mut Self>` so they chain with `and_then`.
pub struct QueryState<B: Backend = PolarsBackend> {
    cache: ResultCache<B>,
    options: QueryOptions,

    source: Option<Source>,
    /// FROM expression and the existing files it was built from.
    from: Option<(Vec<PathBuf>, String)>,
    fields: Vec<String>,
    filters: Vec<String>,
    order_by: Vec<OrderKey>,
    limit: usize,
    offset: usize,

    current_page: usize,
    page_count: usize,
    row_count: usize,
    page: ResultPage,

    listeners: Vec<(SubscriptionId, Listener<B>)>,
    next_subscription: u64,
    /// While set, mutators only record state; see [`QueryState::batch`].
    muted: bool,
    dirty: bool,
    generation: u64,
}

impl<B: Backend> std::fmt::Debug for QueryState<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryState").finish_non_exhaustive()
    }
}

impl QueryState<PolarsBackend> {
    /// Query state over a fresh [`PolarsBackend`].
    pub fn polars(options: QueryOptions) -> Result<Self> {
        Self::with_options(PolarsBackend::new(), options)
    }
}

impl<B: Backend> QueryState<B> {
    pub fn new(backend: B) -> Self {
        let options = QueryOptions::default();
        Self {
            cache: ResultCache::new(backend).with_enabled(options.cache_results),
            options,
            source: None,
            from: None,
            fields: Vec::new(),
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: options.default_limit,
            offset: 0,
            current_page: 1,
            page_count: 1,
            row_count: 0,
            page: ResultPage::default(),
            listeners: Vec::new(),
            next_subscription: 0,
            muted: false,
            dirty: false,
            generation: 0,
        }
    }

    pub fn with_options(backend: B, options: QueryOptions) -> Result<Self> {
        if options.default_limit == 0 {
            return Err(QueryError::InvalidLimit(0));
        }
        let mut state = Self::new(backend);
        state.cache = state.cache.with_enabled(options.cache_results);
        state.options = options;
        state.limit = options.default_limit;
        Ok(state)
    }

    /// Back to the state of a freshly created query, keeping source, listeners and cache.
    fn reset_query(&mut self) {
        self.fields.clear();
        self.filters.clear();
        self.order_by.clear();
        self.limit = self.options.default_limit;
        self.offset = 0;
        self.current_page = 1;
        self.clear_result();
    }

    fn clear_result(&mut self) {
        self.row_count = 0;
        self.page_count = 1;
        self.current_page = 1;
        self.offset = 0;
        self.page = ResultPage::default();
    }

    // ---- notifications ----

    /// Call `listener` after every change. Listeners only get a shared
    /// reference, so they cannot start another mutation while one is in flight.
    pub fn subscribe<F>(&mut self, listener: F) -> SubscriptionId
    where
        F: FnMut(&QueryState<B>) + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(lid, _)| *lid != id);
        self.listeners.len() != before
    }

    /// Bumped once per change notification.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn notify(&mut self) {
        if self.muted {
            return;
        }
        self.generation += 1;
        let mut listeners = std::mem::take(&mut self.listeners);
        for (_, listener) in listeners.iter_mut() {
            listener(self);
        }
        self.listeners = listeners;
    }

    /// Stop re-running the query and notifying on changes until [`QueryState::unmute`].
    pub fn mute(&mut self) -> &mut Self {
        self.muted = true;
        self
    }

    /// Resume normal behavior. Does not re-run anything by itself.
    pub fn unmute(&mut self) -> &mut Self {
        self.muted = false;
        self
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Apply several mutations, then re-run the query and notify once.
    ///
    /// If `f` fails partway, the mutations it already made stay applied and are
    /// still run and notified before the error is returned, so the result
    /// always matches the recorded state.
    pub fn batch<F>(&mut self, f: F) -> Result<&mut Self>
    where
        F: FnOnce(&mut Self) -> Result<()>,
    {
        let was_muted = self.muted;
        self.muted = true;
        let outcome = f(self);
        self.muted = was_muted;
        let needs_run = !was_muted && self.dirty;
        match outcome {
            Ok(()) if needs_run => self.recompute(),
            Ok(()) => Ok(self),
            Err(e) => {
                if needs_run {
                    if let Err(run_err) = self.recompute() {
                        warn!(error = %run_err, "re-running query after failed batch");
                    }
                }
                Err(e)
            }
        }
    }

    fn changed(&mut self) -> Result<&mut Self> {
        if self.muted {
            self.dirty = true;
            return Ok(self);
        }
        self.recompute()
    }

    // ---- source ----

    /// Switch to a new source. Fields, filters, sorting and paging start over.
    pub fn set_sources(&mut self, source: Source) -> Result<&mut Self> {
        info!(?source, "source changed");
        self.reset_query();
        self.source = Some(source);
        self.from = None;
        self.changed()
    }

    pub fn clear_sources(&mut self) -> Result<&mut Self> {
        self.reset_query();
        self.source = None;
        self.from = None;
        self.changed()
    }

    pub fn source(&self) -> Option<&Source> {
        self.source.as_ref()
    }

    /// FROM expression for the current source, or `None` when there is nothing
    /// readable to query. Missing files of a file set are skipped.
    fn readable_from(&mut self) -> Result<Option<String>> {
        let Some(source) = &self.source else {
            return Ok(None);
        };
        let (readable, effective) = match source {
            Source::Files(paths) => {
                let existing: Vec<PathBuf> = paths.iter().filter(|p| p.exists()).cloned().collect();
                if existing.is_empty() {
                    debug!("none of the source files exist");
                    return Ok(None);
                }
                if existing.len() < paths.len() {
                    for missing in paths.iter().filter(|p| !p.exists()) {
                        warn!(path = %missing.display(), "skipping missing source file");
                    }
                }
                (existing.clone(), Source::Files(existing))
            }
            Source::Table(name) => {
                if !self.cache.backend().tables().iter().any(|t| t == name) {
                    debug!(table = %name, "source table is not registered");
                    return Ok(None);
                }
                (Vec::new(), source.clone())
            }
        };
        if let Some((paths, expr)) = &self.from {
            if *paths == readable {
                return Ok(Some(expr.clone()));
            }
        }
        let expr = self.cache.backend_mut().source_expr(&effective)?;
        // The backend may reuse one table name for different file sets.
        self.cache.clear();
        self.from = Some((readable, expr.clone()));
        Ok(Some(expr))
    }

    // ---- fields ----

    pub fn add_field(&mut self, name: impl Into<String>) -> Result<&mut Self> {
        self.fields.push(name.into());
        self.changed()
    }

    /// Removing a field that is not selected does nothing.
    pub fn remove_field(&mut self, name: &str) -> Result<&mut Self> {
        match self.fields.iter().position(|f| f == name) {
            Some(i) => {
                self.fields.remove(i);
                self.changed()
            }
            None => Ok(self),
        }
    }

    /// Move `name` to `index` (past the end means last). Unknown names do nothing.
    pub fn move_field(&mut self, name: &str, index: usize) -> Result<&mut Self> {
        match self.fields.iter().position(|f| f == name) {
            Some(i) => {
                let field = self.fields.remove(i);
                let index = index.min(self.fields.len());
                self.fields.insert(index, field);
                self.changed()
            }
            None => Ok(self),
        }
    }

    pub fn set_fields(&mut self, fields: Vec<String>) -> Result<&mut Self> {
        self.fields = fields;
        self.changed()
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    // ---- filters / ordering ----

    /// Replace the WHERE clauses. They are used as given and joined with AND.
    pub fn set_filter_clauses(&mut self, filters: Vec<String>) -> Result<&mut Self> {
        self.filters = filters;
        self.changed()
    }

    pub fn filters(&self) -> &[String] {
        &self.filters
    }

    pub fn set_order_by(&mut self, order_by: Vec<OrderKey>) -> Result<&mut Self> {
        self.order_by = order_by;
        self.changed()
    }

    pub fn order_by(&self) -> &[OrderKey] {
        &self.order_by
    }

    // ---- paging ----

    /// Rows per page. Zero is rejected and leaves the state untouched.
    pub fn set_limit(&mut self, limit: usize) -> Result<&mut Self> {
        if limit == 0 {
            return Err(QueryError::InvalidLimit(limit));
        }
        self.limit = limit;
        self.offset = offset_for_page(self.current_page, limit);
        self.changed()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Jump to the page containing row `offset`. The offset snaps to the start of that page.
    pub fn set_offset(&mut self, offset: usize) -> Result<&mut Self> {
        self.current_page = page_for_offset(offset, self.limit);
        self.offset = offset_for_page(self.current_page, self.limit);
        self.changed()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Go to `page` (1-indexed). Pages past the end are clamped when the query runs.
    pub fn set_page(&mut self, page: usize) -> Result<&mut Self> {
        self.current_page = page.max(1);
        self.offset = offset_for_page(self.current_page, self.limit);
        self.changed()
    }

    pub fn first_page(&mut self) -> Result<&mut Self> {
        self.set_page(1)
    }

    pub fn previous_page(&mut self) -> Result<&mut Self> {
        if self.current_page > 1 {
            self.set_page(self.current_page - 1)
        } else {
            Ok(self)
        }
    }

    pub fn next_page(&mut self) -> Result<&mut Self> {
        if self.current_page < self.page_count {
            self.set_page(self.current_page + 1)
        } else {
            Ok(self)
        }
    }

    pub fn last_page(&mut self) -> Result<&mut Self> {
        self.set_page(self.page_count)
    }

    pub fn page(&self) -> usize {
        self.current_page
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    // ---- results ----

    pub fn header(&self) -> &[String] {
        &self.page.header
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.page.rows
    }

    pub fn result(&self) -> &ResultPage {
        &self.page
    }

    fn selection(&self) -> Selection<'_> {
        Selection {
            fields: &self.fields,
            filters: &self.filters,
            order_by: &self.order_by,
            limit: self.limit,
            offset: self.offset,
        }
    }

    /// Selection query for the current state, once the source has been resolved.
    pub fn select_query(&self) -> Option<String> {
        self.from
            .as_ref()
            .map(|(_, from)| sql::select_query(from, &self.selection()))
    }

    /// Count query for the current state, once the source has been resolved.
    pub fn count_query(&self) -> Option<String> {
        self.from
            .as_ref()
            .map(|(_, from)| sql::count_query(from, &self.filters))
    }

    /// Re-run the query for the current state and notify subscribers.
    ///
    /// The count runs first so an out-of-range page is clamped before the page
    /// itself is fetched; the selection query then runs exactly once.
    pub fn recompute(&mut self) -> Result<&mut Self> {
        self.refresh()?;
        self.notify();
        Ok(self)
    }

    fn refresh(&mut self) -> Result<()> {
        self.dirty = false;
        if self.options.track_source_mtime {
            if let Some(source) = &self.source {
                if self.cache.revalidate(SourceStamp::of(source)) {
                    // Rescan so the backend does not keep stale file metadata.
                    self.from = None;
                }
            }
        }
        let Some(from) = self.readable_from()? else {
            self.clear_result();
            return Ok(());
        };

        let count_sql = sql::count_query(&from, &self.filters);
        let counted = self.cache.cached_execute(&count_sql)?;
        let row_count = counted
            .column(COUNT_COLUMN)
            .ok()
            .filter(|_| counted.height() > 0)
            .and_then(|c| c.get(0).ok())
            .and_then(|v| v.extract::<usize>())
            .ok_or(QueryError::MissingCount)?;

        if row_count == 0 {
            self.clear_result();
            return Ok(());
        }

        self.row_count = row_count;
        self.page_count = page_count(row_count, self.limit);
        let clamped = clamp_page(self.current_page, self.page_count);
        if clamped != self.current_page {
            debug!(
                requested = self.current_page,
                page = clamped,
                "page out of range, clamping"
            );
            self.current_page = clamped;
            self.offset = offset_for_page(clamped, self.limit);
        }

        let select_sql = sql::select_query(&from, &self.selection());
        let selected = self.cache.cached_execute(&select_sql)?;
        self.page = ResultPage::from_frame(&selected)?;
        Ok(())
    }

    /// Column names of the source, whether selected or not.
    pub fn available_columns(&mut self) -> Result<Vec<String>> {
        let Some(from) = self.readable_from()? else {
            return Ok(Vec::new());
        };
        let df = self.cache.cached_execute(&sql::columns_query(&from))?;
        Ok(df
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect())
    }

    /// Tables the backend can query as a [`Source::Table`].
    pub fn tables(&self) -> Vec<String> {
        self.cache.backend().tables()
    }

    pub fn cache(&self) -> &ResultCache<B> {
        &self.cache
    }

    pub fn backend_mut(&mut self) -> &mut B {
        self.cache.backend_mut()
    }

    // ---- persistence ----

    pub fn to_dict(&self) -> SessionState {
        SessionState {
            fields: self.fields.clone(),
            filters: self.filters.clone(),
            order_by: self.order_by.clone(),
            limit: self.limit,
            offset: self.offset,
            sources: self.source.clone(),
        }
    }

    /// Restore a saved query and run it once.
    pub fn from_dict(&mut self, state: SessionState) -> Result<&mut Self> {
        if state.limit == 0 {
            return Err(QueryError::InvalidLimit(0));
        }
        if self.source != state.sources {
            self.from = None;
        }
        self.fields = state.fields;
        self.filters = state.filters;
        self.order_by = state.order_by;
        self.limit = state.limit;
        self.current_page = page_for_offset(state.offset, state.limit);
        self.offset = offset_for_page(self.current_page, state.limit);
        self.source = state.sources;
        self.changed()
    }
}
