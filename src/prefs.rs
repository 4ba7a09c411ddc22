//! User preferences document (`prefs.json` in the config directory).
//!
//! A flat JSON object. Saving merges the given keys over what is already on
//! disk so independent parts of the application can each own their keys.

use color_eyre::eyre::eyre;
use color_eyre::Result;
use fs2::FileExt;
use serde_json::{Map, Value};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::config::ConfigManager;
use crate::query_state::SessionState;

const PREFS_FILE: &str = "prefs.json";

/// Key under which the last query is stored.
pub const SESSION_KEY: &str = "query";

pub struct PrefsStore {
    config: ConfigManager,
    path: PathBuf,
}

impl PrefsStore {
    pub fn new(config: ConfigManager) -> Self {
        let path = config.config_path(PREFS_FILE);
        Self { config, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Everything saved so far. A missing file is an empty document.
    pub fn load_prefs(&self) -> Result<Map<String, Value>> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let content = fs::read_to_string(&self.path)?;
        match serde_json::from_str::<Value>(&content)? {
            Value::Object(map) => Ok(map),
            other => Err(eyre!(
                "Preferences at {} must be a JSON object, found {}",
                self.path.display(),
                json_kind(&other)
            )),
        }
    }

    /// Merge `prefs` over the stored document and write it back.
    pub fn save_prefs(&self, prefs: Map<String, Value>) -> Result<()> {
        let mut merged = match self.load_prefs() {
            Ok(existing) => existing,
            Err(e) => {
                warn!(error = %e, "replacing unreadable preferences file");
                Map::new()
            }
        };
        merged.extend(prefs);

        self.config.ensure_config_dir()?;
        let json = serde_json::to_string_pretty(&Value::Object(merged))?;

        let mut file = fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.path)?;

        file.lock_exclusive()?;
        file.write_all(json.as_bytes())?;
        file.flush()?;
        FileExt::unlock(&file)?;

        Ok(())
    }

    /// The query saved by [`PrefsStore::save_session`], if any.
    pub fn load_session(&self) -> Result<Option<SessionState>> {
        let mut prefs = self.load_prefs()?;
        match prefs.remove(SESSION_KEY) {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub fn save_session(&self, session: &SessionState) -> Result<()> {
        let mut prefs = Map::new();
        prefs.insert(SESSION_KEY.to_string(), serde_json::to_value(session)?);
        self.save_prefs(prefs)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::{OrderKey, Source};
    use serde_json::json;

    fn store() -> (tempfile::TempDir, PrefsStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = PrefsStore::new(ConfigManager::with_dir(dir.path().join("parqview")));
        (dir, store)
    }

    #[test]
    fn test_missing_file_is_empty() {
        let (_dir, store) = store();
        assert!(store.load_prefs().unwrap().is_empty());
        assert!(store.load_session().unwrap().is_none());
    }

    #[test]
    fn test_save_merges_keys() {
        let (_dir, store) = store();
        let mut a = Map::new();
        a.insert("window".into(), json!({"w": 800}));
        store.save_prefs(a).unwrap();

        let mut b = Map::new();
        b.insert("theme".into(), json!("dark"));
        store.save_prefs(b).unwrap();

        let prefs = store.load_prefs().unwrap();
        assert_eq!(prefs["window"], json!({"w": 800}));
        assert_eq!(prefs["theme"], json!("dark"));
    }

    #[test]
    fn test_session_round_trip() {
        let (_dir, store) = store();
        let session = SessionState {
            fields: vec!["a".into()],
            filters: vec!["a > 1".into()],
            order_by: vec![OrderKey::desc("a")],
            limit: 25,
            offset: 50,
            sources: Some(Source::files(["/data/x.parquet"])),
        };
        store.save_session(&session).unwrap();
        assert_eq!(store.load_session().unwrap(), Some(session));
    }

    #[test]
    fn test_non_object_document_is_an_error() {
        let (_dir, store) = store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), "[1, 2]").unwrap();
        let err = store.load_prefs().unwrap_err();
        assert!(err.to_string().contains("an array"));
    }
}
