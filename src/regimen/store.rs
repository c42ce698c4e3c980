//! Regimen table persisted as one JSON document
//!
//! The document maps each regimen name to its ordered segments:
//! `{"workout": [{"name": "warmup", "duration": 300}, ...]}`

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::persist::{load_json, save_json};

/// One segment of a regimen
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerSpec {
    pub name: String,

    #[serde(rename = "duration")]
    pub duration_seconds: u64,
}

impl TimerSpec {
    pub fn new(name: &str, duration_seconds: u64) -> Self {
        Self {
            name: name.to_string(),
            duration_seconds,
        }
    }
}

/// Regimen name to segments, ordered by name
pub type RegimenTable = BTreeMap<String, Vec<TimerSpec>>;

/// File-backed regimen table
#[derive(Debug, Clone)]
pub struct RegimenStore {
    path: PathBuf,
}

impl RegimenStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_owned(),
        }
    }

    /// Read the table; an unreadable file counts as empty
    pub fn load(&self) -> RegimenTable {
        match load_json::<RegimenTable>(&self.path) {
            Ok(Some(table)) => table,
            Ok(None) => {
                debug!(path = ?self.path, "no saved regimens");
                RegimenTable::new()
            }
            Err(e) => {
                warn!(?e, "failed to load regimens");
                RegimenTable::new()
            }
        }
    }

    /// Insert or overwrite one regimen and save the whole table
    pub fn upsert(&self, name: &str, segments: Vec<TimerSpec>) {
        let mut table = self.load();
        table.insert(name.to_string(), segments);
        self.save(&table);
    }

    /// Remove one regimen; `false` when it was not stored
    pub fn remove(&self, name: &str) -> bool {
        let mut table = self.load();
        if table.remove(name).is_none() {
            return false;
        }

        self.save(&table);
        true
    }

    fn save(&self, table: &RegimenTable) {
        if let Err(e) = save_json(&self.path, table) {
            warn!(?e, "failed to save regimens");
        }
    }
}
