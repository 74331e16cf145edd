//! The JSON data file the CLI operates on, and the config file.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use bizflow_model::{OwnerId, Record};
use bizflow_storage::MemoryBackend;
use bizflow_view::{Config, SegmentBook};

pub(crate) const DEFAULT_CONFIG: &str = "bizflow.toml";

/// On-disk state: every owner's records plus their saved segments.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct DataFile {
    #[serde(default)]
    pub records: Vec<Record>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub segments: BTreeMap<OwnerId, SegmentBook>,
}

impl DataFile {
    /// A missing file is an empty data set.
    pub fn load(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("error reading file '{}': {}", path.display(), e))?;
        serde_json::from_str(&text)
            .map_err(|e| format!("error parsing JSON in '{}': {}", path.display(), e))
    }

    pub fn save(&self, path: &Path) -> Result<(), String> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| format!("serialization error: {}", e))?;
        std::fs::write(path, text + "\n")
            .map_err(|e| format!("error writing file '{}': {}", path.display(), e))
    }

    /// Seed an in-memory backend with every record.
    pub fn backend(&self) -> MemoryBackend {
        MemoryBackend::with_records(self.records.iter().cloned())
    }

    /// Replace the records with the backend's current contents.
    pub async fn absorb(&mut self, backend: &MemoryBackend) {
        self.records = backend.snapshot().await;
    }
}

/// Load `path`, or `bizflow.toml` in the working directory when no path was
/// given and one exists; defaults otherwise.
pub(crate) fn load_config(path: Option<&Path>) -> Result<Config, String> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let default = Path::new(DEFAULT_CONFIG);
            if !default.exists() {
                return Ok(Config::default());
            }
            default.to_path_buf()
        }
    };
    let text = std::fs::read_to_string(&path)
        .map_err(|e| format!("error reading config '{}': {}", path.display(), e))?;
    Config::from_toml_str(&text).map_err(|e| format!("invalid config '{}': {}", path.display(), e))
}
