//! Content tables: model catalog, display-name remapping, dialog captions
//! and the per-animation audio map.
//!
//! Every table is optional at runtime. A missing or malformed file is logged
//! and degrades to an empty table; the viewer stays usable with whatever
//! content is present.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::foundation::error::{StagecastError, StagecastResult};

/// One row of the model catalog.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ModelEntry {
    /// Internal model name; dialog-table and rename-table keys use this.
    pub name: String,
    /// Skeletal asset reference, resolved by the model loader.
    pub url: String,
    /// Optional intro trigger fired shortly after the model loads.
    #[serde(default)]
    pub intro: Option<IntroSpec>,
}

impl ModelEntry {
    pub fn validate(&self) -> StagecastResult<()> {
        if self.name.trim().is_empty() {
            return Err(StagecastError::validation("model entry name must be non-empty"));
        }
        if self.url.trim().is_empty() {
            return Err(StagecastError::validation(format!(
                "model entry '{}' has an empty url",
                self.name
            )));
        }
        if let Some(intro) = &self.intro {
            intro.validate()?;
        }
        Ok(())
    }
}

/// Model-specific intro playback: scene tag, delay after load, clip count.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct IntroSpec {
    pub scene: String,
    pub delay_ms: u64,
    pub clips: u32,
}

impl IntroSpec {
    pub fn validate(&self) -> StagecastResult<()> {
        if self.scene.trim().is_empty() {
            return Err(StagecastError::validation("intro scene must be non-empty"));
        }
        Ok(())
    }
}

/// Display-name remapping row, with an optional audio-prefix override.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RenameEntry {
    pub display: String,
    #[serde(default)]
    pub audio_prefix: Option<String>,
}

/// Internal name -> [`RenameEntry`]. Unmapped names fall through unchanged.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct RenameTable(pub BTreeMap<String, RenameEntry>);

impl RenameTable {
    pub fn display_name(&self, internal: &str) -> String {
        self.0
            .get(internal)
            .map(|e| e.display.clone())
            .unwrap_or_else(|| internal.to_owned())
    }

    /// Audio-name prefix for a model: the override when present, otherwise
    /// the internal name itself.
    pub fn audio_prefix(&self, internal: &str) -> String {
        self.0
            .get(internal)
            .and_then(|e| e.audio_prefix.clone())
            .unwrap_or_else(|| internal.to_owned())
    }
}

/// Caption record shown when a matching (model, animation) trigger fires.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DialogRecord {
    pub text: String,
    pub display_ms: u64,
}

/// Model name -> animation name -> caption record.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct DialogTable(pub BTreeMap<String, BTreeMap<String, DialogRecord>>);

impl DialogTable {
    pub fn get(&self, model: &str, animation: &str) -> Option<&DialogRecord> {
        self.0.get(model)?.get(animation)
    }
}

/// Animation name -> ordered templated clip references.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct AudioMap(pub BTreeMap<String, Vec<String>>);

impl AudioMap {
    pub fn templates(&self, animation: &str) -> Option<&[String]> {
        self.0.get(animation).map(Vec::as_slice)
    }
}

/// All content tables for one deployment.
#[derive(Clone, Debug, Default)]
pub struct ContentPack {
    pub models: Vec<ModelEntry>,
    pub renames: RenameTable,
    pub dialogs: DialogTable,
    pub audio: AudioMap,
}

impl ContentPack {
    /// Load the standard table files from `dir`. Missing files are normal;
    /// malformed files are logged and skipped.
    pub fn load_dir(dir: &Path) -> Self {
        Self {
            models: load_table(&dir.join("models.json"), "model catalog").unwrap_or_default(),
            renames: load_table(&dir.join("renames.json"), "rename table").unwrap_or_default(),
            dialogs: load_table(&dir.join("dialogs.json"), "dialog table").unwrap_or_default(),
            audio: load_table(&dir.join("audio_map.json"), "audio map").unwrap_or_default(),
        }
    }

    pub fn find_model(&self, name: &str) -> Option<&ModelEntry> {
        self.models.iter().find(|m| m.name == name)
    }
}

fn load_table<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> Option<T> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), what, "content table absent");
        return None;
    }
    let open = File::open(path);
    let parsed = open.map_err(|e| e.to_string()).and_then(|f| {
        serde_json::from_reader::<_, T>(BufReader::new(f)).map_err(|e| e.to_string())
    });
    match parsed {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!(path = %path.display(), what, error = %e, "failed to load content table; continuing without it");
            None
        }
    }
}
