//! The skeletal-animation asset boundary.
//!
//! The animation runtime itself is an external collaborator; the viewer only
//! needs what the asset *reports*: named animations with durations, named
//! skins, and native dimensions for fit-to-frame scaling.

use std::path::PathBuf;

use anyhow::Context as _;

use crate::foundation::core::Millis;
use crate::foundation::error::{StagecastError, StagecastResult};

/// One named animation and its native playback duration.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AnimationInfo {
    pub name: String,
    #[serde(rename = "duration_ms")]
    pub duration: Millis,
}

/// What a loaded skeletal asset exposes to the viewer.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ModelAsset {
    pub name: String,
    /// Native model width in pixels.
    pub width: f64,
    /// Native model height in pixels.
    pub height: f64,
    pub animations: Vec<AnimationInfo>,
    #[serde(default)]
    pub skins: Vec<String>,
}

impl ModelAsset {
    pub fn validate(&self) -> StagecastResult<()> {
        if !(self.width.is_finite() && self.width > 0.0)
            || !(self.height.is_finite() && self.height > 0.0)
        {
            return Err(StagecastError::validation(format!(
                "model '{}' must report positive finite dimensions",
                self.name
            )));
        }
        for anim in &self.animations {
            if anim.name.trim().is_empty() {
                return Err(StagecastError::validation(format!(
                    "model '{}' has an animation with an empty name",
                    self.name
                )));
            }
        }
        Ok(())
    }

    pub fn animation(&self, name: &str) -> Option<&AnimationInfo> {
        self.animations.iter().find(|a| a.name == name)
    }

    /// Native duration of a named animation, if the asset has it.
    pub fn animation_duration(&self, name: &str) -> Option<Millis> {
        self.animation(name).map(|a| a.duration)
    }

    pub fn has_skin(&self, name: &str) -> bool {
        self.skins.iter().any(|s| s == name)
    }
}

/// Loads a skeletal asset from a catalog url.
pub trait ModelLoader {
    fn load(&mut self, url: &str) -> StagecastResult<ModelAsset>;
}

/// Reference loader: reads the asset sidecar JSON relative to a content root.
#[derive(Clone, Debug)]
pub struct JsonModelLoader {
    root: PathBuf,
}

impl JsonModelLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ModelLoader for JsonModelLoader {
    fn load(&mut self, url: &str) -> StagecastResult<ModelAsset> {
        let path = self.root.join(url);
        let f = std::fs::File::open(&path)
            .with_context(|| format!("open model asset '{}'", path.display()))?;
        let asset: ModelAsset = serde_json::from_reader(std::io::BufReader::new(f))
            .map_err(|e| StagecastError::serde(format!("parse model asset '{url}': {e}")))?;
        Ok(asset)
    }
}
