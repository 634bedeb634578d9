//! Clips and playlists.
//!
//! A playlist is the ordered set of voice lines bound to one logical trigger
//! (an animation selection or a model intro). Lists are consumed front to
//! back by the sequencer and never shared between sequencer runs.

/// Placeholder substituted with the model's audio-name prefix when a playlist
/// is built from the audio map's templated file references.
pub const PREFIX_TOKEN: &str = "{prefix}";

/// Extension used by the intro-clip naming convention.
pub const INTRO_CLIP_EXT: &str = "ogg";

/// A single playable audio resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Clip {
    /// Resource reference (path or URL), resolved by the audio backend.
    pub url: String,
}

/// Ordered list of clips for one trigger.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Playlist {
    clips: Vec<Clip>,
}

impl Playlist {
    pub fn new(clips: Vec<Clip>) -> Self {
        Self { clips }
    }

    /// Build a playlist from templated file references, substituting
    /// [`PREFIX_TOKEN`] with the model's audio-name prefix. Declared order is
    /// preserved exactly.
    pub fn from_templates(templates: &[String], audio_prefix: &str) -> Self {
        Self {
            clips: templates
                .iter()
                .map(|t| Clip {
                    url: t.replace(PREFIX_TOKEN, audio_prefix),
                })
                .collect(),
        }
    }

    /// Build an intro playlist from the fixed naming convention
    /// `<prefix>_<scene>_NN.<ext>` (1-based, zero-padded).
    pub fn intro(audio_prefix: &str, scene: &str, clips: u32) -> Self {
        Self {
            clips: (1..=clips)
                .map(|i| Clip {
                    url: format!("{audio_prefix}_{scene}_{i:02}.{INTRO_CLIP_EXT}"),
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Clip> {
        self.clips.get(index)
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }
}
