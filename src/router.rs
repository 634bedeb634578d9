//! Animation trigger routing.
//!
//! A trigger (animation selection or intro) fans out to an optional audio
//! playlist and an optional caption record. Both lookups are independent and
//! misses are `None`, never errors: the viewer must stay usable regardless of
//! missing content data.

use crate::catalog::{AudioMap, DialogRecord, DialogTable};
use crate::playlist::Playlist;

#[derive(Clone, Debug, Default)]
pub struct TriggerRouter {
    audio: AudioMap,
    dialogs: DialogTable,
}

impl TriggerRouter {
    pub fn new(audio: AudioMap, dialogs: DialogTable) -> Self {
        Self { audio, dialogs }
    }

    /// Playlist for an animation trigger, built by substituting the model's
    /// audio-name prefix into each templated reference.
    pub fn playlist_for(&self, audio_prefix: &str, animation: &str) -> Option<Playlist> {
        self.audio
            .templates(animation)
            .map(|templates| Playlist::from_templates(templates, audio_prefix))
    }

    /// Caption record for a (model, animation) trigger.
    pub fn dialog_for(&self, model: &str, animation: &str) -> Option<&DialogRecord> {
        self.dialogs.get(model, animation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn router() -> TriggerRouter {
        let mut audio = BTreeMap::new();
        audio.insert(
            "Talk_01_A".to_owned(),
            vec![
                "{prefix}_talk_1_1.ogg".to_owned(),
                "{prefix}_talk_1.ogg".to_owned(),
            ],
        );
        let mut by_anim = BTreeMap::new();
        by_anim.insert(
            "Talk_01_A".to_owned(),
            DialogRecord {
                text: "hi there".to_owned(),
                display_ms: 2500,
            },
        );
        let mut dialogs = BTreeMap::new();
        dialogs.insert("Hero_home".to_owned(), by_anim);
        TriggerRouter::new(AudioMap(audio), DialogTable(dialogs))
    }

    #[test]
    fn playlist_substitutes_model_prefix() {
        let r = router();
        let pl = r.playlist_for("hero", "Talk_01_A").unwrap();
        assert_eq!(pl.get(0).unwrap().url, "hero_talk_1_1.ogg");
        assert_eq!(pl.get(1).unwrap().url, "hero_talk_1.ogg");
    }

    #[test]
    fn lookups_are_independent_and_miss_silently() {
        let r = router();
        assert!(r.playlist_for("hero", "Idle_01").is_none());
        assert!(r.dialog_for("Hero_home", "Idle_01").is_none());
        assert!(r.dialog_for("Hero_home", "Talk_01_A").is_some());
        assert!(r.dialog_for("Unknown", "Talk_01_A").is_none());
    }
}
