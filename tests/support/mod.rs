//! Scripted backends and fixtures shared by the integration suites.
#![allow(dead_code)]

use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use stagecast::{
    AnimationInfo, AudioMap, AudioPlayer, Backends, Clip, ClipStarted, ContentPack, DiagEvent,
    DialogRecord, DialogTable, FrameSource, InMemoryRecorderBackend, IntroSpec, Millis, ModelAsset,
    ModelEntry, ModelLoader, Recorder, RecorderBackend, RecorderSpec, RenameEntry, RenameTable,
    SeqSlot, SolidSurfaceBackend, StagecastError, StagecastResult, SurfaceBackend, SurfaceSpec,
    ViewerSession, ViewerSessionOpts,
};

/// Audio player driven entirely by a script: per-url durations and a set of
/// urls that refuse to start.
pub struct ScriptedAudioPlayer {
    pub default_duration: Millis,
    pub durations: BTreeMap<String, Millis>,
    pub fail_urls: BTreeSet<String>,
}

impl ScriptedAudioPlayer {
    pub fn new(default_ms: u64) -> Self {
        Self {
            default_duration: Millis(default_ms),
            durations: BTreeMap::new(),
            fail_urls: BTreeSet::new(),
        }
    }

    pub fn failing(mut self, urls: &[&str]) -> Self {
        self.fail_urls = urls.iter().map(|u| (*u).to_owned()).collect();
        self
    }
}

impl AudioPlayer for ScriptedAudioPlayer {
    fn start(&mut self, clip: &Clip) -> StagecastResult<ClipStarted> {
        if self.fail_urls.contains(&clip.url) {
            return Err(StagecastError::playback("autoplay blocked"));
        }
        let duration = self
            .durations
            .get(&clip.url)
            .copied()
            .unwrap_or(self.default_duration);
        Ok(ClipStarted { duration })
    }
}

/// Loader serving assets from memory, keyed by catalog url.
pub struct StaticModelLoader {
    pub assets: BTreeMap<String, ModelAsset>,
}

impl ModelLoader for StaticModelLoader {
    fn load(&mut self, url: &str) -> StagecastResult<ModelAsset> {
        self.assets
            .get(url)
            .cloned()
            .ok_or_else(|| StagecastError::validation(format!("unknown asset url '{url}'")))
    }
}

pub struct CountingSurfaceBackend {
    pub inner: SolidSurfaceBackend,
    pub opened: Rc<Cell<usize>>,
}

impl SurfaceBackend for CountingSurfaceBackend {
    fn open(
        &mut self,
        model: &ModelAsset,
        spec: &SurfaceSpec,
    ) -> StagecastResult<Box<dyn FrameSource>> {
        self.opened.set(self.opened.get() + 1);
        self.inner.open(model, spec)
    }
}

pub struct CountingRecorderBackend {
    pub inner: InMemoryRecorderBackend,
    pub opened: Rc<Cell<usize>>,
}

impl RecorderBackend for CountingRecorderBackend {
    fn open(&mut self, spec: &RecorderSpec) -> StagecastResult<Box<dyn Recorder>> {
        self.opened.set(self.opened.get() + 1);
        self.inner.open(spec)
    }
}

/// Backend standing in for a runtime without media capture support.
pub struct UnsupportedRecorderBackend;

impl RecorderBackend for UnsupportedRecorderBackend {
    fn open(&mut self, _spec: &RecorderSpec) -> StagecastResult<Box<dyn Recorder>> {
        Err(StagecastError::capture(
            "media capture is not supported on this runtime",
        ))
    }
}

pub fn hero_asset() -> ModelAsset {
    ModelAsset {
        name: "Hero_home".to_owned(),
        width: 950.0,
        height: 1080.0,
        animations: vec![
            AnimationInfo {
                name: "Idle_01".to_owned(),
                duration: Millis(4330),
            },
            AnimationInfo {
                name: "Talk_01_A".to_owned(),
                duration: Millis(6200),
            },
            AnimationInfo {
                name: "Pose_01".to_owned(),
                duration: Millis(0),
            },
        ],
        skins: vec!["default".to_owned(), "winter".to_owned()],
    }
}

pub fn rival_asset() -> ModelAsset {
    ModelAsset {
        name: "Rival_base".to_owned(),
        width: 800.0,
        height: 900.0,
        animations: vec![AnimationInfo {
            name: "Idle_01".to_owned(),
            duration: Millis(2000),
        }],
        skins: vec!["default".to_owned()],
    }
}

pub fn talk_templates() -> Vec<String> {
    vec![
        "{prefix}_talk_1_1.ogg".to_owned(),
        "{prefix}_talk_1_2.ogg".to_owned(),
        "{prefix}_talk_1_3.ogg".to_owned(),
        "{prefix}_talk_1_4.ogg".to_owned(),
        "{prefix}_talk_1.ogg".to_owned(),
    ]
}

/// Catalog with two models; `hero_intro` attaches an intro trigger to the
/// hero entry.
pub fn content_pack(hero_intro: Option<IntroSpec>) -> ContentPack {
    let models = vec![
        ModelEntry {
            name: "Hero_home".to_owned(),
            url: "hero.json".to_owned(),
            intro: hero_intro,
        },
        ModelEntry {
            name: "Rival_base".to_owned(),
            url: "rival.json".to_owned(),
            intro: None,
        },
    ];

    let mut renames = BTreeMap::new();
    renames.insert(
        "Hero_home".to_owned(),
        RenameEntry {
            display: "Hero".to_owned(),
            audio_prefix: Some("hero".to_owned()),
        },
    );

    let mut hero_dialogs = BTreeMap::new();
    hero_dialogs.insert(
        "Talk_01_A".to_owned(),
        DialogRecord {
            text: "Who goes there?".to_owned(),
            display_ms: 3000,
        },
    );
    hero_dialogs.insert(
        "Idle_01".to_owned(),
        DialogRecord {
            text: "...".to_owned(),
            display_ms: 500,
        },
    );
    let mut dialogs = BTreeMap::new();
    dialogs.insert("Hero_home".to_owned(), hero_dialogs);

    let mut audio = BTreeMap::new();
    audio.insert("Talk_01_A".to_owned(), talk_templates());

    ContentPack {
        models,
        renames: RenameTable(renames),
        dialogs: DialogTable(dialogs),
        audio: AudioMap(audio),
    }
}

pub fn loader() -> Box<dyn ModelLoader> {
    let mut assets = BTreeMap::new();
    assets.insert("hero.json".to_owned(), hero_asset());
    assets.insert("rival.json".to_owned(), rival_asset());
    Box::new(StaticModelLoader { assets })
}

/// Session over scripted audio, the solid surface and the in-memory recorder.
pub fn session(pack: ContentPack, player: ScriptedAudioPlayer) -> ViewerSession {
    let backends = Backends {
        loader: loader(),
        audio: Box::new(player),
        surfaces: Box::new(SolidSurfaceBackend::default()),
        recorders: Box::new(InMemoryRecorderBackend),
    };
    ViewerSession::new(pack, backends, ViewerSessionOpts::default())
}

/// `(url, at)` for every started clip in the given slot family.
pub fn clip_starts(session: &ViewerSession, capture: bool) -> Vec<(String, u64)> {
    session
        .diagnostics()
        .iter()
        .filter_map(|e| match e {
            DiagEvent::ClipStarted { slot, url, at, .. } => {
                let is_capture = matches!(slot, SeqSlot::Capture(_));
                (is_capture == capture).then(|| (url.clone(), at.0))
            }
            _ => None,
        })
        .collect()
}

/// `(index, at)` for every swallowed start failure in the given slot family.
pub fn clip_failures(session: &ViewerSession, capture: bool) -> Vec<(usize, u64)> {
    session
        .diagnostics()
        .iter()
        .filter_map(|e| match e {
            DiagEvent::ClipStartFailed { slot, index, at, .. } => {
                let is_capture = matches!(slot, SeqSlot::Capture(_));
                (is_capture == capture).then_some((*index, at.0))
            }
            _ => None,
        })
        .collect()
}

pub fn artifact_text(data: &[u8]) -> String {
    String::from_utf8(data.to_vec()).expect("in-memory artifact is utf-8")
}
