use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::{AudioProfile, VideoEncoderConfig};

/// Linear volume above which a stream counts as speaking.
pub const VOLUME_SPEAKING_THRESHOLD: i32 = 10;
/// How often the engine reports audio levels.
pub const VOLUME_SPEAKING_INTERVAL: Duration = Duration::from_millis(2000);

const ENCODER_FRAME_RATE: u32 = 15;
const ENCODER_ADAPTIVE_BITRATE: i32 = -1;

/// Capture resolutions offered to the user, portrait orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoResolution {
    #[default]
    P720,
    P540,
    P360,
    P180,
}

impl VideoResolution {
    pub const ALL: [VideoResolution; 4] = [
        VideoResolution::P720,
        VideoResolution::P540,
        VideoResolution::P360,
        VideoResolution::P180,
    ];

    pub fn label(self) -> &'static str {
        match self {
            VideoResolution::P720 => "720*1280",
            VideoResolution::P540 => "540*960",
            VideoResolution::P360 => "360*640",
            VideoResolution::P180 => "180*320",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.label() == label)
    }

    /// (width, height)
    pub fn size(self) -> (u32, u32) {
        match self {
            VideoResolution::P720 => (720, 1280),
            VideoResolution::P540 => (540, 960),
            VideoResolution::P360 => (360, 640),
            VideoResolution::P180 => (180, 320),
        }
    }

    pub fn encoder_config(self) -> VideoEncoderConfig {
        let (width, height) = self.size();
        VideoEncoderConfig {
            width,
            height,
            frame_rate: ENCODER_FRAME_RATE,
            max_bitrate: ENCODER_ADAPTIVE_BITRATE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioQuality {
    Clarity,
    #[default]
    HighDefinition,
    Extreme,
}

impl AudioQuality {
    pub const ALL: [AudioQuality; 3] = [
        AudioQuality::Clarity,
        AudioQuality::HighDefinition,
        AudioQuality::Extreme,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AudioQuality::Clarity => "clarity",
            AudioQuality::HighDefinition => "high_definition",
            AudioQuality::Extreme => "extreme",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|q| q.label() == label)
    }

    pub fn profile(self) -> AudioProfile {
        match self {
            AudioQuality::Clarity => AudioProfile::Fluent,
            AudioQuality::HighDefinition => AudioProfile::Standard,
            AudioQuality::Extreme => AudioProfile::Hd,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CallSettings {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default = "default_true")]
    pub camera_enabled_on_join: bool,
    #[serde(default = "default_true")]
    pub mic_enabled_on_join: bool,
    #[serde(default = "default_true")]
    pub speakerphone: bool,
    #[serde(default = "default_true")]
    pub mirror: bool,
    #[serde(default = "default_resolution")]
    pub resolution: String,
    #[serde(default = "default_audio_quality")]
    pub audio_quality: String,
}

fn default_true() -> bool {
    true
}

fn default_resolution() -> String {
    VideoResolution::default().label().to_string()
}

fn default_audio_quality() -> String {
    AudioQuality::default().label().to_string()
}

impl Default for CallSettings {
    fn default() -> Self {
        Self {
            display_name: None,
            device_id: None,
            camera_enabled_on_join: true,
            mic_enabled_on_join: true,
            speakerphone: true,
            mirror: true,
            resolution: default_resolution(),
            audio_quality: default_audio_quality(),
        }
    }
}

pub struct SettingsStore {
    settings: Mutex<CallSettings>,
    /// Serializes writers so the newest snapshot is written last.
    write: Mutex<()>,
    file_path: PathBuf,
}

impl SettingsStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let file_path = data_dir.as_ref().join("settings.json");
        let settings = Self::load(&file_path);
        Self {
            settings: Mutex::new(settings),
            write: Mutex::new(()),
            file_path,
        }
    }

    pub fn get(&self) -> CallSettings {
        self.lock().clone()
    }

    /// The persisted device id, generated on first use.
    pub fn device_id(&self) -> String {
        let mut settings = self.lock();
        if let Some(id) = settings.device_id.clone() {
            return id;
        }
        let id = uuid::Uuid::new_v4().to_string();
        settings.device_id = Some(id.clone());
        drop(settings);
        self.save();
        id
    }

    pub fn set_display_name(&self, name: Option<String>) {
        self.update(|s| s.display_name = name);
        self.save();
    }

    pub fn set_camera_enabled_on_join(&self, enabled: bool) {
        self.update(|s| s.camera_enabled_on_join = enabled);
        self.save();
    }

    pub fn set_mic_enabled_on_join(&self, enabled: bool) {
        self.update(|s| s.mic_enabled_on_join = enabled);
        self.save();
    }

    pub fn set_resolution(&self, resolution: VideoResolution) {
        self.update(|s| s.resolution = resolution.label().to_string());
        self.save();
    }

    pub fn set_audio_quality(&self, quality: AudioQuality) {
        self.update(|s| s.audio_quality = quality.label().to_string());
        self.save();
    }

    pub fn set_mirror(&self, mirror: bool) {
        self.update(|s| s.mirror = mirror);
        self.save();
    }

    /// Change the in-memory settings without touching the disk.
    pub fn update(&self, change: impl FnOnce(&mut CallSettings)) {
        change(&mut self.lock());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CallSettings> {
        self.settings
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Write the current settings to disk. Blocks on file I/O.
    pub fn save(&self) {
        let _write = self
            .write
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let settings = self.get();
        if let Some(parent) = self.file_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match serde_json::to_string_pretty(&settings) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.file_path, json) {
                    tracing::warn!("failed to write {}: {e}", self.file_path.display());
                }
            }
            Err(e) => tracing::warn!("failed to serialize settings: {e}"),
        }
    }

    fn load(path: &Path) -> CallSettings {
        match std::fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("ignoring corrupt settings file {}: {e}", path.display());
                CallSettings::default()
            }),
            Err(_) => CallSettings::default(),
        }
    }
}
