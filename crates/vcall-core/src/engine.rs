//! The RTC engine surface the call core drives, and the callbacks it consumes.
//!
//! Media capture, transport and rendering live in the vendor engine. The
//! core only forwards instructions through [`RtcEngine`] and receives
//! [`EngineEvent`]s through an [`EngineEventSink`].

use std::time::Duration;

use serde::Deserialize;
use tokio::sync::mpsc;

use crate::render::ViewId;
use crate::room::Inbound;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaStreamType {
    Audio,
    Video,
    Both,
}

impl MediaStreamType {
    pub fn has_audio(self) -> bool {
        matches!(self, MediaStreamType::Audio | MediaStreamType::Both)
    }

    pub fn has_video(self) -> bool {
        matches!(self, MediaStreamType::Video | MediaStreamType::Both)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamIndex {
    Main,
    Screen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioRoute {
    Default,
    Headset,
    HeadsetUsb,
    HeadsetBluetooth,
    Earpiece,
    Speakerphone,
    Unknown,
}

impl AudioRoute {
    /// Any kind of headset: wired, USB or Bluetooth.
    pub fn is_headset(self) -> bool {
        matches!(
            self,
            AudioRoute::Headset | AudioRoute::HeadsetUsb | AudioRoute::HeadsetBluetooth
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraFacing {
    Front,
    Back,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorType {
    None,
    RenderAndEncoder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioProfile {
    Fluent,
    Standard,
    Hd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeautyMode {
    Whiten,
    Smooth,
    Sharpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Fill the view, cropping the frame.
    Hidden,
    /// Fit the whole frame, letterboxing.
    Fit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoCanvas {
    pub view: ViewId,
    pub render_mode: RenderMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStreamKey {
    pub room_id: String,
    pub user_id: String,
    pub index: StreamIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoEncoderConfig {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    /// `-1` lets the engine adapt the bitrate.
    pub max_bitrate: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkQuality {
    #[default]
    Unknown,
    Excellent,
    Good,
    Poor,
    Bad,
    VeryBad,
    Down,
}

impl From<i32> for NetworkQuality {
    fn from(code: i32) -> Self {
        match code {
            1 => NetworkQuality::Excellent,
            2 => NetworkQuality::Good,
            3 => NetworkQuality::Poor,
            4 => NetworkQuality::Bad,
            5 => NetworkQuality::VeryBad,
            6 => NetworkQuality::Down,
            _ => NetworkQuality::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkQualityStats {
    pub user_id: String,
    pub tx_quality: NetworkQuality,
    pub rx_quality: NetworkQuality,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalStreamStats {
    pub audio_sent_kbitrate: f32,
    pub audio_loss_rate: f32,
    pub video_sent_kbitrate: f32,
    pub video_sent_frame_rate: u32,
    pub encoded_width: u32,
    pub encoded_height: u32,
    pub video_loss_rate: f32,
    pub rtt_ms: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteAudioStats {
    pub received_kbitrate: f32,
    pub loss_rate: f32,
    pub rtt_ms: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteVideoStats {
    pub received_kbitrate: f32,
    pub decoder_output_frame_rate: u32,
    pub width: u32,
    pub height: u32,
    pub loss_rate: f32,
    pub rtt_ms: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteStreamStats {
    pub user_id: String,
    pub audio: Option<RemoteAudioStats>,
    pub video: Option<RemoteVideoStats>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalAudioLevel {
    pub stream: StreamIndex,
    pub linear_volume: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteAudioLevel {
    pub user_id: String,
    pub stream: StreamIndex,
    pub linear_volume: i32,
}

/// A user as the engine knows it: an id plus opaque extra info.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub user_id: String,
    pub extra_info: String,
}

/// Raw room state callback, as delivered by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomStateChange {
    pub room_id: String,
    pub user_id: String,
    pub state: i32,
    pub extra_info: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomStateKind {
    FirstJoin,
    Reconnected,
    Other,
}

#[derive(Deserialize)]
struct RoomStateExtra {
    #[serde(default = "unknown_join_type")]
    join_type: i32,
}

fn unknown_join_type() -> i32 {
    -1
}

impl RoomStateChange {
    /// `state == 0` means success; `join_type` in the extra info tells a
    /// first join (0) from an engine-driven rejoin (1).
    pub fn kind(&self) -> RoomStateKind {
        if self.state != 0 {
            return RoomStateKind::Other;
        }
        match serde_json::from_str::<RoomStateExtra>(&self.extra_info) {
            Ok(extra) if extra.join_type == 0 => RoomStateKind::FirstJoin,
            Ok(extra) if extra.join_type == 1 => RoomStateKind::Reconnected,
            _ => RoomStateKind::Other,
        }
    }
}

/// Engine callbacks, one variant per callback the core reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    RoomStateChanged(RoomStateChange),
    UserJoined(UserInfo),
    UserLeft { user_id: String, reason: i32 },
    UserPublishStream { user_id: String, kind: MediaStreamType },
    UserUnpublishStream { user_id: String, kind: MediaStreamType },
    UserPublishScreen { user_id: String, kind: MediaStreamType },
    UserUnpublishScreen { user_id: String, kind: MediaStreamType },
    UserStartVideoCapture { user_id: String },
    UserStopVideoCapture { user_id: String },
    AudioRouteChanged(AudioRoute),
    NetworkQuality {
        local: NetworkQualityStats,
        remote: Vec<NetworkQualityStats>,
    },
    LocalStreamStats(LocalStreamStats),
    RemoteStreamStats(RemoteStreamStats),
    LocalAudioLevels(Vec<LocalAudioLevel>),
    RemoteAudioLevels(Vec<RemoteAudioLevel>),
}

/// Instructions the core sends to the vendor engine.
///
/// Calls are fire-and-forget: results come back as [`EngineEvent`]s.
pub trait RtcEngine: Send + Sync {
    fn set_business_id(&self, bid: &str);
    fn join_room(&self, room_id: &str, token: &str, user: &UserInfo);
    fn leave_room(&self);
    fn update_token(&self, token: &str);

    fn start_video_capture(&self);
    fn stop_video_capture(&self);
    fn start_audio_capture(&self);
    fn stop_audio_capture(&self);
    fn publish_stream(&self, kind: MediaStreamType);
    fn unpublish_stream(&self, kind: MediaStreamType);

    fn audio_route(&self) -> AudioRoute;
    fn set_audio_route(&self, route: AudioRoute);
    fn set_video_encoder_config(&self, config: &VideoEncoderConfig);
    fn set_audio_profile(&self, profile: AudioProfile);
    fn switch_camera(&self, facing: CameraFacing);
    fn set_local_video_mirror(&self, mirror: MirrorType);
    fn set_local_video_canvas(&self, index: StreamIndex, canvas: VideoCanvas);
    fn set_remote_video_canvas(&self, key: &RemoteStreamKey, canvas: VideoCanvas);

    fn enable_audio_properties_report(&self, interval: Duration);
    fn enable_effect_beauty(&self, enabled: bool);
    fn set_beauty_intensity(&self, mode: BeautyMode, intensity: f32);
}

/// Runtime permission probe of the host platform.
pub trait Permissions: Send + Sync {
    fn has_camera(&self) -> bool;
    fn has_microphone(&self) -> bool;
}

/// Permissions for hosts without a runtime permission model.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllGranted;

impl Permissions for AllGranted {
    fn has_camera(&self) -> bool {
        true
    }

    fn has_microphone(&self) -> bool {
        true
    }
}

/// Hands engine callbacks to the session task that owns all call state.
///
/// Engines invoke callbacks on their own threads; `deliver` may be called
/// from any of them.
#[derive(Clone)]
pub struct EngineEventSink {
    tx: mpsc::UnboundedSender<Inbound>,
}

impl EngineEventSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Inbound>) -> Self {
        Self { tx }
    }

    /// Returns `false` once the session task has shut down.
    pub fn deliver(&self, event: EngineEvent) -> bool {
        self.tx.send(Inbound::Engine(event)).is_ok()
    }
}
