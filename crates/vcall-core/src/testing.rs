//! Fakes shared by the unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::engine::{
    AudioProfile, AudioRoute, BeautyMode, CameraFacing, MediaStreamType, MirrorType,
    Permissions, RemoteStreamKey, RtcEngine, StreamIndex, UserInfo, VideoCanvas,
    VideoEncoderConfig,
};
use crate::events::{CallEvent, CallEventListener, EventEmitter};

/// Collects emitted events for later inspection.
#[derive(Clone, Default)]
pub struct EventCapture {
    events: Arc<Mutex<Vec<CallEvent>>>,
}

impl CallEventListener for EventCapture {
    fn on_event(&self, event: CallEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl EventCapture {
    pub fn attach(emitter: &EventEmitter) -> Self {
        let capture = Self::default();
        emitter.add_listener(Arc::new(capture.clone()));
        capture
    }

    /// Drain everything captured so far.
    pub fn take(&self) -> Vec<CallEvent> {
        std::mem::take(&mut *self.events.lock().unwrap())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    SetBusinessId(String),
    JoinRoom { room_id: String, token: String, user: UserInfo },
    LeaveRoom,
    UpdateToken(String),
    StartVideoCapture,
    StopVideoCapture,
    StartAudioCapture,
    StopAudioCapture,
    Publish(MediaStreamType),
    Unpublish(MediaStreamType),
    SetAudioRoute(AudioRoute),
    EncoderConfig(VideoEncoderConfig),
    AudioProfile(AudioProfile),
    SwitchCamera(CameraFacing),
    Mirror(MirrorType),
    LocalCanvas(StreamIndex, VideoCanvas),
    RemoteCanvas(RemoteStreamKey, VideoCanvas),
    AudioPropertiesReport(Duration),
    EffectBeauty(bool),
    BeautyIntensity(BeautyMode, f32),
}

/// Engine fake that records every instruction it receives.
#[derive(Default)]
pub struct RecordingEngine {
    calls: Mutex<Vec<EngineCall>>,
    route: Mutex<Option<AudioRoute>>,
}

impl RecordingEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn take(&self) -> Vec<EngineCall> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    fn record(&self, call: EngineCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl RtcEngine for RecordingEngine {
    fn set_business_id(&self, bid: &str) {
        self.record(EngineCall::SetBusinessId(bid.into()));
    }

    fn join_room(&self, room_id: &str, token: &str, user: &UserInfo) {
        self.record(EngineCall::JoinRoom {
            room_id: room_id.into(),
            token: token.into(),
            user: user.clone(),
        });
    }

    fn leave_room(&self) {
        self.record(EngineCall::LeaveRoom);
    }

    fn update_token(&self, token: &str) {
        self.record(EngineCall::UpdateToken(token.into()));
    }

    fn start_video_capture(&self) {
        self.record(EngineCall::StartVideoCapture);
    }

    fn stop_video_capture(&self) {
        self.record(EngineCall::StopVideoCapture);
    }

    fn start_audio_capture(&self) {
        self.record(EngineCall::StartAudioCapture);
    }

    fn stop_audio_capture(&self) {
        self.record(EngineCall::StopAudioCapture);
    }

    fn publish_stream(&self, kind: MediaStreamType) {
        self.record(EngineCall::Publish(kind));
    }

    fn unpublish_stream(&self, kind: MediaStreamType) {
        self.record(EngineCall::Unpublish(kind));
    }

    fn audio_route(&self) -> AudioRoute {
        self.route.lock().unwrap().unwrap_or(AudioRoute::Speakerphone)
    }

    fn set_audio_route(&self, route: AudioRoute) {
        *self.route.lock().unwrap() = Some(route);
        self.record(EngineCall::SetAudioRoute(route));
    }

    fn set_video_encoder_config(&self, config: &VideoEncoderConfig) {
        self.record(EngineCall::EncoderConfig(*config));
    }

    fn set_audio_profile(&self, profile: AudioProfile) {
        self.record(EngineCall::AudioProfile(profile));
    }

    fn switch_camera(&self, facing: CameraFacing) {
        self.record(EngineCall::SwitchCamera(facing));
    }

    fn set_local_video_mirror(&self, mirror: MirrorType) {
        self.record(EngineCall::Mirror(mirror));
    }

    fn set_local_video_canvas(&self, index: StreamIndex, canvas: VideoCanvas) {
        self.record(EngineCall::LocalCanvas(index, canvas));
    }

    fn set_remote_video_canvas(&self, key: &RemoteStreamKey, canvas: VideoCanvas) {
        self.record(EngineCall::RemoteCanvas(key.clone(), canvas));
    }

    fn enable_audio_properties_report(&self, interval: Duration) {
        self.record(EngineCall::AudioPropertiesReport(interval));
    }

    fn enable_effect_beauty(&self, enabled: bool) {
        self.record(EngineCall::EffectBeauty(enabled));
    }

    fn set_beauty_intensity(&self, mode: BeautyMode, intensity: f32) {
        self.record(EngineCall::BeautyIntensity(mode, intensity));
    }
}

/// Permissions that a test can flip at any point.
pub struct FixedPermissions {
    camera: AtomicBool,
    microphone: AtomicBool,
}

impl FixedPermissions {
    pub fn new(camera: bool, microphone: bool) -> Arc<Self> {
        Arc::new(Self {
            camera: AtomicBool::new(camera),
            microphone: AtomicBool::new(microphone),
        })
    }

    pub fn set_camera(&self, granted: bool) {
        self.camera.store(granted, Ordering::SeqCst);
    }
}

impl Permissions for FixedPermissions {
    fn has_camera(&self) -> bool {
        self.camera.load(Ordering::SeqCst)
    }

    fn has_microphone(&self) -> bool {
        self.microphone.load(Ordering::SeqCst)
    }
}
