use std::sync::Arc;

use crate::engine::{AudioRoute, CameraFacing, MediaStreamType, MirrorType, Permissions, RtcEngine};
use crate::events::{CallEvent, EventEmitter, Notice};
use crate::settings::{AudioQuality, CallSettings, VideoResolution};

/// Local media preferences and state for the life of a controller.
///
/// Survives reconnects and room changes; only the room id is reset on leave.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalMediaState {
    pub room_id: Option<String>,
    pub camera_on: bool,
    /// Microphone capability. False once permission turns out to be missing.
    pub mic_on: bool,
    /// User-requested mute.
    pub audio_muted: bool,
    pub speakerphone: bool,
    pub mirror: bool,
    pub front_camera: bool,
    pub resolution: VideoResolution,
    pub audio_quality: AudioQuality,
    pub audio_route: Option<AudioRoute>,
}

impl Default for LocalMediaState {
    fn default() -> Self {
        Self {
            room_id: None,
            camera_on: true,
            mic_on: true,
            audio_muted: false,
            speakerphone: true,
            mirror: true,
            front_camera: true,
            resolution: VideoResolution::default(),
            audio_quality: AudioQuality::default(),
            audio_route: None,
        }
    }
}

impl LocalMediaState {
    pub fn from_settings(settings: &CallSettings) -> Self {
        Self {
            camera_on: settings.camera_enabled_on_join,
            audio_muted: !settings.mic_enabled_on_join,
            speakerphone: settings.speakerphone,
            mirror: settings.mirror,
            resolution: VideoResolution::from_label(&settings.resolution).unwrap_or_default(),
            audio_quality: AudioQuality::from_label(&settings.audio_quality).unwrap_or_default(),
            ..Default::default()
        }
    }

    /// What other members see of the local microphone.
    pub fn mic_published(&self) -> bool {
        self.mic_on && !self.audio_muted
    }
}

/// Local camera, microphone and audio route controls.
///
/// Every call is forwarded to the engine immediately; stream publishing
/// only happens while a room is set.
pub struct MediaControls {
    engine: Arc<dyn RtcEngine>,
    permissions: Arc<dyn Permissions>,
    emitter: EventEmitter,
    state: LocalMediaState,
    camera_warned: bool,
    mic_warned: bool,
}

impl MediaControls {
    pub fn new(
        engine: Arc<dyn RtcEngine>,
        permissions: Arc<dyn Permissions>,
        emitter: EventEmitter,
        state: LocalMediaState,
    ) -> Self {
        Self {
            engine,
            permissions,
            emitter,
            state,
            camera_warned: false,
            mic_warned: false,
        }
    }

    pub fn state(&self) -> &LocalMediaState {
        &self.state
    }

    pub fn room_id(&self) -> Option<&str> {
        self.state.room_id.as_deref()
    }

    pub(crate) fn set_room(&mut self, room_id: Option<String>) {
        self.state.room_id = room_id;
    }

    /// Turn the camera on or off. Returns whether it ended up on.
    pub fn set_camera_enabled(&mut self, on: bool) -> bool {
        tracing::debug!("set camera enabled: {on}");
        if !self.permissions.has_camera() {
            self.state.camera_on = false;
            self.engine.stop_video_capture();
            if !self.camera_warned {
                self.camera_warned = true;
                self.emitter
                    .emit(CallEvent::Notice(Notice::CameraPermissionDisabled));
            }
            tracing::warn!("camera permission missing, camera kept off");
            return false;
        }

        self.state.camera_on = on;
        if on {
            self.engine.start_video_capture();
        } else {
            self.engine.stop_video_capture();
        }
        if self.state.room_id.is_some() {
            if on {
                self.engine.publish_stream(MediaStreamType::Video);
            } else {
                self.engine.unpublish_stream(MediaStreamType::Video);
            }
        }
        on
    }

    /// Publish or mute the microphone. Returns the published state.
    pub fn set_mic_enabled(&mut self, on: bool) -> bool {
        tracing::debug!("set mic enabled: {on}");
        self.state.audio_muted = !on;
        if !self.permissions.has_microphone() {
            self.state.mic_on = false;
            self.engine.stop_audio_capture();
            if !self.mic_warned {
                self.mic_warned = true;
                self.emitter
                    .emit(CallEvent::Notice(Notice::MicrophonePermissionDisabled));
            }
            tracing::warn!("microphone permission missing, microphone kept off");
            return false;
        }

        // Capture keeps running while muted; only publishing stops.
        if on {
            self.engine.start_audio_capture();
        }
        if self.state.room_id.is_some() {
            if on {
                self.engine.publish_stream(MediaStreamType::Audio);
            } else {
                self.engine.unpublish_stream(MediaStreamType::Audio);
            }
        }
        self.state.mic_published()
    }

    /// Switch between loudspeaker and earpiece. Ignored while a headset is
    /// the active route.
    pub fn set_speakerphone(&mut self, use_speaker: bool) {
        if self.current_route().is_headset() {
            tracing::debug!("headset active, ignoring speakerphone={use_speaker}");
            return;
        }
        self.state.speakerphone = use_speaker;
        self.engine.set_audio_route(if use_speaker {
            AudioRoute::Speakerphone
        } else {
            AudioRoute::Earpiece
        });
        self.emitter.emit(CallEvent::AudioRouteChanged {
            speakerphone: use_speaker,
        });
    }

    pub fn on_audio_route_changed(&mut self, route: AudioRoute) {
        tracing::debug!("audio route changed: {route:?}");
        let previous = self.state.audio_route.replace(route);
        // headset unplugged
        if previous.is_some_and(AudioRoute::is_headset) && !route.is_headset() {
            self.set_speakerphone(true);
        }
    }

    /// Unknown labels fall back to the default resolution.
    pub fn set_video_resolution(&mut self, label: &str) -> VideoResolution {
        let resolution = VideoResolution::from_label(label).unwrap_or_default();
        self.state.resolution = resolution;
        let config = resolution.encoder_config();
        tracing::debug!("video encoder config: {config:?}");
        self.engine.set_video_encoder_config(&config);
        resolution
    }

    /// Unknown labels fall back to the default quality.
    pub fn set_audio_profile(&mut self, label: &str) -> AudioQuality {
        let quality = AudioQuality::from_label(label).unwrap_or_default();
        self.state.audio_quality = quality;
        tracing::debug!("audio profile: {:?}", quality.profile());
        self.engine.set_audio_profile(quality.profile());
        quality
    }

    pub fn set_mirror(&mut self, mirror: bool) {
        self.state.mirror = mirror;
        let mirror_type = if mirror && self.state.front_camera {
            MirrorType::RenderAndEncoder
        } else {
            MirrorType::None
        };
        tracing::debug!("local mirror: {mirror_type:?}");
        self.engine.set_local_video_mirror(mirror_type);
    }

    pub fn switch_camera(&mut self, front: bool) {
        self.state.front_camera = front;
        self.engine.switch_camera(if front {
            CameraFacing::Front
        } else {
            CameraFacing::Back
        });
        self.set_mirror(self.state.mirror);
    }

    /// Push the remembered resolution, audio quality and mirror to the engine.
    pub fn apply_defaults(&mut self) {
        self.set_video_resolution(self.state.resolution.label());
        self.set_audio_profile(self.state.audio_quality.label());
        self.set_mirror(self.state.mirror);
    }

    fn current_route(&self) -> AudioRoute {
        self.state
            .audio_route
            .unwrap_or_else(|| self.engine.audio_route())
    }
}
