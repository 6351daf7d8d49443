use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use vcall_core::engine::{
    AudioProfile, AudioRoute, BeautyMode, CameraFacing, MediaStreamType, MirrorType,
    RemoteStreamKey, RoomStateChange, StreamIndex, UserInfo, VideoCanvas, VideoEncoderConfig,
};
use vcall_core::{EngineEvent, EngineEventSink, RtcEngine};

/// Stand-in for a vendor RTC engine.
///
/// Instructions are logged; callbacks are delivered from a dedicated thread,
/// the way a real engine calls back from its own worker threads.
pub struct SimulatedEngine {
    tx: Sender<EngineEvent>,
    rx: Mutex<Option<Receiver<EngineEvent>>>,
    room: Mutex<Option<String>>,
    route: Mutex<AudioRoute>,
}

impl SimulatedEngine {
    pub fn new() -> Arc<Self> {
        let (tx, rx) = mpsc::channel();
        Arc::new(Self {
            tx,
            rx: Mutex::new(Some(rx)),
            room: Mutex::new(None),
            route: Mutex::new(AudioRoute::Speakerphone),
        })
    }

    /// Start the callback thread. Only the first call has an effect.
    pub fn attach(&self, sink: EngineEventSink) {
        let Some(rx) = self.rx.lock().unwrap_or_else(|p| p.into_inner()).take() else {
            tracing::warn!("simulated engine already attached");
            return;
        };
        let spawned = thread::Builder::new()
            .name("engine-callbacks".into())
            .spawn(move || {
                for event in rx {
                    if !sink.deliver(event) {
                        break;
                    }
                }
                tracing::debug!("engine callback thread stopped");
            });
        if let Err(e) = spawned {
            tracing::error!("failed to spawn engine callback thread: {e}");
        }
    }

    /// Queue a callback, as if it came from the media server.
    pub fn fire(&self, event: EngineEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("engine callback dropped, thread gone");
        }
    }

    pub fn room(&self) -> Option<String> {
        self.room.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl RtcEngine for SimulatedEngine {
    fn set_business_id(&self, bid: &str) {
        tracing::debug!("engine: business id {bid}");
    }

    fn join_room(&self, room_id: &str, _token: &str, user: &UserInfo) {
        tracing::info!("engine: join {room_id} as {} ({})", user.user_id, user.extra_info);
        *self.room.lock().unwrap_or_else(|p| p.into_inner()) = Some(room_id.to_string());
        self.fire(EngineEvent::RoomStateChanged(RoomStateChange {
            room_id: room_id.to_string(),
            user_id: user.user_id.clone(),
            state: 0,
            extra_info: r#"{"join_type":0,"elapsed":42}"#.into(),
        }));
    }

    fn leave_room(&self) {
        let room = self.room.lock().unwrap_or_else(|p| p.into_inner()).take();
        tracing::info!("engine: leave {room:?}");
    }

    fn update_token(&self, token: &str) {
        tracing::info!("engine: token refreshed ({} chars)", token.len());
    }

    fn start_video_capture(&self) {
        tracing::debug!("engine: start video capture");
    }

    fn stop_video_capture(&self) {
        tracing::debug!("engine: stop video capture");
    }

    fn start_audio_capture(&self) {
        tracing::debug!("engine: start audio capture");
    }

    fn stop_audio_capture(&self) {
        tracing::debug!("engine: stop audio capture");
    }

    fn publish_stream(&self, kind: MediaStreamType) {
        tracing::debug!("engine: publish {kind:?}");
    }

    fn unpublish_stream(&self, kind: MediaStreamType) {
        tracing::debug!("engine: unpublish {kind:?}");
    }

    fn audio_route(&self) -> AudioRoute {
        *self.route.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_audio_route(&self, route: AudioRoute) {
        tracing::debug!("engine: audio route {route:?}");
        *self.route.lock().unwrap_or_else(|p| p.into_inner()) = route;
    }

    fn set_video_encoder_config(&self, config: &VideoEncoderConfig) {
        tracing::debug!(
            "engine: encoder {}x{}@{}",
            config.width,
            config.height,
            config.frame_rate
        );
    }

    fn set_audio_profile(&self, profile: AudioProfile) {
        tracing::debug!("engine: audio profile {profile:?}");
    }

    fn switch_camera(&self, facing: CameraFacing) {
        tracing::debug!("engine: camera {facing:?}");
    }

    fn set_local_video_mirror(&self, mirror: MirrorType) {
        tracing::debug!("engine: mirror {mirror:?}");
    }

    fn set_local_video_canvas(&self, index: StreamIndex, canvas: VideoCanvas) {
        tracing::debug!("engine: local {index:?} -> {:?}", canvas.view);
    }

    fn set_remote_video_canvas(&self, key: &RemoteStreamKey, canvas: VideoCanvas) {
        tracing::debug!(
            "engine: remote {}/{:?} -> {:?} {:?}",
            key.user_id,
            key.index,
            canvas.view,
            canvas.render_mode
        );
    }

    fn enable_audio_properties_report(&self, interval: Duration) {
        tracing::debug!("engine: audio levels every {interval:?}");
    }

    fn enable_effect_beauty(&self, enabled: bool) {
        tracing::debug!("engine: beauty {enabled}");
    }

    fn set_beauty_intensity(&self, mode: BeautyMode, intensity: f32) {
        tracing::debug!("engine: beauty {mode:?}={intensity}");
    }
}
