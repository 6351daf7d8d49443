use std::sync::Arc;

use crate::controls::{LocalMediaState, MediaControls};
use crate::engine::{
    BeautyMode, EngineEvent, Permissions, RemoteStreamKey, RenderMode, RoomStateChange,
    RoomStateKind, RtcEngine, StreamIndex, UserInfo, VideoCanvas,
};
use crate::events::{CallEvent, EventEmitter, Participant};
use crate::participants::RosterStore;
use crate::render::{RenderViews, ViewId};
use crate::rts::RtsInfo;
use crate::settings::{AudioQuality, VOLUME_SPEAKING_INTERVAL, VideoResolution};
use crate::stats::{NetworkQualityCache, SpeakingTracker};

const BEAUTY_WHITEN: f32 = 0.2;
const BEAUTY_SMOOTH: f32 = 0.3;
const BEAUTY_SHARPEN: f32 = 0.4;

/// Something the session task must act on after an engine callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControllerSignal {
    /// The engine rejoined on its own; a fresh access token is needed.
    Reconnected { room_id: String },
}

/// Translates engine callbacks into roster updates and domain events, and
/// forwards local media instructions to the engine.
///
/// Owned by exactly one task. Nothing in here is shared.
pub struct CallController {
    engine: Arc<dyn RtcEngine>,
    controls: MediaControls,
    roster: RosterStore,
    speaking: SpeakingTracker,
    quality: NetworkQualityCache,
    views: RenderViews,
    local: Participant,
    emitter: EventEmitter,
}

impl CallController {
    pub fn new(
        engine: Arc<dyn RtcEngine>,
        permissions: Arc<dyn Permissions>,
        emitter: EventEmitter,
        local: Participant,
        state: LocalMediaState,
    ) -> Self {
        Self {
            controls: MediaControls::new(engine.clone(), permissions, emitter.clone(), state),
            roster: RosterStore::new(emitter.clone()),
            speaking: SpeakingTracker::new(),
            quality: NetworkQualityCache::new(),
            views: RenderViews::new(),
            engine,
            local,
            emitter,
        }
    }

    pub fn local_user(&self) -> &Participant {
        &self.local
    }

    pub fn state(&self) -> &LocalMediaState {
        self.controls.state()
    }

    pub fn roster(&self) -> &RosterStore {
        &self.roster
    }

    pub fn snapshot(&self) -> Vec<Participant> {
        self.roster.snapshot()
    }

    pub fn room_id(&self) -> Option<&str> {
        self.controls.room_id()
    }

    pub fn init_engine(&mut self, info: &RtsInfo) {
        tracing::info!("init engine for app {}", info.app_id);
        self.engine.set_business_id(&info.bid);
        self.engine.start_video_capture();
        self.engine.start_audio_capture();
        self.engine.enable_effect_beauty(true);
        self.engine.set_beauty_intensity(BeautyMode::Whiten, BEAUTY_WHITEN);
        self.engine.set_beauty_intensity(BeautyMode::Smooth, BEAUTY_SMOOTH);
        self.engine.set_beauty_intensity(BeautyMode::Sharpen, BEAUTY_SHARPEN);
        self.engine.enable_audio_properties_report(VOLUME_SPEAKING_INTERVAL);
        self.controls.apply_defaults();
    }

    /// Join the engine room, leaving any current one first, then re-apply
    /// the remembered camera and microphone state.
    pub fn join_room(&mut self, room_id: &str, token: &str) {
        self.leave_room();
        tracing::info!("joining room {room_id} as {}", self.local.user_id);

        let extra_info = serde_json::to_string(&self.local).unwrap_or_else(|e| {
            tracing::warn!("failed to encode local user info: {e}");
            String::new()
        });
        let user = UserInfo {
            user_id: self.local.user_id.clone(),
            extra_info,
        };
        self.engine.join_room(room_id, token, &user);
        self.controls.set_room(Some(room_id.to_string()));

        let state = self.controls.state();
        let (camera_on, mic_on) = (state.camera_on, state.mic_published());
        self.set_camera_enabled(camera_on);
        self.set_mic_enabled(mic_on);
    }

    /// Leave the engine room and forget everyone, without notifying listeners.
    ///
    /// Render views are released with the room; a preview bound before
    /// joining keeps its view.
    pub fn leave_room(&mut self) {
        if let Some(room_id) = self.controls.room_id() {
            tracing::info!("leaving room {room_id}");
            self.engine.leave_room();
            self.views.clear();
        }
        self.controls.set_room(None);
        self.roster.clear();
        self.speaking.clear();
        self.quality.clear();
    }

    pub fn update_token(&self, token: &str) {
        tracing::debug!("updating engine token");
        self.engine.update_token(token);
    }

    pub fn destroy(&mut self) {
        self.leave_room();
        self.views.clear();
        tracing::debug!("controller destroyed");
    }

    pub fn handle_engine_event(&mut self, event: EngineEvent) -> Option<ControllerSignal> {
        if self.controls.room_id().is_none() && is_room_scoped(&event) {
            tracing::debug!("not in a room, dropping {event:?}");
            return None;
        }
        match event {
            EngineEvent::RoomStateChanged(change) => return self.on_room_state(change),
            EngineEvent::UserJoined(info) => {
                tracing::debug!("user joined: {}", info.user_id);
                self.roster.add_participant(participant_from_user_info(&info));
            }
            EngineEvent::UserLeft { user_id, reason } => {
                tracing::debug!("user left: {user_id} reason={reason}");
                self.roster.remove_participant(&user_id);
                self.quality.forget(&user_id);
                self.speaking.forget(&user_id);
            }
            EngineEvent::UserPublishStream { user_id, kind } => {
                if kind.has_audio() {
                    self.roster.set_microphone(&user_id, true);
                }
                if kind.has_video() {
                    self.roster.set_camera(&user_id, true);
                }
            }
            EngineEvent::UserUnpublishStream { user_id, kind } => {
                if kind.has_audio() {
                    self.roster.set_microphone(&user_id, false);
                }
                if kind.has_video() {
                    self.roster.set_camera(&user_id, false);
                }
            }
            EngineEvent::UserStartVideoCapture { user_id } => {
                self.roster.set_camera(&user_id, true);
            }
            EngineEvent::UserStopVideoCapture { user_id } => {
                self.roster.set_camera(&user_id, false);
            }
            EngineEvent::UserPublishScreen { user_id, .. } => {
                tracing::debug!("screen share started by {user_id}");
                let name = self.roster.display_name(&user_id).to_string();
                self.roster
                    .set_screen_share(Some(Participant::screen_share(user_id, name)));
            }
            EngineEvent::UserUnpublishScreen { user_id, .. } => {
                tracing::debug!("screen share stopped by {user_id}");
                self.roster.remove_screen_share(&user_id);
            }
            EngineEvent::AudioRouteChanged(route) => self.controls.on_audio_route_changed(route),
            EngineEvent::NetworkQuality { remote, .. } => self.quality.record(&remote),
            EngineEvent::LocalStreamStats(stats) => {
                self.emitter.emit(CallEvent::LocalStreamStats(stats));
            }
            EngineEvent::RemoteStreamStats(stats) => {
                let report = self.quality.stitch(stats);
                self.emitter.emit(CallEvent::RemoteStreamStats(report));
            }
            EngineEvent::LocalAudioLevels(levels) => {
                // The first entry is the microphone stream.
                if let Some(level) = levels.first() {
                    let user_id = self.local.user_id.clone();
                    self.on_audio_level(user_id, level.stream, level.linear_volume);
                }
            }
            EngineEvent::RemoteAudioLevels(levels) => {
                for level in levels {
                    self.on_audio_level(level.user_id, level.stream, level.linear_volume);
                }
            }
        }
        None
    }

    pub fn set_camera_enabled(&mut self, on: bool) -> bool {
        let on = self.controls.set_camera_enabled(on);
        self.roster.set_camera(&self.local.user_id, on);
        on
    }

    pub fn set_mic_enabled(&mut self, on: bool) -> bool {
        let on = self.controls.set_mic_enabled(on);
        self.roster.set_microphone(&self.local.user_id, on);
        on
    }

    pub fn set_speakerphone(&mut self, use_speaker: bool) {
        self.controls.set_speakerphone(use_speaker);
    }

    pub fn set_video_resolution(&mut self, label: &str) -> VideoResolution {
        self.controls.set_video_resolution(label)
    }

    pub fn set_audio_profile(&mut self, label: &str) -> AudioQuality {
        self.controls.set_audio_profile(label)
    }

    pub fn set_mirror(&mut self, mirror: bool) {
        self.controls.set_mirror(mirror);
    }

    pub fn switch_camera(&mut self, front: bool) {
        self.controls.switch_camera(front);
    }

    /// Bind the local camera or screen stream to its render view.
    pub fn bind_local_canvas(&mut self, is_screen: bool) -> Option<ViewId> {
        let user_id = self.local.user_id.clone();
        let view = self.view_for(&user_id, is_screen)?;
        let index = stream_index(is_screen);
        tracing::debug!("local canvas {index:?} -> {view:?}");
        self.engine.set_local_video_canvas(
            index,
            VideoCanvas {
                view,
                render_mode: RenderMode::Hidden,
            },
        );
        Some(view)
    }

    /// Bind a remote user's camera or screen stream. Needs a current room.
    pub fn bind_remote_canvas(&mut self, user_id: &str, is_screen: bool) -> Option<ViewId> {
        let Some(room_id) = self.controls.room_id().map(str::to_string) else {
            tracing::debug!("not in a room, skipping remote canvas for {user_id}");
            return None;
        };
        let view = self.view_for(user_id, is_screen)?;
        let key = RemoteStreamKey {
            room_id,
            user_id: user_id.to_string(),
            index: stream_index(is_screen),
        };
        // Screen content is letterboxed so nothing gets cropped.
        let render_mode = if is_screen {
            RenderMode::Fit
        } else {
            RenderMode::Hidden
        };
        tracing::debug!("remote canvas {key:?} -> {view:?}");
        self.engine
            .set_remote_video_canvas(&key, VideoCanvas { view, render_mode });
        Some(view)
    }

    fn view_for(&mut self, user_id: &str, is_screen: bool) -> Option<ViewId> {
        if is_screen {
            self.views.screen_render_view(user_id)
        } else {
            self.views.render_view(user_id)
        }
    }

    fn on_room_state(&mut self, change: RoomStateChange) -> Option<ControllerSignal> {
        tracing::debug!(
            "room state {} user={} state={} extra={}",
            change.room_id,
            change.user_id,
            change.state,
            change.extra_info
        );
        let kind = change.kind();
        if kind == RoomStateKind::Other {
            return None;
        }
        // Only `join_room` decides which room we are in.
        if self.controls.room_id() != Some(change.room_id.as_str()) {
            tracing::debug!(
                "ignoring room state for {}, current room is {:?}",
                change.room_id,
                self.controls.room_id()
            );
            return None;
        }
        match kind {
            RoomStateKind::FirstJoin => {
                let state = self.controls.state();
                self.roster.add_participant(Participant {
                    camera_on: state.camera_on,
                    mic_on: state.mic_published(),
                    ..Participant::new(change.user_id, self.local.user_name.clone())
                });
                None
            }
            RoomStateKind::Reconnected => {
                tracing::info!("engine rejoined room {}", change.room_id);
                self.emitter.emit(CallEvent::ReconnectOccurred {
                    room_id: change.room_id.clone(),
                });
                Some(ControllerSignal::Reconnected {
                    room_id: change.room_id,
                })
            }
            RoomStateKind::Other => None,
        }
    }

    fn on_audio_level(&mut self, user_id: String, stream: StreamIndex, linear_volume: i32) {
        if let Some(speaking) = self.speaking.update(&user_id, linear_volume) {
            self.emitter.emit(CallEvent::SpeakingChanged {
                user_id,
                stream,
                speaking,
            });
        }
    }
}

/// Callbacks about other members of a room. Late ones can still arrive
/// after the room was left.
fn is_room_scoped(event: &EngineEvent) -> bool {
    matches!(
        event,
        EngineEvent::UserJoined(_)
            | EngineEvent::UserLeft { .. }
            | EngineEvent::UserPublishStream { .. }
            | EngineEvent::UserUnpublishStream { .. }
            | EngineEvent::UserPublishScreen { .. }
            | EngineEvent::UserUnpublishScreen { .. }
            | EngineEvent::UserStartVideoCapture { .. }
            | EngineEvent::UserStopVideoCapture { .. }
            | EngineEvent::NetworkQuality { .. }
            | EngineEvent::RemoteStreamStats(_)
            | EngineEvent::RemoteAudioLevels(_)
    )
}

fn stream_index(is_screen: bool) -> StreamIndex {
    if is_screen {
        StreamIndex::Screen
    } else {
        StreamIndex::Main
    }
}

/// Remote users announce their display name in the engine's extra info.
/// Missing or unreadable info falls back to the bare id.
fn participant_from_user_info(info: &UserInfo) -> Participant {
    if info.extra_info.trim().is_empty() {
        return Participant::anonymous(info.user_id.clone());
    }
    match serde_json::from_str::<Participant>(&info.extra_info) {
        Ok(mut participant) => {
            participant.user_id = info.user_id.clone();
            participant
        }
        Err(e) => {
            tracing::debug!("unreadable extra info for {}: {e}", info.user_id);
            Participant::anonymous(info.user_id.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{
        LocalAudioLevel, MediaStreamType, NetworkQuality, NetworkQualityStats,
        RemoteAudioLevel, RemoteStreamStats,
    };
    use crate::events::{MediaKind, MediaStatus};
    use crate::testing::{EngineCall, EventCapture, FixedPermissions, RecordingEngine};

    struct Fixture {
        controller: CallController,
        engine: Arc<RecordingEngine>,
        capture: EventCapture,
    }

    fn fixture() -> Fixture {
        let engine = RecordingEngine::new();
        let emitter = EventEmitter::new();
        let capture = EventCapture::attach(&emitter);
        let controller = CallController::new(
            engine.clone(),
            FixedPermissions::new(true, true),
            emitter,
            Participant::new("me", "Alice"),
            LocalMediaState::default(),
        );
        Fixture {
            controller,
            engine,
            capture,
        }
    }

    fn joined() -> Fixture {
        let mut f = fixture();
        f.controller.join_room("1001", "tok");
        f.controller
            .handle_engine_event(EngineEvent::RoomStateChanged(RoomStateChange {
                room_id: "1001".into(),
                user_id: "me".into(),
                state: 0,
                extra_info: r#"{"join_type":0}"#.into(),
            }));
        f.engine.take();
        f.capture.take();
        f
    }

    fn user_joined(id: &str, extra: &str) -> EngineEvent {
        EngineEvent::UserJoined(UserInfo {
            user_id: id.into(),
            extra_info: extra.into(),
        })
    }

    #[test]
    fn init_engine_applies_defaults() {
        let mut f = fixture();
        f.controller.init_engine(&RtsInfo {
            bid: "video_call".into(),
            ..Default::default()
        });
        let calls = f.engine.take();
        assert_eq!(calls[0], EngineCall::SetBusinessId("video_call".into()));
        assert!(calls.contains(&EngineCall::BeautyIntensity(BeautyMode::Smooth, 0.3)));
        assert!(calls.contains(&EngineCall::AudioPropertiesReport(VOLUME_SPEAKING_INTERVAL)));
        assert!(calls.contains(&EngineCall::EncoderConfig(
            VideoResolution::P720.encoder_config()
        )));
    }

    #[test]
    fn join_sends_identity_and_reapplies_media() {
        let mut f = fixture();
        f.controller.join_room("1001", "tok");
        let calls = f.engine.take();
        match &calls[0] {
            EngineCall::JoinRoom { room_id, token, user } => {
                assert_eq!(room_id, "1001");
                assert_eq!(token, "tok");
                assert_eq!(user.user_id, "me");
                let sent: Participant = serde_json::from_str(&user.extra_info).unwrap();
                assert_eq!(sent.user_name, "Alice");
            }
            other => panic!("unexpected first call: {other:?}"),
        }
        assert!(calls.contains(&EngineCall::Publish(MediaStreamType::Video)));
        assert!(calls.contains(&EngineCall::Publish(MediaStreamType::Audio)));
    }

    #[test]
    fn first_join_adds_local_participant() {
        let f = joined();
        let me = f.controller.roster().participant("me").unwrap();
        assert_eq!(me.user_name, "Alice");
        assert!(me.camera_on && me.mic_on);
        assert_eq!(f.controller.room_id(), Some("1001"));
    }

    #[test]
    fn reconnect_signals_without_touching_roster() {
        let mut f = joined();
        let signal = f
            .controller
            .handle_engine_event(EngineEvent::RoomStateChanged(RoomStateChange {
                room_id: "1001".into(),
                user_id: "me".into(),
                state: 0,
                extra_info: r#"{"join_type":1}"#.into(),
            }));
        assert_eq!(
            signal,
            Some(ControllerSignal::Reconnected {
                room_id: "1001".into()
            })
        );
        assert!(matches!(
            f.capture.take().as_slice(),
            [CallEvent::ReconnectOccurred { room_id }] if room_id == "1001"
        ));
        assert_eq!(f.controller.roster().len(), 1);
    }

    #[test]
    fn remote_join_reads_extra_info() {
        let mut f = joined();
        f.controller
            .handle_engine_event(user_joined("u2", r#"{"user_id":"spoofed","user_name":"Bob"}"#));
        f.controller.handle_engine_event(user_joined("u3", ""));
        f.controller.handle_engine_event(user_joined("u4", "{broken"));

        let roster = f.controller.roster();
        assert_eq!(roster.display_name("u2"), "Bob");
        assert!(roster.participant("spoofed").is_none());
        assert_eq!(roster.display_name("u3"), "u3");
        assert_eq!(roster.display_name("u4"), "u4");
    }

    #[test]
    fn publish_both_updates_both_flags() {
        let mut f = joined();
        f.controller.handle_engine_event(user_joined("u2", ""));
        f.capture.take();
        f.controller.handle_engine_event(EngineEvent::UserPublishStream {
            user_id: "u2".into(),
            kind: MediaStreamType::Both,
        });
        let u2 = f.controller.roster().participant("u2").unwrap();
        assert!(u2.mic_on && u2.camera_on);
        let kinds: Vec<_> = f
            .capture
            .take()
            .into_iter()
            .filter_map(|e| match e {
                CallEvent::MediaStatusChanged { kind, status, .. } => Some((kind, status)),
                _ => None,
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                (MediaKind::Audio, MediaStatus::On),
                (MediaKind::Video, MediaStatus::On)
            ]
        );
    }

    #[test]
    fn unpublish_for_unknown_user_creates_nothing() {
        let mut f = joined();
        f.controller.handle_engine_event(EngineEvent::UserUnpublishStream {
            user_id: "ghost".into(),
            kind: MediaStreamType::Video,
        });
        assert!(f.controller.roster().participant("ghost").is_none());
    }

    #[test]
    fn screen_share_named_from_roster() {
        let mut f = joined();
        f.controller
            .handle_engine_event(user_joined("u2", r#"{"user_name":"Bob"}"#));
        f.controller.handle_engine_event(EngineEvent::UserPublishScreen {
            user_id: "u2".into(),
            kind: MediaStreamType::Both,
        });
        let snapshot = f.controller.snapshot();
        assert!(snapshot[0].is_screen_share);
        assert_eq!(snapshot[0].user_name, "Bob");

        // someone else stopping a share does not clear Bob's
        f.controller.handle_engine_event(EngineEvent::UserUnpublishScreen {
            user_id: "u3".into(),
            kind: MediaStreamType::Both,
        });
        assert!(f.controller.roster().screen_share().is_some());
        f.controller.handle_engine_event(EngineEvent::UserUnpublishScreen {
            user_id: "u2".into(),
            kind: MediaStreamType::Both,
        });
        assert!(f.controller.roster().screen_share().is_none());
    }

    #[test]
    fn remote_stats_carry_cached_quality_until_user_leaves() {
        let mut f = joined();
        f.controller.handle_engine_event(user_joined("u2", ""));
        f.controller.handle_engine_event(EngineEvent::NetworkQuality {
            local: NetworkQualityStats {
                user_id: "me".into(),
                tx_quality: NetworkQuality::Excellent,
                rx_quality: NetworkQuality::Excellent,
            },
            remote: vec![NetworkQualityStats {
                user_id: "u2".into(),
                tx_quality: NetworkQuality::Good,
                rx_quality: NetworkQuality::Bad,
            }],
        });
        let stats = || {
            EngineEvent::RemoteStreamStats(RemoteStreamStats {
                user_id: "u2".into(),
                ..Default::default()
            })
        };
        f.capture.take();

        f.controller.handle_engine_event(stats());
        assert!(matches!(
            f.capture.take().as_slice(),
            [CallEvent::RemoteStreamStats(report)] if report.quality == NetworkQuality::Bad
        ));

        f.controller.handle_engine_event(EngineEvent::UserLeft {
            user_id: "u2".into(),
            reason: 0,
        });
        f.capture.take();
        f.controller.handle_engine_event(stats());
        assert!(matches!(
            f.capture.take().as_slice(),
            [CallEvent::RemoteStreamStats(report)] if report.quality == NetworkQuality::Unknown
        ));
    }

    #[test]
    fn speaking_changes_only_on_edges() {
        let mut f = joined();
        let remote = |volume| {
            EngineEvent::RemoteAudioLevels(vec![RemoteAudioLevel {
                user_id: "u2".into(),
                stream: StreamIndex::Main,
                linear_volume: volume,
            }])
        };
        f.controller.handle_engine_event(remote(50));
        f.controller.handle_engine_event(remote(60));
        f.controller.handle_engine_event(remote(2));
        f.controller
            .handle_engine_event(EngineEvent::LocalAudioLevels(vec![LocalAudioLevel {
                stream: StreamIndex::Main,
                linear_volume: 30,
            }]));

        let speaking: Vec<_> = f
            .capture
            .take()
            .into_iter()
            .filter_map(|e| match e {
                CallEvent::SpeakingChanged {
                    user_id, speaking, ..
                } => Some((user_id, speaking)),
                _ => None,
            })
            .collect();
        assert_eq!(
            speaking,
            vec![
                ("u2".to_string(), true),
                ("u2".to_string(), false),
                ("me".to_string(), true)
            ]
        );
    }

    #[test]
    fn local_toggle_updates_local_entry() {
        let mut f = joined();
        assert!(!f.controller.set_camera_enabled(false));
        assert!(!f.controller.roster().participant("me").unwrap().camera_on);
        assert!(f.capture.take().iter().any(|e| matches!(
            e,
            CallEvent::MediaStatusChanged { user_id, kind: MediaKind::Video, status: MediaStatus::Off }
                if user_id == "me"
        )));
    }

    #[test]
    fn permission_denied_mic_reports_off() {
        let engine = RecordingEngine::new();
        let emitter = EventEmitter::new();
        let mut controller = CallController::new(
            engine,
            FixedPermissions::new(true, false),
            emitter,
            Participant::new("me", "Alice"),
            LocalMediaState::default(),
        );
        assert!(!controller.set_mic_enabled(true));
        assert!(!controller.state().mic_published());
    }

    #[test]
    fn canvases_use_stable_views() {
        let mut f = joined();
        let local = f.controller.bind_local_canvas(false).unwrap();
        let remote = f.controller.bind_remote_canvas("u2", true).unwrap();
        assert_eq!(f.controller.bind_local_canvas(false), Some(local));
        let calls = f.engine.take();
        assert_eq!(
            calls[1],
            EngineCall::RemoteCanvas(
                RemoteStreamKey {
                    room_id: "1001".into(),
                    user_id: "u2".into(),
                    index: StreamIndex::Screen,
                },
                VideoCanvas {
                    view: remote,
                    render_mode: RenderMode::Fit,
                }
            )
        );
    }

    #[test]
    fn remote_canvas_needs_a_room() {
        let mut f = fixture();
        assert_eq!(f.controller.bind_remote_canvas("u2", false), None);
        assert!(f.engine.take().is_empty());
    }

    #[test]
    fn leave_clears_silently() {
        let mut f = joined();
        f.controller.handle_engine_event(user_joined("u2", ""));
        f.capture.take();
        f.controller.leave_room();
        assert!(f.controller.snapshot().is_empty());
        assert!(f.capture.take().is_empty());
        assert_eq!(f.engine.take(), vec![EngineCall::LeaveRoom]);
        assert_eq!(f.controller.room_id(), None);
        // leaving twice does not touch the engine again
        f.controller.leave_room();
        assert!(f.engine.take().is_empty());
    }

    fn room_state(room_id: &str, join_type: u8) -> EngineEvent {
        EngineEvent::RoomStateChanged(RoomStateChange {
            room_id: room_id.into(),
            user_id: "me".into(),
            state: 0,
            extra_info: format!(r#"{{"join_type":{join_type}}}"#),
        })
    }

    #[test]
    fn late_first_join_after_leave_is_ignored() {
        let mut f = joined();
        f.controller.leave_room();
        f.engine.take();

        assert_eq!(f.controller.handle_engine_event(room_state("1001", 0)), None);

        assert_eq!(f.controller.room_id(), None);
        assert!(f.controller.roster().is_empty());
        assert_eq!(f.controller.bind_remote_canvas("u2", false), None);
        f.controller.set_camera_enabled(true);
        assert!(!f.engine.take().contains(&EngineCall::Publish(MediaStreamType::Video)));
        assert!(f.capture.take().iter().all(|e| !matches!(e, CallEvent::ParticipantJoined(_))));
    }

    #[test]
    fn room_state_for_previous_room_is_ignored() {
        let mut f = joined();
        f.controller.join_room("2002", "tok2");
        f.capture.take();

        assert_eq!(f.controller.handle_engine_event(room_state("1001", 1)), None);
        assert_eq!(f.controller.handle_engine_event(room_state("1001", 0)), None);

        assert_eq!(f.controller.room_id(), Some("2002"));
        assert!(f.controller.roster().is_empty());
        assert!(f.capture.take().is_empty());

        assert_eq!(
            f.controller.handle_engine_event(room_state("2002", 1)),
            Some(ControllerSignal::Reconnected {
                room_id: "2002".into()
            })
        );
    }

    #[test]
    fn member_callbacks_outside_a_room_are_dropped() {
        let mut f = fixture();
        f.controller.handle_engine_event(user_joined("u2", r#"{"user_name":"Bob"}"#));
        f.controller.handle_engine_event(EngineEvent::UserPublishScreen {
            user_id: "u2".into(),
            kind: MediaStreamType::Video,
        });
        assert!(f.controller.snapshot().is_empty());
        assert!(f.capture.take().is_empty());
    }

    #[test]
    fn views_are_released_with_the_room() {
        let mut f = fixture();
        let preview = f.controller.bind_local_canvas(false).unwrap();
        f.controller.join_room("1001", "tok");
        // joining keeps the preview surface
        assert_eq!(f.controller.bind_local_canvas(false), Some(preview));
        let remote = f.controller.bind_remote_canvas("u2", false).unwrap();

        f.controller.leave_room();
        f.controller.join_room("1001", "tok");

        let rebound = f.controller.bind_remote_canvas("u2", false).unwrap();
        assert_ne!(rebound, remote);
        assert_ne!(f.controller.bind_local_canvas(false), Some(preview));
    }
}
