//! The call session task.
//!
//! One tokio task owns the [`CallController`] and everything it holds.
//! UI commands, engine callbacks, server broadcasts and the completions of
//! background business requests all arrive on a single channel and are
//! handled one at a time, so no call state is ever shared between threads.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};

use crate::auth::AuthService;
use crate::controller::{CallController, ControllerSignal};
use crate::controls::LocalMediaState;
use crate::engine::{EngineEvent, EngineEventSink, Permissions, RtcEngine};
use crate::errors::VcallError;
use crate::events::{CallEvent, CallEventListener, EndReason, EventEmitter, Notice, Participant};
use crate::render::ViewId;
use crate::rts::{JoinRoomResponse, ReconnectResponse, RtsClient, ServerBroadcast};
use crate::settings::{CallSettings, SettingsStore};

/// A successfully entered room.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRoom {
    pub room_id: String,
    pub rtc_token: String,
    /// Time left before the server closes the room.
    pub duration: Duration,
    pub closes_at: DateTime<Utc>,
}

/// Everything the session task reacts to.
pub(crate) enum Inbound {
    Engine(EngineEvent),
    Command(Command),
    Broadcast(ServerBroadcast),
    JoinFinished {
        epoch: u64,
        room_id: String,
        result: Result<JoinRoomResponse, VcallError>,
    },
    ReconnectFinished {
        epoch: u64,
        room_id: String,
        result: Result<ReconnectResponse, VcallError>,
    },
}

pub(crate) enum Command {
    EnterRoom {
        room_id: String,
        reply: oneshot::Sender<Result<JoinedRoom, VcallError>>,
    },
    LeaveRoom(oneshot::Sender<()>),
    SetCamera(bool, oneshot::Sender<bool>),
    SetMic(bool, oneshot::Sender<bool>),
    SetSpeakerphone(bool),
    SetResolution(String),
    SetAudioQuality(String),
    SetMirror(bool),
    SwitchCamera(bool),
    BindLocalCanvas(bool, oneshot::Sender<Option<ViewId>>),
    BindRemoteCanvas {
        user_id: String,
        is_screen: bool,
        reply: oneshot::Sender<Option<ViewId>>,
    },
    Participants(oneshot::Sender<Vec<Participant>>),
    LocalState(oneshot::Sender<LocalMediaState>),
    Shutdown(oneshot::Sender<()>),
}

/// Handle to a running call session. Cheap to clone; every clone talks to
/// the same session task.
#[derive(Clone)]
pub struct CallClient {
    tx: mpsc::UnboundedSender<Inbound>,
    emitter: EventEmitter,
}

impl CallClient {
    /// Spawn the session task on the current tokio runtime and initialise
    /// the engine.
    ///
    /// The returned sink must be handed to the engine's callback layer.
    pub fn start(
        engine: Arc<dyn RtcEngine>,
        permissions: Arc<dyn Permissions>,
        rts: RtsClient,
        settings: Option<Arc<SettingsStore>>,
    ) -> (CallClient, EngineEventSink) {
        let (tx, rx) = mpsc::unbounded_channel();
        let emitter = EventEmitter::new();

        let state = settings
            .as_ref()
            .map(|s| LocalMediaState::from_settings(&s.get()))
            .unwrap_or_default();
        let local = Participant::new(rts.user().user_id.clone(), rts.user().user_name.clone());
        let mut controller =
            CallController::new(engine, permissions, emitter.clone(), local, state);
        controller.init_engine(rts.info());

        let session = Session {
            controller,
            rts,
            settings,
            emitter: emitter.clone(),
            tx: tx.downgrade(),
            current_room: None,
            pending_join: None,
            join_epoch: 0,
            reconnect_epoch: 0,
        };
        tokio::spawn(session.run(rx));

        let sink = EngineEventSink::new(tx.clone());
        (CallClient { tx, emitter }, sink)
    }

    pub fn add_listener(&self, listener: Arc<dyn CallEventListener>) {
        self.emitter.add_listener(listener);
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<CallEvent> {
        self.emitter.subscribe()
    }

    /// Ask the business server for a seat in `room_id`, then join the
    /// engine room with the token it hands out.
    ///
    /// A later `enter_room` or `leave_room` supersedes one still in flight.
    pub async fn enter_room(&self, room_id: &str) -> Result<JoinedRoom, VcallError> {
        let room_id = AuthService::extract_room_id(room_id)?;
        self.request(|reply| Command::EnterRoom { room_id, reply })
            .await?
    }

    pub async fn leave_room(&self) -> Result<(), VcallError> {
        self.request(Command::LeaveRoom).await
    }

    /// Returns whether the camera ended up on.
    pub async fn set_camera_enabled(&self, on: bool) -> Result<bool, VcallError> {
        self.request(|reply| Command::SetCamera(on, reply)).await
    }

    /// Returns whether the microphone ended up published.
    pub async fn set_mic_enabled(&self, on: bool) -> Result<bool, VcallError> {
        self.request(|reply| Command::SetMic(on, reply)).await
    }

    pub fn set_speakerphone(&self, use_speaker: bool) -> Result<(), VcallError> {
        self.send(Command::SetSpeakerphone(use_speaker))
    }

    pub fn set_video_resolution(&self, label: &str) -> Result<(), VcallError> {
        self.send(Command::SetResolution(label.to_string()))
    }

    pub fn set_audio_quality(&self, label: &str) -> Result<(), VcallError> {
        self.send(Command::SetAudioQuality(label.to_string()))
    }

    pub fn set_mirror(&self, mirror: bool) -> Result<(), VcallError> {
        self.send(Command::SetMirror(mirror))
    }

    pub fn switch_camera(&self, front: bool) -> Result<(), VcallError> {
        self.send(Command::SwitchCamera(front))
    }

    pub async fn bind_local_canvas(&self, is_screen: bool) -> Result<Option<ViewId>, VcallError> {
        self.request(|reply| Command::BindLocalCanvas(is_screen, reply))
            .await
    }

    pub async fn bind_remote_canvas(
        &self,
        user_id: &str,
        is_screen: bool,
    ) -> Result<Option<ViewId>, VcallError> {
        let user_id = user_id.to_string();
        self.request(|reply| Command::BindRemoteCanvas {
            user_id,
            is_screen,
            reply,
        })
        .await
    }

    /// Hand over a server push received by the signaling layer.
    /// Unknown events are dropped.
    pub fn deliver_broadcast(&self, event: &str, payload: &str) -> Result<(), VcallError> {
        match RtsClient::parse_broadcast(event, payload) {
            Some(broadcast) => self
                .tx
                .send(Inbound::Broadcast(broadcast))
                .map_err(|_| VcallError::SessionClosed),
            None => Ok(()),
        }
    }

    /// Current roster, screen share first.
    pub async fn participants(&self) -> Result<Vec<Participant>, VcallError> {
        self.request(Command::Participants).await
    }

    pub async fn local_state(&self) -> Result<LocalMediaState, VcallError> {
        self.request(Command::LocalState).await
    }

    /// Leave any room, release the engine and stop the session task.
    pub async fn shutdown(&self) -> Result<(), VcallError> {
        self.request(Command::Shutdown).await
    }

    fn send(&self, command: Command) -> Result<(), VcallError> {
        self.tx
            .send(Inbound::Command(command))
            .map_err(|_| VcallError::SessionClosed)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, VcallError> {
        let (reply, rx) = oneshot::channel();
        self.send(command(reply))?;
        rx.await.map_err(|_| VcallError::SessionClosed)
    }
}

struct PendingJoin {
    epoch: u64,
    reply: oneshot::Sender<Result<JoinedRoom, VcallError>>,
}

struct Session {
    controller: CallController,
    rts: RtsClient,
    settings: Option<Arc<SettingsStore>>,
    emitter: EventEmitter,
    /// Weak so the task ends once every handle and sink is gone.
    tx: mpsc::WeakUnboundedSender<Inbound>,
    current_room: Option<String>,
    pending_join: Option<PendingJoin>,
    join_epoch: u64,
    reconnect_epoch: u64,
}

impl Session {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Inbound>) {
        tracing::info!("call session started");
        while let Some(inbound) = rx.recv().await {
            match inbound {
                Inbound::Engine(event) => {
                    if let Some(signal) = self.controller.handle_engine_event(event) {
                        self.on_signal(signal);
                    }
                }
                Inbound::Command(Command::Shutdown(reply)) => {
                    self.leave(EndReason::Left);
                    self.controller.destroy();
                    let _ = reply.send(());
                    break;
                }
                Inbound::Command(command) => self.on_command(command),
                Inbound::Broadcast(broadcast) => self.on_broadcast(broadcast),
                Inbound::JoinFinished {
                    epoch,
                    room_id,
                    result,
                } => self.on_join_finished(epoch, room_id, result),
                Inbound::ReconnectFinished {
                    epoch,
                    room_id,
                    result,
                } => self.on_reconnect_finished(epoch, room_id, result),
            }
        }
        tracing::info!("call session ended");
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::EnterRoom { room_id, reply } => self.enter_room(room_id, reply),
            Command::LeaveRoom(reply) => {
                self.leave(EndReason::Left);
                let _ = reply.send(());
            }
            Command::SetCamera(on, reply) => {
                let _ = reply.send(self.controller.set_camera_enabled(on));
            }
            Command::SetMic(on, reply) => {
                let _ = reply.send(self.controller.set_mic_enabled(on));
            }
            Command::SetSpeakerphone(use_speaker) => {
                self.controller.set_speakerphone(use_speaker)
            }
            Command::SetResolution(label) => {
                let resolution = self.controller.set_video_resolution(&label);
                self.persist(move |s| s.resolution = resolution.label().to_string());
            }
            Command::SetAudioQuality(label) => {
                let quality = self.controller.set_audio_profile(&label);
                self.persist(move |s| s.audio_quality = quality.label().to_string());
            }
            Command::SetMirror(mirror) => {
                self.controller.set_mirror(mirror);
                self.persist(move |s| s.mirror = mirror);
            }
            Command::SwitchCamera(front) => self.controller.switch_camera(front),
            Command::BindLocalCanvas(is_screen, reply) => {
                let _ = reply.send(self.controller.bind_local_canvas(is_screen));
            }
            Command::BindRemoteCanvas {
                user_id,
                is_screen,
                reply,
            } => {
                let _ = reply.send(self.controller.bind_remote_canvas(&user_id, is_screen));
            }
            Command::Participants(reply) => {
                let _ = reply.send(self.controller.snapshot());
            }
            Command::LocalState(reply) => {
                let _ = reply.send(self.controller.state().clone());
            }
            // handled in `run`
            Command::Shutdown(reply) => {
                let _ = reply.send(());
            }
        }
    }

    fn enter_room(
        &mut self,
        room_id: String,
        reply: oneshot::Sender<Result<JoinedRoom, VcallError>>,
    ) {
        // Only one room at a time: entering another one ends the current call.
        self.leave(EndReason::Left);

        let Some(tx) = self.tx.upgrade() else {
            let _ = reply.send(Err(VcallError::SessionClosed));
            return;
        };
        self.join_epoch += 1;
        let epoch = self.join_epoch;
        self.pending_join = Some(PendingJoin { epoch, reply });

        let rts = self.rts.clone();
        tokio::spawn(async move {
            let result = rts.request_join_room(&room_id).await;
            let _ = tx.send(Inbound::JoinFinished {
                epoch,
                room_id,
                result,
            });
        });
    }

    fn on_join_finished(
        &mut self,
        epoch: u64,
        room_id: String,
        result: Result<JoinRoomResponse, VcallError>,
    ) {
        let pending = match self.pending_join.take() {
            Some(pending) if pending.epoch == epoch => pending,
            other => {
                self.pending_join = other;
                tracing::debug!("dropping stale join result for room {room_id}");
                // The server still holds a seat for us; give it back.
                if result.is_ok() {
                    self.spawn_leave_request(room_id);
                }
                return;
            }
        };

        match result {
            Ok(joined) => {
                tracing::info!(
                    "entered room {room_id}, {}s remaining",
                    joined.duration
                );
                self.controller.join_room(&room_id, &joined.rtc_token);
                self.current_room = Some(room_id.clone());
                let duration = Duration::from_secs(joined.duration);
                let closes_at = Utc::now()
                    + chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::zero());
                let _ = pending.reply.send(Ok(JoinedRoom {
                    room_id,
                    rtc_token: joined.rtc_token,
                    duration,
                    closes_at,
                }));
            }
            Err(e) => {
                tracing::warn!("join request for room {room_id} failed: {e}");
                self.emitter.emit(CallEvent::Notice(notice_for(&e)));
                let _ = pending.reply.send(Err(e));
            }
        }
    }

    fn on_signal(&mut self, signal: ControllerSignal) {
        match signal {
            ControllerSignal::Reconnected { room_id } => {
                if self.current_room.as_deref() != Some(room_id.as_str()) {
                    tracing::debug!("reconnect for room {room_id} we are not in, ignoring");
                    return;
                }
                let Some(tx) = self.tx.upgrade() else {
                    return;
                };
                self.reconnect_epoch += 1;
                let epoch = self.reconnect_epoch;
                let rts = self.rts.clone();
                tokio::spawn(async move {
                    let result = rts.request_reconnect(&room_id).await;
                    let _ = tx.send(Inbound::ReconnectFinished {
                        epoch,
                        room_id,
                        result,
                    });
                });
            }
        }
    }

    fn on_reconnect_finished(
        &mut self,
        epoch: u64,
        room_id: String,
        result: Result<ReconnectResponse, VcallError>,
    ) {
        if epoch != self.reconnect_epoch
            || self.current_room.as_deref() != Some(room_id.as_str())
        {
            tracing::debug!("dropping stale reconnect result for room {room_id}");
            return;
        }
        match result {
            Ok(reconnected) => {
                tracing::info!("reconnected to room {room_id}");
                self.controller.update_token(&reconnected.rtc_token);
            }
            Err(e) => {
                tracing::warn!("reconnect to room {room_id} failed: {e}");
                self.emitter.emit(CallEvent::Notice(notice_for(&e)));
                self.leave(EndReason::ReconnectFailed);
            }
        }
    }

    fn on_broadcast(&mut self, broadcast: ServerBroadcast) {
        match broadcast {
            ServerBroadcast::RoomClosed { room_id } => {
                if self.current_room.as_deref() != Some(room_id.as_str()) {
                    tracing::debug!("room {room_id} closed, not ours");
                    return;
                }
                tracing::info!("room {room_id} closed by the server");
                self.emitter.emit(CallEvent::RoomClosed { room_id });
                self.emitter
                    .emit(CallEvent::Notice(Notice::RoomTimeLimitReached));
                self.leave(EndReason::RoomClosed);
            }
        }
    }

    /// End the current call, if any, and cancel whatever is in flight.
    fn leave(&mut self, reason: EndReason) {
        self.join_epoch += 1;
        self.reconnect_epoch += 1;
        if let Some(pending) = self.pending_join.take() {
            let _ = pending.reply.send(Err(VcallError::Superseded));
        }

        let Some(room_id) = self.current_room.take() else {
            return;
        };
        tracing::info!("leaving room {room_id}: {reason:?}");
        self.controller.leave_room();
        self.spawn_leave_request(room_id);
        self.emitter.emit(CallEvent::SessionEnded(reason));
    }

    /// Apply a preference change now and write it to disk off the session task.
    fn persist(&self, change: impl FnOnce(&mut CallSettings)) {
        let Some(settings) = &self.settings else {
            return;
        };
        settings.update(change);
        let settings = settings.clone();
        tokio::task::spawn_blocking(move || settings.save());
    }

    /// Fire-and-forget: failures are logged and otherwise ignored.
    fn spawn_leave_request(&self, room_id: String) {
        let rts = self.rts.clone();
        tokio::spawn(async move {
            if let Err(e) = rts.request_leave_room(&room_id).await {
                tracing::warn!("leave request for room {room_id} failed: {e}");
            }
        });
    }
}

fn notice_for(error: &VcallError) -> Notice {
    match error {
        VcallError::Request { code, message, .. } => Notice::RequestFailed {
            code: *code,
            message: message.clone(),
        },
        other => Notice::RequestFailed {
            code: -1,
            message: other.to_string(),
        },
    }
}
