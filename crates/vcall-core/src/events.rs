use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::engine::{LocalStreamStats, StreamIndex};
use crate::stats::RemoteStatsReport;

/// Events emitted by the core to UI listeners.
#[derive(Debug, Clone)]
pub enum CallEvent {
    ParticipantJoined(Participant),
    ParticipantLeft(Participant),
    /// Full visible roster, screen share first.
    RosterChanged(Vec<Participant>),
    MediaStatusChanged {
        user_id: String,
        kind: MediaKind,
        status: MediaStatus,
    },
    ScreenShareChanged { started: bool },
    AudioRouteChanged { speakerphone: bool },
    SpeakingChanged {
        user_id: String,
        stream: StreamIndex,
        speaking: bool,
    },
    LocalStreamStats(LocalStreamStats),
    RemoteStreamStats(RemoteStatsReport),
    /// The engine rejoined the room on its own; the access token must be refreshed.
    ReconnectOccurred { room_id: String },
    RoomClosed { room_id: String },
    Notice(Notice),
    SessionEnded(EndReason),
}

/// One call member, or the screen-share stream of a member.
///
/// Only `user_id` and `user_name` travel on the wire (as the engine's
/// user extra info); the media flags are local state.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Participant {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(skip)]
    pub mic_on: bool,
    #[serde(skip)]
    pub camera_on: bool,
    #[serde(skip)]
    pub is_screen_share: bool,
}

impl Participant {
    pub fn new(user_id: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
            ..Default::default()
        }
    }

    /// A participant whose display name is unknown; the id stands in for it.
    pub fn anonymous(user_id: impl Into<String>) -> Self {
        let user_id = user_id.into();
        Self::new(user_id.clone(), user_id)
    }

    pub fn screen_share(user_id: impl Into<String>, user_name: impl Into<String>) -> Self {
        Self {
            is_screen_share: true,
            mic_on: true,
            camera_on: true,
            ..Self::new(user_id, user_name)
        }
    }

    /// A user and that user's screen-share stream are distinct entities.
    pub fn same_entity(&self, other: &Participant) -> bool {
        self.user_id == other.user_id && self.is_screen_share == other.is_screen_share
    }

    /// First character of the trimmed display name, used for avatar tiles.
    pub fn name_prefix(&self) -> String {
        self.user_name
            .trim()
            .chars()
            .next()
            .map(String::from)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaStatus {
    On,
    Off,
}

impl From<bool> for MediaStatus {
    fn from(on: bool) -> Self {
        if on { MediaStatus::On } else { MediaStatus::Off }
    }
}

impl MediaStatus {
    pub fn is_on(self) -> bool {
        self == MediaStatus::On
    }
}

/// User-facing warnings, shown once as a toast by the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    CameraPermissionDisabled,
    MicrophonePermissionDisabled,
    RequestFailed { code: i32, message: String },
    RoomTimeLimitReached,
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::CameraPermissionDisabled => {
                f.write_str("Camera permission is disabled, please enable it in system settings")
            }
            Notice::MicrophonePermissionDisabled => f.write_str(
                "Microphone permission is disabled, please enable it in system settings",
            ),
            Notice::RequestFailed { code, message } if message.is_empty() => {
                write!(f, "Request failed (error {code})")
            }
            Notice::RequestFailed { message, .. } => f.write_str(message),
            Notice::RoomTimeLimitReached => {
                f.write_str("This call has reached its maximum duration")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    Left,
    RoomClosed,
    ReconnectFailed,
}

/// Trait for receiving events from the core.
/// Implementations must be Send + Sync (called from the session task).
pub trait CallEventListener: Send + Sync {
    fn on_event(&self, event: CallEvent);
}

/// Forwards events into a channel drained by the UI context.
struct ChannelListener {
    tx: mpsc::UnboundedSender<CallEvent>,
}

impl CallEventListener for ChannelListener {
    fn on_event(&self, event: CallEvent) {
        // A dropped receiver just means that UI surface went away.
        let _ = self.tx.send(event);
    }
}

/// Internal event emitter that dispatches to registered listeners.
#[derive(Clone)]
pub struct EventEmitter {
    listeners: Arc<RwLock<Vec<Arc<dyn CallEventListener>>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn add_listener(&self, listener: Arc<dyn CallEventListener>) {
        let mut listeners = self
            .listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        listeners.push(listener);
    }

    /// Register a channel-backed listener and hand back its receiving end.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<CallEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.add_listener(Arc::new(ChannelListener { tx }));
        rx
    }

    /// Listeners run outside the lock, so they may register others.
    pub fn emit(&self, event: CallEvent) {
        let listeners: Vec<_> = self
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for listener in &listeners {
            listener.on_event(event.clone());
        }
    }
}

impl Default for EventEmitter {
    fn default() -> Self {
        Self::new()
    }
}
