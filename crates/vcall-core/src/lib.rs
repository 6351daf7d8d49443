//! Video call session core.
//!
//! Platform-independent call logic: who is in the room, what the local
//! camera and microphone are doing, and the conversation with the business
//! server. Media itself is handled by a vendor RTC engine behind the
//! [`RtcEngine`] trait; UI layers consume [`CallEvent`]s.

pub mod auth;
pub mod controller;
pub mod controls;
pub mod engine;
pub mod errors;
pub mod events;
pub mod participants;
pub mod render;
pub mod room;
pub mod rts;
pub mod settings;
pub mod stats;

#[cfg(test)]
mod testing;

pub use auth::{AppCredentials, AuthService};
pub use controller::{CallController, ControllerSignal};
pub use controls::{LocalMediaState, MediaControls};
pub use engine::{EngineEvent, EngineEventSink, Permissions, RtcEngine};
pub use errors::VcallError;
pub use events::{CallEvent, CallEventListener, EndReason, EventEmitter, Notice, Participant};
pub use participants::RosterStore;
pub use render::ViewId;
pub use room::{CallClient, JoinedRoom};
pub use rts::{LocalUser, RtsClient, RtsInfo, RtsTransport};
pub use settings::{AudioQuality, CallSettings, SettingsStore, VideoResolution};
