//! Business-server messaging over the real-time signaling channel.
//!
//! Requests carry a fixed set of common parameters and are answered with a
//! `{code, message, data}` envelope. The server also pushes broadcasts,
//! which the host hands to [`RtsClient::parse_broadcast`].

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::VcallError;

pub const CMD_JOIN_ROOM: &str = "videocallJoinRoom";
pub const CMD_LEAVE_ROOM: &str = "videocallLeaveRoom";
pub const CMD_RECONNECT: &str = "videocallReconnect";
pub const ON_CLOSE_ROOM: &str = "videocallOnCloseRoom";

const CODE_SUCCESS: i32 = 200;

/// Connection parameters of the business server, obtained from the app-info
/// endpoint before a session starts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RtsInfo {
    pub app_id: String,
    #[serde(rename = "rtm_token")]
    pub rts_token: String,
    pub server_url: String,
    pub server_signature: String,
    /// Business id handed to the engine.
    #[serde(default)]
    pub bid: String,
}

impl RtsInfo {
    pub fn validate(&self) -> Result<(), VcallError> {
        let required = [
            ("app_id", &self.app_id),
            ("rtm_token", &self.rts_token),
            ("server_url", &self.server_url),
            ("server_signature", &self.server_signature),
        ];
        if let Some((name, _)) = required.iter().find(|(_, value)| value.trim().is_empty()) {
            return Err(VcallError::InvalidJoinParams(format!("{name} is empty")));
        }
        url::Url::parse(&self.server_url).map_err(|e| {
            VcallError::InvalidJoinParams(format!("server_url '{}': {e}", self.server_url))
        })?;
        Ok(())
    }
}

/// The signed-in user on whose behalf requests are made.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LocalUser {
    pub user_id: String,
    pub user_name: String,
    pub device_id: String,
    pub login_token: String,
}

/// Parameters shared by every business request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RtsRequest {
    pub app_id: String,
    pub room_id: String,
    pub user_id: String,
    pub event_name: String,
    pub request_id: String,
    pub device_id: String,
    pub login_token: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RtsResponse {
    pub code: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl RtsResponse {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            code: CODE_SUCCESS,
            message: "ok".into(),
            data,
        }
    }

    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: serde_json::Value::Null,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRoomResponse {
    /// Remaining room time, in seconds.
    pub duration: u64,
    pub rtc_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconnectResponse {
    pub rtc_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LeaveRoomResponse {}

/// Server-initiated messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerBroadcast {
    /// The room reached its time limit and was closed by the server.
    RoomClosed { room_id: String },
}

#[derive(Deserialize)]
struct RoomFinish {
    room_id: String,
}

/// Delivers requests to the business server.
#[async_trait]
pub trait RtsTransport: Send + Sync {
    async fn send(&self, request: RtsRequest) -> Result<RtsResponse, VcallError>;
}

#[derive(Clone)]
pub struct RtsClient {
    transport: Arc<dyn RtsTransport>,
    info: RtsInfo,
    user: LocalUser,
}

impl RtsClient {
    pub fn new(transport: Arc<dyn RtsTransport>, info: RtsInfo, user: LocalUser) -> Self {
        Self {
            transport,
            info,
            user,
        }
    }

    pub fn info(&self) -> &RtsInfo {
        &self.info
    }

    pub fn user(&self) -> &LocalUser {
        &self.user
    }

    pub async fn request_join_room(&self, room_id: &str) -> Result<JoinRoomResponse, VcallError> {
        self.request(CMD_JOIN_ROOM, room_id).await
    }

    pub async fn request_reconnect(&self, room_id: &str) -> Result<ReconnectResponse, VcallError> {
        self.request(CMD_RECONNECT, room_id).await
    }

    pub async fn request_leave_room(&self, room_id: &str) -> Result<LeaveRoomResponse, VcallError> {
        self.request(CMD_LEAVE_ROOM, room_id).await
    }

    /// Decode a server push. Unknown events and malformed payloads yield `None`.
    pub fn parse_broadcast(event: &str, payload: &str) -> Option<ServerBroadcast> {
        match event {
            ON_CLOSE_ROOM => match serde_json::from_str::<RoomFinish>(payload) {
                Ok(finish) => Some(ServerBroadcast::RoomClosed {
                    room_id: finish.room_id,
                }),
                Err(e) => {
                    tracing::warn!("malformed {event} payload: {e}");
                    None
                }
            },
            _ => {
                tracing::debug!("ignoring broadcast {event}");
                None
            }
        }
    }

    fn common_params(&self, event_name: &str, room_id: &str) -> RtsRequest {
        RtsRequest {
            app_id: self.info.app_id.clone(),
            room_id: room_id.to_string(),
            user_id: self.user.user_id.clone(),
            event_name: event_name.to_string(),
            request_id: uuid::Uuid::new_v4().to_string(),
            device_id: self.user.device_id.clone(),
            login_token: self.user.login_token.clone(),
        }
    }

    async fn request<T: DeserializeOwned>(
        &self,
        event_name: &str,
        room_id: &str,
    ) -> Result<T, VcallError> {
        let request = self.common_params(event_name, room_id);
        tracing::info!(
            "rts request {event_name} room={room_id} request_id={}",
            request.request_id
        );

        let response = self.transport.send(request).await?;
        if response.code != CODE_SUCCESS {
            tracing::warn!(
                "rts {event_name} rejected: {} {}",
                response.code,
                response.message
            );
            return Err(VcallError::Request {
                event: event_name.to_string(),
                code: response.code,
                message: response.message,
            });
        }

        // Empty bodies are valid for requests without a payload.
        let data = match response.data {
            serde_json::Value::Null => serde_json::Value::Object(Default::default()),
            data => data,
        };
        serde_json::from_value(data)
            .map_err(|e| VcallError::InvalidResponse(format!("{event_name}: {e}")))
    }
}
