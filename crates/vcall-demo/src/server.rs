use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use vcall_core::VcallError;
use vcall_core::RtsTransport;
use vcall_core::rts::{CMD_JOIN_ROOM, CMD_LEAVE_ROOM, CMD_RECONNECT, RtsRequest, RtsResponse};

const ROOM_DURATION_SECS: u64 = 30 * 60;

/// In-process business server: hands out tokens and tracks who sits in
/// which room.
#[derive(Default)]
pub struct LoopbackServer {
    rooms: Mutex<HashMap<String, Vec<String>>>,
    issued: Mutex<u64>,
}

impl LoopbackServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Close a room and return the broadcast payload members receive.
    pub fn close_room(&self, room_id: &str) -> String {
        let members = self
            .rooms
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .remove(room_id)
            .unwrap_or_default();
        tracing::info!("server: closing room {room_id} with {} member(s)", members.len());
        serde_json::json!({ "room_id": room_id }).to_string()
    }

    fn token(&self, request: &RtsRequest) -> String {
        let mut issued = self.issued.lock().unwrap_or_else(|p| p.into_inner());
        *issued += 1;
        format!("rtc-{}-{}-{}", request.room_id, request.user_id, *issued)
    }
}

#[async_trait]
impl RtsTransport for LoopbackServer {
    async fn send(&self, request: RtsRequest) -> Result<RtsResponse, VcallError> {
        tracing::info!(
            "server: {} room={} user={}",
            request.event_name,
            request.room_id,
            request.user_id
        );
        let response = match request.event_name.as_str() {
            CMD_JOIN_ROOM => {
                self.rooms
                    .lock()
                    .unwrap_or_else(|p| p.into_inner())
                    .entry(request.room_id.clone())
                    .or_default()
                    .push(request.user_id.clone());
                RtsResponse::ok(serde_json::json!({
                    "duration": ROOM_DURATION_SECS,
                    "rtc_token": self.token(&request),
                }))
            }
            CMD_RECONNECT => {
                let open = self
                    .rooms
                    .lock()
                    .unwrap_or_else(|p| p.into_inner())
                    .contains_key(&request.room_id);
                if open {
                    RtsResponse::ok(serde_json::json!({ "rtc_token": self.token(&request) }))
                } else {
                    RtsResponse::error(404, "room has been closed")
                }
            }
            CMD_LEAVE_ROOM => {
                if let Some(members) = self
                    .rooms
                    .lock()
                    .unwrap_or_else(|p| p.into_inner())
                    .get_mut(&request.room_id)
                {
                    members.retain(|m| *m != request.user_id);
                }
                RtsResponse::ok(serde_json::Value::Null)
            }
            other => RtsResponse::error(400, format!("unknown event {other}")),
        };
        Ok(response)
    }
}
