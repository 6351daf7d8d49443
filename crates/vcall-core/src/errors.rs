use thiserror::Error;

#[derive(Debug, Error)]
pub enum VcallError {
    #[error("invalid join parameters: {0}")]
    InvalidJoinParams(String),
    #[error("invalid room id: {0}")]
    InvalidRoomId(String),
    #[error("{event} failed with code {code}: {message}")]
    Request {
        event: String,
        code: i32,
        message: String,
    },
    #[error("signaling transport error: {0}")]
    Transport(String),
    #[error("http error: {0}")]
    Http(String),
    #[error("invalid server response: {0}")]
    InvalidResponse(String),
    #[error("request superseded by a newer one")]
    Superseded,
    #[error("call session closed")]
    SessionClosed,
}
