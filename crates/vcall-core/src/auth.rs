use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::VcallError;
use crate::rts::RtsInfo;

const SET_APP_INFO: &str = "setAppInfo";
const CODE_SUCCESS: i32 = 200;

static ROOM_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{1,18}$").expect("room id pattern is valid"));

/// Application credentials issued by the RTC console.
#[derive(Debug, Clone, Default)]
pub struct AppCredentials {
    pub app_id: String,
    pub app_key: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

#[derive(Serialize)]
struct AppInfoContent<'a> {
    app_id: &'a str,
    app_key: &'a str,
    volc_ak: &'a str,
    volc_sk: &'a str,
    scenes_name: &'a str,
    login_token: &'a str,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct AppInfoRequest {
    event_name: String,
    /// JSON document, sent as a string.
    content: String,
    device_id: String,
}

#[derive(Debug, Deserialize)]
struct AppInfoResponse {
    code: i32,
    #[serde(default)]
    message: String,
    response: Option<RtsInfo>,
}

/// Obtains business-server parameters and validates user input before a
/// session is started.
pub struct AuthService;

impl AuthService {
    /// Register the app with the login service and get the signaling
    /// parameters for `scenes_name`.
    pub async fn fetch_rts_info(
        endpoint: &str,
        scenes_name: &str,
        login_token: &str,
        device_id: &str,
        credentials: &AppCredentials,
    ) -> Result<RtsInfo, VcallError> {
        let body = Self::app_info_request(scenes_name, login_token, device_id, credentials)?;
        tracing::info!("requesting app info for scene {scenes_name} from {endpoint}");

        let resp = reqwest::Client::new()
            .post(endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| VcallError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(VcallError::Http(format!(
                "app info endpoint returned status {}",
                resp.status()
            )));
        }

        let text = resp
            .text()
            .await
            .map_err(|e| VcallError::Http(e.to_string()))?;
        Self::parse_app_info(&text)
    }

    /// Extract and validate a room id from user input.
    /// Room ids are 1 to 18 ASCII digits; surrounding whitespace is ignored.
    pub fn extract_room_id(input: &str) -> Result<String, VcallError> {
        let candidate = input.trim();
        if ROOM_ID.is_match(candidate) {
            Ok(candidate.to_string())
        } else {
            Err(VcallError::InvalidRoomId(format!(
                "expected up to 18 digits, got '{candidate}'"
            )))
        }
    }

    fn app_info_request(
        scenes_name: &str,
        login_token: &str,
        device_id: &str,
        credentials: &AppCredentials,
    ) -> Result<AppInfoRequest, VcallError> {
        let content = AppInfoContent {
            app_id: &credentials.app_id,
            app_key: &credentials.app_key,
            volc_ak: &credentials.access_key_id,
            volc_sk: &credentials.secret_access_key,
            scenes_name,
            login_token,
        };
        let content = serde_json::to_string(&content)
            .map_err(|e| VcallError::InvalidJoinParams(e.to_string()))?;
        Ok(AppInfoRequest {
            event_name: SET_APP_INFO.to_string(),
            content,
            device_id: device_id.to_string(),
        })
    }

    fn parse_app_info(body: &str) -> Result<RtsInfo, VcallError> {
        let parsed: AppInfoResponse = serde_json::from_str(body)
            .map_err(|e| VcallError::InvalidResponse(format!("app info: {e}")))?;
        if parsed.code != CODE_SUCCESS {
            return Err(VcallError::Request {
                event: SET_APP_INFO.to_string(),
                code: parsed.code,
                message: parsed.message,
            });
        }
        let info = parsed
            .response
            .ok_or_else(|| VcallError::InvalidResponse("app info: missing response".into()))?;
        info.validate()?;
        Ok(info)
    }
}
