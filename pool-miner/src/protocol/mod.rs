//! Pool wire protocol.
//!
//! Miners talk to the pool with newline-delimited JSON over TCP. Every
//! request carries an id echoed in its response; the server additionally
//! pushes one-way notifications without an id.
//!
//! ```text
//! -> {"id":1,"method":"login","params":{"login":"alice","pass":"x","hi":{...}}}
//! <- {"id":1,"result":{"status":"OK","id":"7","job":{...},"addms":[]}}
//! <- {"method":"newjob","params":{}}
//! -> {"id":2,"method":"getjob","params":{"hi":{...}}}
//! ```
//!
//! Outcomes are reported in a `status` string inside the result: `"OK"` for
//! success, anything else is a failure description the miner should treat
//! as opaque.

pub mod messages;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

pub use messages::{
    Addendum, GetFullScratchpadRequest, GetFullScratchpadResponse, GetJobRequest,
    GetJobResponse, HeightInfo, JobDetails, LoginRequest, LoginResponse, SubmitShareRequest,
    SubmitShareResponse,
};

/// Request methods understood by the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Method {
    Login,
    GetJob,
    GetFullScratchpad,
    SubmitShare,
}

impl Method {
    pub const ALL: [Method; 4] = [
        Method::Login,
        Method::GetJob,
        Method::GetFullScratchpad,
        Method::SubmitShare,
    ];
}

/// Method name of the server-to-miner job invalidation notice.
pub const NEW_JOB_NOTIFICATION: &str = "newjob";

/// Status reported to miners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
pub enum Status {
    #[strum(serialize = "OK")]
    Ok,
    #[strum(serialize = "session not initialized")]
    NotInitialized,
    #[strum(serialize = "unauthorized")]
    Unauthorized,
    #[strum(serialize = "insufficient difficulty")]
    InsufficientDifficulty,
    #[strum(serialize = "duplicate share")]
    DuplicateShare,
    #[strum(serialize = "stale job")]
    StaleJob,
    #[strum(serialize = "height mismatch")]
    HeightMismatch,
    #[strum(serialize = "resync failed")]
    ResyncFailed,
    #[strum(serialize = "full scratchpad required")]
    FullScratchpadRequired,
    #[strum(serialize = "no job available")]
    NoJob,
    #[strum(serialize = "internal error")]
    InternalError,
    #[strum(serialize = "invalid request")]
    InvalidRequest,
}

impl Status {
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

impl From<Status> for String {
    fn from(status: Status) -> String {
        status.as_str().to_string()
    }
}

/// Request envelope as received on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

/// Response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub id: u64,
    pub result: Value,
}

/// One-way notification envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEnvelope {
    pub method: String,
    pub params: Value,
}

impl NotificationEnvelope {
    pub fn new_job() -> Self {
        Self {
            method: NEW_JOB_NOTIFICATION.to_string(),
            params: Value::Object(Default::default()),
        }
    }
}

/// Any message a miner may receive from the pool.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    Response(ResponseEnvelope),
    Notification(NotificationEnvelope),
}

/// Errors decoding a request line.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unknown method: {0}")]
    UnknownMethod(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use test_case::test_case;

    #[test_case("login", Method::Login)]
    #[test_case("getjob", Method::GetJob)]
    #[test_case("getfullscratchpad", Method::GetFullScratchpad)]
    #[test_case("submitshare", Method::SubmitShare)]
    fn test_method_tags(tag: &str, method: Method) {
        assert_eq!(Method::from_str(tag).unwrap(), method);
        assert_eq!(method.as_ref(), tag);
    }

    #[test]
    fn test_unknown_method_tag() {
        assert!(Method::from_str("mining.subscribe").is_err());
    }

    #[test]
    fn test_status_strings() {
        assert_eq!(Status::Ok.as_str(), "OK");
        assert_eq!(Status::DuplicateShare.to_string(), "duplicate share");
        assert_eq!(String::from(Status::NotInitialized), "session not initialized");
        assert_eq!(Status::StaleJob.as_str(), "stale job");
    }

    #[test]
    fn test_request_envelope_without_params() {
        let env: RequestEnvelope =
            serde_json::from_str(r#"{"id":4,"method":"getfullscratchpad"}"#).unwrap();
        assert_eq!(env.id, 4);
        assert!(env.params.is_null());
    }

    #[test]
    fn test_server_message_discriminates() {
        let resp: ServerMessage = serde_json::from_str(r#"{"id":1,"result":{"status":"OK"}}"#).unwrap();
        assert!(matches!(resp, ServerMessage::Response(r) if r.id == 1));

        let line = serde_json::to_string(&NotificationEnvelope::new_job()).unwrap();
        assert_eq!(line, r#"{"method":"newjob","params":{}}"#);
        let note: ServerMessage = serde_json::from_str(&line).unwrap();
        assert!(matches!(note, ServerMessage::Notification(n) if n.method == "newjob"));
    }
}
