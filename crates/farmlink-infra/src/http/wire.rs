//! Response bodies of the marketplace REST API that do not map directly
//! onto domain types.

use serde::Deserialize;

use farmlink_types::message::WireMessage;
use farmlink_types::session::SessionId;

#[derive(Debug, Deserialize)]
pub(crate) struct SessionResponse {
    #[serde(default)]
    pub session: Option<SessionId>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MaxSessionResponse {
    /// Null when no session exists yet.
    #[serde(default, rename = "maxSession", alias = "max_session")]
    pub max_session: Option<SessionId>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PostMessageResponse {
    pub message: WireMessage,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}
