//! Wire format of the core platform.
//!
//! # Request
//!
//! ```json
//! {
//!   "platform": "core",
//!   "requestId": "2c1e...",
//!   "locale": "en",
//!   "input": { "type": "INTENT", "intent": "HelloIntent" },
//!   "session": { "id": "s-1", "state": [{ "component": "Love" }], "data": {} },
//!   "user": { "id": "u-1", "data": {} }
//! }
//! ```
//!
//! # Response
//!
//! ```json
//! {
//!   "platform": "core",
//!   "output": [{ "message": "Hello!", "listen": false }],
//!   "session": { "id": "s-1", "end": true, "state": [], "data": {} },
//!   "user": { "id": "u-1", "data": {} }
//! }
//! ```

use parley_framework::{Input, OutputTemplate, Session, StateStackItem, User};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreRequest {
    pub platform: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default)]
    pub input: Input,
    #[serde(default)]
    pub session: Session,
    #[serde(default)]
    pub user: User,
    /// Anything else the client sent, e.g. device information.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub context: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoreResponse {
    pub platform: String,
    pub output: Vec<OutputTemplate>,
    pub session: ResponseSession,
    pub user: User,
}

/// Session as returned to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// `true` when the client should not expect a follow-up turn.
    pub end: bool,
    pub state: Vec<StateStackItem>,
    pub data: Map<String, Value>,
}

impl ResponseSession {
    pub fn from_session(session: &Session, end: bool) -> Self {
        Self {
            id: session.id.clone(),
            end,
            // A finished session carries no component state into the next one.
            state: if end { Vec::new() } else { session.state.clone() },
            data: session.data.clone(),
        }
    }
}
