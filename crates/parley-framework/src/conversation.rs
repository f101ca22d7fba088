//! Conversational state for one request.
//!
//! The bound platform creates one [`Conversation`] per request. It owns the
//! request context, the raw payload, the normalized [`Input`], the output
//! templates handlers produce, and the response payload the platform renders
//! from them. Session and user data come from (and go back to) the platform.

use std::fmt;

use parley_core::{ParleyError, ParleyResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::component::{ComponentNode, END, LAUNCH};
use crate::handle_request::HandleRequest;

// ─── Input ────────────────────────────────────────────────────────────────────

/// Kind of user input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InputType {
    Launch,
    Intent,
    Text,
    End,
    Error,
    #[default]
    Unknown,
}

/// Platform-independent view of what the user said or did.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Input {
    #[serde(rename = "type", default)]
    pub input_type: InputType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub entities: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

impl Input {
    /// Intent name used for routing. Launch and end inputs map to the
    /// [`LAUNCH`] and [`END`] handler keys.
    pub fn resolved_intent(&self) -> Option<&str> {
        match self.input_type {
            InputType::Launch => Some(LAUNCH),
            InputType::End => Some(END),
            _ => self.intent.as_deref(),
        }
    }
}

// ─── Output ───────────────────────────────────────────────────────────────────

/// One piece of output produced by a handler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputTemplate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reprompt: Option<String>,
    /// Whether the session stays open after this output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listen: Option<bool>,
}

// ─── Routing and state ────────────────────────────────────────────────────────

/// Handler the router selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Component path.
    pub path: String,
    /// Handler key within the component.
    pub handler: String,
    /// Intent after the intent map was applied.
    pub resolved_intent: String,
    /// Found through global handler discovery.
    pub global: bool,
}

/// One frame of the component state stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateStackItem {
    pub component: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
}

impl StateStackItem {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            data: Map::new(),
        }
    }
}

/// Session data carried between requests by the platform.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default)]
    pub state: Vec<StateStackItem>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// User identity and data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub data: Map<String, Value>,
}

// =============================================================================
// Conversation
// =============================================================================

pub struct Conversation {
    handle_request: HandleRequest,
    platform: String,
    request: Value,
    response: Option<Value>,
    route: Option<Route>,

    /// Normalized input, filled by the platform.
    pub input: Input,
    /// Output produced so far, in order.
    pub output: Vec<OutputTemplate>,
    pub session: Session,
    pub user: User,
}

impl Conversation {
    /// Creates the conversation for `handle_request`'s payload.
    pub fn new(platform: impl Into<String>, handle_request: HandleRequest) -> Self {
        let request = handle_request.server().request_object().clone();
        Self {
            handle_request,
            platform: platform.into(),
            request,
            response: None,
            route: None,
            input: Input::default(),
            output: Vec::new(),
            session: Session::default(),
            user: User::default(),
        }
    }

    pub fn handle_request(&self) -> &HandleRequest {
        &self.handle_request
    }

    pub fn handle_request_mut(&mut self) -> &mut HandleRequest {
        &mut self.handle_request
    }

    pub fn into_handle_request(self) -> HandleRequest {
        self.handle_request
    }

    /// Name of the platform that created this conversation.
    pub fn platform(&self) -> &str {
        &self.platform
    }

    /// Raw inbound payload.
    pub fn request(&self) -> &Value {
        &self.request
    }

    /// Outbound payload; absent until a platform builds it.
    pub fn response(&self) -> Option<&Value> {
        self.response.as_ref()
    }

    pub fn set_response(&mut self, response: Value) {
        self.response = Some(response);
    }

    pub fn take_response(&mut self) -> Option<Value> {
        self.response.take()
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    pub fn set_route(&mut self, route: Route) {
        self.route = Some(route);
    }

    // ─── Output helpers ──────────────────────────────────────────────────

    pub fn add_output(&mut self, output: OutputTemplate) {
        self.output.push(output);
    }

    /// Says `message` and ends the session.
    pub fn tell(&mut self, message: impl Into<String>) {
        self.add_output(OutputTemplate {
            message: Some(message.into()),
            reprompt: None,
            listen: Some(false),
        });
    }

    /// Says `message` and waits for an answer.
    pub fn ask(&mut self, message: impl Into<String>, reprompt: impl Into<String>) {
        self.add_output(OutputTemplate {
            message: Some(message.into()),
            reprompt: Some(reprompt.into()),
            listen: Some(true),
        });
    }

    // ─── Components ──────────────────────────────────────────────────────

    /// The component routing selected for this request.
    pub fn current_component(&self) -> Option<&ComponentNode> {
        self.handle_request.components().get_current()
    }

    /// Request-scoped data of the current component.
    pub fn component_data(&self) -> Option<&Map<String, Value>> {
        self.current_component().map(ComponentNode::data)
    }

    pub fn component_data_mut(&mut self) -> Option<&mut Map<String, Value>> {
        self.handle_request
            .components_mut()
            .get_current_mut()
            .map(ComponentNode::data_mut)
    }

    /// Replaces the top of the state stack with `path` and runs `handler`.
    pub async fn redirect(&mut self, path: &str, handler: &str) -> ParleyResult<()> {
        self.session.state.pop();
        self.session.state.push(StateStackItem::new(path));
        debug!(component = path, handler, "Redirecting");
        self.run_handler(path, handler).await
    }

    /// Pushes `path` on the state stack and runs `handler`.
    pub async fn delegate(&mut self, path: &str, handler: &str) -> ParleyResult<()> {
        self.session.state.push(StateStackItem::new(path));
        debug!(component = path, handler, "Delegating");
        self.run_handler(path, handler).await
    }

    /// Pops the current component off the state stack and makes the caller
    /// current again.
    pub fn resolve(&mut self) -> Option<StateStackItem> {
        let finished = self.session.state.pop()?;
        if let Some(parent) = self.session.state.last() {
            let path = parent.component.clone();
            self.handle_request.components_mut().set_current(&path);
        }
        Some(finished)
    }

    /// Runs the handler `key` of the component at `path`.
    pub async fn run_handler(&mut self, path: &str, key: &str) -> ParleyResult<()> {
        let tree = self.handle_request.components_mut();
        let callback = {
            let node = tree
                .get_node_at(path)
                .ok_or_else(|| ParleyError::ComponentNotFound(path.to_string()))?;
            let handler = node.handler(key).ok_or_else(|| ParleyError::HandlerNotFound {
                path: path.to_string(),
                handler: key.to_string(),
            })?;
            handler.callback().clone()
        };
        tree.set_current(path);
        callback(self).await
    }

    // ─── i18n ────────────────────────────────────────────────────────────

    /// Locale of the input, or the configured fallback.
    pub fn locale(&self) -> &str {
        self.input
            .locale
            .as_deref()
            .unwrap_or(&self.handle_request.config().i18n.fallback_locale)
    }

    /// Translates `key` for the conversation's locale.
    pub fn t(&self, key: &str, args: &Map<String, Value>) -> String {
        self.handle_request.translate(key, self.locale(), args)
    }
}

impl fmt::Debug for Conversation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Conversation")
            .field("platform", &self.platform)
            .field("input", &self.input)
            .field("output", &self.output)
            .field("route", &self.route)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
