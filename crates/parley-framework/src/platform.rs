//! Platform adapter capability.
//!
//! A platform adapter is a plugin that also implements [`Platform`] and
//! returns itself from [`Plugin::as_platform`](crate::plugin::Plugin::as_platform).
//! For every request the app asks platforms, in registration order, whether
//! they recognize the payload; the first that does builds the conversation.

use serde_json::Value;

use crate::conversation::Conversation;
use crate::handle_request::HandleRequest;

pub trait Platform: Send + Sync {
    /// Name recorded on conversations this platform creates.
    fn platform_name(&self) -> &str;

    /// Returns `true` if this platform understands `request`.
    fn is_request_relevant(&self, request: &Value) -> bool;

    /// Builds the conversation for a request this platform accepted.
    fn create_conversation(&self, request: HandleRequest) -> Conversation {
        Conversation::new(self.platform_name(), request)
    }
}
