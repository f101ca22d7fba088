//! Transport and request-handler interfaces.
//!
//! The engine never parses transport framing. A [`Transport`] hands over the
//! raw JSON payload of one inbound request and accepts the outbound payload;
//! a [`RequestHandler`] (the app) consumes transports. Concrete transports
//! live in `parley-transport` and depend only on these traits.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ParleyResult;

/// One inbound request and the channel its response is written to.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Returns a short name used in logs (e.g. `"http"`).
    fn name(&self) -> &'static str {
        "unknown"
    }

    /// Returns the raw inbound payload.
    fn request_object(&self) -> &Value;

    /// Returns a request header, when the transport has any.
    fn header(&self, _name: &str) -> Option<&str> {
        None
    }

    /// Writes the outbound payload.
    async fn set_response(&mut self, response: Value) -> ParleyResult<()>;
}

/// A boxed transport trait object.
pub type BoxedTransport = Box<dyn Transport>;

/// Anything that can process one transport's request to completion.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Processes the request carried by `server` and writes its response.
    async fn handle(&self, server: BoxedTransport) -> ParleyResult<()>;
}
