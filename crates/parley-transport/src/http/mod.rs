//! HTTP webhook transport.
//!
//! Platforms deliver requests as JSON `POST`s to a single path; the response
//! payload is returned in the HTTP response body.

#[cfg(feature = "http-server")]
mod server;
#[cfg(feature = "http-server")]
pub use server::{HttpServer, HttpTransport, ListenerHandle};

/// Bind address and path of the webhook server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpServerConfig {
    /// `host:port` to bind; port `0` picks a free one.
    pub addr: String,
    /// Path requests are POSTed to.
    pub path: String,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:3000".to_string(),
            path: "/webhook".to_string(),
        }
    }
}

impl HttpServerConfig {
    pub fn new(addr: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            path: path.into(),
        }
    }

    /// The path with a leading `/`.
    pub fn normalized_path(&self) -> String {
        if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        }
    }
}
