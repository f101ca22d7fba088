//! In-process transport.
//!
//! A [`MemoryTransport`] carries a payload built in code. The app consumes the
//! transport, so the response is observed through a [`ResponseProbe`] taken
//! before handing it over:
//!
//! ```rust,ignore
//! let transport = MemoryTransport::new(json!({ "platform": "core" }));
//! let probe = transport.probe();
//! app.handle(Box::new(transport)).await?;
//! assert_eq!(probe.write_count(), 1);
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use parley_core::{ParleyResult, Transport};
use serde_json::Value;
use tracing::trace;

#[derive(Debug, Default)]
struct Slot {
    response: Mutex<Option<Value>>,
    writes: AtomicUsize,
}

/// A transport whose request lives in memory.
#[derive(Debug)]
pub struct MemoryTransport {
    request: Value,
    headers: HashMap<String, String>,
    slot: Arc<Slot>,
}

impl MemoryTransport {
    pub fn new(request: Value) -> Self {
        Self {
            request,
            headers: HashMap::new(),
            slot: Arc::default(),
        }
    }

    /// Adds a header; names are case-insensitive.
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Returns a handle that observes writes to this transport.
    pub fn probe(&self) -> ResponseProbe {
        ResponseProbe {
            slot: Arc::clone(&self.slot),
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn request_object(&self) -> &Value {
        &self.request
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    async fn set_response(&mut self, response: Value) -> ParleyResult<()> {
        trace!("Memory transport received response");
        *self.slot.response.lock() = Some(response);
        self.slot.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Observer for a [`MemoryTransport`]'s response.
#[derive(Debug, Clone)]
pub struct ResponseProbe {
    slot: Arc<Slot>,
}

impl ResponseProbe {
    /// The last response written, if any.
    pub fn response(&self) -> Option<Value> {
        self.slot.response.lock().clone()
    }

    /// How many times the response was written.
    pub fn write_count(&self) -> usize {
        self.slot.writes.load(Ordering::SeqCst)
    }
}
