//! # Parley Core
//!
//! The core engine of the Parley conversational runtime.
//!
//! This crate holds the building blocks that every other layer depends on:
//!
//! - **Middleware**: named stages with ordered async handlers
//!   ([`MiddlewareCollection`]) and the fixed RIDR catalog ([`stage`])
//! - **Errors**: the unified [`ParleyError`]
//! - **Configuration merge**: [`deep_merge`] with replace-arrays semantics
//! - **Boundaries**: [`Transport`], [`RequestHandler`] and [`I18n`]
//!
//! ## Pipeline
//!
//! ```text
//! request.start ─▶ request ─▶ request.end
//!   ─▶ interpretation.{start,asr,nlu,end}
//!   ─▶ dialogue.{start,router,logic,end}
//!   ─▶ response.{start,output,tts,end}
//! ```
//!
//! Each arrow waits for every handler of the previous stage to finish.

pub mod error;
pub mod i18n;
pub mod merge;
pub mod middleware;
pub mod stage;
pub mod transport;

pub use error::{BoxError, LifecyclePhase, ParleyError, ParleyResult};
pub use i18n::{I18n, I18nConfig, ResourceI18n};
pub use merge::{deep_merge, merged};
pub use middleware::{MiddlewareCollection, StageHandler, stage_handler};
pub use stage::RIDR_STAGES;
pub use transport::{BoxedTransport, RequestHandler, Transport};

/// Re-exported so handler closures can name their return type.
pub use futures::future::BoxFuture;

/// Prelude for common imports.
pub mod prelude {
    pub use super::error::{ParleyError, ParleyResult};
    pub use super::middleware::{MiddlewareCollection, StageHandler};
    pub use super::stage;
    pub use super::transport::{RequestHandler, Transport};
    pub use futures::future::BoxFuture;
}
