//! # Parley Framework
//!
//! Building blocks an app is assembled from.
//!
//! This layer provides:
//! - The [`Plugin`] trait and the [`PluginRegistry`] that folds plugin
//!   handlers into the middleware collection
//! - Dialogue components ([`ComponentDeclaration`], [`ComponentTree`])
//! - The per-request context ([`HandleRequest`]) and conversational state
//!   ([`Conversation`])
//! - The [`Platform`] capability of platform adapters
//! - The built-in router and request logging plugins
//!
//! The app orchestrator that drives all of this lives in `parley-runtime`.

pub mod component;
pub mod config;
pub mod conversation;
pub mod handle_request;
pub mod platform;
pub mod plugin;
pub mod plugins;
pub mod usable;

pub use component::{ComponentDeclaration, ComponentHandler, ComponentNode, ComponentTree};
pub use config::{AppConfig, BasicLoggingConfig, LoggingOption, RoutingConfig};
pub use conversation::{
    Conversation, Input, InputType, OutputTemplate, Route, Session, StateStackItem, User,
};
pub use handle_request::{AppSnapshot, HandleRequest};
pub use platform::Platform;
pub use plugin::{
    InstallContext, PipelineHandler, Plugin, PluginContext, PluginHandle, PluginRegistry,
    PluginState,
};
pub use plugins::{BasicLoggingPlugin, RouterPlugin};
pub use usable::{Usable, register_usables};
