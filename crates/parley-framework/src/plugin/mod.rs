//! Plugin system.
//!
//! - [`Plugin`]: the trait every plugin implements
//! - [`PluginHandle`]: a plugin instance plus its partial config, ready to
//!   register
//! - [`PluginRegistry`]: registration, lifecycle and per-request snapshots

mod core;
pub mod registry;

pub use self::core::{
    InstallContext, PipelineHandler, Plugin, PluginContext, PluginHandle, PluginState,
    short_type_name,
};
pub use registry::{LifecycleTarget, PluginEntry, PluginRegistry, SKIP_TESTS_KEY, initialize_all};
