//! Plugin registry.
//!
//! A [`PluginRegistry`] owns the registered plugins and the middleware
//! collection their handlers are folded into. Both the app and every request
//! context own one; the request's copy comes from
//! [`snapshot`](PluginRegistry::snapshot).
//!
//! # Registration
//!
//! 1. The effective config is the plugin's default with the partial config
//!    merged over it.
//! 2. In test mode, plugins with `skip_tests: true` are skipped.
//! 3. Stages the plugin declares are added to the catalog. They are removed
//!    again if any plugin of the tree fails to install.
//! 4. `install` runs; nested plugins it registers are installed the same way.
//! 5. Once the whole tree installed, every contribution is appended to the
//!    collection, parents first.
//!
//! Registering a name that already exists replaces the old entry in place and
//! removes its contributions. If both are the same Rust type, the new partial
//! config is merged over the old effective config instead of the default.

use std::any::TypeId;
use std::sync::Arc;

use parley_core::{
    LifecyclePhase, MiddlewareCollection, ParleyError, ParleyResult, RIDR_STAGES, merged,
};
use serde_json::Value;
use tracing::{debug, info};

use super::core::{
    InstallContext, PipelineHandler, Plugin, PluginContext, PluginHandle, PluginState,
};
use crate::conversation::Conversation;

/// Config key that marks a plugin as skipped in test mode.
pub const SKIP_TESTS_KEY: &str = "skip_tests";

// =============================================================================
// PluginEntry
// =============================================================================

/// A registered plugin.
#[derive(Clone)]
pub struct PluginEntry {
    name: String,
    plugin: Arc<dyn Plugin>,
    type_id: TypeId,
    config: Value,
    state: PluginState,
    contributions: Vec<(String, PipelineHandler)>,
    children: Vec<PluginEntry>,
}

impl PluginEntry {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn plugin(&self) -> &Arc<dyn Plugin> {
        &self.plugin
    }

    /// Effective config.
    pub fn config(&self) -> &Value {
        &self.config
    }

    pub fn state(&self) -> PluginState {
        self.state
    }

    /// Plugins registered by this plugin's `install` hook.
    pub fn children(&self) -> &[PluginEntry] {
        &self.children
    }

    fn walk<'a>(&'a self, out: &mut Vec<&'a PluginEntry>) {
        out.push(self);
        for child in &self.children {
            child.walk(out);
        }
    }

    fn find_mut(&mut self, name: &str) -> Option<&mut PluginEntry> {
        if self.name == name {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(name))
    }

    fn apply(&self, middleware: &MiddlewareCollection<Conversation>) -> ParleyResult<()> {
        for (stage, handler) in &self.contributions {
            middleware.use_handler(stage, Arc::clone(handler))?;
        }
        self.children.iter().try_for_each(|c| c.apply(middleware))
    }

    fn retract(&self, middleware: &MiddlewareCollection<Conversation>) {
        for (stage, handler) in &self.contributions {
            middleware.remove_handler(stage, handler);
        }
        for child in &self.children {
            child.retract(middleware);
        }
    }
}

/// A plugin queued for a lifecycle hook, detached from its registry.
#[derive(Clone)]
pub struct LifecycleTarget {
    pub name: String,
    pub plugin: Arc<dyn Plugin>,
    pub config: Value,
}

/// Runs every target's `initialize` hook in order, stopping at the first
/// failure.
pub async fn initialize_all(targets: &[LifecycleTarget]) -> ParleyResult<()> {
    for target in targets {
        let ctx = PluginContext::new(&target.name, &target.config);
        target
            .plugin
            .initialize(&ctx)
            .await
            .map_err(|e| ParleyError::lifecycle(&target.name, LifecyclePhase::Initialize, e))?;
        debug!(plugin = %target.name, "Plugin initialized");
    }
    Ok(())
}

// =============================================================================
// PluginRegistry
// =============================================================================

/// Registered plugins plus the middleware collection they contribute to.
pub struct PluginRegistry {
    entries: Vec<PluginEntry>,
    middleware: MiddlewareCollection<Conversation>,
    test_mode: bool,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new(RIDR_STAGES)
    }
}

impl PluginRegistry {
    /// Creates an empty registry whose catalog is `stages`.
    pub fn new<I, S>(stages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            entries: Vec::new(),
            middleware: MiddlewareCollection::new(stages),
            test_mode: false,
        }
    }

    /// Enables skipping of `skip_tests` plugins on later registrations.
    pub fn set_test_mode(&mut self, test_mode: bool) {
        self.test_mode = test_mode;
    }

    pub fn test_mode(&self) -> bool {
        self.test_mode
    }

    /// The collection plugin handlers are folded into.
    pub fn middleware(&self) -> &MiddlewareCollection<Conversation> {
        &self.middleware
    }

    /// Registers a plugin.
    ///
    /// Returns `Ok(false)` when the plugin was skipped because of test mode.
    pub fn register(&mut self, handle: PluginHandle) -> ParleyResult<bool> {
        let name = handle.name().to_string();
        let existing = self.entries.iter().position(|e| e.name == name);

        let base = match existing {
            Some(pos) if self.entries[pos].type_id == handle.type_id => {
                self.entries[pos].config.clone()
            }
            _ => handle.plugin.default_config(),
        };
        let config = merged(base, handle.config.clone());

        if self.test_mode && skips_tests(&config) {
            debug!(plugin = %name, "Skipping plugin in test mode");
            return Ok(false);
        }

        let mut added = Vec::new();
        let entry = match install_entry(&self.middleware, name, handle, config, &mut added) {
            Ok(entry) => entry,
            Err(e) => {
                for stage in &added {
                    self.middleware.remove_stage(stage);
                }
                return Err(e);
            }
        };

        if let Some(pos) = existing {
            self.entries[pos].retract(&self.middleware);
            debug!(plugin = %entry.name, "Replacing registered plugin");
        }
        entry.apply(&self.middleware)?;
        info!(plugin = %entry.name, children = entry.children.len(), "Plugin installed");

        match existing {
            Some(pos) => self.entries[pos] = entry,
            None => self.entries.push(entry),
        }
        Ok(true)
    }

    /// Top-level entries in registration order.
    pub fn entries(&self) -> &[PluginEntry] {
        &self.entries
    }

    /// Looks up a top-level plugin by name.
    pub fn get(&self, name: &str) -> Option<&PluginEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Looks up a plugin by name, including nested plugins.
    pub fn find(&self, name: &str) -> Option<&PluginEntry> {
        self.iter().into_iter().find(|e| e.name == name)
    }

    /// Mutable access to a plugin's effective config, including nested ones.
    pub fn config_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.entries
            .iter_mut()
            .find_map(|e| e.find_mut(name))
            .map(|e| &mut e.config)
    }

    /// Every plugin, parents before their nested plugins, in registration
    /// order.
    pub fn iter(&self) -> Vec<&PluginEntry> {
        let mut out = Vec::new();
        for entry in &self.entries {
            entry.walk(&mut out);
        }
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Detached lifecycle targets, so hooks can run without borrowing the
    /// registry.
    pub fn lifecycle_targets(&self) -> Vec<LifecycleTarget> {
        self.iter()
            .into_iter()
            .map(|e| LifecycleTarget {
                name: e.name.clone(),
                plugin: Arc::clone(&e.plugin),
                config: e.config.clone(),
            })
            .collect()
    }

    /// Runs every plugin's `initialize` hook once, in registration order.
    pub async fn initialize_plugins(&self) -> ParleyResult<()> {
        initialize_all(&self.lifecycle_targets()).await
    }

    /// Records a lifecycle state change.
    pub fn set_state(&mut self, name: &str, state: PluginState) {
        if let Some(entry) = self.entries.iter_mut().find_map(|e| e.find_mut(name)) {
            entry.state = state;
        }
    }

    /// Returns an independent registry: configs deep-copied, plugin
    /// instances shared, middleware snapshotted.
    pub fn snapshot(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            middleware: self.middleware.snapshot(),
            test_mode: self.test_mode,
        }
    }
}

fn skips_tests(config: &Value) -> bool {
    config
        .get(SKIP_TESTS_KEY)
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn install_entry(
    middleware: &MiddlewareCollection<Conversation>,
    name: String,
    handle: PluginHandle,
    config: Value,
    added: &mut Vec<String>,
) -> ParleyResult<PluginEntry> {
    for stage in handle.plugin.stages() {
        if middleware.add(stage.clone()) {
            debug!(plugin = %name, stage = %stage, "Stage added to catalog");
            added.push(stage);
        }
    }

    let (contributions, nested) = {
        let mut ctx = InstallContext::new(&name, &config, middleware);
        handle
            .plugin
            .install(&mut ctx)
            .map_err(|e| ParleyError::lifecycle(&name, LifecyclePhase::Install, e))?;
        (ctx.contributions, ctx.children)
    };

    let mut children: Vec<PluginEntry> = Vec::new();
    for child in nested {
        let child_name = child.name().to_string();
        let child_config = merged(child.plugin.default_config(), child.config.clone());
        let entry = install_entry(middleware, child_name, child, child_config, added)?;
        match children.iter().position(|c| c.name == entry.name) {
            Some(pos) => children[pos] = entry,
            None => children.push(entry),
        }
    }

    Ok(PluginEntry {
        name,
        plugin: handle.plugin,
        type_id: handle.type_id,
        config,
        state: PluginState::Installed,
        contributions,
        children,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parley_core::stage;
    use serde_json::json;

    use super::*;

    struct Counter {
        installs: Arc<AtomicUsize>,
        stage: &'static str,
    }

    impl Plugin for Counter {
        fn default_config(&self) -> Value {
            json!({ "level": 1, "nested": { "a": true } })
        }

        fn install(&self, ctx: &mut InstallContext<'_>) -> ParleyResult<()> {
            self.installs.fetch_add(1, Ordering::SeqCst);
            ctx.hook(self.stage, |_conversation| Box::pin(async { Ok(()) }))
        }
    }

    struct Other;

    impl Plugin for Other {
        fn name(&self) -> &str {
            "Counter"
        }
    }

    struct Parent;

    impl Plugin for Parent {
        fn stages(&self) -> Vec<String> {
            vec!["custom".to_string()]
        }

        fn install(&self, ctx: &mut InstallContext<'_>) -> ParleyResult<()> {
            ctx.hook("custom", |_c| Box::pin(async { Ok(()) }))?;
            ctx.register(PluginHandle::new(Child));
            Ok(())
        }
    }

    struct Child;

    impl Plugin for Child {
        fn install(&self, ctx: &mut InstallContext<'_>) -> ParleyResult<()> {
            ctx.hook("custom", |_c| Box::pin(async { Ok(()) }))
        }
    }

    struct BrokenParent;

    impl Plugin for BrokenParent {
        fn stages(&self) -> Vec<String> {
            vec!["broken".to_string()]
        }

        fn install(&self, ctx: &mut InstallContext<'_>) -> ParleyResult<()> {
            ctx.hook("broken", |_c| Box::pin(async { Ok(()) }))?;
            ctx.register(PluginHandle::new(Counter {
                installs: Arc::new(AtomicUsize::new(0)),
                stage: "not.a.stage",
            }));
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl Plugin for Failing {
        async fn initialize(&self, _ctx: &PluginContext<'_>) -> ParleyResult<()> {
            Err(ParleyError::other("no backend"))
        }
    }

    fn counter(installs: &Arc<AtomicUsize>) -> PluginHandle {
        PluginHandle::new(Counter {
            installs: Arc::clone(installs),
            stage: stage::DIALOGUE_START,
        })
    }

    #[test]
    fn test_register_merges_config_over_default() {
        let installs = Arc::new(AtomicUsize::new(0));
        let mut registry = PluginRegistry::default();
        registry
            .register(counter(&installs).with_config(json!({ "nested": { "b": 2 } })))
            .unwrap();

        let entry = registry.get("Counter").unwrap();
        assert_eq!(
            entry.config(),
            &json!({ "level": 1, "nested": { "a": true, "b": 2 } })
        );
        assert_eq!(entry.state(), PluginState::Installed);
        assert_eq!(installs.load(Ordering::SeqCst), 1);
        assert_eq!(registry.middleware().handler_count(stage::DIALOGUE_START), Some(1));
    }

    #[test]
    fn test_same_type_reregistration_merges_and_replaces_handlers() {
        let installs = Arc::new(AtomicUsize::new(0));
        let mut registry = PluginRegistry::default();
        registry
            .register(counter(&installs).with_config(json!({ "level": 5 })))
            .unwrap();
        registry
            .register(counter(&installs).with_config(json!({ "extra": true })))
            .unwrap();

        assert_eq!(registry.len(), 1);
        let config = registry.get("Counter").unwrap().config();
        assert_eq!(config["level"], json!(5));
        assert_eq!(config["extra"], json!(true));
        assert_eq!(registry.middleware().handler_count(stage::DIALOGUE_START), Some(1));
        assert_eq!(installs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_other_type_with_same_name_replaces() {
        let installs = Arc::new(AtomicUsize::new(0));
        let mut registry = PluginRegistry::default();
        registry
            .register(counter(&installs).with_config(json!({ "level": 5 })))
            .unwrap();
        registry.register(PluginHandle::new(Other)).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("Counter").unwrap().config(), &json!({}));
        assert_eq!(registry.middleware().handler_count(stage::DIALOGUE_START), Some(0));
    }

    #[test]
    fn test_skip_tests_only_in_test_mode() {
        let installs = Arc::new(AtomicUsize::new(0));
        let mut registry = PluginRegistry::default();
        registry.set_test_mode(true);
        let skipped = registry
            .register(counter(&installs).with_config(json!({ "skip_tests": true })))
            .unwrap();
        assert!(!skipped);
        assert!(registry.is_empty());

        registry.set_test_mode(false);
        assert!(
            registry
                .register(counter(&installs).with_config(json!({ "skip_tests": true })))
                .unwrap()
        );
    }

    #[test]
    fn test_unknown_stage_fails_install() {
        let installs = Arc::new(AtomicUsize::new(0));
        let mut registry = PluginRegistry::default();
        let err = registry
            .register(PluginHandle::new(Counter {
                installs,
                stage: "not.a.stage",
            }))
            .unwrap_err();
        assert!(matches!(err.root(), ParleyError::InvalidStage(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_failed_install_removes_added_stages() {
        let mut registry = PluginRegistry::default();
        let catalog = registry.middleware().names();

        let err = registry.register(PluginHandle::new(BrokenParent)).unwrap_err();
        assert!(matches!(err.root(), ParleyError::InvalidStage(_)));
        assert!(registry.is_empty());
        assert!(!registry.middleware().has("broken"));
        assert_eq!(registry.middleware().names(), catalog);

        // A stage that already existed is kept.
        registry.middleware().add("broken");
        registry.register(PluginHandle::new(BrokenParent)).unwrap_err();
        assert!(registry.middleware().has("broken"));
        assert_eq!(registry.middleware().handler_count("broken"), Some(0));
    }

    #[test]
    fn test_nested_plugins_fold_into_owner() {
        let mut registry = PluginRegistry::default();
        registry.register(PluginHandle::new(Parent)).unwrap();

        assert!(registry.middleware().has("custom"));
        assert_eq!(registry.middleware().handler_count("custom"), Some(2));
        let order: Vec<_> = registry.iter().iter().map(|e| e.name().to_string()).collect();
        assert_eq!(order, vec!["Parent", "Child"]);
        assert!(registry.find("Child").is_some());
        assert!(registry.get("Child").is_none());
    }

    #[test]
    fn test_snapshot_isolated() {
        let installs = Arc::new(AtomicUsize::new(0));
        let mut registry = PluginRegistry::default();
        registry.register(counter(&installs)).unwrap();

        let mut copy = registry.snapshot();
        copy.config_mut("Counter").unwrap()["level"] = json!(99);
        copy.middleware().clear();
        copy.set_state("Counter", PluginState::Mounted);

        let original = registry.get("Counter").unwrap();
        assert_eq!(original.config()["level"], json!(1));
        assert_eq!(original.state(), PluginState::Installed);
        assert_eq!(registry.middleware().handler_count(stage::DIALOGUE_START), Some(1));
        assert!(Arc::ptr_eq(
            original.plugin(),
            copy.get("Counter").unwrap().plugin()
        ));
    }

    #[test]
    fn test_initialize_fails_fast_with_plugin_name() {
        let mut registry = PluginRegistry::default();
        registry.register(PluginHandle::new(Failing)).unwrap();
        let err = tokio_test::block_on(registry.initialize_plugins()).unwrap_err();
        assert!(matches!(
            err,
            ParleyError::PluginLifecycle { ref plugin, phase: LifecyclePhase::Initialize, .. }
                if plugin == "Failing"
        ));
    }
}
