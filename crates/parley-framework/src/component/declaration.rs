use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use parley_core::ParleyResult;
use serde_json::{Map, Value};

use crate::conversation::Conversation;
use crate::plugin::{PipelineHandler, short_type_name};

/// Handler key for the launch intent.
pub const LAUNCH: &str = "LAUNCH";
/// Handler key for the session end intent.
pub const END: &str = "END";
/// Handler key of the fallback used when nothing else matched.
pub const UNHANDLED: &str = "UNHANDLED";

/// One entry of a component's handler table.
#[derive(Clone)]
pub struct ComponentHandler {
    key: String,
    intents: Vec<String>,
    global: bool,
    callback: PipelineHandler,
}

impl ComponentHandler {
    /// Handler key used by `redirect`/`delegate`.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Intents this handler answers.
    pub fn intents(&self) -> &[String] {
        &self.intents
    }

    /// Reachable from anywhere in the tree.
    pub fn is_global(&self) -> bool {
        self.global
    }

    pub fn matches(&self, intent: &str) -> bool {
        self.intents.iter().any(|i| i == intent)
    }

    pub fn callback(&self) -> &PipelineHandler {
        &self.callback
    }
}

impl fmt::Debug for ComponentHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentHandler")
            .field("key", &self.key)
            .field("intents", &self.intents)
            .field("global", &self.global)
            .finish_non_exhaustive()
    }
}

/// Declares a component for registration.
///
/// ```rust,ignore
/// let help = ComponentDeclaration::new("Help")
///     .parent("Root")
///     .handler("HelpIntent", |c| Box::pin(async move {
///         c.tell("Ask me anything.");
///         Ok(())
///     }));
/// ```
#[derive(Clone, Debug)]
pub struct ComponentDeclaration {
    pub(crate) name: String,
    pub(crate) parent: Option<String>,
    pub(crate) global: bool,
    pub(crate) config: Value,
    pub(crate) handlers: Vec<ComponentHandler>,
}

impl ComponentDeclaration {
    /// Declares a component named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            global: false,
            config: Value::Object(Map::new()),
            handlers: Vec::new(),
        }
    }

    /// Declares a component named after the Rust type `T`.
    pub fn of<T: ?Sized>() -> Self {
        Self::new(short_type_name(type_name::<T>()))
    }

    /// Sets the fully-qualified path of the parent component.
    pub fn parent(mut self, path: impl Into<String>) -> Self {
        self.parent = Some(path.into());
        self
    }

    /// Makes every handler of this component reachable from anywhere.
    pub fn global(mut self, global: bool) -> Self {
        self.global = global;
        self
    }

    /// Static configuration.
    pub fn config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    /// Adds a handler answering the intent `key`.
    pub fn handler<F>(self, key: impl Into<String>, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Conversation) -> BoxFuture<'a, ParleyResult<()>>
            + Send
            + Sync
            + 'static,
    {
        let key = key.into();
        self.push(key.clone(), vec![key], false, Arc::new(f))
    }

    /// Adds a handler answering any of `intents`.
    pub fn handler_for<I, S, F>(self, key: impl Into<String>, intents: I, f: F) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
        F: for<'a> Fn(&'a mut Conversation) -> BoxFuture<'a, ParleyResult<()>>
            + Send
            + Sync
            + 'static,
    {
        let intents = intents.into_iter().map(Into::into).collect();
        self.push(key.into(), intents, false, Arc::new(f))
    }

    /// Adds a handler for `key` that is reachable from anywhere.
    pub fn global_handler<F>(self, key: impl Into<String>, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Conversation) -> BoxFuture<'a, ParleyResult<()>>
            + Send
            + Sync
            + 'static,
    {
        let key = key.into();
        self.push(key.clone(), vec![key], true, Arc::new(f))
    }

    /// Adds the [`LAUNCH`] handler.
    pub fn on_launch<F>(self, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Conversation) -> BoxFuture<'a, ParleyResult<()>>
            + Send
            + Sync
            + 'static,
    {
        self.handler(LAUNCH, f)
    }

    /// Adds the [`UNHANDLED`] fallback.
    pub fn unhandled<F>(self, f: F) -> Self
    where
        F: for<'a> Fn(&'a mut Conversation) -> BoxFuture<'a, ParleyResult<()>>
            + Send
            + Sync
            + 'static,
    {
        self.handler(UNHANDLED, f)
    }

    fn push(
        mut self,
        key: String,
        intents: Vec<String>,
        global: bool,
        callback: PipelineHandler,
    ) -> Self {
        self.handlers.retain(|h| h.key != key);
        self.handlers.push(ComponentHandler {
            key,
            intents,
            global,
            callback,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fully-qualified path this declaration resolves to.
    pub fn path(&self) -> String {
        match &self.parent {
            Some(parent) => format!("{parent}.{}", self.name),
            None => self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct OrderPizza;

    fn noop(_: &mut Conversation) -> BoxFuture<'_, ParleyResult<()>> {
        Box::pin(async { Ok(()) })
    }

    #[test]
    fn test_path_and_default_name() {
        let decl = ComponentDeclaration::of::<OrderPizza>().parent("Root.Menu");
        assert_eq!(decl.name(), "OrderPizza");
        assert_eq!(decl.path(), "Root.Menu.OrderPizza");
        assert_eq!(ComponentDeclaration::new("Root").path(), "Root");
    }

    #[test]
    fn test_handler_table() {
        let decl = ComponentDeclaration::new("Root")
            .on_launch(noop)
            .handler_for("Yes", ["YesIntent", "OkIntent"], noop)
            .global_handler("HelpIntent", noop)
            .handler("Yes", noop);

        let keys: Vec<_> = decl.handlers.iter().map(|h| h.key()).collect();
        assert_eq!(keys, vec![LAUNCH, "HelpIntent", "Yes"]);
        assert!(decl.handlers[1].is_global());
        assert!(decl.handlers[0].matches(LAUNCH));
        // Redeclaring a key replaces the earlier entry.
        assert!(!decl.handlers[2].matches("OkIntent"));
    }
}
