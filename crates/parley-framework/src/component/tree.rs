//! Component tree.
//!
//! Components are addressed by fully-qualified dotted paths (`Root.Help`).
//! The tree is built once at app start; every request works on a
//! [`snapshot`](ComponentTree::snapshot) whose data bags start empty.

use std::collections::{HashMap, HashSet};

use parley_core::{ParleyError, ParleyResult};
use serde_json::{Map, Value};
use tracing::debug;

use super::declaration::{ComponentDeclaration, ComponentHandler};

/// A registered component.
#[derive(Clone, Debug)]
pub struct ComponentNode {
    path: String,
    name: String,
    parent: Option<String>,
    global: bool,
    config: Value,
    handlers: Vec<ComponentHandler>,
    data: Map<String, Value>,
}

impl ComponentNode {
    fn from_declaration(path: String, decl: ComponentDeclaration) -> Self {
        Self {
            path,
            name: decl.name,
            parent: decl.parent,
            global: decl.global,
            config: decl.config,
            handlers: decl.handlers,
            data: Map::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parent path, if this is not a root component.
    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn is_global(&self) -> bool {
        self.global
    }

    pub fn config(&self) -> &Value {
        &self.config
    }

    pub fn handlers(&self) -> &[ComponentHandler] {
        &self.handlers
    }

    /// Returns the handler registered under `key`.
    pub fn handler(&self, key: &str) -> Option<&ComponentHandler> {
        self.handlers.iter().find(|h| h.key() == key)
    }

    /// Returns the first handler answering `intent`.
    pub fn handler_for_intent(&self, intent: &str) -> Option<&ComponentHandler> {
        self.handlers.iter().find(|h| h.matches(intent))
    }

    /// Handlers reachable regardless of the current position in the tree.
    pub fn global_handlers(&self) -> impl Iterator<Item = &ComponentHandler> {
        self.handlers
            .iter()
            .filter(move |h| self.global || h.is_global())
    }

    /// Request-scoped data.
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.data
    }
}

/// Registered components, in registration order.
#[derive(Clone, Debug, Default)]
pub struct ComponentTree {
    nodes: Vec<ComponentNode>,
    index: HashMap<String, usize>,
    current: Option<String>,
}

impl ComponentTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a batch of declarations.
    ///
    /// Parents may appear anywhere in the batch; members are registered
    /// parents-first. Nothing is registered when any member fails.
    pub fn add<I>(&mut self, declarations: I) -> ParleyResult<()>
    where
        I: IntoIterator<Item = ComponentDeclaration>,
    {
        let mut pending = Vec::new();
        let mut seen = HashSet::new();
        for decl in declarations {
            if decl.name.is_empty() || decl.name.contains('.') {
                return Err(ParleyError::Config(format!(
                    "invalid component name '{}'",
                    decl.name
                )));
            }
            let path = decl.path();
            if self.index.contains_key(&path) || !seen.insert(path.clone()) {
                return Err(ParleyError::DuplicateComponent { path });
            }
            pending.push((path, decl));
        }

        let mut known: HashSet<String> = self.index.keys().cloned().collect();
        let mut ordered = Vec::with_capacity(pending.len());
        while !pending.is_empty() {
            let (ready, waiting): (Vec<_>, Vec<_>) = pending.into_iter().partition(|(_, decl)| {
                decl.parent
                    .as_deref()
                    .is_none_or(|parent| known.contains(parent))
            });
            if ready.is_empty() {
                let (path, decl) = &waiting[0];
                return Err(ParleyError::MissingParent {
                    path: path.clone(),
                    parent: decl.parent.clone().unwrap_or_default(),
                });
            }
            for (path, decl) in ready {
                known.insert(path.clone());
                ordered.push((path, decl));
            }
            pending = waiting;
        }

        for (path, decl) in ordered {
            debug!(component = %path, "Component registered");
            self.index.insert(path.clone(), self.nodes.len());
            self.nodes.push(ComponentNode::from_declaration(path, decl));
        }
        Ok(())
    }

    pub fn get_node_at(&self, path: &str) -> Option<&ComponentNode> {
        self.index.get(path).map(|&i| &self.nodes[i])
    }

    pub fn get_node_at_mut(&mut self, path: &str) -> Option<&mut ComponentNode> {
        self.index.get(path).map(|&i| &mut self.nodes[i])
    }

    /// The component routing selected for this request.
    pub fn get_current(&self) -> Option<&ComponentNode> {
        self.current.as_deref().and_then(|p| self.get_node_at(p))
    }

    pub fn get_current_mut(&mut self) -> Option<&mut ComponentNode> {
        let path = self.current.clone()?;
        self.get_node_at_mut(&path)
    }

    /// Marks `path` as the active component. Returns `false` if it does not
    /// exist.
    pub fn set_current(&mut self, path: &str) -> bool {
        if !self.index.contains_key(path) {
            return false;
        }
        self.current = Some(path.to_string());
        true
    }

    /// `path` followed by each of its ancestors, nearest first.
    pub fn ancestors<'a>(
        &'a self,
        path: &str,
    ) -> impl Iterator<Item = &'a ComponentNode> + use<'a> {
        std::iter::successors(self.get_node_at(path), move |&node| {
            node.parent().and_then(|p| self.get_node_at(p))
        })
    }

    /// Every node in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &ComponentNode> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Independent copy with empty data bags and no current component.
    pub fn snapshot(&self) -> Self {
        let mut copy = self.clone();
        for node in &mut copy.nodes {
            node.data.clear();
        }
        copy.current = None;
        copy
    }
}
