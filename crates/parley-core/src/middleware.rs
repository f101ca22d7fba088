//! Named middleware stages holding ordered handler lists.
//!
//! A [`MiddlewareCollection`] owns an ordered catalog of stages. Handlers are
//! registered against an existing stage and run sequentially, in registration
//! order, against a shared `&mut C` context:
//!
//! ```rust,ignore
//! let collection = MiddlewareCollection::<Vec<&str>>::new(["start", "end"]);
//! collection.on("start", |log| Box::pin(async move {
//!     log.push("started");
//!     Ok(())
//! }))?;
//!
//! let mut log = Vec::new();
//! collection.run(&["start", "end"], &mut log).await?;
//! ```
//!
//! # Sharing and snapshots
//!
//! `Clone` hands out another reference to the **same** stage storage; this is
//! how a handler reaches the collection that is running it (e.g. to stop the
//! rest of the pipeline). [`snapshot`](MiddlewareCollection::snapshot) produces
//! independent storage whose handler lists can be changed without affecting the
//! original; the handler closures themselves are shared.
//!
//! # Mutation during a run
//!
//! [`run`](MiddlewareCollection::run) takes the handler list of a stage when the
//! stage starts and, before each handler, checks that it is still registered.
//! Clearing a stage (or the whole collection) while it runs therefore prevents
//! every handler that has not started yet, and a handler removing itself never
//! shifts the ones after it out of the run. Handlers added to a stage that is
//! already running take effect from the next run.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::error::{ParleyError, ParleyResult};

/// A type-erased stage handler.
pub type StageHandler<C> =
    Arc<dyn for<'a> Fn(&'a mut C) -> BoxFuture<'a, ParleyResult<()>> + Send + Sync>;

/// Boxes a closure into a [`StageHandler`].
pub fn stage_handler<C, F>(f: F) -> StageHandler<C>
where
    F: for<'a> Fn(&'a mut C) -> BoxFuture<'a, ParleyResult<()>> + Send + Sync + 'static,
{
    Arc::new(f)
}

struct Stage<C> {
    name: String,
    handlers: Vec<StageHandler<C>>,
}

impl<C> Stage<C> {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handlers: Vec::new(),
        }
    }
}

impl<C> Clone for Stage<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            handlers: self.handlers.clone(),
        }
    }
}

/// An ordered set of named stages, each with an ordered handler list.
pub struct MiddlewareCollection<C> {
    stages: Arc<RwLock<Vec<Stage<C>>>>,
}

impl<C> Clone for MiddlewareCollection<C> {
    fn clone(&self) -> Self {
        Self {
            stages: Arc::clone(&self.stages),
        }
    }
}

impl<C> Default for MiddlewareCollection<C> {
    fn default() -> Self {
        Self {
            stages: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl<C> fmt::Debug for MiddlewareCollection<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stages = self.stages.read();
        f.debug_map()
            .entries(stages.iter().map(|s| (&s.name, s.handlers.len())))
            .finish()
    }
}

impl<C> MiddlewareCollection<C> {
    /// Creates a collection whose catalog is `names`, in order.
    ///
    /// Duplicate names are collapsed to their first occurrence.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let collection = Self::default();
        for name in names {
            collection.add(name);
        }
        collection
    }

    /// Adds a stage at the end of the catalog.
    ///
    /// Returns `false` when the stage already exists.
    pub fn add(&self, name: impl Into<String>) -> bool {
        let name = name.into();
        let mut stages = self.stages.write();
        if stages.iter().any(|s| s.name == name) {
            return false;
        }
        stages.push(Stage::new(name));
        true
    }

    /// Returns `true` if `name` is part of the catalog.
    pub fn has(&self, name: &str) -> bool {
        self.stages.read().iter().any(|s| s.name == name)
    }

    /// Returns the catalog in order.
    pub fn names(&self) -> Vec<String> {
        self.stages.read().iter().map(|s| s.name.clone()).collect()
    }

    /// Returns the number of handlers at `name`, or `None` for unknown stages.
    pub fn handler_count(&self, name: &str) -> Option<usize> {
        self.stages
            .read()
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.handlers.len())
    }

    /// Appends `handler` to the stage `name`.
    pub fn use_handler(&self, name: &str, handler: StageHandler<C>) -> ParleyResult<()> {
        let mut stages = self.stages.write();
        let stage = stages
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| ParleyError::InvalidStage(name.to_string()))?;
        stage.handlers.push(handler);
        Ok(())
    }

    /// Registers a closure at `name` and returns the stored handler so it can
    /// later be removed by reference.
    pub fn on<F>(&self, name: &str, f: F) -> ParleyResult<StageHandler<C>>
    where
        F: for<'a> Fn(&'a mut C) -> BoxFuture<'a, ParleyResult<()>> + Send + Sync + 'static,
    {
        let handler = stage_handler(f);
        self.use_handler(name, Arc::clone(&handler))?;
        Ok(handler)
    }

    /// Removes one handler from `name`, compared by reference.
    ///
    /// Returns `true` if the handler was found.
    pub fn remove_handler(&self, name: &str, handler: &StageHandler<C>) -> bool {
        let mut stages = self.stages.write();
        let Some(stage) = stages.iter_mut().find(|s| s.name == name) else {
            return false;
        };
        match stage.handlers.iter().position(|h| Arc::ptr_eq(h, handler)) {
            Some(pos) => {
                stage.handlers.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Clears the handler lists of the given stages.
    pub fn remove<S: AsRef<str>>(&self, names: &[S]) {
        let mut stages = self.stages.write();
        for stage in stages.iter_mut() {
            if names.iter().any(|n| n.as_ref() == stage.name) {
                stage.handlers.clear();
            }
        }
    }

    /// Clears every stage's handler list. The catalog is kept.
    pub fn clear(&self) {
        let mut stages = self.stages.write();
        for stage in stages.iter_mut() {
            stage.handlers.clear();
        }
        debug!("Cleared all middleware handlers");
    }

    /// Appends every handler of `other` to the stage with the same name,
    /// adding stages this collection does not know yet.
    pub fn merge(&self, other: &MiddlewareCollection<C>) {
        if Arc::ptr_eq(&self.stages, &other.stages) {
            return;
        }
        let incoming = other.stages.read().clone();
        let mut stages = self.stages.write();
        for stage in incoming {
            match stages.iter_mut().find(|s| s.name == stage.name) {
                Some(existing) => existing.handlers.extend(stage.handlers),
                None => stages.push(stage),
            }
        }
    }

    /// Returns an independent copy of the catalog and handler lists.
    pub fn snapshot(&self) -> Self {
        Self {
            stages: Arc::new(RwLock::new(self.stages.read().clone())),
        }
    }

    /// Removes a stage from the catalog together with its handlers.
    ///
    /// Returns `false` when the stage does not exist.
    pub fn remove_stage(&self, name: &str) -> bool {
        let mut stages = self.stages.write();
        let before = stages.len();
        stages.retain(|s| s.name != name);
        stages.len() != before
    }

    fn handlers_of(&self, name: &str) -> ParleyResult<Vec<StageHandler<C>>> {
        let stages = self.stages.read();
        let stage = stages
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| ParleyError::InvalidStage(name.to_string()))?;
        Ok(stage.handlers.clone())
    }

    fn is_registered(&self, name: &str, handler: &StageHandler<C>) -> bool {
        self.stages
            .read()
            .iter()
            .find(|s| s.name == name)
            .is_some_and(|s| s.handlers.iter().any(|h| Arc::ptr_eq(h, handler)))
    }
}

impl<C: Send> MiddlewareCollection<C> {
    /// Runs the given stages in order against `ctx`.
    ///
    /// Handlers of a stage run one after another in registration order; the
    /// next stage starts only after the previous one finished. The first
    /// failing handler aborts the run and its error is returned.
    pub async fn run<S: AsRef<str>>(&self, names: &[S], ctx: &mut C) -> ParleyResult<()> {
        for name in names {
            let name = name.as_ref();
            for (index, handler) in self.handlers_of(name)?.into_iter().enumerate() {
                if !self.is_registered(name, &handler) {
                    trace!(stage = name, index, "Skipping removed stage handler");
                    continue;
                }
                trace!(stage = name, index, "Running stage handler");
                handler(ctx)
                    .await
                    .map_err(|e| ParleyError::handler(name, e))?;
            }
        }
        Ok(())
    }
}
