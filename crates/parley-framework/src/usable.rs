//! Registration input accepted by `register` on the app and on requests.

use parley_core::ParleyResult;
use tracing::debug;

use crate::component::{ComponentDeclaration, ComponentTree};
use crate::config::AppConfig;
use crate::plugin::{Plugin, PluginHandle, PluginRegistry};

/// A plugin or a component declaration.
#[derive(Debug, Clone)]
pub enum Usable {
    Plugin(PluginHandle),
    Component(ComponentDeclaration),
}

impl Usable {
    /// Wraps a plugin with no partial config.
    pub fn plugin<P: Plugin>(plugin: P) -> Self {
        Self::Plugin(PluginHandle::new(plugin))
    }

    pub fn component(declaration: ComponentDeclaration) -> Self {
        Self::Component(declaration)
    }
}

impl From<PluginHandle> for Usable {
    fn from(handle: PluginHandle) -> Self {
        Self::Plugin(handle)
    }
}

impl From<ComponentDeclaration> for Usable {
    fn from(declaration: ComponentDeclaration) -> Self {
        Self::Component(declaration)
    }
}

/// Registers a mixed batch.
///
/// Plugins are registered in order, with the `plugin.<name>` section of
/// `config` merged over their partial config. Components form one atomic
/// batch registered after the plugins.
pub fn register_usables<I>(
    config: &AppConfig,
    plugins: &mut PluginRegistry,
    components: &mut ComponentTree,
    usables: I,
) -> ParleyResult<()>
where
    I: IntoIterator,
    I::Item: Into<Usable>,
{
    let mut declarations = Vec::new();
    for usable in usables {
        match usable.into() {
            Usable::Plugin(mut handle) => {
                if let Some(overrides) = config.plugin_override(handle.name()) {
                    debug!(plugin = %handle.name(), "Applying configured plugin overrides");
                    handle.merge_config(overrides.clone());
                }
                plugins.register(handle)?;
            }
            Usable::Component(declaration) => declarations.push(declaration),
        }
    }
    if declarations.is_empty() {
        return Ok(());
    }
    components.add(declarations)
}
