//! Intent router.
//!
//! Hooks `dialogue.router` to pick a handler and `dialogue.logic` to run it.
//!
//! Resolution order for the (mapped) intent:
//!
//! 1. the current component (top of the state stack), then its ancestors
//! 2. global handlers, in registration order
//! 3. `UNHANDLED` on the current chain, then a global `UNHANDLED`, unless the
//!    intent is listed in `routing.intents_to_skip_unhandled`
//!
//! When nothing matches, the rest of the pipeline is stopped.

use parley_core::{ParleyResult, stage};
use tracing::debug;

use crate::component::{ComponentNode, ComponentTree, UNHANDLED};
use crate::config::RoutingConfig;
use crate::conversation::{Conversation, Input, Route, StateStackItem};
use crate::plugin::{InstallContext, Plugin};

#[derive(Debug, Default, Clone, Copy)]
pub struct RouterPlugin;

impl Plugin for RouterPlugin {
    fn name(&self) -> &str {
        "RouterPlugin"
    }

    fn install(&self, ctx: &mut InstallContext<'_>) -> ParleyResult<()> {
        ctx.hook(stage::DIALOGUE_ROUTER, |c| Box::pin(route(c)))?;
        ctx.hook(stage::DIALOGUE_LOGIC, |c| Box::pin(execute(c)))
    }
}

/// Picks the handler for `input`, or `None` when nothing matches.
pub fn resolve_route(
    tree: &ComponentTree,
    routing: &RoutingConfig,
    input: &Input,
    state: &[StateStackItem],
) -> Option<Route> {
    let intent = routing.map_intent(input.resolved_intent()?);
    let chain: Vec<&ComponentNode> = match state.last() {
        Some(item) => tree.ancestors(&item.component).collect(),
        None => Vec::new(),
    };

    let found = |node: &ComponentNode, key: &str, global: bool| Route {
        path: node.path().to_string(),
        handler: key.to_string(),
        resolved_intent: intent.to_string(),
        global,
    };

    for node in &chain {
        if let Some(handler) = node.handler_for_intent(intent) {
            return Some(found(node, handler.key(), false));
        }
    }
    for node in tree.iter() {
        if let Some(handler) = node.global_handlers().find(|h| h.matches(intent)) {
            return Some(found(node, handler.key(), true));
        }
    }

    if !routing.allows_unhandled(intent) {
        return None;
    }
    for node in &chain {
        if node.handler(UNHANDLED).is_some() {
            return Some(found(node, UNHANDLED, false));
        }
    }
    tree.iter().find_map(|node| {
        node.global_handlers()
            .find(|h| h.key() == UNHANDLED)
            .map(|h| found(node, h.key(), true))
    })
}

async fn route(conversation: &mut Conversation) -> ParleyResult<()> {
    let resolved = {
        let request = conversation.handle_request();
        resolve_route(
            request.components(),
            &request.config().routing,
            &conversation.input,
            &conversation.session.state,
        )
    };

    match resolved {
        Some(route) => {
            debug!(
                component = %route.path,
                handler = %route.handler,
                intent = %route.resolved_intent,
                global = route.global,
                "Route resolved"
            );
            conversation
                .handle_request_mut()
                .components_mut()
                .set_current(&route.path);
            conversation.set_route(route);
        }
        None => {
            debug!(
                intent = ?conversation.input.resolved_intent(),
                "No route matched, stopping middleware execution"
            );
            conversation.handle_request().stop_middleware_execution();
        }
    }
    Ok(())
}

async fn execute(conversation: &mut Conversation) -> ParleyResult<()> {
    let Some(route) = conversation.route().cloned() else {
        return Ok(());
    };
    // A global route leaves the previous dialogue behind.
    if route.global {
        conversation.session.state = vec![StateStackItem::new(&route.path)];
    } else if conversation.session.state.is_empty() {
        conversation.session.state.push(StateStackItem::new(&route.path));
    }
    conversation.run_handler(&route.path, &route.handler).await
}
