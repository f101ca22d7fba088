//! Dialogue components.
//!
//! A component is a named unit of dialogue logic with a handler table. The
//! [`ComponentTree`] indexes registered components by path; the router picks
//! a handler from it for every request.

mod declaration;
mod tree;

pub use declaration::{ComponentDeclaration, ComponentHandler, END, LAUNCH, UNHANDLED};
pub use tree::{ComponentNode, ComponentTree};
