//! Committed render trees and the traversal that orders children.
//!
//! A [`RenderNode`] is one node of the output a component most recently
//! committed: an optional slot key, structural children, and - for nodes
//! that mount a sub-component - the hosting instance. The node surface is
//! deliberately explicit: [`RenderNode::hosted_subtree`] and
//! [`RenderNode::published`] are the only two things a traversal may ask a
//! component node for, so nothing here reaches into runtime internals.

use std::rc::Rc;

use crate::runtime::{self, ContextKey, InstanceId};

mod walk;

pub use walk::{find, walk, VisitFlow};

/// Key marking the default content region of a parent's committed output.
pub const DEFAULT_SLOT: &str = "_default";

/// One node of a committed rendered-output tree.
///
/// Nodes are immutable once built; an update pass commits a whole new tree.
#[derive(Debug)]
pub struct RenderNode {
    key: Option<String>,
    component: Option<InstanceId>,
    children: Vec<Rc<RenderNode>>,
}

impl RenderNode {
    /// A structural node with no key.
    pub fn element(children: Vec<Rc<RenderNode>>) -> Rc<Self> {
        Rc::new(Self {
            key: None,
            component: None,
            children,
        })
    }

    /// A structural node carrying a slot key, e.g. [`DEFAULT_SLOT`].
    pub fn keyed(key: impl Into<String>, children: Vec<Rc<RenderNode>>) -> Rc<Self> {
        Rc::new(Self {
            key: Some(key.into()),
            component: None,
            children,
        })
    }

    /// A node mounting a sub-component instance.
    pub fn component(instance: InstanceId) -> Rc<Self> {
        Rc::new(Self {
            key: None,
            component: Some(instance),
            children: Vec::new(),
        })
    }

    /// The node's slot key, if any.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// The instance hosted by this node, if it mounts a sub-component.
    pub fn hosted(&self) -> Option<InstanceId> {
        self.component
    }

    /// Structural children, left to right.
    pub fn children(&self) -> &[Rc<RenderNode>] {
        &self.children
    }

    /// The hosted component's own committed output, if this node mounts a
    /// component that has completed at least one update pass.
    pub fn hosted_subtree(&self) -> Option<Rc<RenderNode>> {
        self.component.and_then(runtime::subtree)
    }

    /// A value the hosted component itself published under `key`.
    ///
    /// Only the instance's own publications are visible here - values
    /// inherited from ancestors are not, so an intermediate wrapper never
    /// reports an identity that belongs to a component above it.
    pub fn published<T: 'static>(&self, key: ContextKey<T>) -> Option<Rc<T>> {
        self.component.and_then(|instance| runtime::published(instance, key))
    }
}
