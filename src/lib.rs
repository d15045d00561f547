//! # spark-coupled
//!
//! Parent/child coupling primitives for reactive component trees.
//!
//! Built on [spark-signals](https://github.com/RLabs-Inc/spark-signals) for
//! fine-grained reactivity.
//!
//! A parent component discovers and tracks an ordered collection of child
//! components that register themselves from anywhere inside its rendered
//! subtree - behind any number of intermediate wrapper components - without
//! the parent knowing the concrete nesting structure. The exposed order
//! follows the *rendered* order of the tree, reconciled after every update
//! pass, even though children register in setup-execution order.
//!
//! ## Architecture
//!
//! ```text
//! use_child → registration channel → children map
//!                                        │
//! commit (update pass) → deep walk of the default content region
//!                                        │
//!                         ordered identity list → children derived
//! ```
//!
//! Each `create_coupled` call defines one coupling: a pair of context keys
//! under which parent and child meet. The child publishes its identity on
//! its own instance, which is what makes wrapper components transparent to
//! the deep walk.
//!
//! ## Modules
//!
//! - [`coupled`] - coupling definitions, `use_parent`/`use_child`, identity
//! - [`tree`] - committed render trees and the depth-first walker
//! - [`runtime`] - host-runtime boundary (instances, context, lifecycle)
//! - [`error`] - the shared error type

pub mod coupled;
pub mod error;
pub mod runtime;
pub mod tree;

// Re-export commonly used items
pub use coupled::{
    create_coupled, create_coupled_with, next_child_id, ChildId, CoupledOptions, Coupling,
    MissingRegion, ParentContext, ParentHandle,
};

pub use error::CoupledError;

pub use runtime::{
    commit, current_instance, inject, inject_from, is_mounted, mount, on_before_unmount,
    on_unmounted, on_updated, provide, provide_on, published, reset_runtime, subtree, unmount,
    ContextKey, InstanceId,
};

pub use tree::{find, walk, RenderNode, VisitFlow, DEFAULT_SLOT};
