//! Host-runtime boundary.
//!
//! The coupling protocol does not render, schedule, or diff anything - it
//! plugs into a component-tree runtime that does. This module is that
//! boundary, concretized just far enough to be driven directly:
//!
//! - [`mount`] / [`unmount`] - instance lifecycle, with the setup stack as
//!   the initialization-phase guard ([`current_instance`])
//! - [`provide`] / [`inject`] - ancestor-scoped context under typed
//!   [`ContextKey`]s; [`published`] is the walker-facing own-values read
//! - [`on_updated`] / [`on_before_unmount`] / [`on_unmounted`] - lifecycle
//!   hooks per instance
//! - [`commit`] / [`subtree`] - rendered-output handoff after each update
//!   pass
//!
//! An embedding framework calls these from its own render loop; the tests
//! in this crate call them directly.

mod context;
mod instance;

pub use context::ContextKey;
pub use instance::{
    commit, current_instance, inject, inject_from, is_mounted, mount, on_before_unmount,
    on_unmounted, on_updated, provide, provide_on, published, reset_runtime, subtree, unmount,
    InstanceId,
};
