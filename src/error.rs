//! Error type shared by the coupling protocol and the runtime boundary.

use thiserror::Error;

use crate::coupled::ChildId;
use crate::runtime::InstanceId;

/// Everything that can go wrong when coupling parents and children.
///
/// The first two variants are usage errors raised at setup time, before any
/// partial state is created. `UnknownChild` is an integrity defect: the
/// render walk observed an identity that is not registered, which means the
/// committed tree is stale or out of sync. It propagates out of
/// [`crate::runtime::commit`] instead of being silently dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CoupledError {
    /// A setup-phase hook was invoked with no component being set up.
    #[error("`{hook}` must be called within a setup function")]
    OutsideSetup {
        /// Name of the hook that was misused.
        hook: &'static str,
    },

    /// `use_child` found no registration channel in the ancestor chain.
    #[error("no coupled parent found")]
    NoParent,

    /// Reconciliation collected an identity missing from the children map.
    #[error("child (id: {id}) is not found")]
    UnknownChild {
        /// The dangling identity.
        id: ChildId,
    },

    /// A runtime operation referenced an instance that is not mounted.
    #[error("component instance {id:?} is not mounted")]
    UnknownInstance {
        /// The stale instance handle.
        id: InstanceId,
    },
}
