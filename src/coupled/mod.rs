//! Parent/child coupling.
//!
//! A coupling definition pairs a parent hook with a child hook. Children
//! call `use_child` from anywhere inside the parent's subtree - behind any
//! number of intermediate wrapper components - and the parent exposes them
//! as one live, ordered collection.
//!
//! # Ordering
//!
//! Registration order and rendered order are two different things:
//! children register in setup-execution order, but the tree can mount them
//! in any shape, and that shape changes across update passes. The parent
//! therefore keeps two orderings:
//!
//! - the children map (insertion-ordered) - correct before the first
//!   update pass completes, and the fallback whenever no render-derived
//!   order is available
//! - the render-order cache - rebuilt after every update pass by walking
//!   the committed output's default content region deep (crossing component
//!   boundaries) and collecting each mounted component's published identity
//!
//! The exposed `children` sequence is a derived over both, recomputed only
//! when one of them actually changes. A pass that computes an identical
//! identity list leaves the cache untouched, so rewalking the tree on every
//! update never feeds back into another update.
//!
//! # Example
//!
//! ```ignore
//! use spark_coupled::{create_coupled, runtime};
//!
//! #[derive(Clone)]
//! struct Option_ { label: String }
//!
//! let coupling = create_coupled::<Option_>();
//!
//! let (group, options) = runtime::mount(None, || coupling.use_parent().unwrap());
//! let (option, _) = runtime::mount(Some(group), || {
//!     coupling.use_child(Option_ { label: "A".into() }).unwrap()
//! });
//!
//! // after each update pass the framework commits the group's output:
//! // options.children() now follows the rendered order of that output
//! ```

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use log::{debug, trace};
use spark_signals::{derived, signal, Derived, Signal};

use crate::error::CoupledError;
use crate::runtime::{self, ContextKey, InstanceId};
use crate::tree::{find, walk, VisitFlow, DEFAULT_SLOT};

mod identity;

pub use identity::{next_child_id, ChildId};

// =============================================================================
// Options
// =============================================================================

/// What a parent does when a committed pass has no default content region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingRegion {
    /// Drop the render-derived order; the collection reverts to
    /// registration order until a later pass finds the region again.
    #[default]
    ClearToInsertion,
    /// Keep exposing the order derived from the last pass that had one.
    PreserveLast,
}

/// Tuning for a coupling definition.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoupledOptions {
    /// Fallback behavior when the default content region disappears.
    pub missing_region: MissingRegion,
}

// =============================================================================
// Parent State
// =============================================================================

/// The exposed sequence, compared by pointer: a snapshot only counts as
/// changed when the cache was actually replaced.
struct OrderedChildren<C>(Rc<Vec<C>>);

impl<C> Clone for OrderedChildren<C> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<C> PartialEq for OrderedChildren<C> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<C> Eq for OrderedChildren<C> {}

type ChildrenDerived<C> = Derived<OrderedChildren<C>>;

/// State owned by one `use_parent` call.
///
/// The maps live in plain cells; the two version signals are what deriveds
/// subscribe to. Bumping a version after a mutation is the whole
/// invalidation story.
struct ParentState<C> {
    children_map: RefCell<IndexMap<ChildId, C>>,
    map_version: Signal<u64>,
    order_ids: RefCell<Option<Rc<Vec<ChildId>>>>,
    order_items: RefCell<Option<Rc<Vec<C>>>>,
    order_version: Signal<u64>,
    unmounting: Signal<bool>,
}

fn bump(version: &Signal<u64>) {
    version.set(version.get() + 1);
}

impl<C: Clone + 'static> ParentState<C> {
    fn new() -> Self {
        Self {
            children_map: RefCell::new(IndexMap::new()),
            map_version: signal(0),
            order_ids: RefCell::new(None),
            order_items: RefCell::new(None),
            order_version: signal(0),
            unmounting: signal(false),
        }
    }

    fn add_child(&self, id: ChildId, child: C) {
        self.children_map.borrow_mut().insert(id, child);
        bump(&self.map_version);
    }

    fn remove_child(&self, id: ChildId) {
        // shift_remove keeps the insertion order of the remaining entries
        if self.children_map.borrow_mut().shift_remove(&id).is_some() {
            bump(&self.map_version);
        }
    }

    /// Translate an identity list into child data via the children map.
    fn project(&self, ids: &[ChildId]) -> Result<Rc<Vec<C>>, CoupledError> {
        let map = self.children_map.borrow();
        let mut items = Vec::with_capacity(ids.len());
        for id in ids {
            let child = map.get(id).ok_or(CoupledError::UnknownChild { id: *id })?;
            items.push(child.clone());
        }
        Ok(Rc::new(items))
    }

    /// The currently exposed sequence: the render-derived projection when
    /// one is cached and non-empty, registration order otherwise.
    fn snapshot(&self) -> Rc<Vec<C>> {
        let items = self.order_items.borrow();
        match items.as_ref() {
            Some(items) if !items.is_empty() => Rc::clone(items),
            _ => {
                let map = self.children_map.borrow();
                Rc::new(map.values().cloned().collect())
            }
        }
    }

    fn apply_missing_region(&self, policy: MissingRegion) {
        match policy {
            MissingRegion::PreserveLast => {}
            MissingRegion::ClearToInsertion => {
                if self.order_ids.borrow().is_some() {
                    *self.order_ids.borrow_mut() = None;
                    *self.order_items.borrow_mut() = None;
                    bump(&self.order_version);
                }
            }
        }
    }
}

// =============================================================================
// Reconciliation
// =============================================================================

/// Positional equality; `None` only equals `None`.
fn shallow_eq<T: PartialEq>(a: Option<&[T]>, b: Option<&[T]>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Re-derive the rendered child order from `instance`'s committed output.
///
/// Runs after every completed update pass of the parent. Finding the
/// default content region is a shallow walk (the region belongs to the
/// parent's own output); collecting identities inside it is a deep one.
fn reconcile<C: Clone + 'static>(
    state: &Rc<ParentState<C>>,
    instance: InstanceId,
    child_key: ContextKey<ChildId>,
    missing_region: MissingRegion,
) -> Result<(), CoupledError> {
    if state.unmounting.get() {
        return Ok(());
    }

    let region = runtime::subtree(instance)
        .and_then(|root| find(&root, |node| node.key() == Some(DEFAULT_SLOT), false));
    let Some(region) = region else {
        state.apply_missing_region(missing_region);
        return Ok(());
    };

    let mut ids = Vec::new();
    walk(
        &region,
        |node| {
            if let Some(id) = node.published(child_key) {
                ids.push(*id);
            }
            VisitFlow::Continue
        },
        true,
    );
    trace!("render walk collected {} child ids", ids.len());

    let unchanged = {
        let cached = state.order_ids.borrow();
        shallow_eq(cached.as_ref().map(|rc| rc.as_slice()), Some(&ids))
    };
    if unchanged {
        // Same order as the cached pass: publishing it again would schedule
        // another update, which would reconcile again, indefinitely.
        return Ok(());
    }

    let items = state.project(&ids)?;
    debug!("render order changed: {} children", ids.len());
    *state.order_ids.borrow_mut() = Some(Rc::new(ids));
    *state.order_items.borrow_mut() = Some(items);
    bump(&state.order_version);
    Ok(())
}

// =============================================================================
// Registration Channel
// =============================================================================

/// The registration channel a parent publishes to its subtree.
///
/// `use_child` talks to this; embedders normally only see it through
/// [`ParentHandle`].
pub struct ParentContext<C> {
    state: Rc<ParentState<C>>,
    children: ChildrenDerived<C>,
}

impl<C: Clone + 'static> ParentContext<C> {
    /// Register or re-register a child. Calling twice with the same id
    /// overwrites the data, it never duplicates the entry.
    pub fn add_child(&self, id: ChildId, child: C) {
        self.state.add_child(id, child);
    }

    /// Deregister a child. Unknown ids are ignored.
    pub fn remove_child(&self, id: ChildId) {
        self.state.remove_child(id);
    }

    /// Whether the owning parent has begun tearing down.
    pub fn unmounting(&self) -> bool {
        self.state.unmounting.get()
    }

    /// The live ordered child sequence.
    ///
    /// The returned `Rc` stays pointer-identical for as long as neither the
    /// children map nor the render-derived order changes.
    pub fn children(&self) -> Rc<Vec<C>> {
        self.children.get().0
    }
}

/// What `use_parent` hands back to the parent component.
pub struct ParentHandle<C> {
    context: Rc<ParentContext<C>>,
}

impl<C: Clone + 'static> ParentHandle<C> {
    /// The live ordered child sequence. See [`ParentContext::children`].
    pub fn children(&self) -> Rc<Vec<C>> {
        self.context.children()
    }

    /// Whether this parent has begun tearing down.
    pub fn unmounting(&self) -> bool {
        self.context.unmounting()
    }

    /// The registration channel itself, as published to the subtree.
    pub fn context(&self) -> Rc<ParentContext<C>> {
        Rc::clone(&self.context)
    }
}

// =============================================================================
// Coupling Definition
// =============================================================================

/// One parent/child coupling definition.
///
/// Holds the pair of context keys the two hooks meet at. Distinct
/// definitions never interfere, even when nested in the same tree.
pub struct Coupling<C> {
    parent_key: ContextKey<ParentContext<C>>,
    child_key: ContextKey<ChildId>,
    options: CoupledOptions,
}

impl<C> Clone for Coupling<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for Coupling<C> {}

impl<C> fmt::Debug for Coupling<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coupling")
            .field("parent_key", &self.parent_key)
            .field("child_key", &self.child_key)
            .field("options", &self.options)
            .finish()
    }
}

/// Define a coupling with default [`CoupledOptions`].
pub fn create_coupled<C: Clone + 'static>() -> Coupling<C> {
    create_coupled_with(CoupledOptions::default())
}

/// Define a coupling with explicit options.
pub fn create_coupled_with<C: Clone + 'static>(options: CoupledOptions) -> Coupling<C> {
    Coupling {
        parent_key: ContextKey::new(),
        child_key: ContextKey::new(),
        options,
    }
}

impl<C: Clone + 'static> Coupling<C> {
    /// Become the parent of this coupling.
    ///
    /// Must run inside a component's setup function. Publishes the
    /// registration channel to the subtree, schedules reconciliation after
    /// every update pass, and raises the unmounting flag when teardown
    /// begins.
    pub fn use_parent(&self) -> Result<ParentHandle<C>, CoupledError> {
        let instance = runtime::current_instance().ok_or(CoupledError::OutsideSetup {
            hook: "use_parent",
        })?;

        let state = Rc::new(ParentState::new());

        let children: ChildrenDerived<C> = {
            let state = Rc::clone(&state);
            derived(Box::new(move || {
                // establish dependencies on both version counters
                let _ = state.map_version.get();
                let _ = state.order_version.get();
                OrderedChildren(state.snapshot())
            }) as Box<dyn Fn() -> OrderedChildren<C>>)
        };

        {
            let state = Rc::clone(&state);
            let child_key = self.child_key;
            let missing_region = self.options.missing_region;
            runtime::on_updated(instance, move || {
                reconcile(&state, instance, child_key, missing_region)
            });
        }
        {
            let state = Rc::clone(&state);
            runtime::on_before_unmount(instance, move || {
                state.unmounting.set(true);
            });
        }

        let context = Rc::new(ParentContext { state, children });
        runtime::provide_on(instance, self.parent_key, Rc::clone(&context));

        Ok(ParentHandle { context })
    }

    /// Register the current component as a child of this coupling.
    ///
    /// Must run inside a component's setup function. The identity is
    /// published on the component before the parent lookup, so the render
    /// walk can read it back no matter how deeply the component's output
    /// nests. Registration happens immediately; deregistration is hooked to
    /// teardown and skipped when the parent itself is mid-teardown.
    pub fn use_child(&self, child: C) -> Result<ChildId, CoupledError> {
        let instance = runtime::current_instance().ok_or(CoupledError::OutsideSetup {
            hook: "use_child",
        })?;

        let id = next_child_id();
        runtime::provide_on(instance, self.child_key, Rc::new(id));

        let parent = runtime::inject_from(instance, self.parent_key).ok_or(CoupledError::NoParent)?;

        parent.add_child(id, child);

        let parent = Rc::clone(&parent);
        runtime::on_unmounted(instance, move || {
            if parent.unmounting() {
                // the parent is going away with us; its collection is frozen
                return;
            }
            parent.remove_child(id);
        });

        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{commit, mount, reset_runtime, unmount};
    use crate::tree::RenderNode;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct Item(&'static str);

    fn mount_parent(coupling: Coupling<Item>) -> (InstanceId, ParentHandle<Item>) {
        mount(None, move || coupling.use_parent().unwrap())
    }

    fn mount_child(
        coupling: Coupling<Item>,
        parent: InstanceId,
        label: &'static str,
    ) -> (InstanceId, ChildId) {
        mount(Some(parent), move || coupling.use_child(Item(label)).unwrap())
    }

    fn labels(children: &Rc<Vec<Item>>) -> Vec<&'static str> {
        children.iter().map(|item| item.0).collect()
    }

    /// Commit a pass whose default region renders the given instances in order.
    fn commit_region(parent: InstanceId, rendered: &[InstanceId]) {
        commit(parent, region_tree(rendered)).unwrap();
    }

    fn region_tree(rendered: &[InstanceId]) -> Rc<RenderNode> {
        let nodes = rendered.iter().copied().map(RenderNode::component).collect();
        RenderNode::element(vec![RenderNode::keyed(DEFAULT_SLOT, nodes)])
    }

    #[test]
    fn test_shallow_eq() {
        assert!(shallow_eq::<u8>(None, None));
        assert!(shallow_eq(Some(&[1, 2][..]), Some(&[1, 2][..])));
        assert!(!shallow_eq(Some(&[1, 2][..]), Some(&[2, 1][..])));
        assert!(!shallow_eq(Some(&[1][..]), Some(&[1, 2][..])));
        assert!(!shallow_eq(Some(&[1][..]), None));
    }

    #[test]
    fn test_use_parent_outside_setup_fails() {
        reset_runtime();

        let coupling = create_coupled::<Item>();
        assert_eq!(
            coupling.use_parent().err(),
            Some(CoupledError::OutsideSetup { hook: "use_parent" })
        );
    }

    #[test]
    fn test_use_child_without_parent_fails() {
        reset_runtime();

        let coupling = create_coupled::<Item>();
        let (_, result) = mount(None, move || coupling.use_child(Item("orphan")));
        assert_eq!(result, Err(CoupledError::NoParent));
    }

    #[test]
    fn test_children_fall_back_to_registration_order() {
        reset_runtime();

        let coupling = create_coupled::<Item>();
        let (parent, handle) = mount_parent(coupling);
        mount_child(coupling, parent, "a");
        mount_child(coupling, parent, "b");
        mount_child(coupling, parent, "c");

        // no update pass has completed yet
        assert_eq!(labels(&handle.children()), ["a", "b", "c"]);
    }

    #[test]
    fn test_add_child_is_idempotent_per_id() {
        reset_runtime();

        let coupling = create_coupled::<Item>();
        let (parent, handle) = mount_parent(coupling);
        let (_, id) = mount_child(coupling, parent, "a");
        mount_child(coupling, parent, "b");

        handle.context().add_child(id, Item("a2"));

        assert_eq!(labels(&handle.children()), ["a2", "b"]);
    }

    #[test]
    fn test_render_order_overrides_registration_order() {
        reset_runtime();

        let coupling = create_coupled::<Item>();
        let (parent, handle) = mount_parent(coupling);
        let (a, _) = mount_child(coupling, parent, "a");
        let (b, _) = mount_child(coupling, parent, "b");
        let (c, _) = mount_child(coupling, parent, "c");

        commit_region(parent, &[b, a, c]);

        assert_eq!(labels(&handle.children()), ["b", "a", "c"]);
    }

    #[test]
    fn test_children_reference_stable_across_identical_passes() {
        reset_runtime();

        let coupling = create_coupled::<Item>();
        let (parent, handle) = mount_parent(coupling);
        let (a, _) = mount_child(coupling, parent, "a");
        let (b, _) = mount_child(coupling, parent, "b");

        commit_region(parent, &[b, a]);
        let first = handle.children();

        // the second pass redoes the full walk but computes the same order
        commit_region(parent, &[b, a]);
        let second = handle.children();

        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_missing_region_clears_to_registration_order() {
        reset_runtime();

        let coupling = create_coupled::<Item>();
        let (parent, handle) = mount_parent(coupling);
        let (a, _) = mount_child(coupling, parent, "a");
        let (b, _) = mount_child(coupling, parent, "b");

        commit_region(parent, &[b, a]);
        assert_eq!(labels(&handle.children()), ["b", "a"]);

        // a pass without the default content region
        commit(parent, RenderNode::element(vec![])).unwrap();
        assert_eq!(labels(&handle.children()), ["a", "b"]);
    }

    #[test]
    fn test_missing_region_can_preserve_last_order() {
        reset_runtime();

        let coupling = create_coupled_with::<Item>(CoupledOptions {
            missing_region: MissingRegion::PreserveLast,
        });
        let (parent, handle) = mount_parent(coupling);
        let (a, _) = mount_child(coupling, parent, "a");
        let (b, _) = mount_child(coupling, parent, "b");

        commit_region(parent, &[b, a]);
        commit(parent, RenderNode::element(vec![])).unwrap();

        assert_eq!(labels(&handle.children()), ["b", "a"]);
    }

    #[test]
    fn test_empty_region_exposes_registration_order() {
        reset_runtime();

        let coupling = create_coupled::<Item>();
        let (parent, handle) = mount_parent(coupling);
        mount_child(coupling, parent, "a");
        mount_child(coupling, parent, "b");

        // the region is there, but no registered child is rendered in it
        commit_region(parent, &[]);

        assert_eq!(labels(&handle.children()), ["a", "b"]);
    }

    #[test]
    fn test_normal_child_unmount_deregisters() {
        reset_runtime();

        let coupling = create_coupled::<Item>();
        let (parent, handle) = mount_parent(coupling);
        mount_child(coupling, parent, "a");
        let (b, _) = mount_child(coupling, parent, "b");
        mount_child(coupling, parent, "c");

        unmount(b);

        assert_eq!(labels(&handle.children()), ["a", "c"]);
    }

    #[test]
    fn test_parent_teardown_freezes_children() {
        reset_runtime();

        let coupling = create_coupled::<Item>();
        let (parent, handle) = mount_parent(coupling);
        mount_child(coupling, parent, "a");
        mount_child(coupling, parent, "b");

        unmount(parent);

        // the children's teardown hooks ran, but must not have deregistered
        assert!(handle.unmounting());
        assert_eq!(labels(&handle.children()), ["a", "b"]);
    }

    #[test]
    fn test_wrapper_components_are_transparent() {
        reset_runtime();

        let coupling = create_coupled::<Item>();
        let (parent, handle) = mount_parent(coupling);
        let (a, _) = mount_child(coupling, parent, "a");

        // b registers from behind an intermediate wrapper component
        let (wrapper, ()) = mount(Some(parent), || ());
        let (b, _) = mount_child(coupling, wrapper, "b");
        commit(wrapper, RenderNode::element(vec![RenderNode::component(b)])).unwrap();

        commit_region(parent, &[wrapper, a]);

        assert_eq!(labels(&handle.children()), ["b", "a"]);
    }

    #[test]
    fn test_dangling_identity_surfaces_as_error() {
        reset_runtime();

        let coupling = create_coupled::<Item>();
        let (parent, handle) = mount_parent(coupling);
        let (a, id) = mount_child(coupling, parent, "a");

        // the committed tree still renders the child, but its registration
        // is gone: the walk observes a stale tree
        handle.context().remove_child(id);

        assert_eq!(
            commit(parent, region_tree(&[a])),
            Err(CoupledError::UnknownChild { id })
        );
    }

    #[test]
    fn test_two_couplings_do_not_interfere() {
        reset_runtime();

        let first = create_coupled::<Item>();
        let second = create_coupled::<Item>();

        let (outer, outer_handle) = mount_parent(first);
        let (inner, inner_handle) = mount(Some(outer), move || second.use_parent().unwrap());

        mount_child(first, outer, "for-first");
        mount_child(second, inner, "for-second");

        assert_eq!(labels(&outer_handle.children()), ["for-first"]);
        assert_eq!(labels(&inner_handle.children()), ["for-second"]);
    }
}
