//! Component instance arena.
//!
//! Thread-local registry of mounted component instances:
//! - Setup stack: which instance is currently running its setup function
//! - Ancestor-scoped context: provide on an instance, inject from its chain
//! - Lifecycle hooks: post-update, before-unmount, after-unmount
//! - Committed subtrees: the rendered output the walker traverses
//!
//! Rendering and scheduling stay with the embedding framework: it mounts
//! instances, commits their output after each update pass, and unmounts
//! them at teardown. Everything here is synchronous and single-threaded.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::mem;
use std::rc::Rc;

use log::{debug, trace};

use super::context::ContextKey;
use crate::error::CoupledError;
use crate::tree::RenderNode;

/// Handle to a mounted component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstanceId(usize);

type UpdatedHook = Box<dyn FnMut() -> Result<(), CoupledError>>;
type TeardownHook = Box<dyn FnOnce()>;

#[derive(Default)]
struct Instance {
    parent: Option<InstanceId>,
    children: Vec<InstanceId>,
    provides: HashMap<u64, Rc<dyn Any>>,
    subtree: Option<Rc<RenderNode>>,
    updated_hooks: Vec<UpdatedHook>,
    before_unmount_hooks: Vec<TeardownHook>,
    unmounted_hooks: Vec<TeardownHook>,
    unmounting: bool,
}

thread_local! {
    static INSTANCES: RefCell<HashMap<usize, Instance>> = RefCell::new(HashMap::new());

    /// Instances currently running their setup function, innermost last.
    static SETUP_STACK: RefCell<Vec<usize>> = RefCell::new(Vec::new());

    static NEXT_INSTANCE: Cell<usize> = const { Cell::new(0) };
}

// =============================================================================
// Mounting
// =============================================================================

/// Mount a new component instance under `parent` and run its setup function.
///
/// While `setup` runs, the instance is the current one: setup-phase hooks
/// like [`provide`] and the coupling's `use_parent`/`use_child` resolve to
/// it. Returns the instance handle and whatever `setup` returned.
pub fn mount<R>(parent: Option<InstanceId>, setup: impl FnOnce() -> R) -> (InstanceId, R) {
    let id = NEXT_INSTANCE.with(|next| {
        let id = next.get();
        next.set(id + 1);
        id
    });

    INSTANCES.with(|cell| {
        let mut map = cell.borrow_mut();
        map.insert(
            id,
            Instance {
                parent,
                ..Instance::default()
            },
        );
        if let Some(parent) = parent {
            if let Some(parent) = map.get_mut(&parent.0) {
                parent.children.push(InstanceId(id));
            }
        }
    });
    debug!("mounted instance {id}");

    SETUP_STACK.with(|stack| stack.borrow_mut().push(id));
    let result = setup();
    SETUP_STACK.with(|stack| {
        stack.borrow_mut().pop();
    });

    (InstanceId(id), result)
}

/// The instance whose setup function is currently running, if any.
///
/// This is the initialization-phase guard: setup-only operations check it
/// and fail when it returns `None`.
pub fn current_instance() -> Option<InstanceId> {
    SETUP_STACK.with(|stack| stack.borrow().last().copied().map(InstanceId))
}

/// Whether `id` refers to a currently mounted instance.
pub fn is_mounted(id: InstanceId) -> bool {
    INSTANCES.with(|cell| cell.borrow().contains_key(&id.0))
}

// =============================================================================
// Context
// =============================================================================

/// Publish `value` under `key` on the current instance.
///
/// Fails with [`CoupledError::OutsideSetup`] when no setup is running.
pub fn provide<T: 'static>(key: ContextKey<T>, value: Rc<T>) -> Result<(), CoupledError> {
    let instance = current_instance().ok_or(CoupledError::OutsideSetup { hook: "provide" })?;
    provide_on(instance, key, value);
    Ok(())
}

/// Publish `value` under `key` on a specific instance.
pub fn provide_on<T: 'static>(instance: InstanceId, key: ContextKey<T>, value: Rc<T>) {
    INSTANCES.with(|cell| {
        if let Some(inst) = cell.borrow_mut().get_mut(&instance.0) {
            inst.provides.insert(key.raw(), value);
        }
    });
}

/// Look up `key` from the current instance's ancestor chain.
///
/// Returns `None` outside setup or when no ancestor provided the key.
pub fn inject<T: 'static>(key: ContextKey<T>) -> Option<Rc<T>> {
    inject_from(current_instance()?, key)
}

/// Look up `key` from `instance`'s ancestor chain, nearest provider first.
///
/// The lookup starts at the instance's parent, so a component never injects
/// its own publications.
pub fn inject_from<T: 'static>(instance: InstanceId, key: ContextKey<T>) -> Option<Rc<T>> {
    INSTANCES.with(|cell| {
        let map = cell.borrow();
        let mut cursor = map.get(&instance.0)?.parent;
        while let Some(ancestor) = cursor {
            let inst = map.get(&ancestor.0)?;
            if let Some(value) = inst.provides.get(&key.raw()) {
                return value.clone().downcast::<T>().ok();
            }
            cursor = inst.parent;
        }
        None
    })
}

/// A value `instance` itself published under `key`.
///
/// Unlike [`inject_from`], ancestors are not consulted. This is the
/// walker-facing read: a node only ever reports identities its own hosted
/// component announced.
pub fn published<T: 'static>(instance: InstanceId, key: ContextKey<T>) -> Option<Rc<T>> {
    INSTANCES.with(|cell| {
        let map = cell.borrow();
        let value = map.get(&instance.0)?.provides.get(&key.raw())?;
        value.clone().downcast::<T>().ok()
    })
}

// =============================================================================
// Lifecycle Hooks
// =============================================================================

/// Run `hook` after each of `instance`'s update passes is committed.
///
/// The first hook error of a pass is propagated out of [`commit`]; the
/// remaining hooks of that pass still run.
pub fn on_updated(instance: InstanceId, hook: impl FnMut() -> Result<(), CoupledError> + 'static) {
    INSTANCES.with(|cell| {
        if let Some(inst) = cell.borrow_mut().get_mut(&instance.0) {
            inst.updated_hooks.push(Box::new(hook));
        }
    });
}

/// Run `hook` when `instance` begins tearing down, before any of its
/// children are unmounted.
pub fn on_before_unmount(instance: InstanceId, hook: impl FnOnce() + 'static) {
    INSTANCES.with(|cell| {
        if let Some(inst) = cell.borrow_mut().get_mut(&instance.0) {
            inst.before_unmount_hooks.push(Box::new(hook));
        }
    });
}

/// Run `hook` after `instance` and all of its children have unmounted.
pub fn on_unmounted(instance: InstanceId, hook: impl FnOnce() + 'static) {
    INSTANCES.with(|cell| {
        if let Some(inst) = cell.borrow_mut().get_mut(&instance.0) {
            inst.unmounted_hooks.push(Box::new(hook));
        }
    });
}

// =============================================================================
// Update Passes
// =============================================================================

/// Commit `root` as `instance`'s rendered output, then run its post-update
/// hooks.
///
/// This is the post-update pass: the subtree is stored first, so hooks (and
/// any walk they start) always observe the tree that was just committed.
/// Fails with [`CoupledError::UnknownInstance`] for instances that are not
/// mounted or already tearing down.
pub fn commit(instance: InstanceId, root: Rc<RenderNode>) -> Result<(), CoupledError> {
    let mut hooks = INSTANCES.with(|cell| {
        let mut map = cell.borrow_mut();
        let inst = map
            .get_mut(&instance.0)
            .filter(|inst| !inst.unmounting)
            .ok_or(CoupledError::UnknownInstance { id: instance })?;
        inst.subtree = Some(root);
        Ok(mem::take(&mut inst.updated_hooks))
    })?;
    trace!("committed update pass for instance {}", instance.0);

    // Hooks run without any registry borrow held: they walk the committed
    // tree and may register further hooks.
    let mut first_error = Ok(());
    for hook in hooks.iter_mut() {
        if let Err(error) = hook() {
            if first_error.is_ok() {
                first_error = Err(error);
            }
        }
    }

    INSTANCES.with(|cell| {
        if let Some(inst) = cell.borrow_mut().get_mut(&instance.0) {
            let added = mem::replace(&mut inst.updated_hooks, hooks);
            inst.updated_hooks.extend(added);
        }
    });

    first_error
}

/// The rendered output `instance` most recently committed.
pub fn subtree(instance: InstanceId) -> Option<Rc<RenderNode>> {
    INSTANCES.with(|cell| cell.borrow().get(&instance.0)?.subtree.clone())
}

// =============================================================================
// Unmounting
// =============================================================================

/// Tear down `instance` and its children.
///
/// Order per instance: before-unmount hooks, then each child unmounts in
/// mount order (depth-first, running its own hooks), then after-unmount
/// hooks, then the instance is freed. A freed instance no longer accepts
/// commits and its handle goes stale.
pub fn unmount(instance: InstanceId) {
    let before = INSTANCES.with(|cell| {
        let mut map = cell.borrow_mut();
        let inst = map.get_mut(&instance.0)?;
        if inst.unmounting {
            return None;
        }
        inst.unmounting = true;
        Some(mem::take(&mut inst.before_unmount_hooks))
    });
    let Some(before) = before else {
        return;
    };
    debug!("unmounting instance {}", instance.0);

    for hook in before {
        hook();
    }

    let children = INSTANCES.with(|cell| {
        cell.borrow_mut()
            .get_mut(&instance.0)
            .map(|inst| mem::take(&mut inst.children))
    })
    .unwrap_or_default();
    for child in children {
        unmount(child);
    }

    let after = INSTANCES.with(|cell| {
        cell.borrow_mut()
            .get_mut(&instance.0)
            .map(|inst| mem::take(&mut inst.unmounted_hooks))
    })
    .unwrap_or_default();
    for hook in after {
        hook();
    }

    let parent = INSTANCES.with(|cell| cell.borrow_mut().remove(&instance.0).and_then(|inst| inst.parent));
    if let Some(parent) = parent {
        INSTANCES.with(|cell| {
            if let Some(inst) = cell.borrow_mut().get_mut(&parent.0) {
                inst.children.retain(|child| *child != instance);
            }
        });
    }
}

// =============================================================================
// Reset (for testing)
// =============================================================================

/// Reset all runtime state (for testing).
///
/// Instance handles from before the reset are stale. Child identities are
/// process-wide and intentionally survive resets.
pub fn reset_runtime() {
    INSTANCES.with(|cell| cell.borrow_mut().clear());
    SETUP_STACK.with(|stack| stack.borrow_mut().clear());
    NEXT_INSTANCE.with(|next| next.set(0));
}
