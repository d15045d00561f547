//! Depth-first traversal over committed render trees.
//!
//! The walker is read-only and re-entrant: it never mutates the tree and a
//! visitor may start further walks of its own. Deep mode is what makes
//! component boundaries transparent - when a visited node hosts a mounted
//! sub-component, the walk continues inside that component's committed
//! subtree instead of the node's structural children.

use std::rc::Rc;

use super::RenderNode;

/// Signal returned by a walk visitor for each visited node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisitFlow {
    /// Keep walking (pre-order: this node's children or hosted subtree next).
    #[default]
    Continue,
    /// Do not descend below this node, but keep visiting its siblings.
    Skip,
    /// Abort the entire traversal immediately, through every recursion level.
    Stop,
}

/// Walk `root` depth-first, pre-order, visiting every reachable node.
///
/// With `deep` enabled, a node hosting a mounted sub-component is expanded
/// into that component's committed subtree rather than its structural
/// children. With `deep` disabled the walk never crosses a component
/// boundary.
///
/// Returns [`VisitFlow::Stop`] if the visitor aborted the traversal,
/// [`VisitFlow::Continue`] if it ran to completion.
pub fn walk<F>(root: &Rc<RenderNode>, mut visit: F, deep: bool) -> VisitFlow
where
    F: FnMut(&Rc<RenderNode>) -> VisitFlow,
{
    walk_inner(root, &mut visit, deep)
}

fn walk_inner<F>(root: &Rc<RenderNode>, visit: &mut F, deep: bool) -> VisitFlow
where
    F: FnMut(&Rc<RenderNode>) -> VisitFlow,
{
    match visit(root) {
        VisitFlow::Stop => return VisitFlow::Stop,
        VisitFlow::Skip => return VisitFlow::Continue,
        VisitFlow::Continue => {}
    }

    if deep && root.hosted().is_some() {
        // Cross the component boundary: the hosted component's committed
        // output replaces the node's structural children.
        if let Some(subtree) = root.hosted_subtree() {
            if walk_inner(&subtree, visit, deep) == VisitFlow::Stop {
                return VisitFlow::Stop;
            }
        }
    } else {
        for child in root.children() {
            if walk_inner(child, visit, deep) == VisitFlow::Stop {
                return VisitFlow::Stop;
            }
        }
    }

    VisitFlow::Continue
}

/// Find the first node (pre-order) satisfying `predicate`.
///
/// This is [`walk`] specialized with a record-and-stop visitor; `deep` has
/// the same meaning.
pub fn find<P>(root: &Rc<RenderNode>, predicate: P, deep: bool) -> Option<Rc<RenderNode>>
where
    P: Fn(&Rc<RenderNode>) -> bool,
{
    let mut found = None;

    walk(
        root,
        |node| {
            if predicate(node) {
                found = Some(node.clone());
                VisitFlow::Stop
            } else {
                VisitFlow::Continue
            }
        },
        deep,
    );

    found
}
