//! End-to-end run of an option-group coupling: registration fallback,
//! render-order override, normal deregistration, and teardown freeze,
//! driven the way an embedding framework would drive it.

use std::collections::HashSet;
use std::rc::Rc;

use spark_coupled::{
    commit, create_coupled, mount, reset_runtime, unmount, ChildId, Coupling, InstanceId,
    RenderNode, DEFAULT_SLOT,
};

#[derive(Debug, Clone, PartialEq, Eq)]
struct Option_ {
    value: &'static str,
    label: &'static str,
}

fn option(value: &'static str, label: &'static str) -> Option_ {
    Option_ { value, label }
}

fn mount_option(
    coupling: Coupling<Option_>,
    group: InstanceId,
    value: &'static str,
    label: &'static str,
) -> (InstanceId, ChildId) {
    mount(Some(group), move || {
        coupling.use_child(option(value, label)).unwrap()
    })
}

/// One update pass of the group, rendering the given options in order.
fn render_pass(group: InstanceId, rendered: &[InstanceId]) {
    let options = rendered.iter().copied().map(RenderNode::component).collect();
    let tree = RenderNode::element(vec![
        RenderNode::keyed("header", vec![]),
        RenderNode::keyed(DEFAULT_SLOT, options),
    ]);
    commit(group, tree).unwrap();
}

fn labels(children: &Rc<Vec<Option_>>) -> Vec<&'static str> {
    children.iter().map(|o| o.label).collect()
}

#[test]
fn test_option_group_lifecycle() {
    reset_runtime();

    let coupling = create_coupled::<Option_>();
    let (group, options) = mount(None, move || coupling.use_parent().unwrap());

    let (a_instance, a_id) = mount_option(coupling, group, "a", "A");
    let (b_instance, b_id) = mount_option(coupling, group, "b", "B");
    let (c_instance, c_id) = mount_option(coupling, group, "c", "C");

    // identities are pairwise distinct
    let ids: HashSet<ChildId> = [a_id, b_id, c_id].into_iter().collect();
    assert_eq!(ids.len(), 3);

    // before the first render pass: registration order
    assert_eq!(labels(&options.children()), ["A", "B", "C"]);

    // a pass renders the options as [C, A, B]: rendered order wins
    render_pass(group, &[c_instance, a_instance, b_instance]);
    assert_eq!(labels(&options.children()), ["C", "A", "B"]);

    // an identical pass must not replace the exposed sequence
    let before = options.children();
    render_pass(group, &[c_instance, a_instance, b_instance]);
    assert!(Rc::ptr_eq(&before, &options.children()));

    // B unmounts normally; the next pass reconciles it away
    unmount(b_instance);
    render_pass(group, &[c_instance, a_instance]);
    assert_eq!(labels(&options.children()), ["C", "A"]);

    // group teardown: the remaining registrations are frozen in place
    unmount(group);
    assert!(options.unmounting());
    assert_eq!(labels(&options.children()), ["C", "A"]);
}

#[test]
fn test_options_register_through_wrapper_components() {
    reset_runtime();

    let coupling = create_coupled::<Option_>();
    let (group, options) = mount(None, move || coupling.use_parent().unwrap());

    let (plain, _) = mount_option(coupling, group, "plain", "Plain");

    // a wrapper component renders its own subtree around an option
    let (wrapper, ()) = mount(Some(group), || ());
    let (wrapped, _) = mount_option(coupling, wrapper, "wrapped", "Wrapped");
    commit(
        wrapper,
        RenderNode::element(vec![RenderNode::component(wrapped)]),
    )
    .unwrap();

    render_pass(group, &[wrapper, plain]);

    assert_eq!(labels(&options.children()), ["Wrapped", "Plain"]);
}
