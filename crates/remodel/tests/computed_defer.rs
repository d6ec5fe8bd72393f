//! Computed views built inside factories: they must see the completed
//! graph, evaluate exactly once at the end of the call, and stay lazy when
//! constructed as deferred.

use std::cell::Cell;
use std::rc::Rc;

use remodel::reactive::Computed;
use remodel::{Created, Hooks, Mapping, Node, materialize, materialize_into, reset_default_options};

fn value_at(node: &Node, path: &str) -> Node {
    node.path(path).map(|n| n.get()).unwrap_or(Node::Null)
}

#[test]
fn factory_computed_sees_properties_mapped_after_it() {
    reset_default_options();
    let evaluations = Rc::new(Cell::new(0));
    let count = Rc::clone(&evaluations);
    let mapping = Mapping::new().child(
        "s",
        Hooks::new().create(move |input| {
            let parent = input.parent.clone().expect("parent present");
            let count = Rc::clone(&count);
            let computed = Computed::new(move || {
                count.set(count.get() + 1);
                value_at(&parent, "z")
            });
            Ok(Created::Node(Node::Computed(computed)))
        }),
    );

    // "s" maps before "z"; an eager evaluation would capture null.
    let mapped = materialize(
        &Node::object([("s", Node::Null), ("z", Node::Int(9))]),
        &mapping,
    )
    .unwrap();

    assert_eq!(evaluations.get(), 1, "evaluated once, at call completion");
    assert_eq!(mapped.path("s").unwrap().get(), Node::Int(9));
    assert_eq!(evaluations.get(), 1, "reads are served from the cache");
}

#[test]
fn computed_read_during_the_call_is_not_reevaluated_at_flush() {
    reset_default_options();
    let evaluations = Rc::new(Cell::new(0));
    let count = Rc::clone(&evaluations);
    let mapping = Mapping::new().child(
        "s",
        Hooks::new().create(move |_| {
            let count = Rc::clone(&count);
            let computed = Computed::new(move || {
                count.set(count.get() + 1);
                Node::Int(1)
            });
            // The factory itself forces an early read.
            let _ = computed.get();
            Ok(Created::Node(Node::Computed(computed)))
        }),
    );
    materialize(&Node::object([("s", Node::Null)]), &mapping).unwrap();
    assert_eq!(evaluations.get(), 1);
}

#[test]
fn deferred_computed_waits_for_its_first_read() {
    reset_default_options();
    let evaluations = Rc::new(Cell::new(0));
    let count = Rc::clone(&evaluations);
    let mapping = Mapping::new().child(
        "s",
        Hooks::new().create(move |input| {
            let parent = input.parent.clone().expect("parent present");
            let count = Rc::clone(&count);
            let computed = Computed::deferred(move || {
                count.set(count.get() + 1);
                value_at(&parent, "z")
            });
            Ok(Created::Node(Node::Computed(computed)))
        }),
    );
    let mapped = materialize(
        &Node::object([("s", Node::Null), ("z", Node::Int(3))]),
        &mapping,
    )
    .unwrap();

    assert_eq!(evaluations.get(), 0, "never auto-evaluated");
    assert_eq!(mapped.path("s").unwrap().get(), Node::Int(3));
    assert_eq!(evaluations.get(), 1);
}

#[test]
fn sibling_factories_can_reference_each_other() {
    reset_default_options();
    let mapping = Mapping::new()
        .child(
            "a",
            Hooks::new().create(|input| {
                let parent = input.parent.clone().expect("parent present");
                let own = value_at(&input.data, "v");
                Ok(Created::Node(Node::object([
                    ("v", Node::obs(own)),
                    (
                        "other",
                        Node::Computed(Computed::new(move || value_at(&parent, "b.v"))),
                    ),
                ])))
            }),
        )
        .child(
            "b",
            Hooks::new().create(|input| {
                let parent = input.parent.clone().expect("parent present");
                let own = value_at(&input.data, "v");
                Ok(Created::Node(Node::object([
                    ("v", Node::obs(own)),
                    (
                        "other",
                        Node::Computed(Computed::new(move || value_at(&parent, "a.v"))),
                    ),
                ])))
            }),
        );

    let source = Node::object([
        ("a", Node::object([("v", Node::Int(1))])),
        ("b", Node::object([("v", Node::Int(2))])),
    ]);
    let mapped = materialize(&source, &mapping).unwrap();

    // "a" was created before "b" existed, and still sees it.
    assert_eq!(mapped.path("a.other").unwrap().get(), Node::Int(2));
    assert_eq!(mapped.path("b.other").unwrap().get(), Node::Int(1));
}

#[test]
fn nested_calls_share_the_outermost_flush() {
    reset_default_options();
    let mapping = Mapping::new().child(
        "m",
        Hooks::new().create(|input| {
            let outer_parent = input.parent.clone().expect("parent present");
            let inner_mapping = Mapping::new().child(
                "c",
                Hooks::new().create(move |_| {
                    let parent = outer_parent.clone();
                    Ok(Created::Node(Node::Computed(Computed::new(move || {
                        value_at(&parent, "z")
                    }))))
                }),
            );
            Ok(Created::Node(materialize(&input.data, &inner_mapping)?))
        }),
    );

    let mapped = materialize(
        &Node::object([
            ("m", Node::object([("c", Node::Null)])),
            ("z", Node::Int(5)),
        ]),
        &mapping,
    )
    .unwrap();
    assert_eq!(mapped.path("m.c").unwrap().get(), Node::Int(5));
}

#[test]
fn computed_over_mapped_state_tracks_changes() {
    reset_default_options();
    let mapped = materialize(&Node::object([("a", Node::Int(1))]), &Mapping::new()).unwrap();
    let obs = mapped.path("a").unwrap().as_obs().unwrap().clone();

    let source = obs.clone();
    let doubled = Computed::new(move || match source.get() {
        Node::Int(n) => Node::Int(n * 2),
        other => other,
    });
    doubled.watch(&obs);
    assert_eq!(doubled.get(), Node::Int(2));

    materialize_into(&Node::object([("a", Node::Int(4))]), &Mapping::new(), &mapped).unwrap();
    assert_eq!(doubled.get(), Node::Int(8));
}
