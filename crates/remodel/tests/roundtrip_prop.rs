//! Property: materializing an arbitrary plain tree and dematerializing it
//! yields the original data, and repeating the call onto the same target
//! keeps container instances stable.

use proptest::prelude::*;
use serde_json::Value;

use remodel::{Mapping, Node, dematerialize, materialize, materialize_into, reset_default_options};

fn plain_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| serde_json::json!(n)),
        prop::num::f64::NORMAL.prop_map(|n| serde_json::json!(n)),
        "[a-z]{0,8}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    })
}

proptest! {
    #[test]
    fn materialize_then_dematerialize_round_trips(value in plain_value()) {
        reset_default_options();
        let source = Node::from(value.clone());
        let mapped = materialize(&source, &Mapping::new()).unwrap();
        let out = dematerialize(&mapped, &Mapping::new()).unwrap();
        prop_assert_eq!(out.to_value(), value);
    }

    #[test]
    fn rematerializing_the_same_data_is_idempotent(value in plain_value()) {
        reset_default_options();
        let source = Node::from(value.clone());
        let mapped = materialize(&source, &Mapping::new()).unwrap();
        let again = materialize_into(&source, &Mapping::new(), &mapped).unwrap();

        // Same root instance for container roots, same data either way.
        if let (Node::Object(first), Node::Object(second)) = (&mapped, &again) {
            prop_assert!(first.ptr_eq(second));
        }
        if let (Node::Seq(first), Node::Seq(second)) = (&mapped, &again) {
            prop_assert!(first.ptr_eq(second));
        }
        let out = dematerialize(&again, &Mapping::new()).unwrap();
        prop_assert_eq!(out.to_value(), value);
    }
}
