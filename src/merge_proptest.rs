//! Property-based tests for the merge kinds.
//!
//! These tests generate random JSON-like trees and verify the identity and
//! immutability guarantees of `merge`, `patch` and `update`.

#[cfg(test)]
mod proptest_tests {
    use crate::engine::Engine;
    use crate::value::Value;
    use proptest::prelude::*;
    use serde_json::json;

    /// Plain trees: scalars, objects and arrays with short lowercase keys.
    fn tree(arrays: bool) -> impl Strategy<Value = serde_json::Value> {
        let leaf = prop_oneof![
            Just(json!(null)),
            any::<bool>().prop_map(|b| json!(b)),
            (-1000i64..1000).prop_map(|n| json!(n)),
            "[a-z ]{0,6}".prop_map(|s| json!(s)),
        ];
        leaf.prop_recursive(3, 24, 4, move |inner| {
            let object = prop::collection::btree_map("[a-z]{1,4}", inner.clone(), 0..4)
                .prop_map(|map| serde_json::Value::Object(map.into_iter().collect()));
            if arrays {
                prop_oneof![
                    object,
                    prop::collection::vec(inner, 0..4).prop_map(serde_json::Value::Array),
                ]
                .boxed()
            } else {
                object.boxed()
            }
        })
    }

    fn object_tree(arrays: bool) -> impl Strategy<Value = serde_json::Value> {
        prop::collection::btree_map("[a-z]{1,4}", tree(arrays), 0..5)
            .prop_map(|map| serde_json::Value::Object(map.into_iter().collect()))
    }

    /// Every `.` path addressing a property or element inside `value`.
    fn paths(value: &serde_json::Value, prefix: &str, out: &mut Vec<String>) {
        let children: Vec<(String, &serde_json::Value)> = match value {
            serde_json::Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
            serde_json::Value::Array(items) => items.iter().enumerate().map(|(i, v)| (i.to_string(), v)).collect(),
            _ => return,
        };
        for (segment, child) in children {
            let path = if prefix.is_empty() { segment } else { format!("{}.{}", prefix, segment) };
            out.push(path.clone());
            paths(child, &path, out);
        }
    }

    /// Operations aimed at paths that exist in `first`, so nested writes land
    /// inside its containers.
    fn operations_on(first: &serde_json::Value, picks: [prop::sample::Index; 3], value: serde_json::Value) -> serde_json::Value {
        let mut all = Vec::new();
        paths(first, "", &mut all);
        if all.is_empty() {
            all.push("k".to_string());
        }
        let [set, unset, sort] = picks.map(|pick| pick.get(&all).clone());
        json!({
            "$set": {(set.clone()): value.clone()},
            "$default": {(format!("{}.d", set)): value},
            "$unset": [unset],
            "$propSortOrder": [sort],
        })
    }

    // ============================================================================
    // merge property tests
    // ============================================================================

    proptest! {
        /// Property: merging a value with itself yields an equal value
        #[test]
        fn merge_with_self_is_idempotent(input in object_tree(true)) {
            let value = Value::from(input.clone());
            let merged = Engine::new().merge(vec![value.clone(), value]).unwrap();
            prop_assert_eq!(merged.to_json(), input);
        }

        /// Property: merge never mutates its inputs
        #[test]
        fn merge_does_not_mutate_inputs(first in object_tree(true), second in object_tree(true)) {
            let a = Value::from(first.clone());
            let b = Value::from(second.clone());
            Engine::new().merge(vec![a.clone(), b.clone()]).unwrap();
            prop_assert_eq!(a.to_json(), first);
            prop_assert_eq!(b.to_json(), second);
        }

        /// Property: a merge of two objects always allocates a new object
        #[test]
        fn merge_result_is_a_new_object(first in object_tree(true), second in object_tree(true)) {
            let a = Value::from(first);
            let merged = Engine::new().merge(vec![a.clone(), Value::from(second)]).unwrap();
            prop_assert!(!merged.same(&a));
        }
    }

    // ============================================================================
    // patch property tests
    // ============================================================================

    proptest! {
        /// Property: patch returns its first input
        #[test]
        fn patch_returns_first(first in object_tree(true), second in object_tree(true)) {
            let a = Value::from(first);
            let patched = Engine::new().patch(vec![a.clone(), Value::from(second)]).unwrap();
            prop_assert!(patched.same(&a));
        }

        /// Property: patch and merge produce equal trees
        #[test]
        fn patch_agrees_with_merge(first in object_tree(true), second in object_tree(true)) {
            let engine = Engine::new();
            let merged = engine
                .merge(vec![Value::from(first.clone()), Value::from(second.clone())])
                .unwrap();
            let patched = engine
                .patch(vec![Value::from(first), Value::from(second)])
                .unwrap();
            prop_assert_eq!(patched.to_json(), merged.to_json());
        }
    }

    // ============================================================================
    // update property tests
    // ============================================================================

    proptest! {
        /// Property: updating a value with itself returns the same reference
        #[test]
        fn update_with_self_returns_first(input in object_tree(true)) {
            let value = Value::from(input);
            let updated = Engine::new().update(vec![value.clone(), value.clone()]).unwrap();
            prop_assert!(updated.same(&value));
        }

        /// Property: updating with an array-free structural copy returns the same reference
        #[test]
        fn update_with_copy_returns_first(input in object_tree(false)) {
            let value = Value::from(input.clone());
            let updated = Engine::new().update(vec![value.clone(), Value::from(input)]).unwrap();
            prop_assert!(updated.same(&value));
        }

        /// Property: update never mutates its inputs and agrees with merge
        #[test]
        fn update_does_not_mutate_inputs(first in object_tree(true), second in object_tree(true)) {
            let engine = Engine::new();
            let a = Value::from(first.clone());
            let b = Value::from(second.clone());
            let updated = engine.update(vec![a.clone(), b.clone()]).unwrap();
            let merged = engine.merge(vec![Value::from(first.clone()), Value::from(second.clone())]).unwrap();

            prop_assert_eq!(a.to_json(), first);
            prop_assert_eq!(b.to_json(), second);
            prop_assert_eq!(updated.to_json(), merged.to_json());
        }

        /// Property: update never mutates its inputs when operations write
        /// along nested paths of the first input
        #[test]
        fn update_with_operations_does_not_mutate_inputs(
            first in object_tree(true),
            picks in any::<[prop::sample::Index; 3]>(),
            value in tree(false),
        ) {
            let second = operations_on(&first, picks, value);
            let engine = Engine::new();
            let a = Value::from(first.clone());
            let b = Value::from(second.clone());
            let updated = engine.update(vec![a.clone(), b.clone()]).unwrap();
            let merged = engine.merge(vec![Value::from(first.clone()), Value::from(second.clone())]).unwrap();

            prop_assert_eq!(a.to_json(), first);
            prop_assert_eq!(b.to_json(), second);
            prop_assert_eq!(updated.to_json(), merged.to_json());
        }
    }
}
