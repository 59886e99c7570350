//! Object merge handlers
//!
//! Object + Object is where declarative operations run. Keys of the second
//! object that name a registered operation are queued instead of merged, and
//! run in discovery order once every plain key has been merged.
//!
//! ## Change tracking
//!
//! Under `update` the merged object is only returned when something differs:
//! a child that is no longer the same value as before, a new key with a
//! defined value, or an operation reporting a change. Otherwise the first
//! object comes back untouched. `merge` always counts as a change and `patch`
//! writes into the first object directly, so both always return the result.
//!
//! ## Operations and shared children
//!
//! Outside of `merge` the result holds handles to the caller's containers,
//! and an operation with a nested path would write through them. Before the
//! operations run, every such child is swapped for a deep copy. Afterwards
//! each copy is swapped back for the original wherever the operations left
//! that subtree alone, so unchanged subtrees keep their identity.

use std::collections::HashSet;

use log::debug;

use super::{unexpected_pair, MergeKind};
use crate::engine::Engine;
use crate::error::Result;
use crate::operations::Operation;
use crate::value::{ObjectRef, Value};

/// An operation found on an object, waiting for the plain keys to be merged.
struct QueuedOperation<'e> {
    key: String,
    operation: Operation,
    separator: &'e str,
    params: Value,
}

/// Object + Object
pub fn object_object(engine: &Engine, first: &Value, second: &Value, kind: MergeKind) -> Result<Value> {
    let (Value::Object(source), Value::Object(incoming)) = (first, second) else {
        return Err(unexpected_pair(first, second));
    };
    merge_objects(engine, source, incoming, kind)
}

/// Undefined + Object
///
/// Under `merge` this clones `second` into a new object. Under `patch` and
/// `update` the object is adopted as is, unless it carries operations (or a
/// nested child changed), in which case a new object holding its plain keys
/// is built and the operations run against it.
pub fn undefined_object(engine: &Engine, first: &Value, second: &Value, kind: MergeKind) -> Result<Value> {
    let Value::Object(incoming) = second else {
        return Err(unexpected_pair(first, second));
    };

    if kind == MergeKind::Merge {
        return merge_objects(engine, &ObjectRef::new(), incoming, kind);
    }

    let result = ObjectRef::new();
    let mut changed = false;
    let mut queued = Vec::new();

    for (key, value) in incoming.entries() {
        if let Some(operation) = queue_operation(engine, &key, &value) {
            queued.push(operation);
            continue;
        }
        let merged = engine.merge_pair(&Value::Undefined, &value, kind)?;
        if !merged.same(&value) {
            changed = true;
        }
        result.insert(key, merged);
    }

    if queued.is_empty() && !changed {
        return Ok(second.clone());
    }

    let shared = result.keys();
    run_detached(&result, queued, shared)?;
    Ok(Value::Object(result))
}

/// Merge two objects key by key and run the operations found on `second`.
pub(crate) fn merge_objects(
    engine: &Engine,
    first: &ObjectRef,
    second: &ObjectRef,
    kind: MergeKind,
) -> Result<Value> {
    let result = match kind {
        MergeKind::Patch => first.clone(),
        _ => ObjectRef::new(),
    };
    let mut changed = kind == MergeKind::Merge;
    // keys whose values may be handles into an input other than the target
    let mut shared = Vec::new();

    let first_keys = first.keys();
    for key in &first_keys {
        let original = first.get(key).unwrap_or_default();
        let incoming = second.get(key).unwrap_or_default();
        let merged = engine.merge_pair(&original, &incoming, kind)?;
        let same = merged.same(&original);
        if !same {
            changed = true;
        }
        if kind == MergeKind::Update || (kind == MergeKind::Patch && !same) {
            shared.push(key.clone());
        }
        result.insert(key.as_str(), merged);
    }

    let existing: HashSet<&str> = first_keys.iter().map(String::as_str).collect();
    let mut queued = Vec::new();
    for (key, value) in second.entries() {
        if existing.contains(key.as_str()) {
            continue;
        }
        if let Some(operation) = queue_operation(engine, &key, &value) {
            queued.push(operation);
            continue;
        }
        let merged = engine.merge_pair(&Value::Undefined, &value, kind)?;
        if !merged.is_undefined() {
            changed = true;
        }
        if kind != MergeKind::Merge {
            shared.push(key.clone());
        }
        result.insert(key, merged);
    }

    if run_detached(&result, queued, shared)? {
        changed = true;
    }

    Ok(Value::Object(if changed { result } else { first.clone() }))
}

fn queue_operation<'e>(engine: &'e Engine, key: &str, params: &Value) -> Option<QueuedOperation<'e>> {
    engine
        .resolve_operation(key)
        .map(|(operation, separator)| QueuedOperation {
            key: key.to_string(),
            operation,
            separator,
            params: params.clone(),
        })
}

/// Run queued operations with the `shared` children of `target` detached
/// from the inputs they came from.
fn run_detached(target: &ObjectRef, queued: Vec<QueuedOperation<'_>>, shared: Vec<String>) -> Result<bool> {
    if queued.is_empty() {
        return Ok(false);
    }

    let mut originals = Vec::with_capacity(shared.len());
    for key in shared {
        if let Some(original) = target.get(&key) {
            target.insert(key.as_str(), original.deep_copy());
            originals.push((key, original));
        }
    }

    let changed = run_operations(target, queued)?;

    for (key, original) in originals {
        if let Some(detached) = target.get(&key) {
            target.insert(key, reattach(detached, &original));
        }
    }
    Ok(changed)
}

/// Put `original` back wherever `detached` still holds the same tree.
fn reattach(detached: Value, original: &Value) -> Value {
    if same_tree(&detached, original) {
        return original.clone();
    }

    match (&detached, original) {
        (Value::Object(copy), Value::Object(source)) => {
            for (key, child) in copy.entries() {
                if let Some(before) = source.get(&key) {
                    copy.insert(key, reattach(child, &before));
                }
            }
        }
        (Value::Array(copy), Value::Array(source)) => {
            for (index, child) in copy.to_vec().into_iter().enumerate() {
                if let Some(before) = source.get(index) {
                    copy.set(index, reattach(child, &before));
                }
            }
        }
        _ => {}
    }
    detached
}

/// Structural equality that also compares property order.
fn same_tree(left: &Value, right: &Value) -> bool {
    if left.same(right) {
        return true;
    }
    match (left, right) {
        (Value::Object(a), Value::Object(b)) => {
            let (a, b) = (a.entries(), b.entries());
            a.len() == b.len()
                && a.iter()
                    .zip(&b)
                    .all(|((ka, va), (kb, vb))| ka == kb && same_tree(va, vb))
        }
        (Value::Array(a), Value::Array(b)) => {
            let (a, b) = (a.to_vec(), b.to_vec());
            a.len() == b.len() && a.iter().zip(&b).all(|(x, y)| same_tree(x, y))
        }
        _ => left.deep_eq(right),
    }
}

/// Run queued operations in order. Returns whether any reported a change.
fn run_operations(target: &ObjectRef, queued: Vec<QueuedOperation<'_>>) -> Result<bool> {
    let source = Value::Object(target.clone());
    let mut changed = false;
    for queued in queued {
        debug!("running operation {}", queued.key);
        if queued.operation.call(&source, &queued.params, queued.separator)? {
            changed = true;
        }
    }
    Ok(changed)
}
