//! Array, built-in container, and wildcard merge handlers
//!
//! Arrays are never merged key by key. Under `merge` each element of the
//! incoming array is deep-cloned into a new array; under `patch` and `update`
//! the incoming array replaces the existing one wholesale.

use std::rc::Rc;

use log::trace;

use super::{unexpected_pair, MergeKind};
use crate::engine::Engine;
use crate::error::Result;
use crate::value::{ArrayRef, Value};

/// Array + Array
pub fn array_array(engine: &Engine, first: &Value, second: &Value, kind: MergeKind) -> Result<Value> {
    let (Value::Array(_), Value::Array(incoming)) = (first, second) else {
        return Err(unexpected_pair(first, second));
    };

    if kind != MergeKind::Merge {
        return Ok(second.clone());
    }

    let items = incoming
        .to_vec()
        .iter()
        .map(|item| engine.merge_pair(&Value::Undefined, item, kind))
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::Array(ArrayRef::from_vec(items)))
}

/// Undefined + Array
pub fn undefined_array(engine: &Engine, _first: &Value, second: &Value, kind: MergeKind) -> Result<Value> {
    match kind {
        MergeKind::Merge => engine.merge_pair(&Value::Array(ArrayRef::new()), second, kind),
        _ => Ok(second.clone()),
    }
}

/// Undefined + Date, Set, Map, WeakSet or WeakMap
///
/// Under `merge` a new instance with the same contents is built; otherwise
/// the incoming instance is adopted as is.
pub fn undefined_builtin(_engine: &Engine, first: &Value, second: &Value, kind: MergeKind) -> Result<Value> {
    if kind != MergeKind::Merge {
        return Ok(second.clone());
    }

    trace!("cloning {} into a new instance", second.type_tag());
    match second {
        Value::Date(instant) => Ok(Value::Date(Rc::new(**instant))),
        Value::Set(set) => Ok(Value::Set(set.shallow_copy())),
        Value::Map(map) => Ok(Value::Map(map.shallow_copy())),
        Value::WeakSet(set) => Ok(Value::WeakSet(set.shallow_copy())),
        Value::WeakMap(map) => Ok(Value::WeakMap(map.shallow_copy())),
        _ => Err(unexpected_pair(first, second)),
    }
}

/// Undefined + Any: the defined side wins.
pub fn undefined_any(_engine: &Engine, _first: &Value, second: &Value, _kind: MergeKind) -> Result<Value> {
    Ok(second.clone())
}

/// Any + Undefined: merged as `Undefined + first`, so the kind-specific
/// cloning rules of the undefined-first handlers apply.
pub fn any_undefined(engine: &Engine, first: &Value, _second: &Value, kind: MergeKind) -> Result<Value> {
    engine.merge_pair(&Value::Undefined, first, kind)
}

/// Any + Any: the second value wins, whatever the kind.
pub fn any_any(_engine: &Engine, _first: &Value, second: &Value, _kind: MergeKind) -> Result<Value> {
    Ok(second.clone())
}
