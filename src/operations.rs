//! Declarative operations
//!
//! An operation is a reserved key inside a merge input (`$set`, `$unset`,
//! ...) whose value holds parameters for an edit that a structural merge
//! cannot express. Each operation receives the object being merged, its
//! parameters, and the path separator implied by the sigil it was written
//! with, and reports whether it changed anything.
//!
//! This module contains the callback type and one submodule per built-in
//! operation.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use log::warn;

use crate::error::{Error, Result};
use crate::path;
use crate::value::{ObjectRef, Props, Value};

/// Signature of an operation: `(source, params, separator) -> changed`.
pub type OperationFn = dyn Fn(&Value, &Value, &str) -> Result<bool>;

/// A registered operation
#[derive(Clone)]
pub struct Operation(Rc<OperationFn>);

impl Operation {
    pub fn new<F>(operation: F) -> Self
    where
        F: Fn(&Value, &Value, &str) -> Result<bool> + 'static,
    {
        Self(Rc::new(operation))
    }

    pub fn call(&self, source: &Value, params: &Value, separator: &str) -> Result<bool> {
        (self.0)(source, params, separator)
    }

    /// Whether both handles wrap the same callback.
    pub fn ptr_eq(&self, other: &Operation) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Operation(..)")
    }
}

/// Resolve the object an operation mutates.
///
/// Objects are used directly. Custom values are converted through their
/// operation-input hook, falling back to their plain form; the conversion
/// must produce an object.
pub fn operation_source(operation: &str, source: &Value) -> Result<ObjectRef> {
    let converted = match source {
        Value::Object(object) => return Ok(object.clone()),
        Value::Custom(custom) => custom.to_operation_input().or_else(|| custom.to_plain()),
        _ => None,
    };

    match converted {
        Some(Value::Object(object)) => Ok(object),
        _ => Err(Error::InvalidOperationSource {
            operation: operation.to_string(),
            found: source.type_tag().to_string(),
        }),
    }
}

/// Parameters shaped as a map of path to value.
fn path_map(operation: &str, params: &Value) -> Result<Vec<(String, Value)>> {
    match params {
        Value::Object(map) => Ok(map.entries()),
        other => Err(Error::InvalidOperationParams {
            operation: operation.to_string(),
            message: format!("expected an object of path to value, found {}", other.type_tag()),
        }),
    }
}

/// Parameters shaped as a list of paths. Integral numbers are accepted as
/// array indices.
fn path_list(operation: &str, params: &Value) -> Result<Vec<String>> {
    let Value::Array(items) = params else {
        return Err(Error::InvalidOperationParams {
            operation: operation.to_string(),
            message: format!("expected an array of paths, found {}", params.type_tag()),
        });
    };

    items
        .to_vec()
        .iter()
        .map(|item| match item {
            Value::String(path) => Ok(path.clone()),
            Value::Number(n) if n.fract() == 0.0 && *n >= 0.0 => Ok(format!("{}", *n as u64)),
            other => Err(Error::InvalidOperationParams {
                operation: operation.to_string(),
                message: format!("path must be a string, found {}", other.type_tag()),
            }),
        })
        .collect()
}

/// Elements of the array stored at `path`.
fn array_at(operation: &str, root: &Value, path: &str, separator: &str) -> Result<Vec<Value>> {
    match path::get(root, path, separator) {
        Some(Value::Array(items)) => Ok(items.to_vec()),
        other => Err(Error::InvalidTargetForArrayOp {
            operation: operation.to_string(),
            path: path.to_string(),
            found: other.unwrap_or_default().type_tag().to_string(),
        }),
    }
}

/// Write `value` at `path`, failing when the path cannot hold it.
fn write_path(operation: &str, target: &Value, path: &str, value: Value, separator: &str) -> Result<()> {
    if path::set(target, path, value, separator) {
        return Ok(());
    }
    Err(Error::InvalidOperationParams {
        operation: operation.to_string(),
        message: format!("cannot write to path '{}'", path),
    })
}

/// `$set` - write each value at its path
///
/// Written values are copies, so later edits never reach the parameters.
pub mod set {
    use super::*;

    pub const NAME: &str = "set";
    const LABEL: &str = "$set";

    pub fn apply(source: &Value, params: &Value, separator: &str) -> Result<bool> {
        let target = Value::Object(operation_source(LABEL, source)?);
        let entries = path_map(LABEL, params)?;

        for (path, value) in &entries {
            write_path(LABEL, &target, path, value.deep_copy(), separator)?;
        }

        Ok(!entries.is_empty())
    }
}

/// `$unset` - remove each listed path, `*` meaning every child
pub mod unset {
    use super::*;

    pub const NAME: &str = "unset";
    const LABEL: &str = "$unset";

    pub fn apply(source: &Value, params: &Value, separator: &str) -> Result<bool> {
        let target = Value::Object(operation_source(LABEL, source)?);
        let paths = path_list(LABEL, params)?;

        for path in &paths {
            path::unset(&target, path, separator);
        }

        Ok(!paths.is_empty())
    }
}

/// `$leave` - keep only the listed paths
///
/// Paths are honored two levels deep: `a.b` keeps `a` and, inside it, only
/// `b`. Any further segments are ignored with a warning. Array children are
/// kept by index.
pub mod leave {
    use super::*;

    pub const NAME: &str = "leave";
    const LABEL: &str = "$leave";

    pub fn apply(source: &Value, params: &Value, separator: &str) -> Result<bool> {
        let target = Value::Object(operation_source(LABEL, source)?);
        let paths = path_list(LABEL, params)?;

        leave_paths(&target, &paths, separator);

        Ok(!paths.is_empty())
    }

    fn leave_paths(container: &Value, paths: &[String], separator: &str) {
        let mut kept: IndexMap<&str, Vec<String>> = IndexMap::new();
        for path in paths {
            let mut segments = path.split(separator);
            let leading = segments.next().unwrap_or_default();
            let nested = kept.entry(leading).or_default();
            if let Some(sub) = segments.next() {
                nested.push(sub.to_string());
            }
            if segments.next().is_some() {
                warn!(
                    "{} path '{}' has more than two segments; the rest are ignored",
                    LABEL, path
                );
            }
        }

        match container {
            Value::Object(object) => {
                object.retain(|key, _| kept.contains_key(key));
                for (leading, nested) in &kept {
                    if nested.is_empty() {
                        continue;
                    }
                    if let Some(child) = object.get(leading) {
                        leave_paths(&child, nested, separator);
                    }
                }
            }
            Value::Array(array) => {
                for (leading, nested) in &kept {
                    if nested.is_empty() {
                        continue;
                    }
                    let child = leading.parse::<usize>().ok().and_then(|index| array.get(index));
                    if let Some(child) = child {
                        leave_paths(&child, nested, separator);
                    }
                }
                let items = array
                    .to_vec()
                    .into_iter()
                    .enumerate()
                    .filter(|(index, _)| kept.contains_key(index.to_string().as_str()))
                    .map(|(_, item)| item)
                    .collect();
                array.replace(items);
            }
            _ => {}
        }
    }
}

/// `$push` - append one value to the array at each path
pub mod push {
    use super::*;

    pub const NAME: &str = "push";
    const LABEL: &str = "$push";

    pub fn apply(source: &Value, params: &Value, separator: &str) -> Result<bool> {
        let target = Value::Object(operation_source(LABEL, source)?);
        let entries = path_map(LABEL, params)?;

        for (path, value) in &entries {
            let mut items = array_at(LABEL, &target, path, separator)?;
            items.push(value.deep_copy());
            write_path(LABEL, &target, path, Value::array(items), separator)?;
        }

        Ok(!entries.is_empty())
    }
}

/// `$pull` - remove every element deep-equal to a pulled value
pub mod pull {
    use super::*;

    pub const NAME: &str = "pull";
    const LABEL: &str = "$pull";

    pub fn apply(source: &Value, params: &Value, separator: &str) -> Result<bool> {
        let target = Value::Object(operation_source(LABEL, source)?);
        let entries = path_map(LABEL, params)?;

        for (path, pulled) in &entries {
            let items = array_at(LABEL, &target, path, separator)?;
            let pulled = match pulled {
                Value::Array(list) => list.to_vec(),
                single => vec![single.clone()],
            };
            let kept: Vec<Value> = items
                .into_iter()
                .filter(|item| !pulled.iter().any(|candidate| candidate.deep_eq(item)))
                .collect();
            write_path(LABEL, &target, path, Value::array(kept), separator)?;
        }

        Ok(!entries.is_empty())
    }
}

/// `$concat` - append an array's elements (or a single value) to the array at each path
pub mod concat {
    use super::*;

    pub const NAME: &str = "concat";
    const LABEL: &str = "$concat";

    pub fn apply(source: &Value, params: &Value, separator: &str) -> Result<bool> {
        let target = Value::Object(operation_source(LABEL, source)?);
        let entries = path_map(LABEL, params)?;

        for (path, value) in &entries {
            let mut items = array_at(LABEL, &target, path, separator)?;
            match value {
                Value::Array(extra) => items.extend(extra.to_vec().iter().map(Value::deep_copy)),
                single => items.push(single.deep_copy()),
            }
            write_path(LABEL, &target, path, Value::array(items), separator)?;
        }

        Ok(!entries.is_empty())
    }
}

/// `$default` - write each value only where nothing is stored yet
pub mod default {
    use super::*;

    pub const NAME: &str = "default";
    const LABEL: &str = "$default";

    pub fn apply(source: &Value, params: &Value, separator: &str) -> Result<bool> {
        let target = Value::Object(operation_source(LABEL, source)?);
        let entries = path_map(LABEL, params)?;

        for (path, value) in &entries {
            if path::get_or(&target, path, Value::Undefined, separator).is_undefined() {
                write_path(LABEL, &target, path, value.deep_copy(), separator)?;
            }
        }

        Ok(!entries.is_empty())
    }
}

/// `$propSortOrder` - reorder properties to follow the listed paths
///
/// Listed properties come first, in list order; the others keep their
/// relative order after them. Nested paths reorder nested objects the same
/// way. Properties holding `Undefined` are dropped at every reordered level.
pub mod prop_sort_order {
    use super::*;

    pub const NAME: &str = "propSortOrder";
    const LABEL: &str = "$propSortOrder";

    pub fn apply(source: &Value, params: &Value, separator: &str) -> Result<bool> {
        let target = operation_source(LABEL, source)?;
        let paths = path_list(LABEL, params)?;

        sort_object(&target, &paths, separator);

        Ok(!paths.is_empty())
    }

    fn sort_object(object: &ObjectRef, paths: &[String], separator: &str) {
        let mut order: IndexMap<String, Vec<String>> = IndexMap::new();
        for path in paths {
            match path.split_once(separator) {
                Some((leading, rest)) => order
                    .entry(leading.to_string())
                    .or_default()
                    .push(rest.to_string()),
                None => {
                    order.entry(path.clone()).or_default();
                }
            }
        }

        let mut remaining = object.replace(Props::new());
        let mut sorted = Props::with_capacity(remaining.len());
        for leading in order.keys() {
            if let Some(value) = remaining.shift_remove(leading) {
                sorted.insert(leading.clone(), value);
            }
        }
        sorted.extend(remaining);
        sorted.retain(|_, value| !value.is_undefined());
        object.replace(sorted);

        for (leading, nested) in &order {
            if nested.is_empty() {
                continue;
            }
            if let Some(Value::Object(child)) = object.get(leading) {
                sort_object(&child, nested, separator);
            }
        }
    }
}

/// The built-in operations, by bare name.
pub fn builtins() -> Vec<(&'static str, Operation)> {
    vec![
        (set::NAME, Operation::new(set::apply)),
        (unset::NAME, Operation::new(unset::apply)),
        (leave::NAME, Operation::new(leave::apply)),
        (push::NAME, Operation::new(push::apply)),
        (pull::NAME, Operation::new(pull::apply)),
        (concat::NAME, Operation::new(concat::apply)),
        (default::NAME, Operation::new(default::apply)),
        (prop_sort_order::NAME, Operation::new(prop_sort_order::apply)),
    ]
}
