//! Path access over nested values
//!
//! Paths are separator-joined segments (`a.b.0` with the default `.`
//! separator, `aꓺb.cꓺ0` with the alternate one). Segments address object
//! properties by name and array elements by decimal index. `unset` also
//! accepts the wildcard segment `*`, meaning "every child at this level".

use crate::value::{ObjectRef, Value};

/// Segment matching every child of a container in [`unset`].
pub const WILDCARD: &str = "*";

/// Split a path into segments. An empty path has no segments.
pub fn split<'a>(path: &'a str, separator: &str) -> Vec<&'a str> {
    if path.is_empty() {
        return Vec::new();
    }
    path.split(separator).collect()
}

/// Read the value at `path`. An empty path addresses `root` itself.
pub fn get(root: &Value, path: &str, separator: &str) -> Option<Value> {
    let mut current = root.clone();
    for segment in split(path, separator) {
        current = child(&current, segment)?;
    }
    Some(current)
}

/// Read the value at `path`, or `default` when nothing is stored there.
pub fn get_or(root: &Value, path: &str, default: Value, separator: &str) -> Value {
    get(root, path, separator).unwrap_or(default)
}

/// Write `value` at `path`, creating intermediate objects where a segment is
/// missing or holds a scalar.
///
/// Returns `false` if nothing could be written: an empty path, a final
/// container that is neither an object nor an array, or an array index too
/// far past the end of its array.
pub fn set(root: &Value, path: &str, value: Value, separator: &str) -> bool {
    let segments = split(path, separator);
    let Some((last, parents)) = segments.split_last() else {
        return false;
    };

    let mut current = root.clone();
    for segment in parents {
        current = match child(&current, segment) {
            Some(next @ (Value::Object(_) | Value::Array(_))) => next,
            _ => {
                let created = Value::Object(ObjectRef::new());
                if !assign(&current, segment, created.clone()) {
                    return false;
                }
                created
            }
        };
    }

    assign(&current, last, value)
}

/// Remove the value at `path`. A `*` segment fans out over every child;
/// a trailing `*` clears the container it addresses. Array elements are
/// left as `Undefined` holes so later indices keep their positions.
///
/// Returns whether anything was removed.
pub fn unset(root: &Value, path: &str, separator: &str) -> bool {
    unset_segments(root, &split(path, separator))
}

fn unset_segments(current: &Value, segments: &[&str]) -> bool {
    let Some((head, rest)) = segments.split_first() else {
        return false;
    };

    if rest.is_empty() {
        return if *head == WILDCARD {
            clear_children(current)
        } else {
            remove_child(current, head)
        };
    }

    if *head == WILDCARD {
        children(current)
            .iter()
            .fold(false, |removed, next| unset_segments(next, rest) | removed)
    } else {
        child(current, head).is_some_and(|next| unset_segments(&next, rest))
    }
}

fn parse_index(segment: &str) -> Option<usize> {
    segment.parse().ok()
}

fn child(container: &Value, segment: &str) -> Option<Value> {
    match container {
        Value::Object(object) => object.get(segment),
        Value::Array(array) => parse_index(segment).and_then(|index| array.get(index)),
        Value::Map(map) => map.get(&Value::from(segment)),
        _ => None,
    }
}

fn children(container: &Value) -> Vec<Value> {
    match container {
        Value::Object(object) => object.entries().into_iter().map(|(_, v)| v).collect(),
        Value::Array(array) => array.to_vec(),
        _ => Vec::new(),
    }
}

fn assign(container: &Value, segment: &str, value: Value) -> bool {
    match container {
        Value::Object(object) => {
            object.insert(segment, value);
            true
        }
        Value::Array(array) => match parse_index(segment) {
            Some(index) => array.set(index, value),
            None => false,
        },
        Value::Map(map) => {
            map.set(Value::from(segment), value);
            true
        }
        _ => false,
    }
}

fn remove_child(container: &Value, segment: &str) -> bool {
    match container {
        Value::Object(object) => object.remove(segment).is_some(),
        Value::Array(array) => match parse_index(segment) {
            Some(index) if index < array.len() => array.set(index, Value::Undefined),
            _ => false,
        },
        Value::Map(map) => map.delete(&Value::from(segment)),
        _ => false,
    }
}

fn clear_children(container: &Value) -> bool {
    match container {
        Value::Object(object) => {
            let had_children = !object.is_empty();
            object.clear();
            had_children
        }
        Value::Array(array) => {
            let had_children = !array.is_empty();
            array.clear();
            had_children
        }
        _ => false,
    }
}
