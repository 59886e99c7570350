//! Shared test utilities for integration tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let merged = merge(vec![val(json!({"a": 1})), val(json!({"b": 2}))]).unwrap();
//!     assert_json(&merged, json!({"a": 1, "b": 2}));
//! }
//! ```

use opmerge::Value;

/// Re-export commonly used items for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use opmerge::{merge, patch, update, Engine, Error, MergeHandler, MergeKind, Operation, Value};
    pub use serde_json::json;

    #[allow(unused_imports)]
    pub use super::{assert_json, child, configs, key_order, val};
}

/// Engine configuration snippets.
#[allow(dead_code)]
pub mod configs {
    /// Only the canonical `$` sigil.
    pub const DOLLAR_ONLY: &str = r#"
sigils:
  - sigil: "$"
    separator: "."
"#;

    /// `@` as the sigil, with `/` separated paths.
    pub const AT_SLASH: &str = r#"
sigils:
  - sigil: "@"
    separator: "/"
"#;
}

/// Build a value from a JSON literal.
#[allow(dead_code)]
pub fn val(json: serde_json::Value) -> Value {
    Value::from(json)
}

/// Assert that a value converts to the expected JSON.
#[allow(dead_code)]
pub fn assert_json(value: &Value, expected: serde_json::Value) {
    assert_eq!(value.to_json(), expected, "unexpected value: {:?}", value);
}

/// The value stored at a `.` path, panicking if nothing is there.
#[allow(dead_code)]
pub fn child(value: &Value, path: &str) -> Value {
    opmerge::path::get(value, path, ".")
        .unwrap_or_else(|| panic!("nothing stored at '{}'", path))
}

/// Property names of the object at a `.` path, in order. An empty path
/// addresses the value itself.
#[allow(dead_code)]
pub fn key_order(value: &Value, path: &str) -> Vec<String> {
    child(value, path)
        .as_object()
        .map(|object| object.keys())
        .unwrap_or_else(|| panic!("'{}' is not an object", path))
}
