//! # opmerge
//!
//! A type-dispatching deep merge. Values are merged pairwise by handlers
//! chosen from the types of both operands, and objects may carry declarative
//! operations (`$set`, `$unset`, `$push`, ...) that edit the merge result.
//!
//! ## Quick Example
//!
//! ```
//! use opmerge::Value;
//! use serde_json::json;
//!
//! let base = Value::from(json!({"a": {"one": 1, "two": 2}, "tags": ["x"]}));
//! let change = Value::from(json!({
//!     "a": {"$unset": ["one"]},
//!     "$push": {"tags": "y"}
//! }));
//!
//! let merged = opmerge::merge(vec![base.clone(), change]).unwrap();
//! assert_eq!(merged.to_json(), json!({"a": {"two": 2}, "tags": ["x", "y"]}));
//!
//! // `merge` never touches its inputs
//! assert_eq!(base.to_json(), json!({"a": {"one": 1, "two": 2}, "tags": ["x"]}));
//! ```
//!
//! ## Core Concepts
//!
//! - **Values (`value`)**: Objects, arrays and the other containers are shared
//!   handles, so a merge can return, mutate or replace the caller's containers.
//! - **Merge kinds (`merge`)**: `merge` deep-clones, `patch` mutates the first
//!   input in place, `update` is copy-on-write and returns the first input
//!   when nothing changed.
//! - **Handlers (`merge`)**: One per type pair, with `Any` as a wildcard on
//!   either side.
//! - **Operations (`operations`)**: Object keys starting with a configured
//!   sigil run after the plain keys of that object have been merged.
//! - **Paths (`path`)**: Operations address nested properties with separator
//!   delimited paths (`a.b.c`, or `aꓺbꓺc` under the `ꓺ` sigil).
//! - **Engine (`engine`)**: Holds the handler and operation tables. Each
//!   thread has a default engine behind the free functions of this crate.

pub mod config;
pub mod engine;
pub mod error;
pub mod merge;
pub mod operations;
pub mod path;
pub mod value;

pub use engine::{
    merge, patch, register_merge_handler, register_operation, update, with_default_engine,
    with_default_engine_mut, Engine,
};
pub use error::{Error, Result};
pub use merge::{MergeHandler, MergeKind};
pub use operations::Operation;
pub use value::{CustomValue, ObjectRef, TypeTag, Value};

#[cfg(test)]
mod merge_proptest;
