//! Merge kinds and type-pair handlers
//!
//! A merge handler combines two values of known types. The engine picks the
//! handler by the canonical types of both operands, trying in order the exact
//! pair, `(first, Any)`, `(Any, second)` and finally `(Any, Any)`.
//!
//! ## Built-in Handlers
//!
//! - Object + Object (object.rs) - key-by-key recursion plus declarative operations
//! - Undefined + Object (object.rs) - clone, or adopt while running operations
//! - Array + Array, Undefined + Array (containers.rs) - element clone or wholesale replace
//! - Undefined + Date/Set/Map/WeakSet/WeakMap (containers.rs) - clone or adopt
//! - Undefined + Any, Any + Undefined, Any + Any (containers.rs) - the defined side wins

pub mod containers;
pub mod object;

use std::fmt;
use std::rc::Rc;

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::value::{TypeTag, Value};

/// How a merge treats its inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MergeKind {
    /// Deep clone: inputs are never mutated and every container is new.
    Merge,
    /// In place: the first input is mutated and returned.
    Patch,
    /// Copy-on-write: the first input is returned untouched unless something
    /// changed, and only changed levels are reallocated.
    Update,
}

impl fmt::Display for MergeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MergeKind::Merge => "merge",
            MergeKind::Patch => "patch",
            MergeKind::Update => "update",
        })
    }
}

/// One side of a handler key: a concrete type or the wildcard
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKey {
    Any,
    Type(TypeTag),
}

impl TypeKey {
    /// Parse a registration name. `"Any"` is the wildcard; every other
    /// non-empty name is a type.
    pub fn parse(name: &str) -> Result<TypeKey> {
        match name.trim() {
            "" => Err(Error::InvalidRegistration {
                message: "type name must not be empty".to_string(),
            }),
            "Any" => Ok(TypeKey::Any),
            other => Ok(TypeKey::Type(TypeTag::from_name(other))),
        }
    }
}

impl From<TypeTag> for TypeKey {
    fn from(tag: TypeTag) -> Self {
        TypeKey::Type(tag)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKey::Any => f.write_str("Any"),
            TypeKey::Type(tag) => fmt::Display::fmt(tag, f),
        }
    }
}

/// Key of the handler table.
pub type HandlerKey = (TypeKey, TypeKey);

/// Signature of a merge handler: `(engine, first, second, kind) -> merged`.
pub type MergeFn = dyn Fn(&Engine, &Value, &Value, MergeKind) -> Result<Value>;

/// A registered merge handler
#[derive(Clone)]
pub struct MergeHandler(Rc<MergeFn>);

impl MergeHandler {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&Engine, &Value, &Value, MergeKind) -> Result<Value> + 'static,
    {
        Self(Rc::new(handler))
    }

    pub fn call(&self, engine: &Engine, first: &Value, second: &Value, kind: MergeKind) -> Result<Value> {
        (self.0)(engine, first, second, kind)
    }

    /// Whether both handles wrap the same callback.
    pub fn ptr_eq(&self, other: &MergeHandler) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for MergeHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MergeHandler(..)")
    }
}

/// Handler keys to try for a type pair, highest priority first.
pub fn candidate_keys(first: &TypeTag, second: &TypeTag) -> [HandlerKey; 4] {
    [
        (TypeKey::Type(first.clone()), TypeKey::Type(second.clone())),
        (TypeKey::Type(first.clone()), TypeKey::Any),
        (TypeKey::Any, TypeKey::Type(second.clone())),
        (TypeKey::Any, TypeKey::Any),
    ]
}

/// Error for a handler invoked with operands it does not handle.
pub(crate) fn unexpected_pair(first: &Value, second: &Value) -> Error {
    Error::UnsupportedMergeType {
        first: first.type_tag().to_string(),
        second: second.type_tag().to_string(),
    }
}

/// The built-in handler table.
pub fn builtins() -> Vec<(HandlerKey, MergeHandler)> {
    use TypeKey::{Any, Type};

    let mut table = vec![
        ((Type(TypeTag::Object), Type(TypeTag::Object)), MergeHandler::new(object::object_object)),
        ((Type(TypeTag::Array), Type(TypeTag::Array)), MergeHandler::new(containers::array_array)),
        ((Type(TypeTag::Undefined), Type(TypeTag::Array)), MergeHandler::new(containers::undefined_array)),
        ((Type(TypeTag::Undefined), Type(TypeTag::Object)), MergeHandler::new(object::undefined_object)),
        ((Type(TypeTag::Undefined), Any), MergeHandler::new(containers::undefined_any)),
        ((Any, Type(TypeTag::Undefined)), MergeHandler::new(containers::any_undefined)),
        ((Any, Any), MergeHandler::new(containers::any_any)),
    ];

    for tag in [TypeTag::Date, TypeTag::Set, TypeTag::WeakSet, TypeTag::Map, TypeTag::WeakMap] {
        table.push((
            (Type(TypeTag::Undefined), Type(tag)),
            MergeHandler::new(containers::undefined_builtin),
        ));
    }

    table
}
