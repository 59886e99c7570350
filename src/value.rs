//! # Mergeable Values
//!
//! The engine works on [`Value`], a dynamically typed tree that mirrors the
//! kinds of data a merge input can carry: scalars, ordered objects, arrays,
//! dates, sets, maps, weak sets, weak maps, and host-defined custom types.
//!
//! ## Reference semantics
//!
//! Container variants hold shared handles ([`ObjectRef`], [`ArrayRef`], ...).
//! Cloning a `Value` clones the handle, not the contents, so two `Value`s can
//! point at the same object. This is what lets `patch` mutate its first input
//! in place and lets `update` hand back the very same object when nothing
//! changed. [`Value::same`] checks that identity; [`Value::deep_eq`] (and
//! `PartialEq`) compares structure.
//!
//! ## Type names
//!
//! [`Value::type_tag`] gives the canonical type of a value. Merge handlers are
//! registered against these tags.

use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexMap;
use std::cell::{Ref, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// Ordered property storage of an object.
pub type Props = IndexMap<String, Value>;

type WeakKey = Weak<RefCell<Props>>;

/// A host-defined opaque type that can take part in merges.
///
/// Custom values dispatch on [`CustomValue::type_name`]. The two conversion
/// hooks are optional capabilities: when an operation runs against a custom
/// value, the engine asks for `to_operation_input` first, then `to_plain`,
/// and operates on the object returned.
pub trait CustomValue: fmt::Debug {
    /// Canonical type name used for merge dispatch.
    fn type_name(&self) -> &str;

    /// Object that declarative operations should mutate.
    fn to_operation_input(&self) -> Option<Value> {
        None
    }

    /// Plain (JSON-like) form of this value.
    fn to_plain(&self) -> Option<Value> {
        None
    }
}

/// Canonical runtime type of a [`Value`]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Undefined,
    Null,
    Boolean,
    Number,
    String,
    Object,
    Array,
    Date,
    Set,
    Map,
    WeakSet,
    WeakMap,
    /// A [`CustomValue`] type, by name.
    Custom(String),
}

impl TypeTag {
    /// The canonical name of this type.
    pub fn name(&self) -> &str {
        match self {
            TypeTag::Undefined => "Undefined",
            TypeTag::Null => "Null",
            TypeTag::Boolean => "Boolean",
            TypeTag::Number => "Number",
            TypeTag::String => "String",
            TypeTag::Object => "Object",
            TypeTag::Array => "Array",
            TypeTag::Date => "Date",
            TypeTag::Set => "Set",
            TypeTag::Map => "Map",
            TypeTag::WeakSet => "WeakSet",
            TypeTag::WeakMap => "WeakMap",
            TypeTag::Custom(name) => name,
        }
    }

    /// Look up a type by canonical name. Unknown names are custom types.
    pub fn from_name(name: &str) -> TypeTag {
        match name {
            "Undefined" => TypeTag::Undefined,
            "Null" => TypeTag::Null,
            "Boolean" => TypeTag::Boolean,
            "Number" => TypeTag::Number,
            "String" => TypeTag::String,
            "Object" => TypeTag::Object,
            "Array" => TypeTag::Array,
            "Date" => TypeTag::Date,
            "Set" => TypeTag::Set,
            "Map" => TypeTag::Map,
            "WeakSet" => TypeTag::WeakSet,
            "WeakMap" => TypeTag::WeakMap,
            other => TypeTag::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A mergeable value
#[derive(Debug, Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Date(Rc<DateTime<Utc>>),
    Array(ArrayRef),
    Object(ObjectRef),
    Set(SetRef),
    Map(MapRef),
    WeakSet(WeakSetRef),
    WeakMap(WeakMapRef),
    Custom(Rc<dyn CustomValue>),
}

impl Value {
    /// A new, empty object.
    pub fn new_object() -> Value {
        Value::Object(ObjectRef::new())
    }

    /// A new array holding `items`.
    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(ArrayRef::from_vec(items))
    }

    pub fn date(instant: DateTime<Utc>) -> Value {
        Value::Date(Rc::new(instant))
    }

    pub fn custom<T: CustomValue + 'static>(value: T) -> Value {
        Value::Custom(Rc::new(value))
    }

    /// Canonical type of this value.
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Undefined => TypeTag::Undefined,
            Value::Null => TypeTag::Null,
            Value::Bool(_) => TypeTag::Boolean,
            Value::Number(_) => TypeTag::Number,
            Value::String(_) => TypeTag::String,
            Value::Date(_) => TypeTag::Date,
            Value::Array(_) => TypeTag::Array,
            Value::Object(_) => TypeTag::Object,
            Value::Set(_) => TypeTag::Set,
            Value::Map(_) => TypeTag::Map,
            Value::WeakSet(_) => TypeTag::WeakSet,
            Value::WeakMap(_) => TypeTag::WeakMap,
            Value::Custom(custom) => TypeTag::Custom(custom.type_name().to_string()),
        }
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(object) => Some(object),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Value::Array(array) => Some(array),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Identity check with strict-equality rules: containers are the same
    /// only if they are the same handle, scalars compare by value, and NaN is
    /// never the same as anything.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => Rc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Set(a), Value::Set(b)) => a.ptr_eq(b),
            (Value::Map(a), Value::Map(b)) => a.ptr_eq(b),
            (Value::WeakSet(a), Value::WeakSet(b)) => a.ptr_eq(b),
            (Value::WeakMap(a), Value::WeakMap(b)) => a.ptr_eq(b),
            (Value::Custom(a), Value::Custom(b)) => std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b)),
            _ => false,
        }
    }

    /// Like [`Value::same`], except NaN matches NaN. Used for set members
    /// and map keys.
    pub fn same_value_zero(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            _ => self.same(other),
        }
    }

    /// Structural equality.
    pub fn deep_eq(&self, other: &Value) -> bool {
        if self.same(other) {
            return true;
        }
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.is_nan() && b.is_nan(),
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x.deep_eq(y))
            }
            (Value::Object(a), Value::Object(b)) => {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len()
                    && a.iter()
                        .all(|(key, x)| b.get(key).is_some_and(|y| x.deep_eq(y)))
            }
            (Value::Set(a), Value::Set(b)) => {
                let (a, b) = (a.values(), b.values());
                a.len() == b.len() && a.iter().all(|x| b.iter().any(|y| x.deep_eq(y)))
            }
            (Value::Map(a), Value::Map(b)) => {
                let (a, b) = (a.entries(), b.entries());
                a.len() == b.len()
                    && a.iter().all(|(ka, va)| {
                        b.iter().any(|(kb, vb)| ka.deep_eq(kb) && va.deep_eq(vb))
                    })
            }
            (Value::Custom(a), Value::Custom(b)) => match (a.to_plain(), b.to_plain()) {
                (Some(x), Some(y)) => x.deep_eq(&y),
                _ => false,
            },
            _ => false,
        }
    }

    /// Copy of this value in which every object, array and map is freshly
    /// allocated. Other values keep their handles.
    pub fn deep_copy(&self) -> Value {
        match self {
            Value::Object(object) => Value::Object(
                object
                    .entries()
                    .into_iter()
                    .map(|(key, value)| (key, value.deep_copy()))
                    .collect(),
            ),
            Value::Array(items) => Value::array(items.to_vec().iter().map(Value::deep_copy).collect()),
            Value::Map(map) => Value::Map(
                map.entries()
                    .into_iter()
                    .map(|(key, value)| (key, value.deep_copy()))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    /// Plain JSON form of this value.
    ///
    /// Undefined object properties are dropped, dates become RFC 3339
    /// strings, sets become arrays, and maps become arrays of `[key, value]`
    /// pairs. Weak containers have no enumerable contents and become `{}`.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Value::Undefined | Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => number_to_json(*n),
            Value::String(s) => Json::String(s.clone()),
            Value::Date(d) => Json::String(d.to_rfc3339_opts(SecondsFormat::Millis, true)),
            Value::Array(items) => Json::Array(items.borrow().iter().map(Value::to_json).collect()),
            Value::Object(object) => Json::Object(
                object
                    .borrow()
                    .iter()
                    .filter(|(_, v)| !v.is_undefined())
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
            Value::Set(set) => Json::Array(set.values().iter().map(Value::to_json).collect()),
            Value::Map(map) => Json::Array(
                map.entries()
                    .iter()
                    .map(|(k, v)| Json::Array(vec![k.to_json(), v.to_json()]))
                    .collect(),
            ),
            Value::WeakSet(_) | Value::WeakMap(_) => Json::Object(serde_json::Map::new()),
            Value::Custom(custom) => custom.to_plain().map_or(Json::Null, |plain| plain.to_json()),
        }
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

    if n.is_finite() && n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        serde_json::Value::Number((n as i64).into())
    } else {
        serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Value) -> bool {
        self.deep_eq(other)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::array(items.into_iter().map(Value::from).collect()),
            Json::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n.into())
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::array(items)
    }
}

impl From<ObjectRef> for Value {
    fn from(object: ObjectRef) -> Self {
        Value::Object(object)
    }
}

impl From<ArrayRef> for Value {
    fn from(array: ArrayRef) -> Self {
        Value::Array(array)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(instant: DateTime<Utc>) -> Self {
        Value::date(instant)
    }
}

/// Shared handle to an ordered object
#[derive(Clone, Default)]
pub struct ObjectRef(Rc<RefCell<Props>>);

impl ObjectRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_props(props: Props) -> Self {
        Self(Rc::new(RefCell::new(props)))
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.0.borrow().get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.borrow().contains_key(key)
    }

    /// Insert or overwrite a property. An existing key keeps its position.
    pub fn insert(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.borrow_mut().insert(key.into(), value)
    }

    /// Remove a property, keeping the order of the others.
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.0.borrow_mut().shift_remove(key)
    }

    pub fn retain(&self, mut keep: impl FnMut(&str, &Value) -> bool) {
        self.0.borrow_mut().retain(|key, value| keep(key, value));
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    /// Swap in a new set of properties, returning the old ones.
    pub fn replace(&self, props: Props) -> Props {
        self.0.replace(props)
    }

    /// Snapshot of the keys, in order.
    pub fn keys(&self) -> Vec<String> {
        self.0.borrow().keys().cloned().collect()
    }

    /// Snapshot of the entries, in order.
    pub fn entries(&self) -> Vec<(String, Value)> {
        self.0
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn borrow(&self) -> Ref<'_, Props> {
        self.0.borrow()
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    fn downgrade(&self) -> WeakKey {
        Rc::downgrade(&self.0)
    }

    fn is_key(&self, key: &WeakKey) -> bool {
        std::ptr::eq(key.as_ptr(), Rc::as_ptr(&self.0))
    }
}

impl<K: Into<String>> FromIterator<(K, Value)> for ObjectRef {
    fn from_iter<I: IntoIterator<Item = (K, Value)>>(iter: I) -> Self {
        Self::from_props(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.borrow().iter()).finish()
    }
}

/// Largest number of `Undefined` holes a single array write may add past
/// the end of the array.
pub const MAX_INDEX_GAP: usize = 1 << 16;

/// Shared handle to an array
#[derive(Clone, Default)]
pub struct ArrayRef(Rc<RefCell<Vec<Value>>>);

impl ArrayRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(items: Vec<Value>) -> Self {
        Self(Rc::new(RefCell::new(items)))
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        self.0.borrow().get(index).cloned()
    }

    /// Write `value` at `index`, padding with `Undefined` as needed.
    ///
    /// Returns `false` and leaves the array untouched when the write would
    /// pad by more than [`MAX_INDEX_GAP`] elements.
    pub fn set(&self, index: usize, value: Value) -> bool {
        let mut items = self.0.borrow_mut();
        if index >= items.len() {
            if index - items.len() > MAX_INDEX_GAP {
                return false;
            }
            items.resize(index + 1, Value::Undefined);
        }
        items[index] = value;
        true
    }

    pub fn push(&self, value: Value) {
        self.0.borrow_mut().push(value);
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    pub fn replace(&self, items: Vec<Value>) -> Vec<Value> {
        self.0.replace(items)
    }

    /// Snapshot of the elements.
    pub fn to_vec(&self) -> Vec<Value> {
        self.0.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn borrow(&self) -> Ref<'_, Vec<Value>> {
        self.0.borrow()
    }

    pub fn ptr_eq(&self, other: &ArrayRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ArrayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.0.borrow().iter()).finish()
    }
}

/// Shared handle to an insertion-ordered set
#[derive(Clone, Default)]
pub struct SetRef(Rc<RefCell<Vec<Value>>>);

impl SetRef {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a member. Returns `false` if it was already present.
    pub fn add(&self, value: Value) -> bool {
        if self.has(&value) {
            return false;
        }
        self.0.borrow_mut().push(value);
        true
    }

    pub fn has(&self, value: &Value) -> bool {
        self.0.borrow().iter().any(|member| member.same_value_zero(value))
    }

    pub fn delete(&self, value: &Value) -> bool {
        let mut members = self.0.borrow_mut();
        let before = members.len();
        members.retain(|member| !member.same_value_zero(value));
        members.len() != before
    }

    pub fn values(&self) -> Vec<Value> {
        self.0.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// A new set with the same members.
    pub fn shallow_copy(&self) -> Self {
        Self(Rc::new(RefCell::new(self.values())))
    }

    pub fn ptr_eq(&self, other: &SetRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl FromIterator<Value> for SetRef {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        let set = SetRef::new();
        for value in iter {
            set.add(value);
        }
        set
    }
}

impl fmt::Debug for SetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.borrow().iter()).finish()
    }
}

/// Shared handle to an insertion-ordered map with arbitrary keys
#[derive(Clone, Default)]
pub struct MapRef(Rc<RefCell<Vec<(Value, Value)>>>);

impl MapRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: Value, value: Value) {
        let mut entries = self.0.borrow_mut();
        match entries.iter_mut().find(|(k, _)| k.same_value_zero(&key)) {
            Some(entry) => entry.1 = value,
            None => entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &Value) -> Option<Value> {
        self.0
            .borrow()
            .iter()
            .find(|(k, _)| k.same_value_zero(key))
            .map(|(_, v)| v.clone())
    }

    pub fn has(&self, key: &Value) -> bool {
        self.0.borrow().iter().any(|(k, _)| k.same_value_zero(key))
    }

    pub fn delete(&self, key: &Value) -> bool {
        let mut entries = self.0.borrow_mut();
        let before = entries.len();
        entries.retain(|(k, _)| !k.same_value_zero(key));
        entries.len() != before
    }

    pub fn entries(&self) -> Vec<(Value, Value)> {
        self.0.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    /// A new map with the same entries.
    pub fn shallow_copy(&self) -> Self {
        Self(Rc::new(RefCell::new(self.entries())))
    }

    pub fn ptr_eq(&self, other: &MapRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl FromIterator<(Value, Value)> for MapRef {
    fn from_iter<I: IntoIterator<Item = (Value, Value)>>(iter: I) -> Self {
        let map = MapRef::new();
        for (key, value) in iter {
            map.set(key, value);
        }
        map
    }
}

impl fmt::Debug for MapRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.0.borrow().iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

/// Shared handle to a set of weakly held objects
#[derive(Clone, Default)]
pub struct WeakSetRef(Rc<RefCell<Vec<WeakKey>>>);

impl WeakSetRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, member: &ObjectRef) {
        if !self.has(member) {
            self.0.borrow_mut().push(member.downgrade());
        }
    }

    pub fn has(&self, member: &ObjectRef) -> bool {
        self.0
            .borrow()
            .iter()
            .any(|key| key.strong_count() > 0 && member.is_key(key))
    }

    pub fn delete(&self, member: &ObjectRef) -> bool {
        let mut keys = self.0.borrow_mut();
        let before = keys.len();
        keys.retain(|key| !member.is_key(key));
        keys.len() != before
    }

    /// Number of members still alive.
    pub fn len(&self) -> usize {
        self.0.borrow().iter().filter(|key| key.strong_count() > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A new weak set holding the live members of this one.
    pub fn shallow_copy(&self) -> Self {
        let live = self
            .0
            .borrow()
            .iter()
            .filter(|key| key.strong_count() > 0)
            .cloned()
            .collect();
        Self(Rc::new(RefCell::new(live)))
    }

    pub fn ptr_eq(&self, other: &WeakSetRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for WeakSetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WeakSet({} live)", self.len())
    }
}

/// Shared handle to a map keyed by weakly held objects
#[derive(Clone, Default)]
pub struct WeakMapRef(Rc<RefCell<Vec<(WeakKey, Value)>>>);

impl WeakMapRef {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, key: &ObjectRef, value: Value) {
        let mut entries = self.0.borrow_mut();
        entries.retain(|(k, _)| k.strong_count() > 0);
        match entries.iter_mut().find(|(k, _)| key.is_key(k)) {
            Some(entry) => entry.1 = value,
            None => entries.push((key.downgrade(), value)),
        }
    }

    pub fn get(&self, key: &ObjectRef) -> Option<Value> {
        self.0
            .borrow()
            .iter()
            .find(|(k, _)| k.strong_count() > 0 && key.is_key(k))
            .map(|(_, v)| v.clone())
    }

    pub fn has(&self, key: &ObjectRef) -> bool {
        self.get(key).is_some()
    }

    pub fn delete(&self, key: &ObjectRef) -> bool {
        let mut entries = self.0.borrow_mut();
        let before = entries.len();
        entries.retain(|(k, _)| !key.is_key(k));
        entries.len() != before
    }

    /// Number of entries whose key is still alive.
    pub fn len(&self) -> usize {
        self.0
            .borrow()
            .iter()
            .filter(|(k, _)| k.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A new weak map holding the live entries of this one.
    pub fn shallow_copy(&self) -> Self {
        let live = self
            .0
            .borrow()
            .iter()
            .filter(|(k, _)| k.strong_count() > 0)
            .cloned()
            .collect();
        Self(Rc::new(RefCell::new(live)))
    }

    pub fn ptr_eq(&self, other: &WeakMapRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for WeakMapRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WeakMap({} live)", self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[derive(Debug)]
    struct Money {
        cents: i64,
    }

    impl CustomValue for Money {
        fn type_name(&self) -> &str {
            "Money"
        }

        fn to_plain(&self) -> Option<Value> {
            Some(Value::Number(self.cents as f64))
        }
    }

    mod type_tag_tests {
        use super::*;

        #[test]
        fn test_type_tag_of_each_variant() {
            assert_eq!(Value::Undefined.type_tag(), TypeTag::Undefined);
            assert_eq!(Value::Null.type_tag(), TypeTag::Null);
            assert_eq!(Value::from(true).type_tag(), TypeTag::Boolean);
            assert_eq!(Value::from(1).type_tag(), TypeTag::Number);
            assert_eq!(Value::from("x").type_tag(), TypeTag::String);
            assert_eq!(Value::new_object().type_tag(), TypeTag::Object);
            assert_eq!(Value::array(vec![]).type_tag(), TypeTag::Array);
            assert_eq!(Value::Set(SetRef::new()).type_tag(), TypeTag::Set);
            assert_eq!(Value::Map(MapRef::new()).type_tag(), TypeTag::Map);
            assert_eq!(Value::WeakSet(WeakSetRef::new()).type_tag(), TypeTag::WeakSet);
            assert_eq!(Value::WeakMap(WeakMapRef::new()).type_tag(), TypeTag::WeakMap);
            assert_eq!(
                Value::custom(Money { cents: 1 }).type_tag(),
                TypeTag::Custom("Money".to_string())
            );
        }

        #[test]
        fn test_type_tag_names_round_trip() {
            for name in ["Undefined", "Object", "Array", "Date", "WeakMap", "Money"] {
                assert_eq!(TypeTag::from_name(name).name(), name);
            }
            assert_eq!(TypeTag::from_name("Money"), TypeTag::Custom("Money".to_string()));
            assert_eq!(TypeTag::Date.to_string(), "Date");
        }
    }

    mod identity_tests {
        use super::*;

        #[test]
        fn test_clone_shares_container() {
            let object = Value::from(json!({"a": 1}));
            let alias = object.clone();
            assert!(object.same(&alias));

            alias.as_object().unwrap().insert("b", Value::from(2));
            assert_eq!(object.as_object().unwrap().len(), 2);
        }

        #[test]
        fn test_equal_containers_are_not_same() {
            let a = Value::from(json!({"a": 1}));
            let b = Value::from(json!({"a": 1}));
            assert!(!a.same(&b));
            assert_eq!(a, b);
        }

        #[test]
        fn test_scalars_are_same_by_value() {
            assert!(Value::from("x").same(&Value::from("x")));
            assert!(Value::from(2).same(&Value::from(2.0)));
            assert!(!Value::Number(f64::NAN).same(&Value::Number(f64::NAN)));
            assert!(Value::Number(f64::NAN).same_value_zero(&Value::Number(f64::NAN)));
            assert!(!Value::Null.same(&Value::Undefined));
        }

        #[test]
        fn test_custom_identity() {
            let money = Value::custom(Money { cents: 5 });
            assert!(money.same(&money.clone()));
            assert!(!money.same(&Value::custom(Money { cents: 5 })));
        }
    }

    mod deep_eq_tests {
        use super::*;

        #[test]
        fn test_object_equality_ignores_key_order() {
            let a = Value::from(json!({"a": 1, "b": {"c": [1, 2]}}));
            let b = Value::from(json!({"b": {"c": [1, 2]}, "a": 1}));
            assert_eq!(a, b);
        }

        #[test]
        fn test_array_equality_respects_order() {
            assert_ne!(Value::from(json!([1, 2])), Value::from(json!([2, 1])));
        }

        #[test]
        fn test_dates_compare_by_instant() {
            let instant = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
            assert_eq!(Value::date(instant), Value::date(instant));
        }

        #[test]
        fn test_sets_compare_by_members() {
            let a: SetRef = vec![Value::from(1), Value::from(2)].into_iter().collect();
            let b: SetRef = vec![Value::from(2), Value::from(1)].into_iter().collect();
            assert_eq!(Value::Set(a), Value::Set(b));
        }

        #[test]
        fn test_custom_values_compare_by_plain_form() {
            assert_eq!(
                Value::custom(Money { cents: 5 }),
                Value::custom(Money { cents: 5 })
            );
            assert_ne!(
                Value::custom(Money { cents: 5 }),
                Value::custom(Money { cents: 6 })
            );
        }

        #[test]
        fn test_nan_is_deep_equal_to_nan() {
            assert_eq!(Value::Number(f64::NAN), Value::Number(f64::NAN));
        }
    }

    mod container_tests {
        use super::*;

        #[test]
        fn test_object_insert_keeps_position() {
            let object: ObjectRef = vec![("a", Value::from(1)), ("b", Value::from(2))]
                .into_iter()
                .collect();
            object.insert("a", Value::from(3));
            assert_eq!(object.keys(), vec!["a", "b"]);
            object.remove("a");
            assert_eq!(object.keys(), vec!["b"]);
        }

        #[test]
        fn test_array_set_pads_with_undefined() {
            let array = ArrayRef::new();
            assert!(array.set(2, Value::from("c")));
            assert_eq!(array.len(), 3);
            assert!(array.get(0).unwrap().is_undefined());
        }

        #[test]
        fn test_array_set_rejects_far_indices() {
            let array = ArrayRef::from_vec(vec![Value::from(1)]);
            assert!(!array.set(usize::MAX, Value::from(2)));
            assert!(!array.set(1 + MAX_INDEX_GAP + 1, Value::from(2)));
            assert_eq!(array.len(), 1);

            assert!(array.set(1 + MAX_INDEX_GAP, Value::from(2)));
            assert_eq!(array.len(), MAX_INDEX_GAP + 2);
        }

        #[test]
        fn test_deep_copy_allocates_every_container() {
            let map: MapRef = vec![(Value::from("k"), Value::from(json!({"v": 1})))].into_iter().collect();
            let original = Value::from(json!({"a": {"b": [1, {"c": 2}]}}));
            original.as_object().unwrap().insert("m", Value::Map(map.clone()));

            let copy = original.deep_copy();
            assert_eq!(copy, original);
            assert!(!copy.same(&original));

            let copied_list = copy.as_object().unwrap().get("a").unwrap().as_object().unwrap().get("b").unwrap();
            let original_list = original.as_object().unwrap().get("a").unwrap().as_object().unwrap().get("b").unwrap();
            assert!(!copied_list.same(&original_list));
            assert!(!copied_list.as_array().unwrap().get(1).unwrap().same(&original_list.as_array().unwrap().get(1).unwrap()));

            let Some(Value::Map(copied_map)) = copy.as_object().unwrap().get("m") else {
                panic!("expected Map")
            };
            assert!(!copied_map.ptr_eq(&map));
            let key = Value::from("k");
            assert!(!copied_map.get(&key).unwrap().same(&map.get(&key).unwrap()));
        }

        #[test]
        fn test_set_rejects_duplicates() {
            let set = SetRef::new();
            assert!(set.add(Value::from(1)));
            assert!(!set.add(Value::from(1)));
            assert!(set.delete(&Value::from(1)));
            assert!(set.is_empty());
        }

        #[test]
        fn test_map_overwrites_existing_key() {
            let map = MapRef::new();
            map.set(Value::from("k"), Value::from(1));
            map.set(Value::from("k"), Value::from(2));
            assert_eq!(map.len(), 1);
            assert_eq!(map.get(&Value::from("k")), Some(Value::from(2)));
        }

        #[test]
        fn test_weak_set_forgets_dropped_members() {
            let set = WeakSetRef::new();
            let kept = ObjectRef::new();
            {
                let dropped = ObjectRef::new();
                set.add(&dropped);
                set.add(&kept);
                assert_eq!(set.len(), 2);
            }
            assert_eq!(set.len(), 1);
            assert!(set.has(&kept));
        }

        #[test]
        fn test_weak_map_lookup_by_identity() {
            let map = WeakMapRef::new();
            let key = ObjectRef::new();
            map.set(&key, Value::from("v"));
            assert_eq!(map.get(&key), Some(Value::from("v")));
            assert!(!map.has(&ObjectRef::new()));
        }
    }

    mod json_tests {
        use super::*;

        #[test]
        fn test_json_round_trip_keeps_integers() {
            let json = json!({"a": 1, "b": [true, null, "x"], "c": {"d": 2.5}});
            assert_eq!(Value::from(json.clone()).to_json(), json);
        }

        #[test]
        fn test_to_json_drops_undefined_properties() {
            let object = ObjectRef::new();
            object.insert("gone", Value::Undefined);
            object.insert("kept", Value::from(1));
            assert_eq!(Value::Object(object).to_json(), json!({"kept": 1}));
        }

        #[test]
        fn test_to_json_of_builtin_containers() {
            let instant = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
            assert_eq!(Value::date(instant).to_json(), json!("2024-05-01T12:00:00.000Z"));

            let set: SetRef = vec![Value::from(1), Value::from(2)].into_iter().collect();
            assert_eq!(Value::Set(set).to_json(), json!([1, 2]));

            let map: MapRef = vec![(Value::from("k"), Value::from(1))].into_iter().collect();
            assert_eq!(Value::Map(map).to_json(), json!([["k", 1]]));
        }

        #[test]
        fn test_to_json_of_custom_uses_plain_form() {
            assert_eq!(Value::custom(Money { cents: 250 }).to_json(), json!(250));
        }
    }
}
