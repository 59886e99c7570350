//! # Merge Engine
//!
//! The [`Engine`] owns the handler table, the operation table and the
//! [`EngineConfig`] that decides which object keys are operations. It is the
//! dispatcher: every pairwise merge looks up a handler by the types of both
//! operands and hands control to it, and handlers recurse back through
//! [`Engine::merge_pair`].
//!
//! ## Entry Points
//!
//! - [`Engine::merge`] - deep clone, inputs untouched
//! - [`Engine::patch`] - mutate the first input in place and return it
//! - [`Engine::update`] - copy-on-write, returning the first input when nothing changed
//!
//! Each folds left over any number of inputs. With no inputs the result is
//! `Undefined`; a single input is returned as is.
//!
//! ## Default Engine
//!
//! Each thread has a default engine, used by the crate-level free functions
//! ([`merge`], [`patch`], [`update`], [`register_merge_handler`],
//! [`register_operation`]). Registering on it while a merge on the same
//! thread is using it fails with [`Error::InvalidRegistration`].

use std::cell::RefCell;
use std::collections::HashMap;

use log::{debug, trace};

use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::merge::{self, candidate_keys, HandlerKey, MergeHandler, MergeKind, TypeKey};
use crate::operations::{self, Operation};
use crate::value::{TypeTag, Value};

/// Handler table, operation table and configuration
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    handlers: HashMap<HandlerKey, MergeHandler>,
    operations: HashMap<String, Operation>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    /// An engine with the default configuration and every built-in handler
    /// and operation.
    pub fn new() -> Self {
        let mut engine = Self::bare(EngineConfig::default());
        engine.install_builtins();
        engine
    }

    /// An engine with built-ins and a caller-supplied configuration.
    pub fn with_config(config: EngineConfig) -> Result<Self> {
        let mut engine = Self::empty(config)?;
        engine.install_builtins();
        Ok(engine)
    }

    /// An engine with no handlers and no operations.
    pub fn empty(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::bare(config))
    }

    fn bare(config: EngineConfig) -> Self {
        Self {
            config,
            handlers: HashMap::new(),
            operations: HashMap::new(),
        }
    }

    fn install_builtins(&mut self) {
        self.handlers.extend(merge::builtins());
        self.operations.extend(
            operations::builtins()
                .into_iter()
                .map(|(name, operation)| (name.to_string(), operation)),
        );
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn merge<I>(&self, values: I) -> Result<Value>
    where
        I: IntoIterator<Item = Value>,
    {
        self.fold(MergeKind::Merge, values)
    }

    pub fn patch<I>(&self, values: I) -> Result<Value>
    where
        I: IntoIterator<Item = Value>,
    {
        self.fold(MergeKind::Patch, values)
    }

    pub fn update<I>(&self, values: I) -> Result<Value>
    where
        I: IntoIterator<Item = Value>,
    {
        self.fold(MergeKind::Update, values)
    }

    /// Left fold of `values` with pairwise merges of the given kind.
    pub fn fold<I>(&self, kind: MergeKind, values: I) -> Result<Value>
    where
        I: IntoIterator<Item = Value>,
    {
        let mut values = values.into_iter();
        let Some(mut merged) = values.next() else {
            return Ok(Value::Undefined);
        };
        for value in values {
            merged = self.merge_pair(&merged, &value, kind)?;
        }
        Ok(merged)
    }

    /// Merge one pair through the handler registered for their types.
    pub fn merge_pair(&self, first: &Value, second: &Value, kind: MergeKind) -> Result<Value> {
        let first_tag = first.type_tag();
        let second_tag = second.type_tag();

        let Some(((first_key, second_key), handler)) = self.handler_for(&first_tag, &second_tag) else {
            return Err(Error::UnsupportedMergeType {
                first: first_tag.to_string(),
                second: second_tag.to_string(),
            });
        };

        trace!(
            "{} {} + {} using handler {} + {}",
            kind,
            first_tag,
            second_tag,
            first_key,
            second_key
        );
        handler.call(self, first, second, kind)
    }

    /// The highest-priority handler registered for a type pair, with the key
    /// it is registered under.
    pub fn handler_for(&self, first: &TypeTag, second: &TypeTag) -> Option<(&HandlerKey, &MergeHandler)> {
        candidate_keys(first, second)
            .iter()
            .find_map(|key| self.handlers.get_key_value(key))
    }

    /// Resolve an object key to its operation and path separator. Keys that
    /// lack a configured sigil or name no registered operation resolve to
    /// `None` and are merged as plain data.
    pub fn resolve_operation(&self, key: &str) -> Option<(Operation, &str)> {
        let (name, separator) = self.config.split_operation_key(key)?;
        self.operations
            .get(name)
            .map(|operation| (operation.clone(), separator))
    }

    /// Whether `key` would run as an operation.
    pub fn is_operation_key(&self, key: &str) -> bool {
        self.resolve_operation(key).is_some()
    }

    /// Run one operation by its sigil-qualified key, e.g. `$set` or `ꓺset`.
    pub fn execute_operation(&self, key: &str, source: &Value, params: &Value) -> Result<bool> {
        let Some((operation, separator)) = self.resolve_operation(key) else {
            return Err(Error::InvalidRegistration {
                message: format!("no operation registered for key '{}'", key),
            });
        };
        debug!("running operation {}", key);
        operation.call(source, params, separator)
    }

    /// Bind a handler to a type pair, returning the previous binding.
    ///
    /// Type names are canonical names (`Object`, `Array`, ...), custom type
    /// names, or `Any`.
    pub fn register_merge_handler(
        &mut self,
        first: &str,
        second: &str,
        handler: MergeHandler,
    ) -> Result<Option<MergeHandler>> {
        let key = (TypeKey::parse(first)?, TypeKey::parse(second)?);
        let label = format!("{} + {}", key.0, key.1);
        let previous = self.handlers.insert(key, handler);
        if previous.is_some() {
            debug!("replaced merge handler for {}", label);
        }
        Ok(previous)
    }

    /// Unbind the handler of a type pair, returning it.
    pub fn remove_merge_handler(&mut self, first: &str, second: &str) -> Result<Option<MergeHandler>> {
        let key = (TypeKey::parse(first)?, TypeKey::parse(second)?);
        Ok(self.handlers.remove(&key))
    }

    /// Bind an operation, returning the previous binding. The name may carry
    /// a sigil (`$set`) or not (`set`).
    pub fn register_operation(&mut self, name: &str, operation: Operation) -> Result<Option<Operation>> {
        let name = self.operation_name(name)?;
        let previous = self.operations.insert(name.clone(), operation);
        if previous.is_some() {
            debug!("replaced operation {}", name);
        }
        Ok(previous)
    }

    /// Unbind an operation, returning it.
    pub fn remove_operation(&mut self, name: &str) -> Result<Option<Operation>> {
        let name = self.operation_name(name)?;
        Ok(self.operations.remove(&name))
    }

    /// The operation bound to a name, with or without sigil.
    pub fn operation(&self, name: &str) -> Option<Operation> {
        self.operations
            .get(self.config.bare_operation_name(name.trim()))
            .cloned()
    }

    fn operation_name(&self, name: &str) -> Result<String> {
        let bare = self.config.bare_operation_name(name.trim());
        if bare.is_empty() {
            return Err(Error::InvalidRegistration {
                message: "operation name must not be empty".to_string(),
            });
        }
        Ok(bare.to_string())
    }
}

thread_local! {
    static DEFAULT_ENGINE: RefCell<Engine> = RefCell::new(Engine::new());
}

fn engine_busy() -> Error {
    Error::InvalidRegistration {
        message: "engine busy: the default engine is in use on this thread".to_string(),
    }
}

/// Run `f` against this thread's default engine.
pub fn with_default_engine<R>(f: impl FnOnce(&Engine) -> Result<R>) -> Result<R> {
    DEFAULT_ENGINE.with(|cell| {
        let engine = cell.try_borrow().map_err(|_| engine_busy())?;
        f(&engine)
    })
}

/// Run `f` against this thread's default engine with write access.
pub fn with_default_engine_mut<R>(f: impl FnOnce(&mut Engine) -> Result<R>) -> Result<R> {
    DEFAULT_ENGINE.with(|cell| {
        let mut engine = cell.try_borrow_mut().map_err(|_| engine_busy())?;
        f(&mut engine)
    })
}

/// [`Engine::merge`] on the default engine.
pub fn merge<I>(values: I) -> Result<Value>
where
    I: IntoIterator<Item = Value>,
{
    with_default_engine(|engine| engine.merge(values))
}

/// [`Engine::patch`] on the default engine.
pub fn patch<I>(values: I) -> Result<Value>
where
    I: IntoIterator<Item = Value>,
{
    with_default_engine(|engine| engine.patch(values))
}

/// [`Engine::update`] on the default engine.
pub fn update<I>(values: I) -> Result<Value>
where
    I: IntoIterator<Item = Value>,
{
    with_default_engine(|engine| engine.update(values))
}

/// [`Engine::register_merge_handler`] on the default engine.
pub fn register_merge_handler(first: &str, second: &str, handler: MergeHandler) -> Result<Option<MergeHandler>> {
    with_default_engine_mut(|engine| engine.register_merge_handler(first, second, handler))
}

/// [`Engine::register_operation`] on the default engine.
pub fn register_operation(name: &str, operation: Operation) -> Result<Option<Operation>> {
    with_default_engine_mut(|engine| engine.register_operation(name, operation))
}
