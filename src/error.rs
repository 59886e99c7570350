//! # Error Handling
//!
//! This module defines the centralized error type for `opmerge`. It uses the
//! `thiserror` library to create an `Error` enum that covers every way a merge,
//! an operation, a registration, or a configuration parse can fail.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum. Each variant carries enough context (type
//!   names, operation keys, paths) to tell which part of a nested merge input
//!   was rejected.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! Every error is fatal to the call that raised it. A failing operation aborts
//! the whole top-level merge; operations that already ran are not rolled back
//! and the partially mutated result is dropped, not returned.

use thiserror::Error;

/// Main error type for opmerge operations
#[derive(Error, Debug)]
pub enum Error {
    /// No merge handler is registered for a pair of types, not even a
    /// wildcard one.
    #[error("Unsupported merge type pair: {first} + {second}")]
    UnsupportedMergeType { first: String, second: String },

    /// An operation was run against something that is not an object and
    /// cannot be converted into one.
    #[error("Invalid operation source for {operation}: expected Object, found {found}")]
    InvalidOperationSource { operation: String, found: String },

    /// The parameters given to an operation have the wrong shape.
    #[error("Invalid parameters for {operation}: {message}")]
    InvalidOperationParams { operation: String, message: String },

    /// `$push`, `$pull` or `$concat` targeted a path that does not hold an array.
    #[error("Invalid target for {operation} at '{path}': expected Array, found {found}")]
    InvalidTargetForArrayOp {
        operation: String,
        path: String,
        found: String,
    },

    /// A merge handler or operation registration was rejected.
    #[error("Invalid registration: {message}")]
    InvalidRegistration { message: String },

    /// An engine configuration could not be parsed or failed validation.
    #[error("Configuration parsing error: {message}{}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigParse {
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
