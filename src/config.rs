//! # Engine Configuration
//!
//! An [`EngineConfig`] tells the engine which key prefixes mark a declarative
//! operation and which path separator each prefix implies. The canonical
//! sigil is `$` (paths split on `.`); the alternate sigil `ꓺ` runs the same
//! operations with paths split on `ꓺ`, which lets keys that contain dots be
//! addressed.
//!
//! Configuration is parsed from a YAML string supplied by the caller:
//!
//! ```
//! use opmerge::config;
//!
//! let config = config::parse(
//!     r#"
//! sigils:
//!   - sigil: "$"
//!     separator: "."
//!   - sigil: "@"
//!     separator: "/"
//! "#,
//! )
//! .unwrap();
//! assert_eq!(config.sigils.len(), 2);
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Canonical operation sigil.
pub const DEFAULT_SIGIL: &str = "$";
/// Path separator used with the canonical sigil.
pub const DEFAULT_SEPARATOR: &str = ".";
/// Alternate sigil, which is also its own path separator.
pub const ALTERNATE_SIGIL: &str = "ꓺ";

/// A key prefix marking an operation, and the path separator it implies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationSigil {
    /// Prefix in front of the operation name, e.g. `$` in `$set`.
    pub sigil: String,
    /// Separator used to split the operation's paths.
    pub separator: String,
}

impl OperationSigil {
    pub fn new(sigil: impl Into<String>, separator: impl Into<String>) -> Self {
        Self {
            sigil: sigil.into(),
            separator: separator.into(),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Recognized sigils, checked in order.
    #[serde(default = "default_sigils")]
    pub sigils: Vec<OperationSigil>,
}

fn default_sigils() -> Vec<OperationSigil> {
    vec![
        OperationSigil::new(DEFAULT_SIGIL, DEFAULT_SEPARATOR),
        OperationSigil::new(ALTERNATE_SIGIL, ALTERNATE_SIGIL),
    ]
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sigils: default_sigils(),
        }
    }
}

impl EngineConfig {
    /// Check that the configuration can be used by an engine.
    pub fn validate(&self) -> Result<()> {
        if self.sigils.is_empty() {
            return Err(Error::ConfigParse {
                message: "no operation sigils configured".to_string(),
                hint: Some("Add at least one entry, e.g. { sigil: \"$\", separator: \".\" }".to_string()),
            });
        }

        let mut seen = HashSet::new();
        for entry in &self.sigils {
            if entry.sigil.is_empty() {
                return Err(Error::ConfigParse {
                    message: "operation sigil must not be empty".to_string(),
                    hint: None,
                });
            }
            if entry.separator.is_empty() {
                return Err(Error::ConfigParse {
                    message: format!("separator for sigil '{}' must not be empty", entry.sigil),
                    hint: None,
                });
            }
            if !seen.insert(entry.sigil.as_str()) {
                return Err(Error::ConfigParse {
                    message: format!("duplicate sigil '{}'", entry.sigil),
                    hint: Some("Each sigil may appear only once".to_string()),
                });
            }
        }

        Ok(())
    }

    /// Split an object key into its operation name and path separator, if
    /// the key starts with a configured sigil.
    pub fn split_operation_key<'k>(&self, key: &'k str) -> Option<(&'k str, &str)> {
        self.sigils.iter().find_map(|entry| {
            key.strip_prefix(entry.sigil.as_str())
                .filter(|name| !name.is_empty())
                .map(|name| (name, entry.separator.as_str()))
        })
    }

    /// Strip a leading sigil from an operation name, if present.
    pub fn bare_operation_name<'a>(&self, name: &'a str) -> &'a str {
        self.sigils
            .iter()
            .find_map(|entry| name.strip_prefix(entry.sigil.as_str()))
            .unwrap_or(name)
    }
}

/// Parses a YAML string into a validated `EngineConfig`.
pub fn parse(yaml_content: &str) -> Result<EngineConfig> {
    let config: EngineConfig = serde_yaml::from_str(yaml_content).map_err(Error::Yaml)?;
    config.validate()?;
    Ok(config)
}
