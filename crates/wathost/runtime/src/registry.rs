// Dotlanth
// Copyright (C) 2025 Synerthink

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! Import registry
//!
//! Host functions keyed by `(namespace, name)`. Signatures are fixed at
//! registration and checked against module imports at bind time.
//!
//! Registering the same pair twice with an identical signature replaces the
//! earlier entry (last write wins). Registering it with a different
//! signature is rejected and the earlier entry is kept.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use crate::error::{RuntimeError, RuntimeResult};
use crate::values::{FuncSignature, Value, describe_values};

/// Errors raised by host functions. Surfaced to guest callers as traps.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("{0}")]
    Failed(String),
    #[error("{function} called with {actual}, expected {expected}")]
    InvalidArguments { function: String, expected: String, actual: String },
    #[error("{function} returned {actual}, declared {expected}")]
    InvalidResults { function: String, expected: String, actual: String },
}

impl HostError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

type Callable = dyn Fn(&[Value]) -> Result<Vec<Value>, HostError> + Send + Sync;

/// A host-provided callable with a fixed signature
#[derive(Clone)]
pub struct HostFunction {
    signature: FuncSignature,
    callable: Arc<Callable>,
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostFunction").field("signature", &self.signature).field("callable", &"<host fn>").finish()
    }
}

impl HostFunction {
    pub fn new<F>(signature: FuncSignature, callable: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Vec<Value>, HostError> + Send + Sync + 'static,
    {
        Self {
            signature,
            callable: Arc::new(callable),
        }
    }

    pub fn signature(&self) -> &FuncSignature {
        &self.signature
    }

    /// Call the function, checking arguments and results against the signature
    pub fn call(&self, name: &str, args: &[Value]) -> Result<Vec<Value>, HostError> {
        if !self.signature.accepts(args) {
            return Err(HostError::InvalidArguments {
                function: name.to_string(),
                expected: self.signature.to_string(),
                actual: describe_values(args),
            });
        }

        let results = (self.callable)(args)?;

        if !FuncSignature::matches(&self.signature.results, &results) {
            return Err(HostError::InvalidResults {
                function: name.to_string(),
                expected: self.signature.to_string(),
                actual: describe_values(&results),
            });
        }
        Ok(results)
    }

    /// Whether two handles share one callable
    pub fn ptr_eq(&self, other: &HostFunction) -> bool {
        Arc::ptr_eq(&self.callable, &other.callable)
    }
}

/// Mapping from `(namespace, name)` to host function
#[derive(Debug, Clone, Default)]
pub struct ImportRegistry {
    namespaces: HashMap<String, HashMap<String, HostFunction>>,
}

impl ImportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callable under `namespace.name`
    pub fn register<F>(&mut self, namespace: impl Into<String>, name: impl Into<String>, signature: FuncSignature, callable: F) -> RuntimeResult<()>
    where
        F: Fn(&[Value]) -> Result<Vec<Value>, HostError> + Send + Sync + 'static,
    {
        self.register_function(namespace, name, HostFunction::new(signature, callable))
    }

    /// Register an existing host function, possibly shared with other registries
    pub fn register_function(&mut self, namespace: impl Into<String>, name: impl Into<String>, function: HostFunction) -> RuntimeResult<()> {
        let namespace = namespace.into();
        let name = name.into();

        let entries = self.namespaces.entry(namespace.clone()).or_default();
        if let Some(existing) = entries.get(&name) {
            if existing.signature() != function.signature() {
                warn!("Rejected conflicting registration of {}.{}", namespace, name);
                return Err(RuntimeError::DuplicateImport {
                    module: namespace,
                    name,
                    existing: existing.signature().clone(),
                    requested: function.signature().clone(),
                });
            }
            debug!("Replacing host function {}.{}", namespace, name);
        } else {
            debug!("Registered host function {}.{} {}", namespace, name, function.signature());
        }

        entries.insert(name, function);
        Ok(())
    }

    pub fn lookup(&self, namespace: &str, name: &str) -> Option<&HostFunction> {
        self.namespaces.get(namespace).and_then(|entries| entries.get(name))
    }

    pub fn contains(&self, namespace: &str, name: &str) -> bool {
        self.lookup(namespace, name).is_some()
    }

    /// Total number of registered functions
    pub fn len(&self) -> usize {
        self.namespaces.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over `(namespace, name, function)` entries in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &HostFunction)> {
        self.namespaces
            .iter()
            .flat_map(|(ns, entries)| entries.iter().map(move |(name, f)| (ns.as_str(), name.as_str(), f)))
    }
}
