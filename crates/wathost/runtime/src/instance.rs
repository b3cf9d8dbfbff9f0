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

//! Instantiation
//!
//! Binds a module to host functions from an [`ImportRegistry`]. Every import
//! is resolved and signature-checked before the engine allocates anything,
//! so a failed resolution never runs host or guest code.

use std::collections::HashSet;
use std::fmt;

use tracing::{debug, info, warn};
use wasmtime::{Linker, Store, Val};

use crate::error::{RuntimeError, RuntimeResult, TrapKind};
use crate::module::{ExternKind, ImportDeclaration, Module};
use crate::registry::{HostFunction, ImportRegistry};
use crate::values::Value;

/// Pseudo function name used in errors raised by the start routine
pub const START_ROUTINE: &str = "<start>";

/// An import bound to the host function that satisfies it
#[derive(Debug, Clone)]
pub struct ResolvedImport {
    pub declaration: ImportDeclaration,
    pub function: HostFunction,
}

/// Instance lifecycle state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceState {
    /// Start routine (if any) completed; exports may be invoked
    Ready,
    /// A trap left internal state undefined; the instance must be discarded
    Trapped { reason: String },
}

/// Instance metadata
#[derive(Debug, Clone)]
pub struct InstanceMetadata {
    /// Successful invocations
    pub invocation_count: u64,
}

/// Live, stateful realization of a module with every import bound
pub struct Instance {
    pub(crate) module: Module,
    pub(crate) store: Store<()>,
    pub(crate) inner: wasmtime::Instance,
    pub(crate) bindings: Vec<ResolvedImport>,
    pub(crate) state: InstanceState,
    pub(crate) metadata: InstanceMetadata,
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("module", &self.module)
            .field("bindings", &format!("<{} host functions>", self.bindings.len()))
            .field("state", &self.state)
            .field("metadata", &self.metadata)
            .finish()
    }
}

impl Instance {
    pub fn module(&self) -> &Module {
        &self.module
    }

    pub fn state(&self) -> &InstanceState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == InstanceState::Ready
    }

    pub fn bindings(&self) -> &[ResolvedImport] {
        &self.bindings
    }

    pub fn metadata(&self) -> &InstanceMetadata {
        &self.metadata
    }
}

/// Resolve every import of `module` against `registry`, in declared order
pub fn resolve_imports(module: &Module, registry: &ImportRegistry) -> RuntimeResult<Vec<ResolvedImport>> {
    let mut resolved = Vec::with_capacity(module.imports().len());

    for import in module.imports() {
        let Some(function) = registry.lookup(&import.module, &import.name) else {
            warn!("Unresolved import {}.{}", import.module, import.name);
            return Err(RuntimeError::unresolved_import(&import.module, &import.name));
        };

        // Only functions can be supplied by the registry
        let ExternKind::Function(expected) = &import.kind else {
            return Err(RuntimeError::unresolved_import(&import.module, &import.name));
        };

        if expected != function.signature() {
            return Err(RuntimeError::SignatureMismatch {
                module: import.module.clone(),
                name: import.name.clone(),
                expected: expected.clone(),
                provided: function.signature().clone(),
            });
        }

        debug!("Resolved import {}.{} {}", import.module, import.name, expected);
        resolved.push(ResolvedImport {
            declaration: import.clone(),
            function: function.clone(),
        });
    }

    Ok(resolved)
}

/// Instantiate `module`, binding its imports from `registry` and running its
/// start routine. No instance is returned if anything fails.
///
/// For a module with a start section, every guest or host fault raised while
/// the engine sets up the instance is reported as `StartRoutineTrap`. This
/// includes segment initialization faults raised before the start routine
/// itself runs.
pub fn instantiate(module: &Module, registry: &ImportRegistry) -> RuntimeResult<Instance> {
    let bindings = resolve_imports(module, registry)?;
    let engine = module.engine().inner();

    let mut linker: Linker<()> = Linker::new(engine);
    let mut defined = HashSet::new();
    for binding in &bindings {
        let decl = &binding.declaration;
        // A module may import the same pair more than once
        if !defined.insert((decl.module.as_str(), decl.name.as_str())) {
            continue;
        }

        let function = binding.function.clone();
        let qualified = format!("{}.{}", decl.module, decl.name);
        let ty = function.signature().to_func_type(engine);
        linker
            .func_new(&decl.module, &decl.name, ty, move |_caller, params, results| {
                let args = params
                    .iter()
                    .map(Value::try_from)
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|e| anyhow::anyhow!("{qualified}: {e}"))?;
                let values = function.call(&qualified, &args)?;
                for (slot, value) in results.iter_mut().zip(values) {
                    *slot = Val::from(value);
                }
                Ok(())
            })
            .map_err(|e| RuntimeError::instantiation(format!("cannot bind {}.{}: {e:#}", decl.module, decl.name)))?;
    }

    let mut store = Store::new(engine, ());
    if module.start().is_some() {
        debug!("Running start routine");
    }
    let inner = linker.instantiate(&mut store, module.compiled()).map_err(|err| {
        if module.start().is_some() && TrapKind::is_guest_fault(&err) {
            warn!("Start routine trapped: {:#}", err);
            RuntimeError::start_routine_trap(RuntimeError::trap(START_ROUTINE, &err))
        } else {
            RuntimeError::instantiation(format!("{err:#}"))
        }
    })?;

    info!("Instantiated module {} with {} bound imports", module.name().unwrap_or("<anonymous>"), bindings.len());

    Ok(Instance {
        module: module.clone(),
        store,
        inner,
        bindings,
        state: InstanceState::Ready,
        metadata: InstanceMetadata {
            invocation_count: 0,
        },
    })
}
