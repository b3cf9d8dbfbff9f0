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

//! Invocation of instance exports

use tracing::{debug, warn};
use wasmtime::Val;

use crate::error::{RuntimeError, RuntimeResult};
use crate::instance::{Instance, InstanceState};
use crate::module::ExternKind;
use crate::values::{FuncSignature, Value, describe_values};

/// Process status produced by a main-style entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus(pub i32);

impl ExitStatus {
    pub const SUCCESS: ExitStatus = ExitStatus(0);

    /// Interpret the results of `export` as a process status. No result
    /// means success; a single integer is the status itself.
    pub fn from_results(export: &str, results: &[Value]) -> RuntimeResult<Self> {
        match results {
            [] => Ok(Self::SUCCESS),
            [Value::I32(code)] => Ok(Self(*code)),
            [Value::I64(code)] => i32::try_from(*code)
                .map(Self)
                .map_err(|_| RuntimeError::arity_or_type_mismatch(export, "an exit status within i32 range", code.to_string())),
            other => Err(RuntimeError::arity_or_type_mismatch(export, "a single integer result", describe_values(other))),
        }
    }

    pub fn code(self) -> i32 {
        self.0
    }

    pub fn success(self) -> bool {
        self.0 == 0
    }
}

impl Instance {
    /// Signature of the exported function `name`
    pub fn export_signature(&self, name: &str) -> RuntimeResult<&FuncSignature> {
        let export = self.module.export(name).ok_or_else(|| RuntimeError::export_not_found(name))?;
        match &export.kind {
            ExternKind::Function(sig) => Ok(sig),
            other => Err(RuntimeError::ExportKindMismatch {
                name: name.to_string(),
                expected: "function",
                actual: other.kind_name(),
            }),
        }
    }

    /// Call the exported function `name` with `args`. A trap leaves the
    /// instance unusable.
    pub fn invoke(&mut self, name: &str, args: &[Value]) -> RuntimeResult<Vec<Value>> {
        let signature = self.export_signature(name)?.clone();
        if let InstanceState::Trapped { reason } = &self.state {
            return Err(RuntimeError::InstanceTrapped { reason: reason.clone() });
        }
        if !signature.accepts(args) {
            return Err(RuntimeError::arity_or_type_mismatch(name, signature.to_string(), describe_values(args)));
        }

        let func = self.inner.get_func(&mut self.store, name).ok_or_else(|| RuntimeError::export_not_found(name))?;
        let params: Vec<Val> = args.iter().copied().map(Val::from).collect();
        let mut results = vec![Val::I32(0); signature.results.len()];

        debug!("Invoking {} with {}", name, describe_values(args));
        if let Err(err) = func.call(&mut self.store, &params, &mut results) {
            let trap = RuntimeError::trap(name, &err);
            warn!("{}", trap);
            self.state = InstanceState::Trapped { reason: trap.to_string() };
            return Err(trap);
        }
        self.metadata.invocation_count += 1;

        results
            .iter()
            .map(Value::try_from)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| RuntimeError::arity_or_type_mismatch(name, signature.to_string(), e.to_string()))
    }

    /// Call a main-style entry point and convert its result to an exit status
    pub fn invoke_main(&mut self, name: &str) -> RuntimeResult<ExitStatus> {
        let results = self.invoke(name, &[])?;
        ExitStatus::from_results(name, &results)
    }

    /// Current value of the exported global `name`
    pub fn global(&mut self, name: &str) -> RuntimeResult<Value> {
        let export = self.module.export(name).ok_or_else(|| RuntimeError::export_not_found(name))?;
        if !matches!(export.kind, ExternKind::Global(_)) {
            return Err(RuntimeError::ExportKindMismatch {
                name: name.to_string(),
                expected: "global",
                actual: export.kind.kind_name(),
            });
        }
        let global = self.inner.get_global(&mut self.store, name).ok_or_else(|| RuntimeError::export_not_found(name))?;
        let value = global.get(&mut self.store);
        Value::try_from(&value).map_err(|e| RuntimeError::arity_or_type_mismatch(name, "a numeric global", e.to_string()))
    }

    /// Copy `length` bytes at `offset` out of the exported memory `name`
    pub fn read_memory(&mut self, name: &str, offset: usize, length: usize) -> RuntimeResult<Vec<u8>> {
        let export = self.module.export(name).ok_or_else(|| RuntimeError::export_not_found(name))?;
        if !matches!(export.kind, ExternKind::Memory(_)) {
            return Err(RuntimeError::ExportKindMismatch {
                name: name.to_string(),
                expected: "memory",
                actual: export.kind.kind_name(),
            });
        }
        let memory = self.inner.get_memory(&mut self.store, name).ok_or_else(|| RuntimeError::export_not_found(name))?;
        let data = memory.data(&self.store);
        offset
            .checked_add(length)
            .and_then(|end| data.get(offset..end))
            .map(<[u8]>::to_vec)
            .ok_or_else(|| RuntimeError::MemoryAccess {
                name: name.to_string(),
                offset,
                length,
                size: data.len(),
            })
    }
}
