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

//! Runtime Error Types

use std::fmt;

use thiserror::Error;

use crate::registry::HostError;
use crate::values::FuncSignature;

/// Result type for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Classification of a runtime fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapKind {
    IntegerDivisionByZero,
    IntegerOverflow,
    InvalidConversionToInteger,
    MemoryOutOfBounds,
    TableOutOfBounds,
    IndirectCallToNull,
    BadSignature,
    StackOverflow,
    Unreachable,
    HostFunction,
    Other,
}

impl TrapKind {
    /// Classify an error raised by the engine while running guest code
    pub fn classify(err: &anyhow::Error) -> Self {
        if err.downcast_ref::<HostError>().is_some() {
            return Self::HostFunction;
        }
        match err.downcast_ref::<wasmtime::Trap>() {
            Some(wasmtime::Trap::IntegerDivisionByZero) => Self::IntegerDivisionByZero,
            Some(wasmtime::Trap::IntegerOverflow) => Self::IntegerOverflow,
            Some(wasmtime::Trap::BadConversionToInteger) => Self::InvalidConversionToInteger,
            Some(wasmtime::Trap::MemoryOutOfBounds | wasmtime::Trap::HeapMisaligned) => Self::MemoryOutOfBounds,
            Some(wasmtime::Trap::TableOutOfBounds) => Self::TableOutOfBounds,
            Some(wasmtime::Trap::IndirectCallToNull) => Self::IndirectCallToNull,
            Some(wasmtime::Trap::BadSignature) => Self::BadSignature,
            Some(wasmtime::Trap::StackOverflow) => Self::StackOverflow,
            Some(wasmtime::Trap::UnreachableCodeReached) => Self::Unreachable,
            _ => Self::Other,
        }
    }

    /// Whether the engine error is a fault raised by guest or host code,
    /// as opposed to an engine-side failure.
    pub fn is_guest_fault(err: &anyhow::Error) -> bool {
        err.downcast_ref::<HostError>().is_some() || err.downcast_ref::<wasmtime::Trap>().is_some()
    }
}

impl fmt::Display for TrapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::IntegerDivisionByZero => "integer divide by zero",
            Self::IntegerOverflow => "integer overflow",
            Self::InvalidConversionToInteger => "invalid conversion to integer",
            Self::MemoryOutOfBounds => "out of bounds memory access",
            Self::TableOutOfBounds => "undefined table element",
            Self::IndirectCallToNull => "uninitialized element",
            Self::BadSignature => "indirect call type mismatch",
            Self::StackOverflow => "call stack exhausted",
            Self::Unreachable => "unreachable executed",
            Self::HostFunction => "host function failed",
            Self::Other => "runtime fault",
        };
        f.write_str(text)
    }
}

/// Runtime Error Types
#[derive(Error, Debug, Clone)]
pub enum RuntimeError {
    #[error("Engine configuration rejected: {message}")]
    Configuration { message: String },

    #[error("Cannot read module source {path}: {message}")]
    SourceUnavailable { path: String, message: String },

    #[error("Parse error{}: {message}", position_suffix(*line, *column))]
    Parse { message: String, line: Option<usize>, column: Option<usize> },

    #[error("Module validation failed{}: {message}", offset.map(|o| format!(" at offset {o:#x}")).unwrap_or_default())]
    Validation { message: String, offset: Option<usize> },

    #[error("Duplicate import {module}.{name}: registered as {existing}, cannot re-register as {requested}")]
    DuplicateImport { module: String, name: String, existing: FuncSignature, requested: FuncSignature },

    #[error("Unresolved import: module {module}, name {name}")]
    UnresolvedImport { module: String, name: String },

    #[error("Signature mismatch for import {module}.{name}: module expects {expected}, registry provides {provided}")]
    SignatureMismatch { module: String, name: String, expected: FuncSignature, provided: FuncSignature },

    #[error("Start routine trapped: {source}")]
    StartRoutineTrap {
        #[source]
        source: Box<RuntimeError>,
    },

    #[error("Instance creation failed: {message}")]
    Instantiation { message: String },

    #[error("Export not found: {name}")]
    ExportNotFound { name: String },

    #[error("Export {name} is a {actual}, expected a {expected}")]
    ExportKindMismatch { name: String, expected: &'static str, actual: &'static str },

    #[error("Arguments for {name} do not match: expected {expected}, got {actual}")]
    ArityOrTypeMismatch { name: String, expected: String, actual: String },

    #[error("Trap in {function}: {kind}: {message}")]
    Trap { function: String, kind: TrapKind, message: String },

    #[error("Instance is unusable after an earlier trap: {reason}")]
    InstanceTrapped { reason: String },

    #[error("Memory access out of range on {name}: offset {offset}, length {length}, memory size {size}")]
    MemoryAccess { name: String, offset: usize, length: usize, size: usize },
}

fn position_suffix(line: Option<usize>, column: Option<usize>) -> String {
    match (line, column) {
        (Some(line), Some(column)) => format!(" at {line}:{column}"),
        (Some(line), None) => format!(" at line {line}"),
        _ => String::new(),
    }
}

impl RuntimeError {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Create a source unavailable error
    pub fn source_unavailable(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a parse error without position information
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            line: None,
            column: None,
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>, offset: Option<usize>) -> Self {
        Self::Validation { message: message.into(), offset }
    }

    /// Create an unresolved import error
    pub fn unresolved_import(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self::UnresolvedImport {
            module: module.into(),
            name: name.into(),
        }
    }

    /// Create an instantiation error
    pub fn instantiation(message: impl Into<String>) -> Self {
        Self::Instantiation { message: message.into() }
    }

    /// Create an export not found error
    pub fn export_not_found(name: impl Into<String>) -> Self {
        Self::ExportNotFound { name: name.into() }
    }

    /// Create an arity or type mismatch error
    pub fn arity_or_type_mismatch(name: impl Into<String>, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::ArityOrTypeMismatch {
            name: name.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Create a trap error from an engine failure raised while running `function`
    pub fn trap(function: impl Into<String>, err: &anyhow::Error) -> Self {
        Self::Trap {
            function: function.into(),
            kind: TrapKind::classify(err),
            message: trap_message(err),
        }
    }

    /// Wrap a failure raised while the start routine ran
    pub fn start_routine_trap(cause: RuntimeError) -> Self {
        Self::StartRoutineTrap { source: Box::new(cause) }
    }

    /// Check if this error is a runtime fault in guest or host code
    pub fn is_trap(&self) -> bool {
        matches!(self, Self::Trap { .. } | Self::StartRoutineTrap { .. })
    }

    /// The trap kind, for traps and start routine traps
    pub fn trap_kind(&self) -> Option<TrapKind> {
        match self {
            Self::Trap { kind, .. } => Some(*kind),
            Self::StartRoutineTrap { source } => source.trap_kind(),
            _ => None,
        }
    }

    /// Get error category for diagnostics
    pub fn category(&self) -> &'static str {
        match self {
            Self::Configuration { .. } => "configuration",
            Self::SourceUnavailable { .. } => "missing_file",
            Self::Parse { .. } => "parse",
            Self::Validation { .. } => "validation",
            Self::DuplicateImport { .. } => "duplicate_import",
            Self::UnresolvedImport { .. } => "unresolved_import",
            Self::SignatureMismatch { .. } => "signature_mismatch",
            Self::StartRoutineTrap { .. } => "start_trap",
            Self::Instantiation { .. } => "instantiation",
            Self::ExportNotFound { .. } => "export_not_found",
            Self::ExportKindMismatch { .. } => "export_kind",
            Self::ArityOrTypeMismatch { .. } => "argument_mismatch",
            Self::Trap { .. } => "trap",
            Self::InstanceTrapped { .. } => "instance_trapped",
            Self::MemoryAccess { .. } => "memory_access",
        }
    }

    /// Process exit status used by the command line host. Every kind maps
    /// to its own non-zero code.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Configuration { .. } => 64,
            Self::SourceUnavailable { .. } => 65,
            Self::Parse { .. } => 66,
            Self::Validation { .. } => 67,
            Self::DuplicateImport { .. } => 68,
            Self::UnresolvedImport { .. } => 69,
            Self::SignatureMismatch { .. } => 70,
            Self::StartRoutineTrap { .. } => 71,
            Self::Instantiation { .. } => 72,
            Self::ExportNotFound { .. } => 73,
            Self::ExportKindMismatch { .. } => 74,
            Self::ArityOrTypeMismatch { .. } => 75,
            Self::Trap { .. } => 76,
            Self::InstanceTrapped { .. } => 77,
            Self::MemoryAccess { .. } => 78,
        }
    }
}

/// Human readable description of an engine failure. Host errors are shown
/// as raised; traps use the engine's wording.
fn trap_message(err: &anyhow::Error) -> String {
    if let Some(host) = err.downcast_ref::<HostError>() {
        return host.to_string();
    }
    if let Some(trap) = err.downcast_ref::<wasmtime::Trap>() {
        return trap.to_string();
    }
    format!("{err:#}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::values::ValueType;

    #[test]
    fn test_error_creation() {
        let err = RuntimeError::validation("unknown function 3", Some(0x2a));
        assert!(matches!(err, RuntimeError::Validation { .. }));
        assert_eq!(err.category(), "validation");
        assert_eq!(err.to_string(), "Module validation failed at offset 0x2a: unknown function 3");
        assert!(!err.is_trap());
    }

    #[test]
    fn test_parse_error_display() {
        let err = RuntimeError::Parse {
            message: "expected `)`".to_string(),
            line: Some(3),
            column: Some(7),
        };
        assert_eq!(err.to_string(), "Parse error at 3:7: expected `)`");
        assert_eq!(RuntimeError::parse("bad").to_string(), "Parse error: bad");
    }

    #[test]
    fn test_signature_mismatch_display() {
        let err = RuntimeError::SignatureMismatch {
            module: "math".to_string(),
            name: "pow".to_string(),
            expected: FuncSignature::new([ValueType::I64, ValueType::I64], [ValueType::I64]),
            provided: FuncSignature::new([ValueType::I32], [ValueType::I32]),
        };
        assert_eq!(
            err.to_string(),
            "Signature mismatch for import math.pow: module expects (i64, i64) -> i64, registry provides (i32) -> i32"
        );
    }

    #[test]
    fn test_start_routine_trap_wraps_cause() {
        let cause = RuntimeError::Trap {
            function: "<start>".to_string(),
            kind: TrapKind::IntegerDivisionByZero,
            message: "wasm trap: integer divide by zero".to_string(),
        };
        let err = RuntimeError::start_routine_trap(cause);
        assert!(err.is_trap());
        assert_eq!(err.trap_kind(), Some(TrapKind::IntegerDivisionByZero));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_exit_codes_are_distinct_and_nonzero() {
        let errors = vec![
            RuntimeError::configuration("x"),
            RuntimeError::source_unavailable("a.wat", "missing"),
            RuntimeError::parse("x"),
            RuntimeError::validation("x", None),
            RuntimeError::DuplicateImport {
                module: "m".into(),
                name: "n".into(),
                existing: FuncSignature::default(),
                requested: FuncSignature::default(),
            },
            RuntimeError::unresolved_import("m", "n"),
            RuntimeError::SignatureMismatch {
                module: "m".into(),
                name: "n".into(),
                expected: FuncSignature::default(),
                provided: FuncSignature::default(),
            },
            RuntimeError::start_routine_trap(RuntimeError::instantiation("x")),
            RuntimeError::instantiation("x"),
            RuntimeError::export_not_found("main"),
            RuntimeError::ExportKindMismatch {
                name: "memory".into(),
                expected: "function",
                actual: "memory",
            },
            RuntimeError::arity_or_type_mismatch("f", "(i32)", "()"),
            RuntimeError::Trap {
                function: "f".into(),
                kind: TrapKind::Unreachable,
                message: "x".into(),
            },
            RuntimeError::InstanceTrapped { reason: "x".into() },
            RuntimeError::MemoryAccess {
                name: "memory".into(),
                offset: 0,
                length: 1,
                size: 0,
            },
        ];
        let mut codes: Vec<i32> = errors.iter().map(RuntimeError::exit_code).collect();
        assert!(codes.iter().all(|c| *c != 0));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn test_unresolved_import_names_pair() {
        let err = RuntimeError::unresolved_import("math", "pow");
        assert_eq!(err.to_string(), "Unresolved import: module math, name pow");
        assert_eq!(err.category(), "unresolved_import");
    }

    #[test]
    fn test_host_error_is_classified() {
        let err = anyhow::Error::new(HostError::failed("boom"));
        assert_eq!(TrapKind::classify(&err), TrapKind::HostFunction);
        assert!(TrapKind::is_guest_fault(&err));
        let trap = RuntimeError::trap("start", &err);
        assert_eq!(trap.to_string(), "Trap in start: host function failed: boom");
    }

    #[test]
    fn test_engine_trap_is_classified() {
        let err = anyhow::Error::new(wasmtime::Trap::IntegerDivisionByZero);
        assert_eq!(TrapKind::classify(&err), TrapKind::IntegerDivisionByZero);
        let other = anyhow::anyhow!("allocation failed");
        assert_eq!(TrapKind::classify(&other), TrapKind::Other);
        assert!(!TrapKind::is_guest_fault(&other));
    }
}
