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

//! Module loading
//!
//! Text is converted to binary form, validated, compiled by the engine and
//! described as ordered import and export declarations. Loading is
//! all-or-nothing: any failure returns an error and no module.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};
use wasmtime::{ExternType, Mutability};

use crate::engine::EngineHandle;
use crate::error::{RuntimeError, RuntimeResult};
use crate::values::{FuncSignature, ValueType};

const WASM_MAGIC: &[u8] = b"\0asm";

/// Memory size limits in 64 KiB pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryLimits {
    pub minimum: u64,
    pub maximum: Option<u64>,
    pub shared: bool,
}

/// Table size limits in elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableLimits {
    pub minimum: u64,
    pub maximum: Option<u64>,
}

/// Global type. `value_type` is `None` for types with no host representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GlobalType {
    pub value_type: Option<ValueType>,
    pub mutable: bool,
}

/// Kind of an imported or exported item
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ExternKind {
    Function(FuncSignature),
    Memory(MemoryLimits),
    Global(GlobalType),
    Table(TableLimits),
}

pub type ExportKind = ExternKind;
pub type ImportKind = ExternKind;

impl ExternKind {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Function(_) => "function",
            Self::Memory(_) => "memory",
            Self::Global(_) => "global",
            Self::Table(_) => "table",
        }
    }

    pub fn as_function(&self) -> Option<&FuncSignature> {
        match self {
            Self::Function(sig) => Some(sig),
            _ => None,
        }
    }
}

impl fmt::Display for ExternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Function(sig) => write!(f, "func {sig}"),
            Self::Memory(limits) => {
                write!(f, "memory {}", limits.minimum)?;
                if let Some(max) = limits.maximum {
                    write!(f, " {max}")?;
                }
                if limits.shared {
                    f.write_str(" shared")?;
                }
                Ok(())
            }
            Self::Global(global) => {
                let ty = global.value_type.map(|t| t.to_string()).unwrap_or_else(|| "ref".to_string());
                if global.mutable { write!(f, "global (mut {ty})") } else { write!(f, "global {ty}") }
            }
            Self::Table(limits) => match limits.maximum {
                Some(max) => write!(f, "table {} {max}", limits.minimum),
                None => write!(f, "table {}", limits.minimum),
            },
        }
    }
}

/// An item the module requires from its host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportDeclaration {
    pub module: String,
    pub name: String,
    pub kind: ImportKind,
}

/// An item the module makes available
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportDeclaration {
    pub name: String,
    pub kind: ExportKind,
}

struct ModuleInner {
    engine: EngineHandle,
    compiled: wasmtime::Module,
    imports: Vec<ImportDeclaration>,
    exports: Vec<ExportDeclaration>,
    start: Option<u32>,
}

/// Validated, compiled, immutable module. Clones share the compiled code.
#[derive(Clone)]
pub struct Module {
    inner: Arc<ModuleInner>,
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name())
            .field("imports", &self.inner.imports)
            .field("exports", &self.inner.exports)
            .field("start", &self.inner.start)
            .finish()
    }
}

impl Module {
    /// Load a module from textual source
    pub fn from_wat(engine: &EngineHandle, source: &str) -> RuntimeResult<Self> {
        let bytes = wat::parse_str(source).map_err(|e| parse_error(&e.to_string()))?;
        Self::from_binary(engine, &bytes)
    }

    /// Load a module from its compiled binary form
    pub fn from_binary(engine: &EngineHandle, bytes: &[u8]) -> RuntimeResult<Self> {
        let start = validate(bytes)?;
        let compiled = wasmtime::Module::from_binary(engine.inner(), bytes).map_err(|e| RuntimeError::validation(format!("{e:#}"), None))?;

        let imports = compiled.imports().map(describe_import).collect::<RuntimeResult<Vec<_>>>()?;
        let exports = compiled.exports().map(describe_export).collect::<RuntimeResult<Vec<_>>>()?;

        info!(
            "Loaded module {} ({} imports, {} exports, start routine: {})",
            compiled.name().unwrap_or("<anonymous>"),
            imports.len(),
            exports.len(),
            start.is_some()
        );

        Ok(Self {
            inner: Arc::new(ModuleInner {
                engine: engine.clone(),
                compiled,
                imports,
                exports,
                start,
            }),
        })
    }

    /// Load a module from a file holding text or binary form
    pub fn from_file(engine: &EngineHandle, path: impl AsRef<Path>) -> RuntimeResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| RuntimeError::source_unavailable(path.display().to_string(), e.to_string()))?;
        debug!("Read {} bytes from {}", bytes.len(), path.display());

        if bytes.starts_with(WASM_MAGIC) {
            return Self::from_binary(engine, &bytes);
        }
        let source = String::from_utf8(bytes).map_err(|e| RuntimeError::source_unavailable(path.display().to_string(), format!("not UTF-8 text: {e}")))?;
        Self::from_wat(engine, &source)
    }

    /// Module name from the name section, if any
    pub fn name(&self) -> Option<&str> {
        self.inner.compiled.name()
    }

    pub fn imports(&self) -> &[ImportDeclaration] {
        &self.inner.imports
    }

    pub fn exports(&self) -> &[ExportDeclaration] {
        &self.inner.exports
    }

    pub fn export(&self, name: &str) -> Option<&ExportDeclaration> {
        self.inner.exports.iter().find(|e| e.name == name)
    }

    /// Function index of the start routine, if declared
    pub fn start(&self) -> Option<u32> {
        self.inner.start
    }

    pub fn engine(&self) -> &EngineHandle {
        &self.inner.engine
    }

    pub(crate) fn compiled(&self) -> &wasmtime::Module {
        &self.inner.compiled
    }
}

/// Validate the binary and locate its start section
fn validate(bytes: &[u8]) -> RuntimeResult<Option<u32>> {
    let mut validator = wasmparser::Validator::new();
    let mut start = None;

    for payload in wasmparser::Parser::new(0).parse_all(bytes) {
        let payload = payload.map_err(|e| RuntimeError::validation(e.message(), Some(e.offset())))?;
        if let wasmparser::Payload::StartSection { func, .. } = &payload {
            start = Some(*func);
        }
        match validator.payload(&payload).map_err(|e| RuntimeError::validation(e.message(), Some(e.offset())))? {
            wasmparser::ValidPayload::Func(to_validate, body) => {
                let mut func_validator = to_validate.into_validator(Default::default());
                func_validator.validate(&body).map_err(|e| RuntimeError::validation(e.message(), Some(e.offset())))?;
            }
            wasmparser::ValidPayload::End(_) => break,
            _ => {}
        }
    }

    Ok(start)
}

fn describe_import(import: wasmtime::ImportType<'_>) -> RuntimeResult<ImportDeclaration> {
    let item = format!("import {}.{}", import.module(), import.name());
    Ok(ImportDeclaration {
        module: import.module().to_string(),
        name: import.name().to_string(),
        kind: describe_extern(&item, import.ty())?,
    })
}

fn describe_export(export: wasmtime::ExportType<'_>) -> RuntimeResult<ExportDeclaration> {
    let item = format!("export {}", export.name());
    Ok(ExportDeclaration {
        name: export.name().to_string(),
        kind: describe_extern(&item, export.ty())?,
    })
}

fn describe_extern(item: &str, ty: ExternType) -> RuntimeResult<ExternKind> {
    match ty {
        ExternType::Func(func) => FuncSignature::from_func_type(&func)
            .map(ExternKind::Function)
            .map_err(|unsupported| RuntimeError::validation(format!("{item} uses {unsupported}, which cannot cross the host boundary"), None)),
        ExternType::Memory(memory) => Ok(ExternKind::Memory(MemoryLimits {
            minimum: memory.minimum(),
            maximum: memory.maximum(),
            shared: memory.is_shared(),
        })),
        ExternType::Global(global) => Ok(ExternKind::Global(GlobalType {
            value_type: ValueType::from_val_type(global.content()),
            mutable: global.mutability() == Mutability::Var,
        })),
        ExternType::Table(table) => Ok(ExternKind::Table(TableLimits {
            minimum: u64::from(table.minimum()),
            maximum: table.maximum().map(u64::from),
        })),
        #[allow(unreachable_patterns)]
        _ => Err(RuntimeError::validation(format!("{item} has an unsupported kind"), None)),
    }
}

/// Build a parse error from the text parser's rendered diagnostic. The
/// first line is the description; the `--> file:line:col` marker, when
/// present, gives the position.
fn parse_error(rendered: &str) -> RuntimeError {
    let message = rendered.lines().next().unwrap_or("malformed module text").trim().to_string();
    let position = rendered.lines().find_map(|line| {
        let location = line.trim_start().strip_prefix("--> ")?;
        let mut parts = location.rsplitn(3, ':');
        let column = parts.next()?.trim().parse::<usize>().ok()?;
        let line = parts.next()?.trim().parse::<usize>().ok()?;
        Some((line, column))
    });

    RuntimeError::Parse {
        message,
        line: position.map(|(line, _)| line),
        column: position.map(|(_, column)| column),
    }
}
