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

//! Host runtime for WebAssembly text modules
//!
//! Loading and running a module goes through five stages: an
//! [`EngineHandle`] compiles a [`Module`] from WebAssembly text, an
//! [`ImportRegistry`] supplies host functions, [`instantiate`] binds the
//! module's imports and runs its start routine, and [`Instance::invoke`]
//! calls exports by name.

pub mod config;
pub mod engine;
pub mod error;
pub mod hostlib;
pub mod instance;
pub mod invoke;
pub mod module;
pub mod registry;
pub mod values;

pub use config::{Backend, EngineConfig, OptLevel};
pub use engine::EngineHandle;
pub use error::{RuntimeError, RuntimeResult, TrapKind};
pub use hostlib::{DracLib, register_standard_libraries};
pub use instance::{Instance, InstanceMetadata, InstanceState, ResolvedImport, instantiate, resolve_imports};
pub use invoke::ExitStatus;
pub use module::{ExportDeclaration, ExportKind, ExternKind, GlobalType, ImportDeclaration, ImportKind, MemoryLimits, Module, TableLimits};
pub use registry::{HostError, HostFunction, ImportRegistry};
pub use values::{FuncSignature, Value, ValueParseError, ValueType};
