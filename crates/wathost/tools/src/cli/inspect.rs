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

//! Inspect command for describing a module's interface

use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use wathost_runtime::{EngineConfig, EngineHandle, ExportDeclaration, ImportDeclaration, Module};

/// Arguments for the inspect command
#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    /// WebAssembly text (or binary) module to describe
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Emit JSON instead of text
    #[arg(long)]
    pub json: bool,
}

/// Interface of a loaded module
#[derive(Debug, Clone, Serialize)]
pub struct ModuleReport {
    pub name: Option<String>,
    pub imports: Vec<ImportDeclaration>,
    pub exports: Vec<ExportDeclaration>,
    pub start: Option<u32>,
}

impl ModuleReport {
    pub fn new(module: &Module) -> Self {
        Self {
            name: module.name().map(str::to_string),
            imports: module.imports().to_vec(),
            exports: module.exports().to_vec(),
            start: module.start(),
        }
    }

    pub fn write_text(&self, out: &mut dyn Write) -> std::io::Result<()> {
        writeln!(out, "module {}", self.name.as_deref().unwrap_or("<anonymous>"))?;

        writeln!(out, "imports:")?;
        if self.imports.is_empty() {
            writeln!(out, "  (none)")?;
        }
        for import in &self.imports {
            writeln!(out, "  {}.{}: {}", import.module, import.name, import.kind)?;
        }

        writeln!(out, "exports:")?;
        if self.exports.is_empty() {
            writeln!(out, "  (none)")?;
        }
        for export in &self.exports {
            writeln!(out, "  {}: {}", export.name, export.kind)?;
        }

        match self.start {
            Some(index) => writeln!(out, "start: function {index}"),
            None => writeln!(out, "start: none"),
        }
    }
}

/// Execute the inspect command
pub fn execute(args: &InspectArgs, config: EngineConfig, out: &mut dyn Write) -> anyhow::Result<()> {
    let engine = EngineHandle::new(config)?;
    let module = Module::from_file(&engine, &args.file)?;
    let report = ModuleReport::new(&module);

    if args.json {
        serde_json::to_writer_pretty(&mut *out, &report)?;
        writeln!(out)?;
    } else {
        report.write_text(out)?;
    }
    Ok(())
}
