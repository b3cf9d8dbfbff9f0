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

//! Run command for loading a module and invoking one of its exports

use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use tracing::info;
use wathost_runtime::{
    EngineConfig, EngineHandle, ExitStatus, FuncSignature, ImportRegistry, Module, RuntimeError, RuntimeResult, Value, instantiate,
    register_standard_libraries,
};

/// Arguments for the run command
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// WebAssembly text (or binary) module to run
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Export to invoke (default `start`, or `main` with --main)
    #[arg(long, value_name = "NAME")]
    pub invoke: Option<String>,

    /// Treat the export as a program entry point and exit with its result
    #[arg(long)]
    pub main: bool,

    /// Do not register the standard host libraries
    #[arg(long)]
    pub no_stdlib: bool,

    /// Arguments for the export, parsed against its parameter types
    #[arg(value_name = "ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl RunArgs {
    pub fn export_name(&self) -> &str {
        match &self.invoke {
            Some(name) => name,
            None if self.main => "main",
            None => "start",
        }
    }
}

/// Parse textual arguments for `export` against its parameter types
pub fn parse_arguments(export: &str, signature: &FuncSignature, raw: &[String]) -> RuntimeResult<Vec<Value>> {
    if raw.len() != signature.params.len() {
        return Err(RuntimeError::arity_or_type_mismatch(
            export,
            signature.to_string(),
            format!("{} argument(s)", raw.len()),
        ));
    }

    signature
        .params
        .iter()
        .zip(raw)
        .map(|(ty, text)| Value::parse(*ty, text).map_err(|e| RuntimeError::arity_or_type_mismatch(export, signature.to_string(), e.to_string())))
        .collect()
}

/// Execute the run command. Results of a regular export are written to
/// `out`, one per line; a main-style export yields its exit status.
pub fn execute(args: &RunArgs, config: EngineConfig, out: &mut dyn Write) -> anyhow::Result<ExitStatus> {
    let engine = EngineHandle::new(config)?;
    let module = Module::from_file(&engine, &args.file)?;

    let mut registry = ImportRegistry::new();
    if !args.no_stdlib {
        register_standard_libraries(&mut registry)?;
    }

    let mut instance = instantiate(&module, &registry)?;
    let export = args.export_name();
    let params = parse_arguments(export, instance.export_signature(export)?, &args.args)?;
    let results = instance.invoke(export, &params)?;

    if args.main {
        let status = ExitStatus::from_results(export, &results)?;
        info!("{} exited with status {}", export, status.code());
        return Ok(status);
    }

    for value in &results {
        writeln!(out, "{value}")?;
    }
    Ok(ExitStatus::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;
    use wathost_runtime::ValueType;

    fn wat_file(source: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(source.as_bytes()).unwrap();
        file
    }

    fn run_args(file: &NamedTempFile, args: &[&str]) -> RunArgs {
        RunArgs {
            file: file.path().to_path_buf(),
            invoke: None,
            main: false,
            no_stdlib: false,
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_parse_arguments() {
        let sig = FuncSignature::new([ValueType::I32, ValueType::F64], [ValueType::I32]);
        let values = parse_arguments("f", &sig, &["-3".to_string(), "2.5".to_string()]).unwrap();
        assert_eq!(values, vec![Value::I32(-3), Value::F64(2.5)]);

        let err = parse_arguments("f", &sig, &["1".to_string()]).unwrap_err();
        assert!(matches!(err, RuntimeError::ArityOrTypeMismatch { .. }));

        let err = parse_arguments("f", &sig, &["x".to_string(), "1".to_string()]).unwrap_err();
        assert!(err.to_string().contains("`x` is not a valid i32 literal"));
    }

    #[test]
    fn test_run_prints_results() {
        let file = wat_file(
            r#"(module
                 (import "math" "pow" (func $pow (param i64 i64) (result i64)))
                 (func (export "start") (param i64) (result i64)
                   i64.const 2
                   local.get 0
                   call $pow))"#,
        );
        let mut out = Vec::new();
        let status = execute(&run_args(&file, &["10"]), EngineConfig::default(), &mut out).unwrap();
        assert!(status.success());
        assert_eq!(String::from_utf8(out).unwrap(), "1024\n");
    }

    #[test]
    fn test_run_main_status() {
        let file = wat_file(r#"(module (func (export "main") (result i32) i32.const 7))"#);
        let mut args = run_args(&file, &[]);
        args.main = true;

        let mut out = Vec::new();
        let status = execute(&args, EngineConfig::default(), &mut out).unwrap();
        assert_eq!(status.code(), 7);
        assert!(out.is_empty());
    }

    #[test]
    fn test_run_without_stdlib_leaves_imports_unresolved() {
        let file = wat_file(
            r#"(module
                 (import "math" "pow" (func (param i64 i64) (result i64)))
                 (func (export "start")))"#,
        );
        let mut args = run_args(&file, &[]);
        args.no_stdlib = true;

        let err = execute(&args, EngineConfig::default(), &mut Vec::new()).unwrap_err();
        let err = err.downcast_ref::<RuntimeError>().unwrap();
        assert!(matches!(err, RuntimeError::UnresolvedImport { .. }));
    }

    #[test]
    fn test_run_missing_file() {
        let args = RunArgs {
            file: PathBuf::from("/nonexistent/program.wat"),
            invoke: Some("main".to_string()),
            main: true,
            no_stdlib: true,
            args: Vec::new(),
        };
        let err = execute(&args, EngineConfig::default(), &mut Vec::new()).unwrap_err();
        assert_eq!(err.downcast_ref::<RuntimeError>().unwrap().category(), "missing_file");
    }
}
