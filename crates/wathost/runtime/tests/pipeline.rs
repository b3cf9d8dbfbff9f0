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

//! End-to-end tests for the load, register, instantiate and invoke pipeline

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use wathost_runtime::hostlib::math;
use wathost_runtime::{EngineHandle, ExitStatus, FuncSignature, HostError, ImportRegistry, Module, RuntimeError, TrapKind, Value, ValueType, instantiate};

const POW_MODULE: &str = r#"
(module $calc
  (import "math" "pow" (func $pow (param i64 i64) (result i64)))
  (func (export "start") (result i64)
    i64.const 2
    i64.const 10
    call $pow))
"#;

fn engine() -> EngineHandle {
    EngineHandle::with_defaults().unwrap()
}

fn pow_signature() -> FuncSignature {
    FuncSignature::new([ValueType::I64, ValueType::I64], [ValueType::I64])
}

#[test]
fn test_module_without_imports_runs_with_empty_registry() {
    let engine = engine();
    let module = Module::from_wat(
        &engine,
        r#"(module (func (export "add") (param i32 i32) (result i32) local.get 0 local.get 1 i32.add))"#,
    )
    .unwrap();

    let mut instance = instantiate(&module, &ImportRegistry::new()).unwrap();
    let results = instance.invoke("add", &[Value::I32(40), Value::I32(2)]).unwrap();
    assert_eq!(results, vec![Value::I32(42)]);
}

#[test]
fn test_pow_scenario() {
    let engine = engine();
    let module = Module::from_wat(&engine, POW_MODULE).unwrap();
    assert_eq!(module.name(), Some("calc"));

    let mut registry = ImportRegistry::new();
    math::register(&mut registry).unwrap();

    let mut instance = instantiate(&module, &registry).unwrap();
    assert_eq!(instance.invoke("start", &[]).unwrap(), vec![Value::I64(1024)]);
}

#[test]
fn test_unresolved_import_names_the_pair() {
    let module = Module::from_wat(&engine(), POW_MODULE).unwrap();

    let err = instantiate(&module, &ImportRegistry::new()).unwrap_err();
    match &err {
        RuntimeError::UnresolvedImport { module, name } => {
            assert_eq!(module, "math");
            assert_eq!(name, "pow");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.to_string().contains("math"));
    assert!(err.to_string().contains("pow"));
}

#[test]
fn test_signature_mismatch_then_recovery() {
    let module = Module::from_wat(&engine(), POW_MODULE).unwrap();

    let mut wrong = ImportRegistry::new();
    wrong
        .register("math", "pow", FuncSignature::new([ValueType::I32, ValueType::I32], [ValueType::I32]), |_| Ok(vec![Value::I32(0)]))
        .unwrap();
    let err = instantiate(&module, &wrong).unwrap_err();
    assert!(matches!(err, RuntimeError::SignatureMismatch { .. }), "unexpected error: {err}");

    // The same module can be instantiated once the registry is corrected
    let mut right = ImportRegistry::new();
    math::register(&mut right).unwrap();
    let mut instance = instantiate(&module, &right).unwrap();
    assert_eq!(instance.invoke("start", &[]).unwrap(), vec![Value::I64(1024)]);
}

#[test]
fn test_reregistration_last_write_wins() {
    let module = Module::from_wat(&engine(), POW_MODULE).unwrap();

    let mut registry = ImportRegistry::new();
    math::register(&mut registry).unwrap();
    registry.register("math", "pow", pow_signature(), |_| Ok(vec![Value::I64(7)])).unwrap();
    assert_eq!(registry.len(), 1);

    let mut instance = instantiate(&module, &registry).unwrap();
    assert_eq!(instance.invoke("start", &[]).unwrap(), vec![Value::I64(7)]);

    let err = registry
        .register("math", "pow", FuncSignature::new([ValueType::F64], [ValueType::F64]), |_| Ok(vec![Value::F64(0.0)]))
        .unwrap_err();
    assert!(matches!(err, RuntimeError::DuplicateImport { .. }));
    assert_eq!(registry.lookup("math", "pow").unwrap().signature(), &pow_signature());
}

#[test]
fn test_registry_outlives_instances() {
    let module = Module::from_wat(&engine(), POW_MODULE).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    let mut registry = ImportRegistry::new();
    let counter = calls.clone();
    registry
        .register("math", "pow", pow_signature(), move |args| {
            counter.fetch_add(1, Ordering::SeqCst);
            let (Some(base), Some(exp)) = (args[0].as_i64(), args[1].as_i64()) else {
                return Err(HostError::failed("expected i64 arguments"));
            };
            math::pow(base, exp).map(|v| vec![Value::I64(v)])
        })
        .unwrap();

    let mut first = instantiate(&module, &registry).unwrap();
    let mut second = instantiate(&module, &registry).unwrap();
    drop(registry);

    first.invoke("start", &[]).unwrap();
    second.invoke("start", &[]).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_export_not_found() {
    let module = Module::from_wat(&engine(), POW_MODULE).unwrap();
    let mut registry = ImportRegistry::new();
    math::register(&mut registry).unwrap();
    let mut instance = instantiate(&module, &registry).unwrap();

    let err = instance.invoke("main", &[]).unwrap_err();
    assert!(matches!(err, RuntimeError::ExportNotFound { ref name } if name == "main"));

    // The instance stays usable
    assert_eq!(instance.invoke("start", &[]).unwrap(), vec![Value::I64(1024)]);
}

#[test]
fn test_main_exit_status() {
    let engine = engine();
    let module = Module::from_wat(
        &engine,
        r#"(module
             (func (export "main") (result i32) i32.const 0)
             (func (export "fail") (result i32) i32.const 3)
             (func (export "quiet")))"#,
    )
    .unwrap();
    let mut instance = instantiate(&module, &ImportRegistry::new()).unwrap();

    assert_eq!(instance.invoke_main("main").unwrap(), ExitStatus::SUCCESS);
    assert_eq!(instance.invoke_main("fail").unwrap().code(), 3);
    assert!(instance.invoke_main("quiet").unwrap().success());
}

#[test]
fn test_start_routine_trap_prevents_instantiation() {
    let module = Module::from_wat(
        &engine(),
        r#"(module
             (func $init i32.const 1 i32.const 0 i32.div_s drop)
             (start $init)
             (func (export "main") (result i32) i32.const 0))"#,
    )
    .unwrap();
    assert!(module.start().is_some());

    let err = instantiate(&module, &ImportRegistry::new()).unwrap_err();
    assert!(matches!(err, RuntimeError::StartRoutineTrap { .. }), "unexpected error: {err}");
    assert_eq!(err.trap_kind(), Some(TrapKind::IntegerDivisionByZero));
}

#[test]
fn test_guest_trap_invalidates_instance() {
    let module = Module::from_wat(
        &engine(),
        r#"(module
             (func (export "boom") unreachable)
             (func (export "ok") (result i32) i32.const 1))"#,
    )
    .unwrap();
    let mut instance = instantiate(&module, &ImportRegistry::new()).unwrap();

    let err = instance.invoke("boom", &[]).unwrap_err();
    assert_eq!(err.trap_kind(), Some(TrapKind::Unreachable));
    assert!(!instance.is_ready());
    assert!(matches!(instance.invoke("ok", &[]), Err(RuntimeError::InstanceTrapped { .. })));
}

#[test]
fn test_modules_are_reusable_across_instances() {
    let module = Module::from_wat(
        &engine(),
        r#"(module
             (global $n (mut i32) (i32.const 0))
             (func (export "bump") (result i32)
               global.get $n i32.const 1 i32.add global.set $n global.get $n))"#,
    )
    .unwrap();

    let mut a = instantiate(&module, &ImportRegistry::new()).unwrap();
    let mut b = instantiate(&module, &ImportRegistry::new()).unwrap();
    a.invoke("bump", &[]).unwrap();
    assert_eq!(a.invoke("bump", &[]).unwrap(), vec![Value::I32(2)]);
    assert_eq!(b.invoke("bump", &[]).unwrap(), vec![Value::I32(1)]);
}
