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

//! Engine handle
//!
//! Owns the compilation backend configuration. One handle is created at
//! startup and passed explicitly to every load; clones share the same
//! underlying engine.

use std::sync::Arc;

use tracing::info;

use crate::config::{Backend, EngineConfig, OptLevel};
use crate::error::{RuntimeError, RuntimeResult};

#[derive(Clone)]
pub struct EngineHandle {
    inner: wasmtime::Engine,
    config: Arc<EngineConfig>,
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle").field("config", &self.config).finish_non_exhaustive()
    }
}

impl EngineHandle {
    /// Create an engine. Fails if the backend is unavailable or the engine
    /// rejects the configuration.
    pub fn new(config: EngineConfig) -> RuntimeResult<Self> {
        let mut engine_config = wasmtime::Config::new();
        engine_config.strategy(match config.backend {
            Backend::Cranelift => wasmtime::Strategy::Cranelift,
            Backend::Winch => wasmtime::Strategy::Winch,
        });
        engine_config.cranelift_opt_level(match config.opt_level {
            OptLevel::None => wasmtime::OptLevel::None,
            OptLevel::Speed => wasmtime::OptLevel::Speed,
            OptLevel::SpeedAndSize => wasmtime::OptLevel::SpeedAndSize,
        });
        engine_config.debug_info(config.debug_info);
        if let Some(bytes) = config.max_wasm_stack {
            engine_config.max_wasm_stack(bytes);
        }

        let inner = wasmtime::Engine::new(&engine_config).map_err(|e| RuntimeError::configuration(format!("{:?} backend: {e:#}", config.backend)))?;
        info!("Engine created with {:?} backend", config.backend);

        Ok(Self {
            inner,
            config: Arc::new(config),
        })
    }

    pub fn with_defaults() -> RuntimeResult<Self> {
        Self::new(EngineConfig::default())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether both handles share one engine
    pub fn same(&self, other: &EngineHandle) -> bool {
        wasmtime::Engine::same(&self.inner, &other.inner)
    }

    pub(crate) fn inner(&self) -> &wasmtime::Engine {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_engine() {
        let engine = EngineHandle::with_defaults().unwrap();
        assert_eq!(engine.config().backend, Backend::Cranelift);
        let clone = engine.clone();
        assert!(engine.same(&clone));
    }

    #[test]
    fn test_distinct_engines() {
        let a = EngineHandle::with_defaults().unwrap();
        let b = EngineHandle::with_defaults().unwrap();
        assert!(!a.same(&b));
    }

    #[test]
    fn test_unavailable_backend_is_a_configuration_error() {
        let config = EngineConfig {
            backend: Backend::Winch,
            ..Default::default()
        };
        let err = EngineHandle::new(config).unwrap_err();
        assert!(matches!(err, RuntimeError::Configuration { .. }), "unexpected error: {err}");
        assert!(err.to_string().contains("Winch"));
    }
}
