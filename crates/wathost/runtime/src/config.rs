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

//! Engine configuration

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{RuntimeError, RuntimeResult};

/// Environment variable naming a TOML configuration file
pub const CONFIG_ENV: &str = "WATHOST_CONFIG";
pub const BACKEND_ENV: &str = "WATHOST_BACKEND";
pub const OPT_LEVEL_ENV: &str = "WATHOST_OPT_LEVEL";
pub const MAX_WASM_STACK_ENV: &str = "WATHOST_MAX_WASM_STACK";

/// Code generation backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Optimizing compiler
    #[default]
    Cranelift,
    /// Baseline compiler; only available when the engine is built with it
    Winch,
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cranelift" => Ok(Self::Cranelift),
            "winch" => Ok(Self::Winch),
            other => Err(format!("unknown backend `{other}`")),
        }
    }
}

/// Optimization level for the optimizing backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptLevel {
    None,
    #[default]
    Speed,
    SpeedAndSize,
}

impl FromStr for OptLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "speed" => Ok(Self::Speed),
            "speed_and_size" | "speed-and-size" => Ok(Self::SpeedAndSize),
            other => Err(format!("unknown optimization level `{other}`")),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub backend: Backend,
    pub opt_level: OptLevel,
    pub debug_info: bool,
    /// Maximum guest stack in bytes, engine default when unset
    pub max_wasm_stack: Option<usize>,
}

impl EngineConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> RuntimeResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| RuntimeError::configuration(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&content).map_err(|e| RuntimeError::configuration(format!("invalid config {}: {e}", path.display())))
    }

    /// Apply overrides from the environment. Invalid values are reported and ignored.
    pub fn apply_env(mut self) -> Self {
        self.apply_vars(|key| std::env::var(key).ok());
        self
    }

    fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(value) = lookup(BACKEND_ENV) {
            match value.parse() {
                Ok(backend) => self.backend = backend,
                Err(e) => warn!("Ignoring {}: {}", BACKEND_ENV, e),
            }
        }

        if let Some(value) = lookup(OPT_LEVEL_ENV) {
            match value.parse() {
                Ok(level) => self.opt_level = level,
                Err(e) => warn!("Ignoring {}: {}", OPT_LEVEL_ENV, e),
            }
        }

        if let Some(value) = lookup(MAX_WASM_STACK_ENV) {
            match value.parse::<usize>() {
                Ok(bytes) => self.max_wasm_stack = Some(bytes),
                Err(_) => warn!("Ignoring {}: '{}' is not a byte count", MAX_WASM_STACK_ENV, value),
            }
        }
    }

    /// Resolve the configuration: explicit file, then `WATHOST_CONFIG`,
    /// then defaults, with environment overrides on top.
    pub fn resolve(config_file: Option<&Path>) -> RuntimeResult<Self> {
        let base = if let Some(path) = config_file {
            Self::load_from_file(path)?
        } else if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            Self::load_from_file(env_path)?
        } else {
            Self::default()
        };
        Ok(base.apply_env())
    }
}
