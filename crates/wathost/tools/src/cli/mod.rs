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

//! Command-line commands

pub mod inspect;
pub mod run;

use std::path::PathBuf;

use clap::Args;
use wathost_runtime::{Backend, EngineConfig, OptLevel, RuntimeResult};

/// Engine options shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct EngineArgs {
    /// TOML engine configuration file (defaults to $WATHOST_CONFIG)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Code generation backend: cranelift or winch
    #[arg(long, global = true)]
    pub backend: Option<Backend>,

    /// Optimization level: none, speed or speed_and_size
    #[arg(long, global = true)]
    pub opt_level: Option<OptLevel>,
}

impl EngineArgs {
    /// Resolve the engine configuration with command line flags on top
    pub fn resolve(&self) -> RuntimeResult<EngineConfig> {
        let mut config = EngineConfig::resolve(self.config.as_deref())?;
        if let Some(backend) = self.backend {
            config.backend = backend;
        }
        if let Some(opt_level) = self.opt_level {
            config.opt_level = opt_level;
        }
        Ok(config)
    }
}
