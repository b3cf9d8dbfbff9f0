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

//! Standard host libraries
//!
//! Ready-made host function sets an embedder can register before
//! instantiation.

pub mod drac;
pub mod math;

pub use drac::DracLib;

use crate::error::RuntimeResult;
use crate::registry::ImportRegistry;

/// Register every standard library, with `drac` bound to process stdio
pub fn register_standard_libraries(registry: &mut ImportRegistry) -> RuntimeResult<()> {
    math::register(registry)?;
    DracLib::stdio().register(registry)
}
