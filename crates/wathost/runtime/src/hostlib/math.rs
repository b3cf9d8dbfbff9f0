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

//! `math` namespace

use crate::error::RuntimeResult;
use crate::registry::{HostError, ImportRegistry};
use crate::values::{FuncSignature, Value, ValueType};

pub const NAMESPACE: &str = "math";

/// Register `math.pow(i64, i64) -> i64`
pub fn register(registry: &mut ImportRegistry) -> RuntimeResult<()> {
    registry.register(NAMESPACE, "pow", FuncSignature::new([ValueType::I64, ValueType::I64], [ValueType::I64]), |args| match args {
        [Value::I64(base), Value::I64(exponent)] => pow(*base, *exponent).map(|v| vec![Value::I64(v)]),
        _ => Err(HostError::failed("pow expects two i64 arguments")),
    })
}

/// Integer exponentiation with wrapping overflow. Negative exponents fail.
pub fn pow(base: i64, exponent: i64) -> Result<i64, HostError> {
    let mut exponent = u64::try_from(exponent).map_err(|_| HostError::failed(format!("pow: negative exponent {exponent}")))?;
    let mut base = base;
    let mut result: i64 = 1;
    while exponent > 0 {
        if exponent & 1 == 1 {
            result = result.wrapping_mul(base);
        }
        base = base.wrapping_mul(base);
        exponent >>= 1;
    }
    Ok(result)
}
