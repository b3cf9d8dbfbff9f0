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

//! Value types crossing the host boundary

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use wasmtime::{ValType, Val};

/// Semantic value types supported at the host boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    I32,
    I64,
    F32,
    F64,
}

impl ValueType {
    /// Map an engine value type, if it can cross the host boundary
    pub fn from_val_type(ty: &ValType) -> Option<Self> {
        match ty {
            ValType::I32 => Some(Self::I32),
            ValType::I64 => Some(Self::I64),
            ValType::F32 => Some(Self::F32),
            ValType::F64 => Some(Self::F64),
            _ => None,
        }
    }

    pub fn to_val_type(self) -> ValType {
        match self {
            Self::I32 => ValType::I32,
            Self::I64 => ValType::I64,
            Self::F32 => ValType::F32,
            Self::F64 => ValType::F64,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F32 => "f32",
            Self::F64 => "f64",
        };
        f.write_str(name)
    }
}

impl FromStr for ValueType {
    type Err = ValueParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "i32" => Ok(Self::I32),
            "i64" => Ok(Self::I64),
            "f32" => Ok(Self::F32),
            "f64" => Ok(Self::F64),
            other => Err(ValueParseError::UnknownType(other.to_string())),
        }
    }
}

/// A typed value passed to or returned from guest code
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Value {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
}

impl Value {
    pub fn ty(&self) -> ValueType {
        match self {
            Self::I32(_) => ValueType::I32,
            Self::I64(_) => ValueType::I64,
            Self::F32(_) => ValueType::F32,
            Self::F64(_) => ValueType::F64,
        }
    }

    /// Parse a textual argument as a value of the given type
    pub fn parse(ty: ValueType, text: &str) -> Result<Self, ValueParseError> {
        let text = text.trim();
        let invalid = || ValueParseError::InvalidLiteral { ty, text: text.to_string() };
        match ty {
            ValueType::I32 => text.parse().map(Self::I32).map_err(|_| invalid()),
            ValueType::I64 => text.parse().map(Self::I64).map_err(|_| invalid()),
            ValueType::F32 => text.parse().map(Self::F32).map_err(|_| invalid()),
            ValueType::F64 => text.parse().map(Self::F64).map_err(|_| invalid()),
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Self::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::I64(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::I32(v) => write!(f, "{v}"),
            Self::I64(v) => write!(f, "{v}"),
            Self::F32(v) => write!(f, "{v}"),
            Self::F64(v) => write!(f, "{v}"),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::I32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::I64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::F32(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::F64(v)
    }
}

impl From<Value> for Val {
    fn from(value: Value) -> Self {
        match value {
            Value::I32(v) => Val::I32(v),
            Value::I64(v) => Val::I64(v),
            Value::F32(v) => Val::F32(v.to_bits()),
            Value::F64(v) => Val::F64(v.to_bits()),
        }
    }
}

impl TryFrom<&Val> for Value {
    type Error = ValueParseError;

    fn try_from(val: &Val) -> Result<Self, Self::Error> {
        match val {
            Val::I32(v) => Ok(Self::I32(*v)),
            Val::I64(v) => Ok(Self::I64(*v)),
            Val::F32(bits) => Ok(Self::F32(f32::from_bits(*bits))),
            Val::F64(bits) => Ok(Self::F64(f64::from_bits(*bits))),
            _ => Err(ValueParseError::UnsupportedEngineValue),
        }
    }
}

/// Value conversion errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueParseError {
    #[error("unknown value type `{0}`")]
    UnknownType(String),
    #[error("`{text}` is not a valid {ty} literal")]
    InvalidLiteral { ty: ValueType, text: String },
    #[error("engine value has no host representation")]
    UnsupportedEngineValue,
}

/// Function signature: ordered parameter and result types
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct FuncSignature {
    pub params: Vec<ValueType>,
    pub results: Vec<ValueType>,
}

impl FuncSignature {
    pub fn new(params: impl IntoIterator<Item = ValueType>, results: impl IntoIterator<Item = ValueType>) -> Self {
        Self {
            params: params.into_iter().collect(),
            results: results.into_iter().collect(),
        }
    }

    /// Convert an engine function type. Fails with the first unsupported type.
    pub fn from_func_type(ty: &wasmtime::FuncType) -> Result<Self, ValType> {
        let convert = |t: ValType| ValueType::from_val_type(&t).ok_or(t);
        Ok(Self {
            params: ty.params().map(convert).collect::<Result<_, _>>()?,
            results: ty.results().map(convert).collect::<Result<_, _>>()?,
        })
    }

    pub fn to_func_type(&self, engine: &wasmtime::Engine) -> wasmtime::FuncType {
        wasmtime::FuncType::new(
            engine,
            self.params.iter().map(|t| t.to_val_type()),
            self.results.iter().map(|t| t.to_val_type()),
        )
    }

    /// Check that `values` has exactly the types in `expected`
    pub fn matches(expected: &[ValueType], values: &[Value]) -> bool {
        expected.len() == values.len() && expected.iter().zip(values).all(|(ty, v)| *ty == v.ty())
    }

    pub fn accepts(&self, args: &[Value]) -> bool {
        Self::matches(&self.params, args)
    }
}

impl fmt::Display for FuncSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        write_types(f, &self.params)?;
        f.write_str(") -> ")?;
        match self.results.as_slice() {
            [] => f.write_str("()"),
            [single] => write!(f, "{single}"),
            many => {
                f.write_str("(")?;
                write_types(f, many)?;
                f.write_str(")")
            }
        }
    }
}

fn write_types(f: &mut fmt::Formatter<'_>, types: &[ValueType]) -> fmt::Result {
    for (i, ty) in types.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{ty}")?;
    }
    Ok(())
}

/// Render a list of values the way signatures are rendered
pub fn describe_values(values: &[Value]) -> String {
    let types: Vec<String> = values.iter().map(|v| v.ty().to_string()).collect();
    format!("({})", types.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_display() {
        let sig = FuncSignature::new([ValueType::I64, ValueType::I64], [ValueType::I64]);
        assert_eq!(sig.to_string(), "(i64, i64) -> i64");

        let unit = FuncSignature::default();
        assert_eq!(unit.to_string(), "() -> ()");

        let multi = FuncSignature::new([], [ValueType::I32, ValueType::F64]);
        assert_eq!(multi.to_string(), "() -> (i32, f64)");
    }

    #[test]
    fn test_parse_values() {
        assert_eq!(Value::parse(ValueType::I32, "21"), Ok(Value::I32(21)));
        assert_eq!(Value::parse(ValueType::I64, " -7 "), Ok(Value::I64(-7)));
        assert_eq!(Value::parse(ValueType::F64, "2.5"), Ok(Value::F64(2.5)));
        assert!(matches!(Value::parse(ValueType::I32, "abc"), Err(ValueParseError::InvalidLiteral { .. })));
        assert!(matches!(Value::parse(ValueType::I32, "4294967296"), Err(ValueParseError::InvalidLiteral { .. })));
    }

    #[test]
    fn test_value_type_from_str() {
        assert_eq!("f32".parse::<ValueType>(), Ok(ValueType::F32));
        assert!("v128".parse::<ValueType>().is_err());
    }

    #[test]
    fn test_accepts_checks_arity_and_types() {
        let sig = FuncSignature::new([ValueType::I32], [ValueType::I32]);
        assert!(sig.accepts(&[Value::I32(1)]));
        assert!(!sig.accepts(&[]));
        assert!(!sig.accepts(&[Value::I64(1)]));
        assert!(!sig.accepts(&[Value::I32(1), Value::I32(2)]));
    }

    #[test]
    fn test_engine_value_conversion() {
        let val: Val = Value::F32(1.5).into();
        assert_eq!(Value::try_from(&val), Ok(Value::F32(1.5)));
        let val: Val = Value::I64(-3).into();
        assert_eq!(Value::try_from(&val), Ok(Value::I64(-3)));
    }

    #[test]
    fn test_describe_values() {
        assert_eq!(describe_values(&[Value::I32(1), Value::F64(0.0)]), "(i32, f64)");
        assert_eq!(describe_values(&[]), "()");
    }
}
