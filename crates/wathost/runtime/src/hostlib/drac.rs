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

//! `drac` namespace
//!
//! Runtime library for programs produced by the Drac teaching compiler:
//! console I/O plus dynamic integer arrays referenced by handle. Strings are
//! arrays of Unicode code points. Every function takes and returns `i32`;
//! procedures return 0.

use std::io::{BufRead, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::RuntimeResult;
use crate::registry::{HostError, ImportRegistry};
use crate::values::{FuncSignature, Value, ValueType};

pub const NAMESPACE: &str = "drac";

/// Largest capacity `new` reserves up front; bigger requests grow on `add`
const MAX_PREALLOCATED: usize = 4096;

struct DracState {
    output: Mutex<Box<dyn Write + Send>>,
    input: Mutex<Box<dyn BufRead + Send>>,
    arrays: Mutex<Vec<Vec<i32>>>,
}

impl DracState {
    fn write(&self, text: &str) -> Result<(), HostError> {
        let mut output = self.output.lock();
        output
            .write_all(text.as_bytes())
            .and_then(|_| output.flush())
            .map_err(|e| HostError::failed(format!("drac: write failed: {e}")))
    }

    fn read_line(&self) -> Result<Option<String>, HostError> {
        let mut line = String::new();
        let read = self
            .input
            .lock()
            .read_line(&mut line)
            .map_err(|e| HostError::failed(format!("drac: read failed: {e}")))?;
        if read == 0 {
            return Ok(None);
        }
        let trimmed = line.trim_end_matches(['\r', '\n']).len();
        line.truncate(trimmed);
        Ok(Some(line))
    }

    fn allocate(&self, contents: Vec<i32>) -> Result<i32, HostError> {
        let mut arrays = self.arrays.lock();
        let handle = i32::try_from(arrays.len()).map_err(|_| HostError::failed("drac: out of handles"))?;
        arrays.push(contents);
        Ok(handle)
    }

    fn with_array<R>(&self, handle: i32, f: impl FnOnce(&mut Vec<i32>) -> Result<R, HostError>) -> Result<R, HostError> {
        let mut arrays = self.arrays.lock();
        let array = usize::try_from(handle)
            .ok()
            .and_then(|index| arrays.get_mut(index))
            .ok_or_else(|| HostError::failed(format!("drac: invalid handle {handle}")))?;
        f(array)
    }
}

fn element(array: &mut [i32], handle: i32, index: i32) -> Result<&mut i32, HostError> {
    let len = array.len();
    usize::try_from(index)
        .ok()
        .and_then(|i| array.get_mut(i))
        .ok_or_else(|| HostError::failed(format!("drac: index {index} out of bounds for handle {handle} of size {len}")))
}

fn code_point(c: i32) -> Result<char, HostError> {
    u32::try_from(c)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| HostError::failed(format!("drac: {c} is not a Unicode code point")))
}

/// The `drac` host library. Clones share I/O streams and arrays.
#[derive(Clone)]
pub struct DracLib {
    state: Arc<DracState>,
}

impl DracLib {
    pub fn new(output: impl Write + Send + 'static, input: impl BufRead + Send + 'static) -> Self {
        Self {
            state: Arc::new(DracState {
                output: Mutex::new(Box::new(output)),
                input: Mutex::new(Box::new(input)),
                arrays: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Library bound to the process stdout and stdin
    pub fn stdio() -> Self {
        Self::new(std::io::stdout(), std::io::BufReader::new(std::io::stdin()))
    }

    /// Contents of the array behind `handle`
    pub fn array(&self, handle: i32) -> Option<Vec<i32>> {
        self.state.with_array(handle, |array| Ok(array.clone())).ok()
    }

    pub fn register(&self, registry: &mut ImportRegistry) -> RuntimeResult<()> {
        self.define(registry, "printi", 1, |state, args| {
            state.write(&args[0].to_string())?;
            Ok(0)
        })?;
        self.define(registry, "printc", 1, |state, args| {
            state.write(code_point(args[0])?.encode_utf8(&mut [0; 4]))?;
            Ok(0)
        })?;
        self.define(registry, "prints", 1, |state, args| {
            let text = state.with_array(args[0], |array| array.iter().map(|c| code_point(*c)).collect::<Result<String, _>>())?;
            state.write(&text)?;
            Ok(0)
        })?;
        self.define(registry, "println", 0, |state, _| {
            state.write("\n")?;
            Ok(0)
        })?;
        self.define(registry, "readi", 0, |state, _| {
            loop {
                let Some(line) = state.read_line()? else {
                    return Err(HostError::failed("drac: end of input while reading an integer"));
                };
                if let Ok(value) = line.trim().parse::<i32>() {
                    return Ok(value);
                }
            }
        })?;
        self.define(registry, "reads", 0, |state, _| {
            let line = state.read_line()?.unwrap_or_default();
            let contents = line.chars().map(|c| u32::from(c) as i32).collect();
            state.allocate(contents)
        })?;
        self.define(registry, "new", 1, |state, args| {
            let capacity = usize::try_from(args[0]).map_err(|_| HostError::failed(format!("drac: negative capacity {}", args[0])))?;
            state.allocate(Vec::with_capacity(capacity.min(MAX_PREALLOCATED)))
        })?;
        self.define(registry, "size", 1, |state, args| {
            state.with_array(args[0], |array| i32::try_from(array.len()).map_err(|_| HostError::failed("drac: array too large")))
        })?;
        self.define(registry, "add", 2, |state, args| {
            state.with_array(args[0], |array| {
                array.push(args[1]);
                Ok(0)
            })
        })?;
        self.define(registry, "get", 2, |state, args| {
            state.with_array(args[0], |array| element(array, args[0], args[1]).map(|v| *v))
        })?;
        self.define(registry, "set", 3, |state, args| {
            state.with_array(args[0], |array| {
                *element(array, args[0], args[1])? = args[2];
                Ok(0)
            })
        })
    }

    fn define<F>(&self, registry: &mut ImportRegistry, name: &str, arity: usize, f: F) -> RuntimeResult<()>
    where
        F: Fn(&DracState, &[i32]) -> Result<i32, HostError> + Send + Sync + 'static,
    {
        let state = self.state.clone();
        let signature = FuncSignature::new(vec![ValueType::I32; arity], [ValueType::I32]);
        registry.register(NAMESPACE, name, signature, move |args| {
            // Arity and types are checked against the signature before the call
            let ints: Vec<i32> = args.iter().filter_map(Value::as_i32).collect();
            f(&state, &ints).map(|v| vec![Value::I32(v)])
        })
    }
}
