// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Script engine seam
//!
//! The loader never interprets code itself. It assembles a [`FunctionSource`]
//! and asks a [`ScriptEngine`] to turn it into a [`Callable`].

use crate::error::{LoaderError, Result};
use crate::operations::{Executer, Importer};
use crate::value::{Environment, Value};
use std::fmt;
use std::rc::Rc;

/// Parameter names every synthesized function receives, in order
pub const FUNCTION_PARAMETERS: [&str; 3] = ["global", "objj_executeFile", "objj_importFile"];

/// Default number of lines a function wrapper adds above the body
pub const DEFAULT_FUNCTION_HEADER_LINES: usize = 2;

/// Everything an engine needs to build a function for one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSource {
    /// Positional parameter names
    pub parameters: Vec<String>,
    /// Function body, including the trailing location comments
    pub body: String,
    /// Name shown in stack traces
    pub display_name: String,
    /// Path of the file the body came from
    pub filename: String,
}

/// Arguments passed to a unit's callable.
#[derive(Clone)]
pub struct Arguments {
    /// The ambient global scope
    pub environment: Environment,
    /// Synchronous execute primitive bound to the unit's directory
    pub execute: Rc<Executer>,
    /// Asynchronous import primitive bound to the unit's directory
    pub import: Rc<Importer>,
    /// Host binding values, matching the extra parameter names
    pub extras: Vec<Value>,
}

impl fmt::Debug for Arguments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arguments")
            .field("context", self.execute.context())
            .field("extras", &self.extras)
            .finish_non_exhaustive()
    }
}

type CallableFn = dyn Fn(&Arguments) -> Result<Value>;

/// An invocable unit body.
#[derive(Clone)]
pub struct Callable(Rc<CallableFn>);

impl Callable {
    /// Wrap a closure
    pub fn new(f: impl Fn(&Arguments) -> Result<Value> + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Invoke with the given arguments
    pub fn call(&self, arguments: &Arguments) -> Result<Value> {
        (self.0)(arguments)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callable")
    }
}

/// Extra parameters appended after the fixed ones.
#[derive(Debug, Clone, Default)]
pub struct HostBindings {
    names: Vec<String>,
    values: Vec<Value>,
}

impl HostBindings {
    /// Pair up names and values
    pub fn new(names: Vec<String>, values: Vec<Value>) -> Result<Self> {
        if names.len() != values.len() {
            return Err(LoaderError::Config(format!(
                "{} host parameter names for {} values",
                names.len(),
                values.len()
            )));
        }
        Ok(Self { names, values })
    }

    /// Parameter names
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Argument values
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Full parameter list for a synthesized function
    pub fn parameters(&self) -> Vec<String> {
        FUNCTION_PARAMETERS
            .iter()
            .map(|name| name.to_string())
            .chain(self.names.iter().cloned())
            .collect()
    }
}

/// Builds callables from function sources.
pub trait ScriptEngine {
    /// Compile `source` into a callable
    fn synthesize(&self, source: FunctionSource) -> Result<Callable>;

    /// Lines the engine's function wrapper places above the body.
    ///
    /// When a source map is embedded, this many leading newlines are removed
    /// from the body so mapped line numbers stay aligned.
    fn function_header_lines(&self) -> usize {
        DEFAULT_FUNCTION_HEADER_LINES
    }
}
