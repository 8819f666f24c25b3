// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Tracing script engine used by the CLI
//!
//! The CLI has no interpreter for unit bodies. Each synthesized function
//! reports the unit it belongs to when it runs, which shows the order the
//! loader executes a project in.

use owo_colors::OwoColorize;
use quire_loader::{Callable, FunctionSource, Result, ScriptEngine, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Engine whose functions print their file name when called
#[derive(Default)]
pub struct TraceEngine {
    quiet: bool,
    executed: Rc<RefCell<Vec<String>>>,
    synthesized: Cell<usize>,
}

impl TraceEngine {
    /// Create an engine; `quiet` suppresses the per-unit output
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            ..Default::default()
        }
    }

    /// File names in execution order
    pub fn executed(&self) -> Vec<String> {
        self.executed.borrow().clone()
    }

    /// Number of functions synthesized so far
    pub fn synthesized(&self) -> usize {
        self.synthesized.get()
    }
}

impl ScriptEngine for TraceEngine {
    fn synthesize(&self, source: FunctionSource) -> Result<Callable> {
        self.synthesized.set(self.synthesized.get() + 1);
        tracing::trace!(
            "Synthesized {}({}) with {} bytes",
            source.display_name,
            source.parameters.join(", "),
            source.body.len()
        );

        let quiet = self.quiet;
        let executed = self.executed.clone();
        let filename = source.filename;

        Ok(Callable::new(move |_| {
            if !quiet {
                println!("{} {}", "exec".green().bold(), filename);
            }
            executed.borrow_mut().push(filename.clone());
            Ok(Value::Undefined)
        }))
    }
}
