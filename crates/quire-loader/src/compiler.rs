// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Two-pass compiler seam
//!
//! Pass 1 runs when a unit is created from a resource and only needs to
//! report the unit's dependencies. Pass 2 runs on first execution, after
//! every dependency has been executed, and produces the final code.

use crate::dependency::DependencyReference;
use crate::error::Result;
use std::fmt;
use url::Url;

/// Severity of a compiler diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Reported, does not stop execution
    Warning,
    /// Aborts execution of the unit
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// A warning or error reported by a compiler.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Severity
    pub severity: Severity,
    /// Human-readable message
    pub message: String,
    /// 1-based line number, if known
    pub line: Option<u32>,
    /// File the diagnostic refers to, if known
    pub source: Option<Url>,
}

impl Diagnostic {
    /// Create a warning
    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
            line: None,
            source: None,
        }
    }

    /// Create an error
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            ..Self::warning(message)
        }
    }

    /// Attach a location
    pub fn at(mut self, source: &Url, line: u32) -> Self {
        self.source = Some(source.clone());
        self.line = Some(line);
        self
    }

    /// Whether this diagnostic aborts execution
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Source map text as produced by a compiler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceMapText {
    /// Already UTF-8
    Utf8(String),
    /// UTF-16 code units, possibly malformed
    Utf16(Vec<u16>),
}

/// Result of the second compiler pass
#[derive(Debug, Clone, Default)]
pub struct CompiledOutput {
    /// Final code
    pub code: String,
    /// Source map for `code`, if the compiler produced one
    pub source_map: Option<SourceMapText>,
}

/// A compiler that has finished pass 1 for one unit.
pub trait Compiler {
    /// Enter an import context while dependencies are executed
    fn push_import(&mut self, name: &str);

    /// Leave the innermost import context
    fn pop_import(&mut self);

    /// Run the second pass
    fn compile_pass2(&mut self) -> CompiledOutput;

    /// Warnings and errors collected across both passes
    fn diagnostics(&self) -> &[Diagnostic];

    /// Render a diagnostic for display
    fn prettify(&self, diagnostic: &Diagnostic) -> String {
        let mut out = String::new();
        if let Some(source) = &diagnostic.source {
            out.push_str(source.path());
            if let Some(line) = diagnostic.line {
                out.push_str(&format!(":{}", line));
            }
            out.push_str(": ");
        }
        out.push_str(&format!("{}: {}", diagnostic.severity, diagnostic.message));
        out
    }
}

/// Output of pass 1
pub struct FirstPass {
    /// Dependencies declared by the source, in order
    pub dependencies: Vec<DependencyReference>,
    /// Handle used for pass 2
    pub compiler: Box<dyn Compiler>,
}

impl fmt::Debug for FirstPass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FirstPass")
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

/// Creates compilers for source resources.
pub trait CompilerFactory {
    /// Run pass 1 over `source` located at `url`
    fn compile_pass1(&self, source: &str, url: &Url) -> Result<FirstPass>;
}
