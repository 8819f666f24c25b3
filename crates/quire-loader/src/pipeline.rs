// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Compile, synthesize and execute units

use crate::compiler::{Compiler, SourceMapText};
use crate::diagnostics::report_diagnostics;
use crate::engine::{Arguments, Callable, FunctionSource};
use crate::error::{LoaderError, Result};
use crate::loader::Loader;
use crate::transcode::encode_source_map;
use crate::unit::{Body, Unit};
use crate::value::Value;
use std::rc::Rc;
use tracing::{debug, trace, warn};
use url::Url;

const SOURCE_MAP_DATA_URI: &str = "data:application/json;charset=utf-8;base64,";

/// Source map accompanying code handed to [`Loader::synthesize`]
pub(crate) enum MapSource {
    /// Already base64-encoded, e.g. from a bundle
    Encoded(String),
    /// Fresh from a compiler
    Text(SourceMapText),
}

/// A synthesized callable and the encoded map embedded in it
pub(crate) struct Synthesized {
    pub(crate) callable: Callable,
    pub(crate) source_map: Option<String>,
}

/// Sets the currently-compiling slot for the lifetime of the scope.
struct CompilingScope<'a> {
    loader: &'a Loader,
    previous: Option<Rc<Unit>>,
}

impl<'a> CompilingScope<'a> {
    fn enter(loader: &'a Loader, unit: &Rc<Unit>) -> Self {
        let previous = loader.inner().compiling.replace(Some(unit.clone()));
        Self { loader, previous }
    }
}

impl Drop for CompilingScope<'_> {
    fn drop(&mut self) {
        self.loader.inner().compiling.replace(self.previous.take());
    }
}

/// Path used in `sourceURL` comments and as the function's file name
pub fn source_path(url: &Url) -> String {
    if url.scheme() == "file" {
        url.path().to_string()
    } else {
        url.as_str().to_string()
    }
}

/// Last path segment of a URL
pub fn display_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default()
        .to_string()
}

fn strip_leading_newlines(code: &str, count: usize) -> &str {
    let stripped = code
        .bytes()
        .take(count)
        .take_while(|&b| b == b'\n')
        .count();
    &code[stripped..]
}

impl Loader {
    /// Execute a unit whose dependencies are loaded.
    ///
    /// A unit still holding a compiler first executes its dependencies in
    /// declared order, runs the second pass, reports diagnostics and installs
    /// the resulting callable.
    pub fn execute(&self, unit: &Rc<Unit>) -> Result<Value> {
        trace!("EXECUTION: {}", unit.url());

        let callable = match unit.checkout_body() {
            Body::Ready(callable) => callable,
            Body::PendingCompilation(compiler) => self.compile(unit, compiler)?,
            Body::Compiling => {
                debug!("{} is already being compiled", unit.url());
                return Ok(Value::Undefined);
            }
            Body::Failed => return Err(LoaderError::Compilation(unit.url().to_string())),
        };

        let arguments = self.arguments_for(unit);
        let previous = self.inner().executing.replace(Some(unit.clone()));
        let result = callable.call(&arguments);
        self.inner().executing.replace(previous);

        result
    }

    /// Compile `unit` once. Any failure leaves it permanently `Failed`.
    fn compile(&self, unit: &Rc<Unit>, compiler: Box<dyn Compiler>) -> Result<Callable> {
        let _scope = CompilingScope::enter(self, unit);

        let result = self.compile_pending(unit, compiler);
        match &result {
            Ok(callable) => unit.set_body(Body::Ready(callable.clone())),
            Err(_) => unit.set_body(Body::Failed),
        }
        result
    }

    fn compile_pending(&self, unit: &Rc<Unit>, mut compiler: Box<dyn Compiler>) -> Result<Callable> {
        compiler.push_import(&display_name(unit.url()));
        let executer = self.executer_for(unit.reference_url());
        for dependency in unit.file_dependencies() {
            executer.call(dependency.locator(), dependency.is_local())?;
        }
        compiler.pop_import();

        let output = compiler.compile_pass2();

        let any_errors = {
            let format = self.config().diagnostic_format;
            let mut sink = self.inner().diagnostics.borrow_mut();
            report_diagnostics(compiler.as_ref(), format, &mut **sink)?
        };
        if any_errors {
            return Err(LoaderError::Compilation(unit.url().to_string()));
        }

        let map = output.source_map.map(MapSource::Text);
        let synthesized = self.synthesize(unit.url(), &output.code, map)?;
        unit.set_code(output.code, synthesized.source_map);

        Ok(synthesized.callable)
    }

    /// Build the callable for `code` located at `url`.
    pub(crate) fn synthesize(
        &self,
        url: &Url,
        code: &str,
        map: Option<MapSource>,
    ) -> Result<Synthesized> {
        let filename = source_path(url);
        let mut body = format!("{}/**/\n//# sourceURL={}", code, filename);

        let encoded = match map {
            _ if !self.config().source_maps => None,
            Some(MapSource::Encoded(encoded)) => Some(encoded),
            Some(MapSource::Text(text)) => match encode_source_map(&text) {
                Ok(encoded) => Some(encoded),
                Err(err) if !err.is_fatal() => {
                    warn!("{}: {}", url, err);
                    None
                }
                Err(err) => return Err(err),
            },
            None => None,
        };

        if let Some(encoded) = &encoded {
            body = strip_leading_newlines(&body, self.engine().function_header_lines()).to_string();
            body.push_str("\n//# sourceMappingURL=");
            body.push_str(SOURCE_MAP_DATA_URI);
            body.push_str(encoded);
        }

        let source = FunctionSource {
            parameters: self.inner().host.borrow().parameters(),
            body,
            display_name: display_name(url),
            filename,
        };
        let callable = self.engine().synthesize(source)?;

        Ok(Synthesized {
            callable,
            source_map: encoded,
        })
    }

    fn arguments_for(&self, unit: &Unit) -> Arguments {
        Arguments {
            environment: self.environment(),
            execute: self.executer_for(unit.reference_url()),
            import: self.importer_for(unit.reference_url()),
            extras: self.inner().host.borrow().values().to_vec(),
        }
    }
}
