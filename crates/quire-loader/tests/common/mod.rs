// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Shared fixtures: an in-memory resolver and a line-interpreting engine.

#![allow(dead_code)]

use futures::FutureExt;
use futures::future::{LocalBoxFuture, ready};
use quire_loader::resolver::translate_filename;
use quire_loader::{
    Arguments, Callable, DirectiveCompiler, FilenameTranslations, FunctionSource, Loader,
    LoaderError, Resource, ResourceResolver, Result, ScriptEngine, Value,
};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;
use url::Url;

/// Resolver serving files from memory. Lookups complete as soon as the
/// loader drives them.
#[derive(Default)]
pub struct ScriptedResolver {
    files: RefCell<HashMap<Url, String>>,
    include_paths: Vec<Url>,
    calls: RefCell<Vec<String>>,
    caching: Cell<usize>,
    max_caching: Cell<usize>,
}

impl ScriptedResolver {
    pub fn new(include_paths: &[&str]) -> Rc<Self> {
        Rc::new(Self {
            include_paths: include_paths.iter().map(|path| url(path)).collect(),
            ..Default::default()
        })
    }

    pub fn add(&self, location: &str, contents: &str) {
        self.files.borrow_mut().insert(url(location), contents.to_string());
    }

    /// Every lookup, as the URL or include-path locator requested
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn calls_for(&self, target: &str) -> usize {
        self.calls.borrow().iter().filter(|call| call.as_str() == target).count()
    }

    pub fn caching_depth(&self) -> usize {
        self.caching.get()
    }

    pub fn max_caching_depth(&self) -> usize {
        self.max_caching.get()
    }
}

impl ResourceResolver for ScriptedResolver {
    fn resolve(
        &self,
        url: Url,
        translations: Rc<FilenameTranslations>,
    ) -> LocalBoxFuture<'static, Result<Option<Resource>>> {
        let url = translate_filename(&url, &translations);
        self.calls.borrow_mut().push(url.to_string());
        let found = self
            .files
            .borrow()
            .get(&url)
            .map(|contents| Resource::new(url.clone(), contents.clone()));
        ready(Ok(found)).boxed_local()
    }

    fn resolve_searching_include_paths(
        &self,
        locator: String,
    ) -> LocalBoxFuture<'static, Result<Option<Resource>>> {
        self.calls.borrow_mut().push(locator.clone());
        let files = self.files.borrow();
        let found = self
            .include_paths
            .iter()
            .filter_map(|base| base.join(&locator).ok())
            .find_map(|candidate| {
                files
                    .get(&candidate)
                    .map(|contents| Resource::new(candidate.clone(), contents.clone()))
            });
        ready(Ok(found)).boxed_local()
    }

    fn include_paths(&self) -> Vec<Url> {
        self.include_paths.clone()
    }

    fn enable_url_caching(&self) {
        self.caching.set(self.caching.get() + 1);
        self.max_caching.set(self.max_caching.get().max(self.caching.get()));
    }

    fn disable_url_caching(&self) {
        self.caching.set(self.caching.get() - 1);
    }
}

/// Engine whose callables interpret one command per line:
///
/// - `exec "x"` / `exec <x>` runs a loaded dependency
/// - `import "x"` imports one, storing the result as global `imported x`
/// - `set name value` defines a global
/// - `return value` returns a string
/// - `extras` returns the host binding values
/// - `fail message` fails with an engine error
#[derive(Default)]
pub struct RecordingEngine {
    sources: RefCell<Vec<FunctionSource>>,
    log: Rc<RefCell<Vec<String>>>,
    header_lines: Option<usize>,
}

impl RecordingEngine {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn with_header_lines(lines: usize) -> Rc<Self> {
        Rc::new(Self {
            header_lines: Some(lines),
            ..Default::default()
        })
    }

    /// Display names of executed callables, in order
    pub fn executed(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    pub fn sources(&self) -> Vec<FunctionSource> {
        self.sources.borrow().clone()
    }

    pub fn source_named(&self, name: &str) -> FunctionSource {
        self.sources
            .borrow()
            .iter()
            .rev()
            .find(|source| source.display_name == name)
            .cloned()
            .unwrap_or_else(|| panic!("no function synthesized for {name}"))
    }
}

impl ScriptEngine for RecordingEngine {
    fn synthesize(&self, source: FunctionSource) -> Result<Callable> {
        self.sources.borrow_mut().push(source.clone());
        let log = self.log.clone();
        let name = source.display_name;
        let body = source.body;

        Ok(Callable::new(move |args| {
            log.borrow_mut().push(name.clone());
            interpret(&body, args)
        }))
    }

    fn function_header_lines(&self) -> usize {
        self.header_lines.unwrap_or(2)
    }
}

fn reference(operand: &str) -> Option<(String, bool)> {
    let operand = operand.trim();
    if let Some(quoted) = operand.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        Some((quoted.to_string(), true))
    } else {
        operand
            .strip_prefix('<')
            .and_then(|s| s.strip_suffix('>'))
            .map(|angled| (angled.to_string(), false))
    }
}

fn interpret(body: &str, args: &Arguments) -> Result<Value> {
    for line in body.lines() {
        let line = line.trim().trim_end_matches("/**/");
        let (command, operand) = line.split_once(' ').unwrap_or((line, ""));

        match command {
            "exec" => {
                if let Some((locator, is_local)) = reference(operand) {
                    args.execute.call(&locator, is_local)?;
                }
            }
            "import" => {
                if let Some((locator, is_local)) = reference(operand) {
                    let environment = args.environment.clone();
                    let key = format!("imported {}", locator);
                    args.import.call(
                        &locator,
                        is_local,
                        Some(Box::new(move |result: Result<Value>| {
                            let value = result.unwrap_or_else(|e| Value::String(format!("error: {e}")));
                            environment.set(key, value);
                        })),
                    )?;
                }
            }
            "set" => {
                let (name, value) = operand.split_once(' ').unwrap_or((operand, ""));
                args.environment.set(name, Value::from(value));
            }
            "return" => return Ok(Value::from(operand)),
            "extras" => return Ok(Value::Array(args.extras.clone())),
            "fail" => return Err(LoaderError::engine(operand)),
            _ => {}
        }
    }
    Ok(Value::Undefined)
}

/// Write sink that can be inspected after being handed to a loader
#[derive(Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).unwrap()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn url(location: &str) -> Url {
    Url::parse(location).unwrap()
}

/// A loader over `resolver` and `engine` with the directive compiler,
/// based at `file:///app/`
pub fn loader(resolver: &Rc<ScriptedResolver>, engine: &Rc<RecordingEngine>) -> Loader {
    Loader::builder(resolver.clone(), engine.clone())
        .compiler(Rc::new(DirectiveCompiler::new()))
        .base_url(url("file:///app/"))
        .diagnostic_output(Box::new(io::sink()))
        .build()
        .unwrap()
}
