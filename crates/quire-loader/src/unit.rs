// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Loadable units and their load-status state machine

use crate::compiler::Compiler;
use crate::dependency::DependencyReference;
use crate::engine::Callable;
use crate::error::{LoaderError, Result};
use crate::marked::{self, HEADER, MARKER_SOURCE_MAP, MARKER_TEXT};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use url::Url;

/// Callback queued until a unit's dependencies are loaded
pub type LoadCallback = Box<dyn FnOnce() -> Result<()>>;

/// Dependency load status. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LoadStatus {
    /// Dependencies not requested yet
    Unloaded,
    /// Part of the active wave
    Loading,
    /// The whole dependency closure is loaded
    Loaded,
}

/// Executable body of a unit
pub(crate) enum Body {
    /// Ready to invoke
    Ready(Callable),
    /// Waiting for the second compiler pass
    PendingCompilation(Box<dyn Compiler>),
    /// Second pass running further up the stack
    Compiling,
    /// Second pass reported errors
    Failed,
}

/// One loadable, executable source artifact identified by its URL.
pub struct Unit {
    url: Url,
    reference_url: Url,
    dependencies: Vec<DependencyReference>,
    status: Cell<LoadStatus>,
    callbacks: RefCell<VecDeque<LoadCallback>>,
    body: RefCell<Body>,
    code: RefCell<Option<String>>,
    source_map: RefCell<Option<String>>,
}

impl Unit {
    pub(crate) fn new(
        url: Url,
        dependencies: Vec<DependencyReference>,
        body: Body,
        code: Option<String>,
        source_map: Option<String>,
    ) -> Result<Self> {
        let reference_url = url.join(".")?;
        let status = if dependencies.is_empty() {
            LoadStatus::Loaded
        } else {
            LoadStatus::Unloaded
        };

        Ok(Self {
            url,
            reference_url,
            dependencies,
            status: Cell::new(status),
            callbacks: RefCell::new(VecDeque::new()),
            body: RefCell::new(body),
            code: RefCell::new(code),
            source_map: RefCell::new(source_map),
        })
    }

    /// Canonical URL
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Path component of the URL
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Directory against which local dependencies resolve
    pub fn reference_url(&self) -> &Url {
        &self.reference_url
    }

    /// Declared dependencies, in order
    pub fn file_dependencies(&self) -> &[DependencyReference] {
        &self.dependencies
    }

    /// Current load status
    pub fn load_status(&self) -> LoadStatus {
        self.status.get()
    }

    /// Whether the full dependency closure is loaded
    pub fn has_loaded_file_dependencies(&self) -> bool {
        self.status.get() == LoadStatus::Loaded
    }

    /// Whether loading has not been requested yet
    pub fn is_unloaded(&self) -> bool {
        self.status.get() == LoadStatus::Unloaded
    }

    /// Number of callbacks waiting for the load to finish
    pub fn pending_callbacks(&self) -> usize {
        self.callbacks.borrow().len()
    }

    /// Compiled code, once known
    pub fn code(&self) -> Option<String> {
        self.code.borrow().clone()
    }

    /// Base64 source map embedded with the code, if any
    pub fn source_map(&self) -> Option<String> {
        self.source_map.borrow().clone()
    }

    /// Whether a compiler is still attached
    pub fn needs_compilation(&self) -> bool {
        matches!(*self.body.borrow(), Body::PendingCompilation(_))
    }

    /// Serialize this unit as a marked string.
    ///
    /// Dependencies are written as reference segments; a reader resolves
    /// them again to rebuild the tree.
    pub fn to_marked_string(&self) -> Result<String> {
        let code = self
            .code()
            .ok_or_else(|| LoaderError::NotCompiled(self.url.to_string()))?;

        let mut out = String::from(HEADER);
        for dependency in &self.dependencies {
            out.push_str(&dependency.to_marked_string());
        }
        if let Some(map) = self.source_map() {
            out.push_str(&marked::segment(MARKER_SOURCE_MAP, &map));
        }
        out.push_str(&marked::segment(MARKER_TEXT, &code));
        Ok(out)
    }

    pub(crate) fn set_status(&self, status: LoadStatus) {
        debug_assert!(status >= self.status.get(), "load status regressed");
        self.status.set(status);
    }

    pub(crate) fn push_callback(&self, callback: LoadCallback) {
        self.callbacks.borrow_mut().push_back(callback);
    }

    pub(crate) fn take_callbacks(&self) -> VecDeque<LoadCallback> {
        std::mem::take(&mut *self.callbacks.borrow_mut())
    }

    /// Swap the body out, leaving `Compiling` behind for a pending compiler.
    pub(crate) fn checkout_body(&self) -> Body {
        let mut body = self.body.borrow_mut();
        match std::mem::replace(&mut *body, Body::Compiling) {
            Body::Ready(callable) => {
                *body = Body::Ready(callable.clone());
                Body::Ready(callable)
            }
            Body::Failed => {
                *body = Body::Failed;
                Body::Failed
            }
            other => other,
        }
    }

    pub(crate) fn set_body(&self, body: Body) {
        *self.body.borrow_mut() = body;
    }

    pub(crate) fn set_code(&self, code: String, source_map: Option<String>) {
        *self.code.borrow_mut() = Some(code);
        *self.source_map.borrow_mut() = source_map;
    }
}

impl fmt::Debug for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unit")
            .field("url", &self.url.as_str())
            .field("status", &self.status.get())
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn unit(url: &str, dependencies: Vec<DependencyReference>) -> Unit {
        let body = Body::Ready(Callable::new(|_| Ok(Value::Undefined)));
        Unit::new(Url::parse(url).unwrap(), dependencies, body, Some("code".into()), None).unwrap()
    }

    #[test]
    fn test_no_dependencies_starts_loaded() {
        let leaf = unit("file:///app/leaf.j", vec![]);
        assert_eq!(leaf.load_status(), LoadStatus::Loaded);
        assert!(leaf.has_loaded_file_dependencies());
    }

    #[test]
    fn test_with_dependencies_starts_unloaded() {
        let main = unit("file:///app/main.j", vec![DependencyReference::local("a.j")]);
        assert!(main.is_unloaded());
        assert_eq!(main.pending_callbacks(), 0);
    }

    #[test]
    fn test_reference_url_is_directory() {
        let main = unit("file:///app/views/main.j", vec![]);
        assert_eq!(main.reference_url().as_str(), "file:///app/views/");
        assert_eq!(main.path(), "/app/views/main.j");
    }

    #[test]
    fn test_callbacks_drain_in_order() {
        let main = unit("file:///app/main.j", vec![DependencyReference::local("a.j")]);
        let order = std::rc::Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let order = order.clone();
            main.push_callback(Box::new(move || {
                order.borrow_mut().push(i);
                Ok(())
            }));
        }
        for callback in main.take_callbacks() {
            callback().unwrap();
        }
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
        assert_eq!(main.pending_callbacks(), 0);
    }

    #[test]
    fn test_marked_string() {
        let main = unit(
            "file:///app/main.j",
            vec![
                DependencyReference::local("util.j"),
                DependencyReference::search_path("Foundation/Foundation.j"),
            ],
        );
        main.set_code("run();".into(), Some("e30=".into()));
        assert_eq!(
            main.to_marked_string().unwrap(),
            "@STATIC;1.0;i;6;util.jI;23;Foundation/Foundation.jS;4;e30=t;6;run();"
        );
    }

    #[test]
    fn test_marked_string_requires_code() {
        let body = Body::Ready(Callable::new(|_| Ok(Value::Undefined)));
        let native = Unit::new(Url::parse("file:///n.j").unwrap(), vec![], body, None, None).unwrap();
        assert!(matches!(native.to_marked_string(), Err(LoaderError::NotCompiled(_))));
    }
}
