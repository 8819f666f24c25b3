// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Context-bound search, import and execute operations
//!
//! Each operation is bound to one reference context (a directory URL) and
//! memoized per context by the [`ResolutionCache`](crate::ResolutionCache).

use crate::dependency::DependencyReference;
use crate::error::{LoaderError, Result};
use crate::loader::{Loader, WeakLoader};
use crate::resolver::{FilenameTranslations, Resource, ResourceResolver};
use crate::unit::Unit;
use crate::value::Value;
use futures::FutureExt;
use std::rc::Rc;
use tracing::debug;
use url::Url;

/// Continuation invoked with the result of an import
pub type ImportCallback = Box<dyn FnOnce(Result<Value>)>;

/// Keeps resolver URL caching enabled while alive.
pub struct UrlCachingGuard {
    resolver: Rc<dyn ResourceResolver>,
}

impl UrlCachingGuard {
    /// Enable caching until the guard is dropped
    pub fn acquire(resolver: Rc<dyn ResourceResolver>) -> Self {
        resolver.enable_url_caching();
        Self { resolver }
    }
}

impl Drop for UrlCachingGuard {
    fn drop(&mut self) {
        self.resolver.disable_url_caching();
    }
}

/// An import waiting for its target to be found
pub(crate) struct PendingImport {
    pub(crate) guard: UrlCachingGuard,
    pub(crate) callback: Option<ImportCallback>,
}

/// What to do with a unit once a search finds it
pub(crate) enum SearchThen {
    /// Continue the active wave
    Wave,
    /// Load, execute and report to the importer's callback
    Import(PendingImport),
}

/// A finished resolver lookup, queued for the loader's driver
pub(crate) struct SearchCompletion {
    pub(crate) key: String,
    pub(crate) locator: String,
    pub(crate) origin: Option<Url>,
    pub(crate) then: SearchThen,
    pub(crate) outcome: Result<Option<Resource>>,
}

/// Resolves dependency references to units.
pub struct Searcher {
    context: Url,
    translations: Rc<FilenameTranslations>,
    loader: WeakLoader,
}

impl Searcher {
    pub(crate) fn new(context: Url, translations: Rc<FilenameTranslations>, loader: WeakLoader) -> Self {
        Self {
            context,
            translations,
            loader,
        }
    }

    /// Reference context this searcher resolves against
    pub fn context(&self) -> &Url {
        &self.context
    }

    /// Filename translations captured when the searcher was created
    pub fn translations(&self) -> &FilenameTranslations {
        &self.translations
    }

    /// Look up `reference`.
    ///
    /// A previously resolved reference completes before this returns.
    /// Otherwise a lookup is queued and completes when the loader is driven.
    /// `origin` names the file that needed the reference, for error messages.
    pub(crate) fn search(
        &self,
        reference: &DependencyReference,
        origin: Option<Url>,
        then: SearchThen,
    ) -> Result<()> {
        let loader = self.loader.upgrade()?;
        let key = reference.dedup_key(self.context.as_str());

        let cached = loader.cached_result(&key);
        if let Some(unit) = cached {
            debug!("Cache hit for {}", key);
            return loader.continue_search(unit, then);
        }

        let locator = reference.locator().to_string();
        let is_absolute = Url::parse(&locator).is_ok();
        let lookup = if reference.is_local() || is_absolute {
            let url = self.context.join(&locator)?;
            loader.resolver().resolve(url, self.translations.clone())
        } else {
            loader
                .resolver()
                .resolve_searching_include_paths(locator.clone())
        };

        debug!("Searching for {} from {}", reference, self.context);
        loader.enqueue(
            lookup
                .map(move |outcome| SearchCompletion {
                    key,
                    locator,
                    origin,
                    then,
                    outcome,
                })
                .boxed_local(),
        );
        Ok(())
    }
}

/// The synchronous execute primitive handed to running code.
pub struct Executer {
    context: Url,
    loader: WeakLoader,
}

impl Executer {
    pub(crate) fn new(context: Url, loader: WeakLoader) -> Self {
        Self { context, loader }
    }

    /// Reference context this executer resolves against
    pub fn context(&self) -> &Url {
        &self.context
    }

    /// Execute an already-loaded dependency and return its result
    pub fn call(&self, locator: &str, is_local: bool) -> Result<Value> {
        let loader = self.loader.upgrade()?;
        let key = DependencyReference::new(locator, is_local).dedup_key(self.context.as_str());

        match loader.cached_result(&key) {
            Some(unit) if unit.has_loaded_file_dependencies() => loader.execute(&unit),
            _ => Err(LoaderError::PrematureExecution(locator.to_string())),
        }
    }
}

/// The asynchronous import primitive handed to running code.
pub struct Importer {
    context: Url,
    loader: WeakLoader,
}

impl Importer {
    pub(crate) fn new(context: Url, loader: WeakLoader) -> Self {
        Self { context, loader }
    }

    /// Reference context this importer resolves against
    pub fn context(&self) -> &Url {
        &self.context
    }

    /// Find, load and execute a dependency, then hand its result to
    /// `callback`.
    ///
    /// Without a callback, an execution error is returned from whichever
    /// call ends up running the unit instead.
    pub fn call(&self, locator: &str, is_local: bool, callback: Option<ImportCallback>) -> Result<()> {
        let loader = self.loader.upgrade()?;
        let guard = UrlCachingGuard::acquire(loader.resolver());
        let searcher = loader.searcher_for(&self.context);
        let origin = loader.currently_compiling().map(|unit| unit.url().clone());

        searcher.search(
            &DependencyReference::new(locator, is_local),
            origin,
            SearchThen::Import(PendingImport { guard, callback }),
        )
    }
}

impl Loader {
    /// Load a found unit's dependencies, then execute it for a pending import
    pub(crate) fn finish_import(&self, unit: Rc<Unit>, pending: PendingImport) -> Result<()> {
        let weak = self.downgrade();
        let target = unit.clone();
        let PendingImport { guard, callback } = pending;

        self.load_file_dependencies(
            &unit,
            Some(Box::new(move || {
                let loader = weak.upgrade()?;
                let result = loader.execute(&target);
                drop(guard);
                match callback {
                    Some(callback) => {
                        callback(result);
                        Ok(())
                    }
                    None => result.map(|_| ()),
                }
            })),
        )
    }
}
