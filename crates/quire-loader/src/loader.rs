// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The loader: caches, the active wave and the search driver
//!
//! All state lives behind a single-threaded [`Loader`] handle. Resolver
//! lookups are the only suspension point; they are queued as futures and
//! completed by [`Loader::run_until_idle`].

use crate::cache::ResolutionCache;
use crate::compiler::{CompilerFactory, FirstPass};
use crate::config::LoaderConfig;
use crate::dependency::DependencyReference;
use crate::engine::{Callable, HostBindings, ScriptEngine};
use crate::error::{LoaderError, Result};
use crate::marked::MarkedString;
use crate::operations::{
    Executer, ImportCallback, Importer, SearchCompletion, SearchThen, Searcher,
};
use crate::pipeline::MapSource;
use crate::resolver::{FilenameTranslations, Resource, ResourceResolver, file_url};
use crate::unit::{Body, Unit};
use crate::value::{Environment, Value};
use crate::wave::Wave;
use futures::StreamExt;
use futures::future::{LocalBoxFuture, poll_fn};
use futures::stream::FuturesUnordered;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;
use std::rc::{Rc, Weak};
use std::task::Poll;
use tracing::{debug, error};
use url::Url;

type InFlight = FuturesUnordered<LocalBoxFuture<'static, SearchCompletion>>;

pub(crate) struct LoaderInner {
    resolver: Rc<dyn ResourceResolver>,
    engine: Rc<dyn ScriptEngine>,
    compiler: Option<Rc<dyn CompilerFactory>>,
    config: LoaderConfig,
    base_url: Url,
    environment: Environment,
    pub(crate) cache: RefCell<ResolutionCache>,
    pub(crate) wave: RefCell<Option<Wave>>,
    in_flight: RefCell<InFlight>,
    pub(crate) executing: RefCell<Option<Rc<Unit>>>,
    pub(crate) compiling: RefCell<Option<Rc<Unit>>>,
    pub(crate) host: RefCell<HostBindings>,
    translations: RefCell<Rc<FilenameTranslations>>,
    pub(crate) diagnostics: RefCell<Box<dyn Write>>,
    anonymous_count: Cell<usize>,
}

/// Handle to a loader. Clones share state.
#[derive(Clone)]
pub struct Loader {
    inner: Rc<LoaderInner>,
}

/// Non-owning loader handle held by bound operations
#[derive(Clone)]
pub struct WeakLoader {
    inner: Weak<LoaderInner>,
}

impl WeakLoader {
    /// Recover the loader, failing if it has been dropped
    pub fn upgrade(&self) -> Result<Loader> {
        self.inner
            .upgrade()
            .map(|inner| Loader { inner })
            .ok_or(LoaderError::Detached)
    }
}

/// Builder for [`Loader`]
pub struct LoaderBuilder {
    resolver: Rc<dyn ResourceResolver>,
    engine: Rc<dyn ScriptEngine>,
    compiler: Option<Rc<dyn CompilerFactory>>,
    config: LoaderConfig,
    base_url: Option<Url>,
    environment: Environment,
    diagnostics: Box<dyn Write>,
}

impl LoaderBuilder {
    /// Compile resources with `factory`
    pub fn compiler(mut self, factory: Rc<dyn CompilerFactory>) -> Self {
        self.compiler = Some(factory);
        self
    }

    /// Use `config`
    pub fn config(mut self, config: LoaderConfig) -> Self {
        self.config = config;
        self
    }

    /// URL that anonymous units and top-level imports resolve against
    pub fn base_url(mut self, url: Url) -> Self {
        self.base_url = Some(url);
        self
    }

    /// Global scope handed to executing units
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Where compiler diagnostics are written (stderr by default)
    pub fn diagnostic_output(mut self, out: Box<dyn Write>) -> Self {
        self.diagnostics = out;
        self
    }

    /// Build the loader
    pub fn build(self) -> Result<Loader> {
        let base_url = match self.base_url {
            Some(url) => url,
            None => {
                let cwd = std::env::current_dir()?;
                Url::from_directory_path(&cwd).map_err(|_| LoaderError::InvalidPath(cwd))?
            }
        };
        let translations = Rc::new(self.config.filename_translations.clone());

        Ok(Loader {
            inner: Rc::new(LoaderInner {
                resolver: self.resolver,
                engine: self.engine,
                compiler: self.compiler,
                config: self.config,
                base_url,
                environment: self.environment,
                cache: RefCell::new(ResolutionCache::new()),
                wave: RefCell::new(None),
                in_flight: RefCell::new(FuturesUnordered::new()),
                executing: RefCell::new(None),
                compiling: RefCell::new(None),
                host: RefCell::new(HostBindings::default()),
                translations: RefCell::new(translations),
                diagnostics: RefCell::new(self.diagnostics),
                anonymous_count: Cell::new(0),
            }),
        })
    }
}

impl Loader {
    /// Start building a loader around a resolver and an engine
    pub fn builder(
        resolver: Rc<dyn ResourceResolver>,
        engine: Rc<dyn ScriptEngine>,
    ) -> LoaderBuilder {
        LoaderBuilder {
            resolver,
            engine,
            compiler: None,
            config: LoaderConfig::default(),
            base_url: None,
            environment: Environment::new(),
            diagnostics: Box::new(std::io::stderr()),
        }
    }

    pub(crate) fn inner(&self) -> &LoaderInner {
        &self.inner
    }

    /// Non-owning handle
    pub fn downgrade(&self) -> WeakLoader {
        WeakLoader {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// The resource resolver
    pub fn resolver(&self) -> Rc<dyn ResourceResolver> {
        self.inner.resolver.clone()
    }

    /// The script engine
    pub fn engine(&self) -> Rc<dyn ScriptEngine> {
        self.inner.engine.clone()
    }

    /// Configuration the loader was built with
    pub fn config(&self) -> &LoaderConfig {
        &self.inner.config
    }

    /// Base URL for anonymous units and top-level imports
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// The global scope
    pub fn environment(&self) -> Environment {
        self.inner.environment.clone()
    }

    /// Unit whose callable is running, if any
    pub fn currently_executing(&self) -> Option<Rc<Unit>> {
        self.inner.executing.borrow().clone()
    }

    /// Unit whose second compiler pass is in progress, if any
    pub fn currently_compiling(&self) -> Option<Rc<Unit>> {
        self.inner.compiling.borrow().clone()
    }

    /// Whether a wave is active
    pub fn is_wave_active(&self) -> bool {
        self.inner.wave.borrow().is_some()
    }

    /// Unsettled references in the active wave
    pub fn outstanding(&self) -> usize {
        self.inner
            .wave
            .borrow()
            .as_ref()
            .map_or(0, |wave| wave.outstanding())
    }

    /// Number of resolver lookups waiting to be driven
    pub fn pending_searches(&self) -> usize {
        self.inner.in_flight.borrow().len()
    }

    /// Extra parameters appended to every synthesized function
    pub fn set_host_bindings(&self, bindings: HostBindings) {
        *self.inner.host.borrow_mut() = bindings;
    }

    /// Filename translations for searchers created from now on
    pub fn set_filename_translations(&self, translations: FilenameTranslations) {
        *self.inner.translations.borrow_mut() = Rc::new(translations);
    }

    /// Redirect compiler diagnostics
    pub fn set_diagnostic_output(&self, out: Box<dyn Write>) {
        *self.inner.diagnostics.borrow_mut() = out;
    }

    /// Searcher bound to `context`
    pub fn searcher_for(&self, context: &Url) -> Rc<Searcher> {
        let translations = self.inner.translations.borrow().clone();
        let loader = self.downgrade();
        self.inner
            .cache
            .borrow_mut()
            .searcher(context, || Searcher::new(context.clone(), translations, loader))
    }

    /// Importer bound to `context`
    pub fn importer_for(&self, context: &Url) -> Rc<Importer> {
        let loader = self.downgrade();
        self.inner
            .cache
            .borrow_mut()
            .importer(context, || Importer::new(context.clone(), loader))
    }

    /// Executer bound to `context`
    pub fn executer_for(&self, context: &Url) -> Rc<Executer> {
        let loader = self.downgrade();
        self.inner
            .cache
            .borrow_mut()
            .executer(context, || Executer::new(context.clone(), loader))
    }

    /// Forget every cached operation, result, dedup marker and unit
    pub fn reset_cached_searchers(&self) {
        self.inner.cache.borrow_mut().reset();
    }

    /// Unit already created for `url`, if any
    pub fn cached_unit(&self, url: &Url) -> Option<Rc<Unit>> {
        self.inner.cache.borrow().unit(url)
    }

    pub(crate) fn cached_result(&self, key: &str) -> Option<Rc<Unit>> {
        self.inner.cache.borrow().result(key)
    }

    /// Unit for `code`, named `url` or an anonymous URL.
    pub fn unit_from_source(
        &self,
        url: Option<Url>,
        code: impl Into<String>,
        dependencies: Vec<DependencyReference>,
    ) -> Result<Rc<Unit>> {
        let url = self.url_or_anonymous(url)?;
        self.unit_with_code(url, code.into(), dependencies, None)
    }

    /// Unit wrapping an existing callable
    pub fn unit_from_function(
        &self,
        url: Option<Url>,
        callable: Callable,
        dependencies: Vec<DependencyReference>,
    ) -> Result<Rc<Unit>> {
        let url = self.url_or_anonymous(url)?;
        Ok(Rc::new(Unit::new(
            url,
            dependencies,
            Body::Ready(callable),
            None,
            None,
        )?))
    }

    /// The unit for a resolved resource, created once per URL.
    ///
    /// Marked strings are decoded as precompiled bundles. Anything else goes
    /// through pass 1 of the compiler, or is taken as plain code when the
    /// loader has no compiler.
    pub fn unit_for_resource(&self, resource: Resource) -> Result<Rc<Unit>> {
        let existing = self.inner.cache.borrow().unit(&resource.url);
        if let Some(unit) = existing {
            return Ok(unit);
        }

        let Resource { url, contents } = resource;
        let unit = if MarkedString::is_marked(&contents) {
            let bundle = MarkedString::parse(&contents)?;
            let map = bundle.source_map.map(MapSource::Encoded);
            self.unit_with_code(url, bundle.text, bundle.dependencies, map)?
        } else if let Some(factory) = &self.inner.compiler {
            let FirstPass {
                dependencies,
                compiler,
            } = factory.compile_pass1(&contents, &url)?;
            Rc::new(Unit::new(
                url,
                dependencies,
                Body::PendingCompilation(compiler),
                None,
                None,
            )?)
        } else {
            self.unit_with_code(url, contents, Vec::new(), None)?
        };

        debug!("Created unit for {}", unit.url());
        self.inner.cache.borrow_mut().insert_unit(unit.clone());
        Ok(unit)
    }

    fn unit_with_code(
        &self,
        url: Url,
        code: String,
        dependencies: Vec<DependencyReference>,
        map: Option<MapSource>,
    ) -> Result<Rc<Unit>> {
        let synthesized = self.synthesize(&url, &code, map)?;
        Ok(Rc::new(Unit::new(
            url,
            dependencies,
            Body::Ready(synthesized.callable),
            Some(code),
            synthesized.source_map,
        )?))
    }

    fn url_or_anonymous(&self, url: Option<Url>) -> Result<Url> {
        match url {
            Some(url) => Ok(url),
            None => {
                let count = self.inner.anonymous_count.get();
                self.inner.anonymous_count.set(count + 1);
                Ok(self.inner.base_url.join(&format!("(Anonymous{})", count))?)
            }
        }
    }

    /// Resolve `url` and return its unit
    pub async fn open(&self, url: Url) -> Result<Rc<Unit>> {
        let existing = self.inner.cache.borrow().unit(&url);
        if let Some(unit) = existing {
            return Ok(unit);
        }

        let translations = self.inner.translations.borrow().clone();
        let lookup = self.inner.resolver.resolve(url.clone(), translations);
        match lookup.await? {
            Some(resource) => self.unit_for_resource(resource),
            None => Err(self.resolution_failure(url.to_string(), None)),
        }
    }

    /// Resolve a filesystem path and return its unit
    pub async fn open_path(&self, path: &Path) -> Result<Rc<Unit>> {
        self.open(file_url(path)?).await
    }

    /// Load the dependency closure of `unit` and wait for it.
    ///
    /// Fails if the unit is still not loaded once every lookup has been
    /// driven, which happens to units left `Loading` by an aborted wave.
    pub async fn load(&self, unit: &Rc<Unit>) -> Result<()> {
        self.load_file_dependencies(unit, None)?;
        self.run_until_idle().await?;

        if !unit.has_loaded_file_dependencies() && !self.is_wave_active() {
            return Err(LoaderError::IncompleteLoad(unit.url().to_string()));
        }
        Ok(())
    }

    /// Load `unit`, then execute it
    pub async fn run(&self, unit: &Rc<Unit>) -> Result<Value> {
        self.load(unit).await?;
        self.execute(unit)
    }

    /// Import relative to the base URL, as top-level code would
    pub fn import(
        &self,
        locator: &str,
        is_local: bool,
        callback: Option<ImportCallback>,
    ) -> Result<()> {
        self.importer_for(&self.inner.base_url)
            .call(locator, is_local, callback)
    }

    /// `unit` and everything it depends on, dependencies first.
    ///
    /// Only references resolved so far are followed; call after loading.
    pub fn dependency_closure(&self, unit: &Rc<Unit>) -> Vec<Rc<Unit>> {
        let mut seen = HashSet::new();
        let mut order = Vec::new();
        self.visit(unit, &mut seen, &mut order);
        order
    }

    fn visit(&self, unit: &Rc<Unit>, seen: &mut HashSet<Url>, order: &mut Vec<Rc<Unit>>) {
        if !seen.insert(unit.url().clone()) {
            return;
        }
        let context = unit.reference_url().as_str();
        for dependency in unit.file_dependencies() {
            if let Some(target) = self.cached_result(&dependency.dedup_key(context)) {
                self.visit(&target, seen, order);
            }
        }
        order.push(unit.clone());
    }

    /// Drive queued lookups until none remain.
    ///
    /// The first fatal error aborts the active wave, drops every queued
    /// lookup and is returned.
    pub async fn run_until_idle(&self) -> Result<()> {
        loop {
            let next = poll_fn(|cx| {
                let mut in_flight = self.inner.in_flight.borrow_mut();
                if in_flight.is_empty() {
                    Poll::Ready(None)
                } else {
                    in_flight.poll_next_unpin(cx)
                }
            })
            .await;

            let Some(completion) = next else {
                return Ok(());
            };
            if let Err(err) = self.complete_search(completion) {
                return Err(self.abort(err));
            }
        }
    }

    pub(crate) fn enqueue(&self, lookup: LocalBoxFuture<'static, SearchCompletion>) {
        self.inner.in_flight.borrow_mut().push(lookup);
    }

    fn complete_search(&self, completion: SearchCompletion) -> Result<()> {
        let SearchCompletion {
            key,
            locator,
            origin,
            then,
            outcome,
        } = completion;

        let Some(resource) = outcome? else {
            return Err(self.resolution_failure(locator, origin));
        };

        let unit = self.unit_for_resource(resource)?;
        self.inner.cache.borrow_mut().insert_result(key, unit.clone());
        self.continue_search(unit, then)
    }

    pub(crate) fn continue_search(&self, unit: Rc<Unit>, then: SearchThen) -> Result<()> {
        match then {
            SearchThen::Wave => self.search_finished(unit),
            SearchThen::Import(pending) => self.finish_import(unit, pending),
        }
    }

    fn resolution_failure(&self, locator: String, origin: Option<Url>) -> LoaderError {
        LoaderError::ResolutionFailure {
            locator,
            compiling: origin.map(String::from),
            include_paths: self
                .inner
                .resolver
                .include_paths()
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }

    /// Drop the active wave and queued lookups after a fatal error
    pub(crate) fn abort(&self, err: LoaderError) -> LoaderError {
        let wave = self.inner.wave.borrow_mut().take();
        let in_flight = std::mem::take(&mut *self.inner.in_flight.borrow_mut());

        if wave.is_some() || !in_flight.is_empty() {
            error!("{}", err);
            debug!("Dropped {} pending lookups", in_flight.len());
        }
        err
    }
}
