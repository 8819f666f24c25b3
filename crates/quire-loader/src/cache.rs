// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Memoization tables for resolution and execution

use crate::operations::{Executer, Importer, Searcher};
use crate::unit::Unit;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use tracing::debug;
use url::Url;

/// Context-keyed operation tables plus resolved-dependency results.
///
/// Operation tables are keyed by the absolute reference-context URL string.
/// Results and dedup markers are keyed by [`DependencyReference::dedup_key`].
///
/// [`DependencyReference::dedup_key`]: crate::DependencyReference::dedup_key
#[derive(Default)]
pub struct ResolutionCache {
    searchers: HashMap<String, Rc<Searcher>>,
    importers: HashMap<String, Rc<Importer>>,
    executers: HashMap<String, Rc<Executer>>,
    results: HashMap<String, Rc<Unit>>,
    markers: HashSet<String>,
    units: HashMap<Url, Rc<Unit>>,
}

impl ResolutionCache {
    /// Create empty tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Searcher for `context`, created on first use
    pub fn searcher(&mut self, context: &Url, create: impl FnOnce() -> Searcher) -> Rc<Searcher> {
        self.searchers
            .entry(context.as_str().to_string())
            .or_insert_with(|| Rc::new(create()))
            .clone()
    }

    /// Importer for `context`, created on first use
    pub fn importer(&mut self, context: &Url, create: impl FnOnce() -> Importer) -> Rc<Importer> {
        self.importers
            .entry(context.as_str().to_string())
            .or_insert_with(|| Rc::new(create()))
            .clone()
    }

    /// Executer for `context`, created on first use
    pub fn executer(&mut self, context: &Url, create: impl FnOnce() -> Executer) -> Rc<Executer> {
        self.executers
            .entry(context.as_str().to_string())
            .or_insert_with(|| Rc::new(create()))
            .clone()
    }

    /// Previously resolved unit for a dedup key
    pub fn result(&self, key: &str) -> Option<Rc<Unit>> {
        self.results.get(key).cloned()
    }

    /// Record the unit a dedup key resolved to
    pub fn insert_result(&mut self, key: String, unit: Rc<Unit>) {
        self.results.insert(key, unit);
    }

    /// Mark a dedup key as seen. Returns false if it already was.
    pub fn mark(&mut self, key: &str) -> bool {
        if self.markers.contains(key) {
            return false;
        }
        self.markers.insert(key.to_string())
    }

    /// Whether a dedup key has been seen
    pub fn is_marked(&self, key: &str) -> bool {
        self.markers.contains(key)
    }

    /// Unit already created for a canonical URL
    pub fn unit(&self, url: &Url) -> Option<Rc<Unit>> {
        self.units.get(url).cloned()
    }

    /// Register the unit for its canonical URL
    pub fn insert_unit(&mut self, unit: Rc<Unit>) {
        self.units.insert(unit.url().clone(), unit);
    }

    /// Number of units created from resources
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Forget everything
    pub fn reset(&mut self) {
        debug!(
            "Resetting resolution cache ({} units, {} markers)",
            self.units.len(),
            self.markers.len()
        );
        self.searchers.clear();
        self.importers.clear();
        self.executers.clear();
        self.results.clear();
        self.markers.clear();
        self.units.clear();
    }
}
