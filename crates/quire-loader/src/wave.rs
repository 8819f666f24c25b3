// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Barrier-synchronized transitive dependency loading
//!
//! A wave collects every unit discovered while resolving one load request.
//! Each unit adds its dependency count to `outstanding` when it joins; each
//! settled reference takes one away. Nothing is marked loaded and no
//! callback runs until the count reaches zero for the whole closure.

use crate::error::{LoaderError, Result};
use crate::loader::Loader;
use crate::operations::SearchThen;
use crate::unit::{LoadCallback, LoadStatus, Unit};
use std::rc::Rc;
use tracing::debug;

/// The single active batch of loading units
#[derive(Default)]
pub(crate) struct Wave {
    participants: Vec<Rc<Unit>>,
    outstanding: usize,
}

impl Wave {
    pub(crate) fn outstanding(&self) -> usize {
        self.outstanding
    }
}

impl Loader {
    /// Load the transitive dependencies of `unit`, then run `callback`.
    ///
    /// An already loaded unit runs the callback before returning. A unit
    /// that is part of the active wave queues it. An unloaded unit starts a
    /// new wave, which is only allowed when no other wave is active.
    pub fn load_file_dependencies(
        &self,
        unit: &Rc<Unit>,
        callback: Option<LoadCallback>,
    ) -> Result<()> {
        match unit.load_status() {
            LoadStatus::Loaded => match callback {
                Some(callback) => callback(),
                None => Ok(()),
            },
            LoadStatus::Loading => {
                if let Some(callback) = callback {
                    unit.push_callback(callback);
                }
                Ok(())
            }
            LoadStatus::Unloaded => {
                if self.is_wave_active() {
                    return Err(LoaderError::ReentrancyViolation(unit.url().to_string()));
                }
                if let Some(callback) = callback {
                    unit.push_callback(callback);
                }

                debug!("Starting wave at {}", unit.url());
                *self.inner().wave.borrow_mut() = Some(Wave::default());
                self.begin_loading(unit).map_err(|err| self.abort(err))
            }
        }
    }

    /// Add `unit` to the active wave and dispatch its dependencies.
    fn begin_loading(&self, unit: &Rc<Unit>) -> Result<()> {
        let dependencies = unit.file_dependencies();
        {
            let mut slot = self.inner().wave.borrow_mut();
            let Some(wave) = slot.as_mut() else {
                return Ok(());
            };
            wave.participants.push(unit.clone());
            wave.outstanding += dependencies.len();
        }
        unit.set_status(LoadStatus::Loading);

        let context = unit.reference_url().as_str();
        let searcher = self.searcher_for(unit.reference_url());

        for dependency in dependencies {
            let key = dependency.dedup_key(context);
            let fresh = self.inner().cache.borrow_mut().mark(&key);

            if !fresh {
                debug!("Skipping {}: already requested", key);
                if self.settle_one() == Some(0) {
                    self.close_wave()?;
                }
                continue;
            }

            searcher.search(dependency, Some(unit.url().clone()), SearchThen::Wave)?;
        }

        Ok(())
    }

    /// A wave search found `unit`.
    pub(crate) fn search_finished(&self, unit: Rc<Unit>) -> Result<()> {
        let remaining = self.settle_one();

        if unit.is_unloaded() {
            self.begin_loading(&unit)
        } else if remaining == Some(0) {
            self.close_wave()
        } else {
            Ok(())
        }
    }

    fn settle_one(&self) -> Option<usize> {
        let mut slot = self.inner().wave.borrow_mut();
        let wave = slot.as_mut()?;
        wave.outstanding = wave.outstanding.saturating_sub(1);
        Some(wave.outstanding)
    }

    /// Mark every participant loaded, then drain callbacks unit by unit.
    fn close_wave(&self) -> Result<()> {
        let wave = self.inner().wave.borrow_mut().take();
        let Some(wave) = wave else {
            return Ok(());
        };

        debug!("Closing wave with {} units", wave.participants.len());

        for unit in &wave.participants {
            unit.set_status(LoadStatus::Loaded);
        }

        for unit in &wave.participants {
            for callback in unit.take_callbacks() {
                callback()?;
            }
        }

        Ok(())
    }
}
