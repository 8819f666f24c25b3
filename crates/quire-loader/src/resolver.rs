// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Resource resolution

use crate::error::{LoaderError, Result};
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::debug;
use url::Url;

/// File name replacements applied before a local lookup
pub type FilenameTranslations = HashMap<String, String>;

/// A located resource and its contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Canonical URL of the resource
    pub url: Url,
    /// Text contents
    pub contents: String,
}

impl Resource {
    /// Create a resource
    pub fn new(url: Url, contents: impl Into<String>) -> Self {
        Self {
            url,
            contents: contents.into(),
        }
    }
}

/// Locates and reads resources.
///
/// Lookups are futures so a resolver can suspend on I/O. `Ok(None)` means
/// nothing exists at the requested location; the loader turns that into a
/// resolution failure with the context it knows about.
pub trait ResourceResolver {
    /// Resolve an absolute URL, applying `translations` to its file name
    fn resolve(
        &self,
        url: Url,
        translations: Rc<FilenameTranslations>,
    ) -> LocalBoxFuture<'static, Result<Option<Resource>>>;

    /// Resolve a locator against each include path in order
    fn resolve_searching_include_paths(
        &self,
        locator: String,
    ) -> LocalBoxFuture<'static, Result<Option<Resource>>>;

    /// Include paths searched for non-local references
    fn include_paths(&self) -> Vec<Url>;

    /// Start caching URL lookups. Calls nest.
    fn enable_url_caching(&self) {}

    /// Undo one [`enable_url_caching`](Self::enable_url_caching)
    fn disable_url_caching(&self) {}
}

/// Replace the last path segment of `url` if a translation exists for it
pub fn translate_filename(url: &Url, translations: &FilenameTranslations) -> Url {
    let name = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();

    match translations.get(name) {
        Some(replacement) => url.join(replacement).unwrap_or_else(|_| url.clone()),
        None => url.clone(),
    }
}

type ContentCache = Rc<RefCell<HashMap<PathBuf, String>>>;

/// Filesystem resolver backed by `tokio::fs`.
pub struct FileResolver {
    include_paths: Vec<Url>,
    caching: Cell<usize>,
    contents: ContentCache,
}

impl FileResolver {
    /// Create a resolver searching `include_paths` (made absolute)
    pub fn new<P: AsRef<Path>>(include_paths: impl IntoIterator<Item = P>) -> Result<Self> {
        let include_paths = include_paths
            .into_iter()
            .map(|path| directory_url(path.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            include_paths,
            caching: Cell::new(0),
            contents: Rc::new(RefCell::new(HashMap::new())),
        })
    }

    /// Whether URL caching is currently enabled
    pub fn is_caching(&self) -> bool {
        self.caching.get() > 0
    }

    /// Number of file contents currently cached
    pub fn cached_files(&self) -> usize {
        self.contents.borrow().len()
    }

    fn content_cache(&self) -> Option<ContentCache> {
        self.is_caching().then(|| self.contents.clone())
    }
}

impl ResourceResolver for FileResolver {
    fn resolve(
        &self,
        url: Url,
        translations: Rc<FilenameTranslations>,
    ) -> LocalBoxFuture<'static, Result<Option<Resource>>> {
        let url = translate_filename(&url, &translations);
        let cache = self.content_cache();
        read_resource(url, cache).boxed_local()
    }

    fn resolve_searching_include_paths(
        &self,
        locator: String,
    ) -> LocalBoxFuture<'static, Result<Option<Resource>>> {
        let candidates: Vec<Url> = self
            .include_paths
            .iter()
            .filter_map(|base| base.join(&locator).ok())
            .collect();
        let cache = self.content_cache();

        async move {
            for candidate in candidates {
                if let Some(resource) = read_resource(candidate, cache.clone()).await? {
                    return Ok(Some(resource));
                }
            }
            debug!("{} not found on include paths", locator);
            Ok(None)
        }
        .boxed_local()
    }

    fn include_paths(&self) -> Vec<Url> {
        self.include_paths.clone()
    }

    fn enable_url_caching(&self) {
        self.caching.set(self.caching.get() + 1);
    }

    fn disable_url_caching(&self) {
        let depth = self.caching.get().saturating_sub(1);
        self.caching.set(depth);
        if depth == 0 {
            self.contents.borrow_mut().clear();
        }
    }
}

/// Directory URL for a filesystem path, made absolute first
pub fn directory_url(path: &Path) -> Result<Url> {
    let absolute = std::path::absolute(path)?;
    Url::from_directory_path(&absolute).map_err(|_| LoaderError::InvalidPath(absolute))
}

/// File URL for a filesystem path, made absolute first
pub fn file_url(path: &Path) -> Result<Url> {
    let absolute = std::path::absolute(path)?;
    Url::from_file_path(&absolute).map_err(|_| LoaderError::InvalidPath(absolute))
}

async fn read_resource(url: Url, cache: Option<ContentCache>) -> Result<Option<Resource>> {
    let path = url
        .to_file_path()
        .map_err(|_| LoaderError::UnsupportedScheme(url.to_string()))?;

    let cached = cache
        .as_ref()
        .and_then(|cache| cache.borrow().get(&path).cloned());
    if let Some(contents) = cached {
        debug!("Cache hit for {}", path.display());
        return Ok(Some(Resource::new(url, contents)));
    }

    match tokio::fs::read_to_string(&path).await {
        Ok(contents) => {
            if let Some(cache) = cache {
                cache.borrow_mut().insert(path, contents.clone());
            }
            Ok(Some(Resource::new(url, contents)))
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}
