// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Dependency references declared by units

use crate::marked::{self, MARKER_IMPORT_LOCAL, MARKER_IMPORT_STD};
use std::fmt;

/// A file dependency as written in a unit's source.
///
/// Local (quoted) references resolve against the referencing unit's
/// directory; search-path references resolve against the include paths.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencyReference {
    locator: String,
    is_local: bool,
}

impl DependencyReference {
    /// Create a reference
    pub fn new(locator: impl Into<String>, is_local: bool) -> Self {
        Self {
            locator: locator.into(),
            is_local,
        }
    }

    /// A quoted reference, relative to the referencing unit
    pub fn local(locator: impl Into<String>) -> Self {
        Self::new(locator, true)
    }

    /// A reference looked up on the include paths
    pub fn search_path(locator: impl Into<String>) -> Self {
        Self::new(locator, false)
    }

    /// The locator text
    pub fn locator(&self) -> &str {
        &self.locator
    }

    /// Whether the reference is context-sensitive
    pub fn is_local(&self) -> bool {
        self.is_local
    }

    /// Deduplication key for this reference seen from `context`.
    ///
    /// Only local references carry the context: the same relative path names
    /// different files from different directories, while a search-path
    /// reference names the same file no matter who asks.
    pub fn dedup_key(&self, context: &str) -> String {
        if self.is_local {
            format!("{} {}", context, self.locator)
        } else {
            self.locator.clone()
        }
    }

    /// Marked-string segment for this reference
    pub fn to_marked_string(&self) -> String {
        let marker = if self.is_local {
            MARKER_IMPORT_LOCAL
        } else {
            MARKER_IMPORT_STD
        };
        marked::segment(marker, &self.locator)
    }
}

impl fmt::Display for DependencyReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_local {
            write!(f, "\"{}\"", self.locator)
        } else {
            write!(f, "<{}>", self.locator)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_key_depends_on_context() {
        let util = DependencyReference::local("util.j");
        assert_eq!(util.dedup_key("file:///app/"), "file:///app/ util.j");
        assert_ne!(util.dedup_key("file:///app/"), util.dedup_key("file:///app/views/"));
    }

    #[test]
    fn test_search_path_key_is_context_free() {
        let foundation = DependencyReference::search_path("Foundation/Foundation.j");
        assert_eq!(foundation.dedup_key("file:///app/"), "Foundation/Foundation.j");
        assert_eq!(
            foundation.dedup_key("file:///app/"),
            foundation.dedup_key("file:///other/")
        );
    }

    #[test]
    fn test_marked_segment() {
        assert_eq!(DependencyReference::local("a.j").to_marked_string(), "i;3;a.j");
        assert_eq!(DependencyReference::search_path("b/c.j").to_marked_string(), "I;5;b/c.j");
    }

    #[test]
    fn test_display() {
        assert_eq!(DependencyReference::local("a.j").to_string(), "\"a.j\"");
        assert_eq!(DependencyReference::search_path("a.j").to_string(), "<a.j>");
    }
}
