// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Marked-string bundle framing
//!
//! A marked string is a header followed by length-prefixed segments:
//!
//! ```text
//! @STATIC;1.0;i;6;util.jS;4;e30=t;16;source text here
//! ```
//!
//! Each segment is `<marker>;<length>;<payload>` where the length counts
//! UTF-16 code units of the payload.

use crate::dependency::DependencyReference;
use crate::error::{LoaderError, Result};

/// Header tag and format version
pub const HEADER: &str = "@STATIC;1.0;";
/// Quoted (local) import segment
pub const MARKER_IMPORT_LOCAL: &str = "i";
/// Search-path import segment
pub const MARKER_IMPORT_STD: &str = "I";
/// Base64 source map segment
pub const MARKER_SOURCE_MAP: &str = "S";
/// Source text segment
pub const MARKER_TEXT: &str = "t";

/// Frame a payload as a marked segment
pub fn segment(marker: &str, payload: &str) -> String {
    format!("{};{};{}", marker, payload.encode_utf16().count(), payload)
}

/// The decoded content of a marked string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkedString {
    /// Declared dependencies, in order
    pub dependencies: Vec<DependencyReference>,
    /// Base64-encoded source map, if any
    pub source_map: Option<String>,
    /// Source text
    pub text: String,
}

impl MarkedString {
    /// Whether `contents` starts with the marked-string header
    pub fn is_marked(contents: &str) -> bool {
        contents.starts_with(HEADER)
    }

    /// Parse a marked string.
    pub fn parse(input: &str) -> Result<Self> {
        let mut rest = input
            .strip_prefix(HEADER)
            .ok_or_else(|| LoaderError::malformed("missing @STATIC header"))?;

        let mut dependencies = Vec::new();
        let mut source_map = None;
        let mut text = None;

        while !rest.is_empty() {
            let (marker, after_marker) = split_field(rest, "marker")?;
            let (length, after_length) = split_field(after_marker, "length")?;
            let length: usize = length
                .parse()
                .map_err(|_| LoaderError::malformed(format!("invalid length '{}'", length)))?;
            let (payload, remaining) = take_utf16_units(after_length, length)?;

            match marker {
                MARKER_IMPORT_LOCAL => dependencies.push(DependencyReference::local(payload)),
                MARKER_IMPORT_STD => dependencies.push(DependencyReference::search_path(payload)),
                MARKER_SOURCE_MAP => source_map = Some(payload.to_string()),
                MARKER_TEXT => text = Some(payload.to_string()),
                other => {
                    return Err(LoaderError::malformed(format!("unknown marker '{}'", other)));
                }
            }

            rest = remaining;
        }

        let text = text.ok_or_else(|| LoaderError::malformed("missing text segment"))?;

        Ok(Self {
            dependencies,
            source_map,
            text,
        })
    }

    /// Serialize back to a marked string
    pub fn to_marked_string(&self) -> String {
        let mut out = String::from(HEADER);
        for dependency in &self.dependencies {
            out.push_str(&dependency.to_marked_string());
        }
        if let Some(map) = &self.source_map {
            out.push_str(&segment(MARKER_SOURCE_MAP, map));
        }
        out.push_str(&segment(MARKER_TEXT, &self.text));
        out
    }
}

fn split_field<'a>(input: &'a str, what: &str) -> Result<(&'a str, &'a str)> {
    input
        .split_once(';')
        .ok_or_else(|| LoaderError::malformed(format!("unterminated {}", what)))
}

/// Split off exactly `count` UTF-16 code units from the front of `input`.
fn take_utf16_units(input: &str, count: usize) -> Result<(&str, &str)> {
    let mut units = 0;
    for (index, ch) in input.char_indices() {
        if units == count {
            return Ok(input.split_at(index));
        }
        units += ch.len_utf16();
        if units > count {
            return Err(LoaderError::malformed("segment length splits a character"));
        }
    }
    if units == count {
        Ok((input, ""))
    } else {
        Err(LoaderError::malformed(format!(
            "segment truncated: expected {} units, found {}",
            count, units
        )))
    }
}
