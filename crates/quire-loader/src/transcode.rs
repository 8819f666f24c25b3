// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! UTF-16 to UTF-8 byte transcoding for source-map embedding
//!
//! Compilers that produce wide (UTF-16) source maps hand them to the loader
//! as code units. Before the map can be base64-encoded into a data URI it has
//! to become a byte sequence; [`utf16_to_utf8`] performs that step and
//! reports malformed input instead of emitting corrupted bytes.

use crate::compiler::SourceMapText;
use crate::error::{LoaderError, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

const SURROGATE_HIGH_START: u32 = 0xD800;
const SURROGATE_HIGH_END: u32 = 0xDBFF;
const SURROGATE_LOW_START: u32 = 0xDC00;
const SURROGATE_LOW_END: u32 = 0xDFFF;
const MAX_CODE_POINT: u32 = 0x10FFFF;

/// Convert UTF-16 code units into their UTF-8 byte representation.
///
/// ASCII passes through unchanged and valid surrogate pairs become 4-byte
/// sequences. A lone surrogate makes the whole input invalid and yields
/// `None`; a combined code point beyond U+10FFFF is replaced with U+FFFD.
pub fn utf16_to_utf8(source: &[u16]) -> Option<Vec<u8>> {
    let mut target = Vec::with_capacity(source.len());
    let mut units = source.iter().map(|&unit| u32::from(unit));

    while let Some(unit) = units.next() {
        if unit < 0x80 {
            target.push(unit as u8);
            continue;
        }

        let code_point = match unit {
            SURROGATE_HIGH_START..=SURROGATE_HIGH_END => match units.next() {
                Some(low @ SURROGATE_LOW_START..=SURROGATE_LOW_END) => {
                    ((unit - SURROGATE_HIGH_START) << 10) + (low - SURROGATE_LOW_START) + 0x10000
                }
                // illegal or missing second surrogate
                _ => return None,
            },
            // stray low surrogate
            SURROGATE_LOW_START..=SURROGATE_LOW_END => return None,
            _ => unit,
        };

        let ch = if code_point > MAX_CODE_POINT {
            char::REPLACEMENT_CHARACTER
        } else {
            char::from_u32(code_point)?
        };

        let mut buf = [0u8; 4];
        target.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
    }

    Some(target)
}

/// Base64-encode a compiler source map for a `data:` URI.
pub fn encode_source_map(map: &SourceMapText) -> Result<String> {
    match map {
        SourceMapText::Utf8(text) => Ok(BASE64.encode(text.as_bytes())),
        SourceMapText::Utf16(units) => utf16_to_utf8(units)
            .map(|bytes| BASE64.encode(bytes))
            .ok_or(LoaderError::Transcoding),
    }
}
