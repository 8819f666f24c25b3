// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Compiler diagnostic reporting

use crate::compiler::Compiler;
use crate::error::{LoaderError, Result};
use quick_xml::Writer;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::str::FromStr;

const PLIST_PROLOGUE: &str = concat!(
    "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
    "<!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" ",
    "\"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n",
);

/// Output format for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticFormat {
    /// One prettified line per diagnostic
    #[default]
    Plain,
    /// Apple XML property list
    Xml,
}

impl FromStr for DiagnosticFormat {
    type Err = LoaderError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "plain" => Ok(Self::Plain),
            "xml" => Ok(Self::Xml),
            other => Err(LoaderError::Config(format!(
                "unknown diagnostic format '{}'",
                other
            ))),
        }
    }
}

/// Write every diagnostic of `compiler` to `out`.
///
/// Returns whether any of them is an error.
pub fn report_diagnostics(
    compiler: &dyn Compiler,
    format: DiagnosticFormat,
    out: &mut dyn Write,
) -> Result<bool> {
    let diagnostics = compiler.diagnostics();
    let any_errors = diagnostics.iter().any(|d| d.is_error());

    match format {
        DiagnosticFormat::Plain => {
            for diagnostic in diagnostics {
                writeln!(out, "{}", compiler.prettify(diagnostic))?;
            }
        }
        DiagnosticFormat::Xml if !diagnostics.is_empty() => {
            out.write_all(&plist(compiler)?)?;
        }
        DiagnosticFormat::Xml => {}
    }

    Ok(any_errors)
}

fn plist(compiler: &dyn Compiler) -> Result<Vec<u8>> {
    let mut writer = Writer::new_with_indent(PLIST_PROLOGUE.as_bytes().to_vec(), b'\t', 1);

    let mut plist = BytesStart::new("plist");
    plist.push_attribute(("version", "1.0"));
    write(&mut writer, Event::Start(plist))?;
    write(&mut writer, Event::Start(BytesStart::new("array")))?;

    for diagnostic in compiler.diagnostics() {
        write(&mut writer, Event::Start(BytesStart::new("dict")))?;
        if let Some(line) = diagnostic.line {
            entry(&mut writer, "line", "integer", &line.to_string())?;
        }
        if let Some(source) = &diagnostic.source {
            entry(&mut writer, "sourcePath", "string", source.path())?;
        }
        entry(&mut writer, "message", "string", &compiler.prettify(diagnostic))?;
        write(&mut writer, Event::End(BytesEnd::new("dict")))?;
    }

    write(&mut writer, Event::End(BytesEnd::new("array")))?;
    write(&mut writer, Event::End(BytesEnd::new("plist")))?;

    let mut bytes = writer.into_inner();
    bytes.push(b'\n');
    Ok(bytes)
}

fn entry(writer: &mut Writer<Vec<u8>>, key: &str, kind: &str, value: &str) -> Result<()> {
    element(writer, "key", key)?;
    element(writer, kind, value)
}

fn element(writer: &mut Writer<Vec<u8>>, name: &str, text: &str) -> Result<()> {
    write(writer, Event::Start(BytesStart::new(name)))?;
    write(writer, Event::Text(BytesText::new(text)))?;
    write(writer, Event::End(BytesEnd::new(name)))
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|e| LoaderError::Diagnostics(e.to_string()))
}
