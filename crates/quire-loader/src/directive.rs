// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Line-oriented `@import` directive compiler
//!
//! Recognizes two directive forms, one per line:
//!
//! ```text
//! @import "views/Toolbar.j";        // local, relative to the file
//! @import <Foundation/Foundation.j>  // searched on the include paths
//! ```
//!
//! Pass 2 blanks the directive lines so line numbers in the output match the
//! input, and prefixes [`PREAMBLE`].

use crate::compiler::{
    CompiledOutput, Compiler, CompilerFactory, Diagnostic, FirstPass, SourceMapText,
};
use crate::dependency::DependencyReference;
use crate::error::Result;
use regex::Regex;
use serde_json::json;
use std::sync::LazyLock;
use url::Url;

/// Text placed before every compiled body
pub const PREAMBLE: &str = "\n\n";

const DIRECTIVE: &str = "@import";

static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*@import\s*(?:"([^"]*)"|<([^>]*)>)\s*;?\s*(?://.*)?$"#).unwrap()
});

/// Factory for [`DirectiveUnitCompiler`]s
#[derive(Debug, Clone)]
pub struct DirectiveCompiler {
    source_maps: bool,
}

impl Default for DirectiveCompiler {
    fn default() -> Self {
        Self { source_maps: true }
    }
}

impl DirectiveCompiler {
    /// Create a compiler that emits source maps
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle source map generation
    pub fn with_source_maps(mut self, enabled: bool) -> Self {
        self.source_maps = enabled;
        self
    }
}

impl CompilerFactory for DirectiveCompiler {
    fn compile_pass1(&self, source: &str, url: &Url) -> Result<FirstPass> {
        let mut dependencies = Vec::new();
        let mut diagnostics = Vec::new();
        let mut lines = Vec::new();

        for (index, line) in source.lines().enumerate() {
            let line_number = index as u32 + 1;

            if !line.trim_start().starts_with(DIRECTIVE) {
                lines.push(line.to_string());
                continue;
            }
            lines.push(String::new());

            let Some(captures) = IMPORT_RE.captures(line) else {
                diagnostics.push(
                    Diagnostic::error(format!("malformed directive: {}", line.trim()))
                        .at(url, line_number),
                );
                continue;
            };

            let (locator, is_local) = match (captures.get(1), captures.get(2)) {
                (Some(quoted), _) => (quoted.as_str(), true),
                (None, Some(angled)) => (angled.as_str(), false),
                (None, None) => continue,
            };

            if locator.trim().is_empty() {
                diagnostics.push(Diagnostic::warning("empty import ignored").at(url, line_number));
                continue;
            }

            dependencies.push(DependencyReference::new(locator.trim(), is_local));
        }

        Ok(FirstPass {
            dependencies,
            compiler: Box::new(DirectiveUnitCompiler {
                url: url.clone(),
                lines,
                diagnostics,
                imports: Vec::new(),
                source_maps: self.source_maps,
            }),
        })
    }
}

/// Pass-2 state for one file
#[derive(Debug)]
pub struct DirectiveUnitCompiler {
    url: Url,
    lines: Vec<String>,
    diagnostics: Vec<Diagnostic>,
    imports: Vec<String>,
    source_maps: bool,
}

impl DirectiveUnitCompiler {
    /// Import contexts currently entered
    pub fn import_stack(&self) -> &[String] {
        &self.imports
    }

    fn source_map(&self) -> SourceMapText {
        // each output line maps to column 0 of the matching input line
        let mut mappings = ";".repeat(PREAMBLE.len());
        for index in 0..self.lines.len() {
            mappings.push_str(if index == 0 { "AAAA" } else { ";AACA" });
        }

        let file = self
            .url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default();
        let map = json!({
            "version": 3,
            "file": file,
            "sources": [self.url.as_str()],
            "names": [],
            "mappings": mappings,
        });
        SourceMapText::Utf16(map.to_string().encode_utf16().collect())
    }
}

impl Compiler for DirectiveUnitCompiler {
    fn push_import(&mut self, name: &str) {
        self.imports.push(name.to_string());
    }

    fn pop_import(&mut self) {
        self.imports.pop();
    }

    fn compile_pass2(&mut self) -> CompiledOutput {
        if !self.imports.is_empty() {
            self.diagnostics.push(Diagnostic::warning(format!(
                "unbalanced import context: {}",
                self.imports.join(" > ")
            )));
        }

        let code = format!("{}{}", PREAMBLE, self.lines.join("\n"));
        let source_map = self.source_maps.then(|| self.source_map());

        CompiledOutput { code, source_map }
    }

    fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::Severity;

    fn pass1(source: &str) -> FirstPass {
        let url = Url::parse("file:///app/main.j").unwrap();
        DirectiveCompiler::new().compile_pass1(source, &url).unwrap()
    }

    #[test]
    fn test_collects_dependencies_in_order() {
        let first = pass1(
            "@import <Foundation/Foundation.j>\n\
             @import \"views/Toolbar.j\";\n\
             main();",
        );
        assert_eq!(
            first.dependencies,
            vec![
                DependencyReference::search_path("Foundation/Foundation.j"),
                DependencyReference::local("views/Toolbar.j"),
            ]
        );
        assert!(first.compiler.diagnostics().is_empty());
    }

    #[test]
    fn test_directive_with_trailing_comment() {
        let first = pass1("  @import \"a.j\"; // the widget\n");
        assert_eq!(first.dependencies, vec![DependencyReference::local("a.j")]);
    }

    #[test]
    fn test_pass2_blanks_directives_and_keeps_lines() {
        let mut first = pass1("@import \"a.j\"\nrun();\n@import <b.j>\nstop();");
        let output = first.compiler.compile_pass2();
        assert_eq!(output.code, "\n\n\nrun();\n\nstop();");
    }

    #[test]
    fn test_malformed_directive_is_error() {
        let first = pass1("@import a.j\nrun();");
        assert!(first.dependencies.is_empty());
        let diagnostics = first.compiler.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, Severity::Error);
        assert_eq!(diagnostics[0].line, Some(1));
    }

    #[test]
    fn test_empty_import_is_warning() {
        let first = pass1("run();\n@import \"\";");
        assert!(first.dependencies.is_empty());
        let diagnostics = first.compiler.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, Severity::Warning);
        assert_eq!(diagnostics[0].line, Some(2));
    }

    #[test]
    fn test_source_map() {
        let mut first = pass1("@import \"a.j\"\nrun();");
        let output = first.compiler.compile_pass2();
        let Some(SourceMapText::Utf16(units)) = output.source_map else {
            panic!("expected a UTF-16 source map");
        };
        let map: serde_json::Value =
            serde_json::from_str(&String::from_utf16(&units).unwrap()).unwrap();
        assert_eq!(map["version"], 3);
        assert_eq!(map["file"], "main.j");
        assert_eq!(map["mappings"], ";;AAAA;AACA");
    }

    #[test]
    fn test_source_maps_can_be_disabled() {
        let url = Url::parse("file:///app/main.j").unwrap();
        let mut first = DirectiveCompiler::new()
            .with_source_maps(false)
            .compile_pass1("run();", &url)
            .unwrap();
        assert!(first.compiler.compile_pass2().source_map.is_none());
    }

    #[test]
    fn test_unbalanced_imports_warn() {
        let mut first = pass1("run();");
        first.compiler.push_import("main.j");
        first.compiler.compile_pass2();
        assert_eq!(first.compiler.diagnostics().len(), 1);
        assert!(!first.compiler.diagnostics()[0].is_error());
    }
}
