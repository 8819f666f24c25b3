// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Writing compiled units out as marked-string bundles

use anyhow::{Context, Result};
use quire_loader::Unit;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::debug;

/// Where the bundle for `source` goes under `output`.
///
/// The path is kept relative to the first root containing the source, so a
/// file from an include path lands where a `<...>` import will find it.
/// Files outside every root keep only their name.
pub fn bundle_path(source: &Path, roots: &[PathBuf], output: &Path) -> PathBuf {
    let relative = roots
        .iter()
        .find_map(|root| source.strip_prefix(root).ok())
        .map(Path::to_path_buf)
        .or_else(|| source.file_name().map(PathBuf::from))
        .unwrap_or_default();
    output.join(relative)
}

/// Write every unit's marked string below `output`
pub async fn write_bundles(units: &[Rc<Unit>], roots: &[PathBuf], output: &Path) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(units.len());

    for unit in units {
        let source = unit
            .url()
            .to_file_path()
            .map_err(|_| anyhow::anyhow!("not a local file: {}", unit.url()))?;
        let target = bundle_path(&source, roots, output);
        let contents = unit.to_marked_string()?;

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        tokio::fs::write(&target, contents)
            .await
            .with_context(|| format!("writing {}", target.display()))?;

        debug!("Wrote {}", target.display());
        written.push(target);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_bundle_path_keeps_root_layout() {
        let roots = vec![PathBuf::from("/work/app"), PathBuf::from("/work/Frameworks")];
        let out = Path::new("/dist");

        assert_eq!(
            bundle_path(Path::new("/work/app/views/View.j"), &roots, out),
            PathBuf::from("/dist/views/View.j")
        );
        assert_eq!(
            bundle_path(Path::new("/work/Frameworks/Foundation/Foundation.j"), &roots, out),
            PathBuf::from("/dist/Foundation/Foundation.j")
        );
        assert_eq!(
            bundle_path(Path::new("/elsewhere/Extra.j"), &roots, out),
            PathBuf::from("/dist/Extra.j")
        );
    }

    #[test]
    fn test_first_matching_root_wins() {
        let roots = vec![PathBuf::from("/work"), PathBuf::from("/work/app")];
        assert_eq!(
            bundle_path(Path::new("/work/app/main.j"), &roots, Path::new("out")),
            PathBuf::from("out/app/main.j")
        );
    }

    #[tokio::test]
    async fn test_write_bundles_creates_directories() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("app");
        let output = dir.path().join("dist");

        let resolver = Rc::new(quire_loader::FileResolver::new(Vec::<PathBuf>::new()).unwrap());
        let loader = quire_loader::Loader::builder(resolver, Rc::new(crate::engine::TraceEngine::new(true)))
            .build()
            .unwrap();
        let unit = loader
            .unit_from_source(
                Some(url::Url::from_file_path(root.join("views/View.j")).unwrap()),
                "view();",
                vec![],
            )
            .unwrap();

        let written = write_bundles(&[unit], &[root], &output).await.unwrap();

        assert_eq!(written, vec![output.join("views/View.j")]);
        let contents = std::fs::read_to_string(&written[0]).unwrap();
        assert!(contents.starts_with("@STATIC;1.0;"));
        assert!(contents.ends_with("t;7;view();"));
    }
}
