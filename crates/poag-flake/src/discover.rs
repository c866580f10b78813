//! Sub-flake discovery: turns a flake project into a resolved manifest.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use poag_core::{Manifest, ManifestEntry, ROOT_NODE};
use tracing::{debug, info, warn};

use crate::error::FlakeError;
use crate::flake::{hash_flake_lock, FlakeMetadata, MetadataSource, FLAKE_NIX};
use crate::language::detect_language;
use crate::Result;

/// Immediate sub-directories of `root` holding a `flake.nix`, sorted.
///
/// Hidden directories are skipped, and so is a directory named like the
/// root node.
pub fn find_subflakes(root: &Path) -> Result<Vec<String>> {
    let mut names = BTreeSet::new();
    for entry in std::fs::read_dir(root)? {
        let path = entry?.path();
        if !path.join(FLAKE_NIX).is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        if name == ROOT_NODE {
            warn!(event = "flake.reserved_name", path = %path.display());
            continue;
        }
        names.insert(name.to_string());
    }
    Ok(names.into_iter().collect())
}

/// Build the manifest for the flake project at `root`.
///
/// Every sub-flake becomes a node named after its directory; the project
/// flake becomes `root`. A node depends on the inputs of its lock file that
/// name other sub-flakes.
pub fn discover(root: &Path, source: &dyn MetadataSource) -> Result<Manifest> {
    if !root.join(FLAKE_NIX).is_file() {
        return Err(FlakeError::NotAFlake(root.to_path_buf()));
    }

    let subflakes = find_subflakes(root)?;
    let known: BTreeSet<&str> = subflakes.iter().map(String::as_str).collect();

    let mut entries = Vec::with_capacity(subflakes.len() + 1);
    for name in &subflakes {
        let dir = root.join(name);
        let metadata = source.metadata(&dir)?;
        entries.push(entry(name, PathBuf::from(name), &dir, &metadata, &known)?);
    }
    let metadata = source.metadata(root)?;
    entries.push(entry(ROOT_NODE, PathBuf::from("."), root, &metadata, &known)?);

    info!(
        event = "flake.discovered",
        root = %root.display(),
        subflakes = subflakes.len(),
    );
    Ok(Manifest::new(entries))
}

fn entry(
    name: &str,
    path: PathBuf,
    dir: &Path,
    metadata: &FlakeMetadata,
    known: &BTreeSet<&str>,
) -> Result<ManifestEntry> {
    let dependencies: Vec<String> = metadata
        .root_inputs()
        .into_iter()
        .filter(|input| input != name && known.contains(input.as_str()))
        .collect();

    let content_revision = match (&metadata.revision, &metadata.locks) {
        (Some(rev), _) => Some(rev.clone()),
        (None, Some(locks)) => Some(hash_flake_lock(locks)?),
        (None, None) => None,
    };

    let language = detect_language(dir);
    debug!(
        event = "flake.node",
        node = %name,
        language = %language,
        dependencies = ?dependencies,
    );

    let mut entry = ManifestEntry::new(name, path)
        .depends_on(dependencies)
        .with_language(language);
    entry.description = metadata.description.clone();
    entry.content_revision = content_revision;
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flake::LockFileMetadata;
    use tempfile::tempdir;

    fn lock_with_inputs(inputs: &[&str]) -> String {
        let inputs: serde_json::Map<String, serde_json::Value> = inputs
            .iter()
            .map(|i| (i.to_string(), serde_json::Value::String(i.to_string())))
            .collect();
        serde_json::json!({
            "version": 7,
            "root": "root",
            "nodes": { "root": { "inputs": inputs } }
        })
        .to_string()
    }

    #[test]
    fn finds_only_directories_with_flakes() {
        let dir = tempdir().unwrap();
        for sub in ["b", "a", ".hidden", "plain"] {
            std::fs::create_dir(dir.path().join(sub)).unwrap();
        }
        for sub in ["a", "b", ".hidden"] {
            std::fs::write(dir.path().join(sub).join(FLAKE_NIX), "{}").unwrap();
        }
        assert_eq!(find_subflakes(dir.path()).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn missing_root_flake_is_an_error() {
        let dir = tempdir().unwrap();
        let err = discover(dir.path(), &LockFileMetadata).unwrap_err();
        assert!(matches!(err, FlakeError::NotAFlake(_)));
    }

    #[test]
    fn dependencies_come_from_lock_inputs_naming_subflakes() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        std::fs::write(root.join(FLAKE_NIX), "{}").unwrap();
        std::fs::write(
            root.join("flake.lock"),
            lock_with_inputs(&["nixpkgs", "svc"]),
        )
        .unwrap();
        for sub in ["svc", "lib"] {
            std::fs::create_dir(root.join(sub)).unwrap();
            std::fs::write(root.join(sub).join(FLAKE_NIX), "{}").unwrap();
        }
        std::fs::write(
            root.join("svc").join("flake.lock"),
            lock_with_inputs(&["lib", "svc", "flake-utils"]),
        )
        .unwrap();

        let manifest = discover(root, &LockFileMetadata).unwrap();
        let names: Vec<&str> = manifest.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["lib", "svc", "root"]);

        let by_name = |n: &str| manifest.entries.iter().find(|e| e.name == n).unwrap();
        assert_eq!(by_name("root").dependencies, vec!["svc"]);
        assert_eq!(by_name("root").path, PathBuf::from("."));
        assert_eq!(by_name("svc").dependencies, vec!["lib"]);
        assert!(by_name("lib").dependencies.is_empty());
        assert!(by_name("lib").content_revision.is_none());
        assert_eq!(by_name("svc").content_revision.as_ref().unwrap().len(), 64);
    }

    struct Described;

    impl MetadataSource for Described {
        fn metadata(&self, flake_path: &Path) -> Result<FlakeMetadata> {
            Ok(FlakeMetadata {
                description: Some(format!(
                    "flake at {}",
                    flake_path.file_name().unwrap().to_string_lossy()
                )),
                revision: Some("cafe".to_string()),
                ..FlakeMetadata::default()
            })
        }
    }

    #[test]
    fn metadata_revision_and_description_win() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        std::fs::write(root.join(FLAKE_NIX), "{}").unwrap();
        std::fs::create_dir(root.join("web")).unwrap();
        std::fs::write(root.join("web").join(FLAKE_NIX), "{}").unwrap();
        std::fs::write(root.join("web").join("package.json"), "{}").unwrap();

        let manifest = discover(root, &Described).unwrap();
        let web = &manifest.entries[0];
        assert_eq!(web.name, "web");
        assert_eq!(web.language, "web");
        assert_eq!(web.description.as_deref(), Some("flake at web"));
        assert_eq!(web.content_revision.as_deref(), Some("cafe"));
    }
}
