//! Import manifest loading.
//!
//! Each package directory declares its cross-boundary imports in exactly one
//! `<name>.imports.toml` file: a `[package]` table, a `[[types]]` registry of
//! named types usable in signatures, and one `[[import]]` table per imported
//! function. Dependencies are other package directories, walked transitively
//! so their imports and type declarations contribute to the target's single
//! generated file.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use toml::Spanned;

use crate::error::GenerateError;

pub const MANIFEST_SUFFIX: &str = ".imports.toml";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub package: Package,
    #[serde(default)]
    pub types: Vec<TypeDecl>,
    #[serde(default, rename = "import")]
    pub imports: Vec<ImportDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Package {
    /// Base name of the generated module.
    pub name: Spanned<String>,
    /// Executable packages keep the bare name; library packages get a
    /// `_bindings` suffix.
    #[serde(default)]
    pub bin: bool,
    /// Package directories, relative to this manifest's directory.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

/// A named-type registry entry: the semantic side of a type reference.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypeDecl {
    pub name: Spanned<String>,
    /// Rust path of the defining package; absent means the type is local to
    /// the generated module's crate.
    #[serde(default)]
    pub package: Option<Spanned<String>>,
    /// Generic arity.
    #[serde(default)]
    pub params: usize,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImportDecl {
    pub module: Spanned<String>,
    pub function: Spanned<String>,
    /// Rust name for the trampoline; defaults to the normalized function
    /// name.
    #[serde(default)]
    pub name: Option<Spanned<String>>,
    #[serde(default)]
    pub params: Vec<Field>,
    #[serde(default)]
    pub results: Vec<Field>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Field {
    pub name: Spanned<String>,
    #[serde(rename = "type")]
    pub ty: Spanned<String>,
}

/// A parsed manifest plus enough source context to turn `Spanned` values
/// back into `path:line` diagnostics.
#[derive(Debug)]
pub struct LoadedManifest {
    pub path: PathBuf,
    pub dir: PathBuf,
    src: String,
    pub manifest: Manifest,
}

impl LoadedManifest {
    /// 1-based line of a byte offset into the manifest source.
    pub fn line_at(&self, offset: usize) -> usize {
        let offset = offset.min(self.src.len());
        self.src[..offset].bytes().filter(|&b| b == b'\n').count() + 1
    }

    pub fn line_of<T>(&self, spanned: &Spanned<T>) -> usize {
        self.line_at(spanned.span().start)
    }
}

/// Locate the single manifest in `dir`. Zero or more than one is a hard
/// error.
pub fn find_manifest(dir: &Path) -> Result<PathBuf, GenerateError> {
    let entries = fs::read_dir(dir).map_err(|source| GenerateError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| GenerateError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let name = entry.file_name();
        if name.to_string_lossy().ends_with(MANIFEST_SUFFIX) {
            found.push(entry.path());
        }
    }
    // Deterministic regardless of directory iteration order.
    found.sort();
    match found.len() {
        1 => Ok(found.remove(0)),
        n => Err(GenerateError::AmbiguousOrMissingPackage {
            dir: dir.to_path_buf(),
            found: n,
        }),
    }
}

pub fn load(dir: &Path) -> Result<LoadedManifest, GenerateError> {
    let path = find_manifest(dir)?;
    let src = fs::read_to_string(&path).map_err(|source| GenerateError::Io {
        path: path.clone(),
        source,
    })?;
    let manifest = toml::from_str(&src).map_err(|source| GenerateError::Manifest {
        path: path.clone(),
        source,
    })?;
    Ok(LoadedManifest {
        dir: dir.to_path_buf(),
        path,
        src,
        manifest,
    })
}

/// Load `dir` and its transitive dependency closure, target first. Cycles
/// and diamonds are visited once.
pub fn load_closure(dir: &Path) -> Result<Vec<LoadedManifest>, GenerateError> {
    let mut visited = HashSet::new();
    let mut queue = vec![dir.to_path_buf()];
    let mut loaded = Vec::new();
    while let Some(dir) = queue.pop() {
        let canonical = dir.canonicalize().map_err(|source| GenerateError::Io {
            path: dir.clone(),
            source,
        })?;
        if !visited.insert(canonical) {
            continue;
        }
        let manifest = load(&dir)?;
        tracing::debug!(path = %manifest.path.display(), "loaded manifest");
        for dep in &manifest.manifest.package.dependencies {
            queue.push(dir.join(dep));
        }
        loaded.push(manifest);
    }
    Ok(loaded)
}
