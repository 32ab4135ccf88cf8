use std::path::PathBuf;

use thiserror::Error;

/// Terminal generator failures. Each variant that points at a manifest
/// carries `path:line` provenance for the offending declaration.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// Anonymous structs cannot be named in generated code.
    #[error("{}:{line}: unsupported anonymous struct type `{ty}`", path.display())]
    UnsupportedType {
        path: PathBuf,
        line: usize,
        ty: String,
    },

    #[error(
        "{}:{line}: type `{name}` takes {expected} type argument(s), {found} supplied",
        path.display()
    )]
    TypeArgumentMismatch {
        path: PathBuf,
        line: usize,
        name: String,
        expected: usize,
        found: usize,
    },

    /// The syntax of a type no longer matches its resolved shape. Only
    /// reachable through an internal invariant violation.
    #[error(
        "{}:{line}: internal error: syntax for `{ty}` does not match its resolved shape",
        path.display()
    )]
    UnexpectedSyntaxShape {
        path: PathBuf,
        line: usize,
        ty: String,
    },

    /// A declaration was present but not usable as written.
    #[error("{}:{line}: {detail}", path.display())]
    MalformedDirective {
        path: PathBuf,
        line: usize,
        detail: String,
    },

    #[error(
        "expected exactly one `*.imports.toml` manifest in {}, found {found}",
        dir.display()
    )]
    AmbiguousOrMissingPackage { dir: PathBuf, found: usize },

    #[error("{}:{line}: unknown type `{name}`", path.display())]
    UnknownType {
        path: PathBuf,
        line: usize,
        name: String,
    },

    #[error("failed to parse {}", path.display())]
    Manifest {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to access {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("internal error: {0}")]
    Internal(String),
}
