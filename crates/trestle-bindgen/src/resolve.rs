//! Semantic type resolution.
//!
//! Signature type strings parse as Rust type syntax, then resolve against
//! the named-type registry collected from every manifest in the closure.
//! The resolved [`TypeRef`] is the semantic description the type importer
//! walks in parallel with the syntax tree.

use std::collections::BTreeMap;
use std::path::Path;

use quote::ToTokens as _;

use crate::error::GenerateError;
use crate::manifest::LoadedManifest;

/// The scalar set permitted to cross the boundary by value.
pub const SCALARS: &[&str] = &[
    "bool", "u8", "u16", "u32", "u64", "i8", "i16", "i32", "i64", "f32", "f64", "char",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Scalar,
    Pointer(Box<TypeRef>),
    Array(Box<TypeRef>),
    /// Anonymous struct with the given field count. Zero fields is an
    /// opaque marker type; one or more is rejected by the importer.
    Struct(usize),
    Named {
        name: String,
        /// Rust path of the defining package; `None` for local types.
        package: Option<String>,
        args: Vec<TypeRef>,
    },
}

/// Provenance of the declaration currently being resolved.
#[derive(Debug, Clone, Copy)]
pub struct Origin<'a> {
    pub path: &'a Path,
    pub line: usize,
}

impl Origin<'_> {
    pub fn malformed(&self, detail: impl Into<String>) -> GenerateError {
        GenerateError::MalformedDirective {
            path: self.path.to_path_buf(),
            line: self.line,
            detail: detail.into(),
        }
    }
}

#[derive(Debug)]
struct Entry {
    package: Option<String>,
    params: usize,
}

/// Named-type registry, merged across the manifest closure.
#[derive(Debug, Default)]
pub struct Registry {
    types: BTreeMap<String, Entry>,
}

impl Registry {
    /// Merge the `[[types]]` tables of every loaded manifest. Identical
    /// re-declarations are tolerated; conflicting ones are an error at the
    /// later declaration.
    pub fn build(closure: &[LoadedManifest]) -> Result<Self, GenerateError> {
        let mut registry = Self::default();
        for loaded in closure {
            for decl in &loaded.manifest.types {
                let name = decl.name.get_ref().clone();
                let package = decl.package.as_ref().map(|p| p.get_ref().clone());
                if let Some(pkg) = &package {
                    if syn::parse_str::<syn::Path>(pkg).is_err() {
                        return Err(GenerateError::MalformedDirective {
                            path: loaded.path.clone(),
                            line: loaded.line_of(decl.package.as_ref().unwrap_or(&decl.name)),
                            detail: format!("invalid package path `{pkg}`"),
                        });
                    }
                }
                let entry = Entry {
                    package,
                    params: decl.params,
                };
                match registry.types.get(&name) {
                    None => {
                        registry.types.insert(name, entry);
                    }
                    Some(existing)
                        if existing.package == entry.package
                            && existing.params == entry.params => {}
                    Some(_) => {
                        return Err(GenerateError::MalformedDirective {
                            path: loaded.path.clone(),
                            line: loaded.line_of(&decl.name),
                            detail: format!("conflicting declarations of type `{name}`"),
                        });
                    }
                }
            }
        }
        Ok(registry)
    }

    /// Resolve parsed type syntax to its semantic shape.
    pub fn resolve(&self, ty: &syn::Type, origin: Origin<'_>) -> Result<TypeRef, GenerateError> {
        match ty {
            syn::Type::Paren(inner) => self.resolve(&inner.elem, origin),
            syn::Type::Ptr(ptr) => Ok(TypeRef::Pointer(Box::new(
                self.resolve(&ptr.elem, origin)?,
            ))),
            syn::Type::Array(arr) => Ok(TypeRef::Array(Box::new(
                self.resolve(&arr.elem, origin)?,
            ))),
            syn::Type::Tuple(tuple) => Ok(TypeRef::Struct(tuple.elems.len())),
            syn::Type::Path(path) => self.resolve_path(path, origin),
            syn::Type::Reference(_) => Err(origin.malformed(format!(
                "references are not supported in import signatures, use a raw pointer: `{}`",
                ty.to_token_stream()
            ))),
            other => Err(origin.malformed(format!(
                "unsupported type syntax `{}`",
                other.to_token_stream()
            ))),
        }
    }

    fn resolve_path(
        &self,
        path: &syn::TypePath,
        origin: Origin<'_>,
    ) -> Result<TypeRef, GenerateError> {
        if path.qself.is_some() || path.path.segments.len() != 1 {
            return Err(origin.malformed(format!(
                "type references must use bare names declared in [[types]]: `{}`",
                path.to_token_stream()
            )));
        }
        let segment = &path.path.segments[0];
        let name = segment.ident.to_string();

        let args = match &segment.arguments {
            syn::PathArguments::None => Vec::new(),
            syn::PathArguments::AngleBracketed(generics) => generics
                .args
                .iter()
                .map(|arg| match arg {
                    syn::GenericArgument::Type(ty) => self.resolve(ty, origin),
                    other => Err(origin.malformed(format!(
                        "only type arguments are supported: `{}`",
                        other.to_token_stream()
                    ))),
                })
                .collect::<Result<_, _>>()?,
            syn::PathArguments::Parenthesized(_) => {
                return Err(origin.malformed(format!(
                    "unsupported type syntax `{}`",
                    path.to_token_stream()
                )));
            }
        };

        if SCALARS.contains(&name.as_str()) {
            if !args.is_empty() {
                return Err(origin.malformed(format!("scalar type `{name}` takes no arguments")));
            }
            return Ok(TypeRef::Scalar);
        }

        let Some(entry) = self.types.get(&name) else {
            return Err(GenerateError::UnknownType {
                path: origin.path.to_path_buf(),
                line: origin.line,
                name,
            });
        };
        if args.len() != entry.params {
            return Err(GenerateError::TypeArgumentMismatch {
                path: origin.path.to_path_buf(),
                line: origin.line,
                name,
                expected: entry.params,
                found: args.len(),
            });
        }
        Ok(TypeRef::Named {
            name,
            package: entry.package.clone(),
            args,
        })
    }
}

/// Parse a manifest type string as Rust type syntax.
pub fn parse_type(text: &str, origin: Origin<'_>) -> Result<syn::Type, GenerateError> {
    syn::parse_str(text).map_err(|err| origin.malformed(format!("cannot parse type `{text}`: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn origin() -> Origin<'static> {
        Origin {
            path: Path::new("pkg.imports.toml"),
            line: 1,
        }
    }

    #[test]
    fn scalars_resolve_without_a_registry() {
        let registry = Registry::default();
        for name in SCALARS {
            let ty = parse_type(name, origin()).unwrap();
            assert_eq!(registry.resolve(&ty, origin()).unwrap(), TypeRef::Scalar);
        }
    }

    #[test]
    fn pointer_and_array_recurse_into_the_element() {
        let registry = Registry::default();
        let ty = parse_type("*mut [u8; 4]", origin()).unwrap();
        assert_eq!(
            registry.resolve(&ty, origin()).unwrap(),
            TypeRef::Pointer(Box::new(TypeRef::Array(Box::new(TypeRef::Scalar)))),
        );
    }

    #[test]
    fn unknown_names_are_terminal() {
        let registry = Registry::default();
        let ty = parse_type("Mystery", origin()).unwrap();
        assert!(matches!(
            registry.resolve(&ty, origin()),
            Err(GenerateError::UnknownType { name, .. }) if name == "Mystery"
        ));
    }
}
