//! Type importer: qualifies named type references with per-package aliases.
//!
//! Walks the resolved [`TypeRef`] and its syntax node in parallel, rewriting
//! every foreign named type to go through a local alias recorded in the
//! shared [`ImportTable`]. Repeated references to the same package reuse one
//! alias, so the generated file carries exactly one `use` per distinct
//! package path.

use std::collections::BTreeMap;

use quote::ToTokens as _;

use crate::error::GenerateError;
use crate::resolve::{Origin, TypeRef};

/// Foreign package path -> (local alias, parsed path). `BTreeMap` keeps
/// alias emission order deterministic.
#[derive(Debug, Default)]
pub struct ImportTable {
    aliases: BTreeMap<String, (String, syn::Path)>,
}

impl ImportTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn alias(&mut self, package: &str, path: syn::Path) -> &str {
        if !self.aliases.contains_key(package) {
            // Normalization is not injective (`a::b` and `a__b` both
            // normalize to `a__b`), so uniquify against already-taken
            // aliases at insertion.
            let base = normalize(package);
            let mut candidate = base.clone();
            let mut n = 2;
            while self.aliases.values().any(|(alias, _)| *alias == candidate) {
                candidate = format!("{base}{n}");
                n += 1;
            }
            self.aliases.insert(package.to_string(), (candidate, path));
        }
        &self.aliases[package].0
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// `(package path, alias)` pairs in package order.
    pub fn iter(&self) -> impl Iterator<Item = (&syn::Path, &str)> {
        self.aliases
            .values()
            .map(|(alias, path)| (path, alias.as_str()))
    }
}

/// Derive the base alias for a package path. The result is not guaranteed
/// unique; [`ImportTable::alias`] uniquifies on insertion.
fn normalize(package: &str) -> String {
    package
        .replace("::", "__")
        .replace('-', "___")
        .replace('.', "_")
}

/// Rewrite `syntax` in place so every named reference in `ty` is qualified
/// by its package alias. The two arguments must describe the same type.
pub fn import_type(
    table: &mut ImportTable,
    ty: &TypeRef,
    syntax: &mut syn::Type,
    origin: Origin<'_>,
) -> Result<(), GenerateError> {
    match (ty, syntax) {
        (_, syn::Type::Paren(paren)) => import_type(table, ty, &mut paren.elem, origin),
        (TypeRef::Scalar, syn::Type::Path(_)) => Ok(()),
        (TypeRef::Pointer(inner), syn::Type::Ptr(ptr)) => {
            import_type(table, inner, &mut ptr.elem, origin)
        }
        (TypeRef::Array(inner), syn::Type::Array(arr)) => {
            import_type(table, inner, &mut arr.elem, origin)
        }
        (TypeRef::Struct(0), syn::Type::Tuple(_)) => Ok(()),
        (TypeRef::Struct(_), tuple @ syn::Type::Tuple(_)) => Err(GenerateError::UnsupportedType {
            path: origin.path.to_path_buf(),
            line: origin.line,
            ty: tuple.to_token_stream().to_string(),
        }),
        (TypeRef::Named { name, package, args }, syn::Type::Path(type_path)) => {
            import_named(table, name, package.as_deref(), args, type_path, origin)
        }
        (_, syntax) => Err(GenerateError::UnexpectedSyntaxShape {
            path: origin.path.to_path_buf(),
            line: origin.line,
            ty: syntax.to_token_stream().to_string(),
        }),
    }
}

fn import_named(
    table: &mut ImportTable,
    name: &str,
    package: Option<&str>,
    args: &[TypeRef],
    type_path: &mut syn::TypePath,
    origin: Origin<'_>,
) -> Result<(), GenerateError> {
    if type_path.qself.is_some() || type_path.path.segments.len() != 1 {
        return Err(GenerateError::UnexpectedSyntaxShape {
            path: origin.path.to_path_buf(),
            line: origin.line,
            ty: type_path.to_token_stream().to_string(),
        });
    }
    let Some(segment) = type_path.path.segments.first_mut() else {
        return Err(GenerateError::Internal("empty type path".into()));
    };
    if segment.ident != name {
        return Err(GenerateError::UnexpectedSyntaxShape {
            path: origin.path.to_path_buf(),
            line: origin.line,
            ty: segment.ident.to_string(),
        });
    }

    // Qualify the generic arguments first.
    match &mut segment.arguments {
        syn::PathArguments::None if args.is_empty() => {}
        syn::PathArguments::AngleBracketed(generics) => {
            let syntactic: Vec<&mut syn::Type> = generics
                .args
                .iter_mut()
                .filter_map(|arg| match arg {
                    syn::GenericArgument::Type(ty) => Some(ty),
                    _ => None,
                })
                .collect();
            if syntactic.len() != args.len() {
                return Err(GenerateError::TypeArgumentMismatch {
                    path: origin.path.to_path_buf(),
                    line: origin.line,
                    name: name.to_string(),
                    expected: args.len(),
                    found: syntactic.len(),
                });
            }
            for (arg_ty, arg_syntax) in args.iter().zip(syntactic) {
                import_type(table, arg_ty, arg_syntax, origin)?;
            }
        }
        _ => {
            return Err(GenerateError::TypeArgumentMismatch {
                path: origin.path.to_path_buf(),
                line: origin.line,
                name: name.to_string(),
                expected: args.len(),
                found: 0,
            });
        }
    }

    // Local types need no qualifier.
    let Some(package) = package else {
        return Ok(());
    };
    let package_path: syn::Path = syn::parse_str(package)
        .map_err(|_| origin.malformed(format!("invalid package path `{package}`")))?;
    let alias = table.alias(package, package_path);
    let alias_ident = syn::Ident::new(alias, proc_macro2::Span::call_site());

    let Some(named) = type_path.path.segments.pop() else {
        return Err(GenerateError::Internal("empty type path".into()));
    };
    type_path.path.segments.push(syn::PathSegment {
        ident: alias_ident,
        arguments: syn::PathArguments::None,
    });
    type_path.path.segments.push(named.into_value());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quote::ToTokens as _;
    use std::path::Path;

    fn origin() -> Origin<'static> {
        Origin {
            path: Path::new("pkg.imports.toml"),
            line: 1,
        }
    }

    fn named(name: &str, package: Option<&str>) -> TypeRef {
        TypeRef::Named {
            name: name.to_string(),
            package: package.map(str::to_string),
            args: Vec::new(),
        }
    }

    #[test]
    fn foreign_references_are_rewritten_through_one_alias() {
        let mut table = ImportTable::new();
        let ty = named("Datetime", Some("wasi::clocks"));

        let mut first: syn::Type = syn::parse_str("Datetime").unwrap();
        import_type(&mut table, &ty, &mut first, origin()).unwrap();
        assert_eq!(
            first.to_token_stream().to_string(),
            "wasi__clocks :: Datetime"
        );

        let mut second: syn::Type = syn::parse_str("*mut Datetime").unwrap();
        import_type(
            &mut table,
            &TypeRef::Pointer(Box::new(ty)),
            &mut second,
            origin(),
        )
        .unwrap();

        assert_eq!(table.iter().count(), 1);
    }

    #[test]
    fn local_references_stay_unqualified() {
        let mut table = ImportTable::new();
        let mut syntax: syn::Type = syn::parse_str("Marker").unwrap();
        import_type(&mut table, &named("Marker", None), &mut syntax, origin()).unwrap();
        assert_eq!(syntax.to_token_stream().to_string(), "Marker");
        assert!(table.is_empty());
    }

    #[test]
    fn anonymous_structs_with_fields_are_rejected() {
        let mut table = ImportTable::new();
        let mut syntax: syn::Type = syn::parse_str("(u32, u32)").unwrap();
        let err =
            import_type(&mut table, &TypeRef::Struct(2), &mut syntax, origin()).unwrap_err();
        assert!(matches!(err, GenerateError::UnsupportedType { .. }));
    }

    #[test]
    fn unit_is_an_opaque_marker() {
        let mut table = ImportTable::new();
        let mut syntax: syn::Type = syn::parse_str("()").unwrap();
        import_type(&mut table, &TypeRef::Struct(0), &mut syntax, origin()).unwrap();
    }

    #[test]
    fn colliding_normalizations_get_distinct_aliases() {
        let mut table = ImportTable::new();

        let mut first: syn::Type = syn::parse_str("T").unwrap();
        import_type(&mut table, &named("T", Some("a::b")), &mut first, origin()).unwrap();
        let mut second: syn::Type = syn::parse_str("U").unwrap();
        import_type(&mut table, &named("U", Some("a__b")), &mut second, origin()).unwrap();

        assert_eq!(first.to_token_stream().to_string(), "a__b :: T");
        assert_eq!(second.to_token_stream().to_string(), "a__b2 :: U");
        let aliases: Vec<_> = table.iter().map(|(_, alias)| alias).collect();
        assert_eq!(aliases, vec!["a__b", "a__b2"]);
    }

    #[test]
    fn generic_arguments_are_qualified_recursively() {
        let mut table = ImportTable::new();
        let ty = TypeRef::Named {
            name: "List".to_string(),
            package: Some("shared".to_string()),
            args: vec![named("Datetime", Some("wasi::clocks"))],
        };
        let mut syntax: syn::Type = syn::parse_str("List<Datetime>").unwrap();
        import_type(&mut table, &ty, &mut syntax, origin()).unwrap();
        assert_eq!(
            syntax.to_token_stream().to_string(),
            "shared :: List < wasi__clocks :: Datetime >"
        );
        assert_eq!(table.iter().count(), 2);
    }
}
