//! Trampoline generator for import manifests.
//!
//! A package directory declares its cross-boundary imports in a
//! `*.imports.toml` manifest; [`generate`] loads the manifest and its
//! transitive dependency closure, resolves every signature type, and writes
//! one deterministic Rust source file of trampolines that dispatch through
//! the process-wide bridge.

pub mod error;
pub mod manifest;

mod importer;
mod resolve;
mod synth;

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use proc_macro2::TokenStream;
use quote::quote;

use crate::error::GenerateError;
use crate::importer::ImportTable;
use crate::resolve::Registry;

pub const HEADER: &str = "// Code generated by trestle-bindgen. DO NOT EDIT.";

#[derive(Debug, Clone)]
pub struct Options {
    /// Output file, relative to the target package directory.
    pub output: PathBuf,
    /// Run the generated tokens through prettyplease.
    pub format: bool,
    /// Override the generated module name.
    pub package: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            output: PathBuf::from("trestle_bindings.rs"),
            format: true,
            package: None,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Written(PathBuf),
    /// The closure declares no imports; nothing was written and any stale
    /// output was removed.
    NoImports,
}

/// Generate trampolines for the package rooted at `dir`.
pub fn generate(dir: &Path, opts: &Options) -> Result<Outcome, GenerateError> {
    let closure = manifest::load_closure(dir)?;
    let Some(target) = closure.first() else {
        return Err(GenerateError::Internal("empty manifest closure".into()));
    };

    // Remove stale output first so a failed run cannot leave a file that no
    // longer matches the manifests.
    let out_path = target.dir.join(&opts.output);
    match fs::remove_file(&out_path) {
        Ok(()) => tracing::debug!(path = %out_path.display(), "removed stale output"),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(source) => {
            return Err(GenerateError::Io {
                path: out_path,
                source,
            });
        }
    }

    let registry = Registry::build(&closure)?;
    let mut table = ImportTable::new();
    let mut trampolines = Vec::new();
    for loaded in &closure {
        for decl in &loaded.manifest.imports {
            trampolines.push((
                synth::synthesize(decl, loaded, &registry, &mut table)?,
                loaded,
                decl,
            ));
        }
    }
    if trampolines.is_empty() {
        tracing::info!(dir = %dir.display(), "no imports declared, skipping");
        return Ok(Outcome::NoImports);
    }

    // Deterministic emission order, independent of traversal order.
    trampolines.sort_by(|(a, _, _), (b, _, _)| {
        (&a.module, &a.function).cmp(&(&b.module, &b.function))
    });
    for pair in trampolines.windows(2) {
        let [(a, _, _), (b, loaded, decl)] = pair else {
            continue;
        };
        if a.module == b.module && a.function == b.function {
            return Err(GenerateError::MalformedDirective {
                path: loaded.path.clone(),
                line: loaded.line_of(&decl.module),
                detail: format!("duplicate import `{}#{}`", b.module, b.function),
            });
        }
    }

    let module_name = match &opts.package {
        Some(name) => name.clone(),
        None => {
            let base = target.manifest.package.name.get_ref();
            if target.manifest.package.bin {
                base.clone()
            } else {
                format!("{base}_bindings")
            }
        }
    };
    let mod_ident =
        syn::parse_str::<syn::Ident>(&module_name).map_err(|_| GenerateError::MalformedDirective {
            path: target.path.clone(),
            line: target.line_of(&target.manifest.package.name),
            detail: format!("invalid module name `{module_name}`"),
        })?;

    let uses = table.iter().map(|(path, alias)| {
        let alias = syn::Ident::new(alias, proc_macro2::Span::call_site());
        quote! { use #path as #alias; }
    });
    let fns = trampolines.iter().map(|(t, _, _)| &t.tokens);
    let tokens: TokenStream = quote! {
        #[allow(unused_imports, unused_mut, unused_variables)]
        pub mod #mod_ident {
            #(#uses)*
            #(#fns)*
        }
    };

    let body = render(tokens, opts.format)?;
    let text = format!("{HEADER}\n\n{body}");
    fs::write(&out_path, text).map_err(|source| GenerateError::Io {
        path: out_path.clone(),
        source,
    })?;
    tracing::info!(
        path = %out_path.display(),
        trampolines = trampolines.len(),
        "generated bindings"
    );
    Ok(Outcome::Written(out_path))
}

fn render(tokens: TokenStream, format: bool) -> Result<String, GenerateError> {
    if !format {
        return Ok(format!("{tokens}\n"));
    }
    let file: syn::File = syn::parse2(tokens)
        .map_err(|err| GenerateError::Internal(format!("generated code does not parse: {err}")))?;
    Ok(prettyplease::unparse(&file))
}
