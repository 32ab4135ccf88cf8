//! Trampoline synthesis.
//!
//! Each import declaration becomes a `pub fn` that pins its parameters and
//! results, dispatches through the process-wide bridge, and routes any
//! failure to the active error handler. The trampoline itself never decides
//! whether a failure is fatal.

use proc_macro2::TokenStream;
use quote::quote;

use crate::error::GenerateError;
use crate::importer::{ImportTable, import_type};
use crate::manifest::{ImportDecl, LoadedManifest};
use crate::resolve::{Origin, Registry, parse_type};

pub struct Trampoline {
    pub module: String,
    pub function: String,
    pub tokens: TokenStream,
}

struct Slot {
    ident: syn::Ident,
    ty: syn::Type,
    /// Already pointer-shaped: its value is the address to pass, unpinned.
    raw: bool,
    /// For pointer-shaped result slots, whether the pointee is mutable.
    mutable: bool,
}

pub fn synthesize(
    decl: &ImportDecl,
    loaded: &LoadedManifest,
    registry: &Registry,
    table: &mut ImportTable,
) -> Result<Trampoline, GenerateError> {
    let module = decl.module.get_ref().clone();
    let function = decl.function.get_ref().clone();
    let origin = Origin {
        path: &loaded.path,
        line: loaded.line_of(&decl.module),
    };
    if module.is_empty() {
        return Err(origin.malformed("import module must not be empty"));
    }
    if function.is_empty() {
        return Err(Origin {
            line: loaded.line_of(&decl.function),
            ..origin
        }
        .malformed("import function must not be empty"));
    }

    let fn_ident = match &decl.name {
        Some(name) => parse_ident(
            name.get_ref(),
            Origin {
                line: loaded.line_of(name),
                ..origin
            },
        )?,
        None => parse_ident(
            &rust_name(&function),
            Origin {
                line: loaded.line_of(&decl.function),
                ..origin
            },
        )?,
    };

    let params = resolve_slots(&decl.params, loaded, registry, table)?;
    let results = resolve_slots(&decl.results, loaded, registry, table)?;

    let sig_params = params.iter().map(|slot| {
        let (ident, ty) = (&slot.ident, &slot.ty);
        quote! { #ident: #ty }
    });
    let ret_tokens = match results.as_slice() {
        [] => TokenStream::new(),
        [slot] => {
            let ty = &slot.ty;
            quote! { -> #ty }
        }
        many => {
            let tys = many.iter().map(|slot| &slot.ty);
            quote! { -> (#(#tys),*) }
        }
    };

    // Value parameters are rebound mutably so their addresses can be pinned;
    // pointer-shaped ones pass the address they already hold.
    let rebinds = params.iter().filter(|slot| !slot.raw).map(|slot| {
        let ident = &slot.ident;
        quote! { let mut #ident = #ident; }
    });
    let result_inits = results.iter().map(|slot| {
        let (ident, ty) = (&slot.ident, &slot.ty);
        if slot.raw {
            if slot.mutable {
                quote! { let mut #ident: #ty = ::core::ptr::null_mut(); }
            } else {
                quote! { let mut #ident: #ty = ::core::ptr::null(); }
            }
        } else {
            quote! { let mut #ident: #ty = ::core::default::Default::default(); }
        }
    });
    let addrs = params
        .iter()
        .map(|slot| {
            let ident = &slot.ident;
            if slot.raw {
                quote! { __pins.pin_raw(#ident as *mut ::core::ffi::c_void) }
            } else {
                quote! { __pins.pin(&mut #ident) }
            }
        })
        .chain(results.iter().map(|slot| {
            let ident = &slot.ident;
            quote! { __pins.pin(&mut #ident) }
        }));
    let ret_expr = match results.as_slice() {
        [] => TokenStream::new(),
        [slot] => {
            let ident = &slot.ident;
            quote! { #ident }
        }
        many => {
            let idents = many.iter().map(|slot| &slot.ident);
            quote! { (#(#idents),*) }
        }
    };

    let tokens = quote! {
        pub fn #fn_ident(#(#sig_params),*) #ret_tokens {
            #(#rebinds)*
            #(#result_inits)*
            let mut __pins = ::trestle::PinSet::new();
            let __res = ::trestle::with_current_instance(|__instance| unsafe {
                __instance.call(#module, #function, &[#(#addrs),*])
            });
            drop(__pins);
            if let Err(__err) = __res {
                ::trestle::current_error_handler()(__err);
            }
            #ret_expr
        }
    };

    Ok(Trampoline {
        module,
        function,
        tokens,
    })
}

fn resolve_slots(
    fields: &[crate::manifest::Field],
    loaded: &LoadedManifest,
    registry: &Registry,
    table: &mut ImportTable,
) -> Result<Vec<Slot>, GenerateError> {
    fields
        .iter()
        .map(|field| {
            let origin = Origin {
                path: &loaded.path,
                line: loaded.line_of(&field.ty),
            };
            let ident = parse_ident(
                field.name.get_ref(),
                Origin {
                    line: loaded.line_of(&field.name),
                    ..origin
                },
            )?;
            let mut ty = parse_type(field.ty.get_ref(), origin)?;
            let resolved = registry.resolve(&ty, origin)?;
            import_type(table, &resolved, &mut ty, origin)?;
            let (raw, mutable) = match &ty {
                syn::Type::Ptr(ptr) => (true, ptr.mutability.is_some()),
                _ => (false, false),
            };
            Ok(Slot {
                ident,
                ty,
                raw,
                mutable,
            })
        })
        .collect()
}

fn parse_ident(name: &str, origin: Origin<'_>) -> Result<syn::Ident, GenerateError> {
    syn::parse_str(name).map_err(|_| origin.malformed(format!("invalid identifier `{name}`")))
}

/// Default trampoline name for a component function: every non-alphanumeric
/// character becomes an underscore, so `wall-clock.now` yields
/// `wall_clock_now`.
pub fn rust_name(function: &str) -> String {
    function
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
