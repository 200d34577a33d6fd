//! `#[derive(Error)]` implementation.
//!
//! ```ignore
//! use regvm_derive::Error;
//!
//! #[derive(Debug, Error)]
//! pub enum LoadError {
//!     #[error("unknown mnemonic: {0}")]
//!     UnknownMnemonic(String),
//!
//!     #[error("line {line}: expected {expected} operands")]
//!     Arity { line: usize, expected: usize },
//!
//!     #[error("empty program")]
//!     Empty,
//! }
//! ```
//!
//! Tuple fields are referenced positionally (`{0}`), named fields by name.
//! Structs take a single `#[error]` on the type itself. Unions are rejected.

use proc_macro::TokenStream;
use proc_macro2::{Ident, TokenStream as TokenStream2};
use quote::{ToTokens, format_ident, quote};
use syn::{Attribute, Data, DeriveInput, Fields, Index, LitStr, Meta, parse_macro_input};

pub fn derive_error(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let body = match &input.data {
        Data::Enum(data) => {
            let arms = data
                .variants
                .iter()
                .map(|variant| {
                    let message = message_from_attrs(
                        &variant.attrs,
                        &variant.ident,
                        &format!("variant `{}`", variant.ident),
                    )?;
                    Ok(variant_arm(&variant.ident, &variant.fields, &message))
                })
                .collect::<syn::Result<Vec<_>>>()?;

            quote! {
                match self {
                    #(#arms)*
                }
            }
        }
        Data::Struct(data) => {
            let message =
                message_from_attrs(&input.attrs, name, &format!("type `{}`", name))?;
            struct_body(&data.fields, &message)
        }
        Data::Union(_) => {
            return Err(syn::Error::new_spanned(
                input,
                "Error cannot be derived for unions",
            ));
        }
    };

    Ok(quote! {
        impl #impl_generics ::std::fmt::Display for #name #ty_generics #where_clause {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                #body
            }
        }

        impl #impl_generics ::std::error::Error for #name #ty_generics #where_clause {}
    })
}

/// Builds one `match` arm writing the message for an enum variant.
///
/// Only fields mentioned in the message are bound; `format_args!` rejects
/// named arguments that are never used.
fn variant_arm(variant: &Ident, fields: &Fields, message: &str) -> TokenStream2 {
    match fields {
        Fields::Unit => quote! {
            Self::#variant => write!(f, #message),
        },
        Fields::Unnamed(unnamed) => {
            let message = rename_positional(message, unnamed.unnamed.len());
            let used: Vec<_> = positional_bindings(unnamed.unnamed.len())
                .into_iter()
                .filter(|binding| mentions(&message, binding))
                .collect();
            let patterns = positional_bindings(unnamed.unnamed.len())
                .into_iter()
                .map(|binding| {
                    if mentions(&message, &binding) {
                        quote! { #binding }
                    } else {
                        quote! { _ }
                    }
                });
            quote! {
                Self::#variant(#(#patterns),*) => write!(f, #message, #(#used = #used),*),
            }
        }
        Fields::Named(named) => {
            let used: Vec<_> = named
                .named
                .iter()
                .filter_map(|field| field.ident.as_ref())
                .filter(|ident| mentions(message, ident))
                .collect();
            quote! {
                Self::#variant { #(#used,)* .. } => write!(f, #message, #(#used = #used),*),
            }
        }
    }
}

/// Builds the `fmt` body for a struct error.
fn struct_body(fields: &Fields, message: &str) -> TokenStream2 {
    match fields {
        Fields::Unit => quote! { write!(f, #message) },
        Fields::Unnamed(unnamed) => {
            let message = rename_positional(message, unnamed.unnamed.len());
            let (bindings, indices): (Vec<_>, Vec<_>) = positional_bindings(unnamed.unnamed.len())
                .into_iter()
                .enumerate()
                .filter(|(_, binding)| mentions(&message, binding))
                .map(|(i, binding)| (binding, Index::from(i)))
                .unzip();
            quote! { write!(f, #message, #(#bindings = self.#indices),*) }
        }
        Fields::Named(named) => {
            let used: Vec<_> = named
                .named
                .iter()
                .filter_map(|field| field.ident.as_ref())
                .filter(|ident| mentions(message, ident))
                .collect();
            quote! { write!(f, #message, #(#used = self.#used),*) }
        }
    }
}

/// Returns true if `message` has a `{name}` or `{name:...}` placeholder.
fn mentions(message: &str, ident: &Ident) -> bool {
    let name = ident.to_string();
    message.contains(&format!("{{{name}}}")) || message.contains(&format!("{{{name}:"))
}

fn positional_bindings(count: usize) -> Vec<Ident> {
    (0..count).map(|i| format_ident!("f{}", i)).collect()
}

/// Rewrites `{0}` style placeholders to the `{f0}` bindings used in the arms.
fn rename_positional(message: &str, count: usize) -> String {
    (0..count).rev().fold(message.to_string(), |acc, i| {
        acc.replace(&format!("{{{i}}}"), &format!("{{f{i}}}"))
            .replace(&format!("{{{i}:"), &format!("{{f{i}:"))
    })
}

/// Finds the `#[error("...")]` attribute and returns its string.
fn message_from_attrs<T: ToTokens>(
    attrs: &[Attribute],
    target: &T,
    description: &str,
) -> syn::Result<String> {
    let Some(attr) = attrs.iter().find(|attr| attr.path().is_ident("error")) else {
        return Err(syn::Error::new_spanned(
            target,
            format!("missing #[error(\"...\")] on {description}"),
        ));
    };

    match &attr.meta {
        Meta::List(list) => syn::parse2::<LitStr>(list.tokens.clone())
            .map(|lit| lit.value())
            .map_err(|_| {
                syn::Error::new_spanned(
                    &attr.meta,
                    "#[error] expects a string literal, e.g. #[error(\"bad register: {0}\")]",
                )
            }),
        _ => Err(syn::Error::new_spanned(
            &attr.meta,
            "expected #[error(\"message\")]",
        )),
    }
}
