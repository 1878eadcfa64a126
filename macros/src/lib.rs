//! Derive macros for the flowstore state container
//!
//! This crate provides procedural macros to reduce boilerplate when lifting
//! reducers and middleware into larger action enums.
//!
//! # Available Macros
//!
//! - `#[derive(Prisms)]` - Generates one `Prism` constructor per enum case
//!
//! # Example
//!
//! ```ignore
//! use flowstore_macros::Prisms;
//!
//! #[derive(Prisms, Clone, Debug)]
//! enum AppAction {
//!     Counter(CounterAction),
//!     Row(usize, CounterAction),
//!     Quit,
//! }
//!
//! // Generated constructors:
//! let counter: Prism<AppAction, CounterAction> = AppAction::counter();
//! let row: Prism<AppAction, (usize, CounterAction)> = AppAction::row();
//! let quit: Prism<AppAction, ()> = AppAction::quit();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use proc_macro::TokenStream;
use proc_macro2::{Ident, Span, TokenStream as TokenStream2};
use quote::{format_ident, quote};
use syn::{Attribute, Data, DeriveInput, Fields, LitStr, Variant, parse_macro_input};

/// Derive macro for action enums
///
/// Generates, for every tuple or unit variant, an associated function named
/// after the variant in `snake_case` that returns a
/// `::flowstore_core::Prism<Self, Payload>`:
///
/// - unit variant: `Payload = ()`
/// - one field: `Payload` is that field's type
/// - several fields: `Payload` is the tuple of the field types
///
/// Extraction clones the payload, so every field type must be `Clone`.
/// Struct-like variants are skipped.
///
/// # Attributes
///
/// - `#[prism(skip)]` - Generate nothing for this variant
/// - `#[prism(rename = "name")]` - Use `name` for the constructor
///
/// # Panics
///
/// This macro will produce a compile error (not a runtime panic) if:
/// - Applied to a non-enum type
/// - A `#[prism(...)]` attribute is malformed
///
/// # Example
///
/// ```ignore
/// #[derive(Prisms, Clone, Debug)]
/// enum TodoAction {
///     Add(String),
///     #[prism(rename = "toggle_at")]
///     Toggle(usize),
///     #[prism(skip)]
///     Internal(u8),
///     Edit { index: usize, title: String }, // skipped: struct-like
/// }
///
/// let add = TodoAction::add();
/// assert_eq!(add.extract(&add.embed("milk".into())), Some("milk".to_string()));
/// ```
#[proc_macro_derive(Prisms, attributes(prism))]
pub fn derive_prisms(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let Data::Enum(data_enum) = &input.data else {
        return syn::Error::new_spanned(input, "#[derive(Prisms)] can only be used on enums")
            .to_compile_error()
            .into();
    };

    let mut constructors = Vec::new();
    for variant in &data_enum.variants {
        let options = match PrismOptions::from_attributes(&variant.attrs) {
            Ok(options) => options,
            Err(error) => return error.to_compile_error().into(),
        };
        if options.skip {
            continue;
        }
        if let Some(constructor) = prism_constructor(variant, options.rename) {
            constructors.push(constructor);
        }
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let expanded = quote! {
        impl #impl_generics #name #ty_generics #where_clause {
            #(#constructors)*
        }
    };

    TokenStream::from(expanded)
}

/// Options parsed from `#[prism(...)]`
#[derive(Default)]
struct PrismOptions {
    skip: bool,
    rename: Option<LitStr>,
}

impl PrismOptions {
    fn from_attributes(attrs: &[Attribute]) -> syn::Result<Self> {
        let mut options = Self::default();
        for attr in attrs.iter().filter(|attr| attr.path().is_ident("prism")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("skip") {
                    options.skip = true;
                    Ok(())
                } else if meta.path.is_ident("rename") {
                    options.rename = Some(meta.value()?.parse()?);
                    Ok(())
                } else {
                    Err(meta.error("expected `skip` or `rename = \"...\"`"))
                }
            })?;
        }
        Ok(options)
    }
}

/// The constructor for one variant, or `None` for struct-like variants
fn prism_constructor(variant: &Variant, rename: Option<LitStr>) -> Option<TokenStream2> {
    let variant_name = &variant.ident;
    let fn_name = rename.map_or_else(
        || function_ident(&to_snake_case(&variant_name.to_string()), variant_name.span()),
        |lit| function_ident(&lit.value(), lit.span()),
    );
    let doc = format!("Prism focusing on [`Self::{variant_name}`]");

    let (payload, embed, extract) = match &variant.fields {
        Fields::Named(_) => return None,
        Fields::Unit => (
            quote! { () },
            quote! { |()| Self::#variant_name },
            quote! { Self::#variant_name => ::core::option::Option::Some(()), },
        ),
        Fields::Unnamed(fields) if fields.unnamed.len() == 1 => {
            let ty = &fields.unnamed[0].ty;
            (
                quote! { #ty },
                quote! { Self::#variant_name },
                quote! {
                    Self::#variant_name(field) => {
                        ::core::option::Option::Some(::core::clone::Clone::clone(field))
                    },
                },
            )
        },
        Fields::Unnamed(fields) => {
            let types: Vec<_> = fields.unnamed.iter().map(|field| &field.ty).collect();
            let bindings: Vec<_> = (0..types.len())
                .map(|index| format_ident!("field_{}", index))
                .collect();
            (
                quote! { (#(#types),*) },
                quote! { |(#(#bindings),*): (#(#types),*)| Self::#variant_name(#(#bindings),*) },
                quote! {
                    Self::#variant_name(#(#bindings),*) => ::core::option::Option::Some((
                        #(::core::clone::Clone::clone(#bindings)),*
                    )),
                },
            )
        },
    };

    Some(quote! {
        #[doc = #doc]
        #[must_use]
        #[allow(unreachable_patterns)]
        pub fn #fn_name() -> ::flowstore_core::Prism<Self, #payload> {
            ::flowstore_core::Prism::new(#embed, |whole: &Self| match whole {
                #extract
                _ => ::core::option::Option::None,
            })
        }
    })
}

/// Convert a `CamelCase` variant name to `snake_case`
///
/// Acronyms stay together: `HTTPRequest` becomes `http_request`.
fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut snake = String::with_capacity(name.len() + 4);

    for (index, &ch) in chars.iter().enumerate() {
        if ch.is_uppercase() && index > 0 {
            let prev = chars[index - 1];
            let next_is_lower = chars.get(index + 1).is_some_and(|next| next.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower)
            {
                snake.push('_');
            }
        }
        snake.extend(ch.to_lowercase());
    }

    snake
}

/// An identifier for `name`, escaping keywords
fn function_ident(name: &str, span: Span) -> Ident {
    match name {
        "self" | "super" | "crate" | "_" => format_ident!("{}_", name, span = span),
        _ if syn::parse_str::<Ident>(name).is_ok() => Ident::new(name, span),
        _ => Ident::new_raw(name, span),
    }
}
