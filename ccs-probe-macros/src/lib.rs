//! Derives for the wire types in `ccs-probe`.
//!
//! The generated code refers to `EncodeValue`, `DecodeValue`, `DecodeByteSource`
//! and `EncodeBytesSink` by their bare names, so the deriving module must have
//! those traits in scope.

extern crate proc_macro;

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, Ident};

/// Find the primitive named in `#[repr(..)]`.
fn repr_type(input: &DeriveInput) -> Option<Ident> {
    let mut repr = None;
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("repr")) {
        let _ = attr.parse_nested_meta(|meta| {
            if let Some(ident) = meta.path.get_ident() {
                let name = ident.to_string();
                if matches!(name.as_str(), "u8" | "u16" | "u32") {
                    repr = Some(ident.clone());
                }
            }
            Ok(())
        });
    }
    repr
}

/// Implement `byte_value()` for a fieldless enum with explicit discriminants.
///
/// The enum must carry a `#[repr(u8)]`, `#[repr(u16)]` or `#[repr(u32)]`
/// attribute, which decides the return type.
/// ```ignore
/// impl AlertLevel {
///     pub fn byte_value(&self) -> u8 {
///         match self {
///             AlertLevel::Warning => 1,
///             AlertLevel::Fatal => 2,
///         }
///     }
/// }
/// ```
#[proc_macro_derive(ByteValue)]
pub fn derive_byte_value(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let enum_name = input.ident.clone();

    let Some(repr) = repr_type(&input) else {
        return syn::Error::new_spanned(&enum_name, "ByteValue requires #[repr(u8|u16|u32)]")
            .to_compile_error()
            .into();
    };

    let Data::Enum(data_enum) = &input.data else {
        return syn::Error::new_spanned(&enum_name, "ByteValue only supports enums")
            .to_compile_error()
            .into();
    };

    let mut arms = Vec::new();
    for variant in &data_enum.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return syn::Error::new_spanned(variant, "ByteValue variants must be fieldless")
                .to_compile_error()
                .into();
        }
        let Some((_, discriminant)) = &variant.discriminant else {
            return syn::Error::new_spanned(variant, "ByteValue variants need a discriminant")
                .to_compile_error()
                .into();
        };
        let ident = &variant.ident;
        arms.push(quote! { #enum_name::#ident => #discriminant });
    }

    let output = quote! {
        impl #enum_name {
            #[allow(dead_code)]
            pub fn byte_value(&self) -> #repr {
                match self {
                    #(#arms),*
                }
            }
        }
    };

    output.into()
}

/// Implement `EncodeValue` for an enum by writing its `byte_value()`.
#[proc_macro_derive(EncodeEnum)]
pub fn derive_encode_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let enum_name = input.ident.clone();

    let Data::Enum(_) = input.data else {
        return syn::Error::new_spanned(input.ident, "EncodeEnum only supports enums")
            .to_compile_error()
            .into();
    };

    let output = quote! {
        impl EncodeValue for #enum_name {
            fn encode_to(&self, buffer: &mut Vec<u8>) -> std::io::Result<()> {
                self.byte_value().encode_to(buffer)
            }
        }
    };

    output.into()
}

/// Implement `DecodeValue` for an enum.
///
/// Reads a primitive of the `byte_value()` width and finds the matching variant
/// with `strum::IntoEnumIterator`, so the enum must also derive `EnumIter`.
/// Unknown values are `InvalidInput` errors naming the enum.
#[proc_macro_derive(DecodeEnum)]
pub fn derive_decode_enum(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let enum_name = input.ident.clone();

    let Data::Enum(_) = input.data else {
        return syn::Error::new_spanned(input.ident, "DecodeEnum only supports enums")
            .to_compile_error()
            .into();
    };

    // the value type is ambiguous once another crate adds `PartialEq<_>`
    // impls for the primitive, so pin it to the `#[repr(..)]` type
    let value_ty = match repr_type(&input) {
        Some(repr) => quote! { #repr },
        None => quote! { _ },
    };

    let output = quote! {
        impl DecodeValue for #enum_name {
            fn decode_from(buffer: &[u8]) -> std::io::Result<(Self, &[u8])> {
                let (value, buffer): (#value_ty, &[u8]) = buffer.decode_value()?;
                match <Self as strum::IntoEnumIterator>::iter().find(|e| e.byte_value() == value) {
                    Some(valid) => Ok((valid, buffer)),
                    None => Err(std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("{} is not a valid {}", value, stringify!(#enum_name)),
                    )),
                }
            }
        }
    };

    output.into()
}

/// Derive `DecodeValue` for a struct by decoding each named field in order.
///
/// Field decode errors are annotated with the field name, which makes
/// "not enough data" failures on partial server messages readable.
#[proc_macro_derive(DecodeStruct)]
pub fn derive_decode_struct(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let struct_name = input.ident;

    let Data::Struct(data_struct) = input.data else {
        return syn::Error::new_spanned(&struct_name, "DecodeStruct only supports structs")
            .to_compile_error()
            .into();
    };

    let fields = match data_struct.fields {
        Fields::Named(fields_named) => fields_named.named,
        // empty marker structs like `ExtendedMasterSecret {}` decode from nothing
        Fields::Unit => Default::default(),
        Fields::Unnamed(_) => {
            return syn::Error::new_spanned(&struct_name, "DecodeStruct requires named fields")
                .to_compile_error()
                .into();
        }
    };

    let mut decode_stmts = Vec::new();
    let mut field_bindings = Vec::new();

    for field in &fields {
        if let Some(ident) = &field.ident {
            let field_str = ident.to_string();
            decode_stmts.push(quote! {
                let (#ident, buffer) = buffer.decode_value()
                    .map_err(|e| std::io::Error::new(
                        e.kind(),
                        format!("{} while decoding `{}.{}`", e, stringify!(#struct_name), #field_str),
                    ))?;
            });
            field_bindings.push(quote! { #ident });
        }
    }

    let output = quote! {
        impl DecodeValue for #struct_name {
            #[allow(unused_mut)]
            fn decode_from(mut buffer: &[u8]) -> std::io::Result<(Self, &[u8])> {
                #(#decode_stmts)*

                let result = Self {
                    #(#field_bindings),*
                };

                Ok((result, buffer))
            }
        }
    };

    output.into()
}

/// Derive `EncodeValue` for a struct by encoding each named field in order.
#[proc_macro_derive(EncodeStruct)]
pub fn derive_encode_struct(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let struct_name = input.ident;

    let Data::Struct(data_struct) = input.data else {
        return syn::Error::new_spanned(&struct_name, "EncodeStruct only supports structs")
            .to_compile_error()
            .into();
    };

    let fields = match data_struct.fields {
        Fields::Named(fields_named) => fields_named.named,
        Fields::Unit => Default::default(),
        Fields::Unnamed(_) => {
            return syn::Error::new_spanned(&struct_name, "EncodeStruct requires named fields")
                .to_compile_error()
                .into();
        }
    };

    let encode_stmts: Vec<_> = fields
        .iter()
        .filter_map(|f| f.ident.as_ref())
        .map(|ident| {
            quote! {
                buffer.encode_value(&self.#ident)?;
            }
        })
        .collect();

    let output = quote! {
        impl EncodeValue for #struct_name {
            #[allow(unused_variables)]
            fn encode_to(&self, buffer: &mut Vec<u8>) -> std::io::Result<()> {
                #(#encode_stmts)*
                Ok(())
            }
        }
    };

    output.into()
}
