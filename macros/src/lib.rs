//! Derive macro for [`DBusType`][dbus_wire::ty::DBusType].
//!
//! Structs derive as a D-Bus `STRUCT`: fields are encoded in declaration
//! order inside an 8-byte aligned struct, exactly the way
//! `dbus_wire::ty`'s tuple impls already do by hand. This macro exists so
//! application-defined record types don't need to be rewritten as tuples
//! to participate in the wire format.
//!
//! Fieldless enums derive as a `UINT32` code, one constant per variant in
//! declaration order, matching the pattern already used by hand for types
//! like `NameReply` in `dbus_wire::org_freedesktop_dbus`.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, Index};

/// Derive [`DBusType`][dbus_wire::ty::DBusType] for a struct or fieldless enum.
#[proc_macro_derive(DBusType)]
pub fn derive_dbus_type(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    let expanded = match &input.data {
        Data::Struct(data) => derive_struct(&input, data),
        Data::Enum(data) => derive_enum(&input, data),
        Data::Union(_) => {
            syn::Error::new_spanned(&input, "`DBusType` cannot be derived for unions")
                .to_compile_error()
        }
    };

    TokenStream::from(expanded)
}

fn derive_struct(input: &DeriveInput, data: &syn::DataStruct) -> proc_macro2::TokenStream {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let field_types: Vec<_> = data.fields.iter().map(|field| &field.ty).collect();

    let field_accessors: Vec<proc_macro2::TokenStream> = match &data.fields {
        Fields::Named(fields) => fields
            .named
            .iter()
            .map(|field| {
                let ident = field.ident.as_ref().unwrap();
                quote!(&self.#ident)
            })
            .collect(),
        Fields::Unnamed(fields) => (0..fields.unnamed.len())
            .map(|index| {
                let index = Index::from(index);
                quote!(&self.#index)
            })
            .collect(),
        Fields::Unit => Vec::new(),
    };

    let field_idents: Vec<proc_macro2::Ident> = (0..field_types.len())
        .map(|index| quote::format_ident!("__field_{index}"))
        .collect();

    let build_pattern = match &data.fields {
        Fields::Named(fields) => {
            let names = fields.named.iter().map(|field| field.ident.as_ref().unwrap());
            let idents = &field_idents;
            quote!(#name { #(#names: #idents),* })
        }
        Fields::Unnamed(_) => {
            let idents = &field_idents;
            quote!(#name(#(#idents),*))
        }
        Fields::Unit => quote!(#name),
    };

    quote! {
        #[automatically_derived]
        impl #impl_generics ::dbus_wire::ty::DBusType for #name #ty_generics #where_clause {
            fn write_signature(
                builder: &mut ::dbus_wire::SignatureBuilder,
            ) -> ::dbus_wire::Result<()> {
                builder.open_struct()?;
                #(<#field_types as ::dbus_wire::ty::DBusType>::write_signature(builder)?;)*
                builder.close_struct()?;
                Ok(())
            }

            fn encode(&self, buf: &mut ::dbus_wire::BodyBuf) -> ::dbus_wire::Result<()> {
                buf.store_struct(|buf| -> ::dbus_wire::Result<()> {
                    #(::dbus_wire::ty::DBusType::encode(#field_accessors, buf)?;)*
                    Ok(())
                })?;
                Ok(())
            }

            fn decode(body: &mut ::dbus_wire::Body<'_>) -> ::dbus_wire::Result<Self> {
                body.load_struct()?;
                #(let #field_idents = <#field_types as ::dbus_wire::ty::DBusType>::decode(body)?;)*
                Ok(#build_pattern)
            }
        }
    }
}

fn derive_enum(input: &DeriveInput, data: &syn::DataEnum) -> proc_macro2::TokenStream {
    let name = &input.ident;

    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            return syn::Error::new_spanned(
                variant,
                "`DBusType` can only be derived for enums where every variant is fieldless",
            )
            .to_compile_error();
        }
    }

    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let variant_idents: Vec<_> = data.variants.iter().map(|variant| &variant.ident).collect();
    let codes: Vec<u32> = (0..variant_idents.len() as u32).collect();

    quote! {
        #[automatically_derived]
        impl #impl_generics ::dbus_wire::ty::DBusType for #name #ty_generics #where_clause {
            fn write_signature(
                builder: &mut ::dbus_wire::SignatureBuilder,
            ) -> ::dbus_wire::Result<()> {
                <u32 as ::dbus_wire::ty::DBusType>::write_signature(builder)
            }

            fn encode(&self, buf: &mut ::dbus_wire::BodyBuf) -> ::dbus_wire::Result<()> {
                let code: u32 = match self {
                    #(#name::#variant_idents => #codes,)*
                };
                ::dbus_wire::ty::DBusType::encode(&code, buf)
            }

            fn decode(body: &mut ::dbus_wire::Body<'_>) -> ::dbus_wire::Result<Self> {
                let code = <u32 as ::dbus_wire::ty::DBusType>::decode(body)?;
                match code {
                    #(#codes => Ok(#name::#variant_idents),)*
                    _ => Err(::dbus_wire::Error::signature_mismatch()),
                }
            }
        }
    }
}
