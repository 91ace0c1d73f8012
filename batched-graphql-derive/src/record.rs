//! Derive macro for records served by loaders.

use crate::helpers::{parse_docs, AttrParser};
use convert_case::{Case, Casing};
use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::{Attribute, Data, DataStruct, DeriveInput, Fields, Ident, Visibility};

/// The path of the `batched_graphql::record` module in the scope invoking the macro.
fn record_path() -> TokenStream {
    quote!(batched_graphql::record)
}

/// Generate the `Record` implementation and column markers for a struct.
pub fn derive(
    DeriveInput {
        ident,
        vis,
        generics,
        data,
        attrs,
    }: DeriveInput,
) -> TokenStream {
    if !generics.params.is_empty() {
        panic!("Record cannot be derived on generic types");
    }
    match data {
        Data::Struct(s) => generate_struct(ident, vis, attrs, s),
        _ => panic!("Record can only be derived for structs"),
    }
}

fn generate_struct(name: Ident, vis: Visibility, attrs: Vec<Attribute>, s: DataStruct) -> TokenStream {
    let record = record_path();
    let p = AttrParser::new("record");

    let Fields::Named(fields) = s.fields else {
        panic!("Record can only be derived for structs with named fields");
    };

    let name_str = name.to_string();
    let mod_name = p
        .get_arg::<Ident, _>(&attrs, "module")
        .unwrap_or_else(|| format_ident!("{}", name_str.to_case(Case::Snake)));

    // Items in the generated module must be visible wherever the record itself is.
    let item_vis = match &vis {
        Visibility::Inherited => quote!(pub(super)),
        vis => quote!(#vis),
    };

    let columns = fields
        .named
        .iter()
        .filter(|field| p.has_bool(&field.attrs, "column"))
        .map(|field| {
            let field_name = field.ident.as_ref().unwrap();
            let column = field_name.to_string();
            let marker = format_ident!("{}", column.to_case(Case::Pascal));
            let doc = match parse_docs(&field.attrs) {
                doc if doc.is_empty() => format!("The `{column}` column of a `{name_str}`."),
                doc => doc,
            };
            (field_name, column, marker, doc, &field.ty)
        })
        .collect::<Vec<_>>();

    let markers = columns.iter().map(|(_, _, marker, doc, _)| {
        quote! {
            #[doc = #doc]
            #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
            #item_vis struct #marker;
        }
    });

    // The impls live outside the generated module, so that the field types resolve exactly as
    // they were written in the struct definition.
    let impls = columns.iter().map(|(field, column, marker, _, ty)| {
        quote! {
            impl #record::Column<#name> for #mod_name::#marker {
                type Key = #ty;
                const NAME: &'static str = #column;

                fn of(record: &#name) -> &#ty {
                    &record.#field
                }
            }
        }
    });

    let mod_doc = format!("Columns of `{name_str}` which loaders can fetch by.");
    quote! {
        #[doc = #mod_doc]
        #[allow(dead_code)]
        #vis mod #mod_name {
            #(#markers)*
        }

        #(#impls)*

        impl #record::Record for #name {
            const NAME: &'static str = #name_str;
        }
    }
}
