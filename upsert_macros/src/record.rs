use std::collections::HashSet;
use proc_macro2::TokenStream;
use syn::{Error, DeriveInput, Data, Fields, FieldsNamed, Ident, Type};
use syn::ext::IdentExt;
use quote::quote;
use heck::AsSnakeCase;
use crate::util::{ContainerAttributes, FieldAttributes, CaseConversion, ParamPrefix};


pub fn expand(ts: TokenStream) -> Result<TokenStream, Error> {
    let input: DeriveInput = syn::parse2(ts)?;
    let attrs: ContainerAttributes = deluxe::parse_attributes(&input)?;

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => fields,
            Fields::Unnamed(_) => {
                return Err(Error::new_spanned(
                    &input.ident,
                    "#[derive(Record)] requires named fields; tuple structs have no column names",
                ));
            }
            Fields::Unit => {
                return Err(Error::new_spanned(
                    &input.ident,
                    "#[derive(Record)] is not supported for unit structs",
                ));
            }
        },
        Data::Enum(_) => {
            return Err(Error::new_spanned(&input.ident, "#[derive(Record)] is not supported for enums"));
        }
        Data::Union(_) => {
            return Err(Error::new_spanned(&input.ident, "#[derive(Record)] is not supported for unions"));
        }
    };

    if attrs.param_prefix == Some(ParamPrefix::Question) {
        return Err(Error::new_spanned(
            &input.ident,
            "parameter prefix `?` is positional; use one of `:`, `@`, `$`",
        ));
    }

    let record_fields = classify_fields(fields, &attrs)?;

    if !record_fields.iter().any(|f| f.is_key) {
        return Err(Error::new_spanned(
            &input.ident,
            "a record needs at least one `#[upsert(key)]` field",
        ));
    }

    let ty_name = &input.ident;
    let (impl_gen, ty_gen, where_clause) = input.generics.split_for_impl();

    let table_name = attrs.table.as_ref().map_or_else(
        || AsSnakeCase(ty_name.unraw().to_string()).to_string(),
        <_>::to_string,
    );
    let prefix = attrs.param_prefix.unwrap_or(ParamPrefix::Colon);

    let descriptors = record_fields.iter().map(RecordField::descriptor);

    // composites have no `ToSql` impl, and no column of their own to read
    let param_arms = record_fields
        .iter()
        .filter(|f| (!f.is_omitted || f.is_bound) && !f.is_composite)
        .map(|f| {
            let RecordField { ident, column, .. } = f;
            quote!(#column => ::core::option::Option::Some(&self.#ident as &dyn ::upsert::ToSql))
        });

    let scanned = record_fields.iter().map(|f| {
        let RecordField { ident, column, .. } = f;

        if f.is_omitted || f.is_composite {
            quote!(#ident: ::core::clone::Clone::clone(&self.#ident))
        } else {
            quote!(#ident: row.get(#column).map_err(::upsert::Error::decode)?)
        }
    });

    // value expressions are compared by the database
    let writable = record_fields
        .iter()
        .filter(|f| !f.is_key && !f.is_omitted && f.value.is_none())
        .map(|f| &f.ident);

    Ok(quote!{
        impl #impl_gen ::upsert::Record for #ty_name #ty_gen #where_clause {
            fn description() -> ::upsert::RecordDesc {
                ::upsert::RecordDesc::new(#table_name)
                    .param_prefix(::upsert::ParamPrefix::#prefix)
                    #(.field(#descriptors))*
            }

            fn param(&self, name: &str) -> ::core::option::Option<&dyn ::upsert::ToSql> {
                match name {
                    #(#param_arms,)*
                    _ => ::core::option::Option::None,
                }
            }

            fn scan_row(&self, row: &::upsert::Row<'_>) -> ::upsert::Result<Self> {
                ::upsert::Result::Ok(Self {
                    #(#scanned,)*
                })
            }

            fn writable_eq(&self, other: &Self) -> bool {
                true #(&& ::core::cmp::PartialEq::eq(&self.#writable, &other.#writable))*
            }
        }
    })
}

/// A field with its attributes interpreted and checked.
struct RecordField {
    ident: Ident,
    column: String,
    rename: Option<String>,
    is_key: bool,
    is_natural: bool,
    is_omitted: bool,
    is_bound: bool,
    is_composite: bool,
    value: Option<TokenStream>,
}

impl RecordField {
    /// The `::upsert::Field` builder expression describing this field.
    fn descriptor(&self) -> TokenStream {
        let ident_str = self.ident.unraw().to_string();
        let mut desc = quote!(::upsert::Field::new(#ident_str));

        if let Some(rename) = &self.rename {
            desc = quote!(#desc.rename(#rename));
        }
        if self.is_key {
            desc = quote!(#desc.key());
        }
        if self.is_natural {
            desc = quote!(#desc.natural());
        }
        if self.is_omitted {
            desc = quote!(#desc.omit());
        }
        if let Some(value) = &self.value {
            desc = quote!(#desc.value_expr(#value));
        }
        if self.is_composite {
            desc = quote!(#desc.composite());
        }
        if self.is_bound {
            desc = quote!(#desc.bind(true));
        }

        desc
    }
}

fn classify_fields(
    fields: &FieldsNamed,
    attrs: &ContainerAttributes,
) -> Result<Vec<RecordField>, Error> {
    let mut record_fields = Vec::with_capacity(fields.named.len());
    let mut columns = HashSet::with_capacity(fields.named.len());

    for field in &fields.named {
        let field_attrs: FieldAttributes = deluxe::parse_attributes(field)?;
        let ident = field.ident.clone().ok_or_else(|| {
            Error::new_spanned(field, "named field has no name")
        })?;

        let is_key = field_attrs.key;
        let is_natural = field_attrs.natural;
        let is_omitted = field_attrs.omit;
        let is_bound = field_attrs.bind;
        let is_composite = is_composite(&field.ty);

        if is_key && is_omitted {
            return Err(Error::new_spanned(
                &ident,
                "a field can't be both `key` and `omit`",
            ));
        }
        if is_natural && !is_key {
            return Err(Error::new_spanned(
                &ident,
                "`natural` only applies to `key` fields",
            ));
        }
        if is_bound && !is_omitted {
            return Err(Error::new_spanned(
                &ident,
                "`bind` only applies to `omit`ted fields; other fields are always bound",
            ));
        }
        if is_composite && !is_omitted && field_attrs.value.is_none() {
            return Err(Error::new_spanned(
                &ident,
                "nested field must be `omit`ted or have a `value` expression",
            ));
        }

        // Raw identifiers name their column by the non-raw part.
        // An explicit rename, or a case conversion other than the
        // default lower-casing, is passed on as the column name.
        let rename = match (&field_attrs.rename, attrs.rename_all) {
            (Some(rename), _) => Some(rename.to_string()),
            (None, CaseConversion::Lowercase) => None,
            (None, conversion) => Some(conversion.apply(&ident.unraw().to_string())),
        };
        let column = rename
            .clone()
            .unwrap_or_else(|| ident.unraw().to_string().to_lowercase());

        if !columns.insert(column.clone()) {
            return Err(Error::new_spanned(
                &ident,
                format_args!("more than one field maps to column `{column}`"),
            ));
        }

        record_fields.push(RecordField {
            ident,
            column,
            rename,
            is_key,
            is_natural,
            is_omitted,
            is_bound,
            is_composite,
            value: field_attrs.value.as_ref().map(|value| quote!(#value)),
        });
    }

    Ok(record_fields)
}

/// Tuples and arrays can't be bound as a single SQL value.
/// Byte arrays are the exception, they are stored as blobs.
fn is_composite(ty: &Type) -> bool {
    match ty {
        Type::Tuple(tuple) => !tuple.elems.is_empty(),
        Type::Array(array) => !matches!(&*array.elem, Type::Path(p) if p.path.is_ident("u8")),
        Type::Paren(paren) => is_composite(&paren.elem),
        Type::Group(group) => is_composite(&group.elem),
        _ => false,
    }
}
