//! Model derive macro implementation

use crate::sql_ident::{is_valid_sql_ident, parse_field_list, parse_table};
use heck::ToSnakeCase;
use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Fields, LitStr, Result};

/// Struct-level `#[model(...)]` settings.
#[derive(Default)]
struct ModelAttrs {
    table: Option<String>,
    fields: Option<Vec<String>>,
    timestamps: bool,
}

fn parse_model_attrs(input: &DeriveInput) -> Result<ModelAttrs> {
    let mut attrs = ModelAttrs::default();
    for attr in &input.attrs {
        if !attr.path().is_ident("model") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("table") {
                let lit: LitStr = meta.value()?.parse()?;
                attrs.table = Some(parse_table(&lit)?);
            } else if meta.path.is_ident("fields") {
                let lit: LitStr = meta.value()?.parse()?;
                attrs.fields = Some(parse_field_list(&lit)?);
            } else if meta.path.is_ident("timestamps") {
                attrs.timestamps = true;
            } else {
                return Err(meta.error("expected `table`, `fields` or `timestamps`"));
            }
            Ok(())
        })?;
    }
    Ok(attrs)
}

/// The column a named field maps to, or `None` for `#[model(skip)]`.
fn field_column(field: &syn::Field) -> Result<Option<String>> {
    let mut column = None;
    let mut skip = false;
    for attr in &field.attrs {
        if !attr.path().is_ident("model") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("column") {
                let lit: LitStr = meta.value()?.parse()?;
                let value = lit.value();
                if !is_valid_sql_ident(&value) {
                    return Err(syn::Error::new(
                        lit.span(),
                        "column must be a valid SQL identifier (expected [A-Za-z_][A-Za-z0-9_]*)",
                    ));
                }
                column = Some(value);
            } else if meta.path.is_ident("skip") {
                skip = true;
            } else {
                return Err(meta.error("expected `column` or `skip`"));
            }
            Ok(())
        })?;
    }

    if skip {
        return Ok(None);
    }
    let Some(ident) = &field.ident else {
        return Ok(None);
    };
    Ok(Some(column.unwrap_or_else(|| {
        syn::ext::IdentExt::unraw(ident).to_string()
    })))
}

/// `UserAccount` -> `user_accounts`.
fn default_table(name: &syn::Ident) -> String {
    let snake = name.to_string().to_snake_case();
    if snake.ends_with('s') {
        snake
    } else {
        format!("{snake}s")
    }
}

pub fn expand(input: DeriveInput) -> Result<TokenStream> {
    let name = &input.ident;
    let attrs = parse_model_attrs(&input)?;

    let table = attrs.table.unwrap_or_else(|| default_table(name));

    let fields = match attrs.fields {
        Some(fields) => Some(fields),
        None => match &input.data {
            Data::Struct(data) => match &data.fields {
                Fields::Named(named) => {
                    let mut columns = Vec::new();
                    for field in &named.named {
                        if let Some(column) = field_column(field)? {
                            columns.push(column);
                        }
                    }
                    (!columns.is_empty()).then_some(columns)
                }
                _ => None,
            },
            Data::Enum(_) => None,
            Data::Union(_) => {
                return Err(syn::Error::new_spanned(
                    &input,
                    "Model cannot be derived for unions",
                ));
            }
        },
    };

    let fields_const = fields.map(|fields| {
        quote! {
            const FIELDS: &'static [&'static str] = &[#(#fields),*];
        }
    });
    let timestamps = attrs.timestamps;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::pgmodel::Model for #name #ty_generics #where_clause {
            const TABLE: &'static str = #table;
            #fields_const
            const UPDATE_TIMESTAMPS: bool = #timestamps;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::parse_quote;

    fn expand_str(input: DeriveInput) -> String {
        expand(input).unwrap().to_string().replace(' ', "")
    }

    #[test]
    fn enum_with_explicit_table() {
        let out = expand_str(parse_quote! {
            #[model(table = "users", timestamps)]
            enum User {}
        });
        assert!(out.contains(r#"constTABLE:&'staticstr="users";"#), "{out}");
        assert!(!out.contains("FIELDS"), "{out}");
        assert!(out.contains("constUPDATE_TIMESTAMPS:bool=true;"), "{out}");
    }

    #[test]
    fn struct_fields_become_default_select_list() {
        let out = expand_str(parse_quote! {
            struct OrderLine {
                id: i64,
                #[model(column = "total_cents")]
                total: i64,
                #[model(skip)]
                label: String,
                r#type: String,
            }
        });
        assert!(out.contains(r#""order_lines""#), "{out}");
        assert!(out.contains(r#"&["id","total_cents","type"]"#), "{out}");
        assert!(out.contains("constUPDATE_TIMESTAMPS:bool=false;"), "{out}");
    }

    #[test]
    fn explicit_fields_win() {
        let out = expand_str(parse_quote! {
            #[model(table = "accounts", fields = "id, email")]
            struct Account {
                id: i64,
                email: String,
                password_hash: String,
            }
        });
        assert!(out.contains(r#"&["id","email"]"#), "{out}");
    }

    #[test]
    fn default_table_pluralizes_once() {
        assert_eq!(default_table(&parse_quote!(UserAccount)), "user_accounts");
        assert_eq!(default_table(&parse_quote!(Address)), "address");
        assert_eq!(default_table(&parse_quote!(Status)), "status");
    }

    #[test]
    fn rejects_bad_attributes() {
        let bad: DeriveInput = parse_quote! {
            #[model(table = "users; drop table users")]
            enum User {}
        };
        assert!(expand(bad).is_err());

        let unknown: DeriveInput = parse_quote! {
            #[model(primary_key = "id")]
            enum User {}
        };
        assert!(expand(unknown).is_err());
    }
}
