//! Derive macro for pgmodel
//!
//! Provides `#[derive(Model)]`.

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

mod model;
mod sql_ident;

/// Derive `pgmodel::Model` for a type.
///
/// # Example
///
/// ```ignore
/// use pgmodel::Model;
///
/// #[derive(Model)]
/// #[model(table = "users", timestamps)]
/// enum User {}
///
/// #[derive(Model)]
/// #[model(table = "orders")]
/// struct Order {
///     id: i64,
///     #[model(column = "total_cents")]
///     total: i64,
///     #[model(skip)]
///     cached_label: String,
/// }
/// ```
///
/// # Attributes
///
/// - `#[model(table = "name")]` - Table name (default: snake_case type name plus `s`)
/// - `#[model(fields = "a, b")]` - Default select list (default: named fields, else `*`)
/// - `#[model(timestamps)]` - Fill `created_at`/`updated_at` on save
/// - `#[model(column = "name")]` - Map a field to a different column name
/// - `#[model(skip)]` - Leave a field out of the default select list
#[proc_macro_derive(Model, attributes(model))]
pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    model::expand(input)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
