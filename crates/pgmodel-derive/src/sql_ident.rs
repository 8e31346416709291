use std::collections::HashSet;

use syn::{Error, LitStr, Result};

pub(crate) fn is_valid_sql_ident(s: &str) -> bool {
    let mut chars = s.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A table name, optionally schema-qualified.
pub(crate) fn parse_table(lit: &LitStr) -> Result<String> {
    let table = lit.value().trim().to_string();
    if table.is_empty() || !table.split('.').all(is_valid_sql_ident) {
        return Err(Error::new(
            lit.span(),
            "table must be a valid SQL identifier (expected [A-Za-z_][A-Za-z0-9_]*, optionally schema-qualified)",
        ));
    }
    Ok(table)
}

/// A comma-separated column list; `*` is accepted on its own.
pub(crate) fn parse_field_list(lit: &LitStr) -> Result<Vec<String>> {
    let cols: Vec<String> = lit
        .value()
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if cols.is_empty() {
        return Err(Error::new(
            lit.span(),
            "fields must specify at least one column",
        ));
    }
    if cols.len() == 1 && cols[0] == "*" {
        return Ok(cols);
    }

    let mut seen = HashSet::<&str>::new();
    for col in &cols {
        if !is_valid_sql_ident(col) {
            return Err(Error::new(
                lit.span(),
                format!(
                    "fields contains invalid SQL identifier '{col}' (expected [A-Za-z_][A-Za-z0-9_]*)"
                ),
            ));
        }
        if !seen.insert(col) {
            return Err(Error::new(
                lit.span(),
                format!("fields contains duplicate column '{col}'"),
            ));
        }
    }

    Ok(cols)
}
