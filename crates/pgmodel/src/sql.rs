//! Placeholder-tracking SQL assembly.
//!
//! [`PgQueryBuilder`](crate::pg::PgQueryBuilder) renders its accumulated
//! clauses into an [`Sql`] at terminal time, so `$1, $2, ...` are numbered in
//! the order values were pushed regardless of which clause they came from.
//!
//! ```
//! use pgmodel::Sql;
//!
//! let mut q = Sql::new("SELECT * FROM users WHERE age > ");
//! q.push_bind(18).push(" AND name = ").push_bind("Amy");
//! assert_eq!(q.to_sql(), "SELECT * FROM users WHERE age > $1 AND name = $2");
//! ```

use crate::error::{ModelError, ModelResult};
use crate::value::Value;
use tokio_postgres::types::ToSql;

#[derive(Debug)]
enum SqlPart {
    Raw(String),
    Param,
}

/// A SQL string under construction together with its bound values.
#[derive(Debug)]
pub struct Sql {
    parts: Vec<SqlPart>,
    params: Vec<Value>,
}

/// Skip whitespace, `--` and `/* */` comments and opening parentheses in
/// front of the first keyword of a raw statement.
pub(crate) fn strip_sql_prefix(sql: &str) -> &str {
    let mut s = sql;
    loop {
        let before = s;
        s = s.trim_start();
        if s.starts_with("--") {
            if let Some(pos) = s.find('\n') {
                s = &s[pos + 1..];
                continue;
            }
            return "";
        }
        if s.starts_with("/*") {
            if let Some(pos) = s.find("*/") {
                s = &s[pos + 2..];
                continue;
            }
            return "";
        }
        if let Some(rest) = s.strip_prefix('(') {
            s = rest;
            continue;
        }
        if s == before {
            break;
        }
    }
    s
}

/// Whether `sql` is a statement that produces a result set.
pub(crate) fn returns_rows(sql: &str) -> bool {
    let head = strip_sql_prefix(sql);
    let keyword: String = head
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase();
    matches!(
        keyword.as_str(),
        "SELECT" | "WITH" | "VALUES" | "SHOW" | "TABLE" | "EXPLAIN"
    ) || head
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .any(|word| word.eq_ignore_ascii_case("RETURNING"))
}

impl Sql {
    /// Start a statement with `initial_sql`.
    pub fn new(initial_sql: impl Into<String>) -> Self {
        Self {
            parts: vec![SqlPart::Raw(initial_sql.into())],
            params: Vec::new(),
        }
    }

    pub fn empty() -> Self {
        Self {
            parts: Vec::new(),
            params: Vec::new(),
        }
    }

    /// Append literal SQL text.
    pub fn push(&mut self, sql: &str) -> &mut Self {
        if sql.is_empty() {
            return self;
        }

        match self.parts.last_mut() {
            Some(SqlPart::Raw(last)) => last.push_str(sql),
            _ => self.parts.push(SqlPart::Raw(sql.to_string())),
        }
        self
    }

    /// Append the next `$n` placeholder bound to `value`.
    pub fn push_bind(&mut self, value: impl Into<Value>) -> &mut Self {
        self.parts.push(SqlPart::Param);
        self.params.push(value.into());
        self
    }

    /// Append `$a, $b, ...` for `values`; an empty list renders as `NULL`.
    pub fn push_bind_list<T: Into<Value>>(
        &mut self,
        values: impl IntoIterator<Item = T>,
    ) -> &mut Self {
        let mut iter = values.into_iter();
        let Some(first) = iter.next() else {
            return self.push("NULL");
        };

        self.push_bind(first);
        for v in iter {
            self.push(", ");
            self.push_bind(v);
        }
        self
    }

    /// Append a rendered fragment, renumbering its placeholders.
    pub fn push_sql(&mut self, mut other: Sql) -> &mut Self {
        self.parts.append(&mut other.parts);
        self.params.append(&mut other.params);
        self
    }

    /// Append `items` separated by `sep`, rendering each with `f`.
    pub fn push_separated<T>(
        &mut self,
        items: impl IntoIterator<Item = T>,
        sep: &str,
        mut f: impl FnMut(&mut Self, T) -> ModelResult<()>,
    ) -> ModelResult<&mut Self> {
        for (i, item) in items.into_iter().enumerate() {
            if i > 0 {
                self.push(sep);
            }
            f(self, item)?;
        }
        Ok(self)
    }

    /// Append a table or column name after checking it.
    ///
    /// Every `.`-separated segment must match `[A-Za-z_][A-Za-z0-9_]*`; a
    /// trailing `*` segment is allowed for `table.*`.
    pub fn push_ident(&mut self, ident: &str) -> ModelResult<&mut Self> {
        validate_ident(ident)?;
        Ok(self.push(ident))
    }

    /// The statement text, placeholders numbered from `$1`.
    pub fn to_sql(&self) -> String {
        use std::fmt::Write;

        let mut text = String::new();
        let mut placeholder = 0_usize;
        for part in &self.parts {
            match part {
                SqlPart::Raw(raw) => text.push_str(raw),
                SqlPart::Param => {
                    placeholder += 1;
                    let _ = write!(text, "${placeholder}");
                }
            }
        }
        text
    }

    /// Bound values in placeholder order.
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Bound values in the form `tokio_postgres` executes with.
    pub fn params_ref(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.params
            .iter()
            .map(|p| p as &(dyn ToSql + Sync))
            .collect()
    }
}

/// Check that `ident` is a plain, optionally qualified SQL identifier.
pub(crate) fn validate_ident(ident: &str) -> ModelResult<()> {
    let invalid = || ModelError::validation(format!("invalid identifier '{ident}'"));
    if ident.is_empty() {
        return Err(ModelError::validation("empty identifier"));
    }

    let segments: Vec<&str> = ident.split('.').collect();
    for (i, seg) in segments.iter().enumerate() {
        if *seg == "*" && i == segments.len() - 1 {
            continue;
        }
        let mut chars = seg.chars();
        let Some(first) = chars.next() else {
            return Err(invalid());
        };
        if !(first == '_' || first.is_ascii_alphabetic()) {
            return Err(invalid());
        }
        if !chars.all(|c| c == '_' || c.is_ascii_alphanumeric()) {
            return Err(invalid());
        }
    }
    Ok(())
}
