//! Rendering of accumulated clauses into SQL.
//!
//! Clauses are stored as plain data while a chain is being built and only
//! validated here, when a terminal call needs the statement.

use crate::config::BuilderConfig;
use crate::connection::{Direction, JoinKind};
use crate::error::{ModelError, ModelResult};
use crate::sql::{Sql, validate_ident};
use crate::value::{Record, Value};
use chrono::Utc;

/// Operators accepted by the three-argument filter form.
pub const COMPARISON_OPERATORS: &[&str] = &[
    "=", "!=", "<>", "<", "<=", ">", ">=", "LIKE", "NOT LIKE", "ILIKE", "NOT ILIKE", "IS",
    "IS NOT",
];

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Join {
    pub(crate) kind: JoinKind,
    pub(crate) table: String,
    pub(crate) on: String,
    pub(crate) fields: Vec<String>,
}

/// Everything a chain has told the builder since the last terminal call.
#[derive(Debug, Clone, Default)]
pub(crate) struct Clauses {
    pub(crate) table: Option<String>,
    pub(crate) fields: Vec<String>,
    pub(crate) joins: Vec<Join>,
    pub(crate) filters: Vec<Vec<Value>>,
    pub(crate) orders: Vec<(String, Direction)>,
    pub(crate) limit: Option<(u64, u64)>,
    pub(crate) distinct: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Select {
    All,
    First,
    Count,
}

impl Clauses {
    fn table(&self) -> ModelResult<&str> {
        let table = self
            .table
            .as_deref()
            .ok_or_else(|| ModelError::validation("no table bound to the query"))?;
        validate_ident(table)?;
        Ok(table)
    }

    fn reject_joins(&self, op: &str) -> ModelResult<()> {
        if self.joins.is_empty() {
            Ok(())
        } else {
            Err(ModelError::validation(format!("{op} does not support joins")))
        }
    }

    pub(crate) fn select(&self, mode: Select) -> ModelResult<Sql> {
        let table = self.table()?;

        let mut sql = Sql::new("SELECT ");
        if mode == Select::Count && !self.distinct {
            sql.push("COUNT(*)");
        } else {
            if self.distinct {
                sql.push("DISTINCT ");
            }
            self.push_fields(&mut sql)?;
        }
        sql.push(" FROM ").push(table);
        self.push_joins(&mut sql)?;
        self.push_where(&mut sql)?;

        if mode == Select::Count {
            if self.distinct {
                let mut outer = Sql::new("SELECT COUNT(*) FROM (");
                outer.push_sql(sql).push(") AS distinct_rows");
                return Ok(outer);
            }
            return Ok(sql);
        }

        self.push_order(&mut sql)?;
        match (mode, self.limit) {
            (Select::First, limit) => {
                let offset = limit.map_or(0, |(max, page)| offset(max, page));
                push_limit(&mut sql, 1, offset);
            }
            (_, Some((max, page))) => push_limit(&mut sql, max, offset(max, page)),
            _ => {}
        }
        Ok(sql)
    }

    pub(crate) fn save(
        &self,
        mut data: Record,
        config: &BuilderConfig,
        auto_timestamp: bool,
    ) -> ModelResult<Sql> {
        let table = self.table()?;
        self.reject_joins("save")?;

        let update = !self.filters.is_empty();
        if auto_timestamp {
            stamp(&mut data, config, !update);
        }
        if data.is_empty() {
            return Err(ModelError::validation("save needs at least one column"));
        }

        let mut sql = if update {
            let mut sql = Sql::new(format!("UPDATE {table} SET "));
            sql.push_separated(data, ", ", |sql, (column, value)| {
                sql.push_ident(&column)?.push(" = ").push_bind(value);
                Ok(())
            })?;
            self.push_where(&mut sql)?;
            sql
        } else {
            let mut sql = Sql::new(format!("INSERT INTO {table} ("));
            push_columns(&mut sql, data.keys())?;
            sql.push(") VALUES (");
            sql.push_bind_list(data.into_values());
            sql.push(")");
            sql
        };
        sql.push(" RETURNING *");
        Ok(sql)
    }

    pub(crate) fn save_bulk(
        &self,
        mut data: Vec<Record>,
        fields: Option<Vec<String>>,
        ids: Option<Vec<Value>>,
        key: Option<String>,
        config: &BuilderConfig,
        auto_timestamp: bool,
    ) -> ModelResult<Sql> {
        let table = self.table()?;
        self.reject_joins("save_bulk")?;

        let Some(first) = data.first() else {
            return Err(ModelError::validation("save_bulk needs at least one row"));
        };
        let mut fields = fields.unwrap_or_else(|| first.keys().cloned().collect());

        let Some(ids) = ids else {
            if auto_timestamp {
                for column in [&config.created_at_column, &config.updated_at_column] {
                    if !fields.contains(column) {
                        fields.push(column.clone());
                    }
                }
                for row in &mut data {
                    stamp(row, config, true);
                }
            }
            if fields.is_empty() {
                return Err(ModelError::validation("save_bulk needs at least one column"));
            }

            let mut sql = Sql::new(format!("INSERT INTO {table} ("));
            push_columns(&mut sql, &fields)?;
            sql.push(") VALUES ");
            sql.push_separated(data, ", ", |sql, mut row| {
                sql.push("(");
                sql.push_bind_list(
                    fields
                        .iter()
                        .map(|f| row.remove(f).unwrap_or(Value::Null)),
                );
                sql.push(")");
                Ok(())
            })?;
            sql.push(" RETURNING *");
            return Ok(sql);
        };

        if ids.len() != data.len() {
            return Err(ModelError::validation(format!(
                "save_bulk got {} ids for {} rows",
                ids.len(),
                data.len()
            )));
        }
        let key = key.unwrap_or_else(|| config.bulk_key.clone());
        validate_ident(&key)?;
        fields.retain(|f| *f != key);

        let mut sql = Sql::new(format!("UPDATE {table} SET "));
        let mut assignments = 0;
        for field in &fields {
            validate_ident(field)?;
            let cases: Vec<(&Value, &Value)> = ids
                .iter()
                .zip(&data)
                .filter_map(|(id, row)| row.get(field).map(|value| (id, value)))
                .collect();
            if cases.is_empty() {
                continue;
            }

            if assignments > 0 {
                sql.push(", ");
            }
            sql.push(field).push(" = CASE ").push(&key);
            for (id, value) in cases {
                sql.push(" WHEN ")
                    .push_bind(id.clone())
                    .push(" THEN ")
                    .push_bind(value.clone());
            }
            sql.push(" ELSE ").push(field).push(" END");
            assignments += 1;
        }
        if auto_timestamp && !fields.contains(&config.updated_at_column) {
            validate_ident(&config.updated_at_column)?;
            if assignments > 0 {
                sql.push(", ");
            }
            sql.push(&config.updated_at_column)
                .push(" = ")
                .push_bind(Utc::now());
            assignments += 1;
        }
        if assignments == 0 {
            return Err(ModelError::validation("save_bulk has no columns to update"));
        }

        sql.push(" WHERE ").push(&key).push(" IN (");
        sql.push_bind_list(ids);
        sql.push(")");
        for filter in &self.filters {
            sql.push(" AND ");
            push_filter(&mut sql, filter)?;
        }
        sql.push(" RETURNING *");
        Ok(sql)
    }

    pub(crate) fn delete(&self, config: &BuilderConfig) -> ModelResult<Sql> {
        let table = self.table()?;
        self.reject_joins("delete")?;
        if self.filters.is_empty() && !config.allow_unfiltered_delete {
            return Err(ModelError::validation(
                "delete without filters would remove every row; \
                 set BuilderConfig::allow_unfiltered_delete to allow it",
            ));
        }

        let mut sql = Sql::new(format!("DELETE FROM {table}"));
        self.push_where(&mut sql)?;
        Ok(sql)
    }

    fn push_fields(&self, sql: &mut Sql) -> ModelResult<()> {
        let join_fields = self.joins.iter().flat_map(|j| j.fields.iter());
        let fields: Vec<&String> = self.fields.iter().chain(join_fields).collect();
        if fields.is_empty() {
            sql.push("*");
            return Ok(());
        }
        sql.push_separated(fields, ", ", |sql, field| push_field(sql, field))?;
        Ok(())
    }

    fn push_joins(&self, sql: &mut Sql) -> ModelResult<()> {
        for join in &self.joins {
            if join.on.trim().is_empty() {
                return Err(ModelError::validation(format!(
                    "join on '{}' has an empty condition",
                    join.table
                )));
            }
            sql.push(" ").push(join.kind.as_sql()).push(" ");
            sql.push_ident(&join.table)?;
            sql.push(" ON ").push(&join.on);
        }
        Ok(())
    }

    fn push_where(&self, sql: &mut Sql) -> ModelResult<()> {
        if self.filters.is_empty() {
            return Ok(());
        }
        sql.push(" WHERE ");
        sql.push_separated(&self.filters, " AND ", |sql, filter| push_filter(sql, filter))?;
        Ok(())
    }

    fn push_order(&self, sql: &mut Sql) -> ModelResult<()> {
        if self.orders.is_empty() {
            return Ok(());
        }
        sql.push(" ORDER BY ");
        sql.push_separated(&self.orders, ", ", |sql, (field, direction)| {
            sql.push_ident(field)?.push(" ").push(direction.as_sql());
            Ok(())
        })?;
        Ok(())
    }
}

/// Fill the timestamp columns the record does not set itself.
fn stamp(record: &mut Record, config: &BuilderConfig, inserting: bool) {
    let now = Value::Timestamp(Utc::now());
    if inserting {
        record
            .entry(config.created_at_column.clone())
            .or_insert_with(|| now.clone());
    }
    record
        .entry(config.updated_at_column.clone())
        .or_insert(now);
}

fn offset(max: u64, page: u64) -> u64 {
    max.saturating_mul(page.max(1) - 1)
}

fn push_limit(sql: &mut Sql, max: u64, offset: u64) {
    sql.push(&format!(" LIMIT {max} OFFSET {offset}"));
}

fn push_columns<S: AsRef<str>>(
    sql: &mut Sql,
    columns: impl IntoIterator<Item = S>,
) -> ModelResult<()> {
    sql.push_separated(columns, ", ", |sql, column| {
        sql.push_ident(column.as_ref())?;
        Ok(())
    })?;
    Ok(())
}

/// A select-list entry: `*`, `column`, `table.column`, `table.*`, or any of
/// those followed by `AS alias`.
fn push_field(sql: &mut Sql, field: &str) -> ModelResult<()> {
    let field = field.trim();
    if field == "*" {
        sql.push("*");
        return Ok(());
    }
    match field.to_ascii_lowercase().find(" as ") {
        Some(pos) => {
            sql.push_ident(field[..pos].trim())?;
            sql.push(" AS ");
            sql.push_ident(field[pos + 4..].trim())?;
        }
        None => {
            sql.push_ident(field)?;
        }
    }
    Ok(())
}

fn push_filter(sql: &mut Sql, args: &[Value]) -> ModelResult<()> {
    match args {
        [] => Err(ModelError::validation("filter needs at least one argument")),
        [Value::Text(template), values @ ..] if template.contains('?') => {
            push_template(sql, template, values)
        }
        [Value::Text(condition)] => {
            if condition.trim().is_empty() {
                return Err(ModelError::validation("filter condition is empty"));
            }
            sql.push("(").push(condition).push(")");
            Ok(())
        }
        [Value::Text(column), value] => push_comparison(sql, column, "=", value),
        [Value::Text(column), Value::Text(op), value] => push_comparison(sql, column, op, value),
        _ => Err(ModelError::validation(format!(
            "unsupported filter arguments: {args:?}"
        ))),
    }
}

/// `("age > ? AND name = ?", 18, "Amy")`: each `?` binds the next value.
fn push_template(sql: &mut Sql, template: &str, values: &[Value]) -> ModelResult<()> {
    let pieces: Vec<&str> = template.split('?').collect();
    if pieces.len() - 1 != values.len() {
        return Err(ModelError::validation(format!(
            "filter '{template}' has {} placeholders but {} values",
            pieces.len() - 1,
            values.len()
        )));
    }

    sql.push("(");
    for (i, piece) in pieces.iter().enumerate() {
        sql.push(piece);
        if let Some(value) = values.get(i) {
            sql.push_bind(value.clone());
        }
    }
    sql.push(")");
    Ok(())
}

fn push_comparison(sql: &mut Sql, column: &str, op: &str, value: &Value) -> ModelResult<()> {
    let op = op.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_uppercase();
    if !COMPARISON_OPERATORS.contains(&op.as_str()) {
        return Err(ModelError::validation(format!(
            "unsupported filter operator '{op}'"
        )));
    }

    sql.push_ident(column)?;
    match (op.as_str(), value) {
        ("=" | "IS", Value::Null) => sql.push(" IS NULL"),
        ("!=" | "<>" | "IS NOT", Value::Null) => sql.push(" IS NOT NULL"),
        ("IS" | "IS NOT", Value::Bool(b)) => sql
            .push(" ")
            .push(&op)
            .push(if *b { " TRUE" } else { " FALSE" }),
        ("IS" | "IS NOT", _) => {
            return Err(ModelError::validation(format!(
                "{op} only accepts NULL or a boolean"
            )));
        }
        (_, Value::Null) => {
            return Err(ModelError::validation(format!(
                "NULL cannot be compared with {op}"
            )));
        }
        _ => sql.push(" ").push(&op).push(" ").push_bind(value.clone()),
    };
    Ok(())
}

#[cfg(test)]
mod tests;
