use super::*;
use crate::{args, record};

fn users() -> Clauses {
    Clauses {
        table: Some("users".to_string()),
        fields: vec!["*".to_string()],
        ..Clauses::default()
    }
}

fn config() -> BuilderConfig {
    BuilderConfig::default()
}

#[test]
fn select_all_with_every_clause() {
    let mut c = users();
    c.fields = vec!["id".to_string(), "name".to_string()];
    c.filters.push(args!["age", ">", 18]);
    c.filters.push(args!["active", true]);
    c.orders.push(("name".to_string(), Direction::Asc));
    c.orders.push(("id".to_string(), Direction::Desc));
    c.limit = Some((10, 3));

    let sql = c.select(Select::All).unwrap();
    assert_eq!(
        sql.to_sql(),
        "SELECT id, name FROM users WHERE age > $1 AND active = $2 \
         ORDER BY name ASC, id DESC LIMIT 10 OFFSET 20"
    );
    assert_eq!(sql.params(), &[Value::Int(18), Value::Bool(true)]);
}

#[test]
fn select_without_fields_selects_star() {
    let mut c = users();
    c.fields.clear();
    assert_eq!(c.select(Select::All).unwrap().to_sql(), "SELECT * FROM users");
}

#[test]
fn distinct_and_joins() {
    let mut c = users();
    c.fields = vec!["users.name".to_string()];
    c.distinct = true;
    c.joins.push(Join {
        kind: JoinKind::Left,
        table: "orders".to_string(),
        on: "orders.user_id = users.id".to_string(),
        fields: vec!["orders.total AS order_total".to_string()],
    });

    assert_eq!(
        c.select(Select::All).unwrap().to_sql(),
        "SELECT DISTINCT users.name, orders.total AS order_total FROM users \
         LEFT JOIN orders ON orders.user_id = users.id"
    );
}

#[test]
fn first_limits_to_one_row_of_the_requested_page() {
    let mut c = users();
    assert_eq!(
        c.select(Select::First).unwrap().to_sql(),
        "SELECT * FROM users LIMIT 1 OFFSET 0"
    );

    c.limit = Some((5, 2));
    assert_eq!(
        c.select(Select::First).unwrap().to_sql(),
        "SELECT * FROM users LIMIT 1 OFFSET 5"
    );
}

#[test]
fn page_zero_is_the_first_page() {
    let mut c = users();
    c.limit = Some((10, 0));
    assert_eq!(
        c.select(Select::All).unwrap().to_sql(),
        "SELECT * FROM users LIMIT 10 OFFSET 0"
    );
}

#[test]
fn count_ignores_order_and_limit() {
    let mut c = users();
    c.filters.push(args!["age", ">=", 21]);
    c.orders.push(("name".to_string(), Direction::Asc));
    c.limit = Some((10, 1));

    let sql = c.select(Select::Count).unwrap();
    assert_eq!(sql.to_sql(), "SELECT COUNT(*) FROM users WHERE age >= $1");
}

#[test]
fn distinct_count_wraps_the_select() {
    let mut c = users();
    c.fields = vec!["city".to_string()];
    c.distinct = true;
    c.filters.push(args!["country", "NL"]);

    assert_eq!(
        c.select(Select::Count).unwrap().to_sql(),
        "SELECT COUNT(*) FROM (SELECT DISTINCT city FROM users WHERE country = $1) AS distinct_rows"
    );
}

#[test]
fn filter_forms() {
    let mut c = users();
    c.filters.push(args!["deleted_at IS NULL"]);
    c.filters.push(args!["age BETWEEN ? AND ?", 18, 30]);
    c.filters.push(args!["nickname", None::<String>]);
    c.filters.push(args!["email", "not ilike", "%@example.com"]);
    c.filters.push(args!["manager_id", "!=", None::<i64>]);
    c.filters.push(args!["verified", "is not", false]);

    let sql = c.select(Select::All).unwrap();
    assert_eq!(
        sql.to_sql(),
        "SELECT * FROM users WHERE (deleted_at IS NULL) AND (age BETWEEN $1 AND $2) \
         AND nickname IS NULL AND email NOT ILIKE $3 AND manager_id IS NOT NULL \
         AND verified IS NOT FALSE"
    );
    assert_eq!(sql.params().len(), 3);
}

#[test]
fn malformed_filters_are_validation_errors() {
    let cases = vec![
        args![],
        args!["age > ? AND name = ?", 18],
        args!["age", "~", 18],
        args!["age", ">", None::<i32>],
        args!["flag", "IS", 1],
        args!["a", "=", 1, 2],
        args![1, 2],
        args!["  "],
        args!["name; drop table users", "x"],
    ];

    for filter in cases {
        let mut c = users();
        c.filters.push(filter.clone());
        let err = c.select(Select::All).unwrap_err();
        assert!(err.is_validation(), "{filter:?} gave {err}");
    }
}

#[test]
fn unsafe_identifiers_are_rejected() {
    let mut c = users();
    c.table = Some("users; drop table users".to_string());
    assert!(c.select(Select::All).unwrap_err().is_validation());

    let mut c = users();
    c.orders.push(("name desc, id".to_string(), Direction::Asc));
    assert!(c.select(Select::All).unwrap_err().is_validation());

    let c = Clauses::default();
    assert!(c.select(Select::All).unwrap_err().is_validation());
}

#[test]
fn save_without_filters_inserts() {
    let sql = users()
        .save(record! { "name" => "Amy", "age" => 31 }, &config(), false)
        .unwrap();
    assert_eq!(
        sql.to_sql(),
        "INSERT INTO users (age, name) VALUES ($1, $2) RETURNING *"
    );
    assert_eq!(sql.params(), &[Value::Int(31), Value::from("Amy")]);
}

#[test]
fn save_with_filters_updates() {
    let mut c = users();
    c.filters.push(args!["id", 7]);

    let sql = c.save(record! { "name" => "Amy" }, &config(), false).unwrap();
    assert_eq!(
        sql.to_sql(),
        "UPDATE users SET name = $1 WHERE id = $2 RETURNING *"
    );
    assert_eq!(sql.params(), &[Value::from("Amy"), Value::Int(7)]);
}

#[test]
fn save_fills_timestamps() {
    let sql = users()
        .save(record! { "name" => "Amy" }, &config(), true)
        .unwrap();
    assert_eq!(
        sql.to_sql(),
        "INSERT INTO users (created_at, name, updated_at) VALUES ($1, $2, $3) RETURNING *"
    );

    let mut c = users();
    c.filters.push(args!["id", 7]);
    let sql = c.save(record! { "name" => "Amy" }, &config(), true).unwrap();
    assert_eq!(
        sql.to_sql(),
        "UPDATE users SET name = $1, updated_at = $2 WHERE id = $3 RETURNING *"
    );
}

#[test]
fn save_keeps_explicit_timestamps_and_custom_columns() {
    let config = config().timestamp_columns("inserted", "modified");
    let sql = users()
        .save(record! { "modified" => "2024-01-01T00:00:00Z" }, &config, true)
        .unwrap();
    assert_eq!(
        sql.to_sql(),
        "INSERT INTO users (inserted, modified) VALUES ($1, $2) RETURNING *"
    );
    assert_eq!(sql.params()[1], Value::from("2024-01-01T00:00:00Z"));
}

#[test]
fn save_rejects_empty_data_and_joins() {
    assert!(users().save(Record::new(), &config(), false).unwrap_err().is_validation());

    let mut c = users();
    c.joins.push(Join {
        kind: JoinKind::Inner,
        table: "orders".to_string(),
        on: "orders.user_id = users.id".to_string(),
        fields: vec![],
    });
    assert!(c.save(record! { "a" => 1 }, &config(), false).unwrap_err().is_validation());
}

#[test]
fn bulk_insert() {
    let rows = vec![
        record! { "name" => "Amy", "age" => 31 },
        record! { "name" => "Bob" },
    ];
    let sql = users()
        .save_bulk(rows, None, None, None, &config(), false)
        .unwrap();
    assert_eq!(
        sql.to_sql(),
        "INSERT INTO users (age, name) VALUES ($1, $2), ($3, $4) RETURNING *"
    );
    assert_eq!(
        sql.params(),
        &[
            Value::Int(31),
            Value::from("Amy"),
            Value::Null,
            Value::from("Bob"),
        ]
    );
}

#[test]
fn bulk_insert_with_fields_and_timestamps() {
    let rows = vec![record! { "name" => "Amy", "age" => 31 }];
    let sql = users()
        .save_bulk(rows, Some(vec!["name".to_string()]), None, None, &config(), true)
        .unwrap();
    assert_eq!(
        sql.to_sql(),
        "INSERT INTO users (name, created_at, updated_at) VALUES ($1, $2, $3) RETURNING *"
    );
}

#[test]
fn bulk_update_by_key() {
    let rows = vec![
        record! { "id" => 1, "name" => "Amy", "age" => 31 },
        record! { "id" => 2, "name" => "Bob" },
    ];
    let sql = users()
        .save_bulk(rows, None, Some(args![1, 2]), None, &config(), false)
        .unwrap();
    assert_eq!(
        sql.to_sql(),
        "UPDATE users SET \
         age = CASE id WHEN $1 THEN $2 ELSE age END, \
         name = CASE id WHEN $3 THEN $4 WHEN $5 THEN $6 ELSE name END \
         WHERE id IN ($7, $8) RETURNING *"
    );
    assert_eq!(sql.params().len(), 8);
}

#[test]
fn bulk_update_with_custom_key_filters_and_timestamps() {
    let mut c = users();
    c.filters.push(args!["tenant_id", 4]);
    let rows = vec![record! { "name" => "Amy" }];
    let sql = c
        .save_bulk(
            rows,
            None,
            Some(args!["amy"]),
            Some("login".to_string()),
            &config(),
            true,
        )
        .unwrap();
    assert_eq!(
        sql.to_sql(),
        "UPDATE users SET name = CASE login WHEN $1 THEN $2 ELSE name END, updated_at = $3 \
         WHERE login IN ($4) AND tenant_id = $5 RETURNING *"
    );
}

#[test]
fn bulk_validation() {
    let c = users();
    assert!(
        c.save_bulk(vec![], None, None, None, &config(), false)
            .unwrap_err()
            .is_validation()
    );
    assert!(
        c.save_bulk(
            vec![record! { "name" => "Amy" }],
            None,
            Some(args![1, 2]),
            None,
            &config(),
            false
        )
        .unwrap_err()
        .is_validation()
    );
    assert!(
        c.save_bulk(
            vec![record! { "id" => 1 }],
            None,
            Some(args![1]),
            None,
            &config(),
            false
        )
        .unwrap_err()
        .is_validation()
    );
}

#[test]
fn delete_requires_filters_by_default() {
    let c = users();
    assert!(c.delete(&config()).unwrap_err().is_validation());

    let allowed = config().allow_unfiltered_delete(true);
    assert_eq!(c.delete(&allowed).unwrap().to_sql(), "DELETE FROM users");

    let mut c = users();
    c.filters.push(args!["id", 7]);
    assert_eq!(
        c.delete(&config()).unwrap().to_sql(),
        "DELETE FROM users WHERE id = $1"
    );
}
