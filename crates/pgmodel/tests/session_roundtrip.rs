//! End-to-end chains against a real database.
//!
//! Each test needs DATABASE_URL and is skipped without it.

use pgmodel::pg::PgConnection;
use pgmodel::{
    BuilderConfig, Direction, JoinKind, Model, ModelError, ModelResult, Registry, Session, Value,
    args, record,
};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio_postgres::NoTls;

type Pg = PgConnection<tokio_postgres::Client>;

async fn try_connect(config: BuilderConfig) -> ModelResult<Option<Arc<Registry<Pg>>>> {
    dotenvy::dotenv().ok();
    let database_url = match std::env::var("DATABASE_URL") {
        Ok(v) => v,
        Err(_) => return Ok(None),
    };

    let (client, connection) = tokio_postgres::connect(&database_url, NoTls)
        .await
        .map_err(ModelError::from_db_error)?;
    tokio::spawn(async move {
        let _ = connection.await;
    });

    let registry = Arc::new(Registry::new());
    registry.set("database", PgConnection::new(client).with_config(config));
    Ok(Some(registry))
}

fn unique_suffix() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before UNIX_EPOCH")
        .as_nanos();
    format!("{}_{}", std::process::id(), nanos)
}

/// Models are bound to fixed tables; every test creates them as temp tables,
/// which are private to the test's own connection.
enum Member {}

impl Model for Member {
    const TABLE: &'static str = "members";
    const UPDATE_TIMESTAMPS: bool = true;
}

enum Team {}

impl Model for Team {
    const TABLE: &'static str = "teams";
    const FIELDS: &'static [&'static str] = &["id", "name"];
}

async fn create_tables(session: &mut Session<Pg>) -> ModelResult<()> {
    session
        .model::<Team>()
        .raw_query("CREATE TEMP TABLE teams (id BIGINT PRIMARY KEY, name TEXT NOT NULL)")
        .await?;
    session
        .model::<Member>()
        .raw_query(
            "CREATE TEMP TABLE members (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                age INT NOT NULL,
                team_id BIGINT,
                created_at TIMESTAMPTZ,
                updated_at TIMESTAMPTZ
            )",
        )
        .await?;
    Ok(())
}

#[tokio::test]
async fn save_query_and_delete() -> ModelResult<()> {
    let Some(registry) = try_connect(BuilderConfig::default()).await? else {
        eprintln!("DATABASE_URL is not set; skipping save_query_and_delete");
        return Ok(());
    };
    let mut session = Session::new(registry);
    create_tables(&mut session).await?;

    let inserted = session
        .model::<Member>()
        .save(record! { "name" => "Amy", "age" => 31 })
        .await?;
    let amy = inserted.records()?.remove(0);
    assert_eq!(amy.get("name"), Some(&Value::from("Amy")));
    assert!(matches!(amy.get("created_at"), Some(Value::Timestamp(_))));
    assert!(matches!(amy.get("updated_at"), Some(Value::Timestamp(_))));

    let bulk = session
        .model::<Member>()
        .save_bulk(
            vec![
                record! { "name" => "Bob", "age" => 17 },
                record! { "name" => "Cleo", "age" => 45 },
            ],
            None,
            None,
            None,
        )
        .await?;
    assert_eq!(bulk.affected_rows(), 2);

    let updated = session
        .model::<Member>()
        .filter(("name", "Bob"))
        .save(record! { "age" => 18 })
        .await?;
    assert_eq!(updated.affected_rows(), 1);

    let adults = session
        .model::<Member>()
        .filter(("age", ">=", 18))
        .order("age", Direction::Desc)
        .all()
        .await?;
    let names: Vec<String> = adults
        .rows()
        .iter()
        .map(|row| row.get::<_, String>("name"))
        .collect();
    assert_eq!(names, ["Cleo", "Amy", "Bob"]);

    let page = session
        .model::<Member>()
        .order_asc("name")
        .limit(2, 2)
        .all()
        .await?;
    assert_eq!(page.len(), 1);
    assert_eq!(page.rows()[0].get::<_, String>("name"), "Cleo");

    let count = session
        .model::<Member>()
        .filter(("age BETWEEN ? AND ?", 18, 40))
        .count()
        .await?;
    assert_eq!(count.count(), Some(2));

    let first = session
        .model::<Member>()
        .filter(("name", "Nobody"))
        .first()
        .await?;
    assert!(first.is_empty());

    let deleted = session
        .model::<Member>()
        .filter(("age", "<", 30))
        .delete()
        .await?;
    assert_eq!(deleted.affected_rows(), 1);
    assert_eq!(session.model::<Member>().count().await?.count(), Some(2));

    Ok(())
}

#[tokio::test]
async fn bulk_update_by_ids() -> ModelResult<()> {
    let Some(registry) = try_connect(BuilderConfig::default()).await? else {
        eprintln!("DATABASE_URL is not set; skipping bulk_update_by_ids");
        return Ok(());
    };
    let mut session = Session::new(registry);
    create_tables(&mut session).await?;

    session
        .model::<Team>()
        .save_bulk(
            vec![
                record! { "id" => 1, "name" => "red" },
                record! { "id" => 2, "name" => "blue" },
                record! { "id" => 3, "name" => "green" },
            ],
            None,
            None,
            None,
        )
        .await?;

    let updated = session
        .model::<Team>()
        .save_bulk(
            vec![
                record! { "id" => 1, "name" => "crimson" },
                record! { "id" => 3, "name" => "lime" },
            ],
            None,
            Some(args![1, 3]),
            None,
        )
        .await?;
    assert_eq!(updated.affected_rows(), 2);

    let teams = session.model::<Team>().order_asc("id").all().await?.records()?;
    let names: Vec<&Value> = teams.iter().filter_map(|t| t.get("name")).collect();
    assert_eq!(
        names,
        [&Value::from("crimson"), &Value::from("blue"), &Value::from("lime")]
    );
    assert!(teams.iter().all(|t| t.len() == 2));

    Ok(())
}

#[tokio::test]
async fn joins_unique_and_raw_queries() -> ModelResult<()> {
    let Some(registry) = try_connect(BuilderConfig::default()).await? else {
        eprintln!("DATABASE_URL is not set; skipping joins_unique_and_raw_queries");
        return Ok(());
    };
    let mut session = Session::new(registry);
    create_tables(&mut session).await?;

    session
        .model::<Team>()
        .save(record! { "id" => 1, "name" => "red" })
        .await?;
    session
        .model::<Member>()
        .save_bulk(
            vec![
                record! { "name" => "Amy", "age" => 31, "team_id" => 1 },
                record! { "name" => "Bob", "age" => 31, "team_id" => 1 },
                record! { "name" => "Cleo", "age" => 45, "team_id" => None::<i64> },
            ],
            None,
            None,
            None,
        )
        .await?;

    let joined = session
        .model::<Member>()
        .from(Some("members"), Some(&["members.name"][..]))
        .join(
            JoinKind::Inner,
            "teams",
            "teams.id = members.team_id",
            &["teams.name AS team"],
        )
        .order_asc("members.name")
        .all()
        .await?;
    let rows = joined.records()?;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("team"), Some(&Value::from("red")));

    let ages = session
        .model::<Member>()
        .from(Some("members"), Some(&["age"][..]))
        .unique()
        .count()
        .await?;
    assert_eq!(ages.count(), Some(2));

    let unassigned = session
        .model::<Member>()
        .filter(("team_id", None::<i64>))
        .all()
        .await?;
    assert_eq!(unassigned.len(), 1);

    let raw = session
        .model::<Member>()
        .raw_query("SELECT name FROM members WHERE age > 40")
        .await?;
    assert_eq!(raw.rows()[0].get::<_, String>("name"), "Cleo");
    assert!(!session.model::<Member>().is_table_bound());

    let renamed = session
        .model::<Member>()
        .raw_query("UPDATE members SET age = age + 1 WHERE team_id IS NULL")
        .await?;
    assert_eq!(renamed.affected_rows(), 1);

    Ok(())
}

#[tokio::test]
async fn database_errors_are_classified() -> ModelResult<()> {
    let Some(registry) = try_connect(BuilderConfig::default()).await? else {
        eprintln!("DATABASE_URL is not set; skipping database_errors_are_classified");
        return Ok(());
    };
    let mut session = Session::new(registry);
    create_tables(&mut session).await?;

    session
        .model::<Member>()
        .save(record! { "name" => "Amy", "age" => 31 })
        .await?;
    let err = session
        .model::<Member>()
        .save(record! { "name" => "Amy", "age" => 32 })
        .await
        .unwrap_err();
    assert!(err.is_unique_violation(), "{err}");

    let err = session.model::<Member>().delete().await.unwrap_err();
    assert!(err.is_validation(), "{err}");
    assert_eq!(session.model::<Member>().count().await?.count(), Some(1));

    Ok(())
}

#[tokio::test]
async fn unfiltered_delete_when_allowed() -> ModelResult<()> {
    let config = BuilderConfig::new().allow_unfiltered_delete(true);
    let Some(registry) = try_connect(config).await? else {
        eprintln!("DATABASE_URL is not set; skipping unfiltered_delete_when_allowed");
        return Ok(());
    };
    let mut session = Session::new(registry);
    create_tables(&mut session).await?;

    let table = format!("scratch_{}", unique_suffix());
    session
        .model::<Team>()
        .raw_query(&format!("CREATE TEMP TABLE {table} (id BIGINT, name TEXT)"))
        .await?;
    session
        .model::<Team>()
        .from_table(&table)
        .save(record! { "id" => 1, "name" => "x" })
        .await?;

    let deleted = session.model::<Team>().from_table(&table).delete().await?;
    assert_eq!(deleted.affected_rows(), 1);

    Ok(())
}

#[tokio::test]
async fn missing_registry_entry_fails_at_terminal() {
    let registry: Arc<Registry<Pg>> = Arc::new(Registry::new());
    let mut session = Session::new(registry);

    let err = session
        .model::<Member>()
        .filter(("age", ">", 18))
        .all()
        .await
        .unwrap_err();
    assert!(err.is_configuration(), "{err}");
    assert!(err.to_string().contains("'database'"));
}
