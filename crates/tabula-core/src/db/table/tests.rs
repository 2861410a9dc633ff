use crate::{
    db::{
        Environment,
        config::{BackendKind, StoreConfig},
        store::{MemoryTextStore, TextStore},
        table::{JoinKind, JoinOptions, Table},
    },
    error::ErrorClass,
    record::Record,
    value::Value,
};
use std::sync::Arc;

async fn open(env: &Environment, name: &str, backend: BackendKind) -> Table {
    env.open(&StoreConfig::new(name).backend(backend), None)
        .await
        .expect("open should succeed")
}

async fn seeded(backend: BackendKind) -> Table {
    let env = Environment::in_memory();
    let table = open(&env, "people", backend).await;

    for (name, age) in [("A", 30), ("B", 15), ("A", 30)] {
        table
            .insert(Record::new().with("name", name).with("age", age))
            .await
            .unwrap();
    }

    table
}

fn ids(rows: &[Record]) -> Vec<Value> {
    rows.iter().map(|r| r.field("id").clone()).collect()
}

const BACKENDS: [BackendKind; 2] = [BackendKind::Indexed, BackendKind::Flat];

// ---- scenario ----

#[tokio::test]
async fn users_scenario_returns_adults_in_id_order() {
    for backend in BACKENDS {
        let env = Environment::in_memory();
        let mut users = open(&env, "users", backend).await;

        users
            .insert(Record::new().with("name", "A").with("age", 30))
            .await
            .unwrap();
        users
            .insert(Record::new().with("name", "B").with("age", 40))
            .await
            .unwrap();

        let rows = users
            .where_("age", (">", 18))
            .order_by("id", "asc")
            .get()
            .await
            .unwrap();

        assert_eq!(ids(&rows), vec![Value::Int(1), Value::Int(2)], "{backend:?}");
    }
}

#[tokio::test]
async fn aggregates_over_filtered_rows() {
    for backend in BACKENDS {
        let mut t = seeded(backend).await;

        assert!((t.sum("age").await.unwrap() - 75.0).abs() < f64::EPSILON);
        assert_eq!(t.min("age").await.unwrap(), Some(Value::Int(15)));
        assert_eq!(t.max("age").await.unwrap(), Some(Value::Int(30)));
        assert_eq!(
            t.distinct("name").await.unwrap(),
            vec![Value::from("A"), Value::from("B")]
        );
        assert!((t.avg("age").await.unwrap() - 25.0).abs() < f64::EPSILON);

        // avg sees the same filtered rows as sum
        let avg = t.where_("name", "A").avg("age").await.unwrap();
        assert!((avg - 30.0).abs() < f64::EPSILON);
    }
}

#[tokio::test]
async fn aggregates_on_empty_and_absent_fields() {
    let mut t = seeded(BackendKind::Indexed).await;

    assert!(t.where_("age", 99).avg("age").await.unwrap().abs() < f64::EPSILON);
    assert_eq!(t.min("nope").await.unwrap(), None);
    assert_eq!(t.max("nope").await.unwrap(), None);
    assert!(t.sum("nope").await.unwrap().abs() < f64::EPSILON);
}

#[tokio::test]
async fn min_skips_values_incomparable_with_the_running_extreme() {
    let env = Environment::in_memory();
    let mut t = open(&env, "mixed", BackendKind::Indexed).await;
    for v in [Value::Int(5), Value::from("a"), Value::Int(2), Value::Null] {
        t.insert(Record::new().with("v", v)).await.unwrap();
    }

    assert_eq!(t.min("v").await.unwrap(), Some(Value::Int(2)));
    assert_eq!(
        t.pluck("v").await.unwrap(),
        vec![Value::Int(5), Value::from("a"), Value::Int(2), Value::Null]
    );
}

// ---- builder state ----

#[tokio::test]
async fn terminal_reads_reset_state() {
    let mut t = seeded(BackendKind::Flat).await;

    assert_eq!(t.where_("name", "B").count().await.unwrap(), 1);
    assert!(t.state().is_empty());
    assert_eq!(t.count().await.unwrap(), 3);
}

#[tokio::test]
async fn view_starts_with_empty_state_over_same_rows() {
    let mut t = seeded(BackendKind::Indexed).await;
    t.where_("name", "B");

    let mut view = t.view();
    assert!(view.state().is_empty());
    assert_eq!(view.count().await.unwrap(), 3);
    assert_eq!(t.count().await.unwrap(), 1);
}

#[tokio::test]
async fn first_and_exists() {
    let mut t = seeded(BackendKind::Indexed).await;

    let first = t.order_by("age", "ASC").first().await.unwrap().unwrap();
    assert_eq!(first.field("name"), &Value::from("B"));

    assert!(t.where_("age", ("<", 20)).exists().await.unwrap());
    assert!(!t.where_("age", ("<", 10)).exists().await.unwrap());
    assert_eq!(t.where_("age", 1).first().await.unwrap(), None);
}

#[tokio::test]
async fn unknown_operator_is_dropped() {
    let mut t = seeded(BackendKind::Indexed).await;

    t.where_("age", ("~", 15));
    assert!(t.state().filters.is_empty());
    assert_eq!(t.count().await.unwrap(), 3);
}

#[tokio::test]
async fn operator_text_is_case_insensitive() {
    let mut t = seeded(BackendKind::Indexed).await;

    let rows = t.where_("name", ("like", "B")).get().await.unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn bare_equals_sign_is_a_value() {
    let env = Environment::in_memory();
    let mut t = open(&env, "ops", BackendKind::Indexed).await;
    t.insert(Record::new().with("sym", "=")).await.unwrap();
    t.insert(Record::new().with("sym", "<")).await.unwrap();

    let rows = t.where_("sym", "=").get().await.unwrap();
    assert_eq!(ids(&rows), vec![Value::Int(1)]);
}

#[tokio::test]
async fn or_where_combines_with_flat_rule() {
    let mut t = seeded(BackendKind::Indexed).await;

    let rows = t
        .where_("name", "A")
        .where_("age", ("<", 20))
        .or_where("id", 2)
        .get()
        .await
        .unwrap();
    assert_eq!(ids(&rows), vec![Value::Int(2)]);
}

#[tokio::test]
async fn convenience_filters() {
    let env = Environment::in_memory();
    let mut t = open(&env, "n", BackendKind::Flat).await;
    for age in [10, 20, 30, 40] {
        t.insert(Record::new().with("age", age)).await.unwrap();
    }
    t.insert(Record::new().with("age", Value::Null)).await.unwrap();

    assert_eq!(t.where_in("age", [10, 40]).count().await.unwrap(), 2);
    assert_eq!(t.where_between("age", 20, 30).count().await.unwrap(), 2);
    assert_eq!(t.where_null("age").count().await.unwrap(), 1);
    assert_eq!(t.where_not_null("age").count().await.unwrap(), 4);
}

#[tokio::test]
async fn paginate_offset_limit_and_select() {
    let env = Environment::in_memory();
    let mut t = open(&env, "n", BackendKind::Indexed).await;
    for i in 1..=25 {
        t.insert(Record::new().with("n", i)).await.unwrap();
    }

    let page = t.paginate(2, 10).get().await.unwrap();
    assert_eq!(ids(&page), (11..=20).map(Value::Int).collect::<Vec<_>>());

    let clamped = t.paginate(0, 0).get().await.unwrap();
    assert_eq!(ids(&clamped), vec![Value::Int(1)]);

    let rows = t
        .order_by("n", "desc")
        .offset(2)
        .limit(2)
        .select(["n"])
        .get()
        .await
        .unwrap();
    assert_eq!(
        rows,
        vec![Record::new().with("n", 23), Record::new().with("n", 22)]
    );
}

// ---- records ----

#[tokio::test]
async fn insert_then_find_round_trips() {
    for backend in BACKENDS {
        let env = Environment::in_memory();
        let t = open(&env, "rt", backend).await;

        let id = t
            .insert(Record::new().with("name", "Ada").with("tags", vec!["x", "y"]))
            .await
            .unwrap();
        let found = t.find_by_id(id.clone()).await.unwrap().unwrap();

        assert_eq!(found.field("id"), &id);
        assert_eq!(found.field("tags"), &Value::from(vec!["x", "y"]));
        assert_eq!(t.find_by_id(404).await.unwrap(), None);
    }
}

#[tokio::test]
async fn find_by_id_ignores_query_state() {
    let mut t = seeded(BackendKind::Indexed).await;
    t.where_("name", "nobody");

    assert!(t.find_by_id(1).await.unwrap().is_some());
    assert_eq!(t.state().filters.len(), 1);
}

#[tokio::test]
async fn delete_is_idempotent() {
    for backend in BACKENDS {
        let mut t = seeded(backend).await;

        assert!(t.delete(1).await.unwrap());
        assert!(t.delete(1).await.unwrap());
        assert_eq!(t.count().await.unwrap(), 2);
    }
}

#[tokio::test]
async fn update_of_absent_id_is_a_noop() {
    for backend in BACKENDS {
        let mut t = seeded(backend).await;

        assert!(!t.update(99, Record::new().with("name", "Z")).await.unwrap());
        assert_eq!(t.count().await.unwrap(), 3);
    }
}

#[tokio::test]
async fn duplicate_explicit_id_conflicts() {
    for backend in BACKENDS {
        let t = seeded(backend).await;

        let err = t
            .insert(Record::new().with("id", 2).with("name", "dup"))
            .await
            .expect_err("duplicate id");
        assert_eq!(err.class, ErrorClass::Conflict);
    }
}

// ---- bulk mutations ----

#[tokio::test]
async fn update_where_merges_patch_and_keeps_state() {
    for backend in BACKENDS {
        let mut t = seeded(backend).await;

        t.where_("name", "A");
        let written = t
            .update_where(&Record::new().with("age", 31).with("flag", true))
            .await
            .unwrap();
        assert_eq!(written, 2);
        assert_eq!(t.state().filters.len(), 1);

        let rows = t.get().await.unwrap();
        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert_eq!(row.field("age"), &Value::Int(31));
            assert_eq!(row.field("flag"), &Value::Bool(true));
            assert_eq!(row.field("name"), &Value::from("A"));
        }

        let untouched = t.where_("name", "B").pluck("age").await.unwrap();
        assert_eq!(untouched, vec![Value::Int(15)]);
    }
}

#[tokio::test]
async fn delete_where_removes_matches_only() {
    for backend in BACKENDS {
        let mut t = seeded(backend).await;

        let removed = t.where_("age", (">=", 30)).delete_where().await.unwrap();
        assert_eq!(removed, 2);
        t.reset();

        assert_eq!(t.pluck("name").await.unwrap(), vec![Value::from("B")]);
    }
}

#[tokio::test]
async fn bulk_write_on_row_without_id_is_an_invariant_violation() {
    let text = Arc::new(MemoryTextStore::new());
    text.set_item("UniversalDB:raw", r#"[{"id":1,"n":1},{"n":2}]"#)
        .await
        .unwrap();
    let env = Environment::new(text);
    let t = open(&env, "raw", BackendKind::Flat).await;

    let err = t
        .update_where(&Record::new().with("n", 0))
        .await
        .expect_err("row without id");
    assert_eq!(err.class, ErrorClass::InvariantViolation);

    // the first row was already written; there is no rollback
    assert_eq!(t.find_by_id(1).await.unwrap().unwrap().field("n"), &Value::Int(0));
}

// ---- join ----

async fn join_fixture() -> (Table, Table) {
    let env = Environment::in_memory();
    let users = open(&env, "users", BackendKind::Indexed).await;
    let posts = open(&env, "posts", BackendKind::Flat).await;

    for name in ["Ann", "Ben", "Cal"] {
        users.insert(Record::new().with("name", name)).await.unwrap();
    }
    for (user_id, title) in [(1, "a1"), (1, "a2"), (2, "b1"), (9, "orphan")] {
        posts
            .insert(Record::new().with("user_id", user_id).with("title", title))
            .await
            .unwrap();
    }

    (users, posts)
}

#[tokio::test]
async fn inner_join_drops_unmatched_rows() {
    let (users, posts) = join_fixture().await;

    let result = users
        .join(&posts, "id", "user_id", JoinOptions::inner())
        .await
        .unwrap();

    assert_eq!(result.count(), 3);
    let titles: Vec<_> = result
        .to_array()
        .iter()
        .map(|r| r.field("title").clone())
        .collect();
    assert_eq!(titles, vec![Value::from("a1"), Value::from("a2"), Value::from("b1")]);

    // right side wins on shared fields
    let second = &result.to_array()[1];
    assert_eq!(second.field("id"), &Value::Int(2));
    assert_eq!(second.field("name"), &Value::from("Ann"));
}

#[tokio::test]
async fn left_join_keeps_unmatched_left_rows() {
    let (users, posts) = join_fixture().await;

    let result = users
        .join(&posts, "id", "user_id", JoinOptions::left())
        .await
        .unwrap();

    assert_eq!(result.count(), 4);
    let last = &result.to_array()[3];
    assert_eq!(last.field("name"), &Value::from("Cal"));
    assert!(last.field("title").is_null());
}

#[tokio::test]
async fn join_aliases_and_selector() {
    let (users, posts) = join_fixture().await;

    let aliased = users
        .join(&posts, "id", "user_id", JoinOptions::inner().alias("u", "p"))
        .await
        .unwrap();
    let first = aliased.first().unwrap();
    assert_eq!(first.field("u.name"), &Value::from("Ann"));
    assert_eq!(first.field("p.title"), &Value::from("a1"));
    assert_eq!(first.field("p.id"), &Value::Int(1));

    let shaped = users
        .join(
            &posts,
            "id",
            "user_id",
            JoinOptions::left().select(|l, r| {
                Record::new()
                    .with("who", l.field("name").clone())
                    .with("has_post", r.is_some())
            }),
        )
        .await
        .unwrap();
    assert_eq!(
        shaped.to_array().last(),
        Some(&Record::new().with("who", "Cal").with("has_post", false))
    );
}

#[tokio::test]
async fn join_respects_both_filters_and_left_window() {
    let (mut users, mut posts) = join_fixture().await;

    users.where_("name", ("!=", "Ben")).order_by("title", "desc").limit(1);
    posts.where_("title", ("like", "a"));

    let result = users
        .join(&posts, "id", "user_id", JoinOptions::default())
        .await
        .unwrap();

    assert_eq!(result.count(), 1);
    assert_eq!(result.first().unwrap().field("title"), &Value::from("a2"));

    // neither builder lost its state
    assert_eq!(users.state().filters.len(), 1);
    assert_eq!(users.state().limit, Some(1));
    assert_eq!(posts.state().filters.len(), 1);
    assert_eq!(users.count().await.unwrap(), 1);
    assert_eq!(posts.count().await.unwrap(), 3);
}

// ---- backup ----

#[tokio::test]
async fn export_then_import_replaces_contents() {
    let source = seeded(BackendKind::Indexed).await;
    let dump = source.export_json().await.unwrap();

    let env = Environment::in_memory();
    let mut target = open(&env, "copy", BackendKind::Flat).await;
    target.insert(Record::new().with("stale", true)).await.unwrap();

    assert_eq!(target.import_json(&dump).await.unwrap(), 3);
    let rows = target.order_by("id", "asc").get().await.unwrap();
    assert_eq!(ids(&rows), vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    assert!(rows.iter().all(|r| r.field("stale").is_null()));

    let err = target.import_json("{\"not\":\"an array\"}").await;
    assert!(err.is_err());
    assert_eq!(target.count().await.unwrap(), 3);
}

#[test]
fn join_options_default_to_inner() {
    assert_eq!(JoinOptions::default().kind, JoinKind::Inner);
    assert_eq!(JoinOptions::left().kind, JoinKind::Left);
}

#[tokio::test]
async fn import_with_repeated_id_keeps_existing_contents() {
    for backend in BACKENDS {
        let mut t = seeded(backend).await;

        let err = t
            .import_json(r#"[{"id":7,"name":"X"},{"name":"Y"},{"id":7.0,"name":"Z"}]"#)
            .await
            .expect_err("repeated id");

        assert_eq!(err.class, ErrorClass::Conflict);
        assert_eq!(t.count().await.unwrap(), 3);
    }
}
