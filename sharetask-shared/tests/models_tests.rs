/// Integration tests for the model layer
///
/// These tests require a running PostgreSQL database and skip themselves
/// when `DATABASE_URL` is unset. Every test creates its own users and
/// deletes them at the end; tasks, shares and categories cascade.

use sharetask_shared::db::migrations::run_migrations;
use sharetask_shared::models::{
    category::{Category, CreateCategory, DEFAULT_COLOR},
    share::TaskShare,
    task::{default_ordering, parse_ordering, CreateTask, Task, TaskFilter, UpdateTask},
    user::{CreateUser, User},
};
use sqlx::PgPool;
use uuid::Uuid;

async fn test_pool() -> Option<PgPool> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping database test");
        return None;
    };

    let pool = PgPool::connect(&url).await.expect("Failed to connect");
    run_migrations(&pool).await.expect("Migrations failed");

    Some(pool)
}

async fn user(pool: &PgPool, prefix: &str) -> User {
    User::create(
        pool,
        CreateUser {
            username: format!("{}_{}", prefix, Uuid::new_v4().simple()),
            email: String::new(),
            password_hash: "not-a-real-hash".to_string(),
        },
    )
    .await
    .expect("Failed to create user")
}

async fn task(pool: &PgPool, owner: &User, title: &str, completed: bool) -> Task {
    let mut conn = pool.acquire().await.unwrap();

    Task::create(
        &mut conn,
        CreateTask {
            title: title.to_string(),
            description: None,
            completed,
            due_date: None,
            category_id: None,
            owner_id: owner.id,
        },
    )
    .await
    .expect("Failed to create task")
}

fn no_filter() -> TaskFilter {
    TaskFilter::default()
}

#[tokio::test]
async fn test_duplicate_username_hits_named_constraint() {
    let Some(pool) = test_pool().await else { return };
    let alice = user(&pool, "dup").await;

    let err = User::create(
        &pool,
        CreateUser {
            username: alice.username.clone(),
            email: String::new(),
            password_hash: "x".to_string(),
        },
    )
    .await
    .unwrap_err();

    let constraint = err.as_database_error().and_then(|e| e.constraint().map(str::to_string));
    assert_eq!(constraint.as_deref(), Some(sharetask_shared::models::user::USERNAME_CONSTRAINT));

    User::delete(&pool, alice.id).await.unwrap();
}

#[tokio::test]
async fn test_visibility_is_owned_union_shared() {
    let Some(pool) = test_pool().await else { return };
    let alice = user(&pool, "alice").await;
    let bob = user(&pool, "bob").await;

    let shared = task(&pool, &alice, "shared", false).await;
    let private = task(&pool, &alice, "private", false).await;

    let mut conn = pool.acquire().await.unwrap();
    TaskShare::replace(&mut conn, shared.id, &[bob.id]).await.unwrap();
    drop(conn);

    assert_eq!(Task::count_visible(&pool, alice.id, &no_filter()).await.unwrap(), 2);
    assert_eq!(Task::count_visible(&pool, bob.id, &no_filter()).await.unwrap(), 1);

    let visible = Task::list_visible(&pool, bob.id, &no_filter(), &default_ordering(), 10, 0)
        .await
        .unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].task.id, shared.id);
    assert_eq!(visible[0].owner_username, alice.username);

    assert!(Task::find_visible(&pool, private.id, bob.id).await.unwrap().is_none());
    assert!(Task::find_visible(&pool, private.id, alice.id).await.unwrap().is_some());

    User::delete(&pool, alice.id).await.unwrap();
    User::delete(&pool, bob.id).await.unwrap();
}

#[tokio::test]
async fn test_share_replace_is_whole_set() {
    let Some(pool) = test_pool().await else { return };
    let alice = user(&pool, "alice").await;
    let bob = user(&pool, "bob").await;
    let carol = user(&pool, "carol").await;

    let t = task(&pool, &alice, "team", false).await;
    let mut conn = pool.acquire().await.unwrap();

    TaskShare::replace(&mut conn, t.id, &[bob.id, carol.id]).await.unwrap();
    let mut expected = vec![bob.id, carol.id];
    expected.sort();
    assert_eq!(TaskShare::user_ids(&mut *conn, t.id).await.unwrap(), expected);

    TaskShare::replace(&mut conn, t.id, &[carol.id]).await.unwrap();
    assert_eq!(TaskShare::user_ids(&mut *conn, t.id).await.unwrap(), vec![carol.id]);

    let by_task = TaskShare::users_for_tasks(&mut *conn, &[t.id]).await.unwrap();
    assert_eq!(by_task[&t.id].len(), 1);
    assert_eq!(by_task[&t.id][0].username, carol.username);

    TaskShare::replace(&mut conn, t.id, &[]).await.unwrap();
    assert!(TaskShare::user_ids(&mut *conn, t.id).await.unwrap().is_empty());
    drop(conn);

    for u in [&alice, &bob, &carol] {
        User::delete(&pool, u.id).await.unwrap();
    }
}

#[tokio::test]
async fn test_filters_and_ordering() {
    let Some(pool) = test_pool().await else { return };
    let alice = user(&pool, "alice").await;

    task(&pool, &alice, "Buy bread", true).await;
    task(&pool, &alice, "Buy milk", false).await;
    task(&pool, &alice, "Call mom", false).await;

    let titles = |rows: Vec<sharetask_shared::models::task::TaskWithNames>| -> Vec<String> {
        rows.into_iter().map(|r| r.task.title).collect()
    };

    let rows = Task::list_visible(&pool, alice.id, &no_filter(), &default_ordering(), 10, 0)
        .await
        .unwrap();
    assert_eq!(titles(rows), vec!["Call mom", "Buy milk", "Buy bread"]);

    let oldest_first = parse_ordering(Some("created_at"));
    let rows = Task::list_visible(&pool, alice.id, &no_filter(), &oldest_first, 10, 0)
        .await
        .unwrap();
    assert_eq!(titles(rows), vec!["Buy bread", "Buy milk", "Call mom"]);

    let filter = TaskFilter::parse(Some("false"), None, Some("BUY")).unwrap();
    let rows = Task::list_visible(&pool, alice.id, &filter, &default_ordering(), 10, 0)
        .await
        .unwrap();
    assert_eq!(titles(rows), vec!["Buy milk"]);
    assert_eq!(Task::count_visible(&pool, alice.id, &filter).await.unwrap(), 1);

    let rows = Task::list_visible(&pool, alice.id, &no_filter(), &default_ordering(), 1, 1)
        .await
        .unwrap();
    assert_eq!(titles(rows), vec!["Buy milk"]);

    User::delete(&pool, alice.id).await.unwrap();
}

#[tokio::test]
async fn test_update_changes_only_given_fields() {
    let Some(pool) = test_pool().await else { return };
    let alice = user(&pool, "alice").await;
    let original = task(&pool, &alice, "Draft", false).await;

    let mut conn = pool.acquire().await.unwrap();
    let updated = Task::update(
        &mut conn,
        original.id,
        UpdateTask {
            completed: Some(true),
            description: Some(Some("done".to_string())),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    assert_eq!(updated.title, "Draft");
    assert!(updated.completed);
    assert_eq!(updated.description.as_deref(), Some("done"));
    assert!(updated.updated_at >= original.updated_at);
    assert_eq!(updated.created_at, original.created_at);

    assert!(Task::delete(&mut conn, original.id).await.unwrap());
    assert!(!Task::delete(&mut conn, original.id).await.unwrap());
    drop(conn);

    User::delete(&pool, alice.id).await.unwrap();
}

#[tokio::test]
async fn test_category_scoping_and_names() {
    let Some(pool) = test_pool().await else { return };
    let alice = user(&pool, "alice").await;
    let bob = user(&pool, "bob").await;

    let work = Category::create(
        &pool,
        CreateCategory {
            name: "Work".to_string(),
            color: None,
            user_id: alice.id,
        },
    )
    .await
    .unwrap();
    assert_eq!(work.color, DEFAULT_COLOR);

    assert!(Category::name_taken(&pool, alice.id, "Work", None).await.unwrap());
    assert!(!Category::name_taken(&pool, alice.id, "Work", Some(work.id)).await.unwrap());
    assert!(!Category::name_taken(&pool, bob.id, "Work", None).await.unwrap());

    let err = Category::create(
        &pool,
        CreateCategory {
            name: "Work".to_string(),
            color: None,
            user_id: alice.id,
        },
    )
    .await
    .unwrap_err();
    let constraint = err.as_database_error().and_then(|e| e.constraint().map(str::to_string));
    assert_eq!(
        constraint.as_deref(),
        Some(sharetask_shared::models::category::NAME_CONSTRAINT)
    );

    assert!(Category::find_owned(&pool, work.id, bob.id).await.unwrap().is_none());
    assert!(Category::update(&pool, work.id, bob.id, "Mine", "#000000").await.unwrap().is_none());
    assert!(!Category::delete_owned(&pool, work.id, bob.id).await.unwrap());

    assert_eq!(Category::count_by_user(&pool, alice.id).await.unwrap(), 1);
    assert_eq!(Category::count_by_user(&pool, bob.id).await.unwrap(), 0);

    // Deleting the category detaches its tasks
    let mut conn = pool.acquire().await.unwrap();
    let filed = Task::create(
        &mut conn,
        CreateTask {
            title: "Filed".to_string(),
            description: None,
            completed: false,
            due_date: None,
            category_id: Some(work.id),
            owner_id: alice.id,
        },
    )
    .await
    .unwrap();
    drop(conn);

    let row = Task::find_visible(&pool, filed.id, alice.id).await.unwrap().unwrap();
    assert_eq!(row.category_name.as_deref(), Some("Work"));

    assert!(Category::delete_owned(&pool, work.id, alice.id).await.unwrap());

    let row = Task::find_visible(&pool, filed.id, alice.id).await.unwrap().unwrap();
    assert_eq!(row.task.category_id, None);
    assert_eq!(row.category_name, None);

    User::delete(&pool, alice.id).await.unwrap();
    User::delete(&pool, bob.id).await.unwrap();
}

#[tokio::test]
async fn test_existing_ids_and_user_search() {
    let Some(pool) = test_pool().await else { return };
    let alice = user(&pool, "srch").await;
    let ghost = Uuid::new_v4();

    let found = User::existing_ids(&pool, &[alice.id, ghost]).await.unwrap();
    assert_eq!(found, vec![alice.id]);

    let results = User::search(&pool, Some(alice.username.as_str()), 10, 0).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, alice.id);
    assert_eq!(User::count_search(&pool, Some(alice.username.as_str())).await.unwrap(), 1);

    User::delete(&pool, alice.id).await.unwrap();
    assert!(User::find_by_id(&pool, alice.id).await.unwrap().is_none());
}
