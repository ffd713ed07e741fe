/// Task model and database operations
///
/// A task has exactly one owner and may be shared with any number of other
/// users (see [`crate::models::share`]). Every read goes through the
/// visibility predicate in [`crate::visibility`]; every write happens inside
/// a transaction that first locks the row with [`Task::lock_visible`].
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     title VARCHAR(255) NOT NULL,
///     description TEXT,
///     completed BOOLEAN NOT NULL DEFAULT FALSE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     due_date TIMESTAMPTZ,
///     owner_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     category_id UUID REFERENCES categories(id) ON DELETE SET NULL
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use sharetask_shared::models::task::{Task, TaskFilter, default_ordering};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
/// let filter = TaskFilter::default();
/// let total = Task::count_visible(&pool, user_id, &filter).await?;
/// let first_page = Task::list_visible(&pool, user_id, &filter, &default_ordering(), 10, 0).await?;
/// println!("{} of {} tasks", first_page.len(), total);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::visibility::{contains_pattern, push_visible_to};

/// Maximum title length
pub const MAX_TITLE_LENGTH: usize = 255;

const TASK_COLUMNS: &str = "t.id, t.title, t.description, t.completed, t.created_at, \
                            t.updated_at, t.due_date, t.owner_id, t.category_id";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,

    /// Set once at insert
    pub created_at: DateTime<Utc>,

    /// Refreshed by every update
    pub updated_at: DateTime<Utc>,

    pub due_date: Option<DateTime<Utc>>,
    pub owner_id: Uuid,

    /// Cleared when the category is deleted
    pub category_id: Option<Uuid>,
}

/// A task joined with its owner's username and its category's name
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TaskWithNames {
    #[sqlx(flatten)]
    pub task: Task,
    pub owner_username: String,
    pub category_name: Option<String>,
}

/// Input for creating a task
#[derive(Debug, Clone)]
pub struct CreateTask {
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub due_date: Option<DateTime<Utc>>,
    pub category_id: Option<Uuid>,

    /// Always the authenticated caller
    pub owner_id: Uuid,
}

/// Fields to change on a task
///
/// `None` leaves a field alone; `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub completed: Option<bool>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub category_id: Option<Option<Uuid>>,
}

/// Error type for list filter parameters
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("'{0}' is not a valid boolean; use true, false, 1 or 0")]
    InvalidCompleted(String),

    #[error("'{0}' is not a valid category id")]
    InvalidCategory(String),
}

/// Filters for the task list
///
/// Absent and empty query parameters both mean "no filter".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub completed: Option<bool>,
    pub category_id: Option<Uuid>,

    /// Every term must appear in the title or the description
    pub search_terms: Vec<String>,
}

impl TaskFilter {
    /// Builds a filter from raw query-string values
    ///
    /// ```
    /// use sharetask_shared::models::task::TaskFilter;
    ///
    /// let filter = TaskFilter::parse(Some("1"), Some(""), Some("  buy   milk ")).unwrap();
    /// assert_eq!(filter.completed, Some(true));
    /// assert_eq!(filter.category_id, None);
    /// assert_eq!(filter.search_terms, vec!["buy", "milk"]);
    /// ```
    pub fn parse(
        completed: Option<&str>,
        category: Option<&str>,
        search: Option<&str>,
    ) -> Result<Self, FilterError> {
        let completed = match completed.map(str::trim).filter(|v| !v.is_empty()) {
            None => None,
            Some(raw) => Some(match raw.to_ascii_lowercase().as_str() {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => return Err(FilterError::InvalidCompleted(raw.to_string())),
            }),
        };

        let category_id = match category.map(str::trim).filter(|v| !v.is_empty()) {
            None => None,
            Some(raw) => Some(
                Uuid::parse_str(raw).map_err(|_| FilterError::InvalidCategory(raw.to_string()))?,
            ),
        };

        let search_terms = search
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        Ok(Self {
            completed,
            category_id,
            search_terms,
        })
    }
}

/// Fields the task list can be ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOrderField {
    CreatedAt,
    DueDate,
    Completed,
}

impl TaskOrderField {
    fn column(&self) -> &'static str {
        match self {
            TaskOrderField::CreatedAt => "t.created_at",
            TaskOrderField::DueDate => "t.due_date",
            TaskOrderField::Completed => "t.completed",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "created_at" => Some(TaskOrderField::CreatedAt),
            "due_date" => Some(TaskOrderField::DueDate),
            "completed" => Some(TaskOrderField::Completed),
            _ => None,
        }
    }
}

/// One `ORDER BY` term
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTerm {
    pub field: TaskOrderField,
    pub descending: bool,
}

/// `completed` ascending, then newest first
pub fn default_ordering() -> Vec<OrderTerm> {
    vec![
        OrderTerm {
            field: TaskOrderField::Completed,
            descending: false,
        },
        OrderTerm {
            field: TaskOrderField::CreatedAt,
            descending: true,
        },
    ]
}

/// Parses an `ordering` parameter such as `-due_date,completed`
///
/// Unknown and repeated fields are skipped. Falls back to
/// [`default_ordering`] when nothing usable remains.
///
/// ```
/// use sharetask_shared::models::task::{parse_ordering, default_ordering, TaskOrderField};
///
/// let terms = parse_ordering(Some("-due_date,bogus"));
/// assert_eq!(terms.len(), 1);
/// assert_eq!(terms[0].field, TaskOrderField::DueDate);
/// assert!(terms[0].descending);
///
/// assert_eq!(parse_ordering(Some("title")), default_ordering());
/// ```
pub fn parse_ordering(raw: Option<&str>) -> Vec<OrderTerm> {
    let mut terms: Vec<OrderTerm> = Vec::new();

    for part in raw.unwrap_or_default().split(',').map(str::trim) {
        let (descending, name) = match part.strip_prefix('-') {
            Some(name) => (true, name),
            None => (false, part),
        };

        if let Some(field) = TaskOrderField::from_name(name) {
            if !terms.iter().any(|t| t.field == field) {
                terms.push(OrderTerm { field, descending });
            }
        }
    }

    if terms.is_empty() {
        default_ordering()
    } else {
        terms
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, user_id: Uuid, filter: &TaskFilter) {
    builder.push(" WHERE ");
    push_visible_to(builder, user_id);

    if let Some(completed) = filter.completed {
        builder.push(" AND t.completed = ").push_bind(completed);
    }

    if let Some(category_id) = filter.category_id {
        builder.push(" AND t.category_id = ").push_bind(category_id);
    }

    for term in &filter.search_terms {
        let pattern = contains_pattern(term);
        builder
            .push(" AND (t.title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR t.description ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn list_query(
    user_id: Uuid,
    filter: &TaskFilter,
    ordering: &[OrderTerm],
    limit: i64,
    offset: i64,
) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new(format!(
        "SELECT {TASK_COLUMNS}, u.username AS owner_username, c.name AS category_name \
         FROM tasks t \
         JOIN users u ON u.id = t.owner_id \
         LEFT JOIN categories c ON c.id = t.category_id"
    ));

    push_filters(&mut builder, user_id, filter);

    builder.push(" ORDER BY ");
    for term in ordering {
        builder
            .push(term.field.column())
            .push(if term.descending { " DESC, " } else { " ASC, " });
    }
    builder.push("t.id ASC");

    builder
        .push(" LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    builder
}

fn count_query(user_id: Uuid, filter: &TaskFilter) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*) FROM tasks t");
    push_filters(&mut builder, user_id, filter);
    builder
}

impl Task {
    /// Inserts a task; call inside the transaction that also writes its shares
    pub async fn create(conn: &mut PgConnection, data: CreateTask) -> Result<Self, sqlx::Error> {
        let task = sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (title, description, completed, due_date, owner_id, category_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, title, description, completed, created_at, updated_at,
                      due_date, owner_id, category_id
            "#,
        )
        .bind(data.title)
        .bind(data.description)
        .bind(data.completed)
        .bind(data.due_date)
        .bind(data.owner_id)
        .bind(data.category_id)
        .fetch_one(conn)
        .await?;

        tracing::info!(task_id = %task.id, owner_id = %task.owner_id, "Task created");

        Ok(task)
    }

    /// Finds a task visible to `user_id`, with owner and category names
    ///
    /// Returns `None` both when the task does not exist and when it is
    /// invisible to the user.
    pub async fn find_visible<'e, E>(
        executor: E,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<TaskWithNames>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let mut builder = QueryBuilder::new(format!(
            "SELECT {TASK_COLUMNS}, u.username AS owner_username, c.name AS category_name \
             FROM tasks t \
             JOIN users u ON u.id = t.owner_id \
             LEFT JOIN categories c ON c.id = t.category_id \
             WHERE t.id = "
        ));
        builder.push_bind(id).push(" AND ");
        push_visible_to(&mut builder, user_id);

        let task = builder
            .build_query_as::<TaskWithNames>()
            .fetch_optional(executor)
            .await?;

        Ok(task)
    }

    /// Locks a visible task row for the rest of the transaction
    ///
    /// `None` means the task is gone or invisible; a concurrent delete that
    /// commits first makes this return `None` rather than a stale row.
    pub async fn lock_visible(
        conn: &mut PgConnection,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut builder = QueryBuilder::new(format!("SELECT {TASK_COLUMNS} FROM tasks t WHERE t.id = "));
        builder.push_bind(id).push(" AND ");
        push_visible_to(&mut builder, user_id);
        builder.push(" FOR UPDATE");

        let task = builder.build_query_as::<Task>().fetch_optional(conn).await?;

        Ok(task)
    }

    /// Lists one page of the tasks visible to `user_id`
    pub async fn list_visible(
        pool: &PgPool,
        user_id: Uuid,
        filter: &TaskFilter,
        ordering: &[OrderTerm],
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TaskWithNames>, sqlx::Error> {
        let mut builder = list_query(user_id, filter, ordering, limit, offset);

        let tasks = builder.build_query_as::<TaskWithNames>().fetch_all(pool).await?;

        Ok(tasks)
    }

    /// Counts the tasks visible to `user_id` that match `filter`
    pub async fn count_visible(
        pool: &PgPool,
        user_id: Uuid,
        filter: &TaskFilter,
    ) -> Result<i64, sqlx::Error> {
        let mut builder = count_query(user_id, filter);

        let (count,): (i64,) = builder.build_query_as().fetch_one(pool).await?;

        Ok(count)
    }

    /// Applies `data` to a task and refreshes `updated_at`
    ///
    /// The caller must hold the row lock from [`Task::lock_visible`].
    pub async fn update(
        conn: &mut PgConnection,
        id: Uuid,
        data: UpdateTask,
    ) -> Result<Self, sqlx::Error> {
        let mut builder = QueryBuilder::<Postgres>::new("UPDATE tasks SET updated_at = NOW()");

        if let Some(title) = data.title {
            builder.push(", title = ").push_bind(title);
        }
        if let Some(description) = data.description {
            builder.push(", description = ").push_bind(description);
        }
        if let Some(completed) = data.completed {
            builder.push(", completed = ").push_bind(completed);
        }
        if let Some(due_date) = data.due_date {
            builder.push(", due_date = ").push_bind(due_date);
        }
        if let Some(category_id) = data.category_id {
            builder.push(", category_id = ").push_bind(category_id);
        }

        builder
            .push(" WHERE id = ")
            .push_bind(id)
            .push(
                " RETURNING id, title, description, completed, created_at, updated_at, \
                 due_date, owner_id, category_id",
            );

        let task = builder.build_query_as::<Task>().fetch_one(conn).await?;

        tracing::debug!(task_id = %task.id, "Task updated");

        Ok(task)
    }

    /// Deletes a task and, by cascade, its share rows
    pub async fn delete(conn: &mut PgConnection, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id)
            .execute(conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
