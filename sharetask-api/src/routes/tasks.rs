/// Task endpoints
///
/// Reads are filtered by the visibility predicate (owned ∪ shared-with), so a
/// task the caller cannot see answers 404 exactly like a missing one. Writes
/// are owner-only: a sharee gets 403 and the row is left untouched. PUT and
/// PATCH bodies are only deserialized after that check, so a sharee gets 403
/// whatever the body holds.
///
/// Every write runs in one transaction that locks the task row before the
/// ownership check, so a write can never resurrect a task deleted
/// concurrently.
///
/// # Endpoints
///
/// - `GET    /api/tasks` - List visible tasks (filters, search, ordering, pages)
/// - `POST   /api/tasks` - Create; the caller becomes the owner
/// - `GET    /api/tasks/:id` - Retrieve
/// - `PUT    /api/tasks/:id` - Replace (title required)
/// - `PATCH  /api/tasks/:id` - Partial update; `null` clears nullable fields
/// - `DELETE /api/tasks/:id` - Delete

use crate::{
    app::AppState,
    error::{validation_details, ApiError, ApiResult, ValidationErrorDetail},
    extract::{from_body, AppJson, AppPath, AppQuery},
    pagination::{Page, PageParams, PageRequest},
    validation::{self, no_nul},
};
use axum::{
    extract::{OriginalUri, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sharetask_shared::{
    auth::{
        authorization::{require_category_owner, require_task_write},
        middleware::AuthContext,
    },
    models::{
        category::Category,
        share::TaskShare,
        task::{parse_ordering, CreateTask, Task, TaskFilter, TaskWithNames, UpdateTask},
        user::{PublicUser, User},
    },
    visibility::{access_to_visible, normalize_shares},
};
use serde_json::Value;
use sqlx::PgConnection;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Distinguishes an explicit `null` (`Some(None)`) from an absent field (`None`)
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Task body for create, replace and partial update
///
/// `owner` and other unknown fields are ignored; the owner is always the
/// caller.
#[derive(Debug, Default, Deserialize)]
pub struct TaskRequest {
    #[serde(default, deserialize_with = "deserialize_some")]
    pub title: Option<Option<String>>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub description: Option<Option<String>>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub completed: Option<Option<bool>>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub due_date: Option<Option<DateTime<Utc>>>,

    #[serde(default, deserialize_with = "deserialize_some")]
    pub category: Option<Option<Uuid>>,

    /// Replaces the whole share set when present
    #[serde(default, deserialize_with = "deserialize_some")]
    pub shared_with: Option<Option<Vec<Uuid>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Create,
    Replace,
    Partial,
}

fn title_text(title: &str) -> Result<(), ValidationError> {
    if title.is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("This field may not be blank.".into());
        return Err(err);
    }

    no_nul(title)
}

/// A [`TaskRequest`] with nulls resolved; field rules are checked on this
#[derive(Debug, Default, PartialEq, Validate)]
struct TaskChanges {
    /// Trimmed
    #[validate(
        length(max = 255, message = "Ensure this field has no more than 255 characters."),
        custom(function = "title_text")
    )]
    title: Option<String>,

    #[validate(custom(function = "no_nul"))]
    description: Option<Option<String>>,

    completed: Option<bool>,
    due_date: Option<Option<DateTime<Utc>>>,
    category: Option<Option<Uuid>>,
    shared_with: Option<Vec<Uuid>>,
}

fn detail(field: &str, message: impl Into<String>) -> ValidationErrorDetail {
    ValidationErrorDetail {
        field: field.to_string(),
        message: message.into(),
    }
}

const NOT_NULL: &str = "This field may not be null.";

/// Drops an explicit `null` on a non-nullable field, recording the error
fn non_null<T>(
    field: &str,
    value: Option<Option<T>>,
    errors: &mut Vec<ValidationErrorDetail>,
) -> Option<T> {
    match value {
        Some(None) => {
            errors.push(detail(field, NOT_NULL));
            None
        }
        other => other.flatten(),
    }
}

impl TaskRequest {
    fn validate(self, mode: WriteMode) -> ApiResult<TaskChanges> {
        let mut errors = Vec::new();

        if self.title.is_none() && mode != WriteMode::Partial {
            errors.push(detail("title", "This field is required."));
        }

        let changes = TaskChanges {
            title: non_null("title", self.title, &mut errors).map(|title| title.trim().to_string()),
            description: self.description,
            completed: non_null("completed", self.completed, &mut errors),
            due_date: self.due_date,
            category: self.category,
            shared_with: non_null("shared_with", self.shared_with, &mut errors),
        };

        if let Err(invalid) = Validate::validate(&changes) {
            errors.extend(validation_details(invalid));
        }

        if !errors.is_empty() {
            errors.sort_by(|a, b| a.field.cmp(&b.field));
            return Err(ApiError::ValidationError(errors));
        }

        Ok(changes)
    }
}

/// Query parameters for the task list; empty values mean "no filter"
#[derive(Debug, Default, Deserialize)]
pub struct TaskListQuery {
    pub completed: Option<String>,
    pub category: Option<String>,
    pub search: Option<String>,
    pub ordering: Option<String>,

    #[serde(flatten)]
    pub page: PageParams,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub due_date: Option<DateTime<Utc>>,
    pub owner: Uuid,
    pub owner_username: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Uuid>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_name: Option<String>,

    pub shared_with_details: Vec<PublicUser>,
}

impl TaskResponse {
    fn new(row: TaskWithNames, shared_with_details: Vec<PublicUser>) -> Self {
        let task = row.task;

        Self {
            id: task.id,
            title: task.title,
            description: task.description,
            completed: task.completed,
            created_at: task.created_at,
            updated_at: task.updated_at,
            due_date: task.due_date,
            owner: task.owner_id,
            owner_username: row.owner_username,
            category: task.category_id,
            category_name: row.category_name,
            shared_with_details,
        }
    }
}

/// Loads the full response for a task the caller can see
async fn load_response(
    conn: &mut PgConnection,
    id: Uuid,
    user_id: Uuid,
) -> ApiResult<TaskResponse> {
    let row = Task::find_visible(&mut *conn, id, user_id)
        .await?
        .ok_or_else(ApiError::task_not_found)?;

    let mut shares = TaskShare::users_for_tasks(&mut *conn, &[id]).await?;

    Ok(TaskResponse::new(row, shares.remove(&id).unwrap_or_default()))
}

/// Checks that a referenced category exists and belongs to the caller
///
/// Unknown → 422; someone else's → 403.
async fn check_category(
    conn: &mut PgConnection,
    auth: &AuthContext,
    category_id: Uuid,
) -> ApiResult<()> {
    let category = Category::find_by_id(&mut *conn, category_id)
        .await?
        .ok_or_else(|| {
            ApiError::field(
                "category",
                format!("Invalid pk \"{}\" - object does not exist.", category_id),
            )
        })?;

    require_category_owner(auth, category_id, category.user_id)?;

    Ok(())
}

/// Normalizes a requested share set and checks every user exists
async fn resolve_shares(
    conn: &mut PgConnection,
    owner_id: Uuid,
    requested: &[Uuid],
) -> ApiResult<Vec<Uuid>> {
    let shares = normalize_shares(owner_id, requested);
    let existing = User::existing_ids(&mut *conn, &shares).await?;

    let missing: Vec<ValidationErrorDetail> = shares
        .iter()
        .filter(|id| !existing.contains(id))
        .map(|id| detail("shared_with", format!("Invalid pk \"{}\" - object does not exist.", id)))
        .collect();

    if !missing.is_empty() {
        return Err(ApiError::ValidationError(missing));
    }

    Ok(shares)
}

/// Runs the category and share checks that every write shares
async fn check_references(
    conn: &mut PgConnection,
    auth: &AuthContext,
    changes: &TaskChanges,
) -> ApiResult<Option<Vec<Uuid>>> {
    if let Some(Some(category_id)) = changes.category {
        check_category(&mut *conn, auth, category_id).await?;
    }

    match &changes.shared_with {
        Some(requested) => Ok(Some(resolve_shares(&mut *conn, auth.user_id, requested).await?)),
        None => Ok(None),
    }
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    OriginalUri(uri): OriginalUri,
    AppQuery(query): AppQuery<TaskListQuery>,
) -> ApiResult<Json<Page<TaskResponse>>> {
    validation::query_param("search", query.search.as_deref())?;

    let filter = TaskFilter::parse(
        query.completed.as_deref(),
        query.category.as_deref(),
        query.search.as_deref(),
    )?;
    let ordering = parse_ordering(query.ordering.as_deref());

    let request = PageRequest::from_params(&query.page, &state.config.pagination)?;
    let count = Task::count_visible(&state.db, auth.user_id, &filter).await?;
    let request = request.resolve(count)?;

    let rows = Task::list_visible(
        &state.db,
        auth.user_id,
        &filter,
        &ordering,
        request.limit(),
        request.offset(),
    )
    .await?;

    let ids: Vec<Uuid> = rows.iter().map(|row| row.task.id).collect();
    let mut shares = TaskShare::users_for_tasks(&state.db, &ids).await?;

    let results = rows
        .into_iter()
        .map(|row| {
            let sharees = shares.remove(&row.task.id).unwrap_or_default();
            TaskResponse::new(row, sharees)
        })
        .collect();

    Ok(Json(Page::new(results, count, request, &uri)))
}

pub async fn create_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppJson(req): AppJson<TaskRequest>,
) -> ApiResult<(StatusCode, Json<TaskResponse>)> {
    let changes = req.validate(WriteMode::Create)?;

    let mut tx = state.db.begin().await?;

    let shares = check_references(&mut tx, &auth, &changes).await?;

    let task = Task::create(
        &mut tx,
        CreateTask {
            title: changes.title.unwrap_or_default(),
            description: changes.description.flatten(),
            completed: changes.completed.unwrap_or(false),
            due_date: changes.due_date.flatten(),
            category_id: changes.category.flatten(),
            owner_id: auth.user_id,
        },
    )
    .await?;

    if let Some(shares) = shares {
        TaskShare::replace(&mut tx, task.id, &shares).await?;
    }

    let response = load_response(&mut tx, task.id, auth.user_id).await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn get_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<Json<TaskResponse>> {
    let mut conn = state.db.acquire().await?;
    let response = load_response(&mut conn, id, auth.user_id).await?;

    Ok(Json(response))
}

async fn apply_update(
    state: &AppState,
    auth: &AuthContext,
    id: Uuid,
    body: Value,
    mode: WriteMode,
) -> ApiResult<TaskResponse> {
    let mut tx = state.db.begin().await?;

    let task = Task::lock_visible(&mut tx, id, auth.user_id)
        .await?
        .ok_or_else(ApiError::task_not_found)?;

    if let Err(err) = require_task_write(access_to_visible(auth.user_id, task.owner_id)) {
        tracing::info!(task_id = %id, user_id = %auth.user_id, "Sharee attempted to modify task");
        return Err(err.into());
    }

    let changes = from_body::<TaskRequest>(&body)?.validate(mode)?;
    let shares = check_references(&mut tx, auth, &changes).await?;

    Task::update(
        &mut tx,
        id,
        UpdateTask {
            title: changes.title,
            description: changes.description,
            completed: changes.completed,
            due_date: changes.due_date,
            category_id: changes.category,
        },
    )
    .await?;

    if let Some(shares) = shares {
        TaskShare::replace(&mut tx, id, &shares).await?;
    }

    let response = load_response(&mut tx, id, auth.user_id).await?;
    tx.commit().await?;

    Ok(response)
}

pub async fn update_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<Value>,
) -> ApiResult<Json<TaskResponse>> {
    Ok(Json(apply_update(&state, &auth, id, body, WriteMode::Replace).await?))
}

pub async fn patch_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<Value>,
) -> ApiResult<Json<TaskResponse>> {
    Ok(Json(apply_update(&state, &auth, id, body, WriteMode::Partial).await?))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<StatusCode> {
    let mut tx = state.db.begin().await?;

    let task = Task::lock_visible(&mut tx, id, auth.user_id)
        .await?
        .ok_or_else(ApiError::task_not_found)?;

    require_task_write(access_to_visible(auth.user_id, task.owner_id))?;

    Task::delete(&mut tx, id).await?;
    tx.commit().await?;

    tracing::info!(task_id = %id, user_id = %auth.user_id, "Task deleted");

    Ok(StatusCode::NO_CONTENT)
}
