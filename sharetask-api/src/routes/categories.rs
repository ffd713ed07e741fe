/// Category endpoints
///
/// Categories are private to their owner: every query is scoped to the
/// caller, and another user's category answers 404 exactly like a missing
/// one. The owner always comes from the token.
///
/// # Endpoints
///
/// - `GET    /api/categories` - List own categories, ordered by name
/// - `POST   /api/categories` - Create
/// - `GET    /api/categories/:id` - Retrieve
/// - `PUT    /api/categories/:id` - Replace (name required)
/// - `PATCH  /api/categories/:id` - Partial update
/// - `DELETE /api/categories/:id` - Delete; tasks keep existing without it

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{AppJson, AppPath, AppQuery},
    pagination::{Page, PageParams, PageRequest},
    validation::no_nul,
};
use axum::{
    extract::{OriginalUri, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use sharetask_shared::{
    auth::middleware::AuthContext,
    models::category::{is_hex_color, Category, CreateCategory},
};
use uuid::Uuid;
use validator::{Validate, ValidationError};

const DUPLICATE_NAME: &str = "You already have a category with this name.";

fn hex_color(color: &str) -> Result<(), ValidationError> {
    if !is_hex_color(color) {
        let mut err = ValidationError::new("hex_color");
        err.message = Some("Color must be a hex value like #1A2B3C.".into());
        return Err(err);
    }

    Ok(())
}

/// Body for create, replace and partial update
///
/// `name` is trimmed before validation. Unknown fields (including `user`)
/// are ignored.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct CategoryRequest {
    #[validate(
        length(min = 1, max = 100, message = "Name must be between 1 and 100 characters."),
        custom(function = "no_nul")
    )]
    pub name: Option<String>,

    #[validate(custom(function = "hex_color"))]
    pub color: Option<String>,
}

impl CategoryRequest {
    fn normalized(mut self) -> Self {
        self.name = self.name.map(|name| name.trim().to_string());
        self
    }

    fn require_name(&self) -> ApiResult<&str> {
        self.name
            .as_deref()
            .ok_or_else(|| ApiError::field("name", "This field is required."))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CategoryResponse {
    pub id: Uuid,
    pub name: String,
    pub color: String,
}

impl From<Category> for CategoryResponse {
    fn from(category: Category) -> Self {
        Self {
            id: category.id,
            name: category.name,
            color: category.color,
        }
    }
}

async fn ensure_name_free(
    state: &AppState,
    user_id: Uuid,
    name: &str,
    exclude: Option<Uuid>,
) -> ApiResult<()> {
    if Category::name_taken(&state.db, user_id, name, exclude).await? {
        return Err(ApiError::field("name", DUPLICATE_NAME));
    }

    Ok(())
}

pub async fn list_categories(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    OriginalUri(uri): OriginalUri,
    AppQuery(params): AppQuery<PageParams>,
) -> ApiResult<Json<Page<CategoryResponse>>> {
    let request = PageRequest::from_params(&params, &state.config.pagination)?;
    let count = Category::count_by_user(&state.db, auth.user_id).await?;
    let request = request.resolve(count)?;

    let categories =
        Category::list_by_user(&state.db, auth.user_id, request.limit(), request.offset()).await?;

    let results = categories.into_iter().map(CategoryResponse::from).collect();

    Ok(Json(Page::new(results, count, request, &uri)))
}

pub async fn create_category(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppJson(req): AppJson<CategoryRequest>,
) -> ApiResult<(StatusCode, Json<CategoryResponse>)> {
    let req = req.normalized();
    req.validate()?;
    let name = req.require_name()?.to_string();

    ensure_name_free(&state, auth.user_id, &name, None).await?;

    let category = Category::create(
        &state.db,
        CreateCategory {
            name,
            color: req.color,
            user_id: auth.user_id,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(category.into())))
}

pub async fn get_category(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<Json<CategoryResponse>> {
    let category = Category::find_owned(&state.db, id, auth.user_id)
        .await?
        .ok_or_else(ApiError::category_not_found)?;

    Ok(Json(category.into()))
}

async fn apply_update(
    state: &AppState,
    auth: &AuthContext,
    id: Uuid,
    req: CategoryRequest,
    name_required: bool,
) -> ApiResult<CategoryResponse> {
    let req = req.normalized();
    req.validate()?;
    if name_required {
        req.require_name()?;
    }

    let current = Category::find_owned(&state.db, id, auth.user_id)
        .await?
        .ok_or_else(ApiError::category_not_found)?;

    let name = req.name.unwrap_or(current.name);
    let color = req.color.unwrap_or(current.color);

    ensure_name_free(state, auth.user_id, &name, Some(id)).await?;

    let category = Category::update(&state.db, id, auth.user_id, &name, &color)
        .await?
        .ok_or_else(ApiError::category_not_found)?;

    tracing::debug!(category_id = %id, user_id = %auth.user_id, "Category updated");

    Ok(category.into())
}

pub async fn update_category(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<CategoryRequest>,
) -> ApiResult<Json<CategoryResponse>> {
    Ok(Json(apply_update(&state, &auth, id, req, true).await?))
}

pub async fn patch_category(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath(id): AppPath<Uuid>,
    AppJson(req): AppJson<CategoryRequest>,
) -> ApiResult<Json<CategoryResponse>> {
    Ok(Json(apply_update(&state, &auth, id, req, false).await?))
}

pub async fn delete_category(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    AppPath(id): AppPath<Uuid>,
) -> ApiResult<StatusCode> {
    if !Category::delete_owned(&state.db, id, auth.user_id).await? {
        return Err(ApiError::category_not_found());
    }

    tracing::info!(category_id = %id, user_id = %auth.user_id, "Category deleted");

    Ok(StatusCode::NO_CONTENT)
}
