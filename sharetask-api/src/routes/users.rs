/// User directory
///
/// `GET /api/users?search=&page=&page_size=` lists public profiles so a task
/// owner can find people to share with. Any authenticated user may list.

use crate::{
    app::AppState,
    error::ApiResult,
    extract::AppQuery,
    pagination::{Page, PageParams, PageRequest},
    validation,
};
use axum::{extract::{OriginalUri, State}, Json};
use serde::Deserialize;
use sharetask_shared::models::user::{PublicUser, User};

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub search: Option<String>,

    #[serde(flatten)]
    pub page: PageParams,
}

pub async fn list_users(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    AppQuery(query): AppQuery<UserListQuery>,
) -> ApiResult<Json<Page<PublicUser>>> {
    validation::query_param("search", query.search.as_deref())?;
    let search = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());

    let request = PageRequest::from_params(&query.page, &state.config.pagination)?;
    let count = User::count_search(&state.db, search).await?;
    let request = request.resolve(count)?;

    let users = User::search(&state.db, search, request.limit(), request.offset()).await?;

    Ok(Json(Page::new(users, count, request, &uri)))
}
