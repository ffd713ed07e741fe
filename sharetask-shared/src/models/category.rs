/// Category model and database operations
///
/// A category is a named, colored label owned by exactly one user. Nobody
/// else can see it, and tasks may only reference their owner's categories.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE categories (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(100) NOT NULL,
///     user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     color VARCHAR(7) NOT NULL DEFAULT '#000000',
///     CONSTRAINT categories_name_user_id_key UNIQUE (name, user_id)
/// );
/// ```
///
/// Deleting a category leaves its tasks in place with `category_id` cleared.

use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

/// Name of the unique constraint on `(name, user_id)`
pub const NAME_CONSTRAINT: &str = "categories_name_user_id_key";

/// Color assigned when none is given
pub const DEFAULT_COLOR: &str = "#000000";

/// Maximum category name length
pub const MAX_NAME_LENGTH: usize = 100;

/// Checks for a `#RRGGBB` color string
///
/// ```
/// use sharetask_shared::models::category::is_hex_color;
///
/// assert!(is_hex_color("#1a2B3c"));
/// assert!(!is_hex_color("#123"));
/// assert!(!is_hex_color("red"));
/// ```
pub fn is_hex_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,

    /// Owner
    pub user_id: Uuid,

    /// `#RRGGBB`
    pub color: String,
}

/// Input for creating a category
#[derive(Debug, Clone)]
pub struct CreateCategory {
    pub name: String,

    /// Falls back to [`DEFAULT_COLOR`]
    pub color: Option<String>,

    pub user_id: Uuid,
}

impl Category {
    /// Creates a category for `data.user_id`
    ///
    /// # Errors
    ///
    /// Returns a database error on [`NAME_CONSTRAINT`] when the owner already
    /// has a category with this name.
    pub async fn create(pool: &PgPool, data: CreateCategory) -> Result<Self, sqlx::Error> {
        let category = sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (name, user_id, color)
            VALUES ($1, $2, $3)
            RETURNING id, name, user_id, color
            "#,
        )
        .bind(data.name)
        .bind(data.user_id)
        .bind(data.color.unwrap_or_else(|| DEFAULT_COLOR.to_string()))
        .fetch_one(pool)
        .await?;

        tracing::debug!(category_id = %category.id, user_id = %category.user_id, "Category created");

        Ok(category)
    }

    /// Finds a category by ID regardless of owner
    ///
    /// Used to tell "no such category" apart from "someone else's category"
    /// when a task references one.
    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let category = sqlx::query_as::<_, Category>(
            "SELECT id, name, user_id, color FROM categories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(category)
    }

    /// Finds a category only if `user_id` owns it
    pub async fn find_owned(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let category = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, name, user_id, color
            FROM categories
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

        Ok(category)
    }

    /// Lists a user's categories ordered by name
    pub async fn list_by_user(
        pool: &PgPool,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let categories = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, name, user_id, color
            FROM categories
            WHERE user_id = $1
            ORDER BY name ASC, id ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

        Ok(categories)
    }

    pub async fn count_by_user(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM categories WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(pool)
            .await?;

        Ok(count)
    }

    /// Checks whether `user_id` already has a category called `name`
    ///
    /// `exclude` skips the category being renamed.
    pub async fn name_taken(
        pool: &PgPool,
        user_id: Uuid,
        name: &str,
        exclude: Option<Uuid>,
    ) -> Result<bool, sqlx::Error> {
        let (taken,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM categories
                WHERE user_id = $1 AND name = $2 AND ($3::uuid IS NULL OR id <> $3)
            )
            "#,
        )
        .bind(user_id)
        .bind(name)
        .bind(exclude)
        .fetch_one(pool)
        .await?;

        Ok(taken)
    }

    /// Overwrites name and color of a category the user owns
    ///
    /// Returns `None` if the category does not exist or belongs to someone else.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        user_id: Uuid,
        name: &str,
        color: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let category = sqlx::query_as::<_, Category>(
            r#"
            UPDATE categories
            SET name = $3, color = $4
            WHERE id = $1 AND user_id = $2
            RETURNING id, name, user_id, color
            "#,
        )
        .bind(id)
        .bind(user_id)
        .bind(name)
        .bind(color)
        .fetch_optional(pool)
        .await?;

        Ok(category)
    }

    /// Deletes a category the user owns
    ///
    /// Referencing tasks survive with their category cleared (`ON DELETE SET NULL`).
    pub async fn delete_owned(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
