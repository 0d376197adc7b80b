use crate::{
    error::{ApiError, ValidationErrors},
    schema::{Id, Tag},
    validation::TagChanges,
};

use sqlx::{Pool, Postgres};

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, ApiError> {
    let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY slug")
        .fetch_all(pool)
        .await?;

    Ok(list)
}

pub async fn get_tag(id: Id, pool: &Pool<Postgres>) -> Result<Option<Tag>, ApiError> {
    let tag: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(tag)
}

/// Field errors for values already used by another tag.
async fn check_unique(
    changes: &TagChanges,
    exclude: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    let (name, color, slug): (Option<bool>, Option<bool>, Option<bool>) = sqlx::query_as(
        "
        SELECT bool_or(name = $1), bool_or(color = $2), bool_or(slug = $3)
        FROM tags
        WHERE (name = $1 OR color = $2 OR slug = $3) AND id IS DISTINCT FROM $4
    ",
    )
    .bind(&changes.name)
    .bind(&changes.color)
    .bind(&changes.slug)
    .bind(exclude)
    .fetch_one(pool)
    .await?;

    let mut errors = ValidationErrors::new();
    for (field, taken) in [("name", name), ("color", color), ("slug", slug)] {
        if taken.unwrap_or(false) {
            errors.add(field, &format!("Tag with this {field} already exists."));
        }
    }
    errors.into_result()
}

pub async fn create_tag(changes: &TagChanges, pool: &Pool<Postgres>) -> Result<Tag, ApiError> {
    check_unique(changes, None, pool).await?;

    let tag: Tag = sqlx::query_as(
        "INSERT INTO tags (name, color, slug) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(&changes.name)
    .bind(&changes.color)
    .bind(&changes.slug)
    .fetch_one(pool)
    .await?;

    log::info!("Created tag {} ({})", tag.slug, tag.id);
    Ok(tag)
}

pub async fn update_tag(
    id: Id,
    changes: &TagChanges,
    pool: &Pool<Postgres>,
) -> Result<Tag, ApiError> {
    check_unique(changes, Some(id), pool).await?;

    let tag: Option<Tag> = sqlx::query_as(
        "
        UPDATE tags SET
            name = COALESCE($1, name),
            color = COALESCE($2, color),
            slug = COALESCE($3, slug)
        WHERE id = $4
        RETURNING *
    ",
    )
    .bind(&changes.name)
    .bind(&changes.color)
    .bind(&changes.slug)
    .bind(id)
    .fetch_optional(pool)
    .await?;

    tag.ok_or(ApiError::NotFound)
}

pub async fn delete_tag(id: Id, pool: &Pool<Postgres>) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM tags WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(())
}

/// Ids from `ids` with no matching tag.
pub async fn find_missing_tags(ids: &[Id], pool: &Pool<Postgres>) -> Result<Vec<Id>, ApiError> {
    let found: Vec<(Id,)> = sqlx::query_as("SELECT id FROM tags WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await?;

    let found: Vec<Id> = found.into_iter().map(|(id,)| id).collect();
    Ok(ids.iter().filter(|id| !found.contains(id)).copied().collect())
}

/// Slugs from `slugs` with no matching tag.
pub async fn find_missing_slugs(
    slugs: &[String],
    pool: &Pool<Postgres>,
) -> Result<Vec<String>, ApiError> {
    let found: Vec<String> = sqlx::query_scalar("SELECT slug FROM tags WHERE slug = ANY($1)")
        .bind(slugs)
        .fetch_all(pool)
        .await?;

    Ok(slugs
        .iter()
        .filter(|slug| !found.contains(slug))
        .cloned()
        .collect())
}
