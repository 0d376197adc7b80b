use std::collections::HashMap;

use sqlx::{Pool, Postgres};

use crate::{
    error::{ApiError, ValidationErrors},
    form::QueryParams,
    image::MediaStore,
    jwt::SessionData,
    pagination::PageRequest,
    permissions::ActionType,
    schema::{AuthorRecipeRow, Id, RecipeShort, Subscription, UserProfile, UserProfileRow},
};

use super::users::get_profile;

/// `recipes_limit` caps the recipe preview of every author; absent means all of them.
pub fn recipes_limit(params: &QueryParams) -> Result<Option<i64>, ApiError> {
    match params.get_number::<i64>("recipes_limit")? {
        Some(limit) if limit < 0 => {
            Err(ValidationErrors::single("recipes_limit", "Ensure this value is greater than or equal to 0.").into())
        }
        limit => Ok(limit),
    }
}

/// Attaches recipe previews and counts to a page of authors.
async fn attach_recipes(
    authors: Vec<UserProfile>,
    recipes_limit: Option<i64>,
    media: &MediaStore,
    pool: &Pool<Postgres>,
) -> Result<Vec<Subscription>, ApiError> {
    if authors.is_empty() {
        return Ok(vec![]);
    }
    let ids: Vec<Id> = authors.iter().map(|author| author.account.id).collect();

    let rows: Vec<AuthorRecipeRow> = sqlx::query_as(
        "
        SELECT author_id, id, name, image, cooking_time
        FROM (
            SELECT r.author_id, r.id, r.name, r.image, r.cooking_time,
                ROW_NUMBER() OVER (PARTITION BY r.author_id ORDER BY r.pub_date DESC, r.id DESC) AS position
            FROM recipes r
            WHERE r.author_id = ANY($1)
        ) ranked
        WHERE $2::BIGINT IS NULL OR position <= $2
        ORDER BY author_id, position
    ",
    )
    .bind(&ids)
    .bind(recipes_limit)
    .fetch_all(pool)
    .await?;

    let counts: Vec<(Id, i64)> = sqlx::query_as(
        "SELECT author_id, COUNT(*) FROM recipes WHERE author_id = ANY($1) GROUP BY author_id",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;
    let counts: HashMap<Id, i64> = counts.into_iter().collect();

    let mut recipes: HashMap<Id, Vec<RecipeShort>> = HashMap::new();
    for row in rows {
        recipes
            .entry(row.author_id)
            .or_default()
            .push(row.recipe.into_short(media));
    }

    Ok(authors
        .into_iter()
        .map(|author| {
            let id = author.account.id;
            Subscription {
                author,
                recipes: recipes.remove(&id).unwrap_or_default(),
                recipes_count: counts.get(&id).copied().unwrap_or(0),
            }
        })
        .collect())
}

pub async fn fetch_subscriptions(
    session: &SessionData,
    page: &PageRequest,
    recipes_limit: Option<i64>,
    media: &MediaStore,
    pool: &Pool<Postgres>,
) -> Result<(Vec<Subscription>, i64), ApiError> {
    let rows: Vec<UserProfileRow> = sqlx::query_as(
        "
        SELECT u.email, u.id, u.username, u.first_name, u.last_name,
            TRUE AS is_subscribed,
            COUNT(*) OVER() AS count
        FROM subscriptions s
        INNER JOIN users u ON u.id = s.author_id
        WHERE s.user_id = $1
        ORDER BY s.id
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(session.user_id)
    .bind(page.limit)
    .bind(page.offset())
    .fetch_all(pool)
    .await?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    let authors = rows.into_iter().map(|row| row.profile).collect();
    Ok((attach_recipes(authors, recipes_limit, media, pool).await?, total_count))
}

pub async fn subscribe(
    author_id: Id,
    session: &SessionData,
    recipes_limit: Option<i64>,
    media: &MediaStore,
    pool: &Pool<Postgres>,
) -> Result<Subscription, ApiError> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;

    let author = get_profile(author_id, Some(session.user_id), pool)
        .await?
        .ok_or(ApiError::NotFound)?;

    if author_id == session.user_id {
        return Err(ApiError::bad_request("You can't subscribe to yourself."));
    }

    let result = sqlx::query(
        "INSERT INTO subscriptions (user_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(session.user_id)
    .bind(author_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::bad_request("You are already subscribed to this author."));
    }
    log::debug!("User {} subscribed to {author_id}", session.user_id);

    let author = UserProfile {
        is_subscribed: true,
        ..author
    };
    let mut subscription = attach_recipes(vec![author], recipes_limit, media, pool).await?;
    subscription.pop().ok_or(ApiError::NotFound)
}

pub async fn unsubscribe(
    author_id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;

    get_profile(author_id, None, pool)
        .await?
        .ok_or(ApiError::NotFound)?;

    let result = sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND author_id = $2")
        .bind(session.user_id)
        .bind(author_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::bad_request("You are not subscribed to this author."));
    }
    Ok(())
}
