use std::collections::HashMap;

use sqlx::{PgConnection, Pool, Postgres, QueryBuilder};

use crate::{
    error::{ApiError, ValidationErrors},
    form::QueryParams,
    image::MediaStore,
    jwt::SessionData,
    pagination::PageRequest,
    permissions::ActionType,
    schema::{
        Id, Recipe, RecipeIngredient, RecipeIngredientRow, RecipeRow, RecipeShort, RecipeShortRow,
        RecipeTagRow, Tag,
    },
    validation::{NewRecipe, RecipeChanges},
};

use super::{tags::find_missing_slugs, users::get_user_by_id};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct RecipeFilter {
    pub author: Option<Id>,
    pub tags: Vec<String>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

impl RecipeFilter {
    pub fn from_params(params: &QueryParams) -> Result<Self, ApiError> {
        Ok(Self {
            author: params.get_number("author")?,
            tags: params.get_all("tags").into_iter().map(str::to_owned).collect(),
            is_favorited: params.get_flag("is_favorited")?,
            is_in_shopping_cart: params.get_flag("is_in_shopping_cart")?,
        })
    }

    /// Unknown authors or tag slugs are a 400, not an empty page.
    pub async fn check_choices(&self, pool: &Pool<Postgres>) -> Result<(), ApiError> {
        let mut errors = ValidationErrors::new();

        if let Some(author) = self.author {
            if get_user_by_id(author, pool).await?.is_none() {
                errors.add(
                    "author",
                    "Select a valid choice. That choice is not one of the available choices.",
                );
            }
        }
        if !self.tags.is_empty() {
            for slug in find_missing_slugs(&self.tags, pool).await? {
                errors.add(
                    "tags",
                    &format!("Select a valid choice. {slug} is not one of the available choices."),
                );
            }
        }

        errors.into_result()
    }

    /// Query pairs to carry over into pagination links.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![];
        if let Some(author) = self.author {
            pairs.push(("author".to_owned(), author.to_string()));
        }
        for tag in &self.tags {
            pairs.push(("tags".to_owned(), tag.to_owned()));
        }
        if self.is_favorited {
            pairs.push(("is_favorited".to_owned(), "1".to_owned()));
        }
        if self.is_in_shopping_cart {
            pairs.push(("is_in_shopping_cart".to_owned(), "1".to_owned()));
        }
        pairs
    }
}

impl RecipeShortRow {
    pub fn into_short(self, media: &MediaStore) -> RecipeShort {
        RecipeShort {
            id: self.id,
            name: self.name,
            image: media.url_for(&self.image),
            cooking_time: self.cooking_time,
        }
    }
}

/// Recipe columns plus author and viewer-relative flags; callers append `AND ...` clauses.
fn select_recipes(viewer: Option<Id>) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::new(
        "
        SELECT r.id, r.name, r.image, r.text, r.cooking_time, r.pub_date,
            u.id AS author_id, u.email AS author_email, u.username AS author_username,
            u.first_name AS author_first_name, u.last_name AS author_last_name,
            EXISTS (SELECT 1 FROM subscriptions s WHERE s.author_id = r.author_id AND s.user_id = ",
    );
    query.push_bind(viewer);
    query.push(
        ") AS author_is_subscribed,
            EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ",
    );
    query.push_bind(viewer);
    query.push(
        ") AS is_favorited,
            EXISTS (SELECT 1 FROM shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = ",
    );
    query.push_bind(viewer);
    query.push(
        ") AS is_in_shopping_cart,
            COUNT(*) OVER() AS count
        FROM recipes r
        INNER JOIN users u ON u.id = r.author_id
        WHERE TRUE",
    );
    query
}

pub async fn fetch_recipes(
    filter: &RecipeFilter,
    viewer: Option<Id>,
    page: &PageRequest,
    media: &MediaStore,
    pool: &Pool<Postgres>,
) -> Result<(Vec<Recipe>, i64), ApiError> {
    let mut query = select_recipes(viewer);

    if let Some(author) = filter.author {
        query.push(" AND r.author_id = ").push_bind(author);
    }
    if !filter.tags.is_empty() {
        query
            .push(
                " AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id WHERE rt.recipe_id = r.id AND t.slug = ANY(",
            )
            .push_bind(filter.tags.clone())
            .push("))");
    }
    // Membership filters only apply to authenticated viewers.
    if let Some(viewer) = viewer {
        if filter.is_favorited {
            query
                .push(" AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
                .push_bind(viewer)
                .push(")");
        }
        if filter.is_in_shopping_cart {
            query
                .push(" AND EXISTS (SELECT 1 FROM shopping_cart c WHERE c.recipe_id = r.id AND c.user_id = ")
                .push_bind(viewer)
                .push(")");
        }
    }

    query
        .push(" ORDER BY r.pub_date DESC, r.id DESC LIMIT ")
        .push_bind(page.limit)
        .push(" OFFSET ")
        .push_bind(page.offset());

    let rows: Vec<RecipeRow> = query.build_query_as().fetch_all(pool).await?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    let recipes = attach_details(rows, media, pool).await?;
    Ok((recipes, total_count))
}

pub async fn get_recipe(
    id: Id,
    viewer: Option<Id>,
    media: &MediaStore,
    pool: &Pool<Postgres>,
) -> Result<Option<Recipe>, ApiError> {
    let mut query = select_recipes(viewer);
    query.push(" AND r.id = ").push_bind(id);

    let row: Option<RecipeRow> = query.build_query_as().fetch_optional(pool).await?;
    match row {
        Some(row) => Ok(attach_details(vec![row], media, pool).await?.pop()),
        None => Ok(None),
    }
}

/// Loads tags and ingredients for a page of recipes in two queries.
async fn attach_details(
    rows: Vec<RecipeRow>,
    media: &MediaStore,
    pool: &Pool<Postgres>,
) -> Result<Vec<Recipe>, ApiError> {
    if rows.is_empty() {
        return Ok(vec![]);
    }
    let ids: Vec<Id> = rows.iter().map(|row| row.id).collect();

    let tag_rows: Vec<RecipeTagRow> = sqlx::query_as(
        "
        SELECT rt.recipe_id, t.id, t.name, t.color, t.slug
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = ANY($1)
        ORDER BY t.slug
    ",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let ingredient_rows: Vec<RecipeIngredientRow> = sqlx::query_as(
        "
        SELECT ri.recipe_id, i.id, i.name, i.measurement_unit, ri.amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = ANY($1)
        ORDER BY ri.id
    ",
    )
    .bind(&ids)
    .fetch_all(pool)
    .await?;

    let mut tags: HashMap<Id, Vec<Tag>> = HashMap::new();
    for row in tag_rows {
        tags.entry(row.recipe_id).or_default().push(row.tag);
    }
    let mut ingredients: HashMap<Id, Vec<RecipeIngredient>> = HashMap::new();
    for row in ingredient_rows {
        ingredients
            .entry(row.recipe_id)
            .or_default()
            .push(row.ingredient);
    }

    Ok(rows
        .into_iter()
        .map(|row| Recipe {
            id: row.id,
            tags: tags.remove(&row.id).unwrap_or_default(),
            author: row.author(),
            ingredients: ingredients.remove(&row.id).unwrap_or_default(),
            is_favorited: row.is_favorited,
            is_in_shopping_cart: row.is_in_shopping_cart,
            image: media.url_for(&row.image),
            name: row.name,
            text: row.text,
            cooking_time: row.cooking_time,
            pub_date: row.pub_date,
        })
        .collect())
}

pub async fn get_short_recipe(
    id: Id,
    pool: &Pool<Postgres>,
) -> Result<Option<RecipeShortRow>, ApiError> {
    let row: Option<RecipeShortRow> =
        sqlx::query_as("SELECT id, name, image, cooking_time FROM recipes WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;

    Ok(row)
}

/// Fails unless the session may modify the recipe. Returns the stored image path.
pub async fn get_recipe_mut(
    id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<String, ApiError> {
    let recipe: Option<(Id, String)> =
        sqlx::query_as("SELECT author_id, image FROM recipes WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;
    let (author_id, image) = recipe.ok_or(ApiError::NotFound)?;

    session.authenticate(ActionType::ManageOwnRecipes)?;
    if author_id != session.user_id {
        session.authenticate(ActionType::ManageAllRecipes)?;
    }
    Ok(image)
}

async fn replace_recipe_tags(
    recipe_id: Id,
    tags: &[Id],
    conn: &mut PgConnection,
) -> Result<(), ApiError> {
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query("INSERT INTO recipe_tags (recipe_id, tag_id) SELECT $1, UNNEST($2::INTEGER[])")
        .bind(recipe_id)
        .bind(tags)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

async fn replace_recipe_ingredients(
    recipe_id: Id,
    ingredients: &[(Id, i32)],
    conn: &mut PgConnection,
) -> Result<(), ApiError> {
    let (ids, amounts): (Vec<Id>, Vec<i32>) = ingredients.iter().copied().unzip();

    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query(
        "
        INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount)
        SELECT $1, i.ingredient_id, i.amount
        FROM UNNEST($2::INTEGER[], $3::INTEGER[]) AS i (ingredient_id, amount)
    ",
    )
    .bind(recipe_id)
    .bind(ids)
    .bind(amounts)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Inserts the recipe with its tags and ingredients in one transaction.
pub async fn create_recipe(
    author_id: Id,
    recipe: &NewRecipe,
    image: &str,
    pool: &Pool<Postgres>,
) -> Result<Id, ApiError> {
    let mut tr = pool.begin().await?;

    let (id,): (Id,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, image, text, cooking_time)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ",
    )
    .bind(author_id)
    .bind(&recipe.name)
    .bind(image)
    .bind(&recipe.text)
    .bind(recipe.cooking_time)
    .fetch_one(&mut *tr)
    .await?;

    replace_recipe_tags(id, &recipe.tags, &mut tr).await?;
    replace_recipe_ingredients(id, &recipe.ingredients, &mut tr).await?;

    tr.commit().await?;

    log::info!("User {author_id} published recipe {id}");
    Ok(id)
}

/// Applies present fields; `tags`/`ingredients` replace the whole set.
pub async fn update_recipe(
    id: Id,
    changes: &RecipeChanges,
    image: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    let mut tr = pool.begin().await?;

    sqlx::query(
        "
        UPDATE recipes SET
            name = COALESCE($1, name),
            text = COALESCE($2, text),
            cooking_time = COALESCE($3, cooking_time),
            image = COALESCE($4, image)
        WHERE id = $5
    ",
    )
    .bind(&changes.name)
    .bind(&changes.text)
    .bind(changes.cooking_time)
    .bind(image)
    .bind(id)
    .execute(&mut *tr)
    .await?;

    if let Some(tags) = &changes.tags {
        replace_recipe_tags(id, tags, &mut tr).await?;
    }
    if let Some(ingredients) = &changes.ingredients {
        replace_recipe_ingredients(id, ingredients, &mut tr).await?;
    }

    tr.commit().await?;
    Ok(())
}

pub async fn delete_recipe(id: Id, pool: &Pool<Postgres>) -> Result<(), ApiError> {
    let result = sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(())
}
