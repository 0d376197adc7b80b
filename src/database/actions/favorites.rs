use sqlx::{Pool, Postgres};

use crate::{
    error::ApiError,
    image::MediaStore,
    jwt::SessionData,
    permissions::ActionType,
    schema::{Id, RecipeShort},
};

use super::recipes::get_short_recipe;

/// Per-user recipe collections with identical add/remove semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeList {
    Favorites,
    ShoppingCart,
}

impl RecipeList {
    fn table(self) -> &'static str {
        match self {
            RecipeList::Favorites => "favorites",
            RecipeList::ShoppingCart => "shopping_cart",
        }
    }

    fn action(self) -> ActionType {
        match self {
            RecipeList::Favorites => ActionType::ManageOwnFavorites,
            RecipeList::ShoppingCart => ActionType::ManageOwnShoppingCart,
        }
    }

    pub fn already_added(self) -> &'static str {
        match self {
            RecipeList::Favorites => "Recipe is already in favorites.",
            RecipeList::ShoppingCart => "Recipe is already in the shopping cart.",
        }
    }

    pub fn not_added(self) -> &'static str {
        match self {
            RecipeList::Favorites => "Recipe is not in favorites.",
            RecipeList::ShoppingCart => "Recipe is not in the shopping cart.",
        }
    }
}

/// Adds the recipe and returns its short form for the response body.
pub async fn add_to_list(
    list: RecipeList,
    recipe_id: Id,
    session: &SessionData,
    media: &MediaStore,
    pool: &Pool<Postgres>,
) -> Result<RecipeShort, ApiError> {
    session.authenticate(list.action())?;

    let recipe = get_short_recipe(recipe_id, pool)
        .await?
        .ok_or(ApiError::NotFound)?;

    let result = sqlx::query(&format!(
        "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        list.table()
    ))
    .bind(session.user_id)
    .bind(recipe_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::bad_request(list.already_added()));
    }

    log::debug!(
        "User {} added recipe {recipe_id} to {}",
        session.user_id,
        list.table()
    );
    Ok(recipe.into_short(media))
}

pub async fn remove_from_list(
    list: RecipeList,
    recipe_id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), ApiError> {
    session.authenticate(list.action())?;

    get_short_recipe(recipe_id, pool)
        .await?
        .ok_or(ApiError::NotFound)?;

    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
        list.table()
    ))
    .bind(session.user_id)
    .bind(recipe_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::bad_request(list.not_added()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_use_their_own_tables() {
        assert_eq!(RecipeList::Favorites.table(), "favorites");
        assert_eq!(RecipeList::ShoppingCart.table(), "shopping_cart");
        assert_ne!(
            RecipeList::Favorites.already_added(),
            RecipeList::ShoppingCart.already_added()
        );
    }
}
