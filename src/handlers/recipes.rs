use warp::{reject::Rejection, reply::Response};

use crate::{
    actions::{
        favorites::{add_to_list, remove_from_list, RecipeList},
        ingredients::find_missing_ingredients,
        recipes::{self, RecipeFilter},
        tags::find_missing_tags,
    },
    error::ApiError,
    form::{QueryPairs, QueryParams},
    jwt::SessionData,
    pagination::{Page, PageRequest},
    permissions::ActionType,
    schema::{Id, Recipe},
    shopping_list::{fetch_shopping_list, render_shopping_list},
    state::AppState,
    validation::RecipePayload,
};

use super::reply;

/// Unknown tag or ingredient ids are a 404.
async fn check_references(
    tags: Option<&[Id]>,
    ingredients: Option<&[(Id, i32)]>,
    state: &AppState,
) -> Result<(), ApiError> {
    if let Some(tags) = tags {
        let missing = find_missing_tags(tags, &state.pool).await?;
        if !missing.is_empty() {
            log::debug!("Unknown tags {missing:?}");
            return Err(ApiError::NotFound);
        }
    }
    if let Some(ingredients) = ingredients {
        let ids: Vec<Id> = ingredients.iter().map(|(id, _)| *id).collect();
        let missing = find_missing_ingredients(&ids, &state.pool).await?;
        if !missing.is_empty() {
            log::debug!("Unknown ingredients {missing:?}");
            return Err(ApiError::NotFound);
        }
    }
    Ok(())
}

async fn load_recipe(id: Id, viewer: Option<Id>, state: &AppState) -> Result<Recipe, ApiError> {
    recipes::get_recipe(id, viewer, &state.media, &state.pool)
        .await?
        .ok_or(ApiError::NotFound)
}

pub async fn list_recipes(
    query: QueryPairs,
    session: Option<SessionData>,
    state: AppState,
) -> Result<Response, Rejection> {
    let params = QueryParams::from_pairs(query);
    let page = PageRequest::from_params(&params)?;
    let filter = RecipeFilter::from_params(&params)?;
    filter.check_choices(&state.pool).await?;
    let viewer = session.map(|session| session.user_id);

    let (rows, total) =
        recipes::fetch_recipes(&filter, viewer, &page, &state.media, &state.pool).await?;
    let page = Page::from_rows(rows, total, &page, "/api/recipes/", &filter.to_pairs())?;
    Ok(reply::page(&page))
}

pub async fn get_recipe(
    id: Id,
    session: Option<SessionData>,
    state: AppState,
) -> Result<Response, Rejection> {
    let recipe = load_recipe(id, session.map(|session| session.user_id), &state).await?;
    Ok(reply::ok(&recipe))
}

pub async fn create_recipe(
    session: SessionData,
    payload: RecipePayload,
    state: AppState,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::CreateRecipes)?;
    let recipe = payload.validate_new()?;
    check_references(Some(recipe.tags.as_slice()), Some(recipe.ingredients.as_slice()), &state).await?;

    let image = state.media.save_recipe_image(&recipe.image).await?;
    let id = match recipes::create_recipe(session.user_id, &recipe, &image, &state.pool).await {
        Ok(id) => id,
        Err(e) => {
            state.media.remove(&image).await;
            return Err(e.into());
        }
    };

    let recipe = load_recipe(id, Some(session.user_id), &state).await?;
    Ok(reply::created(&recipe))
}

pub async fn update_recipe(
    id: Id,
    session: SessionData,
    payload: RecipePayload,
    state: AppState,
) -> Result<Response, Rejection> {
    let old_image = recipes::get_recipe_mut(id, &session, &state.pool).await?;
    let changes = payload.validate_changes()?;
    check_references(
        changes.tags.as_deref(),
        changes.ingredients.as_deref(),
        &state,
    )
    .await?;

    let new_image = match &changes.image {
        Some(data) => Some(state.media.save_recipe_image(data).await?),
        None => None,
    };

    if let Err(e) = recipes::update_recipe(id, &changes, new_image.as_deref(), &state.pool).await {
        if let Some(image) = &new_image {
            state.media.remove(image).await;
        }
        return Err(e.into());
    }
    if new_image.is_some() {
        state.media.remove(&old_image).await;
    }

    let recipe = load_recipe(id, Some(session.user_id), &state).await?;
    Ok(reply::ok(&recipe))
}

pub async fn delete_recipe(
    id: Id,
    session: SessionData,
    state: AppState,
) -> Result<Response, Rejection> {
    let image = recipes::get_recipe_mut(id, &session, &state.pool).await?;

    recipes::delete_recipe(id, &state.pool).await?;
    state.media.remove(&image).await;

    log::info!("User {} deleted recipe {id}", session.user_id);
    Ok(reply::no_content())
}

pub async fn add_recipe_to(
    list: RecipeList,
    id: Id,
    session: SessionData,
    state: AppState,
) -> Result<Response, Rejection> {
    let recipe = add_to_list(list, id, &session, &state.media, &state.pool).await?;
    Ok(reply::created(&recipe))
}

pub async fn remove_recipe_from(
    list: RecipeList,
    id: Id,
    session: SessionData,
    state: AppState,
) -> Result<Response, Rejection> {
    remove_from_list(list, id, &session, &state.pool).await?;
    Ok(reply::no_content())
}

pub async fn download_shopping_cart(
    session: SessionData,
    state: AppState,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageOwnShoppingCart)?;

    let items = fetch_shopping_list(session.user_id, &state.pool).await?;
    let text = render_shopping_list(&items)?;
    Ok(reply::shopping_list(text)?)
}
