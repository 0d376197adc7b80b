use warp::{reject::Rejection, reply::Response};

use crate::{
    actions::ingredients,
    error::ApiError,
    form::{QueryPairs, QueryParams},
    jwt::SessionData,
    permissions::ActionType,
    schema::Id,
    state::AppState,
    validation::IngredientPayload,
};

use super::reply;

pub async fn list_ingredients(query: QueryPairs, state: AppState) -> Result<Response, Rejection> {
    let params = QueryParams::from_pairs(query);
    let rows = ingredients::list_ingredients(params.get_str("name"), &state.pool).await?;

    Ok(reply::ok(&rows))
}

pub async fn get_ingredient(id: Id, state: AppState) -> Result<Response, Rejection> {
    let ingredient = ingredients::get_ingredient(id, &state.pool)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(reply::ok(&ingredient))
}

pub async fn create_ingredient(
    session: SessionData,
    payload: IngredientPayload,
    state: AppState,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageIngredients)?;
    let changes = payload.validate_new()?;

    let ingredient = ingredients::create_ingredient(&changes, &state.pool).await?;
    Ok(reply::created(&ingredient))
}

pub async fn update_ingredient(
    id: Id,
    session: SessionData,
    payload: IngredientPayload,
    state: AppState,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageIngredients)?;
    let changes = payload.validate_changes()?;

    let ingredient = ingredients::update_ingredient(id, &changes, &state.pool).await?;
    Ok(reply::ok(&ingredient))
}

pub async fn delete_ingredient(
    id: Id,
    session: SessionData,
    state: AppState,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageIngredients)?;

    ingredients::delete_ingredient(id, &state.pool).await?;
    Ok(reply::no_content())
}
