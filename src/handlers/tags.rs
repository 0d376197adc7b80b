use warp::{reject::Rejection, reply::Response};

use crate::{
    actions::tags,
    error::ApiError,
    jwt::SessionData,
    permissions::ActionType,
    schema::Id,
    state::AppState,
    validation::TagPayload,
};

use super::reply;

pub async fn list_tags(state: AppState) -> Result<Response, Rejection> {
    let tags = tags::list_tags(&state.pool).await?;
    Ok(reply::ok(&tags))
}

pub async fn get_tag(id: Id, state: AppState) -> Result<Response, Rejection> {
    let tag = tags::get_tag(id, &state.pool)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(reply::ok(&tag))
}

pub async fn create_tag(
    session: SessionData,
    payload: TagPayload,
    state: AppState,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageTags)?;
    let changes = payload.validate_new()?;

    let tag = tags::create_tag(&changes, &state.pool).await?;
    Ok(reply::created(&tag))
}

pub async fn update_tag(
    id: Id,
    session: SessionData,
    payload: TagPayload,
    state: AppState,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageTags)?;
    let changes = payload.validate_changes()?;

    let tag = tags::update_tag(id, &changes, &state.pool).await?;
    Ok(reply::ok(&tag))
}

pub async fn delete_tag(
    id: Id,
    session: SessionData,
    state: AppState,
) -> Result<Response, Rejection> {
    session.authenticate(ActionType::ManageTags)?;

    tags::delete_tag(id, &state.pool).await?;
    Ok(reply::no_content())
}
