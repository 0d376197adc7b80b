use warp::{reject::Rejection, reply::Response};

use crate::{
    actions::{subscriptions, users},
    error::ApiError,
    form::{QueryPairs, QueryParams},
    jwt::SessionData,
    pagination::{Page, PageRequest},
    schema::{Id, UserRole},
    state::AppState,
    validation::{NewUserPayload, SetPasswordPayload},
};

use super::reply;

fn viewer(session: &Option<SessionData>) -> Option<Id> {
    session.as_ref().map(|session| session.user_id)
}

pub async fn list_users(
    query: QueryPairs,
    session: Option<SessionData>,
    state: AppState,
) -> Result<Response, Rejection> {
    let params = QueryParams::from_pairs(query);
    let page = PageRequest::from_params(&params)?;

    let (rows, total) = users::fetch_profiles(viewer(&session), &page, &state.pool).await?;
    let page = Page::from_rows(rows, total, &page, "/api/users/", &[])?;
    Ok(reply::page(&page))
}

pub async fn create_user(payload: NewUserPayload, state: AppState) -> Result<Response, Rejection> {
    let user = payload.validate()?;
    let account = users::register_user(&user, UserRole::User, &state.pool).await?;

    Ok(reply::created(&account))
}

pub async fn get_user(
    id: Id,
    session: Option<SessionData>,
    state: AppState,
) -> Result<Response, Rejection> {
    let profile = users::get_profile(id, viewer(&session), &state.pool)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(reply::ok(&profile))
}

pub async fn me(session: SessionData, state: AppState) -> Result<Response, Rejection> {
    let profile = users::get_profile(session.user_id, Some(session.user_id), &state.pool)
        .await?
        .ok_or(ApiError::NotFound)?;

    Ok(reply::ok(&profile))
}

pub async fn set_password(
    session: SessionData,
    payload: SetPasswordPayload,
    state: AppState,
) -> Result<Response, Rejection> {
    let (current_password, new_password) = payload.validate()?;
    users::set_password(session.user_id, &current_password, &new_password, &state.pool).await?;

    Ok(reply::no_content())
}

pub async fn list_subscriptions(
    query: QueryPairs,
    session: SessionData,
    state: AppState,
) -> Result<Response, Rejection> {
    let params = QueryParams::from_pairs(query);
    let page = PageRequest::from_params(&params)?;
    let recipes_limit = subscriptions::recipes_limit(&params)?;

    let (rows, total) =
        subscriptions::fetch_subscriptions(&session, &page, recipes_limit, &state.media, &state.pool)
            .await?;

    let filters: Vec<(String, String)> = recipes_limit
        .map(|limit| vec![("recipes_limit".to_owned(), limit.to_string())])
        .unwrap_or_default();
    let page = Page::from_rows(rows, total, &page, "/api/users/subscriptions/", &filters)?;
    Ok(reply::page(&page))
}

pub async fn subscribe(
    id: Id,
    query: QueryPairs,
    session: SessionData,
    state: AppState,
) -> Result<Response, Rejection> {
    let params = QueryParams::from_pairs(query);
    let recipes_limit = subscriptions::recipes_limit(&params)?;

    let subscription =
        subscriptions::subscribe(id, &session, recipes_limit, &state.media, &state.pool).await?;
    Ok(reply::created(&subscription))
}

pub async fn unsubscribe(
    id: Id,
    session: SessionData,
    state: AppState,
) -> Result<Response, Rejection> {
    subscriptions::unsubscribe(id, &session, &state.pool).await?;
    Ok(reply::no_content())
}
