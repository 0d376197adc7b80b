use warp::{reject::Rejection, reply::Response};

use crate::{
    actions::users::{login_user, logout_user},
    jwt::SessionData,
    schema::AuthToken,
    state::AppState,
    validation::LoginPayload,
};

use super::reply;

pub async fn login(payload: LoginPayload, state: AppState) -> Result<Response, Rejection> {
    let (email, password) = payload.validate()?;
    let auth_token = login_user(&email, &password, &state.tokens, &state.pool).await?;

    Ok(reply::ok(&AuthToken { auth_token }))
}

pub async fn logout(session: SessionData, state: AppState) -> Result<Response, Rejection> {
    logout_user(&session, &state.pool).await?;
    Ok(reply::no_content())
}
