use std::convert::Infallible;

use warp::{reject::Rejection, Filter};

use crate::{
    actions::users::resolve_session, constants::AUTH_HEADER_PREFIX, error::ApiError,
    state::AppState,
};

use super::jwt::SessionData;

pub fn with_state(
    state: AppState,
) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// `Authorization: Token <token>` -> raw token.
pub fn parse_authorization(header: &str) -> Result<&str, ApiError> {
    header
        .strip_prefix(AUTH_HEADER_PREFIX)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(ApiError::InvalidToken)
}

async fn authenticate(header: Option<String>, state: &AppState) -> Result<Option<SessionData>, ApiError> {
    let header = match header {
        Some(header) => header,
        None => return Ok(None),
    };
    let token = parse_authorization(&header)?;
    let claims = state.tokens.verify(token)?;

    resolve_session(&claims, &state.pool).await.map(Some)
}

/// Rejects with 401 unless a valid token is present.
pub fn with_session(
    state: AppState,
) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_state(state))
        .and_then(|header: Option<String>, state: AppState| async move {
            match authenticate(header, &state).await {
                Ok(Some(session)) => Ok(session),
                Ok(None) => Err(warp::reject::custom(ApiError::Unauthenticated)),
                Err(e) => Err(warp::reject::custom(e)),
            }
        })
}

/// Anonymous callers pass through as `None`; a malformed or revoked token is still a 401.
pub fn with_possible_session(
    state: AppState,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and(with_state(state))
        .and_then(|header: Option<String>, state: AppState| async move {
            authenticate(header, &state)
                .await
                .map_err(warp::reject::custom)
        })
}
