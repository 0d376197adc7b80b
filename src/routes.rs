use std::convert::Infallible;

use serde::de::DeserializeOwned;
use serde_json::json;
use warp::{
    filters::{body::BodyDeserializeError, BoxedFilter},
    http::StatusCode,
    reject::{InvalidQuery, MethodNotAllowed, PayloadTooLarge, Rejection, UnsupportedMediaType},
    reply::{self, Reply, Response},
    Filter,
};

use crate::{
    actions::favorites::RecipeList,
    constants::MAX_BODY_SIZE,
    error::ApiError,
    form::QueryPairs,
    handlers::{auth, ingredients, recipes, tags, users},
    jwt::SessionData,
    middleware::{with_possible_session, with_session, with_state},
    schema::Id,
    state::AppState,
};

fn json_body<T: DeserializeOwned + Send>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
{
    warp::body::content_length_limit(MAX_BODY_SIZE).and(warp::body::json())
}

fn query() -> impl Filter<Extract = (QueryPairs,), Error = Rejection> + Clone {
    warp::query::<QueryPairs>()
}

fn auth_routes(state: &AppState) -> BoxedFilter<(Response,)> {
    let login = warp::path!("api" / "auth" / "token" / "login")
        .and(warp::post())
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(auth::login);

    let logout = warp::path!("api" / "auth" / "token" / "logout")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(auth::logout);

    login.or(logout).unify().boxed()
}

fn user_routes(state: &AppState) -> BoxedFilter<(Response,)> {
    let list = warp::path!("api" / "users")
        .and(warp::get())
        .and(query())
        .and(with_possible_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(users::list_users);

    let create = warp::path!("api" / "users")
        .and(warp::post())
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(users::create_user);

    let me = warp::path!("api" / "users" / "me")
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(users::me);

    let set_password = warp::path!("api" / "users" / "set_password")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(users::set_password);

    let subscriptions = warp::path!("api" / "users" / "subscriptions")
        .and(warp::get())
        .and(query())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(users::list_subscriptions);

    let detail = warp::path!("api" / "users" / Id)
        .and(warp::get())
        .and(with_possible_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(users::get_user);

    let subscribe = warp::path!("api" / "users" / Id / "subscribe")
        .and(warp::post())
        .and(query())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(users::subscribe);

    let unsubscribe = warp::path!("api" / "users" / Id / "subscribe")
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(users::unsubscribe);

    list.or(create)
        .unify()
        .or(me)
        .unify()
        .or(set_password)
        .unify()
        .or(subscriptions)
        .unify()
        .or(detail)
        .unify()
        .or(subscribe)
        .unify()
        .or(unsubscribe)
        .unify()
        .boxed()
}

fn tag_routes(state: &AppState) -> BoxedFilter<(Response,)> {
    let list = warp::path!("api" / "tags")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(tags::list_tags);

    let create = warp::path!("api" / "tags")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(tags::create_tag);

    let detail = warp::path!("api" / "tags" / Id)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(tags::get_tag);

    let update = warp::path!("api" / "tags" / Id)
        .and(warp::patch())
        .and(with_session(state.clone()))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(tags::update_tag);

    let delete = warp::path!("api" / "tags" / Id)
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(tags::delete_tag);

    list.or(create)
        .unify()
        .or(detail)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
        .boxed()
}

fn ingredient_routes(state: &AppState) -> BoxedFilter<(Response,)> {
    let list = warp::path!("api" / "ingredients")
        .and(warp::get())
        .and(query())
        .and(with_state(state.clone()))
        .and_then(ingredients::list_ingredients);

    let create = warp::path!("api" / "ingredients")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(ingredients::create_ingredient);

    let detail = warp::path!("api" / "ingredients" / Id)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(ingredients::get_ingredient);

    let update = warp::path!("api" / "ingredients" / Id)
        .and(warp::patch())
        .and(with_session(state.clone()))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(ingredients::update_ingredient);

    let delete = warp::path!("api" / "ingredients" / Id)
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(ingredients::delete_ingredient);

    list.or(create)
        .unify()
        .or(detail)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
        .boxed()
}

/// `POST` adds to the list, `DELETE` removes from it.
fn recipe_list_routes(
    state: &AppState,
    segment: &'static str,
    list: RecipeList,
) -> BoxedFilter<(Response,)> {
    let path = warp::path("api")
        .and(warp::path("recipes"))
        .and(warp::path::param::<Id>())
        .and(warp::path(segment))
        .and(warp::path::end());

    let add = path
        .clone()
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(move |id: Id, session: SessionData, state: AppState| {
            recipes::add_recipe_to(list, id, session, state)
        });

    let remove = path
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(move |id: Id, session: SessionData, state: AppState| {
            recipes::remove_recipe_from(list, id, session, state)
        });

    add.or(remove).unify().boxed()
}

fn recipe_routes(state: &AppState) -> BoxedFilter<(Response,)> {
    let list = warp::path!("api" / "recipes")
        .and(warp::get())
        .and(query())
        .and(with_possible_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(recipes::list_recipes);

    let create = warp::path!("api" / "recipes")
        .and(warp::post())
        .and(with_session(state.clone()))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(recipes::create_recipe);

    let download = warp::path!("api" / "recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(recipes::download_shopping_cart);

    let detail = warp::path!("api" / "recipes" / Id)
        .and(warp::get())
        .and(with_possible_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(recipes::get_recipe);

    let update = warp::path!("api" / "recipes" / Id)
        .and(warp::patch())
        .and(with_session(state.clone()))
        .and(json_body())
        .and(with_state(state.clone()))
        .and_then(recipes::update_recipe);

    let delete = warp::path!("api" / "recipes" / Id)
        .and(warp::delete())
        .and(with_session(state.clone()))
        .and(with_state(state.clone()))
        .and_then(recipes::delete_recipe);

    list.or(create)
        .unify()
        .or(download)
        .unify()
        .or(detail)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
        .or(recipe_list_routes(state, "favorite", RecipeList::Favorites))
        .unify()
        .or(recipe_list_routes(state, "shopping_cart", RecipeList::ShoppingCart))
        .unify()
        .boxed()
}

/// Every `/api` endpoint.
pub fn api(state: &AppState) -> BoxedFilter<(Response,)> {
    auth_routes(state)
        .or(user_routes(state))
        .unify()
        .or(tag_routes(state))
        .unify()
        .or(ingredient_routes(state))
        .unify()
        .or(recipe_routes(state))
        .unify()
        .boxed()
}

/// The API, uploaded media under `/media`, JSON error bodies and request logging.
pub fn routes(state: AppState) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let media = warp::path("media")
        .and(warp::get())
        .and(warp::fs::dir(state.media.root().to_path_buf()))
        .map(|file: warp::fs::File| file.into_response());

    api(&state)
        .or(media)
        .unify()
        .recover(handle_rejection)
        .with(warp::log("foodgram::http"))
}

fn error_response(status: StatusCode, detail: &str) -> Response {
    reply::with_status(reply::json(&json!({ "detail": detail })), status).into_response()
}

pub async fn handle_rejection(err: Rejection) -> Result<Response, Infallible> {
    if let Some(e) = err.find::<ApiError>() {
        return Ok(e.to_response());
    }
    if err.is_not_found() {
        return Ok(ApiError::NotFound.to_response());
    }
    if let Some(e) = err.find::<BodyDeserializeError>() {
        return Ok(error_response(
            StatusCode::BAD_REQUEST,
            &format!("JSON parse error - {e}"),
        ));
    }
    if err.find::<InvalidQuery>().is_some() {
        return Ok(error_response(StatusCode::BAD_REQUEST, "Invalid query string."));
    }
    if err.find::<PayloadTooLarge>().is_some() {
        return Ok(error_response(
            StatusCode::PAYLOAD_TOO_LARGE,
            "Request body is too large.",
        ));
    }
    if err.find::<UnsupportedMediaType>().is_some() {
        return Ok(error_response(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Unsupported media type in request.",
        ));
    }
    if err.find::<warp::reject::LengthRequired>().is_some() {
        return Ok(error_response(
            StatusCode::LENGTH_REQUIRED,
            "Content-Length header is required.",
        ));
    }
    if err.find::<MethodNotAllowed>().is_some() {
        return Ok(error_response(
            StatusCode::METHOD_NOT_ALLOWED,
            "Method not allowed.",
        ));
    }

    log::error!("Unhandled rejection: {err:?}");
    Ok(error_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error",
    ))
}
