use serde::Serialize;
use warp::{
    http::{header, StatusCode},
    reply::{self, Reply, Response},
};

use crate::{constants::SHOPPING_LIST_FILENAME, error::ApiError, pagination::Page};

pub fn ok<T: Serialize>(value: &T) -> Response {
    reply::json(value).into_response()
}

pub fn created<T: Serialize>(value: &T) -> Response {
    reply::with_status(reply::json(value), StatusCode::CREATED).into_response()
}

pub fn no_content() -> Response {
    StatusCode::NO_CONTENT.into_response()
}

pub fn page<T: Serialize>(page: &Page<T>) -> Response {
    ok(page)
}

pub fn shopping_list(text: String) -> Result<Response, ApiError> {
    let response = warp::http::Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{SHOPPING_LIST_FILENAME}\""),
        )
        .body(text)
        .map_err(|e| ApiError::Internal(format!("Failed to build response: {e}")))?;

    Ok(response.into_response())
}
