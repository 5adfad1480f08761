use crate::config::PAGE_SIZE;
use crate::errors::StorageError;
use crate::models::{ErrorResponse, ResultPage};
use crate::services::search_service;
use crate::AppState;
use log::error;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{get, State};

#[get("/?<query>&<source>&<page>")]
pub async fn search_videos(
    query: String,
    source: Option<String>,
    page: Option<usize>,
    state: &State<AppState>,
) -> Result<Json<ResultPage>, ErrorResponse> {
    let source = source.unwrap_or_else(|| "json".to_string());
    let page = page.unwrap_or(1);

    match search_service::search_videos(&state.repositories, &query, &source, page, *PAGE_SIZE)
        .await
    {
        Ok(result_page) => Ok(Json(result_page)),
        Err(e) => {
            error!("Search failed: {e}");
            Err(storage_error_response(e))
        }
    }
}

pub fn storage_error_response(e: StorageError) -> ErrorResponse {
    match &e {
        StorageError::InvalidQuery => {
            ErrorResponse::new(Status::BadRequest, "invalid_query", e.to_string())
        }
        StorageError::InvalidSource(_) => {
            ErrorResponse::new(Status::BadRequest, "invalid_source", e.to_string())
        }
        StorageError::BackendUnavailable(_) => {
            ErrorResponse::new(Status::ServiceUnavailable, "backend_unavailable", e.to_string())
        }
    }
}
