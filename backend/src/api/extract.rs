use crate::api::search::storage_error_response;
use crate::config::{EXTRACT_CONCURRENCY, EXTRACT_SINK};
use crate::errors::SourceError;
use crate::models::{AdminToken, ErrorResponse, ExtractionReport};
use crate::services::extraction_service::run_extraction;
use crate::AppState;
use log::{error, info};
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{post, State};

/// Manually triggers one extraction run. The scheduled job runs the same
/// pipeline against the configured sink.
#[post("/run?<sink>")]
pub async fn run_extraction_now(
    _token: AdminToken,
    sink: Option<String>,
    state: &State<AppState>,
) -> Result<Json<ExtractionReport>, ErrorResponse> {
    let sink = sink.unwrap_or_else(|| EXTRACT_SINK.clone());
    let repository = state
        .repositories
        .resolve(&sink)
        .map_err(storage_error_response)?;

    info!("Manual extraction run requested (sink: {sink})");
    match run_extraction(
        state.source.clone(),
        state.cache.clone(),
        repository,
        *EXTRACT_CONCURRENCY,
    )
    .await
    {
        Ok(report) => Ok(Json(report)),
        Err(e) => {
            error!("Extraction run failed: {e}");
            Err(source_error_response(e))
        }
    }
}

fn source_error_response(e: SourceError) -> ErrorResponse {
    match &e {
        SourceError::Auth(_) => ErrorResponse::new(Status::Unauthorized, "auth", e.to_string()),
        SourceError::RateLimit(_) => {
            ErrorResponse::new(Status::TooManyRequests, "rate_limit", e.to_string())
        }
        SourceError::TransientNetwork(_) => {
            ErrorResponse::new(Status::BadGateway, "transient_network", e.to_string())
        }
    }
}
