#[macro_use]
extern crate rocket;

mod api;
mod config;
mod errors;
mod models;
mod services;

use services::extraction_cache::ExtractionCache;
use services::source_client::VideoSource;
use services::storage::RepositorySet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::JobScheduler;

pub struct AppState {
    pub source: Arc<dyn VideoSource>,
    pub cache: Arc<ExtractionCache>,
    pub repositories: Arc<RepositorySet>,
    pub scheduler: Mutex<JobScheduler>,
}

#[launch]
async fn rocket() -> _ {
    config::load_environment();
    config::init_logger();

    let state = config::create_app_state()
        .await
        .expect("Failed to initialize application state.");
    let cors = config::create_cors().expect("Failed to create CORS options.");

    rocket::build()
        .manage(state)
        .attach(cors)
        .mount("/search", routes![api::search_videos])
        .mount("/extract", routes![api::run_extraction_now])
}
