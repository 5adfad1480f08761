use crate::models::AdminToken;
use crate::services::extraction_cache::ExtractionCache;
use crate::services::extraction_service::run_extraction;
use crate::services::ledger_repository::LedgerRepository;
use crate::services::solr_repository::IndexRepository;
use crate::services::source_client::{VideoSource, YouTubeClient};
use crate::services::storage::RepositorySet;
use crate::AppState;
use anyhow::Result;
use env_logger::Builder;
use lazy_static::lazy_static;
use log::{error, info, LevelFilter};
use rocket::http::{Method, Status};
use rocket::request::{FromRequest, Outcome};
use rocket::Request;
use rocket_cors::{AllowedHeaders, AllowedOrigins, CorsOptions};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};

lazy_static! {
    pub static ref YOUTUBE_ACCESS_TOKEN: String = env::var("YOUTUBE_ACCESS_TOKEN")
        .expect("YOUTUBE_ACCESS_TOKEN environment variable must be set");
    pub static ref ADMIN_TOKEN: String =
        env::var("ADMIN_TOKEN").expect("ADMIN_TOKEN environment variable must be set");
    pub static ref SOLR_URL: String = env::var("SOLR_URL")
        .unwrap_or_else(|_| "http://localhost:8983/solr/videos".to_string());
    pub static ref LEDGER_PATH: String =
        env::var("LEDGER_PATH").unwrap_or_else(|_| "videos.json".to_string());
    pub static ref CACHE_TTL_SECS: u64 = env::var("CACHE_TTL_SECS")
        .unwrap_or_else(|_| "28800".to_string())
        .parse::<u64>()
        .unwrap_or(28800);
    pub static ref PAGE_SIZE: usize = env::var("PAGE_SIZE")
        .unwrap_or_else(|_| "10".to_string())
        .parse::<usize>()
        .unwrap_or(10);
    pub static ref REQUEST_TIMEOUT_SECS: u64 = env::var("REQUEST_TIMEOUT_SECS")
        .unwrap_or_else(|_| "30".to_string())
        .parse::<u64>()
        .unwrap_or(30);
    pub static ref EXTRACT_SCHEDULE: String =
        env::var("EXTRACT_SCHEDULE").unwrap_or_else(|_| "0 0 */8 * * *".to_string());
    pub static ref EXTRACT_SINK: String =
        env::var("EXTRACT_SINK").unwrap_or_else(|_| "json".to_string());
    pub static ref EXTRACT_CONCURRENCY: usize = env::var("EXTRACT_CONCURRENCY")
        .unwrap_or_else(|_| "2".to_string())
        .parse::<usize>()
        .unwrap_or(2);
}

pub fn init_logger() {
    Builder::new().filter_level(LevelFilter::Info).init();
    info!("Starting subscription search backend...");
}

pub fn load_environment() {
    dotenv::dotenv().ok();
}

pub async fn setup_extraction_scheduler(
    source: Arc<dyn VideoSource>,
    cache: Arc<ExtractionCache>,
    repositories: Arc<RepositorySet>,
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let extraction_job = Job::new_async(EXTRACT_SCHEDULE.as_str(), move |_uuid, _l| {
        let source = source.clone();
        let cache = cache.clone();
        let repositories = repositories.clone();
        Box::pin(async move {
            let repository = match repositories.resolve(EXTRACT_SINK.as_str()) {
                Ok(repository) => repository,
                Err(e) => {
                    error!("EXTRACT_SINK is misconfigured: {e}");
                    return;
                }
            };

            match run_extraction(source, cache, repository, *EXTRACT_CONCURRENCY).await {
                Ok(report) => info!(
                    "Scheduled extraction: {} videos across {} channels, {} failed",
                    report.videos_upserted,
                    report.channels_total,
                    report.failures.len()
                ),
                Err(e) => error!("Scheduled extraction failed: {e}"),
            }
        })
    })?;

    scheduler.add(extraction_job).await?;
    scheduler.start().await?;
    info!("Extraction scheduler started.");

    Ok(scheduler)
}

pub async fn create_app_state() -> Result<AppState> {
    let source: Arc<dyn VideoSource> = Arc::new(YouTubeClient::new(
        YOUTUBE_ACCESS_TOKEN.clone(),
        Duration::from_secs(*REQUEST_TIMEOUT_SECS),
    )?);
    let cache = Arc::new(ExtractionCache::new(Duration::from_secs(*CACHE_TTL_SECS)));
    let repositories = Arc::new(RepositorySet::new(
        IndexRepository::new(SOLR_URL.clone()),
        LedgerRepository::new(PathBuf::from(&*LEDGER_PATH)),
    ));

    let scheduler =
        setup_extraction_scheduler(source.clone(), cache.clone(), repositories.clone()).await?;

    Ok(AppState {
        source,
        cache,
        repositories,
        scheduler: Mutex::new(scheduler),
    })
}

pub fn create_cors() -> Result<rocket_cors::Cors> {
    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::some_exact(&["http://localhost:8080"]))
        .allowed_methods(
            vec![Method::Get, Method::Post, Method::Options]
                .into_iter()
                .map(From::from)
                .collect(),
        )
        .allowed_headers(AllowedHeaders::some(&[
            "Authorization",
            "Accept",
            "Content-Type",
        ]))
        .allow_credentials(true)
        .to_cors()
        .map_err(|e| anyhow::anyhow!("Failed to create CORS options: {}", e))?;

    Ok(cors)
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminToken {
    type Error = &'static str;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let token = request
            .headers()
            .get_one("Authorization")
            .and_then(|auth| auth.strip_prefix("Bearer "));

        match token {
            Some(t) => {
                if t == &*ADMIN_TOKEN {
                    Outcome::Success(AdminToken(t.to_string()))
                } else {
                    Outcome::Error((Status::Unauthorized, "Invalid token"))
                }
            }
            None => Outcome::Error((Status::Unauthorized, "Missing token")),
        }
    }
}
