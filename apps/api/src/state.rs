use std::sync::Arc;

use sqlx::PgPool;

use crate::accounts::service::AccountService;
use crate::attendance::service::AttendanceService;
use crate::auth::token::TokenIssuer;
use crate::cache::{Cache, CacheStore};
use crate::config::Config;
use crate::jobs::service::JobService;
use crate::middleware::rate_limit::RateLimiter;
use crate::notices::service::NoticeService;
use crate::resumes::service::ResumeService;
use crate::roles::service::RoleService;
use crate::salary::service::SalaryService;
use crate::training::service::TrainingService;
use crate::uploads::UploadStore;

/// Shared application state injected into all route handlers via Axum extractors.
/// Every handle is cheap to clone; the pool and the cache store are shared.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub cache: Cache,
    pub tokens: TokenIssuer,
    pub rate_limiter: RateLimiter,
    pub config: Config,
    pub uploads: UploadStore,
    pub accounts: AccountService,
    pub roles: RoleService,
    pub jobs: JobService,
    pub attendance: AttendanceService,
    pub salary: SalaryService,
    pub notices: NoticeService,
    pub training: TrainingService,
    pub resumes: ResumeService,
}

impl AppState {
    pub fn new(db: PgPool, store: Arc<dyn CacheStore>, config: Config) -> Self {
        let cache = Cache::new(store.clone());
        let tokens = TokenIssuer::new(&config.jwt_secret, config.jwt_ttl);
        let rate_limiter = RateLimiter::new(store, config.rate_limit.clone());

        Self {
            accounts: AccountService::new(
                db.clone(),
                cache.clone(),
                tokens.clone(),
                config.auth_timeout,
            ),
            roles: RoleService::new(db.clone()),
            jobs: JobService::new(db.clone()),
            attendance: AttendanceService::new(db.clone(), config.attendance),
            salary: SalaryService::new(db.clone()),
            notices: NoticeService::new(db.clone(), cache.clone()),
            training: TrainingService::new(db.clone()),
            resumes: ResumeService::new(db.clone(), cache.clone()),
            uploads: UploadStore::new(config.upload_dir.clone()),
            db,
            cache,
            tokens,
            rate_limiter,
            config,
        }
    }
}
