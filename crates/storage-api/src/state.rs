//! Application state shared across handlers (mirrors `fula-cli::AppState`'s
//! shape: one struct holding every long-lived dependency, built once at boot
//! and wrapped in an `Arc`).

use std::path::Path;
use std::sync::Arc;

use governor::{clock::DefaultClock, state::keyed::DefaultKeyedStateStore, Quota, RateLimiter};
use sqlx::PgPool;
use storage_blob::{BlobStore, LocalBlobStore};
use storage_core::{AbuseLimiter, AuthService, FileService, InvitationService, QuotaAccountant, ShareService};
use storage_crypto::Kek;
use storage_mail::EmailTransport;

use crate::config::AppConfig;

/// A rate limiter keyed by client IP, one per route class (spec §5).
pub type KeyedLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// Per-route-class rate limiters (spec §5's named limiter list).
pub struct RateLimiters {
    pub login: Arc<KeyedLimiter>,
    pub register: Arc<KeyedLimiter>,
    pub forgot_password: Arc<KeyedLimiter>,
    pub reset_password: Arc<KeyedLimiter>,
    pub change_password: Arc<KeyedLimiter>,
    pub upload: Arc<KeyedLimiter>,
    pub public_share: Arc<KeyedLimiter>,
    pub general: Arc<KeyedLimiter>,
}

fn limiter(per_minute: u32) -> Arc<KeyedLimiter> {
    let quota = Quota::per_minute(std::num::NonZeroU32::new(per_minute.max(1)).unwrap());
    Arc::new(RateLimiter::keyed(quota))
}

impl RateLimiters {
    fn new(general_per_window: u32) -> Self {
        Self {
            login: limiter(5),
            register: limiter(5),
            forgot_password: limiter(3),
            reset_password: limiter(5),
            change_password: limiter(5),
            upload: limiter(30),
            public_share: limiter(30),
            general: limiter(general_per_window),
        }
    }
}

pub struct AppState {
    pub config: AppConfig,
    pub pool: PgPool,
    pub blob_store: Arc<dyn BlobStore>,
    pub kek: Arc<Kek>,
    pub files: FileService,
    pub shares: ShareService,
    pub auth: AuthService,
    pub invitations: InvitationService,
    pub quota: QuotaAccountant,
    pub limiter: AbuseLimiter,
    pub mail: Arc<EmailTransport>,
    pub rate_limiters: RateLimiters,
}

impl AppState {
    pub async fn new(config: AppConfig) -> anyhow::Result<Self> {
        let pool = storage_meta::connect_and_migrate(&config.database_url()).await?;

        let kek = Arc::new(Kek::from_base64(&config.file_encryption_master_key)?);

        let blob_store: Arc<dyn BlobStore> =
            Arc::new(LocalBlobStore::new(Path::new(&config.file_storage_path)));

        let quota = QuotaAccountant::new(Path::new(&config.file_storage_path).to_path_buf());
        let files = FileService::new(pool.clone(), blob_store.clone(), kek.clone(), quota.clone());
        let shares = ShareService::new(pool.clone(), blob_store.clone(), kek.clone());
        let invitations =
            InvitationService::new(pool.clone(), config.invite_token_ttl_hours);
        let auth = AuthService::new(pool.clone(), invitations.clone(), config.public_registration);
        let limiter = AbuseLimiter::new();
        let mail = Arc::new(EmailTransport::new());
        let rate_limiters = RateLimiters::new(config.rate_limit_max);

        Ok(Self {
            config,
            pool,
            blob_store,
            kek,
            files,
            shares,
            auth,
            invitations,
            quota,
            limiter,
            mail,
            rate_limiters,
        })
    }
}
