//! Server configuration, loaded from the environment the way `fula-cli`'s
//! original `Args` did — `clap::Parser` with `env` attributes, backed by
//! `dotenvy::dotenv()` for local `.env` files.

use clap::Parser;

/// Server configuration (spec §6 "Environment").
#[derive(Parser, Debug, Clone)]
#[command(name = "storage-gateway")]
#[command(about = "Self-hosted multi-tenant file vault")]
#[command(version)]
pub struct AppConfig {
    /// Port to listen on.
    #[arg(long, default_value = "4000", env = "PORT")]
    pub port: u16,

    /// Postgres host.
    #[arg(long, env = "DATABASE_HOST", default_value = "localhost")]
    pub database_host: String,

    /// Postgres port.
    #[arg(long, env = "DATABASE_PORT", default_value = "5432")]
    pub database_port: u16,

    /// Postgres user.
    #[arg(long, env = "DATABASE_USER")]
    pub database_user: String,

    /// Postgres password.
    #[arg(long, env = "DATABASE_PASSWORD")]
    pub database_password: String,

    /// Postgres database name.
    #[arg(long, env = "DATABASE_NAME")]
    pub database_name: String,

    /// HMAC secret used to sign session JWTs. Must be at least 32 bytes.
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: String,

    /// Base64-encoded 32-byte key-encryption key for file envelope encryption.
    #[arg(long, env = "FILE_ENCRYPTION_MASTER_KEY")]
    pub file_encryption_master_key: String,

    /// Root directory for the filesystem blob store.
    #[arg(long, env = "FILE_STORAGE_PATH", default_value = "/data/files")]
    pub file_storage_path: String,

    /// Public URL of the frontend, used to build share/invite links.
    #[arg(long, env = "FRONTEND_URL", default_value = "http://localhost:3000")]
    pub frontend_url: String,

    /// Comma-separated list of allowed CORS origins.
    #[arg(long, env = "CORS_ORIGIN", default_value = "")]
    pub cors_origin: String,

    /// Cookie `Domain` attribute; unset means host-only cookies.
    #[arg(long, env = "COOKIE_DOMAIN")]
    pub cookie_domain: Option<String>,

    /// Whether the server sits behind a reverse proxy (trusts `X-Forwarded-*`).
    #[arg(long, env = "TRUST_PROXY", default_value = "false")]
    pub trust_proxy: bool,

    /// Rate-limit window, seconds.
    #[arg(long, env = "RATE_LIMIT_TTL", default_value = "60")]
    pub rate_limit_ttl_secs: u64,

    /// Max requests per rate-limit window for the general API limiter.
    #[arg(long, env = "RATE_LIMIT_MAX", default_value = "100")]
    pub rate_limit_max: u32,

    /// Invitation token lifetime, hours.
    #[arg(long, env = "INVITE_TOKEN_TTL_HOURS", default_value = "72")]
    pub invite_token_ttl_hours: i64,

    /// Allow self-service registration without an invitation.
    #[arg(long, env = "PUBLIC_REGISTRATION", default_value = "false")]
    pub public_registration: bool,

    /// Master switch for outgoing email.
    #[arg(long, env = "EMAIL_ENABLED", default_value = "false")]
    pub email_enabled: bool,

    /// SMTP host (only read if `EMAIL_ENABLED`).
    #[arg(long, env = "SMTP_HOST")]
    pub smtp_host: Option<String>,

    /// SMTP port.
    #[arg(long, env = "SMTP_PORT", default_value = "587")]
    pub smtp_port: u16,

    /// SMTP username.
    #[arg(long, env = "SMTP_USERNAME")]
    pub smtp_username: Option<String>,

    /// SMTP password.
    #[arg(long, env = "SMTP_PASSWORD")]
    pub smtp_password: Option<String>,

    /// From address for outgoing mail.
    #[arg(long, env = "SMTP_FROM_ADDRESS")]
    pub smtp_from_address: Option<String>,

    /// From display name for outgoing mail.
    #[arg(long, env = "SMTP_FROM_NAME")]
    pub smtp_from_name: Option<String>,

    /// Use STARTTLS.
    #[arg(long, env = "SMTP_USE_TLS", default_value = "true")]
    pub smtp_use_tls: bool,

    /// Enable verbose (debug) logging.
    #[arg(short, long, env = "DEBUG")]
    pub debug: bool,
}

impl AppConfig {
    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.database_user,
            self.database_password,
            self.database_host,
            self.database_port,
            self.database_name,
        )
    }

    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }

    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_origin
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Build `SmtpSettings` if every required field is present. Returns
    /// `None` when `EMAIL_ENABLED=false` or the configuration is incomplete
    /// (logged at boot, not a fatal error — email is always optional).
    pub fn smtp_settings(&self) -> Option<storage_mail::SmtpSettings> {
        if !self.email_enabled {
            return None;
        }
        Some(storage_mail::SmtpSettings {
            host: self.smtp_host.clone()?,
            port: self.smtp_port,
            username: self.smtp_username.clone().unwrap_or_default(),
            password: self.smtp_password.clone().unwrap_or_default(),
            from_address: self.smtp_from_address.clone()?,
            from_name: self.smtp_from_name.clone(),
            use_tls: self.smtp_use_tls,
        })
    }
}
