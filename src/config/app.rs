use anyhow::{bail, Context, Result};
use std::env;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

const DEV_JWT_SECRET: &str = "dev-secret-change-in-production";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub log_level: String,
    pub jwt_secret: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    pub seed_demo_data: bool,
    /// Bootstrap platform operator, created at startup when both are set
    pub og_email: Option<String>,
    pub og_password: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = parse_var("PORT", 3000)?;
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let jwt_secret = match env::var("JWT_SECRET") {
            Ok(secret) if !secret.trim().is_empty() => secret,
            _ if environment == "production" => bail!("JWT_SECRET must be set in production"),
            _ => DEV_JWT_SECRET.to_string(),
        };

        let access_token_ttl_minutes = parse_var("ACCESS_TOKEN_TTL_MINUTES", 15)?;
        let refresh_token_ttl_days = parse_var("REFRESH_TOKEN_TTL_DAYS", 30)?;
        let seed_demo_data = parse_var("SEED_DEMO_DATA", false)?;

        let og_email = env::var("OG_EMAIL").ok().filter(|v| !v.trim().is_empty());
        let og_password = env::var("OG_PASSWORD").ok().filter(|v| !v.is_empty());

        Ok(AppConfig {
            host,
            port,
            environment,
            log_level,
            jwt_secret,
            access_token_ttl_minutes,
            refresh_token_ttl_days,
            seed_demo_data,
            og_email,
            og_password,
        })
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Install the global subscriber. `RUST_LOG` wins over `LOG_LEVEL`;
    /// production logs are JSON lines.
    pub fn init_tracing(&self) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{level},tower_http={level},sqlx=warn",
                level = self.log_level
            ))
        });

        let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
        if self.is_production() {
            subscriber.json().init();
        } else {
            subscriber.init();
        }
    }
}

pub(crate) fn parse_var<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: {:?}", key, raw)),
        _ => Ok(default),
    }
}
