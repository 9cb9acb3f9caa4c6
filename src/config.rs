use anyhow::{bail, Context, Result};
use chrono::{FixedOffset, NaiveDate};
use std::collections::BTreeSet;
use std::env;
use std::str::FromStr;

use crate::domain::urgency::{BusinessCalendar, UrgencyThresholds};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

impl Environment {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "prod" | "production" => Self::Prod,
            "staging" => Self::Staging,
            _ => Self::Dev,
        }
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, Self::Dev)
    }

    pub fn is_prod(&self) -> bool {
        matches!(self, Self::Prod)
    }
}

/// How bearer tokens are verified
#[derive(Debug, Clone)]
pub enum TokenVerification {
    /// RS256 keys fetched from a JWKS endpoint
    Jwks { url: String, cache_ttl_seconds: u64 },
    /// HS256 shared secret
    Secret(String),
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub env: Environment,
    pub server_addr: String,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,
    pub run_migrations: bool,

    // Redis (optional)
    pub redis_url: Option<String>,
    pub cache_ttl_seconds: u64,

    // CORS
    pub cors_allow_origins: Vec<String>,

    // Auth
    pub token_verification: TokenVerification,
    pub auth_issuer: String,
    pub auth_audience: String,

    // Email
    pub email_api_url: String,
    pub email_api_key: Option<String>,
    pub email_from: String,
    pub email_timeout_seconds: u64,

    // Board calendar
    pub board_utc_offset: FixedOffset,
    pub board_holidays: BTreeSet<NaiveDate>,
    pub urgency_thresholds: UrgencyThresholds,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let env = Environment::parse(&env::var("ENV").unwrap_or_else(|_| "dev".to_string()));
        let server_addr = env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        // Database
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let database_max_connections = parse_or("DATABASE_MAX_CONNECTIONS", 10);
        let run_migrations = env::var("RUN_MIGRATIONS")
            .map(|v| parse_bool(&v))
            .unwrap_or(false);

        // Redis
        let redis_url = env::var("REDIS_URL").ok().filter(|s| !s.trim().is_empty());
        let cache_ttl_seconds = parse_or("CACHE_TTL_SECONDS", 60);

        // CORS
        let cors_allow_origins = split_list(
            &env::var("CORS_ALLOW_ORIGINS").unwrap_or_else(|_| "http://localhost:3000".to_string()),
        );

        // Auth
        let token_verification = match (env::var("AUTH_JWKS_URL"), env::var("AUTH_JWT_SECRET")) {
            (Ok(url), _) if !url.is_empty() => TokenVerification::Jwks {
                url,
                cache_ttl_seconds: parse_or("JWKS_CACHE_TTL_SECONDS", 1800),
            },
            (_, Ok(secret)) if !secret.is_empty() => TokenVerification::Secret(secret),
            _ => bail!("Either AUTH_JWKS_URL or AUTH_JWT_SECRET must be set"),
        };
        let auth_issuer = env::var("AUTH_ISSUER").context("AUTH_ISSUER must be set")?;
        let auth_audience =
            env::var("AUTH_AUDIENCE").unwrap_or_else(|_| "authenticated".to_string());

        // Email
        let email_api_url = env::var("EMAIL_API_URL")
            .unwrap_or_else(|_| "https://api.resend.com/emails".to_string());
        url::Url::parse(&email_api_url).context("EMAIL_API_URL is not a valid URL")?;
        let email_api_key = env::var("EMAIL_API_KEY").ok().filter(|s| !s.is_empty());
        let email_from =
            env::var("EMAIL_FROM").unwrap_or_else(|_| "Bid Board <bids@example.com>".to_string());
        let email_timeout_seconds = parse_or("EMAIL_TIMEOUT_SECONDS", 15);

        // Board calendar
        let board_utc_offset = utc_offset(parse_or("BOARD_UTC_OFFSET_HOURS", 0))?;
        let board_holidays = parse_holidays(&env::var("BOARD_HOLIDAYS").unwrap_or_default())?;

        let urgency_thresholds = UrgencyThresholds {
            critical_days: parse_or("URGENCY_CRITICAL_DAYS", 2),
            warning_days: parse_or("URGENCY_WARNING_DAYS", 5),
        };
        if urgency_thresholds.critical_days > urgency_thresholds.warning_days {
            bail!("URGENCY_CRITICAL_DAYS must not exceed URGENCY_WARNING_DAYS");
        }

        Ok(Settings {
            env,
            server_addr,
            database_url,
            database_max_connections,
            run_migrations,
            redis_url,
            cache_ttl_seconds,
            cors_allow_origins,
            token_verification,
            auth_issuer,
            auth_audience,
            email_api_url,
            email_api_key,
            email_from,
            email_timeout_seconds,
            board_utc_offset,
            board_holidays,
            urgency_thresholds,
        })
    }

    /// Business-day calendar built from the configured holidays
    pub fn calendar(&self) -> BusinessCalendar {
        BusinessCalendar::with_holidays(self.board_holidays.iter().copied())
    }
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_holidays(value: &str) -> Result<BTreeSet<NaiveDate>> {
    split_list(value)
        .iter()
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .with_context(|| format!("Invalid date in BOARD_HOLIDAYS: {}", s))
        })
        .collect()
}

fn utc_offset(hours: i32) -> Result<FixedOffset> {
    hours
        .checked_mul(3600)
        .and_then(FixedOffset::east_opt)
        .context("BOARD_UTC_OFFSET_HOURS must be between -23 and 23")
}
