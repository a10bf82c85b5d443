use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// Deployment flavour; decides the cookie policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("production") {
            Environment::Production
        } else {
            Environment::Development
        }
    }

    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

/// Upper bound for either token lifetime: one year.
pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 365;

fn ttl_minutes(var: &str, raw: Option<&str>, default: i64) -> anyhow::Result<i64> {
    let minutes = match raw {
        Some(v) => v
            .trim()
            .parse::<i64>()
            .with_context(|| format!("{var} must be a whole number of minutes"))?,
        None => default,
    };
    anyhow::ensure!(
        (1..=MAX_TTL_MINUTES).contains(&minutes),
        "{var} must be between 1 and {MAX_TTL_MINUTES} minutes, got {minutes}"
    );
    Ok(minutes)
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub environment: Environment,
    pub cors_origin: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt = JwtConfig {
            access_secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            refresh_secret: std::env::var("REFRESH_SECRET").context("REFRESH_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "englishpro".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "englishpro-users".into()),
            ttl_minutes: ttl_minutes(
                "JWT_TTL_MINUTES",
                std::env::var("JWT_TTL_MINUTES").ok().as_deref(),
                60,
            )?,
            refresh_ttl_minutes: ttl_minutes(
                "JWT_REFRESH_TTL_MINUTES",
                std::env::var("JWT_REFRESH_TTL_MINUTES").ok().as_deref(),
                60 * 24 * 7,
            )?,
        };
        anyhow::ensure!(
            jwt.access_secret != jwt.refresh_secret,
            "JWT_SECRET and REFRESH_SECRET must differ"
        );

        let environment = std::env::var("APP_ENV")
            .or_else(|_| std::env::var("NODE_ENV"))
            .map(|v| Environment::parse(&v))
            .unwrap_or(Environment::Development);

        let cors_origin = std::env::var("CORS_ORIGIN")
            .ok()
            .filter(|v| !v.trim().is_empty());

        Ok(Self {
            database_url,
            jwt,
            environment,
            cors_origin,
        })
    }
}
