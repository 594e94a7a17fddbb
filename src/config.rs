use anyhow::Context;
use serde::Deserialize;
use time::Duration;

/// Deployment environment, selecting the default token lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Testing,
    Production,
}

impl Environment {
    /// Default `(hours, minutes)` access-token lifetime. Testing uses a
    /// zero-length lifetime so expiry is deterministic in test suites.
    pub fn token_lifetime(self) -> (i64, i64) {
        match self {
            Environment::Development => (0, 15),
            Environment::Testing => (0, 0),
            Environment::Production => (1, 0),
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" => Ok(Environment::Development),
            "testing" => Ok(Environment::Testing),
            "production" => Ok(Environment::Production),
            other => anyhow::bail!("unknown environment: {other}"),
        }
    }
}

/// Signing secret and token lifetime, fixed at process start.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub secret: String,
    pub expire_hours: i64,
    pub expire_minutes: i64,
}

impl TokenConfig {
    pub fn lifetime(&self) -> Duration {
        Duration::hours(self.expire_hours) + Duration::minutes(self.expire_minutes)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub environment: Environment,
    pub token: TokenConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let environment: Environment = std::env::var("APP_ENV")
            .unwrap_or_else(|_| "development".into())
            .parse()?;
        let (hours, minutes) = environment.token_lifetime();
        let token = TokenConfig {
            secret: std::env::var("SECRET_KEY")?,
            expire_hours: lifetime_override(
                "TOKEN_EXPIRE_HOURS",
                std::env::var("TOKEN_EXPIRE_HOURS").ok(),
                hours,
            )?,
            expire_minutes: lifetime_override(
                "TOKEN_EXPIRE_MINUTES",
                std::env::var("TOKEN_EXPIRE_MINUTES").ok(),
                minutes,
            )?,
        };
        Ok(Self {
            database_url,
            environment,
            token,
        })
    }
}

/// Environment-variable override for a lifetime component. A set but
/// unparseable value is an error, not a silent fallback to the default.
fn lifetime_override(name: &str, value: Option<String>, default: i64) -> anyhow::Result<i64> {
    match value {
        Some(v) => v
            .parse::<i64>()
            .with_context(|| format!("invalid {name}: {v}")),
        None => Ok(default),
    }
}
