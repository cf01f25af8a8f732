use std::str::FromStr;

/// Which backend holds the token records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Redis,
    /// In-process map — local development and tests only; tokens do not
    /// survive a restart.
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "postgres" => Ok(Self::Postgres),
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => anyhow::bail!("unknown store backend: {other} (postgres|redis|memory)"),
        }
    }
}

/// Process configuration, read once at startup and passed by reference into
/// the issuer/redeemer constructors. Nothing here mutates after load.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Public host embedded in signed URLs.
    pub domain: String,
    pub store_backend: StoreBackend,
    pub database_url: String,
    pub redis_url: String,
    /// Signing identity embedded in signed URLs as `key=`.
    pub key_id: String,
    /// Hex-encoded HMAC secret.
    pub signing_key: String,
    /// Content origin that allowed requests are forwarded to. Required for
    /// `serve`, unused by the CLI subcommands.
    pub origin_url: Option<String>,
    /// Fallback destination for rejected redemptions.
    pub reauth_path: String,
    pub reap_interval_secs: u64,
}

impl Config {
    /// Absolute URL of the re-authentication fallback page.
    pub fn reauth_url(&self) -> String {
        format!("https://{}{}", self.domain, self.reauth_path)
    }
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    Ok(Config {
        port: std::env::var("ONCEURL_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080),
        domain: required("ONCEURL_DOMAIN")?,
        store_backend: std::env::var("ONCEURL_STORE")
            .unwrap_or_else(|_| "postgres".into())
            .parse()?,
        database_url: std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/onceurl".into()),
        redis_url: std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into()),
        key_id: required("ONCEURL_KEY_ID")?,
        signing_key: required("ONCEURL_SIGNING_KEY")?,
        origin_url: std::env::var("ONCEURL_ORIGIN_URL").ok(),
        reauth_path: std::env::var("ONCEURL_REAUTH_PATH")
            .unwrap_or_else(|_| "/web/reauth.html".into()),
        reap_interval_secs: std::env::var("ONCEURL_REAP_INTERVAL")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(300),
    })
}

/// Missing required configuration is startup-fatal — there is no safe
/// default for the public domain or the signing identity.
fn required(name: &str) -> anyhow::Result<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => anyhow::bail!("{name} is required"),
    }
}
