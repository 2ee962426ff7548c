use std::time::Duration;

use zeroize::Zeroizing;

use crate::coordinator::Timeouts;

#[derive(Debug)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub redis_url: String,
    pub provider: ProviderConfig,
    /// Budget for provider-bound requests (token + call).
    /// Set via PROVIDER_TIMEOUT_SECS. Default: 5.
    pub request_timeout: Duration,
    /// Budget for link-session requests.
    /// Set via PROVIDER_LINK_TIMEOUT_SECS. Default: 3.
    pub link_timeout: Duration,
    /// Emit JSON log lines instead of human-readable ones (LOG_FORMAT=json).
    pub json_logs: bool,
}

pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: Zeroizing<String>,
    pub oauth_url: String,
    pub api_url: String,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("oauth_url", &self.oauth_url)
            .field("api_url", &self.api_url)
            .finish()
    }
}

impl Config {
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            default: self.request_timeout,
            link: self.link_timeout,
        }
    }
}

/// Read an optional env file (ADAPTER_ENV_FILE, default `.env`) into the
/// process environment. Variables already set are left alone.
pub fn load_env_file() {
    match std::env::var("ADAPTER_ENV_FILE") {
        Ok(path) => {
            dotenvy::from_filename(&path).ok();
        }
        Err(_) => {
            dotenvy::dotenv().ok();
        }
    }
}

/// Full server configuration from the process environment. Every required
/// variable that is missing is reported.
pub fn load() -> anyhow::Result<Config> {
    from_lookup(|name| std::env::var(name).ok())
}

/// Only what `migrate` needs.
pub fn load_database_url() -> anyhow::Result<String> {
    database_url_from_lookup(|name| std::env::var(name).ok())
}

/// Only what `auth check` needs.
pub fn load_provider() -> anyhow::Result<ProviderConfig> {
    provider_from_lookup(|name| std::env::var(name).ok())
}

/// LOG_FORMAT=json selects JSON log lines.
pub fn json_logs() -> bool {
    json_logs_from_lookup(|name| std::env::var(name).ok())
}

/// Collects required variables, remembering every one that is absent.
struct Required<'a, F> {
    lookup: &'a F,
    missing: Vec<&'static str>,
}

impl<'a, F: Fn(&str) -> Option<String>> Required<'a, F> {
    fn new(lookup: &'a F) -> Self {
        Self {
            lookup,
            missing: Vec::new(),
        }
    }

    fn get(&mut self, name: &'static str) -> String {
        match (self.lookup)(name).filter(|v| !v.trim().is_empty()) {
            Some(v) => v,
            None => {
                self.missing.push(name);
                String::new()
            }
        }
    }

    fn provider(&mut self) -> ProviderConfig {
        ProviderConfig {
            client_id: self.get("PROVIDER_CLIENT_ID"),
            client_secret: Zeroizing::new(self.get("PROVIDER_CLIENT_SECRET")),
            oauth_url: self.get("PROVIDER_OAUTH_URL"),
            api_url: self.get("PROVIDER_API_URL"),
        }
    }

    fn finish(self) -> anyhow::Result<()> {
        if !self.missing.is_empty() {
            anyhow::bail!(
                "missing required environment variables: {}",
                self.missing.join(", ")
            );
        }
        Ok(())
    }
}

pub fn database_url_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<String> {
    let mut required = Required::new(&lookup);
    let url = required.get("DATABASE_URL");
    required.finish()?;
    Ok(url)
}

pub fn provider_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<ProviderConfig> {
    let mut required = Required::new(&lookup);
    let provider = required.provider();
    required.finish()?;
    Ok(provider)
}

fn json_logs_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> bool {
    lookup("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
    let mut required = Required::new(&lookup);
    let port = required.get("PORT");
    let database_url = required.get("DATABASE_URL");
    let redis_url = required.get("REDIS_URL");
    let provider = required.provider();
    required.finish()?;

    let port: u16 = port
        .parse()
        .map_err(|_| anyhow::anyhow!("PORT must be a valid port number, got '{}'", port))?;

    let defaults = Timeouts::default();
    let secs = |name: &str, default: Duration| -> anyhow::Result<Duration> {
        match lookup(name) {
            Some(v) => {
                let n: u64 = v
                    .parse()
                    .map_err(|_| anyhow::anyhow!("{} must be a whole number of seconds, got '{}'", name, v))?;
                if n == 0 {
                    anyhow::bail!("{} must be greater than zero", name);
                }
                Ok(Duration::from_secs(n))
            }
            None => Ok(default),
        }
    };

    Ok(Config {
        port,
        database_url,
        redis_url,
        provider,
        request_timeout: secs("PROVIDER_TIMEOUT_SECS", defaults.default)?,
        link_timeout: secs("PROVIDER_LINK_TIMEOUT_SECS", defaults.link)?,
        json_logs: json_logs_from_lookup(&lookup),
    })
}
