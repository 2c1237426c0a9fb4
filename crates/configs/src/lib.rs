use anyhow::Result;
use serde::Deserialize;
use anyhow::anyhow;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub users: UsersConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8080, worker_threads: Some(4) }
    }
}

/// Signing keys and credential lifetimes.
///
/// Key material is never compiled in: it comes from PEM files on disk or,
/// when the `*_pem` fields are set (typically from the environment), inline.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub private_key_path: String,
    #[serde(default)]
    pub public_key_path: String,
    #[serde(default)]
    pub private_key_pem: Option<String>,
    #[serde(default)]
    pub public_key_pem: Option<String>,
    #[serde(default = "default_token_lifetime")]
    pub token_lifetime_secs: u64,
    #[serde(default = "default_restore_code_lifetime")]
    pub restore_code_lifetime_secs: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            private_key_path: String::new(),
            public_key_path: String::new(),
            private_key_pem: None,
            public_key_pem: None,
            token_lifetime_secs: default_token_lifetime(),
            restore_code_lifetime_secs: default_restore_code_lifetime(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Redis,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub backend: CacheBackend,
    #[serde(default)]
    pub redis_url: String,
    #[serde(default = "default_op_timeout")]
    pub op_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { backend: CacheBackend::Redis, redis_url: String::new(), op_timeout_ms: default_op_timeout() }
    }
}

/// Location of the file-backed user directory.
#[derive(Debug, Clone, Deserialize)]
pub struct UsersConfig {
    pub path: String,
}

impl Default for UsersConfig {
    fn default() -> Self {
        Self { path: "data/users.json".into() }
    }
}

/// Upper bound for token and restore-code lifetimes.
pub const MAX_LIFETIME_SECS: u64 = 365 * 24 * 60 * 60;

fn default_token_lifetime() -> u64 { 12 * 60 * 60 }
fn default_restore_code_lifetime() -> u64 { 5 * 60 }
fn default_op_timeout() -> u64 { 2000 }

pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    load_from_str(&content)
}

pub fn load_from_str(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl AppConfig {
    /// Load `config.toml` (or `CONFIG_PATH`), falling back to defaults when
    /// the file is missing, then apply environment overrides and validate.
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = match load_default() {
            Ok(cfg) => cfg,
            Err(e) if is_not_found(&e) => AppConfig::default(),
            Err(e) => return Err(e),
        };
        cfg.apply_env_overrides();
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup; split out so it can be tested
    /// without touching the process environment.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("SERVER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("SERVER_PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(w) = lookup("TOKIO_WORKER_THREADS").and_then(|v| v.parse().ok()) {
            self.server.worker_threads = Some(w);
        }
        if let Some(p) = lookup("AUTH_PRIVATE_KEY_PATH") {
            self.auth.private_key_path = p;
        }
        if let Some(p) = lookup("AUTH_PUBLIC_KEY_PATH") {
            self.auth.public_key_path = p;
        }
        if let Some(pem) = lookup("AUTH_PRIVATE_KEY_PEM") {
            self.auth.private_key_pem = Some(pem);
        }
        if let Some(pem) = lookup("AUTH_PUBLIC_KEY_PEM") {
            self.auth.public_key_pem = Some(pem);
        }
        if let Some(secs) = lookup("AUTH_TOKEN_LIFETIME_SECS").and_then(|v| v.parse().ok()) {
            self.auth.token_lifetime_secs = secs;
        }
        if let Some(secs) = lookup("AUTH_RESTORE_CODE_LIFETIME_SECS").and_then(|v| v.parse().ok()) {
            self.auth.restore_code_lifetime_secs = secs;
        }
        if let Some(url) = lookup("REDIS_URL") {
            self.cache.redis_url = url;
        }
        if let Some(backend) = lookup("CACHE_BACKEND") {
            match backend.to_lowercase().as_str() {
                "memory" => self.cache.backend = CacheBackend::Memory,
                "redis" => self.cache.backend = CacheBackend::Redis,
                _ => {}
            }
        }
        if let Some(ms) = lookup("CACHE_OP_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.cache.op_timeout_ms = ms;
        }
        if let Some(path) = lookup("USERS_FILE") {
            self.users.path = path;
        }
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize()?;
        self.auth.validate()?;
        self.cache.validate()?;
        if self.users.path.trim().is_empty() {
            return Err(anyhow!("users.path must not be empty"));
        }
        Ok(())
    }
}

fn is_not_found(e: &anyhow::Error) -> bool {
    e.downcast_ref::<std::io::Error>()
        .map(|io| io.kind() == std::io::ErrorKind::NotFound)
        .unwrap_or(false)
}

impl ServerConfig {
    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be within 1..=65535"));
        }
        if let Some(w) = self.worker_threads {
            if w == 0 { self.worker_threads = Some(4); }
        } else {
            self.worker_threads = Some(4);
        }
        Ok(())
    }
}

impl AuthConfig {
    pub fn validate(&self) -> Result<()> {
        let has_private = self.private_key_pem.is_some() || !self.private_key_path.trim().is_empty();
        let has_public = self.public_key_pem.is_some() || !self.public_key_path.trim().is_empty();
        if !has_private || !has_public {
            return Err(anyhow!(
                "auth keys missing; set auth.private_key_path/public_key_path or AUTH_PRIVATE_KEY_PEM/AUTH_PUBLIC_KEY_PEM"
            ));
        }
        if self.token_lifetime_secs == 0 || self.token_lifetime_secs > MAX_LIFETIME_SECS {
            return Err(anyhow!("auth.token_lifetime_secs must be within 1..={MAX_LIFETIME_SECS}"));
        }
        if self.restore_code_lifetime_secs == 0 || self.restore_code_lifetime_secs > MAX_LIFETIME_SECS {
            return Err(anyhow!("auth.restore_code_lifetime_secs must be within 1..={MAX_LIFETIME_SECS}"));
        }
        Ok(())
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<()> {
        if self.backend == CacheBackend::Redis {
            if self.redis_url.trim().is_empty() {
                return Err(anyhow!("cache.redis_url is empty; set it in config.toml or REDIS_URL"));
            }
            let lower = self.redis_url.to_lowercase();
            if !(lower.starts_with("redis://") || lower.starts_with("rediss://")) {
                return Err(anyhow!("cache.redis_url must start with redis:// or rediss://"));
            }
        }
        if self.op_timeout_ms == 0 {
            return Err(anyhow!("cache.op_timeout_ms must be > 0"));
        }
        Ok(())
    }
}
