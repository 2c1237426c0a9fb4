use std::sync::Arc;
use std::time::Duration;

use service::auth::repository::UserRepository;
use service::auth::restore::RestoreConfig;
use service::auth::signing::SigningMaterial;
use service::auth::token::TokenConfig;
use service::auth::{CredentialService, RestoreCodeFlow, TokenService};
use service::mail::Mailer;
use service::session::SessionStore;
use service::verifier::RemoteVerifier;

/// Cache handle shared by the session and restore namespaces.
pub type SharedStore = Arc<dyn SessionStore>;

/// Lifetimes and timeouts injected from configuration.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub token_lifetime: Duration,
    pub restore_code_lifetime: Duration,
    pub store_timeout: Duration,
}

impl From<&configs::AppConfig> for AuthSettings {
    fn from(cfg: &configs::AppConfig) -> Self {
        Self {
            token_lifetime: Duration::from_secs(cfg.auth.token_lifetime_secs),
            restore_code_lifetime: Duration::from_secs(cfg.auth.restore_code_lifetime_secs),
            store_timeout: Duration::from_millis(cfg.cache.op_timeout_ms),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub tokens: Arc<TokenService<SharedStore>>,
    pub restore: Arc<RestoreCodeFlow<SharedStore, dyn UserRepository, dyn Mailer>>,
    pub credentials: Arc<CredentialService<dyn UserRepository>>,
    pub verifier: Arc<RemoteVerifier<SharedStore>>,
}

impl AppState {
    pub fn new(
        keys: Arc<SigningMaterial>,
        store: SharedStore,
        users: Arc<dyn UserRepository>,
        mailer: Arc<dyn Mailer>,
        settings: AuthSettings,
    ) -> Self {
        let tokens = Arc::new(TokenService::new(
            keys,
            Arc::clone(&store),
            TokenConfig { lifetime: settings.token_lifetime, store_timeout: settings.store_timeout },
        ));
        let restore = Arc::new(RestoreCodeFlow::new(
            store,
            Arc::clone(&users),
            mailer,
            RestoreConfig { code_lifetime: settings.restore_code_lifetime, store_timeout: settings.store_timeout },
        ));
        Self {
            verifier: Arc::new(RemoteVerifier::new(Arc::clone(&tokens))),
            credentials: Arc::new(CredentialService::new(users)),
            tokens,
            restore,
        }
    }
}
