use std::{collections::HashMap, path::PathBuf, sync::Arc};

use async_trait::async_trait;
use tokio::{fs, sync::RwLock};

use crate::auth::domain::User;
use crate::auth::errors::AuthError;
use crate::auth::repository::UserRepository;
use crate::errors::ServiceError;

/// JSON file-backed user directory keyed by user id.
///
/// Lets the server run standalone; deployments with a user database plug in
/// their own [`UserRepository`] instead.
pub struct JsonUserStore {
    inner: RwLock<HashMap<String, User>>,
    file_path: PathBuf,
}

impl JsonUserStore {
    /// Load the store from a path. Creates the file with an empty map if missing.
    pub async fn new<P: Into<PathBuf>>(path: P) -> Result<Arc<Self>, ServiceError> {
        let file_path = path.into();
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).await.ok();
        }

        let map: HashMap<String, User> = match fs::read(&file_path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| ServiceError::Io(format!("{} is not a valid user file: {e}", file_path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let empty: HashMap<String, User> = HashMap::new();
                fs::write(&file_path, serde_json::to_vec(&empty).map_err(|e| ServiceError::Io(e.to_string()))?)
                    .await
                    .map_err(|e| ServiceError::Io(e.to_string()))?;
                empty
            }
            Err(e) => return Err(ServiceError::Io(e.to_string())),
        };

        Ok(Arc::new(Self { inner: RwLock::new(map), file_path }))
    }

    async fn save(&self, map: &HashMap<String, User>) -> Result<(), ServiceError> {
        let data = serde_json::to_vec_pretty(map).map_err(|e| ServiceError::Io(e.to_string()))?;
        fs::write(&self.file_path, data).await.map_err(|e| ServiceError::Io(e.to_string()))?;
        Ok(())
    }

    pub async fn list(&self) -> Vec<User> {
        let map = self.inner.read().await;
        map.values().cloned().collect()
    }

    /// Insert or replace a user and persist.
    pub async fn upsert(&self, user: User) -> Result<(), ServiceError> {
        if user.email.trim().is_empty() {
            return Err(ServiceError::Validation("email must not be empty".into()));
        }
        let mut map = self.inner.write().await;
        map.insert(user.id.clone(), user);
        self.save(&map).await
    }

    /// Remove a user and persist; returns whether it existed.
    pub async fn remove(&self, user_id: &str) -> Result<bool, ServiceError> {
        let mut map = self.inner.write().await;
        let existed = map.remove(user_id).is_some();
        self.save(&map).await?;
        Ok(existed)
    }
}

#[async_trait]
impl UserRepository for JsonUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        let map = self.inner.read().await;
        Ok(map.values().find(|u| u.email.eq_ignore_ascii_case(email)).cloned())
    }

    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, AuthError> {
        let map = self.inner.read().await;
        Ok(map.get(user_id).cloned())
    }

    async fn update_password_hash(&self, user_id: &str, password_hash: String) -> Result<(), AuthError> {
        let mut map = self.inner.write().await;
        let user = map.get_mut(user_id).ok_or_else(|| AuthError::from(ServiceError::not_found("user")))?;
        user.password_hash = password_hash;
        self.save(&map).await.map_err(|e| AuthError::Persist(e.to_string()))
    }
}
