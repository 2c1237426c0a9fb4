use std::sync::Arc;

use once_cell::sync::Lazy;
use tracing::{error, info, instrument, warn};

use super::domain::User;
use super::errors::AuthError;
use super::password::{hash_password, validate_password_strength, verify_password};
use super::repository::UserRepository;

// Verified against when the email is unknown so both paths cost one Argon2 run
static DUMMY_HASH: Lazy<Option<String>> = Lazy::new(|| hash_password("unknown-account-placeholder").ok());

/// Password checks and password changes on top of a [`UserRepository`].
pub struct CredentialService<U: ?Sized> {
    users: Arc<U>,
}

impl<U: UserRepository + ?Sized> CredentialService<U> {
    pub fn new(users: Arc<U>) -> Self {
        Self { users }
    }

    /// Authenticate a user by email and password.
    ///
    /// An unknown email and a wrong password both yield
    /// [`AuthError::WrongPassword`], and both pay for one hash verification,
    /// so login does not reveal whether an account exists. The restore flow
    /// does report unknown emails.
    ///
    /// # Examples
    /// ```
    /// use service::auth::credentials::CredentialService;
    /// use service::auth::domain::{Role, User};
    /// use service::auth::password::hash_password;
    /// use service::auth::repository::mock::MockUserRepository;
    /// use std::sync::Arc;
    /// let user = User { id: "u1".into(), email: "u@e.com".into(), role: Role::Patient, password_hash: hash_password("Passw0rd!").unwrap() };
    /// let svc = CredentialService::new(Arc::new(MockUserRepository::with_users([user])));
    /// let found = tokio_test::block_on(svc.verify_credentials("u@e.com", "Passw0rd!")).unwrap();
    /// assert_eq!(found.id, "u1");
    /// ```
    #[instrument(skip(self, password), fields(email = %email))]
    pub async fn verify_credentials(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let Some(user) = self.users.find_by_email(email.trim()).await? else {
            warn!("login for unknown email");
            if let Some(hash) = DUMMY_HASH.as_deref() {
                let _ = verify_password(password, hash);
            }
            return Err(AuthError::WrongPassword);
        };
        self.check_password(&user, password)?;
        Ok(user)
    }

    /// Change a password after verifying the current one.
    #[instrument(skip(self, old_password, new_password), fields(user_id = %user_id))]
    pub async fn change_password(&self, user_id: &str, old_password: &str, new_password: &str) -> Result<(), AuthError> {
        validate_password_strength(new_password).map_err(AuthError::Validation)?;
        let user = self.users.find_by_id(user_id).await?.ok_or(AuthError::UserNotFound)?;
        self.check_password(&user, old_password)?;
        self.store_new_hash(user_id, new_password).await?;
        info!("password_changed");
        Ok(())
    }

    /// Set a password without the old one; only reachable after a restore
    /// code has been authenticated.
    #[instrument(skip(self, new_password), fields(user_id = %user_id))]
    pub async fn set_new_password(&self, user_id: &str, new_password: &str) -> Result<(), AuthError> {
        validate_password_strength(new_password).map_err(AuthError::Validation)?;
        self.users.find_by_id(user_id).await?.ok_or(AuthError::UserNotFound)?;
        self.store_new_hash(user_id, new_password).await?;
        info!("password_restored");
        Ok(())
    }

    fn check_password(&self, user: &User, password: &str) -> Result<(), AuthError> {
        match verify_password(password, &user.password_hash) {
            Ok(true) => Ok(()),
            Ok(false) => {
                warn!(user_id = %user.id, "wrong password");
                Err(AuthError::WrongPassword)
            }
            Err(e) => {
                error!(user_id = %user.id, error = %e, "stored password hash is unusable");
                Err(AuthError::Repository(format!("stored hash unusable: {e}")))
            }
        }
    }

    async fn store_new_hash(&self, user_id: &str, new_password: &str) -> Result<(), AuthError> {
        let hash = hash_password(new_password).map_err(|e| AuthError::Persist(format!("hashing failed: {e}")))?;
        self.users.update_password_hash(user_id, hash).await.map_err(|e| match e {
            AuthError::Persist(_) | AuthError::UserNotFound => e,
            other => AuthError::Persist(other.to_string()),
        })
    }
}
