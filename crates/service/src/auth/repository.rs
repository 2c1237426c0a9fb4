use async_trait::async_trait;

use super::domain::User;
use super::errors::AuthError;

/// User lookup and password persistence. Entity CRUD lives elsewhere; the
/// credential core only needs these three operations.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError>;
    async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, AuthError>;
    async fn update_password_hash(&self, user_id: &str, password_hash: String) -> Result<(), AuthError>;
}

/// Simple in-memory mock repository for tests and doc examples
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MockUserRepository {
        users: Mutex<HashMap<String, User>>, // key: user id
        fail_writes: AtomicBool,
    }

    impl MockUserRepository {
        pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
            let repo = Self::default();
            for u in users {
                repo.insert(u);
            }
            repo
        }

        pub fn insert(&self, user: User) {
            self.users.lock().unwrap().insert(user.id.clone(), user);
        }

        /// Make every subsequent `update_password_hash` fail.
        pub fn fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl UserRepository for MockUserRepository {
        async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
            let users = self.users.lock().unwrap();
            Ok(users.values().find(|u| u.email.eq_ignore_ascii_case(email)).cloned())
        }

        async fn find_by_id(&self, user_id: &str) -> Result<Option<User>, AuthError> {
            let users = self.users.lock().unwrap();
            Ok(users.get(user_id).cloned())
        }

        async fn update_password_hash(&self, user_id: &str, password_hash: String) -> Result<(), AuthError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(AuthError::Persist("mock write failure".into()));
            }
            let mut users = self.users.lock().unwrap();
            let user = users.get_mut(user_id).ok_or(AuthError::UserNotFound)?;
            user.password_hash = password_hash;
            Ok(())
        }
    }
}
