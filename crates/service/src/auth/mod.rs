//! Auth module: signing keys, session tokens, restore codes and passwords.
//!
//! Layering follows domain → repository/collaborators → services; nothing here
//! depends on the HTTP framework.

pub mod credentials;
pub mod domain;
pub mod errors;
pub mod password;
pub mod repository;
pub mod restore;
pub mod signing;
pub mod token;

pub use credentials::CredentialService;
pub use errors::AuthError;
pub use restore::RestoreCodeFlow;
pub use signing::SigningMaterial;
pub use token::TokenService;
