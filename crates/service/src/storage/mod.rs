//! File-backed collaborators for running the service without a database.

pub mod json_user_store;

pub use json_user_store::JsonUserStore;
