//! Outbound email boundary.
//!
//! Delivery itself is owned by a separate service; the credential core only
//! needs `send(to, subject, body)`.

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MailError {
    #[error("mail dispatch failed: {0}")]
    Dispatch(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

/// Writes each message to the log instead of delivering it. Used by the
/// server binary when no mail relay is wired in.
#[derive(Debug, Default, Clone)]
pub struct TracingMailer;

#[async_trait]
impl Mailer for TracingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        info!(%to, %subject, body_len = body.len(), "mail_dispatched");
        Ok(())
    }
}

/// Recording mailer for tests
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SentMail {
        pub to: String,
        pub subject: String,
        pub body: String,
    }

    #[derive(Default)]
    pub struct RecordingMailer {
        sent: Mutex<Vec<SentMail>>,
        fail: AtomicBool,
    }

    impl RecordingMailer {
        pub fn failing() -> Self {
            let m = Self::default();
            m.set_failing(true);
            m
        }

        pub fn set_failing(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }

        pub fn sent(&self) -> Vec<SentMail> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(MailError::Dispatch("relay unavailable".into()));
            }
            self.sent.lock().unwrap().push(SentMail { to: to.into(), subject: subject.into(), body: body.into() });
            Ok(())
        }
    }
}
