// Mail Module
// Outgoing customer mail

use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("Failed to write mail to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A plain text message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl MailMessage {
    fn render(&self) -> String {
        format!(
            "From: {}\nTo: {}\nSubject: {}\nContent-Type: text/plain; charset=utf-8\n\n{}\n",
            self.from, self.to, self.subject, self.body
        )
    }
}

pub trait Mailer: Send + Sync {
    fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

/// Mailer that logs every message and optionally drops it into a directory
pub struct LogMailer {
    log_dir: Option<PathBuf>,
}

impl LogMailer {
    pub fn new(log_dir: Option<PathBuf>) -> Self {
        Self { log_dir }
    }
}

impl Mailer for LogMailer {
    fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        info!(to = %message.to, subject = %message.subject, "Mail sent");

        let Some(dir) = &self.log_dir else {
            return Ok(());
        };

        let io_error = |path: &PathBuf| {
            let path = path.clone();
            move |source| MailError::Io { path, source }
        };

        fs::create_dir_all(dir).map_err(io_error(dir))?;

        let name = format!(
            "{}-{}.eml",
            chrono::Utc::now().format("%Y%m%dT%H%M%S"),
            uuid::Uuid::new_v4().simple()
        );
        let path = dir.join(name);
        fs::write(&path, message.render()).map_err(io_error(&path))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message() -> MailMessage {
        MailMessage {
            from: "shop@example.com".into(),
            to: "jane@example.com".into(),
            subject: "Inside - order confirmation".into(),
            body: "Thank you for your order.".into(),
        }
    }

    #[test]
    fn test_log_mailer_without_directory() {
        LogMailer::new(None).send(&message()).unwrap();
    }

    #[test]
    fn test_log_mailer_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let outbox = dir.path().join("outbox");
        LogMailer::new(Some(outbox.clone())).send(&message()).unwrap();

        let files: Vec<_> = fs::read_dir(&outbox).unwrap().collect();
        assert_eq!(files.len(), 1);

        let content = fs::read_to_string(files[0].as_ref().unwrap().path()).unwrap();
        assert!(content.contains("Subject: Inside - order confirmation"));
        assert!(content.ends_with("Thank you for your order.\n"));
    }
}
