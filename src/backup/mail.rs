//! Backup mail: the users table as a CSV attachment

use chrono::{DateTime, Local};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

use crate::config::SmtpConfig;
use crate::error::AppError;
use crate::logger;
use crate::users::{csv, User, UserStore};

/// SMTP sender for user backups
#[derive(Clone)]
pub struct BackupMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
    timeout: Duration,
}

impl std::fmt::Debug for BackupMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackupMailer")
            .field("from", &self.from.to_string())
            .field("to", &self.to.to_string())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

fn parse_mailbox(value: Option<&str>, field: &str) -> Result<Mailbox, AppError> {
    let value = value.ok_or_else(|| AppError::Mail(format!("smtp.{field} is not set")))?;
    value
        .parse()
        .map_err(|e| AppError::Mail(format!("invalid smtp.{field} {value:?}: {e}")))
}

impl BackupMailer {
    /// Build a mailer from config; `Ok(None)` when no SMTP host is set
    pub fn from_config(config: &SmtpConfig) -> Result<Option<Self>, AppError> {
        let Some(host) = config.host.as_deref() else {
            return Ok(None);
        };
        let from = parse_mailbox(
            config.from.as_deref().or(config.username.as_deref()),
            "from",
        )?;
        let to = parse_mailbox(config.to.as_deref(), "to")?;
        let timeout = Duration::from_secs(config.timeout_secs);

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| AppError::Mail(format!("SMTP relay {host}: {e}")))?
            .port(config.port)
            .timeout(Some(timeout));
        if let (Some(user), Some(pass)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        tracing::info!(host = %host, port = config.port, "Backup mail enabled (SMTP with STARTTLS)");
        Ok(Some(Self {
            transport: builder.build(),
            from,
            to,
            timeout,
        }))
    }

    /// Export the users table and mail it; returns the number of records sent
    pub async fn send_backup(&self, store: &dyn UserStore) -> Result<usize, AppError> {
        let users = store.list().await?;
        let message = build_message(&self.from, &self.to, &users, Local::now())?;
        self.send(message).await?;
        logger::log_info(&format!("Backup mail sent to {} ({} records)", self.to, users.len()));
        Ok(users.len())
    }

    async fn send(&self, message: Message) -> Result<(), AppError> {
        match tokio::time::timeout(self.timeout, self.transport.send(message)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(AppError::Mail(format!("send failed: {e}"))),
            Err(_) => Err(AppError::Mail(format!(
                "send timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }
}

fn backup_subject(now: DateTime<Local>, count: usize) -> String {
    format!("User backup {} ({count} records)", now.format("%d.%m.%Y"))
}

fn attachment_name(now: DateTime<Local>) -> String {
    format!("users_export_{}.csv", now.format("%Y%m%d"))
}

/// Compose the backup message: a short text part and the CSV attachment
fn build_message(
    from: &Mailbox,
    to: &Mailbox,
    users: &[User],
    now: DateTime<Local>,
) -> Result<Message, AppError> {
    let data = csv::write_users(users)?;
    let csv_type = ContentType::parse("text/csv; charset=utf-8")
        .map_err(|e| AppError::Mail(e.to_string()))?;
    let text = format!(
        "The users table is attached as CSV.\n\nGenerated: {}\nRecords: {}",
        now.format("%Y-%m-%d %H:%M:%S"),
        users.len()
    );

    Message::builder()
        .from(from.clone())
        .to(to.clone())
        .subject(backup_subject(now, users.len()))
        .multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(text))
                .singlepart(Attachment::new(attachment_name(now)).body(data, csv_type)),
        )
        .map_err(|e| AppError::Mail(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at_noon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 3, 7, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_subject_and_attachment_name() {
        assert_eq!(backup_subject(at_noon(), 42), "User backup 07.03.2026 (42 records)");
        assert_eq!(attachment_name(at_noon()), "users_export_20260307.csv");
    }

    #[test]
    fn test_build_message() {
        let from: Mailbox = "backup@example.com".parse().unwrap();
        let to: Mailbox = "admin@example.com".parse().unwrap();
        let users = vec![User {
            id: 1,
            name: "Ann".to_string(),
        }];
        let message = build_message(&from, &to, &users, at_noon()).unwrap();
        let raw = String::from_utf8_lossy(&message.formatted()).into_owned();
        assert!(raw.contains("Subject: User backup 07.03.2026 (1 records)"));
        assert!(raw.contains("users_export_20260307.csv"));
        assert!(raw.contains("multipart/mixed"));
        assert!(raw.contains("text/csv"));
    }

    #[test]
    fn test_from_config_disabled_without_host() {
        assert!(BackupMailer::from_config(&SmtpConfig::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_from_config_requires_recipient() {
        let config = SmtpConfig {
            host: Some("smtp.example.com".to_string()),
            from: Some("backup@example.com".to_string()),
            ..SmtpConfig::default()
        };
        assert!(matches!(
            BackupMailer::from_config(&config),
            Err(AppError::Mail(_))
        ));
    }
}
