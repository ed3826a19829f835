use super::{Job, JobError, JobHandler};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

pub const EMAIL_QUEUE: &str = "email";
pub const USER_SYNC_QUEUE: &str = "user-sync";

/// Outbound email request; rendering `template_name` is up to the mailer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmailJob {
    pub to: String,
    pub subject: String,
    pub template_name: String,
    #[serde(default)]
    pub data: Value,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &EmailJob) -> Result<(), JobError>;
}

/// Mailer that only records what would have been sent
#[derive(Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &EmailJob) -> Result<(), JobError> {
        info!(to = %email.to, subject = %email.subject, template = %email.template_name, "email sent");
        Ok(())
    }
}

pub struct EmailJobHandler {
    mailer: Arc<dyn Mailer>,
}

impl EmailJobHandler {
    pub fn new(mailer: Arc<dyn Mailer>) -> Self {
        Self { mailer }
    }
}

#[async_trait]
impl JobHandler for EmailJobHandler {
    async fn handle(&self, job: &Job) -> Result<(), JobError> {
        let email: EmailJob = job.payload()?;
        self.mailer.send(&email).await
    }
}

/// Account to push to the external user sheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSyncJob {
    pub user_id: String,
    pub email: String,
}

#[async_trait]
pub trait UserSink: Send + Sync {
    async fn sync(&self, user: &UserSyncJob) -> Result<(), JobError>;
}

#[derive(Debug, Default)]
pub struct LogUserSink;

#[async_trait]
impl UserSink for LogUserSink {
    async fn sync(&self, user: &UserSyncJob) -> Result<(), JobError> {
        info!(user_id = %user.user_id, email = %user.email, "user synced");
        Ok(())
    }
}

pub struct UserSyncJobHandler {
    sink: Arc<dyn UserSink>,
}

impl UserSyncJobHandler {
    pub fn new(sink: Arc<dyn UserSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl JobHandler for UserSyncJobHandler {
    async fn handle(&self, job: &Job) -> Result<(), JobError> {
        let user: UserSyncJob = job.payload()?;
        self.sink.sync(&user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingMailer {
        sent: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Mailer for RecordingMailer {
        async fn send(&self, email: &EmailJob) -> Result<(), JobError> {
            self.sent.lock().unwrap().push(email.to.clone());
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_email_handler_decodes_payload() {
        let mailer = Arc::new(RecordingMailer::default());
        let handler = EmailJobHandler::new(mailer.clone());

        let job = Job::new(
            "welcome",
            json!({ "to": "rina@hifella.id", "subject": "Welcome", "template_name": "welcome" }),
        );
        handler.handle(&job).await.unwrap();
        assert_eq!(*mailer.sent.lock().unwrap(), vec!["rina@hifella.id".to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_payload_fails_job() {
        let handler = UserSyncJobHandler::new(Arc::new(LogUserSink));
        let job = Job::new("sync", json!({ "email": "missing-id@hifella.id" }));
        assert!(matches!(handler.handle(&job).await, Err(JobError::Payload(_))));
    }
}
