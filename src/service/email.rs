use super::{ServiceError, ServiceResult};
use crate::queue::{EmailJob, JobError, JobQueue};
use chrono::Utc;
use serde_json::{Value, json};
use tracing::info;

pub const SEND_EMAIL_JOB: &str = "send-email";
pub const TEST_EMAIL_RECIPIENT: &str = "test@hi-fella.com";

impl From<JobError> for ServiceError {
    fn from(err: JobError) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

/// Producer side of outbound email; delivery happens on the email queue worker
#[derive(Clone, Debug)]
pub struct EmailService {
    queue: JobQueue,
}

impl EmailService {
    pub fn new(queue: JobQueue) -> Self {
        Self { queue }
    }

    /// Schedule one message and return the job id
    pub fn send_email(&self, to: &str, subject: &str, template_name: &str, data: Value) -> ServiceResult<String> {
        let job = EmailJob {
            to: to.to_string(),
            subject: subject.to_string(),
            template_name: template_name.to_string(),
            data,
        };
        let id = self.queue.enqueue(SEND_EMAIL_JOB, &job)?;
        info!(job_id = %id, to = %job.to, template = %job.template_name, "email scheduled");
        Ok(id)
    }

    pub fn send_test_email(&self) -> ServiceResult<String> {
        self.send_email(
            TEST_EMAIL_RECIPIENT,
            "Test Email from Hi-Fella",
            "test",
            json!({
                "name": "Test User",
                "message": "This is a test email from Hi-Fella!",
                "date": Utc::now().date_naive().to_string(),
            }),
        )
    }
}
