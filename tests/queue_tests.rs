use async_trait::async_trait;
use hifella::app::Queues;
use hifella::queue::{EMAIL_QUEUE, EmailJob, EmailJobHandler, JobError, JobQueue, Mailer, QueueConfig, UserSyncJob};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct OutageMailer {
    outage_calls: Mutex<u32>,
    delivered: Mutex<Vec<EmailJob>>,
}

#[async_trait]
impl Mailer for OutageMailer {
    async fn send(&self, email: &EmailJob) -> Result<(), JobError> {
        let mut remaining = self.outage_calls.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(JobError::Failed("smtp unavailable".into()));
        }
        self.delivered.lock().unwrap().push(email.clone());
        Ok(())
    }
}

async fn wait_until(condition: impl Fn() -> bool) {
    while !condition() {
        tokio::time::sleep(Duration::from_secs(60)).await;
    }
}

fn welcome(to: &str) -> EmailJob {
    EmailJob {
        to: to.to_string(),
        subject: "Welcome to Hi-Fella".to_string(),
        template_name: "welcome".to_string(),
        data: json!({ "name": "Ayu" }),
    }
}

#[tokio::test(start_paused = true)]
async fn test_email_delivered_after_outage_spanning_a_requeue() {
    let mailer = Arc::new(OutageMailer {
        outage_calls: Mutex::new(4),
        ..Default::default()
    });
    let (queue, _worker) = JobQueue::start(
        EMAIL_QUEUE,
        Arc::new(EmailJobHandler::new(mailer.clone())),
        QueueConfig::default(),
    );

    let started = tokio::time::Instant::now();
    queue.enqueue("welcome", &welcome("ayu@hifella.id")).unwrap();
    wait_until(|| queue.stats().completed() == 1).await;

    assert_eq!(queue.stats().failed_attempts(), 4);
    assert_eq!(queue.stats().requeued(), 1);
    assert!(started.elapsed() >= Duration::from_secs(24 * 60 * 60));
    assert_eq!(mailer.delivered.lock().unwrap().clone(), vec![welcome("ayu@hifella.id")]);
}

#[tokio::test(start_paused = true)]
async fn test_malformed_payload_is_eventually_dropped() {
    let mailer = Arc::new(OutageMailer::default());
    let (queue, _worker) = JobQueue::start(
        EMAIL_QUEUE,
        Arc::new(EmailJobHandler::new(mailer.clone())),
        QueueConfig::default(),
    );

    queue.enqueue("welcome", &json!({ "recipient": "nobody" })).unwrap();
    wait_until(|| queue.stats().dropped() == 1).await;

    assert_eq!(queue.stats().failed_attempts(), 18);
    assert_eq!(queue.stats().requeued(), 5);
    assert!(mailer.delivered.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_custom_attempt_budget() {
    let mailer = Arc::new(OutageMailer {
        outage_calls: Mutex::new(1),
        ..Default::default()
    });
    let config = QueueConfig {
        attempts: 1,
        requeue_delay: Duration::from_secs(10),
        max_requeues: 0,
    };
    let (queue, _worker) = JobQueue::start(EMAIL_QUEUE, Arc::new(EmailJobHandler::new(mailer)), config);

    queue.enqueue("welcome", &welcome("budi@hifella.id")).unwrap();
    wait_until(|| queue.stats().dropped() == 1).await;

    assert_eq!(queue.stats().completed(), 0);
    assert_eq!(queue.stats().requeued(), 0);
}

#[tokio::test]
async fn test_application_queues_drain_on_shutdown() {
    let queues = Queues::start(QueueConfig::default());

    queues.email.enqueue("welcome", &welcome("citra@hifella.id")).unwrap();
    queues
        .user_sync
        .enqueue(
            "sync",
            &UserSyncJob {
                user_id: "u1".into(),
                email: "citra@hifella.id".into(),
            },
        )
        .unwrap();

    // workers finish the buffered jobs before stopping
    tokio::time::timeout(Duration::from_secs(5), queues.shutdown())
        .await
        .unwrap();
}
