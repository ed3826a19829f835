//! Wiring of datastores, services and background queues

use crate::connection::{ConnectionConfig, DEFAULT_ALIAS, DataSources};
use crate::core::Result;
use crate::domain::install_schema;
use crate::queue::{
    EMAIL_QUEUE, EmailJobHandler, JobQueue, LogMailer, LogUserSink, QueueConfig, USER_SYNC_QUEUE, UserSyncJobHandler,
};
use crate::service::{AuthService, EmailService, EventService, LocationService, UserService};
use crate::transaction::TransactionManager;
use crate::web::AppState;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Register the primary datastore and create its tables
pub fn open_sources(config: ConnectionConfig) -> Result<DataSources> {
    let sources = DataSources::new().with_config(DEFAULT_ALIAS, config)?;
    for alias in sources.aliases() {
        install_schema(sources.pool(alias)?.database())?;
    }
    Ok(sources)
}

/// Background queues and their worker tasks
pub struct Queues {
    pub email: JobQueue,
    pub user_sync: JobQueue,
    workers: Vec<JoinHandle<()>>,
}

impl Queues {
    pub fn start(config: QueueConfig) -> Self {
        let (email, email_worker) = JobQueue::start(
            EMAIL_QUEUE,
            Arc::new(EmailJobHandler::new(Arc::new(LogMailer))),
            config.clone(),
        );
        let (user_sync, sync_worker) = JobQueue::start(
            USER_SYNC_QUEUE,
            Arc::new(UserSyncJobHandler::new(Arc::new(LogUserSink))),
            config,
        );
        info!(queues = ?[EMAIL_QUEUE, USER_SYNC_QUEUE], "background queues started");

        Self {
            email,
            user_sync,
            workers: vec![email_worker, sync_worker],
        }
    }

    /// Drop the producers and wait for the workers to drain
    pub async fn shutdown(self) {
        let Self {
            email,
            user_sync,
            workers,
        } = self;
        drop(email);
        drop(user_sync);
        for worker in workers {
            let _ = worker.await;
        }
    }
}

/// Build the HTTP state on top of registered datastores
pub fn build_state(sources: &DataSources, queues: Option<&Queues>, expose_errors: bool) -> Result<AppState> {
    let transactions = TransactionManager::new(sources.clone());
    let mut auth = AuthService::new(UserService::new(sources)?, transactions);
    if let Some(queues) = queues {
        auth = auth.with_user_sync(queues.user_sync.clone());
    }

    let mut state =
        AppState::new(auth, LocationService::new(sources)?, EventService::new(sources)?).expose_errors(expose_errors);
    if let Some(queues) = queues {
        state = state.with_email(EmailService::new(queues.email.clone()));
    }
    Ok(state)
}
