mod queue;
mod resend;

use std::sync::Arc;

use async_trait::async_trait;
use log::info;
use thiserror::Error;

pub use queue::*;
pub use resend::*;

use crate::{resolve_recipients, Database, DatabaseError, MailConfig, RecipientError};

pub type BoxedTransport = Arc<dyn MailTransport>;

#[derive(Debug, Error)]
pub enum MailError {
    #[error(transparent)]
    Recipients(#[from] RecipientError),
    #[error(transparent)]
    Db(#[from] DatabaseError),
    /// The worker has stopped and no longer accepts jobs
    #[error("Mail queue is closed")]
    QueueClosed,
    /// The request to the mail provider couldn't be made
    #[error("Failed to send email: {0}")]
    Transport(String),
    /// The mail provider refused the message
    #[error("Failed to send email: provider responded with {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// A single email, sent to every recipient in one batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
}

/// Something that can deliver a [MailMessage]
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

/// An announcement to everyone that has RSVP'd
#[derive(Debug, Clone)]
pub struct Broadcast {
    pub subject: String,
    pub html_body: String,
    /// Sends only to this address, for trying out a broadcast
    pub test_email: Option<String>,
}

/// Returned once a broadcast is queued, before it is sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastReceipt {
    pub success: bool,
    pub recipients: usize,
    pub job_id: JobId,
}

/// Resolves broadcast recipients and queues the email for the worker
pub struct Mailer {
    db: Arc<dyn Database>,
    queue: MailQueue,
    dead_letters: Arc<DeadLetters>,
}

impl Mailer {
    /// Creates the mailer and spawns the worker that sends its jobs.
    /// Must be called from within a tokio runtime.
    pub fn new(db: &Arc<dyn Database>, config: &MailConfig, transport: BoxedTransport) -> Self {
        let dead_letters = Arc::new(DeadLetters::new(config.dead_letter_capacity));
        let (queue, receiver) = MailQueue::new(config.queue_capacity);

        let worker = MailWorker::new(receiver, transport, dead_letters.clone())
            .with_max_attempts(config.max_attempts);

        tokio::spawn(worker.run());

        Self {
            db: db.clone(),
            queue,
            dead_letters,
        }
    }

    /// Queues a broadcast and returns how many recipients it will reach.
    /// Delivery happens in the background, failures end up in [Mailer::dead_letters].
    pub async fn send_broadcast(
        &self,
        broadcast: Broadcast,
    ) -> Result<BroadcastReceipt, MailError> {
        let recipients = match broadcast.test_email.as_deref() {
            // The stored RSVPs aren't needed for a test send
            Some(email) if !email.trim().is_empty() => resolve_recipients(&[], Some(email))?,
            _ => resolve_recipients(&self.db.list_rsvps().await?, None)?,
        };

        let count = recipients.len();
        let job_id = self
            .queue
            .enqueue(MailMessage {
                to: recipients,
                subject: broadcast.subject,
                html: broadcast.html_body,
            })
            .await?;

        info!("Queued broadcast job {} for {} recipient(s)", job_id, count);

        Ok(BroadcastReceipt {
            success: true,
            recipients: count,
            job_id,
        })
    }

    /// Returns the jobs that could not be delivered
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.dead_letters.list()
    }
}

/// Logs emails instead of sending them, used when no mail provider is configured
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        info!(
            "Not sending \"{}\" to {} recipient(s), no mail provider is configured",
            message.subject,
            message.to.len()
        );

        Ok(())
    }
}
