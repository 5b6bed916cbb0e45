use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::{DateTime, Utc};
use log::{error, info, warn};
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, Receiver, Sender};

use super::{BoxedTransport, MailError, MailMessage};

pub type JobId = u64;

/// A message waiting to be delivered
#[derive(Debug, Clone)]
pub struct MailJob {
    pub id: JobId,
    pub message: MailMessage,
    /// How many times delivery has been attempted
    pub attempts: u32,
}

/// A job that failed on every attempt
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub job: MailJob,
    pub error: String,
    pub failed_at: DateTime<Utc>,
}

/// The sending half of the mail job queue
pub struct MailQueue {
    sender: Sender<MailJob>,
    next_id: AtomicU64,
}

impl MailQueue {
    pub fn new(capacity: usize) -> (Self, Receiver<MailJob>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));

        let queue = Self {
            sender,
            next_id: AtomicU64::new(1),
        };

        (queue, receiver)
    }

    /// Adds a message to the queue, waiting for room if the queue is full
    pub async fn enqueue(&self, message: MailMessage) -> Result<JobId, MailError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        self.sender
            .send(MailJob {
                id,
                message,
                attempts: 0,
            })
            .await
            .map_err(|_| MailError::QueueClosed)?;

        Ok(id)
    }
}

/// Keeps the most recent failed jobs, dropping the oldest when full
pub struct DeadLetters {
    capacity: usize,
    letters: Mutex<VecDeque<DeadLetter>>,
}

impl DeadLetters {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            letters: Default::default(),
        }
    }

    pub fn push(&self, letter: DeadLetter) {
        let mut letters = self.letters.lock();

        if letters.len() == self.capacity {
            letters.pop_front();
        }

        letters.push_back(letter);
    }

    pub fn list(&self) -> Vec<DeadLetter> {
        self.letters.lock().iter().cloned().collect()
    }
}

/// Takes jobs off the queue and hands them to the transport.
///
/// A job counts as done only once the transport accepts it. Until then it is
/// retried, up to `max_attempts`, after which it is moved to the dead letters.
pub struct MailWorker {
    receiver: Receiver<MailJob>,
    transport: BoxedTransport,
    dead_letters: Arc<DeadLetters>,
    max_attempts: u32,
    retry_delay: Duration,
}

impl MailWorker {
    pub fn new(
        receiver: Receiver<MailJob>,
        transport: BoxedTransport,
        dead_letters: Arc<DeadLetters>,
    ) -> Self {
        Self {
            receiver,
            transport,
            dead_letters,
            max_attempts: 1,
            retry_delay: Duration::from_secs(1),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// The delay before the first retry, doubled after every failure
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Processes jobs until every [MailQueue] is dropped
    pub async fn run(mut self) {
        while let Some(job) = self.receiver.recv().await {
            self.process(job).await;
        }

        info!("Mail queue closed, worker is stopping");
    }

    async fn process(&self, mut job: MailJob) {
        let mut delay = self.retry_delay;

        loop {
            job.attempts += 1;

            let error = match self.transport.send(&job.message).await {
                Ok(()) => {
                    info!(
                        "Sent job {} to {} recipient(s)",
                        job.id,
                        job.message.to.len()
                    );
                    return;
                }
                Err(error) => error,
            };

            if job.attempts >= self.max_attempts {
                error!(
                    "Job {} failed after {} attempt(s): {}",
                    job.id, job.attempts, error
                );

                self.dead_letters.push(DeadLetter {
                    job,
                    error: error.to_string(),
                    failed_at: Utc::now(),
                });
                return;
            }

            warn!(
                "Job {} failed on attempt {}, retrying in {:?}: {}",
                job.id, job.attempts, delay, error
            );

            tokio::time::sleep(delay).await;
            delay *= 2;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mailer::test::RecordingTransport;

    fn message() -> MailMessage {
        MailMessage {
            to: vec!["a@example.com".to_string()],
            subject: "Hello".to_string(),
            html: "<p>Hi</p>".to_string(),
        }
    }

    fn dead_letter(id: JobId) -> DeadLetter {
        DeadLetter {
            job: MailJob {
                id,
                message: message(),
                attempts: 1,
            },
            error: "nope".to_string(),
            failed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_retries_until_delivered() {
        let transport = Arc::new(RecordingTransport::default());
        *transport.failures.lock() = 2;

        let dead_letters = Arc::new(DeadLetters::new(10));
        let (queue, receiver) = MailQueue::new(4);
        let worker = MailWorker::new(receiver, transport.clone(), dead_letters.clone())
            .with_max_attempts(3)
            .with_retry_delay(Duration::from_millis(1));

        queue.enqueue(message()).await.unwrap();
        drop(queue);

        // Runs until the queue is drained, since the only sender is gone
        worker.run().await;

        assert_eq!(transport.sent.lock().len(), 1);
        assert!(dead_letters.list().is_empty());
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let transport = Arc::new(RecordingTransport::default());
        *transport.failures.lock() = 5;

        let dead_letters = Arc::new(DeadLetters::new(10));
        let (queue, receiver) = MailQueue::new(4);
        let worker = MailWorker::new(receiver, transport.clone(), dead_letters.clone())
            .with_max_attempts(2)
            .with_retry_delay(Duration::from_millis(1));

        let id = queue.enqueue(message()).await.unwrap();
        drop(queue);
        worker.run().await;

        let dead = dead_letters.list();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].job.id, id);
        assert_eq!(dead[0].job.attempts, 2);
        assert!(transport.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn test_enqueue_fails_when_worker_is_gone() {
        let (queue, receiver) = MailQueue::new(1);
        drop(receiver);

        let result = queue.enqueue(message()).await;
        assert!(matches!(result, Err(MailError::QueueClosed)));
    }

    #[test]
    fn test_dead_letters_are_bounded() {
        let dead_letters = DeadLetters::new(2);

        for id in 1..=3 {
            dead_letters.push(dead_letter(id));
        }

        let ids: Vec<_> = dead_letters.list().iter().map(|l| l.job.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }
}
