use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Job {
    /// Recompute rankings and recommendations as of `requested_at`.
    RecommendArticles { requested_at: DateTime<Utc> },
}

impl Job {
    pub fn recommend_now() -> Self {
        Job::RecommendArticles {
            requested_at: Utc::now(),
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Job::RecommendArticles { .. } => "recommend-articles",
        }
    }
}

#[async_trait::async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: Job) -> anyhow::Result<()>;
}

/// Bounded in-memory queue over a Tokio channel.
pub struct ChannelJobQueue {
    sender: mpsc::Sender<Job>,
}

impl ChannelJobQueue {
    pub fn new(sender: mpsc::Sender<Job>) -> Self {
        Self { sender }
    }

    /// Queue plus the receiving end a [`crate::worker::Worker`] drains.
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<Job>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self::new(sender), receiver)
    }
}

#[async_trait::async_trait]
impl JobQueue for ChannelJobQueue {
    async fn enqueue(&self, job: Job) -> anyhow::Result<()> {
        let key = job.key();
        self.sender
            .send(job)
            .await
            .map_err(|e| anyhow::anyhow!("Queue send error for {}: {}", key, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_enqueue_delivers_in_order() {
        let (queue, mut receiver) = ChannelJobQueue::bounded(4);
        let first = Job::recommend_now();
        let second = Job::recommend_now();

        queue.enqueue(first.clone()).await.unwrap();
        queue.enqueue(second.clone()).await.unwrap();

        assert_eq!(receiver.recv().await, Some(first));
        assert_eq!(receiver.recv().await, Some(second));
    }

    #[tokio::test]
    async fn test_enqueue_fails_without_worker() {
        let (queue, receiver) = ChannelJobQueue::bounded(1);
        drop(receiver);

        let err = queue.enqueue(Job::recommend_now()).await.unwrap_err();
        assert!(err.to_string().contains("recommend-articles"));
    }
}
