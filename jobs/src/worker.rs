use crate::pipeline::RecommendationJob;
use crate::queue::Job;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};

pub struct Worker {
    receiver: mpsc::Receiver<Job>,
    job: Arc<RecommendationJob>,
}

impl Worker {
    pub fn new(receiver: mpsc::Receiver<Job>, job: Arc<RecommendationJob>) -> Self {
        Self { receiver, job }
    }

    /// Drains the queue until every sender is dropped. Returns the number of
    /// runs that completed successfully.
    pub async fn run(mut self) -> usize {
        info!("Worker started");
        let mut completed = 0;
        while let Some(job) = self.receiver.recv().await {
            match job {
                Job::RecommendArticles { requested_at } => {
                    info!("Processing RecommendArticles requested at {}", requested_at);
                    match self.job.run(requested_at).await {
                        Ok(report) => {
                            completed += 1;
                            info!(
                                "Run ended {} after {} iterations",
                                report.state.as_str(),
                                report.iterations
                            );
                        }
                        Err(e) => error!("Recommendation run failed: {}", e),
                    }
                }
            }
        }
        info!("Worker stopped");
        completed
    }
}
