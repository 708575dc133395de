pub mod pipeline;
pub mod queue;
pub mod worker;

pub use pipeline::{JobError, RecommendationJob, RunReport};
pub use queue::{ChannelJobQueue, Job, JobQueue};
pub use worker::Worker;
