pub mod sampler;
pub mod selector;

pub use sampler::{sample_one, WeightedSampler};
pub use selector::{extract_affinities, Candidate, CandidateSelector};
