pub mod classifier;
pub mod error;
pub mod pipeline;

pub use classifier::VisionClient;
pub use error::TriageError;
pub use pipeline::{run_triage, TriageOptions, TriageSummary};
