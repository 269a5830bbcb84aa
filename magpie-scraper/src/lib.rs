pub mod discover;
pub mod error;
pub mod extract;
pub mod frontier;
pub mod materialize;
pub mod pinterest;
pub mod render;
pub mod scribd;
pub mod store;

pub use discover::DiscoverySource;
pub use error::ScrapeError;
pub use extract::{IdExtractor, ItemId};
pub use frontier::{ExistingFilePolicy, Frontier, FrontierConfig, RunSummary, Target};
pub use materialize::{Artifact, Materializer};
pub use render::RenderClient;
pub use store::ProcessedLedger;
