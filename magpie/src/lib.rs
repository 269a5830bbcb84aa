// Include handlers module directly from handlers.rs
#[path = "handlers.rs"]
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{default_matched_dir, expand_data_dir};

// Re-export harvest functionality from magpie-core
pub use magpie_core::harvest::{
    execute_harvest, generate_harvest_summary, HarvestOptions, HarvestProgressCallback,
};
