pub mod config;
pub mod dedup;
pub mod records;

pub use config::StoreConfig;
pub use dedup::FileDedupIndex;
pub use records::{FileProfileStore, FileRequirementSource, FileScoreStore, PersistedScore};
