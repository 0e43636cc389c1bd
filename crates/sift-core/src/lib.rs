pub mod broker;
pub mod crawl_worker;
pub mod error;
pub mod job;
pub mod profile;
pub mod requirements;
pub mod score;
pub mod score_worker;
pub mod similarity;
pub mod stats;
pub mod testutil;
pub mod traits;
pub mod worker;

pub use broker::{BrokerClient, JobConsumer, JobDelivery};
pub use error::PipelineError;
pub use job::{CrawlJob, DedupRecord, NaturalKey, ScoreJob, Stage, compute_hash};
pub use profile::ProfileRecord;
pub use requirements::{FactorPools, RequirementSpec};
pub use score::{ScoreResult, Scorer};
pub use stats::{PipelineStats, StatsSnapshot};
