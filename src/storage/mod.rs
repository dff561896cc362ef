pub mod database;
pub mod legacy;
pub mod records;

pub use database::{Database, PoolConfig, SharedDatabase};
pub use legacy::{ImportSummary, LegacyImporter, SkippedFile};
pub use records::{AnalysisRecord, AnalysisStore};
