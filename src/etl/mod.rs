//! PokéAPI to PostgreSQL ETL pipeline.
//!
//! Data flows through four stages:
//! 1. The extractor lists the catalog and fetches raw JSON documents,
//!    rate-limited and with transient-failure retries.
//! 2. The transformer validates and flattens raw documents into
//!    normalized records.
//! 3. The loader writes each record bundle in one transaction, upserting
//!    on natural keys so reruns update instead of duplicate.
//! 4. The coordinator drives batches through a bounded worker pool,
//!    tracks statistics, and retries failed entities at the end.

pub mod coordinator;
pub mod extractor;
pub mod loader;
pub mod records;
pub mod stats;
pub mod transformer;

pub use coordinator::{EtlCoordinator, EtlReport, RunOptions};
pub use extractor::{DEFAULT_BASE_URL, PokeApiExtractor};
pub use loader::PokemonLoader;
pub use stats::{EtlStats, EtlStatsSnapshot, RunOutcome};
pub use transformer::transform_payload;
