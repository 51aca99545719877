//! The two end-to-end flows: ingesting a video and answering a question about it.

mod ingest;
mod locks;
mod query;

pub use ingest::{IngestFailure, IngestReport, IngestionPipeline};
pub use locks::KeyedLocks;
pub use query::{QueryOutcome, QueryPipeline, MISSING_TIMESTAMP_ERROR};
