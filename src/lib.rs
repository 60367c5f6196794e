// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod metrics;
pub mod storage;

// Feed ingestion: fetch, parse, normalize, store, and the polling loop.
pub mod ingest;

// ---- Re-exports for stable public API ----
pub use crate::error::{GatorError, Result};
pub use crate::ingest::scheduler::{run_aggregation_loop, AggregationLoop, TickOutcome};
pub use crate::ingest::{ingest_feed, IngestReport};
