//! ledger-core: grouped aggregation, benchmarking and outlier triage over
//! an immutable e-commerce transaction ledger.
//!
//! Data flow, leaves first:
//!   store (RecordSource) -> aggregation -> benchmark -> classifier / threshold -> report
//!
//! Every stage is a pure function of its input snapshot. Pipelines share
//! no mutable state and can run side by side on separate threads.

pub mod aggregation;
pub mod benchmark;
pub mod classifier;
pub mod config;
pub mod error;
pub mod record;
pub mod report;
pub mod sample;
pub mod store;
pub mod threshold;
pub mod types;
