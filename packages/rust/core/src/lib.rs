//! Core record enrichment for citesync.
//!
//! This crate ties together URL cleaning, platform detection, structured
//! data extraction, and record reconciliation into end-to-end workflows:
//! a one-shot batch run over the library ([`run_batch`]) and a long-lived
//! streaming subscriber ([`StreamHandler`]).

pub mod batch;
pub mod dates;
pub mod pipeline;
pub mod reconcile;
pub mod report;
pub mod streaming;

#[cfg(test)]
mod testing;

pub use batch::{
    BatchOptions, BatchResult, ConfirmPrompt, ProgressReporter, RecordChange, SilentProgress,
    run_batch,
};
pub use dates::{normalize_date, parse_date};
pub use pipeline::{ProcessOptions, RecordOutcome, RecordPipeline};
pub use reconcile::{prepare_item_update, resolve_item_type};
pub use report::{default_report_name, generate_report, render_report};
pub use streaming::{
    ReconnectBackoff, ServerEvent, StreamConnection, StreamHandler, StreamState, StreamTransport,
    WsTransport,
};
