//! Shared types, error model, and configuration for citesync.
//!
//! This crate is the foundation depended on by all other citesync crates.
//! It provides:
//! - [`CitesyncError`]: the unified error type
//! - Domain types ([`Record`], [`ExtractedMetadata`], [`ClassificationResult`], [`RunStats`])
//! - Configuration ([`AppConfig`], [`LibraryConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BatchConfig, FetchConfig, LibraryConfig, LibraryKind, LibrarySection,
    StoreConfig, StreamConfig, config_dir, config_file_path, init_config, load_config,
    load_config_from, mask_key, resolve_library, resolve_library_with,
};
pub use error::{CitesyncError, Result};
pub use types::{
    ChangeNotification, ClassificationResult, ContentSubtype, ContentType, Creator,
    ExtractedMetadata, ItemType, PROCESSED_TAG, Platform, Record, RecordData, RunStats, Tag,
};
