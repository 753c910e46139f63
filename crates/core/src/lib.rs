//! Core types and shared functionality for folio-sync.
//!
//! This crate provides:
//! - Persistent key-value cache with SQLite backend and per-family TTLs
//! - Content and bookkeeping records
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod model;

pub use cache::{CacheDb, CacheFamily, CachePolicy, CacheStore, KvStore};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use model::{AvailabilityRecord, ContentRecord, LocalSyncSnapshot, Post, StatusLevel, StatusSignal};
