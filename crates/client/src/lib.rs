//! Client code for folio-sync.
//!
//! This crate provides the JSON fetch client, the record validator and markup
//! sanitizer, and the [`ContentSync`] orchestrator with its fallback tiers and
//! background preloader.

pub mod convert;
pub mod fetch;
pub mod sanitize;
pub mod sync;
pub mod validate;

pub use convert::{to_post, to_posts};
pub use fetch::{FetchClient, FetchConfig, JsonResponse};
pub use sanitize::{sanitize, sanitize_inline};
pub use sync::{
    ContentSync, Origin, PageQuery, PageResult, PostPage, PreloadOutcome, Preloader, SyncOptions, SyncStatus,
};
pub use validate::{RepairReason, Validation, validate};
