//! # timestore
//!
//! A key-value store facade that adds per-entry expiration to any string
//! key-value engine:
//! - Expiry instants from absolute timestamps or day/hour/minute counts
//! - Expiry checked on read, with optional deletion of expired entries
//! - Every operation classified as SUCCESS / ERROR / OVERFLOW / TIMEOUT
//! - Optional completion callbacks alongside returned results
//! - In-memory and WAL-backed persistent engines
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  ExpiringStore (facade)                      │
//! │        put / get / remove  →  Status + OpResult              │
//! └──────────┬──────────────────────────────┬───────────────────┘
//!            │                              │
//!            ▼                              ▼
//!   ┌─────────────────┐           ┌─────────────────┐
//!   │  expiry (Ttl)   │           │ envelope (JSON) │
//!   └─────────────────┘           └────────┬────────┘
//!                                          │
//!                               ┌──────────▼──────────┐
//!                               │   StorageEngine     │
//!                               └──────┬───────┬──────┘
//!                                      │       │
//!                                      ▼       ▼
//!                             ┌──────────┐ ┌──────────┐
//!                             │  Memory  │ │   File   │──▶ WAL
//!                             └──────────┘ └──────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod envelope;
pub mod expiry;
pub mod status;
pub mod storage;
pub mod store;
pub mod wal;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{Config, SyncStrategy};
pub use envelope::Envelope;
pub use error::{Result, StoreError};
pub use expiry::{compute_expiry, Clock, ExpireAt, ManualClock, SystemClock, Ttl};
pub use status::{build_result, OpResult, Status};
pub use storage::{FileStorage, MemoryStorage, StorageEngine};
pub use store::ExpiringStore;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of timestore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
