//! pumplog-core: a durable, deduplicated, time-windowed log of insulin-pump
//! events, and the reconciliation pass that turns it into upload-ready
//! treatment records.
//!
//! # Data flow
//!
//! ```text
//! raw pump events ─▶ normalize ─▶ candidate records
//!        ─▶ EventStore::append (dedup + 24 h window + persist + notify)
//!        ─▶ EventStore::recent() ─▶ reconcile::derive_treatments
//!        ─▶ minus uploaded snapshot ─▶ pending treatments
//! ```
//!
//! The external uploader consumes [`EventStore::pending_treatments`] and
//! maintains the already-uploaded snapshot; the pump driver produces
//! [`RawPumpEvent`]s. Neither lives in this crate.
//!
//! # Conventions
//!
//! - **Errors**: module error types via `thiserror`; `anyhow::Result` at the
//!   config boundary.
//! - **Logging**: `tracing` macros; no subscriber is installed here.

pub mod config;
pub mod model;
pub mod normalize;
pub mod reconcile;
pub mod store;

pub use config::{PumplogConfig, load_config};
pub use model::event::{EventBody, EventKind, HistoryEvent, TempBasalKind};
pub use model::raw::{Dose, RawEventKind, RawPumpEvent};
pub use model::treatment::{ENTERED_BY, Treatment};
pub use store::{
    EventStore, FileStore, HistorySnapshot, MemoryStore, MergeStats, SnapshotStore, StoreError,
    StoreErrorCode,
};
