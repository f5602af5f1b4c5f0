//! Data model: canonical history records, upload-candidate treatments, and
//! the raw driver-layer input shapes.

pub mod event;
pub mod raw;
pub mod treatment;

pub use event::{EventBody, EventKind, HistoryEvent, TempBasalKind, UnknownEventKind};
pub use raw::{Dose, RawEventKind, RawPumpEvent};
pub use treatment::{ENTERED_BY, Treatment};
