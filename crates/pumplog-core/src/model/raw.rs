//! Raw pump event input types.
//!
//! These are the upstream driver-layer shapes handed to the normalizer. The
//! driver decodes pump pages into [`RawPumpEvent`]s; this crate never parses
//! pump bytes itself, but it does hash `raw_payload` for identity derivation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw event kinds reported by the pump driver.
///
/// Only the first six map to canonical history records; the rest are dropped
/// by the normalizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawEventKind {
    /// Insulin bolus delivery.
    Bolus,
    /// Temporary basal rate change.
    TempBasal,
    /// Delivery suspended.
    Suspend,
    /// Delivery resumed.
    Resume,
    /// Reservoir rewind.
    Rewind,
    /// Cannula or tubing prime.
    Prime,
    /// Pump alarm. Not part of the canonical history.
    Alarm,
    /// Battery change. Not part of the canonical history.
    BatteryChange,
}

/// Dose data attached to bolus and temp-basal raw events.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dose {
    /// Start of the delivery interval.
    pub start: DateTime<Utc>,
    /// End of the delivery interval.
    pub end: DateTime<Utc>,
    /// Insulin units for a bolus; units per hour for a temp basal.
    pub value: f64,
}

impl Dose {
    /// Length of the delivery interval, truncated to whole minutes.
    #[must_use]
    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

/// One raw event as decoded by the pump driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPumpEvent {
    /// Driver-reported kind.
    pub kind: RawEventKind,
    /// When the event occurred on the pump.
    pub date: DateTime<Utc>,
    /// Dose data; required for bolus and temp-basal events to normalize.
    pub dose: Option<Dose>,
    /// Raw page bytes for this event, hashed for identity derivation.
    pub raw_payload: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
