//! Canonical pump-history record types.
//!
//! This module defines the [`HistoryEvent`] struct, the [`EventKind`] enum
//! covering the 8 record kinds, and the typed [`EventBody`] payload enum.
//!
//! A `HistoryEvent` is immutable once created: the normalizer builds it from
//! one raw pump event (or one journal entry), the store appends it at most
//! once, and the retention window eventually evicts it. Its `id` is the
//! dedup key for the append path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The 8 record kinds in the pump-history catalog.
///
/// String representation uses the snake_case form that also tags persisted
/// [`EventBody`] payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Insulin bolus delivery.
    Bolus,
    /// Duration half of a temporary basal interval.
    TempBasalDuration,
    /// Rate half of a temporary basal interval.
    TempBasalRate,
    /// Pump delivery suspended.
    PumpSuspend,
    /// Pump delivery resumed.
    PumpResume,
    /// Reservoir rewind.
    Rewind,
    /// Cannula or tubing prime.
    Prime,
    /// Manually journaled carbohydrates.
    JournalCarbs,
}

/// Error returned when parsing an unknown event kind string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEventKind {
    /// The unrecognised input string.
    pub raw: String,
}

impl fmt::Display for UnknownEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown event kind '{}': expected one of bolus, temp_basal_duration, \
             temp_basal_rate, pump_suspend, pump_resume, rewind, prime, journal_carbs",
            self.raw
        )
    }
}

impl std::error::Error for UnknownEventKind {}

impl EventKind {
    /// All known event kinds in catalog order.
    pub const ALL: [Self; 8] = [
        Self::Bolus,
        Self::TempBasalDuration,
        Self::TempBasalRate,
        Self::PumpSuspend,
        Self::PumpResume,
        Self::Rewind,
        Self::Prime,
        Self::JournalCarbs,
    ];

    /// Return the canonical snake_case string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bolus => "bolus",
            Self::TempBasalDuration => "temp_basal_duration",
            Self::TempBasalRate => "temp_basal_rate",
            Self::PumpSuspend => "pump_suspend",
            Self::PumpResume => "pump_resume",
            Self::Rewind => "rewind",
            Self::Prime => "prime",
            Self::JournalCarbs => "journal_carbs",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bolus" => Ok(Self::Bolus),
            "temp_basal_duration" => Ok(Self::TempBasalDuration),
            "temp_basal_rate" => Ok(Self::TempBasalRate),
            "pump_suspend" => Ok(Self::PumpSuspend),
            "pump_resume" => Ok(Self::PumpResume),
            "rewind" => Ok(Self::Rewind),
            "prime" => Ok(Self::Prime),
            "journal_carbs" => Ok(Self::JournalCarbs),
            _ => Err(UnknownEventKind { raw: s.to_string() }),
        }
    }
}

/// Temporary basal flavor. Pumps here only report absolute rates; percent
/// temp basals never reach the canonical log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TempBasalKind {
    /// The rate is an absolute figure in units per hour.
    Absolute,
}

/// Typed payload for a history record.
///
/// Serialized with an internal `kind` tag whose values match
/// [`EventKind::as_str`], so a persisted record reads as one flat object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventBody {
    /// Payload for a bolus delivery.
    Bolus {
        /// Delivered insulin units.
        amount: f64,
        /// Delivery interval in whole minutes (0 for a normal bolus).
        duration_minutes: i64,
    },
    /// Duration half of a temporary basal interval.
    TempBasalDuration {
        /// Interval length in whole minutes.
        duration_minutes: i64,
    },
    /// Rate half of a temporary basal interval.
    TempBasalRate {
        /// Basal rate in units per hour.
        rate_units_per_hour: f64,
        /// Absolute vs. other flavors (currently always absolute).
        temp_kind: TempBasalKind,
    },
    /// Pump delivery suspended.
    PumpSuspend,
    /// Pump delivery resumed.
    PumpResume,
    /// Reservoir rewind.
    Rewind,
    /// Cannula or tubing prime.
    Prime,
    /// Manually journaled carbohydrates.
    JournalCarbs {
        /// Carbohydrate grams.
        carb_grams: i32,
    },
}

impl EventBody {
    /// Return the kind discriminant for this payload.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Bolus { .. } => EventKind::Bolus,
            Self::TempBasalDuration { .. } => EventKind::TempBasalDuration,
            Self::TempBasalRate { .. } => EventKind::TempBasalRate,
            Self::PumpSuspend => EventKind::PumpSuspend,
            Self::PumpResume => EventKind::PumpResume,
            Self::Rewind => EventKind::Rewind,
            Self::Prime => EventKind::Prime,
            Self::JournalCarbs { .. } => EventKind::JournalCarbs,
        }
    }
}

/// A single record in the canonical pump-history log.
///
/// # Identity
///
/// `id` is unique per stored record and is the merge-cycle dedup key.
/// Pump-sourced records derive it from the raw event's payload bytes
/// (`blake3:<hex>`, see the normalizer), so the same raw event always
/// normalizes to the same id across retries. The rate half of a temp-basal
/// pair carries a `rate:` prefix so both halves coexist under dedup.
/// Journal entries have no payload to hash and get a freshly generated id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    /// Stable content-derived identity string.
    pub id: String,

    /// When the event occurred on the pump (or when the carbs were journaled).
    pub timestamp: DateTime<Utc>,

    /// Kind-specific payload. Flattened so the persisted form is one object
    /// with a `kind` tag next to `id` and `timestamp`.
    #[serde(flatten)]
    pub body: EventBody,
}

impl HistoryEvent {
    /// Return the kind discriminant for this record.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        self.body.kind()
    }
}

impl fmt::Display for HistoryEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}\t{}", self.timestamp, self.kind(), self.id)?;
        match &self.body {
            EventBody::Bolus {
                amount,
                duration_minutes,
            } => write!(f, "\t{amount} U over {duration_minutes} min"),
            EventBody::TempBasalDuration { duration_minutes } => {
                write!(f, "\t{duration_minutes} min")
            }
            EventBody::TempBasalRate {
                rate_units_per_hour,
                ..
            } => write!(f, "\t{rate_units_per_hour} U/h"),
            EventBody::JournalCarbs { carb_grams } => write!(f, "\t{carb_grams} g"),
            _ => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
