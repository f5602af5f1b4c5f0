//! Upload-candidate treatment records.
//!
//! A [`Treatment`] is derived on demand from the history log by the
//! reconciler; it is never stored by this crate. The external uploader keeps
//! its own snapshot of treatments it has already delivered, and the pending
//! set is computed by structural set difference against that snapshot.
//!
//! # Equality
//!
//! Two treatments are equal iff their event type and every payload field
//! match (derived `PartialEq`). Pump-sourced back-references are themselves
//! deterministic functions of the raw event bytes, so re-deriving the same
//! history always reproduces values equal to the previously uploaded ones.
//! Payloads carry `f64` figures, so there is no `Eq`/`Hash`; membership
//! checks are linear scans over at most one retention window of records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Origin tag stamped on every treatment produced by this crate.
pub const ENTERED_BY: &str = "pumplog://local";

/// An upload-candidate record derived from pump history.
///
/// Serialized with an internal `event_type` tag, matching the shape the
/// uploader persists in its already-uploaded snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum Treatment {
    /// One temporary basal interval, reconstructed from a rate record and
    /// its paired duration record.
    TempBasal {
        /// Timestamp shared by both originating records.
        created_at: DateTime<Utc>,
        /// Origin tag ([`ENTERED_BY`]).
        entered_by: String,
        /// Basal rate in units per hour.
        rate: f64,
        /// Absolute rate in units per hour (equal to `rate` for absolute
        /// temp basals, which are the only kind recorded).
        absolute_rate: f64,
        /// Interval length in whole minutes.
        duration_minutes: i64,
        /// Id of the originating rate record.
        rate_event_id: String,
        /// Id of the originating duration record.
        duration_event_id: String,
    },
    /// One bolus delivery.
    Bolus {
        /// Timestamp of the originating bolus record.
        created_at: DateTime<Utc>,
        /// Origin tag ([`ENTERED_BY`]).
        entered_by: String,
        /// Delivered insulin units.
        insulin_units: f64,
        /// Delivery interval in whole minutes (0 for a normal bolus).
        duration_minutes: i64,
        /// Id of the originating bolus record.
        event_id: String,
    },
    /// One manually journaled carbohydrate entry.
    CarbCorrection {
        /// Timestamp of the originating journal record.
        created_at: DateTime<Utc>,
        /// Origin tag ([`ENTERED_BY`]).
        entered_by: String,
        /// Carbohydrate grams.
        carb_grams: i32,
    },
}

impl Treatment {
    /// Timestamp of the source history record(s).
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        match self {
            Self::TempBasal { created_at, .. }
            | Self::Bolus { created_at, .. }
            | Self::CarbCorrection { created_at, .. } => *created_at,
        }
    }

    /// Canonical event-type string, identical to the serde tag.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::TempBasal { .. } => "temp_basal",
            Self::Bolus { .. } => "bolus",
            Self::CarbCorrection { .. } => "carb_correction",
        }
    }
}

impl fmt::Display for Treatment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.created_at(), self.event_type())?;
        match self {
            Self::TempBasal {
                rate,
                duration_minutes,
                ..
            } => write!(f, "\t{rate} U/h for {duration_minutes} min"),
            Self::Bolus { insulin_units, .. } => write!(f, "\t{insulin_units} U"),
            Self::CarbCorrection { carb_grams, .. } => write!(f, "\t{carb_grams} g"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).single().expect("valid")
    }

    fn sample_temp_basal() -> Treatment {
        Treatment::TempBasal {
            created_at: at(),
            entered_by: ENTERED_BY.to_owned(),
            rate: 1.2,
            absolute_rate: 1.2,
            duration_minutes: 30,
            rate_event_id: "rate:blake3:abc".into(),
            duration_event_id: "blake3:abc".into(),
        }
    }

    #[test]
    fn equality_is_structural() {
        assert_eq!(sample_temp_basal(), sample_temp_basal());

        let mut other = sample_temp_basal();
        if let Treatment::TempBasal {
            duration_minutes, ..
        } = &mut other
        {
            *duration_minutes = 60;
        }
        assert_ne!(sample_temp_basal(), other);
    }

    #[test]
    fn equality_covers_back_references() {
        let mut other = sample_temp_basal();
        if let Treatment::TempBasal { rate_event_id, .. } = &mut other {
            *rate_event_id = "rate:blake3:other".into();
        }
        assert_ne!(sample_temp_basal(), other);
    }

    #[test]
    fn serde_tag_matches_event_type() {
        let treatments = [
            sample_temp_basal(),
            Treatment::Bolus {
                created_at: at(),
                entered_by: ENTERED_BY.to_owned(),
                insulin_units: 2.5,
                duration_minutes: 0,
                event_id: "blake3:def".into(),
            },
            Treatment::CarbCorrection {
                created_at: at(),
                entered_by: ENTERED_BY.to_owned(),
                carb_grams: 45,
            },
        ];
        for treatment in &treatments {
            let json = serde_json::to_value(treatment).expect("serialize");
            assert_eq!(json["event_type"], treatment.event_type());
            assert_eq!(json["entered_by"], ENTERED_BY);
        }
    }

    #[test]
    fn serde_roundtrip() {
        let treatment = sample_temp_basal();
        let json = serde_json::to_string(&treatment).expect("serialize");
        let back: Treatment = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(treatment, back);
    }

    #[test]
    fn display_does_not_panic() {
        let shown = sample_temp_basal().to_string();
        assert!(shown.contains("temp_basal"));
        assert!(shown.contains("30 min"));
    }
}
