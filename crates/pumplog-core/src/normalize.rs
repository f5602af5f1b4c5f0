//! Raw pump event normalization.
//!
//! Converts one [`RawPumpEvent`] into zero, one, or two canonical
//! [`HistoryEvent`]s. Pure, no side effects, no failure path: unrecognized
//! kinds and dose events missing their dose data normalize to nothing.
//! Malformed input is the driver's problem to log, not ours to surface.
//!
//! # Identity derivation
//!
//! Pump-sourced ids are BLAKE3 over the raw event's payload bytes in
//! `blake3:<hex>` form. The digest is a dedup key, not a security measure:
//! any stable deterministic digest would do, and nothing downstream relies
//! on collision resistance beyond "identical bytes, identical id". That
//! determinism is what makes the store's append path idempotent across
//! driver retries.
//!
//! A temp-basal raw event expands into two dependent records sharing the raw
//! timestamp. The duration record owns the payload hash; the rate record
//! prefixes it with [`RATE_ID_PREFIX`] so both survive dedup. The rate
//! record is emitted first: the store's stable descending sort preserves
//! emission order for equal timestamps, which keeps the rate immediately
//! before its duration in the newest-first log — the adjacency the
//! reconciler's pairing scan depends on.

use chrono::{DateTime, Utc};

use crate::model::event::{EventBody, HistoryEvent, TempBasalKind};
use crate::model::raw::{RawEventKind, RawPumpEvent};

/// Prefix distinguishing the rate half of a temp-basal pair from the
/// duration half derived from the same raw event.
pub const RATE_ID_PREFIX: &str = "rate:";

/// Prefix on freshly generated journal-entry ids.
const JOURNAL_ID_PREFIX: &str = "carb:";

/// Derive the content-addressed id for a raw payload.
#[must_use]
pub fn derive_id(raw_payload: &[u8]) -> String {
    format!("blake3:{}", blake3::hash(raw_payload))
}

/// Normalize one raw pump event into canonical history records.
///
/// Returns an empty vec for unmapped kinds and for bolus/temp-basal events
/// with no dose data.
#[must_use]
pub fn normalize(raw: &RawPumpEvent) -> Vec<HistoryEvent> {
    match raw.kind {
        RawEventKind::Bolus => {
            let Some(dose) = raw.dose else {
                return Vec::new();
            };
            vec![HistoryEvent {
                id: derive_id(&raw.raw_payload),
                timestamp: raw.date,
                body: EventBody::Bolus {
                    amount: dose.value,
                    duration_minutes: dose.duration_minutes(),
                },
            }]
        }
        RawEventKind::TempBasal => {
            let Some(dose) = raw.dose else {
                return Vec::new();
            };
            let duration_id = derive_id(&raw.raw_payload);
            vec![
                HistoryEvent {
                    id: format!("{RATE_ID_PREFIX}{duration_id}"),
                    timestamp: raw.date,
                    body: EventBody::TempBasalRate {
                        rate_units_per_hour: dose.value,
                        temp_kind: TempBasalKind::Absolute,
                    },
                },
                HistoryEvent {
                    id: duration_id,
                    timestamp: raw.date,
                    body: EventBody::TempBasalDuration {
                        duration_minutes: dose.duration_minutes(),
                    },
                },
            ]
        }
        RawEventKind::Suspend => marker(raw, EventBody::PumpSuspend),
        RawEventKind::Resume => marker(raw, EventBody::PumpResume),
        RawEventKind::Rewind => marker(raw, EventBody::Rewind),
        RawEventKind::Prime => marker(raw, EventBody::Prime),
        RawEventKind::Alarm | RawEventKind::BatteryChange => Vec::new(),
    }
}

/// Synthesize a journal-carbs record.
///
/// There is no raw event to hash, so the id is freshly generated; two
/// journal entries for the same gram count are distinct records.
#[must_use]
pub fn journal_carbs(grams: i32, at: DateTime<Utc>) -> HistoryEvent {
    HistoryEvent {
        id: format!("{JOURNAL_ID_PREFIX}{:032x}", rand::random::<u128>()),
        timestamp: at,
        body: EventBody::JournalCarbs { carb_grams: grams },
    }
}

fn marker(raw: &RawPumpEvent, body: EventBody) -> Vec<HistoryEvent> {
    vec![HistoryEvent {
        id: derive_id(&raw.raw_payload),
        timestamp: raw.date,
        body,
    }]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::event::EventKind;
    use crate::model::raw::Dose;
    use chrono::TimeZone;

    fn at(min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 9, min, 0).single().expect("valid")
    }

    fn raw(kind: RawEventKind, dose: Option<Dose>, payload: &[u8]) -> RawPumpEvent {
        RawPumpEvent {
            kind,
            date: at(0),
            dose,
            raw_payload: payload.to_vec(),
        }
    }

    // -------------------------------------------------------------------
    // Mapping table
    // -------------------------------------------------------------------

    #[test]
    fn bolus_with_dose_yields_one_record() {
        let dose = Dose {
            start: at(0),
            end: at(0),
            value: 2.5,
        };
        let records = normalize(&raw(RawEventKind::Bolus, Some(dose), b"\x01\x02"));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind(), EventKind::Bolus);
        assert_eq!(
            records[0].body,
            EventBody::Bolus {
                amount: 2.5,
                duration_minutes: 0
            }
        );
    }

    #[test]
    fn bolus_without_dose_is_dropped() {
        assert!(normalize(&raw(RawEventKind::Bolus, None, b"\x01")).is_empty());
    }

    #[test]
    fn temp_basal_expands_to_rate_then_duration() {
        let dose = Dose {
            start: at(0),
            end: at(30),
            value: 1.2,
        };
        let records = normalize(&raw(RawEventKind::TempBasal, Some(dose), b"\x16\x01"));
        assert_eq!(records.len(), 2);

        // Rate first, duration second: the stable sort keeps this order for
        // the reconciler's pairing scan.
        assert_eq!(records[0].kind(), EventKind::TempBasalRate);
        assert_eq!(records[1].kind(), EventKind::TempBasalDuration);

        assert_eq!(records[0].timestamp, records[1].timestamp);
        assert_eq!(records[0].id, format!("{RATE_ID_PREFIX}{}", records[1].id));
        assert_eq!(
            records[1].body,
            EventBody::TempBasalDuration {
                duration_minutes: 30
            }
        );
    }

    #[test]
    fn temp_basal_without_dose_is_dropped() {
        assert!(normalize(&raw(RawEventKind::TempBasal, None, b"\x16")).is_empty());
    }

    #[test]
    fn markers_map_one_to_one() {
        let cases = [
            (RawEventKind::Suspend, EventKind::PumpSuspend),
            (RawEventKind::Resume, EventKind::PumpResume),
            (RawEventKind::Rewind, EventKind::Rewind),
            (RawEventKind::Prime, EventKind::Prime),
        ];
        for (raw_kind, expected) in cases {
            let records = normalize(&raw(raw_kind, None, b"\x21\x03"));
            assert_eq!(records.len(), 1, "{expected} should map 1:1");
            assert_eq!(records[0].kind(), expected);
        }
    }

    #[test]
    fn unmapped_kinds_are_dropped() {
        assert!(normalize(&raw(RawEventKind::Alarm, None, b"\x06")).is_empty());
        assert!(normalize(&raw(RawEventKind::BatteryChange, None, b"\x1a")).is_empty());
    }

    // -------------------------------------------------------------------
    // Identity derivation
    // -------------------------------------------------------------------

    #[test]
    fn identical_payload_yields_identical_ids() {
        let dose = Dose {
            start: at(0),
            end: at(0),
            value: 2.5,
        };
        let first = normalize(&raw(RawEventKind::Bolus, Some(dose), b"\x01\x02\x03"));
        let second = normalize(&raw(RawEventKind::Bolus, Some(dose), b"\x01\x02\x03"));
        assert_eq!(first[0].id, second[0].id);
    }

    #[test]
    fn distinct_payloads_yield_distinct_ids() {
        let a = derive_id(b"\x01");
        let b = derive_id(b"\x02");
        assert_ne!(a, b);
        assert!(a.starts_with("blake3:"));
    }

    #[test]
    fn journal_ids_are_fresh_each_time() {
        let first = journal_carbs(45, at(0));
        let second = journal_carbs(45, at(0));
        assert_ne!(first.id, second.id);
        assert_eq!(first.body, second.body);
        assert_eq!(first.body, EventBody::JournalCarbs { carb_grams: 45 });
    }
}
