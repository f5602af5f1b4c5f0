//! Treatment derivation and reconciliation.
//!
//! Pure functions over a newest-first history snapshot. Nothing here
//! mutates the log or talks to a collaborator; the store hands in the
//! committed history and the uploader's already-uploaded snapshot, and gets
//! back the pending set.
//!
//! # Temp-basal pairing
//!
//! One temporary basal interval is stored as two records: a rate record and
//! a duration record sharing the same timestamp, with the duration
//! immediately following its rate in the newest-first log (the normalizer's
//! emission order plus the store's stable sort guarantee this). The scan
//! relies on that adjacency deliberately: a rate record opens a treatment,
//! and a duration record completes the most recently opened one only when
//! the timestamps agree. A duration whose rate half is missing (evicted at
//! the window edge, for instance) completes nothing and produces nothing,
//! and a rate that never receives its duration is not emitted.

use crate::model::event::{EventBody, HistoryEvent};
use crate::model::treatment::{ENTERED_BY, Treatment};
use chrono::{DateTime, Utc};

/// Derive every upload-candidate treatment from a newest-first history.
///
/// Temp-basal pairs become one [`Treatment::TempBasal`] each; bolus and
/// journal-carb records map 1:1. Suspend/resume/rewind/prime records exist
/// for display and audit only and never produce treatments.
#[must_use]
pub fn derive_treatments(history: &[HistoryEvent]) -> Vec<Treatment> {
    let mut open_temp_basals: Vec<TempBasalBuilder> = Vec::new();
    let mut direct: Vec<Treatment> = Vec::new();

    for event in history {
        match &event.body {
            EventBody::TempBasalRate {
                rate_units_per_hour,
                ..
            } => {
                open_temp_basals.push(TempBasalBuilder {
                    created_at: event.timestamp,
                    rate: *rate_units_per_hour,
                    rate_event_id: event.id.clone(),
                    duration: None,
                });
            }
            EventBody::TempBasalDuration { duration_minutes } => {
                // No matching open rate means the duration stands alone and
                // is dropped.
                if let Some(open) = open_temp_basals
                    .iter_mut()
                    .rev()
                    .find(|builder| builder.duration.is_none())
                    && open.created_at == event.timestamp
                {
                    open.duration = Some((*duration_minutes, event.id.clone()));
                }
            }
            EventBody::Bolus {
                amount,
                duration_minutes,
            } => direct.push(Treatment::Bolus {
                created_at: event.timestamp,
                entered_by: ENTERED_BY.to_owned(),
                insulin_units: *amount,
                duration_minutes: *duration_minutes,
                event_id: event.id.clone(),
            }),
            EventBody::JournalCarbs { carb_grams } => direct.push(Treatment::CarbCorrection {
                created_at: event.timestamp,
                entered_by: ENTERED_BY.to_owned(),
                carb_grams: *carb_grams,
            }),
            EventBody::PumpSuspend
            | EventBody::PumpResume
            | EventBody::Rewind
            | EventBody::Prime => {}
        }
    }

    let mut treatments: Vec<Treatment> = open_temp_basals
        .into_iter()
        .filter_map(TempBasalBuilder::build)
        .collect();
    treatments.extend(direct);
    treatments
}

/// Derive treatments and subtract the uploader's acknowledged snapshot.
///
/// Membership is structural treatment equality; the snapshot's ordering is
/// irrelevant. The result is sorted descending by `created_at`. An empty
/// history yields an empty vec without further work.
#[must_use]
pub fn pending_treatments(history: &[HistoryEvent], uploaded: &[Treatment]) -> Vec<Treatment> {
    if history.is_empty() {
        return Vec::new();
    }

    let derived = derive_treatments(history);
    let total = derived.len();

    let mut pending: Vec<Treatment> = derived
        .into_iter()
        .filter(|treatment| !uploaded.contains(treatment))
        .collect();
    pending.sort_by(|a, b| b.created_at().cmp(&a.created_at()));

    tracing::debug!(
        derived = total,
        uploaded = uploaded.len(),
        pending = pending.len(),
        "treatments reconciled"
    );
    pending
}

/// Accumulator for one temp-basal interval during the pairing scan.
struct TempBasalBuilder {
    created_at: DateTime<Utc>,
    rate: f64,
    rate_event_id: String,
    duration: Option<(i64, String)>,
}

impl TempBasalBuilder {
    /// Finish the pair; a builder that never received its duration emits
    /// nothing.
    fn build(self) -> Option<Treatment> {
        let (duration_minutes, duration_event_id) = self.duration?;
        Some(Treatment::TempBasal {
            created_at: self.created_at,
            entered_by: ENTERED_BY.to_owned(),
            rate: self.rate,
            absolute_rate: self.rate,
            duration_minutes,
            rate_event_id: self.rate_event_id,
            duration_event_id,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::event::TempBasalKind;
    use chrono::TimeZone;

    fn at(min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 9, min, 0).single().expect("valid")
    }

    fn rate(id: &str, ts: DateTime<Utc>, rate: f64) -> HistoryEvent {
        HistoryEvent {
            id: id.into(),
            timestamp: ts,
            body: EventBody::TempBasalRate {
                rate_units_per_hour: rate,
                temp_kind: TempBasalKind::Absolute,
            },
        }
    }

    fn duration(id: &str, ts: DateTime<Utc>, minutes: i64) -> HistoryEvent {
        HistoryEvent {
            id: id.into(),
            timestamp: ts,
            body: EventBody::TempBasalDuration {
                duration_minutes: minutes,
            },
        }
    }

    fn bolus(id: &str, ts: DateTime<Utc>, units: f64) -> HistoryEvent {
        HistoryEvent {
            id: id.into(),
            timestamp: ts,
            body: EventBody::Bolus {
                amount: units,
                duration_minutes: 0,
            },
        }
    }

    fn carbs(id: &str, ts: DateTime<Utc>, grams: i32) -> HistoryEvent {
        HistoryEvent {
            id: id.into(),
            timestamp: ts,
            body: EventBody::JournalCarbs { carb_grams: grams },
        }
    }

    fn marker(id: &str, ts: DateTime<Utc>, body: EventBody) -> HistoryEvent {
        HistoryEvent {
            id: id.into(),
            timestamp: ts,
            body,
        }
    }

    // -------------------------------------------------------------------
    // Pairing
    // -------------------------------------------------------------------

    #[test]
    fn adjacent_pair_emits_one_temp_basal() {
        let ts = at(30);
        let history = [rate("rate:blake3:a", ts, 1.2), duration("blake3:a", ts, 30)];

        let treatments = derive_treatments(&history);
        assert_eq!(treatments.len(), 1);
        assert_eq!(
            treatments[0],
            Treatment::TempBasal {
                created_at: ts,
                entered_by: ENTERED_BY.to_owned(),
                rate: 1.2,
                absolute_rate: 1.2,
                duration_minutes: 30,
                rate_event_id: "rate:blake3:a".into(),
                duration_event_id: "blake3:a".into(),
            }
        );
    }

    #[test]
    fn duration_without_rate_emits_nothing() {
        // The rate half fell off the window edge; the orphaned duration must
        // not become a treatment.
        let history = [duration("blake3:a", at(30), 30)];
        assert!(derive_treatments(&history).is_empty());
    }

    #[test]
    fn duration_with_mismatched_timestamp_is_dropped() {
        let history = [rate("rate:blake3:a", at(31), 1.2), duration("blake3:a", at(30), 30)];
        // Timestamps differ: the rate stays open (never emitted), the
        // duration is dropped.
        assert!(derive_treatments(&history).is_empty());
    }

    #[test]
    fn unpaired_rate_is_not_emitted() {
        let history = [rate("rate:blake3:a", at(30), 1.2)];
        assert!(derive_treatments(&history).is_empty());
    }

    #[test]
    fn two_pairs_emit_two_temp_basals() {
        let newer = at(45);
        let older = at(15);
        let history = [
            rate("rate:blake3:b", newer, 2.0),
            duration("blake3:b", newer, 60),
            rate("rate:blake3:a", older, 1.2),
            duration("blake3:a", older, 30),
        ];

        let treatments = derive_treatments(&history);
        assert_eq!(treatments.len(), 2);
        assert_eq!(treatments[0].created_at(), newer);
        assert_eq!(treatments[1].created_at(), older);
    }

    #[test]
    fn duration_completes_most_recently_opened_rate_only() {
        let ts_b = at(40);
        let ts_a = at(20);
        // Two open rates, then a duration matching the older one's timestamp.
        // The most recently opened builder is the older rate (scan order), so
        // it matches; the newer rate stays open and unemitted.
        let history = [
            rate("rate:blake3:b", ts_b, 2.0),
            rate("rate:blake3:a", ts_a, 1.2),
            duration("blake3:a", ts_a, 30),
        ];

        let treatments = derive_treatments(&history);
        assert_eq!(treatments.len(), 1);
        assert_eq!(treatments[0].created_at(), ts_a);
    }

    // -------------------------------------------------------------------
    // Direct mappings
    // -------------------------------------------------------------------

    #[test]
    fn bolus_and_carbs_map_one_to_one() {
        let history = [bolus("blake3:b", at(40), 2.5), carbs("carb:1", at(20), 45)];
        let treatments = derive_treatments(&history);
        assert_eq!(treatments.len(), 2);
        assert!(matches!(treatments[0], Treatment::Bolus { .. }));
        assert!(matches!(treatments[1], Treatment::CarbCorrection { .. }));
    }

    #[test]
    fn display_only_records_produce_no_treatments() {
        let history = [
            marker("blake3:1", at(40), EventBody::PumpSuspend),
            marker("blake3:2", at(30), EventBody::PumpResume),
            marker("blake3:3", at(20), EventBody::Rewind),
            marker("blake3:4", at(10), EventBody::Prime),
        ];
        assert!(derive_treatments(&history).is_empty());
    }

    #[test]
    fn empty_history_yields_empty_pending() {
        assert!(pending_treatments(&[], &[]).is_empty());
    }

    // -------------------------------------------------------------------
    // Set difference
    // -------------------------------------------------------------------

    #[test]
    fn pending_excludes_structurally_equal_uploads() {
        let ts = at(30);
        let history = [
            rate("rate:blake3:a", ts, 1.2),
            duration("blake3:a", ts, 30),
            bolus("blake3:b", at(10), 2.5),
        ];

        let all = pending_treatments(&history, &[]);
        assert_eq!(all.len(), 2);

        // Acknowledge the temp basal only; snapshot order reversed on
        // purpose — membership must not depend on it.
        let uploaded = vec![all[1].clone(), all[0].clone()];
        assert!(pending_treatments(&history, &uploaded).is_empty());

        let partial = vec![all[0].clone()];
        let pending = pending_treatments(&history, &partial);
        assert_eq!(pending, vec![all[1].clone()]);
    }

    #[test]
    fn uploaded_entries_not_in_history_are_ignored() {
        let history = [bolus("blake3:b", at(10), 2.5)];
        let uploaded = vec![Treatment::CarbCorrection {
            created_at: at(5),
            entered_by: ENTERED_BY.to_owned(),
            carb_grams: 12,
        }];
        let pending = pending_treatments(&history, &uploaded);
        assert_eq!(pending.len(), 1);
        assert!(matches!(pending[0], Treatment::Bolus { .. }));
    }

    #[test]
    fn pending_is_sorted_newest_first() {
        let history = [
            bolus("blake3:c", at(50), 1.0),
            rate("rate:blake3:a", at(30), 1.2),
            duration("blake3:a", at(30), 30),
            carbs("carb:1", at(10), 45),
        ];
        let pending = pending_treatments(&history, &[]);
        assert_eq!(pending.len(), 3);
        assert!(
            pending
                .windows(2)
                .all(|w| w[0].created_at() >= w[1].created_at())
        );
    }
}
