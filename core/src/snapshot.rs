//! Record snapshot — the immutable record set the calculator reads.
//!
//! A snapshot is built once per data refresh by whoever loads the
//! performance sheet, then shared (behind `Arc`) with every calculation.
//! Nothing in the calculator mutates it.
//!
//! Intake rules:
//!   - only rows whose kind equals the eligible kind ("Real") are kept
//!   - rows without a segment or subchannel are dropped
//!   - non-numeric values count as 0
//!   - unparsable periods become `None` (the row still counts when the
//!     scope does not filter by period)

use crate::{
    normalize::{normalize, scope_key, scope_key_opt},
    types::{Period, Segment, Subchannel, Tribe},
};
use serde::{Deserialize, Serialize};

/// One observed data point, already eligible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub period:         Option<Period>,
    pub segment:        Segment,
    pub subchannel:     Subchannel,
    pub tribe:          Option<Tribe>,
    pub category_label: String,
    pub value:          f64,
}

/// A row as handed over by the loader: loosely typed, with the upstream
/// sheet's column names accepted as aliases.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRecord {
    #[serde(default, alias = "ANOMES")]
    pub period: serde_json::Value,
    #[serde(default, alias = "SEGMENTO")]
    pub segment: Option<String>,
    #[serde(default, alias = "NM_SUBCANAL")]
    pub subchannel: Option<String>,
    #[serde(default, alias = "NM_TORRE")]
    pub tribe: Option<String>,
    #[serde(default, alias = "NM_KPI")]
    pub category_label: Option<String>,
    #[serde(default, alias = "VOL_KPI")]
    pub value: serde_json::Value,
    #[serde(default, alias = "TP_META")]
    pub record_kind: Option<String>,
}

/// Normalized keys computed once per record at snapshot build.
#[derive(Debug, Clone)]
pub(crate) struct RecordKeys {
    pub segment:    String,
    pub subchannel: String,
    pub label:      String,
}

/// Counts reported by `RecordSnapshot::from_raw`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeStats {
    pub accepted:          usize,
    pub wrong_kind:        usize,
    pub missing_scope:     usize,
    pub unparsable_period: usize,
}

#[derive(Debug, Clone, Default)]
pub struct RecordSnapshot {
    records: Vec<Record>,
    keys:    Vec<RecordKeys>,
}

impl RecordSnapshot {
    /// Build from records already filtered to the eligible kind.
    pub fn new(records: Vec<Record>) -> Self {
        let keys = records
            .iter()
            .map(|r| RecordKeys {
                segment:    scope_key(&r.segment),
                subchannel: scope_key(&r.subchannel),
                label:      normalize(&r.category_label),
            })
            .collect();
        Self { records, keys }
    }

    /// Build from loader rows, applying the intake rules.
    pub fn from_raw(rows: Vec<RawRecord>, eligible_kind: &str) -> (Self, IntakeStats) {
        let eligible = scope_key(eligible_kind);
        let mut stats = IntakeStats::default();
        let mut records = Vec::with_capacity(rows.len());

        for row in rows {
            if scope_key_opt(row.record_kind.as_deref()) != eligible {
                stats.wrong_kind += 1;
                continue;
            }
            let (Some(segment), Some(subchannel)) = (non_blank(row.segment), non_blank(row.subchannel))
            else {
                stats.missing_scope += 1;
                continue;
            };

            let period = parse_period(&row.period);
            if period.is_none() && !row.period.is_null() {
                stats.unparsable_period += 1;
            }

            records.push(Record {
                period,
                segment,
                subchannel,
                tribe: non_blank(row.tribe),
                category_label: row.category_label.unwrap_or_default(),
                value: coerce_value(&row.value),
            });
        }

        stats.accepted = records.len();
        if stats.wrong_kind + stats.missing_scope > 0 {
            log::warn!(
                "intake: dropped {} rows of other kinds and {} rows without segment/subchannel",
                stats.wrong_kind,
                stats.missing_scope,
            );
        }
        log::info!("intake: {} eligible records", stats.accepted);

        (Self::new(records), stats)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub(crate) fn iter_keyed(&self) -> impl Iterator<Item = (&Record, &RecordKeys)> {
        self.records.iter().zip(self.keys.iter())
    }

    /// Distinct segments, first spelling wins, sorted by display name.
    pub fn segments(&self) -> Vec<Segment> {
        distinct_sorted(self.iter_keyed().map(|(r, k)| (&k.segment, &r.segment)))
    }

    /// Distinct subchannels of `segment` (optionally within one period),
    /// first spelling wins, sorted by display name.
    pub fn subchannels(&self, segment: &str, period: Option<Period>) -> Vec<Subchannel> {
        let seg_key = scope_key(segment);
        if seg_key.is_empty() {
            return Vec::new();
        }
        distinct_sorted(
            self.iter_keyed()
                .filter(|(r, k)| k.segment == seg_key && period.map_or(true, |p| r.period == Some(p)))
                .map(|(r, k)| (&k.subchannel, &r.subchannel)),
        )
    }

    /// Distinct periods present in the snapshot, oldest first.
    pub fn periods(&self) -> Vec<Period> {
        let mut out: Vec<Period> = self.records.iter().filter_map(|r| r.period).collect();
        out.sort();
        out.dedup();
        out
    }
}

fn distinct_sorted<'a>(pairs: impl Iterator<Item = (&'a String, &'a String)>) -> Vec<String> {
    let mut seen: Vec<&String> = Vec::new();
    let mut out: Vec<String> = Vec::new();
    for (key, display) in pairs {
        if key.is_empty() || seen.contains(&key) {
            continue;
        }
        seen.push(key);
        out.push(display.trim().to_string());
    }
    out.sort();
    out
}

fn non_blank(cell: Option<String>) -> Option<String> {
    cell.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn parse_period(cell: &serde_json::Value) -> Option<Period> {
    match cell {
        serde_json::Value::String(s) => Period::parse(s).ok(),
        serde_json::Value::Number(n) => Period::parse(&n.to_string()).ok(),
        _ => None,
    }
}

/// Numeric coercion for sheet cells: numbers pass, strings parse with
/// `.` as the decimal point, everything else is 0. No locale separators:
/// "40.000" is 40 and "1.234,5" is 0.
pub fn coerce_value(cell: &serde_json::Value) -> f64 {
    let v = match cell {
        serde_json::Value::Number(n) => n.as_f64().unwrap_or(0.0),
        serde_json::Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    if v.is_finite() { v } else { 0.0 }
}
