//! Dose schedule rules: timestamps, dose status, skipped-dose planning and adherence.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A dose taken later than this after its expected time counts as late.
pub const ON_TIME_WINDOW_MINUTES: i64 = 30;

/// Longest accepted dosing interval: one leap year.
pub const MAX_FREQUENCY_MINUTES: i64 = 366 * 24 * 60;

/// Most skipped slots a single logged dose may backfill.
pub const MAX_SKIPPED_DOSES: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DoseStatus {
    OnTime,
    Late,
    Skipped,
}

impl DoseStatus {
    pub fn classify(expected: DateTime<Utc>, actual: DateTime<Utc>, dosage: i64) -> Self {
        if dosage <= 0 {
            Self::Skipped
        } else if actual - expected > Duration::minutes(ON_TIME_WINDOW_MINUTES) {
            Self::Late
        } else {
            Self::OnTime
        }
    }

    /// Classify a stored row. Rows are written by [`format_ts`], so both
    /// timestamps parse; anything else is treated as on time.
    pub fn from_stored(expected: &str, actual: &str, dosage: i64) -> Self {
        match (parse_ts(expected), parse_ts(actual)) {
            (Some(e), Some(a)) => Self::classify(e, a, dosage),
            _ if dosage <= 0 => Self::Skipped,
            _ => Self::OnTime,
        }
    }
}

/// Canonical storage format: second precision, `Z` suffix. Lexical order
/// of formatted values equals chronological order.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn now_ts() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

/// RFC 3339, or a naive `YYYY-MM-DDTHH:MM[:SS]` read as UTC.
pub fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).trunc_subsecs(0));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| naive.and_utc().trunc_subsecs(0))
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeBound {
    Start,
    End,
}

/// Parse a filter bound. A plain date covers the whole day: midnight for a
/// start bound, the last second of the day for an end bound.
pub fn parse_range_bound(s: &str, bound: RangeBound) -> Option<DateTime<Utc>> {
    if let Some(ts) = parse_ts(s) {
        return Some(ts);
    }
    let date = parse_date(s)?;
    let time = match bound {
        RangeBound::Start => NaiveTime::MIN,
        RangeBound::End => NaiveTime::from_hms_opt(23, 59, 59)?,
    };
    Some(date.and_time(time).and_utc())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DosePlan {
    pub expected_time: DateTime<Utc>,
    pub skipped: Vec<DateTime<Utc>>,
}

/// Work out the expected time of a dose taken at `actual`, and which
/// scheduled slots since the last taken dose were missed.
///
/// Slots run every `frequency_minutes` from `last_taken`. A slot `s` is
/// skipped when the next slot `s + frequency` also lies before `actual`;
/// the first slot that is not skipped is the one this dose fulfils.
/// More than [`MAX_SKIPPED_DOSES`] skipped slots, or a schedule outside the
/// representable time range, is a validation error.
/// Callers must reject `actual < last_taken`.
pub fn plan_dose(
    last_taken: Option<DateTime<Utc>>,
    frequency_minutes: i64,
    actual: DateTime<Utc>,
) -> Result<DosePlan, AppError> {
    let Some(last) = last_taken else {
        return Ok(DosePlan {
            expected_time: actual,
            skipped: Vec::new(),
        });
    };
    let step = Duration::try_minutes(frequency_minutes)
        .filter(|step| *step > Duration::zero())
        .ok_or_else(|| {
            AppError::Validation(format!("frequency_minutes {} is out of range", frequency_minutes))
        })?;
    let mut slot = last.checked_add_signed(step).ok_or_else(|| {
        AppError::Validation(format!(
            "next dose after {} is out of range",
            format_ts(last)
        ))
    })?;
    let mut skipped = Vec::new();
    while let Some(next) = slot.checked_add_signed(step).filter(|next| *next < actual) {
        if skipped.len() == MAX_SKIPPED_DOSES {
            return Err(AppError::Validation(format!(
                "actual_time {} is more than {} missed doses after the last dose at {}",
                format_ts(actual),
                MAX_SKIPPED_DOSES,
                format_ts(last)
            )));
        }
        skipped.push(slot);
        slot = next;
    }
    Ok(DosePlan {
        expected_time: slot,
        skipped,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoseRecord {
    pub expected_time: DateTime<Utc>,
    pub actual_time: DateTime<Utc>,
    pub dosage: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdherenceStats {
    pub total_scheduled: i64,
    pub total_taken: i64,
    pub total_skipped: i64,
    pub total_late: i64,
    pub adherence_pct: f64,
    pub on_time_pct: f64,
    pub avg_late_delay_minutes: Option<f64>,
}

pub fn summarize(records: &[DoseRecord]) -> AdherenceStats {
    let mut taken = 0i64;
    let mut on_time = 0i64;
    let mut late_delays: Vec<f64> = Vec::new();

    for r in records {
        match DoseStatus::classify(r.expected_time, r.actual_time, r.dosage) {
            DoseStatus::Skipped => {}
            DoseStatus::OnTime => {
                taken += 1;
                on_time += 1;
            }
            DoseStatus::Late => {
                taken += 1;
                late_delays.push((r.actual_time - r.expected_time).num_seconds() as f64 / 60.0);
            }
        }
    }

    let scheduled = records.len() as i64;
    let avg_late_delay_minutes = if late_delays.is_empty() {
        None
    } else {
        Some(round2(late_delays.iter().sum::<f64>() / late_delays.len() as f64))
    };

    AdherenceStats {
        total_scheduled: scheduled,
        total_taken: taken,
        total_skipped: scheduled - taken,
        total_late: late_delays.len() as i64,
        adherence_pct: percent(taken, scheduled),
        on_time_pct: percent(on_time, taken),
        avg_late_delay_minutes,
    }
}

fn percent(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round2(part as f64 * 100.0 / whole as f64)
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
