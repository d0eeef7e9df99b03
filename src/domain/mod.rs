//! Domain rules without I/O.

pub mod dose;

pub use dose::{
    format_ts, now_ts, parse_date, parse_range_bound, parse_ts, plan_dose, summarize,
    AdherenceStats, DosePlan, DoseRecord, DoseStatus, RangeBound, MAX_FREQUENCY_MINUTES,
    MAX_SKIPPED_DOSES, ON_TIME_WINDOW_MINUTES,
};
