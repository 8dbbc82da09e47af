use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::num::NonZeroUsize;
use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use super::model::{CatField, NumField, Quarter, SalesRecord, SalesTable, DAY_NAMES, MONTH_NAMES};
use crate::error::EngineError;

// ---------------------------------------------------------------------------
// Request vocabulary
// ---------------------------------------------------------------------------

/// What rows are grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GroupKey {
    /// A categorical column; groups are ordered by label.
    Category(CatField),
    /// Calendar quarter, canonical Q1..Q4 order (missing quarters omitted).
    Quarter,
    /// Day of week, Monday..Sunday order (missing days omitted).
    DayOfWeek,
    /// Calendar month name, January..December order (missing months omitted).
    Month,
    /// Calendar year, ascending.
    Year,
    /// The over/under high-value split (`final_line_amount > 1000`).
    HighValue,
}

impl FromStr for GroupKey {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quarter" => Ok(GroupKey::Quarter),
            "day_of_week" => Ok(GroupKey::DayOfWeek),
            "month" | "month_name" => Ok(GroupKey::Month),
            "year" => Ok(GroupKey::Year),
            "sale_over_1000" => Ok(GroupKey::HighValue),
            other => other.parse::<CatField>().map(GroupKey::Category),
        }
    }
}

/// Per-group reduction applied to the metric column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reducer {
    Sum,
    Mean,
    /// Row count per group (the metric column is irrelevant).
    Count,
    /// Count of distinct metric values per group.
    CountDistinct,
}

impl FromStr for Reducer {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sum" => Ok(Reducer::Sum),
            "mean" => Ok(Reducer::Mean),
            "count" => Ok(Reducer::Count),
            "count_distinct" => Ok(Reducer::CountDistinct),
            other => Err(EngineError::MalformedRequest(format!(
                "unknown reducer '{other}'"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Group values
// ---------------------------------------------------------------------------

/// Internal group identity. Within one aggregation only a single variant
/// occurs, so the derived `Ord` yields the canonical output order: labels
/// ascending for categories, Q1..Q4, Monday..Sunday, years ascending, and
/// under-before-over for the high-value split.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum GroupValue {
    Text(String),
    Quarter(Quarter),
    /// `month0`, so the derived order is January..December.
    Month(u8),
    Day(u8),
    Year(i32),
    Flag(bool),
}

/// Label for the high-value side of the over/under split.
pub const OVER_1000_LABEL: &str = "> 1000";
/// Label for the low side of the over/under split.
pub const UNDER_1000_LABEL: &str = "<= 1000";

impl GroupValue {
    fn label(&self) -> String {
        match self {
            GroupValue::Text(s) => s.clone(),
            GroupValue::Quarter(q) => q.label().to_string(),
            GroupValue::Month(m) => MONTH_NAMES[*m as usize].to_string(),
            GroupValue::Day(d) => DAY_NAMES[*d as usize].to_string(),
            GroupValue::Year(y) => y.to_string(),
            GroupValue::Flag(over) => if *over { OVER_1000_LABEL } else { UNDER_1000_LABEL }.to_string(),
        }
    }
}

/// Group identity of a record under a key; `None` (null category) skips the
/// row, matching how pandas drops NaN group keys.
fn group_value(record: &SalesRecord, key: GroupKey) -> Option<GroupValue> {
    match key {
        GroupKey::Category(field) => record.category(field).map(|v| GroupValue::Text(v.to_string())),
        GroupKey::Quarter => Some(GroupValue::Quarter(record.quarter)),
        GroupKey::DayOfWeek => Some(GroupValue::Day(
            record.day_of_week.num_days_from_monday() as u8
        )),
        GroupKey::Month => Some(GroupValue::Month(record.posting_date.month0() as u8)),
        GroupKey::Year => Some(GroupValue::Year(record.year)),
        GroupKey::HighValue => Some(GroupValue::Flag(record.sale_over_1000)),
    }
}

// ---------------------------------------------------------------------------
// Accumulation
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Acc {
    sum: f64,
    count: u64,
    distinct: BTreeSet<u64>,
}

impl Acc {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
        self.distinct.insert(value.to_bits());
    }

    fn reduce(&self, reducer: Reducer) -> f64 {
        match reducer {
            Reducer::Sum => self.sum,
            Reducer::Mean => {
                if self.count == 0 {
                    0.0
                } else {
                    self.sum / self.count as f64
                }
            }
            Reducer::Count => self.count as f64,
            Reducer::CountDistinct => self.distinct.len() as f64,
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Group the table by `key`, reduce `metric` per group, and return the
/// ordered `(label, value)` sequence.
///
/// Without `top_n` the groups come out in the key's canonical order; groups
/// absent from the table are omitted, never zero-filled. With `top_n` the
/// result is the N largest reduced values, descending, ties kept in
/// first-encounter (source row) order. An empty table yields an empty
/// sequence.
pub fn aggregate(
    table: &SalesTable,
    key: GroupKey,
    metric: NumField,
    reducer: Reducer,
    top_n: Option<NonZeroUsize>,
) -> Vec<(String, f64)> {
    let mut accs: HashMap<GroupValue, Acc> = HashMap::new();
    let mut encounter_order: Vec<GroupValue> = Vec::new();

    for record in table.records() {
        let Some(group) = group_value(record, key) else {
            continue;
        };
        if !accs.contains_key(&group) {
            encounter_order.push(group.clone());
        }
        accs.entry(group).or_default().add(record.measure(metric));
    }

    let mut reduced: Vec<(GroupValue, f64)> = encounter_order
        .into_iter()
        .map(|group| {
            let value = accs[&group].reduce(reducer);
            (group, value)
        })
        .collect();

    match top_n {
        Some(n) => {
            // Stable sort keeps first-encounter order among equal values.
            reduced.sort_by(|a, b| b.1.total_cmp(&a.1));
            reduced.truncate(n.get());
        }
        None => reduced.sort_by(|a, b| a.0.cmp(&b.0)),
    }

    reduced
        .into_iter()
        .map(|(group, value)| (group.label(), value))
        .collect()
}

/// String-boundary variant of [`aggregate`] for presentation layers that
/// pass column and reducer names; unknown names are a
/// [`EngineError::MalformedRequest`].
pub fn aggregate_request(
    table: &SalesTable,
    key: &str,
    metric: &str,
    reducer: &str,
    top_n: Option<NonZeroUsize>,
) -> Result<Vec<(String, f64)>, EngineError> {
    Ok(aggregate(
        table,
        key.parse()?,
        metric.parse()?,
        reducer.parse()?,
        top_n,
    ))
}

// ---------------------------------------------------------------------------
// Monthly trend
// ---------------------------------------------------------------------------

/// Last day of the month containing `date`.
fn month_end(date: NaiveDate) -> NaiveDate {
    let (year, month) = (date.year(), date.month());
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    first_of_next
        .and_then(|d| d.checked_sub_days(Days::new(1)))
        .unwrap_or(date)
}

/// Bucket rows by calendar month (keyed by month-end date) and reduce the
/// metric per bucket, chronologically. Only months present in the table
/// appear; there is no gap-filling.
///
/// Only `Sum` and `Mean` make sense for a trend line; other reducers are a
/// malformed request.
pub fn monthly_trend(
    table: &SalesTable,
    metric: NumField,
    reducer: Reducer,
) -> Result<Vec<(NaiveDate, f64)>, EngineError> {
    if !matches!(reducer, Reducer::Sum | Reducer::Mean) {
        return Err(EngineError::MalformedRequest(format!(
            "monthly trend supports sum and mean, not {reducer}"
        )));
    }

    let mut buckets: BTreeMap<NaiveDate, Acc> = BTreeMap::new();
    for record in table.records() {
        buckets
            .entry(month_end(record.posting_date))
            .or_default()
            .add(record.measure(metric));
    }

    Ok(buckets
        .into_iter()
        .map(|(bucket, acc)| (bucket, acc.reduce(reducer)))
        .collect())
}

impl fmt::Display for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Reducer::Sum => "sum",
            Reducer::Mean => "mean",
            Reducer::Count => "count",
            Reducer::CountDistinct => "count_distinct",
        };
        f.write_str(name)
    }
}
