use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::model::{CatField, NumField, SalesRecord, SalesTable};

// ---------------------------------------------------------------------------
// Filter criteria
// ---------------------------------------------------------------------------

/// AND-composed filter criteria over the normalized table.
///
/// "No restriction" is always modeled explicitly: `None` for the ranges, an
/// absent key or empty set for a categorical field. There is no "All"
/// sentinel value.
///
/// The default criteria match every row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    /// Inclusive bounds on the posting date.
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    /// Per-field value selection: keep rows whose value is in the set.
    /// An absent field or an empty set places no restriction on that field.
    pub categories: BTreeMap<CatField, BTreeSet<String>>,
    /// Inclusive bounds on `final_line_amount`.
    pub amount_range: Option<(f64, f64)>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to posting dates within `[start, end]`.
    #[must_use]
    pub fn with_date_range(mut self, start: NaiveDate, end: NaiveDate) -> Self {
        self.date_range = Some((start, end));
        self
    }

    /// Date-picker helper: a half-picked range (no end yet) means no date
    /// restriction rather than an error.
    #[must_use]
    pub fn with_date_selection(mut self, start: NaiveDate, end: Option<NaiveDate>) -> Self {
        self.date_range = end.map(|end| (start, end));
        self
    }

    /// Keep only rows whose `field` value is one of `values`.
    #[must_use]
    pub fn with_category<I, S>(mut self, field: CatField, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories
            .entry(field)
            .or_default()
            .extend(values.into_iter().map(Into::into));
        self
    }

    /// Restrict to `final_line_amount` within `[min, max]`.
    #[must_use]
    pub fn with_amount_range(mut self, min: f64, max: f64) -> Self {
        self.amount_range = Some((min, max));
        self
    }

    /// Whether the criteria place no restriction at all.
    pub fn is_empty(&self) -> bool {
        self.date_range.is_none()
            && self.amount_range.is_none()
            && self.categories.values().all(BTreeSet::is_empty)
    }

    /// Whether a single record passes every active restriction.
    fn matches(&self, record: &SalesRecord) -> bool {
        if let Some((start, end)) = self.date_range {
            if record.posting_date < start || record.posting_date > end {
                return false;
            }
        }

        if let Some((min, max)) = self.amount_range {
            let amount = record.measure(NumField::FinalLineAmount);
            if amount < min || amount > max {
                return false;
            }
        }

        for (field, selected) in &self.categories {
            if selected.is_empty() {
                continue; // no restriction on this field
            }
            match record.category(*field) {
                Some(value) => {
                    if !selected.contains(value) {
                        return false;
                    }
                }
                // Null value never matches an active selection.
                None => return false,
            }
        }

        true
    }
}

// ---------------------------------------------------------------------------
// Filtering
// ---------------------------------------------------------------------------

/// Produce a fresh filtered view of the table.
///
/// All active criteria must hold (logical AND), so the result is independent
/// of the order restrictions were added in, and is always a subset of the
/// input rows. Row order is preserved. An empty input yields an empty view.
pub fn apply_filters(table: &SalesTable, criteria: &FilterCriteria) -> SalesTable {
    let kept: Vec<SalesRecord> = table
        .records()
        .iter()
        .filter(|rec| criteria.matches(rec))
        .cloned()
        .collect();
    SalesTable::with_dropped(kept, table.dropped_dates())
}
