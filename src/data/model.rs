use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

// ---------------------------------------------------------------------------
// Enumerated schema
// ---------------------------------------------------------------------------

/// Categorical columns of a sales export, resolved once at load time.
/// Values are optional strings; an empty source cell means "no value".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CatField {
    Region,
    ProductGroup,
    SalesChannel,
    CustomerName,
    MrpCategory,
    Gender,
    Brand,
    ItemCategory,
    AsmName,
    OnlineStore,
    ItemDescription,
    SalesArticle,
    GlAccountCode,
    AccountName,
    ProductType,
    CompanyName,
    DocumentNo,
}

impl CatField {
    pub const ALL: [CatField; 17] = [
        CatField::Region,
        CatField::ProductGroup,
        CatField::SalesChannel,
        CatField::CustomerName,
        CatField::MrpCategory,
        CatField::Gender,
        CatField::Brand,
        CatField::ItemCategory,
        CatField::AsmName,
        CatField::OnlineStore,
        CatField::ItemDescription,
        CatField::SalesArticle,
        CatField::GlAccountCode,
        CatField::AccountName,
        CatField::ProductType,
        CatField::CompanyName,
        CatField::DocumentNo,
    ];

    /// Canonical snake_case column name.
    pub fn name(self) -> &'static str {
        match self {
            CatField::Region => "region",
            CatField::ProductGroup => "product_group",
            CatField::SalesChannel => "sales_channel",
            CatField::CustomerName => "customer_name",
            CatField::MrpCategory => "mrp_category",
            CatField::Gender => "gender",
            CatField::Brand => "brand",
            CatField::ItemCategory => "item_category",
            CatField::AsmName => "asm_name",
            CatField::OnlineStore => "online_store",
            CatField::ItemDescription => "item_description",
            CatField::SalesArticle => "sales_article",
            CatField::GlAccountCode => "gl_account_code",
            CatField::AccountName => "account_name",
            CatField::ProductType => "product_type",
            CatField::CompanyName => "company_name",
            CatField::DocumentNo => "document_no",
        }
    }
}

impl fmt::Display for CatField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CatField {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CatField::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| EngineError::MalformedRequest(format!("unknown categorical field '{s}'")))
    }
}

/// Numeric measure columns. All are `f64` after load; cells that fail
/// coercion are zero-filled, so downstream code never sees NaN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NumField {
    Quantity,
    UnitPrice,
    LineDiscount,
    LineAmount,
    InvoiceDiscount,
    FinalLineAmount,
    GstBaseAmount,
    GstPercentage,
    TotalGstAmount,
    IgstAmount,
    IgstPer,
    SgstAmount,
    SgstPer,
    CgstAmount,
    CgstPer,
    TdsAmount,
}

impl NumField {
    pub const COUNT: usize = 16;

    pub const ALL: [NumField; NumField::COUNT] = [
        NumField::Quantity,
        NumField::UnitPrice,
        NumField::LineDiscount,
        NumField::LineAmount,
        NumField::InvoiceDiscount,
        NumField::FinalLineAmount,
        NumField::GstBaseAmount,
        NumField::GstPercentage,
        NumField::TotalGstAmount,
        NumField::IgstAmount,
        NumField::IgstPer,
        NumField::SgstAmount,
        NumField::SgstPer,
        NumField::CgstAmount,
        NumField::CgstPer,
        NumField::TdsAmount,
    ];

    /// Canonical snake_case column name.
    pub fn name(self) -> &'static str {
        match self {
            NumField::Quantity => "quantity",
            NumField::UnitPrice => "unit_price",
            NumField::LineDiscount => "line_discount",
            NumField::LineAmount => "line_amount",
            NumField::InvoiceDiscount => "invoice_discount",
            NumField::FinalLineAmount => "final_line_amount",
            NumField::GstBaseAmount => "gst_base_amount",
            NumField::GstPercentage => "gst_percentage",
            NumField::TotalGstAmount => "total_gst_amount",
            NumField::IgstAmount => "igst_amount",
            NumField::IgstPer => "igst_per",
            NumField::SgstAmount => "sgst_amount",
            NumField::SgstPer => "sgst_per",
            NumField::CgstAmount => "cgst_amount",
            NumField::CgstPer => "cgst_per",
            NumField::TdsAmount => "tds_amount",
        }
    }
}

impl fmt::Display for NumField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NumField {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NumField::ALL
            .into_iter()
            .find(|f| f.name() == s)
            .ok_or_else(|| EngineError::MalformedRequest(format!("unknown numeric field '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Calendar derivations
// ---------------------------------------------------------------------------

/// Calendar quarter. The derived `Ord` gives the canonical Q1..Q4 order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Quarter {
    Q1,
    Q2,
    Q3,
    Q4,
}

impl Quarter {
    /// Quarter containing the given 1-based calendar month.
    pub fn from_month(month: u32) -> Quarter {
        match month {
            1..=3 => Quarter::Q1,
            4..=6 => Quarter::Q2,
            7..=9 => Quarter::Q3,
            _ => Quarter::Q4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Quarter::Q1 => "Q1",
            Quarter::Q2 => "Q2",
            Quarter::Q3 => "Q3",
            Quarter::Q4 => "Q4",
        }
    }
}

impl fmt::Display for Quarter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Full English month names, indexed by `month0`.
pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Full English day names, Monday first.
pub const DAY_NAMES: [&str; 7] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Full English day name for a weekday.
pub fn day_name(day: Weekday) -> &'static str {
    DAY_NAMES[day.num_days_from_monday() as usize]
}

// ---------------------------------------------------------------------------
// SalesRecord – one row of the normalized table
// ---------------------------------------------------------------------------

/// Amount threshold above which a transaction counts as high-value.
pub const HIGH_VALUE_THRESHOLD: f64 = 1000.0;

/// A single normalized transaction (one source row).
///
/// Calendar fields and the high-value flag are derived once at construction
/// and never recomputed; the record is immutable after load.
#[derive(Debug, Clone, PartialEq)]
pub struct SalesRecord {
    pub posting_date: NaiveDate,
    pub sale_over_1000: bool,
    pub year: i32,
    pub quarter: Quarter,
    pub day_of_week: Weekday,
    categories: BTreeMap<CatField, String>,
    measures: [f64; NumField::COUNT],
    /// Unrecognized source columns, kept verbatim for the raw-data view.
    pub extra: BTreeMap<String, String>,
}

impl SalesRecord {
    /// Build a record from its parsed parts, deriving the calendar fields
    /// and the high-value flag.
    pub fn new(
        posting_date: NaiveDate,
        categories: BTreeMap<CatField, String>,
        measures: [f64; NumField::COUNT],
        extra: BTreeMap<String, String>,
    ) -> Self {
        let final_amount = measures[NumField::FinalLineAmount as usize];
        SalesRecord {
            posting_date,
            sale_over_1000: final_amount > HIGH_VALUE_THRESHOLD,
            year: posting_date.year(),
            quarter: Quarter::from_month(posting_date.month()),
            day_of_week: posting_date.weekday(),
            categories,
            measures,
            extra,
        }
    }

    /// Value of a categorical field, `None` when the source cell was empty.
    pub fn category(&self, field: CatField) -> Option<&str> {
        self.categories.get(&field).map(String::as_str)
    }

    /// Iterate over the non-null categorical values of this record.
    pub fn categories(&self) -> impl Iterator<Item = (CatField, &str)> {
        self.categories.iter().map(|(f, v)| (*f, v.as_str()))
    }

    /// Value of a numeric measure (always finite; dirty cells were zero-filled).
    pub fn measure(&self, field: NumField) -> f64 {
        self.measures[field as usize]
    }

    /// Full English month name of the posting date.
    pub fn month_name(&self) -> &'static str {
        MONTH_NAMES[self.posting_date.month0() as usize]
    }
}

// ---------------------------------------------------------------------------
// SalesTable – the normalized table / a filtered view of it
// ---------------------------------------------------------------------------

/// The normalized table, or a filtered view of it (same shape either way).
///
/// Rows keep source order. The per-field distinct-value sets back the
/// presentation layer's selection controls.
#[derive(Debug, Clone, PartialEq)]
pub struct SalesTable {
    records: Vec<SalesRecord>,
    distinct: BTreeMap<CatField, BTreeSet<String>>,
    dropped_dates: usize,
}

impl SalesTable {
    /// Build a table from normalized records, indexing distinct values.
    pub fn from_records(records: Vec<SalesRecord>) -> Self {
        Self::with_dropped(records, 0)
    }

    /// Like [`SalesTable::from_records`] but carrying the count of source
    /// rows dropped for unparsable dates.
    pub fn with_dropped(records: Vec<SalesRecord>, dropped_dates: usize) -> Self {
        let mut distinct: BTreeMap<CatField, BTreeSet<String>> = BTreeMap::new();
        for rec in &records {
            for (field, value) in &rec.categories {
                distinct.entry(*field).or_default().insert(value.clone());
            }
        }
        SalesTable {
            records,
            distinct,
            dropped_dates,
        }
    }

    pub fn records(&self) -> &[SalesRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sorted distinct values of a categorical field, for building
    /// selection controls. `None` when no row carries the field.
    pub fn distinct_values(&self, field: CatField) -> Option<&BTreeSet<String>> {
        self.distinct.get(&field)
    }

    /// Source rows dropped at load time because their date would not parse.
    pub fn dropped_dates(&self) -> usize {
        self.dropped_dates
    }

    // -- Overview metrics ---------------------------------------------------

    /// Sum of a measure over all rows.
    pub fn total(&self, field: NumField) -> f64 {
        self.records.iter().map(|r| r.measure(field)).sum()
    }

    /// Number of distinct non-null values of a categorical field
    /// (e.g. distinct document numbers = transaction count).
    pub fn distinct_count(&self, field: CatField) -> usize {
        self.distinct.get(&field).map_or(0, BTreeSet::len)
    }

    /// Number of high-value rows (`final_line_amount > 1000`).
    pub fn high_value_count(&self) -> usize {
        self.records.iter().filter(|r| r.sale_over_1000).count()
    }

    /// Earliest and latest posting date, `None` for an empty table.
    pub fn date_span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let min = self.records.iter().map(|r| r.posting_date).min()?;
        let max = self.records.iter().map(|r| r.posting_date).max()?;
        Some((min, max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(date: &str, amount: f64, region: Option<&str>) -> SalesRecord {
        let mut categories = BTreeMap::new();
        if let Some(r) = region {
            categories.insert(CatField::Region, r.to_string());
        }
        let mut measures = [0.0; NumField::COUNT];
        measures[NumField::FinalLineAmount as usize] = amount;
        SalesRecord::new(
            NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            categories,
            measures,
            BTreeMap::new(),
        )
    }

    #[test]
    fn quarter_from_month_covers_year() {
        assert_eq!(Quarter::from_month(1), Quarter::Q1);
        assert_eq!(Quarter::from_month(3), Quarter::Q1);
        assert_eq!(Quarter::from_month(4), Quarter::Q2);
        assert_eq!(Quarter::from_month(9), Quarter::Q3);
        assert_eq!(Quarter::from_month(12), Quarter::Q4);
    }

    #[test]
    fn high_value_flag_is_strictly_greater() {
        assert!(!record("2024-03-01", 1000.0, None).sale_over_1000);
        assert!(record("2024-03-01", 1000.01, None).sale_over_1000);
    }

    #[test]
    fn calendar_derivations() {
        // 2024-01-05 was a Friday.
        let rec = record("2024-01-05", 10.0, None);
        assert_eq!(rec.year, 2024);
        assert_eq!(rec.quarter, Quarter::Q1);
        assert_eq!(rec.month_name(), "January");
        assert_eq!(day_name(rec.day_of_week), "Friday");
    }

    #[test]
    fn distinct_values_skip_nulls() {
        let table = SalesTable::from_records(vec![
            record("2024-01-05", 1.0, Some("North")),
            record("2024-01-06", 2.0, None),
            record("2024-01-07", 3.0, Some("South")),
            record("2024-01-08", 4.0, Some("North")),
        ]);
        let regions: Vec<&String> = table
            .distinct_values(CatField::Region)
            .unwrap()
            .iter()
            .collect();
        assert_eq!(regions, ["North", "South"]);
        assert_eq!(table.distinct_count(CatField::Region), 2);
        assert!(table.distinct_values(CatField::Brand).is_none());
    }

    #[test]
    fn overview_metrics() {
        let table = SalesTable::from_records(vec![
            record("2024-01-05", 500.0, Some("North")),
            record("2024-01-20", 1500.0, Some("North")),
            record("2024-02-01", 800.0, Some("South")),
        ]);
        assert_eq!(table.total(NumField::FinalLineAmount), 2800.0);
        assert_eq!(table.high_value_count(), 1);
        let (min, max) = table.date_span().unwrap();
        assert_eq!(min.to_string(), "2024-01-05");
        assert_eq!(max.to_string(), "2024-02-01");
    }

    #[test]
    fn field_names_round_trip() {
        for f in CatField::ALL {
            assert_eq!(f.name().parse::<CatField>().unwrap(), f);
        }
        for f in NumField::ALL {
            assert_eq!(f.name().parse::<NumField>().unwrap(), f);
        }
        assert!("no_such_field".parse::<CatField>().is_err());
    }
}
