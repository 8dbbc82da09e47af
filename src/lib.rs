//! Filter-and-aggregate engine for sales transaction exports.
//!
//! The crate loads a flat sales export (CSV, JSON, or Parquet) into an
//! immutable normalized table, applies AND-composed filter criteria to
//! produce derived views, and computes the grouped aggregates a reporting
//! dashboard renders. The presentation layer stays outside this crate and
//! consumes four operations: the table itself, the distinct values per
//! categorical field, [`apply_filters`], and [`aggregate`].

pub mod data;
pub mod error;

pub use data::aggregate::{
    aggregate, aggregate_request, monthly_trend, GroupKey, Reducer, OVER_1000_LABEL,
    UNDER_1000_LABEL,
};
pub use data::cache::DatasetCache;
pub use data::filter::{apply_filters, FilterCriteria};
pub use data::loader::load_file;
pub use data::model::{
    day_name, CatField, NumField, Quarter, SalesRecord, SalesTable, HIGH_VALUE_THRESHOLD,
};
pub use error::EngineError;
