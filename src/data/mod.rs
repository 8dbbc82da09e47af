//! Data layer: the normalized table, loading, filtering, and aggregation.
//!
//! Architecture:
//! ```text
//!  .csv / .json / .parquet
//!        │
//!        ▼
//!   ┌──────────┐
//!   │  loader   │  canonicalize headers, coerce cells → SalesTable
//!   └──────────┘
//!        │            (memoized by `cache` on source identity)
//!        ▼
//!   ┌────────────┐
//!   │ SalesTable  │  Vec<SalesRecord>, distinct-value index
//!   └────────────┘
//!        │
//!        ▼
//!   ┌──────────┐      ┌─────────────┐
//!   │  filter   │ ───▶ │  aggregate   │  grouped reductions per chart
//!   └──────────┘      └─────────────┘
//! ```
//!
//! The table is immutable after load; every filter produces a fresh view,
//! and every aggregation reads its own view. Nothing here is shared mutably.

pub mod aggregate;
pub mod cache;
pub mod filter;
pub mod loader;
pub mod model;
