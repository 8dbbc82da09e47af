use std::num::NonZeroUsize;
use std::path::PathBuf;

use anyhow::{Context, Result};
use salescope::{
    aggregate, monthly_trend, CatField, DatasetCache, GroupKey, NumField, Reducer,
};

/// Text overview of a sales export: the headline numbers the dashboard's
/// first tab shows, printed once. Usage: `salescope <source-file>`.
fn main() -> Result<()> {
    env_logger::init();

    let path: PathBuf = std::env::args_os()
        .nth(1)
        .context("usage: salescope <source-file>")?
        .into();

    let mut cache = DatasetCache::new();
    let table = cache
        .get_or_load(&path)
        .with_context(|| format!("loading {}", path.display()))?;

    println!("Source: {}", path.display());
    println!("Rows: {}", table.len());
    if table.dropped_dates() > 0 {
        println!("Rows dropped (unparsable date): {}", table.dropped_dates());
    }
    if let Some((min, max)) = table.date_span() {
        println!("Date span: {min} .. {max}");
    }

    let total = table.total(NumField::FinalLineAmount);
    let transactions = table.distinct_count(CatField::DocumentNo);
    let high_value = table.high_value_count();
    println!("Total sales: {total:.2}");
    println!("Distinct documents: {transactions}");
    if table.is_empty() {
        return Ok(());
    }
    println!(
        "High-value rows (> 1000): {high_value} ({:.2}%)",
        100.0 * high_value as f64 / table.len() as f64
    );

    println!("\nTop 5 product groups by sales:");
    for (group, value) in aggregate(
        &table,
        GroupKey::Category(CatField::ProductGroup),
        NumField::FinalLineAmount,
        Reducer::Sum,
        NonZeroUsize::new(5),
    ) {
        println!("  {group:<30} {value:>14.2}");
    }

    println!("\nSales by quarter:");
    for (quarter, value) in aggregate(
        &table,
        GroupKey::Quarter,
        NumField::FinalLineAmount,
        Reducer::Sum,
        None,
    ) {
        println!("  {quarter:<30} {value:>14.2}");
    }

    println!("\nMonthly sales trend:");
    for (month, value) in monthly_trend(&table, NumField::FinalLineAmount, Reducer::Sum)? {
        println!("  {month}  {value:>14.2}");
    }

    Ok(())
}
