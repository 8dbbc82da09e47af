use std::io::Write;
use std::num::NonZeroUsize;

use chrono::NaiveDate;
use tempfile::NamedTempFile;

use salescope::{
    aggregate, apply_filters, load_file, CatField, DatasetCache, FilterCriteria, GroupKey,
    NumField, Reducer,
};

fn write_csv(content: &str) -> NamedTempFile {
    let mut tmp = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    write!(tmp, "{content}").unwrap();
    tmp.flush().unwrap();
    tmp
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

const EXPORT: &str = "\
Document No.,Posting Date,Sell to State,Product Group,Channel,Quantity,Final Line Amount (A-B+C)
DOC-1,05-01-2024,North,Footwear,Online,2,500
DOC-2,20-01-2024,North,Apparel,Retail,1,\"1,500\"
DOC-3,01-02-2024,South,Footwear,Online,3,800
";

#[test]
fn filter_then_aggregate_scenario() {
    let tmp = write_csv(EXPORT);
    let table = load_file(tmp.path()).unwrap();
    assert_eq!(table.len(), 3);

    let january = apply_filters(
        &table,
        &FilterCriteria::new().with_date_range(date("2024-01-01"), date("2024-01-31")),
    );
    assert_eq!(january.len(), 2);

    let by_region = aggregate(
        &january,
        GroupKey::Category(CatField::Region),
        NumField::FinalLineAmount,
        Reducer::Sum,
        None,
    );
    assert_eq!(by_region, vec![("North".to_string(), 2000.0)]);

    // Exactly one high-value transaction in the filtered view.
    assert_eq!(january.high_value_count(), 1);
}

#[test]
fn distinct_values_feed_selection_controls() {
    let tmp = write_csv(EXPORT);
    let table = load_file(tmp.path()).unwrap();

    let regions: Vec<&String> = table
        .distinct_values(CatField::Region)
        .unwrap()
        .iter()
        .collect();
    assert_eq!(regions, ["North", "South"]);

    // Narrowing the view narrows the options of a fresh view.
    let online = apply_filters(
        &table,
        &FilterCriteria::new().with_category(CatField::SalesChannel, ["Online"]),
    );
    let groups: Vec<&String> = online
        .distinct_values(CatField::ProductGroup)
        .unwrap()
        .iter()
        .collect();
    assert_eq!(groups, ["Footwear"]);
}

#[test]
fn filters_compose_order_insensitively_from_file() {
    let tmp = write_csv(EXPORT);
    let table = load_file(tmp.path()).unwrap();

    let combined = FilterCriteria::new()
        .with_category(CatField::SalesChannel, ["Online"])
        .with_amount_range(0.0, 600.0)
        .with_date_range(date("2024-01-01"), date("2024-12-31"));

    let direct = apply_filters(&table, &combined);

    let reordered = apply_filters(
        &apply_filters(
            &apply_filters(
                &table,
                &FilterCriteria::new().with_date_range(date("2024-01-01"), date("2024-12-31")),
            ),
            &FilterCriteria::new().with_amount_range(0.0, 600.0),
        ),
        &FilterCriteria::new().with_category(CatField::SalesChannel, ["Online"]),
    );

    assert_eq!(direct, reordered);
    assert_eq!(direct.len(), 1);
    assert_eq!(
        direct.records()[0].category(CatField::DocumentNo),
        Some("DOC-1")
    );
}

#[test]
fn full_pipeline_through_the_cache() {
    let tmp = write_csv(EXPORT);
    let mut cache = DatasetCache::new();

    let table = cache.get_or_load(tmp.path()).unwrap();
    let again = cache.get_or_load(tmp.path()).unwrap();
    assert!(std::sync::Arc::ptr_eq(&table, &again));

    // Each "session" derives its own view from the shared table.
    let session_a = apply_filters(
        &table,
        &FilterCriteria::new().with_category(CatField::Region, ["North"]),
    );
    let session_b = apply_filters(
        &table,
        &FilterCriteria::new().with_category(CatField::Region, ["South"]),
    );
    assert_eq!(session_a.len() + session_b.len(), table.len());

    let top = aggregate(
        &session_a,
        GroupKey::Category(CatField::ProductGroup),
        NumField::FinalLineAmount,
        Reducer::Sum,
        NonZeroUsize::new(1),
    );
    assert_eq!(top, vec![("Apparel".to_string(), 1500.0)]);
}

#[test]
fn dirty_export_is_recovered_row_by_row() {
    let tmp = write_csv(
        "\
Posting Date,Sell to State,Quantity,Final Line Amount (A-B+C)
05-01-2024,North,N/A,\"1,234.50\"
bad-date,South,2,100
06-01-2024,,3,900
",
    );
    let table = load_file(tmp.path()).unwrap();

    // One row dropped for its date; nothing else is fatal.
    assert_eq!(table.len(), 2);
    assert_eq!(table.dropped_dates(), 1);
    assert_eq!(table.records()[0].measure(NumField::Quantity), 0.0);
    assert_eq!(table.records()[0].measure(NumField::FinalLineAmount), 1234.5);
    assert_eq!(table.records()[1].category(CatField::Region), None);

    // Aggregating over an all-dropped filter result is a normal outcome.
    let none = apply_filters(
        &table,
        &FilterCriteria::new().with_amount_range(1e6, 2e6),
    );
    assert!(none.is_empty());
    let empty_agg = aggregate(
        &none,
        GroupKey::Quarter,
        NumField::FinalLineAmount,
        Reducer::Sum,
        None,
    );
    assert!(empty_agg.is_empty());
}
