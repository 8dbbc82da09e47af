use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{
    Array, AsArray, BooleanArray, Float32Array, Float64Array, Int32Array, Int64Array, StringArray,
};
use arrow::datatypes::DataType;
use chrono::NaiveDate;
use log::{debug, info};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::Value as JsonValue;

use super::model::{CatField, NumField, SalesRecord, SalesTable};
use crate::error::EngineError;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load and normalize a sales export.  Dispatch by extension.
///
/// Supported formats:
/// * `.csv`     – delimited export with a header row (the usual case)
/// * `.json`    – records-oriented array of flat objects
/// * `.parquet` – flat columns (strings, ints, floats, bools)
///
/// Normalization is identical across formats: headers are trimmed and mapped
/// onto the canonical schema, dates are parsed day-first (rows with an
/// unparsable date are dropped and counted), numeric cells are coerced with
/// thousands separators stripped and zero-filled on failure, and the calendar
/// fields plus the high-value flag are derived.
///
/// Idempotent: loading the same file twice yields an equal table.
pub fn load_file(path: &Path) -> Result<SalesTable, EngineError> {
    if !path.exists() {
        return Err(EngineError::SourceNotFound(path.to_path_buf()));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let table = match ext.as_str() {
        "csv" => load_csv(path),
        "json" => load_json(path),
        "parquet" | "pq" => load_parquet(path),
        other => Err(EngineError::UnsupportedFormat(other.to_string())),
    }?;

    info!(
        "loaded {} rows from {} ({} dropped for unparsable dates)",
        table.len(),
        path.display(),
        table.dropped_dates()
    );
    Ok(table)
}

// ---------------------------------------------------------------------------
// Header canonicalization
// ---------------------------------------------------------------------------

/// What a source column maps to after header canonicalization.
#[derive(Debug, Clone, PartialEq)]
enum HeaderKind {
    /// The posting-date column.
    Date,
    Cat(CatField),
    Num(NumField),
    /// Unrecognized header; the column passes through unused.
    Extra(String),
}

/// Map a raw header onto the canonical schema.  Both the export's original
/// spellings and the canonical snake_case names are accepted; anything else
/// passes through as an extra column.
fn classify_header(raw: &str) -> HeaderKind {
    use HeaderKind::{Cat, Num};
    match raw.trim() {
        "Posting Date" | "posting_date" => HeaderKind::Date,
        "Sell to State" | "region" => Cat(CatField::Region),
        "Product Group" | "product_group" => Cat(CatField::ProductGroup),
        "Channel" | "sales_channel" => Cat(CatField::SalesChannel),
        "Customer Name" | "customer_name" => Cat(CatField::CustomerName),
        "MRP Category" | "mrp_category" => Cat(CatField::MrpCategory),
        "Gender" | "gender" => Cat(CatField::Gender),
        "Brands" | "brand" => Cat(CatField::Brand),
        "Item Category" | "item_category" => Cat(CatField::ItemCategory),
        "ASM Name" | "asm_name" => Cat(CatField::AsmName),
        "Online Store" | "online_store" => Cat(CatField::OnlineStore),
        "Item Description" | "item_description" => Cat(CatField::ItemDescription),
        "Sales Article" | "sales_article" => Cat(CatField::SalesArticle),
        "GL Account Code" | "gl_account_code" => Cat(CatField::GlAccountCode),
        "Account Name" | "account_name" => Cat(CatField::AccountName),
        "Product Type" | "product_type" => Cat(CatField::ProductType),
        "Company Name" | "company_name" => Cat(CatField::CompanyName),
        "Document No." | "document_no" => Cat(CatField::DocumentNo),
        "Quantity" | "quantity" => Num(NumField::Quantity),
        "Unit Price" | "unit_price" => Num(NumField::UnitPrice),
        "Line Discount" | "line_discount" => Num(NumField::LineDiscount),
        "Line Amount (Qty * Unit Unit_Price) -A" | "line_amount" => Num(NumField::LineAmount),
        "Invoice Discount Amount-B" | "invoice_discount" => Num(NumField::InvoiceDiscount),
        "Final Line Amount (A-B+C)" | "final_line_amount" => Num(NumField::FinalLineAmount),
        "GST Base Amount" | "gst_base_amount" => Num(NumField::GstBaseAmount),
        "GST Percentage" | "gst_percentage" => Num(NumField::GstPercentage),
        "Total GST Amount" | "total_gst_amount" => Num(NumField::TotalGstAmount),
        "IGST Amount" | "igst_amount" => Num(NumField::IgstAmount),
        "IGST Per" | "igst_per" => Num(NumField::IgstPer),
        "SGST Amount" | "sgst_amount" => Num(NumField::SgstAmount),
        "SGST Per" | "sgst_per" => Num(NumField::SgstPer),
        "CGST Amount" | "cgst_amount" => Num(NumField::CgstAmount),
        "CGST Per" | "cgst_per" => Num(NumField::CgstPer),
        "TDS Amount" | "tds_amount" => Num(NumField::TdsAmount),
        other => HeaderKind::Extra(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Cell coercion
// ---------------------------------------------------------------------------

/// Accepted posting-date formats, day-first. Two-digit years go first:
/// `%y` consumes exactly two digits so four-digit years fall through to
/// `%Y`, while the reverse order would read "24" as the year 24 AD.
const DATE_FORMATS: [&str; 4] = ["%d-%m-%y", "%d-%m-%Y", "%d/%m/%y", "%d/%m/%Y"];

/// Parse a day-first date; `None` for anything that doesn't fit.
fn parse_day_first(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Coerce a numeric cell: strip thousands separators and whitespace, parse
/// as `f64`, zero-fill anything that doesn't parse to a finite number.
fn parse_amount(s: &str) -> f64 {
    let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}

// ---------------------------------------------------------------------------
// Row normalization, shared by all formats
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RowBuilder {
    date: Option<NaiveDate>,
    categories: BTreeMap<CatField, String>,
    measures: [f64; NumField::COUNT],
    extra: BTreeMap<String, String>,
}

impl RowBuilder {
    fn set_text(&mut self, kind: &HeaderKind, raw: &str) {
        match kind {
            HeaderKind::Date => self.date = parse_day_first(raw),
            HeaderKind::Cat(field) => {
                let value = raw.trim();
                if !value.is_empty() {
                    self.categories.insert(*field, value.to_string());
                }
            }
            HeaderKind::Num(field) => self.measures[*field as usize] = parse_amount(raw),
            HeaderKind::Extra(name) => {
                self.extra.insert(name.clone(), raw.to_string());
            }
        }
    }

    fn set_number(&mut self, kind: &HeaderKind, value: f64) {
        match kind {
            // A numeric posting date has no day-first interpretation.
            HeaderKind::Date => {}
            HeaderKind::Cat(field) => {
                self.categories.insert(*field, format_number(value));
            }
            HeaderKind::Num(field) => {
                self.measures[*field as usize] = if value.is_finite() { value } else { 0.0 };
            }
            HeaderKind::Extra(name) => {
                self.extra.insert(name.clone(), format_number(value));
            }
        }
    }

    /// `None` when the posting date is missing or unparsable (row dropped).
    fn finish(self) -> Option<SalesRecord> {
        let date = self.date?;
        Some(SalesRecord::new(
            date,
            self.categories,
            self.measures,
            self.extra,
        ))
    }
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

fn load_csv(path: &Path) -> Result<SalesTable, EngineError> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| EngineError::unreadable(path, e))?;

    let kinds: Vec<HeaderKind> = reader
        .headers()
        .map_err(|e| EngineError::unreadable(path, e))?
        .iter()
        .map(classify_header)
        .collect();

    let mut records = Vec::new();
    let mut dropped = 0usize;

    for (row_no, result) in reader.records().enumerate() {
        let record = result.map_err(|e| EngineError::unreadable(path, e))?;

        let mut builder = RowBuilder::default();
        for (idx, kind) in kinds.iter().enumerate() {
            builder.set_text(kind, record.get(idx).unwrap_or(""));
        }
        match builder.finish() {
            Some(rec) => records.push(rec),
            None => {
                debug!("row {row_no}: dropped, posting date missing or unparsable");
                dropped += 1;
            }
        }
    }

    Ok(SalesTable::with_dropped(records, dropped))
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// Expected JSON schema (records-oriented, `df.to_json(orient='records')`):
///
/// ```json
/// [
///   { "Posting Date": "05-01-2024", "Sell to State": "North", "Quantity": 3, ... },
///   ...
/// ]
/// ```
///
/// Keys go through the same header canonicalization as CSV columns.
fn load_json(path: &Path) -> Result<SalesTable, EngineError> {
    let text = std::fs::read_to_string(path).map_err(|e| EngineError::unreadable(path, e))?;
    let root: JsonValue =
        serde_json::from_str(&text).map_err(|e| EngineError::unreadable(path, e))?;

    let rows = root
        .as_array()
        .ok_or_else(|| EngineError::unreadable(path, "expected top-level JSON array"))?;

    let mut records = Vec::with_capacity(rows.len());
    let mut dropped = 0usize;

    for (row_no, row) in rows.iter().enumerate() {
        let obj = row.as_object().ok_or_else(|| {
            EngineError::unreadable(path, format!("row {row_no} is not a JSON object"))
        })?;

        let mut builder = RowBuilder::default();
        for (key, value) in obj {
            let kind = classify_header(key);
            match value {
                JsonValue::String(s) => builder.set_text(&kind, s),
                JsonValue::Number(n) => {
                    if let Some(v) = n.as_f64() {
                        builder.set_number(&kind, v);
                    }
                }
                JsonValue::Bool(b) => builder.set_text(&kind, if *b { "true" } else { "false" }),
                JsonValue::Null => {}
                other => builder.set_text(&kind, &other.to_string()),
            }
        }
        match builder.finish() {
            Some(rec) => records.push(rec),
            None => {
                debug!("row {row_no}: dropped, posting date missing or unparsable");
                dropped += 1;
            }
        }
    }

    Ok(SalesTable::with_dropped(records, dropped))
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a Parquet export with flat columns.  Column names go through the
/// same canonicalization as CSV headers; cell types are taken from the
/// Arrow schema (strings funnel through the same coercion as CSV cells).
fn load_parquet(path: &Path) -> Result<SalesTable, EngineError> {
    let file = std::fs::File::open(path).map_err(|e| EngineError::unreadable(path, e))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| EngineError::unreadable(path, e))?;
    let reader = builder.build().map_err(|e| EngineError::unreadable(path, e))?;

    let mut records = Vec::new();
    let mut dropped = 0usize;

    for batch_result in reader {
        let batch = batch_result.map_err(|e| EngineError::unreadable(path, e))?;
        let schema = batch.schema();
        let kinds: Vec<HeaderKind> = schema
            .fields()
            .iter()
            .map(|f| classify_header(f.name()))
            .collect();

        for row in 0..batch.num_rows() {
            let mut row_builder = RowBuilder::default();
            for (col_idx, kind) in kinds.iter().enumerate() {
                let col = batch.column(col_idx);
                if col.is_null(row) {
                    continue;
                }
                match cell_value(col, row) {
                    Some(Cell::Text(s)) => row_builder.set_text(kind, &s),
                    Some(Cell::Number(v)) => row_builder.set_number(kind, v),
                    Some(Cell::Bool(b)) => {
                        row_builder.set_text(kind, if b { "true" } else { "false" })
                    }
                    None => {}
                }
            }
            match row_builder.finish() {
                Some(rec) => records.push(rec),
                None => dropped += 1,
            }
        }
    }

    Ok(SalesTable::with_dropped(records, dropped))
}

// -- Arrow helpers --

enum Cell {
    Text(String),
    Number(f64),
    Bool(bool),
}

/// Extract a single cell from an Arrow column at a given row.
/// Cells of an unsupported column type are treated as null.
fn cell_value(col: &Arc<dyn Array>, row: usize) -> Option<Cell> {
    match col.data_type() {
        DataType::Utf8 | DataType::LargeUtf8 => {
            if let Some(s) = col.as_any().downcast_ref::<StringArray>() {
                Some(Cell::Text(s.value(row).to_string()))
            } else {
                // LargeStringArray
                let s = col.as_string::<i64>();
                Some(Cell::Text(s.value(row).to_string()))
            }
        }
        DataType::Int32 => {
            let arr = col.as_any().downcast_ref::<Int32Array>().unwrap();
            Some(Cell::Number(arr.value(row) as f64))
        }
        DataType::Int64 => {
            let arr = col.as_any().downcast_ref::<Int64Array>().unwrap();
            Some(Cell::Number(arr.value(row) as f64))
        }
        DataType::Float32 => {
            let arr = col.as_any().downcast_ref::<Float32Array>().unwrap();
            Some(Cell::Number(arr.value(row) as f64))
        }
        DataType::Float64 => {
            let arr = col.as_any().downcast_ref::<Float64Array>().unwrap();
            Some(Cell::Number(arr.value(row)))
        }
        DataType::Boolean => {
            let arr = col.as_any().downcast_ref::<BooleanArray>().unwrap();
            Some(Cell::Bool(arr.value(row)))
        }
        other => {
            debug!("unsupported column type {other:?}, treating cell as null");
            None
        }
    }
}
