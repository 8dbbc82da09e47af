use anyhow::Result;
use chrono::{Days, NaiveDate};

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn index(&mut self, n: usize) -> usize {
        (self.next_u64() % n as u64) as usize
    }

    fn unit(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn pick<'a>(&mut self, options: &'a [&'a str]) -> &'a str {
        options[self.index(options.len())]
    }
}

const REGIONS: [&str; 5] = ["North", "South", "East", "West", "Central"];
const PRODUCT_GROUPS: [&str; 6] = [
    "Footwear",
    "Apparel",
    "Accessories",
    "Equipment",
    "Nutrition",
    "Outdoor",
];
const CHANNELS: [&str; 3] = ["Distributor", "Retail", "Online"];
const BRANDS: [&str; 5] = ["Acme", "Northwind", "Zenith", "Polaris", "Vertex"];
const CUSTOMERS: [&str; 8] = [
    "Keller Trading",
    "Moss & Sons",
    "Harbor Supply",
    "Lindqvist AB",
    "Orbit Retail",
    "Pinewood Stores",
    "Quay Outfitters",
    "Ravelin Group",
];
const MRP_CATEGORIES: [&str; 3] = ["Economy", "Standard", "Premium"];
const GENDERS: [&str; 3] = ["Male", "Female", "Unisex"];
const ITEM_CATEGORIES: [&str; 4] = ["Core", "Seasonal", "Clearance", "Launch"];
const ASM_NAMES: [&str; 4] = ["A. Rao", "B. Mehta", "C. Singh", "D. Iyer"];
const ONLINE_STORES: [&str; 3] = ["Webshop", "Marketplace", "Offline"];

/// Write a deliberately dirty sample export to `sample_sales.csv`:
/// thousands separators in amounts, `N/A` cells, blank categories, and a
/// few unparsable dates, so the loader's recovery paths are exercised.
fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);
    let mut writer = csv::Writer::from_path("sample_sales.csv")?;

    writer.write_record([
        "Document No.",
        "Posting Date",
        "Sell to State",
        "Product Group",
        "Channel",
        "Customer Name",
        "MRP Category",
        "Gender",
        "Brands",
        "Item Category",
        "ASM Name",
        "Online Store",
        "Quantity",
        "Unit Price",
        "Final Line Amount (A-B+C)",
        "GST Percentage",
        "Total GST Amount",
    ])?;

    let start = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date");

    for row in 0..600u32 {
        let date = start + Days::new(rng.next_u64() % 366);
        let date_cell = match row {
            // A few rows the loader must drop.
            17 | 203 => "??-??-????".to_string(),
            311 => String::new(),
            _ => date.format("%d-%m-%Y").to_string(),
        };

        let quantity = 1 + rng.index(12);
        let unit_price = 40.0 + rng.unit() * 700.0;
        let amount = unit_price * quantity as f64;
        let amount_cell = if rng.unit() < 0.3 {
            // Locale-formatted, the way spreadsheet exports often arrive.
            let whole = amount.trunc() as i64;
            let frac = (amount.fract() * 100.0).round() as i64;
            if whole >= 1000 {
                format!("{},{:03}.{:02}", whole / 1000, whole % 1000, frac)
            } else {
                format!("{whole}.{frac:02}")
            }
        } else {
            format!("{amount:.2}")
        };
        let quantity_cell = if rng.unit() < 0.05 {
            "N/A".to_string()
        } else {
            quantity.to_string()
        };
        let region_cell = if rng.unit() < 0.04 { "" } else { rng.pick(&REGIONS) };

        let gst_pct = 18.0;
        let document = format!("DOC-{:05}", 10_000 + row);
        let unit_price_cell = format!("{unit_price:.2}");
        let gst_pct_cell = format!("{gst_pct}");
        let gst_amount_cell = format!("{:.2}", amount * gst_pct / 100.0);
        writer.write_record([
            document.as_str(),
            date_cell.as_str(),
            region_cell,
            rng.pick(&PRODUCT_GROUPS),
            rng.pick(&CHANNELS),
            rng.pick(&CUSTOMERS),
            rng.pick(&MRP_CATEGORIES),
            rng.pick(&GENDERS),
            rng.pick(&BRANDS),
            rng.pick(&ITEM_CATEGORIES),
            rng.pick(&ASM_NAMES),
            rng.pick(&ONLINE_STORES),
            quantity_cell.as_str(),
            unit_price_cell.as_str(),
            amount_cell.as_str(),
            gst_pct_cell.as_str(),
            gst_amount_cell.as_str(),
        ])?;
    }

    writer.flush()?;
    println!("Wrote sample_sales.csv");
    Ok(())
}
