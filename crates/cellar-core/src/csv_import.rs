//! CSV bottle import
//!
//! Maps spreadsheet exports onto new bottles. Headers are matched
//! case-insensitively; unknown columns are ignored and missing values get
//! defaults. Any CSV-level error rejects the whole file.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{debug, warn};

use crate::backup::ImportError;
use crate::models::{NewBottle, Vintage, WineType};

pub const DEFAULT_PRODUCER: &str = "Unknown Producer";
pub const DEFAULT_VARIETAL: &str = "Unknown Varietal";

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

/// Column positions keyed by lowercase header
struct Columns(HashMap<String, usize>);

impl Columns {
    fn from_headers(headers: &StringRecord) -> Self {
        Self(
            headers
                .iter()
                .enumerate()
                .map(|(i, h)| (h.trim().to_lowercase(), i))
                .collect(),
        )
    }

    /// Non-empty value of a column in `record`
    fn get<'r>(&self, record: &'r StringRecord, name: &str) -> Option<&'r str> {
        let index = *self.0.get(name)?;
        record.get(index).map(str::trim).filter(|v| !v.is_empty())
    }
}

/// Parse CSV text into bottles ready for a bulk save
pub fn parse_csv(text: &str) -> Result<Vec<NewBottle>, ImportError> {
    parse_csv_bytes(text.as_bytes())
}

/// Parse raw file contents; fields must be valid UTF-8
pub fn parse_csv_bytes(data: &[u8]) -> Result<Vec<NewBottle>, ImportError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(data);

    let headers = reader
        .headers()
        .map_err(|source| ImportError::Csv { record: 0, source })?
        .clone();
    let columns = Columns::from_headers(&headers);

    let now = Utc::now();
    let mut bottles = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record.map_err(|source| ImportError::Csv {
            record: i + 1,
            source,
        })?;
        bottles.push(row_to_bottle(&columns, &record, now));
    }

    debug!("Parsed {} bottles from CSV", bottles.len());
    Ok(bottles)
}

fn row_to_bottle(columns: &Columns, record: &StringRecord, now: DateTime<Utc>) -> NewBottle {
    let wine_type = columns
        .get(record, "type")
        .map(WineType::from_label)
        .unwrap_or(WineType::Red);
    let producer = columns.get(record, "producer").unwrap_or(DEFAULT_PRODUCER);
    let varietal = columns.get(record, "varietal").unwrap_or(DEFAULT_VARIETAL);
    let vintage = columns
        .get(record, "vintage")
        .map(parse_vintage)
        .unwrap_or_else(Vintage::current_year);

    let mut bottle = NewBottle::new(producer, varietal, vintage, wine_type)
        .with_date_added(
            columns
                .get(record, "purchased on")
                .and_then(parse_date)
                .unwrap_or(now),
        );
    if let Some(region) = columns.get(record, "region") {
        bottle = bottle.with_region(region);
    }
    if let Some(country) = columns.get(record, "country") {
        bottle = bottle.with_country(country);
    }

    let price = columns.get(record, "price").map(parse_price).unwrap_or(0.0);
    bottle.with_purchase_price(price).with_current_price(price)
}

fn parse_vintage(raw: &str) -> Vintage {
    raw.parse().unwrap_or_else(|_| {
        warn!("Unrecognized vintage '{}', using the current year", raw);
        Vintage::current_year()
    })
}

fn parse_price(raw: &str) -> f64 {
    raw.replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|p| p.is_finite())
        .unwrap_or(0.0)
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    DATE_FORMATS.iter().find_map(|fmt| {
        NaiveDate::parse_from_str(raw, fmt)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
    })
}
