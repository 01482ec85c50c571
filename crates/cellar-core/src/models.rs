//! Data models for Cellar
//!
//! Defines the persisted entities (Cellar, Bottle, Settings) and the
//! input/patch types the store accepts. JSON field names follow the
//! backup/sync wire format (camelCase, optional fields omitted when absent,
//! timestamps as epoch milliseconds).

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

/// Validation errors raised when an entity would break its invariants
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Cellar dimensions must be positive (got {rows} rows x {columns} columns)")]
    InvalidDimensions { rows: u32, columns: u32 },

    #[error("Rating must be between 0 and 5 (got {0})")]
    InvalidRating(u8),

    #[error("Invalid vintage '{0}': expected a year or NV")]
    InvalidVintage(String),

    #[error("Bottle {0} has been consumed; its status can no longer change")]
    AlreadyConsumed(String),
}

/// Timestamps persist as epoch milliseconds
pub(crate) fn to_millis(t: DateTime<Utc>) -> DateTime<Utc> {
    t.trunc_subsecs(3)
}

/// Current time at storage precision
pub(crate) fn now_millis() -> DateTime<Utc> {
    to_millis(Utc::now())
}

/// Highest rating a consumed bottle can receive
pub const MAX_RATING: u8 = 5;

fn check_rating(rating: u8) -> Result<(), ModelError> {
    if rating > MAX_RATING {
        return Err(ModelError::InvalidRating(rating));
    }
    Ok(())
}

// ==================== Enums ====================

/// Wine style
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WineType {
    #[default]
    Red,
    White,
    Rose,
    Sparkling,
    Other,
}

impl WineType {
    pub const ALL: [WineType; 5] = [
        WineType::Red,
        WineType::White,
        WineType::Rose,
        WineType::Sparkling,
        WineType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WineType::Red => "Red",
            WineType::White => "White",
            WineType::Rose => "Rose",
            WineType::Sparkling => "Sparkling",
            WineType::Other => "Other",
        }
    }

    /// Loose label matching used for imported data.
    ///
    /// Substring and case-insensitive, checked in the order white, rose,
    /// sparkling. Anything else is Red.
    pub fn from_label(label: &str) -> Self {
        let label = label.to_lowercase();
        if label.contains("white") {
            WineType::White
        } else if label.contains("rose") || label.contains("rosé") {
            WineType::Rose
        } else if label.contains("sparkling") {
            WineType::Sparkling
        } else {
            WineType::Red
        }
    }
}

impl fmt::Display for WineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WineType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WineType::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "Unknown wine type '{}'. Expected one of: Red, White, Rose, Sparkling, Other",
                    s
                )
            })
    }
}

/// Bottle lifecycle status. Consumed is terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BottleStatus {
    #[default]
    Active,
    Consumed,
}

/// Vintage year, or non-vintage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vintage {
    Year(i32),
    NonVintage,
}

impl Vintage {
    /// Vintage for the current calendar year
    pub fn current_year() -> Self {
        use chrono::Datelike;
        Vintage::Year(Utc::now().year())
    }
}

impl fmt::Display for Vintage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vintage::Year(year) => write!(f, "{}", year),
            Vintage::NonVintage => f.write_str("NV"),
        }
    }
}

impl FromStr for Vintage {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("nv") {
            return Ok(Vintage::NonVintage);
        }
        s.parse::<i32>()
            .map(Vintage::Year)
            .map_err(|_| ModelError::InvalidVintage(s.to_string()))
    }
}

impl Serialize for Vintage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Vintage::Year(year) => serializer.serialize_i32(*year),
            Vintage::NonVintage => serializer.serialize_str("NV"),
        }
    }
}

impl<'de> Deserialize<'de> for Vintage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(i64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => i32::try_from(n)
                .map(Vintage::Year)
                .map_err(|_| de::Error::custom(format!("vintage year out of range: {}", n))),
            Raw::Text(text) => text.parse().map_err(de::Error::custom),
        }
    }
}

/// A slot address within a cellar grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinates {
    pub row: u32,
    pub col: u32,
}

impl Coordinates {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

// ==================== Cellar ====================

/// A named rectangular grid of bottle slots
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cellar {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub rows: u32,
    pub columns: u32,
}

impl Cellar {
    /// Number of slots in the grid
    pub fn capacity(&self) -> u32 {
        self.rows.saturating_mul(self.columns)
    }

    /// Whether the coordinates address a slot inside this grid
    pub fn contains(&self, coordinates: Coordinates) -> bool {
        coordinates.row < self.rows && coordinates.col < self.columns
    }
}

/// A cellar that has not been stored yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewCellar {
    pub name: String,
    pub description: Option<String>,
    pub rows: u32,
    pub columns: u32,
}

impl NewCellar {
    pub fn new(name: impl Into<String>, rows: u32, columns: u32) -> Self {
        Self {
            name: name.into(),
            description: None,
            rows,
            columns,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub(crate) fn into_cellar(self, id: String) -> Result<Cellar, ModelError> {
        check_dimensions(self.rows, self.columns)?;
        Ok(Cellar {
            id,
            name: self.name,
            description: self.description,
            rows: self.rows,
            columns: self.columns,
        })
    }
}

fn check_dimensions(rows: u32, columns: u32) -> Result<(), ModelError> {
    if rows == 0 || columns == 0 {
        return Err(ModelError::InvalidDimensions { rows, columns });
    }
    Ok(())
}

/// Partial cellar update; `None` leaves a field unchanged
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellarPatch {
    pub name: Option<String>,
    /// `Some(None)` clears the description
    pub description: Option<Option<String>>,
    pub rows: Option<u32>,
    pub columns: Option<u32>,
}

impl CellarPatch {
    pub(crate) fn apply(self, cellar: &mut Cellar) -> Result<(), ModelError> {
        let rows = self.rows.unwrap_or(cellar.rows);
        let columns = self.columns.unwrap_or(cellar.columns);
        check_dimensions(rows, columns)?;

        if let Some(name) = self.name {
            cellar.name = name;
        }
        if let Some(description) = self.description {
            cellar.description = description;
        }
        cellar.rows = rows;
        cellar.columns = columns;
        Ok(())
    }
}

// ==================== Bottle ====================

/// A single bottle of wine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bottle {
    pub id: String,
    pub producer: String,
    pub varietal: String,
    pub vintage: Vintage,
    #[serde(rename = "type")]
    pub wine_type: WineType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Data-encoded image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub status: BottleStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub date_added: DateTime<Utc>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "chrono::serde::ts_milliseconds_option"
    )]
    pub date_consumed: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occasion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchase_price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_price: Option<f64>,
}

impl Bottle {
    pub fn is_active(&self) -> bool {
        self.status == BottleStatus::Active
    }

    pub fn is_consumed(&self) -> bool {
        self.status == BottleStatus::Consumed
    }

    /// Current value: current price, else purchase price, else zero
    pub fn value(&self) -> f64 {
        self.current_price.or(self.purchase_price).unwrap_or(0.0)
    }

    /// Short display label, e.g. "2015 Caymus Cabernet"
    pub fn label(&self) -> String {
        format!("{} {} {}", self.vintage, self.producer, self.varietal)
    }

    /// Coordinates are only meaningful inside a cellar
    pub(crate) fn normalize_placement(&mut self) {
        if self.storage_id.is_none() {
            self.coordinates = None;
        }
    }

    /// Copy this bottle as a fresh, active, unplaced bottle with no tasting data
    pub(crate) fn duplicate(&self, id: String, now: DateTime<Utc>) -> Bottle {
        Bottle {
            id,
            date_added: to_millis(now),
            status: BottleStatus::Active,
            storage_id: None,
            coordinates: None,
            date_consumed: None,
            rating: None,
            notes: None,
            ..self.clone()
        }
    }
}

/// A bottle that has not been stored yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewBottle {
    pub producer: String,
    pub varietal: String,
    pub vintage: Vintage,
    pub wine_type: WineType,
    pub region: Option<String>,
    pub country: Option<String>,
    pub photo_url: Option<String>,
    pub status: BottleStatus,
    pub storage_id: Option<String>,
    pub coordinates: Option<Coordinates>,
    /// Defaults to the creation time
    pub date_added: Option<DateTime<Utc>>,
    pub purchase_price: Option<f64>,
    pub current_price: Option<f64>,
}

impl NewBottle {
    pub fn new(
        producer: impl Into<String>,
        varietal: impl Into<String>,
        vintage: Vintage,
        wine_type: WineType,
    ) -> Self {
        Self {
            producer: producer.into(),
            varietal: varietal.into(),
            vintage,
            wine_type,
            region: None,
            country: None,
            photo_url: None,
            status: BottleStatus::Active,
            storage_id: None,
            coordinates: None,
            date_added: None,
            purchase_price: None,
            current_price: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn with_purchase_price(mut self, price: f64) -> Self {
        self.purchase_price = Some(price);
        self
    }

    pub fn with_current_price(mut self, price: f64) -> Self {
        self.current_price = Some(price);
        self
    }

    pub fn with_date_added(mut self, date: DateTime<Utc>) -> Self {
        self.date_added = Some(date);
        self
    }

    /// Assign to a cellar, optionally at a slot
    pub fn in_cellar(mut self, storage_id: impl Into<String>, coordinates: Option<Coordinates>) -> Self {
        self.storage_id = Some(storage_id.into());
        self.coordinates = coordinates;
        self
    }

    /// Materialize with an id. Purchase price defaults to zero and current
    /// price to the purchase price.
    pub(crate) fn into_bottle(self, id: String, now: DateTime<Utc>) -> Bottle {
        let purchase_price = self.purchase_price.unwrap_or(0.0);
        let current_price = self.current_price.unwrap_or(purchase_price);

        let mut bottle = Bottle {
            id,
            producer: self.producer,
            varietal: self.varietal,
            vintage: self.vintage,
            wine_type: self.wine_type,
            region: self.region,
            country: self.country,
            photo_url: self.photo_url,
            status: self.status,
            storage_id: self.storage_id,
            coordinates: self.coordinates,
            date_added: to_millis(self.date_added.unwrap_or(now)),
            date_consumed: None,
            rating: None,
            notes: None,
            occasion: None,
            purchase_price: Some(purchase_price),
            current_price: Some(current_price),
        };
        bottle.normalize_placement();
        bottle
    }
}

/// Partial bottle update (shallow merge).
///
/// `None` leaves a field unchanged; for optional fields `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BottlePatch {
    pub producer: Option<String>,
    pub varietal: Option<String>,
    pub vintage: Option<Vintage>,
    pub wine_type: Option<WineType>,
    pub region: Option<Option<String>>,
    pub country: Option<Option<String>>,
    pub photo_url: Option<Option<String>>,
    pub status: Option<BottleStatus>,
    pub storage_id: Option<Option<String>>,
    pub coordinates: Option<Option<Coordinates>>,
    pub date_added: Option<DateTime<Utc>>,
    pub date_consumed: Option<Option<DateTime<Utc>>>,
    pub rating: Option<Option<u8>>,
    pub notes: Option<Option<String>>,
    pub occasion: Option<Option<String>>,
    pub purchase_price: Option<Option<f64>>,
    pub current_price: Option<Option<f64>>,
}

impl BottlePatch {
    /// Patch that replaces both placement fields
    pub fn placement(storage_id: Option<String>, coordinates: Option<Coordinates>) -> Self {
        Self {
            storage_id: Some(storage_id),
            coordinates: Some(coordinates),
            ..Self::default()
        }
    }

    /// Whether applying this patch may move the bottle to another slot
    pub fn touches_placement(&self) -> bool {
        self.storage_id.is_some() || self.coordinates.is_some()
    }

    /// Merge into `bottle`. A patch that moves an active bottle to Consumed
    /// stamps `date_consumed` with `now` unless it carries its own date.
    pub(crate) fn apply(self, bottle: &mut Bottle, now: DateTime<Utc>) -> Result<(), ModelError> {
        if bottle.is_consumed() && self.status == Some(BottleStatus::Active) {
            return Err(ModelError::AlreadyConsumed(bottle.id.clone()));
        }
        if let Some(Some(rating)) = self.rating {
            check_rating(rating)?;
        }

        if let Some(v) = self.producer {
            bottle.producer = v;
        }
        if let Some(v) = self.varietal {
            bottle.varietal = v;
        }
        if let Some(v) = self.vintage {
            bottle.vintage = v;
        }
        if let Some(v) = self.wine_type {
            bottle.wine_type = v;
        }
        if let Some(v) = self.region {
            bottle.region = v;
        }
        if let Some(v) = self.country {
            bottle.country = v;
        }
        if let Some(v) = self.photo_url {
            bottle.photo_url = v;
        }
        let consumes = bottle.is_active() && self.status == Some(BottleStatus::Consumed);
        if let Some(v) = self.status {
            bottle.status = v;
        }
        if let Some(v) = self.storage_id {
            bottle.storage_id = v;
        }
        if let Some(v) = self.coordinates {
            bottle.coordinates = v;
        }
        if let Some(v) = self.date_added {
            bottle.date_added = to_millis(v);
        }
        if let Some(v) = self.date_consumed {
            bottle.date_consumed = v.map(to_millis);
        }
        if consumes && bottle.date_consumed.is_none() {
            bottle.date_consumed = Some(to_millis(now));
        }
        if let Some(v) = self.rating {
            bottle.rating = v;
        }
        if let Some(v) = self.notes {
            bottle.notes = v;
        }
        if let Some(v) = self.occasion {
            bottle.occasion = v;
        }
        if let Some(v) = self.purchase_price {
            bottle.purchase_price = v;
        }
        if let Some(v) = self.current_price {
            bottle.current_price = v;
        }

        bottle.normalize_placement();
        Ok(())
    }
}

/// Tasting record captured when a bottle is consumed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tasting {
    pub rating: u8,
    pub notes: Option<String>,
    pub occasion: Option<String>,
}

impl Tasting {
    pub(crate) fn apply(self, bottle: &mut Bottle, now: DateTime<Utc>) -> Result<(), ModelError> {
        if bottle.is_consumed() {
            return Err(ModelError::AlreadyConsumed(bottle.id.clone()));
        }
        check_rating(self.rating)?;

        bottle.status = BottleStatus::Consumed;
        bottle.date_consumed = Some(to_millis(now));
        bottle.rating = Some(self.rating);
        bottle.notes = self.notes;
        bottle.occasion = self.occasion;
        Ok(())
    }
}

// ==================== Settings ====================

/// Currency code stored when the user enters their own currency
pub const CUSTOM_CURRENCY: &str = "Custom";

/// A built-in currency choice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrencyPreset {
    pub code: &'static str,
    pub symbol: &'static str,
    pub name: &'static str,
}

pub const CURRENCY_PRESETS: &[CurrencyPreset] = &[
    CurrencyPreset { code: "USD", symbol: "$", name: "US Dollar" },
    CurrencyPreset { code: "EUR", symbol: "€", name: "Euro" },
    CurrencyPreset { code: "GBP", symbol: "£", name: "British Pound" },
    CurrencyPreset { code: "JPY", symbol: "¥", name: "Japanese Yen" },
    CurrencyPreset { code: "HKD", symbol: "HK$", name: "Hong Kong Dollar" },
    CurrencyPreset { code: "AUD", symbol: "$", name: "Australian Dollar" },
    CurrencyPreset { code: "CAD", symbol: "$", name: "Canadian Dollar" },
    CurrencyPreset { code: "CHF", symbol: "CHF", name: "Swiss Franc" },
    CurrencyPreset { code: "CNY", symbol: "¥", name: "Chinese Yuan" },
];

/// User settings (singleton)
///
/// A custom currency is stored as `currency: "Custom"` together with
/// `customCurrencyCode`. Both fields are kept as written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub currency: String,
    pub currency_symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_currency_code: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            currency: "USD".to_string(),
            currency_symbol: "$".to_string(),
            custom_currency_code: None,
        }
    }
}

impl Settings {
    /// Settings for a built-in currency (case-insensitive code)
    pub fn preset(code: &str) -> Option<Self> {
        CURRENCY_PRESETS
            .iter()
            .find(|p| p.code.eq_ignore_ascii_case(code.trim()))
            .map(|p| Self {
                currency: p.code.to_string(),
                currency_symbol: p.symbol.to_string(),
                custom_currency_code: None,
            })
    }

    /// Settings for a user-defined currency
    pub fn custom(code: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            currency: CUSTOM_CURRENCY.to_string(),
            currency_symbol: symbol.into(),
            custom_currency_code: Some(code.into()),
        }
    }

    /// Whether the stored currency is not one of the presets
    pub fn is_custom(&self) -> bool {
        self.currency == CUSTOM_CURRENCY || !CURRENCY_PRESETS.iter().any(|p| p.code == self.currency)
    }

    /// The effective currency code for display
    pub fn currency_code(&self) -> &str {
        if self.currency == CUSTOM_CURRENCY {
            self.custom_currency_code.as_deref().unwrap_or(CUSTOM_CURRENCY)
        } else {
            &self.currency
        }
    }

    /// Format an amount with the configured symbol
    pub fn format_amount(&self, amount: f64) -> String {
        format!("{}{:.2}", self.currency_symbol, amount)
    }
}
